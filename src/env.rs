use std::{cell::RefCell, ffi::OsStr};

#[derive(Clone, Copy, Default)]
struct Env {
    trace_enabled: bool,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read the process environment. Call once, before running anything.
pub fn init() {
    let value = Env {
        trace_enabled: var_is("NIBBLER_TRACE", "1"),
    };
    set_env(value);
}

/// Print every executed instruction to stderr.
pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

// Library users that never call `init` get the defaults
fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        callback(&env.unwrap_or_default())
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}
