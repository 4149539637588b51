use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::{runtime::CpuState, symbol::Register};

#[macro_export]
macro_rules! dprintln {
    ( $cond:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        let output = $crate::output::Output::Diagnostic($cond);
        if output.is_enabled() {
            let mut s = format!($fmt $($tt)*);
            s.push('\n');
            output.print_str(&s);
        }
    }};
    // Trigger type error if missing condition
    ( $fmt:literal $($tt:tt)* ) => {{
        $crate::output::Output::Diagnostic($fmt);
    }};
}

#[derive(Clone, Copy, Debug)]
pub enum Output {
    Normal,
    /// Written to stderr
    Diagnostic(Condition),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Per-instruction trace and skipped bytes, only with `NIBBLER_TRACE=1`
    Trace,
}

/// How to read a byte shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpretation {
    #[default]
    Signed,
    Unsigned,
}

impl Interpretation {
    pub fn format(self, value: u8) -> String {
        match self {
            Self::Signed => format!("{}", value as i8),
            Self::Unsigned => format!("{value}"),
        }
    }
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_minimal(new_value: bool) -> bool {
        if new_value {
            colored::control::set_override(false);
        }
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    /// Whether anything would be printed at all.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Normal => true,
            Self::Diagnostic(Condition::Trace) => crate::env::is_trace_enabled(),
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => print!("{}", string),
            Self::Diagnostic(_) => {
                if !self.is_enabled() {
                    return;
                }
                if Self::is_minimal() {
                    eprint_colorless(string);
                } else {
                    eprint!("{}", ColoredString::from(string).blue());
                }
            }
        }
    }

    /// Print the latest value of the display latch.
    pub fn print_output(&self, value: u8, interp: Interpretation) {
        if Self::is_minimal() {
            self.print_str(&format!("{}\n", interp.format(value)));
        } else {
            self.print_str(&format!(
                "{:>12} {}\n",
                "Output".cyan(),
                interp.format(value).as_str().bold()
            ));
        }
    }

    pub fn print_state(&self, state: &CpuState, interp: Interpretation) {
        if Self::is_minimal() {
            for reg in Register::ALL {
                let value = state.registers[reg.index()];
                self.print_str(&format!("{reg} {}\n", interp.format(value)));
            }
            self.print_str(&format!("PC {}\n", state.pc));
            self.print_str(&format!("FLAGS {}\n", state.flags));
            if state.output_enabled {
                self.print_str(&format!("OUT {}\n", interp.format(state.output)));
            }
            return;
        }

        self.print_str("\x1b[2m┌────────────────────────────────┐\x1b[0m\n");
        self.print_str("\x1b[2m│       \x1b[3mhex   uint    int   bits\x1b[0m\x1b[2m │\x1b[0m\n");
        for reg in Register::ALL {
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(&format!(" \x1b[1m{reg}\x1b[0m    "));
            self.print_byte(state.registers[reg.index()]);
            self.print_str(" \x1b[2m│\x1b[0m\n");
        }
        self.print_str("\x1b[2m│\x1b[0m");
        self.print_str(&format!(" \x1b[1mPC\x1b[0m  0x{:04x}", state.pc));
        self.print_str(&format!("  \x1b[1mIR\x1b[0m 0x{:02x}", state.ir));
        self.print_str(&format!("  \x1b[1mF\x1b[0m {}", state.flags));
        self.print_str(" \x1b[2m│\x1b[0m\n");
        for (i, chunk) in state.ram.chunks(8).enumerate() {
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(if i == 0 { " \x1b[1mRAM\x1b[0m" } else { "    " });
            for byte in chunk {
                self.print_str(&format!(" {byte:02x}"));
            }
            self.print_str("     \x1b[2m│\x1b[0m\n");
        }
        self.print_str("\x1b[2m│\x1b[0m");
        let out = match state.output_enabled {
            true => format!("{:>4} ({})", interp.format(state.output), interp_name(interp)),
            false => "\x1b[2m────\x1b[0m".to_string(),
        };
        self.print_str(&format!(" \x1b[1mOUT\x1b[0m {out:<27}"));
        self.print_str(" \x1b[2m│\x1b[0m\n");
        self.print_str("\x1b[2m└────────────────────────────────┘\x1b[0m\n");
    }

    fn print_byte(&self, value: u8) {
        self.print_str(&format!("0x{:02x}  ", value));
        self.print_str(&format!("{:-4}  ", value));
        self.print_str(&format!("{:-5}  ", value as i8));
        self.print_str(&format!("{:04b}_{:04b}", value >> 4, value & 0xF));
    }
}

fn interp_name(interp: Interpretation) -> &'static str {
    match interp {
        Interpretation::Signed => "signed",
        Interpretation::Unsigned => "unsigned",
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn eprint_colorless(string: &str) {
    eprint!("{}", Decolored::new(string).collect::<String>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
    }

    #[test]
    fn interpretations() {
        assert_eq!(Interpretation::Signed.format(0xFF), "-1");
        assert_eq!(Interpretation::Signed.format(0x7F), "127");
        assert_eq!(Interpretation::Unsigned.format(0xFF), "255");
    }

    #[test]
    fn trace_is_off_without_env() {
        assert!(!Output::Diagnostic(Condition::Trace).is_enabled());
        assert!(Output::Normal.is_enabled());
    }
}
