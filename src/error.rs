use std::{error::Error, fmt};

use miette::{miette, LabeledSpan, Report, Severity, SourceCode};

use crate::isa::{Mnemonic, ROM_SIZE};
use crate::symbol::Span;

/// Fatal assembler error. Compilation stops at the first one.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CompileError {
    /// 1-based source line
    pub line: usize,
    /// Source line as written, comment included
    pub text: String,
    /// Offending part of the line
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    UnknownMnemonic(String),
    OperandCount {
        mnemonic: Mnemonic,
        expected: usize,
        found: usize,
    },
    InvalidRegister(String),
    MalformedOperand(String),
    UndefinedLabel(String),
    ImmediateOutOfRange {
        value: i64,
        unsigned: bool,
    },
    RamAddressOutOfRange(i64),
    RomAddressOutOfRange {
        value: i64,
        limit: u32,
    },
    DuplicateLabel {
        name: String,
        addr: u16,
    },
    InvalidLabel(String),
    ProgramTooLarge(u32),
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownMnemonic(_) => "asm::mnemonic",
            Self::OperandCount { .. } => "asm::operands",
            Self::InvalidRegister(_) => "asm::register",
            Self::MalformedOperand(_) => "asm::literal",
            Self::UndefinedLabel(_) | Self::DuplicateLabel { .. } | Self::InvalidLabel(_) => {
                "asm::label"
            }
            Self::ImmediateOutOfRange { .. } => "asm::range",
            Self::RamAddressOutOfRange(_) => "asm::ram",
            Self::RomAddressOutOfRange { .. } | Self::ProgramTooLarge(_) => "asm::rom",
        }
    }

    pub fn help(&self) -> String {
        match self {
            Self::UnknownMnemonic(_) => {
                "check the list of available instructions in the documentation.".into()
            }
            Self::OperandCount { mnemonic, .. } => {
                format!("check the operands allowed for `{mnemonic}`.")
            }
            Self::InvalidRegister(_) => "registers are named A, B, C and D.".into(),
            Self::MalformedOperand(_) => {
                "literals are decimal, hex (0x1F, $1F) or binary (0b101, %101).".into()
            }
            Self::UndefinedLabel(_) => "declare the label on its own line, like `loop:`".into(),
            Self::ImmediateOutOfRange { unsigned: true, .. } => {
                "ranges from 0 to 255 are allowed in unsigned mode.".into()
            }
            Self::ImmediateOutOfRange { unsigned: false, .. } => {
                "ranges from -128 to 255 are allowed in signed mode.".into()
            }
            Self::RamAddressOutOfRange(_) => "RAM addresses range from 0 to 15.".into(),
            Self::RomAddressOutOfRange { limit, .. } => {
                format!("jump targets range from 0 to {}.", limit - 1)
            }
            Self::DuplicateLabel { .. } => "labels are only allowed once per file.".into(),
            Self::InvalidLabel(_) => {
                "labels start with a letter or `_` and stand alone on their line.".into()
            }
            Self::ProgramTooLarge(_) => format!("programs must fit in {ROM_SIZE} bytes of ROM."),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::UnknownMnemonic(_) => "unknown instruction",
            Self::OperandCount { .. } => "incorrect operands",
            Self::InvalidRegister(_) => "not a register",
            Self::MalformedOperand(_) => "incorrect literal",
            Self::UndefinedLabel(_) => "undefined label",
            Self::ImmediateOutOfRange { .. } => "out-of-range literal",
            Self::RamAddressOutOfRange(_) => "out-of-range RAM address",
            Self::RomAddressOutOfRange { .. } => "out-of-range ROM address",
            Self::DuplicateLabel { .. } => "duplicate label",
            Self::InvalidLabel(_) => "invalid label",
            Self::ProgramTooLarge(_) => "does not fit",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMnemonic(name) => write!(f, "Unsupported instruction `{name}`"),
            Self::OperandCount {
                mnemonic,
                expected,
                found,
            } => write!(
                f,
                "`{mnemonic}` expects {expected} operand(s), found {found}"
            ),
            Self::InvalidRegister(name) => write!(f, "Invalid register `{name}`"),
            Self::MalformedOperand(text) => write!(f, "Malformed operand `{text}`"),
            Self::UndefinedLabel(name) => write!(f, "Undefined label `{name}`"),
            Self::ImmediateOutOfRange { value, unsigned } => {
                let mode = if *unsigned { "unsigned" } else { "signed" };
                write!(f, "Literal {value} is out of range for {mode} mode")
            }
            Self::RamAddressOutOfRange(value) => write!(f, "RAM address {value} is out of range"),
            Self::RomAddressOutOfRange { value, limit } => {
                write!(f, "ROM address {value} is outside of 0..{limit}")
            }
            Self::DuplicateLabel { name, addr } => {
                write!(f, "Label `{name}` already declared at 0x{addr:04X}")
            }
            Self::InvalidLabel(name) => write!(f, "Invalid label `{name}`"),
            Self::ProgramTooLarge(size) => {
                write!(f, "Program of {size} bytes does not fit in ROM")
            }
        }
    }
}

impl CompileError {
    pub fn new(line: usize, text: impl Into<String>, span: Span, kind: ErrorKind) -> Self {
        CompileError {
            line,
            text: text.into(),
            span,
            kind,
        }
    }

    /// Render as a diagnostic pointing into `src`.
    pub fn into_report(self, src: impl SourceCode + Send + Sync + 'static) -> Report {
        miette!(
            severity = Severity::Error,
            code = self.kind.code(),
            help = self.kind.help(),
            labels = vec![LabeledSpan::at(self.span, self.kind.label())],
            "{}",
            self
        )
        .with_source_code(src)
    }
}

impl Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} in `{}`", self.line, self.kind, self.text.trim())
    }
}

/// Error placing an image into ROM.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadError {
    StartOutOfRange { start: usize },
    Overflow { start: usize, len: usize },
}

impl Error for LoadError {}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartOutOfRange { start } => {
                write!(f, "Start address 0x{start:04X} exceeds ROM size of {ROM_SIZE} bytes")
            }
            Self::Overflow { start, len } => write!(
                f,
                "Program of {len} bytes at 0x{start:04X} overflows ROM size of {ROM_SIZE} bytes"
            ),
        }
    }
}
