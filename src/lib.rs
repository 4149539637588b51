// Output
#[macro_use]
pub mod output;
pub use output::{Interpretation, Output};

// Assembling
mod air;
pub use air::{Air, AsmOptions};
mod error;
pub use error::{CompileError, ErrorKind, LoadError};
mod image;
pub use image::{inspect, Image, ImageInfo, ImageIssue, Listing, ListingLine};
pub mod isa;
pub use isa::{AddressMode, Instruction, Mnemonic, Operands};
mod lexer;
mod parser;
pub use parser::parse_number;
mod symbol;
pub use symbol::{Register, Span, SrcOffset, SymbolTable};

// Decoding and running
mod decoder;
pub use decoder::{DecodeProgram, Decoded, Decoder, DisasmLine};
mod runtime;
pub use runtime::{jump_taken, Alu, Cpu, CpuState, Flags, Memory, RegisterFile, Status};

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;

/// Assemble `src` into a ROM image. Stops at the first error.
pub fn assemble(src: &str, options: &AsmOptions) -> Result<Image, CompileError> {
    let mut air = Air::new(src, *options)?;
    air.first_pass()?;
    air.second_pass()?;
    Ok(air.into_image())
}
