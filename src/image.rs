use std::fmt;

use crate::{
    decoder::Decoder,
    isa::{AddressMode, PAD_BYTE, ROM_SIZE},
    symbol::SymbolTable,
};

/// Assembled program, ready to be written to disk or loaded into a [`crate::Cpu`].
#[derive(Debug)]
pub struct Image {
    bytes: Vec<u8>,
    listing: Listing,
    symbols: SymbolTable,
}

impl Image {
    pub fn new(bytes: Vec<u8>, listing: Listing, symbols: SymbolTable) -> Self {
        Image {
            bytes,
            listing,
            symbols,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Annotated output of the second pass, one entry per label or instruction line.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Listing {
    lines: Vec<ListingLine>,
}

impl Listing {
    pub fn push(&mut self, line: ListingLine) {
        self.lines.push(line)
    }

    pub fn lines(&self) -> &[ListingLine] {
        &self.lines
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ListingLine {
    /// 1-based source line
    pub line: usize,
    pub addr: u16,
    /// Empty for labels
    pub bytes: Vec<u8>,
    /// Normalized source text
    pub text: String,
}

impl fmt::Display for ListingLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hex = String::new();
        for byte in &self.bytes {
            hex.push_str(&format!("{byte:02X} "));
        }
        let bits = match self.bytes.first() {
            Some(op) => format!("{:04b}_{:04b}", op >> 4, op & 0xF),
            None => String::new(),
        };
        write!(f, "{:04X}  {hex:<9} {bits:<9}  {}", self.addr, self.text)
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Summary of a raw image before it is run.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ImageInfo {
    pub size: usize,
    /// Bytes other than `0xFF` padding
    pub used: usize,
    /// Known instructions before trailing padding
    pub instructions: usize,
    pub issues: Vec<ImageIssue>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImageIssue {
    Empty,
    TooLarge(usize),
    StartsWithPadding,
}

impl fmt::Display for ImageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "image is empty"),
            Self::TooLarge(size) => {
                write!(f, "image is {size} bytes, only {ROM_SIZE} fit in ROM")
            }
            Self::StartsWithPadding => write!(f, "first byte is 0xFF and will reset the CPU"),
        }
    }
}

/// Look over a raw image for obvious problems.
pub fn inspect(bytes: &[u8], mode: AddressMode) -> ImageInfo {
    let mut issues = Vec::new();
    match bytes.first() {
        None => issues.push(ImageIssue::Empty),
        Some(&PAD_BYTE) => issues.push(ImageIssue::StartsWithPadding),
        Some(_) => (),
    }
    if bytes.len() > ROM_SIZE {
        issues.push(ImageIssue::TooLarge(bytes.len()));
    }

    let end = bytes
        .iter()
        .rposition(|byte| *byte != PAD_BYTE)
        .map_or(0, |last| last + 1);
    let instructions = Decoder::new(mode)
        .decode_program(&bytes[..end])
        .filter(|line| !line.decoded.is_unknown())
        .count();

    ImageInfo {
        size: bytes.len(),
        used: bytes.iter().filter(|byte| **byte != PAD_BYTE).count(),
        instructions,
        issues,
    }
}
