use std::{fmt, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::SourceSpan;

// Symbol table of label -> ROM address
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Labels declared in a source file, keyed by their upper-cased name.
///
/// Filled by the first assembler pass and only read afterwards. Keeps declaration order so that
/// listings print labels the way they appear in the source.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    map: FxMap<String, u16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            map: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Insert a label. Returns the previous address if the label was already declared, in which
    /// case the table is left untouched.
    pub fn insert(&mut self, name: &str, addr: u16) -> Result<(), u16> {
        let key = name.to_ascii_uppercase();
        if let Some(prev) = self.map.get(&key) {
            return Err(*prev);
        }
        self.map.insert(key, addr);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.map.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.map.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}

/// Location within source
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Span {
    offs: SrcOffset,
    len: usize,
}

impl Span {
    pub fn new(offs: SrcOffset, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offs(&self) -> usize {
        self.offs.0
    }

    pub fn end(&self) -> usize {
        self.offs.0 + self.len
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

/// Used to refer to offsets from the start of a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct SrcOffset(pub usize);

/// The four general purpose registers, numbered by their 2-bit code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    A = 0b00,
    B = 0b01,
    C = 0b10,
    D = 0b11,
}

impl Register {
    pub const ALL: [Register; 4] = [Register::A, Register::B, Register::C, Register::D];

    /// Register for the low two bits of `code`.
    pub fn from_code(code: u8) -> Self {
        Self::ALL[(code & 0b11) as usize]
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Register::A),
            "B" => Ok(Register::B),
            "C" => Ok(Register::C),
            "D" => Ok(Register::D),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::D => "D",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_codes() {
        for (code, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(Register::from_code(code as u8), *reg);
            assert_eq!(reg.code(), code as u8);
        }
        // Upper bits are ignored
        assert_eq!(Register::from_code(0b1110), Register::C);
    }

    #[test]
    fn register_names_ignore_case() {
        assert_eq!("a".parse::<Register>(), Ok(Register::A));
        assert_eq!("D".parse::<Register>(), Ok(Register::D));
        assert!("e".parse::<Register>().is_err());
        assert!("AB".parse::<Register>().is_err());
    }

    #[test]
    fn symbols_are_case_insensitive() {
        let mut table = SymbolTable::new();
        table.insert("loop", 4).unwrap();
        assert_eq!(table.get("LOOP"), Some(4));
        assert_eq!(table.get("Loop"), Some(4));
        assert_eq!(table.insert("LOOP", 9), Err(4));
        assert_eq!(table.get("loop"), Some(4));
        assert_eq!(table.len(), 1);
    }
}
