use std::fmt;

use crate::symbol::Register;

/// Four 8-bit general purpose registers.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct RegisterFile {
    cells: [u8; 4],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn read(&self, reg: Register) -> u8 {
        self.cells[reg.index()]
    }

    #[inline]
    pub fn write(&mut self, reg: Register, value: u8) {
        self.cells[reg.index()] = value;
    }

    pub fn reset(&mut self) {
        self.cells = [0; 4];
    }

    /// Values of A, B, C and D in order.
    pub fn snapshot(&self) -> [u8; 4] {
        self.cells
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reg) in Register::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{reg}:{:02X}", self.read(*reg))?;
        }
        Ok(())
    }
}
