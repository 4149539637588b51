use crate::{
    error::LoadError,
    isa::{RAM_SIZE, ROM_SIZE},
};

/// Program ROM and data RAM.
#[derive(Clone, Debug)]
pub struct Memory {
    rom: Box<[u8; ROM_SIZE]>,
    ram: [u8; RAM_SIZE],
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// ROM starts out zeroed, so it reads as `NOP`.
    pub fn new() -> Self {
        Memory {
            rom: Box::new([0; ROM_SIZE]),
            ram: [0; RAM_SIZE],
        }
    }

    /// Copy `bytes` into ROM at `start`. The rest of ROM is kept.
    pub fn load_rom(&mut self, bytes: &[u8], start: usize) -> Result<(), LoadError> {
        if start >= ROM_SIZE {
            return Err(LoadError::StartOutOfRange { start });
        }
        if start + bytes.len() > ROM_SIZE {
            return Err(LoadError::Overflow {
                start,
                len: bytes.len(),
            });
        }
        self.rom[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// `None` past the end of ROM.
    #[inline]
    pub fn read_rom(&self, addr: usize) -> Option<u8> {
        self.rom.get(addr).copied()
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom[..]
    }

    // Only the low 4 bits address RAM
    #[inline]
    pub fn read_ram(&self, addr: u8) -> u8 {
        self.ram[(addr & 0x0F) as usize]
    }

    #[inline]
    pub fn write_ram(&mut self, addr: u8, value: u8) {
        self.ram[(addr & 0x0F) as usize] = value;
    }

    pub fn ram(&self) -> [u8; RAM_SIZE] {
        self.ram
    }

    pub fn reset_ram(&mut self) {
        self.ram = [0; RAM_SIZE];
    }
}
