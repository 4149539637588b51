use std::fmt;

use crate::isa::{self, AddressMode, Instruction, Mnemonic, ROM_SIZE};

/// Result of decoding a single opcode byte.
///
/// Bytes outside the instruction set are data, not errors: a CPU walking uninitialised ROM must
/// be able to step over them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Decoded {
    Known { instr: Instruction, size: u8 },
    Unknown(u8),
}

impl Decoded {
    pub fn size(&self) -> u8 {
        match self {
            Decoded::Known { size, .. } => *size,
            Decoded::Unknown(_) => 1,
        }
    }

    pub fn mnemonic(&self) -> Option<Mnemonic> {
        self.instr().map(|instr| instr.mnemonic())
    }

    pub fn instr(&self) -> Option<Instruction> {
        match self {
            Decoded::Known { instr, .. } => Some(*instr),
            Decoded::Unknown(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Decoded::Unknown(_))
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoded::Known { instr, .. } => write!(f, "{instr}"),
            Decoded::Unknown(byte) => write!(f, "??? 0x{byte:02X}"),
        }
    }
}

/// Inverse of [`Instruction::encode`] for a fixed [`AddressMode`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Decoder {
    mode: AddressMode,
}

impl Decoder {
    pub fn new(mode: AddressMode) -> Self {
        Decoder { mode }
    }

    pub fn mode(&self) -> AddressMode {
        self.mode
    }

    /// Decode an opcode byte. Immediates, RAM addresses and jump targets read as zero; use
    /// [`Decoder::complete`] once the payload bytes are known.
    pub fn decode(&self, byte: u8) -> Decoded {
        match isa::lookup(byte) {
            Some(desc) => {
                let operands = desc.unpack(byte);
                match Instruction::new(desc.mnemonic, operands) {
                    Some(instr) => Decoded::Known {
                        instr,
                        size: desc.size(self.mode),
                    },
                    None => Decoded::Unknown(byte),
                }
            }
            None => Decoded::Unknown(byte),
        }
    }

    /// Fill in payload operands from the bytes following the opcode.
    pub fn complete(&self, decoded: Decoded, payload: &[u8]) -> Decoded {
        match decoded {
            Decoded::Known { instr, size } => {
                let operands = instr.operands().with_payload(payload, self.mode);
                match Instruction::new(instr.mnemonic(), operands) {
                    Some(instr) => Decoded::Known { instr, size },
                    None => decoded,
                }
            }
            unknown => unknown,
        }
    }

    /// Decode the instruction starting at the front of `bytes`.
    pub fn decode_at(&self, bytes: &[u8]) -> Option<Decoded> {
        let (&opcode, rest) = bytes.split_first()?;
        let decoded = self.decode(opcode);
        let payload_len = (decoded.size() as usize - 1).min(rest.len());
        Some(self.complete(decoded, &rest[..payload_len]))
    }

    /// Walk a whole image, one instruction at a time. Bytes past the end of ROM are not decoded.
    pub fn decode_program<'a>(&self, bytes: &'a [u8]) -> DecodeProgram<'a> {
        DecodeProgram {
            decoder: *self,
            bytes,
            addr: 0,
        }
    }
}

/// Lazy disassembly of an image. See [`Decoder::decode_program`].
pub struct DecodeProgram<'a> {
    decoder: Decoder,
    bytes: &'a [u8],
    addr: usize,
}

impl<'a> Iterator for DecodeProgram<'a> {
    type Item = DisasmLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.bytes.len().min(ROM_SIZE);
        let rest = self.bytes.get(self.addr..end)?;
        let decoded = self.decoder.decode_at(rest)?;
        let len = (decoded.size() as usize).min(rest.len());
        let line = DisasmLine {
            addr: self.addr as u16,
            decoded,
            raw: &rest[..len],
        };
        self.addr += decoded.size() as usize;
        Some(line)
    }
}

/// One disassembled instruction. `raw` only holds the bytes present in the image.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DisasmLine<'a> {
    pub addr: u16,
    pub decoded: Decoded,
    pub raw: &'a [u8],
}

impl fmt::Display for DisasmLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = String::new();
        for byte in self.raw {
            raw.push_str(&format!("{byte:02X} "));
        }
        write!(f, "{:04X}:  {raw:<10} {}", self.addr, self.decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Operands;
    use crate::symbol::Register;

    #[test]
    fn decodes_register_fields() {
        let decoder = Decoder::default();
        let add = decoder.decode(0b0100_0001);
        assert_eq!(add.mnemonic(), Some(Mnemonic::Add));
        assert_eq!(
            add.instr().unwrap().operands(),
            Operands::Pair {
                dst: Register::A,
                src: Register::B
            }
        );
        assert_eq!(add.size(), 1);

        let dec = decoder.decode(0b1011_0011);
        assert_eq!(dec.mnemonic(), Some(Mnemonic::Dec));
        assert_eq!(dec.instr().unwrap().operands(), Operands::Reg(Register::C));
    }

    #[test]
    fn unknown_bytes_are_data() {
        let decoder = Decoder::default();
        for byte in [0x30, 0x40, 0xF0, 0x0D, 0x0E, 0x0F, 0b0111_0101, 0b1111_0100] {
            let decoded = decoder.decode(byte);
            assert_eq!(decoded, Decoded::Unknown(byte));
            assert_eq!(decoded.size(), 1);
        }
    }

    #[test]
    fn jump_size_follows_mode() {
        assert_eq!(Decoder::new(AddressMode::Bit11).decode(0x05).size(), 3);
        assert_eq!(Decoder::new(AddressMode::Bit8).decode(0x05).size(), 2);
    }

    #[test]
    fn jump_address_split() {
        let decoder = Decoder::new(AddressMode::Bit11);
        let decoded = decoder.decode_at(&[0x15, 0x03, 0x41]).unwrap();
        assert_eq!(decoded.mnemonic(), Some(Mnemonic::Jmz));
        assert_eq!(decoded.instr().unwrap().operands(), Operands::Target(0x0341));
    }

    #[test]
    fn walks_program() {
        // LDI A 5, JMP 0x0000, ???, HLT
        let image = [0x04, 0x05, 0x05, 0x00, 0x00, 0x30, 0x20];
        let lines: Vec<_> = Decoder::default().decode_program(&image).collect();
        let addrs: Vec<u16> = lines.iter().map(|line| line.addr).collect();
        assert_eq!(addrs, vec![0, 2, 5, 6]);
        assert_eq!(lines[0].raw, &[0x04, 0x05]);
        assert_eq!(lines[1].decoded.to_string(), "JMP 0x0000");
        assert!(lines[2].decoded.is_unknown());
        assert_eq!(lines[3].decoded.mnemonic(), Some(Mnemonic::Hlt));
    }

    #[test]
    fn truncated_tail() {
        let lines: Vec<_> = Decoder::default().decode_program(&[0x20, 0x05, 0x01]).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].raw, &[0x05, 0x01]);
        assert_eq!(lines[1].decoded.instr().unwrap().operands(), Operands::Target(0x0100));
    }

    #[test]
    fn stops_at_rom_end() {
        let image = vec![0x00; 0x10000 + 4];
        let lines: Vec<_> = Decoder::default().decode_program(&image).collect();
        assert_eq!(lines.len(), ROM_SIZE);
        assert_eq!(lines.last().map(|line| line.addr), Some(0x07FF));
    }

    #[test]
    fn disasm_line_format() {
        let image = [0x84, 0xFF];
        let line = Decoder::default().decode_program(&image).next().unwrap();
        assert_eq!(line.to_string(), "0000:  84 FF      LDI C 0xFF");
    }
}
