//! Instruction set of the 8-bit computer.
//!
//! Every opcode is either a full 8-bit literal (`NOP`, `OUT`, `HLT`, `RST`) or a 4-bit family in
//! the low nibble whose upper nibble carries registers and/or a sub-type:
//!
//! ```text
//!   SSDD_ffff   two registers (source, destination)
//!   RRTT_ffff   one register and a 2-bit sub-type
//!   CCCC_0101   jump condition
//! ```
//!
//! [`TABLE`] is the only description of this layout. The assembler encodes through
//! [`Instruction::encode`] and the decoder matches bytes through [`lookup`], both of which read
//! the same descriptors.

use std::{fmt, str::FromStr};

use crate::symbol::Register;

/// Size of program memory in bytes.
pub const ROM_SIZE: usize = 2048;
/// Size of data memory in bytes.
pub const RAM_SIZE: usize = 16;
/// Value used to pad images up to [`ROM_SIZE`].
pub const PAD_BYTE: u8 = 0xFF;

/// Width of jump addresses. Global for an assembly run and for a CPU instance.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum AddressMode {
    /// One address byte, jumps are 2 bytes long and reach 256 bytes of ROM.
    Bit8,
    /// High and low address bytes, jumps are 3 bytes long and reach all of ROM.
    #[default]
    Bit11,
}

impl AddressMode {
    pub fn jump_size(self) -> u8 {
        match self {
            AddressMode::Bit8 => 2,
            AddressMode::Bit11 => 3,
        }
    }

    /// First address that can no longer be used as a jump target.
    pub fn limit(self) -> u32 {
        match self {
            AddressMode::Bit8 => 0x100,
            AddressMode::Bit11 => ROM_SIZE as u32,
        }
    }
}

impl fmt::Display for AddressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressMode::Bit8 => f.write_str("8-bit"),
            AddressMode::Bit11 => f.write_str("11-bit"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Mnemonic {
    Nop,
    Out,
    Hlt,
    Rst,
    Add,
    Sub,
    Inc,
    Dec,
    Ldi,
    Ldm,
    Sav,
    Jmp,
    Jmz,
    Jnz,
    Jmc,
    Jme,
    Jng,
    Jml,
    Mov,
    And,
    Or,
    Xor,
    Not,
    Cmp,
    Cmi,
}

/// Kinds of operands an instruction takes, in source order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shape {
    None,
    /// `INC A`
    OneRegister,
    /// `ADD dst src`
    TwoRegisters,
    /// `LDI reg value`
    RegisterImmediate,
    /// `LDM reg ram_addr`
    RegisterAddress,
    /// `JMP addr_or_label`
    JumpTarget,
}

impl Shape {
    pub fn operand_count(self) -> usize {
        match self {
            Shape::None => 0,
            Shape::OneRegister | Shape::JumpTarget => 1,
            Shape::TwoRegisters | Shape::RegisterImmediate | Shape::RegisterAddress => 2,
        }
    }
}

/// How the opcode byte is laid out.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Layout {
    /// Whole byte is the opcode.
    Literal(u8),
    /// `SSDD_ffff`
    Pair,
    /// `RRTT_ffff` with the given sub-type.
    RegSub(u8),
    /// `CCCC_ffff` with the given jump condition.
    Cond(u8),
}

#[derive(Clone, Copy, Debug)]
pub struct Descriptor {
    pub mnemonic: Mnemonic,
    pub name: &'static str,
    /// Low nibble for family opcodes, whole byte for literals.
    pub family: u8,
    pub layout: Layout,
    pub shape: Shape,
    /// Approximate clock cycles on the real hardware.
    pub cycles: u8,
}

macro_rules! op {
    ( $mnemonic:ident, $family:expr, $layout:expr, $shape:ident, $cycles:expr ) => {
        Descriptor {
            mnemonic: Mnemonic::$mnemonic,
            name: stringify!($mnemonic),
            family: $family,
            layout: $layout,
            shape: Shape::$shape,
            cycles: $cycles,
        }
    };
}

/// All instructions, in the declaration order of [`Mnemonic`].
#[rustfmt::skip]
pub static TABLE: [Descriptor; 25] = [
    op!(Nop, 0x00,   Layout::Literal(0x00), None,              1),
    op!(Out, 0x10,   Layout::Literal(0x10), None,              2),
    op!(Hlt, 0x20,   Layout::Literal(0x20), None,              1),
    op!(Rst, 0xFF,   Layout::Literal(0xFF), None,              1),
    op!(Add, 0b0001, Layout::Pair,          TwoRegisters,      3),
    op!(Sub, 0b0010, Layout::Pair,          TwoRegisters,      3),
    op!(Inc, 0b0011, Layout::RegSub(0b10),  OneRegister,       2),
    op!(Dec, 0b0011, Layout::RegSub(0b11),  OneRegister,       2),
    op!(Ldi, 0b0100, Layout::RegSub(0b00),  RegisterImmediate, 3),
    op!(Ldm, 0b0100, Layout::RegSub(0b01),  RegisterAddress,   4),
    op!(Sav, 0b0100, Layout::RegSub(0b10),  RegisterAddress,   4),
    op!(Jmp, 0b0101, Layout::Cond(0),       JumpTarget,        3),
    op!(Jmz, 0b0101, Layout::Cond(1),       JumpTarget,        3),
    op!(Jnz, 0b0101, Layout::Cond(2),       JumpTarget,        3),
    op!(Jmc, 0b0101, Layout::Cond(3),       JumpTarget,        3),
    op!(Jme, 0b0101, Layout::Cond(4),       JumpTarget,        3),
    op!(Jng, 0b0101, Layout::Cond(5),       JumpTarget,        3),
    op!(Jml, 0b0101, Layout::Cond(6),       JumpTarget,        3),
    op!(Mov, 0b0110, Layout::Pair,          TwoRegisters,      2),
    op!(And, 0b0111, Layout::Pair,          TwoRegisters,      3),
    op!(Or,  0b1000, Layout::Pair,          TwoRegisters,      3),
    op!(Xor, 0b1001, Layout::Pair,          TwoRegisters,      3),
    op!(Not, 0b1010, Layout::RegSub(0b00),  OneRegister,       2),
    op!(Cmp, 0b1011, Layout::Pair,          TwoRegisters,      3),
    op!(Cmi, 0b1100, Layout::RegSub(0b00),  RegisterImmediate, 3),
];

impl Descriptor {
    /// Encoded length in bytes, opcode included.
    pub fn size(&self, mode: AddressMode) -> u8 {
        match self.shape {
            Shape::None | Shape::OneRegister | Shape::TwoRegisters => 1,
            Shape::RegisterImmediate | Shape::RegisterAddress => 2,
            Shape::JumpTarget => mode.jump_size(),
        }
    }

    /// Width of the opcode field.
    pub fn opcode_bits(&self) -> u8 {
        match self.layout {
            Layout::Literal(_) => 8,
            _ => 4,
        }
    }

    fn matches(&self, byte: u8) -> bool {
        let upper = byte >> 4;
        match self.layout {
            Layout::Literal(lit) => byte == lit,
            Layout::Pair => byte & 0x0F == self.family,
            Layout::RegSub(sub) => byte & 0x0F == self.family && upper & 0b11 == sub,
            Layout::Cond(cond) => byte & 0x0F == self.family && upper == cond,
        }
    }

    /// Operands held in the opcode byte. Payload values are zero until filled in with
    /// [`Operands::with_payload`].
    pub fn unpack(&self, byte: u8) -> Operands {
        let upper = byte >> 4;
        match self.shape {
            Shape::None => Operands::None,
            Shape::OneRegister => Operands::Reg(Register::from_code(upper >> 2)),
            Shape::TwoRegisters => Operands::Pair {
                dst: Register::from_code(upper),
                src: Register::from_code(upper >> 2),
            },
            Shape::RegisterImmediate => Operands::RegImm {
                reg: Register::from_code(upper >> 2),
                imm: 0,
            },
            Shape::RegisterAddress => Operands::RegAddr {
                reg: Register::from_code(upper >> 2),
                addr: 0,
            },
            Shape::JumpTarget => Operands::Target(0),
        }
    }
}

/// Find the descriptor for an opcode byte.
///
/// Literal opcodes are checked first, then sub-typed families, then the plain `SSDD` families.
pub fn lookup(byte: u8) -> Option<&'static Descriptor> {
    let by_layout = |pick: fn(&Layout) -> bool| {
        TABLE
            .iter()
            .find(|desc| pick(&desc.layout) && desc.matches(byte))
    };
    by_layout(|layout| matches!(layout, Layout::Literal(_)))
        .or_else(|| by_layout(|layout| matches!(layout, Layout::RegSub(_) | Layout::Cond(_))))
        .or_else(|| by_layout(|layout| matches!(layout, Layout::Pair)))
}

impl Mnemonic {
    pub fn descriptor(self) -> &'static Descriptor {
        &TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn shape(self) -> Shape {
        self.descriptor().shape
    }

    pub fn size(self, mode: AddressMode) -> u8 {
        self.descriptor().size(mode)
    }
}

impl FromStr for Mnemonic {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TABLE
            .iter()
            .find(|desc| desc.name.eq_ignore_ascii_case(s))
            .map(|desc| desc.mnemonic)
            .ok_or(())
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_ascii_uppercase())
    }
}

/// Operands of a single instruction. The variant always corresponds to the mnemonic's [`Shape`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operands {
    None,
    Reg(Register),
    Pair { dst: Register, src: Register },
    RegImm { reg: Register, imm: u8 },
    RegAddr { reg: Register, addr: u8 },
    Target(u16),
}

impl Operands {
    pub fn shape(&self) -> Shape {
        match self {
            Operands::None => Shape::None,
            Operands::Reg(_) => Shape::OneRegister,
            Operands::Pair { .. } => Shape::TwoRegisters,
            Operands::RegImm { .. } => Shape::RegisterImmediate,
            Operands::RegAddr { .. } => Shape::RegisterAddress,
            Operands::Target(_) => Shape::JumpTarget,
        }
    }

    /// Fill the immediate, RAM address or jump target from the bytes following the opcode.
    /// Missing bytes read as zero.
    pub fn with_payload(self, payload: &[u8], mode: AddressMode) -> Self {
        let byte = |i: usize| payload.get(i).copied().unwrap_or(0);
        match self {
            Operands::RegImm { reg, .. } => Operands::RegImm { reg, imm: byte(0) },
            Operands::RegAddr { reg, .. } => Operands::RegAddr {
                reg,
                addr: byte(0) & 0x0F,
            },
            Operands::Target(_) => match mode {
                AddressMode::Bit8 => Operands::Target(byte(0) as u16),
                AddressMode::Bit11 => Operands::Target(u16::from_be_bytes([byte(0), byte(1)])),
            },
            other => other,
        }
    }
}

/// A fully resolved instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Instruction {
    mnemonic: Mnemonic,
    operands: Operands,
}

impl Instruction {
    /// Pair a mnemonic with its operands. `None` if the operands do not fit the mnemonic.
    pub fn new(mnemonic: Mnemonic, operands: Operands) -> Option<Self> {
        (mnemonic.shape() == operands.shape()).then_some(Instruction { mnemonic, operands })
    }

    pub fn mnemonic(&self) -> Mnemonic {
        self.mnemonic
    }

    pub fn operands(&self) -> Operands {
        self.operands
    }

    pub fn size(&self, mode: AddressMode) -> u8 {
        self.mnemonic.size(mode)
    }

    /// First byte of the encoding.
    pub fn opcode(&self) -> u8 {
        let desc = self.mnemonic.descriptor();
        let reg = match self.operands {
            Operands::Reg(reg) | Operands::RegImm { reg, .. } | Operands::RegAddr { reg, .. } => {
                reg.code()
            }
            _ => 0,
        };
        match (desc.layout, self.operands) {
            (Layout::Literal(lit), _) => lit,
            (Layout::Pair, Operands::Pair { dst, src }) => {
                (src.code() << 6) | (dst.code() << 4) | desc.family
            }
            (Layout::RegSub(sub), _) => (reg << 6) | (sub << 4) | desc.family,
            (Layout::Cond(cond), _) => (cond << 4) | desc.family,
            // Unreachable through `Instruction::new`
            (Layout::Pair, _) => desc.family,
        }
    }

    /// Append the encoding to `out`. Writes exactly [`Instruction::size`] bytes.
    pub fn encode(&self, mode: AddressMode, out: &mut Vec<u8>) {
        out.push(self.opcode());
        match self.operands {
            Operands::RegImm { imm, .. } => out.push(imm),
            Operands::RegAddr { addr, .. } => out.push(addr & 0x0F),
            Operands::Target(target) => match mode {
                AddressMode::Bit8 => out.push(target as u8),
                AddressMode::Bit11 => out.extend_from_slice(&target.to_be_bytes()),
            },
            Operands::None | Operands::Reg(_) | Operands::Pair { .. } => (),
        }
    }

    pub fn to_bytes(&self, mode: AddressMode) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size(mode) as usize);
        self.encode(mode, &mut out);
        out
    }
}

/// Prints in source syntax accepted by the assembler.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        match self.operands {
            Operands::None => Ok(()),
            Operands::Reg(reg) => write!(f, " {reg}"),
            Operands::Pair { dst, src } => write!(f, " {dst} {src}"),
            Operands::RegImm { reg, imm } => write!(f, " {reg} 0x{imm:02X}"),
            Operands::RegAddr { reg, addr } => write!(f, " {reg} 0x{addr:X}"),
            Operands::Target(target) => write!(f, " 0x{target:04X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr(mnemonic: Mnemonic, operands: Operands) -> Instruction {
        Instruction::new(mnemonic, operands).unwrap()
    }

    #[test]
    fn table_follows_mnemonic_order() {
        for (i, desc) in TABLE.iter().enumerate() {
            assert_eq!(desc.mnemonic as usize, i, "{} out of place", desc.name);
            assert_eq!(desc.name.parse::<Mnemonic>(), Ok(desc.mnemonic));
        }
    }

    #[test]
    fn every_byte_matches_at_most_one_descriptor() {
        for byte in 0..=u8::MAX {
            let count = TABLE.iter().filter(|desc| desc.matches(byte)).count();
            match lookup(byte) {
                Some(desc) if matches!(desc.layout, Layout::Literal(_)) => {
                    assert_eq!(desc.family, byte)
                }
                Some(_) => assert_eq!(count, 1, "byte {byte:#04x}"),
                None => assert_eq!(count, 0, "byte {byte:#04x}"),
            }
        }
    }

    #[test]
    fn literal_opcodes() {
        assert_eq!(lookup(0x00).unwrap().mnemonic, Mnemonic::Nop);
        assert_eq!(lookup(0x10).unwrap().mnemonic, Mnemonic::Out);
        assert_eq!(lookup(0x20).unwrap().mnemonic, Mnemonic::Hlt);
        assert_eq!(lookup(0xFF).unwrap().mnemonic, Mnemonic::Rst);
        // Low nibble 0 outside the literals has no family
        assert!(lookup(0x30).is_none());
        assert!(lookup(0xF0).is_none());
    }

    #[test]
    fn sub_typed_families() {
        assert_eq!(lookup(0b1110_0011).unwrap().mnemonic, Mnemonic::Inc);
        assert_eq!(lookup(0b0111_0011).unwrap().mnemonic, Mnemonic::Dec);
        assert!(lookup(0b0000_0011).is_none());
        assert_eq!(lookup(0b0100_0100).unwrap().mnemonic, Mnemonic::Ldi);
        assert_eq!(lookup(0b0101_0100).unwrap().mnemonic, Mnemonic::Ldm);
        assert_eq!(lookup(0b0110_0100).unwrap().mnemonic, Mnemonic::Sav);
        assert!(lookup(0b0111_0100).is_none());
        assert_eq!(lookup(0b0110_0101).unwrap().mnemonic, Mnemonic::Jml);
        assert!(lookup(0b0111_0101).is_none());
        assert_eq!(lookup(0b1000_1010).unwrap().mnemonic, Mnemonic::Not);
        assert!(lookup(0b1001_1010).is_none());
        assert_eq!(lookup(0b1100_1100).unwrap().mnemonic, Mnemonic::Cmi);
    }

    #[test]
    fn encodes_register_pairs() {
        // ADD A B: src B (01), dst A (00)
        let add = instr(
            Mnemonic::Add,
            Operands::Pair {
                dst: Register::A,
                src: Register::B,
            },
        );
        assert_eq!(add.opcode(), 0b0100_0001);
        let mov = instr(
            Mnemonic::Mov,
            Operands::Pair {
                dst: Register::D,
                src: Register::C,
            },
        );
        assert_eq!(mov.opcode(), 0b1011_0110);
    }

    #[test]
    fn encodes_payloads() {
        let mode = AddressMode::Bit11;
        let ldi = instr(
            Mnemonic::Ldi,
            Operands::RegImm {
                reg: Register::C,
                imm: 0x7F,
            },
        );
        assert_eq!(ldi.to_bytes(mode), vec![0b1000_0100, 0x7F]);
        let sav = instr(
            Mnemonic::Sav,
            Operands::RegAddr {
                reg: Register::B,
                addr: 0x0E,
            },
        );
        assert_eq!(sav.to_bytes(mode), vec![0b0110_0100, 0x0E]);
        let jmp = instr(Mnemonic::Jnz, Operands::Target(0x0341));
        assert_eq!(jmp.to_bytes(mode), vec![0x25, 0x03, 0x41]);
        assert_eq!(jmp.to_bytes(AddressMode::Bit8), vec![0x25, 0x41]);
    }

    #[test]
    fn payload_fill() {
        let target = Operands::Target(0).with_payload(&[0x03, 0x41], AddressMode::Bit11);
        assert_eq!(target, Operands::Target(0x0341));
        let target = Operands::Target(0).with_payload(&[0x41], AddressMode::Bit8);
        assert_eq!(target, Operands::Target(0x41));
        // Truncated payload reads as zero
        let target = Operands::Target(0).with_payload(&[0x03], AddressMode::Bit11);
        assert_eq!(target, Operands::Target(0x0300));
    }

    #[test]
    fn rejects_mismatched_operands() {
        assert!(Instruction::new(Mnemonic::Add, Operands::Reg(Register::A)).is_none());
        assert!(Instruction::new(Mnemonic::Hlt, Operands::Target(3)).is_none());
    }

    #[test]
    fn display_is_source_syntax() {
        let ldi = instr(
            Mnemonic::Ldi,
            Operands::RegImm {
                reg: Register::A,
                imm: 5,
            },
        );
        assert_eq!(ldi.to_string(), "LDI A 0x05");
        let jmp = instr(Mnemonic::Jmp, Operands::Target(0x341));
        assert_eq!(jmp.to_string(), "JMP 0x0341");
        let or = instr(
            Mnemonic::Or,
            Operands::Pair {
                dst: Register::B,
                src: Register::D,
            },
        );
        assert_eq!(or.to_string(), "OR B D");
    }
}
