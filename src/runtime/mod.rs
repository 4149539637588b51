//! Fetch, decode and execute.
//!
//! The [`Cpu`] owns its registers, ALU and memory. Nothing here fails loudly: unknown opcodes are
//! skipped and running off the end of ROM halts, both reported through [`Cpu::step`] returning
//! `false` and an optional diagnostic line.

use crate::{
    decoder::{Decoded, Decoder},
    error::LoadError,
    isa::{AddressMode, Instruction, Mnemonic, Operands, RAM_SIZE, ROM_SIZE},
    symbol::Register,
};

mod alu;
mod memory;
mod registers;

pub use alu::{Alu, Flags};
pub use memory::Memory;
pub use registers::RegisterFile;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    /// Constructed or reset, nothing executed yet
    Ready,
    Running,
    /// Terminal until reset
    Halted,
}

/// Program counter update after executing an instruction.
enum Next {
    Advance,
    Goto(u16),
    Stay,
    /// CPU was reset, counters stay cleared
    Restart,
}

/// Snapshot of everything observable about a [`Cpu`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CpuState {
    /// A, B, C, D
    pub registers: [u8; 4],
    pub pc: u16,
    pub ir: u8,
    pub status: Status,
    pub halted: bool,
    pub flags: Flags,
    pub ram: [u8; RAM_SIZE],
    /// Display latch written by `OUT`
    pub output: u8,
    pub output_enabled: bool,
    pub instruction_count: u64,
    pub cycle_count: u64,
}

/// Represents complete machine state during runtime.
#[derive(Clone, Debug)]
pub struct Cpu {
    regs: RegisterFile,
    alu: Alu,
    mem: Memory,
    decoder: Decoder,
    /// Program counter
    pc: u16,
    /// Instruction register, last fetched opcode
    ir: u8,
    status: Status,
    output: u8,
    output_enabled: bool,
    instruction_count: u64,
    cycle_count: u64,
    last_decoded: Option<Decoded>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// CPU for images assembled with 11-bit jump targets.
    pub fn new() -> Self {
        Self::with_mode(AddressMode::default())
    }

    /// CPU decoding jumps for the given address mode.
    pub fn with_mode(mode: AddressMode) -> Self {
        Cpu {
            regs: RegisterFile::new(),
            alu: Alu::new(),
            mem: Memory::new(),
            decoder: Decoder::new(mode),
            pc: 0,
            ir: 0,
            status: Status::Ready,
            output: 0,
            output_enabled: false,
            instruction_count: 0,
            cycle_count: 0,
            last_decoded: None,
        }
    }

    pub fn mode(&self) -> AddressMode {
        self.decoder.mode()
    }

    /// Copy a program into ROM at `start` and reset.
    pub fn load_program(&mut self, bytes: &[u8], start: usize) -> Result<(), LoadError> {
        self.mem.load_rom(bytes, start)?;
        self.reset();
        Ok(())
    }

    /// Clear registers, flags, RAM, output and counters. ROM is kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.alu.reset();
        self.mem.reset_ram();
        self.pc = 0;
        self.ir = 0;
        self.status = Status::Ready;
        self.output = 0;
        self.output_enabled = false;
        self.instruction_count = 0;
        self.cycle_count = 0;
        self.last_decoded = None;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_halted(&self) -> bool {
        self.status == Status::Halted
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn flags(&self) -> Flags {
        self.alu.flags()
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    /// Output latch, once an `OUT` has executed.
    pub fn output(&self) -> Option<u8> {
        self.output_enabled.then_some(self.output)
    }

    /// Instruction handled by the latest step, unknown opcodes included.
    pub fn last_decoded(&self) -> Option<Decoded> {
        self.last_decoded
    }

    pub fn state(&self) -> CpuState {
        CpuState {
            registers: self.regs.snapshot(),
            pc: self.pc,
            ir: self.ir,
            status: self.status,
            halted: self.is_halted(),
            flags: self.alu.flags(),
            ram: self.mem.ram(),
            output: self.output,
            output_enabled: self.output_enabled,
            instruction_count: self.instruction_count,
            cycle_count: self.cycle_count,
        }
    }

    /// Execute a single instruction. Returns `false` if nothing was executed: the CPU is halted,
    /// the program counter ran off ROM, or the opcode is unknown.
    pub fn step(&mut self) -> bool {
        if self.is_halted() {
            return false;
        }
        let pc = self.pc as usize;
        let Some(opcode) = self.mem.read_rom(pc) else {
            dprintln!(Trace, "Fetch at 0x{pc:04X} is past the end of ROM, halting.");
            self.status = Status::Halted;
            return false;
        };
        self.status = Status::Running;
        self.ir = opcode;

        let decoded = self.decoder.decode(opcode);
        let end = pc + decoded.size() as usize;
        let payload = &self.mem.rom()[(pc + 1).min(ROM_SIZE)..end.min(ROM_SIZE)];
        let decoded = self.decoder.complete(decoded, payload);
        self.last_decoded = Some(decoded);

        let instr = match decoded {
            Decoded::Known { instr, .. } => instr,
            Decoded::Unknown(byte) => {
                dprintln!(Trace, "Unknown opcode 0x{byte:02X} at 0x{pc:04X}, skipping.");
                self.pc += 1;
                return false;
            }
        };
        dprintln!(
            Trace,
            "{pc:04X}  {:<12} {}  {}",
            instr.to_string(),
            self.regs,
            self.alu.flags()
        );

        let mnemonic = instr.mnemonic();
        match Self::OP_TABLE[mnemonic as usize](self, instr) {
            Next::Advance => self.pc = end as u16,
            Next::Goto(target) => self.pc = target,
            Next::Stay => (),
            Next::Restart => return true,
        }
        self.instruction_count += 1;
        self.cycle_count += mnemonic.descriptor().cycles as u64;

        if end > ROM_SIZE {
            dprintln!(
                Trace,
                "Instruction at 0x{pc:04X} is cut off by the end of ROM, halting."
            );
            self.status = Status::Halted;
        }
        true
    }

    /// Step until halted, a step fails, or `max` instructions ran. Returns the number executed.
    pub fn run(&mut self, max: usize) -> usize {
        let mut executed = 0;
        while executed < max && !self.is_halted() {
            if !self.step() {
                break;
            }
            executed += 1;
        }
        executed
    }

    /// Indexed by [`Mnemonic`] discriminant.
    const OP_TABLE: [fn(&mut Cpu, Instruction) -> Next; 25] = [
        Self::nop,  // NOP
        Self::out,  // OUT
        Self::hlt,  // HLT
        Self::rst,  // RST
        Self::add,  // ADD
        Self::sub,  // SUB
        Self::inc,  // INC
        Self::dec,  // DEC
        Self::ldi,  // LDI
        Self::ldm,  // LDM
        Self::sav,  // SAV
        Self::jump, // JMP
        Self::jump, // JMZ
        Self::jump, // JNZ
        Self::jump, // JMC
        Self::jump, // JME
        Self::jump, // JNG
        Self::jump, // JML
        Self::mov,  // MOV
        Self::and,  // AND
        Self::or,   // OR
        Self::xor,  // XOR
        Self::not,  // NOT
        Self::cmp,  // CMP
        Self::cmi,  // CMI
    ];

    /// `dst = op(dst, src)`
    fn pair_op(&mut self, instr: Instruction, op: fn(&mut Alu, u8, u8) -> u8) -> Next {
        if let Operands::Pair { dst, src } = instr.operands() {
            let result = op(&mut self.alu, self.regs.read(dst), self.regs.read(src));
            self.regs.write(dst, result);
        }
        Next::Advance
    }

    /// `reg = op(reg)`
    fn reg_op(&mut self, instr: Instruction, op: fn(&mut Alu, u8) -> u8) -> Next {
        if let Operands::Reg(reg) = instr.operands() {
            let result = op(&mut self.alu, self.regs.read(reg));
            self.regs.write(reg, result);
        }
        Next::Advance
    }

    fn nop(&mut self, _: Instruction) -> Next {
        Next::Advance
    }

    fn out(&mut self, _: Instruction) -> Next {
        self.output = self.regs.read(Register::A);
        self.output_enabled = true;
        Next::Advance
    }

    fn hlt(&mut self, _: Instruction) -> Next {
        self.status = Status::Halted;
        Next::Stay
    }

    fn rst(&mut self, _: Instruction) -> Next {
        self.reset();
        Next::Restart
    }

    fn add(&mut self, instr: Instruction) -> Next {
        self.pair_op(instr, |alu, a, b| alu.add(a, b, false).0)
    }

    fn sub(&mut self, instr: Instruction) -> Next {
        self.pair_op(instr, |alu, a, b| alu.subtract(a, b, false).0)
    }

    fn inc(&mut self, instr: Instruction) -> Next {
        self.reg_op(instr, Alu::increment)
    }

    fn dec(&mut self, instr: Instruction) -> Next {
        self.reg_op(instr, Alu::decrement)
    }

    fn ldi(&mut self, instr: Instruction) -> Next {
        if let Operands::RegImm { reg, imm } = instr.operands() {
            self.regs.write(reg, imm);
        }
        Next::Advance
    }

    fn ldm(&mut self, instr: Instruction) -> Next {
        if let Operands::RegAddr { reg, addr } = instr.operands() {
            self.regs.write(reg, self.mem.read_ram(addr));
        }
        Next::Advance
    }

    fn sav(&mut self, instr: Instruction) -> Next {
        if let Operands::RegAddr { reg, addr } = instr.operands() {
            self.mem.write_ram(addr, self.regs.read(reg));
        }
        Next::Advance
    }

    fn jump(&mut self, instr: Instruction) -> Next {
        match instr.operands() {
            Operands::Target(target) if jump_taken(instr.mnemonic(), self.alu.flags()) => {
                dprintln!(Trace, "      taken -> 0x{target:04X}");
                Next::Goto(target)
            }
            _ => Next::Advance,
        }
    }

    fn mov(&mut self, instr: Instruction) -> Next {
        if let Operands::Pair { dst, src } = instr.operands() {
            self.regs.write(dst, self.regs.read(src));
        }
        Next::Advance
    }

    fn and(&mut self, instr: Instruction) -> Next {
        self.pair_op(instr, Alu::and)
    }

    fn or(&mut self, instr: Instruction) -> Next {
        self.pair_op(instr, Alu::or)
    }

    fn xor(&mut self, instr: Instruction) -> Next {
        self.pair_op(instr, Alu::xor)
    }

    fn not(&mut self, instr: Instruction) -> Next {
        self.reg_op(instr, Alu::not)
    }

    fn cmp(&mut self, instr: Instruction) -> Next {
        if let Operands::Pair { dst, src } = instr.operands() {
            self.alu.compare(self.regs.read(dst), self.regs.read(src));
        }
        Next::Advance
    }

    fn cmi(&mut self, instr: Instruction) -> Next {
        if let Operands::RegImm { reg, imm } = instr.operands() {
            self.alu.compare(self.regs.read(reg), imm);
        }
        Next::Advance
    }
}

/// Condition of a jump mnemonic against the current flags. `false` for anything else.
pub fn jump_taken(mnemonic: Mnemonic, flags: Flags) -> bool {
    match mnemonic {
        Mnemonic::Jmp => true,
        Mnemonic::Jmz | Mnemonic::Jme => flags.zero,
        Mnemonic::Jnz => !flags.zero,
        Mnemonic::Jmc => flags.carry,
        // Not greater
        Mnemonic::Jng => flags.zero || flags.negative,
        // Strictly less
        Mnemonic::Jml => flags.negative && !flags.zero,
        _ => false,
    }
}
