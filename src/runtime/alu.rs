use std::fmt;

/// Status flags of the most recent ALU result.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Flags {
    pub zero: bool,
    /// Carry out of bit 7, or borrow for subtraction
    pub carry: bool,
    /// Bit 7 of the result, for logic results too
    pub negative: bool,
}

impl Flags {
    fn from_result(result: u8, carry: bool) -> Self {
        Flags {
            zero: result == 0,
            carry,
            negative: result & 0x80 != 0,
        }
    }
}

/// Prints as `ZCN`, with `-` for each clear flag.
impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, ch: char| if set { ch } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(self.zero, 'Z'),
            flag(self.carry, 'C'),
            flag(self.negative, 'N')
        )
    }
}

/// 8-bit arithmetic and logic. Every operation replaces all three flags.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Alu {
    flags: Flags,
}

impl Alu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn reset(&mut self) {
        self.flags = Flags::default();
    }

    fn update(&mut self, result: u8, carry: bool) -> u8 {
        self.flags = Flags::from_result(result, carry);
        result
    }

    /// 9-bit sum. Returns the low byte and the carry out.
    pub fn add(&mut self, a: u8, b: u8, carry_in: bool) -> (u8, bool) {
        let sum = a as u16 + b as u16 + carry_in as u16;
        let carry = sum > 0xFF;
        (self.update(sum as u8, carry), carry)
    }

    /// `a - b - borrow_in`, wrapped. Returns the result and the borrow out.
    pub fn subtract(&mut self, a: u8, b: u8, borrow_in: bool) -> (u8, bool) {
        let diff = a as i16 - b as i16 - borrow_in as i16;
        let borrow = diff < 0;
        let result = if borrow { diff + 256 } else { diff };
        (self.update(result as u8, borrow), borrow)
    }

    pub fn increment(&mut self, value: u8) -> u8 {
        self.add(value, 1, false).0
    }

    pub fn decrement(&mut self, value: u8) -> u8 {
        self.subtract(value, 1, false).0
    }

    pub fn and(&mut self, a: u8, b: u8) -> u8 {
        self.update(a & b, false)
    }

    pub fn or(&mut self, a: u8, b: u8) -> u8 {
        self.update(a | b, false)
    }

    pub fn xor(&mut self, a: u8, b: u8) -> u8 {
        self.update(a ^ b, false)
    }

    pub fn not(&mut self, value: u8) -> u8 {
        self.update(!value, false)
    }

    /// Subtract for the flags only.
    pub fn compare(&mut self, a: u8, b: u8) {
        self.subtract(a, b, false);
    }
}
