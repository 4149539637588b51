use crate::{
    error::{CompileError, ErrorKind},
    isa::{AddressMode, Instruction, Mnemonic, Operands, Shape},
    lexer::{is_ident, tokenize_line, LTokenKind},
    symbol::{Register, Span, SrcOffset, SymbolTable},
};

/// Upper-cased word of a source line and where it came from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Word {
    pub text: String,
    pub span: Span,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LineKind {
    Blank,
    Label(Word),
    Instr { mnemonic: Word, operands: Vec<Word> },
}

/// Single source line after comments are stripped and case is folded.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SourceLine {
    /// 1-based
    pub number: usize,
    /// Line as written
    pub raw: String,
    /// Whole line within the source file
    pub span: Span,
    /// Trimmed, upper-cased and without comment
    pub text: String,
    pub kind: LineKind,
}

impl SourceLine {
    pub fn error(&self, span: Span, kind: ErrorKind) -> CompileError {
        CompileError::new(self.number, self.raw.clone(), span, kind)
    }

    /// Span covering every word on the line.
    fn code_span(&self) -> Span {
        match &self.kind {
            LineKind::Blank => self.span,
            LineKind::Label(word) => word.span,
            LineKind::Instr { mnemonic, operands } => {
                let end = operands.last().unwrap_or(mnemonic).span.end();
                Span::new(SrcOffset(mnemonic.span.offs()), end - mnemonic.span.offs())
            }
        }
    }
}

/// Split source into lines, drop comments and fold case.
///
/// A line holding only `IDENT:` declares a label. A colon anywhere else is an error.
pub fn preprocess(src: &str) -> Result<Vec<SourceLine>, CompileError> {
    let mut lines = Vec::new();
    let mut offs = 0;
    for (i, raw) in src.split('\n').enumerate() {
        let line_offs = offs;
        offs += raw.len() + 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);

        let toks = tokenize_line(raw, line_offs);
        let word = |idx: usize| {
            let span = toks[idx].span;
            Word {
                text: src[span.offs()..span.end()].to_ascii_uppercase(),
                span,
            }
        };
        let span = Span::new(SrcOffset(line_offs), raw.len());
        let kinds: Vec<LTokenKind> = toks.iter().map(|tok| tok.kind).collect();

        let kind = match kinds.as_slice() {
            [] => LineKind::Blank,
            [LTokenKind::Word, LTokenKind::Colon] => {
                let label = word(0);
                if !is_ident(&label.text) {
                    return Err(CompileError::new(
                        i + 1,
                        raw,
                        label.span,
                        ErrorKind::InvalidLabel(label.text),
                    ));
                }
                LineKind::Label(label)
            }
            _ => {
                if let Some(colon) = kinds.iter().position(|kind| *kind == LTokenKind::Colon) {
                    let (span, name) = match colon {
                        0 => (toks[0].span, ":".to_string()),
                        n => (toks[n - 1].span, word(n - 1).text),
                    };
                    return Err(CompileError::new(
                        i + 1,
                        raw,
                        span,
                        ErrorKind::InvalidLabel(name),
                    ));
                }
                LineKind::Instr {
                    mnemonic: word(0),
                    operands: (1..toks.len()).map(word).collect(),
                }
            }
        };

        let text = match &kind {
            LineKind::Blank => String::new(),
            LineKind::Label(label) => format!("{}:", label.text),
            LineKind::Instr { mnemonic, operands } => {
                let mut text = mnemonic.text.clone();
                for operand in operands {
                    text.push(' ');
                    text.push_str(&operand.text);
                }
                text
            }
        };

        lines.push(SourceLine {
            number: i + 1,
            raw: raw.to_string(),
            span,
            text,
            kind,
        });
    }
    Ok(lines)
}

/// Parse a numeric literal: decimal first, then hex (`0x`, `$`), then binary (`0b`, `%`).
/// A leading `-` negates any form.
pub fn parse_number(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if digits.is_empty()
        || !digits
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '$' || c == '%')
    {
        return None;
    }
    let radix = |prefixes: &[&str], radix: u32| {
        prefixes
            .iter()
            .find_map(|prefix| {
                digits
                    .get(..prefix.len())
                    .filter(|head| head.eq_ignore_ascii_case(prefix))
                    .map(|_| &digits[prefix.len()..])
            })
            .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_digit(radix)))
            .and_then(|rest| i64::from_str_radix(rest, radix).ok())
    };
    let value = digits
        .parse::<i64>()
        .ok()
        .or_else(|| radix(&["0x", "$"], 16))
        .or_else(|| radix(&["0b", "%"], 2))?;
    Some(if negative { -value } else { value })
}

/// Fit a literal into a byte. Signed mode stores negatives as two's complement.
pub fn fit_immediate(value: i64, unsigned: bool) -> Option<u8> {
    let range = if unsigned { 0..=255 } else { -128..=255 };
    if !range.contains(&value) {
        return None;
    }
    let value = if value < 0 { value + 256 } else { value };
    Some(value as u8)
}

/// Everything operand resolution needs to know about the current run.
pub struct OperandEnv<'a> {
    pub symbols: &'a SymbolTable,
    pub mode: AddressMode,
    pub unsigned: bool,
}

/// Resolve the operands of an instruction line into an [`Instruction`].
pub fn parse_instr(
    line: &SourceLine,
    mnemonic: Mnemonic,
    operands: &[Word],
    env: &OperandEnv,
) -> Result<Instruction, CompileError> {
    let shape = mnemonic.shape();
    if operands.len() != shape.operand_count() {
        return Err(line.error(
            line.code_span(),
            ErrorKind::OperandCount {
                mnemonic,
                expected: shape.operand_count(),
                found: operands.len(),
            },
        ));
    }

    let parsed = match shape {
        Shape::None => Operands::None,
        Shape::OneRegister => Operands::Reg(expect_reg(line, &operands[0])?),
        Shape::TwoRegisters => Operands::Pair {
            dst: expect_reg(line, &operands[0])?,
            src: expect_reg(line, &operands[1])?,
        },
        Shape::RegisterImmediate => Operands::RegImm {
            reg: expect_reg(line, &operands[0])?,
            imm: expect_imm(line, &operands[1], env.unsigned)?,
        },
        Shape::RegisterAddress => Operands::RegAddr {
            reg: expect_reg(line, &operands[0])?,
            addr: expect_ram_addr(line, &operands[1])?,
        },
        Shape::JumpTarget => Operands::Target(expect_target(line, &operands[0], env)?),
    };

    // Shapes line up by construction
    Instruction::new(mnemonic, parsed).ok_or_else(|| {
        line.error(
            line.code_span(),
            ErrorKind::MalformedOperand(line.text.clone()),
        )
    })
}

fn expect_reg(line: &SourceLine, word: &Word) -> Result<Register, CompileError> {
    word.text
        .parse()
        .map_err(|_| line.error(word.span, ErrorKind::InvalidRegister(word.text.clone())))
}

fn expect_number(line: &SourceLine, word: &Word) -> Result<i64, CompileError> {
    parse_number(&word.text)
        .ok_or_else(|| line.error(word.span, ErrorKind::MalformedOperand(word.text.clone())))
}

fn expect_imm(line: &SourceLine, word: &Word, unsigned: bool) -> Result<u8, CompileError> {
    let value = expect_number(line, word)?;
    fit_immediate(value, unsigned)
        .ok_or_else(|| line.error(word.span, ErrorKind::ImmediateOutOfRange { value, unsigned }))
}

fn expect_ram_addr(line: &SourceLine, word: &Word) -> Result<u8, CompileError> {
    let value = expect_number(line, word)?;
    if !(0..crate::isa::RAM_SIZE as i64).contains(&value) {
        return Err(line.error(word.span, ErrorKind::RamAddressOutOfRange(value)));
    }
    Ok(value as u8)
}

fn expect_target(line: &SourceLine, word: &Word, env: &OperandEnv) -> Result<u16, CompileError> {
    let limit = env.mode.limit();
    let value = match parse_number(&word.text) {
        Some(value) => value,
        None if is_ident(&word.text) => match env.symbols.get(&word.text) {
            Some(addr) => addr as i64,
            None => {
                return Err(line.error(word.span, ErrorKind::UndefinedLabel(word.text.clone())))
            }
        },
        None => return Err(line.error(word.span, ErrorKind::MalformedOperand(word.text.clone()))),
    };
    if !(0..limit as i64).contains(&value) {
        return Err(line.error(word.span, ErrorKind::RomAddressOutOfRange { value, limit }));
    }
    Ok(value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr_line(src: &str) -> (SourceLine, Mnemonic, Vec<Word>) {
        let line = preprocess(src).unwrap().remove(0);
        let LineKind::Instr { mnemonic, operands } = line.kind.clone() else {
            panic!("not an instruction line: {src}");
        };
        (line, mnemonic.text.parse().unwrap(), operands)
    }

    fn parse(src: &str, unsigned: bool) -> Result<Instruction, CompileError> {
        let symbols = SymbolTable::new();
        let env = OperandEnv {
            symbols: &symbols,
            mode: AddressMode::Bit11,
            unsigned,
        };
        let (line, mnemonic, operands) = instr_line(src);
        parse_instr(&line, mnemonic, &operands, &env)
    }

    #[test]
    fn preprocess_folds_case_and_strips_comments() {
        let lines = preprocess("  ldi a, 5 ; five\n\nloop:\r\n jmp loop @ again").unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].text, "LDI A 5");
        assert_eq!(lines[0].raw, "  ldi a, 5 ; five");
        assert_eq!(lines[1].kind, LineKind::Blank);
        assert!(matches!(&lines[2].kind, LineKind::Label(word) if word.text == "LOOP"));
        assert_eq!(lines[2].text, "LOOP:");
        assert_eq!(lines[3].text, "JMP LOOP");
        assert_eq!(lines[3].number, 4);
    }

    #[test]
    fn preprocess_spans_point_into_source() {
        let src = "nop\n  add a b";
        let lines = preprocess(src).unwrap();
        let LineKind::Instr { operands, .. } = &lines[1].kind else {
            panic!("expected instruction");
        };
        let span = operands[1].span;
        assert_eq!(&src[span.offs()..span.end()], "b");
    }

    #[test]
    fn preprocess_rejects_bad_labels() {
        let err = preprocess("nop\n1st:").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, ErrorKind::InvalidLabel("1ST".into()));

        let err = preprocess("loop: add a b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidLabel("LOOP".into()));

        let err = preprocess(": nop").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidLabel(":".into()));
    }

    #[test]
    fn number_forms() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("-1"), Some(-1));
        assert_eq!(parse_number("0x1F"), Some(0x1F));
        assert_eq!(parse_number("0X1f"), Some(0x1F));
        assert_eq!(parse_number("$ff"), Some(0xFF));
        assert_eq!(parse_number("0b101"), Some(5));
        assert_eq!(parse_number("%11"), Some(3));
        assert_eq!(parse_number("-0x10"), Some(-16));
        assert_eq!(parse_number("LOOP"), None);
        assert_eq!(parse_number("FF"), None);
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number("0b102"), None);
        assert_eq!(parse_number("--1"), None);
        assert_eq!(parse_number("+1"), None);
    }

    #[test]
    fn immediate_ranges() {
        assert_eq!(fit_immediate(-1, false), Some(0xFF));
        assert_eq!(fit_immediate(127, false), Some(0x7F));
        assert_eq!(fit_immediate(-128, false), Some(0x80));
        assert_eq!(fit_immediate(255, false), Some(0xFF));
        assert_eq!(fit_immediate(-129, false), None);
        assert_eq!(fit_immediate(256, false), None);
        assert_eq!(fit_immediate(-1, true), None);
        assert_eq!(fit_immediate(255, true), Some(0xFF));
    }

    #[test]
    fn parses_each_shape() {
        let nop = parse("NOP", false).unwrap();
        assert_eq!(nop.operands(), Operands::None);
        let inc = parse("inc d", false).unwrap();
        assert_eq!(inc.operands(), Operands::Reg(Register::D));
        let sub = parse("sub c, a", false).unwrap();
        assert_eq!(
            sub.operands(),
            Operands::Pair {
                dst: Register::C,
                src: Register::A
            }
        );
        let cmi = parse("cmi b -2", false).unwrap();
        assert_eq!(
            cmi.operands(),
            Operands::RegImm {
                reg: Register::B,
                imm: 0xFE
            }
        );
        let ldm = parse("ldm a 0xF", false).unwrap();
        assert_eq!(
            ldm.operands(),
            Operands::RegAddr {
                reg: Register::A,
                addr: 15
            }
        );
        let jmp = parse("jmp 0x341", false).unwrap();
        assert_eq!(jmp.operands(), Operands::Target(0x341));
    }

    #[test]
    fn operand_errors() {
        let err = parse("add a", false).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::OperandCount {
                expected: 2,
                found: 1,
                ..
            }
        ));
        let err = parse("inc e", false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRegister("E".into()));
        let err = parse("ldi a five", false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOperand("FIVE".into()));
        let err = parse("ldi a -1", true).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::ImmediateOutOfRange {
                value: -1,
                unsigned: true
            }
        );
        let err = parse("sav a 16", false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RamAddressOutOfRange(16));
        let err = parse("jmp 2048", false).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::RomAddressOutOfRange {
                value: 2048,
                limit: 2048
            }
        );
        let err = parse("jmp nowhere", false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedLabel("NOWHERE".into()));
        let err = parse("jmp 1x", false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOperand("1X".into()));
    }
}
