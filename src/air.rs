use crate::{
    error::{CompileError, ErrorKind},
    image::{Image, Listing, ListingLine},
    isa::{AddressMode, Mnemonic, PAD_BYTE, ROM_SIZE},
    parser::{self, LineKind, OperandEnv, SourceLine, Word},
    symbol::SymbolTable,
};

/// Knobs for a single assembly run.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct AsmOptions {
    /// Width of jump targets
    pub address_mode: AddressMode,
    /// Accept 0..=255 only instead of -128..=255
    pub unsigned_immediates: bool,
    /// Fill the image with `0xFF` up to the full ROM size
    pub pad_to_full_rom: bool,
}

/// Assembly context, holds everything that lives for a single run.
///
/// Pass one assigns addresses and fills the symbol table, pass two emits bytes using it.
/// Both passes start from address zero, so each can be run on its own.
pub struct Air {
    options: AsmOptions,
    lines: Vec<SourceLine>,
    symbols: SymbolTable,
    /// Running address, wider than ROM so overflow is detectable
    addr: u32,
    output: Vec<u8>,
    listing: Listing,
}

impl Air {
    pub fn new(src: &str, options: AsmOptions) -> Result<Self, CompileError> {
        Ok(Air {
            options,
            lines: parser::preprocess(src)?,
            symbols: SymbolTable::new(),
            addr: 0,
            output: Vec::new(),
            listing: Listing::default(),
        })
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Assign an address to every line and record labels.
    pub fn first_pass(&mut self) -> Result<(), CompileError> {
        let mode = self.options.address_mode;
        self.addr = 0;
        self.symbols = SymbolTable::new();

        for line in &self.lines {
            match &line.kind {
                LineKind::Blank => (),
                LineKind::Label(label) => {
                    if let Err(prev) = self.symbols.insert(&label.text, self.addr as u16) {
                        return Err(line.error(
                            label.span,
                            ErrorKind::DuplicateLabel {
                                name: label.text.clone(),
                                addr: prev,
                            },
                        ));
                    }
                }
                LineKind::Instr { mnemonic, .. } => {
                    let mnemonic_kind = lookup_mnemonic(line, mnemonic)?;
                    self.addr += mnemonic_kind.size(mode) as u32;
                    if self.addr > ROM_SIZE as u32 {
                        return Err(line.error(line.span, ErrorKind::ProgramTooLarge(self.addr)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Encode every instruction, resolving labels from the first pass.
    pub fn second_pass(&mut self) -> Result<(), CompileError> {
        let mode = self.options.address_mode;
        let env = OperandEnv {
            symbols: &self.symbols,
            mode,
            unsigned: self.options.unsigned_immediates,
        };
        self.addr = 0;
        self.output.clear();
        self.listing = Listing::default();

        for line in &self.lines {
            match &line.kind {
                LineKind::Blank => (),
                LineKind::Label(_) => self.listing.push(ListingLine {
                    line: line.number,
                    addr: self.addr as u16,
                    bytes: Vec::new(),
                    text: line.text.clone(),
                }),
                LineKind::Instr { mnemonic, operands } => {
                    let mnemonic = lookup_mnemonic(line, mnemonic)?;
                    let instr = parser::parse_instr(line, mnemonic, operands, &env)?;
                    let bytes = instr.to_bytes(mode);
                    if self.addr as usize + bytes.len() > ROM_SIZE {
                        let size = self.addr + bytes.len() as u32;
                        return Err(line.error(line.span, ErrorKind::ProgramTooLarge(size)));
                    }
                    self.listing.push(ListingLine {
                        line: line.number,
                        addr: self.addr as u16,
                        bytes: bytes.clone(),
                        text: line.text.clone(),
                    });
                    self.addr += bytes.len() as u32;
                    self.output.extend(bytes);
                }
            }
        }
        Ok(())
    }

    /// Finish the run. Call after [`Air::second_pass`].
    pub fn into_image(self) -> Image {
        let mut bytes = self.output;
        if self.options.pad_to_full_rom {
            bytes.resize(ROM_SIZE, PAD_BYTE);
        }
        Image::new(bytes, self.listing, self.symbols)
    }
}

fn lookup_mnemonic(line: &SourceLine, word: &Word) -> Result<Mnemonic, CompileError> {
    word.text
        .parse()
        .map_err(|_| line.error(word.span, ErrorKind::UnknownMnemonic(word.text.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn air(src: &str) -> Air {
        Air::new(src, AsmOptions::default()).unwrap()
    }

    #[test]
    fn first_pass_addresses_labels() {
        let mut air = air("start:\nldi a 1\nloop:\ninc a\njmp loop\nend:\nhlt");
        air.first_pass().unwrap();
        assert_eq!(air.symbols().get("start"), Some(0));
        assert_eq!(air.symbols().get("LOOP"), Some(2));
        assert_eq!(air.symbols().get("end"), Some(6));
        assert_eq!(air.symbols().len(), 3);
    }

    #[test]
    fn first_pass_fails_on_unknown_mnemonic() {
        let mut air = air("nop\nfoo a\njmp nowhere");
        let err = air.first_pass().unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, ErrorKind::UnknownMnemonic("FOO".into()));
    }

    #[test]
    fn duplicate_label() {
        let mut air = air("x:\nnop\nX:\nhlt");
        let err = air.first_pass().unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(
            err.kind,
            ErrorKind::DuplicateLabel {
                name: "X".into(),
                addr: 0
            }
        );
    }

    #[test]
    fn passes_are_independent() {
        let mut air = air("jmp end\nnop\nend:\nhlt");
        air.first_pass().unwrap();
        air.second_pass().unwrap();
        air.second_pass().unwrap();
        let image = air.into_image();
        assert_eq!(image.bytes(), &[0x05, 0x00, 0x04, 0x00, 0x20]);
    }

    #[test]
    fn eight_bit_jumps() {
        let options = AsmOptions {
            address_mode: AddressMode::Bit8,
            ..Default::default()
        };
        let mut air = Air::new("jmp end\nend:\nhlt", options).unwrap();
        air.first_pass().unwrap();
        air.second_pass().unwrap();
        assert_eq!(air.into_image().bytes(), &[0x05, 0x02, 0x20]);
    }

    #[test]
    fn too_large() {
        let src = "jmp 0\n".repeat(683);
        let mut air = air(&src);
        let err = air.first_pass().unwrap_err();
        assert_eq!(err.line, 683);
        assert_eq!(err.kind, ErrorKind::ProgramTooLarge(2049));
    }

    #[test]
    fn listing_follows_source() {
        let mut air = air("; header\nloop:\n  ldi b, -1 ; load\n");
        air.first_pass().unwrap();
        air.second_pass().unwrap();
        let image = air.into_image();
        let lines = image.listing().lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "LOOP:");
        assert!(lines[0].bytes.is_empty());
        assert_eq!(lines[1].line, 3);
        assert_eq!(lines[1].bytes, vec![0x44, 0xFF]);
        assert_eq!(lines[1].text, "LDI B -1");
    }

    #[test]
    fn padding() {
        let options = AsmOptions {
            pad_to_full_rom: true,
            ..Default::default()
        };
        let mut air = Air::new("hlt", options).unwrap();
        air.first_pass().unwrap();
        air.second_pass().unwrap();
        let image = air.into_image();
        assert_eq!(image.bytes().len(), ROM_SIZE);
        assert_eq!(image.bytes()[0], 0x20);
        assert!(image.bytes()[1..].iter().all(|byte| *byte == PAD_BYTE));
    }
}
