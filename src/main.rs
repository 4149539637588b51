use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, NamedSource, Result};

use nibbler::{AddressMode, AsmOptions, Cpu, Decoder, Image, Interpretation, Mnemonic, Output};

/// Nibbler assembles, disassembles and runs programs for a nibble-encoded 8-bit computer.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` or `.bin` file to run
    path: Option<PathBuf>,
}

/// Flags shared by every command that reads source or images.
#[derive(clap::Args, Clone, Copy)]
struct AsmArgs {
    /// Use single byte jump targets, limiting programs to 256 bytes
    #[arg(long)]
    eight_bit: bool,
    /// Treat immediates and output as unsigned (0 to 255)
    #[arg(short, long)]
    unsigned: bool,
}

impl AsmArgs {
    fn mode(&self) -> AddressMode {
        if self.eight_bit {
            AddressMode::Bit8
        } else {
            AddressMode::Bit11
        }
    }

    fn interpretation(&self) -> Interpretation {
        if self.unsigned {
            Interpretation::Unsigned
        } else {
            Interpretation::Signed
        }
    }

    fn options(&self, pad_to_full_rom: bool) -> AsmOptions {
        AsmOptions {
            address_mode: self.mode(),
            unsigned_immediates: self.unsigned,
            pad_to_full_rom,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.bin` file directly and output to terminal
    Run {
        /// `.asm` or `.bin` file to run
        name: PathBuf,
        #[command(flatten)]
        asm: AsmArgs,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Stop after this many steps
        #[arg(long, default_value_t = 10_000)]
        max: usize,
        /// ROM address to load the program at
        #[arg(long, default_value_t = 0)]
        start: usize,
    },
    /// Create binary `.bin` file and annotated `.lst` listing
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        #[command(flatten)]
        asm: AsmArgs,
        /// Destination to output `.bin` file
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Fill the image with 0xFF up to the full 2048 bytes of ROM
        #[arg(short, long)]
        pad: bool,
        /// Skip the annotated listing
        #[arg(short, long)]
        silent: bool,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
        #[command(flatten)]
        asm: AsmArgs,
    },
    /// Print the instructions held in a binary `.bin` file
    Disasm {
        /// `.bin` file to disassemble
        name: PathBuf,
        /// Decode single byte jump targets
        #[arg(long)]
        eight_bit: bool,
    },
    /// Place a watch on a `.asm` file to receive constant assembler updates
    Watch {
        /// `.asm` file to watch
        name: PathBuf,
        #[command(flatten)]
        asm: AsmArgs,
    },
}

struct RunOptions {
    minimal: bool,
    max: usize,
    start: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            minimal: false,
            max: 10_000,
            start: 0,
        }
    }
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    nibbler::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(nibbler::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                asm,
                minimal,
                max,
                start,
            } => {
                run(
                    &name,
                    asm,
                    RunOptions {
                        minimal,
                        max,
                        start,
                    },
                )?;
                Ok(())
            }
            Command::Compile {
                name,
                asm,
                out,
                pad,
                silent,
            } => {
                file_message(Green, "Assembling", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let image = assemble(&name, contents, &asm.options(pad))?;

                let out_file_name = out.unwrap_or_else(|| name.with_extension("bin"));
                fs::write(&out_file_name, image.bytes()).into_diagnostic()?;
                message(
                    Green,
                    "Finished",
                    &format!("emit binary, {} bytes", image.len()),
                );
                file_message(Green, "Saved", &out_file_name);

                if !silent {
                    let listing_file_name = out_file_name.with_extension("lst");
                    fs::write(&listing_file_name, image.listing().to_string())
                        .into_diagnostic()?;
                    print!("\n{}\n", image.listing());
                    file_message(Green, "Saved", &listing_file_name);
                }
                Ok(())
            }
            Command::Check { name, asm } => {
                file_message(Green, "Checking", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let image = assemble(&name, contents, &asm.options(false))?;
                message(
                    Green,
                    "Success",
                    &format!(
                        "no errors found! {} bytes, {} labels",
                        image.len(),
                        image.symbols().len()
                    ),
                );
                for (label, addr) in image.symbols().iter() {
                    message(Cyan, "Label", &format!("{label} at 0x{addr:04X}"));
                }
                Ok(())
            }
            Command::Disasm { name, eight_bit } => {
                let mode = if eight_bit {
                    AddressMode::Bit8
                } else {
                    AddressMode::Bit11
                };
                file_message(Green, "Decoding", &name);
                let bytes = fs::read(&name).into_diagnostic()?;
                let info = nibbler::inspect(&bytes, mode);
                for issue in &info.issues {
                    message(Red, "Warning", &issue.to_string());
                }
                // Trailing padding is not part of the program
                let end = bytes
                    .iter()
                    .rposition(|byte| *byte != nibbler::isa::PAD_BYTE)
                    .map_or(0, |last| last + 1);
                println!();
                for line in Decoder::new(mode).decode_program(&bytes[..end]) {
                    println!("{line}");
                }
                println!();
                message(
                    Green,
                    "Finished",
                    &format!(
                        "{} instructions, {} bytes of padding",
                        info.instructions,
                        bytes.len() - end
                    ),
                );
                Ok(())
            }
            Command::Watch { name, asm } => {
                if !name.exists() {
                    bail!("File does not exist. Exiting...")
                }
                // Vim breaks if watching a single file
                let folder_path = match name.parent() {
                    Some(pth) if pth.is_dir() => pth.to_path_buf(),
                    _ => Path::new(".").to_path_buf(),
                };
                let options = asm.options(false);

                // Clear screen and move cursor to top left
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Cyan, "Help", "press CTRL+C to exit");

                let mut watcher = Hotwatch::new_with_custom_delay(Duration::from_millis(500))
                    .into_diagnostic()?;

                watcher
                    .watch(folder_path, move |event: Event| match event.kind {
                        // Watch remove for vim changes
                        EventKind::Modify(_) | EventKind::Remove(_) => {
                            // Clear screen
                            print!("\x1B[2J\x1B[2;1H");
                            file_message(Green, "Watching", &name);
                            message(Green, "Re-checking", "file change detected");
                            message(Cyan, "Help", "press CTRL+C to exit");

                            // Makes reruns more obvious
                            sleep(Duration::from_millis(50));

                            let contents = match fs::read_to_string(&name) {
                                Ok(cts) => cts,
                                Err(e) => {
                                    eprintln!("{e}. Exiting...");
                                    std::process::exit(1)
                                }
                            };
                            match assemble(&name, contents, &options) {
                                Ok(_) => {
                                    message(Green, "Success", "no errors found!");
                                }
                                Err(e) => {
                                    println!("\n{:?}", e);
                                }
                            };
                            Flow::Continue
                        }
                        _ => Flow::Continue,
                    })
                    .into_diagnostic()?;
                watcher.run();
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        let asm = AsmArgs {
            eight_bit: false,
            unsigned: false,
        };
        run(&path, asm, RunOptions::default())?;
        Ok(())
    } else {
        println!("\n~ nibbler v{VERSION} ~");
        println!("{}", LOGO.truecolor(255, 191, 0).bold());
        println!("{SHORT_INFO}");
        std::process::exit(0);
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, asm: AsmArgs, opts: RunOptions) -> Result<()> {
    use MsgColor::*;
    let mode = asm.mode();
    let bytes = if let Some(ext) = name.extension() {
        match ext.to_str() {
            Some("bin") => {
                file_message(Green, "Loading", name);
                let bytes = fs::read(name).into_diagnostic()?;
                let info = nibbler::inspect(&bytes, mode);
                message(
                    Cyan,
                    "Inspected",
                    &format!(
                        "{} bytes, {} in use, {} instructions",
                        info.size, info.used, info.instructions
                    ),
                );
                for issue in &info.issues {
                    message(Red, "Warning", &issue.to_string());
                }
                bytes
            }
            Some("asm") => {
                file_message(Green, "Assembling", name);
                let contents = fs::read_to_string(name).into_diagnostic()?;
                assemble(name, contents, &asm.options(false))?.into_bytes()
            }
            _ => {
                bail!("File has unknown extension. Exiting...")
            }
        }
    } else {
        bail!("File has no extension. Exiting...");
    };

    let mut cpu = Cpu::with_mode(mode);
    cpu.load_program(&bytes, opts.start).into_diagnostic()?;
    Output::set_minimal(opts.minimal);
    let interp = asm.interpretation();

    message(Green, "Running", "emitted binary");
    let mut skipped = 0;
    for _ in 0..opts.max {
        if cpu.is_halted() {
            break;
        }
        // Unknown opcodes are skipped, keep going
        if !cpu.step() {
            if !cpu.is_halted() {
                skipped += 1;
            }
            continue;
        }
        if cpu.last_decoded().and_then(|decoded| decoded.mnemonic()) == Some(Mnemonic::Out) {
            if let Some(value) = cpu.output() {
                Output::Normal.print_output(value, interp);
            }
        }
    }
    if skipped > 0 {
        message(
            Red,
            "Warning",
            &format!("skipped {skipped} bytes of unknown opcodes"),
        );
    }
    if !cpu.is_halted() {
        message(
            Red,
            "Stopped",
            &format!("reached limit of {} steps", opts.max),
        );
    }

    Output::Normal.print_state(&cpu.state(), interp);
    file_message(Green, "Completed", name);
    Ok(())
}

/// Assemble source text, attaching it to any error for display.
fn assemble(name: &Path, contents: String, options: &AsmOptions) -> Result<Image> {
    nibbler::assemble(&contents, options)
        .map_err(move |err| err.into_report(NamedSource::new(name.display().to_string(), contents)))
}

const LOGO: &str = r#"
             _ _     _     _
  _ __  (_) |__ | |__ | | ___ _ __
 | '_ \ | | '_ \| '_ \| |/ _ \ '__|
 | | | || | |_) | |_) | |  __/ |
 |_| |_||_|_.__/|_.__/|_|\___|_|"#;

const SHORT_INFO: &str = r"
Welcome to nibbler, a toolchain for a nibble-encoded 8-bit computer:
assembler, disassembler and emulator in one binary.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
