use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn nibbler() -> Command {
    Command::cargo_bin("nibbler").unwrap()
}

fn tmp_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name)
}

#[test]
fn runs_without_arguments() {
    nibbler().assert().success().stdout(contains("nibbler v"));
}

#[test]
fn checks_valid_source() {
    nibbler()
        .args(["check", "tests/files/add.asm"])
        .assert()
        .success()
        .stdout(contains("no errors found"));
}

#[test]
fn check_lists_labels() {
    nibbler()
        .args(["check", "tests/files/countdown.asm"])
        .assert()
        .success()
        .stdout(contains("1 labels"))
        .stdout(contains("LOOP at 0x0002"));
}

#[test]
fn check_reports_unknown_mnemonic() {
    nibbler()
        .args(["check", "tests/files/bad.asm"])
        .assert()
        .failure()
        .stderr(contains("Unsupported instruction `FOO`"))
        .stderr(contains("line 3"));
}

#[test]
fn check_reports_ram_range() {
    nibbler()
        .args(["check", "tests/files/range.asm"])
        .assert()
        .failure()
        .stderr(contains("RAM address 16 is out of range"));
}

#[test]
fn runs_source_minimal() {
    nibbler()
        .args(["run", "tests/files/add.asm", "--minimal"])
        .assert()
        .success()
        .stdout(contains("A 8\nB 3\nC 0\nD 0\nPC 5\n"));
}

#[test]
fn bare_path_runs() {
    nibbler()
        .arg("tests/files/add.asm")
        .assert()
        .success()
        .stdout(contains("Completed"));
}

#[test]
fn prints_every_output() {
    nibbler()
        .args(["run", "tests/files/countdown.asm", "-m"])
        .assert()
        .success()
        .stdout(contains("3\n2\n1\n0\nA 0\n"))
        .stdout(contains("OUT 0"));
}

#[test]
fn output_interpretation() {
    nibbler()
        .args(["run", "tests/files/latch.asm", "-m"])
        .assert()
        .success()
        .stdout(contains("OUT -56"));
    nibbler()
        .args(["run", "tests/files/latch.asm", "-m", "--unsigned"])
        .assert()
        .success()
        .stdout(contains("OUT 200"));
}

#[test]
fn step_limit() {
    let src = tmp_path("spin.asm");
    fs::write(&src, "top:\n  jmp top\n").unwrap();
    nibbler()
        .args(["run", "--max", "50", "-m"])
        .arg(&src)
        .assert()
        .success()
        .stdout(contains("reached limit of 50 steps"));
}

#[test]
fn compiles_binary_and_listing() {
    let out = tmp_path("add.bin");
    nibbler()
        .args(["compile", "tests/files/add.asm", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("0100_0001  ADD A B"));
    assert_eq!(fs::read(&out).unwrap(), vec![0x04, 0x05, 0x44, 0x03, 0x41, 0x20]);
    let listing = fs::read_to_string(out.with_extension("lst")).unwrap();
    assert!(listing.contains("LDI B 3"));
}

#[test]
fn silent_compile_skips_listing() {
    let out = tmp_path("latch_silent.bin");
    nibbler()
        .args(["compile", "tests/files/latch.asm", "--silent", "--pad", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("2048 bytes"));
    assert!(!out.with_extension("lst").exists());
    assert_eq!(fs::read(&out).unwrap().len(), 2048);
}

#[test]
fn runs_compiled_binary() {
    let out = tmp_path("countdown.bin");
    nibbler()
        .args(["compile", "tests/files/countdown.asm", "-s", "-o"])
        .arg(&out)
        .assert()
        .success();
    nibbler()
        .args(["run", "-m"])
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("instructions"))
        .stdout(contains("OUT 0"));
}

#[test]
fn disassembles_binary() {
    let out = tmp_path("countdown_disasm.bin");
    nibbler()
        .args(["compile", "tests/files/countdown.asm", "--pad", "-s", "-o"])
        .arg(&out)
        .assert()
        .success();
    nibbler()
        .arg("disasm")
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("0000:  04 03      LDI A 0x03"))
        .stdout(contains("JNZ 0x0002"))
        .stdout(contains("bytes of padding"));
}

#[test]
fn eight_bit_mode() {
    let out = tmp_path("countdown8.bin");
    nibbler()
        .args(["compile", "tests/files/countdown.asm", "--eight-bit", "-s", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("8 bytes"));
    nibbler()
        .args(["run", "--eight-bit", "-m"])
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("OUT 0"));
}

#[test]
fn unknown_extension() {
    nibbler()
        .args(["run", "Cargo.toml"])
        .assert()
        .failure()
        .stderr(contains("unknown extension"));
}

#[test]
fn unknown_opcodes_are_quiet_without_trace() {
    let bin = tmp_path("unknown.bin");
    fs::write(&bin, [0x30, 0x30, 0x30, 0x20]).unwrap();
    nibbler()
        .args(["run", "-m"])
        .arg(&bin)
        .env_remove("NIBBLER_TRACE")
        .assert()
        .success()
        .stdout(contains("skipped 3 bytes of unknown opcodes"))
        .stderr(contains("Unknown opcode").not());
}

#[test]
fn trace_reports_unknown_opcodes() {
    let bin = tmp_path("unknown_traced.bin");
    fs::write(&bin, [0x30, 0x20]).unwrap();
    nibbler()
        .args(["run", "-m"])
        .arg(&bin)
        .env("NIBBLER_TRACE", "1")
        .assert()
        .success()
        .stderr(contains("Unknown opcode 0x30 at 0x0000"));
}
