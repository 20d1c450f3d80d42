use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.assert().success();
}

#[test]
fn runs_hello_world() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("run").arg("tests/files/hello.asm");

    cmd.assert()
        .success()
        .stdout(contains("Hello, world!\n"))
        .stdout(contains("--- Halting the LC-3 ---"))
        .stderr(contains("Machine halted"));
}

#[test]
fn runs_packed_string() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("run").arg("tests/files/packed.asm").arg("--minimal");

    cmd.assert().success().stdout(contains("Hello!"));
}

#[test]
fn echoes_piped_key() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("run").arg("tests/files/echo.asm").write_stdin("q");

    cmd.assert().success().stdout(contains("q\n"));
}

#[test]
fn assembles_then_runs_image() {
    let dest = std::env::temp_dir().join(format!("lc3sim-hello-{}.bin", std::process::id()));

    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("assemble").arg("tests/files/hello.asm").arg(&dest);
    cmd.assert().success();

    let image = fs::read_to_string(&dest).unwrap();
    let mut lines = image.lines();
    assert_eq!(lines.next(), Some("0011000000000000"));
    // LEA R0, #2
    assert_eq!(lines.next(), Some("1110000000000010"));
    assert!(lines.all(|line| line.len() == 16));

    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("run").arg(&dest).arg("--minimal");
    cmd.assert().success().stdout(contains("Hello, world!"));

    let _ = fs::remove_file(&dest);
}

#[test]
fn check_reports_errors() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("check").arg("tests/files/errors/undefined_label.asm");
    cmd.assert()
        .failure()
        .stderr(contains("Undefined label \"NOWHERE\""));

    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("check").arg("tests/files/errors/missing_orig.asm");
    cmd.assert().failure().stderr(contains("Expected \".ORIG\""));

    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("check").arg("tests/files/countdown.asm");
    cmd.assert().success();
}

#[test]
fn rejects_unknown_extension() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("run").arg("Cargo.toml");
    cmd.assert().failure();
}

#[test]
fn debugs_to_breakpoint() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("debug")
        .arg("tests/files/countdown.asm")
        .arg("--minimal")
        .arg("--command")
        .arg("sbk DONE; run; status\nexit");

    cmd.assert()
        .success()
        .stderr(contains("Add breakpoint at x3004"))
        .stderr(contains("Breakpoint reached at x3004"))
        .stderr(contains("Count: 8"));
}

#[test]
fn debug_commands_edit_state() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("debug")
        .arg("tests/files/countdown.asm")
        .arg("--minimal")
        .arg("--command")
        .arg("sv R1 #41;nnnnnnnnnn;sv R9 1;bogus;run");

    cmd.assert()
        .success()
        .stderr(contains("Set R1 to x0029"))
        .stderr(contains("Cannot recognize `R9`"))
        .stderr(contains("Not a command: `bogus`"))
        .stderr(contains("Machine halted"))
        .stdout(contains("--- Halting the LC-3 ---"));
}

#[test]
fn debug_without_program() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.arg("debug")
        .arg("--minimal")
        .arg("--command")
        .arg("help;exit;run");

    cmd.assert()
        .success()
        .stderr(contains("cancelallbk|cabk"))
        .stderr(contains("Machine halted").not());
}

#[test]
fn runs_without_system_image() {
    let mut cmd = Command::cargo_bin("lc3sim").unwrap();
    cmd.env("LC3SIM_OS", "0")
        .arg("debug")
        .arg("tests/files/countdown.asm")
        .arg("--minimal")
        .arg("--command")
        .arg("smm x0020 #6");

    // Trap vectors are left empty
    cmd.assert().success().stderr(contains("x0025  x0000"));
}

#[test]
fn assembles_every_sample() {
    for path in glob::glob("tests/files/*.asm").unwrap() {
        let path = path.unwrap();
        let src = fs::read_to_string(&path).unwrap();
        let assembly = lc3sim::assemble(&src);
        assert!(
            assembly.is_ok(),
            "{} failed: {:?}",
            path.display(),
            assembly.diagnostics
        );
    }
    for path in glob::glob("tests/files/errors/*.asm").unwrap() {
        let path = path.unwrap();
        let src = fs::read_to_string(&path).unwrap();
        assert!(!lc3sim::assemble(&src).is_ok(), "{}", path.display());
    }
}
