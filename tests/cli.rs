use std::path::PathBuf;
use std::process::{Command, Output};

fn emu(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chip8-emu"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("chip8-emu-cli-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_disasm_empty_image() {
    let path = temp_file("empty.ch8", &[]);
    let out = emu(&["disasm", path.to_str().unwrap()]);
    std::fs::remove_file(&path).unwrap();

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
}

#[test]
fn test_disasm_full_memory_image() {
    let path = temp_file("full.ch8", &[0u8; 4096]);
    let out = emu(&["disasm", path.to_str().unwrap(), "--program-start", "0x0"]);
    std::fs::remove_file(&path).unwrap();

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let listing = String::from_utf8(out.stdout).unwrap();
    assert_eq!(listing.lines().count(), 2048);
    assert_eq!(listing.lines().next(), Some("SYS 0x000 ; 0x0"));
}

#[test]
fn test_run_source_with_bad_line() {
    let path = temp_file("partial.asm", b"LD V0, 0x01\nLD V1, 0x02\nEND: JP $END\nBOGUS\n");
    let out = emu(&["run", path.to_str().unwrap(), "--headless", "--max-cycles", "10"]);
    std::fs::remove_file(&path).unwrap();

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("parse error on line 4: BOGUS"), "{}", stderr);
    assert!(stdout.contains("1 lines skipped"), "{}", stdout);
    assert!(stdout.contains("V0=01 V1=02"), "{}", stdout);
}

#[test]
fn test_run_source_with_nothing_to_run() {
    let path = temp_file("nothing.asm", b"BOGUS\n");
    let out = emu(&["run", path.to_str().unwrap(), "--headless", "--max-cycles", "10"]);
    std::fs::remove_file(&path).unwrap();

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("ROM is empty"));
}
