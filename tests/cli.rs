//! Exit codes and output of the `adb-rebuild` binary.

mod common;

use common::{Fixture, HEADER};
use std::fs;
use std::process::{Command, Output};

fn adb_rebuild(args: &[&std::ffi::OsStr], cwd: &std::path::Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_adb-rebuild"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_no_arguments_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = adb_rebuild(&[], dir.path());
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_too_many_arguments_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let args = ["a.ab", "b.ab", "c.tar", "d"].map(std::ffi::OsStr::new);
    let out = adb_rebuild(&args, dir.path());
    assert_eq!(out.status.code(), Some(1));
    assert!(!dir.path().join("b.ab").exists());
}

#[test]
fn test_missing_input_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let out = adb_rebuild(&["nope.ab".as_ref()], dir.path());
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn test_bad_header_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("backup.ab"), b"not a backup\n").unwrap();
    let out = adb_rebuild(&["backup.ab".as_ref()], dir.path());
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_marker_not_found_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("backup.ab"), HEADER).unwrap();
    let out = adb_rebuild(&["backup.ab".as_ref()], dir.path());
    assert_eq!(out.status.code(), Some(5));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Searching for uncompressed TAR data... not found."));
    assert!(!dir.path().join("fixed_backup.ab").exists());
    assert!(!dir.path().join("shared_data.tar").exists());
}

#[test]
fn test_default_output_names() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = Fixture::standard();
    fixture.write_to(&dir.path().join("backup.ab"));

    let out = adb_rebuild(&["backup.ab".as_ref()], dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(fs::read(dir.path().join("fixed_backup.ab")).unwrap(), fixture.repaired);
    assert_eq!(fs::read(dir.path().join("shared_data.tar")).unwrap(), fixture.tar);

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("ADB Backup Version: 1"));
    assert!(stdout.contains("ADB Encryption: none"));
    assert!(stdout.contains(&format!("found at byte {}", HEADER.len() + 8)));
    assert!(stdout.ends_with("ADB backup rebuild complete.\nExiting.\n"));
}

#[test]
fn test_explicit_output_names() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = Fixture::standard();
    fixture.write_to(&dir.path().join("in.ab"));

    let out = adb_rebuild(&["in.ab".as_ref(), "out.ab".as_ref(), "out.tar".as_ref()], dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(fs::read(dir.path().join("out.ab")).unwrap(), fixture.repaired);
    assert_eq!(fs::read(dir.path().join("out.tar")).unwrap(), fixture.tar);
    assert!(!dir.path().join("fixed_backup.ab").exists());
}

#[test]
fn test_warning_goes_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = Fixture::new(b"ANDROID BACKUP\n1\n0\nnone\n", b"", 4096, b"z");
    fixture.write_to(&dir.path().join("backup.ab"));

    let out = adb_rebuild(&["backup.ab".as_ref(), "--quiet".as_ref()], dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Warning: compression flag 0"));
}
