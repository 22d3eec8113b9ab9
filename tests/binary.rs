//! Tests that actually run the pkgunpack binary, rather than calling its
//! library functions.

use std::error::Error;
use std::ffi::OsStr;
use std::fs;
use std::path;
use std::process;

pub mod common;

/// Runs the pkgunpack binary with the given arguments.
fn pkgunpack_output<I, S>(args: I) -> Result<process::Output, Box<dyn Error>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Ok(process::Command::new(env!("CARGO_BIN_EXE_pkgunpack"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(process::Stdio::null())
        .output()?)
}

/// Runs the pkgunpack binary with the given arguments, returning its exit
/// status and standard output.
fn pkgunpack_run<I, S>(args: I) -> Result<(process::ExitStatus, String), Box<dyn Error>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = pkgunpack_output(args)?;
    Ok((output.status, String::from_utf8(output.stdout)?))
}

/// Writes the sample package to a temporary file.
fn sample_file() -> Result<tempfile::NamedTempFile, Box<dyn Error>> {
    let file = tempfile::NamedTempFile::new()?;
    fs::write(file.path(), common::sample().build())?;
    Ok(file)
}

#[test]
fn test_unpack() {
    let input = sample_file().unwrap();
    let output = tempfile::tempdir().unwrap();
    let (status, _) = pkgunpack_run(&[input.path().as_os_str(), output.path().as_os_str()]).unwrap();
    assert!(status.success());
    assert_eq!(fs::read(output.path().join("snapshot/app/lib/util.js")).unwrap(), b"module.exports = {};\n");
    assert!(output.path().join("snapshot/app/index.js").is_file());
}

#[test]
fn test_list() {
    let input = sample_file().unwrap();
    let (status, stdout) = pkgunpack_run(&[OsStr::new("--list"), input.path().as_os_str()]).unwrap();
    assert!(status.success());
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 6);
    let entry = lines.iter().find(|line| line.ends_with(" /snapshot/app/index.js")).unwrap();
    assert!(entry.starts_with("file "), "{}", entry);
    assert!(entry.contains(" * "), "{}", entry);
    assert!(lines.iter().any(|line| line.starts_with("dir ") && line.ends_with(" /snapshot/app/lib")));
}

#[test]
fn test_not_a_package() {
    let input = tempfile::NamedTempFile::new().unwrap();
    fs::write(input.path(), b"\x7fELF just a regular executable").unwrap();
    let output = tempfile::tempdir().unwrap();
    let (status, _) = pkgunpack_run(&[input.path().as_os_str(), output.path().as_os_str()]).unwrap();
    assert!(!status.success());
}

#[test]
fn test_partial_failure_status() {
    let builder = common::PackageBuilder::new()
        .file("/good.txt", b"good")
        .record("/bad.txt", "3", b"{broken")
        .entrypoint("/good.txt");
    let input = tempfile::NamedTempFile::new().unwrap();
    fs::write(input.path(), builder.build()).unwrap();
    let output = tempfile::tempdir().unwrap();
    let (status, _) = pkgunpack_run(&[input.path().as_os_str(), output.path().as_os_str()]).unwrap();
    assert!(!status.success());
    assert_eq!(fs::read(output.path().join("good.txt")).unwrap(), b"good");
}

#[test]
fn test_list_reports_failed_path() {
    let builder = common::PackageBuilder::new()
        .file("/good.txt", b"good")
        .record("/bad.txt", "3", b"{broken")
        .entrypoint("/good.txt");
    let input = tempfile::NamedTempFile::new().unwrap();
    fs::write(input.path(), builder.build()).unwrap();
    let output = pkgunpack_output(&[OsStr::new("--list"), input.path().as_os_str()]).unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().any(|line| line.ends_with(" /good.txt")), "{}", stdout);
    let stderr = String::from_utf8(output.stderr).unwrap();
    let prefix = format!("{}: /bad.txt: ", input.path().display());
    assert!(stderr.lines().any(|line| line.contains(&prefix)), "{}", stderr);
}

#[test]
fn test_missing_arguments() {
    let input = sample_file().unwrap();
    let (status, _) = pkgunpack_run(&[input.path()]).unwrap();
    assert!(!status.success());
    let (status, stdout) = pkgunpack_run(&["--help"]).unwrap();
    assert!(status.success());
    assert!(stdout.starts_with("Usage:"));
}

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let missing: path::PathBuf = dir.path().join("does-not-exist");
    let (status, _) = pkgunpack_run(&[missing.as_os_str(), dir.path().as_os_str()]).unwrap();
    assert!(!status.success());
}
