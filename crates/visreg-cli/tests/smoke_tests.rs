//! Smoke tests for the visreg CLI

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn visreg() -> Command {
    let mut cmd = Command::cargo_bin("visreg").expect("visreg binary should exist");
    cmd.env_remove("VISREG_LOG")
        .env_remove("RUST_LOG")
        .env_remove("VISREG_TEST_DATA")
        .env_remove("VISREG_SCREENSHOT_DIR");
    cmd
}

fn write_png(path: &std::path::Path, shade: u8) {
    fs::write(path, visreg::driver::placeholder_png(40, 30, shade).unwrap()).unwrap();
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    visreg()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    visreg()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("prune"));
}

#[test]
fn test_no_args_fails() {
    visreg().assert().failure();
}

#[test]
fn test_scenarios_lists_fields() {
    visreg()
        .arg("scenarios")
        .assert()
        .success()
        .stdout(predicate::str::contains("open_account: username, password"))
        .stdout(predicate::str::contains("customer.ssn"))
        .stdout(predicate::str::contains("visual_test"));
}

// ============================================================================
// Compare
// ============================================================================

#[test]
fn test_compare_identical_images() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    write_png(&a, 120);
    write_png(&b, 120);

    visreg()
        .args(["--color", "never", "compare"])
        .arg(&a)
        .arg(&b)
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Pixel difference:      0.00%"))
        .stdout(predicate::str::contains("match"));
    assert!(dir.path().join("diff_image.png").exists());
}

#[test]
fn test_compare_different_images_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    write_png(&a, 10);
    write_png(&b, 240);

    visreg()
        .args(["--color", "never", "compare"])
        .arg(&a)
        .arg(&b)
        .arg("-o")
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("different"));
}

#[test]
fn test_compare_missing_file() {
    let dir = TempDir::new().unwrap();
    visreg()
        .arg("compare")
        .arg(dir.path().join("nope.png"))
        .arg(dir.path().join("nada.png"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load image"));
}

// ============================================================================
// Prune
// ============================================================================

#[test]
fn test_prune_directory() {
    let dir = TempDir::new().unwrap();
    let login = dir.path().join("login");
    fs::create_dir_all(&login).unwrap();
    for (i, name) in [
        "login_home_page_20240101-000000.png",
        "login_home_page_20240102-000000.png",
        "login_home_page_20240103-000000.png",
    ]
    .iter()
    .enumerate()
    {
        let path = login.join(name);
        write_png(&path, 100);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(300 - 100 * i as u64))
            .unwrap();
    }

    visreg()
        .args(["prune", "--scenario", "login", "--keep", "1", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 screenshots"));
    assert_eq!(fs::read_dir(&login).unwrap().count(), 1);
}

#[test]
fn test_prune_unknown_scenario() {
    visreg()
        .args(["prune", "--scenario", "checkout"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown scenario"));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn test_run_without_website_fails() {
    let dir = TempDir::new().unwrap();
    visreg()
        .current_dir(dir.path())
        .args(["--color", "never", "run", "--scenario", "login", "--no-email"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Website Error: Please provide a website URL."));
    assert!(!dir.path().join("test_report.xlsx").exists());
}

#[test]
fn test_run_unknown_scenario() {
    visreg()
        .args(["run", "--scenario", "checkout", "--website", "https://bank.test/"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown scenario"));
}

// ============================================================================
// Report
// ============================================================================

#[test]
fn test_report_missing_file() {
    let dir = TempDir::new().unwrap();
    visreg()
        .arg("report")
        .arg(dir.path().join("missing.xlsx"))
        .assert()
        .code(1);
}

#[test]
fn test_report_prints_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test_report.xlsx");
    let mut report = visreg::Report::new();
    report.record(visreg::ReportRow::check(true, "counter incremented"));
    report.export(&path).unwrap();

    visreg()
        .arg("report")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("counter incremented"))
        .stdout(predicate::str::contains("Success"));
}
