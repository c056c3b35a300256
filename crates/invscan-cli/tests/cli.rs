use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

/// `invscan` isolated from the user's config, `.env` and credentials.
fn invscan(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("invscan").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .env_remove("GEMINI_API_KEY")
        .env_remove("GOOGLE_SHEETS_ID")
        .env_remove("SERVICE_ACCOUNT_FILE")
        .env_remove("INVOICE_BASE_DIR")
        .env_remove("INVOICE_OUTPUT_DIR")
        .env_remove("INVOICE_SHEET_NAME");
    cmd
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"img").unwrap();
}

#[test]
fn test_scan_lists_folders() {
    let home = tempfile::tempdir().unwrap();
    let base = home.path().join("invoices");
    touch(&base.join("inv-001/p1.png"));
    touch(&base.join("inv-001/p2.png"));
    touch(&base.join("inv-002/scan.JPG"));

    invscan(home.path())
        .args(["scan", "--base-dir"])
        .arg(&base)
        .assert()
        .success()
        .stdout(predicate::str::contains("inv-001"))
        .stdout(predicate::str::contains("inv-002"))
        .stdout(predicate::str::contains("2 invoice(s), 3 page(s)"));
}

#[test]
fn test_scan_file_mode() {
    let home = tempfile::tempdir().unwrap();
    let base = home.path().join("invoices");
    touch(&base.join("march/1001.png"));
    touch(&base.join("1002.jpeg"));

    invscan(home.path())
        .args(["scan", "--mode", "files", "--base-dir"])
        .arg(&base)
        .assert()
        .success()
        .stdout(predicate::str::contains("1001"))
        .stdout(predicate::str::contains("1002"))
        .stdout(predicate::str::contains("2 invoice(s), 2 page(s)"));
}

#[test]
fn test_scan_uses_env_base_dir() {
    let home = tempfile::tempdir().unwrap();
    let base = home.path().join("from-env");
    touch(&base.join("inv-9/p1.png"));

    invscan(home.path())
        .arg("scan")
        .env("INVOICE_BASE_DIR", &base)
        .assert()
        .success()
        .stdout(predicate::str::contains("inv-9"));
}

#[test]
fn test_run_missing_base_dir() {
    let home = tempfile::tempdir().unwrap();

    invscan(home.path())
        .args(["run", "--no-sheets", "--base-dir"])
        .arg(home.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("base directory not found"));
}

#[test]
fn test_run_without_api_key() {
    let home = tempfile::tempdir().unwrap();
    let base = home.path().join("invoices");
    touch(&base.join("inv-001/p1.png"));

    invscan(home.path())
        .args(["run", "--no-sheets", "--base-dir"])
        .arg(&base)
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

/// Config pointing the model at a closed local port so calls fail fast.
fn offline_config(home: &Path) -> std::path::PathBuf {
    let path = home.join("offline.json");
    fs::write(
        &path,
        r#"{"gemini": {"base_url": "http://127.0.0.1:9", "max_retries": 1, "timeout_secs": 5}}"#,
    )
    .unwrap();
    path
}

#[test]
fn test_run_warns_once_without_sheets() {
    let home = tempfile::tempdir().unwrap();
    let base = home.path().join("invoices");
    touch(&base.join("inv-001/p1.png"));
    let config = offline_config(home.path());

    invscan(home.path())
        .arg("-c")
        .arg(&config)
        .args(["run", "--base-dir"])
        .arg(&base)
        .arg("--output-dir")
        .arg(home.path().join("out"))
        .env("GEMINI_API_KEY", "test-key")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 failed"))
        .stderr(predicate::function(|err: &str| {
            err.matches("not configured").count() == 1
        }))
        .stderr(predicate::str::contains("No row destination").not());
}

#[test]
fn test_fail_fast_still_writes_summary() {
    let home = tempfile::tempdir().unwrap();
    let base = home.path().join("invoices");
    touch(&base.join("inv-001/p1.png"));
    touch(&base.join("inv-002/p1.png"));
    let config = offline_config(home.path());
    let out = home.path().join("out");

    invscan(home.path())
        .arg("-c")
        .arg(&config)
        .args(["run", "--no-sheets", "--fail-fast", "--summary", "--base-dir"])
        .arg(&base)
        .arg("--output-dir")
        .arg(&out)
        .env("GEMINI_API_KEY", "test-key")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stopped at failed invoice inv-001"));

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("inv-001,failed,1,"));
}

#[test]
fn test_config_set_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("invscan.json");

    invscan(home.path())
        .arg("-c")
        .arg(&path)
        .args(["config", "set", "foo", "bar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key: foo"));
    assert!(!path.exists());
}

#[test]
fn test_config_path() {
    let home = tempfile::tempdir().unwrap();

    invscan(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.json"))
        .stdout(predicate::str::contains("not created"));
}

#[test]
fn test_config_show_masks_api_key() {
    let home = tempfile::tempdir().unwrap();

    invscan(home.path())
        .args(["config", "show"])
        .env("GEMINI_API_KEY", "secret-key-1234")
        .assert()
        .success()
        .stdout(predicate::str::contains("gemini-2.0-flash"))
        .stdout(predicate::str::contains("****1234"))
        .stdout(predicate::str::contains("secret-key").not());
}

#[test]
fn test_config_init_set_get() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("invscan.json");

    invscan(home.path())
        .args(["-c"])
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(path.exists());

    invscan(home.path())
        .args(["-c"])
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    invscan(home.path())
        .args(["-c"])
        .arg(&path)
        .args(["config", "set", "sheets.sheet_name", "March"])
        .assert()
        .success();

    invscan(home.path())
        .args(["-c"])
        .arg(&path)
        .args(["config", "get", "sheets.sheet_name"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"March\""));

    invscan(home.path())
        .args(["-c"])
        .arg(&path)
        .args(["config", "get", "sheets.nope"])
        .assert()
        .failure();
}
