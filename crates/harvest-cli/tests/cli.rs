//! Command-line behavior that needs no model service.

use assert_cmd::Command;
use predicates::prelude::*;

fn pdfharvest() -> Command {
    let mut cmd = Command::cargo_bin("pdfharvest").unwrap();
    cmd.env_remove("OPENROUTER_API_KEY").env_remove("OPENROUTER_MODEL");
    cmd
}

#[test]
fn help_lists_commands() {
    pdfharvest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("pages"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn extract_requires_prompt() {
    pdfharvest()
        .args(["extract", "doc.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--prompt"));
}

#[test]
fn extract_reports_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.pdf");

    pdfharvest()
        .current_dir(dir.path())
        .arg("extract")
        .arg(&missing)
        .args(["--prompt", "totals", "--api-key", "sk-test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn extract_without_api_key_fails_before_reading_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("doc.pdf");
    std::fs::write(&pdf, b"%PDF-1.5\n").unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, "{}").unwrap();

    pdfharvest()
        .current_dir(dir.path())
        .arg("-c")
        .arg(&config)
        .arg("extract")
        .arg(&pdf)
        .args(["--prompt", "totals"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENROUTER_API_KEY"));
}

#[test]
fn rejects_unknown_format() {
    pdfharvest()
        .args(["extract", "doc.pdf", "--prompt", "x", "--format", "xlsx"])
        .assert()
        .failure();
}

#[test]
fn config_path_honors_flag() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.json");

    pdfharvest()
        .arg("-c")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.json"))
        .stdout(predicate::str::contains("not created"));
}

#[test]
fn config_init_then_set_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");

    pdfharvest()
        .arg("-c")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    pdfharvest()
        .arg("-c")
        .arg(&config)
        .args(["config", "set", "pdf.render_dpi", "150"])
        .assert()
        .success();

    pdfharvest()
        .arg("-c")
        .arg(&config)
        .args(["config", "get", "pdf.render_dpi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("150"));
}

#[test]
fn models_status_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, "{}").unwrap();

    pdfharvest()
        .arg("-c")
        .arg(&config)
        .args(["models", "status", "--model-dir"])
        .arg(dir.path().join("empty"))
        .assert()
        .success()
        .stdout(predicate::str::contains("missing"))
        .stdout(predicate::str::contains("OCR will be skipped"));
}

#[test]
fn pages_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.pdf");
    std::fs::write(&bogus, b"not a pdf").unwrap();

    pdfharvest().arg("pages").arg(&bogus).assert().failure();
}
