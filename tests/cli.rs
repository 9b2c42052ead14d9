mod summary_stub;

use predicates::prelude::*;
use summary_stub::{STUB_API_KEY, SummaryBehavior, SummaryStub};

fn key_file(dir: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("api.txt");
    std::fs::write(&path, format!("{STUB_API_KEY}\n"))?;
    Ok(path)
}

#[test]
fn check_prints_the_service_reply() -> anyhow::Result<()> {
    let stub = SummaryStub::spawn(SummaryBehavior::Summarize);
    let temp = tempfile::TempDir::new()?;
    let key = key_file(temp.path())?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("paperdigest");
    cmd.arg("check")
        .arg("--api-key-file")
        .arg(&key)
        .arg("--base-url")
        .arg(&stub.base_url)
        .assert()
        .success()
        .stdout("stub summary (6 chars)\n");

    assert_eq!(stub.received(), vec!["Hello!"]);
    Ok(())
}

#[test]
fn check_fails_when_the_service_rejects_the_key() -> anyhow::Result<()> {
    let stub = SummaryStub::spawn(SummaryBehavior::Summarize);
    let temp = tempfile::TempDir::new()?;
    let key = temp.path().join("api.txt");
    std::fs::write(&key, "sk-wrong\n")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("paperdigest");
    cmd.arg("check")
        .arg("--api-key-file")
        .arg(&key)
        .arg("--base-url")
        .arg(&stub.base_url)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unusable response"));
    Ok(())
}

#[test]
fn summarize_with_nothing_pending_succeeds() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let key = key_file(temp.path())?;
    let pending = temp.path().join("pending");
    std::fs::create_dir_all(&pending)?;
    std::fs::write(pending.join("download.pdf.crdownload"), b"partial")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("paperdigest");
    cmd.current_dir(temp.path())
        .env_remove("RUST_LOG")
        .arg("summarize")
        .arg("--family")
        .arg("acs")
        .arg("--pending")
        .arg(&pending)
        .arg("--api-key-file")
        .arg(&key)
        .assert()
        .success()
        .stderr(predicate::str::contains("summarize complete"));

    assert!(!temp.path().join("summary").exists());
    assert!(pending.join("download.pdf.crdownload").exists());
    Ok(())
}

#[test]
fn summarize_without_api_key_fails() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("paperdigest");
    cmd.current_dir(temp.path())
        .env_remove("PAPERDIGEST_API_KEY")
        .args(["summarize", "--family", "aps"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PAPERDIGEST_API_KEY"));
    Ok(())
}

#[test]
fn api_key_can_come_from_the_environment() -> anyhow::Result<()> {
    let stub = SummaryStub::spawn(SummaryBehavior::Summarize);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("paperdigest");
    cmd.env("PAPERDIGEST_API_KEY", STUB_API_KEY)
        .args(["check", "--message", "ping", "--base-url"])
        .arg(&stub.base_url)
        .assert()
        .success()
        .stdout(predicate::str::contains("stub summary (4 chars)"));
    Ok(())
}

#[test]
fn unknown_family_is_rejected_by_the_parser() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("paperdigest");
    cmd.args(["resolve", "--family", "nature"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let key = key_file(temp.path())?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("paperdigest");
    cmd.current_dir(temp.path())
        .env("RUST_LOG", "debug")
        .arg("summarize")
        .arg("--family")
        .arg("aps")
        .arg("--api-key-file")
        .arg(&key)
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
    Ok(())
}
