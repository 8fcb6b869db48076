#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn oscalize_cmd() -> Command {
    let mut cmd = Command::cargo_bin("oscalize").expect("binary should be built");
    cmd.env_remove("OSCALIZE_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn poam_cir() -> Value {
    json!({
        "metadata": {
            "source_file": "poam.xlsx",
            "extraction_date": "2026-01-01T00:00:00Z",
            "hash": "abc"
        },
        "rows": [{
            "poam_id": "V-001",
            "title": "Unpatched OS",
            "severity": "High",
            "status": "Open",
            "control_ids": ["SI-2"],
            "asset_ids": ["srv-1"]
        }]
    })
}

fn write_json(path: &Path, value: &Value) -> PathBuf {
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    path.to_path_buf()
}

/// Convert a POA&M CIR into `<tmp>/oscal` and return both paths.
fn converted() -> (TempDir, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_json(&tmp.path().join("poam.json"), &poam_cir());
    let out = tmp.path().join("oscal");
    oscalize_cmd()
        .arg("convert")
        .arg(&input)
        .arg("-o")
        .arg(&out)
        .assert()
        .code(0);
    (tmp, out)
}

fn stdout_json(assert: &assert_cmd::assert::Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("stdout should be JSON")
}

fn missing_validator_config(dir: &Path) -> PathBuf {
    let path = dir.join("oscalize.toml");
    fs::write(
        &path,
        "[validator]\nprogram = \"oscalize-test-no-such-validator\"\n",
    )
    .unwrap();
    path
}

#[test]
fn convert_writes_poam_and_reports_json() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_json(&tmp.path().join("poam.json"), &poam_cir());
    let out = tmp.path().join("oscal");

    let assert = oscalize_cmd()
        .arg("convert")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .assert()
        .code(0);

    let report = stdout_json(&assert);
    assert_eq!(report["artifacts"].as_array().unwrap().len(), 1);
    let poam: Value = serde_json::from_slice(&fs::read(out.join("poam.json")).unwrap()).unwrap();
    assert!(poam["plan-of-action-and-milestones"]["poam-items"].is_array());
}

#[test]
fn convert_with_rejected_input_exits_1() {
    let tmp = tempfile::tempdir().unwrap();
    let bad = write_json(&tmp.path().join("inventory.json"), &json!({"assets": {}}));

    oscalize_cmd()
        .arg("convert")
        .arg(&bad)
        .arg("-o")
        .arg(tmp.path().join("oscal"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failures"));
}

#[test]
fn convert_text_format() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_json(&tmp.path().join("poam.json"), &poam_cir());

    oscalize_cmd()
        .args(["--format", "text", "convert"])
        .arg(&input)
        .arg("-o")
        .arg(tmp.path().join("oscal"))
        .assert()
        .code(0)
        .stdout(predicate::str::contains("oscalize convert"))
        .stdout(predicate::str::contains("accepted"));
}

#[test]
fn validate_without_validator_is_pipeline_error() {
    let (tmp, out) = converted();
    let config = missing_validator_config(tmp.path());

    let assert = oscalize_cmd()
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .arg(&out)
        .assert()
        .code(1);

    let summary = stdout_json(&assert);
    assert_eq!(summary["compliance_analysis"]["status"], "PIPELINE_ERROR");
}

#[test]
fn doctor_reports_missing_validator() {
    let tmp = tempfile::tempdir().unwrap();
    let config = missing_validator_config(tmp.path());

    let assert = oscalize_cmd()
        .arg("--config")
        .arg(&config)
        .arg("doctor")
        .assert()
        .code(1);
    assert_eq!(stdout_json(&assert)["available"], false);
}

#[test]
fn unreadable_explicit_config_fails() {
    oscalize_cmd()
        .args(["--config", "no/such/oscalize.toml", "doctor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("oscalize.toml"));
}

#[test]
fn validation_summary_of_missing_logs_is_no_files() {
    let tmp = tempfile::tempdir().unwrap();
    let assert = oscalize_cmd()
        .arg("validation-summary")
        .arg(tmp.path().join("validation"))
        .assert()
        .code(1);
    assert_eq!(stdout_json(&assert)["compliance_analysis"]["status"], "NO_FILES");
}

#[test]
fn compliance_check_scores_poam_only_directory() {
    let (_tmp, out) = converted();

    let assert = oscalize_cmd()
        .arg("compliance-check")
        .arg(&out)
        .assert()
        .code(1);

    let report = stdout_json(&assert);
    assert_eq!(report["artifacts_found"], 1);
    assert_eq!(report["compliant"], false);
}

#[test]
fn manifest_then_verify() {
    let (_tmp, out) = converted();

    oscalize_cmd().arg("manifest").arg(&out).assert().code(0);
    let manifest = out.join("manifest.json");
    assert!(manifest.is_file());

    let assert = oscalize_cmd()
        .arg("verify-manifest")
        .arg(&manifest)
        .assert()
        .code(0);
    assert_eq!(stdout_json(&assert)["files_valid"], 1);

    fs::write(out.join("poam.json"), "{}").unwrap();
    oscalize_cmd()
        .arg("verify-manifest")
        .arg(&manifest)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Hash mismatch"));
}

#[test]
fn bundle_then_verify() {
    let (tmp, out) = converted();
    let bundle = tmp.path().join("bundle");

    oscalize_cmd()
        .arg("bundle")
        .arg(&out)
        .arg("-o")
        .arg(&bundle)
        .assert()
        .code(0);
    assert!(bundle.join("poam.json").is_file());

    oscalize_cmd()
        .arg("verify-bundle")
        .arg(&bundle)
        .assert()
        .code(0);
}

#[test]
fn corpus_test_passes_matching_case() {
    let tmp = tempfile::tempdir().unwrap();
    let case = tmp.path().join("poam-basic");
    fs::create_dir(&case).unwrap();
    write_json(&case.join("input.json"), &poam_cir());
    write_json(
        &case.join("expected_poam.json"),
        &json!({"plan-of-action-and-milestones": {"uuid": "any", "metadata": {"oscal-version": "1.1.3"}}}),
    );

    let assert = oscalize_cmd()
        .arg("corpus-test")
        .arg(tmp.path())
        .assert()
        .code(0);
    let report = stdout_json(&assert);
    assert_eq!(report["passed"], 1);
    assert_eq!(report["pass_rate"], 100.0);
}

#[test]
fn corpus_test_missing_directory_fails() {
    oscalize_cmd()
        .args(["corpus-test", "no/such/corpus"])
        .assert()
        .failure();
}
