//! Regression runs over a corpus of CIR inputs and expected artifacts.
//!
//! Each subdirectory of the corpus is one test case. A case either carries
//! a `test.json` naming its inputs and expected outputs, or is detected
//! from `input*.json` and `expected_<artifact>.json` files. Cases convert
//! in memory; nothing is written to the corpus.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::convert::{ConversionReport, NoopObserver, build_artifacts};
use crate::io::read::read_json;
use crate::mapper::MapContext;
use crate::mapper::base::now_timestamp;
use crate::oscal::artifact::ARTIFACTS;
use crate::oscal::ArtifactKind;

pub const TEST_CONFIG_FILE: &str = "test.json";
const EXPECTED_PREFIX: &str = "expected_";
const MAX_DIFFERENCES: usize = 20;

/// Keys whose values change on every run. Only their presence is compared.
const VOLATILE_KEYS: [&str; 7] = [
    "uuid",
    "published",
    "last-modified",
    "start",
    "end",
    "collected",
    "date",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseKind {
    Configured,
    AutoDetected,
}

/// Contents of a case's `test.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    /// File names, or prefixes ending in `*`.
    pub inputs: Vec<String>,
    pub expected_outputs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub dir: PathBuf,
    pub kind: CaseKind,
    pub inputs: Vec<PathBuf>,
    pub expected: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CaseKind,
    pub status: CaseStatus,
    pub inputs: Vec<String>,
    pub matched: Vec<String>,
    pub differences: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusReport {
    pub timestamp: String,
    pub corpus_directory: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub pass_rate: f64,
    pub recommendation: String,
    pub results: Vec<CaseResult>,
}

impl CorpusReport {
    /// Every case passed. An empty corpus does not pass.
    pub fn passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

fn is_volatile(key: &str) -> bool {
    VOLATILE_KEYS.contains(&key) || key.ends_with("-uuid")
}

/// Check that `expected` is structurally contained in `actual`.
///
/// Objects match when every expected key is present and matches. Arrays
/// match element-wise and must have equal length. Volatile keys only need
/// to be present. Differences are reported as JSON-pointer-like paths.
pub fn compare(actual: &Value, expected: &Value, path: &str, out: &mut Vec<String>) {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => {
            for (key, want) in e {
                let here = format!("{path}/{key}");
                match a.get(key) {
                    None => out.push(format!("{here}: missing")),
                    Some(_) if is_volatile(key) => {}
                    Some(got) => compare(got, want, &here, out),
                }
            }
        }
        (Value::Array(a), Value::Array(e)) => {
            if a.len() != e.len() {
                out.push(format!(
                    "{path}: expected {} items, found {}",
                    e.len(),
                    a.len()
                ));
                return;
            }
            for (i, (got, want)) in a.iter().zip(e).enumerate() {
                compare(got, want, &format!("{path}/{i}"), out);
            }
        }
        (got, want) if got != want => out.push(format!("{path}: expected {want}, found {got}")),
        _ => {}
    }
}

/// Artifact named by an `expected_<name>.json` file. `<name>` may be the
/// output file stem, validator code or root key.
pub fn expected_artifact(path: &Path) -> Option<ArtifactKind> {
    let stem = path.file_stem()?.to_str()?.to_lowercase();
    let name = stem.strip_prefix(EXPECTED_PREFIX).unwrap_or(&stem);
    ARTIFACTS
        .iter()
        .find(|e| {
            e.code == name
                || e.root_key == name
                || e.file_name
                    .and_then(|f| f.strip_suffix(".json"))
                    .is_some_and(|f| f == name)
        })
        .map(|e| e.kind)
}

fn file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

/// Build the test case for one corpus subdirectory, if it is one.
pub fn case_from_dir(dir: &Path) -> Result<Option<TestCase>> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let files = file_names(dir)?;

    let config_path = dir.join(TEST_CONFIG_FILE);
    if config_path.is_file() {
        let text = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        match serde_json::from_str::<CaseConfig>(&text) {
            Ok(config) => {
                let inputs = files
                    .iter()
                    .filter(|f| config.inputs.iter().any(|p| matches_pattern(f, p)))
                    .map(|f| dir.join(f))
                    .collect();
                let expected = config.expected_outputs.iter().map(|f| dir.join(f)).collect();
                return Ok(Some(TestCase {
                    name,
                    dir: dir.to_path_buf(),
                    kind: CaseKind::Configured,
                    inputs,
                    expected,
                }));
            }
            Err(e) => warn!(file = %config_path.display(), error = %e, "invalid test config"),
        }
    }

    let pick = |keep: fn(&str) -> bool| -> Vec<PathBuf> {
        files
            .iter()
            .filter(|f| f.ends_with(".json") && keep(f.as_str()))
            .map(|f| dir.join(f))
            .collect()
    };
    let inputs = pick(|f| f.starts_with("input"));
    let expected = pick(|f| f.starts_with(EXPECTED_PREFIX));
    if inputs.is_empty() || expected.is_empty() {
        return Ok(None);
    }
    Ok(Some(TestCase {
        name,
        dir: dir.to_path_buf(),
        kind: CaseKind::AutoDetected,
        inputs,
        expected,
    }))
}

pub fn discover_cases(corpus: &Path) -> Result<Vec<TestCase>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(corpus)
        .with_context(|| format!("failed to read corpus directory: {}", corpus.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut cases = Vec::new();
    for dir in dirs {
        if let Some(case) = case_from_dir(&dir)? {
            cases.push(case);
        }
    }
    Ok(cases)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn run_case(case: &TestCase, ctx: &MapContext) -> CaseResult {
    let mut result = CaseResult {
        name: case.name.clone(),
        kind: case.kind,
        status: CaseStatus::Passed,
        inputs: case.inputs.iter().map(|p| file_label(p)).collect(),
        matched: Vec::new(),
        differences: Vec::new(),
        errors: Vec::new(),
    };
    if case.inputs.is_empty() {
        result.status = CaseStatus::Skipped;
        result.errors.push("No input files found".to_string());
        return result;
    }

    let mut report = ConversionReport::default();
    let built = build_artifacts(&case.inputs, ctx, &NoopObserver, &mut report);
    result
        .errors
        .extend(report.failures.iter().map(|f| format!("{}: {}", f.subject, f.message)));

    for path in &case.expected {
        let label = file_label(path);
        let Some(kind) = expected_artifact(path) else {
            result.errors.push(format!("Unknown artifact for {label}"));
            continue;
        };
        let expected = match read_json(path) {
            Ok(v) => v,
            Err(e) => {
                result.errors.push(format!("Invalid expected file {label}: {e:#}"));
                continue;
            }
        };
        let Some(actual) = built.get(kind) else {
            result.differences.push(format!("{label}: no {kind} produced"));
            continue;
        };
        let mut diffs = Vec::new();
        compare(actual, &expected, "", &mut diffs);
        if diffs.is_empty() {
            result.matched.push(label);
        } else {
            result
                .differences
                .extend(diffs.into_iter().map(|d| format!("{label}: {d}")));
        }
    }
    result.differences.truncate(MAX_DIFFERENCES);

    result.status = if !result.errors.is_empty() {
        CaseStatus::Error
    } else if !result.differences.is_empty() {
        CaseStatus::Failed
    } else {
        CaseStatus::Passed
    };
    info!(case = %result.name, status = ?result.status, "corpus case");
    result
}

fn recommendation(pass_rate: f64, failed: usize) -> String {
    if pass_rate >= 100.0 {
        "All tests passed. Corpus validation successful.".to_string()
    } else if pass_rate >= 90.0 {
        format!("{failed} test(s) failed. Review failed cases and update corpus or implementation.")
    } else if pass_rate >= 75.0 {
        format!("Multiple tests failed ({failed}). Review conversion logic and test expectations.")
    } else {
        format!("Significant test failures ({failed}). Major review of implementation required.")
    }
}

/// Run every test case under `corpus`.
pub fn run_corpus(corpus: &Path, config: &Config) -> Result<CorpusReport> {
    if !corpus.is_dir() {
        bail!("corpus directory not found: {}", corpus.display());
    }
    let ctx = MapContext::new(&config.mapping);
    let results: Vec<CaseResult> = discover_cases(corpus)?
        .iter()
        .map(|case| run_case(case, &ctx))
        .collect();

    let count = |status: CaseStatus| results.iter().filter(|r| r.status == status).count();
    let total = results.len();
    let passed = count(CaseStatus::Passed);
    let failed = count(CaseStatus::Failed);
    let errors = count(CaseStatus::Error);
    let pass_rate = if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    };

    Ok(CorpusReport {
        timestamp: now_timestamp(),
        corpus_directory: corpus.display().to_string(),
        total,
        passed,
        failed,
        skipped: count(CaseStatus::Skipped),
        errors,
        pass_rate,
        recommendation: recommendation(pass_rate, failed + errors),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::poam::POAM_TITLE;
    use serde_json::json;

    fn poam_input() -> Value {
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
                "control_ids": ["AC-3"],
                "asset_ids": ["srv-1"]
            }]
        })
    }

    fn write(dir: &Path, name: &str, value: &Value) {
        fs::write(dir.join(name), value.to_string()).unwrap();
    }

    #[test]
    fn compare_skips_volatile_values_but_requires_presence() {
        let actual = json!({"uuid": "a", "metadata": {"title": "T", "last-modified": "x"}, "party-uuid": "p"});
        let mut diffs = Vec::new();
        compare(
            &actual,
            &json!({"uuid": "b", "metadata": {"title": "T", "last-modified": "y"}, "party-uuid": "q"}),
            "",
            &mut diffs,
        );
        assert!(diffs.is_empty(), "{diffs:?}");

        compare(&actual, &json!({"metadata": {"title": "U", "version": "1"}}), "", &mut diffs);
        assert_eq!(
            diffs,
            vec![
                "/metadata/title: expected \"U\", found \"T\"",
                "/metadata/version: missing"
            ]
        );
    }

    #[test]
    fn compare_checks_array_length() {
        let mut diffs = Vec::new();
        compare(&json!({"a": [1, 2]}), &json!({"a": [1]}), "", &mut diffs);
        assert_eq!(diffs, vec!["/a: expected 1 items, found 2"]);
    }

    #[test]
    fn expected_file_names_resolve_to_artifacts() {
        assert_eq!(
            expected_artifact(Path::new("expected_poam.json")),
            Some(ArtifactKind::PlanOfActionAndMilestones)
        );
        assert_eq!(
            expected_artifact(Path::new("expected_assessment-plan.json")),
            Some(ArtifactKind::AssessmentPlan)
        );
        assert_eq!(
            expected_artifact(Path::new("expected_system-security-plan.json")),
            Some(ArtifactKind::SystemSecurityPlan)
        );
        assert_eq!(expected_artifact(Path::new("expected_other.json")), None);
    }

    #[test]
    fn runs_auto_detected_and_configured_cases() {
        let corpus = tempfile::tempdir().unwrap();

        let auto = corpus.path().join("a-auto");
        fs::create_dir(&auto).unwrap();
        write(&auto, "input.json", &poam_input());
        write(
            &auto,
            "expected_poam.json",
            &json!({"plan-of-action-and-milestones": {"uuid": "ignored", "metadata": {"title": POAM_TITLE}}}),
        );

        let configured = corpus.path().join("b-configured");
        fs::create_dir(&configured).unwrap();
        write(&configured, "rows.json", &poam_input());
        write(&configured, "expected_ssp.json", &json!({"system-security-plan": {}}));
        write(
            &configured,
            TEST_CONFIG_FILE,
            &json!({"inputs": ["rows*"], "expected_outputs": ["expected_ssp.json"]}),
        );

        let skipped = corpus.path().join("c-skipped");
        fs::create_dir(&skipped).unwrap();
        write(&skipped, TEST_CONFIG_FILE, &json!({"inputs": ["nothing*"]}));

        fs::create_dir(corpus.path().join("not-a-case")).unwrap();

        let report = run_corpus(corpus.path(), &Config::default()).unwrap();
        assert_eq!(report.total, 3);
        let status: Vec<_> = report.results.iter().map(|r| r.status).collect();
        // The configured case expects an SSP that a POA&M input never yields.
        assert_eq!(
            status,
            vec![CaseStatus::Passed, CaseStatus::Failed, CaseStatus::Skipped]
        );
        assert_eq!(report.results[0].matched, vec!["expected_poam.json"]);
        assert_eq!(report.results[0].kind, CaseKind::AutoDetected);
        assert!(!report.passed());
    }

    #[test]
    fn missing_corpus_is_an_error() {
        assert!(run_corpus(Path::new("no/such/corpus"), &Config::default()).is_err());
    }
}
