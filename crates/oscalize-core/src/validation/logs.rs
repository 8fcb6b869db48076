//! Rebuild a validation summary from the per-file logs of an earlier run.
//!
//! Header lines are `# key: value`. A recorded `# Valid:` header is the
//! verdict reached at run time and is taken as is. Logs without one are
//! judged from the body: any failure indicator makes the file invalid,
//! regardless of what else the body says. A body with a success
//! indicator, or an empty body, is valid.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::classify;
use super::parse::OutputClassifier;
use super::pipeline::LOG_HEADER_PREFIX;
use crate::mapper::base::now_timestamp;
use crate::report::model::{FileValidation, ValidationSummary};

const METHOD_LOG: &str = "log";

const FAILURE_INDICATORS: [&str; 5] = [
    "error",
    "invalid",
    "failed",
    "validation failed",
    "schema validation error",
];
const SUCCESS_INDICATORS: [&str; 4] = ["valid", "validation successful", "no errors found", "passed"];

pub fn has_failure_indicator(text: &str) -> bool {
    let lowered = text.to_lowercase();
    FAILURE_INDICATORS.iter().any(|i| lowered.contains(i))
}

/// Failure indicators are checked first and decide.
pub fn body_is_valid(body: &str) -> bool {
    if has_failure_indicator(body) {
        return false;
    }
    let lowered = body.to_lowercase();
    SUCCESS_INDICATORS.iter().any(|i| lowered.contains(i)) || body.trim().is_empty()
}

struct ParsedLog {
    headers: Vec<(String, String)>,
    body: String,
}

impl ParsedLog {
    fn parse(text: &str) -> Self {
        let mut headers = Vec::new();
        let mut body = Vec::new();
        for line in text.lines() {
            match line.strip_prefix(LOG_HEADER_PREFIX) {
                Some(header) => {
                    if let Some((k, v)) = header.split_once(": ") {
                        headers.push((k.trim().to_string(), v.trim().to_string()));
                    }
                }
                None => body.push(line),
            }
        }
        Self {
            headers,
            body: body.join("\n"),
        }
    }

    /// The recorded verdict, falling back to the body's indicators.
    fn verdict(&self) -> bool {
        match self.header("Valid") {
            Some("true") => true,
            Some("false") => false,
            _ => body_is_valid(&self.body),
        }
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn read_log(path: &Path, classifier: &OutputClassifier) -> FileValidation {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "unreadable validation log");
            return FileValidation::failure(stem, METHOD_LOG, format!("Failed to read log: {e}"));
        }
    };

    let log = ParsedLog::parse(&text);
    let mut parsed = classifier.parse(&log.body);
    let valid = log.verdict();
    if !valid && parsed.errors.is_empty() {
        parsed
            .errors
            .push("Validation failed: log shows no success indicator".to_string());
    }
    FileValidation {
        file: log.header("File").map(String::from).unwrap_or(stem),
        doc_type: log
            .header("Doc-Type")
            .filter(|t| *t != "unknown")
            .map(String::from),
        valid,
        exit_code: log.header("Exit-Code").and_then(|c| c.parse().ok()),
        validation_method: METHOD_LOG.to_string(),
        errors: parsed.errors,
        warnings: parsed.warnings,
        raw_output: log.body,
    }
}

/// Summarize every `*.log` file in `dir`, sorted by name.
///
/// A missing directory or one without logs yields the `NO_FILES` summary.
pub fn summarize_logs(dir: &Path, classifier: &OutputClassifier) -> Result<ValidationSummary> {
    let timestamp = now_timestamp();
    let label = dir.display().to_string();
    if !dir.is_dir() {
        warn!(dir = %label, "validation directory not found");
        return Ok(classify::no_files(
            &timestamp,
            Some(&label),
            &format!("Validation directory not found: {label}"),
        ));
    }

    let mut logs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read directory: {label}"))? {
        let path = entry
            .with_context(|| format!("failed to read directory entry in {label}"))?
            .path();
        if path.is_file() && path.extension().is_some_and(|e| e == "log") {
            logs.push(path);
        }
    }
    logs.sort();
    debug!(dir = %label, count = logs.len(), "summarizing validation logs");

    let results = logs.iter().map(|p| read_log(p, classifier)).collect();
    Ok(classify::summarize(
        results,
        &timestamp,
        Some(&label),
        &format!("No validation log files found in {label}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::model::ComplianceStatus;

    #[test]
    fn failure_indicators_are_decisive() {
        assert!(!body_is_valid("Document is valid\nERROR: bad uuid"));
        // Known misclassification kept for compatibility.
        assert!(!body_is_valid("No errors found"));
        assert!(body_is_valid("The file is valid"));
        assert!(body_is_valid("   "));
        assert!(!body_is_valid("unclear output"));
    }

    #[test]
    fn recorded_verdict_outranks_body_keywords() {
        let log = ParsedLog::parse("# Valid: false\n# File: out/ssp.json\nvalidation passed\n");
        assert_eq!(log.header("File"), Some("out/ssp.json"));
        assert!(body_is_valid(&log.body));
        assert!(!log.verdict());

        let log = ParsedLog::parse("# Valid: true\n0 invalid constraints found\n");
        assert!(log.verdict());

        let log = ParsedLog::parse("# Valid: maybe\nERROR: bad uuid\n");
        assert!(!log.verdict());
    }

    #[test]
    fn missing_directory_is_no_files() {
        let s = summarize_logs(Path::new("no/such/validation"), &OutputClassifier::default())
            .unwrap();
        assert_eq!(s.status(), ComplianceStatus::NoFiles);
    }

    #[test]
    fn rebuilds_counts_from_logs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ssp.log"),
            "# File: out/ssp.json\n# Doc-Type: ssp\n# Exit-Code: 0\nValidation successful\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("poam.log"),
            "# File: out/poam.json\n# Exit-Code: 1\nSchema validation error: missing required property 'title'\n",
        )
        .unwrap();
        fs::write(dir.path().join("summary.json"), "{}").unwrap();

        let s = summarize_logs(dir.path(), &OutputClassifier::default()).unwrap();
        assert_eq!(s.summary.total_files, 2);
        assert_eq!(s.summary.valid_files, 1);
        assert_eq!(s.compliance_analysis.overall_compliance, 50.0);
        assert_eq!(s.results[0].file, "out/poam.json");
        assert_eq!(s.results[0].exit_code, Some(1));
        assert_eq!(s.results[1].doc_type.as_deref(), Some("ssp"));
        assert_eq!(s.must_fix.len(), 1);
        assert_eq!(s.must_fix[0].file.as_deref(), Some("poam.json"));
    }

    #[test]
    fn unrecognized_body_still_reports_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ap.log"), "# File: out/ap.json
something happened
").unwrap();
        let s = summarize_logs(dir.path(), &OutputClassifier::default()).unwrap();
        assert!(!s.results[0].valid);
        assert_eq!(
            s.results[0].errors,
            vec!["Validation failed: log shows no success indicator"]
        );
    }
}
