//! Batch validation of an output directory.
//!
//! Responsibilities:
//! - Drive the run through its states in a fixed order
//! - Check the validator once, before touching any file
//! - Validate candidates one at a time and absorb per-file failures
//! - Write per-file logs and the three report files
//!
//! Non-responsibilities:
//! - Invoking the validator binary (handled by a `Validator`)
//! - Scoring policy (handled in `validation::classify`)
//! - Mapping the verdict to a process exit code (handled by the caller)

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use super::classify;
use super::discover::{Candidate, discover};
use super::oracle::{METHOD_LOCAL, Validator};
use crate::io::write::write_json_pretty;
use crate::mapper::base::now_timestamp;
use crate::report::detailed::{detailed_report, must_fix_checklist};
use crate::report::model::{ComplianceStatus, FileValidation, PipelineMetadata, ValidationSummary};

pub const PIPELINE_VERSION: &str = "1.0";
pub const SUMMARY_FILE: &str = "summary.json";
pub const DETAILED_REPORT_FILE: &str = "detailed_validation_report.json";
pub const CHECKLIST_FILE: &str = "must_fix_checklist.json";
pub const LOG_HEADER_PREFIX: &str = "# ";

const UNKNOWN_TYPE: &str = "Could not determine OSCAL document type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Initializing,
    DiscoveringFiles,
    Validating,
    Aggregating,
    Reporting,
    Done,
    Error,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Initializing => "INITIALIZING",
            PipelineState::DiscoveringFiles => "DISCOVERING_FILES",
            PipelineState::Validating => "VALIDATING",
            PipelineState::Aggregating => "AGGREGATING",
            PipelineState::Reporting => "REPORTING",
            PipelineState::Done => "DONE",
            PipelineState::Error => "ERROR",
        }
    }
}

/// One validation run over `oscal_dir`.
pub struct ValidationPipeline<'a> {
    oscal_dir: PathBuf,
    validation_dir: PathBuf,
    validator: &'a dyn Validator,
    states: Vec<PipelineState>,
    started: Option<(Instant, String)>,
}

impl<'a> ValidationPipeline<'a> {
    /// Logs and reports go to `validation_dir`, or `<oscal_dir>/validation`.
    pub fn new(oscal_dir: &Path, validation_dir: Option<&Path>, validator: &'a dyn Validator) -> Self {
        Self {
            oscal_dir: oscal_dir.to_path_buf(),
            validation_dir: validation_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| oscal_dir.join("validation")),
            validator,
            states: Vec::new(),
            started: None,
        }
    }

    pub fn validation_dir(&self) -> &Path {
        &self.validation_dir
    }

    /// States entered so far, in order.
    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }

    fn enter(&mut self, state: PipelineState) {
        info!(state = state.as_str(), "validation pipeline");
        self.states.push(state);
    }

    fn dir_label(&self) -> String {
        self.validation_dir.display().to_string()
    }

    fn metadata(&self) -> PipelineMetadata {
        let (duration_secs, start_time) = match &self.started {
            Some((instant, ts)) => (instant.elapsed().as_secs_f64(), ts.clone()),
            None => (0.0, now_timestamp()),
        };
        PipelineMetadata {
            start_time,
            duration_secs,
            oscal_directory: self.oscal_dir.display().to_string(),
            validation_directory: self.dir_label(),
            pipeline_version: PIPELINE_VERSION.to_string(),
            states: self.states.iter().map(|s| s.as_str().to_string()).collect(),
        }
    }

    fn fail(&mut self, status: ComplianceStatus, message: String) -> ValidationSummary {
        error!(error = %message, "validation pipeline failed");
        self.enter(PipelineState::Error);
        let dir = self.dir_label();
        let mut summary = classify::pipeline_error(&now_timestamp(), Some(&dir), &message);
        summary.compliance_analysis.status = status;
        summary.pipeline_metadata = Some(self.metadata());
        summary
    }

    /// Run to `DONE` or `ERROR`. Never panics on tool or file failures.
    pub fn run(mut self) -> ValidationSummary {
        self.started = Some((Instant::now(), now_timestamp()));

        self.enter(PipelineState::Initializing);
        if !self.oscal_dir.is_dir() {
            let message = format!("OSCAL directory not found: {}", self.oscal_dir.display());
            return self.fail(ComplianceStatus::PipelineError, message);
        }
        if let Err(e) = self.validator.check_environment() {
            return self.fail(ComplianceStatus::PipelineError, e.to_string());
        }

        self.enter(PipelineState::DiscoveringFiles);
        let candidates = match discover(&self.oscal_dir) {
            Ok(c) => c,
            Err(e) => return self.fail(ComplianceStatus::PipelineError, format!("{e:#}")),
        };
        if candidates.is_empty() {
            warn!(dir = %self.oscal_dir.display(), "no OSCAL files found");
            self.enter(PipelineState::Done);
            let description = format!("No OSCAL files found in {}", self.oscal_dir.display());
            let dir = self.dir_label();
            let mut summary = classify::no_files(&now_timestamp(), Some(&dir), &description);
            summary.pipeline_metadata = Some(self.metadata());
            return summary;
        }

        self.enter(PipelineState::Validating);
        let results: Vec<FileValidation> = candidates.iter().map(|c| self.validate_one(c)).collect();

        self.enter(PipelineState::Aggregating);
        if let Err(e) = write_logs(&self.validation_dir, &results) {
            return self.fail(ComplianceStatus::Error, format!("{e:#}"));
        }
        let dir = self.dir_label();
        let mut summary = classify::summarize(results, &now_timestamp(), Some(&dir), "");

        self.enter(PipelineState::Reporting);
        // DONE is recorded before the reports are written so it appears in them.
        self.enter(PipelineState::Done);
        summary.pipeline_metadata = Some(self.metadata());
        if let Err(e) = write_reports(&self.validation_dir, &summary) {
            self.states.pop();
            return self.fail(ComplianceStatus::Error, format!("{e:#}"));
        }
        info!(
            status = %summary.status(),
            score = summary.compliance_analysis.overall_compliance,
            "validation complete"
        );
        summary
    }

    fn validate_one(&self, candidate: &Candidate) -> FileValidation {
        let result = match candidate.kind {
            Some(kind) => self.validator.validate(&candidate.path, kind),
            None => FileValidation::failure(
                candidate.path.display().to_string(),
                METHOD_LOCAL,
                UNKNOWN_TYPE,
            ),
        };
        if result.valid {
            info!(file = %candidate.path.display(), "validation passed");
        } else {
            error!(
                file = %candidate.path.display(),
                errors = result.errors.len(),
                "validation failed"
            );
        }
        result
    }
}

fn log_text(result: &FileValidation, timestamp: &str) -> String {
    let exit_code = result
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let mut out = String::new();
    for (key, value) in [
        ("OSCAL Validation Report", None),
        ("File", Some(result.file.as_str())),
        ("Timestamp", Some(timestamp)),
        ("Method", Some(result.validation_method.as_str())),
        ("Doc-Type", Some(result.doc_type.as_deref().unwrap_or("unknown"))),
        ("Valid", Some(if result.valid { "true" } else { "false" })),
        ("Exit-Code", Some(exit_code.as_str())),
    ] {
        out.push_str(LOG_HEADER_PREFIX);
        match value {
            Some(v) => out.push_str(&format!("{key}: {v}\n")),
            None => out.push_str(&format!("{key}\n")),
        }
    }

    let body = if result.raw_output.trim().is_empty() {
        result.errors.join("\n")
    } else {
        result.raw_output.trim_end().to_string()
    };
    if !body.is_empty() {
        out.push_str(&body);
        out.push('\n');
    }
    // Keep the log self-describing when a failing tool printed nothing
    // a reader would recognize as failure.
    if !result.valid && !super::logs::has_failure_indicator(&body) {
        out.push_str(&format!("validation failed (exit code {exit_code})\n"));
    }
    if result.valid && !super::logs::body_is_valid(&body) {
        out.push_str("validation passed\n");
    }
    out
}

/// Log file name for each result: `<stem>.log`, or `<file name>.log` when
/// two candidates share a stem.
fn log_names(results: &[FileValidation]) -> Vec<String> {
    let mut used = HashSet::new();
    results
        .iter()
        .map(|r| {
            let path = Path::new(&r.file);
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("artifact")
                .to_string();
            let name = if used.insert(stem.clone()) {
                stem
            } else {
                path.file_name()
                    .and_then(|s| s.to_str())
                    .map(String::from)
                    .unwrap_or(stem)
            };
            format!("{name}.log")
        })
        .collect()
}

fn write_logs(dir: &Path, results: &[FileValidation]) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create validation directory: {}", dir.display()))?;
    let timestamp = now_timestamp();
    for (result, name) in results.iter().zip(log_names(results)) {
        let path = dir.join(name);
        fs::write(&path, log_text(result, &timestamp))
            .with_context(|| format!("failed to write validation log: {}", path.display()))?;
    }
    Ok(())
}

fn write_reports(dir: &Path, summary: &ValidationSummary) -> Result<()> {
    let generated = now_timestamp();
    write_json_pretty(&dir.join(SUMMARY_FILE), summary)?;
    write_json_pretty(
        &dir.join(DETAILED_REPORT_FILE),
        &detailed_report(summary, &generated),
    )?;
    write_json_pretty(&dir.join(CHECKLIST_FILE), &must_fix_checklist(summary))?;
    Ok(())
}
