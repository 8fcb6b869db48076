//! Verdict engine for validation batches.
//!
//! Responsibilities:
//! - Sort per-file errors and warnings into must-fix and nice-to-have items
//! - Score a batch and derive its status and readiness band
//! - Build the summary shapes for empty and failed runs
//!
//! Non-responsibilities:
//! - Running the validator (handled in `validation::oracle`)
//! - Writing reports to disk (handled in `validation::pipeline`)
//!
//! The policy is fixed and reproduced exactly:
//!
//!   - score = valid / total × 100
//!   - 100 → COMPLIANT, anything lower → NON_COMPLIANT
//!   - 100 → READY, ≥ 90 → NEARLY_READY, ≥ 75 → REQUIRES_WORK, else NOT_READY

use crate::report::model::{
    ComplianceAnalysis, ComplianceStatus, FileValidation, Issue, IssueCategory, IssueSeverity,
    Readiness, SummaryCounts, ValidationSummary,
};

pub const NEARLY_READY_THRESHOLD: f64 = 90.0;
pub const REQUIRES_WORK_THRESHOLD: f64 = 75.0;

pub fn readiness(score: f64) -> Readiness {
    if score >= 100.0 {
        Readiness::Ready
    } else if score >= NEARLY_READY_THRESHOLD {
        Readiness::NearlyReady
    } else if score >= REQUIRES_WORK_THRESHOLD {
        Readiness::RequiresWork
    } else {
        Readiness::NotReady
    }
}

pub fn readiness_assessment(level: Readiness) -> &'static str {
    match level {
        Readiness::Ready => "READY - All OSCAL artifacts validated successfully",
        Readiness::NearlyReady => "NEARLY_READY - Minor issues require resolution",
        Readiness::RequiresWork => "REQUIRES_WORK - Significant validation issues present",
        Readiness::NotReady => "NOT_READY - Major validation failures must be addressed",
    }
}

pub fn next_steps(score: f64) -> Vec<String> {
    let mut steps: Vec<&str> = if score >= 100.0 {
        vec![
            "Proceed with OSCAL artifact deployment",
            "Consider automated validation in CI/CD pipeline",
            "Review artifacts with stakeholders for final approval",
        ]
    } else {
        vec![
            "Review and fix all MUST-FIX validation errors",
            "Address NICE-TO-HAVE warnings where feasible",
            "Re-run validation after fixes",
            "Update source documents if structural changes needed",
        ]
    };
    if score < REQUIRES_WORK_THRESHOLD {
        steps.insert(0, "Review OSCAL structure and mapping configuration");
    }
    steps.into_iter().map(String::from).collect()
}

/// Score a non-empty batch.
pub fn analyze(results: &[FileValidation]) -> ComplianceAnalysis {
    let total_files = results.len();
    let valid_files = results.iter().filter(|r| r.valid).count();
    let overall_compliance = if total_files == 0 {
        0.0
    } else {
        valid_files as f64 / total_files as f64 * 100.0
    };
    let level = readiness(overall_compliance);

    ComplianceAnalysis {
        overall_compliance,
        status: if valid_files == total_files && total_files > 0 {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::NonCompliant
        },
        total_files,
        valid_files,
        invalid_files: total_files - valid_files,
        readiness: Some(level),
        readiness_assessment: readiness_assessment(level).to_string(),
        next_steps: next_steps(overall_compliance),
    }
}

/// Display name of a result's file: the bare file name when it has one.
fn display_name(file: &str) -> &str {
    std::path::Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file)
}

/// Every error is must-fix, every warning is nice-to-have.
pub fn categorize(result: &FileValidation) -> (Vec<Issue>, Vec<Issue>) {
    let name = display_name(&result.file);
    let must_fix = result
        .errors
        .iter()
        .map(|e| Issue {
            title: format!("Validation Error in {name}"),
            description: e.clone(),
            file: Some(name.to_string()),
            severity: IssueSeverity::Error,
            category: IssueCategory::SchemaValidation,
            action: "Fix validation error to ensure OSCAL compliance".to_string(),
        })
        .collect();
    let nice_to_have = result
        .warnings
        .iter()
        .map(|w| Issue {
            title: format!("Validation Warning in {name}"),
            description: w.clone(),
            file: Some(name.to_string()),
            severity: IssueSeverity::Warning,
            category: IssueCategory::BestPractice,
            action: "Consider addressing to improve OSCAL quality".to_string(),
        })
        .collect();
    (must_fix, nice_to_have)
}

/// Aggregate per-file results into a summary.
///
/// An empty `results` slice yields the `NO_FILES` summary.
pub fn summarize(
    results: Vec<FileValidation>,
    timestamp: &str,
    validation_dir: Option<&str>,
    empty_description: &str,
) -> ValidationSummary {
    if results.is_empty() {
        return no_files(timestamp, validation_dir, empty_description);
    }

    let mut must_fix = Vec::new();
    let mut nice_to_have = Vec::new();
    for result in &results {
        let (errors, warnings) = categorize(result);
        must_fix.extend(errors);
        nice_to_have.extend(warnings);
    }

    let compliance_analysis = analyze(&results);
    ValidationSummary {
        summary: SummaryCounts {
            timestamp: timestamp.to_string(),
            validation_directory: validation_dir.map(String::from),
            total_files: results.len(),
            valid_files: compliance_analysis.valid_files,
            invalid_files: compliance_analysis.invalid_files,
            files_with_warnings: results.iter().filter(|r| !r.warnings.is_empty()).count(),
        },
        results,
        must_fix,
        nice_to_have,
        compliance_analysis,
        pipeline_metadata: None,
    }
}

fn empty_analysis(status: ComplianceStatus, assessment: String) -> ComplianceAnalysis {
    ComplianceAnalysis {
        overall_compliance: 0.0,
        status,
        total_files: 0,
        valid_files: 0,
        invalid_files: 0,
        readiness: None,
        readiness_assessment: assessment,
        next_steps: Vec::new(),
    }
}

pub fn no_files(timestamp: &str, validation_dir: Option<&str>, description: &str) -> ValidationSummary {
    ValidationSummary {
        summary: SummaryCounts {
            timestamp: timestamp.to_string(),
            validation_directory: validation_dir.map(String::from),
            ..SummaryCounts::default()
        },
        results: Vec::new(),
        must_fix: vec![Issue {
            title: "No OSCAL Files Found".to_string(),
            description: description.to_string(),
            file: None,
            severity: IssueSeverity::Error,
            category: IssueCategory::Pipeline,
            action: "Generate OSCAL files using conversion pipeline".to_string(),
        }],
        nice_to_have: Vec::new(),
        compliance_analysis: empty_analysis(
            ComplianceStatus::NoFiles,
            "No OSCAL files available for validation".to_string(),
        ),
        pipeline_metadata: None,
    }
}

pub fn pipeline_error(timestamp: &str, validation_dir: Option<&str>, message: &str) -> ValidationSummary {
    ValidationSummary {
        summary: SummaryCounts {
            timestamp: timestamp.to_string(),
            validation_directory: validation_dir.map(String::from),
            ..SummaryCounts::default()
        },
        results: Vec::new(),
        must_fix: vec![Issue {
            title: "Validation Pipeline Error".to_string(),
            description: message.to_string(),
            file: None,
            severity: IssueSeverity::Critical,
            category: IssueCategory::Pipeline,
            action: "Fix pipeline configuration and retry".to_string(),
        }],
        nice_to_have: Vec::new(),
        compliance_analysis: empty_analysis(
            ComplianceStatus::PipelineError,
            format!("Pipeline error: {message}"),
        ),
        pipeline_metadata: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(file: &str, valid: bool, errors: &[&str], warnings: &[&str]) -> FileValidation {
        FileValidation {
            file: file.to_string(),
            doc_type: Some("ssp".into()),
            valid,
            exit_code: Some(if valid { 0 } else { 1 }),
            validation_method: "local".into(),
            errors: errors.iter().map(|s| s.to_string()).collect(),
            warnings: warnings.iter().map(|s| s.to_string()).collect(),
            raw_output: String::new(),
        }
    }

    #[test]
    fn readiness_bands() {
        assert_eq!(readiness(100.0), Readiness::Ready);
        assert_eq!(readiness(92.0), Readiness::NearlyReady);
        assert_eq!(readiness(90.0), Readiness::NearlyReady);
        assert_eq!(readiness(76.0), Readiness::RequiresWork);
        assert_eq!(readiness(75.0), Readiness::RequiresWork);
        assert_eq!(readiness(50.0), Readiness::NotReady);
    }

    #[test]
    fn four_of_five_valid_is_eighty_and_non_compliant() {
        let mut results: Vec<_> = (0..4)
            .map(|i| result(&format!("f{i}.json"), true, &[], &[]))
            .collect();
        results.push(result("bad.json", false, &["ERROR: x"], &[]));
        let a = analyze(&results);
        assert_eq!(a.overall_compliance, 80.0);
        assert_eq!(a.status, ComplianceStatus::NonCompliant);
        assert_eq!(a.readiness, Some(Readiness::RequiresWork));
        assert_eq!(a.invalid_files, 1);
    }

    #[test]
    fn next_steps_depend_on_score() {
        assert_eq!(next_steps(100.0)[0], "Proceed with OSCAL artifact deployment");
        assert_eq!(next_steps(80.0).len(), 4);
        let low = next_steps(40.0);
        assert_eq!(low.len(), 5);
        assert_eq!(low[0], "Review OSCAL structure and mapping configuration");
    }

    #[test]
    fn errors_are_must_fix_and_warnings_nice_to_have() {
        let r = result(
            "/out/ssp.json",
            false,
            &["Schema validation error: missing required property 'title'"],
            &["warning: long remarks"],
        );
        let summary = summarize(vec![r], "2026-01-01T00:00:00Z", None, "");
        assert_eq!(summary.must_fix.len(), 1);
        let item = &summary.must_fix[0];
        assert_eq!(item.title, "Validation Error in ssp.json");
        assert_eq!(item.category, IssueCategory::SchemaValidation);
        assert_eq!(item.severity, IssueSeverity::Error);
        assert_eq!(summary.nice_to_have[0].category, IssueCategory::BestPractice);
        assert_eq!(summary.summary.files_with_warnings, 1);
        assert_eq!(summary.status(), ComplianceStatus::NonCompliant);
    }

    #[test]
    fn empty_batch_is_no_files() {
        let s = summarize(Vec::new(), "t", Some("v"), "No OSCAL files found in out");
        assert_eq!(s.status(), ComplianceStatus::NoFiles);
        assert_eq!(s.must_fix[0].title, "No OSCAL Files Found");
        assert_eq!(s.exit_code(false), 1);
        assert_eq!(s.exit_code(true), 0);
    }

    #[test]
    fn all_valid_is_compliant_and_exits_zero() {
        let s = summarize(vec![result("a.json", true, &[], &[])], "t", None, "");
        assert_eq!(s.status(), ComplianceStatus::Compliant);
        assert_eq!(s.exit_code(false), 0);
    }

    #[test]
    fn pipeline_error_is_critical() {
        let s = pipeline_error("t", None, "validator program `oscal-cli` was not found on PATH");
        assert_eq!(s.status(), ComplianceStatus::PipelineError);
        assert_eq!(s.must_fix[0].severity, IssueSeverity::Critical);
        assert_eq!(s.exit_code(true), 1);
    }
}
