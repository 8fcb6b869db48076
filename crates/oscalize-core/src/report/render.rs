use crate::TOOL_NAME;
use crate::compliance::ComplianceReport;
use crate::convert::ConversionReport;
use crate::corpus::CorpusReport;
use crate::packaging::bundle::BundleReport;
use crate::packaging::manifest::ManifestVerification;
use crate::report::model::ValidationSummary;

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("{heading}:\n"));
    for item in items {
        out.push_str(&format!("  - {item}\n"));
    }
}

pub fn render_conversion(report: &ConversionReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{TOOL_NAME} convert\n"));
    out.push_str(&format!("Output directory: {}\n", report.output_dir));
    out.push_str("Inputs:\n");
    for input in &report.inputs {
        let kind = input.kind.map(|k| k.to_string()).unwrap_or_else(|| "unknown".into());
        let state = if input.accepted { "accepted" } else { "rejected" };
        out.push_str(&format!("  - {} [{kind}] {state}\n", input.path));
        if let Some(validation) = &input.validation {
            for issue in &validation.errors {
                out.push_str(&format!("      error {}: {}\n", issue.path, issue.message));
            }
        }
    }
    out.push_str("Artifacts:\n");
    for artifact in &report.artifacts {
        out.push_str(&format!(
            "  - {} -> {}\n",
            artifact.artifact.title(),
            artifact.path
        ));
    }
    let failures: Vec<String> = report
        .failures
        .iter()
        .map(|f| format!("{}: {}", f.subject, f.message))
        .collect();
    push_list(&mut out, "Failures", &failures);
    out
}

pub fn render_validation(summary: &ValidationSummary) -> String {
    let mut out = String::new();
    let counts = &summary.summary;
    let analysis = &summary.compliance_analysis;
    out.push_str(&format!("{TOOL_NAME} validate\n"));
    out.push_str(&format!("Status: {}\n", analysis.status));
    out.push_str(&format!(
        "Files: {} total, {} valid, {} invalid, {} with warnings\n",
        counts.total_files, counts.valid_files, counts.invalid_files, counts.files_with_warnings
    ));
    out.push_str(&format!("Compliance: {:.1}%\n", analysis.overall_compliance));
    if let Some(readiness) = analysis.readiness {
        out.push_str(&format!("Readiness: {readiness}\n"));
    }
    out.push_str(&format!("{}\n", analysis.readiness_assessment));

    if !summary.results.is_empty() {
        out.push_str("Results:\n");
        for r in &summary.results {
            let mark = if r.valid { "ok" } else { "FAIL" };
            let doc_type = r.doc_type.as_deref().unwrap_or("-");
            out.push_str(&format!(
                "  - {mark} {} [{doc_type}] {} error(s), {} warning(s)\n",
                r.file,
                r.errors.len(),
                r.warnings.len()
            ));
        }
    }
    if !summary.must_fix.is_empty() {
        out.push_str("Must fix:\n");
        for issue in &summary.must_fix {
            out.push_str(&format!("  - {}: {}\n", issue.title, issue.description));
        }
    }
    push_list(&mut out, "Next steps", &analysis.next_steps);
    out
}

pub fn render_compliance(report: &ComplianceReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{TOOL_NAME} compliance-check\n"));
    out.push_str(&format!("Directory: {}\n", report.directory));
    if let Some(error) = &report.error {
        out.push_str(&format!("Error: {error}\n"));
        return out;
    }
    out.push_str(&format!("Status: {}\n", report.status()));
    out.push_str(&format!("Artifacts: {}\n", report.artifacts_found));
    out.push_str(&format!("Score: {:.1}%\n", report.compliance_score));
    out.push_str("Checks:\n");
    for check in &report.checks_performed {
        let mark = if check.compliant { "ok" } else { "FAIL" };
        out.push_str(&format!("  - {mark} {} ({}/100)\n", check.name, check.score));
    }
    push_list(&mut out, "Violations", &report.violations);
    push_list(&mut out, "Recommendations", &report.recommendations);
    out
}

pub fn render_verification(v: &ManifestVerification) -> String {
    let mut out = String::new();
    out.push_str(&format!("Manifest: {}\n", v.manifest_file));
    out.push_str(&format!("Valid: {}\n", v.valid));
    out.push_str(&format!(
        "Files: {} checked, {} valid, {} missing, {} modified\n",
        v.files_checked, v.files_valid, v.files_missing, v.files_modified
    ));
    push_list(&mut out, "Errors", &v.errors);
    out
}

pub fn render_bundle(report: &BundleReport) -> String {
    format!(
        "Bundle: {}\nFiles copied: {}\nIntegrity hash: {}\n",
        report.bundle_dir.display(),
        report.files_copied,
        report.integrity_hash
    )
}

pub fn render_corpus(report: &CorpusReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{TOOL_NAME} corpus-test\n"));
    out.push_str(&format!("Corpus: {}\n", report.corpus_directory));
    out.push_str(&format!(
        "Cases: {} total, {} passed, {} failed, {} skipped, {} errors\n",
        report.total, report.passed, report.failed, report.skipped, report.errors
    ));
    out.push_str(&format!("Pass rate: {:.1}%\n", report.pass_rate));
    for case in &report.results {
        out.push_str(&format!("  - {:?} {}\n", case.status, case.name));
        for line in case.errors.iter().chain(&case.differences) {
            out.push_str(&format!("      {line}\n"));
        }
    }
    out.push_str(&format!("{}\n", report.recommendation));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::model::FileValidation;
    use crate::validation::classify::summarize;

    #[test]
    fn validation_text_lists_failures() {
        let mut bad = FileValidation::failure("ssp.json", "local", "Validation failed: bad");
        bad.doc_type = Some("ssp".into());
        let summary = summarize(vec![bad], "2026-01-01T00:00:00Z", None, "none");
        let text = render_validation(&summary);
        assert!(text.contains("Status: NON_COMPLIANT"));
        assert!(text.contains("FAIL ssp.json [ssp] 1 error(s)"));
        assert!(text.contains("Must fix:"));
    }

    #[test]
    fn empty_conversion_lists_failure() {
        let mut report = ConversionReport::default();
        report.failures.push(crate::convert::ConversionFailure {
            subject: "inputs".into(),
            message: "no usable CIR input".into(),
        });
        let text = render_conversion(&report);
        assert!(text.contains("Failures:\n  - inputs: no usable CIR input"));
    }

    #[test]
    fn conversion_lists_artifacts_by_title() {
        let mut report = ConversionReport::default();
        report.artifacts.push(crate::convert::WrittenArtifact {
            artifact: crate::oscal::ArtifactKind::PlanOfActionAndMilestones,
            path: "out/poam.json".into(),
        });
        let text = render_conversion(&report);
        assert!(text.contains("Artifacts:\n  - Plan of Action and Milestones -> out/poam.json\n"));
    }
}
