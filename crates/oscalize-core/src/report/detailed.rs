//! Derived validation reports: the detailed report and the must-fix
//! checklist. Both are pure functions of a `ValidationSummary`.

use crate::report::model::{
    Appendices, ChecklistItem, ComplianceStatus, ControlGapsNote, DetailedReport,
    ExecutiveSummary, FedrampChecklistStatus, M2415Status, Recommendation, ReportMetadata,
    ToolInfo, ValidationSummary,
};

const REPORT_TITLE: &str = "OSCAL Validation Detailed Report";
const REPORT_VERSION: &str = "1.0";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn executive_summary(summary: &ValidationSummary) -> ExecutiveSummary {
    let counts = &summary.summary;
    ExecutiveSummary {
        title: "OSCAL Validation Executive Summary".to_string(),
        overview: format!(
            "Validated {} OSCAL artifacts with {} passing validation",
            counts.total_files, counts.valid_files
        ),
        key_findings: vec![
            format!(
                "{} critical issues require immediate attention",
                summary.must_fix.len()
            ),
            format!(
                "{} improvement opportunities identified",
                summary.nice_to_have.len()
            ),
            format!(
                "Overall compliance score: {:.1}%",
                summary.compliance_analysis.overall_compliance
            ),
        ],
        recommendation: summary.compliance_analysis.readiness_assessment.clone(),
    }
}

fn recommendations(summary: &ValidationSummary) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if !summary.must_fix.is_empty() {
        out.push(Recommendation {
            priority: "CRITICAL".to_string(),
            title: "Resolve Validation Errors".to_string(),
            description: format!(
                "Address {} critical validation errors blocking compliance",
                summary.must_fix.len()
            ),
            actions: strings(&[
                "Review error details in validation logs",
                "Update source documents or mapping configuration",
                "Re-run validation to verify fixes",
            ]),
        });
    }
    if !summary.nice_to_have.is_empty() {
        out.push(Recommendation {
            priority: "MEDIUM".to_string(),
            title: "Address Validation Warnings".to_string(),
            description: format!(
                "Consider resolving {} warnings to improve OSCAL quality",
                summary.nice_to_have.len()
            ),
            actions: strings(&[
                "Review warning details",
                "Implement best practices",
                "Enhance documentation quality",
            ]),
        });
    }
    out
}

fn appendices(summary: &ValidationSummary) -> Appendices {
    let analysis = &summary.compliance_analysis;
    Appendices {
        fedramp_checklist_status: FedrampChecklistStatus {
            status: "PENDING_REVIEW".to_string(),
            required_artifacts: strings(&["SSP", "POA&M", "IIW"]),
            present_artifacts: summary.results.iter().map(|r| r.file.clone()).collect(),
            compliance_notes: strings(&[
                "Manual review required for FedRAMP Initial Authorization Package completeness",
            ]),
        },
        m24_15_compliance: M2415Status {
            machine_readable: summary.summary.valid_files > 0,
            automation_ready: analysis.overall_compliance >= 100.0,
            status: if analysis.status == ComplianceStatus::Compliant {
                ComplianceStatus::Compliant
            } else {
                ComplianceStatus::NonCompliant
            },
            notes: strings(&[
                "OSCAL artifacts support M-24-15 automation requirements when validation passes",
            ]),
        },
        sp_800_53_gaps: ControlGapsNote {
            status: "AUTOMATED_ANALYSIS_LIMITED".to_string(),
            notes: strings(&[
                "Control implementation analysis requires manual review",
                "POA&M items may indicate control gaps",
                "Review control-implementation sections in SSP for completeness",
            ]),
            recommendations: strings(&[
                "Cross-reference POA&M findings with control implementations",
                "Ensure all required controls are documented",
                "Validate control implementation descriptions for completeness",
            ]),
        },
    }
}

pub fn detailed_report(summary: &ValidationSummary, generated: &str) -> DetailedReport {
    DetailedReport {
        report_metadata: ReportMetadata {
            title: REPORT_TITLE.to_string(),
            generated: generated.to_string(),
            generator: ToolInfo::default(),
            version: REPORT_VERSION.to_string(),
        },
        executive_summary: executive_summary(summary),
        validation_results: summary.clone(),
        recommendations: recommendations(summary),
        appendices: appendices(summary),
    }
}

/// One `MUST-FIX-###` entry per must-fix item, numbered from 1.
pub fn must_fix_checklist(summary: &ValidationSummary) -> Vec<ChecklistItem> {
    summary
        .must_fix
        .iter()
        .enumerate()
        .map(|(i, item)| ChecklistItem {
            id: format!("MUST-FIX-{:03}", i + 1),
            priority: "CRITICAL".to_string(),
            title: item.title.clone(),
            description: item.description.clone(),
            file: item.file.clone().unwrap_or_default(),
            action_required: item.action.clone(),
            status: "OPEN".to_string(),
            assigned_to: String::new(),
            due_date: String::new(),
            notes: String::new(),
        })
        .collect()
}
