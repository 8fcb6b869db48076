use serde::{Deserialize, Serialize};

/// Tool metadata stamped on generated reports and manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: crate::TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Result of validating one artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileValidation {
    pub file: String,
    /// Validator short code, when the document type was detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub validation_method: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_output: String,
}

impl FileValidation {
    /// A failure produced without a validator verdict.
    pub fn failure(file: impl Into<String>, method: &str, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            doc_type: None,
            valid: false,
            exit_code: None,
            validation_method: method.to_string(),
            errors: vec![message.into()],
            warnings: Vec::new(),
            raw_output: String::new(),
        }
    }
}

/// Overall verdict of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    NoFiles,
    PipelineError,
    Error,
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ComplianceStatus::Compliant => "COMPLIANT",
            ComplianceStatus::NonCompliant => "NON_COMPLIANT",
            ComplianceStatus::NoFiles => "NO_FILES",
            ComplianceStatus::PipelineError => "PIPELINE_ERROR",
            ComplianceStatus::Error => "ERROR",
        })
    }
}

/// Submission readiness band of a compliance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Readiness {
    Ready,
    NearlyReady,
    RequiresWork,
    NotReady,
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Readiness::Ready => "READY",
            Readiness::NearlyReady => "NEARLY_READY",
            Readiness::RequiresWork => "REQUIRES_WORK",
            Readiness::NotReady => "NOT_READY",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    Critical,
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    SchemaValidation,
    BestPractice,
    Pipeline,
}

/// One must-fix or nice-to-have item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub severity: IssueSeverity,
    pub category: IssueCategory,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_directory: Option<String>,
    pub total_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    pub files_with_warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAnalysis {
    /// Percentage of valid files, 0 to 100.
    pub overall_compliance: f64,
    pub status: ComplianceStatus,
    pub total_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Readiness>,
    pub readiness_assessment: String,
    pub next_steps: Vec<String>,
}

/// Timing and location of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub start_time: String,
    pub duration_secs: f64,
    pub oscal_directory: String,
    pub validation_directory: String,
    pub pipeline_version: String,
    /// States visited, in order.
    pub states: Vec<String>,
}

/// Aggregated result of a validation run, written as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub summary: SummaryCounts,
    pub results: Vec<FileValidation>,
    pub must_fix: Vec<Issue>,
    pub nice_to_have: Vec<Issue>,
    pub compliance_analysis: ComplianceAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_metadata: Option<PipelineMetadata>,
}

impl ValidationSummary {
    pub fn status(&self) -> ComplianceStatus {
        self.compliance_analysis.status
    }

    /// Process exit code for this verdict. `NO_FILES` passes only when
    /// the caller allows an empty directory.
    pub fn exit_code(&self, allow_empty: bool) -> i32 {
        match self.status() {
            ComplianceStatus::Compliant => 0,
            ComplianceStatus::NoFiles if allow_empty => 0,
            _ => 1,
        }
    }
}

/// One entry of `must_fix_checklist.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub priority: String,
    pub title: String,
    pub description: String,
    pub file: String,
    pub action_required: String,
    pub status: String,
    pub assigned_to: String,
    pub due_date: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub title: String,
    pub generated: String,
    pub generator: ToolInfo,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub title: String,
    pub overview: String,
    pub key_findings: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: String,
    pub title: String,
    pub description: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FedrampChecklistStatus {
    pub status: String,
    pub required_artifacts: Vec<String>,
    pub present_artifacts: Vec<String>,
    pub compliance_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct M2415Status {
    pub machine_readable: bool,
    pub automation_ready: bool,
    pub status: ComplianceStatus,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlGapsNote {
    pub status: String,
    pub notes: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appendices {
    pub fedramp_checklist_status: FedrampChecklistStatus,
    pub m24_15_compliance: M2415Status,
    pub sp_800_53_gaps: ControlGapsNote,
}

/// Contents of `detailed_validation_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedReport {
    pub report_metadata: ReportMetadata,
    pub executive_summary: ExecutiveSummary,
    pub validation_results: ValidationSummary,
    pub recommendations: Vec<Recommendation>,
    pub appendices: Appendices,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_screaming() {
        assert_eq!(
            serde_json::to_string(&ComplianceStatus::NonCompliant).unwrap(),
            "\"NON_COMPLIANT\""
        );
        assert_eq!(
            serde_json::to_string(&Readiness::NearlyReady).unwrap(),
            "\"NEARLY_READY\""
        );
        assert_eq!(ComplianceStatus::PipelineError.to_string(), "PIPELINE_ERROR");
        assert_eq!(
            serde_json::to_string(&IssueCategory::SchemaValidation).unwrap(),
            "\"schema_validation\""
        );
    }

    #[test]
    fn failure_factory_is_invalid_with_one_error() {
        let f = FileValidation::failure("ssp.xml", "local", "Could not determine OSCAL document type");
        assert!(!f.valid);
        assert_eq!(f.errors.len(), 1);
        assert!(f.doc_type.is_none());
    }
}
