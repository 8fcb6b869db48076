//! Regulatory cross-scoring of an artifact directory.
//!
//! Responsibilities:
//! - Discover OSCAL JSON artifacts through the shared root-key table
//! - Run the four fixed checks and sum their scores out of 400
//! - AND the per-check verdicts into one compliance flag
//! - Derive readiness, next steps and priority actions
//!
//! Non-responsibilities:
//! - Schema validation (handled in `validation`)
//! - Writing the report (handled by the caller)
//!
//! No check reads configuration. Each one is a pure function of the
//! discovered artifacts.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::io::read::read_json;
use crate::mapper::base::now_timestamp;
use crate::oscal::ArtifactKind;
use crate::report::model::ComplianceStatus;

pub const M24_15: &str = "M-24-15";
pub const FEDRAMP: &str = "FedRAMP";
pub const NIST_800_53: &str = "NIST SP 800-53";
pub const OSCAL_FORMAT: &str = "OSCAL Format";

pub const REQUIRED_FAMILIES: [&str; 18] = [
    "AC", "AT", "AU", "CA", "CM", "CP", "IA", "IR", "MA", "MP", "PE", "PL", "PS", "RA", "SA",
    "SC", "SI", "SR",
];
const FAMILY_COVERAGE_THRESHOLD: f64 = 0.8;
const LOW_CONTROL_COUNT: usize = 50;

const FEDRAMP_INDICATORS: [&str; 5] = [
    "fedramp",
    "cloud service provider",
    "authorization boundary",
    "fips 199",
    "customer responsibility matrix",
];
const FEDRAMP_INDICATOR_POINTS: u32 = 4;
const FEDRAMP_CONTENT_CAP: u32 = 20;
const MAX_PRIORITY_ACTIONS: usize = 5;

/// A parsed artifact found in the checked directory.
#[derive(Debug, Clone)]
pub struct DiscoveredArtifact {
    pub file: PathBuf,
    pub kind: ArtifactKind,
    pub content: Value,
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub compliant: bool,
    pub score: u32,
    pub violations: Vec<String>,
    pub recommendations: Vec<String>,
    pub details: Value,
}

impl CheckResult {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            compliant: true,
            score: 0,
            violations: Vec::new(),
            recommendations: Vec::new(),
            details: json!({}),
        }
    }

    fn detail(&mut self, key: &str, value: impl Into<Value>) {
        if let Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value.into());
        }
    }

    fn detail_flag(&self, key: &str) -> Option<bool> {
        self.details.get(key).and_then(Value::as_bool)
    }

    /// Record a failed requirement that breaks compliance.
    fn violate(&mut self, message: impl Into<String>) {
        self.compliant = false;
        self.violations.push(message.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessLevel {
    ProductionReady,
    NearReady,
    Development,
    Initial,
}

impl ReadinessLevel {
    pub fn assess(score: f64, compliant: bool) -> Self {
        if compliant && score >= 95.0 {
            ReadinessLevel::ProductionReady
        } else if compliant && score >= 85.0 {
            ReadinessLevel::NearReady
        } else if score >= 70.0 {
            ReadinessLevel::Development
        } else {
            ReadinessLevel::Initial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub overall_status: ComplianceStatus,
    /// Score formatted as `NN.N%`.
    pub compliance_score: String,
    pub violations_count: usize,
    pub readiness_level: ReadinessLevel,
    pub next_steps: Vec<String>,
    pub priority_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub timestamp: String,
    pub directory: String,
    pub artifacts_found: usize,
    pub compliant: bool,
    /// Sum of check scores over 400, as a percentage.
    pub compliance_score: f64,
    pub checks_performed: Vec<CheckResult>,
    pub violations: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ComplianceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComplianceReport {
    pub fn status(&self) -> ComplianceStatus {
        if self.compliant {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::NonCompliant
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks_performed.iter().find(|c| c.name == name)
    }
}

type Check = fn(&[DiscoveredArtifact]) -> CheckResult;

/// Order is report order.
const CHECKS: [(&str, Check); 4] = [
    (M24_15, check_m24_15),
    (FEDRAMP, check_fedramp),
    (NIST_800_53, check_nist_800_53),
    (OSCAL_FORMAT, check_oscal_format),
];

/// Every `*.json` file in `dir` whose root key is a known artifact type.
/// Unreadable files are skipped with a warning.
pub fn discover_artifacts(dir: &Path) -> Vec<DiscoveredArtifact> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
        .collect();
    paths.sort();

    let mut found = Vec::new();
    for path in paths {
        let content = match read_json(&path) {
            Ok(v) => v,
            Err(e) => {
                warn!(file = %path.display(), error = %format!("{e:#}"), "skipping unreadable JSON");
                continue;
            }
        };
        if let Some(kind) = ArtifactKind::detect_json(&content) {
            found.push(DiscoveredArtifact {
                file: path,
                kind,
                content,
            });
        }
    }
    info!(dir = %dir.display(), count = found.len(), "discovered artifacts for compliance");
    found
}

/// `uuid` and `metadata.title` under an SSP, POA&M, AP, AR or component
/// definition root.
pub fn has_valid_structure(content: &Value) -> bool {
    let Some(kind) = ArtifactKind::detect_json(content) else {
        return false;
    };
    if matches!(kind, ArtifactKind::Catalog | ArtifactKind::Profile) {
        return false;
    }
    let root = &content[kind.root_key()];
    root.get("uuid").is_some()
        && root
            .get("metadata")
            .and_then(Value::as_object)
            .is_some_and(|m| m.contains_key("title"))
}

fn has_kind(artifacts: &[DiscoveredArtifact], kind: ArtifactKind) -> bool {
    artifacts.iter().any(|a| a.kind == kind)
}

fn count_valid(artifacts: &[DiscoveredArtifact]) -> usize {
    artifacts
        .iter()
        .filter(|a| has_valid_structure(&a.content))
        .count()
}

pub fn check_m24_15(artifacts: &[DiscoveredArtifact]) -> CheckResult {
    let mut r = CheckResult::new(M24_15);

    let machine_readable = !artifacts.is_empty();
    if machine_readable {
        r.score += 25;
    } else {
        r.violate("No machine-readable OSCAL artifacts found");
    }
    r.detail("machine_readable", machine_readable);

    let standardized = artifacts.iter().any(|a| a.kind.is_package_artifact());
    if standardized {
        r.score += 25;
    } else {
        r.violate("No standardized OSCAL artifacts found");
    }
    r.detail("standardized_format", standardized);

    let valid = count_valid(artifacts);
    let automated = valid == artifacts.len();
    if automated {
        r.score += 25;
    } else {
        // Reported, but not a compliance failure.
        r.violations.push(format!(
            "Some artifacts may not support automated processing ({valid}/{} valid)",
            artifacts.len()
        ));
    }
    r.detail("automated_processing", automated);

    let ssp = has_kind(artifacts, ArtifactKind::SystemSecurityPlan);
    if ssp {
        r.score += 25;
    } else {
        r.violate("Required System Security Plan not found");
    }
    r.detail("required_ssp", ssp);

    if !machine_readable {
        r.recommendations
            .push("Generate machine-readable OSCAL artifacts".to_string());
    }
    if !ssp {
        r.recommendations
            .push("Create System Security Plan in OSCAL format".to_string());
    }
    r
}

/// 4 points per distinct indicator found anywhere in the artifacts.
pub fn fedramp_content_score(artifacts: &[DiscoveredArtifact]) -> u32 {
    let mut found = BTreeSet::new();
    for artifact in artifacts {
        let text = artifact.content.to_string().to_lowercase();
        for indicator in FEDRAMP_INDICATORS {
            if text.contains(indicator) {
                found.insert(indicator);
            }
        }
    }
    (found.len() as u32 * FEDRAMP_INDICATOR_POINTS).min(FEDRAMP_CONTENT_CAP)
}

pub fn check_fedramp(artifacts: &[DiscoveredArtifact]) -> CheckResult {
    let mut r = CheckResult::new(FEDRAMP);

    let ssp = has_kind(artifacts, ArtifactKind::SystemSecurityPlan);
    if ssp {
        r.score += 40;
    } else {
        r.violate("FedRAMP requires System Security Plan");
    }
    r.detail("ssp_present", ssp);

    let poam = has_kind(artifacts, ArtifactKind::PlanOfActionAndMilestones);
    if poam {
        r.score += 40;
    } else {
        r.violate("FedRAMP requires Plan of Action and Milestones");
    }
    r.detail("poam_present", poam);

    let content = fedramp_content_score(artifacts);
    r.score += content;
    r.detail("fedramp_content_score", content);
    if content < FEDRAMP_CONTENT_CAP {
        r.violations
            .push("Artifacts lack FedRAMP-specific content".to_string());
    }

    if !ssp {
        r.recommendations
            .push("Create FedRAMP System Security Plan".to_string());
    }
    if !poam {
        r.recommendations
            .push("Create Plan of Action and Milestones".to_string());
    }
    if content < FEDRAMP_CONTENT_CAP {
        r.recommendations
            .push("Enhance artifacts with FedRAMP-specific content".to_string());
    }
    r
}

/// Leading letters of a control ID before `-` or `.`, uppercased.
///
/// Accepts both `AC-2(1)` and the catalog form `ac-2.1`.
pub fn control_family(control_id: &str) -> Option<String> {
    let upper = control_id.trim().to_uppercase();
    let (prefix, _) = upper.split_once(['-', '.'])?;
    (!prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| prefix.to_string())
}

fn implemented_controls(ssp: &Value) -> impl Iterator<Item = &str> {
    ssp["system-security-plan"]["control-implementation"]["implemented-requirements"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|req| req.get("control-id").and_then(Value::as_str))
}

pub fn check_nist_800_53(artifacts: &[DiscoveredArtifact]) -> CheckResult {
    let mut r = CheckResult::new(NIST_800_53);

    let ssps: Vec<_> = artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::SystemSecurityPlan)
        .collect();
    if ssps.is_empty() {
        r.violate("No SSP found for NIST SP 800-53 control analysis");
        r.detail("implemented_controls", 0);
        return r;
    }

    let mut controls = BTreeSet::new();
    let mut families = BTreeSet::new();
    for ssp in ssps {
        for id in implemented_controls(&ssp.content) {
            controls.insert(id.to_string());
            if let Some(family) = control_family(id) {
                families.insert(family);
            }
        }
    }
    r.detail("implemented_controls", controls.len());
    r.detail(
        "control_families",
        families.iter().cloned().collect::<Vec<_>>(),
    );

    let covered = REQUIRED_FAMILIES
        .iter()
        .filter(|f| families.contains(**f))
        .count();
    let coverage = covered as f64 / REQUIRED_FAMILIES.len() as f64;
    r.score = (coverage * 100.0) as u32;

    if coverage < FAMILY_COVERAGE_THRESHOLD {
        let missing: Vec<&str> = REQUIRED_FAMILIES
            .iter()
            .copied()
            .filter(|f| !families.contains(*f))
            .collect();
        r.violate(format!(
            "Insufficient control family coverage: missing {}",
            missing.join(", ")
        ));
    }
    if controls.len() < LOW_CONTROL_COUNT {
        r.violations
            .push("Low number of implemented controls".to_string());
        r.recommendations
            .push("Implement more NIST SP 800-53 controls".to_string());
    }
    r
}

pub fn check_oscal_format(artifacts: &[DiscoveredArtifact]) -> CheckResult {
    let mut r = CheckResult::new(OSCAL_FORMAT);
    if artifacts.is_empty() {
        r.violate("No artifacts to check for OSCAL format compliance");
        return r;
    }

    let valid = count_valid(artifacts);
    let rate = valid as f64 / artifacts.len() as f64;
    r.score = (rate * 100.0) as u32;
    r.detail("valid_artifacts", valid);
    r.detail("total_artifacts", artifacts.len());
    r.detail("compliance_rate", rate);

    if valid < artifacts.len() {
        r.violate(format!(
            "{} artifacts have OSCAL format issues",
            artifacts.len() - valid
        ));
        r.recommendations
            .push("Fix OSCAL format validation errors".to_string());
    }
    r
}

fn next_steps(score: f64, violations: usize) -> Vec<String> {
    let mut steps = Vec::new();
    if violations > 0 {
        steps.push("Address compliance violations".to_string());
    }
    if score < 85.0 {
        steps.push("Improve compliance score to 85% or higher".to_string());
    } else {
        steps.push("Review recommendations for final optimization".to_string());
        steps.push("Prepare for compliance review".to_string());
    }
    steps
}

fn priority_actions(report: &ComplianceReport) -> Vec<String> {
    let flag_false = |check: &str, key: &str| {
        report
            .check(check)
            .and_then(|c| c.detail_flag(key))
            .is_some_and(|v| !v)
    };
    let mut actions = Vec::new();
    if flag_false(M24_15, "machine_readable") {
        actions.push("Generate machine-readable OSCAL artifacts".to_string());
    }
    if flag_false(FEDRAMP, "ssp_present") {
        actions.push("Create System Security Plan".to_string());
    }
    if flag_false(FEDRAMP, "poam_present") {
        actions.push("Create Plan of Action and Milestones".to_string());
    }
    if report.check(OSCAL_FORMAT).is_some_and(|c| !c.compliant) {
        actions.push("Fix OSCAL format validation errors".to_string());
    }
    actions.truncate(MAX_PRIORITY_ACTIONS);
    actions
}

fn summarize(report: &ComplianceReport) -> ComplianceSummary {
    ComplianceSummary {
        overall_status: report.status(),
        compliance_score: format!("{:.1}%", report.compliance_score),
        violations_count: report.violations.len(),
        readiness_level: ReadinessLevel::assess(report.compliance_score, report.compliant),
        next_steps: next_steps(report.compliance_score, report.violations.len()),
        priority_actions: priority_actions(report),
    }
}

/// Score already-discovered artifacts.
pub fn check_artifacts(directory: &str, artifacts: &[DiscoveredArtifact]) -> ComplianceReport {
    let mut report = ComplianceReport {
        timestamp: now_timestamp(),
        directory: directory.to_string(),
        artifacts_found: artifacts.len(),
        compliant: true,
        compliance_score: 0.0,
        checks_performed: Vec::new(),
        violations: Vec::new(),
        recommendations: Vec::new(),
        summary: None,
        error: None,
    };

    if artifacts.is_empty() {
        report.compliant = false;
        report
            .violations
            .push("No OSCAL artifacts found for compliance checking".to_string());
        return report;
    }

    let mut total = 0;
    for (name, check) in CHECKS {
        let result = check(artifacts);
        info!(check = name, score = result.score, compliant = result.compliant, "compliance check");
        total += result.score;
        report.compliant &= result.compliant;
        report.violations.extend(result.violations.iter().cloned());
        report
            .recommendations
            .extend(result.recommendations.iter().cloned());
        report.checks_performed.push(result);
    }
    let max = (CHECKS.len() * 100) as f64;
    report.compliance_score = f64::from(total) / max * 100.0;
    report.summary = Some(summarize(&report));
    report
}

/// Discover and score every artifact in `dir`.
pub fn check_directory(dir: &Path) -> ComplianceReport {
    let label = dir.display().to_string();
    if !dir.is_dir() {
        let message = format!("Directory not found: {label}");
        warn!(dir = %label, "compliance directory not found");
        return ComplianceReport {
            timestamp: now_timestamp(),
            directory: label,
            artifacts_found: 0,
            compliant: false,
            compliance_score: 0.0,
            checks_performed: Vec::new(),
            violations: vec![message.clone()],
            recommendations: vec!["Fix the underlying issue and re-run compliance check".to_string()],
            summary: None,
            error: Some(message),
        };
    }
    check_artifacts(&label, &discover_artifacts(dir))
}
