//! CIR to OSCAL conversion run.
//!
//! Responsibilities:
//! - Read CIR inputs, detect their kind and gate them through the CIR validator
//! - Normalize accepted inputs and map them to artifacts
//! - Write each artifact only once it is fully built
//!
//! Non-responsibilities:
//! - Reading source documents (CIR arrives already extracted)
//! - Validating artifacts against the OSCAL schema (see `validation`)
//!
//! A failure in one input or one artifact is recorded in the report and
//! never stops the others.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cir::model::DocumentCir;
use crate::cir::processor::process;
use crate::cir::validate::{CirValidationReport, validate_cir};
use crate::cir::{Cir, CirBundle, CirKind};
use crate::config::Config;
use crate::error::{CirError, MappingError};
use crate::io::write::write_json_pretty;
use crate::mapper::{
    AssessmentPlanMapper, AssessmentResultsMapper, InventoryMapper, MapContext, Mapper,
    PoamMapper, SspMapper,
};
use crate::oscal::ArtifactKind;

/// Stages of a conversion run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvertPhase {
    Reading,
    Validating,
    Mapping,
    Writing,
}

/// Receives progress of a conversion run.
pub trait ProgressObserver {
    fn phase(&self, phase: ConvertPhase);

    fn step(&self, _phase: ConvertPhase, _message: &str) {}
}

/// Reports progress through `tracing`.
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn phase(&self, phase: ConvertPhase) {
        info!(?phase, "conversion phase");
    }

    fn step(&self, phase: ConvertPhase, message: &str) {
        debug!(?phase, "{message}");
    }
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn phase(&self, _phase: ConvertPhase) {}
}

/// Which artifact a document CIR feeds, decided by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentRoute {
    SystemSecurityPlan,
    AssessmentPlan,
    AssessmentResults,
}

impl DocumentRoute {
    /// Route by the CIR file name, then by the recorded source file.
    pub fn detect(input: &Path, source_file: &str) -> Self {
        let names = [
            input
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            Path::new(source_file)
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
        ];
        for name in &names {
            if name.contains("sap")
                || name.contains("assessment-plan")
                || name.contains("assessment_plan")
            {
                return DocumentRoute::AssessmentPlan;
            }
            if name.contains("sar")
                || name.contains("assessment-results")
                || name.contains("assessment_results")
            {
                return DocumentRoute::AssessmentResults;
            }
        }
        DocumentRoute::SystemSecurityPlan
    }
}

/// Outcome of reading and gating one CIR input.
#[derive(Debug, Clone, Serialize)]
pub struct InputReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<CirKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<DocumentRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<CirValidationReport>,
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WrittenArtifact {
    pub artifact: ArtifactKind,
    pub path: String,
}

/// An input or artifact that could not be produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionFailure {
    /// Input path or artifact root key.
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    pub output_dir: String,
    pub inputs: Vec<InputReport>,
    pub artifacts: Vec<WrittenArtifact>,
    pub failures: Vec<ConversionFailure>,
}

impl ConversionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.artifacts.is_empty()
    }

    fn fail(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        let failure = ConversionFailure {
            subject: subject.into(),
            message: message.into(),
        };
        warn!(subject = %failure.subject, "{}", failure.message);
        self.failures.push(failure);
    }
}

/// Artifacts held in memory, in output order.
#[derive(Debug, Default)]
pub struct BuiltArtifacts {
    pub artifacts: Vec<(ArtifactKind, Value)>,
}

impl BuiltArtifacts {
    pub fn get(&self, kind: ArtifactKind) -> Option<&Value> {
        self.artifacts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v)
    }
}

/// Read a CIR file and detect its kind.
pub fn read_cir(path: &Path) -> Result<(CirKind, Value), CirError> {
    let text = fs::read_to_string(path).map_err(|source| CirError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| CirError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let kind = CirKind::detect(&value).ok_or_else(|| CirError::UnknownKind(path.to_path_buf()))?;
    Ok((kind, value))
}

/// Gate a raw CIR value and deserialize it when accepted.
pub fn load_cir(
    path: &Path,
    kind: CirKind,
    value: Value,
) -> (CirValidationReport, Result<Cir, CirError>) {
    let report = validate_cir(kind, &value);
    if !report.valid {
        let errors = report
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect();
        return (
            report,
            Err(CirError::Rejected {
                path: path.to_path_buf(),
                errors,
            }),
        );
    }
    for issue in &report.warnings {
        warn!(file = %path.display(), path = %issue.path, "{}", issue.message);
    }
    let cir = Cir::from_value(kind, value).map_err(|source| CirError::Shape {
        path: path.to_path_buf(),
        kind: kind.as_str(),
        source,
    });
    (report, cir)
}

#[derive(Default)]
struct Inputs {
    bundle: CirBundle,
    plans: Vec<DocumentCir>,
    results: Vec<DocumentCir>,
}

fn replace<T>(slot: &mut Option<T>, value: T, kind: CirKind, path: &Path) {
    if slot.is_some() {
        warn!(file = %path.display(), %kind, "replacing earlier input of the same kind");
    }
    *slot = Some(value);
}

fn gather(
    paths: &[PathBuf],
    observer: &dyn ProgressObserver,
    report: &mut ConversionReport,
) -> Inputs {
    let mut inputs = Inputs::default();

    observer.phase(ConvertPhase::Reading);
    let mut raw = Vec::new();
    for path in paths {
        observer.step(ConvertPhase::Reading, &path.display().to_string());
        match read_cir(path) {
            Ok((kind, value)) => raw.push((path, kind, value)),
            Err(err) => {
                report.inputs.push(InputReport {
                    path: path.display().to_string(),
                    kind: None,
                    route: None,
                    validation: None,
                    accepted: false,
                });
                report.fail(path.display().to_string(), err.to_string());
            }
        }
    }

    observer.phase(ConvertPhase::Validating);
    for (path, kind, value) in raw {
        observer.step(ConvertPhase::Validating, &path.display().to_string());
        let (validation, loaded) = load_cir(path, kind, value);
        let mut entry = InputReport {
            path: path.display().to_string(),
            kind: Some(kind),
            route: None,
            validation: Some(validation),
            accepted: loaded.is_ok(),
        };

        match loaded.map(|cir| process(&cir)) {
            Err(err) => report.fail(path.display().to_string(), err.to_string()),
            Ok(Cir::Document(doc)) => {
                let route = DocumentRoute::detect(path, &doc.metadata.source_file);
                entry.route = Some(route);
                match route {
                    DocumentRoute::SystemSecurityPlan => {
                        replace(&mut inputs.bundle.document, doc, kind, path)
                    }
                    DocumentRoute::AssessmentPlan => inputs.plans.push(doc),
                    DocumentRoute::AssessmentResults => inputs.results.push(doc),
                }
            }
            Ok(Cir::Poam(p)) => replace(&mut inputs.bundle.poam, p, kind, path),
            Ok(Cir::Inventory(i)) => replace(&mut inputs.bundle.inventory, i, kind, path),
            Ok(Cir::Controls(c)) => replace(&mut inputs.bundle.controls, c, kind, path),
        }
        report.inputs.push(entry);
    }

    inputs
}

fn record<T: Serialize>(
    built: &mut BuiltArtifacts,
    report: &mut ConversionReport,
    kind: ArtifactKind,
    result: Result<T, MappingError>,
) {
    let value = result
        .map_err(|e| e.to_string())
        .and_then(|doc| serde_json::to_value(doc).map_err(|e| e.to_string()));
    match value {
        Ok(value) => built.artifacts.push((kind, value)),
        Err(message) => report.fail(kind.root_key(), message),
    }
}

/// Read, gate, process and map `paths` without touching the output
/// directory.
pub fn build_artifacts(
    paths: &[PathBuf],
    ctx: &MapContext,
    observer: &dyn ProgressObserver,
    report: &mut ConversionReport,
) -> BuiltArtifacts {
    let inputs = gather(paths, observer, report);
    let mut built = BuiltArtifacts::default();

    observer.phase(ConvertPhase::Mapping);
    let bundle = &inputs.bundle;

    // The SSP folds in POA&M gaps, controls and, as its last step, the
    // final inventory.
    if bundle.document.is_some() {
        observer.step(ConvertPhase::Mapping, "system security plan");
        record(
            &mut built,
            report,
            ArtifactKind::SystemSecurityPlan,
            SspMapper::new(ctx).map(bundle),
        );
    }
    if let Some(poam) = &bundle.poam {
        observer.step(ConvertPhase::Mapping, "plan of action and milestones");
        record(
            &mut built,
            report,
            ArtifactKind::PlanOfActionAndMilestones,
            PoamMapper::new(ctx).map(poam),
        );
    }
    if let Some(inventory) = &bundle.inventory {
        observer.step(ConvertPhase::Mapping, "component definition");
        record(
            &mut built,
            report,
            ArtifactKind::ComponentDefinition,
            InventoryMapper::new(ctx).map(inventory),
        );
    }
    if let Some(doc) = last(&inputs.plans, ArtifactKind::AssessmentPlan) {
        observer.step(ConvertPhase::Mapping, "assessment plan");
        record(
            &mut built,
            report,
            ArtifactKind::AssessmentPlan,
            AssessmentPlanMapper::new(ctx).map(doc),
        );
    }
    if let Some(doc) = last(&inputs.results, ArtifactKind::AssessmentResults) {
        observer.step(ConvertPhase::Mapping, "assessment results");
        record(
            &mut built,
            report,
            ArtifactKind::AssessmentResults,
            AssessmentResultsMapper::new(ctx).map(doc),
        );
    }

    if bundle.is_empty() && inputs.plans.is_empty() && inputs.results.is_empty() {
        report.fail("inputs", "no usable CIR input");
    }
    built
}

// One output file per artifact type: the last input of a route wins.
fn last(docs: &[DocumentCir], kind: ArtifactKind) -> Option<&DocumentCir> {
    if docs.len() > 1 {
        warn!(
            artifact = %kind,
            count = docs.len(),
            "several inputs for one artifact, using the last"
        );
    }
    docs.last()
}

/// Convert `paths` into OSCAL artifacts under `output_dir`.
///
/// Only an unusable output directory is an error; every other failure is
/// recorded in the returned report.
pub fn convert(
    paths: &[PathBuf],
    output_dir: &Path,
    config: &Config,
    observer: &dyn ProgressObserver,
) -> Result<ConversionReport> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory: {}", output_dir.display()))?;

    let ctx = MapContext::new(&config.mapping);
    let mut report = ConversionReport {
        output_dir: output_dir.display().to_string(),
        ..Default::default()
    };
    let built = build_artifacts(paths, &ctx, observer, &mut report);

    observer.phase(ConvertPhase::Writing);
    for (kind, value) in &built.artifacts {
        let Some(name) = kind.file_name() else {
            continue;
        };
        let path = output_dir.join(name);
        match write_json_pretty(&path, value) {
            Ok(()) => {
                info!(file = %path.display(), artifact = %kind, "wrote artifact");
                report.artifacts.push(WrittenArtifact {
                    artifact: *kind,
                    path: path.display().to_string(),
                });
            }
            Err(err) => report.fail(kind.root_key(), format!("{err:#}")),
        }
    }

    info!(
        written = report.artifacts.len(),
        failures = report.failures.len(),
        "conversion finished"
    );
    Ok(report)
}
