use std::fs;
use std::path::{Path, PathBuf};

use oscalize_core::compliance::check_directory;
use oscalize_core::config::Config;
use oscalize_core::convert::{NoopObserver, convert};
use oscalize_core::error::ValidatorError;
use oscalize_core::io::write::write_json_pretty;
use oscalize_core::oscal::ArtifactKind;
use oscalize_core::packaging::manifest::{MANIFEST_FILE, ManifestDocument};
use oscalize_core::packaging::{generate_manifest, verify_manifest};
use oscalize_core::report::model::{ComplianceStatus, FileValidation, Readiness};
use oscalize_core::validation::logs::summarize_logs;
use oscalize_core::validation::parse::OutputClassifier;
use oscalize_core::validation::pipeline::{CHECKLIST_FILE, SUMMARY_FILE};
use oscalize_core::validation::{ValidationPipeline, Validator};
use serde_json::{Value, json};

const SCHEMA_ERROR: &str = "Schema validation error: missing required property 'title'";

/// Stands in for the external validator. Files whose name contains
/// `fail_on` get a schema error, everything else passes.
struct FakeValidator {
    fail_on: &'static str,
    classifier: OutputClassifier,
}

impl FakeValidator {
    fn new(fail_on: &'static str) -> Self {
        Self {
            fail_on,
            classifier: OutputClassifier::default(),
        }
    }
}

impl Validator for FakeValidator {
    fn check_environment(&self) -> Result<String, ValidatorError> {
        Ok("fake-oscal-cli 1.0.0".to_string())
    }

    fn validate(&self, path: &Path, kind: ArtifactKind) -> FileValidation {
        let name = path.file_name().unwrap().to_string_lossy();
        let fails = !self.fail_on.is_empty() && name.contains(self.fail_on);
        let output = if fails {
            format!("Validating {name}\n{SCHEMA_ERROR}\n")
        } else {
            "Validation successful\n".to_string()
        };
        let parsed = self.classifier.parse(&output);
        FileValidation {
            file: path.display().to_string(),
            doc_type: Some(kind.code().to_string()),
            valid: !fails,
            exit_code: Some(if fails { 1 } else { 0 }),
            validation_method: "local".to_string(),
            errors: parsed.errors,
            warnings: parsed.warnings,
            raw_output: output,
        }
    }
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
            "description": "Kernel updates are missing",
            "severity": "High",
            "status": "Open",
            "control_ids": ["SI-2"],
            "asset_ids": ["srv-1"]
        }]
    })
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn write_input(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
    path
}

#[test]
fn poam_converts_validates_and_packages() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_input(tmp.path(), "poam-cir.json", &poam_cir());
    let out = tmp.path().join("oscal");

    let report = convert(&[input], &out, &Config::default(), &NoopObserver).unwrap();
    assert!(report.is_success(), "{:?}", report.failures);

    let poam = read_json(&out.join("poam.json"));
    let items = poam["plan-of-action-and-milestones"]["poam-items"]
        .as_array()
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Unpatched OS");

    let fake = FakeValidator::new("");
    let summary = ValidationPipeline::new(&out, None, &fake).run();
    assert_eq!(summary.status(), ComplianceStatus::Compliant);
    assert_eq!(summary.exit_code(false), 0);
    assert_eq!(summary.compliance_analysis.overall_compliance, 100.0);
    assert_eq!(summary.compliance_analysis.readiness, Some(Readiness::Ready));
    assert_eq!(
        summary.pipeline_metadata.as_ref().unwrap().states.last().unwrap(),
        "DONE"
    );

    let validation_dir = out.join("validation");
    let written = read_json(&validation_dir.join(SUMMARY_FILE));
    assert_eq!(written["compliance_analysis"]["status"], "COMPLIANT");
    assert!(validation_dir.join("poam.log").is_file());

    let from_logs = summarize_logs(&validation_dir, &OutputClassifier::default()).unwrap();
    assert_eq!(from_logs.summary.total_files, 1);
    assert_eq!(from_logs.results[0].doc_type.as_deref(), Some("poam"));
    assert_eq!(from_logs.status(), ComplianceStatus::Compliant);

    let compliance = check_directory(&out);
    assert_eq!(compliance.artifacts_found, 1);
    assert!(compliance.check("FedRAMP").is_some());

    let manifest = generate_manifest(&out).unwrap();
    assert!(manifest.files.iter().any(|f| f.path == "poam.json"));
    let manifest_path = out.join(MANIFEST_FILE);
    write_json_pretty(&manifest_path, &ManifestDocument { manifest }).unwrap();
    let verification = verify_manifest(&manifest_path);
    assert!(verification.valid, "{:?}", verification.errors);
}

#[test]
fn one_schema_error_in_five_files_is_non_compliant() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    for (name, root) in [
        ("ssp.json", "system-security-plan"),
        ("poam.json", "plan-of-action-and-milestones"),
        ("component-definition.json", "component-definition"),
        ("sap.json", "assessment-plan"),
        ("sar.json", "assessment-results"),
    ] {
        write_input(dir, name, &json!({ root: {"uuid": "00000000-0000-4000-8000-000000000000"} }));
    }

    let fake = FakeValidator::new("sar");
    let summary = ValidationPipeline::new(dir, None, &fake).run();

    let analysis = &summary.compliance_analysis;
    assert_eq!(analysis.total_files, 5);
    assert_eq!(analysis.valid_files, 4);
    assert_eq!(analysis.overall_compliance, 80.0);
    assert_eq!(analysis.status, ComplianceStatus::NonCompliant);
    assert_eq!(analysis.readiness, Some(Readiness::RequiresWork));
    assert_eq!(summary.exit_code(false), 1);

    assert_eq!(summary.must_fix.len(), 1);
    assert_eq!(summary.must_fix[0].file.as_deref(), Some("sar.json"));
    assert_eq!(summary.must_fix[0].description, SCHEMA_ERROR);

    let failed = summary.results.iter().find(|r| !r.valid).unwrap();
    assert_eq!(failed.doc_type.as_deref(), Some("ar"));

    let checklist = read_json(&dir.join("validation").join(CHECKLIST_FILE));
    assert_eq!(checklist[0]["id"], "MUST-FIX-001");
    let log = fs::read_to_string(dir.join("validation").join("sar.log")).unwrap();
    assert!(log.contains(SCHEMA_ERROR));
}
