//! The external schema validator, behind a trait so batches can run
//! against a fake.

use std::io;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::parse::OutputClassifier;
use super::process::{ProcessOutput, run_with_timeout};
use crate::config::ValidatorConfig;
use crate::error::ValidatorError;
use crate::oscal::ArtifactKind;
use crate::report::model::FileValidation;

pub const METHOD_LOCAL: &str = "local";
pub const METHOD_ERROR: &str = "error";

/// A schema oracle for OSCAL documents.
///
/// `validate` never fails: launch problems and timeouts come back as an
/// invalid `FileValidation` for that one file.
pub trait Validator {
    /// Probe the validator once before a batch. Returns its version text.
    fn check_environment(&self) -> Result<String, ValidatorError>;

    fn validate(&self, path: &Path, kind: ArtifactKind) -> FileValidation;
}

/// Runs `oscal-cli` (or a configured replacement) as a subprocess.
#[derive(Debug, Clone)]
pub struct OscalCliValidator {
    config: ValidatorConfig,
    classifier: OutputClassifier,
}

impl OscalCliValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        let classifier = OutputClassifier::from_config(&config);
        Self { config, classifier }
    }

    pub fn program(&self) -> &str {
        &self.config.program
    }

    fn launch_error(&self, source: io::Error) -> ValidatorError {
        if source.kind() == io::ErrorKind::NotFound {
            ValidatorError::NotFound(self.config.program.clone())
        } else {
            ValidatorError::Launch {
                program: self.config.program.clone(),
                source,
            }
        }
    }

    fn run_checked(&self, args: &[&str], timeout_secs: u64) -> Result<ProcessOutput, ValidatorError> {
        let output = run_with_timeout(
            &self.config.program,
            args,
            Duration::from_secs(timeout_secs),
        )
        .map_err(|e| self.launch_error(e))?;
        if output.timed_out {
            return Err(ValidatorError::Timeout {
                program: self.config.program.clone(),
                secs: timeout_secs,
            });
        }
        if !output.success() {
            return Err(ValidatorError::Failed {
                program: self.config.program.clone(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Resolve a profile into a catalog with `<program> profile resolve`.
    pub fn resolve_profile(&self, profile: &Path, output: &Path) -> Result<(), ValidatorError> {
        let profile = profile.display().to_string();
        let target = output.display().to_string();
        info!(profile = %profile, output = %target, "resolving profile");
        self.run_checked(
            &["profile", "resolve", &profile, &target],
            self.config.profile_timeout_secs,
        )?;
        Ok(())
    }
}

impl Validator for OscalCliValidator {
    fn check_environment(&self) -> Result<String, ValidatorError> {
        let output = self.run_checked(&["--version"], self.config.version_timeout_secs)?;
        let version = output.combined().trim().to_string();
        info!(program = %self.config.program, version = %version, "validator available");
        Ok(version)
    }

    fn validate(&self, path: &Path, kind: ArtifactKind) -> FileValidation {
        let file = path.display().to_string();
        let doc_type = kind.code();
        debug!(file = %file, doc_type, "validating");

        let args = [doc_type, "validate", file.as_str()];
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match run_with_timeout(&self.config.program, &args, timeout) {
            Ok(output) => output,
            Err(e) => {
                warn!(file = %file, error = %e, "validator launch failed");
                let mut result = FileValidation::failure(
                    file,
                    METHOD_ERROR,
                    format!("Validation system error: {e}"),
                );
                result.doc_type = Some(doc_type.to_string());
                return result;
            }
        };

        if output.timed_out {
            warn!(file = %file, secs = self.config.timeout_secs, "validation timed out");
            let mut result = FileValidation::failure(
                file,
                METHOD_LOCAL,
                format!(
                    "Validation failed: timed out after {}s",
                    self.config.timeout_secs
                ),
            );
            result.doc_type = Some(doc_type.to_string());
            result.raw_output = output.combined();
            return result;
        }

        let raw_output = output.combined();
        let mut parsed = self.classifier.parse(&raw_output);
        let valid = output.code == Some(0);
        if !valid && parsed.errors.is_empty() {
            // A rejected file always carries at least one must-fix item.
            let code = output
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            parsed
                .errors
                .push(format!("Validation failed: validator exited with code {code}"));
        }
        FileValidation {
            file,
            doc_type: Some(doc_type.to_string()),
            valid,
            exit_code: output.code,
            validation_method: METHOD_LOCAL.to_string(),
            errors: parsed.errors,
            warnings: parsed.warnings,
            raw_output,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable shell script standing in for the validator.
    fn fake_program(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-oscal-cli");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn validator(program: String) -> OscalCliValidator {
        OscalCliValidator::new(ValidatorConfig {
            program,
            timeout_secs: 5,
            ..ValidatorConfig::default()
        })
    }

    #[test]
    fn missing_program_fails_environment_check() {
        let v = validator("oscalize-missing-validator".into());
        assert!(matches!(
            v.check_environment(),
            Err(ValidatorError::NotFound(p)) if p == "oscalize-missing-validator"
        ));
    }

    #[test]
    fn version_probe_returns_output() {
        let dir = tempfile::tempdir().unwrap();
        let v = validator(fake_program(dir.path(), "echo 'oscal-cli 1.0.3'"));
        assert_eq!(v.check_environment().unwrap(), "oscal-cli 1.0.3");
    }

    #[test]
    fn nonzero_version_probe_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let v = validator(fake_program(dir.path(), "echo broken >&2; exit 2"));
        assert!(matches!(
            v.check_environment(),
            Err(ValidatorError::Failed { code: Some(2), .. })
        ));
    }

    #[test]
    fn invalid_file_collects_errors_from_output() {
        let dir = tempfile::tempdir().unwrap();
        let v = validator(fake_program(
            dir.path(),
            "echo \"Schema validation error: missing required property 'title'\" >&2; exit 1",
        ));
        let result = v.validate(Path::new("ssp.json"), ArtifactKind::SystemSecurityPlan);
        assert!(!result.valid);
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.doc_type.as_deref(), Some("ssp"));
        assert_eq!(result.validation_method, METHOD_LOCAL);
        assert_eq!(
            result.errors,
            vec!["Schema validation error: missing required property 'title'"]
        );
    }

    #[test]
    fn receives_doc_type_and_path_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let v = validator(fake_program(dir.path(), "echo \"$1 $2 $3\""));
        let result = v.validate(Path::new("poam.json"), ArtifactKind::PlanOfActionAndMilestones);
        assert!(result.valid);
        assert_eq!(result.raw_output.trim(), "poam validate poam.json");
        assert!(result.errors.is_empty());
    }

    #[test]
    fn silent_rejection_still_reports_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let v = validator(fake_program(dir.path(), "echo done; exit 3"));
        let result = v.validate(Path::new("ar.json"), ArtifactKind::AssessmentResults);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec!["Validation failed: validator exited with code 3"]
        );
    }

    #[test]
    fn launch_failure_is_a_per_file_result() {
        let v = validator("oscalize-missing-validator".into());
        let result = v.validate(Path::new("ap.json"), ArtifactKind::AssessmentPlan);
        assert!(!result.valid);
        assert_eq!(result.validation_method, METHOD_ERROR);
        assert!(result.errors[0].starts_with("Validation system error:"));
    }
}
