//! Runtime configuration loaded from TOML.
//!
//! Every field has a default so an empty or absent file yields a working
//! configuration. Resolution order is an explicit path, then
//! `OSCALIZE_CONFIG`, then `./oscalize.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::oscal::props::PropertyPolicy;

const ENV_CONFIG_PATH: &str = "OSCALIZE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "oscalize.toml";

pub const DEFAULT_IMPORT_PROFILE: &str = "https://raw.githubusercontent.com/usnistgov/oscal-content/master/nist.gov/SP800-53/rev5/json/NIST_SP-800-53_rev5_LOW-baseline_profile.json";
pub const DEFAULT_EXTENSION_NAMESPACE: &str = "https://fedramp.gov/ns/oscal";

/// External validator settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Program invoked as `<program> <doc-type> validate <path>`.
    pub program: String,
    pub timeout_secs: u64,
    pub profile_timeout_secs: u64,
    pub version_timeout_secs: u64,
    /// Substrings marking an output line as an error.
    pub error_keywords: Vec<String>,
    /// Substrings marking an output line as a warning.
    pub warning_keywords: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            program: "oscal-cli".to_string(),
            timeout_secs: 60,
            profile_timeout_secs: 120,
            version_timeout_secs: 10,
            error_keywords: [
                "error",
                "invalid",
                "failed",
                "violation",
                "constraint",
                "schema",
                "not valid",
                "missing",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            warning_keywords: vec!["warning".to_string(), "warn".to_string()],
        }
    }
}

/// Artifact construction settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MappingConfig {
    pub property_policy: PropertyPolicy,
    /// Namespace for properties outside the default OSCAL vocabulary.
    pub extension_namespace: String,
    pub import_profile: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            property_policy: PropertyPolicy::default(),
            extension_namespace: DEFAULT_EXTENSION_NAMESPACE.to_string(),
            import_profile: DEFAULT_IMPORT_PROFILE.to_string(),
        }
    }
}

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub validator: ValidatorConfig,
    pub mapping: MappingConfig,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read a specific config file. A missing file is an error.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Resolve configuration from an explicit path, the environment, or
    /// the working directory, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            return Self::from_file(&PathBuf::from(path));
        }

        let implicit = Path::new(DEFAULT_CONFIG_PATH);
        if implicit.is_file() {
            tracing::debug!(path = %implicit.display(), "loading config from working directory");
            return Self::from_file(implicit);
        }

        Ok(Self::default())
    }
}
