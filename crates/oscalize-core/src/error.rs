//! Typed errors for the conversion and validation pipeline.
//!
//! Per-record input defects are never errors: they are logged and replaced
//! with defaults. Per-file validation failures are values carried in the
//! validation summary. The types here cover what is left.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading or gating CIR input.
#[derive(Debug, Error)]
pub enum CirError {
    #[error("failed to read CIR input {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CIR input {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot determine CIR kind of {0}: expected a sections, rows, assets or controls collection")]
    UnknownKind(PathBuf),

    #[error("CIR input {path} rejected: {errors:?}")]
    Rejected { path: PathBuf, errors: Vec<String> },

    #[error("CIR input {path} does not match the {kind} model: {source}")]
    Shape {
        path: PathBuf,
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures that abort construction of a single artifact.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("property `{name}` is not allowed on {element} in the default OSCAL namespace")]
    DisallowedProperty { element: &'static str, name: String },

    #[error("missing required input for {artifact}: {detail}")]
    MissingInput {
        artifact: &'static str,
        detail: String,
    },
}

/// Failures of the external validator environment.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("validator program `{0}` was not found on PATH")]
    NotFound(String),

    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("`{program}` exited with status {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Failures while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
