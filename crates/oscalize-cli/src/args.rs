use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "oscalize",
    version,
    about = "Convert compliance documents to OSCAL, then validate, score and package the artifacts"
)]
pub struct Args {
    /// Configuration file (defaults to $OSCALIZE_CONFIG, then ./oscalize.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Log at debug level
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log warnings and errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Map CIR JSON inputs to OSCAL artifacts
    Convert {
        /// CIR input files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory for the artifacts
        #[arg(short, long, default_value = "dist/oscal")]
        output: PathBuf,
    },

    /// Validate every OSCAL document in a directory with the external validator
    Validate {
        dir: PathBuf,

        /// Directory for logs and reports (defaults to <dir>/validation)
        #[arg(long)]
        validation_dir: Option<PathBuf>,

        /// Exit 0 when the directory holds no OSCAL documents
        #[arg(long)]
        allow_empty: bool,
    },

    /// Rebuild a validation summary from existing validation logs
    ValidationSummary {
        /// Directory holding `*.log` files
        dir: PathBuf,

        /// Also write the summary to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve an OSCAL profile into a catalog
    ResolveProfile { profile: PathBuf, output: PathBuf },

    /// Score artifacts against M-24-15, FedRAMP, NIST SP 800-53 and OSCAL format checks
    ComplianceCheck { dir: PathBuf },

    /// Write a hashed manifest of an artifact directory
    Manifest {
        dir: PathBuf,

        /// Manifest path (defaults to <dir>/manifest.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check files against a manifest
    VerifyManifest { manifest: PathBuf },

    /// Copy an artifact directory into a self-verifying bundle
    Bundle {
        dir: PathBuf,

        /// Bundle directory (defaults to <dir>-bundle)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a bundle against its embedded manifest
    VerifyBundle { dir: PathBuf },

    /// Run the conversion regression corpus
    CorpusTest { dir: PathBuf },

    /// Check that the external validator is installed
    Doctor,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
