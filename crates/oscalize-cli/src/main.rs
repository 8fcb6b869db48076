use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use oscalize_core::compliance::check_directory;
use oscalize_core::config::Config;
use oscalize_core::convert::{TracingObserver, convert};
use oscalize_core::corpus::run_corpus;
use oscalize_core::io::write::write_json_pretty;
use oscalize_core::packaging::manifest::{MANIFEST_FILE, ManifestDocument};
use oscalize_core::packaging::{create_bundle, generate_manifest, verify_bundle, verify_manifest};
use oscalize_core::report::render;
use oscalize_core::validation::logs::summarize_logs;
use oscalize_core::validation::parse::OutputClassifier;
use oscalize_core::validation::{OscalCliValidator, ValidationPipeline, Validator};

mod args;

use args::{Args, Command, OutputFormat};

const SUCCESS: i32 = 0;
const FAILURE: i32 = 1;

fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn emit(format: OutputFormat, json: Value, text: impl FnOnce() -> String) -> Result<()> {
    let output = match format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&json)?),
        OutputFormat::Text => text(),
    };
    print!("{output}");
    Ok(())
}

fn exit_code(ok: bool) -> i32 {
    if ok { SUCCESS } else { FAILURE }
}

fn default_bundle_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "oscal".to_string());
    dir.with_file_name(format!("{name}-bundle"))
}

fn run(args: &Args) -> Result<i32> {
    let config = Config::load(args.config.as_deref())?;
    let format = args.format;

    let code = match &args.command {
        Command::Convert { inputs, output } => {
            let report = convert(inputs, output, &config, &TracingObserver)?;
            emit(format, serde_json::to_value(&report)?, || {
                render::render_conversion(&report)
            })?;
            exit_code(report.is_success())
        }

        Command::Validate {
            dir,
            validation_dir,
            allow_empty,
        } => {
            let validator = OscalCliValidator::new(config.validator.clone());
            let summary = ValidationPipeline::new(dir, validation_dir.as_deref(), &validator).run();
            emit(format, serde_json::to_value(&summary)?, || {
                render::render_validation(&summary)
            })?;
            summary.exit_code(*allow_empty)
        }

        Command::ValidationSummary { dir, output } => {
            let classifier = OutputClassifier::from_config(&config.validator);
            let summary = summarize_logs(dir, &classifier)?;
            if let Some(path) = output {
                write_json_pretty(path, &summary)?;
            }
            emit(format, serde_json::to_value(&summary)?, || {
                render::render_validation(&summary)
            })?;
            summary.exit_code(false)
        }

        Command::ResolveProfile { profile, output } => {
            let validator = OscalCliValidator::new(config.validator.clone());
            validator.resolve_profile(profile, output)?;
            let value = json!({
                "profile": profile.display().to_string(),
                "output": output.display().to_string(),
                "resolved": true,
            });
            emit(format, value, || {
                format!("Resolved {} -> {}\n", profile.display(), output.display())
            })?;
            SUCCESS
        }

        Command::ComplianceCheck { dir } => {
            let report = check_directory(dir);
            emit(format, serde_json::to_value(&report)?, || {
                render::render_compliance(&report)
            })?;
            exit_code(report.compliant && report.error.is_none())
        }

        Command::Manifest { dir, output } => {
            let manifest = generate_manifest(dir)?;
            let path = output.clone().unwrap_or_else(|| dir.join(MANIFEST_FILE));
            let doc = ManifestDocument { manifest };
            write_json_pretty(&path, &doc)?;
            emit(format, serde_json::to_value(&doc)?, || {
                format!(
                    "Manifest: {}\nFiles: {}\nIntegrity hash: {}\n",
                    path.display(),
                    doc.manifest.files.len(),
                    doc.manifest.integrity.manifest_hash.value
                )
            })?;
            SUCCESS
        }

        Command::VerifyManifest { manifest } => {
            let v = verify_manifest(manifest);
            emit(format, serde_json::to_value(&v)?, || {
                render::render_verification(&v)
            })?;
            exit_code(v.valid)
        }

        Command::Bundle { dir, output } => {
            let out = output.clone().unwrap_or_else(|| default_bundle_dir(dir));
            let report = create_bundle(dir, &out)?;
            emit(format, serde_json::to_value(&report)?, || {
                render::render_bundle(&report)
            })?;
            SUCCESS
        }

        Command::VerifyBundle { dir } => {
            let v = verify_bundle(dir);
            emit(format, serde_json::to_value(&v)?, || {
                render::render_verification(&v)
            })?;
            exit_code(v.valid)
        }

        Command::CorpusTest { dir } => {
            let report = run_corpus(dir, &config)?;
            emit(format, serde_json::to_value(&report)?, || {
                render::render_corpus(&report)
            })?;
            exit_code(report.passed())
        }

        Command::Doctor => {
            let validator = OscalCliValidator::new(config.validator.clone());
            let (value, ok) = match validator.check_environment() {
                Ok(version) => (
                    json!({"validator": validator.program(), "available": true, "version": version}),
                    true,
                ),
                Err(e) => (
                    json!({"validator": validator.program(), "available": false, "error": e.to_string()}),
                    false,
                ),
            };
            emit(format, value.clone(), || match &value["version"] {
                Value::String(v) => format!("{}: {v}\n", validator.program()),
                _ => format!(
                    "{}: unavailable ({})\n",
                    validator.program(),
                    value["error"].as_str().unwrap_or_default()
                ),
            })?;
            exit_code(ok)
        }
    };
    Ok(code)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let code = run(&args)?;
    std::process::exit(code);
}
