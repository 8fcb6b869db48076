//! Integrity manifests for artifact directories.
//!
//! A manifest lists every artifact-like file in a directory with its size,
//! modification time, SHA-256 and inferred type. The integrity block hashes
//! the sorted concatenation of all file hashes, so any change to any listed
//! file changes it.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::io::read::{FileHash, HASH_ALGORITHM, read_hashed, sha256_hex};
use crate::mapper::base::now_timestamp;
use crate::oscal::ArtifactKind;
use crate::report::model::ToolInfo;
use crate::validation::process::run_with_timeout;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1.0";

const INCLUDED_EXTENSIONS: [&str; 6] = ["json", "xml", "yaml", "yml", "log", "md"];
const GIT_TIMEOUT: Duration = Duration::from_secs(5);

pub const TYPE_VALIDATION_LOG: &str = "validation-log";
pub const TYPE_MANIFEST: &str = "manifest";
pub const TYPE_OSCAL_DOCUMENT: &str = "oscal-document";
pub const TYPE_SUPPORTING: &str = "supporting-document";

/// Name fragments checked in order when the content names no type.
const NAME_RULES: [(&[&str], ArtifactKind); 7] = [
    (&["ssp", "system-security-plan"], ArtifactKind::SystemSecurityPlan),
    (&["poam", "plan-of-action"], ArtifactKind::PlanOfActionAndMilestones),
    (&["assessment-plan"], ArtifactKind::AssessmentPlan),
    (&["assessment-results"], ArtifactKind::AssessmentResults),
    (&["component-definition"], ArtifactKind::ComponentDefinition),
    (&["profile"], ArtifactKind::Profile),
    (&["catalog"], ArtifactKind::Catalog),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OscalMetadata {
    pub title: String,
    pub version: String,
    pub oscal_version: String,
    pub last_modified: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oscal: Option<OscalMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the manifest's directory, `/`-separated.
    pub path: String,
    pub size: u64,
    pub modified: String,
    pub hash: FileHash,
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(default)]
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub total_files: usize,
    pub total_size: u64,
    pub file_types: BTreeMap<String, usize>,
    pub oscal_artifacts: usize,
    pub validation_logs: usize,
    pub supporting_files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestHash {
    pub algorithm: String,
    pub value: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    pub manifest_hash: ManifestHash,
    pub verification_command: String,
    pub hash_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationEnvironment {
    pub working_directory: String,
    pub user: String,
    pub hostname: String,
    pub generator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceControl {
    pub commit: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub generation_environment: GenerationEnvironment,
    pub compliance_frameworks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_control: Option<SourceControl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub generated: String,
    pub generator: ToolInfo,
    pub directory: String,
    pub files: Vec<ManifestEntry>,
    pub summary: ManifestSummary,
    pub integrity: Integrity,
    pub metadata: ManifestMetadata,
}

/// On-disk shape: `{"manifest": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub manifest: Manifest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestVerification {
    pub valid: bool,
    pub timestamp: String,
    pub manifest_file: String,
    pub files_checked: usize,
    pub files_valid: usize,
    pub files_missing: usize,
    pub files_modified: usize,
    pub errors: Vec<String>,
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Manifest type of a file: the detected OSCAL root key, then file-name
/// rules, then the generic buckets.
pub fn file_type(path: &Path, content: Option<&Value>) -> String {
    if let Some(kind) = content.and_then(ArtifactKind::detect_json) {
        return kind.root_key().to_string();
    }
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if let Some((_, kind)) = NAME_RULES
        .iter()
        .find(|(fragments, _)| fragments.iter().any(|f| name.contains(f)))
    {
        return kind.root_key().to_string();
    }
    let ext = extension(path);
    let bucket = if ext == "log" {
        TYPE_VALIDATION_LOG
    } else if name.contains("manifest") {
        TYPE_MANIFEST
    } else if matches!(ext.as_str(), "json" | "xml" | "yaml" | "yml") {
        TYPE_OSCAL_DOCUMENT
    } else {
        TYPE_SUPPORTING
    };
    bucket.to_string()
}

/// The `metadata` block of the first root object that has one.
pub fn oscal_metadata(content: &Value) -> Option<OscalMetadata> {
    let metadata = content
        .as_object()?
        .values()
        .find_map(|root| root.get("metadata").filter(|m| m.is_object()))?;
    let field = |key: &str| {
        metadata
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some(OscalMetadata {
        title: field("title"),
        version: field("version"),
        oscal_version: field("oscal-version"),
        last_modified: field("last-modified"),
    })
}

fn relative_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn analyze(path: &Path, base: &Path) -> Result<ManifestEntry> {
    let hashed = read_hashed(path)?;
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("failed to read modification time: {}", path.display()))?;
    let content = if extension(path) == "json" {
        hashed.json().ok()
    } else {
        None
    };

    Ok(ManifestEntry {
        path: relative_path(path, base),
        size: hashed.size_bytes,
        modified: DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Secs, true),
        file_type: file_type(path, content.as_ref()),
        metadata: EntryMetadata {
            oscal: content.as_ref().and_then(oscal_metadata),
        },
        hash: hashed.hash,
    })
}

/// Files of `dir` (non-recursive) with an included extension, sorted.
/// A `manifest.json` already in `dir` is left out.
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry
            .with_context(|| format!("failed to read directory entry in {}", dir.display()))?
            .path();
        let included = INCLUDED_EXTENSIONS.contains(&extension(&path).as_str());
        let is_manifest = path.file_name().is_some_and(|n| n == MANIFEST_FILE);
        if path.is_file() && included && !is_manifest {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn summarize(files: &[ManifestEntry]) -> ManifestSummary {
    let mut summary = ManifestSummary {
        total_files: files.len(),
        total_size: files.iter().map(|f| f.size).sum(),
        ..ManifestSummary::default()
    };
    for file in files {
        *summary.file_types.entry(file.file_type.clone()).or_default() += 1;
        if ArtifactKind::from_root_key(&file.file_type).is_some() {
            summary.oscal_artifacts += 1;
        } else if file.file_type == TYPE_VALIDATION_LOG {
            summary.validation_logs += 1;
        } else {
            summary.supporting_files += 1;
        }
    }
    summary
}

/// SHA-256 over the sorted, concatenated file hashes. Empty for no files.
pub fn integrity_hash(files: &[ManifestEntry]) -> String {
    if files.is_empty() {
        return String::new();
    }
    let mut hashes: Vec<&str> = files.iter().map(|f| f.hash.value.as_str()).collect();
    hashes.sort_unstable();
    sha256_hex(hashes.concat().as_bytes())
}

fn integrity(files: &[ManifestEntry]) -> Integrity {
    Integrity {
        manifest_hash: ManifestHash {
            algorithm: HASH_ALGORITHM.to_string(),
            value: integrity_hash(files),
            description: "Hash of all file hashes for integrity verification".to_string(),
        },
        verification_command: format!("{} verify-manifest {MANIFEST_FILE}", crate::TOOL_NAME),
        hash_count: files.len(),
    }
}

fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let dir = dir.display().to_string();
    let mut full = vec!["-C", dir.as_str()];
    full.extend_from_slice(args);
    let out = run_with_timeout("git", &full, GIT_TIMEOUT).ok()?;
    out.success()
        .then(|| out.stdout.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn source_control(dir: &Path) -> Option<SourceControl> {
    let commit = git(dir, &["rev-parse", "HEAD"])?;
    let branch = git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_else(|| "unknown".into());
    Some(SourceControl { commit, branch })
}

fn environment_metadata(dir: &Path) -> ManifestMetadata {
    let var = |key: &str| env::var(key).unwrap_or_else(|_| "unknown".to_string());
    ManifestMetadata {
        generation_environment: GenerationEnvironment {
            working_directory: dir.display().to_string(),
            user: var("USER"),
            hostname: var("HOSTNAME"),
            generator: crate::TOOL_NAME.to_string(),
        },
        compliance_frameworks: [
            "NIST OSCAL v1.1.3",
            "OMB M-24-15",
            "FedRAMP",
            "NIST SP 800-53 Rev 5",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        source_control: source_control(dir),
    }
}

pub fn generate_manifest(dir: &Path) -> Result<Manifest> {
    if !dir.is_dir() {
        bail!("artifact directory not found: {}", dir.display());
    }
    let files = collect_files(dir)?
        .iter()
        .map(|p| analyze(p, dir))
        .collect::<Result<Vec<_>>>()?;
    info!(dir = %dir.display(), files = files.len(), "generated manifest");

    Ok(Manifest {
        version: MANIFEST_VERSION.to_string(),
        generated: now_timestamp(),
        generator: ToolInfo::default(),
        directory: dir.display().to_string(),
        summary: summarize(&files),
        integrity: integrity(&files),
        metadata: environment_metadata(dir),
        files,
    })
}

pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    let doc: ManifestDocument = serde_json::from_str(&text)
        .with_context(|| format!("invalid manifest: {}", path.display()))?;
    Ok(doc.manifest)
}

/// Check every listed file under `base` against its recorded hash.
pub fn verify_files(manifest: &Manifest, base: &Path, manifest_file: &str) -> ManifestVerification {
    let mut v = ManifestVerification {
        timestamp: now_timestamp(),
        manifest_file: manifest_file.to_string(),
        ..ManifestVerification::default()
    };
    for entry in &manifest.files {
        v.files_checked += 1;
        let path = base.join(&entry.path);
        if !path.is_file() {
            v.files_missing += 1;
            v.errors.push(format!("Missing file: {}", entry.path));
            continue;
        }
        match read_hashed(&path) {
            Ok(actual) if actual.hash.value == entry.hash.value => v.files_valid += 1,
            Ok(_) => {
                v.files_modified += 1;
                v.errors.push(format!("Hash mismatch: {}", entry.path));
            }
            Err(e) => {
                v.files_modified += 1;
                v.errors.push(format!("{e:#}"));
            }
        }
        debug!(file = %entry.path, "verified manifest entry");
    }
    if integrity_hash(&manifest.files) != manifest.integrity.manifest_hash.value {
        v.errors
            .push("Manifest integrity hash does not match its file list".to_string());
    }
    v.valid = v.errors.is_empty();
    v
}

/// Verify a manifest file. Listed paths resolve against the manifest's
/// recorded directory when it exists, else the manifest's own directory.
///
/// Never fails: unreadable manifests come back invalid with an error.
pub fn verify_manifest(path: &Path) -> ManifestVerification {
    let label = path.display().to_string();
    let manifest = match read_manifest(path) {
        Ok(m) => m,
        Err(e) => {
            return ManifestVerification {
                timestamp: now_timestamp(),
                manifest_file: label,
                errors: vec![format!("{e:#}")],
                ..ManifestVerification::default()
            };
        }
    };
    let recorded = PathBuf::from(&manifest.directory);
    let base = if recorded.is_dir() {
        recorded
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    verify_files(&manifest, &base, &label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::write::write_json_pretty;
    use serde_json::json;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ssp.json"),
            json!({"system-security-plan": {"uuid": "u", "metadata": {"title": "SSP", "version": "1.0", "oscal-version": "1.1.3"}}}).to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "# notes").unwrap();
        fs::write(dir.path().join("run.log"), "ok").unwrap();
        fs::write(dir.path().join("data.json"), "{}").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        dir
    }

    #[test]
    fn file_types_follow_content_then_name_then_bucket() {
        let ssp = json!({"system-security-plan": {}});
        assert_eq!(file_type(Path::new("x.json"), Some(&ssp)), "system-security-plan");
        assert_eq!(file_type(Path::new("my-poam.xml"), None), "plan-of-action-and-milestones");
        assert_eq!(file_type(Path::new("run.log"), None), TYPE_VALIDATION_LOG);
        assert_eq!(file_type(Path::new("old-manifest.json"), None), TYPE_MANIFEST);
        assert_eq!(file_type(Path::new("data.yaml"), None), TYPE_OSCAL_DOCUMENT);
        assert_eq!(file_type(Path::new("notes.md"), None), TYPE_SUPPORTING);
    }

    #[test]
    fn generates_sorted_entries_with_summary() {
        let dir = fixture();
        let m = generate_manifest(dir.path()).unwrap();
        let paths: Vec<_> = m.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["data.json", "notes.md", "run.log", "ssp.json"]);
        assert_eq!(m.summary.oscal_artifacts, 1);
        assert_eq!(m.summary.validation_logs, 1);
        assert_eq!(m.summary.supporting_files, 2);
        assert_eq!(m.integrity.hash_count, 4);
        assert_eq!(m.integrity.manifest_hash.value.len(), 64);

        let ssp = &m.files[3];
        let oscal = ssp.metadata.oscal.as_ref().unwrap();
        assert_eq!(oscal.title, "SSP");
        assert_eq!(oscal.oscal_version, "1.1.3");
        assert!(m.files[0].metadata.oscal.is_none());
    }

    #[test]
    fn integrity_hash_ignores_order() {
        let dir = fixture();
        let mut files = generate_manifest(dir.path()).unwrap().files;
        let forward = integrity_hash(&files);
        files.reverse();
        assert_eq!(integrity_hash(&files), forward);
        assert_eq!(integrity_hash(&[]), "");
    }

    #[test]
    fn verify_detects_modified_and_missing_files() {
        let dir = fixture();
        let manifest = generate_manifest(dir.path()).unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        write_json_pretty(&path, &ManifestDocument { manifest }).unwrap();

        let ok = verify_manifest(&path);
        assert!(ok.valid, "{:?}", ok.errors);
        assert_eq!(ok.files_checked, 4);
        assert_eq!(ok.files_valid, 4);

        fs::write(dir.path().join("notes.md"), "# changed").unwrap();
        fs::remove_file(dir.path().join("run.log")).unwrap();
        let bad = verify_manifest(&path);
        assert!(!bad.valid);
        assert_eq!(bad.files_modified, 1);
        assert_eq!(bad.files_missing, 1);
        assert!(bad.errors.contains(&"Missing file: run.log".to_string()));
        assert!(bad.errors.contains(&"Hash mismatch: notes.md".to_string()));
    }

    #[test]
    fn regenerating_skips_existing_manifest() {
        let dir = fixture();
        let manifest = generate_manifest(dir.path()).unwrap();
        write_json_pretty(&dir.path().join(MANIFEST_FILE), &ManifestDocument { manifest }).unwrap();
        let again = generate_manifest(dir.path()).unwrap();
        assert_eq!(again.files.len(), 4);
    }

    #[test]
    fn unreadable_manifest_is_invalid_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, "not json").unwrap();
        let v = verify_manifest(&path);
        assert!(!v.valid);
        assert_eq!(v.errors.len(), 1);
        assert!(v.errors[0].contains("invalid manifest"));
    }

    #[test]
    fn missing_directory_fails() {
        assert!(generate_manifest(Path::new("no/such/artifacts")).is_err());
    }
}
