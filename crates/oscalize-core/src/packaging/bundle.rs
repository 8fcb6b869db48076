//! Directory bundles: a copy of the manifest-listed files plus the
//! manifest itself, verifiable without the source directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use super::manifest::{
    MANIFEST_FILE, ManifestDocument, ManifestVerification, generate_manifest, read_manifest,
    verify_files,
};
use crate::io::write::write_json_pretty;
use crate::mapper::base::now_timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleReport {
    pub bundle_dir: PathBuf,
    pub manifest_file: PathBuf,
    pub files_copied: usize,
    pub integrity_hash: String,
}

/// Copy every file of `dir` that a manifest would list into `out`, then
/// write `out/manifest.json` describing the copies.
///
/// `out` must not already contain files.
pub fn create_bundle(dir: &Path, out: &Path) -> Result<BundleReport> {
    let source = generate_manifest(dir)?;

    if out.exists()
        && fs::read_dir(out)
            .with_context(|| format!("failed to read bundle directory: {}", out.display()))?
            .next()
            .is_some()
    {
        bail!("bundle directory is not empty: {}", out.display());
    }
    fs::create_dir_all(out)
        .with_context(|| format!("failed to create bundle directory: {}", out.display()))?;

    for entry in &source.files {
        let from = dir.join(&entry.path);
        let to = out.join(&entry.path);
        fs::copy(&from, &to).with_context(|| {
            format!("failed to copy {} to {}", from.display(), to.display())
        })?;
    }

    // Describe the copies, so the bundle verifies on its own.
    let mut manifest = generate_manifest(out)?;
    manifest.metadata = source.metadata;
    let manifest_file = out.join(MANIFEST_FILE);
    let integrity_hash = manifest.integrity.manifest_hash.value.clone();
    let files_copied = manifest.files.len();
    write_json_pretty(&manifest_file, &ManifestDocument { manifest })?;

    info!(bundle = %out.display(), files = files_copied, "created bundle");
    Ok(BundleReport {
        bundle_dir: out.to_path_buf(),
        manifest_file,
        files_copied,
        integrity_hash,
    })
}

/// Verify a bundle against its embedded manifest. Paths resolve against
/// `bundle` wherever the bundle has been moved.
pub fn verify_bundle(bundle: &Path) -> ManifestVerification {
    let manifest_file = bundle.join(MANIFEST_FILE);
    let label = manifest_file.display().to_string();
    match read_manifest(&manifest_file) {
        Ok(manifest) => verify_files(&manifest, bundle, &label),
        Err(e) => ManifestVerification {
            timestamp: now_timestamp(),
            manifest_file: label,
            errors: vec![format!("{e:#}")],
            ..ManifestVerification::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ssp.json"), r#"{"system-security-plan": {}}"#).unwrap();
        fs::write(dir.path().join("poam.json"), r#"{"plan-of-action-and-milestones": {}}"#)
            .unwrap();
        fs::write(dir.path().join("skip.bin"), [1u8]).unwrap();
        dir
    }

    #[test]
    fn bundle_copies_files_and_verifies_after_move() {
        let src = source();
        let work = tempfile::tempdir().unwrap();
        let out = work.path().join("bundle");

        let report = create_bundle(src.path(), &out).unwrap();
        assert_eq!(report.files_copied, 2);
        assert!(out.join("ssp.json").is_file());
        assert!(!out.join("skip.bin").exists());

        let moved = work.path().join("moved");
        fs::rename(&out, &moved).unwrap();
        let v = verify_bundle(&moved);
        assert!(v.valid, "{:?}", v.errors);
        assert_eq!(v.files_valid, 2);
    }

    #[test]
    fn tampered_bundle_fails_verification() {
        let src = source();
        let work = tempfile::tempdir().unwrap();
        let out = work.path().join("bundle");
        create_bundle(src.path(), &out).unwrap();

        fs::write(out.join("poam.json"), "{}").unwrap();
        let v = verify_bundle(&out);
        assert!(!v.valid);
        assert_eq!(v.files_modified, 1);
    }

    #[test]
    fn refuses_non_empty_output() {
        let src = source();
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("existing.txt"), "x").unwrap();
        let err = create_bundle(src.path(), out.path()).unwrap_err();
        assert!(format!("{err:#}").contains("not empty"));
    }

    #[test]
    fn missing_manifest_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let v = verify_bundle(dir.path());
        assert!(!v.valid);
        assert!(v.errors[0].contains("failed to read manifest"));
    }
}
