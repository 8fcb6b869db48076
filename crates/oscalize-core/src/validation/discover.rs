use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::oscal::ArtifactKind;

const EXTENSIONS: [&str; 4] = ["json", "xml", "yaml", "yml"];

/// File stems containing one of these are reports, not artifacts.
const SKIP_STEMS: [&str; 4] = ["manifest", "summary", "report", "log"];

/// A file the validation batch will process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    /// `None` when the type could not be read from the content.
    pub kind: Option<ArtifactKind>,
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn skipped_by_name(path: &Path) -> bool {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();
    SKIP_STEMS.iter().any(|p| stem.contains(p))
}

/// Inspect one file. JSON must parse and carry a known root key to be a
/// candidate. XML and YAML are always candidates.
pub fn inspect(path: &Path) -> Option<Candidate> {
    let ext = extension(path)?;
    if !EXTENSIONS.contains(&ext.as_str()) || skipped_by_name(path) {
        return None;
    }
    let text = fs::read_to_string(path).ok()?;
    let kind = ArtifactKind::detect_text(path, &text);
    if ext == "json" && kind.is_none() {
        debug!(file = %path.display(), "skipping JSON without an OSCAL root key");
        return None;
    }
    Some(Candidate {
        path: path.to_path_buf(),
        kind,
    })
}

/// Non-recursive scan of `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<Candidate>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to read directory entry in {}", dir.display()))?
            .path();
        if path.is_file() {
            if let Some(candidate) = inspect(&path) {
                found.push(candidate);
            }
        }
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    info!(dir = %dir.display(), count = found.len(), "discovered OSCAL files");
    Ok(found)
}
