use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fs, path::Path};

pub const HASH_ALGORITHM: &str = "SHA-256";

/// Content fingerprint as recorded in manifests and CIR metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    pub algorithm: String,
    pub value: String,
}

/// A file read from disk together with its content identity.
///
/// The identity depends only on the bytes. Timestamps and permissions
/// never influence `hash`.
#[derive(Debug, Clone)]
pub struct HashedFile {
    pub path: String,
    pub bytes: Vec<u8>,
    pub size_bytes: u64,
    pub hash: FileHash,
}

impl HashedFile {
    /// Parse the bytes as JSON.
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.bytes)
            .with_context(|| format!("failed to parse JSON: {}", self.path))
    }
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Read a file and compute its SHA-256 identity.
pub fn read_hashed(path: &Path) -> Result<HashedFile> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read file: {}", path.display()))?;

    Ok(HashedFile {
        path: path.display().to_string(),
        size_bytes: bytes.len() as u64,
        hash: FileHash {
            algorithm: HASH_ALGORITHM.to_string(),
            value: sha256_hex(&bytes),
        },
        bytes,
    })
}

/// Read a JSON document without hashing it.
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON: {}", path.display()))
}
