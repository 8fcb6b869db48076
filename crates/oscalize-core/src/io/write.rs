use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, path::Path};

/// Serialize `value` as pretty JSON and write it, creating parent
/// directories as needed.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize: {}", path.display()))?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("failed to write file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.json");

        write_json_pretty(&target, &json!({"ok": true})).unwrap();

        let text = fs::read_to_string(&target).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(serde_json::from_str::<serde_json::Value>(&text).unwrap()["ok"], true);
    }
}
