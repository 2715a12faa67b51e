use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::data::ProjectDocument;

/// Strips one leading separator, which is insignificant in generated paths.
pub fn normalize_entry_path(path: &str) -> &str {
    path.strip_prefix('/')
        .or_else(|| path.strip_prefix('\\'))
        .unwrap_or(path)
}

/// `(entry name, content)` pairs in document order, ready for an archive writer.
pub fn archive_entries(document: &ProjectDocument) -> Vec<(&str, &str)> {
    document
        .files
        .iter()
        .map(|f| (normalize_entry_path(&f.path), f.content.as_str()))
        .collect()
}

/// Lowercased project name with whitespace and separator runs collapsed to `-`.
///
/// The result is always a single normal path component. Segments made only of
/// dots are dropped.
pub fn archive_name(document: &ProjectDocument) -> String {
    let name = document
        .metadata
        .name
        .split(|c: char| c.is_whitespace() || c == '/' || c == '\\')
        .filter(|part| !part.is_empty() && !part.chars().all(|c| c == '.'))
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    if name.is_empty() {
        "project".to_string()
    } else {
        name
    }
}

/// Writes every file under `{dir}/{archive_name}/` and returns that folder.
pub async fn export_to_dir(document: &ProjectDocument, dir: &Path) -> Result<PathBuf> {
    let root = dir.join(archive_name(document));
    if root.parent() != Some(dir) {
        anyhow::bail!("Refusing to export outside of {}", dir.display());
    }

    for (entry, content) in archive_entries(document) {
        let target = root.join(entry);
        if !target.starts_with(&root) || entry.split('/').any(|part| part == "..") {
            anyhow::bail!("Refusing to export '{}' outside of {}", entry, root.display());
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&target, content)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;
    }

    Ok(root)
}
