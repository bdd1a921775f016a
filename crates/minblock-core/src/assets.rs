//! Asset file helpers

use std::path::{Path, PathBuf};

use crate::block::BlockError;

/// Resolve an asset reference against the base path.
///
/// References are always relative to the base: a leading `/` means the
/// base path root, not the filesystem root.
pub fn resolve(base_path: &Path, reference: &str) -> PathBuf {
    base_path.join(reference.trim_start_matches('/'))
}

/// Read and concatenate assets in the given order
pub async fn concat(base_path: &Path, references: &[String]) -> Result<Vec<u8>, BlockError> {
    let mut buffer = Vec::new();
    for reference in references {
        let path = resolve(base_path, reference);
        tracing::debug!("Reading asset {}", path.display());
        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| BlockError::AssetRead {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        buffer.extend_from_slice(&content);
    }
    Ok(buffer)
}

/// Delete source assets, returning the paths that could not be removed
pub async fn remove(base_path: &Path, references: &[String]) -> Vec<PathBuf> {
    let mut failed = Vec::new();
    for reference in references {
        let path = resolve(base_path, reference);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to delete {}: {}", path.display(), e);
            failed.push(path);
        }
    }
    failed
}
