use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::errors::RunTaskError;
use super::types::RepositoryId;

/// Workspace directory for a repository: `<root>/<owner>/<name>`.
pub fn workspace_dir_for(root: &Path, repository: &RepositoryId) -> PathBuf {
    root.join(sanitize_segment(&repository.owner))
        .join(sanitize_segment(&repository.name))
}

/// Removes and re-creates the workspace so each dispatch starts clean.
pub(super) fn recreate_workspace_dir(path: &Path) -> Result<(), RunTaskError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(RunTaskError::InvalidPath {
                label: "workspace_dir",
                path: path.to_path_buf(),
                reason: "path exists but is not a directory",
            });
        }
        fs::remove_dir_all(path)?;
        info!("removed previous workspace {}", path.display());
    }
    fs::create_dir_all(path)?;
    Ok(())
}

pub(super) fn ensure_workspace_dir(path: &Path) -> Result<(), RunTaskError> {
    if path.exists() && !path.is_dir() {
        return Err(RunTaskError::InvalidPath {
            label: "workspace_dir",
            path: path.to_path_buf(),
            reason: "path exists but is not a directory",
        });
    }
    fs::create_dir_all(path)?;
    Ok(())
}

fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
