use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::memory_provider::StoreState;

/// JSON snapshot of the whole entity store on disk
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<StoreState>> {
        if !self.path.exists() {
            tracing::debug!(
                path = %self.path.display(),
                "FileSnapshot: No snapshot yet, starting empty"
            );
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;
        let state: StoreState = serde_json::from_str(&content)?;

        tracing::info!(
            path = %self.path.display(),
            tool_count = state.tools.len(),
            document_count = state.documents.len(),
            "FileSnapshot: Store loaded"
        );

        Ok(Some(state))
    }

    /// Write to a sibling temp file first so a crash never leaves a torn snapshot
    pub async fn save(&self, state: &StoreState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &content).await?;
        fs::rename(&tmp_path, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            json_size = content.len(),
            "FileSnapshot: Store saved"
        );

        Ok(())
    }
}
