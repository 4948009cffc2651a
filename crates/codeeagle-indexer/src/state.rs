//! Sync-state sidecar: last-indexed commit / mtimes / last-import-time
//!
//! One JSON file per project (`.codeeagle/sync.state`), keyed by
//! repository and branch.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use codeeagle_core::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// Repository path → per-branch state.
    #[serde(default)]
    pub repos: HashMap<String, RepoState>,
    /// Branch → mtime (epoch seconds) of the export file last imported.
    #[serde(default)]
    pub last_import: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoState {
    #[serde(default)]
    pub branches: HashMap<String, BranchSyncState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchSyncState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mtimes: HashMap<String, u64>,
}

impl SyncState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(SyncState::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(state) => Ok(state),
            Err(err) => {
                // A corrupt sidecar only costs a full re-index
                tracing::warn!(path = %path.display(), error = %err, "resetting unreadable sync state");
                Ok(SyncState::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(codeeagle_core::GraphError::storage)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn branch_state(&self, repo: &str, branch: &str) -> BranchSyncState {
        self.repos
            .get(repo)
            .and_then(|repo_state| repo_state.branches.get(branch))
            .cloned()
            .unwrap_or_default()
    }

    pub fn record_branch(&mut self, repo: &str, branch: &str, state: BranchSyncState) {
        self.repos
            .entry(repo.to_string())
            .or_default()
            .branches
            .insert(branch.to_string(), state);
    }
}
