//! Project filesystem layout: .codeeagle/

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Project directory: .codeeagle/
pub const PROJECT_DIR: &str = ".codeeagle";

/// Configuration file inside the project directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Embedded store data directory
pub const GRAPH_DB_DIR: &str = "graph.db";

/// Per-repo, per-branch sync-state sidecar
pub const SYNC_STATE_FILE: &str = "sync.state";

/// Committed-to-VCS file naming the portable export file
pub const PROJECT_CONF: &str = ".codeeagleproj";

/// User-wide registry mapping project names to roots (in $HOME)
pub const REGISTRY_FILE: &str = ".codeeagle-registry";

pub fn project_dir(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR).join(CONFIG_FILE)
}

pub fn graph_db_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR).join(GRAPH_DB_DIR)
}

pub fn sync_state_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR).join(SYNC_STATE_FILE)
}

/// Ensure the project directory exists
pub fn ensure_project_dir(root: &Path) -> std::io::Result<()> {
    let dir = project_dir(root);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}

/// Read `.codeeagleproj` if present; its first non-empty line names the
/// portable export file, relative to the repo root.
pub fn read_project_conf(root: &Path) -> std::io::Result<Option<PathBuf>> {
    let path = root.join(PROJECT_CONF);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|name| root.join(name)))
}

/// User-wide registry of project name → repository root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub projects: HashMap<String, PathBuf>,
}

impl Registry {
    fn file_path(home: &Path) -> PathBuf {
        home.join(REGISTRY_FILE)
    }

    pub fn load(home: &Path) -> std::io::Result<Self> {
        let path = Self::file_path(home);
        if !path.exists() {
            return Ok(Registry::default());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    pub fn save(&self, home: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(Self::file_path(home), json)
    }

    pub fn register(&mut self, name: impl Into<String>, root: impl Into<PathBuf>) {
        self.projects.insert(name.into(), root.into());
    }

    pub fn root_of(&self, name: &str) -> Option<&PathBuf> {
        self.projects.get(name)
    }
}
