//! Project configuration: .codeeagle/config.yaml

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use codeeagle_core::{project, GraphError, Result, DEFAULT_BRANCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: String,
    /// Repository paths, relative to the project root. `.` by default.
    #[serde(default = "default_repositories")]
    pub repositories: Vec<PathBuf>,
    /// Glob patterns excluded from every scan.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,
    /// Restrict indexing to these language tags. Empty = all registered.
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub agents: AgentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Branch written when the repository is not under git.
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for GraphSettings {
    fn default() -> Self {
        GraphSettings {
            default_branch: default_branch(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Run the summarization pass after linking (needs a Summarizer).
    #[serde(default)]
    pub summarize: bool,
}

fn default_repositories() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_excludes() -> Vec<String> {
    [
        "**/.git/**",
        "**/node_modules/**",
        "**/target/**",
        "**/vendor/**",
        "**/__pycache__/**",
        "**/dist/**",
        "**/build/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl ProjectConfig {
    pub fn new(project: impl Into<String>) -> Self {
        ProjectConfig {
            project: project.into(),
            repositories: default_repositories(),
            excludes: default_excludes(),
            languages: Vec::new(),
            graph: GraphSettings::default(),
            agents: AgentSettings::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = project::config_path(root);
        if !path.exists() {
            return Err(GraphError::validation(format!(
                "no configuration at {} (run `codeeagle init` first)",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(&path)?;
        serde_yaml::from_str(&content)
            .map_err(|err| GraphError::validation(format!("bad config: {err}")))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        project::ensure_project_dir(root)?;
        let yaml = serde_yaml::to_string(self).map_err(GraphError::storage)?;
        std::fs::write(project::config_path(root), yaml)?;
        Ok(())
    }
}
