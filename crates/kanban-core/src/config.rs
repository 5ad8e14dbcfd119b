use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::FileStore;
use crate::vcs::Git;

/// Environment variable that pins the project root.
pub const ROOT_ENV: &str = "KANBAN_ROOT";

const PROJECT_CONFIG: &str = ".kanban/config.toml";
const ROOT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Ticket directory, relative to the project root.
    #[serde(default = "default_tickets_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_tickets_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Default target of command-branch merges.
    #[serde(default = "default_trunk")]
    pub trunk: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Where ticket worktrees are created, relative to the project root.
    #[serde(default = "default_worktrees_dir")]
    pub worktrees_dir: PathBuf,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            trunk: default_trunk(),
            timeout_secs: default_timeout_secs(),
            worktrees_dir: default_worktrees_dir(),
        }
    }
}

impl GitConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-user preferences shared by every project.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Fallback caller identity.
    #[serde(default)]
    pub agent: Option<String>,
}

/// Load `{root}/.kanban/config.toml`, or defaults when it is absent.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_CONFIG);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `{config_dir}/kanban/config.toml`, or defaults when it is absent.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("kanban/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Pick the project root: the pinned override, else the enclosing git
/// repository of `cwd`, else `cwd` itself.
#[must_use]
pub fn resolve_root(pinned: Option<&str>, cwd: &Path) -> PathBuf {
    if let Some(root) = pinned.map(str::trim).filter(|r| !r.is_empty()) {
        return PathBuf::from(root);
    }
    Git::new(cwd)
        .with_timeout(ROOT_PROBE_TIMEOUT)
        .toplevel()
        .unwrap_or_else(|err| {
            tracing::debug!(error = %err, "not inside a git repository; using cwd as root");
            cwd.to_path_buf()
        })
}

/// Project root plus its configuration, resolved once per invocation.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Workspace {
    /// Resolve the root from [`ROOT_ENV`] / git / `cwd` and load its config.
    ///
    /// # Errors
    ///
    /// Fails if the project config is present but malformed.
    pub fn discover(cwd: &Path) -> Result<Self> {
        let pinned = std::env::var(ROOT_ENV).ok();
        Self::at(resolve_root(pinned.as_deref(), cwd))
    }

    /// # Errors
    ///
    /// Fails if the project config is present but malformed.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = load_project_config(&root)?;
        Ok(Self { root, config })
    }

    #[must_use]
    pub fn tickets_dir(&self) -> PathBuf {
        self.root.join(&self.config.store.dir)
    }

    #[must_use]
    pub fn worktrees_dir(&self) -> PathBuf {
        self.root.join(&self.config.git.worktrees_dir)
    }

    /// Git handle rooted at the project with the configured timeout.
    #[must_use]
    pub fn git(&self) -> Git {
        Git::new(&self.root).with_timeout(self.config.git.timeout())
    }

    /// # Errors
    ///
    /// Fails if the tickets directory cannot be created.
    pub fn open_store(&self) -> crate::Result<FileStore> {
        FileStore::open(self.tickets_dir())
    }
}

fn default_tickets_dir() -> PathBuf {
    PathBuf::from("tickets")
}

fn default_trunk() -> String {
    "main".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_worktrees_dir() -> PathBuf {
    PathBuf::from(".kanban/worktrees")
}
