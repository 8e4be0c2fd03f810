use serde::Deserialize;
use std::path::PathBuf;

/// Configuration from config.toml
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Directory holding the project files
    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,
    /// Hold an advisory lock on a project file while mutating it
    #[serde(default)]
    pub lock_writes: bool,
    #[serde(default)]
    pub scm: ScmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            datadir: default_datadir(),
            lock_writes: false,
            scm: ScmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScmConfig {
    /// Commit hook backend; only "git" is known
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Commit every write
    #[serde(default)]
    pub auto_commit: bool,
    /// Push after every commit
    #[serde(default)]
    pub auto_push: bool,
    /// Seconds a single hook command may run before it is killed
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScmConfig {
    fn default() -> Self {
        ScmConfig {
            backend: default_backend(),
            auto_commit: false,
            auto_push: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "git".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// `$XDG_DATA_HOME/plog`, falling back to `~/.local/share/plog`
fn default_datadir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/"))
                .join(".local")
                .join("share")
        })
        .join("plog")
}
