use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_DIR: &str = "myclod";
const CONFIG_FILE: &str = "config.toml";

/// User-level configuration from `<config-dir>/myclod/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The interactive assistant launched inside the PTY.
    pub tool_command: String,
    /// Arguments passed to the assistant on every launch.
    pub tool_args: Vec<String>,
    /// The runtime the assistant is installed with.
    pub runtime_command: String,
    /// Command line that installs the assistant.
    pub install_command: Vec<String>,
    /// Page opened when the runtime is missing.
    pub runtime_download_url: String,
    /// Directory whose credential files mark the user as signed in.
    /// Defaults to `~/.claude`.
    pub auth_dir: Option<PathBuf>,
    /// `TERM` exported to the session.
    pub term: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool_command: "claude".to_string(),
            tool_args: Vec::new(),
            runtime_command: "node".to_string(),
            install_command: ["npm", "install", "-g", "@anthropic-ai/claude-code"]
                .map(String::from)
                .to_vec(),
            runtime_download_url: "https://nodejs.org/".to_string(),
            auth_dir: None,
            term: "xterm-256color".to_string(),
        }
    }
}

impl Config {
    /// The credentials directory, falling back to `~/.claude`.
    pub fn auth_dir(&self) -> Option<PathBuf> {
        self.auth_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".claude")))
    }
}

/// Default location of the config file, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load configuration from `path`.
///
/// Falls back to defaults if the file is missing.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

/// Load from an explicit path, or from the default location.
pub fn load_or_default(explicit: Option<&Path>) -> Result<Config> {
    match explicit.map(Path::to_path_buf).or_else(default_path) {
        Some(path) => load(&path),
        None => Ok(Config::default()),
    }
}
