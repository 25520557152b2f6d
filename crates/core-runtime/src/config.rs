use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Resolve the global configuration directory based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. `PORT_HOME` environment variable (with tilde expansion)
/// 3. XDG config directory (recommended default)
/// 4. `~/.port` (fallback for systems without XDG)
pub fn resolve_config_dir(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("PORT_HOME") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        return Ok(config_dir.join("port"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".port"));
    }

    Err(Error::Config(
        "could not determine config directory: no HOME directory or XDG config directory found"
            .to_string(),
    ))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Per-project settings, not tied to any one environment profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default token budget handed to `SessionEngine::start_hierarchical`
    /// when a caller doesn't supply one.
    #[serde(default = "default_token_budget")]
    pub default_token_budget: i64,

    /// Message age, in seconds, past which the bus sweep marks a pending
    /// message expired. `None` disables the sweep (§5 default).
    #[serde(default)]
    pub message_expiry_secs: Option<i64>,

    /// Events-since-last-checkpoint horizon for the attention monitor.
    #[serde(default = "default_checkpoint_horizon")]
    pub checkpoint_event_horizon: u32,
}

fn default_token_budget() -> i64 {
    200_000
}

fn default_checkpoint_horizon() -> u32 {
    10
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(resolve_config_dir(None)?.join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_token_budget: default_token_budget(),
            message_expiry_secs: None,
            checkpoint_event_horizon: default_checkpoint_horizon(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_sane_budget() {
        let config = Config::default();
        assert_eq!(config.default_token_budget, 200_000);
        assert!(config.message_expiry_secs.is_none());
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.default_token_budget = 50_000;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.default_token_budget, 50_000);
    }

    #[test]
    fn load_nonexistent_returns_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_token_budget, 200_000);
    }

    #[test]
    fn explicit_path_wins_over_env_var() {
        let resolved = resolve_config_dir(Some("/tmp/explicit-port")).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/explicit-port"));
    }
}
