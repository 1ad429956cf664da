// Configuration management

use crate::error::{Result, WatchError};
use crate::systemd::{ActionVerb, Scope};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub poll_interval_secs: u64,
    pub watch_system: bool,
    pub watch_user: bool,
    pub detect_offline_changes: bool,
    pub query_timeout_secs: u64,
    pub change_log_limit: usize,
    pub state_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    /// Glob patterns for units that need `--force` to stop or disable
    pub risky_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            watch_system: true,
            watch_user: true,
            detect_offline_changes: true,
            query_timeout_secs: 10,
            change_log_limit: 500,
            state_dir: None,
            log_file: None,
            risky_patterns: [
                "systemd-*",
                "dbus*",
                "polkit*",
                "NetworkManager*",
                "sshd*",
                "gdm*",
                "sddm*",
                "lightdm*",
                "display-manager*",
                "user@*",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
        }
    }
}

impl Config {
    /// Get default config path: ~/.config/unitwatch/config.yaml
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("unitwatch").join("config.yaml"))
    }

    /// Load config from path, falling back to defaults if not found
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Self::default_path().unwrap_or_default());

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
                WatchError::Config(format!("{}: {}", config_path.display(), e))
            })?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to path
    pub fn save(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.watch_system && !self.watch_user {
            return Err(WatchError::Config("at least one of watch_system/watch_user must be set".to_string()).into());
        }
        for pattern in &self.risky_patterns {
            glob::Pattern::new(pattern)
                .map_err(|e| WatchError::Config(format!("bad risky pattern '{}': {}", pattern, e)))?;
        }
        Ok(())
    }

    /// Polling interval, never shorter than one second
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs.max(1))
    }

    /// Scopes enabled for watching
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes = Vec::new();
        if self.watch_system {
            scopes.push(Scope::System);
        }
        if self.watch_user {
            scopes.push(Scope::User);
        }
        scopes
    }

    /// Directory for persisted state: ~/.local/share/unitwatch unless overridden
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("unitwatch"))
    }

    /// Returns true if the unit matches one of the risky patterns
    pub fn is_risky(&self, unit: &str) -> bool {
        self.risky_patterns
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .any(|p| p.matches(unit))
    }

    /// Units that need `--force` before `verb` may touch them
    pub fn guarded_units<'a>(&self, verb: ActionVerb, units: &'a [String]) -> Vec<&'a str> {
        if !verb.is_destructive() {
            return Vec::new();
        }
        units
            .iter()
            .map(|u| u.as_str())
            .filter(|u| self.is_risky(u))
            .collect()
    }
}
