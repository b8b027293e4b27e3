use serde::Deserialize;
use std::path::Path;

use crate::backends::LoopbackConfig;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Channel joined automatically once the backend is up.
    #[serde(default = "default_channel")]
    pub default_channel: String,
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_channel: default_channel(),
            settings_path: default_settings_path(),
            event_queue_capacity: default_event_queue_capacity(),
            command_queue_capacity: default_command_queue_capacity(),
        }
    }
}

fn default_channel() -> String {
    "baixa-chiado".to_string()
}

fn default_settings_path() -> String {
    "parley.db".to_string()
}

fn default_event_queue_capacity() -> usize {
    256
}

fn default_command_queue_capacity() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: String,
    #[serde(default = "default_mixnode_target")]
    pub mixnode_target: u64,
    #[serde(default = "default_lightpush_peers")]
    pub lightpush_peers: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            mixnode_target: default_mixnode_target(),
            lightpush_peers: default_lightpush_peers(),
        }
    }
}

impl BackendConfig {
    pub fn loopback(&self) -> LoopbackConfig {
        LoopbackConfig {
            mixnode_target: self.mixnode_target,
            lightpush_peers: self.lightpush_peers,
        }
    }
}

fn default_backend_kind() -> String {
    "loopback".to_string()
}

fn default_mixnode_target() -> u64 {
    5
}

fn default_lightpush_peers() -> u64 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_dashboard_bind")]
    pub bind_address: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_dashboard_bind(),
        }
    }
}

fn default_dashboard_bind() -> String {
    "127.0.0.1:9100".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if !path.exists() {
            log::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.session.default_channel, "baixa-chiado");
        assert_eq!(config.session.settings_path, "parley.db");
        assert_eq!(config.session.event_queue_capacity, 256);
        assert_eq!(config.session.command_queue_capacity, 64);
        assert_eq!(config.backend.kind, "loopback");
        assert!(!config.dashboard.enabled);
        assert_eq!(config.dashboard.bind_address, "127.0.0.1:9100");
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [session]
            default_channel = "general"

            [backend]
            mixnode_target = 8

            [dashboard]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.session.default_channel, "general");
        assert_eq!(config.session.event_queue_capacity, 256);
        assert_eq!(config.backend.loopback().mixnode_target, 8);
        assert_eq!(config.backend.loopback().lightpush_peers, 2);
        assert!(config.dashboard.enabled);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.session.default_channel, "baixa-chiado");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.toml");
        std::fs::write(&path, "[session\n").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }
}
