//! Agent configuration
//!
//! Loaded from an optional TOML file; every field falls back to a default so
//! the agent starts without one.

use crate::connection::ConnectionConfig;
use agent_shared::defaults;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file when no CLI argument is given
pub const CONFIG_ENV: &str = "DEVICE_AGENT_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Overrides the machine id as the collector-facing device id
    pub device_id: Option<String>,
    pub collector: CollectorConfig,
    pub registration: RegistrationConfig,
    pub push: PushConfig,
    /// Where in-progress audio recordings are written
    pub recordings_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            collector: CollectorConfig::default(),
            registration: RegistrationConfig::default(),
            push: PushConfig::default(),
            recordings_dir: std::env::temp_dir().join("device-agent"),
        }
    }
}

impl AgentConfig {
    /// Load from `path`, or use defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// Collector endpoints and upload timeouts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Small JSON/text telemetry
    pub submit_url: String,
    /// Base64 blob uploads
    pub upload_url: String,
    /// Channel-token registration
    pub register_url: String,
    pub small_timeout_secs: u64,
    pub large_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            submit_url: "http://127.0.0.1:8088/submit-data".into(),
            upload_url: "http://127.0.0.1:8088/upload-file".into(),
            register_url: "http://127.0.0.1:8088/register-device".into(),
            small_timeout_secs: defaults::SMALL_UPLOAD_TIMEOUT_MS / 1000,
            large_timeout_secs: defaults::LARGE_UPLOAD_TIMEOUT_MS / 1000,
        }
    }
}

impl CollectorConfig {
    pub fn small_timeout(&self) -> Duration {
        Duration::from_secs(self.small_timeout_secs)
    }

    pub fn large_timeout(&self) -> Duration {
        Duration::from_secs(self.large_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// First retry delay; doubles on each further attempt
    pub base_delay_ms: u64,
    pub max_retries: u32,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: defaults::REGISTRATION_BASE_DELAY_MS,
            max_retries: defaults::REGISTRATION_MAX_RETRIES,
        }
    }
}

impl RegistrationConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Push channel relay settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub controller_addr: String,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            controller_addr: "127.0.0.1:9100".into(),
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 30_000,
            connect_timeout_ms: 5000,
        }
    }
}

impl PushConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            controller_addr: self.controller_addr.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(self.max_reconnect_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::load(None).unwrap();
        assert!(config.device_id.is_none());
        assert_eq!(config.collector.large_timeout(), Duration::from_secs(30));
        assert_eq!(config.registration.base_delay(), Duration::from_secs(5));
        assert_eq!(config.registration.max_retries, 3);
    }

    #[test]
    fn test_partial_file() {
        let config = AgentConfig::from_toml(
            r#"
            device_id = "lab-phone-3"

            [collector]
            upload_url = "https://collector.example/upload"

            [push]
            controller_addr = "10.0.0.2:9100"
            "#,
        )
        .unwrap();

        assert_eq!(config.device_id.as_deref(), Some("lab-phone-3"));
        assert_eq!(config.collector.upload_url, "https://collector.example/upload");
        assert_eq!(
            config.collector.submit_url,
            CollectorConfig::default().submit_url
        );
        let conn = config.push.connection_config();
        assert_eq!(conn.controller_addr, "10.0.0.2:9100");
        assert_eq!(conn.max_reconnect_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = AgentConfig::load(Some(Path::new("/nonexistent/agent.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(AgentConfig::from_toml("registration = 5").is_err());
    }
}
