//! ClientChain configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ClientChainError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientChainConfig {
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub sendgrid: SendGridConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl ClientChainConfig {
    /// Load config from the default path (~/.clientchain/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientChainError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientChainError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClientChainError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the ClientChain home directory (~/.clientchain).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".clientchain")
    }
}

/// Twilio SMS gateway credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from_number: String,
}

impl TwilioConfig {
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }
}

/// SendGrid email gateway credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendGridConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_from_email() -> String {
    "no-reply@clientchain.app".into()
}
fn default_from_name() -> String {
    "ClientChain".into()
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

impl SendGridConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Messaging policy: quiet window, per-channel daily ceilings, reference zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// First hour (inclusive) of the allowed send window, local time.
    #[serde(default = "default_quiet_start")]
    pub allowed_from_hour: u32,
    /// First hour (exclusive) after the allowed send window, local time.
    #[serde(default = "default_quiet_end")]
    pub allowed_until_hour: u32,
    /// Max SMS sends per subject per day.
    #[serde(default = "default_sms_limit")]
    pub sms_daily_limit: u64,
    /// Max emails per subject per day.
    #[serde(default = "default_email_limit")]
    pub email_daily_limit: u64,
    /// Fallback UTC offset for subjects without a timezone, e.g. "-05:00".
    #[serde(default = "default_offset")]
    pub reference_utc_offset: String,
}

fn default_quiet_start() -> u32 {
    8
}
fn default_quiet_end() -> u32 {
    21
}
fn default_sms_limit() -> u64 {
    3
}
fn default_email_limit() -> u64 {
    5
}
fn default_offset() -> String {
    "+00:00".into()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_from_hour: default_quiet_start(),
            allowed_until_hour: default_quiet_end(),
            sms_daily_limit: default_sms_limit(),
            email_daily_limit: default_email_limit(),
            reference_utc_offset: default_offset(),
        }
    }
}

/// Engine settings: database location and sweep cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the SQLite databases. Empty = ~/.clientchain/data.
    #[serde(default)]
    pub data_dir: String,
    /// Seconds between reconciliation sweeps. Keep ≤ the shortest wait used.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl EngineConfig {
    pub fn data_dir(&self) -> PathBuf {
        if self.data_dir.is_empty() {
            ClientChainConfig::home_dir().join("data")
        } else {
            PathBuf::from(&self.data_dir)
        }
    }
}

/// Operator API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8420
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
