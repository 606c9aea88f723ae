//! Runtime configuration.
//!
//! Configuration is plain serde data. Every field has a default, so an empty
//! JSON object (or no file at all) yields a working setup. Durations are
//! expressed in milliseconds.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a [`KeyGateConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid configuration JSON.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Limits enforced by the biometric gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GateConfig {
    /// Consecutive mismatches that trigger a timed lockout.
    pub max_failed_attempts: u32,
    /// Length of a timed lockout.
    pub lockout_cooldown_ms: u64,
    /// Timed lockouts, without an intervening success, that escalate to a
    /// permanent lockout.
    pub max_lockouts: u32,
    /// How long a prompt may stay open before the request times out.
    pub prompt_timeout_ms: u64,
    /// How long an issued authorization stays redeemable.
    pub token_ttl_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_cooldown_ms: 30_000,
            max_lockouts: 4,
            prompt_timeout_ms: 60_000,
            token_ttl_ms: 10_000,
        }
    }
}

impl GateConfig {
    /// [`GateConfig::lockout_cooldown_ms`] as a [`Duration`].
    pub fn lockout_cooldown(&self) -> Duration {
        Duration::from_millis(self.lockout_cooldown_ms)
    }

    /// [`GateConfig::prompt_timeout_ms`] as a [`Duration`].
    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_millis(self.prompt_timeout_ms)
    }

    /// [`GateConfig::token_ttl_ms`] as a [`Duration`].
    pub fn token_ttl(&self) -> Duration {
        Duration::from_millis(self.token_ttl_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failed_attempts == 0 {
            return Err(ConfigError::Invalid(
                "gate.maxFailedAttempts must be at least 1".into(),
            ));
        }
        if self.max_lockouts == 0 {
            return Err(ConfigError::Invalid(
                "gate.maxLockouts must be at least 1".into(),
            ));
        }
        if self.prompt_timeout_ms == 0 || self.token_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "gate.promptTimeoutMs and gate.tokenTtlMs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Key store behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyStoreConfig {
    /// Whether creating a key under an alias in use replaces the old key
    /// instead of failing.
    pub overwrite: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyGateConfig {
    /// Biometric gate limits.
    pub gate: GateConfig,
    /// Key store behavior.
    pub keystore: KeyStoreConfig,
}

impl KeyGateConfig {
    /// Parse and validate configuration JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gate.validate()
    }
}
