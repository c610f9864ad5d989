//! Controller configuration.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. Optional TOML file
//! 3. `IAP_*` environment variables (`IAP_PURCHASE_TIMEOUT_SECS=60`)
//!
//! Every `*_secs` setting is capped at [`MAX_TIMEOUT_SECS`].

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for the timeout settings: one week.
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// When the purchase caller is answered relative to the acknowledgment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementPolicy {
    /// Answer immediately; acknowledgment and consumption run in the background.
    #[default]
    Detached,
    /// Answer once the acknowledgment attempt has finished. Consumption stays in the background.
    AwaitAcknowledgement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Capacity of the actor's request channel.
    pub request_buffer: usize,
    /// How long a purchase may wait for the provider's answer.
    pub purchase_timeout_secs: u64,
    pub settlement: SettlementPolicy,
    /// How long shutdown waits for running settlements before aborting them.
    pub shutdown_timeout_secs: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            request_buffer: 32,
            purchase_timeout_secs: 15 * 60,
            settlement: SettlementPolicy::Detached,
            shutdown_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Figment(#[from] Box<figment::Error>),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl BillingConfig {
    /// Defaults, then `path` if given, then `IAP_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(BillingConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: BillingConfig = figment
            .merge(Env::prefixed("IAP_"))
            .extract()
            .map_err(Box::new)?;
        config.validate()
    }

    /// Defaults overlaid with a TOML document. No environment lookup.
    pub fn from_toml_str(toml_content: &str) -> Result<Self, ConfigError> {
        let config: BillingConfig = Figment::new()
            .merge(Serialized::defaults(BillingConfig::default()))
            .merge(Toml::string(toml_content))
            .extract()
            .map_err(Box::new)?;
        config.validate()
    }

    pub fn purchase_timeout(&self) -> Duration {
        Duration::from_secs(self.purchase_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.request_buffer == 0 {
            return Err(ConfigError::Invalid("request_buffer must be positive".to_string()));
        }
        if self.purchase_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "purchase_timeout_secs must be positive".to_string(),
            ));
        }
        for (name, secs) in [
            ("purchase_timeout_secs", self.purchase_timeout_secs),
            ("shutdown_timeout_secs", self.shutdown_timeout_secs),
        ] {
            if secs > MAX_TIMEOUT_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{name} must not exceed {MAX_TIMEOUT_SECS}"
                )));
            }
        }
        Ok(self)
    }
}
