//! Channel configuration.
//!
//! Everything a RESP-backed channel needs, passed explicitly to
//! [`create_channel_with`](crate::create_channel_with). There is no global
//! state; `from_env` is a convenience for binaries.

use std::time::Duration;
use superchannel_core::options::RelayOptions;
use superchannel_resp::RespOptions;
use thiserror::Error;

/// Default store address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6379";

/// Environment variable holding the store address
pub const ENV_ADDRESS: &str = "SUPERCHANNEL_ADDR";

/// Environment variable holding the flush window in milliseconds
pub const ENV_FLUSH_MS: &str = "SUPERCHANNEL_FLUSH_MS";

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    InvalidFlushWindow { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    EmptyAddress { var: &'static str },
}

/// Store address plus relay and connection tuning.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// `host:port`, optionally prefixed with `redis://`
    pub address: String,
    pub relay: RelayOptions,
    pub resp: RespOptions,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            relay: RelayOptions::default(),
            resp: RespOptions::default(),
        }
    }
}

impl ChannelConfig {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    #[must_use]
    pub fn with_relay(mut self, relay: RelayOptions) -> Self {
        self.relay = relay;
        self
    }

    #[must_use]
    pub fn with_resp(mut self, resp: RespOptions) -> Self {
        self.resp = resp;
        self
    }

    /// Defaults overridden by `SUPERCHANNEL_ADDR` and `SUPERCHANNEL_FLUSH_MS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(address) = lookup(ENV_ADDRESS) {
            let address = address.trim();
            if address.is_empty() {
                return Err(ConfigError::EmptyAddress { var: ENV_ADDRESS });
            }
            config.address = address.to_string();
        }

        if let Some(raw) = lookup(ENV_FLUSH_MS) {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidFlushWindow {
                    var: ENV_FLUSH_MS,
                    value: raw.clone(),
                })?;
            config.relay = config.relay.with_flush_window(Duration::from_millis(ms));
        }

        Ok(config)
    }
}
