//! Voice gate configuration structures to map the voice-gate.toml configuration.

#![deny(missing_docs)]

mod loader;
mod rate_limit;
mod voice;

use std::{borrow::Cow, net::SocketAddr, path::Path};

pub use rate_limit::{LimitKey, RateLimitConfig, RateLimitTier};
use serde::Deserialize;
pub use voice::{VoiceConfig, VoiceProviderConfig};

/// Main configuration structure for the voice gate.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Voice endpoint and synthesis backend settings.
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the configuration, returning warnings for settings that are legal but suspicious.
    pub fn validate(&self) -> anyhow::Result<Vec<String>> {
        loader::validate(self)
    }
}

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// Health endpoint configuration.
    #[serde(default)]
    pub health: HealthConfig,
}

/// Health endpoint configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is enabled.
    pub enabled: bool,
    /// The path for the health endpoint.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            enabled: true,
            path: Cow::Borrowed("/health"),
        }
    }
}
