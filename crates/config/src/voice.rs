//! Voice (text-to-speech) configuration structures.

use std::{borrow::Cow, time::Duration};

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::RateLimitConfig;

/// Configuration for the voice endpoints and the TTS backend behind them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoiceConfig {
    /// Whether the voice endpoints are exposed.
    enabled: bool,
    /// The path where the voice endpoints will be mounted.
    pub path: Cow<'static, str>,
    /// Longest accepted text, in characters, after whitespace normalization.
    pub max_text_length: usize,
    /// The synthesis backend. Without it the voice endpoints are not exposed.
    pub provider: Option<VoiceProviderConfig>,
    /// Rate limits applied in front of the synthesis endpoints.
    pub rate_limits: RateLimitConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: Cow::Borrowed("/voice"),
            max_text_length: 5000,
            provider: None,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl VoiceConfig {
    /// Whether the voice functionality is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a synthesis backend is configured.
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }
}

/// Connection settings for the HTTP text-to-speech backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceProviderConfig {
    /// Base URL of the backend, e.g. `https://tts.example.com`.
    pub base_url: Url,
    /// API key sent as a bearer token.
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Timeout for a single synthesis call.
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}
