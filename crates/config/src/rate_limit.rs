//! Rate limiting configuration structures.

use std::{fmt, num::NonZeroU32, time::Duration};

use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};

/// Rate limiting configuration for the voice endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    pub enabled: bool,
    /// How often expired counters are swept from memory.
    #[serde(deserialize_with = "deserialize_duration")]
    pub cleanup_interval: Duration,
    /// Quota tiers, evaluated in order for every request.
    pub tiers: Vec<RateLimitTier>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_interval: Duration::from_secs(60),
            tiers: vec![
                RateLimitTier::new(LimitKey::Ip, NonZeroU32::MIN.saturating_add(4), Duration::from_secs(60)),
                RateLimitTier::new(
                    LimitKey::Fingerprint,
                    NonZeroU32::MIN.saturating_add(9),
                    Duration::from_secs(60),
                ),
            ],
        }
    }
}

/// The identity dimension a tier counts requests against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKey {
    /// The client IP address taken from the forwarding headers.
    Ip,
    /// The browser fingerprint built from `user-agent` and `accept-language`.
    Fingerprint,
    /// A single bucket shared by every request.
    Global,
}

impl LimitKey {
    /// The name of the tier as it appears in configuration and error responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKey::Ip => "ip",
            LimitKey::Fingerprint => "fingerprint",
            LimitKey::Global => "global",
        }
    }
}

impl fmt::Display for LimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single quota rule: at most `max_requests` per `window` for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitTier {
    /// The identity dimension this tier is keyed by.
    pub key: LimitKey,
    /// Maximum number of requests admitted within one window.
    pub max_requests: NonZeroU32,
    /// Length of the counting window.
    #[serde(deserialize_with = "deserialize_duration")]
    pub window: Duration,
}

impl RateLimitTier {
    /// Create a new tier.
    pub fn new(key: LimitKey, max_requests: NonZeroU32, window: Duration) -> Self {
        Self {
            key,
            max_requests,
            window,
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use insta::assert_debug_snapshot;

    use super::*;

    #[test]
    fn default_tiers() {
        let config = RateLimitConfig::default();

        assert_debug_snapshot!(config, @r#"
        RateLimitConfig {
            enabled: true,
            cleanup_interval: 60s,
            tiers: [
                RateLimitTier {
                    key: Ip,
                    max_requests: 5,
                    window: 60s,
                },
                RateLimitTier {
                    key: Fingerprint,
                    max_requests: 10,
                    window: 60s,
                },
            ],
        }
        "#);
    }

    #[test]
    fn deserialize_tiers() {
        let toml = indoc! {r#"
            enabled = true
            cleanup_interval = "5m"

            [[tiers]]
            key = "global"
            max_requests = 1000
            window = "1h"

            [[tiers]]
            key = "ip"
            max_requests = 3
            window = "10s"
        "#};

        let config: RateLimitConfig = toml::from_str(toml).unwrap();

        assert_debug_snapshot!(config, @r#"
        RateLimitConfig {
            enabled: true,
            cleanup_interval: 300s,
            tiers: [
                RateLimitTier {
                    key: Global,
                    max_requests: 1000,
                    window: 3600s,
                },
                RateLimitTier {
                    key: Ip,
                    max_requests: 3,
                    window: 10s,
                },
            ],
        }
        "#);
    }

    #[test]
    fn explicit_empty_tiers() {
        let config: RateLimitConfig = toml::from_str("tiers = []").unwrap();

        assert!(config.enabled);
        assert!(config.tiers.is_empty());
    }

    #[test]
    fn zero_max_requests_is_rejected() {
        let toml = indoc! {r#"
            [[tiers]]
            key = "ip"
            max_requests = 0
            window = "10s"
        "#};

        let result: Result<RateLimitConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_limit_key_is_rejected() {
        let toml = indoc! {r#"
            [[tiers]]
            key = "user"
            max_requests = 1
            window = "10s"
        "#};

        let result: Result<RateLimitConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn limit_key_names() {
        assert_eq!(LimitKey::Ip.to_string(), "ip");
        assert_eq!(LimitKey::Fingerprint.to_string(), "fingerprint");
        assert_eq!(LimitKey::Global.to_string(), "global");
    }
}
