//! Voice gate server library.
//!
//! Provides a reusable server function to serve the voice gate either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod health;
mod rate_limit;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use ::rate_limit::RateLimitManager;
use anyhow::anyhow;
use axum::{Router, routing::get};
use config::Config;
use rate_limit::RateLimitLayer;
use tokio::{net::TcpListener, time::MissedTickBehavior};

/// Configuration for serving the voice gate.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized voice gate TOML configuration.
    pub config: Config,
}

/// Starts and runs the voice gate server with the provided configuration.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    let mut app = Router::new();
    let mut voice_exposed = false;

    if !config.voice.enabled() {
        log::debug!("Voice endpoints are disabled");
    } else if !config.voice.has_provider() {
        log::debug!("Voice is enabled but no TTS provider is configured - voice endpoints will not be exposed");
    } else {
        match tts::router(&config.voice) {
            Ok(mut voice_router) => {
                let rate_limits = &config.voice.rate_limits;

                if rate_limits.enabled {
                    log::debug!(
                        "Applying rate limiting middleware with {} tiers to the voice endpoints",
                        rate_limits.tiers.len()
                    );

                    let manager = Arc::new(RateLimitManager::new());
                    tokio::spawn(run_cleanup(manager.clone(), rate_limits.cleanup_interval));

                    voice_router = voice_router.layer(RateLimitLayer::new(manager, &rate_limits.tiers));
                } else {
                    log::debug!("Rate limiting disabled - voice endpoints accept every request");
                }

                app = app.merge(voice_router);
                voice_exposed = true;
            }
            Err(e) => {
                log::error!("Failed to initialize voice router: {e}");
            }
        }
    }

    // The health endpoint is never rate limited
    if config.server.health.enabled {
        app = app.route(&config.server.health.path, get(health::health));
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    if voice_exposed {
        log::info!("Voice endpoint available at: http://{listen_address}{}/tts", config.voice.path);
    } else {
        log::warn!(
            "Server starting with no functional endpoints. \
            Configure a TTS provider to enable speech synthesis."
        );
    }

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;

    Ok(())
}

/// Periodically drops rate limit records whose window has passed.
async fn run_cleanup(manager: Arc<RateLimitManager>, period: Duration) {
    if period.is_zero() {
        log::warn!("Rate limit cleanup interval is zero, expired records will not be purged");
        return;
    }

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;

        manager.cleanup();
    }
}
