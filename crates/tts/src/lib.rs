use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderName, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::post,
};
use config::VoiceConfig;

mod dedupe;
mod error;
mod provider;
mod request;
mod server;

pub use dedupe::{InFlight, SharedSynthesis};
pub use error::TtsError;
pub use provider::{Audio, HttpSynthesizer, SynthesisError, Synthesizer};
pub use request::{SpeechParams, SynthesisRequest};

use server::TtsServer;

pub(crate) type Result<T> = std::result::Result<T, TtsError>;

/// Response header carrying the content fingerprint of the synthesized text.
pub const FINGERPRINT_HEADER: &str = "x-tts-fingerprint";

/// Creates an axum router for the voice endpoints, talking to the configured HTTP backend.
pub fn router(config: &VoiceConfig) -> anyhow::Result<Router> {
    let Some(ref provider) = config.provider else {
        anyhow::bail!("Voice endpoints require a TTS provider to be configured");
    };

    let synthesizer = HttpSynthesizer::new(provider)
        .map_err(|e| anyhow::anyhow!("Failed to initialize the TTS backend: {e}"))?;

    Ok(router_with_synthesizer(config, Arc::new(synthesizer)))
}

/// Creates an axum router for the voice endpoints with the given backend.
pub fn router_with_synthesizer(config: &VoiceConfig, synthesizer: Arc<dyn Synthesizer>) -> Router {
    let server = TtsServer::new(synthesizer, config.max_text_length);

    let voice_routes = Router::new().route("/tts", post(synthesize)).with_state(server);

    Router::new().nest(&config.path, voice_routes)
}

/// Handle speech synthesis requests.
///
/// Identical requests arriving while a synthesis is running share its result.
async fn synthesize(
    State(server): State<TtsServer>,
    payload: std::result::Result<Json<SynthesisRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload.map_err(|rejection| TtsError::InvalidRequest(rejection.body_text()))?;

    log::info!("TTS synthesis handler called for voice '{}'", request.voice_id);

    let (fingerprint, audio) = server.synthesize(request).await?;

    log::debug!("Serving {} bytes of audio for {fingerprint}", audio.bytes.len());

    Ok((
        [(CONTENT_TYPE, audio.content_type), (HeaderName::from_static(FINGERPRINT_HEADER), fingerprint)],
        audio.bytes,
    ))
}
