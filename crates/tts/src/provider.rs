mod http;

pub use http::HttpSynthesizer;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::request::SpeechParams;

/// Synthesized speech as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audio {
    /// MIME type of the audio, e.g. `audio/mpeg`.
    pub content_type: String,
    /// The encoded audio.
    pub bytes: Bytes,
}

/// Failure of a synthesis call.
///
/// Cloneable so that every caller waiting on the same in-flight synthesis receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// The backend answered with a non-success status.
    #[error("TTS backend error ({status}): {message}")]
    Provider {
        /// HTTP status returned by the backend.
        status: u16,
        /// Response body returned by the backend.
        message: String,
    },

    /// The backend could not be reached or did not answer in time.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The synthesis task failed without a backend answer.
    #[error("Internal synthesis error: {0}")]
    Internal(String),
}

/// A text-to-speech backend.
///
/// Note for async_trait: the server holds the backend as a trait object, so the trait has to stay
/// dyn-compatible.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize speech for already normalized parameters.
    async fn synthesize(&self, params: &SpeechParams) -> Result<Audio, SynthesisError>;

    /// Name of the backend, for logging.
    fn name(&self) -> &str;
}
