//! Synthesis request parsing and normalization.

use serde::Deserialize;

use crate::error::TtsError;

const MIN_RATE: f64 = 0.25;
const MAX_RATE: f64 = 4.0;

/// Body of a synthesis request as sent by the lesson player.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    /// The text to speak.
    pub text: String,
    /// Language or locale code, e.g. `en-US`.
    pub language: String,
    /// Backend voice identifier.
    pub voice_id: String,
    /// Playback rate, `1.0` is normal speed.
    #[serde(default = "default_rate")]
    pub rate: f64,
}

fn default_rate() -> f64 {
    1.0
}

/// Normalized parameters that fully determine the synthesized audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechParams {
    /// Text with surrounding whitespace removed and inner whitespace runs collapsed.
    pub text: String,
    /// Lower-cased language code.
    pub language: String,
    /// Trimmed voice identifier.
    pub voice_id: String,
    /// Playback rate rounded to three decimals.
    pub rate: f64,
}

impl SpeechParams {
    /// Validate and normalize a request.
    pub fn normalize(request: SynthesisRequest, max_text_length: usize) -> Result<Self, TtsError> {
        let text = request.text.split_whitespace().collect::<Vec<_>>().join(" ");

        if text.is_empty() {
            return Err(TtsError::InvalidRequest("text must not be empty".to_string()));
        }

        let length = text.chars().count();

        if length > max_text_length {
            return Err(TtsError::InvalidRequest(format!(
                "text is {length} characters long, the limit is {max_text_length}"
            )));
        }

        let language = request.language.trim().to_lowercase();

        if language.is_empty() {
            return Err(TtsError::InvalidRequest("language must not be empty".to_string()));
        }

        let voice_id = request.voice_id.trim().to_string();

        if voice_id.is_empty() {
            return Err(TtsError::InvalidRequest("voiceId must not be empty".to_string()));
        }

        if !request.rate.is_finite() || !(MIN_RATE..=MAX_RATE).contains(&request.rate) {
            return Err(TtsError::InvalidRequest(format!(
                "rate must be between {MIN_RATE} and {MAX_RATE}"
            )));
        }

        // Rates closer than the fingerprint resolution are the same request.
        let rate = (request.rate * 1000.0).round() / 1000.0;

        Ok(Self {
            text,
            language,
            voice_id,
            rate,
        })
    }

    /// Content fingerprint of these parameters.
    ///
    /// Equal parameters always hash to the same fingerprint, and any difference in text, language,
    /// voice or rate changes it.
    pub fn fingerprint(&self) -> String {
        let rate = format!("{:.3}", self.rate);
        hashing::hash_parts(&[&self.text, &self.language, &self.voice_id, &rate])
    }
}
