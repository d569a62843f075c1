use async_trait::async_trait;
use config::VoiceProviderConfig;
use reqwest::{
    Client,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use url::Url;

use super::{Audio, SynthesisError, Synthesizer};
use crate::request::SpeechParams;

const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

/// Synthesizer calling an HTTP backend at `{base_url}/v1/text-to-speech/{voice_id}`.
pub struct HttpSynthesizer {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendRequest<'a> {
    text: &'a str,
    language: &'a str,
    rate: f64,
}

impl HttpSynthesizer {
    /// Create a synthesizer from the provider configuration.
    pub fn new(config: &VoiceProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client for the TTS backend: {e}"))?;

        if config.base_url.cannot_be_a_base() {
            anyhow::bail!("TTS backend URL '{}' cannot be used as a base URL", config.base_url);
        }

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, voice_id: &str) -> Result<Url, SynthesisError> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| SynthesisError::Internal(format!("invalid backend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "text-to-speech", voice_id]);

        Ok(url)
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, params: &SpeechParams) -> Result<Audio, SynthesisError> {
        let url = self.endpoint(&params.voice_id)?;

        let body = BackendRequest {
            text: &params.text,
            language: &params.language,
            rate: params.rate,
        };

        let mut request = self.client.post(url).header(ACCEPT, DEFAULT_CONTENT_TYPE).json(&body);

        if let Some(ref key) = self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SynthesisError::Connection("TTS backend timed out".to_string())
            } else {
                SynthesisError::Connection(format!("Failed to send request to the TTS backend: {e}"))
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("TTS backend error ({status}): {message}");

            return Err(SynthesisError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let bytes = response.bytes().await.map_err(|e| {
            log::error!("Failed to read TTS backend response body: {e}");
            SynthesisError::Connection(format!("Failed to read the TTS backend response: {e}"))
        })?;

        log::debug!("TTS backend returned {} bytes of {content_type}", bytes.len());

        Ok(Audio { content_type, bytes })
    }

    fn name(&self) -> &str {
        "http"
    }
}
