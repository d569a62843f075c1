use std::sync::Arc;

use crate::{
    dedupe::InFlight,
    provider::{Audio, Synthesizer},
    request::{SpeechParams, SynthesisRequest},
};

/// Shared state behind the voice endpoints.
#[derive(Clone)]
pub(crate) struct TtsServer {
    shared: Arc<TtsServerInner>,
}

struct TtsServerInner {
    synthesizer: Arc<dyn Synthesizer>,
    in_flight: InFlight<Audio>,
    max_text_length: usize,
}

impl TtsServer {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, max_text_length: usize) -> Self {
        log::debug!("Initializing TTS server with the {} backend", synthesizer.name());

        Self {
            shared: Arc::new(TtsServerInner {
                synthesizer,
                in_flight: InFlight::new(),
                max_text_length,
            }),
        }
    }

    /// Synthesize speech for a request, joining an identical synthesis if one is already running.
    ///
    /// Returns the content fingerprint together with the audio.
    pub async fn synthesize(&self, request: SynthesisRequest) -> crate::Result<(String, Audio)> {
        let params = SpeechParams::normalize(request, self.shared.max_text_length)?;
        let fingerprint = params.fingerprint();

        let synthesizer = Arc::clone(&self.shared.synthesizer);

        let pending = self.shared.in_flight.get_or_start(&fingerprint, move || async move {
            log::debug!(
                "Calling the {} backend for {} characters in '{}' with voice '{}'",
                synthesizer.name(),
                params.text.chars().count(),
                params.language,
                params.voice_id,
            );

            synthesizer.synthesize(&params).await
        });

        let audio = pending.await?;

        Ok((fingerprint, audio))
    }

    /// Number of syntheses currently running.
    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.len()
    }
}
