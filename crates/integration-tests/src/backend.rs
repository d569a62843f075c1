//! A TTS backend speaking the `/v1/text-to-speech/{voice_id}` protocol, for driving the server.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use tokio::net::TcpListener;

/// One request received by the mock backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCall {
    pub voice_id: String,
    pub text: String,
    pub language: String,
    pub rate: f64,
    pub authorization: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BackendRequest {
    text: String,
    language: String,
    rate: f64,
}

/// Builder for the mock TTS backend
#[derive(Default)]
pub struct TtsBackendMock {
    delay: Duration,
    error: Option<(StatusCode, String)>,
}

impl TtsBackendMock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request only after the given delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer every request with the given error status and body.
    pub fn with_error(mut self, status: u16, message: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.error = Some((status, message.into()));
        self
    }

    pub async fn spawn(self) -> anyhow::Result<TtsBackend> {
        let state = Arc::new(BackendState {
            delay: self.delay,
            error: self.error,
            calls: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/text-to-speech/{voice_id}", post(synthesize))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Ok(TtsBackend { address, state })
    }
}

struct BackendState {
    delay: Duration,
    error: Option<(StatusCode, String)>,
    calls: Mutex<Vec<BackendCall>>,
}

/// A running mock backend.
pub struct TtsBackend {
    address: SocketAddr,
    state: Arc<BackendState>,
}

impl TtsBackend {
    /// Base URL to put in the `[voice.provider]` section.
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }
}

async fn synthesize(
    State(state): State<Arc<BackendState>>,
    Path(voice_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<BackendRequest>,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let body = format!("audio:{voice_id}:{}:{}:{}", request.language, request.rate, request.text);

    state.calls.lock().unwrap().push(BackendCall {
        voice_id,
        text: request.text,
        language: request.language,
        rate: request.rate,
        authorization,
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    if let Some((status, ref message)) = state.error {
        return (status, message.clone()).into_response();
    }

    ([(header::CONTENT_TYPE, "audio/ogg")], body).into_response()
}
