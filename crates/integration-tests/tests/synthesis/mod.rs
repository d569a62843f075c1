use std::time::Duration;

use futures::future::join_all;
use indoc::formatdoc;
use integration_tests::{BackendCall, TestServer, TtsBackend, TtsBackendMock};
use serde_json::{Value, json};

async fn server(backend: &TtsBackend) -> TestServer {
    let config = formatdoc! {r#"
        [voice.provider]
        base_url = "{url}"

        [voice.rate_limits]
        enabled = false
    "#, url = backend.url()};

    TestServer::start(&config).await
}

fn lesson(text: &str) -> Value {
    json!({ "text": text, "language": "en-US", "voiceId": "narrator" })
}

#[tokio::test]
async fn returns_backend_audio() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();
    let server = server(&backend).await;

    let response = server
        .client
        .post("/voice/tts", &json!({ "text": "Cells  divide ", "language": "EN-us", "voiceId": "narrator", "rate": 1.5 }))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "audio/ogg");
    assert_eq!(response.headers()["x-tts-fingerprint"].len(), 64);

    let body = response.text().await.unwrap();
    insta::assert_snapshot!(body, @"audio:narrator:en-us:1.5:Cells divide");

    assert_eq!(
        backend.calls(),
        vec![BackendCall {
            voice_id: "narrator".to_string(),
            text: "Cells divide".to_string(),
            language: "en-us".to_string(),
            rate: 1.5,
            authorization: None,
        }]
    );
}

#[tokio::test]
async fn concurrent_identical_requests_share_one_synthesis() {
    let backend = TtsBackendMock::new()
        .with_delay(Duration::from_millis(300))
        .spawn()
        .await
        .unwrap();

    let server = server(&backend).await;

    let requests = (0..5).map(|i| {
        let client = server.client.clone();

        // Whitespace differences normalize to the same text
        let text = if i % 2 == 0 { "The water cycle" } else { "  The water   cycle" };

        async move {
            let response = client.post("/voice/tts", &lesson(text)).await;
            let status = response.status().as_u16();
            let fingerprint = response.headers()["x-tts-fingerprint"].to_str().unwrap().to_string();
            let body = response.text().await.unwrap();

            (status, fingerprint, body)
        }
    });

    let results = join_all(requests).await;

    assert_eq!(backend.call_count(), 1);

    for (status, fingerprint, body) in &results {
        assert_eq!(*status, 200);
        assert_eq!(fingerprint, &results[0].1);
        assert_eq!(body, "audio:narrator:en-us:1:The water cycle");
    }
}

#[tokio::test]
async fn different_requests_are_synthesized_separately() {
    let backend = TtsBackendMock::new()
        .with_delay(Duration::from_millis(100))
        .spawn()
        .await
        .unwrap();

    let server = server(&backend).await;

    let (evaporation, condensation) = (lesson("Evaporation"), lesson("Condensation"));

    let first = server.client.post("/voice/tts", &evaporation);
    let second = server.client.post("/voice/tts", &condensation);

    let (first, second) = tokio::join!(first, second);

    assert_ne!(first.headers()["x-tts-fingerprint"], second.headers()["x-tts-fingerprint"]);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn completed_synthesis_is_not_cached() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();
    let server = server(&backend).await;

    for _ in 0..3 {
        let response = server.client.post("/voice/tts", &lesson("Precipitation")).await;
        assert_eq!(response.status(), 200);
    }

    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn backend_error_reaches_every_waiter() {
    let backend = TtsBackendMock::new()
        .with_delay(Duration::from_millis(200))
        .with_error(503, "voice model is loading")
        .spawn()
        .await
        .unwrap();

    let server = server(&backend).await;

    let requests = (0..3).map(|_| {
        let client = server.client.clone();

        async move {
            let response = client.post("/voice/tts", &lesson("Photosynthesis")).await;
            let status = response.status().as_u16();
            let body: Value = response.json().await.unwrap();

            (status, body)
        }
    });

    let results = join_all(requests).await;

    assert_eq!(backend.call_count(), 1);

    for (status, body) in &results {
        assert_eq!(*status, 502);
        assert_eq!(body, &results[0].1);
    }

    insta::assert_json_snapshot!(results[0].1, @r#"
    {
      "error": {
        "code": 502,
        "message": "TTS backend error (503): voice model is loading",
        "type": "api_error"
      }
    }
    "#);

    // The failure is not remembered
    let retry = server.client.post("/voice/tts", &lesson("Photosynthesis")).await;
    assert_eq!(retry.status(), 502);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn api_key_is_sent_as_bearer_token() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();

    let config = formatdoc! {r#"
        [voice.provider]
        base_url = "{url}"
        api_key = "test-key"
    "#, url = backend.url()};

    let server = TestServer::start(&config).await;

    let response = server.client.post("/voice/tts", &lesson("Hello")).await;
    assert_eq!(response.status(), 200);

    let calls = backend.calls();
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer test-key"));
}

#[tokio::test]
async fn invalid_request_is_rejected() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();
    let server = server(&backend).await;

    let response = server
        .client
        .post("/voice/tts", &json!({ "text": "   ", "language": "en", "voiceId": "narrator" }))
        .await;

    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": {
        "code": 400,
        "message": "Invalid request: text must not be empty",
        "type": "invalid_request_error"
      }
    }
    "#);

    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn custom_voice_path() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();

    let config = formatdoc! {r#"
        [voice]
        path = "/speech"

        [voice.provider]
        base_url = "{url}"
    "#, url = backend.url()};

    let server = TestServer::start(&config).await;

    let response = server.client.post("/speech/tts", &lesson("Hello")).await;
    assert_eq!(response.status(), 200);

    let response = server.client.post("/voice/tts", &lesson("Hello")).await;
    assert_eq!(response.status(), 404);
}
