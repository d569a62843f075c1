use indoc::formatdoc;
use integration_tests::{TestServer, TtsBackend, TtsBackendMock};
use serde_json::{Value, json};

async fn server_with_tiers(backend: &TtsBackend, tiers: &str) -> TestServer {
    let config = formatdoc! {r#"
        [voice.provider]
        base_url = "{url}"

        {tiers}
    "#, url = backend.url()};

    TestServer::start(&config).await
}

async fn synthesize(server: &TestServer, headers: &[(&str, &str)], text: &str) -> Value {
    let mut request = server
        .client
        .request(reqwest::Method::POST, "/voice/tts")
        .json(&json!({ "text": text, "language": "en", "voiceId": "narrator" }));

    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request.send().await.unwrap();

    json!({
        "retry_after": response.headers().get("retry-after").map(|h| h.to_str().unwrap_or("invalid")),
        "status": response.status().as_u16()
    })
}

#[tokio::test]
async fn per_ip_rate_limit() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();

    let server = server_with_tiers(
        &backend,
        r#"
        [[voice.rate_limits.tiers]]
        key = "ip"
        max_requests = 2
        window = "60s"
        "#,
    )
    .await;

    let mut results = Vec::new();

    for i in 1..=3 {
        let result = synthesize(&server, &[("x-forwarded-for", "192.168.1.1")], &format!("Lesson {i}")).await;
        results.push(json!({ "ip": "192.168.1.1", "request": i, "response": result }));
    }

    for i in 1..=2 {
        let result = synthesize(&server, &[("x-forwarded-for", "192.168.1.2, 10.0.0.1")], &format!("Lesson {i}")).await;
        results.push(json!({ "ip": "192.168.1.2", "request": i, "response": result }));
    }

    insta::assert_json_snapshot!(results, @r#"
    [
      {
        "ip": "192.168.1.1",
        "request": 1,
        "response": {
          "retry_after": null,
          "status": 200
        }
      },
      {
        "ip": "192.168.1.1",
        "request": 2,
        "response": {
          "retry_after": null,
          "status": 200
        }
      },
      {
        "ip": "192.168.1.1",
        "request": 3,
        "response": {
          "retry_after": "60",
          "status": 429
        }
      },
      {
        "ip": "192.168.1.2",
        "request": 1,
        "response": {
          "retry_after": null,
          "status": 200
        }
      },
      {
        "ip": "192.168.1.2",
        "request": 2,
        "response": {
          "retry_after": null,
          "status": 200
        }
      }
    ]
    "#);

    // Rejected requests never reach the backend
    assert_eq!(backend.call_count(), 4);
}

#[tokio::test]
async fn fingerprint_rate_limit_spans_addresses() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();

    let server = server_with_tiers(
        &backend,
        r#"
        [[voice.rate_limits.tiers]]
        key = "ip"
        max_requests = 10
        window = "60s"

        [[voice.rate_limits.tiers]]
        key = "fingerprint"
        max_requests = 2
        window = "60s"
        "#,
    )
    .await;

    let browser = [("user-agent", "LessonPlayer/1.0"), ("accept-language", "en-GB")];

    let mut statuses = Vec::new();

    for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        let headers = [browser[0], browser[1], ("x-forwarded-for", ip)];
        let result = synthesize(&server, &headers, "Chapter one").await;
        statuses.push(result["status"].clone());
    }

    // A different browser has its own fingerprint bucket
    let other = [("user-agent", "LessonPlayer/2.0"), ("accept-language", "en-GB"), ("x-forwarded-for", "10.0.0.1")];
    statuses.push(synthesize(&server, &other, "Chapter one").await["status"].clone());

    assert_eq!(statuses, vec![json!(200), json!(200), json!(429), json!(200)]);
}

#[tokio::test]
async fn rejection_names_the_exceeded_tier() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();

    let server = server_with_tiers(
        &backend,
        r#"
        [[voice.rate_limits.tiers]]
        key = "ip"
        max_requests = 1
        window = "30s"
        "#,
    )
    .await;

    let body = json!({ "text": "Hello", "language": "en", "voiceId": "narrator" });

    let first = server.client.post("/voice/tts", &body).await;
    assert_eq!(first.status(), 200);

    let second = server.client.post("/voice/tts", &body).await;
    assert_eq!(second.status(), 429);

    let error: Value = second.json().await.unwrap();

    insta::assert_json_snapshot!(error, @r#"
    {
      "error": {
        "code": 429,
        "limit": "ip",
        "message": "Rate limit exceeded for tier ip, retry after 30 seconds",
        "retryAfter": 30,
        "type": "rate_limit_error"
      }
    }
    "#);
}

#[tokio::test]
async fn default_tiers_apply_without_configuration() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();
    let server = server_with_tiers(&backend, "").await;

    let mut statuses = Vec::new();

    for i in 1..=6 {
        let result = synthesize(&server, &[("x-forwarded-for", "172.16.0.9")], &format!("Sentence {i}")).await;
        statuses.push(result["status"].as_u64().unwrap());
    }

    // Five requests per minute per address
    assert_eq!(statuses, vec![200, 200, 200, 200, 200, 429]);
}

#[tokio::test]
async fn rate_limiting_disabled() {
    let backend = TtsBackendMock::new().spawn().await.unwrap();

    let server = server_with_tiers(
        &backend,
        r#"
        [voice.rate_limits]
        enabled = false
        "#,
    )
    .await;

    let mut success_count = 0;

    for i in 1..=12 {
        let result = synthesize(&server, &[("x-forwarded-for", "172.16.0.9")], &format!("Sentence {i}")).await;

        if result["status"] == 200 {
            success_count += 1;
        }
    }

    assert_eq!(success_count, 12);
    assert_eq!(backend.call_count(), 12);
}
