use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pyeonan::completion::{Advisory, CollectingSink};
use pyeonan::error::UNEXPECTED_FALLBACK;
use pyeonan::{
    CallFailure, CompletionProvider, GeminiClient, ProviderError, RetryPolicy, RetryingClient,
    Sleeper, Turn,
};

const MODEL: &str = "gemini-2.5-flash-preview-09-2025";
const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash-preview-09-2025:generateContent";

#[derive(Default)]
struct NoWait {
    waited: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for NoWait {
    async fn sleep(&self, delay: Duration) {
        self.waited.lock().unwrap().push(delay);
    }
}

fn reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

fn error_body(code: u16, status: &str, message: &str) -> serde_json::Value {
    json!({ "error": { "code": code, "message": message, "status": status } })
}

fn client_for(server: &MockServer, sleeper: Arc<NoWait>) -> RetryingClient<GeminiClient> {
    let base = format!("{}/v1beta", server.uri());
    RetryingClient::new(GeminiClient::with_base_url("test_key", &base), RetryPolicy::default())
        .with_sleeper(sleeper)
}

#[tokio::test]
async fn test_generate_sends_contents_and_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test_key"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "be gentle" }] },
            "contents": [
                { "role": "user", "parts": [{ "text": "hi" }] },
                { "role": "model", "parts": [{ "text": "hello" }] },
                { "role": "user", "parts": [{ "text": "I feel anxious today" }] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Let's take a breath.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GeminiClient::with_base_url("test_key", &format!("{}/v1beta", mock_server.uri()));
    let turns = vec![
        Turn::user("hi"),
        Turn::assistant("hello"),
        Turn::user("I feel anxious today"),
    ];
    let text = client.generate(MODEL, "be gentle", &turns).await.unwrap();
    assert_eq!(text, "Let's take a breath.");
}

#[tokio::test]
async fn test_429_is_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(error_body(429, "RESOURCE_EXHAUSTED", "Resource has been exhausted")),
        )
        .mount(&mock_server)
        .await;

    let client = GeminiClient::with_base_url("k", &format!("{}/v1beta", mock_server.uri()));
    let err = client.generate(MODEL, "sys", &[Turn::user("hi")]).await.unwrap_err();
    match err {
        ProviderError::RateLimited(msg) => assert_eq!(msg, "Resource has been exhausted"),
        other => panic!("expected rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retries_429_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(error_body(429, "RESOURCE_EXHAUSTED", "quota")),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("괜찮아요.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sleeper = Arc::new(NoWait::default());
    let client = client_for(&mock_server, sleeper.clone());
    let sink = CollectingSink::new();

    let out = client.complete(MODEL, "sys", &[Turn::user("hi")], &sink).await;
    assert_eq!(out.unwrap(), "괜찮아요.");
    assert_eq!(
        sleeper.waited.lock().unwrap().clone(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(sink.advisories().len(), 2);
}

#[tokio::test]
async fn test_always_429_stops_at_max_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&mock_server)
        .await;

    let sleeper = Arc::new(NoWait::default());
    let client = client_for(&mock_server, sleeper.clone());
    let sink = CollectingSink::new();

    let out = client.complete(MODEL, "sys", &[Turn::user("hi")], &sink).await;
    assert!(matches!(out, Err(CallFailure::RetriesExhausted { attempts: 5 })));
    assert_eq!(sleeper.waited.lock().unwrap().len(), 4);
    assert_eq!(sink.advisories().last(), Some(&Advisory::RateLimitExceeded));
}

#[tokio::test]
async fn test_auth_error_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(error_body(403, "PERMISSION_DENIED", "API key not valid")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let sleeper = Arc::new(NoWait::default());
    let client = client_for(&mock_server, sleeper.clone());
    let sink = CollectingSink::new();

    let out = client.complete(MODEL, "sys", &[Turn::user("hi")], &sink).await;
    match out {
        Err(CallFailure::Provider(msg)) => assert!(msg.contains("API key not valid")),
        other => panic!("expected provider failure, got {:?}", other),
    }
    assert!(sleeper.waited.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_server_error_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, Arc::new(NoWait::default()));
    let sink = CollectingSink::new();

    let out = client.complete(MODEL, "sys", &[Turn::user("hi")], &sink).await;
    assert!(matches!(out, Err(CallFailure::Provider(_))));
}

#[tokio::test]
async fn test_garbage_body_is_unexpected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, Arc::new(NoWait::default()));
    let sink = CollectingSink::new();

    let failure = client
        .complete(MODEL, "sys", &[Turn::user("hi")], &sink)
        .await
        .unwrap_err();
    assert!(matches!(failure, CallFailure::Unexpected(_)));
    assert_eq!(failure.fallback_text(), Some(UNEXPECTED_FALLBACK));
    assert!(matches!(sink.advisories()[0], Advisory::UnexpectedError(_)));
}

#[tokio::test]
async fn test_blocked_reply_is_empty_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "candidates": [{ "finishReason": "SAFETY" }] })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, Arc::new(NoWait::default()));
    let sink = CollectingSink::new();

    let out = client.complete(MODEL, "sys", &[Turn::user("hi")], &sink).await;
    assert_eq!(out.unwrap(), "");
    assert!(sink.advisories().is_empty());
}
