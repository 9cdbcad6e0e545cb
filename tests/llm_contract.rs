//! Contract tests for the narration LLM client against a mocked
//! OpenAI-compatible chat-completions endpoint.

use futures_util::StreamExt;
use narrator_bridge::llm::{CompletionRequest, LlmClient};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(events: &[&str]) -> String {
    let mut out = String::new();
    for event in events {
        out.push_str("data: ");
        out.push_str(event);
        out.push_str("\n\n");
    }
    out.push_str("data: [DONE]\n\n");
    out
}

#[tokio::test]
async fn streams_text_deltas_from_sse_chunks() {
    let mock_server = MockServer::start().await;

    let body = sse_body(&[
        r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#,
        r#"{"choices":[{"delta":{"content":" there."},"finish_reason":null}]}"#,
        r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
    ]);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = LlmClient::new();
    let default_headers = std::collections::HashMap::new();
    let request = CompletionRequest {
        prompt: "narrate this",
        api_key: "test-key",
        model: "small-chat",
        system_prompt: "You narrate.",
        character: None,
        max_tokens: Some(25),
        base_url: Some(&mock_server.uri()),
        default_headers: &default_headers,
    };

    let mut stream = client.stream_completion(request);
    let mut collected = String::new();
    while let Some(token) = stream.next().await {
        collected.push_str(&token.unwrap());
    }

    assert_eq!(collected, "Hello there.");
}

#[tokio::test]
async fn sends_authorization_header_and_model() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer secret-key"))
        .and(body_partial_json(serde_json::json!({"model": "small-chat", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&[
            r#"{"choices":[{"delta":{"content":"ok"},"finish_reason":"stop"}]}"#,
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = LlmClient::new();
    let default_headers = std::collections::HashMap::new();
    let request = CompletionRequest {
        prompt: "hi",
        api_key: "secret-key",
        model: "small-chat",
        system_prompt: "You narrate.",
        character: None,
        max_tokens: None,
        base_url: Some(&mock_server.uri()),
        default_headers: &default_headers,
    };

    let mut stream = client.stream_completion(request);
    let mut collected = String::new();
    while let Some(token) = stream.next().await {
        collected.push_str(&token.unwrap());
    }
    assert_eq!(collected, "ok");
}

#[tokio::test]
async fn rate_limit_response_maps_to_recoverable_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"message": "slow down"}
        })))
        .mount(&mock_server)
        .await;

    let client = LlmClient::new();
    let default_headers = std::collections::HashMap::new();
    let request = CompletionRequest {
        prompt: "hi",
        api_key: "test-key",
        model: "small-chat",
        system_prompt: "You narrate.",
        character: None,
        max_tokens: None,
        base_url: Some(&mock_server.uri()),
        default_headers: &default_headers,
    };

    let mut stream = client.stream_completion(request);
    let first = stream.next().await.expect("expected one item");
    assert!(matches!(first, Err(narrator_bridge::NarratorError::UpstreamRateLimit(_))));
}

#[tokio::test]
async fn empty_stream_yields_no_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
        .mount(&mock_server)
        .await;

    let client = LlmClient::new();
    let default_headers = std::collections::HashMap::new();
    let request = CompletionRequest {
        prompt: "hi",
        api_key: "test-key",
        model: "small-chat",
        system_prompt: "You narrate.",
        character: None,
        max_tokens: None,
        base_url: Some(&mock_server.uri()),
        default_headers: &default_headers,
    };

    let mut stream = client.stream_completion(request);
    assert!(stream.next().await.is_none());
}
