//! Contract tests for the TTS client against mocked OpenAI and ElevenLabs
//! speech endpoints.

use futures_util::StreamExt;
use narrator_bridge::config::TtsProvider;
use narrator_bridge::tts::{DEFAULT_TTS_MODEL, SynthesizeRequest, TtsClient};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn openai_synthesize_streams_audio_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFFu8, 0xFB, 0x90, 0x00]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = TtsClient::new();
    let default_headers = std::collections::HashMap::new();
    let request = SynthesizeRequest {
        text: "hello there",
        api_key: "test-key",
        voice: "nova",
        model: DEFAULT_TTS_MODEL,
        instructions: None,
        provider: TtsProvider::OpenAi,
        base_url: Some(&mock_server.uri()),
        default_headers: &default_headers,
    };

    let mut stream = client.synthesize(request);
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(bytes, vec![0xFFu8, 0xFB, 0x90, 0x00]);
}

#[tokio::test]
async fn openai_rate_limit_maps_to_recoverable_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let client = TtsClient::new();
    let default_headers = std::collections::HashMap::new();
    let request = SynthesizeRequest {
        text: "hello",
        api_key: "test-key",
        voice: "nova",
        model: DEFAULT_TTS_MODEL,
        instructions: None,
        provider: TtsProvider::OpenAi,
        base_url: Some(&mock_server.uri()),
        default_headers: &default_headers,
    };

    let mut stream = client.synthesize(request);
    let first = stream.next().await.expect("expected one item");
    assert!(matches!(first, Err(narrator_bridge::NarratorError::UpstreamRateLimit(_))));
}

#[tokio::test]
async fn openai_server_error_maps_to_upstream_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = TtsClient::new();
    let default_headers = std::collections::HashMap::new();
    let request = SynthesizeRequest {
        text: "hello",
        api_key: "test-key",
        voice: "nova",
        model: DEFAULT_TTS_MODEL,
        instructions: None,
        provider: TtsProvider::OpenAi,
        base_url: Some(&mock_server.uri()),
        default_headers: &default_headers,
    };

    let mut stream = client.synthesize(request);
    let first = stream.next().await.expect("expected one item");
    assert!(matches!(first, Err(narrator_bridge::NarratorError::UpstreamApi(_))));
}
