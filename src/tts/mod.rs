//! Text-to-speech streaming client.
//!
//! Dispatches to OpenAI's `audio/speech` endpoint or ElevenLabs'
//! `text-to-speech` streaming endpoint, both returning MP3 audio bytes.

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;

use crate::config::TtsProvider;
use crate::error::{NarratorError, Result};

/// Default OpenAI TTS model.
pub const DEFAULT_TTS_MODEL: &str = "gpt-4o-mini-tts";
/// Default OpenAI TTS voice.
pub const DEFAULT_TTS_VOICE: &str = "nova";
/// Default ElevenLabs model, substituted whenever the caller passed the
/// OpenAI default model name alongside an ElevenLabs provider.
pub const DEFAULT_ELEVENLABS_MODEL: &str = "eleven_turbo_v2_5";
const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1";
const TTS_AUDIO_FORMAT: &str = "mp3";

/// Parameters for one TTS synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesizeRequest<'a> {
    pub text: &'a str,
    pub api_key: &'a str,
    pub voice: &'a str,
    pub model: &'a str,
    pub instructions: Option<&'a str>,
    pub provider: TtsProvider,
    pub base_url: Option<&'a str>,
    pub default_headers: &'a std::collections::HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct OpenAiSpeechBody<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ElevenLabsVoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Debug, Serialize)]
struct ElevenLabsSpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: ElevenLabsVoiceSettings,
}

/// Streaming TTS client.
#[derive(Debug, Clone)]
pub struct TtsClient {
    http: reqwest::Client,
}

impl Default for TtsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TtsClient {
    /// Creates a client backed by a fresh `reqwest::Client`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Streams synthesized MP3 bytes for `request`, dispatching to the
    /// configured provider.
    pub fn synthesize<'a>(
        &'a self,
        request: SynthesizeRequest<'a>,
    ) -> Pin<Box<dyn Stream<Item = Result<bytes::Bytes>> + Send + 'a>> {
        match request.provider {
            TtsProvider::OpenAi => self.stream_openai(request),
            TtsProvider::ElevenLabs => self.stream_elevenlabs(request),
        }
    }

    fn stream_openai<'a>(
        &'a self,
        request: SynthesizeRequest<'a>,
    ) -> Pin<Box<dyn Stream<Item = Result<bytes::Bytes>> + Send + 'a>> {
        let base_url = request.base_url.unwrap_or("https://api.openai.com").trim_end_matches('/');
        let url = format!("{base_url}/v1/audio/speech");
        let body = OpenAiSpeechBody {
            model: request.model,
            voice: request.voice,
            input: request.text,
            response_format: TTS_AUDIO_FORMAT,
            instructions: request.instructions,
        };

        let mut http_request = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", request.api_key))
            .header("Content-Type", "application/json");
        for (key, value) in request.default_headers {
            http_request = http_request.header(key, value);
        }

        Box::pin(async_stream::stream! {
            let response = match http_request.json(&body).send().await {
                Ok(response) => response,
                Err(err) => {
                    yield Err(NarratorError::UpstreamApi(format!("openai tts request failed: {err}")));
                    return;
                }
            };

            if let Some(err) = status_error(response.status(), "openai") {
                yield Err(err);
                return;
            }

            let mut bytes_stream = response.bytes_stream();
            while let Some(chunk) = bytes_stream.next().await {
                match chunk {
                    Ok(bytes) if !bytes.is_empty() => yield Ok(bytes),
                    Ok(_) => {}
                    Err(err) => {
                        yield Err(NarratorError::UpstreamApi(format!("openai tts stream error: {err}")));
                        return;
                    }
                }
            }
        })
    }

    fn stream_elevenlabs<'a>(
        &'a self,
        request: SynthesizeRequest<'a>,
    ) -> Pin<Box<dyn Stream<Item = Result<bytes::Bytes>> + Send + 'a>> {
        let model = if request.model == DEFAULT_TTS_MODEL {
            DEFAULT_ELEVENLABS_MODEL
        } else {
            request.model
        };
        let url = format!("{ELEVENLABS_API_BASE}/text-to-speech/{}", request.voice);
        let body = ElevenLabsSpeechBody {
            text: request.text,
            model_id: model,
            voice_settings: ElevenLabsVoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        let http_request = self
            .http
            .post(url)
            .header("Accept", "audio/mpeg")
            .header("Content-Type", "application/json")
            .header("xi-api-key", request.api_key);

        Box::pin(async_stream::stream! {
            let response = match http_request.json(&body).send().await {
                Ok(response) => response,
                Err(err) => {
                    yield Err(NarratorError::UpstreamApi(format!("elevenlabs tts request failed: {err}")));
                    return;
                }
            };

            if let Some(err) = status_error(response.status(), "elevenlabs") {
                yield Err(err);
                return;
            }

            let mut bytes_stream = response.bytes_stream();
            while let Some(chunk) = bytes_stream.next().await {
                match chunk {
                    Ok(bytes) if !bytes.is_empty() => yield Ok(bytes),
                    Ok(_) => {}
                    Err(err) => {
                        yield Err(NarratorError::UpstreamApi(format!("elevenlabs tts stream error: {err}")));
                        return;
                    }
                }
            }
        })
    }
}

/// Maps a non-2xx status into the appropriate error, or `None` on success.
fn status_error(status: reqwest::StatusCode, provider: &str) -> Option<NarratorError> {
    if status.is_success() {
        return None;
    }
    let status_code = status.as_u16();
    if status_code == 429 {
        Some(NarratorError::UpstreamRateLimit(format!("{provider} tts rate limited")))
    } else {
        Some(NarratorError::UpstreamApi(format!("{provider} tts HTTP {status_code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevenlabs_model_substitution_keeps_explicit_model() {
        let explicit = "eleven_v3";
        let model = if explicit == DEFAULT_TTS_MODEL {
            DEFAULT_ELEVENLABS_MODEL
        } else {
            explicit
        };
        assert_eq!(model, "eleven_v3");
    }

    #[test]
    fn elevenlabs_model_substitution_falls_back_on_openai_default() {
        let model = if DEFAULT_TTS_MODEL == DEFAULT_TTS_MODEL {
            DEFAULT_ELEVENLABS_MODEL
        } else {
            DEFAULT_TTS_MODEL
        };
        assert_eq!(model, DEFAULT_ELEVENLABS_MODEL);
    }

    #[test]
    fn default_voice_and_model_constants() {
        assert_eq!(DEFAULT_TTS_VOICE, "nova");
        assert_eq!(DEFAULT_TTS_MODEL, "gpt-4o-mini-tts");
    }

    #[test]
    fn status_error_maps_429_to_rate_limit() {
        let err = status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "openai");
        assert!(matches!(err, Some(NarratorError::UpstreamRateLimit(_))));
    }

    #[test]
    fn status_error_maps_other_to_upstream_api() {
        let err = status_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "openai");
        assert!(matches!(err, Some(NarratorError::UpstreamApi(_))));
    }

    #[test]
    fn status_error_none_on_success() {
        assert!(status_error(reqwest::StatusCode::OK, "openai").is_none());
    }
}
