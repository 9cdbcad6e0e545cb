//! Session configuration for the narration bridge.
//!
//! Precedence when bootstrapping from the environment: CLI flag > environment
//! variable > `.env` file > built-in default. Secrets are wrapped in
//! [`RedactedString`] so they never reach a log statement or `Debug` derive.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A string wrapper that redacts its value in Display and Debug output.
///
/// The wrapped value is never exposed through [`fmt::Display`] or
/// [`fmt::Debug`]. The only way to access the inner value is through
/// [`RedactedString::as_str`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedactedString(String);

impl RedactedString {
    /// Wrap a secret value.
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// Access the inner value (use sparingly, e.g. for an HTTP header).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RedactedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Debug for RedactedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedString(\"[REDACTED]\")")
    }
}

/// Text-to-speech provider, auto-detected from API key shape unless pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsProvider {
    OpenAi,
    ElevenLabs,
}

impl fmt::Display for TtsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::ElevenLabs => write!(f, "elevenlabs"),
        }
    }
}

/// Narration mode: brief scene narration, or conversational chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Narration,
    Chat,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Narration => write!(f, "narration"),
            Self::Chat => write!(f, "chat"),
        }
    }
}

/// Detects the TTS provider from an API key's shape.
///
/// ElevenLabs keys are conventionally prefixed `elevenlabs_` or `el-`;
/// anything else is treated as OpenAI-compatible.
#[must_use]
pub fn detect_tts_provider(api_key: &str) -> TtsProvider {
    let lower = api_key.to_lowercase();
    if lower.starts_with("elevenlabs_") || lower.starts_with("el-") {
        TtsProvider::ElevenLabs
    } else {
        TtsProvider::OpenAi
    }
}

/// Process-local, mutable narration session configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub llm_api_key: Option<RedactedString>,
    pub tts_api_key: Option<RedactedString>,
    pub llm_model: String,
    pub voice: String,
    pub tts_provider: Option<TtsProvider>,
    pub mode: Mode,
    pub character: String,
    pub base_url: Option<String>,
    pub default_headers: HashMap<String, String>,
    pub min_window: std::time::Duration,
    pub pause_threshold: std::time::Duration,
    pub max_concurrent_narrations: usize,
    pub narration_timeout: std::time::Duration,
}

impl SessionConfig {
    /// Built-in defaults before any environment/CLI/configure overlay is applied.
    #[must_use]
    pub fn new() -> Self {
        Self {
            llm_api_key: None,
            tts_api_key: None,
            llm_model: "small-chat".to_string(),
            voice: "nova".to_string(),
            tts_provider: None,
            mode: Mode::Narration,
            character: "reluctant_developer".to_string(),
            base_url: None,
            default_headers: HashMap::new(),
            min_window: std::time::Duration::from_millis(3_500),
            pause_threshold: std::time::Duration::from_millis(5_000),
            max_concurrent_narrations: 2,
            narration_timeout: std::time::Duration::from_secs(60),
        }
    }

    /// `true` once both an LLM key and a TTS key are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.llm_api_key.is_some() && self.tts_api_key.is_some()
    }

    /// Applies a `configure` call, mirroring the tool contract in §4.6: if
    /// `tts_api_key` is absent it defaults to `llm_api_key`; if `tts_provider`
    /// is absent it is re-derived from the effective TTS key.
    pub fn apply_configure(&mut self, req: ConfigureRequest) {
        self.llm_api_key = Some(RedactedString::new(req.llm_api_key));
        if let Some(model) = req.llm_model {
            self.llm_model = model;
        }
        if let Some(voice) = req.voice {
            self.voice = voice;
        }
        if let Some(mode) = req.mode {
            self.mode = mode;
        }
        if let Some(character) = req.character {
            self.character = character;
        }
        if req.base_url.is_some() {
            self.base_url = req.base_url;
        }
        if let Some(headers) = req.default_headers {
            self.default_headers = headers;
        }

        let tts_key = req
            .tts_api_key
            .unwrap_or_else(|| self.llm_api_key.as_ref().expect("just set").as_str().to_string());
        self.tts_provider = Some(req.tts_provider.unwrap_or_else(|| detect_tts_provider(&tts_key)));
        self.tts_api_key = Some(RedactedString::new(tts_key));
    }

    /// Effective TTS provider, re-derived from the TTS key when not pinned.
    #[must_use]
    pub fn effective_tts_provider(&self) -> Option<TtsProvider> {
        if let Some(provider) = self.tts_provider {
            return Some(provider);
        }
        self.tts_api_key
            .as_ref()
            .map(|k| detect_tts_provider(k.as_str()))
    }

    /// Bootstraps defaults from environment variables. CLI flags (parsed by
    /// the `bridge` binary) overlay on top of this; `.env` is expected to
    /// already have been loaded into the process environment via `dotenvy`
    /// before this is called, so it naturally sits beneath env vars proper
    /// only by virtue of being loaded first.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::new();
        if let Ok(v) = std::env::var("NARRATOR_LLM_API_KEY") {
            cfg.llm_api_key = Some(RedactedString::new(v));
        }
        if let Ok(v) = std::env::var("NARRATOR_TTS_API_KEY") {
            cfg.tts_api_key = Some(RedactedString::new(v));
        }
        if let Ok(v) = std::env::var("NARRATOR_LLM_MODEL") {
            cfg.llm_model = v;
        }
        if let Ok(v) = std::env::var("NARRATOR_VOICE") {
            cfg.voice = v;
        }
        if let Ok(v) = std::env::var("NARRATOR_MODE") {
            cfg.mode = match v.as_str() {
                "chat" => Mode::Chat,
                _ => Mode::Narration,
            };
        }
        if let Ok(v) = std::env::var("NARRATOR_CHARACTER") {
            cfg.character = v;
        }
        if let Ok(v) = std::env::var("NARRATOR_TTS_PROVIDER") {
            cfg.tts_provider = match v.as_str() {
                "elevenlabs" => Some(TtsProvider::ElevenLabs),
                "openai" => Some(TtsProvider::OpenAi),
                _ => None,
            };
        }
        if let Ok(v) = std::env::var("NARRATOR_BASE_URL") {
            cfg.base_url = Some(v);
        }
        if cfg.tts_api_key.is_none() {
            cfg.tts_api_key = cfg.llm_api_key.clone();
        }
        cfg
    }
}

/// Request payload for the `configure` tool operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigureRequest {
    pub llm_api_key: String,
    pub llm_model: Option<String>,
    pub voice: Option<String>,
    pub mode: Option<Mode>,
    pub character: Option<String>,
    pub base_url: Option<String>,
    pub default_headers: Option<HashMap<String, String>>,
    pub tts_api_key: Option<String>,
    pub tts_provider: Option<TtsProvider>,
}

/// Response payload for the `get_config_status` tool operation. Never
/// carries secret values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigStatus {
    pub has_api_key: bool,
    pub has_tts_api_key: bool,
    pub is_configured: bool,
    pub session: SessionStatus,
}

/// The non-secret session settings nested under `get_config_status`'s
/// `session` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub model: String,
    pub voice: String,
    pub mode: Mode,
    pub character: String,
    pub base_url: Option<String>,
    pub has_default_headers: bool,
    pub tts_provider: Option<TtsProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_headers_keys: Option<Vec<String>>,
}

impl From<&SessionConfig> for ConfigStatus {
    fn from(cfg: &SessionConfig) -> Self {
        let default_headers_keys = if cfg.default_headers.is_empty() {
            None
        } else {
            Some(cfg.default_headers.keys().cloned().collect())
        };
        Self {
            has_api_key: cfg.llm_api_key.is_some(),
            has_tts_api_key: cfg.tts_api_key.is_some(),
            is_configured: cfg.is_configured(),
            session: SessionStatus {
                model: cfg.llm_model.clone(),
                voice: cfg.voice.clone(),
                mode: cfg.mode,
                character: cfg.character.clone(),
                base_url: cfg.base_url.clone(),
                has_default_headers: !cfg.default_headers.is_empty(),
                tts_provider: cfg.effective_tts_provider(),
                default_headers_keys,
            },
        }
    }
}
