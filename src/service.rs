//! Transport-agnostic narration service.
//!
//! `NarratorService` exposes the four tool operations as plain `async fn`s
//! over request/response types that already derive `serde`, so a caller can
//! wrap them in an HTTP handler, a stdio JSON-RPC loop, or call them
//! in-process from the PTY orchestrator without this crate depending on any
//! particular RPC framework.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::characters::CharacterRegistry;
use crate::config::{ConfigStatus, ConfigureRequest, SessionConfig};
use crate::error::{NarratorError, Result};
use crate::pipeline::{NarrationPipeline, messages::ChunkProgress};

/// Response payload for the `narrate_text` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrateResponse {
    pub text: String,
    /// Base64-encoded audio bytes.
    pub audio: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response payload for the `list_characters` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCharactersResponse {
    pub characters: Vec<crate::characters::CharacterSummary>,
}

/// Holds the mutable session state and exposes the narration tool contract.
pub struct NarratorService {
    config: Mutex<SessionConfig>,
    characters: CharacterRegistry,
    pipeline: NarrationPipeline,
}

impl Default for NarratorService {
    fn default() -> Self {
        Self::new()
    }
}

impl NarratorService {
    /// Creates a service with built-in defaults and no credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SessionConfig::new())
    }

    /// Creates a service starting from a pre-populated `config` (e.g. one
    /// bootstrapped from the environment via [`SessionConfig::from_env`]).
    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config: Mutex::new(config),
            characters: CharacterRegistry::default(),
            pipeline: NarrationPipeline::new(),
        }
    }

    /// Creates a service with a custom character registry (e.g. one built
    /// with a `characters.toml` overlay).
    #[must_use]
    pub fn with_config_and_characters(config: SessionConfig, characters: CharacterRegistry) -> Self {
        Self {
            config: Mutex::new(config),
            characters,
            pipeline: NarrationPipeline::new(),
        }
    }

    /// Mutates the session per the `configure` tool contract; always
    /// succeeds given a non-empty `llm_api_key`.
    pub async fn configure(&self, req: ConfigureRequest) -> String {
        let mut cfg = self.config.lock().await;
        cfg.apply_configure(req);
        "Configuration updated successfully".to_string()
    }

    /// Generates narrated speech for `prompt`, invoking `on_progress` once
    /// per completed chunk as it becomes available.
    ///
    /// # Errors
    ///
    /// Returns [`NarratorError::NotConfigured`] if `configure` has not been
    /// called, or any error the narration pipeline produces.
    pub async fn narrate_text(
        &self,
        prompt: &str,
        on_progress: impl FnMut(ChunkProgress) + Send,
    ) -> Result<NarrateResponse> {
        let cfg = self.config.lock().await.clone();
        if !cfg.is_configured() {
            return Err(NarratorError::NotConfigured(
                "call 'configure' before 'narrate_text'".to_string(),
            ));
        }

        let character = self
            .characters
            .get(&cfg.character)
            .ok_or_else(|| NarratorError::ConfigError(format!("unknown character: {}", cfg.character)))?;

        let result = match self.pipeline.narrate(prompt, &cfg, character, on_progress).await {
            Ok(result) => result,
            Err(NarratorError::EmptyResult(msg)) => {
                return Ok(NarrateResponse {
                    text: String::new(),
                    audio: String::new(),
                    format: "mp3".to_string(),
                    error: Some(msg),
                });
            }
            Err(e) => return Err(e),
        };

        Ok(NarrateResponse {
            text: result.text,
            audio: base64::engine::general_purpose::STANDARD.encode(&result.audio),
            format: "mp3".to_string(),
            error: None,
        })
    }

    /// Lists the available narration characters.
    #[must_use]
    pub fn list_characters(&self) -> ListCharactersResponse {
        ListCharactersResponse {
            characters: self.characters.list(),
        }
    }

    /// Reports configuration status; never includes secret values.
    pub async fn get_config_status(&self) -> ConfigStatus {
        let cfg = self.config.lock().await;
        ConfigStatus::from(&*cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigureRequest;

    #[tokio::test]
    async fn narrate_text_fails_before_configure() {
        let service = NarratorService::new();
        let err = service.narrate_text("hello", |_| {}).await;
        assert!(matches!(err, Err(NarratorError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn configure_acknowledges_success() {
        let service = NarratorService::new();
        let ack = service
            .configure(ConfigureRequest {
                llm_api_key: "sk-test".to_string(),
                ..Default::default()
            })
            .await;
        assert_eq!(ack, "Configuration updated successfully");
    }

    #[tokio::test]
    async fn get_config_status_reflects_configure() {
        let service = NarratorService::new();
        assert!(!service.get_config_status().await.is_configured);
        service
            .configure(ConfigureRequest {
                llm_api_key: "sk-test".to_string(),
                ..Default::default()
            })
            .await;
        assert!(service.get_config_status().await.is_configured);
    }

    #[test]
    fn list_characters_includes_builtins() {
        let service = NarratorService::new();
        let response = service.list_characters();
        assert_eq!(response.characters.len(), 2);
    }

    #[tokio::test]
    async fn narrate_text_rejects_unknown_character() {
        let service = NarratorService::new();
        service
            .configure(ConfigureRequest {
                llm_api_key: "sk-test".to_string(),
                character: Some("nonexistent".to_string()),
                ..Default::default()
            })
            .await;
        let err = service.narrate_text("hello", |_| {}).await;
        assert!(matches!(err, Err(NarratorError::ConfigError(_))));
    }
}
