//! Concurrent LLM + TTS narration pipeline.
//!
//! Two producers run side by side, joined by a bounded queue: the LLM
//! producer streams tokens, chunks them into sentence-sized blocks, and
//! enqueues each block for synthesis; the TTS producer dequeues blocks and
//! turns each into a complete, independently-decodable audio blob. If
//! either producer fails the other stops and the error propagates; no
//! retries happen inside the pipeline.

use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::characters::Character;
use crate::chunker::TokenChunker;
use crate::config::{Mode, SessionConfig};
use crate::error::{NarratorError, Result};
use crate::llm::{CHAT_MODE_SYSTEM_PROMPT, CompletionRequest, LlmClient, NARRATION_MODE_SYSTEM_PROMPT};
use crate::pipeline::messages::{ChunkProgress, NarrationChunk, TtsJob};
use crate::tts::{DEFAULT_TTS_MODEL, SynthesizeRequest, TtsClient};

const TTS_QUEUE_SIZE: usize = 8;

/// Full result of a completed narration call: the concatenated text and
/// the concatenated audio bytes of every chunk, in order.
#[derive(Debug, Clone)]
pub struct NarrationResult {
    pub text: String,
    pub audio: Vec<u8>,
    pub mime_type: String,
}

/// Drives one narration request end to end.
#[derive(Debug, Clone, Default)]
pub struct NarrationPipeline {
    llm: LlmClient,
    tts: TtsClient,
}

impl NarrationPipeline {
    /// Creates a pipeline with fresh HTTP clients.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrates `prompt` under `config`, voiced as `character`.
    ///
    /// `on_progress` is invoked once per completed chunk, in sequence order,
    /// before the final [`NarrationResult`] is returned. The LLM and TTS
    /// stages run concurrently; if either fails, the other is dropped and
    /// the error is returned. Fails with [`NarratorError::NotConfigured`] if
    /// `config` lacks credentials, and [`NarratorError::EmptyResult`] if the
    /// LLM produced no tokens at all.
    pub async fn narrate(
        &self,
        prompt: &str,
        config: &SessionConfig,
        character: &Character,
        mut on_progress: impl FnMut(ChunkProgress) + Send,
    ) -> Result<NarrationResult> {
        let llm_api_key = config
            .llm_api_key
            .as_ref()
            .ok_or_else(|| NarratorError::NotConfigured("missing llm_api_key".into()))?
            .as_str()
            .to_string();
        let tts_api_key = config
            .tts_api_key
            .as_ref()
            .ok_or_else(|| NarratorError::NotConfigured("missing tts_api_key".into()))?
            .as_str()
            .to_string();
        let tts_provider = config
            .effective_tts_provider()
            .ok_or_else(|| NarratorError::NotConfigured("missing tts_provider".into()))?;

        let (system_prompt, max_tokens): (&str, u32) = match config.mode {
            Mode::Narration => (NARRATION_MODE_SYSTEM_PROMPT, 25),
            Mode::Chat => (CHAT_MODE_SYSTEM_PROMPT, 20),
        };

        let (tts_tx, tts_rx) = mpsc::channel::<TtsJob>(TTS_QUEUE_SIZE);

        let llm_task = self.run_llm(
            prompt,
            &llm_api_key,
            &config.llm_model,
            system_prompt,
            max_tokens,
            character,
            config.base_url.as_deref(),
            &config.default_headers,
            tts_tx,
        );
        let tts_task = self.run_tts(
            tts_rx,
            &tts_api_key,
            &config.voice,
            tts_provider,
            character,
            &mut on_progress,
        );

        let timeout_duration = config.narration_timeout;
        let joined = futures_util::future::try_join(llm_task, tts_task);
        let (full_text, chunks) = match tokio::time::timeout(timeout_duration, joined).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(NarratorError::CancellationTimeout(format!(
                    "narration exceeded {timeout_duration:?}"
                )));
            }
        };

        if full_text.is_empty() {
            return Err(NarratorError::EmptyResult(
                "LLM produced no tokens for this prompt".into(),
            ));
        }

        let mut audio = Vec::new();
        for chunk in &chunks {
            audio.extend_from_slice(&chunk.audio_bytes);
        }

        Ok(NarrationResult {
            text: full_text,
            audio,
            mime_type: "audio/mpeg".to_string(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_llm(
        &self,
        prompt: &str,
        api_key: &str,
        model: &str,
        system_prompt: &str,
        max_tokens: u32,
        character: &Character,
        base_url: Option<&str>,
        default_headers: &std::collections::HashMap<String, String>,
        tts_tx: mpsc::Sender<TtsJob>,
    ) -> Result<String> {
        let request = CompletionRequest {
            prompt,
            api_key,
            model,
            system_prompt,
            character: Some(character),
            max_tokens: Some(max_tokens),
            base_url,
            default_headers,
        };

        let mut stream = self.llm.stream_completion(request);
        let mut chunker = TokenChunker::default_narration();
        let mut full_text = String::new();
        let mut next_index = 0usize;

        while let Some(token) = stream.next().await {
            let token = token?;
            full_text.push_str(&token);
            if let Some(block) = chunker.add_token(&token) {
                enqueue_block(&tts_tx, &mut next_index, block).await?;
            }
        }
        if let Some(block) = chunker.flush() {
            enqueue_block(&tts_tx, &mut next_index, block).await?;
        }

        Ok(full_text)
    }

    async fn run_tts(
        &self,
        mut tts_rx: mpsc::Receiver<TtsJob>,
        api_key: &str,
        voice: &str,
        provider: crate::config::TtsProvider,
        character: &Character,
        on_progress: &mut (impl FnMut(ChunkProgress) + Send),
    ) -> Result<Vec<NarrationChunk>> {
        let instructions = if character.tts_style_instructions.is_empty() {
            None
        } else {
            Some(character.tts_style_instructions.as_str())
        };
        let no_headers = std::collections::HashMap::new();

        let mut chunks = Vec::new();
        while let Some(job) = tts_rx.recv().await {
            let request = SynthesizeRequest {
                text: &job.text,
                api_key,
                voice,
                model: DEFAULT_TTS_MODEL,
                instructions,
                provider,
                base_url: None,
                default_headers: &no_headers,
            };

            let mut stream = self.tts.synthesize(request);
            let mut audio_buffer = Vec::new();
            while let Some(piece) = stream.next().await {
                audio_buffer.extend_from_slice(&piece?);
            }

            let chunk = NarrationChunk {
                text_fragment: job.text,
                audio_bytes: audio_buffer,
                mime_type: "audio/mpeg".to_string(),
                sequence_index: job.sequence_index,
            };
            on_progress(ChunkProgress::from(&chunk));
            chunks.push(chunk);
        }

        Ok(chunks)
    }
}

/// Strips whitespace then one layer of surrounding matched quotes (double,
/// then single), discarding the block entirely if nothing is left.
fn clean_tts_block(block: &str) -> Option<String> {
    let cleaned = block.trim().trim_matches('"').trim_matches('\'').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

async fn enqueue_block(tx: &mpsc::Sender<TtsJob>, next_index: &mut usize, block: String) -> Result<()> {
    let Some(cleaned) = clean_tts_block(&block) else {
        return Ok(());
    };
    let index = *next_index;
    *next_index += 1;
    tx.send(TtsJob {
        sequence_index: index,
        text: cleaned,
    })
    .await
    .map_err(|_| NarratorError::ChannelClosed("tts queue receiver dropped".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_tts_block_strips_whitespace_and_quotes() {
        assert_eq!(clean_tts_block("  \"hello there\"  "), Some("hello there".to_string()));
        assert_eq!(clean_tts_block("'hi'"), Some("hi".to_string()));
    }

    #[test]
    fn clean_tts_block_discards_empty_after_stripping() {
        assert_eq!(clean_tts_block("   "), None);
        assert_eq!(clean_tts_block("\"\""), None);
    }

    #[test]
    fn clean_tts_block_keeps_interior_quotes() {
        assert_eq!(
            clean_tts_block("she said \"hi\" to me"),
            Some("she said \"hi\" to me".to_string())
        );
    }

    #[tokio::test]
    async fn enqueue_block_skips_empty_after_cleaning() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut next_index = 0;
        enqueue_block(&tx, &mut next_index, "   ".to_string()).await.unwrap();
        drop(tx);
        assert!(rx.recv().await.is_none());
        assert_eq!(next_index, 0);
    }

    #[tokio::test]
    async fn enqueue_block_assigns_sequential_indices() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut next_index = 0;
        enqueue_block(&tx, &mut next_index, "first.".to_string()).await.unwrap();
        enqueue_block(&tx, &mut next_index, "second.".to_string()).await.unwrap();
        drop(tx);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence_index, 0);
        assert_eq!(second.sequence_index, 1);
        assert_eq!(next_index, 2);
    }

    #[tokio::test]
    async fn enqueue_block_errors_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut next_index = 0;
        let err = enqueue_block(&tx, &mut next_index, "hello.".to_string()).await;
        assert!(matches!(err, Err(NarratorError::ChannelClosed(_))));
    }
}
