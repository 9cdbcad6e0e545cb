//! Streaming narration LLM client.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint over SSE,
//! yielding narration text tokens with the continuation/truncation
//! behavior described in [`client`].

pub mod client;
pub mod sse;

pub use client::{
    CHAT_MODE_SYSTEM_PROMPT, CompletionRequest, LlmClient, NARRATION_MODE_SYSTEM_PROMPT,
    character_modified_system_prompt, truncate_to_complete_sentence,
};
