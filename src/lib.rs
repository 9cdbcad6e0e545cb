//! Voice narration sidecar for interactive terminal coding agents.
//!
//! Wraps a child command in a PTY, mirrors its output to the real terminal
//! at native latency, and narrates what the agent is doing in the
//! background: the PTY byte stream is sanitized of ANSI escapes, buffered
//! into time-and-boundary-aware windows, and turned into character-voiced
//! speech by a pipeline that streams an LLM's narration tokens straight
//! into a TTS client and plays the resulting audio as it arrives.

pub mod audio;
pub mod characters;
pub mod chunker;
pub mod config;
pub mod error;
pub mod llm;
pub mod narrator_dirs;
pub mod pipeline;
pub mod pty;
pub mod sanitizer;
pub mod service;
pub mod text_buffer;
pub mod text_filter;
pub mod tts;

pub use characters::{Character, CharacterRegistry};
pub use config::{ConfigureRequest, SessionConfig};
pub use error::{NarratorError, Result};
pub use service::NarratorService;
