//! Error types for the narration pipeline.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via [`NarratorError::code()`].
//! Codes are part of the public API contract and will not change.

/// Errors produced while configuring or running the narration pipeline.
///
/// Each variant includes a stable error code accessible via [`NarratorError::code()`].
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum NarratorError {
    /// `narrate_text` was called before `configure`.
    #[error("[NOT_CONFIGURED] {0}")]
    NotConfigured(String),

    /// The upstream LLM or TTS provider returned a rate-limit response.
    #[error("[UPSTREAM_RATE_LIMIT] {0}")]
    UpstreamRateLimit(String),

    /// The upstream LLM or TTS provider returned an error response.
    #[error("[UPSTREAM_API] {0}")]
    UpstreamApi(String),

    /// A synthesized audio blob could not be decoded.
    #[error("[DECODE_ERROR] {0}")]
    DecodeError(String),

    /// Reading from or writing to the PTY or host terminal failed.
    #[error("[TERMINAL_IO] {0}")]
    TerminalIoError(String),

    /// A narration task exceeded its per-request timeout and was abandoned.
    #[error("[CANCELLATION_TIMEOUT] {0}")]
    CancellationTimeout(String),

    /// The LLM produced zero tokens for a request.
    #[error("[EMPTY_RESULT] {0}")]
    EmptyResult(String),

    /// Invalid or missing configuration.
    #[error("[CONFIG_INVALID] {0}")]
    ConfigError(String),

    /// An internal channel closed unexpectedly.
    #[error("[CHANNEL_CLOSED] {0}")]
    ChannelClosed(String),

    /// Wrapped I/O error.
    #[error("[IO] {0}")]
    Io(#[from] std::io::Error),
}

impl NarratorError {
    /// Returns the stable error code for this error.
    ///
    /// Codes are SCREAMING_SNAKE_CASE strings that remain stable across releases.
    /// Use these for programmatic error handling rather than parsing Display output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "NOT_CONFIGURED",
            Self::UpstreamRateLimit(_) => "UPSTREAM_RATE_LIMIT",
            Self::UpstreamApi(_) => "UPSTREAM_API",
            Self::DecodeError(_) => "DECODE_ERROR",
            Self::TerminalIoError(_) => "TERMINAL_IO",
            Self::CancellationTimeout(_) => "CANCELLATION_TIMEOUT",
            Self::EmptyResult(_) => "EMPTY_RESULT",
            Self::ConfigError(_) => "CONFIG_INVALID",
            Self::ChannelClosed(_) => "CHANNEL_CLOSED",
            Self::Io(_) => "IO",
        }
    }

    /// Returns `true` for errors that are recoverable at the pipeline level
    /// (logged and skipped rather than propagated to the caller).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DecodeError(_) | Self::CancellationTimeout(_) | Self::EmptyResult(_)
        )
    }
}

/// Convenience alias for narration-pipeline results.
pub type Result<T> = std::result::Result<T, NarratorError>;
