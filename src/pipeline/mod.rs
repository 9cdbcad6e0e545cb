//! Narration pipeline: LLM streaming joined with TTS synthesis.

pub mod messages;
pub mod narration;

pub use narration::{NarrationPipeline, NarrationResult};
