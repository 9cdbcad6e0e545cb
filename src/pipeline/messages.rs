//! Message types passed between narration pipeline stages.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// One `(text, audio)` unit of a narration response, in LLM production order.
#[derive(Debug, Clone)]
pub struct NarrationChunk {
    /// The sentence-sized text this chunk narrates.
    pub text_fragment: String,
    /// The synthesized audio, a complete independently-decodable blob.
    pub audio_bytes: Vec<u8>,
    /// MIME type of `audio_bytes` (`audio/mpeg` for both providers).
    pub mime_type: String,
    /// Position of this chunk among all chunks in the response, from 0.
    pub sequence_index: usize,
}

/// Progress event delivered to the caller-supplied callback as each chunk
/// completes, suitable for progressive playback before the full response
/// is ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkProgress {
    pub index: usize,
    pub text: String,
    /// Base64-encoded audio bytes.
    pub audio: String,
}

impl From<&NarrationChunk> for ChunkProgress {
    fn from(chunk: &NarrationChunk) -> Self {
        Self {
            index: chunk.sequence_index,
            text: chunk.text_fragment.clone(),
            audio: base64::engine::general_purpose::STANDARD.encode(&chunk.audio_bytes),
        }
    }
}

/// A text block queued by the LLM producer for the TTS producer, tagged
/// with its position in LLM output order so chunks can be reassembled
/// even though the two stages run concurrently.
#[derive(Debug, Clone)]
pub(crate) struct TtsJob {
    pub sequence_index: usize,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_progress_encodes_audio_as_base64() {
        let chunk = NarrationChunk {
            text_fragment: "hello".into(),
            audio_bytes: vec![0xDE, 0xAD, 0xBE, 0xEF],
            mime_type: "audio/mpeg".into(),
            sequence_index: 3,
        };
        let progress = ChunkProgress::from(&chunk);
        assert_eq!(progress.index, 3);
        assert_eq!(progress.text, "hello");
        assert_eq!(progress.audio, "3q2+7w==");
    }
}
