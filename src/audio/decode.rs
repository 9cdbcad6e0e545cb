//! MP3 → interleaved f32 PCM decoding via `symphonia`.

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{NarratorError, Result};

/// A fully decoded chunk of PCM audio, ready for playback.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples, `channels` per frame.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decodes a complete in-memory MP3 blob (as produced by the TTS client)
/// into interleaved f32 PCM.
///
/// # Errors
///
/// Returns [`NarratorError::DecodeError`] if the bytes cannot be probed as
/// MP3, carry no default audio track, or fail to decode.
pub fn decode_mp3(bytes: &[u8]) -> Result<DecodedAudio> {
    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| NarratorError::DecodeError(format!("failed to probe mp3 stream: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| NarratorError::DecodeError("mp3 stream has no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| NarratorError::DecodeError("mp3 stream has unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| NarratorError::DecodeError(format!("failed to create mp3 decoder: {e}")))?;

    let mut samples = Vec::new();
    let mut channels = 0u16;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(NarratorError::DecodeError(format!("mp3 read error: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(NarratorError::DecodeError(format!("mp3 decode error: {e}"))),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count() as u16;
        let required = decoded.frames() * spec.channels.count();

        let needs_new = match sample_buf.as_ref() {
            Some(b) => b.capacity() < required,
            None => true,
        };
        if needs_new {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.frames() as u64, spec));
        } else if let Some(b) = sample_buf.as_mut() {
            b.clear();
        }

        if let Some(b) = sample_buf.as_mut() {
            b.copy_interleaved_ref(decoded);
            samples.extend_from_slice(b.samples());
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_audio_bytes() {
        let err = decode_mp3(b"not an mp3 file at all");
        assert!(matches!(err, Err(NarratorError::DecodeError(_))));
    }

    #[test]
    fn rejects_empty_input() {
        let err = decode_mp3(&[]);
        assert!(matches!(err, Err(NarratorError::DecodeError(_))));
    }
}
