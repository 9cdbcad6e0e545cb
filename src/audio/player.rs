//! Persistent, queue-fed audio playback via cpal.
//!
//! A single background thread owns one long-lived output stream per
//! negotiated format; narration chunks are pushed onto a ring buffer the
//! stream's callback drains, and the stream is only torn down and rebuilt
//! when a chunk's sample rate or channel count changes. A short linear
//! fade is applied at each chunk's edges to mask the seam between
//! independently-synthesized TTS blobs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, warn};

use crate::audio::decode::DecodedAudio;
use crate::error::{NarratorError, Result};

const FRAMES_PER_BUFFER: u32 = 4096;
const FADE_MS: u64 = 5;

enum PlayerMessage {
    Chunk(DecodedAudio),
    Stop,
}

struct RingBuffer {
    samples: VecDeque<f32>,
}

/// Persistent queue-fed speaker output for narrated audio chunks.
pub struct AudioPlayer {
    tx: std_mpsc::Sender<PlayerMessage>,
    worker: Option<JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
}

impl AudioPlayer {
    /// Spawns the playback worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`NarratorError::ConfigError`] if no default output device
    /// exists, or if the worker thread cannot be spawned. Failures to play
    /// an individual chunk thereafter are logged and skipped rather than
    /// surfaced here.
    pub fn start() -> Result<Self> {
        let host = cpal::default_host();
        host.default_output_device()
            .ok_or_else(|| NarratorError::ConfigError("no default audio output device".into()))?;

        let (tx, rx) = std_mpsc::channel::<PlayerMessage>();
        let pending = Arc::new(AtomicUsize::new(0));
        let pending_worker = Arc::clone(&pending);

        let worker = std::thread::Builder::new()
            .name("narrator-audio-playback".into())
            .spawn(move || playback_worker(rx, pending_worker))
            .map_err(|e| NarratorError::ConfigError(format!("failed to spawn playback thread: {e}")))?;

        Ok(Self {
            tx,
            worker: Some(worker),
            pending,
        })
    }

    /// Enqueues a decoded chunk for playback. Returns immediately; empty
    /// chunks are silently dropped.
    pub fn enqueue(&self, audio: DecodedAudio) {
        if audio.samples.is_empty() {
            return;
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(PlayerMessage::Chunk(audio)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Number of chunks still queued or playing.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Blocks until the queue drains, or `timeout` elapses.
    pub fn wait_for_completion(&self, timeout: Option<Duration>) {
        let start = std::time::Instant::now();
        while self.queue_size() > 0 {
            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    warn!("audio playback wait_for_completion timed out after {limit:?}");
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        let _ = self.tx.send(PlayerMessage::Stop);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Ramps the first and last `FADE_MS` of `samples` linearly to/from zero.
fn apply_fade(samples: &mut [f32], channels: u16, sample_rate: u32) {
    let channels = channels.max(1) as usize;
    let fade_frames = ((u64::from(sample_rate) * FADE_MS) / 1000) as usize;
    let frames = samples.len() / channels;
    if fade_frames == 0 || frames <= fade_frames * 2 {
        return;
    }

    for frame in 0..fade_frames {
        let gain = frame as f32 / fade_frames as f32;
        for ch in 0..channels {
            samples[frame * channels + ch] *= gain;
        }
    }
    for frame in 0..fade_frames {
        let gain = frame as f32 / fade_frames as f32;
        let idx = frames - 1 - frame;
        for ch in 0..channels {
            samples[idx * channels + ch] *= gain;
        }
    }
}

fn playback_worker(rx: std_mpsc::Receiver<PlayerMessage>, pending: Arc<AtomicUsize>) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(d) => d,
        None => {
            error!("no default audio output device; playback worker exiting");
            return;
        }
    };

    let mut open: Option<(u32, u16, cpal::Stream, Arc<Mutex<RingBuffer>>)> = None;

    while let Ok(message) = rx.recv() {
        let mut audio = match message {
            PlayerMessage::Stop => break,
            PlayerMessage::Chunk(audio) => audio,
        };

        apply_fade(&mut audio.samples, audio.channels, audio.sample_rate);

        let needs_rebuild = match &open {
            Some((rate, channels, ..)) => *rate != audio.sample_rate || *channels != audio.channels,
            None => true,
        };

        if needs_rebuild {
            drop(open.take());
            match build_stream(&device, audio.sample_rate, audio.channels) {
                Ok(built) => open = Some(built),
                Err(e) => {
                    error!("failed to open audio output stream: {e}");
                    pending.fetch_sub(1, Ordering::SeqCst);
                    continue;
                }
            }
        }

        if let Some((_, _, _, ring)) = &open {
            let mut guard = ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.samples.extend(audio.samples.iter().copied());
            drop(guard);

            loop {
                let remaining = ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).samples.len();
                if remaining == 0 {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }

        pending.fetch_sub(1, Ordering::SeqCst);
    }

    debug!("audio playback worker stopped");
}

fn build_stream(
    device: &cpal::Device,
    sample_rate: u32,
    channels: u16,
) -> Result<(u32, u16, cpal::Stream, Arc<Mutex<RingBuffer>>)> {
    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(FRAMES_PER_BUFFER),
    };

    let ring = Arc::new(Mutex::new(RingBuffer {
        samples: VecDeque::new(),
    }));
    let ring_cb = Arc::clone(&ring);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut guard = match ring_cb.lock() {
                    Ok(g) => g,
                    Err(poisoned) => poisoned.into_inner(),
                };
                for sample in data.iter_mut() {
                    *sample = guard.samples.pop_front().unwrap_or(0.0);
                }
            },
            move |err| error!("audio output stream error: {err}"),
            None,
        )
        .map_err(|e| NarratorError::ConfigError(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| NarratorError::ConfigError(format!("failed to start output stream: {e}")))?;

    Ok((sample_rate, channels, stream, ring))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_leaves_short_clips_untouched() {
        let mut samples = vec![1.0f32; 10];
        apply_fade(&mut samples, 1, 48_000);
        assert_eq!(samples, vec![1.0f32; 10]);
    }

    #[test]
    fn fade_ramps_edges_of_long_clip() {
        let sample_rate = 48_000u32;
        let fade_frames = (u64::from(sample_rate) * FADE_MS / 1000) as usize;
        let mut samples = vec![1.0f32; fade_frames * 4];
        apply_fade(&mut samples, 1, sample_rate);
        assert_eq!(samples[0], 0.0);
        assert!(samples[fade_frames / 2] > 0.0 && samples[fade_frames / 2] < 1.0);
        assert_eq!(*samples.last().unwrap(), 0.0);
        assert_eq!(samples[fade_frames * 2], 1.0);
    }

    #[test]
    fn fade_respects_channel_count() {
        let mut samples = vec![1.0f32; 8 * 2];
        apply_fade(&mut samples, 2, 8_000);
        // with channels=2 and a 5ms fade at 8kHz, fade_frames rounds to 0
        assert_eq!(samples, vec![1.0f32; 8 * 2]);
    }
}
