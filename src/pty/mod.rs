//! PTY orchestrator: runs a child command inside a pseudo-terminal, mirrors
//! I/O with the real terminal at full native latency, and drives narration
//! from the same byte stream in the background.
//!
//! The PTY-to-stdout copy always happens before anything is handed to the
//! sanitizer, so the interactive session never waits on narration.

mod raw_mode;

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use tokio::sync::{Semaphore, mpsc};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioPlayer, decode_mp3};
use crate::characters::Character;
use crate::error::{NarratorError, Result};
use crate::sanitizer::Sanitizer;
use crate::service::NarratorService;
use crate::text_buffer::TextBuffer;

/// Upper bound on narration tasks in flight at once; buffer-flush bursts
/// past this many are simply delayed, never dropped.
const MAX_CONCURRENT_NARRATIONS: usize = 2;
/// How often the main loop checks `buffer.should_flush`.
const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Bound on how long teardown waits for in-flight narration to finish.
const SHUTDOWN_NARRATION_WAIT: Duration = Duration::from_secs(10);

/// Bytes captured from the PTY master, pre-sanitized text, carried with the
/// raw bytes so they can still be mirrored verbatim to stdout by the reader
/// thread before this message is even constructed.
enum MasterEvent {
    Data(String),
    Closed,
}

/// Runs `command` under a PTY, mirrors it to the real terminal, and narrates
/// in the background using `service`.
///
/// # Errors
///
/// Returns [`NarratorError::TerminalIoError`] for PTY allocation or raw-mode
/// failures. Narration failures never propagate here; they are logged.
pub async fn run(
    command: &str,
    args: &[String],
    service: Arc<NarratorService>,
    character: Character,
    min_window: Duration,
    pause_threshold: Duration,
    narration_timeout: Duration,
) -> Result<i32> {
    let (cols, rows) = raw_mode::terminal_size();
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| NarratorError::TerminalIoError(format!("failed to open pty: {e}")))?;

    let mut cmd = CommandBuilder::new(command);
    cmd.args(args);

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| NarratorError::TerminalIoError(format!("failed to spawn {command}: {e}")))?;
    drop(pair.slave);

    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| NarratorError::TerminalIoError(format!("failed to clone pty reader: {e}")))?;
    let mut pty_writer = pair
        .master
        .take_writer()
        .map_err(|e| NarratorError::TerminalIoError(format!("failed to take pty writer: {e}")))?;
    let master = Arc::new(std::sync::Mutex::new(pair.master));

    let orig_termios = raw_mode::enable_raw_mode()
        .map_err(|e| NarratorError::TerminalIoError(format!("failed to enable raw mode: {e}")))?;
    info!("pty session started: {command}");

    let (master_tx, mut master_rx) = mpsc::unbounded_channel::<MasterEvent>();
    let reader_handle = std::thread::spawn(move || {
        let mut sanitizer = Sanitizer::new();
        let mut buf = [0u8; 16_384];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    let _ = master_tx.send(MasterEvent::Closed);
                    break;
                }
                Ok(n) => {
                    let mut stdout = std::io::stdout();
                    if stdout.write_all(&buf[..n]).is_err() || stdout.flush().is_err() {
                        let _ = master_tx.send(MasterEvent::Closed);
                        break;
                    }
                    let text = sanitizer.clean(&buf[..n]);
                    if master_tx.send(MasterEvent::Data(text)).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    let _ = master_tx.send(MasterEvent::Closed);
                    break;
                }
            }
        }
    });

    let stdin_cancel = CancellationToken::new();
    let stdin_cancel_reader = stdin_cancel.clone();
    let stdin_handle = std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 4096];
        loop {
            if stdin_cancel_reader.is_cancelled() {
                break;
            }
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if pty_writer.write_all(&buf[..n]).is_err() || pty_writer.flush().is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });

    let sigwinch_master = Arc::clone(&master);
    #[cfg(unix)]
    let sigwinch_task = tokio::spawn(async move {
        let Ok(mut stream) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::window_change())
        else {
            return;
        };
        while stream.recv().await.is_some() {
            let (cols, rows) = raw_mode::terminal_size();
            if let Ok(master) = sigwinch_master.lock() {
                let _ = master.resize(PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                });
            }
        }
    });

    let mut sigint =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();

    let player = AudioPlayer::start().ok().map(Arc::new);
    let mut buffer = TextBuffer::new(min_window, pause_threshold);
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_NARRATIONS));
    let mut ticker = interval(FLUSH_POLL_INTERVAL);
    let mut pty_closed = false;

    'main: loop {
        tokio::select! {
            biased;

            _ = async { sigint.as_mut().unwrap().recv().await }, if sigint.is_some() => {
                info!("sigint received; tearing down pty session");
                break 'main;
            }
            _ = async { sigterm.as_mut().unwrap().recv().await }, if sigterm.is_some() => {
                info!("sigterm received; tearing down pty session");
                break 'main;
            }
            event = master_rx.recv(), if !pty_closed => {
                match event {
                    Some(MasterEvent::Data(text)) => {
                        buffer.add(&text, Instant::now());
                    }
                    Some(MasterEvent::Closed) | None => {
                        pty_closed = true;
                    }
                }
            }
            _ = ticker.tick() => {}
        }

        if buffer.should_flush(Instant::now()) {
            let text = buffer.flush();
            spawn_narration(
                text,
                Arc::clone(&service),
                character.clone(),
                player.clone(),
                Arc::clone(&semaphore),
                narration_timeout,
            );
        }

        if pty_closed {
            break;
        }
    }

    stdin_cancel.cancel();
    #[cfg(unix)]
    sigwinch_task.abort();

    let remaining = buffer.flush_all();
    if !remaining.is_empty() {
        spawn_narration(
            remaining,
            Arc::clone(&service),
            character.clone(),
            player.clone(),
            Arc::clone(&semaphore),
            narration_timeout,
        );
    }

    let drain_deadline = Instant::now() + SHUTDOWN_NARRATION_WAIT;
    while semaphore.available_permits() < MAX_CONCURRENT_NARRATIONS && Instant::now() < drain_deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    if let Some(player) = &player {
        player.wait_for_completion(Some(SHUTDOWN_NARRATION_WAIT));
    }

    let exit_code = match child.wait() {
        Ok(status) => status.exit_code() as i32,
        Err(e) => {
            warn!("failed to read child exit status: {e}");
            1
        }
    };

    raw_mode::restore_terminal(orig_termios);
    let _ = reader_handle.join();
    let _ = stdin_handle.join();
    info!("pty session ended: {command} (exit {exit_code})");

    Ok(exit_code)
}

/// Schedules a narration call for `text` on a background task, bounded by
/// `semaphore`. Never blocks the caller; failures are logged and skipped.
fn spawn_narration(
    text: String,
    service: Arc<NarratorService>,
    character: Character,
    player: Option<Arc<AudioPlayer>>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let _ = character;
    let prompt = trimmed.to_string();

    tokio::spawn(async move {
        let Ok(_permit) = semaphore.acquire_owned().await else {
            return;
        };

        let result = tokio::time::timeout(timeout, service.narrate_text(&prompt, |_progress| {})).await;

        match result {
            Ok(Ok(response)) => {
                if response.audio.is_empty() {
                    debug!("narration produced no audio for this flush");
                    return;
                }
                let Ok(bytes) = base64_decode(&response.audio) else {
                    warn!("narration returned undecodable base64 audio");
                    return;
                };
                match decode_mp3(&bytes) {
                    Ok(decoded) => {
                        if let Some(player) = &player {
                            player.enqueue(decoded);
                        }
                    }
                    Err(e) => warn!("failed to decode narration audio: {e}"),
                }
            }
            Ok(Err(e)) if e.is_recoverable() => {
                warn!("narration failed (recoverable): {e}");
            }
            Ok(Err(e)) => {
                error!("narration failed: {e}");
            }
            Err(_) => {
                warn!("narration task abandoned after {timeout:?} timeout");
            }
        }
    });
}

fn base64_decode(s: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.decode(s)
}
