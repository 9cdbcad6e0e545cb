//! Time-and-boundary-aware text buffer.
//!
//! Decides *when* a span of captured terminal output is ready to be
//! narrated: prefers to cut at a newline once `min_window` has elapsed,
//! but will force-flush everything once `pause_threshold` elapses with no
//! newline in sight, so output never stalls behind one long unterminated
//! line.

use regex::Regex;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

static TRAILING_OSC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\x1b\][^\x07\x1b]*)$").expect("valid regex"));
static TRAILING_CSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\x1b\[[0-9;:?<>]*[\x20-\x2f]*)$").expect("valid regex"));
static TRAILING_ESC_INTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\x1b[\x20-\x2f]*)$").expect("valid regex"));

/// Splits `text` into `(safe_text, tail)` such that `tail` holds any
/// trailing incomplete ANSI escape sequence, so `safe_text` is always safe
/// to hand to a one-shot sanitizer pass.
fn split_incomplete_escape_tail(text: &str) -> (&str, &str) {
    if text.is_empty() {
        return (text, "");
    }
    for pattern in [&*TRAILING_OSC, &*TRAILING_CSI, &*TRAILING_ESC_INTER] {
        if let Some(m) = pattern.find(text) {
            return (&text[..m.start()], &text[m.start()..]);
        }
    }
    (text, "")
}

/// Time-windowed, boundary-preserving accumulator.
#[derive(Debug)]
pub struct TextBuffer {
    buffer: String,
    window_start: Option<Instant>,
    last_data_time: Option<Instant>,
    min_window: Duration,
    pause_threshold: Duration,
    force_flush_all: bool,
}

impl TextBuffer {
    /// Creates a buffer with the given min-window and pause-threshold
    /// durations (spec defaults: 3.5s / 5.0s).
    #[must_use]
    pub fn new(min_window: Duration, pause_threshold: Duration) -> Self {
        Self {
            buffer: String::new(),
            window_start: None,
            last_data_time: None,
            min_window,
            pause_threshold,
            force_flush_all: false,
        }
    }

    /// Appends `text`, recording `window_start` on the first append of a
    /// span and always advancing `last_data_time`.
    pub fn add(&mut self, text: &str, now: Instant) {
        if !text.is_empty() {
            self.buffer.push_str(text);
        }
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
        self.last_data_time = Some(now);
    }

    /// `true` if the buffer currently contains at least one newline.
    fn has_complete_lines(&self) -> bool {
        self.buffer.contains('\n')
    }

    /// Decides whether [`flush`](Self::flush) should be called.
    pub fn should_flush(&mut self, now: Instant) -> bool {
        if self.buffer.is_empty() {
            return false;
        }

        let has_complete = self.has_complete_lines();

        if let Some(start) = self.window_start {
            if now.saturating_duration_since(start) >= self.min_window {
                if has_complete {
                    self.force_flush_all = false;
                    return true;
                }
                self.force_flush_all = true;
                return true;
            }
        }

        if let Some(last) = self.last_data_time {
            if now.saturating_duration_since(last) >= self.pause_threshold {
                self.force_flush_all = !has_complete;
                return true;
            }
        }

        false
    }

    /// Returns the longest prefix ending at the last newline (unless
    /// force-flush is active, in which case everything is returned), with
    /// any trailing incomplete escape held back in the buffer.
    pub fn flush(&mut self) -> String {
        if self.buffer.is_empty() {
            return String::new();
        }

        let last_newline = self.buffer.rfind('\n');

        let result = if last_newline.is_none() || self.force_flush_all {
            let result = std::mem::take(&mut self.buffer);
            self.window_start = None;
            self.last_data_time = None;
            self.force_flush_all = false;
            result
        } else {
            let split_at = last_newline.expect("checked above") + 1;
            let result = self.buffer[..split_at].to_string();
            let remaining = self.buffer[split_at..].to_string();
            self.buffer = remaining;
            self.window_start = if self.buffer.is_empty() {
                self.last_data_time = None;
                None
            } else {
                Some(Instant::now())
            };
            result
        };

        let (safe_text, tail) = split_incomplete_escape_tail(&result);
        if !tail.is_empty() {
            let tail = tail.to_string();
            let safe_len = safe_text.len();
            self.buffer = format!("{tail}{}", self.buffer);
            if self.window_start.is_none() {
                self.window_start = Some(Instant::now());
            }
            self.last_data_time = Some(Instant::now());
            if safe_len == 0 {
                return String::new();
            }
            return result[..safe_len].to_string();
        }

        result
    }

    /// Unconditionally returns and clears all buffered content.
    pub fn flush_all(&mut self) -> String {
        if self.buffer.is_empty() {
            return String::new();
        }
        self.window_start = None;
        self.last_data_time = None;
        self.force_flush_all = false;
        std::mem::take(&mut self.buffer)
    }

    /// `true` if the buffer currently holds any content.
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn buffer() -> TextBuffer {
        TextBuffer::new(Duration::from_millis(100), Duration::from_millis(200))
    }

    #[test]
    fn does_not_flush_empty_buffer() {
        let mut buf = buffer();
        assert!(!buf.should_flush(Instant::now()));
    }

    #[test]
    fn flushes_on_min_window_with_newline() {
        let mut buf = buffer();
        let t0 = Instant::now();
        buf.add("hello\n", t0);
        let later = t0 + Duration::from_millis(150);
        assert!(buf.should_flush(later));
        assert_eq!(buf.flush(), "hello\n");
    }

    #[test]
    fn force_flushes_on_pause_without_newline() {
        let mut buf = buffer();
        let t0 = Instant::now();
        buf.add("no newline here", t0);
        let later = t0 + Duration::from_millis(250);
        assert!(buf.should_flush(later));
        assert_eq!(buf.flush(), "no newline here");
    }

    #[test]
    fn liveness_eventually_flushes_idle_content() {
        let mut buf = buffer();
        let t0 = Instant::now();
        buf.add("x", t0);
        let later = t0 + Duration::from_millis(500);
        assert!(buf.should_flush(later));
    }

    #[test]
    fn flush_preserves_incomplete_trailing_line() {
        let mut buf = buffer();
        let t0 = Instant::now();
        buf.add("line one\npartial", t0);
        let later = t0 + Duration::from_millis(150);
        assert!(buf.should_flush(later));
        assert_eq!(buf.flush(), "line one\n");
        assert!(buf.has_data());
    }

    #[test]
    fn flush_holds_back_incomplete_csi_tail() {
        let mut buf = buffer();
        let t0 = Instant::now();
        buf.add("visible text\x1b[32", t0);
        let later = t0 + Duration::from_millis(250);
        assert!(buf.should_flush(later));
        let out = buf.flush();
        assert_eq!(out, "visible text");
        assert!(buf.has_data());
    }

    #[test]
    fn flush_all_clears_buffer_unconditionally() {
        let mut buf = buffer();
        buf.add("anything", Instant::now());
        assert_eq!(buf.flush_all(), "anything");
        assert!(!buf.has_data());
    }

    #[test]
    fn empty_flush_after_drain_returns_empty() {
        let mut buf = buffer();
        buf.add("x\n", Instant::now());
        buf.flush();
        assert_eq!(buf.flush(), "");
    }
}
