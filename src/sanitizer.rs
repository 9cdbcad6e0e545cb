//! Stateful ANSI/control-sequence sanitizer.
//!
//! Strips terminal escape sequences from a byte stream while remaining safe
//! across arbitrary chunk boundaries: the state machine is carried between
//! calls to [`Sanitizer::clean`], so a multi-byte escape split across two PTY
//! reads is still recognized and removed in full.

/// Internal state of the escape-sequence parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Plain text.
    Text,
    /// Just saw `ESC`.
    Esc,
    /// Inside a two-byte escape with intermediate bytes (`0x20..=0x2F`).
    EscIntermediate,
    /// Inside a CSI sequence (`ESC [ ... final`).
    Csi,
    /// Inside an OSC sequence (`ESC ] ... BEL|ST`).
    Osc,
    /// Saw `ESC` while inside an OSC sequence (possible `ESC \` string terminator).
    OscEsc,
    /// Inside a DCS/SOS/PM/APC string (`ESC P|X|^|_ ... ST`).
    DcsString,
    /// Saw `ESC` while inside a DCS/SOS/PM/APC string.
    DcsStringEsc,
}

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// Stateful sanitizer. One instance should be fed the entire output of a
/// single PTY session, in order, across as many chunks as arrive.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    state: State,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    /// Creates a sanitizer starting in the plain-text state.
    #[must_use]
    pub fn new() -> Self {
        Self { state: State::Text }
    }

    /// Cleans one chunk of raw terminal bytes, carrying escape-parsing state
    /// forward to the next call.
    ///
    /// `clean(clean(s)) == clean(s)` for any `s` (idempotence), and feeding
    /// any split of a byte stream across multiple calls yields the same
    /// output as feeding it in one call.
    pub fn clean(&mut self, chunk: &[u8]) -> String {
        let mut out = Vec::with_capacity(chunk.len());
        for &byte in chunk {
            self.step(byte, &mut out);
        }
        String::from_utf8_lossy(&out)
            .chars()
            .filter(|c| !is_dropped_code_point(*c))
            .collect()
    }

    fn step(&mut self, byte: u8, out: &mut Vec<u8>) {
        match self.state {
            State::Text => {
                if byte == ESC {
                    self.state = State::Esc;
                } else if is_dropped_control(byte) {
                    // consumed silently
                } else {
                    out.push(byte);
                }
            }
            State::Esc => match byte {
                ESC => {
                    // stray ESC; restart escape parsing from here
                }
                b'[' => self.state = State::Csi,
                b']' => self.state = State::Osc,
                b'P' | b'X' | b'^' | b'_' => self.state = State::DcsString,
                0x20..=0x2F => self.state = State::EscIntermediate,
                0x30..=0x7E => self.state = State::Text,
                _ => self.state = State::Text,
            },
            State::EscIntermediate => match byte {
                ESC => self.state = State::Esc,
                0x20..=0x2F => {}
                0x30..=0x7E => self.state = State::Text,
                _ => self.state = State::Text,
            },
            State::Csi => match byte {
                ESC => self.state = State::Esc,
                0x40..=0x7E => self.state = State::Text,
                _ => {}
            },
            State::Osc => match byte {
                BEL => self.state = State::Text,
                ESC => self.state = State::OscEsc,
                _ => {}
            },
            State::OscEsc => match byte {
                b'\\' => self.state = State::Text,
                ESC => {}
                _ => self.state = State::Osc,
            },
            State::DcsString => match byte {
                ESC => self.state = State::DcsStringEsc,
                _ => {}
            },
            State::DcsStringEsc => match byte {
                b'\\' => self.state = State::Text,
                ESC => {}
                _ => self.state = State::DcsString,
            },
        }
    }

    /// `true` if the sanitizer is mid-escape-sequence (used by the text
    /// buffer to decide whether trailing bytes are safe to emit).
    #[must_use]
    pub fn in_escape(&self) -> bool {
        self.state != State::Text
    }
}

/// `true` for control bytes that are stripped outright rather than passed
/// through: C0 controls except newline/tab, and DEL.
fn is_dropped_control(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0B..=0x1F | 0x7F)
}

/// `true` for the replacement character, zero-width, and bidi override code
/// points: decoded text-layer noise that survives byte-level stripping
/// because it's multi-byte in UTF-8.
fn is_dropped_code_point(c: char) -> bool {
    matches!(c, '\u{FFFD}' | '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{FEFF}')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_once(s: &str) -> String {
        Sanitizer::new().clean(s.as_bytes())
    }

    #[test]
    fn strips_sgr_color_codes() {
        let input = "\x1b[32m✓\x1b[0m Task completed\n";
        assert_eq!(clean_once(input), "✓ Task completed\n");
    }

    #[test]
    fn strips_osc_hyperlink() {
        let input = "\x1b]8;;https://example.com\x07link text\x1b]8;;\x07";
        assert_eq!(clean_once(input), "link text");
    }

    #[test]
    fn strips_osc_with_st_terminator() {
        let input = "\x1b]0;title\x1b\\visible";
        assert_eq!(clean_once(input), "visible");
    }

    #[test]
    fn strips_dec_private_mode_sequences() {
        let input = "\x1b[?25lhidden cursor\x1b[?25h";
        assert_eq!(clean_once(input), "hidden cursor");
    }

    #[test]
    fn preserves_newline_and_tab() {
        let input = "a\nb\tc";
        assert_eq!(clean_once(input), "a\nb\tc");
    }

    #[test]
    fn drops_other_control_characters() {
        let input = "a\x00b\x7Fc";
        assert_eq!(clean_once(input), "abc");
    }

    #[test]
    fn recovers_from_stray_escape() {
        // ESC immediately followed by another ESC restarts parsing; both
        // eventually resolve and 'x' survives.
        let mut sanitizer = Sanitizer::new();
        let out = sanitizer.clean(b"\x1b\x1b[0mx");
        assert_eq!(out, "x");
        assert!(!sanitizer.in_escape());
    }

    #[test]
    fn splitting_input_across_calls_matches_single_call() {
        let input = "before \x1b[32mgreen\x1b[0m after\n";
        let whole = clean_once(input);

        let bytes = input.as_bytes();
        for split in 0..=bytes.len() {
            let mut sanitizer = Sanitizer::new();
            let mut combined = String::new();
            combined.push_str(&sanitizer.clean(&bytes[..split]));
            combined.push_str(&sanitizer.clean(&bytes[split..]));
            assert_eq!(combined, whole, "split at {split} diverged");
        }
    }

    #[test]
    fn idempotent_on_already_clean_text() {
        let input = "already clean text\nwith newlines\t and tabs";
        let once = clean_once(input);
        let twice = clean_once(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn tracks_mid_sequence_state() {
        let mut sanitizer = Sanitizer::new();
        sanitizer.clean(b"\x1b[32");
        assert!(sanitizer.in_escape());
        sanitizer.clean(b"m");
        assert!(!sanitizer.in_escape());
    }

    #[test]
    fn dcs_string_is_stripped() {
        let input = "\x1bPsome dcs payload\x1b\\visible";
        assert_eq!(clean_once(input), "visible");
    }

    #[test]
    fn drops_replacement_character_and_zero_width_and_bidi_code_points() {
        let input = "a\u{FFFD}b\u{200B}c\u{202E}d\u{FEFF}e\u{200F}f";
        assert_eq!(clean_once(input), "abcdef");
    }
}
