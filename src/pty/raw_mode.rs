//! Raw-mode terminal control and window-size queries via direct `libc`
//! calls, mirroring how a real interactive shell puts stdin into
//! passthrough mode for the lifetime of a child session.

use tracing::warn;

/// Snapshot of the controlling terminal's `termios` state, captured before
/// entering raw mode so it can be restored byte-for-byte on teardown.
pub struct SavedTermios(libc::termios);

/// Puts stdin into raw mode (no echo, no line buffering, no signal
/// generation from control characters) and returns the prior state.
///
/// # Errors
///
/// Returns an error message if `tcgetattr`/`tcsetattr` fail, which only
/// happens when stdin is not a real terminal.
pub fn enable_raw_mode() -> Result<SavedTermios, String> {
    unsafe {
        let mut orig: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(libc::STDIN_FILENO, &mut orig) != 0 {
            return Err(std::io::Error::last_os_error().to_string());
        }

        let mut raw = orig;
        libc::cfmakeraw(&mut raw);
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = 0;

        if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &raw) != 0 {
            return Err(std::io::Error::last_os_error().to_string());
        }

        Ok(SavedTermios(orig))
    }
}

/// Restores the terminal to the state captured by [`enable_raw_mode`].
/// Failures are logged rather than propagated since this only runs during
/// teardown.
pub fn restore_terminal(saved: SavedTermios) {
    unsafe {
        if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &saved.0) != 0 {
            warn!(
                "failed to restore terminal state: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

/// Current controlling terminal size as `(cols, rows)`, falling back to
/// `(80, 24)` when stdout is not a tty (e.g. piped output in tests).
#[must_use]
pub fn terminal_size() -> (u16, u16) {
    unsafe {
        let mut ws: libc::winsize = std::mem::zeroed();
        if libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) == 0
            && ws.ws_col > 0
            && ws.ws_row > 0
        {
            (ws.ws_col, ws.ws_row)
        } else {
            (80, 24)
        }
    }
}
