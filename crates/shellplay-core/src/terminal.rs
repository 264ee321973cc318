//! Terminal utilities: attribute snapshot/restore, raw mode, terminal size.
//!
//! [`TerminalStateGuard`] records the termios settings of a terminal
//! descriptor and writes them back when restored or dropped, so the caller's
//! terminal looks the same afterwards however the shell session ended.

use std::os::unix::io::{AsRawFd, RawFd};

use crossterm::terminal;
use crossterm::tty::IsTty;
use tracing::{debug, warn};

use crate::error::{DemoError, DemoResult};

/// RAII guard that restores saved terminal attributes on drop.
///
/// Capturing a descriptor that is not a terminal yields an inert guard.
pub struct TerminalStateGuard {
    fd: RawFd,
    saved: Option<libc::termios>,
}

impl TerminalStateGuard {
    /// Snapshot the attributes of `fd`.
    pub fn capture(fd: RawFd) -> DemoResult<Self> {
        if unsafe { libc::isatty(fd) } != 1 {
            debug!(fd, "not a terminal, nothing to save");
            return Ok(Self { fd, saved: None });
        }
        let saved = get_attrs(fd)?;
        debug!(fd, "saved terminal attributes");
        Ok(Self {
            fd,
            saved: Some(saved),
        })
    }

    /// Snapshot standard input, the usual controlling terminal.
    pub fn capture_stdin() -> DemoResult<Self> {
        let stdin = std::io::stdin();
        if !stdin.is_tty() {
            return Ok(Self {
                fd: stdin.as_raw_fd(),
                saved: None,
            });
        }
        Self::capture(stdin.as_raw_fd())
    }

    /// Whether attributes were saved (i.e. the descriptor is a terminal).
    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    /// Write the saved attributes back now. Later calls and the drop are
    /// no-ops.
    pub fn restore(&mut self) -> DemoResult<()> {
        match self.saved.take() {
            Some(attrs) => {
                set_attrs(self.fd, &attrs)?;
                debug!(fd = self.fd, "restored terminal attributes");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for TerminalStateGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "failed to restore terminal attributes");
        }
    }
}

fn get_attrs(fd: RawFd) -> DemoResult<libc::termios> {
    let mut attrs = std::mem::MaybeUninit::<libc::termios>::uninit();
    if unsafe { libc::tcgetattr(fd, attrs.as_mut_ptr()) } != 0 {
        let err = std::io::Error::last_os_error();
        return Err(DemoError::Terminal(format!("tcgetattr({fd}) failed: {err}")));
    }
    Ok(unsafe { attrs.assume_init() })
}

fn set_attrs(fd: RawFd, attrs: &libc::termios) -> DemoResult<()> {
    if unsafe { libc::tcsetattr(fd, libc::TCSADRAIN, attrs) } != 0 {
        let err = std::io::Error::last_os_error();
        return Err(DemoError::Terminal(format!("tcsetattr({fd}) failed: {err}")));
    }
    Ok(())
}

/// Enter raw terminal mode on the controlling terminal.
///
/// Pair with a [`TerminalStateGuard`] captured beforehand to get back out.
pub fn enter_raw_mode() -> DemoResult<()> {
    terminal::enable_raw_mode()
        .map_err(|e| DemoError::Terminal(format!("failed to enable raw mode: {e}")))
}

/// Get the current terminal size as (columns, rows).
///
/// Falls back to (80, 24) if the size cannot be determined.
pub fn terminal_size() -> (u16, u16) {
    match terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => (cols, rows),
        _ => (80, 24),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portable_pty::{native_pty_system, PtySize};

    fn lflag(fd: RawFd) -> libc::tcflag_t {
        get_attrs(fd).unwrap().c_lflag
    }

    #[test]
    fn terminal_size_returns_nonzero() {
        let (cols, rows) = terminal_size();
        // In a CI environment or pipe, we may get the fallback values.
        assert!(cols > 0);
        assert!(rows > 0);
    }

    #[test]
    fn non_terminal_guard_is_inert() {
        let file = tempfile::tempfile().unwrap();
        let mut guard = TerminalStateGuard::capture(file.as_raw_fd()).unwrap();
        assert!(!guard.is_active());
        guard.restore().unwrap();
    }

    #[test]
    fn drop_restores_attributes_after_change() {
        let pair = native_pty_system()
            .openpty(PtySize::default())
            .unwrap();
        let fd = pair.master.as_raw_fd().unwrap();
        let before = get_attrs(fd).unwrap();

        {
            let guard = TerminalStateGuard::capture(fd).unwrap();
            assert!(guard.is_active());

            let mut changed = before;
            changed.c_lflag ^= libc::ECHO | libc::ICANON;
            set_attrs(fd, &changed).unwrap();
            assert_ne!(lflag(fd), before.c_lflag);
        }

        let after = get_attrs(fd).unwrap();
        assert_eq!(after.c_lflag, before.c_lflag);
        assert_eq!(after.c_iflag, before.c_iflag);
        assert_eq!(after.c_oflag, before.c_oflag);
        assert_eq!(after.c_cflag, before.c_cflag);
        assert_eq!(after.c_cc, before.c_cc);
    }

    #[test]
    fn restore_is_idempotent() {
        let pair = native_pty_system()
            .openpty(PtySize::default())
            .unwrap();
        let fd = pair.master.as_raw_fd().unwrap();

        let mut guard = TerminalStateGuard::capture(fd).unwrap();
        guard.restore().unwrap();
        assert!(!guard.is_active());
        guard.restore().unwrap();
    }
}
