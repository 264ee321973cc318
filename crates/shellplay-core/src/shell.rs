//! The shell-integration demo: a scripted interactive shell on a PTY with
//! signal forwarding and terminal-state restoration.

use std::io::Write;

use portable_pty::ExitStatus;
use tracing::{info, warn};

use crate::config::ShellConfig;
use crate::error::{DemoError, DemoResult};
use crate::pty::{PumpOutcome, ShellSession};
use crate::signals::SignalForwarder;
use crate::terminal::{self, TerminalStateGuard};

/// What happened during a shell demo run.
#[derive(Debug, Clone)]
pub struct ShellReport {
    pub pid: Option<u32>,
    pub outcome: PumpOutcome,
    /// Final status; the child is always reaped before the report exists.
    pub exit_status: ExitStatus,
    pub signals_forwarded: usize,
}

/// Run the configured command script in an interactive shell and copy its
/// output to `out` until the shell exits.
///
/// Teardown always runs, in order: terminal attributes are restored, the
/// shell is terminated if still alive and reaped, signal forwarding stops.
pub async fn run_shell_demo<W: Write>(config: &ShellConfig, out: &mut W) -> DemoResult<ShellReport> {
    let (cols, rows) = terminal::terminal_size();
    let mut session = ShellSession::spawn(config, cols, rows)?;
    let pid = session.pid();
    let pgid = session
        .process_group()
        .ok_or_else(|| DemoError::Pty("shell has no process id".into()))?;

    let forwarder = SignalForwarder::install(pgid, session.exit_flag())?;
    let mut term_guard = TerminalStateGuard::capture_stdin()?;

    let result = drive(&mut session, config, out, term_guard.is_active()).await;

    let restored = term_guard.restore();
    let shutdown = session.shutdown(config.terminate_grace()).await;
    let signals_forwarded = forwarder.forwarded();
    drop(forwarder);

    if let Err(e) = &result {
        warn!(error = %e, "shell session failed");
    }
    let outcome = result?;
    restored?;
    let exit_status = shutdown?;

    info!(
        reason = ?outcome.reason,
        bytes = outcome.bytes_read,
        code = exit_status.exit_code(),
        "shell demo finished"
    );
    Ok(ShellReport {
        pid,
        outcome,
        exit_status,
        signals_forwarded,
    })
}

async fn drive<W: Write>(
    session: &mut ShellSession,
    config: &ShellConfig,
    out: &mut W,
    on_terminal: bool,
) -> DemoResult<PumpOutcome> {
    if config.raw_mode && on_terminal {
        terminal::enter_raw_mode()?;
    }

    session.send_script(&config.commands)?;

    writeln!(out, "\nShell output:")?;
    writeln!(out, "{}", "-".repeat(40))?;
    session.pump_output(out, config.poll_interval()).await
}
