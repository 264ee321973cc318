//! Forward SIGINT and SIGTERM received by this process to a child's
//! entire process group.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DemoError, DemoResult};

/// Send `signum` to every process in group `pgid`.
///
/// A group that no longer exists is not an error.
pub fn forward_to_group(pgid: i32, signum: i32) -> DemoResult<()> {
    // killpg(0) targets our own group and 1 is init; neither is a child group.
    if pgid <= 1 {
        return Err(DemoError::Signal(format!("refusing to signal process group {pgid}")));
    }

    let rc = unsafe { libc::killpg(pgid, signum) };
    if rc == 0 {
        debug!(pgid, signum, "signal forwarded");
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        debug!(pgid, "process group already gone");
        return Ok(());
    }
    Err(DemoError::Signal(format!("killpg({pgid}, {signum}) failed: {err}")))
}

/// Background task relaying SIGINT/SIGTERM to a process group until dropped.
///
/// tokio never uninstalls a signal handler once registered. After the
/// forwarder is dropped this process keeps catching SIGINT and SIGTERM and
/// nothing acts on them, so callers that need the default disposition back
/// must exit or restore it themselves.
pub struct SignalForwarder {
    task: JoinHandle<()>,
    forwarded: Arc<AtomicUsize>,
}

impl SignalForwarder {
    /// Register the handlers and start relaying to `pgid`. Signals arriving
    /// after `child_exited` is set are swallowed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install(pgid: i32, child_exited: Arc<AtomicBool>) -> DemoResult<Self> {
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| DemoError::Signal(format!("failed to install SIGINT handler: {e}")))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| DemoError::Signal(format!("failed to install SIGTERM handler: {e}")))?;

        let forwarded = Arc::new(AtomicUsize::new(0));
        let counter = forwarded.clone();

        let task = tokio::spawn(async move {
            loop {
                let signum = tokio::select! {
                    Some(()) = sigint.recv() => libc::SIGINT,
                    Some(()) = sigterm.recv() => libc::SIGTERM,
                    else => break,
                };

                if child_exited.load(Ordering::SeqCst) {
                    debug!(signum, "child already exited, not forwarding");
                    continue;
                }

                match forward_to_group(pgid, signum) {
                    Ok(()) => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        info!(pgid, signum, "forwarded signal to shell process group");
                    }
                    Err(e) => warn!(error = %e, "signal forwarding failed"),
                }
            }
        });

        info!(pgid, "forwarding SIGINT/SIGTERM to process group");
        Ok(Self { task, forwarded })
    }

    /// Number of signals relayed so far.
    pub fn forwarded(&self) -> usize {
        self.forwarded.load(Ordering::SeqCst)
    }
}

impl Drop for SignalForwarder {
    fn drop(&mut self) {
        self.task.abort();
    }
}
