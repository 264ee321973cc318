//! Interactive shell on a pseudo-terminal using portable-pty.
//!
//! The child runs in its own session with the PTY slave as its controlling
//! terminal. A dedicated reader thread forwards master output into a tokio
//! channel so the async side can wait on it with a timeout.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use portable_pty::{
    native_pty_system, Child, CommandBuilder, ExitStatus, MasterPty, PtySize,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ShellConfig;
use crate::decode::Utf8Decoder;
use crate::error::{DemoError, DemoResult};

/// What the reader thread observed.
#[derive(Debug)]
enum ReadEvent {
    Data(Vec<u8>),
    Eof,
    Error(std::io::Error),
}

/// Why [`ShellSession::pump_output`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The child process exited.
    ChildExited,
    /// The PTY reported end of file.
    Eof,
    /// Reading the PTY failed.
    ReadError,
}

/// Result of an output pump.
#[derive(Debug, Clone)]
pub struct PumpOutcome {
    pub reason: StopReason,
    /// Raw bytes read from the PTY.
    pub bytes_read: usize,
    /// Exit status, if the child had exited by the time the pump stopped.
    pub exit_status: Option<ExitStatus>,
}

/// A running interactive interpreter attached to a PTY.
pub struct ShellSession {
    /// Kept open for the session's lifetime; the slave side is closed in the
    /// parent right after spawn.
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    output_rx: mpsc::UnboundedReceiver<ReadEvent>,
    reader_thread: Option<JoinHandle<()>>,
    exited: Arc<AtomicBool>,
    exit_status: Option<ExitStatus>,
}

impl ShellSession {
    /// Launch `config.program` on a fresh PTY of the given size.
    pub fn spawn(config: &ShellConfig, cols: u16, rows: u16) -> DemoResult<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| DemoError::Pty(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(&config.program);
        cmd.args(&config.args);
        cmd.env("PS1", &config.prompt);
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        // portable-pty calls setsid() and makes the slave the controlling tty.
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| DemoError::Pty(format!("failed to spawn {}: {e}", config.program)))?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| DemoError::Pty(format!("failed to clone PTY reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| DemoError::Pty(format!("failed to take PTY writer: {e}")))?;

        let (tx, output_rx) = mpsc::unbounded_channel();
        let chunk_size = config.read_chunk_size.max(1);
        let reader_thread = thread::Builder::new()
            .name("pty-reader".into())
            .spawn(move || read_loop(reader, tx, chunk_size))?;

        info!(
            program = %config.program,
            pid = ?child.process_id(),
            cols,
            rows,
            "shell spawned"
        );

        Ok(Self {
            master: pair.master,
            writer,
            child,
            output_rx,
            reader_thread: Some(reader_thread),
            exited: Arc::new(AtomicBool::new(false)),
            exit_status: None,
        })
    }

    /// Child process id, if the platform reports one.
    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Process group of the child. The child leads its own session, so this
    /// is its pid unless the kernel says otherwise.
    pub fn process_group(&self) -> Option<i32> {
        let pid = self.pid()? as libc::pid_t;
        let pgid = unsafe { libc::getpgid(pid) };
        if pgid > 0 {
            Some(pgid)
        } else {
            Some(pid)
        }
    }

    /// Current PTY size as (columns, rows).
    pub fn size(&self) -> DemoResult<(u16, u16)> {
        let size = self
            .master
            .get_size()
            .map_err(|e| DemoError::Pty(format!("failed to read PTY size: {e}")))?;
        Ok((size.cols, size.rows))
    }

    /// Flag set once the child has been observed to exit.
    pub fn exit_flag(&self) -> Arc<AtomicBool> {
        self.exited.clone()
    }

    /// Write one line (a newline is appended) to the shell's input.
    pub fn send_line(&mut self, line: &str) -> DemoResult<()> {
        debug!(line, "sending to shell");
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write every line of a command script, in order.
    pub fn send_script<S: AsRef<str>>(&mut self, lines: &[S]) -> DemoResult<()> {
        for line in lines {
            self.send_line(line.as_ref())?;
        }
        Ok(())
    }

    /// Non-blocking liveness check; records the exit status once seen.
    pub fn is_alive(&mut self) -> DemoResult<bool> {
        if self.exit_status.is_some() {
            return Ok(false);
        }
        match self.child.try_wait()? {
            Some(status) => {
                info!(code = status.exit_code(), "shell exited");
                self.exit_status = Some(status);
                self.exited.store(true, Ordering::SeqCst);
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Exit status, once the child has been reaped.
    pub fn exit_status(&self) -> Option<&ExitStatus> {
        self.exit_status.as_ref()
    }

    /// Copy shell output to `out` until the child exits.
    ///
    /// Each wait for output is bounded by `poll_interval` so liveness is
    /// rechecked regularly. A read error ends the pump quietly. Output that
    /// already arrived when the child exits is still written.
    pub async fn pump_output<W: Write>(
        &mut self,
        out: &mut W,
        poll_interval: Duration,
    ) -> DemoResult<PumpOutcome> {
        let mut decoder = Utf8Decoder::new();
        let mut bytes_read = 0;

        let reason = loop {
            if !self.is_alive()? {
                break StopReason::ChildExited;
            }

            match tokio::time::timeout(poll_interval, self.output_rx.recv()).await {
                Err(_) => continue,
                Ok(Some(ReadEvent::Data(chunk))) => {
                    bytes_read += chunk.len();
                    write_decoded(out, &decoder.push(&chunk))?;
                }
                Ok(Some(ReadEvent::Error(e))) => {
                    debug!(error = %e, "PTY read failed, stopping output loop");
                    break StopReason::ReadError;
                }
                Ok(Some(ReadEvent::Eof)) | Ok(None) => break StopReason::Eof,
            }
        };

        if reason == StopReason::ChildExited {
            while let Ok(event) = self.output_rx.try_recv() {
                match event {
                    ReadEvent::Data(chunk) => {
                        bytes_read += chunk.len();
                        write_decoded(out, &decoder.push(&chunk))?;
                    }
                    ReadEvent::Eof | ReadEvent::Error(_) => break,
                }
            }
        }
        write_decoded(out, &decoder.finish())?;

        // EOF or EIO usually means the child is exiting; give it a moment to
        // become reapable so the status can be reported.
        if reason != StopReason::ChildExited {
            self.wait_for_exit(poll_interval).await?;
        }

        Ok(PumpOutcome {
            reason,
            bytes_read,
            exit_status: self.exit_status.clone(),
        })
    }

    /// Make sure the child is gone: SIGTERM if still running, escalate to a
    /// kill after `grace`, then reap it.
    pub async fn shutdown(&mut self, grace: Duration) -> DemoResult<ExitStatus> {
        if self.is_alive()? {
            if let Some(pid) = self.pid() {
                info!(pid, "terminating shell");
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
            }

            if !self.wait_for_exit(grace).await? {
                warn!("shell ignored SIGTERM, killing");
                if let Err(e) = self.child.kill() {
                    warn!(error = %e, "kill failed");
                }
                while !self.wait_for_exit(grace).await? {
                    if let Some(pid) = self.pid() {
                        warn!(pid, "shell still running, sending SIGKILL");
                        unsafe {
                            libc::kill(pid as libc::pid_t, libc::SIGKILL);
                        }
                    }
                }
            }
        }

        self.exit_status
            .clone()
            .ok_or_else(|| DemoError::Pty("child exit status unavailable".into()))
    }

    async fn wait_for_exit(&mut self, limit: Duration) -> DemoResult<bool> {
        let step = Duration::from_millis(10);
        let mut waited = Duration::ZERO;
        while self.is_alive()? {
            if waited >= limit {
                return Ok(false);
            }
            tokio::time::sleep(step).await;
            waited += step;
        }
        Ok(true)
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        if self.exit_status.is_none() {
            if let Ok(None) = self.child.try_wait() {
                debug!("killing shell on drop");
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
        }
        // The reader thread exits on EIO once the child side is gone; it is
        // detached rather than joined so drop never blocks on a stuck read.
        self.reader_thread.take();
    }
}

fn read_loop(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::UnboundedSender<ReadEvent>,
    chunk_size: usize,
) {
    let mut buf = vec![0u8; chunk_size];
    loop {
        let event = match reader.read(&mut buf) {
            Ok(0) => ReadEvent::Eof,
            Ok(n) => ReadEvent::Data(buf[..n].to_vec()),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => ReadEvent::Error(e),
        };
        let last = !matches!(event, ReadEvent::Data(_));
        if tx.send(event).is_err() || last {
            break;
        }
    }
    debug!("PTY reader finished");
}

fn write_decoded<W: Write>(out: &mut W, text: &str) -> DemoResult<()> {
    if !text.is_empty() {
        out.write_all(text.as_bytes())?;
        out.flush()?;
    }
    Ok(())
}
