//! Named pipe (FIFO) creation and a one-shot cross-process exchange.
//!
//! The read side is opened non-blocking through tokio so the runtime never
//! stalls waiting for a writer; the writer is a separate `sh` process that
//! blocks in `open(2)` until the reader exists.

use std::ffi::CString;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::FifoConfig;
use crate::error::{DemoError, DemoResult};

/// Writes `$1` plus a newline into the FIFO at `$2`.
const WRITER_SCRIPT: &str = r#"printf '%s\n' "$1" > "$2""#;

/// A FIFO on the filesystem, removed when dropped.
#[derive(Debug)]
pub struct NamedPipe {
    path: PathBuf,
    removed: bool,
}

impl NamedPipe {
    /// Create a FIFO at `path`, deleting whatever was there first.
    pub fn create(path: impl Into<PathBuf>) -> DemoResult<Self> {
        let path = path.into();

        match std::fs::symlink_metadata(&path) {
            Ok(_) => {
                debug!(path = %path.display(), "removing existing entry");
                std::fs::remove_file(&path).map_err(|e| {
                    DemoError::Fifo(format!("cannot remove existing {}: {e}", path.display()))
                })?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| DemoError::Fifo(format!("path contains NUL: {}", path.display())))?;
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return Err(DemoError::Fifo(format!("mkfifo {} failed: {err}", path.display())));
        }

        info!(path = %path.display(), "created FIFO");
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the read side without waiting for a writer.
    pub fn open_reader(&self) -> DemoResult<pipe::Receiver> {
        pipe::OpenOptions::new()
            .open_receiver(&self.path)
            .map_err(|e| DemoError::Fifo(format!("open {} for reading: {e}", self.path.display())))
    }

    /// Have a separate process write `message` plus a newline into the FIFO
    /// and read it back to EOF.
    ///
    /// Fails with [`DemoError::Timeout`] if nothing arrives within `timeout`;
    /// the writer process is killed in that case.
    pub async fn exchange(&self, message: &str, timeout: Duration) -> DemoResult<String> {
        let mut reader = self.open_reader()?;

        let mut writer = Command::new("sh")
            .arg("-c")
            .arg(WRITER_SCRIPT)
            .arg("shellplay-fifo-writer")
            .arg(message)
            .arg(&self.path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DemoError::Fifo(format!("failed to spawn writer: {e}")))?;
        debug!(pid = ?writer.id(), "writer process started");

        let mut buf = Vec::new();
        let (read, status) = tokio::time::timeout(timeout, async {
            tokio::join!(reader.read_to_end(&mut buf), writer.wait())
        })
        .await
        .map_err(|_| {
            warn!(path = %self.path.display(), "no message before timeout");
            DemoError::Timeout
        })?;

        read?;
        let status = status?;
        if !status.success() {
            return Err(DemoError::Fifo(format!("writer exited with {status}")));
        }

        String::from_utf8(buf).map_err(|e| DemoError::Fifo(format!("message is not UTF-8: {e}")))
    }

    /// Delete the FIFO now, reporting failures.
    pub fn remove(mut self) -> DemoResult<()> {
        self.removed = true;
        std::fs::remove_file(&self.path)?;
        debug!(path = %self.path.display(), "removed FIFO");
        Ok(())
    }
}

impl Drop for NamedPipe {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Create the FIFO, pass the configured line through it from a child
/// process, delete it, and report what arrived. Returns the raw message.
pub async fn run_fifo_demo<W: Write>(config: &FifoConfig, out: &mut W) -> DemoResult<String> {
    let fifo = NamedPipe::create(&config.path)?;
    writeln!(out, "Created FIFO at {}", fifo.path().display())?;

    let message = fifo.exchange(&config.message, config.timeout()).await?;
    fifo.remove()?;

    writeln!(out, "Received via FIFO: {}", message.trim())?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::FileTypeExt;

    fn config_in(dir: &Path, message: &str) -> FifoConfig {
        FifoConfig {
            path: dir.join("demo_fifo"),
            message: message.to_string(),
            timeout_ms: 5000,
        }
    }

    #[test]
    fn create_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fifo");
        std::fs::write(&path, "stale").unwrap();

        let fifo = NamedPipe::create(&path).unwrap();
        let meta = std::fs::symlink_metadata(fifo.path()).unwrap();
        assert!(meta.file_type().is_fifo());
    }

    #[test]
    fn drop_removes_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fifo");
        {
            let _fifo = NamedPipe::create(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn create_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = NamedPipe::create(dir.path().join("nope").join("fifo")).unwrap_err();
        assert!(matches!(err, DemoError::Fifo(_)));
    }

    #[tokio::test]
    async fn demo_round_trips_message_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(dir.path(), "Hello from child process via FIFO!");
        let mut out = Vec::new();

        let message = run_fifo_demo(&cfg, &mut out).await.unwrap();

        assert_eq!(message, "Hello from child process via FIFO!\n");
        assert!(!cfg.path.exists());
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Created FIFO at"));
        assert!(printed.contains("Received via FIFO: Hello from child process via FIFO!"));
    }

    #[tokio::test]
    async fn shell_metacharacters_arrive_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let text = r#"it's "$HOME" `date` %s \n"#;
        let cfg = config_in(dir.path(), text);

        let message = run_fifo_demo(&cfg, &mut Vec::new()).await.unwrap();
        assert_eq!(message, format!("{text}\n"));
    }

    #[tokio::test]
    async fn stale_fifo_is_replaced_before_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(dir.path(), "again");
        std::mem::forget(NamedPipe::create(&cfg.path).unwrap());
        assert!(cfg.path.exists());

        let message = run_fifo_demo(&cfg, &mut Vec::new()).await.unwrap();
        assert_eq!(message, "again\n");
        assert!(!cfg.path.exists());
    }

    /// Live processes whose command line mentions `path`. Zombies have an
    /// empty command line and are not counted.
    fn processes_mentioning(path: &Path) -> usize {
        let needle = path.as_os_str().as_bytes();
        std::fs::read_dir("/proc")
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().parse::<u32>().is_ok())
            .filter_map(|entry| std::fs::read(entry.path().join("cmdline")).ok())
            .filter(|cmdline| cmdline.windows(needle.len()).any(|w| w == needle))
            .count()
    }

    #[tokio::test]
    async fn exchange_times_out_and_kills_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow_fifo");
        let fifo = NamedPipe::create(&path).unwrap();

        let err = fifo.exchange("late", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, DemoError::Timeout));

        drop(fifo);
        assert!(!path.exists());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while processes_mentioning(&path) > 0 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "writer process still running"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
