//! `shellplay fifo`: named-pipe exchange with a child process.

use anyhow::{Context, Result};
use shellplay_core::config::FifoConfig;
use tracing::info;

/// Create the FIFO, receive the line from a writer process, remove the FIFO.
pub async fn run(cfg: &FifoConfig) -> Result<()> {
    let mut stdout = std::io::stdout();
    let message = shellplay_core::run_fifo_demo(cfg, &mut stdout)
        .await
        .with_context(|| format!("FIFO exchange at {} failed", cfg.path.display()))?;
    info!(bytes = message.len(), "FIFO exchange complete");
    Ok(())
}
