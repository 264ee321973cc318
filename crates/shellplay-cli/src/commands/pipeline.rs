//! `shellplay pipeline`: async generator composition.

use anyhow::{Context, Result};
use shellplay_core::config::PipelineConfig;
use tracing::debug;

pub async fn run(cfg: &PipelineConfig) -> Result<()> {
    let mut stdout = std::io::stdout();
    let count = shellplay_core::run_pipeline_demo(cfg, &mut stdout)
        .await
        .context("pipeline failed")?;
    debug!(count, "characters streamed");
    Ok(())
}
