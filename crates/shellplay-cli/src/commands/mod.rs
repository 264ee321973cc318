//! CLI subcommand implementations.

pub mod complete;
pub mod fifo;
pub mod pipeline;
pub mod shell;

use anyhow::Result;
use shellplay_core::Config;

const RULE_WIDTH: usize = 40;

/// With no subcommand: the FIFO exchange, then the interactive shell.
pub async fn run_default(cfg: &Config) -> Result<()> {
    println!("Shell Integration Demo");
    println!("{}", "=".repeat(RULE_WIDTH));

    println!("\n1. Testing FIFO communication:");
    fifo::run(&cfg.fifo).await?;

    println!("\n2. Creating interactive shell with alias support:");
    shell::run(&cfg.shell).await
}
