//! `shellplay shell`: scripted interactive shell on a pseudo-terminal.
//!
//! Output is copied to stdout until the shell exits. SIGINT and SIGTERM are
//! relayed to the shell's process group, and the terminal is restored on the
//! way out however the session ended.

use anyhow::{Context, Result};
use shellplay_core::config::ShellConfig;
use tracing::info;

use super::RULE_WIDTH;

/// Run the configured command script and report how the shell ended.
pub async fn run(cfg: &ShellConfig) -> Result<()> {
    let mut stdout = std::io::stdout();
    let report = shellplay_core::run_shell_demo(cfg, &mut stdout)
        .await
        .with_context(|| format!("shell session with '{}' failed", cfg.program))?;

    info!(
        reason = ?report.outcome.reason,
        forwarded = report.signals_forwarded,
        "shell session closed"
    );

    println!("\n{}", "=".repeat(RULE_WIDTH));
    if report.exit_status.success() {
        println!("Demo complete! Aliases worked in the interactive shell.");
    } else {
        println!(
            "Shell exited with code {}.",
            report.exit_status.exit_code()
        );
    }
    Ok(())
}
