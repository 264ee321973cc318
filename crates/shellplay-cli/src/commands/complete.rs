//! `shellplay complete`: stream a model completion to the terminal.
//!
//! Reads a prompt, sends a streaming messages request, and prints the text
//! deltas through the line-wrapping and progress stages as they arrive.

use std::io::Write;

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use shellplay_core::completion::{
    annotate_progress, request_body, sse_text_deltas, wrap_lines, ANTHROPIC_VERSION,
};
use shellplay_core::config::CompletionConfig;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Prompt from the flag, or the first line of stdin.
async fn read_prompt(flag: Option<String>) -> Result<String> {
    let raw = match flag {
        Some(prompt) => prompt,
        None => {
            println!("Enter your prompt:");
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("failed to read prompt from stdin")?;
            input.lines().next().unwrap_or_default().to_string()
        }
    };

    let prompt = raw.trim().to_string();
    if prompt.is_empty() {
        bail!("no prompt provided");
    }
    Ok(prompt)
}

pub async fn run(cfg: &CompletionConfig, prompt: Option<String>) -> Result<()> {
    let api_key = std::env::var(&cfg.api_key_env)
        .with_context(|| format!("{} environment variable is required", cfg.api_key_env))?;
    let prompt = read_prompt(prompt).await?;

    info!(model = %cfg.model, url = %cfg.api_url, "requesting completion");
    let response = reqwest::Client::new()
        .post(&cfg.api_url)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&request_body(cfg, &prompt))
        .send()
        .await
        .context("completion request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("API request failed: {status}");
    }

    println!("\n--- Streaming response ---\n");

    let deltas = sse_text_deltas(response.bytes_stream());
    let chunks = annotate_progress(wrap_lines(deltas, cfg.wrap_width), cfg.progress_interval);
    let mut chunks = Box::pin(chunks);

    let mut stdout = std::io::stdout();
    let mut streamed = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.context("completion stream failed")?;
        streamed += chunk.len();
        stdout.write_all(chunk.as_bytes())?;
        stdout.flush()?;
    }
    debug!(bytes = streamed, "completion finished");

    println!("\n\n--- End of response ---");
    Ok(())
}
