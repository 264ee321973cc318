//! shellplay: shell-integration and async-stream demos.
//!
//! Drives an interactive shell through a pseudo-terminal, passes a message
//! through a named pipe, composes async character pipelines, and streams a
//! model completion through text transformation stages.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shellplay_core::Config;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// shellplay: PTY shell, FIFO, and async pipeline demos
#[derive(Parser)]
#[command(name = "shellplay", version, about = "PTY shell, FIFO, and async pipeline demos")]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a FIFO and pass a line through it from a child process
    Fifo {
        /// FIFO location
        #[arg(long)]
        path: Option<PathBuf>,
        /// Line to send
        #[arg(long)]
        message: Option<String>,
    },

    /// Run a scripted interactive shell on a pseudo-terminal
    Shell {
        /// Interpreter to launch
        #[arg(long)]
        program: Option<String>,
        /// Line to send to the shell (repeatable; replaces the configured script)
        #[arg(short = 'c', long = "command")]
        commands: Vec<String>,
        /// Output poll interval in milliseconds
        #[arg(long)]
        poll_ms: Option<u64>,
        /// Put the terminal into raw mode while the shell runs
        #[arg(long)]
        raw: bool,
    },

    /// Stream characters through the async generator chain
    Pipeline {
        /// Skip the artificial delays
        #[arg(long)]
        no_delay: bool,
    },

    /// Stream a model completion through wrapping and progress stages
    Complete {
        /// Prompt text (default: first line of stdin)
        #[arg(long)]
        prompt: Option<String>,
        /// Model name
        #[arg(long)]
        model: Option<String>,
        /// Wrap width (0 disables wrapping)
        #[arg(long)]
        width: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries demo output.
    let env_filter = if cli.verbose {
        EnvFilter::new("shellplay=debug,shellplay_cli=debug,shellplay_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut cfg = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(path = %config_path.display(), error = %e, "failed to load config");
            eprintln!("shellplay: failed to load config {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Command::Fifo { path, message }) => {
            if let Some(path) = path {
                cfg.fifo.path = path;
            }
            if let Some(message) = message {
                cfg.fifo.message = message;
            }
            commands::fifo::run(&cfg.fifo).await
        }
        Some(Command::Shell {
            program,
            commands: script,
            poll_ms,
            raw,
        }) => {
            if let Some(program) = program {
                cfg.shell.program = program;
            }
            if !script.is_empty() {
                cfg.shell.commands = script;
            }
            if let Some(poll_ms) = poll_ms {
                cfg.shell.poll_interval_ms = poll_ms;
            }
            cfg.shell.raw_mode |= raw;
            commands::shell::run(&cfg.shell).await
        }
        Some(Command::Pipeline { no_delay }) => {
            if no_delay {
                cfg.pipeline.source_delay_ms = 0;
                cfg.pipeline.char_delay_ms = 0;
            }
            commands::pipeline::run(&cfg.pipeline).await
        }
        Some(Command::Complete {
            prompt,
            model,
            width,
        }) => {
            if let Some(model) = model {
                cfg.completion.model = model;
            }
            if let Some(width) = width {
                cfg.completion.wrap_width = width;
            }
            commands::complete::run(&cfg.completion, prompt).await
        }
        None => commands::run_default(&cfg).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("shellplay: {e:#}");
        std::process::exit(1);
    }
}
