//! Demo configuration at `~/.shellplay/config.toml`.
//!
//! Every section and field has a default, so a missing file or a partial file
//! is always valid. CLI flags override file values in the binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::DemoResult;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fifo: FifoConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

/// `[fifo]` section: the named-pipe exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct FifoConfig {
    /// Filesystem location of the FIFO.
    #[serde(default = "default_fifo_path")]
    pub path: PathBuf,

    /// Line written by the writer process (a trailing newline is added).
    #[serde(default = "default_fifo_message")]
    pub message: String,

    /// How long the reader waits for the writer, in milliseconds.
    #[serde(default = "default_fifo_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            path: default_fifo_path(),
            message: default_fifo_message(),
            timeout_ms: default_fifo_timeout_ms(),
        }
    }
}

impl FifoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// `[shell]` section: the PTY-backed interactive interpreter.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    /// Interpreter to launch.
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments passed to the interpreter.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Value exported as `PS1` in the child environment.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Lines written to the PTY, in order, before output is read.
    #[serde(default = "default_commands")]
    pub commands: Vec<String>,

    /// Upper bound on each wait for PTY output, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum bytes per PTY read.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Time between SIGTERM and a hard kill at shutdown, in milliseconds.
    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,

    /// Put the controlling terminal into raw mode while the shell runs.
    #[serde(default)]
    pub raw_mode: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            prompt: default_prompt(),
            commands: default_commands(),
            poll_interval_ms: default_poll_interval_ms(),
            read_chunk_size: default_read_chunk_size(),
            terminate_grace_ms: default_terminate_grace_ms(),
            raw_mode: false,
        }
    }
}

impl ShellConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

/// `[pipeline]` section: the generator-composition chain.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Strings produced by the source stage.
    #[serde(default = "default_messages")]
    pub messages: Vec<String>,

    /// Emitted after each message; empty disables it.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Delay before each source message, in milliseconds.
    #[serde(default = "default_source_delay_ms")]
    pub source_delay_ms: u64,

    /// Delay after each typed character, in milliseconds.
    #[serde(default = "default_char_delay_ms")]
    pub char_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            messages: default_messages(),
            separator: default_separator(),
            source_delay_ms: default_source_delay_ms(),
            char_delay_ms: default_char_delay_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }

    pub fn char_delay(&self) -> Duration {
        Duration::from_millis(self.char_delay_ms)
    }
}

/// `[completion]` section: the streaming model completion.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Line width for wrapping; 0 disables wrapping.
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,

    /// Characters between progress markers; 0 disables them.
    #[serde(default)]
    pub progress_interval: usize,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            wrap_width: default_wrap_width(),
            progress_interval: 0,
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_fifo_path() -> PathBuf {
    PathBuf::from("/tmp/shell_demo_fifo")
}
fn default_fifo_message() -> String {
    "Hello from child process via FIFO!".to_string()
}
fn default_fifo_timeout_ms() -> u64 {
    5000
}
fn default_program() -> String {
    "bash".to_string()
}
fn default_args() -> Vec<String> {
    vec!["-i".to_string()]
}
fn default_prompt() -> String {
    "$ ".to_string()
}
fn default_commands() -> Vec<String> {
    vec![
        "alias hello='echo Hello from alias!'".to_string(),
        "hello".to_string(),
        "echo 'Direct command'".to_string(),
        "exit".to_string(),
    ]
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_read_chunk_size() -> usize {
    1024
}
fn default_terminate_grace_ms() -> u64 {
    1000
}
fn default_messages() -> Vec<String> {
    ["hello", "world", "from", "async", "generators"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_separator() -> String {
    " ".to_string()
}
fn default_source_delay_ms() -> u64 {
    100
}
fn default_char_delay_ms() -> u64 {
    50
}
fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}
fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_wrap_width() -> usize {
    80
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> DemoResult<Self> {
        let path = expand_tilde(path);
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Default config location: `~/.shellplay/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".shellplay")
            .join("config.toml")
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
