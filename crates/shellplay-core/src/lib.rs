//! shellplay-core: shell-integration and async-stream demos.
//!
//! Drives an interactive shell through a pseudo-terminal, exchanges a message
//! over a named pipe, forwards signals to a child process group, restores
//! terminal state, and composes small async stream pipelines.

pub mod completion;
pub mod config;
pub mod decode;
pub mod error;
pub mod fifo;
pub mod pipeline;
pub mod pty;
pub mod shell;
pub mod signals;
pub mod terminal;

// Re-export commonly used items at crate root.
pub use config::Config;
pub use error::{DemoError, DemoResult};
pub use fifo::{run_fifo_demo, NamedPipe};
pub use pipeline::run_pipeline_demo;
pub use pty::{PumpOutcome, ShellSession, StopReason};
pub use shell::{run_shell_demo, ShellReport};
pub use signals::{forward_to_group, SignalForwarder};
pub use terminal::TerminalStateGuard;
