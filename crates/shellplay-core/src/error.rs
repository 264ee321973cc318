use thiserror::Error;

/// Errors produced by the demos.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("pty error: {0}")]
    Pty(String),

    #[error("fifo error: {0}")]
    Fifo(String),

    #[error("signal error: {0}")]
    Signal(String),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for DemoError {
    fn from(e: toml::de::Error) -> Self {
        DemoError::Config(e.to_string())
    }
}

pub type DemoResult<T> = Result<T, DemoError>;
