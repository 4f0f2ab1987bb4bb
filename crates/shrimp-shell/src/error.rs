use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    /// The requested session id is not registered.
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Child process could not be spawned.
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// Underlying I/O failure (write, flush).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
