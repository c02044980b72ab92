//! Typed error definitions for the recorder.
//!
//! Provides [`RecorderError`], the error value shared by the feed, the schema
//! writer and the instance guard. The variant decides where a failure is
//! handled: transport, persistence and schema faults escalate to the
//! reconnect supervisor, which tags its retry warning with [`RecorderError::kind`].
//! A singleton violation stops the process at startup.

use std::path::PathBuf;

use thiserror::Error;

/// Domain-specific errors for the recorder.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Connection drop, malformed frame or receive timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// The output log could not be opened or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A row did not match the column count of the log header.
    #[error("schema error: expected {expected} columns, got {got}")]
    Schema { expected: usize, got: usize },

    /// Another instance holds the marker.
    #[error("another instance is already running (marker: {})", path.display())]
    SingletonViolation { path: PathBuf },
}

impl RecorderError {
    /// Short fault class for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::Persistence(_) => "persistence",
            Self::Schema { .. } => "schema",
            Self::SingletonViolation { .. } => "singleton",
        }
    }
}
