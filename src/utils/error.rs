//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use crate::parser::EventType;
use thiserror::Error;

/// Errors that can occur while loading an export configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    ParseFailed(#[from] toml::de::Error),
}

/// Errors that can occur while loading a trace-tree document
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read trace tree: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors that can occur while reading clock-sync input
#[derive(Error, Debug)]
pub enum ClockError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed sync marker on line {line}: {text}")]
    MalformedMarker { line: usize, text: String },

    #[error("Unsupported trace capture format: {0}")]
    Unsupported(String),
}

/// Errors that can occur while rendering a record
///
/// These are contract violations: the upstream walker handed the
/// formatter something it cannot render.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Event type '{0}' has no output phase")]
    UnexpectedEventType(EventType),

    #[error("Event of type '{0}' has no name to render")]
    UnnamedEvent(EventType),

    #[error("Failed to serialize record: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("No trace shards to bundle")]
    NoShards,

    #[error("No open trace shard")]
    NoOpenShard,

    #[error("Failed to build archive: {0}")]
    ArchiveFailed(#[from] zip::result::ZipError),
}

/// Errors surfaced by the trace exporter
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Output(OutputError::WriteFailed(err))
    }
}
