//! Error types for the line engine
//!
//! Folding, highlighting and search failures are recovered locally and never
//! reach the host; only navigation requests and configuration loading can fail.

use thiserror::Error;

/// Errors returned by host-facing engine operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Requested display line is not inside the loaded window
    #[error("line {line} is outside the loaded range {first}..={last}")]
    LineOutOfRange {
        line: usize,
        first: usize,
        last: usize,
    },

    /// Requested byte offset is not inside the loaded window
    #[error("byte offset {offset} is outside the loaded range {start}..{end}")]
    OffsetOutOfRange { offset: u64, start: u64, end: u64 },

    /// No fold range with this id exists in the current index
    #[error("unknown folding range {0}")]
    UnknownFoldRange(String),

    /// No search result at this index
    #[error("no search result at index {0}")]
    NoSearchMatch(usize),

    /// Operation needs a loaded buffer
    #[error("no file is loaded")]
    NoFileLoaded,
}

/// Errors raised while loading or validating an [`crate::EngineConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
