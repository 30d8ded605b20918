//! Error types for Tortilla
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using TortillaError
pub type Result<T> = std::result::Result<T, TortillaError>;

/// Unified error type for Tortilla operations
#[derive(Debug, Error)]
pub enum TortillaError {
    // -------------------------------------------------------------------------
    // Local I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    // -------------------------------------------------------------------------
    // Source Errors
    // -------------------------------------------------------------------------
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Range requests not supported by {0}")]
    RangeUnsupported(String),

    #[error("Range out of bounds: offset {offset} + length {length} exceeds size {size}")]
    OutOfBounds { offset: u64, length: u64, size: u64 },

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Invalid magic: {0}")]
    InvalidMagic(String),

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    // -------------------------------------------------------------------------
    // Item / Selection Errors
    // -------------------------------------------------------------------------
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Position {position} out of range for index of {len} items")]
    IndexOutOfRange { position: usize, len: usize },

    #[error("Duplicate item id: {0}")]
    DuplicateItemId(String),

    #[error("Selection is empty")]
    EmptySelection,

    // -------------------------------------------------------------------------
    // Operation Errors
    // -------------------------------------------------------------------------
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Coarse classification of failures, for user-facing reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The source could not be found or reached
    Unreachable,
    /// The source was reached but is not a valid container
    Malformed,
    /// The container is valid but the requested item/selection is not
    InvalidRequest,
    /// Local filesystem or configuration problem
    Local,
    /// The operation was cancelled or a worker died
    Interrupted,
}

impl TortillaError {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            TortillaError::SourceNotFound(_)
            | TortillaError::Transport(_)
            | TortillaError::RangeUnsupported(_) => ErrorCategory::Unreachable,

            TortillaError::InvalidMagic(_)
            | TortillaError::UnsupportedVersion(_)
            | TortillaError::CorruptIndex(_) => ErrorCategory::Malformed,

            TortillaError::OutOfBounds { .. }
            | TortillaError::ItemNotFound(_)
            | TortillaError::IndexOutOfRange { .. }
            | TortillaError::DuplicateItemId(_)
            | TortillaError::EmptySelection => ErrorCategory::InvalidRequest,

            TortillaError::Io(_) | TortillaError::FileNotFound(_) | TortillaError::Config(_) => {
                ErrorCategory::Local
            }

            TortillaError::Cancelled | TortillaError::Worker(_) => ErrorCategory::Interrupted,
        }
    }
}
