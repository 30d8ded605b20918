//! Configuration for Tortilla
//!
//! Centralized configuration with sensible defaults.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, TortillaError};

/// Main configuration for create / load / compile
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // I/O Configuration
    // -------------------------------------------------------------------------
    /// Number of parallel range readers used when copying items
    pub workers: usize,

    /// Largest single read (bytes) when streaming inputs or fetching ranges.
    /// Bounds memory for very large items.
    pub copy_chunk_size: usize,

    /// Timeout for each HTTP request (milliseconds)
    pub http_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Container Configuration
    // -------------------------------------------------------------------------
    /// Split `create_parts` output into parts of at most this many data bytes
    pub max_part_size: Option<u64>,

    /// Data format tag stored in the footer (at most 24 bytes)
    pub file_format: String,

    /// How compile assigns ids in the output container
    pub id_policy: IdPolicy,

    // -------------------------------------------------------------------------
    // Control
    // -------------------------------------------------------------------------
    /// Checked between items; shared by clones of this config
    pub cancel: CancelToken,
}

/// Id assignment policy for compiled containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// Assign 0, 1, 2, ... in selection order
    #[default]
    Renumber,

    /// Keep the ids from the source container
    Preserve,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 4,
            copy_chunk_size: 8 * 1024 * 1024, // 8 MiB
            http_timeout_ms: 60_000,
            max_part_size: None,
            file_format: String::new(),
            id_policy: IdPolicy::Renumber,
            cancel: CancelToken::new(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of parallel range readers (at least 1)
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count.max(1);
        self
    }

    /// Set the largest single read, in bytes (at least 1)
    pub fn copy_chunk_size(mut self, size: usize) -> Self {
        self.config.copy_chunk_size = size.max(1);
        self
    }

    /// Set the HTTP request timeout (in milliseconds)
    pub fn http_timeout_ms(mut self, ms: u64) -> Self {
        self.config.http_timeout_ms = ms;
        self
    }

    /// Split created containers into parts of at most `size` data bytes
    pub fn max_part_size(mut self, size: u64) -> Self {
        self.config.max_part_size = Some(size);
        self
    }

    /// Set the data format tag
    pub fn file_format(mut self, format: impl Into<String>) -> Self {
        self.config.file_format = format.into();
        self
    }

    /// Set the compile id policy
    pub fn id_policy(mut self, policy: IdPolicy) -> Self {
        self.config.id_policy = policy;
        self
    }

    /// Use an existing cancellation token
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.config.cancel = token;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation flag, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every operation holding this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Fail with `Cancelled` if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TortillaError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Human-readable sizes
// =============================================================================

const SIZE_UNITS: [(&str, u64); 5] = [
    ("PB", 1_000_000_000_000_000),
    ("TB", 1_000_000_000_000),
    ("GB", 1_000_000_000),
    ("MB", 1_000_000),
    ("KB", 1_000),
];

/// Parse a size such as `"100MB"`, `"1.5GB"` or `"512"` (bytes) into bytes.
///
/// Units are decimal (KB = 1000 bytes) and case-insensitive.
pub fn parse_size(input: &str) -> Result<u64> {
    let s = input.trim().to_ascii_uppercase();

    for (unit, multiplier) in SIZE_UNITS {
        if let Some(number) = s.strip_suffix(unit) {
            let value: f64 = number.trim().parse().map_err(|_| {
                TortillaError::Config(format!("Invalid size value in '{}'", input))
            })?;
            if !value.is_finite() || value < 0.0 {
                return Err(TortillaError::Config(format!(
                    "Invalid size value in '{}'",
                    input
                )));
            }
            return Ok((value * multiplier as f64) as u64);
        }
    }

    let number = s.strip_suffix('B').unwrap_or(&s).trim();
    number.parse::<u64>().map_err(|_| {
        TortillaError::Config(format!(
            "Unsupported size '{}': expected a byte count or a KB/MB/GB/TB/PB suffix",
            input
        ))
    })
}

/// Format a byte count in decimal units, e.g. `"1.50 GB"`.
///
/// Matches the units `parse_size` accepts.
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::DECIMAL)
}
