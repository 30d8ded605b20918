//! Source Module
//!
//! Byte-range access to a container, local or remote.
//!
//! ## Responsibilities
//! - Resolve a locator (path or `http(s)://` URL) to a source
//! - Serve exact `[offset, offset + length)` reads
//! - Report the total size without reading the body
//! - Refuse remote servers without range support (no full-body fallback)
//!
//! Sources are `Send + Sync`: one source may serve many concurrent reads.

mod http;
mod local;

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{Result, TortillaError};

pub use self::http::HttpSource;
pub use self::local::LocalSource;

/// A sequence of bytes addressable by `(offset, length)`
pub trait ByteRangeSource: Send + Sync + fmt::Debug {
    /// Read exactly `length` bytes starting at `offset`
    fn read_range(&self, offset: u64, length: u64) -> Result<Bytes>;

    /// Total byte length of the source
    fn total_size(&self) -> u64;

    /// The locator this source was opened from
    fn locator(&self) -> &str;
}

/// Where a container lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Local(PathBuf),
    Remote(String),
}

impl Locator {
    /// Classify a locator string: `http://` / `https://` are remote, anything else is a path
    pub fn parse(locator: &str) -> Self {
        let lower = locator.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Locator::Remote(locator.to_string())
        } else {
            Locator::Local(PathBuf::from(locator))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Locator::Remote(_))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Local(path) => write!(f, "{}", path.display()),
            Locator::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Open a source for `locator` with default settings
pub fn open(locator: &str) -> Result<Box<dyn ByteRangeSource>> {
    open_with_config(locator, &Config::default())
}

/// Open a source for `locator`
pub fn open_with_config(locator: &str, config: &Config) -> Result<Box<dyn ByteRangeSource>> {
    match Locator::parse(locator) {
        Locator::Local(path) => Ok(Box::new(LocalSource::open(&path)?)),
        Locator::Remote(url) => Ok(Box::new(HttpSource::open(&url, config)?)),
    }
}

/// Bounds check shared by every source
pub(crate) fn check_bounds(offset: u64, length: u64, size: u64) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(TortillaError::OutOfBounds {
            offset,
            length,
            size,
        }),
    }
}
