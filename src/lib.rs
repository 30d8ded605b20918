//! # Tortilla
//!
//! A cloud-optimized container format that packs many files into one blob:
//! - Items stored back to back in a data region
//! - A footer index with fixed-size records for random access
//! - A fixed-size trailer, so remote containers open with two range reads
//! - Subsetting ("compile") without touching unselected items
//!
//! ## Architecture Overview
//!
//! ```text
//!   local files ──► ContainerWriter ──► [ data | footer | trailer ]
//!                                                  │
//!                    ┌─────────────────────────────┘
//!                    ▼
//!            ByteRangeSource  (LocalSource | HttpSource)
//!                    │
//!                    ▼
//!            ContainerReader ──► index(), item(), read_item_bytes()
//!                    │
//!                    ▼
//!               compile() ──► ContainerWriter ──► new container
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use tortilla::{Config, ItemRef, Sample};
//!
//! # fn main() -> tortilla::Result<()> {
//! let config = Config::default();
//! let samples = vec![Sample::new("a.tif"), Sample::new("b.tif"), Sample::new("c.tif")];
//! tortilla::create(&samples, Path::new("all.tortilla"), &config)?;
//!
//! let reader = tortilla::load("all.tortilla")?;
//! let bytes = reader.read_item_bytes(ItemRef::position(1))?;
//! assert_eq!(bytes.len() as u64, reader.item(ItemRef::position(1))?.length);
//!
//! let selection = [ItemRef::position(2), ItemRef::position(0)];
//! tortilla::compile(&reader, &selection, Path::new("subset.tortilla"), &config)?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod source;
pub mod format;
pub mod container;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{parse_size, format_size, CancelToken, Config, IdPolicy};
pub use container::{
    compile, create, create_parts, load_parts, CompilePlan, ContainerReader, ContainerSummary,
    ContainerWriter, Sample,
};
pub use error::{ErrorCategory, Result, TortillaError};
pub use format::{Index, Item, ItemId, ItemRef, MetaValue, Metadata, Trailer};
pub use source::{ByteRangeSource, HttpSource, LocalSource, Locator};

/// Load a container from a local path or an `http(s)://` URL
pub fn load(locator: &str) -> Result<ContainerReader> {
    ContainerReader::load(locator)
}

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Tortilla
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
