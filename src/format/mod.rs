//! Format Module
//!
//! On-disk layout of a Tortilla container, its data model, and the codecs
//! for the footer index and the fixed trailer.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Data Region (variable)                                  │
//! │   item bytes, concatenated; item i lives at             │
//! │   [offset_i, offset_i + length_i)                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (variable, see `codec`)                          │
//! │   Header (64) | Records (32 x item_count) | Entry blob  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Trailer (30 bytes)                                      │
//! │   Magic "TORTILLA" (8) | Version: u16 (2) |             │
//! │   ItemCount: u32 (4) | FooterOffset: u64 (8) |          │
//! │   FooterLength: u64 (8)                                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. The trailer has a constant size, so a
//! reader bootstraps with one read of the last `TRAILER_SIZE` bytes and one
//! read of the footer. Over HTTP the first read doubles as the size lookup.

mod codec;
mod item;
mod trailer;

pub use codec::{decode_index, decode_item_at, encode_index};
pub use item::{Index, Item, ItemId, ItemRef, MetaValue, Metadata};
pub use trailer::Trailer;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes closing every Tortilla container
pub const TRAILER_MAGIC: &[u8; 8] = b"TORTILLA";

/// Current container format version (trailer)
pub const FORMAT_VERSION: u16 = 1;

/// Trailer size: Magic (8) + Version (2) + ItemCount (4) + FooterOffset (8) + FooterLength (8)
pub const TRAILER_SIZE: u64 = 30;

/// Magic bytes opening the footer index
pub const INDEX_MAGIC: &[u8; 4] = b"TIDX";

/// Current index encoding version
pub const INDEX_VERSION: u16 = 1;

/// Footer header size (see `codec` for the field list)
pub const INDEX_HEADER_SIZE: usize = 64;

/// Fixed size of one item record in the footer
pub const RECORD_SIZE: usize = 32;

/// Width of the NUL-padded file format tag
pub const FILE_FORMAT_LEN: usize = 24;
