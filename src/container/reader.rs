//! Container Reader
//!
//! Bootstraps a container from any byte-range source and serves lazy,
//! per-item range reads.

use std::io::Write;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{Result, TortillaError};
use crate::format::{decode_index, Index, Item, ItemRef, Trailer, TRAILER_SIZE};
use crate::source::{self, ByteRangeSource};

use super::fetch::{chunk_range, fetch_ordered, RangeJob};

/// Reader over one container.
///
/// A successfully loaded reader holds a fully validated index. Item bytes
/// are only fetched on request, one range read per item.
#[derive(Debug)]
pub struct ContainerReader {
    /// Owned for the reader's lifetime; released on drop
    source: Box<dyn ByteRangeSource>,
    trailer: Trailer,
    index: Index,
    config: Config,
}

impl ContainerReader {
    /// Load a container from a path or `http(s)://` URL
    pub fn load(locator: &str) -> Result<Self> {
        Self::load_with_config(locator, &Config::default())
    }

    /// Load a container with explicit settings
    pub fn load_with_config(locator: &str, config: &Config) -> Result<Self> {
        let source = source::open_with_config(locator, config)?;
        Self::from_source(source, config)
    }

    /// Bootstrap from an already-open source.
    ///
    /// Steps:
    /// 1. Read the last `TRAILER_SIZE` bytes (remote sources already hold them)
    /// 2. Validate magic, version and footer position
    /// 3. Read exactly the footer (one range read)
    /// 4. Decode and validate the index
    pub fn from_source(source: Box<dyn ByteRangeSource>, config: &Config) -> Result<Self> {
        let total_size = source.total_size();
        if total_size < TRAILER_SIZE {
            return Err(TortillaError::InvalidMagic(format!(
                "{} is {} bytes, too small to hold a {}-byte trailer",
                source.locator(),
                total_size,
                TRAILER_SIZE
            )));
        }

        // Step 1-2: trailer
        let trailer_bytes = source.read_range(total_size - TRAILER_SIZE, TRAILER_SIZE)?;
        let trailer = Trailer::decode(&trailer_bytes)?;
        trailer.validate_against(total_size)?;

        // Step 3-4: footer
        let footer = source.read_range(trailer.footer_offset, trailer.footer_length)?;
        let index = decode_index(&footer)?;

        if index.len() != trailer.item_count as usize {
            return Err(TortillaError::CorruptIndex(format!(
                "trailer declares {} items, footer holds {}",
                trailer.item_count,
                index.len()
            )));
        }
        if index.data_length() != trailer.footer_offset {
            return Err(TortillaError::CorruptIndex(format!(
                "items cover {} bytes but the footer starts at {}",
                index.data_length(),
                trailer.footer_offset
            )));
        }

        tracing::debug!(
            "Loaded {}: {} items, footer {} bytes at {}",
            source.locator(),
            index.len(),
            trailer.footer_length,
            trailer.footer_offset
        );

        Ok(Self {
            source,
            trailer,
            index,
            config: config.clone(),
        })
    }

    /// The full decoded index
    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn file_format(&self) -> &str {
        self.index.file_format()
    }

    pub fn locator(&self) -> &str {
        self.source.locator()
    }

    pub fn total_size(&self) -> u64 {
        self.source.total_size()
    }

    pub fn source(&self) -> &dyn ByteRangeSource {
        self.source.as_ref()
    }

    /// Look up an item by id or position
    pub fn item(&self, item: impl Into<ItemRef>) -> Result<&Item> {
        self.index.get(&item.into())
    }

    /// Fetch one item's bytes with a single range read
    pub fn read_item_bytes(&self, item: impl Into<ItemRef>) -> Result<Bytes> {
        let item = self.item(item)?;
        self.source.read_range(item.offset, item.length)
    }

    /// Fetch several items in parallel; results follow `items` order
    pub fn read_items(&self, items: &[ItemRef]) -> Result<Vec<Bytes>> {
        let jobs = items
            .iter()
            .map(|r| {
                self.index.get(r).map(|item| RangeJob {
                    offset: item.offset,
                    length: item.length,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(jobs.len());
        fetch_ordered(self.source.as_ref(), &jobs, &self.config, |_, bytes| {
            out.push(bytes);
            Ok(())
        })?;
        Ok(out)
    }

    /// Stream one item into `writer` in `copy_chunk_size` pieces.
    ///
    /// Returns the number of bytes written.
    pub fn copy_item_to<W: Write>(&self, item: impl Into<ItemRef>, writer: &mut W) -> Result<u64> {
        let item = self.item(item)?;

        let mut jobs = Vec::new();
        chunk_range(
            item.offset,
            item.length,
            self.config.copy_chunk_size as u64,
            &mut jobs,
        );

        let mut copied = 0u64;
        fetch_ordered(self.source.as_ref(), &jobs, &self.config, |_, bytes| {
            writer.write_all(&bytes)?;
            copied += bytes.len() as u64;
            Ok(())
        })?;
        writer.flush()?;
        Ok(copied)
    }
}
