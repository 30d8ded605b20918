//! Trailer
//!
//! Fixed-size record closing every container, pointing at the footer.

use crate::error::{Result, TortillaError};

use super::{FORMAT_VERSION, TRAILER_MAGIC, TRAILER_SIZE};

/// Decoded trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub format_version: u16,
    pub item_count: u32,
    pub footer_offset: u64,
    pub footer_length: u64,
}

impl Trailer {
    pub fn new(item_count: u32, footer_offset: u64, footer_length: u64) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            item_count,
            footer_offset,
            footer_length,
        }
    }

    /// Encode: magic (8) | version (2) | item_count (4) | footer_offset (8) | footer_length (8)
    pub fn encode(&self) -> [u8; TRAILER_SIZE as usize] {
        let mut buf = [0u8; TRAILER_SIZE as usize];
        buf[0..8].copy_from_slice(TRAILER_MAGIC);
        buf[8..10].copy_from_slice(&self.format_version.to_le_bytes());
        buf[10..14].copy_from_slice(&self.item_count.to_le_bytes());
        buf[14..22].copy_from_slice(&self.footer_offset.to_le_bytes());
        buf[22..30].copy_from_slice(&self.footer_length.to_le_bytes());
        buf
    }

    /// Decode and validate magic and version
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TRAILER_SIZE as usize {
            return Err(TortillaError::InvalidMagic(format!(
                "trailer must be {} bytes, got {}",
                TRAILER_SIZE,
                bytes.len()
            )));
        }

        if &bytes[0..8] != TRAILER_MAGIC {
            return Err(TortillaError::InvalidMagic(format!(
                "expected {:?}, got {:?}",
                String::from_utf8_lossy(TRAILER_MAGIC),
                String::from_utf8_lossy(&bytes[0..8])
            )));
        }

        let format_version = u16::from_le_bytes([bytes[8], bytes[9]]);
        if format_version != FORMAT_VERSION {
            return Err(TortillaError::UnsupportedVersion(format_version));
        }

        Ok(Self {
            format_version,
            item_count: u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]),
            footer_offset: read_u64(&bytes[14..22]),
            footer_length: read_u64(&bytes[22..30]),
        })
    }

    /// Check the trailer against the container size it was read from
    pub fn validate_against(&self, total_size: u64) -> Result<()> {
        let end = self
            .footer_offset
            .checked_add(self.footer_length)
            .and_then(|n| n.checked_add(TRAILER_SIZE));

        if end != Some(total_size) {
            return Err(TortillaError::CorruptIndex(format!(
                "trailer points at footer [{}, +{}) which does not end at the trailer (size {})",
                self.footer_offset, self.footer_length, total_size
            )));
        }
        Ok(())
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
