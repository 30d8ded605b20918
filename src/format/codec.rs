//! Index codec
//!
//! Encoding and decoding of the footer index.
//!
//! ## Footer Format
//!
//! ### Header (64 bytes)
//! ```text
//! ┌──────────┬─────────┬──────────┬───────────┬──────────────┐
//! │Magic (4) │ Ver (2) │ Rsvd (2) │ Count (4) │ DataLen (8)  │
//! ├──────────┴──┬──────┴──────┬───┴───────────┴──┬───────────┤
//! │ PartIdx (4) │ PartCnt (4) │ FileFormat (24)  │BlobLen (8)│
//! ├─────────────┴─────────────┴──────────────────┴───────────┤
//! │ CRC32 (4) over records + blob                            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Records (32 bytes each, one per item, in index order)
//! ```text
//! ┌────────────┬────────────┬────────────────┬──────────────┬──────────┐
//! │ Offset (8) │ Length (8) │ BlobOffset (8) │ BlobLen (4)  │ Rsvd (4) │
//! └────────────┴────────────┴────────────────┴──────────────┴──────────┘
//! ```
//!
//! ### Blob
//! Per item, a bincode-encoded entry `{ id, name, metadata }`, laid out
//! contiguously in index order. `BlobOffset` is relative to the blob start.
//!
//! Fixed-width records let `decode_item_at` reach any item without touching
//! the others. Decoding is strict: anything that would not re-encode to the
//! identical bytes is rejected as corrupt.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TortillaError};

use super::item::{Index, Item, ItemId, Metadata};
use super::{FILE_FORMAT_LEN, INDEX_HEADER_SIZE, INDEX_MAGIC, INDEX_VERSION, RECORD_SIZE};

/// Variable-length part of an item, borrowed for encoding
#[derive(Serialize)]
struct EntryRef<'a> {
    id: &'a ItemId,
    name: &'a str,
    metadata: &'a Metadata,
}

/// Variable-length part of an item, owned after decoding
#[derive(Deserialize)]
struct Entry {
    id: ItemId,
    name: String,
    metadata: Metadata,
}

/// Parsed fixed-size header
struct Header {
    item_count: u32,
    data_length: u64,
    part_index: u32,
    part_count: u32,
    file_format: String,
    blob_length: u64,
    crc: u32,
}

/// Parsed fixed-size record
struct Record {
    offset: u64,
    length: u64,
    blob_offset: u64,
    blob_length: u32,
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode an index into footer bytes.
///
/// Deterministic: the same index always yields the same bytes.
pub fn encode_index(index: &Index) -> Result<Vec<u8>> {
    let item_count = u32::try_from(index.len()).map_err(|_| {
        TortillaError::Config(format!("Too many items for one container: {}", index.len()))
    })?;

    let format_bytes = index.file_format().as_bytes();
    if format_bytes.len() > FILE_FORMAT_LEN {
        return Err(TortillaError::Config(format!(
            "File format tag '{}' longer than {} bytes",
            index.file_format(),
            FILE_FORMAT_LEN
        )));
    }

    // Entries first, so records can point into the blob
    let mut blob = Vec::new();
    let mut records = Vec::with_capacity(index.len() * RECORD_SIZE);

    for item in index {
        let entry = EntryRef {
            id: &item.id,
            name: &item.name,
            metadata: &item.metadata,
        };
        let encoded = bincode::serialize(&entry)
            .map_err(|e| TortillaError::Config(format!("Failed to encode item {}: {}", item.id, e)))?;
        let blob_length = u32::try_from(encoded.len()).map_err(|_| {
            TortillaError::Config(format!("Metadata of item {} too large", item.id))
        })?;

        records.extend_from_slice(&item.offset.to_le_bytes());
        records.extend_from_slice(&item.length.to_le_bytes());
        records.extend_from_slice(&(blob.len() as u64).to_le_bytes());
        records.extend_from_slice(&blob_length.to_le_bytes());
        records.extend_from_slice(&0u32.to_le_bytes());

        blob.extend_from_slice(&encoded);
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&records);
    hasher.update(&blob);
    let crc = hasher.finalize();

    let mut file_format = [0u8; FILE_FORMAT_LEN];
    file_format[..format_bytes.len()].copy_from_slice(format_bytes);

    let mut out = Vec::with_capacity(INDEX_HEADER_SIZE + records.len() + blob.len());
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&item_count.to_le_bytes());
    out.extend_from_slice(&index.data_length().to_le_bytes());
    out.extend_from_slice(&index.part_index().to_le_bytes());
    out.extend_from_slice(&index.part_count().to_le_bytes());
    out.extend_from_slice(&file_format);
    out.extend_from_slice(&(blob.len() as u64).to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    debug_assert_eq!(out.len(), INDEX_HEADER_SIZE);

    out.extend_from_slice(&records);
    out.extend_from_slice(&blob);
    Ok(out)
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode and fully validate footer bytes.
pub fn decode_index(bytes: &[u8]) -> Result<Index> {
    let header = parse_header(bytes)?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes[INDEX_HEADER_SIZE..]);
    let actual_crc = hasher.finalize();
    if actual_crc != header.crc {
        return Err(corrupt(format!(
            "checksum mismatch: stored {:#010x}, computed {:#010x}",
            header.crc, actual_crc
        )));
    }

    let count = header.item_count as usize;
    let blob_start = INDEX_HEADER_SIZE + count * RECORD_SIZE;
    let blob = &bytes[blob_start..];

    let mut items = Vec::with_capacity(count);
    let mut expected_blob_offset = 0u64;

    for pos in 0..count {
        let record = parse_record(bytes, pos);

        if record.blob_offset != expected_blob_offset {
            return Err(corrupt(format!(
                "item {} entry at blob offset {}, expected {}",
                pos, record.blob_offset, expected_blob_offset
            )));
        }

        let entry = decode_entry(blob, &record, pos)?;
        expected_blob_offset += record.blob_length as u64;

        items.push(Item {
            id: entry.id,
            name: entry.name,
            offset: record.offset,
            length: record.length,
            metadata: entry.metadata,
        });
    }

    if expected_blob_offset != header.blob_length {
        return Err(corrupt(format!(
            "entries cover {} blob bytes, header declares {}",
            expected_blob_offset, header.blob_length
        )));
    }

    validate_layout(&items, header.data_length)?;

    let index = Index::new(items).map_err(|e| match e {
        TortillaError::DuplicateItemId(id) => corrupt(format!("duplicate item id {}", id)),
        other => other,
    })?;

    Ok(index
        .with_file_format(header.file_format)
        .with_part(header.part_index, header.part_count))
}

/// Decode a single item by position, reading only its record and entry.
///
/// Validates the header but not the checksum or the other items.
pub fn decode_item_at(bytes: &[u8], position: usize) -> Result<Item> {
    let header = parse_header(bytes)?;
    let count = header.item_count as usize;
    if position >= count {
        return Err(TortillaError::IndexOutOfRange { position, len: count });
    }

    let blob_start = INDEX_HEADER_SIZE + count * RECORD_SIZE;
    let record = parse_record(bytes, position);
    let entry = decode_entry(&bytes[blob_start..], &record, position)?;

    Ok(Item {
        id: entry.id,
        name: entry.name,
        offset: record.offset,
        length: record.length,
        metadata: entry.metadata,
    })
}

/// Parse the header and check that the declared sizes match `bytes`
fn parse_header(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < INDEX_HEADER_SIZE {
        return Err(corrupt(format!(
            "footer truncated: {} bytes, header alone needs {}",
            bytes.len(),
            INDEX_HEADER_SIZE
        )));
    }

    if &bytes[0..4] != INDEX_MAGIC {
        return Err(corrupt(format!("bad footer magic {:?}", &bytes[0..4])));
    }

    let version = le_u16(&bytes[4..6]);
    if version != INDEX_VERSION {
        return Err(TortillaError::UnsupportedVersion(version));
    }

    if le_u16(&bytes[6..8]) != 0 {
        return Err(corrupt("reserved header field is not zero".to_string()));
    }

    let item_count = le_u32(&bytes[8..12]);
    let data_length = le_u64(&bytes[12..20]);
    let part_index = le_u32(&bytes[20..24]);
    let part_count = le_u32(&bytes[24..28]);
    let file_format = parse_file_format(&bytes[28..52])?;
    let blob_length = le_u64(&bytes[52..60]);
    let crc = le_u32(&bytes[60..64]);

    if part_count == 0 || part_index >= part_count {
        return Err(corrupt(format!(
            "invalid part {} of {}",
            part_index, part_count
        )));
    }

    let expected_len = (item_count as u64)
        .checked_mul(RECORD_SIZE as u64)
        .and_then(|n| n.checked_add(INDEX_HEADER_SIZE as u64))
        .and_then(|n| n.checked_add(blob_length));
    if expected_len != Some(bytes.len() as u64) {
        return Err(corrupt(format!(
            "declared {} items and {} blob bytes, but footer is {} bytes",
            item_count,
            blob_length,
            bytes.len()
        )));
    }

    Ok(Header {
        item_count,
        data_length,
        part_index,
        part_count,
        file_format,
        blob_length,
        crc,
    })
}

fn parse_file_format(raw: &[u8]) -> Result<String> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    if raw[end..].iter().any(|&b| b != 0) {
        return Err(corrupt("file format tag has bytes after NUL padding".to_string()));
    }
    String::from_utf8(raw[..end].to_vec())
        .map_err(|_| corrupt("file format tag is not UTF-8".to_string()))
}

/// Caller guarantees `pos` is below the validated item count
fn parse_record(bytes: &[u8], pos: usize) -> Record {
    let start = INDEX_HEADER_SIZE + pos * RECORD_SIZE;
    let rec = &bytes[start..start + RECORD_SIZE];
    Record {
        offset: le_u64(&rec[0..8]),
        length: le_u64(&rec[8..16]),
        blob_offset: le_u64(&rec[16..24]),
        blob_length: le_u32(&rec[24..28]),
    }
}

fn decode_entry(blob: &[u8], record: &Record, pos: usize) -> Result<Entry> {
    let start = record.blob_offset;
    let end = start.saturating_add(record.blob_length as u64);
    if end > blob.len() as u64 {
        return Err(corrupt(format!(
            "item {} entry [{}, {}) runs past blob of {} bytes",
            pos,
            start,
            end,
            blob.len()
        )));
    }
    let raw = &blob[start as usize..end as usize];

    let entry: Entry = bincode::deserialize(raw)
        .map_err(|e| corrupt(format!("item {} entry undecodable: {}", pos, e)))?;

    // Reject trailing garbage and non-canonical encodings (e.g. unsorted keys)
    let canonical = bincode::serialize(&EntryRef {
        id: &entry.id,
        name: &entry.name,
        metadata: &entry.metadata,
    })
    .map_err(|e| corrupt(format!("item {} entry not re-encodable: {}", pos, e)))?;
    if canonical != raw {
        return Err(corrupt(format!("item {} entry is not canonically encoded", pos)));
    }

    Ok(entry)
}

/// Items must sit inside the data region, not overlap, and sum to its length
fn validate_layout(items: &[Item], data_length: u64) -> Result<()> {
    for item in items {
        let end = item.offset.checked_add(item.length);
        if end.map_or(true, |end| end > data_length) {
            return Err(corrupt(format!(
                "item {} [{}, +{}) lies outside the data region of {} bytes",
                item.id, item.offset, item.length, data_length
            )));
        }
    }

    // Disjoint ranges inside the region cannot sum past it
    let mut ranges: Vec<(u64, u64)> = items
        .iter()
        .filter(|i| i.length > 0)
        .map(|i| (i.offset, i.end()))
        .collect();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        if pair[1].0 < pair[0].1 {
            return Err(corrupt(format!(
                "ranges [{}, {}) and [{}, {}) overlap",
                pair[0].0, pair[0].1, pair[1].0, pair[1].1
            )));
        }
    }

    let total = items.iter().try_fold(0u64, |acc, item| {
        acc.checked_add(item.length)
            .ok_or_else(|| corrupt("item lengths overflow u64".to_string()))
    })?;
    if total != data_length {
        return Err(corrupt(format!(
            "item lengths sum to {}, data region is {} bytes",
            total, data_length
        )));
    }

    Ok(())
}

fn corrupt(msg: String) -> TortillaError {
    TortillaError::CorruptIndex(msg)
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn le_u64(b: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&b[..8]);
    u64::from_le_bytes(buf)
}
