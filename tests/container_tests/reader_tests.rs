//! Tests for LOAD and the container reader
//!
//! These tests verify:
//! - Bootstrap from local files and HTTP with a fixed number of reads,
//!   whatever the item count
//! - Lazy per-item reads, by id and by position
//! - Ordered parallel reads and chunked copies
//! - Rejection of truncated and corrupted containers

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tortilla::{Config, ContainerReader, ErrorCategory, ItemId, ItemRef, Sample, TortillaError};

use crate::common::{pattern_bytes, write_files, RangeServer};

// =============================================================================
// Helper Functions
// =============================================================================

/// Create a container of `count` items with distinct contents
fn build_container(dir: &Path, count: usize) -> (PathBuf, Vec<Vec<u8>>) {
    let contents: Vec<Vec<u8>> = (0..count)
        .map(|i| pattern_bytes(100 + i * 37, i as u8))
        .collect();
    let refs: Vec<&[u8]> = contents.iter().map(|c| c.as_slice()).collect();
    let inputs = write_files(dir, &refs);
    let samples: Vec<Sample> = inputs.into_iter().map(Sample::from).collect();

    let output = dir.join("data.tortilla");
    tortilla::create(&samples, &output, &Config::default()).unwrap();
    (output, contents)
}

fn load_err(path: &Path) -> TortillaError {
    ContainerReader::load(path.to_str().unwrap()).unwrap_err()
}

// =============================================================================
// Local Load
// =============================================================================

#[test]
fn test_load_local_matches_created_index() {
    let dir = TempDir::new().unwrap();
    let contents: Vec<Vec<u8>> = vec![b"abc".to_vec(), b"defgh".to_vec()];
    let inputs = write_files(dir.path(), &[&contents[0], &contents[1]]);
    let samples: Vec<Sample> = inputs.into_iter().map(Sample::from).collect();
    let output = dir.path().join("c.tortilla");
    let summary = tortilla::create(&samples, &output, &Config::default()).unwrap();

    let reader = tortilla::load(output.to_str().unwrap()).unwrap();
    assert_eq!(reader.index(), &summary.index);
    assert_eq!(reader.len(), 2);
    assert_eq!(reader.total_size(), summary.total_size);
    assert_eq!(reader.trailer().footer_offset, summary.footer_offset);
}

#[test]
fn test_load_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let (path, _) = build_container(dir.path(), 4);

    let first = ContainerReader::load(path.to_str().unwrap()).unwrap();
    let second = ContainerReader::load(path.to_str().unwrap()).unwrap();
    assert_eq!(first.index(), second.index());
    assert_eq!(first.trailer(), second.trailer());
}

#[test]
fn test_read_item_by_id_and_position() {
    let dir = TempDir::new().unwrap();
    let (path, contents) = build_container(dir.path(), 3);
    let reader = ContainerReader::load(path.to_str().unwrap()).unwrap();

    assert_eq!(
        reader.read_item_bytes(ItemRef::id(2u64)).unwrap().as_ref(),
        contents[2].as_slice()
    );
    assert_eq!(
        reader.read_item_bytes(ItemRef::position(1)).unwrap().as_ref(),
        contents[1].as_slice()
    );
    assert_eq!(reader.item(ItemId::Int(0)).unwrap().length, 100);
}

#[test]
fn test_read_unknown_items() {
    let dir = TempDir::new().unwrap();
    let (path, _) = build_container(dir.path(), 3);
    let reader = ContainerReader::load(path.to_str().unwrap()).unwrap();

    let err = reader.read_item_bytes(ItemRef::id("nope")).unwrap_err();
    assert!(matches!(err, TortillaError::ItemNotFound(_)));
    assert_eq!(err.category(), ErrorCategory::InvalidRequest);

    assert!(matches!(
        reader.read_item_bytes(ItemRef::position(3)),
        Err(TortillaError::IndexOutOfRange { position: 3, len: 3 })
    ));
}

#[test]
fn test_read_items_in_requested_order() {
    let dir = TempDir::new().unwrap();
    let (path, contents) = build_container(dir.path(), 6);
    let config = Config::builder().workers(4).build();
    let reader = ContainerReader::load_with_config(path.to_str().unwrap(), &config).unwrap();

    let order = [5, 0, 3, 3, 1];
    let selection: Vec<ItemRef> = order.iter().map(|&p| ItemRef::position(p)).collect();
    let items = reader.read_items(&selection).unwrap();

    assert_eq!(items.len(), order.len());
    for (bytes, &pos) in items.iter().zip(&order) {
        assert_eq!(bytes.as_ref(), contents[pos].as_slice());
    }

    assert!(reader.read_items(&[]).unwrap().is_empty());
}

#[test]
fn test_copy_item_in_chunks() {
    let dir = TempDir::new().unwrap();
    let big = pattern_bytes(50_000, 7);
    let inputs = write_files(dir.path(), &[b"head", &big]);
    let samples: Vec<Sample> = inputs.into_iter().map(Sample::from).collect();
    let output = dir.path().join("big.tortilla");
    tortilla::create(&samples, &output, &Config::default()).unwrap();

    let config = Config::builder().copy_chunk_size(1000).workers(3).build();
    let reader = ContainerReader::load_with_config(output.to_str().unwrap(), &config).unwrap();

    let mut out = Vec::new();
    let copied = reader.copy_item_to(ItemRef::position(1), &mut out).unwrap();
    assert_eq!(copied, 50_000);
    assert_eq!(out, big);
}

// =============================================================================
// Malformed Containers
// =============================================================================

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = load_err(&dir.path().join("absent.tortilla"));
    assert!(matches!(err, TortillaError::SourceNotFound(_)));
}

#[test]
fn test_load_tiny_files() {
    let dir = TempDir::new().unwrap();
    for size in [0usize, 1, 29] {
        let path = dir.path().join(format!("tiny{}.tortilla", size));
        fs::write(&path, vec![0u8; size]).unwrap();
        assert!(
            matches!(load_err(&path), TortillaError::InvalidMagic(_)),
            "{} byte file",
            size
        );
    }
}

#[test]
fn test_load_non_container() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("random.bin");
    fs::write(&path, pattern_bytes(4096, 9)).unwrap();

    let err = load_err(&path);
    assert!(matches!(err, TortillaError::InvalidMagic(_)));
    assert_eq!(err.category(), ErrorCategory::Malformed);
}

#[test]
fn test_load_corrupted_footer() {
    let dir = TempDir::new().unwrap();
    let (path, _) = build_container(dir.path(), 3);

    let mut bytes = fs::read(&path).unwrap();
    // Last footer byte sits just before the trailer
    let pos = bytes.len() - tortilla::format::TRAILER_SIZE as usize - 1;
    bytes[pos] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    assert!(matches!(load_err(&path), TortillaError::CorruptIndex(_)));
}

#[test]
fn test_load_trailer_pointing_elsewhere() {
    let dir = TempDir::new().unwrap();
    let (path, _) = build_container(dir.path(), 2);

    let mut bytes = fs::read(&path).unwrap();
    let trailer_start = bytes.len() - tortilla::format::TRAILER_SIZE as usize;
    let off = trailer_start + 14;
    let footer_offset = u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap());
    bytes[off..off + 8].copy_from_slice(&(footer_offset + 1).to_le_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(matches!(load_err(&path), TortillaError::CorruptIndex(_)));
}

#[test]
fn test_load_newer_format_version() {
    let dir = TempDir::new().unwrap();
    let (path, _) = build_container(dir.path(), 1);

    let mut bytes = fs::read(&path).unwrap();
    let version = bytes.len() - tortilla::format::TRAILER_SIZE as usize + 8;
    bytes[version..version + 2].copy_from_slice(&7u16.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(matches!(load_err(&path), TortillaError::UnsupportedVersion(7)));
}

// =============================================================================
// Remote Load
// =============================================================================

#[test]
fn test_load_remote_with_two_requests() {
    let dir = TempDir::new().unwrap();
    let (path, contents) = build_container(dir.path(), 5);
    let server = RangeServer::single("data.tortilla", fs::read(&path).unwrap());

    let reader = tortilla::load(&server.url("data.tortilla")).unwrap();
    assert_eq!(reader.len(), 5);

    // Tail (size + trailer), then footer
    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.method == "GET" && r.range.is_some()));

    // One range request per item read
    server.reset();
    for (pos, expected) in contents.iter().enumerate() {
        let bytes = reader.read_item_bytes(ItemRef::position(pos)).unwrap();
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }
    assert_eq!(server.request_count(), contents.len());

    let local = ContainerReader::load(path.to_str().unwrap()).unwrap();
    assert_eq!(reader.index(), local.index());
}

#[test]
fn test_load_remote_request_count_ignores_item_count() {
    for count in [1usize, 500] {
        let dir = TempDir::new().unwrap();
        let contents: Vec<Vec<u8>> = (0..count)
            .map(|i| pattern_bytes(16 + i % 50, i as u8))
            .collect();
        let refs: Vec<&[u8]> = contents.iter().map(|c| c.as_slice()).collect();
        let samples: Vec<Sample> = write_files(dir.path(), &refs)
            .into_iter()
            .map(Sample::from)
            .collect();
        let path = dir.path().join("data.tortilla");
        let summary = tortilla::create(&samples, &path, &Config::default()).unwrap();

        let server = RangeServer::single("data.tortilla", fs::read(&path).unwrap());
        let reader = tortilla::load(&server.url("data.tortilla")).unwrap();
        assert_eq!(reader.len(), count);

        let ranges: Vec<Option<String>> = server.requests().into_iter().map(|r| r.range).collect();
        let footer_last = summary.total_size - tortilla::format::TRAILER_SIZE - 1;
        assert_eq!(
            ranges,
            vec![
                Some("bytes=-30".to_string()),
                Some(format!("bytes={}-{}", summary.footer_offset, footer_last)),
            ],
            "{} items",
            count
        );

        let last = reader.read_item_bytes(ItemRef::position(count - 1)).unwrap();
        assert_eq!(last.as_ref(), contents[count - 1].as_slice());
    }
}

#[test]
fn test_load_remote_read_items_parallel() {
    let dir = TempDir::new().unwrap();
    let (path, contents) = build_container(dir.path(), 8);
    let server = RangeServer::single("data.tortilla", fs::read(&path).unwrap());

    let config = Config::builder().workers(4).build();
    let reader = ContainerReader::load_with_config(&server.url("data.tortilla"), &config).unwrap();

    let selection: Vec<ItemRef> = (0..8).rev().map(ItemRef::position).collect();
    let items = reader.read_items(&selection).unwrap();
    for (i, bytes) in items.iter().enumerate() {
        assert_eq!(bytes.as_ref(), contents[7 - i].as_slice());
    }
}

#[test]
fn test_load_remote_missing() {
    let server = RangeServer::single("data.tortilla", vec![0u8; 10]);
    let err = tortilla::load(&server.url("other.tortilla")).unwrap_err();
    assert!(matches!(err, TortillaError::SourceNotFound(_)));
    assert_eq!(err.category(), ErrorCategory::Unreachable);
}

#[test]
fn test_load_remote_without_range_support() {
    let dir = TempDir::new().unwrap();
    let (path, _) = build_container(dir.path(), 2);

    let mut files = std::collections::HashMap::new();
    files.insert("data.tortilla".to_string(), fs::read(&path).unwrap());
    let server = RangeServer::start_without_ranges(files);

    let err = tortilla::load(&server.url("data.tortilla")).unwrap_err();
    assert!(matches!(err, TortillaError::RangeUnsupported(_)));
}
