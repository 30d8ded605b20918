//! Tests for the fixed-size trailer

use tortilla::format::{FORMAT_VERSION, TRAILER_MAGIC, TRAILER_SIZE};
use tortilla::{Trailer, TortillaError};

#[test]
fn test_trailer_layout() {
    let trailer = Trailer::new(3, 1000, 250);
    let bytes = trailer.encode();

    assert_eq!(bytes.len() as u64, TRAILER_SIZE);
    assert_eq!(&bytes[0..8], TRAILER_MAGIC);
    assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), FORMAT_VERSION);
    assert_eq!(u32::from_le_bytes(bytes[10..14].try_into().unwrap()), 3);
    assert_eq!(u64::from_le_bytes(bytes[14..22].try_into().unwrap()), 1000);
    assert_eq!(u64::from_le_bytes(bytes[22..30].try_into().unwrap()), 250);
}

#[test]
fn test_trailer_decode() {
    let trailer = Trailer::new(7, 4096, 512);
    let decoded = Trailer::decode(&trailer.encode()).unwrap();
    assert_eq!(decoded, trailer);
    assert_eq!(decoded.format_version, FORMAT_VERSION);
}

#[test]
fn test_trailer_bad_magic() {
    let mut bytes = Trailer::new(1, 10, 10).encode();
    bytes[0..8].copy_from_slice(b"NOTATORT");
    assert!(matches!(
        Trailer::decode(&bytes),
        Err(TortillaError::InvalidMagic(_))
    ));
}

#[test]
fn test_trailer_wrong_size() {
    let bytes = Trailer::new(1, 10, 10).encode();
    assert!(matches!(
        Trailer::decode(&bytes[..29]),
        Err(TortillaError::InvalidMagic(_))
    ));
    assert!(matches!(Trailer::decode(&[]), Err(TortillaError::InvalidMagic(_))));
}

#[test]
fn test_trailer_unsupported_version() {
    let mut bytes = Trailer::new(1, 10, 10).encode();
    bytes[8..10].copy_from_slice(&2u16.to_le_bytes());
    assert!(matches!(
        Trailer::decode(&bytes),
        Err(TortillaError::UnsupportedVersion(2))
    ));
}

#[test]
fn test_trailer_validate_against_size() {
    let trailer = Trailer::new(2, 100, 70);
    assert!(trailer.validate_against(200).is_ok());

    for size in [199, 201, 0] {
        assert!(matches!(
            trailer.validate_against(size),
            Err(TortillaError::CorruptIndex(_))
        ));
    }

    // Overflowing offsets must not wrap around
    let bogus = Trailer::new(0, u64::MAX - 5, 10);
    assert!(bogus.validate_against(30).is_err());
}
