//! Integration tests for malformed, truncated, and corrupted archives.
//!
//! The parser must reject structural damage with `MalformedArchive`, and
//! body corruption must surface through entry streams as
//! `ChecksumMismatch` or `UnexpectedEndOfStream` — never as a panic.

mod common;

use std::io::Read;

use zipup::codec::method;
use zipup::{Archive, Error, Updater};

use common::{create_archive, create_archive_with_method, expect_err};

/// Reads an entry to the end, returning the recovered crate error.
fn read_entry(archive: &Archive<Vec<u8>>, name: &str) -> zipup::Result<Vec<u8>> {
    let mut reader = archive.open_entry(name)?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data).map_err(Error::from_io_error)?;
    Ok(data)
}

// ============================================================================
// Structural damage
// ============================================================================

#[test]
fn test_empty_input() {
    let err = expect_err(Archive::open(Vec::new()));
    assert!(matches!(err, Error::MalformedArchive(_)));
}

#[test]
fn test_input_smaller_than_end_record() {
    let err = expect_err(Archive::open(b"PK\x05\x06".to_vec()));
    assert!(matches!(err, Error::MalformedArchive(_)));
}

#[test]
fn test_garbage_input() {
    let garbage: Vec<u8> = (0..4096).map(|i| (i * 31 % 251) as u8).collect();
    let err = expect_err(Archive::open(garbage));
    match err {
        Error::MalformedArchive(msg) => assert!(msg.contains("signature")),
        e => panic!("expected MalformedArchive, got: {:?}", e),
    }
}

#[test]
fn test_truncated_central_directory() {
    let bytes = create_archive(&[("a.txt", b"alpha"), ("b.txt", b"bravo")]).unwrap();
    // Cut into the central directory but keep the end record, so the
    // declared directory bounds no longer fit the source.
    let cut = bytes.len() - 60;
    let mut truncated = bytes[..cut].to_vec();
    truncated.extend_from_slice(&bytes[bytes.len() - 22..]);
    let err = expect_err(Archive::open(truncated));
    assert!(matches!(err, Error::MalformedArchive(_)));
}

#[test]
fn test_local_offset_beyond_archive() {
    let mut bytes = create_archive(&[("a.txt", b"alpha")]).unwrap();
    // Point the entry's recorded local header offset (central header
    // offset 42) far past the end of the source.
    let off_field = find_central_header(&bytes) + 42;
    bytes[off_field..off_field + 4].copy_from_slice(&0x00FF_0000u32.to_le_bytes());

    let archive = Archive::open(bytes.clone()).unwrap();
    let err = expect_err(read_entry(&archive, "a.txt"));
    assert!(matches!(err, Error::MalformedArchive(_)));

    // The updater resolves bodies eagerly and refuses to open.
    let err = expect_err(Updater::open(bytes));
    assert!(matches!(err, Error::MalformedArchive(_)));
}

#[test]
fn test_corrupted_local_header_signature() {
    let bytes = create_archive(&[("a.txt", b"alpha")]).unwrap();
    let mut corrupted = bytes;
    corrupted[0] ^= 0xFF; // first local header signature byte

    // Parsing succeeds (the central directory is intact), but resolving
    // the body through the local header fails.
    let archive = Archive::open(corrupted.clone()).unwrap();
    let err = expect_err(read_entry(&archive, "a.txt"));
    assert!(matches!(err, Error::MalformedArchive(_)));

    // The updater resolves bodies eagerly, so it refuses to open at all.
    let err = expect_err(Updater::open(corrupted));
    assert!(matches!(err, Error::MalformedArchive(_)));
}

#[test]
fn test_entry_count_beyond_directory() {
    let mut bytes = create_archive(&[("a.txt", b"alpha")]).unwrap();
    // Inflate the entry-count fields in the end record.
    let eocd = bytes.len() - 22;
    bytes[eocd + 8..eocd + 10].copy_from_slice(&500u16.to_le_bytes());
    bytes[eocd + 10..eocd + 12].copy_from_slice(&500u16.to_le_bytes());
    let err = expect_err(Archive::open(bytes));
    assert!(matches!(err, Error::MalformedArchive(_)));
}

// ============================================================================
// Body corruption
// ============================================================================

#[test]
fn test_store_body_corruption_fails_checksum() {
    let content = b"stored, checksummed content";
    let bytes = create_archive(&[("a.txt", content)]).unwrap();

    // Store bodies sit verbatim after the 30-byte header and the name.
    let body_offset = 30 + "a.txt".len();
    let mut corrupted = bytes;
    corrupted[body_offset + 3] ^= 0x01;

    let archive = Archive::open(corrupted).unwrap();
    match expect_err(read_entry(&archive, "a.txt")) {
        Error::ChecksumMismatch { name, .. } => assert_eq!(name, "a.txt"),
        e => panic!("expected ChecksumMismatch, got: {:?}", e),
    }
}

#[cfg(feature = "deflate")]
#[test]
fn test_deflate_body_corruption_fails() {
    let content: Vec<u8> = b"compressible content ".repeat(64).to_vec();
    let bytes =
        create_archive_with_method(method::DEFLATE, &[("a.txt", content.as_slice())]).unwrap();

    let body_offset = 30 + "a.txt".len();
    for flip in [0, 7, 40] {
        let mut corrupted = bytes.clone();
        corrupted[body_offset + flip] ^= 0x10;
        let archive = Archive::open(corrupted).unwrap();
        match read_entry(&archive, "a.txt") {
            // A flipped bit either breaks the deflate stream (an I/O
            // error from the decoder), changes the output (checksum), or
            // ends it early (size).
            Err(
                Error::ChecksumMismatch { .. }
                | Error::UnexpectedEndOfStream { .. }
                | Error::Io(_),
            ) => {}
            Ok(data) => assert_ne!(data, content, "corruption went unnoticed"),
            Err(e) => panic!("unexpected error kind: {:?}", e),
        }
    }
}

#[test]
fn test_declared_size_too_large_is_truncation() {
    let mut bytes = create_archive(&[("a.txt", b"abc")]).unwrap();
    // Forge the declared uncompressed size (central header offset 24)
    // upward. With Store the compressed window stays 3 bytes, so the
    // stream ends early.
    let size_field = find_central_header(&bytes) + 24;
    bytes[size_field..size_field + 4].copy_from_slice(&10u32.to_le_bytes());

    let archive = Archive::open(bytes).unwrap();
    match expect_err(read_entry(&archive, "a.txt")) {
        Error::UnexpectedEndOfStream {
            expected, actual, ..
        } => {
            assert_eq!(expected, 10);
            assert_eq!(actual, 3);
        }
        e => panic!("expected UnexpectedEndOfStream, got: {:?}", e),
    }
}

#[test]
fn test_sticky_error_on_corrupted_entry() {
    let bytes = create_archive(&[("a.txt", b"sticky test content")]).unwrap();
    let body_offset = 30 + "a.txt".len();
    let mut corrupted = bytes;
    corrupted[body_offset] ^= 0xFF;

    let archive = Archive::open(corrupted).unwrap();
    let mut reader = archive.open_entry("a.txt").unwrap();
    let mut sink = Vec::new();
    assert!(reader.read_to_end(&mut sink).is_err());

    // The stream stays failed with the same error.
    for _ in 0..2 {
        let mut buf = [0u8; 16];
        let err = Error::from_io_error(reader.read(&mut buf).unwrap_err());
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }
}

#[test]
fn test_unsupported_method_on_open_entry() {
    let mut bytes = create_archive(&[("a.txt", b"alpha")]).unwrap();
    // Rewrite the method field in both the local header (offset 8) and
    // the central directory header (offset 10) to an unregistered id.
    bytes[8..10].copy_from_slice(&77u16.to_le_bytes());
    let cd_method = find_central_header(&bytes) + 10;
    bytes[cd_method..cd_method + 2].copy_from_slice(&77u16.to_le_bytes());

    let archive = Archive::open(bytes).unwrap();
    match expect_err(archive.open_entry("a.txt")) {
        Error::UnsupportedMethod { method } => assert_eq!(method, 77),
        e => panic!("expected UnsupportedMethod, got: {:?}", e),
    }
}

#[test]
fn test_comment_containing_end_signature() {
    let mut writer = zipup::Writer::create(Vec::new());
    writer.set_comment("PK\u{5}\u{6}PK\u{5}\u{6}").unwrap();
    let (_, bytes) = writer.finish_into_inner().unwrap();
    let archive = Archive::open(bytes).unwrap();
    assert_eq!(archive.comment(), "PK\u{5}\u{6}PK\u{5}\u{6}");
}

/// Locates the first central directory header signature.
fn find_central_header(bytes: &[u8]) -> usize {
    bytes
        .windows(4)
        .position(|w| w == [0x50, 0x4B, 0x01, 0x02])
        .expect("no central directory header found")
}
