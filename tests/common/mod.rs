//! Shared test utilities for integration tests.
//!
//! Archive construction and verification helpers are consolidated here to
//! avoid duplication.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test
//! file compiles as a separate crate and may only use a subset of these
//! helpers.

#![allow(dead_code)]

use std::io::Write;

use rand::{Rng, SeedableRng};
use zipup::codec::method;
use zipup::{Archive, EntryHeader, Writer};

/// Creates an in-memory archive by streaming each entry through a codec.
///
/// # Arguments
///
/// * `method` - Compression method for every entry
/// * `entries` - A slice of (name, data) tuples representing files to add
pub fn create_archive_with_method(
    method: u16,
    entries: &[(&str, &[u8])],
) -> zipup::Result<Vec<u8>> {
    let mut writer = Writer::create(Vec::new());
    for (name, data) in entries {
        let mut header = EntryHeader::new(*name);
        header.method = method;
        let mut sink = writer.create_entry(header)?;
        sink.write_all(data)?;
        sink.finish()?;
    }
    let (_, bytes) = writer.finish_into_inner()?;
    Ok(bytes)
}

/// Creates an in-memory archive with the Store method.
///
/// Store keeps the compressed bytes equal to the content, which makes
/// corruption tests and size accounting deterministic.
pub fn create_archive(entries: &[(&str, &[u8])]) -> zipup::Result<Vec<u8>> {
    create_archive_with_method(method::STORE, entries)
}

/// Reads an archive and returns (name, content) pairs in directory order.
pub fn read_archive_contents(archive_bytes: &[u8]) -> zipup::Result<Vec<(String, Vec<u8>)>> {
    let archive = Archive::open(archive_bytes.to_vec())?;
    let mut contents = Vec::new();
    for entry in archive.entries() {
        let data = archive.read_to_vec(entry.name())?;
        contents.push((entry.name().to_string(), data));
    }
    Ok(contents)
}

/// Verifies that an archive holds exactly `expected` entries, in order,
/// with byte-identical decompressed content.
///
/// # Panics
///
/// Panics if the archive fails to open, an entry fails to decompress or
/// verify, the order differs, or any content differs.
pub fn verify_archive_contents(archive_bytes: &[u8], expected: &[(&str, &[u8])]) {
    let contents = read_archive_contents(archive_bytes).expect("failed to read archive back");
    let names: Vec<&str> = contents.iter().map(|(n, _)| n.as_str()).collect();
    let expected_names: Vec<&str> = expected.iter().map(|(n, _)| *n).collect();
    assert_eq!(names, expected_names, "entry names or order differ");

    for ((name, actual), (_, wanted)) in contents.iter().zip(expected) {
        assert_eq!(
            actual.as_slice(),
            *wanted,
            "content mismatch for '{}'",
            name
        );
    }
}

/// Returns `len` deterministic pseudo-random bytes.
///
/// Poorly compressible, so Deflate bodies exercise the incompressible
/// path too.
pub fn binary_fixture(len: usize) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED);
    (0..len).map(|_| rng.r#gen()).collect()
}

/// Extracts the error from a Result, panicking if it's Ok.
pub fn expect_err<T, E>(result: Result<T, E>) -> E {
    match result {
        Ok(_) => panic!("expected error but got Ok"),
        Err(e) => e,
    }
}
