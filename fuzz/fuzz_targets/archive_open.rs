//! Fuzz target for Archive::open with arbitrary byte input.
//!
//! This target exercises the end-record scan, zip64 resolution, and
//! central directory decoding with potentially malformed or adversarial
//! input. The goal is to find panics, hangs, or memory issues in the
//! parsing logic.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    // Attempt to open arbitrary bytes as an archive; only panics matter.
    let Ok(archive) = zipup::Archive::open(data.to_vec()) else {
        return;
    };

    // If parsing succeeded, exercise body resolution and decoding too.
    for entry in archive.entries() {
        let _ = entry.header().is_directory();
        let _ = entry.header().modified.to_system_time();
        if let Ok(mut reader) = archive.open_entry(entry.name()) {
            let mut sink = [0u8; 4096];
            // Bounded read; fuzz inputs are small but decoders could loop.
            for _ in 0..64 {
                match reader.read(&mut sink) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    }
});
