//! Archive entry metadata.

use crate::Timestamp;
use crate::codec;

use super::{FLAG_DATA_DESCRIPTOR, FLAG_UTF8, PATH_SEPARATOR, ZIP64_SENTINEL_U32};

/// Metadata for one archive entry.
///
/// This is the logical view shared by the reader, the writer, and the
/// updater: names and sizes are full-width here, and the 32-bit on-disk
/// fields (with their zip64 promotions) are derived at encode time.
///
/// A name ending in `/` denotes a directory; directories always use Store,
/// zero sizes, and no trailing data descriptor, which the writer enforces
/// regardless of what the caller set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Entry name. Unique within a live entry set; `/`-separated.
    pub name: String,
    /// Per-entry comment.
    pub comment: String,
    /// Compression method id (see [`codec::method`]).
    pub method: u16,
    /// General purpose flag bits.
    pub flags: u16,
    /// Modification time in the legacy two-field encoding.
    pub modified: Timestamp,
    /// CRC-32 of the uncompressed body. `0` means unknown; verification is
    /// skipped for such entries.
    pub crc32: u32,
    /// Size of the compressed body in bytes.
    pub compressed_size: u64,
    /// Size of the decompressed body in bytes.
    pub uncompressed_size: u64,
}

impl EntryHeader {
    /// Creates a header with the given name and default fields: the
    /// preferred compression method, a zeroed checksum and sizes, and the
    /// earliest representable modification time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            method: codec::default_method(),
            flags: 0,
            modified: Timestamp::default(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
        }
    }

    /// Returns whether this entry is a directory (name ends in `/`).
    pub fn is_directory(&self) -> bool {
        self.name.ends_with(PATH_SEPARATOR)
    }

    /// Returns whether the entry's sizes and CRC were written in a
    /// trailing data descriptor after the body.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Returns whether the name and comment are flagged as UTF-8.
    pub fn is_utf8(&self) -> bool {
        self.flags & FLAG_UTF8 != 0
    }

    /// Returns whether either size field needs the zip64 layout.
    pub(crate) fn requires_zip64(&self) -> bool {
        self.compressed_size >= u64::from(ZIP64_SENTINEL_U32)
            || self.uncompressed_size >= u64::from(ZIP64_SENTINEL_U32)
    }

    /// Normalizes the header for encoding: recomputes the UTF-8 flag from
    /// the actual name and comment contents, and forces the invariant
    /// directory shape (Store, zero sizes, zero CRC, no descriptor).
    pub(crate) fn normalize(&mut self) {
        if needs_utf8_flag(&self.name) || needs_utf8_flag(&self.comment) {
            self.flags |= FLAG_UTF8;
        } else {
            self.flags &= !FLAG_UTF8;
        }
        if self.is_directory() {
            self.method = codec::method::STORE;
            self.flags &= !FLAG_DATA_DESCRIPTOR;
            self.crc32 = 0;
            self.compressed_size = 0;
            self.uncompressed_size = 0;
        }
    }
}

/// Returns whether a string needs the UTF-8 flag when stored in a header.
///
/// Anything outside the printable ASCII subset that legacy decoders agree
/// on (0x20..=0x7D, excluding backslash) gets the flag.
fn needs_utf8_flag(s: &str) -> bool {
    s.chars()
        .any(|c| !('\u{20}'..='\u{7d}').contains(&c) || c == '\\')
}
