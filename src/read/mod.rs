//! Archive reading API.
//!
//! [`Archive`] parses the central directory of a ZIP source and hands out
//! verified decompressing streams for its entries. The source is anything
//! implementing [`ReadAt`], so entries can be opened concurrently — every
//! stream owns a private window into the source.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipup::{Archive, Result};
//!
//! fn list(path: &str) -> Result<()> {
//!     let archive = Archive::open_path(path)?;
//!     for entry in archive.entries() {
//!         println!("{}: {} bytes", entry.name(), entry.header().uncompressed_size);
//!     }
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::checksum::VerifyingReader;
use crate::codec::CodecRegistry;
use crate::format::records::{
    parse_end_record, parse_local_header_lengths, parse_zip64_end_record, parse_zip64_locator,
    read_central_header,
};
use crate::format::{
    CENTRAL_HEADER_LEN, EOCD_LEN, EntryHeader, LOCAL_HEADER_LEN, MAX_VARIABLE_FIELD_LEN,
    ZIP64_EOCD_LEN, ZIP64_LOCATOR_LEN,
};
use crate::section::{ReadAt, SectionReader, read_fully_at};
use crate::{Error, Result};

/// One entry of a parsed archive: its metadata plus the recorded location
/// of its local header.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The entry's metadata as decoded from the central directory.
    pub header: EntryHeader,
    pub(crate) local_header_offset: u64,
}

impl Entry {
    /// Returns the entry's metadata.
    pub fn header(&self) -> &EntryHeader {
        &self.header
    }

    /// Returns the entry's name.
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Returns the offset of the entry's local header within the source.
    pub fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }
}

/// A read-only view of a ZIP archive over a random-access source.
///
/// Parsing happens once, at construction: the end-of-central-directory
/// record is located by a bounded backward scan, zip64 indirection is
/// resolved, and every central directory entry is decoded in order.
pub struct Archive<S> {
    source: S,
    size: u64,
    entries: Vec<Entry>,
    comment: String,
    registry: CodecRegistry,
}

impl<S> std::fmt::Debug for Archive<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("size", &self.size)
            .field("entries", &self.entries.len())
            .field("comment", &self.comment)
            .finish_non_exhaustive()
    }
}

impl Archive<File> {
    /// Opens an archive from a file path.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(File::open(path)?)
    }
}

impl<S: ReadAt> Archive<S> {
    /// Opens an archive with the built-in codecs registered.
    pub fn open(source: S) -> Result<Self> {
        Self::open_with_registry(source, CodecRegistry::new())
    }

    /// Opens an archive that will decode bodies with `registry`.
    pub fn open_with_registry(source: S, registry: CodecRegistry) -> Result<Self> {
        let size = source.size()?;
        if size < EOCD_LEN {
            return Err(Error::MalformedArchive(format!(
                "{size} bytes is too small to be an archive"
            )));
        }

        // The end record sits in the final EOCD_LEN + 65535 bytes, wherever
        // the trailing comment lets it.
        let tail_len = size.min(EOCD_LEN + MAX_VARIABLE_FIELD_LEN as u64);
        let tail_start = size - tail_len;
        let mut tail = vec![0u8; tail_len as usize];
        read_fully_at(&source, tail_start, &mut tail)?;

        let eocd_pos = find_end_record(&tail).ok_or_else(|| {
            Error::MalformedArchive("end of central directory signature not found".into())
        })?;
        let end = parse_end_record(&tail[eocd_pos..])?;
        let eocd_abs = tail_start + eocd_pos as u64;

        let (mut entry_count, mut cd_size, mut cd_offset) =
            (end.entry_count, end.cd_size, end.cd_offset);
        if end.has_zip64_sentinels() {
            match read_zip64_end_record(&source, eocd_abs)? {
                Some(values) => (entry_count, cd_size, cd_offset) = values,
                None => log::warn!(
                    "zip64 sentinel values present but no zip64 locator found; \
                     using 32-bit end record fields"
                ),
            }
        }

        if cd_offset
            .checked_add(cd_size)
            .is_none_or(|cd_end| cd_end > eocd_abs)
        {
            return Err(Error::MalformedArchive(format!(
                "central directory ({cd_offset}+{cd_size}) extends past the end record at {eocd_abs}"
            )));
        }
        if entry_count
            .checked_mul(CENTRAL_HEADER_LEN)
            .is_none_or(|min| min > cd_size)
        {
            return Err(Error::MalformedArchive(format!(
                "{entry_count} entries cannot fit in a {cd_size}-byte central directory"
            )));
        }

        let cd_len = usize::try_from(cd_size)
            .map_err(|_| Error::MalformedArchive("central directory too large".into()))?;
        let mut cd_buf = vec![0u8; cd_len];
        read_fully_at(&source, cd_offset, &mut cd_buf)?;

        let mut entries = Vec::with_capacity(entry_count.min(4096) as usize);
        let mut cursor: &[u8] = &cd_buf;
        for _ in 0..entry_count {
            let (header, local_header_offset) = read_central_header(&mut cursor)?;
            entries.push(Entry {
                header,
                local_header_offset,
            });
        }

        log::debug!(
            "opened archive: {} entries, central directory at {:#x}",
            entries.len(),
            cd_offset
        );
        Ok(Self {
            source,
            size,
            entries,
            comment: String::from_utf8_lossy(&end.comment).into_owned(),
            registry,
        })
    }

    /// Returns the entries in central directory order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the archive-level comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Returns the codec registry this archive decodes with.
    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Returns the first entry with the given name, if any.
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.header.name == name)
    }

    /// Opens a verified decompressing stream over an entry's body.
    ///
    /// # Errors
    ///
    /// [`Error::NameNotFound`] if no entry has this name;
    /// [`Error::UnsupportedMethod`] if the entry's compression method has
    /// no registered codec. Corruption surfaces through the stream's reads
    /// as [`Error::ChecksumMismatch`] or [`Error::UnexpectedEndOfStream`].
    pub fn open_entry(&self, name: &str) -> Result<EntryReader<'_>> {
        let entry = self.entry(name).ok_or_else(|| Error::NameNotFound {
            name: name.to_string(),
        })?;
        let (offset, length) = self.body_range(entry)?;
        verified_stream_over(&self.source, &self.registry, &entry.header, offset, length)
    }

    /// Reads an entry's full decompressed content.
    pub fn read_to_vec(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.entry(name).ok_or_else(|| Error::NameNotFound {
            name: name.to_string(),
        })?;
        let capacity = usize::try_from(entry.header.uncompressed_size).unwrap_or(0);
        let mut reader = self.open_entry(name)?;
        let mut data = Vec::with_capacity(capacity);
        reader
            .read_to_end(&mut data)
            .map_err(Error::from_io_error)?;
        Ok(data)
    }

    /// Resolves the byte range of an entry's compressed body.
    ///
    /// The local header is decoded just far enough to learn the
    /// variable-length name and extra-field sizes; the extra field length
    /// recorded locally can legitimately differ from the central
    /// directory's, so the central record alone cannot place the body.
    pub(crate) fn body_range(&self, entry: &Entry) -> Result<(u64, u64)> {
        let mut prefix = [0u8; LOCAL_HEADER_LEN as usize];
        read_fully_at(&self.source, entry.local_header_offset, &mut prefix).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::MalformedArchive(format!(
                    "local header at {:#x} extends past end of archive",
                    entry.local_header_offset
                ))
            } else {
                Error::Io(e)
            }
        })?;
        let (name_len, extra_len) = parse_local_header_lengths(&prefix)?;
        let body = entry.local_header_offset
            + LOCAL_HEADER_LEN
            + u64::from(name_len)
            + u64::from(extra_len);
        let length = entry.header.compressed_size;
        if body.checked_add(length).is_none_or(|end| end > self.size) {
            return Err(Error::MalformedArchive(format!(
                "body of '{}' extends past end of archive",
                entry.header.name
            )));
        }
        Ok((body, length))
    }

    /// Opens the raw compressed bytes of an entry, with no decoding.
    ///
    /// Used by the copy paths that must preserve exact compressed bytes.
    pub(crate) fn raw_stream(&self, offset: u64, length: u64) -> SectionReader<'_, S> {
        SectionReader::new(&self.source, offset, length)
    }

    /// Returns a reference to the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Consumes the archive and returns the underlying source.
    pub fn into_source(self) -> S {
        self.source
    }
}

/// A verified decompressing stream over one entry's body.
///
/// Reads report corruption through [`io::Error`]; recover the crate error
/// with [`Error::from_io_error`]. The error is sticky: once a read fails,
/// every later read fails identically.
pub struct EntryReader<'a> {
    inner: VerifyingReader<Box<dyn Read + Send + 'a>>,
}

impl std::fmt::Debug for EntryReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryReader").finish_non_exhaustive()
    }
}

impl Read for EntryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Builds a verified decompressing stream over `length` bytes of `source`
/// starting at `offset`.
pub(crate) fn verified_stream_over<'a, S: ReadAt + ?Sized>(
    source: &'a S,
    registry: &CodecRegistry,
    header: &EntryHeader,
    offset: u64,
    length: u64,
) -> Result<EntryReader<'a>> {
    let section = SectionReader::new(source, offset, length);
    let decoder = registry.decoder(header.method, Box::new(section))?;
    Ok(EntryReader {
        inner: VerifyingReader::new(
            decoder,
            header.name.clone(),
            header.crc32,
            header.uncompressed_size,
        ),
    })
}

/// Scans backward for the end-of-central-directory signature.
///
/// A candidate is accepted when its declared comment length fits within
/// the scanned tail, which tolerates both trailing garbage and signatures
/// that happen to appear inside the comment text.
fn find_end_record(tail: &[u8]) -> Option<usize> {
    if tail.len() < EOCD_LEN as usize {
        return None;
    }
    let mut i = tail.len() - EOCD_LEN as usize;
    loop {
        if tail[i..i + 4] == [0x50, 0x4B, 0x05, 0x06] {
            let comment_len = u16::from_le_bytes([tail[i + 20], tail[i + 21]]) as usize;
            if i + EOCD_LEN as usize + comment_len <= tail.len() {
                return Some(i);
            }
        }
        if i == 0 {
            return None;
        }
        i -= 1;
    }
}

/// Follows the zip64 locator below the end record, returning the zip64
/// `(entry_count, cd_size, cd_offset)` when present.
fn read_zip64_end_record<S: ReadAt>(source: &S, eocd_abs: u64) -> Result<Option<(u64, u64, u64)>> {
    let Some(locator_pos) = eocd_abs.checked_sub(ZIP64_LOCATOR_LEN) else {
        return Ok(None);
    };
    let mut locator = [0u8; ZIP64_LOCATOR_LEN as usize];
    read_fully_at(source, locator_pos, &mut locator)?;
    let Some(zip64_pos) = parse_zip64_locator(&locator)? else {
        return Ok(None);
    };
    if zip64_pos.checked_add(ZIP64_EOCD_LEN).is_none_or(|end| end > locator_pos) {
        return Err(Error::MalformedArchive(format!(
            "zip64 end record offset {zip64_pos:#x} is inconsistent with its locator"
        )));
    }
    let mut record = [0u8; ZIP64_EOCD_LEN as usize];
    read_fully_at(source, zip64_pos, &mut record)?;
    parse_zip64_end_record(&record).map(Some)
}
