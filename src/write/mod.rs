//! Archive writing API.
//!
//! [`Writer`] is a sequential, append-only encoder over any [`Write`]
//! sink. Entries are either streamed through a codec via the body sink
//! returned by [`Writer::create_entry`] (sizes and checksum land in a
//! trailing data descriptor), or copied verbatim with
//! [`Writer::create_raw_entry`] when the compressed bytes and their
//! header values are already known. [`Writer::finish`] emits the central
//! directory and end record, promoting fields to the zip64 layouts
//! whenever a count, size, or offset exceeds its 32-bit-safe range.
//!
//! # Example
//!
//! ```rust
//! use std::io::Write;
//! use zipup::{EntryHeader, Writer};
//!
//! # fn main() -> zipup::Result<()> {
//! let mut writer = Writer::create(Vec::new());
//! let mut body = writer.create_entry(EntryHeader::new("hello.txt"))?;
//! body.write_all(b"Hello, World!")?;
//! body.finish()?;
//! let (result, bytes) = writer.finish_into_inner()?;
//! assert_eq!(result.entries_written, 1);
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```

use std::io::{self, Read, Write};

use crate::checksum::Crc32;
use crate::codec::{CodecRegistry, Encoder};
use crate::format::records::{
    write_central_header, write_data_descriptor, write_end_records, write_local_header,
};
use crate::format::{EntryHeader, FLAG_DATA_DESCRIPTOR, MAX_VARIABLE_FIELD_LEN};
use crate::{Error, Result};

/// A write adaptor that tracks the absolute output position.
pub(crate) struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub(crate) fn position(&self) -> u64 {
        self.count
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Statistics from a completed write.
#[derive(Debug, Clone, Default)]
pub struct WriteResult {
    /// Number of entries in the archive, directories included.
    pub entries_written: usize,
    /// Total bytes of archive output, directory and end record included.
    pub bytes_written: u64,
}

/// A finalized entry waiting for the central directory.
struct PendingRecord {
    header: EntryHeader,
    local_offset: u64,
}

/// A sequential ZIP archive writer.
///
/// The writer moves through one state machine per entry: a header is
/// emitted, its body streams, the entry finalizes. Ownership enforces the
/// ordering — [`create_entry`](Self::create_entry) borrows the writer
/// mutably until the body sink is finished, and
/// [`finish`](Self::finish) consumes the writer, so entries cannot
/// interleave and the directory cannot be written twice.
pub struct Writer<W: Write> {
    sink: CountingWriter<W>,
    registry: CodecRegistry,
    directory: Vec<PendingRecord>,
    comment: String,
    aborted_entry: Option<String>,
}

impl<W: Write> Writer<W> {
    /// Creates a writer over `sink` with the built-in codecs registered.
    pub fn create(sink: W) -> Self {
        Self {
            sink: CountingWriter::new(sink),
            registry: CodecRegistry::new(),
            directory: Vec::new(),
            comment: String::new(),
            aborted_entry: None,
        }
    }

    /// Replaces the codec registry used for compressing bodies.
    pub fn with_registry(mut self, registry: CodecRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the archive-level comment written with the end record.
    ///
    /// # Errors
    ///
    /// [`Error::CommentTooLong`] if the comment exceeds 65535 bytes.
    pub fn set_comment(&mut self, comment: impl Into<String>) -> Result<()> {
        let comment = comment.into();
        if comment.len() > MAX_VARIABLE_FIELD_LEN {
            return Err(Error::CommentTooLong {
                len: comment.len(),
            });
        }
        self.comment = comment;
        Ok(())
    }

    /// Returns the archive-level comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Begins a new entry, returning the sink for its body.
    ///
    /// The header is normalized first: the UTF-8 flag is recomputed from
    /// the name and comment, and directory names force the invariant
    /// directory shape. Directory entries take a header-only record whose
    /// sink rejects non-empty writes. For files, the final sizes and
    /// checksum are unknown until the body has streamed, so the entry is
    /// flagged to use a trailing data descriptor.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedMethod`] if the method has no registered codec;
    /// [`Error::UnfinishedEntry`] if a previous body sink was abandoned.
    pub fn create_entry(&mut self, header: EntryHeader) -> Result<EntryWriter<'_, W>> {
        self.check_poisoned()?;
        if header.name.len() > MAX_VARIABLE_FIELD_LEN {
            return Err(Error::NameTooLong {
                len: header.name.len(),
            });
        }
        let mut header = header;
        header.normalize();

        // Resolve the codec before any bytes hit the sink.
        let encoder = if header.is_directory() {
            None
        } else {
            header.flags |= FLAG_DATA_DESCRIPTOR;
            header.crc32 = 0;
            header.compressed_size = 0;
            header.uncompressed_size = 0;
            Some(self.registry.encoder(header.method)?)
        };

        let local_offset = self.sink.position();
        write_local_header(&mut self.sink, &header, encoder.is_some())?;
        let body_start = self.sink.position();

        Ok(EntryWriter {
            writer: self,
            header,
            local_offset,
            body_start,
            encoder,
            crc: Crc32::new(),
            uncompressed: 0,
            finished: false,
        })
    }

    /// Writes an entry from pre-compressed bytes, trusting its header.
    ///
    /// The declared method, sizes, and checksum are written as-is and
    /// exactly `compressed_size` bytes are copied verbatim from `raw` —
    /// this is the path that preserves bit-for-bit body fidelity when
    /// reassembling unmodified entries. No codec is consulted, so the
    /// method does not need to be registered. The data descriptor flag is
    /// cleared because the sizes are known up front.
    ///
    /// # Errors
    ///
    /// [`Error::UnexpectedEndOfStream`] if `raw` runs out before
    /// `compressed_size` bytes; the writer is left poisoned in that case
    /// because its output ends mid-body.
    pub fn create_raw_entry(&mut self, header: &EntryHeader, raw: &mut dyn Read) -> Result<()> {
        self.check_poisoned()?;
        if header.name.len() > MAX_VARIABLE_FIELD_LEN {
            return Err(Error::NameTooLong {
                len: header.name.len(),
            });
        }
        let mut header = header.clone();
        header.normalize();
        header.flags &= !FLAG_DATA_DESCRIPTOR;

        let local_offset = self.sink.position();
        write_local_header(&mut self.sink, &header, false)?;
        let copied = io::copy(&mut raw.take(header.compressed_size), &mut self.sink)?;
        if copied != header.compressed_size {
            self.aborted_entry = Some(header.name.clone());
            return Err(Error::UnexpectedEndOfStream {
                name: header.name,
                expected: header.compressed_size,
                actual: copied,
            });
        }
        self.directory.push(PendingRecord {
            header,
            local_offset,
        });
        Ok(())
    }

    /// Finishes the archive and returns the write statistics.
    ///
    /// Serializes every finalized entry into the central directory,
    /// followed by the end record — in the zip64 layouts when the entry
    /// count, directory size, or directory offset exceeds its
    /// 32-bit-safe range.
    pub fn finish(self) -> Result<WriteResult> {
        self.finish_into_inner().map(|(result, _)| result)
    }

    /// Finishes the archive and returns the statistics with the sink.
    pub fn finish_into_inner(mut self) -> Result<(WriteResult, W)> {
        self.check_poisoned()?;
        let cd_offset = self.sink.position();
        for record in &self.directory {
            write_central_header(&mut self.sink, &record.header, record.local_offset)?;
        }
        let zip64_eocd_offset = self.sink.position();
        let cd_size = zip64_eocd_offset - cd_offset;
        write_end_records(
            &mut self.sink,
            self.directory.len() as u64,
            cd_size,
            cd_offset,
            zip64_eocd_offset,
            &self.comment,
        )?;
        self.sink.flush()?;

        let result = WriteResult {
            entries_written: self.directory.len(),
            bytes_written: self.sink.position(),
        };
        log::debug!(
            "finished archive: {} entries, {} bytes",
            result.entries_written,
            result.bytes_written
        );
        Ok((result, self.sink.into_inner()))
    }

    fn check_poisoned(&self) -> Result<()> {
        if let Some(name) = &self.aborted_entry {
            return Err(Error::UnfinishedEntry { name: name.clone() });
        }
        Ok(())
    }
}

/// The body sink for one streamed entry.
///
/// Uncompressed bytes written here flow through the entry's codec into
/// the archive, while a running CRC-32 and byte count accumulate over the
/// uncompressed data. Call [`finish`](Self::finish) to finalize the
/// entry; dropping the sink instead poisons the writer.
pub struct EntryWriter<'a, W: Write> {
    writer: &'a mut Writer<W>,
    header: EntryHeader,
    local_offset: u64,
    body_start: u64,
    /// `None` for directory entries, which have no body.
    encoder: Option<Box<dyn Encoder>>,
    crc: Crc32,
    uncompressed: u64,
    finished: bool,
}

impl<W: Write> std::fmt::Debug for EntryWriter<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryWriter")
            .field("header", &self.header)
            .field("local_offset", &self.local_offset)
            .field("body_start", &self.body_start)
            .field("uncompressed", &self.uncompressed)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<W: Write> EntryWriter<'_, W> {
    /// Finalizes the entry and appends it to the pending directory.
    ///
    /// For streamed files this flushes the codec tail, writes the
    /// trailing data descriptor (64-bit layout when either size exceeds
    /// the 32-bit-safe range), and records the true sizes and checksum in
    /// the header that the central directory will carry. Returns that
    /// finalized header.
    pub fn finish(mut self) -> Result<EntryHeader> {
        if let Some(encoder) = self.encoder.take() {
            let tail = encoder.finish()?;
            self.writer.sink.write_all(&tail)?;

            let compressed = self.writer.sink.position() - self.body_start;
            self.header.crc32 = self.crc.finalize();
            self.header.compressed_size = compressed;
            self.header.uncompressed_size = self.uncompressed;

            let zip64 = self.header.requires_zip64();
            write_data_descriptor(
                &mut self.writer.sink,
                self.header.crc32,
                compressed,
                self.uncompressed,
                zip64,
            )?;
        }
        self.writer.directory.push(PendingRecord {
            header: self.header.clone(),
            local_offset: self.local_offset,
        });
        self.finished = true;
        Ok(self.header.clone())
    }
}

impl<W: Write> Write for EntryWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(encoder) = self.encoder.as_mut() else {
            if buf.is_empty() {
                return Ok(0);
            }
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("write to directory entry '{}'", self.header.name),
            ));
        };
        encoder.write_all(buf)?;
        let output = encoder.take_output();
        if !output.is_empty() {
            self.writer.sink.write_all(&output)?;
        }
        self.crc.update(buf);
        self.uncompressed += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.flush()?;
            let output = encoder.take_output();
            if !output.is_empty() {
                self.writer.sink.write_all(&output)?;
            }
        }
        self.writer.sink.flush()
    }
}

impl<W: Write> Drop for EntryWriter<'_, W> {
    fn drop(&mut self) {
        if !self.finished {
            self.writer.aborted_entry = Some(self.header.name.clone());
        }
    }
}
