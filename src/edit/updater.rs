//! In-place archive editing over a staged entry list.

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use crate::checksum::Crc32;
use crate::codec::{CodecRegistry, Encoder};
use crate::format::{EntryHeader, MAX_VARIABLE_FIELD_LEN};
use crate::read::{Archive, EntryReader, verified_stream_over};
use crate::section::ReadAt;
use crate::write::{WriteResult, Writer};
use crate::{Error, Result, Timestamp};

/// Where an entry's compressed bytes currently live.
///
/// Exactly one variant applies to an entry at any time; replacing an
/// entry swaps `Source` for `Staged` atomically with the list update.
enum BodyLocation {
    /// Bytes live in the original archive at a resolved body range.
    Source { offset: u64, length: u64 },
    /// Bytes live in a one-entry archive staged in memory by a prior
    /// create, update, or rename.
    Staged { archive: Vec<u8> },
}

/// One live entry: its metadata plus the location of its body.
struct LiveEntry {
    header: EntryHeader,
    location: BodyLocation,
}

/// An editor for an existing archive.
///
/// Opening seeds the live entry list from the central directory, in
/// directory order, with every body still backed by the original source.
/// Mutations rearrange the in-memory list and stage new bodies; only
/// [`save_as`](Self::save_as) produces output, and the original source is
/// never modified.
///
/// Mutation methods take `&mut self` and are sequential; reads through
/// [`open_entry`](Self::open_entry) take `&self` and may be issued for
/// several entries concurrently, since every returned stream owns a
/// private window over the shared source.
pub struct Updater<S> {
    archive: Archive<S>,
    live: Vec<LiveEntry>,
    comment: String,
    registry: CodecRegistry,
}

impl Updater<File> {
    /// Opens an archive file for editing.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(File::open(path)?)
    }
}

impl<S: ReadAt> Updater<S> {
    /// Opens an archive for editing with the built-in codecs registered.
    pub fn open(source: S) -> Result<Self> {
        Self::from_archive(Archive::open(source)?)
    }

    /// Opens an archive for editing with a custom codec registry.
    pub fn open_with_registry(source: S, registry: CodecRegistry) -> Result<Self> {
        Self::from_archive(Archive::open_with_registry(source, registry)?)
    }

    /// Builds an updater over an already-parsed archive.
    ///
    /// Every entry's body offset is resolved here, once, by skipping its
    /// local header; later reads and saves then address the source
    /// directly.
    pub fn from_archive(archive: Archive<S>) -> Result<Self> {
        let mut live = Vec::with_capacity(archive.len());
        for entry in archive.entries() {
            let (offset, length) = archive.body_range(entry)?;
            live.push(LiveEntry {
                header: entry.header.clone(),
                location: BodyLocation::Source { offset, length },
            });
        }
        let comment = archive.comment().to_string();
        let registry = archive.registry().clone();
        Ok(Self {
            archive,
            live,
            comment,
            registry,
        })
    }

    /// Returns the live entry headers, in save order.
    pub fn entries(&self) -> impl Iterator<Item = &EntryHeader> {
        self.live.iter().map(|e| &e.header)
    }

    /// Returns the live entry names, in save order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.live.iter().map(|e| e.header.name.as_str())
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns whether no entries are live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Returns whether an entry with this name is live.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Returns the header of the live entry with this name, if any.
    pub fn entry(&self, name: &str) -> Option<&EntryHeader> {
        self.index_of(name).map(|i| &self.live[i].header)
    }

    /// Returns the archive comment that will be written on save.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Sets the archive comment written on save.
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

    /// Opens a verified decompressing stream over a live entry's body,
    /// wherever it currently lives.
    ///
    /// # Errors
    ///
    /// [`Error::NameNotFound`] if the name is not live. Corruption
    /// surfaces through the stream's reads.
    pub fn open_entry(&self, name: &str) -> Result<EntryReader<'_>> {
        let entry = self
            .index_of(name)
            .map(|i| &self.live[i])
            .ok_or_else(|| Error::NameNotFound {
                name: name.to_string(),
            })?;
        match &entry.location {
            BodyLocation::Source { offset, length } => verified_stream_over(
                self.archive.source(),
                &self.registry,
                &entry.header,
                *offset,
                *length,
            ),
            BodyLocation::Staged { archive } => {
                let (offset, length) = staged_body_range(archive)?;
                verified_stream_over(
                    archive.as_slice(),
                    &self.registry,
                    &entry.header,
                    offset,
                    length,
                )
            }
        }
    }

    /// Reads a live entry's full decompressed content.
    pub fn read_to_vec(&self, name: &str) -> Result<Vec<u8>> {
        let mut reader = self.open_entry(name)?;
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(Error::from_io_error)?;
        Ok(data)
    }

    /// Begins a new entry, failing if the name is already live.
    ///
    /// Returns a body sink; the entry joins the live set only when the
    /// sink's [`finish`](StagedEntryWriter::finish) succeeds. An
    /// abandoned sink leaves the updater unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateName`] if the name is live.
    pub fn create(&mut self, name: &str) -> Result<StagedEntryWriter<'_, S>> {
        if self.contains(name) {
            return Err(Error::DuplicateName {
                name: name.to_string(),
            });
        }
        self.stage(name)
    }

    /// Begins a new entry, replacing any live entry with the same name.
    ///
    /// On finish, the replacement drops the old entry and appends the new
    /// one at the end of the ordering: last write wins, and the order
    /// reflects write recency.
    pub fn create_or_replace(&mut self, name: &str) -> Result<StagedEntryWriter<'_, S>> {
        self.stage(name)
    }

    /// Opens a live entry for rewriting.
    ///
    /// Returns the current content (already read and verified) together
    /// with a replacement sink that preserves the entry's method and
    /// comment, so callers can stream-copy the old content and append or
    /// modify before finishing the sink.
    ///
    /// # Errors
    ///
    /// [`Error::NameNotFound`] if the name is not live.
    pub fn update(&mut self, name: &str) -> Result<(Cursor<Vec<u8>>, StagedEntryWriter<'_, S>)> {
        let idx = self.index_of(name).ok_or_else(|| Error::NameNotFound {
            name: name.to_string(),
        })?;
        let current = self.read_to_vec(name)?;
        let (method, comment) = {
            let old = &self.live[idx].header;
            (old.method, old.comment.clone())
        };
        let mut sink = self.stage(name)?;
        sink.header.method = method;
        sink.header.comment = comment;
        Ok((Cursor::new(current), sink))
    }

    /// Renames a live entry without recompressing it.
    ///
    /// The entry's raw compressed bytes are copied into a staged body
    /// under the new name, appended at the end of the ordering, and the
    /// old name is removed. The content, method, checksum, and sizes are
    /// preserved exactly.
    ///
    /// # Errors
    ///
    /// [`Error::NameNotFound`] if `old` is not live;
    /// [`Error::DuplicateName`] if `new` is live. Either error leaves the
    /// updater unchanged.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let idx = self.index_of(old).ok_or_else(|| Error::NameNotFound {
            name: old.to_string(),
        })?;
        if self.contains(new) {
            return Err(Error::DuplicateName {
                name: new.to_string(),
            });
        }
        if new.len() > MAX_VARIABLE_FIELD_LEN {
            return Err(Error::NameTooLong { len: new.len() });
        }

        let raw = self.raw_bytes(idx)?;
        let mut header = self.live[idx].header.clone();
        header.name = new.to_string();
        let (header, staged) = build_staged(&self.registry, &header, &raw)?;

        self.live.remove(idx);
        self.live.push(LiveEntry {
            header,
            location: BodyLocation::Staged { archive: staged },
        });
        Ok(())
    }

    /// Removes a live entry.
    ///
    /// No bytes are touched; the entry simply stops being part of the
    /// live set and of any subsequent save.
    ///
    /// # Errors
    ///
    /// [`Error::NameNotFound`] if the name is not live.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let idx = self.index_of(name).ok_or_else(|| Error::NameNotFound {
            name: name.to_string(),
        })?;
        self.live.remove(idx);
        Ok(())
    }

    /// Writes the live entry set to `dest` as a fresh archive.
    ///
    /// Every live entry is re-streamed from wherever its compressed bytes
    /// currently live — a section of the original source, or a staged
    /// buffer — preserving compression method, sizes, and checksum
    /// exactly. The updater itself is not mutated: it can be saved again
    /// or discarded afterwards.
    ///
    /// On error the destination holds a partial, invalid archive; callers
    /// writing somewhere persistent should stage to a temporary location
    /// and swap it in only after this returns success.
    pub fn save_as<W: Write>(&self, dest: W) -> Result<WriteResult> {
        let mut writer = Writer::create(dest).with_registry(self.registry.clone());
        writer.set_comment(self.comment.clone())?;
        for entry in &self.live {
            match &entry.location {
                BodyLocation::Source { offset, length } => {
                    let mut section = self.archive.raw_stream(*offset, *length);
                    writer.create_raw_entry(&entry.header, &mut section)?;
                }
                BodyLocation::Staged { archive } => {
                    let mut body = staged_body_slice(archive)?;
                    writer.create_raw_entry(&entry.header, &mut body)?;
                }
            }
        }
        let result = writer.finish()?;
        log::debug!(
            "saved {} entries ({} bytes)",
            result.entries_written,
            result.bytes_written
        );
        Ok(result)
    }

    /// Drops all in-memory state without touching the original source.
    ///
    /// Equivalent to dropping the updater; provided for callers that want
    /// the abandonment to read explicitly.
    pub fn discard(self) {}

    fn index_of(&self, name: &str) -> Option<usize> {
        self.live.iter().position(|e| e.header.name == name)
    }

    /// Begins a staged entry sink for `name` with default settings.
    fn stage(&mut self, name: &str) -> Result<StagedEntryWriter<'_, S>> {
        if name.len() > MAX_VARIABLE_FIELD_LEN {
            return Err(Error::NameTooLong { len: name.len() });
        }
        let mut header = EntryHeader::new(name);
        header.modified = Timestamp::now();
        Ok(StagedEntryWriter {
            updater: self,
            header,
            encoder: None,
            body: Vec::new(),
            crc: Crc32::new(),
            uncompressed: 0,
        })
    }

    /// Reads the raw compressed bytes of a live entry.
    fn raw_bytes(&self, idx: usize) -> Result<Vec<u8>> {
        match &self.live[idx].location {
            BodyLocation::Source { offset, length } => {
                let mut section = self.archive.raw_stream(*offset, *length);
                let mut buf = Vec::with_capacity(usize::try_from(*length).unwrap_or(0));
                section.read_to_end(&mut buf)?;
                if buf.len() as u64 != *length {
                    return Err(Error::InternalInconsistency(format!(
                        "source body of '{}' shrank to {} of {} bytes",
                        self.live[idx].header.name,
                        buf.len(),
                        length
                    )));
                }
                Ok(buf)
            }
            BodyLocation::Staged { archive } => {
                let body = staged_body_slice(archive)?;
                Ok(body.to_vec())
            }
        }
    }

    fn install(&mut self, header: EntryHeader, staged: Vec<u8>) {
        if let Some(idx) = self.index_of(&header.name) {
            self.live.remove(idx);
        }
        self.live.push(LiveEntry {
            header,
            location: BodyLocation::Staged { archive: staged },
        });
    }
}

/// Resolves the body range inside a staged one-entry archive.
fn staged_body_range(staged: &[u8]) -> Result<(u64, u64)> {
    let archive = Archive::open_with_registry(staged, CodecRegistry::empty())
        .map_err(|e| Error::InternalInconsistency(format!("staged buffer unreadable: {e}")))?;
    let entry = archive
        .entries()
        .first()
        .ok_or_else(|| Error::InternalInconsistency("staged buffer holds no entry".into()))?;
    archive.body_range(entry)
}

/// Borrows the raw compressed body inside a staged one-entry archive.
fn staged_body_slice(staged: &[u8]) -> Result<&[u8]> {
    let (offset, length) = staged_body_range(staged)?;
    match offset.checked_add(length) {
        Some(end) if end <= staged.len() as u64 => {
            Ok(&staged[offset as usize..end as usize])
        }
        _ => Err(Error::InternalInconsistency(
            "staged body range out of bounds".into(),
        )),
    }
}

/// Builds a staged one-entry archive from a header and raw body bytes,
/// returning the finalized header alongside the buffer.
fn build_staged(
    registry: &CodecRegistry,
    header: &EntryHeader,
    raw_body: &[u8],
) -> Result<(EntryHeader, Vec<u8>)> {
    let mut writer =
        Writer::create(Vec::with_capacity(raw_body.len() + 128)).with_registry(registry.clone());
    writer.create_raw_entry(header, &mut &raw_body[..])?;
    let (_, staged) = writer.finish_into_inner()?;

    // Read the header back so the live list always matches the staged
    // bytes exactly.
    let finalized = {
        let archive = Archive::open_with_registry(staged.as_slice(), CodecRegistry::empty())
            .map_err(|e| Error::InternalInconsistency(format!("staged buffer unreadable: {e}")))?;
        archive
            .entries()
            .first()
            .ok_or_else(|| Error::InternalInconsistency("staged buffer holds no entry".into()))?
            .header
            .clone()
    };
    Ok((finalized, staged))
}

/// The body sink for an entry being created or replaced in an [`Updater`].
///
/// Uncompressed bytes written here stream through the entry's codec into
/// a private staging buffer. Nothing touches the updater until
/// [`finish`](Self::finish): only then does the finalized entry replace
/// any same-name entry and move to the end of the ordering. Dropping the
/// sink abandons the staged bytes and leaves the updater unchanged.
pub struct StagedEntryWriter<'u, S: ReadAt> {
    updater: &'u mut Updater<S>,
    header: EntryHeader,
    encoder: Option<Box<dyn Encoder>>,
    body: Vec<u8>,
    crc: Crc32,
    uncompressed: u64,
}

impl<S: ReadAt> StagedEntryWriter<'_, S> {
    /// Selects the compression method for this entry.
    ///
    /// Must be called before the first write.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedMethod`] if no codec is registered for
    /// `method`; [`Error::InternalInconsistency`] if bytes were already
    /// written.
    pub fn with_method(mut self, method: u16) -> Result<Self> {
        if self.encoder.is_some() {
            return Err(Error::InternalInconsistency(
                "compression method changed after body bytes were written".into(),
            ));
        }
        if !self.updater.registry.contains(method) {
            return Err(Error::UnsupportedMethod { method });
        }
        self.header.method = method;
        Ok(self)
    }

    /// Sets the entry's modification time (defaults to now).
    pub fn with_modified(mut self, modified: Timestamp) -> Self {
        self.header.modified = modified;
        self
    }

    /// Sets the entry's comment.
    ///
    /// # Errors
    ///
    /// [`Error::CommentTooLong`] if the comment exceeds 65535 bytes.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Result<Self> {
        let comment = comment.into();
        if comment.len() > MAX_VARIABLE_FIELD_LEN {
            return Err(Error::CommentTooLong {
                len: comment.len(),
            });
        }
        self.header.comment = comment;
        Ok(self)
    }

    /// Returns the entry name this sink writes.
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Finalizes the entry and installs it in the updater.
    ///
    /// Captures the compressed bytes and finalized header, replaces any
    /// live entry with the same name, and appends the entry at the end
    /// of the ordering.
    pub fn finish(mut self) -> Result<()> {
        if !self.header.is_directory() {
            // An entry with no writes still needs a well-formed empty
            // body stream for its method.
            self.encoder_mut().map_err(Error::from_io_error)?;
        }
        if let Some(encoder) = self.encoder.take() {
            self.body.extend(encoder.finish()?);
        }
        self.header.crc32 = self.crc.finalize();
        self.header.uncompressed_size = self.uncompressed;
        self.header.compressed_size = self.body.len() as u64;

        let (header, staged) = build_staged(&self.updater.registry, &self.header, &self.body)?;
        self.updater.install(header, staged);
        Ok(())
    }

    fn encoder_mut(&mut self) -> io::Result<&mut Box<dyn Encoder>> {
        if self.encoder.is_none() {
            let encoder = self
                .updater
                .registry
                .encoder(self.header.method)
                .map_err(Error::into_io)?;
            self.encoder = Some(encoder);
        }
        self.encoder.as_mut().ok_or_else(|| {
            Error::InternalInconsistency("encoder vanished after construction".into()).into_io()
        })
    }
}

impl<S: ReadAt> Write for StagedEntryWriter<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.header.is_directory() {
            if buf.is_empty() {
                return Ok(0);
            }
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("write to directory entry '{}'", self.header.name),
            ));
        }
        let encoder = self.encoder_mut()?;
        encoder.write_all(buf)?;
        let output = encoder.take_output();
        self.body.extend(output);
        self.crc.update(buf);
        self.uncompressed += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
