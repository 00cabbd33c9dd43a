//! Error types for ZIP archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when working with ZIP archives, along with a convenient
//! [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. You can
//! handle errors using pattern matching or the `?` operator:
//!
//! ```rust,no_run
//! use zipup::{Updater, Result};
//!
//! fn remove_entry(path: &str, name: &str, out: &str) -> Result<()> {
//!     let mut updater = Updater::open_path(path)?;
//!     updater.delete(name)?;
//!     updater.save_as(std::fs::File::create(out)?)?;
//!     Ok(())
//! }
//! ```
//!
//! For fine-grained handling, match on specific variants:
//!
//! ```rust,no_run
//! use zipup::{Archive, Error};
//!
//! fn describe_failure(path: &str) {
//!     match Archive::open_path(path) {
//!         Ok(archive) => println!("{} entries", archive.len()),
//!         Err(Error::Io(e)) => eprintln!("I/O error: {}", e),
//!         Err(Error::MalformedArchive(msg)) => eprintln!("not a valid ZIP file: {}", msg),
//!         Err(e) => eprintln!("error: {}", e),
//!     }
//! }
//! ```

use std::io;

/// The main error type for ZIP archive operations.
///
/// This enum represents all possible errors that can occur when reading,
/// writing, or editing ZIP archives. Each variant includes enough context
/// to diagnose the issue.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | File system operations |
/// | Format | [`MalformedArchive`][Self::MalformedArchive] | Invalid archive data |
/// | Compatibility | [`UnsupportedMethod`][Self::UnsupportedMethod] | Unregistered codec |
/// | Integrity | [`ChecksumMismatch`][Self::ChecksumMismatch], [`UnexpectedEndOfStream`][Self::UnexpectedEndOfStream] | Data corruption |
/// | Editing | [`NameNotFound`][Self::NameNotFound], [`DuplicateName`][Self::DuplicateName] | Invalid mutation |
/// | Bug guard | [`InternalInconsistency`][Self::InternalInconsistency] | Library defect |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading or writing archive data.
    ///
    /// This wraps [`std::io::Error`]. Common causes include missing files,
    /// permission problems, and short reads from truncated sources.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive structure is invalid or not recognized.
    ///
    /// Returned when the end-of-central-directory signature cannot be
    /// located, a record carries the wrong signature, or declared counts,
    /// sizes, and offsets are inconsistent with the size of the source.
    /// The string describes what was expected versus found.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// The entry uses a compression method with no registered codec.
    ///
    /// Method `0` (Store) is always available; method `8` (Deflate) is
    /// available when the `deflate` feature is enabled. Other methods must
    /// be registered on the [`CodecRegistry`] in use.
    ///
    /// [`CodecRegistry`]: crate::codec::CodecRegistry
    #[error("unsupported compression method {method}")]
    UnsupportedMethod {
        /// The method id that has no registered codec.
        method: u16,
    },

    /// The CRC-32 of the decompressed body does not match the declared value.
    ///
    /// This indicates the compressed data was corrupted, or the directory
    /// entry declares the wrong checksum. A declared checksum of `0` is
    /// treated as "unknown" and skips this verification entirely.
    #[error("CRC-32 mismatch for '{name}': expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// The name of the entry that failed verification.
        name: String,
        /// The checksum declared in the directory entry.
        expected: u32,
        /// The checksum computed over the decompressed body.
        actual: u32,
    },

    /// The decompressed body ended at a different size than declared.
    ///
    /// Either the compressed data was truncated or the directory entry
    /// declares the wrong uncompressed size.
    #[error("unexpected end of stream for '{name}': declared {expected} bytes, got {actual}")]
    UnexpectedEndOfStream {
        /// The name of the entry that failed verification.
        name: String,
        /// The uncompressed size declared in the directory entry.
        expected: u64,
        /// The number of bytes actually produced by the decoder.
        actual: u64,
    },

    /// No live entry with the given name exists.
    ///
    /// Returned by editing operations that target an existing entry
    /// (`open_entry`, `update`, `rename`, `delete`).
    #[error("entry not found: {name}")]
    NameNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// An entry with the given name already exists.
    ///
    /// Returned by strict `create` and by `rename` when the target name is
    /// already live. Use `create_or_replace` for overwrite semantics.
    #[error("entry already exists: {name}")]
    DuplicateName {
        /// The name that collided.
        name: String,
    },

    /// An entry the in-memory index claims exists could not be located in
    /// its backing store.
    ///
    /// This is a bug guard, not a user error: it means the library's own
    /// bookkeeping disagrees with the bytes it staged or indexed.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// An entry body sink was dropped before being finished.
    ///
    /// The writer's output is left mid-body and cannot form a valid
    /// archive, so `finish` refuses to emit the central directory.
    #[error("entry body for '{name}' was not finished")]
    UnfinishedEntry {
        /// The name of the entry whose sink was abandoned.
        name: String,
    },

    /// A comment exceeds the 65535-byte limit of its length field.
    #[error("comment too long: {len} bytes (maximum 65535)")]
    CommentTooLong {
        /// The byte length of the rejected comment.
        len: usize,
    },

    /// An entry name exceeds the 65535-byte limit of its length field.
    #[error("entry name too long: {len} bytes (maximum 65535)")]
    NameTooLong {
        /// The byte length of the rejected name.
        len: usize,
    },
}

/// A specialized `Result` type for ZIP archive operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps this error in an [`io::Error`] so it can cross a
    /// [`Read`](std::io::Read)/[`Write`](std::io::Write) boundary.
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::other(self)
    }

    /// Recovers an [`Error`] smuggled through an [`io::Error`] by a
    /// `Read`/`Write` implementation in this crate.
    ///
    /// Stream types such as the verified entry readers must report
    /// failures through `io::Error`. When such an error is bubbled up by
    /// `read_to_end` or `io::copy`, this function restores the original
    /// variant; any genuinely foreign `io::Error` is wrapped in
    /// [`Error::Io`].
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut data = Vec::new();
    /// if let Err(e) = reader.read_to_end(&mut data) {
    ///     return Err(Error::from_io_error(e));
    /// }
    /// ```
    pub fn from_io_error(err: io::Error) -> Self {
        let is_ours = err.get_ref().is_some_and(|inner| inner.is::<Error>());
        if !is_ours {
            return Error::Io(err);
        }
        match err.into_inner() {
            Some(boxed) => match boxed.downcast::<Error>() {
                Ok(e) => *e,
                Err(other) => Error::Io(io::Error::other(other)),
            },
            None => Error::InternalInconsistency("io error payload vanished".into()),
        }
    }
}
