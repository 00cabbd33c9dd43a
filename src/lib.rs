//! # zipup
//!
//! A pure-Rust library for reading, writing, and incrementally updating
//! ZIP archives.
//!
//! The centerpiece is the [`Updater`]: open an existing archive, edit its
//! entry set in memory (create, update, rename, delete), and save the
//! result — with every untouched entry copied as raw compressed bytes, so
//! nothing is decompressed and recompressed that you did not change.
//!
//! ## Quick Start
//!
//! ### Reading an Archive
//!
//! ```rust,no_run
//! use zipup::{Archive, Result};
//!
//! fn main() -> Result<()> {
//!     let archive = Archive::open_path("archive.zip")?;
//!
//!     for entry in archive.entries() {
//!         println!("{}: {} bytes", entry.name(), entry.header().uncompressed_size);
//!     }
//!
//!     let readme = archive.read_to_vec("README.md")?;
//!     println!("{}", String::from_utf8_lossy(&readme));
//!     Ok(())
//! }
//! ```
//!
//! ### Creating an Archive
//!
//! ```rust,no_run
//! use std::io::Write;
//! use zipup::{EntryHeader, Writer, Result};
//!
//! fn main() -> Result<()> {
//!     let file = std::fs::File::create("new.zip")?;
//!     let mut writer = Writer::create(file);
//!
//!     let mut body = writer.create_entry(EntryHeader::new("hello.txt"))?;
//!     body.write_all(b"Hello, World!")?;
//!     body.finish()?;
//!
//!     let result = writer.finish()?;
//!     println!("wrote {} entries", result.entries_written);
//!     Ok(())
//! }
//! ```
//!
//! ### Editing an Archive
//!
//! ```rust,no_run
//! use std::io::Write;
//! use zipup::{Updater, Result};
//!
//! fn main() -> Result<()> {
//!     let mut updater = Updater::open_path("archive.zip")?;
//!
//!     updater.rename("notes.txt", "notes/2024.txt")?;
//!     updater.delete("stale.log")?;
//!
//!     let mut sink = updater.create("CHANGELOG.md")?;
//!     sink.write_all(b"# Changes\n")?;
//!     sink.finish()?;
//!
//!     // The original file is never modified; write the result elsewhere
//!     // and swap it in once the save succeeds.
//!     updater.save_as(std::fs::File::create("archive.new.zip")?)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate compression via `flate2` |
//!
//! Store (no compression) is always available. Other compression methods
//! can be plugged in through [`codec::CodecRegistry`].
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Stream types report failures through
//! `std::io::Error`; recover the original variant with
//! [`Error::from_io_error`]. Decoding errors are sticky: a failed entry
//! stream keeps returning the same error instead of retrying.
//!
//! ## Concurrency
//!
//! Sources implement [`section::ReadAt`], a positioned-read capability
//! with no shared cursor, so any number of entry streams can be read in
//! parallel. Mutation always goes through `&mut self` on a single
//! [`Updater`] or [`Writer`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod checksum;
pub mod codec;
pub mod edit;
pub mod error;
pub mod format;
pub mod read;
pub mod section;
pub mod timestamp;
pub mod write;

pub use error::{Error, Result};
pub use format::EntryHeader;
pub use timestamp::Timestamp;

// Re-export the reading API at the crate root for convenience.
pub use read::{Archive, Entry, EntryReader};

// Re-export the writing API at the crate root for convenience.
pub use write::{EntryWriter, WriteResult, Writer};

// Re-export the editing API at the crate root for convenience.
pub use edit::{StagedEntryWriter, Updater};
