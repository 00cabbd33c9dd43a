//! Archive editing API.
//!
//! [`Updater`] opens an existing archive, mutates its live entry set in
//! memory (create, update, rename, delete, comment), and materializes the
//! result with [`Updater::save_as`] — re-streaming the raw compressed
//! bytes of every unchanged entry so nothing is decompressed and
//! recompressed that the caller did not touch. Nothing is ever written
//! back to the original source; abandoning the updater leaves no trace.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::Write;
//! use zipup::{Updater, Result};
//!
//! fn add_readme(path: &str, out: &str) -> Result<()> {
//!     let mut updater = Updater::open_path(path)?;
//!     let mut sink = updater.create("README.md")?;
//!     sink.write_all(b"# Hello\n")?;
//!     sink.finish()?;
//!     updater.save_as(std::fs::File::create(out)?)?;
//!     Ok(())
//! }
//! ```

mod updater;

pub use updater::{StagedEntryWriter, Updater};
