//! CRC-32 computation and end-of-stream verification.
//!
//! ZIP archives checksum every entry body with CRC-32 (IEEE 802.3
//! polynomial). This module provides the [`Crc32`] calculator and the
//! [`VerifyingReader`] wrapper that validates a decoded stream against the
//! checksum and size declared in the directory entry.
//!
//! # Example
//!
//! ```rust
//! use zipup::checksum::Crc32;
//!
//! let mut crc = Crc32::new();
//! crc.update(b"Hello, ");
//! crc.update(b"World!");
//! assert_eq!(crc.finalize(), 0xEC4AC3D0);
//!
//! // One-shot computation
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! ```

use std::io::{self, Read};

use crate::{Error, Result};

/// CRC-32 checksum calculator.
///
/// Uses the IEEE 802.3 polynomial, the checksum format used by ZIP entry
/// bodies.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32")
            .field("current", &self.hasher.clone().finalize())
            .finish()
    }
}

impl Crc32 {
    /// Creates a new CRC-32 calculator.
    pub fn new() -> Self {
        Self {
            hasher: crc32fast::Hasher::new(),
        }
    }

    /// Updates the checksum with additional data.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Returns the checksum of all data fed so far.
    pub fn finalize(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Resets the checksum to its initial state.
    pub fn reset(&mut self) {
        self.hasher.reset();
    }

    /// Computes the checksum of a single slice in one call.
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

/// How a [`VerifyingReader`] failed, kept so the same error can be
/// re-reported on every subsequent read.
#[derive(Debug, Clone)]
enum Failure {
    Checksum { expected: u32, actual: u32 },
    Truncated { expected: u64, actual: u64 },
}

impl Failure {
    fn to_error(&self, name: &str) -> Error {
        match *self {
            Failure::Checksum { expected, actual } => Error::ChecksumMismatch {
                name: name.to_string(),
                expected,
                actual,
            },
            Failure::Truncated { expected, actual } => Error::UnexpectedEndOfStream {
                name: name.to_string(),
                expected,
                actual,
            },
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Reading,
    Verified,
    Failed(Failure),
}

/// A reader that verifies a decoded stream against declared values.
///
/// Wraps a decoding stream together with the entry's declared CRC-32 and
/// uncompressed size. Every read feeds the returned bytes into a running
/// checksum and byte counter. When the inner stream reports end-of-stream:
///
/// - if the byte count differs from the declared size, the read fails with
///   [`Error::UnexpectedEndOfStream`];
/// - otherwise, if the declared checksum is nonzero and differs from the
///   running checksum, the read fails with [`Error::ChecksumMismatch`];
/// - otherwise the stream ends cleanly.
///
/// A declared checksum of `0` means "unknown" and skips checksum
/// verification (the size check still applies).
///
/// Once failed, the reader is poisoned: every subsequent read returns the
/// same error rather than re-attempting. Errors cross the [`Read`] boundary
/// inside [`io::Error`] and can be recovered with
/// [`Error::from_io_error`].
pub struct VerifyingReader<R> {
    inner: R,
    name: String,
    expected_crc: u32,
    expected_size: u64,
    crc: Crc32,
    bytes_read: u64,
    state: State,
}

impl<R> VerifyingReader<R> {
    /// Creates a verifying reader over `inner`.
    ///
    /// `name` is used only for error reporting.
    pub fn new(inner: R, name: impl Into<String>, expected_crc: u32, expected_size: u64) -> Self {
        Self {
            inner,
            name: name.into(),
            expected_crc,
            expected_size,
            crc: Crc32::new(),
            bytes_read: 0,
            state: State::Reading,
        }
    }

    /// Returns the number of decoded bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Checks declared size and checksum against the accumulated state.
    fn verify_at_eof(&mut self) -> Result<()> {
        if self.bytes_read != self.expected_size {
            let failure = Failure::Truncated {
                expected: self.expected_size,
                actual: self.bytes_read,
            };
            let err = failure.to_error(&self.name);
            self.state = State::Failed(failure);
            return Err(err);
        }
        let actual = self.crc.finalize();
        if self.expected_crc != 0 && actual != self.expected_crc {
            let failure = Failure::Checksum {
                expected: self.expected_crc,
                actual,
            };
            let err = failure.to_error(&self.name);
            self.state = State::Failed(failure);
            return Err(err);
        }
        self.state = State::Verified;
        Ok(())
    }
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.state {
            State::Failed(failure) => {
                return Err(failure.to_error(&self.name).into_io());
            }
            State::Verified => return Ok(0),
            State::Reading => {}
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.verify_at_eof().map_err(Error::into_io)?;
            return Ok(0);
        }
        self.crc.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}
