//! Deflate codec implementation.
//!
//! ZIP bodies use raw deflate streams (no zlib header), which is what
//! `flate2`'s `Deflate` types produce and consume.

use std::io::{self, BufReader, Read, Write};

use flate2::Compression;
use flate2::bufread::DeflateDecoder as FlateDecoder;
use flate2::write::DeflateEncoder as FlateEncoder;

use super::{Codec, Encoder, method};
use crate::Result;

/// The Deflate codec.
pub struct DeflateCodec {
    /// Compression level (0-9, default 6).
    level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl DeflateCodec {
    /// Creates a Deflate codec with the given compression level.
    ///
    /// Levels above 9 are clamped to 9.
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    /// Returns the configured compression level.
    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Codec for DeflateCodec {
    fn method(&self) -> u16 {
        method::DEFLATE
    }

    fn decoder<'r>(&self, input: Box<dyn Read + Send + 'r>) -> Result<Box<dyn Read + Send + 'r>> {
        Ok(Box::new(FlateDecoder::new(BufReader::new(input))))
    }

    fn encoder(&self) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(DeflateStreamEncoder {
            inner: FlateEncoder::new(Vec::new(), Compression::new(self.level)),
        }))
    }
}

/// Streaming encoder backing [`DeflateCodec`].
struct DeflateStreamEncoder {
    inner: FlateEncoder<Vec<u8>>,
}

impl Write for DeflateStreamEncoder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Encoder for DeflateStreamEncoder {
    fn method(&self) -> u16 {
        method::DEFLATE
    }

    fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(self.inner.get_mut())
    }

    fn finish(self: Box<Self>) -> io::Result<Vec<u8>> {
        self.inner.finish()
    }
}
