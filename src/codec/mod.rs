//! Compression codec infrastructure.
//!
//! Archive bodies are compressed with a method identified by a numeric id
//! in each directory entry. This module provides the abstraction layer the
//! reader and writer consume: the [`Codec`] capability trait, the
//! [`Encoder`] streaming interface, and the [`CodecRegistry`] that maps a
//! method id to its codec.
//!
//! Store (method `0`) is always registered; Deflate (method `8`) is
//! registered when the `deflate` feature is enabled. Additional methods can
//! be registered by implementing [`Codec`]:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zipup::codec::CodecRegistry;
//!
//! let mut registry = CodecRegistry::new();
//! registry.register(Arc::new(MyZstdCodec::default()));
//! let archive = zipup::Archive::open_with_registry(source, registry)?;
//! ```

mod store;

#[cfg(feature = "deflate")]
mod deflate;

pub use store::StoreCodec;

#[cfg(feature = "deflate")]
pub use deflate::DeflateCodec;

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::{Error, Result};

/// Method ids for compression algorithms.
pub mod method {
    /// Store (no compression).
    pub const STORE: u16 = 0;
    /// Deflate compression.
    pub const DEFLATE: u16 = 8;

    /// Returns a human-readable name for a method id.
    pub fn name(id: u16) -> &'static str {
        match id {
            STORE => "Store",
            DEFLATE => "Deflate",
            _ => "Unknown",
        }
    }
}

/// Returns the preferred method for newly created entries.
///
/// Deflate when the `deflate` feature is enabled, Store otherwise.
pub fn default_method() -> u16 {
    #[cfg(feature = "deflate")]
    {
        method::DEFLATE
    }
    #[cfg(not(feature = "deflate"))]
    {
        method::STORE
    }
}

/// A streaming encoder that buffers compressed output until drained.
///
/// Uncompressed bytes go in through [`Write`]; compressed bytes come out
/// through [`take_output`](Self::take_output). Keeping the output inside
/// the encoder (rather than having it own the archive sink) lets one sink
/// serve many entries in sequence. Callers drain after every write, so the
/// internal buffer stays small.
pub trait Encoder: Write + Send {
    /// Returns the method id of this encoder.
    fn method(&self) -> u16;

    /// Takes the compressed bytes produced so far, leaving the internal
    /// buffer empty.
    fn take_output(&mut self) -> Vec<u8>;

    /// Flushes the stream tail and returns any remaining compressed bytes.
    fn finish(self: Box<Self>) -> io::Result<Vec<u8>>;
}

/// A compression codec keyed by its method id.
///
/// This is the capability interface through which external codecs plug in:
/// the core only ever asks "given this method id, build me a decoder or an
/// encoder over a byte stream".
pub trait Codec: Send + Sync {
    /// Returns the method id this codec implements.
    fn method(&self) -> u16;

    /// Builds a decoder that reads uncompressed bytes out of `input`.
    fn decoder<'r>(&self, input: Box<dyn Read + Send + 'r>) -> Result<Box<dyn Read + Send + 'r>>;

    /// Builds a streaming encoder.
    fn encoder(&self) -> Result<Box<dyn Encoder>>;
}

/// Maps compression method ids to codecs.
///
/// Every [`Archive`](crate::Archive), [`Writer`](crate::Writer), and
/// [`Updater`](crate::Updater) carries its own registry (cloning shares the
/// codec instances); there is no ambient global registration.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<u16, Arc<dyn Codec>>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<u16> = self.codecs.keys().copied().collect();
        methods.sort_unstable();
        f.debug_struct("CodecRegistry")
            .field("methods", &methods)
            .finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// Creates a registry with the built-in codecs registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(StoreCodec));
        #[cfg(feature = "deflate")]
        registry.register(Arc::new(DeflateCodec::default()));
        registry
    }

    /// Creates a registry with no codecs at all.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registers a codec, replacing any codec for the same method id.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.method(), codec);
    }

    /// Returns whether a codec is registered for `method`.
    pub fn contains(&self, method: u16) -> bool {
        self.codecs.contains_key(&method)
    }

    /// Builds a decoder for `method` over `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] if no codec is registered.
    pub fn decoder<'r>(
        &self,
        method: u16,
        input: Box<dyn Read + Send + 'r>,
    ) -> Result<Box<dyn Read + Send + 'r>> {
        self.lookup(method)?.decoder(input)
    }

    /// Builds an encoder for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] if no codec is registered.
    pub fn encoder(&self, method: u16) -> Result<Box<dyn Encoder>> {
        self.lookup(method)?.encoder()
    }

    fn lookup(&self, method: u16) -> Result<&Arc<dyn Codec>> {
        self.codecs
            .get(&method)
            .ok_or(Error::UnsupportedMethod { method })
    }
}
