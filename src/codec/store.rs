//! Store codec (no compression).

use std::io::{self, Read, Write};

use super::{Codec, Encoder, method};
use crate::Result;

/// The Store codec: bytes pass through unchanged in both directions.
pub struct StoreCodec;

impl Codec for StoreCodec {
    fn method(&self) -> u16 {
        method::STORE
    }

    fn decoder<'r>(&self, input: Box<dyn Read + Send + 'r>) -> Result<Box<dyn Read + Send + 'r>> {
        Ok(input)
    }

    fn encoder(&self) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(StoreEncoder::default()))
    }
}

/// Passthrough encoder backing [`StoreCodec`].
#[derive(Default)]
struct StoreEncoder {
    output: Vec<u8>,
}

impl Write for StoreEncoder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Encoder for StoreEncoder {
    fn method(&self) -> u16 {
        method::STORE
    }

    fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    fn finish(mut self: Box<Self>) -> io::Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.output))
    }
}
