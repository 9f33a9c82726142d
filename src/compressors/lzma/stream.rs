//! `Read`/`Write` adapters over whole `.lzma` images.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::compressors::lzma::codecs::header_codec::LzmaHeader;
use crate::compressors::lzma::{compress, Coder, LzmaDecoder, LzmaOptions};
use crate::error::{LzmaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Compress,
    Decompress,
}

enum Inner<S> {
    /// Written bytes are held back until [`LzmaStream::finish`].
    Compress {
        sink: S,
        options: LzmaOptions,
        pending: Vec<u8>,
    },
    /// The source is decoded in full by the first read.
    Decompress {
        source: S,
        decoded: Option<Cursor<Vec<u8>>>,
    },
}

/// Wraps a byte stream to compress what is written to it, or to decompress what is read
/// from it. The other direction and seeking are unsupported.
pub struct LzmaStream<S> {
    inner: Inner<S>,
}

impl<S> LzmaStream<S> {
    /// `options` only matter when compressing.
    pub fn new(inner: S, mode: CompressionMode, options: LzmaOptions) -> Self {
        let inner = match mode {
            CompressionMode::Compress => Inner::Compress {
                sink: inner,
                options,
                pending: Vec::new(),
            },
            CompressionMode::Decompress => Inner::Decompress {
                source: inner,
                decoded: None,
            },
        };
        Self { inner }
    }

    pub fn mode(&self) -> CompressionMode {
        match self.inner {
            Inner::Compress { .. } => CompressionMode::Compress,
            Inner::Decompress { .. } => CompressionMode::Decompress,
        }
    }

    pub fn get_ref(&self) -> &S {
        match &self.inner {
            Inner::Compress { sink, .. } => sink,
            Inner::Decompress { source, .. } => source,
        }
    }
}

impl<S: Write> LzmaStream<S> {
    /// Compress everything written so far into the sink and return it. Does nothing but
    /// return the source in decompress mode.
    pub fn finish(self) -> Result<S> {
        match self.inner {
            Inner::Compress {
                mut sink,
                options,
                pending,
            } => {
                sink.write_all(&compress(&pending, &options)?)?;
                sink.flush()?;
                Ok(sink)
            }
            Inner::Decompress { source, .. } => Ok(source),
        }
    }
}

fn decode_all(mut source: impl Read) -> Result<Vec<u8>> {
    let header = LzmaHeader::read_from(&mut source)?;

    let mut decoded = Vec::new();
    LzmaDecoder::with_properties(header.properties).code(
        source,
        &mut decoded,
        None,
        header.uncompressed_size,
        None,
    )?;

    Ok(decoded)
}

impl<S: Read> Read for LzmaStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Compress { .. } => {
                Err(LzmaError::Unsupported("cannot read from a compressing stream").into())
            }
            Inner::Decompress { source, decoded } => {
                if decoded.is_none() {
                    *decoded = Some(Cursor::new(decode_all(source)?));
                }
                match decoded {
                    Some(decoded) => decoded.read(buf),
                    None => Ok(0),
                }
            }
        }
    }
}

impl<S: Write> Write for LzmaStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Compress { pending, .. } => {
                pending.extend_from_slice(buf);
                Ok(buf.len())
            }
            Inner::Decompress { .. } => {
                Err(LzmaError::Unsupported("cannot write to a decompressing stream").into())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S> Seek for LzmaStream<S> {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(LzmaError::Unsupported("lzma streams cannot seek").into())
    }
}
