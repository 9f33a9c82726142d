//! The LZMA codec: raw stream encoder and decoder, their configuration, and helpers for the
//! 13 byte `.lzma` file format.

use std::io::{Read, Write};

use crate::error::Result;

use self::codecs::header_codec::{LzmaHeader, HEADER_SIZE};

pub mod codecs;
pub mod decoder;
pub mod encoder;
pub mod options;
pub mod stream;

pub use self::decoder::LzmaDecoder;
pub use self::encoder::LzmaEncoder;
pub use self::options::{CoderPropId, LzmaOptions, MatchFinderKind, PropValue};

/// How much uncompressed data passes between two progress reports.
pub const PROGRESS_INTERVAL: u64 = 1 << 20;

/// A single pass of encoding or decoding from `input` to `output`.
pub trait Coder {
    /// `input_size` limits how many bytes are read from `input`, `output_size` is the
    /// number of bytes to produce. `None` means unknown.
    ///
    /// `progress` receives the bytes read and written so far, every
    /// [`PROGRESS_INTERVAL`] bytes of uncompressed data and once at the end.
    fn code(
        &mut self,
        input: impl Read,
        output: impl Write,
        input_size: Option<u64>,
        output_size: Option<u64>,
        progress: Option<&mut dyn FnMut(u64, u64)>,
    ) -> Result<()>;
}

pub trait SetCoderProperties {
    /// Apply the properties pairwise. Either all of them are applied or none are.
    fn set_coder_properties(&mut self, ids: &[CoderPropId], values: &[PropValue]) -> Result<()>;
}

pub trait WriteCoderProperties {
    /// Write the 5 properties bytes.
    fn write_coder_properties(&self, output: impl Write) -> Result<()>;
}

pub trait SetDecoderProperties {
    fn set_decoder_properties(&mut self, properties: &[u8]) -> Result<()>;
}

/// Compress `data` into a complete `.lzma` image, header included.
///
/// The header declares the size of `data`, or an unknown size when `options` ask for an
/// end marker.
pub fn compress(data: &[u8], options: &LzmaOptions) -> Result<Vec<u8>> {
    let mut encoder = LzmaEncoder::new(options.clone())?;

    let header = LzmaHeader {
        properties: encoder.properties(),
        uncompressed_size: (!options.end_marker).then_some(data.len() as u64),
    };

    let mut output = Vec::with_capacity(HEADER_SIZE + data.len() / 2);
    header.write_to(&mut output)?;
    encoder.code(data, &mut output, Some(data.len() as u64), None, None)?;

    Ok(output)
}

/// Decompress a complete `.lzma` image.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut input = data;
    let header = LzmaHeader::read_from(&mut input)?;

    // The declared size is untrusted, don't let it reserve more than a bounded guess
    let reserve = header
        .uncompressed_size
        .unwrap_or(0)
        .min(input.len() as u64 * 16) as usize;
    let mut output = Vec::with_capacity(reserve);

    let mut decoder = LzmaDecoder::with_properties(header.properties);
    decoder.code(input, &mut output, None, header.uncompressed_size, None)?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LzmaError;

    #[test]
    fn test_compress_writes_the_header() {
        let compressed = compress(b"hello hello hello", &LzmaOptions::default()).unwrap();
        assert_eq!(&compressed[..5], &[0x5D, 0x00, 0x00, 0x80, 0x00]);
        assert_eq!(&compressed[5..13], &17u64.to_le_bytes());

        let with_marker =
            compress(b"hello", &LzmaOptions::default().with_end_marker(true)).unwrap();
        assert_eq!(&with_marker[5..13], &[0xFF; 8]);
    }

    #[test]
    fn test_round_trip() {
        let data = b"round and round and round it goes";
        let compressed = compress(data, &LzmaOptions::default()).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_short_image_is_malformed() {
        let err = decompress(&[0x5D, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, LzmaError::MalformedHeader(_)));
        assert_eq!(
            err.to_string(),
            "malformed header: input .lzma is too short"
        );
    }
}
