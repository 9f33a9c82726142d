use std::io::{Read, Write};

use tracing::debug;

use crate::compressors::lzma::codecs::{
    header_codec::LzmaProperties,
    lzma_stream_codec::{data_buffers::DecoderDataBuffer, LZMACodecDecoder},
    range_codec::RangeDecoder,
};
use crate::compressors::lzma::{Coder, SetDecoderProperties, PROGRESS_INTERVAL};
use crate::error::{LzmaError, Result};
use crate::utils::counting_io::{CountingReader, CountingWriter};

const MIN_WINDOW: u32 = 1 << 12;

/// Decodes raw LZMA streams, given the properties from the stream header.
///
/// After [`LzmaDecoder::train`] the decoder is solid: the window survives between calls to
/// [`Coder::code`], so each pass may refer back into the data of the previous ones.
#[derive(Default)]
pub struct LzmaDecoder {
    properties: Option<LzmaProperties>,
    window: Option<DecoderDataBuffer>,
    solid: bool,
}

impl LzmaDecoder {
    /// A decoder without properties. They have to be set before decoding.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(properties: LzmaProperties) -> Self {
        Self {
            properties: Some(properties),
            ..Self::default()
        }
    }

    pub fn properties(&self) -> Option<LzmaProperties> {
        self.properties
    }

    pub fn is_solid(&self) -> bool {
        self.solid
    }

    fn require_properties(&self) -> Result<LzmaProperties> {
        self.properties
            .ok_or(LzmaError::Unsupported("decoder properties have not been set"))
    }

    /// Preload the window with a dictionary and switch to solid decoding.
    pub fn train(&mut self, dictionary: impl Read) -> Result<bool> {
        let properties = self.require_properties()?;

        let window = match self.window.take() {
            Some(window) if self.solid => window,
            _ => DecoderDataBuffer::new(window_capacity(&properties, None)),
        };
        let window = self.window.insert(window);
        self.solid = true;

        window.train(dictionary)
    }
}

/// The window has to hold a whole dictionary, but a stream of known length never needs
/// more than its own size.
fn window_capacity(properties: &LzmaProperties, output_size: Option<u64>) -> u32 {
    let dict_size = properties.dict_size.max(1);
    match output_size {
        Some(size) => (dict_size as u64).min(size) as u32,
        None => dict_size,
    }
    .max(MIN_WINDOW)
}

impl Coder for LzmaDecoder {
    fn code(
        &mut self,
        input: impl Read,
        output: impl Write,
        input_size: Option<u64>,
        output_size: Option<u64>,
        mut progress: Option<&mut dyn FnMut(u64, u64)>,
    ) -> Result<()> {
        let properties = self.require_properties()?;
        properties.validate()?;

        let mut window = match self.window.take() {
            Some(window) if self.solid => window,
            _ => DecoderDataBuffer::new(window_capacity(&properties, output_size)),
        };
        window.start_block();

        debug!(
            ?properties,
            window = window.capacity(),
            history = window.available_history(),
            input_size,
            output_size,
            "starting decode"
        );

        let input = CountingReader::new(input.take(input_size.unwrap_or(u64::MAX)));
        let mut output = CountingWriter::new(output);

        let mut rc = RangeDecoder::new(input)?;
        let mut codec = LZMACodecDecoder::new(&properties);
        let mut next_progress = PROGRESS_INTERVAL;
        let mut end_marker = false;

        loop {
            let block_pos = window.block_pos();
            if output_size.is_some_and(|size| block_pos >= size) {
                break;
            }

            if window.must_flush() {
                window.flush(&mut output)?;
            }

            if block_pos >= next_progress {
                next_progress += PROGRESS_INTERVAL;
                if let Some(report) = progress.as_mut() {
                    report(rc.inner().count(), block_pos);
                }
            }

            let remaining = output_size.map(|size| size - block_pos);
            if codec.decode_one_packet(&mut rc, &mut window, remaining)?.is_none() {
                end_marker = true;
                break;
            }
        }

        window.flush(&mut output)?;
        output.flush()?;

        if let Some(report) = progress.as_mut() {
            report(rc.inner().count(), output.count());
        }
        debug!(
            compressed = rc.inner().count(),
            uncompressed = output.count(),
            end_marker,
            "finished decode"
        );

        if self.solid {
            self.window = Some(window);
        }

        Ok(())
    }
}

impl SetDecoderProperties for LzmaDecoder {
    fn set_decoder_properties(&mut self, properties: &[u8]) -> Result<()> {
        let properties = LzmaProperties::from_bytes(properties)?;
        properties.validate()?;

        self.properties = Some(properties);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressors::lzma::codecs::{
        lzma_stream_codec::{encoders::match_finding::Match, LZMACodecEncoder},
        range_codec::RangeEncoder,
    };

    #[test]
    fn test_code_requires_properties() {
        let mut decoder = LzmaDecoder::new();
        let mut out = Vec::new();
        let err = decoder
            .code(&[0u8; 5][..], &mut out, None, Some(0), None)
            .unwrap_err();
        assert!(matches!(err, LzmaError::Unsupported(_)));

        assert!(matches!(
            decoder.train(&b"abc"[..]),
            Err(LzmaError::Unsupported(_))
        ));
    }

    #[test]
    fn test_set_decoder_properties() {
        let mut decoder = LzmaDecoder::new();
        decoder
            .set_decoder_properties(&[0x5D, 0x00, 0x00, 0x01, 0x00])
            .unwrap();
        assert_eq!(
            decoder.properties(),
            Some(LzmaProperties {
                lc: 3,
                lp: 0,
                pb: 2,
                dict_size: 1 << 16
            })
        );

        assert!(matches!(
            decoder.set_decoder_properties(&[225, 0, 0, 0, 0]),
            Err(LzmaError::MalformedHeader(_))
        ));
        assert!(matches!(
            decoder.set_decoder_properties(&[0x5D, 0, 0]),
            Err(LzmaError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_empty_stream_with_known_size() {
        let mut decoder = LzmaDecoder::with_properties(LzmaProperties::default());
        let mut out = Vec::new();
        decoder
            .code(&[0u8; 5][..], &mut out, None, Some(0), None)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_rejects_nonzero_first_byte() {
        let mut decoder = LzmaDecoder::with_properties(LzmaProperties::default());
        let mut out = Vec::new();
        let err = decoder
            .code(&[1u8, 0, 0, 0, 0][..], &mut out, None, Some(1), None)
            .unwrap_err();
        assert!(err.is_corrupt());
    }

    /// A stream whose first packet is a match, which has nothing to refer to.
    fn stream_starting_with_a_match(distance: u32) -> Vec<u8> {
        let mut codec = LZMACodecEncoder::new(&LzmaProperties::default(), 273, 1 << 16);
        let mut rc = RangeEncoder::new(Vec::new());
        codec
            .encode_match(&mut rc, Match { distance, len: 2 }, 0)
            .unwrap();
        rc.finish().unwrap()
    }

    #[test]
    fn test_stream_starting_with_a_match_is_corrupt() {
        let stream = stream_starting_with_a_match(0);

        let mut decoder = LzmaDecoder::with_properties(LzmaProperties::default());
        let mut out = Vec::new();
        let err = decoder
            .code(&stream[..], &mut out, None, Some(10), None)
            .unwrap_err();
        assert!(matches!(err, LzmaError::CorruptStream(_)), "{:?}", err);

        // Trained history doesn't make a leading match valid
        let mut decoder = LzmaDecoder::with_properties(LzmaProperties::default());
        decoder.train(&b"abc"[..]).unwrap();
        let err = decoder
            .code(&stream[..], &mut Vec::new(), None, Some(10), None)
            .unwrap_err();
        assert!(err.is_corrupt());
    }
}
