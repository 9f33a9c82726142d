use std::io::{self, Read, Write};

use tracing::debug;

use crate::compressors::lzma::codecs::{
    header_codec::LzmaProperties,
    length_codec::MATCH_LEN_MAX,
    lzma_stream_codec::{
        encoders::{
            instructions_fast::LZMAFastInstructionPicker,
            instructions_normal::LZMANormalInstructionPicker,
            match_finding::{bt2::BT2MatchFinder, bt4::BT4MatchFinder},
            EncodeInstruction, LZMAEncoderInput, LZMAInstructionPicker, MatchFinder,
            MAX_FORWARDS_BYTES, OPTS,
        },
        LZMACodecEncoder,
    },
    range_codec::RangeEncoder,
};
use crate::compressors::lzma::options::{CoderPropId, LzmaOptions, MatchFinderKind, PropValue};
use crate::compressors::lzma::{Coder, SetCoderProperties, WriteCoderProperties, PROGRESS_INTERVAL};
use crate::error::{LzmaError, Result};
use crate::utils::counting_io::{CountingReader, CountingWriter};

/// Smallest window the encoder sizes its tables for, however short the input.
const MIN_WINDOW: u64 = 1 << 12;

/// Encodes raw LZMA streams. The 13 byte file header is not part of the stream, see
/// [`crate::compress`] for that.
pub struct LzmaEncoder {
    options: LzmaOptions,

    /// Trailing bytes of previous data, visible to matches in the next pass.
    history: Vec<u8>,
    solid: bool,
}

impl LzmaEncoder {
    pub fn new(options: LzmaOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            history: Vec::new(),
            solid: false,
        })
    }

    pub fn options(&self) -> &LzmaOptions {
        &self.options
    }

    pub fn properties(&self) -> LzmaProperties {
        self.options.properties()
    }

    /// Preload history from a dictionary. Only the last dictionary size bytes are kept.
    ///
    /// A trained encoder is solid: every pass keeps the tail of its input as history for
    /// the next one, the same way a trained [`crate::LzmaDecoder`] keeps its window.
    pub fn train(&mut self, mut dictionary: impl Read) -> Result<bool> {
        let before = self.history.len();
        dictionary.read_to_end(&mut self.history)?;
        let trained = self.history.len() > before;

        self.trim_history();
        self.solid = true;

        debug!(bytes = self.history.len(), "trained encoder");
        Ok(trained)
    }

    fn trim_history(&mut self) {
        let dict_size = self.options.dict_size as usize;
        if self.history.len() > dict_size {
            self.history.drain(..self.history.len() - dict_size);
        }
    }
}

impl Default for LzmaEncoder {
    fn default() -> Self {
        Self {
            options: LzmaOptions::default(),
            history: Vec::new(),
            solid: false,
        }
    }
}

impl Coder for LzmaEncoder {
    fn code(
        &mut self,
        input: impl Read,
        output: impl Write,
        input_size: Option<u64>,
        _output_size: Option<u64>,
        progress: Option<&mut dyn FnMut(u64, u64)>,
    ) -> Result<()> {
        let options = &self.options;
        options.validate()?;

        let history_len = self.history.len() as u64;
        let window_dict = match input_size {
            Some(size) => {
                let needed = size.saturating_add(history_len).max(MIN_WINDOW);
                needed.min(options.dict_size as u64) as u32
            }
            None => options.dict_size,
        };

        let nice_len = options.fast_bytes;
        let depth = 16 + nice_len / 2;

        debug!(
            properties = ?options.properties(),
            algorithm = options.algorithm,
            match_finder = %options.match_finder,
            window_dict,
            input_size,
            history = history_len,
            "starting encode"
        );

        let pass = EncodePass {
            input: CountingReader::new(input.take(input_size.unwrap_or(u64::MAX))),
            output: CountingWriter::new(output),
            progress,
            options,
            window_dict,
            history: &self.history,
            keep_history: self.solid,
        };

        let history = match options.match_finder {
            MatchFinderKind::BT2 => {
                pass.with_finder(BT2MatchFinder::new(window_dict, nice_len, depth))?
            }
            MatchFinderKind::BT4 => {
                pass.with_finder(BT4MatchFinder::new(window_dict, nice_len, depth))?
            }
        };

        if self.solid {
            self.history = history;
        }

        Ok(())
    }
}

impl SetCoderProperties for LzmaEncoder {
    fn set_coder_properties(&mut self, ids: &[CoderPropId], values: &[PropValue]) -> Result<()> {
        if ids.len() != values.len() {
            return Err(LzmaError::Unsupported(
                "property ids and values differ in length",
            ));
        }

        let mut options = self.options.clone();
        for (&id, value) in ids.iter().zip(values) {
            options.set_property(id, value)?;
        }

        self.options = options;
        self.trim_history();
        Ok(())
    }
}

impl WriteCoderProperties for LzmaEncoder {
    fn write_coder_properties(&self, mut output: impl Write) -> Result<()> {
        output.write_all(&self.properties().to_bytes())?;
        Ok(())
    }
}

struct EncodePass<'p, 'f, R, W> {
    input: CountingReader<R>,
    output: CountingWriter<W>,
    progress: Option<&'f mut dyn FnMut(u64, u64)>,
    options: &'p LzmaOptions,
    window_dict: u32,
    history: &'p [u8],
    keep_history: bool,
}

impl<R: Read, W: Write> EncodePass<'_, '_, R, W> {
    fn with_finder<M: MatchFinder>(self, finder: M) -> Result<Vec<u8>> {
        let nice_len = self.options.fast_bytes;
        if self.options.algorithm == 0 {
            self.run(finder, LZMAFastInstructionPicker::new(nice_len))
        } else {
            self.run(finder, LZMANormalInstructionPicker::new(nice_len))
        }
    }

    /// Encode the whole input. Returns the history to keep for the next pass, which is
    /// empty unless the encoder is solid.
    fn run<M: MatchFinder>(
        self,
        finder: M,
        mut picker: impl LZMAInstructionPicker,
    ) -> Result<Vec<u8>> {
        let EncodePass {
            mut input,
            output,
            mut progress,
            options,
            window_dict,
            history,
            keep_history,
        } = self;

        let properties = options.properties();
        let mut codec = LZMACodecEncoder::new(&properties, options.fast_bytes, window_dict);
        let mut data = LZMAEncoderInput::new(finder, window_dict);
        let mut rc = RangeEncoder::new(output);

        load_history(&mut data, history);

        let block_start = data.pos();
        let mut position = block_start;
        let mut next_progress = PROGRESS_INTERVAL;

        let mut chunk = vec![0u8; MAX_FORWARDS_BYTES as usize];
        let mut eof = false;

        loop {
            // Keep a full plan and a maximum length match of lookahead
            while !eof && data.forward_bytes() < OPTS + MATCH_LEN_MAX as u32 {
                let free = data.available_append_bytes() as usize;
                match input.read(&mut chunk[..free]) {
                    Ok(0) => eof = true,
                    Ok(read) => data.append_data(&chunk[..read]),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => return Err(err.into()),
                }
            }

            if position == data.pos() + data.forward_bytes() as u64 {
                break;
            }

            let block_pos = position - block_start;
            let instruction = if block_pos == 0 {
                EncodeInstruction::Literal
            } else {
                if picker.needs_price_update() {
                    codec.update_prices();
                }
                picker.get_next_symbol(&mut data, &codec.price_calc(), codec.state(), block_pos)
            };

            codec.encode_instruction(&mut rc, &data, instruction, position, block_pos)?;

            position += instruction.length() as u64;
            if data.pos() < position {
                data.skip((position - data.pos()) as u32);
            }

            if position - block_start >= next_progress {
                next_progress += PROGRESS_INTERVAL;
                if let Some(report) = progress.as_mut() {
                    report(input.count(), rc.inner().count());
                }
            }
        }

        let uncompressed = position - block_start;
        if options.end_marker {
            codec.encode_end_marker(&mut rc, uncompressed)?;
        }

        let mut output = rc.finish()?;
        output.flush()?;

        if let Some(report) = progress.as_mut() {
            report(input.count(), output.count());
        }
        debug!(
            uncompressed,
            compressed = output.count(),
            end_marker = options.end_marker,
            "finished encode"
        );

        if keep_history {
            Ok(data.history(options.dict_size))
        } else {
            Ok(Vec::new())
        }
    }
}

/// Feed previous data through the match finder without encoding it.
fn load_history<M: MatchFinder>(data: &mut LZMAEncoderInput<M>, history: &[u8]) {
    let mut rest = history;
    while !rest.is_empty() || data.forward_bytes() > 0 {
        let len = rest.len().min(data.available_append_bytes() as usize);
        data.append_data(&rest[..len]);
        rest = &rest[len..];

        // Leave a match worth of lookahead so the finder sees across chunk ends
        let keep = if rest.is_empty() { 0 } else { MATCH_LEN_MAX as u32 };
        data.skip(data.forward_bytes().saturating_sub(keep));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(encoder: &mut LzmaEncoder, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encoder
            .code(data, &mut out, Some(data.len() as u64), None, None)
            .unwrap();
        out
    }

    #[test]
    fn test_empty_input_without_marker_is_just_the_flush() {
        let mut encoder = LzmaEncoder::default();
        let out = encode(&mut encoder, b"");
        assert_eq!(out, [0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_rejects_invalid_options() {
        let options = LzmaOptions::default().with_lc(9);
        assert!(matches!(
            LzmaEncoder::new(options),
            Err(LzmaError::OutOfRange { name: "lc", .. })
        ));
    }

    #[test]
    fn test_set_coder_properties_is_all_or_nothing() {
        let mut encoder = LzmaEncoder::default();

        let err = encoder
            .set_coder_properties(
                &[CoderPropId::LitContextBits, CoderPropId::PosStateBits],
                &[PropValue::U32(4), PropValue::U32(7)],
            )
            .unwrap_err();
        assert!(matches!(err, LzmaError::OutOfRange { name: "pb", .. }));
        assert_eq!(encoder.options().lc, 3);

        let err = encoder
            .set_coder_properties(&[CoderPropId::Algorithm], &[])
            .unwrap_err();
        assert!(matches!(err, LzmaError::Unsupported(_)));

        encoder
            .set_coder_properties(
                &[CoderPropId::LitContextBits, CoderPropId::DictionarySize],
                &[PropValue::U32(4), PropValue::U32(1 << 16)],
            )
            .unwrap();
        assert_eq!(encoder.options().lc, 4);
        assert_eq!(encoder.properties().dict_size, 1 << 16);
    }

    #[test]
    fn test_write_coder_properties() {
        let mut out = Vec::new();
        LzmaEncoder::default().write_coder_properties(&mut out).unwrap();
        assert_eq!(out, [0x5D, 0x00, 0x00, 0x80, 0x00]);
    }

    #[test]
    fn test_is_deterministic() {
        let data: Vec<u8> = (0..5_000u32)
            .flat_map(|i| format!("{};", i % 97 * 13).into_bytes())
            .collect();

        for algorithm in 0..=2 {
            let options = LzmaOptions::default().with_algorithm(algorithm);
            let first = encode(&mut LzmaEncoder::new(options.clone()).unwrap(), &data);
            let second = encode(&mut LzmaEncoder::new(options).unwrap(), &data);
            assert_eq!(first, second);
            assert!(first.len() < data.len());
        }
    }

    #[test]
    fn test_training_shrinks_the_output() {
        let dictionary = b"The quick brown fox jumps over the lazy dog. ".repeat(20);
        let data = b"The quick brown fox jumps over the lazy dog!";

        let plain = encode(&mut LzmaEncoder::default(), data);

        let mut trained = LzmaEncoder::default();
        assert!(trained.train(&dictionary[..]).unwrap());
        let with_history = encode(&mut trained, data);

        assert!(with_history.len() < plain.len());
    }

    #[test]
    fn test_training_keeps_only_a_dictionary_of_history() {
        let mut encoder = LzmaEncoder::new(LzmaOptions::default().with_dict_size(16)).unwrap();
        encoder.train(&b"0123456789abcdefghijklmnop"[..]).unwrap();
        assert_eq!(encoder.history, b"abcdefghijklmnop");

        assert!(!encoder.train(&b""[..]).unwrap());
    }

    #[test]
    fn test_progress_is_reported_at_the_end() {
        let data = vec![7u8; 3 << 20];
        let mut reports = Vec::new();
        let mut report = |read: u64, written: u64| reports.push((read, written));

        let mut out = Vec::new();
        LzmaEncoder::new(LzmaOptions::default().with_algorithm(0))
            .unwrap()
            .code(&data[..], &mut out, None, None, Some(&mut report))
            .unwrap();

        assert_eq!(reports.len(), 4);
        assert_eq!(reports.last(), Some(&(data.len() as u64, out.len() as u64)));
    }
}
