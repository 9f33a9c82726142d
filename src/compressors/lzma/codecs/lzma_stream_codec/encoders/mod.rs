use super::{super::length_codec::MATCH_LEN_MAX, prices::EncoderPriceCalc, state::State};

use self::match_finding::Match;
pub use self::match_finding::MatchFinder;

use super::data_buffers::EncoderDataBuffer;

pub mod instructions_fast;
pub mod instructions_normal;
pub mod match_finding;

/// How far ahead the normal picker plans. The encoder input also keeps this many bytes of
/// extra history, since encoding can lag behind the buffer head by up to this much.
pub const OPTS: u32 = 4096;

/// Lookahead kept in the encoder input: a full plan plus a maximum length match at its end,
/// twice over so that refills can happen in large chunks.
pub const MAX_FORWARDS_BYTES: u32 = 2 * (OPTS + MATCH_LEN_MAX as u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeInstruction {
    Literal,
    Match(Match),
    Rep { rep_index: usize, len: u32 },
    /// A single byte copied from rep0.
    ShortRep,
}

impl EncodeInstruction {
    pub fn length(&self) -> u32 {
        match *self {
            EncodeInstruction::Literal | EncodeInstruction::ShortRep => 1,
            EncodeInstruction::Match(match_) => match_.len,
            EncodeInstruction::Rep { len, .. } => len,
        }
    }
}

pub trait LZMAInstructionPicker {
    /// Whether the encoder should refresh its cached prices before the next call to
    /// [`Self::get_next_symbol`].
    fn needs_price_update(&self) -> bool;

    /// Returns the next symbol to encode at block position `position`, optionally
    /// progressing the data buffer forwards.
    ///
    /// The input head is never behind `position` when this is called. The encoder skips
    /// the input forwards when an instruction ends past the head.
    fn get_next_symbol(
        &mut self,
        input: &mut LZMAEncoderInput<impl MatchFinder>,
        price_calc: &EncoderPriceCalc,
        state: &State,
        position: u64,
    ) -> EncodeInstruction;
}

/// The input buffer together with the match finder indexing it. Every position the head
/// passes over is shown to the match finder exactly once.
pub struct LZMAEncoderInput<M: MatchFinder> {
    buffer: EncoderDataBuffer,

    matches: Vec<Match>,
    match_finder: M,
    matches_calculated: bool,
}

impl<M: MatchFinder> LZMAEncoderInput<M> {
    /// `window_dict` is the largest distance the match finder produces.
    pub fn new(match_finder: M, window_dict: u32) -> Self {
        Self {
            matches: Vec::new(),
            match_finder,
            matches_calculated: false,

            buffer: EncoderDataBuffer::new(window_dict + OPTS, MAX_FORWARDS_BYTES),
        }
    }

    pub fn pos(&self) -> u64 {
        self.buffer.pos()
    }

    /// The number of free bytes that could safely be appended without overwriting the dictionary
    pub fn available_append_bytes(&self) -> u32 {
        self.buffer.available_append_bytes()
    }

    /// Appends bytes to the end of the buffer. The length of the slice MUST be smaller or equal to self.available_append_bytes().
    pub fn append_data(&mut self, data: &[u8]) {
        self.buffer.append_data(data);
    }

    pub fn forward_bytes(&self) -> u32 {
        self.buffer.forwards_bytes()
    }

    /// Up to `len` bytes from right behind the head, oldest first.
    pub fn history(&self, len: u32) -> Vec<u8> {
        self.buffer.history(len)
    }

    pub fn buffer(&self) -> &EncoderDataBuffer {
        &self.buffer
    }

    pub fn increment_pos(&mut self) {
        if !self.matches_calculated {
            self.match_finder.skip_byte(&self.buffer);
        }
        self.buffer.increment_pos();
        self.matches_calculated = false;
    }

    pub fn skip(&mut self, len: u32) {
        for _ in 0..len {
            self.increment_pos();
        }
    }

    /// The matches at the head, shortest first. Cached until the head moves.
    #[inline(always)]
    pub fn calc_matches(&mut self) -> &[Match] {
        if !self.matches_calculated {
            self.match_finder
                .find_and_write_matches(&self.buffer, &mut self.matches);
            self.matches_calculated = true;
        }

        &self.matches
    }
}

#[cfg(test)]
mod tests {
    use super::match_finding::bt4::BT4MatchFinder;
    use super::*;

    #[test]
    fn test_instruction_lengths() {
        assert_eq!(EncodeInstruction::Literal.length(), 1);
        assert_eq!(EncodeInstruction::ShortRep.length(), 1);
        assert_eq!(
            EncodeInstruction::Rep {
                rep_index: 2,
                len: 17
            }
            .length(),
            17
        );
        assert_eq!(
            EncodeInstruction::Match(Match {
                distance: 100,
                len: 273
            })
            .length(),
            273
        );
    }

    #[test]
    fn test_skipped_positions_are_still_indexed() {
        let mut input = LZMAEncoderInput::new(BT4MatchFinder::new(1024, 64, 48), 1024);
        input.append_data(b"0123456789-0123456789");

        // The finder only saw the first 10 digits through skips
        input.skip(11);
        assert_eq!(
            input.calc_matches().last(),
            Some(&Match {
                distance: 10,
                len: 10
            })
        );

        // Cached until the head moves
        assert_eq!(input.calc_matches().len(), 1);
        input.increment_pos();
        assert_eq!(input.pos(), 12);
        assert_eq!(input.calc_matches().last().map(|m| m.len), Some(9));
    }
}
