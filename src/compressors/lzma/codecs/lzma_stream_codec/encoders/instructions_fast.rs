use crate::compressors::lzma::codecs::{
    length_codec::{MATCH_LEN_MAX, MATCH_LEN_MIN},
    lzma_stream_codec::{prices::EncoderPriceCalc, state::State},
};

use super::{
    match_finding::{Match, MatchFinder},
    EncodeInstruction, LZMAEncoderInput, LZMAInstructionPicker,
};

const MATCH_LEN_MIN_U32: u32 = MATCH_LEN_MIN as u32;

/// Greedy parser with one byte of lookahead. It never looks at prices, it prefers long
/// matches and cheap looking distances.
pub struct LZMAFastInstructionPicker {
    nice_len: u32,
}

impl LZMAFastInstructionPicker {
    pub fn new(nice_len: u32) -> Self {
        Self { nice_len }
    }
}

/// Whether `small_dist` is so much shorter than `big_dist` that it's worth giving up a
/// byte of match length for it.
fn is_distance_sufficiently_shorter(small_dist: u32, big_dist: u32) -> bool {
    small_dist < big_dist >> 7
}

impl LZMAInstructionPicker for LZMAFastInstructionPicker {
    fn needs_price_update(&self) -> bool {
        false
    }

    fn get_next_symbol(
        &mut self,
        input: &mut LZMAEncoderInput<impl MatchFinder>,
        _price_calc: &EncoderPriceCalc,
        state: &State,
        _position: u64,
    ) -> EncodeInstruction {
        let avail = input.forward_bytes().min(MATCH_LEN_MAX as u32);
        if avail < MATCH_LEN_MIN_U32 {
            return EncodeInstruction::Literal;
        }

        let mut best_rep_len = 0;
        let mut best_rep_index = 0;
        for (rep_index, &rep) in state.reps().iter().enumerate() {
            let len = input.buffer().get_match_length(0, rep, avail);
            if len < MATCH_LEN_MIN_U32 {
                continue;
            }

            if len >= self.nice_len {
                return EncodeInstruction::Rep { rep_index, len };
            }

            if len > best_rep_len {
                best_rep_index = rep_index;
                best_rep_len = len;
            }
        }

        let mut main_len = 0;
        let mut main_dist = 0;

        let matches = input.calc_matches();
        if let Some(&main) = matches.last() {
            if main.len >= self.nice_len {
                return EncodeInstruction::Match(main);
            }

            main_len = main.len;
            main_dist = main.distance;

            // Step down to a one byte shorter match if its distance is far smaller
            for m in matches[..matches.len() - 1].iter().rev() {
                if main_len != m.len + 1 || !is_distance_sufficiently_shorter(m.distance, main_dist) {
                    break;
                }
                main_len = m.len;
                main_dist = m.distance;
            }

            // A 2 byte match this far away costs more than the literals
            if main_len == MATCH_LEN_MIN_U32 && main_dist >= 0x80 {
                main_len = 1;
            }
        }

        if best_rep_len >= MATCH_LEN_MIN_U32
            && (best_rep_len + 1 >= main_len
                || (best_rep_len + 2 >= main_len && main_dist >= (1 << 9))
                || (best_rep_len + 3 >= main_len && main_dist >= (1 << 15)))
        {
            return EncodeInstruction::Rep {
                rep_index: best_rep_index,
                len: best_rep_len,
            };
        }

        if main_len < MATCH_LEN_MIN_U32 || avail <= MATCH_LEN_MIN_U32 {
            return EncodeInstruction::Literal;
        }

        // If the next position starts a better match, encode this byte as a literal
        input.increment_pos();
        if let Some(&next) = input.calc_matches().last() {
            if (next.len >= main_len && next.distance < main_dist)
                || (next.len == main_len + 1
                    && !is_distance_sufficiently_shorter(main_dist, next.distance))
                || next.len > main_len + 1
                || (next.len + 1 >= main_len
                    && main_len >= MATCH_LEN_MIN_U32 + 1
                    && is_distance_sufficiently_shorter(next.distance, main_dist))
            {
                return EncodeInstruction::Literal;
            }
        }

        // Same for a rep match from the next position
        let limit = (main_len - 1).max(MATCH_LEN_MIN_U32);
        if state
            .reps()
            .iter()
            .any(|&rep| input.buffer().get_match_length(0, rep, limit) == limit)
        {
            return EncodeInstruction::Literal;
        }

        EncodeInstruction::Match(Match {
            len: main_len,
            distance: main_dist,
        })
    }
}
