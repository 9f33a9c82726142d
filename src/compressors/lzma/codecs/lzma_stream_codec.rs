pub mod data_buffers;
pub mod encoders;
pub mod prices;
pub mod state;

use std::io::{Read, Write};

use tracing::{trace, warn};

use crate::error::{LzmaError, Result};

use self::{
    data_buffers::DecoderDataBuffer,
    encoders::{match_finding::Match, EncodeInstruction, LZMAEncoderInput, MatchFinder},
    prices::{EncoderPriceCalc, LZMAEncoderData},
    state::{State, STATES},
};

use super::{
    bit_tree_codec::{decode_reverse_bits, encode_reverse_bits, BitTreeCodec},
    header_codec::LzmaProperties,
    length_codec::{LengthCodecDecoder, LengthCodecEncoder, MATCH_LEN_MIN, POS_STATES_MAX},
    literals_codec::{LiteralCodecDecoder, LiteralCodecEncoder},
    range_codec::{RangeDecoder, RangeEncProbability, RangeEncoder},
};

const DIST_STATES: usize = 4;
const DIST_SLOTS: usize = 1 << 6;
const DIST_MODEL_START: u32 = 4;
const DIST_MODEL_END: u32 = 14;
const FULL_DISTANCES: usize = 1 << (DIST_MODEL_END / 2);
/// Slot 4's tree starts at offset 0 and trees are indexed from 1, so index 0 stays unused.
const DIST_SPECIAL_SIZE: usize = FULL_DISTANCES - DIST_MODEL_END as usize + 1;

const ALIGN_BITS: u32 = 4;
const ALIGN_SIZE: usize = 1 << ALIGN_BITS;
const ALIGN_MASK: u32 = ALIGN_SIZE as u32 - 1;

/// Distance used by the end of stream marker.
pub const END_MARKER_DISTANCE: u32 = u32::MAX;

/// The slot a match length selects its distance slot tree with.
fn get_dist_state(len: u32) -> usize {
    (len as usize - MATCH_LEN_MIN).min(DIST_STATES - 1)
}

/// Distances 0-3 have their own slots, after that each power of two is split into two slots.
fn get_dist_slot(dist: u32) -> u32 {
    if dist < DIST_MODEL_START {
        return dist;
    }

    let top_bit = 31 - dist.leading_zeros();
    (top_bit << 1) | ((dist >> (top_bit - 1)) & 1)
}

/// Footer bit count and distance base of a slot at or above DIST_MODEL_START.
fn get_dist_slot_base(dist_slot: u32) -> (u32, u32) {
    let footer_bits = (dist_slot >> 1) - 1;
    (footer_bits, (2 | (dist_slot & 1)) << footer_bits)
}

/// Offset of a slot's reverse bit tree inside `dist_special_probs`. Trees are indexed from 1.
fn get_dist_special_offset(dist_slot: u32, base: u32) -> usize {
    (base - dist_slot) as usize
}

/// All the adaptive probabilities shared by the encoder and decoder, apart from the
/// literal and length coders.
pub struct LZMACodec {
    pos_mask: u32,

    is_match_probs: [[RangeEncProbability; POS_STATES_MAX]; STATES],
    is_rep_probs: [RangeEncProbability; STATES],
    is_rep0_probs: [RangeEncProbability; STATES],
    is_rep1_probs: [RangeEncProbability; STATES],
    is_rep2_probs: [RangeEncProbability; STATES],
    is_rep0_long_probs: [[RangeEncProbability; POS_STATES_MAX]; STATES],

    dist_slot_probs: [BitTreeCodec<DIST_SLOTS>; DIST_STATES],
    /// The reverse bit trees of slots 4-13, packed back to back.
    dist_special_probs: [RangeEncProbability; DIST_SPECIAL_SIZE],
    dist_align_probs: BitTreeCodec<ALIGN_SIZE>,
}

impl LZMACodec {
    pub fn new(pb: u32) -> Self {
        Self {
            pos_mask: (1 << pb) - 1,

            is_match_probs: [[RangeEncProbability::new(); POS_STATES_MAX]; STATES],
            is_rep_probs: [RangeEncProbability::new(); STATES],
            is_rep0_probs: [RangeEncProbability::new(); STATES],
            is_rep1_probs: [RangeEncProbability::new(); STATES],
            is_rep2_probs: [RangeEncProbability::new(); STATES],
            is_rep0_long_probs: [[RangeEncProbability::new(); POS_STATES_MAX]; STATES],

            dist_slot_probs: [BitTreeCodec::new(); DIST_STATES],
            dist_special_probs: [RangeEncProbability::new(); DIST_SPECIAL_SIZE],
            dist_align_probs: BitTreeCodec::new(),
        }
    }

    pub fn pos_state(&self, pos: u64) -> u32 {
        pos as u32 & self.pos_mask
    }
}

pub struct LZMACodecEncoder {
    codec: LZMACodec,
    state: State,

    literal_encoder: LiteralCodecEncoder,
    match_len_encoder: LengthCodecEncoder,
    rep_len_encoder: LengthCodecEncoder,

    data: LZMAEncoderData,
}

impl LZMACodecEncoder {
    /// `window_dict` is the largest distance the match finder can produce, it sizes the
    /// distance price tables.
    pub fn new(props: &LzmaProperties, nice_len: u32, window_dict: u32) -> Self {
        Self {
            codec: LZMACodec::new(props.pb),
            state: State::new(),

            literal_encoder: LiteralCodecEncoder::new(props.lc, props.lp),
            match_len_encoder: LengthCodecEncoder::new(props.pb, nice_len),
            rep_len_encoder: LengthCodecEncoder::new(props.pb, nice_len),

            data: LZMAEncoderData::new(window_dict),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn pos_state(&self, pos: u64) -> u32 {
        self.codec.pos_state(pos)
    }

    pub fn price_calc(&self) -> EncoderPriceCalc<'_> {
        EncoderPriceCalc::new(
            &self.codec,
            &self.data,
            &self.literal_encoder,
            &self.match_len_encoder,
            &self.rep_len_encoder,
        )
    }

    /// Refresh the cached distance and length prices that have gone stale.
    pub fn update_prices(&mut self) {
        self.data.update(&self.codec);
        self.match_len_encoder.update_prices();
        self.rep_len_encoder.update_prices();
    }

    /// Encode an instruction taken at absolute buffer position `position`, which may lag
    /// behind the input head. `block_pos` is the position within the current pass.
    pub fn encode_instruction<M: MatchFinder>(
        &mut self,
        rc: &mut RangeEncoder<impl Write>,
        input: &LZMAEncoderInput<M>,
        instruction: EncodeInstruction,
        position: u64,
        block_pos: u64,
    ) -> Result<()> {
        let pos_state = self.codec.pos_state(block_pos);

        match instruction {
            EncodeInstruction::Literal => {
                let buffer = input.buffer();
                let offset = (position as i64 - input.pos() as i64) as i32;

                let symbol = buffer.get_byte(offset);
                // Every pass starts from a zero context, even with history behind it
                let prev_byte = if block_pos > 0 {
                    buffer.get_byte(offset - 1)
                } else {
                    0
                };
                let match_byte = if self.state.is_literal() {
                    None
                } else {
                    Some(buffer.get_byte(offset - self.state.get_rep(0) as i32 - 1))
                };

                self.encode_literal(rc, symbol, prev_byte, match_byte, block_pos)
            }
            EncodeInstruction::Match(match_) => self.encode_match(rc, match_, pos_state),
            EncodeInstruction::Rep { rep_index, len } => {
                self.encode_long_rep(rc, rep_index, len, pos_state)
            }
            EncodeInstruction::ShortRep => self.encode_short_rep(rc, pos_state),
        }
    }

    pub fn encode_literal(
        &mut self,
        rc: &mut RangeEncoder<impl Write>,
        symbol: u8,
        prev_byte: u8,
        match_byte: Option<u8>,
        block_pos: u64,
    ) -> Result<()> {
        let pos_state = self.codec.pos_state(block_pos) as usize;
        let prob = &mut self.codec.is_match_probs[self.state.index()][pos_state];
        rc.encode_bit(prob, 0)?;

        self.literal_encoder
            .encode(rc, symbol, prev_byte, block_pos, match_byte)?;
        self.state.update_literal();

        Ok(())
    }

    pub fn encode_match(
        &mut self,
        rc: &mut RangeEncoder<impl Write>,
        match_: Match,
        pos_state: u32,
    ) -> Result<()> {
        let state_idx = self.state.index();
        rc.encode_bit(&mut self.codec.is_match_probs[state_idx][pos_state as usize], 1)?;
        rc.encode_bit(&mut self.codec.is_rep_probs[state_idx], 0)?;

        self.state.update_match(match_.distance);
        self.match_len_encoder.encode(rc, match_.len, pos_state)?;

        let dist_slot = get_dist_slot(match_.distance);
        self.codec.dist_slot_probs[get_dist_state(match_.len)].encode_bit_tree(rc, dist_slot)?;

        if dist_slot >= DIST_MODEL_START {
            let (footer_bits, base) = get_dist_slot_base(dist_slot);
            let dist_reduced = match_.distance - base;

            if dist_slot < DIST_MODEL_END {
                let offset = get_dist_special_offset(dist_slot, base);
                encode_reverse_bits(
                    &mut self.codec.dist_special_probs[offset..],
                    rc,
                    footer_bits,
                    dist_reduced,
                )?;
            } else {
                rc.encode_direct_bits(dist_reduced >> ALIGN_BITS, footer_bits - ALIGN_BITS)?;
                self.codec
                    .dist_align_probs
                    .encode_reverse_bit_tree(rc, dist_reduced & ALIGN_MASK)?;
                self.data.on_align_encoded();
            }
        }

        self.data.on_dist_encoded();

        Ok(())
    }

    pub fn encode_short_rep(
        &mut self,
        rc: &mut RangeEncoder<impl Write>,
        pos_state: u32,
    ) -> Result<()> {
        let state_idx = self.state.index();
        let pos_state = pos_state as usize;
        rc.encode_bit(&mut self.codec.is_match_probs[state_idx][pos_state], 1)?;
        rc.encode_bit(&mut self.codec.is_rep_probs[state_idx], 1)?;
        rc.encode_bit(&mut self.codec.is_rep0_probs[state_idx], 0)?;
        rc.encode_bit(&mut self.codec.is_rep0_long_probs[state_idx][pos_state], 0)?;

        self.state.update_short_rep();
        Ok(())
    }

    pub fn encode_long_rep(
        &mut self,
        rc: &mut RangeEncoder<impl Write>,
        rep: usize,
        len: u32,
        pos_state: u32,
    ) -> Result<()> {
        let state_idx = self.state.index();
        rc.encode_bit(&mut self.codec.is_match_probs[state_idx][pos_state as usize], 1)?;
        rc.encode_bit(&mut self.codec.is_rep_probs[state_idx], 1)?;

        if rep == 0 {
            rc.encode_bit(&mut self.codec.is_rep0_probs[state_idx], 0)?;
            let prob = &mut self.codec.is_rep0_long_probs[state_idx][pos_state as usize];
            rc.encode_bit(prob, 1)?;
        } else {
            rc.encode_bit(&mut self.codec.is_rep0_probs[state_idx], 1)?;

            if rep == 1 {
                rc.encode_bit(&mut self.codec.is_rep1_probs[state_idx], 0)?;
            } else {
                rc.encode_bit(&mut self.codec.is_rep1_probs[state_idx], 1)?;
                rc.encode_bit(&mut self.codec.is_rep2_probs[state_idx], rep as u32 - 2)?;
            }
        }

        self.rep_len_encoder.encode(rc, len, pos_state)?;
        self.state.update_long_rep(rep);

        Ok(())
    }

    /// Write the end of stream marker, a match with the all ones distance.
    pub fn encode_end_marker(
        &mut self,
        rc: &mut RangeEncoder<impl Write>,
        block_pos: u64,
    ) -> Result<()> {
        trace!(block_pos, "writing end marker");
        let pos_state = self.codec.pos_state(block_pos);
        self.encode_match(
            rc,
            Match {
                distance: END_MARKER_DISTANCE,
                len: MATCH_LEN_MIN as u32,
            },
            pos_state,
        )
    }
}

pub struct LZMACodecDecoder {
    codec: LZMACodec,
    state: State,
    dict_size_check: u32,

    literal_decoder: LiteralCodecDecoder,
    match_len_decoder: LengthCodecDecoder,
    rep_len_decoder: LengthCodecDecoder,
}

impl LZMACodecDecoder {
    pub fn new(props: &LzmaProperties) -> Self {
        Self {
            codec: LZMACodec::new(props.pb),
            state: State::new(),
            dict_size_check: props.dict_size.max(1),

            literal_decoder: LiteralCodecDecoder::new(props.lc, props.lp),
            match_len_decoder: LengthCodecDecoder::new(props.pb),
            rep_len_decoder: LengthCodecDecoder::new(props.pb),
        }
    }

    /// Decode one literal, match or rep into the window and return the number of bytes it
    /// produced, or `None` at the end marker. Matches are cut short at `remaining` bytes.
    pub fn decode_one_packet(
        &mut self,
        rc: &mut RangeDecoder<impl Read>,
        output: &mut DecoderDataBuffer,
        remaining: Option<u64>,
    ) -> Result<Option<u32>> {
        let block_pos = output.block_pos();
        let pos_state = self.codec.pos_state(block_pos);
        let state_idx = self.state.index();

        let prob = &mut self.codec.is_match_probs[state_idx][pos_state as usize];
        if rc.decode_bit(prob)? == 0 {
            self.decode_literal(rc, output, block_pos)?;
            return Ok(Some(1));
        }
        if block_pos == 0 {
            return Err(LzmaError::corrupt("the first symbol of a block is not a literal"));
        }

        let len = if rc.decode_bit(&mut self.codec.is_rep_probs[state_idx])? == 0 {
            self.decode_match(rc, pos_state)?
        } else {
            match self.decode_rep_match(rc, pos_state)? {
                Some(len) => len,
                None => {
                    self.check_distance(output)?;
                    let byte = output.get_byte(self.state.get_rep(0));
                    output.put_byte(byte);
                    return Ok(Some(1));
                }
            }
        };

        let rep0 = self.state.get_rep(0);
        if rep0 == END_MARKER_DISTANCE {
            trace!(block_pos, "end marker reached");
            return Ok(None);
        }
        self.check_distance(output)?;

        let len = match remaining {
            Some(remaining) => (len as u64).min(remaining) as u32,
            None => len,
        };
        output.copy_block(rep0, len);

        Ok(Some(len))
    }

    fn check_distance(&self, output: &DecoderDataBuffer) -> Result<()> {
        let rep0 = self.state.get_rep(0);
        let history = output.available_history();

        if rep0 as u64 >= history || rep0 >= self.dict_size_check {
            warn!(distance = rep0, history, "match distance outside of the window");
            return Err(LzmaError::InvalidDistance {
                distance: rep0,
                history,
                dict_size: self.dict_size_check,
            });
        }

        Ok(())
    }

    fn decode_literal(
        &mut self,
        rc: &mut RangeDecoder<impl Read>,
        output: &mut DecoderDataBuffer,
        block_pos: u64,
    ) -> Result<()> {
        let prev_byte = if block_pos == 0 {
            0
        } else {
            output.get_byte(0)
        };

        let match_byte = if self.state.is_literal() {
            None
        } else {
            Some(output.get_byte(self.state.get_rep(0)))
        };

        let byte = self
            .literal_decoder
            .decode(rc, prev_byte, block_pos, match_byte)?;

        output.put_byte(byte);
        self.state.update_literal();

        Ok(())
    }

    fn decode_match(&mut self, rc: &mut RangeDecoder<impl Read>, pos_state: u32) -> Result<u32> {
        let len = self.match_len_decoder.decode(rc, pos_state)?;

        let dist_slot = self.codec.dist_slot_probs[get_dist_state(len)].decode_bit_tree(rc)?;

        let distance = if dist_slot < DIST_MODEL_START {
            dist_slot
        } else {
            let (footer_bits, base) = get_dist_slot_base(dist_slot);

            if dist_slot < DIST_MODEL_END {
                let offset = get_dist_special_offset(dist_slot, base);
                base + decode_reverse_bits(
                    &mut self.codec.dist_special_probs[offset..],
                    rc,
                    footer_bits,
                )?
            } else {
                let direct = rc.decode_direct_bits(footer_bits - ALIGN_BITS)?;
                let align = self.codec.dist_align_probs.decode_reverse_bit_tree(rc)?;
                base + (direct << ALIGN_BITS) + align
            }
        };

        self.state.update_match(distance);

        Ok(len)
    }

    /// Returns the length of a long rep, or `None` for a short rep.
    fn decode_rep_match(
        &mut self,
        rc: &mut RangeDecoder<impl Read>,
        pos_state: u32,
    ) -> Result<Option<u32>> {
        let state_idx = self.state.index();

        let rep = if rc.decode_bit(&mut self.codec.is_rep0_probs[state_idx])? == 0 {
            let prob = &mut self.codec.is_rep0_long_probs[state_idx][pos_state as usize];
            if rc.decode_bit(prob)? == 0 {
                self.state.update_short_rep();
                return Ok(None);
            }
            0
        } else if rc.decode_bit(&mut self.codec.is_rep1_probs[state_idx])? == 0 {
            1
        } else if rc.decode_bit(&mut self.codec.is_rep2_probs[state_idx])? == 0 {
            2
        } else {
            3
        };

        let len = self.rep_len_decoder.decode(rc, pos_state)?;
        self.state.update_long_rep(rep);

        Ok(Some(len))
    }
}
