use std::io::{Read, Write};

use crate::error::Result;
use crate::utils::const_variable_arr::ConstVariableArr;

use super::bit_tree_codec::BitTreeCodec;
use super::range_codec::{RangeDecoder, RangeEncPrice, RangeEncProbability, RangeEncoder};

pub const POS_STATES_MAX: usize = 1 << 4;

const LOW_LENGTH_BITS: usize = 3;
const MID_LENGTH_BITS: usize = 3;
const HIGH_LENGTH_BITS: usize = 8;

const LOW_LENGTH_MAX: usize = 1 << LOW_LENGTH_BITS;
const MID_LENGTH_MAX: usize = 1 << MID_LENGTH_BITS;
const HIGH_LENGTH_MAX: usize = 1 << HIGH_LENGTH_BITS;

pub const MATCH_LEN_MIN: usize = 2;
pub const MATCH_LEN_MAX: usize =
    MATCH_LEN_MIN + LOW_LENGTH_MAX + MID_LENGTH_MAX + HIGH_LENGTH_MAX - 1;

const PRICE_UPDATE_INTERVAL: i32 = 32;

/// Number of length symbols, which is also the largest nice length the encoder accepts.
const LENGTH_SYMBOLS: usize = LOW_LENGTH_MAX + MID_LENGTH_MAX + HIGH_LENGTH_MAX;

/// The low and mid trees for a single pos_state.
#[derive(Debug, Clone)]
struct LengthCodecPosState {
    low: BitTreeCodec<LOW_LENGTH_MAX>,
    mid: BitTreeCodec<MID_LENGTH_MAX>,
}

impl LengthCodecPosState {
    fn new() -> Self {
        Self {
            low: BitTreeCodec::new(),
            mid: BitTreeCodec::new(),
        }
    }
}

/// Cached prices of every length symbol for one pos_state.
#[derive(Debug, Clone)]
struct LengthCodecPosStatePrice {
    /// Counts down with every encoded length, the prices are refreshed when it reaches 0
    counter: i32,
    /// The array is sized for the largest nice_len, only the first `len()` entries are live.
    prices: ConstVariableArr<RangeEncPrice, LENGTH_SYMBOLS>,
}

impl LengthCodecPosStatePrice {
    fn new(symbols: usize) -> Self {
        Self {
            counter: 0,
            prices: ConstVariableArr::new(RangeEncPrice::zero(), symbols),
        }
    }
}

/// Probabilities for match lengths, split into three ranges chosen by two choice bits:
/// - 2-9 (low, 3 bits, one tree per pos_state)
/// - 10-17 (mid, 3 bits, one tree per pos_state)
/// - 18-273 (high, 8 bits, shared)
#[derive(Debug, Clone)]
struct LengthCodec {
    first_bit: RangeEncProbability,
    second_bit: RangeEncProbability,
    pos_states: ConstVariableArr<LengthCodecPosState, POS_STATES_MAX>,
    high: BitTreeCodec<HIGH_LENGTH_MAX>,
}

impl LengthCodec {
    fn new(pb: u32) -> Self {
        Self {
            first_bit: RangeEncProbability::new(),
            second_bit: RangeEncProbability::new(),
            pos_states: ConstVariableArr::new(LengthCodecPosState::new(), 1 << pb),
            high: BitTreeCodec::new(),
        }
    }
}

pub struct LengthCodecEncoder {
    codec: LengthCodec,
    pos_state_prices: ConstVariableArr<LengthCodecPosStatePrice, POS_STATES_MAX>,
}

impl LengthCodecEncoder {
    pub fn new(pb: u32, nice_len: u32) -> Self {
        debug_assert!(nice_len as usize <= MATCH_LEN_MAX);
        debug_assert!(pb <= 4);

        // The mid range is always priced in full, even below it
        let symbols = (nice_len as usize)
            .saturating_sub(MATCH_LEN_MIN - 1)
            .max(LOW_LENGTH_MAX + MID_LENGTH_MAX);

        Self {
            codec: LengthCodec::new(pb),
            pos_state_prices: ConstVariableArr::new(LengthCodecPosStatePrice::new(symbols), 1 << pb),
        }
    }

    pub fn encode(
        &mut self,
        enc: &mut RangeEncoder<impl Write>,
        len: u32,
        pos_state: u32,
    ) -> Result<()> {
        debug_assert!(len >= MATCH_LEN_MIN as u32);
        debug_assert!(len <= MATCH_LEN_MAX as u32);

        let mut len = len as usize - MATCH_LEN_MIN;
        let pos_state = pos_state as usize;
        self.pos_state_prices[pos_state].counter -= 1;

        let pos_state_data = &mut self.codec.pos_states[pos_state];

        if len < LOW_LENGTH_MAX {
            enc.encode_bit(&mut self.codec.first_bit, 0)?;
            return pos_state_data.low.encode_bit_tree(enc, len as u32);
        }

        enc.encode_bit(&mut self.codec.first_bit, 1)?;
        len -= LOW_LENGTH_MAX;

        if len < MID_LENGTH_MAX {
            enc.encode_bit(&mut self.codec.second_bit, 0)?;
            return pos_state_data.mid.encode_bit_tree(enc, len as u32);
        }

        enc.encode_bit(&mut self.codec.second_bit, 1)?;
        self.codec
            .high
            .encode_bit_tree(enc, (len - MID_LENGTH_MAX) as u32)
    }

    /// Cached price of `len`. Only valid up to the nice length this encoder was built with.
    pub fn get_price(&self, len: u32, pos_state: u32) -> RangeEncPrice {
        self.pos_state_prices[pos_state as usize].prices[len as usize - MATCH_LEN_MIN]
    }

    /// Refresh the prices of every pos_state that has counted down to 0.
    pub fn update_prices(&mut self) {
        for pos_state in 0..self.codec.pos_states.len() {
            if self.pos_state_prices[pos_state].counter <= 0 {
                self.pos_state_prices[pos_state].counter = PRICE_UPDATE_INTERVAL;
                self.update_prices_with_state(pos_state);
            }
        }
    }

    fn update_prices_with_state(&mut self, pos_state: usize) {
        let pos_state_data = &self.codec.pos_states[pos_state];
        let prices = self.pos_state_prices[pos_state].prices.as_mut_slice();

        let choice_price = self.codec.first_bit.get_bit_price(0);
        for (i, price) in prices.iter_mut().enumerate().take(LOW_LENGTH_MAX) {
            *price = choice_price + pos_state_data.low.get_bit_tree_price(i as u32);
        }

        let start = LOW_LENGTH_MAX;
        let end = LOW_LENGTH_MAX + MID_LENGTH_MAX;
        let first_bit_price = self.codec.first_bit.get_bit_price(1);
        let choice_price = first_bit_price + self.codec.second_bit.get_bit_price(0);
        for i in start..end {
            prices[i] = choice_price + pos_state_data.mid.get_bit_tree_price((i - start) as u32);
        }

        let start = end;
        let choice_price = first_bit_price + self.codec.second_bit.get_bit_price(1);
        for i in start..prices.len() {
            prices[i] = choice_price + self.codec.high.get_bit_tree_price((i - start) as u32);
        }
    }
}

pub struct LengthCodecDecoder {
    codec: LengthCodec,
}

impl LengthCodecDecoder {
    pub fn new(pb: u32) -> Self {
        Self {
            codec: LengthCodec::new(pb),
        }
    }

    pub fn decode(&mut self, dec: &mut RangeDecoder<impl Read>, pos_state: u32) -> Result<u32> {
        let pos_state_data = &mut self.codec.pos_states[pos_state as usize];

        if dec.decode_bit(&mut self.codec.first_bit)? == 0 {
            let l = pos_state_data.low.decode_bit_tree(dec)?;
            return Ok(l + MATCH_LEN_MIN as u32);
        }

        if dec.decode_bit(&mut self.codec.second_bit)? == 0 {
            let l = pos_state_data.mid.decode_bit_tree(dec)?;
            return Ok(l + (MATCH_LEN_MIN + LOW_LENGTH_MAX) as u32);
        }

        let l = self.codec.high.decode_bit_tree(dec)?;
        Ok(l + (MATCH_LEN_MIN + LOW_LENGTH_MAX + MID_LENGTH_MAX) as u32)
    }
}
