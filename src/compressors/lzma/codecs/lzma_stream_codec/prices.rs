use crate::compressors::lzma::codecs::{
    bit_tree_codec::get_reverse_bits_price,
    length_codec::LengthCodecEncoder,
    literals_codec::LiteralCodecEncoder,
    range_codec::RangeEncPrice,
};

use super::{
    get_dist_slot, get_dist_slot_base, get_dist_special_offset, get_dist_state, state::State,
    LZMACodec, ALIGN_BITS, ALIGN_MASK, ALIGN_SIZE, DIST_MODEL_END, DIST_MODEL_START,
    DIST_STATES, FULL_DISTANCES,
};

const DIST_PRICE_UPDATE_INTERVAL: i32 = FULL_DISTANCES as i32;
const ALIGN_PRICE_UPDATE_INTERVAL: i32 = ALIGN_SIZE as i32;

/// Cached distance prices. Recomputing them is expensive, so they are only refreshed after
/// a number of distances were encoded.
pub struct LZMAEncoderData {
    dist_price_count: i32,
    align_price_count: i32,

    dist_slot_prices_size: u32,
    /// Slot prices, including the direct bits of the slots above DIST_MODEL_END.
    dist_slot_prices: [Vec<RangeEncPrice>; DIST_STATES],
    full_dist_prices: [[RangeEncPrice; FULL_DISTANCES]; DIST_STATES],
    align_prices: [RangeEncPrice; ALIGN_SIZE],
}

impl LZMAEncoderData {
    pub fn new(window_dict: u32) -> Self {
        let dist_slot_prices_size =
            (get_dist_slot(window_dict.max(1) - 1) + 1).max(DIST_MODEL_END);

        Self {
            dist_price_count: 0,
            align_price_count: 0,

            dist_slot_prices_size,
            dist_slot_prices: std::array::from_fn(|_| {
                vec![RangeEncPrice::zero(); dist_slot_prices_size as usize]
            }),
            full_dist_prices: [[RangeEncPrice::zero(); FULL_DISTANCES]; DIST_STATES],
            align_prices: [RangeEncPrice::zero(); ALIGN_SIZE],
        }
    }

    pub(super) fn on_dist_encoded(&mut self) {
        self.dist_price_count -= 1;
    }

    pub(super) fn on_align_encoded(&mut self) {
        self.align_price_count -= 1;
    }

    pub(super) fn update(&mut self, codec: &LZMACodec) {
        if self.dist_price_count <= 0 {
            self.update_dist_prices(codec);
        }

        if self.align_price_count <= 0 {
            self.update_align_prices(codec);
        }
    }

    fn update_dist_prices(&mut self, codec: &LZMACodec) {
        self.dist_price_count = DIST_PRICE_UPDATE_INTERVAL;

        for dist_state in 0..DIST_STATES {
            let slot_prices = &mut self.dist_slot_prices[dist_state];
            for (dist_slot, price) in slot_prices.iter_mut().enumerate() {
                *price = codec.dist_slot_probs[dist_state].get_bit_tree_price(dist_slot as u32);
            }

            for dist_slot in DIST_MODEL_END..self.dist_slot_prices_size {
                let count = (dist_slot >> 1) - 1 - ALIGN_BITS;
                slot_prices[dist_slot as usize] += RangeEncPrice::get_direct_bits_price(count);
            }

            for dist in 0..DIST_MODEL_START as usize {
                self.full_dist_prices[dist_state][dist] = slot_prices[dist];
            }
        }

        let mut dist = DIST_MODEL_START;
        for dist_slot in DIST_MODEL_START..DIST_MODEL_END {
            let (footer_bits, base) = get_dist_slot_base(dist_slot);
            let probs = &codec.dist_special_probs[get_dist_special_offset(dist_slot, base)..];

            for _ in 0..(1u32 << footer_bits) {
                let price = get_reverse_bits_price(probs, footer_bits, dist - base);

                for dist_state in 0..DIST_STATES {
                    self.full_dist_prices[dist_state][dist as usize] =
                        self.dist_slot_prices[dist_state][dist_slot as usize] + price;
                }
                dist += 1;
            }
        }

        debug_assert_eq!(dist, FULL_DISTANCES as u32);
    }

    fn update_align_prices(&mut self, codec: &LZMACodec) {
        self.align_price_count = ALIGN_PRICE_UPDATE_INTERVAL;

        for (i, price) in self.align_prices.iter_mut().enumerate() {
            *price = codec.dist_align_probs.get_reverse_bit_tree_price(i as u32);
        }
    }
}

/// Read-only view over the encoder's models, used by the instruction pickers to price
/// their options.
pub struct EncoderPriceCalc<'a> {
    codec: &'a LZMACodec,
    data: &'a LZMAEncoderData,
    literal_encoder: &'a LiteralCodecEncoder,
    match_len_encoder: &'a LengthCodecEncoder,
    rep_len_encoder: &'a LengthCodecEncoder,
}

impl<'a> EncoderPriceCalc<'a> {
    pub(super) fn new(
        codec: &'a LZMACodec,
        data: &'a LZMAEncoderData,
        literal_encoder: &'a LiteralCodecEncoder,
        match_len_encoder: &'a LengthCodecEncoder,
        rep_len_encoder: &'a LengthCodecEncoder,
    ) -> Self {
        Self {
            codec,
            data,
            literal_encoder,
            match_len_encoder,
            rep_len_encoder,
        }
    }

    pub fn pos_state(&self, pos: u64) -> u32 {
        self.codec.pos_state(pos)
    }

    /// Price of a literal packet at block position `pos`. The match byte only counts when
    /// the state says the previous packet was a match.
    pub fn get_literal_price(
        &self,
        cur_byte: u8,
        match_byte: u8,
        prev_byte: u8,
        pos: u64,
        state: &State,
    ) -> RangeEncPrice {
        let pos_state = self.codec.pos_state(pos) as usize;
        let packet_price = self.codec.is_match_probs[state.index()][pos_state].get_bit_price(0);

        let match_byte = if state.is_literal() {
            None
        } else {
            Some(match_byte)
        };

        packet_price
            + self
                .literal_encoder
                .get_price(cur_byte, prev_byte, pos, match_byte)
    }

    /// Price of the bit that separates literals from everything else.
    pub fn get_any_match_price(&self, state: &State, pos_state: u32) -> AnyMatchPrice<'_> {
        let prob = &self.codec.is_match_probs[state.index()][pos_state as usize];
        AnyMatchPrice {
            price_calc: self,
            any_match_price: prob.get_bit_price(1),
            state_idx: state.index(),
            pos_state: pos_state as usize,
        }
    }

    pub fn get_long_rep_and_len_price(
        &self,
        rep: usize,
        len: u32,
        state: &State,
        pos_state: u32,
    ) -> RangeEncPrice {
        self.get_any_match_price(state, pos_state)
            .get_any_rep_price()
            .get_long_rep_price(rep)
            .get_price_with_len(len)
    }
}

#[derive(Copy, Clone)]
pub struct AnyMatchPrice<'a> {
    price_calc: &'a EncoderPriceCalc<'a>,
    any_match_price: RangeEncPrice,
    state_idx: usize,
    pos_state: usize,
}

impl<'a> AnyMatchPrice<'a> {
    /// Shift the whole chain by the price of the path that led here.
    pub fn with_base(mut self, base: RangeEncPrice) -> Self {
        self.any_match_price += base;
        self
    }

    pub fn get_normal_match_price(self) -> NormalMatchPrice<'a> {
        let is_rep_price = &self.price_calc.codec.is_rep_probs[self.state_idx];
        NormalMatchPrice {
            price_calc: self.price_calc,
            normal_match_price: self.any_match_price + is_rep_price.get_bit_price(0),
            pos_state: self.pos_state,
        }
    }

    pub fn get_any_rep_price(self) -> AnyRepPrice<'a> {
        let is_rep_price = &self.price_calc.codec.is_rep_probs[self.state_idx];
        AnyRepPrice {
            price_calc: self.price_calc,
            any_rep_price: self.any_match_price + is_rep_price.get_bit_price(1),
            state_idx: self.state_idx,
            pos_state: self.pos_state,
        }
    }
}

#[derive(Copy, Clone)]
pub struct NormalMatchPrice<'a> {
    price_calc: &'a EncoderPriceCalc<'a>,
    normal_match_price: RangeEncPrice,
    pos_state: usize,
}

impl<'a> NormalMatchPrice<'a> {
    pub fn get_price_with_dist_len(self, dist: u32, len: u32) -> RangeEncPrice {
        let data = self.price_calc.data;
        let price = self.normal_match_price
            + self
                .price_calc
                .match_len_encoder
                .get_price(len, self.pos_state as u32);
        let dist_state = get_dist_state(len);

        if dist < FULL_DISTANCES as u32 {
            price + data.full_dist_prices[dist_state][dist as usize]
        } else {
            // The slot price already holds the direct bits
            let dist_slot = get_dist_slot(dist);
            price
                + data.dist_slot_prices[dist_state][dist_slot as usize]
                + data.align_prices[(dist & ALIGN_MASK) as usize]
        }
    }
}

#[derive(Copy, Clone)]
pub struct AnyRepPrice<'a> {
    price_calc: &'a EncoderPriceCalc<'a>,
    any_rep_price: RangeEncPrice,
    state_idx: usize,
    pos_state: usize,
}

impl<'a> AnyRepPrice<'a> {
    pub fn get_short_rep_price(self) -> RangeEncPrice {
        let codec = self.price_calc.codec;
        let is_rep0_price = codec.is_rep0_probs[self.state_idx].get_bit_price(0);
        let is_rep0_long_price =
            codec.is_rep0_long_probs[self.state_idx][self.pos_state].get_bit_price(0);

        self.any_rep_price + is_rep0_price + is_rep0_long_price
    }

    pub fn get_long_rep_price(self, rep: usize) -> LongRepPrice<'a> {
        let codec = self.price_calc.codec;
        let mut price = self.any_rep_price;

        if rep == 0 {
            price += codec.is_rep0_probs[self.state_idx].get_bit_price(0)
                + codec.is_rep0_long_probs[self.state_idx][self.pos_state].get_bit_price(1);
        } else {
            price += codec.is_rep0_probs[self.state_idx].get_bit_price(1);

            if rep == 1 {
                price += codec.is_rep1_probs[self.state_idx].get_bit_price(0);
            } else {
                price += codec.is_rep1_probs[self.state_idx].get_bit_price(1)
                    + codec.is_rep2_probs[self.state_idx].get_bit_price(rep as u32 - 2);
            }
        }

        LongRepPrice {
            price_calc: self.price_calc,
            long_rep_price: price,
            pos_state: self.pos_state,
        }
    }
}

#[derive(Copy, Clone)]
pub struct LongRepPrice<'a> {
    price_calc: &'a EncoderPriceCalc<'a>,
    long_rep_price: RangeEncPrice,
    pos_state: usize,
}

impl<'a> LongRepPrice<'a> {
    pub fn get_price_with_len(&self, len: u32) -> RangeEncPrice {
        self.long_rep_price
            + self
                .price_calc
                .rep_len_encoder
                .get_price(len, self.pos_state as u32)
    }
}
