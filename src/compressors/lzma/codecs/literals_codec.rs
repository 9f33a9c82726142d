mod subcoder;

use std::io::{Read, Write};

use crate::error::Result;

use self::subcoder::LiteralSubcoder;

use super::range_codec::{RangeDecoder, RangeEncPrice, RangeEncoder};

/// Picks the probability set for the next literal from the low bits of its position
/// and the high bits of the byte before it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LiteralCoderContextBits {
    lc: u32,
    literal_pos_mask: u32,
}

impl LiteralCoderContextBits {
    pub fn new(lc: u32, lp: u32) -> Self {
        Self {
            lc,
            literal_pos_mask: (1 << lp) - 1,
        }
    }

    pub fn get_sub_coder_index(&self, prev_byte: u8, pos: u64) -> usize {
        let low = prev_byte as u32 >> (8 - self.lc);
        let high = pos as u32 & self.literal_pos_mask;
        (low | (high << self.lc)) as usize
    }
}

#[derive(Debug, Clone)]
struct LiteralCodec {
    context: LiteralCoderContextBits,
    subcoders: Vec<LiteralSubcoder>,
}

impl LiteralCodec {
    fn new(lc: u32, lp: u32) -> Self {
        Self {
            context: LiteralCoderContextBits::new(lc, lp),
            subcoders: vec![LiteralSubcoder::new(); 1 << (lc + lp)],
        }
    }

    fn get_subcoder(&self, prev_byte: u8, pos: u64) -> &LiteralSubcoder {
        &self.subcoders[self.context.get_sub_coder_index(prev_byte, pos)]
    }

    fn get_subcoder_mut(&mut self, prev_byte: u8, pos: u64) -> &mut LiteralSubcoder {
        let i = self.context.get_sub_coder_index(prev_byte, pos);
        &mut self.subcoders[i]
    }
}

pub struct LiteralCodecDecoder {
    codec: LiteralCodec,
}

impl LiteralCodecDecoder {
    pub fn new(lc: u32, lp: u32) -> Self {
        Self {
            codec: LiteralCodec::new(lc, lp),
        }
    }

    /// Decode one literal. `match_byte` is the byte at distance rep0, passed only when
    /// the state says the previous symbol was a match.
    pub fn decode(
        &mut self,
        rc: &mut RangeDecoder<impl Read>,
        prev_byte: u8,
        pos: u64,
        match_byte: Option<u8>,
    ) -> Result<u8> {
        let subcoder = self.codec.get_subcoder_mut(prev_byte, pos);
        match match_byte {
            None => subcoder.decode_normal_literal(rc),
            Some(match_byte) => subcoder.decode_matched_literal(rc, match_byte),
        }
    }
}

pub struct LiteralCodecEncoder {
    codec: LiteralCodec,
}

impl LiteralCodecEncoder {
    pub fn new(lc: u32, lp: u32) -> Self {
        Self {
            codec: LiteralCodec::new(lc, lp),
        }
    }

    pub fn encode(
        &mut self,
        rc: &mut RangeEncoder<impl Write>,
        symbol: u8,
        prev_byte: u8,
        pos: u64,
        match_byte: Option<u8>,
    ) -> Result<()> {
        let subcoder = self.codec.get_subcoder_mut(prev_byte, pos);
        match match_byte {
            None => subcoder.encode_normal_literal(rc, symbol),
            Some(match_byte) => subcoder.encode_matched_literal(rc, symbol, match_byte),
        }
    }

    pub fn get_price(
        &self,
        symbol: u8,
        prev_byte: u8,
        pos: u64,
        match_byte: Option<u8>,
    ) -> RangeEncPrice {
        let subcoder = self.codec.get_subcoder(prev_byte, pos);
        match match_byte {
            None => subcoder.get_normal_price(symbol),
            Some(match_byte) => subcoder.get_matched_price(symbol, match_byte),
        }
    }
}
