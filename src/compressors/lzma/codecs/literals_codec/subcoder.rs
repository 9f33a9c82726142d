use std::io::{Read, Write};

use crate::error::Result;

use super::super::range_codec::{RangeDecoder, RangeEncPrice, RangeEncProbability, RangeEncoder};

/// Probabilities for one literal context.
///
/// The first 0x100 entries are the plain byte tree. The matched variant walks two more
/// 0x100 regions, picked by the current bit of the match byte, for as long as the coded
/// bits agree with the match byte. After the first mismatch it drops back to the plain tree.
#[derive(Debug, Clone)]
pub(crate) struct LiteralSubcoder {
    probs: [RangeEncProbability; 0x300],
}

impl LiteralSubcoder {
    pub fn new() -> Self {
        Self {
            probs: [RangeEncProbability::new(); 0x300],
        }
    }

    pub fn encode_normal_literal(
        &mut self,
        rc: &mut RangeEncoder<impl Write>,
        symbol: u8,
    ) -> Result<()> {
        // The marker bit at 0x100 travels up as the byte is shifted out, the bits below it
        // are the tree index
        let mut symbol = symbol as u32 | 0x100;
        while symbol < 0x10000 {
            let bit = (symbol >> 7) & 1;
            rc.encode_bit(&mut self.probs[(symbol >> 8) as usize], bit)?;
            symbol <<= 1;
        }
        Ok(())
    }

    pub fn encode_matched_literal(
        &mut self,
        rc: &mut RangeEncoder<impl Write>,
        symbol: u8,
        match_byte: u8,
    ) -> Result<()> {
        let mut symbol = symbol as u32 | 0x100;
        let mut match_byte = match_byte as u32;

        // 0x100 while the bits agree, 0 afterwards
        let mut offset = 0x100;
        while symbol < 0x10000 {
            match_byte <<= 1;
            let match_bit = match_byte & offset;
            let index = offset + match_bit + (symbol >> 8);
            let bit = (symbol >> 7) & 1;
            rc.encode_bit(&mut self.probs[index as usize], bit)?;
            symbol <<= 1;
            offset &= !(match_byte ^ symbol);
        }
        Ok(())
    }

    pub fn decode_normal_literal(&mut self, rc: &mut RangeDecoder<impl Read>) -> Result<u8> {
        let mut symbol: u32 = 1;
        while symbol < 0x100 {
            let bit = rc.decode_bit(&mut self.probs[symbol as usize])?;
            symbol = (symbol << 1) | bit;
        }
        Ok(symbol as u8)
    }

    pub fn decode_matched_literal(
        &mut self,
        rc: &mut RangeDecoder<impl Read>,
        match_byte: u8,
    ) -> Result<u8> {
        let mut symbol: u32 = 1;
        let mut match_byte = match_byte as u32;
        let mut offset = 0x100;
        while symbol < 0x100 {
            match_byte <<= 1;
            let match_bit = match_byte & offset;
            let bit = rc.decode_bit(&mut self.probs[(offset + match_bit + symbol) as usize])?;
            symbol = (symbol << 1) | bit;
            offset &= 0u32.wrapping_sub(bit) ^ !match_bit;
        }
        Ok(symbol as u8)
    }

    pub fn get_normal_price(&self, symbol: u8) -> RangeEncPrice {
        let mut price = RangeEncPrice::zero();
        let mut symbol = symbol as u32 | 0x100;
        while symbol < 0x10000 {
            let bit = (symbol >> 7) & 1;
            price += self.probs[(symbol >> 8) as usize].get_bit_price(bit);
            symbol <<= 1;
        }
        price
    }

    pub fn get_matched_price(&self, symbol: u8, match_byte: u8) -> RangeEncPrice {
        let mut price = RangeEncPrice::zero();
        let mut symbol = symbol as u32 | 0x100;
        let mut match_byte = match_byte as u32;
        let mut offset = 0x100;
        while symbol < 0x10000 {
            match_byte <<= 1;
            let match_bit = match_byte & offset;
            let index = offset + match_bit + (symbol >> 8);
            let bit = (symbol >> 7) & 1;
            price += self.probs[index as usize].get_bit_price(bit);
            symbol <<= 1;
            offset &= !(match_byte ^ symbol);
        }
        price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_literal_normal_codec() {
        let mut buf = Vec::new();

        let mut subcoder = LiteralSubcoder::new();
        let mut encoder = RangeEncoder::new(&mut buf);
        for i in 0..=255u8 {
            subcoder.encode_normal_literal(&mut encoder, i).unwrap();
        }
        encoder.finish().unwrap();

        let mut subcoder = LiteralSubcoder::new();
        let mut decoder = RangeDecoder::new(Cursor::new(buf)).unwrap();
        for i in 0..=255u8 {
            assert_eq!(subcoder.decode_normal_literal(&mut decoder).unwrap(), i);
        }

        assert!(decoder.is_finished());
    }

    #[test]
    fn test_literal_matched_codec() {
        let mut buf = Vec::new();

        let mut subcoder = LiteralSubcoder::new();
        let mut encoder = RangeEncoder::new(&mut buf);
        for i in 0..=255u8 {
            subcoder
                .encode_matched_literal(&mut encoder, i, i.wrapping_mul(7))
                .unwrap();
        }
        encoder.finish().unwrap();

        let mut subcoder = LiteralSubcoder::new();
        let mut decoder = RangeDecoder::new(Cursor::new(buf)).unwrap();
        for i in 0..=255u8 {
            let result = subcoder
                .decode_matched_literal(&mut decoder, i.wrapping_mul(7))
                .unwrap();
            assert_eq!(result, i);
        }

        assert!(decoder.is_finished());
    }

    #[test]
    fn test_fresh_literal_costs_eight_bits() {
        let subcoder = LiteralSubcoder::new();
        let eight_bits = RangeEncPrice::get_direct_bits_price(8);
        assert_eq!(subcoder.get_normal_price(0x5A), eight_bits);
        assert_eq!(subcoder.get_matched_price(0x5A, 0x13), eight_bits);
    }

    #[test]
    fn test_matched_price_learns_agreement() {
        let mut buf = Vec::new();
        let mut subcoder = LiteralSubcoder::new();
        let mut encoder = RangeEncoder::new(&mut buf);
        for i in 0..64u8 {
            // Literals that repeat the match byte
            subcoder.encode_matched_literal(&mut encoder, i, i).unwrap();
        }
        encoder.finish().unwrap();

        let agreeing = subcoder.get_matched_price(0xC3, 0xC3);
        let disagreeing = subcoder.get_matched_price(0xC3, 0x3C);
        assert!(agreeing < disagreeing);
    }
}
