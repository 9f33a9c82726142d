use std::io::{Read, Write};

use crate::error::Result;

use super::range_codec::{RangeDecoder, RangeEncPrice, RangeEncProbability, RangeEncoder};

/// A fixed width value codec, storing probabilities for each bit in a binary tree.
///
/// BITS_EXP must be a power of two, the value width is `log2(BITS_EXP)`. Index 0 of the
/// tree is unused, the root is at index 1.
///
/// **TODO:** Replace BITS_EXP with BITS when https://github.com/rust-lang/rust/issues/76560 is implemented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTreeCodec<const BITS_EXP: usize> {
    probs: [RangeEncProbability; BITS_EXP],
}

impl<const BITS_EXP: usize> Default for BitTreeCodec<BITS_EXP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BITS_EXP: usize> BitTreeCodec<BITS_EXP> {
    const BITS: u32 = BITS_EXP.trailing_zeros();

    pub fn new() -> Self {
        Self {
            probs: [RangeEncProbability::default(); BITS_EXP],
        }
    }

    pub fn encode_bit_tree(&mut self, enc: &mut RangeEncoder<impl Write>, symbol: u32) -> Result<()> {
        debug_assert!(symbol < BITS_EXP as u32);

        let mut index = 1;
        let mut mask = BITS_EXP as u32;
        loop {
            mask >>= 1;

            let bit = u32::from(symbol & mask != 0);
            enc.encode_bit(&mut self.probs[index], bit)?;
            index = (index << 1) | bit as usize;
            if mask == 1 {
                // When the 1 bit reached the end, we're done
                break;
            }
        }

        Ok(())
    }

    pub fn encode_reverse_bit_tree(
        &mut self,
        enc: &mut RangeEncoder<impl Write>,
        symbol: u32,
    ) -> Result<()> {
        debug_assert!(symbol < BITS_EXP as u32);
        encode_reverse_bits(&mut self.probs, enc, Self::BITS, symbol)
    }

    pub fn decode_bit_tree(&mut self, dec: &mut RangeDecoder<impl Read>) -> Result<u32> {
        let mut symbol: u32 = 1;
        loop {
            symbol = (symbol << 1) | dec.decode_bit(&mut self.probs[symbol as usize])?;
            if symbol >= BITS_EXP as u32 {
                break;
            }
        }
        Ok(symbol - BITS_EXP as u32)
    }

    pub fn decode_reverse_bit_tree(&mut self, dec: &mut RangeDecoder<impl Read>) -> Result<u32> {
        decode_reverse_bits(&mut self.probs, dec, Self::BITS)
    }

    pub fn get_bit_tree_price(&self, symbol: u32) -> RangeEncPrice {
        let mut price = RangeEncPrice::zero();
        let mut symbol = symbol | BITS_EXP as u32;
        loop {
            let bit = symbol & 1;
            symbol >>= 1;
            price += self.probs[symbol as usize].get_bit_price(bit);
            if symbol == 1 {
                break;
            }
        }
        price
    }

    pub fn get_reverse_bit_tree_price(&self, symbol: u32) -> RangeEncPrice {
        get_reverse_bits_price(&self.probs, Self::BITS, symbol)
    }
}

/// Encode the lowest `num_bits` of `symbol` LSB first, walking a tree stored at
/// `probs[1..1 << num_bits]`. The distance coder keeps several of these trees in one
/// flat array and passes a sub-slice.
pub fn encode_reverse_bits(
    probs: &mut [RangeEncProbability],
    enc: &mut RangeEncoder<impl Write>,
    num_bits: u32,
    mut symbol: u32,
) -> Result<()> {
    let mut index = 1usize;
    for _ in 0..num_bits {
        let bit = symbol & 1;
        symbol >>= 1;
        enc.encode_bit(&mut probs[index], bit)?;
        index = (index << 1) | bit as usize;
    }
    Ok(())
}

pub fn decode_reverse_bits(
    probs: &mut [RangeEncProbability],
    dec: &mut RangeDecoder<impl Read>,
    num_bits: u32,
) -> Result<u32> {
    let mut index = 1usize;
    let mut result = 0;
    for i in 0..num_bits {
        let bit = dec.decode_bit(&mut probs[index])?;
        index = (index << 1) | bit as usize;
        result |= bit << i;
    }
    Ok(result)
}

pub fn get_reverse_bits_price(
    probs: &[RangeEncProbability],
    num_bits: u32,
    mut symbol: u32,
) -> RangeEncPrice {
    let mut price = RangeEncPrice::zero();
    let mut index = 1usize;
    for _ in 0..num_bits {
        let bit = symbol & 1;
        symbol >>= 1;
        price += probs[index].get_bit_price(bit);
        index = (index << 1) | bit as usize;
    }
    price
}
