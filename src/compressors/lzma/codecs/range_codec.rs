//! # Range Encoding and Decoding for LZMA
//!
//! ### Range Encoding
//!
//! Range encoding is a variant of arithmetic encoding that uses two main
//! variables: `low` and `range`. The `low` variable stores the lower bound
//! of the current range of the output, and `range` stores the size of the
//! current range. As each symbol is encoded, `low` and `range` are updated
//! to narrow down the range of possible output values. The most probable
//! symbols take up a larger portion of this range.
//!
//! Output bytes are not written eagerly. The top byte of `low` can still change
//! through a carry until enough lower bits have settled, so the encoder keeps the
//! last settled byte in `cache` plus a count of pending `0xFF` bytes behind it, and
//! only writes them out once the carry is known. [`RangeEncoder::finish`] flushes
//! whatever is still pending.
//!
//! ### Probability Modeling
//!
//! This implementation utilizes `RangeEncProbability`, instead of the usual
//! u16 used in other implementations, to make it more clear what's a
//! probability. Probabilities are used by the algorithm to determine how
//! likely a given symbol is to occur.

mod price;
mod probability;

pub use price::*;
pub use probability::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use std::io::{Read, Write};

use crate::error::{LzmaError, Result};

const SHIFT_BITS: u32 = 8;
const TOP_MASK: u32 = 0xFF000000;
const BIT_MODEL_TOTAL_BITS: u32 = 11;
const BIT_MODEL_TOTAL: u32 = 1 << BIT_MODEL_TOTAL_BITS;
const MOVE_BITS: u32 = 5;

const K_TOP_VALUE: u32 = 1 << (32 - SHIFT_BITS);

pub struct RangeEncoder<W: Write> {
    low: u64,
    range: u32,
    cache_size: u32,
    cache: u8,
    stream: W,
}

impl<W: Write> RangeEncoder<W> {
    pub fn new(inner: W) -> Self {
        Self {
            low: 0,
            range: 0xFFFFFFFFu32,
            cache_size: 1,
            cache: 0,
            stream: inner,
        }
    }

    pub fn inner(&self) -> &W {
        &self.stream
    }

    /// Flush the pending cache bytes and the remaining bits of `low`, returning the sink.
    pub fn finish(mut self) -> Result<W> {
        for _i in 0..5 {
            self.shift_low()?;
        }

        Ok(self.stream)
    }

    fn shift_low(&mut self) -> Result<()> {
        let low_hi = (self.low >> 32) as u32;

        if low_hi != 0 || self.low < 0xFF000000u64 {
            let mut temp = self.cache;
            loop {
                self.stream.write_u8((temp as u32 + low_hi) as u8)?;
                temp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = (self.low & 0x00FFFFFF) << 8;

        Ok(())
    }

    pub fn encode_bit(&mut self, prob: &mut RangeEncProbability, bit: u32) -> Result<()> {
        let bound = (self.range >> BIT_MODEL_TOTAL_BITS) * prob.0 as u32;
        if bit == 0 {
            self.range = bound;
            prob.increment();
        } else {
            self.low += bound as u64;
            self.range -= bound;
            prob.decrement();
        }

        if self.range & TOP_MASK == 0 {
            self.range <<= SHIFT_BITS;
            self.shift_low()?;
        }
        Ok(())
    }

    /// Encode the lowest `count` bits of `value`, MSB first, at a fixed 50/50 probability.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) -> Result<()> {
        for i in (0..count).rev() {
            self.range >>= 1;

            let bit = (value >> i) & 1;
            let m = 0u32.wrapping_sub(bit); // 0 or 0xFFFFFFFF
            self.low += (self.range & m) as u64;

            if self.range & TOP_MASK == 0 {
                self.range <<= SHIFT_BITS;
                self.shift_low()?;
            }
        }
        Ok(())
    }
}

pub struct RangeDecoder<R: Read> {
    stream: R,
    range: u32,
    code: u32,
}

impl<R: Read> RangeDecoder<R> {
    pub fn new(mut stream: R) -> Result<Self> {
        let b = stream.read_u8().map_err(LzmaError::from_read)?;
        if b != 0x00 {
            return Err(LzmaError::corrupt(
                "first byte of the range coded data must be 0x00",
            ));
        }
        let code = stream
            .read_u32::<BigEndian>()
            .map_err(LzmaError::from_read)?;
        Ok(Self {
            stream,
            code,
            range: 0xFFFFFFFFu32,
        })
    }

    pub fn inner(&self) -> &R {
        &self.stream
    }

    /// A cleanly finished stream leaves no difference between `code` and the encoder's `low`.
    pub fn is_finished(&self) -> bool {
        self.code == 0
    }

    fn normalize(&mut self) -> Result<()> {
        if self.range < K_TOP_VALUE {
            let next = self.stream.read_u8().map_err(LzmaError::from_read)? as u32;
            self.code = (self.code << SHIFT_BITS) | next;
            self.range <<= SHIFT_BITS;
        }
        Ok(())
    }

    /// Decode a bit with a given probability
    pub fn decode_bit(&mut self, prob: &mut RangeEncProbability) -> Result<u32> {
        self.normalize()?;
        let bound = (self.range >> BIT_MODEL_TOTAL_BITS) * prob.0 as u32;
        if self.code < bound {
            self.range = bound;
            prob.increment();
            Ok(0)
        } else {
            self.range -= bound;
            self.code -= bound;
            prob.decrement();
            Ok(1)
        }
    }

    /// Decode bits assuming the probability is 50/50
    pub fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        let mut result = 0;
        for _ in 0..count {
            self.normalize()?;

            self.range >>= 1;

            let t = (self.code.wrapping_sub(self.range)) >> 31; // 0 or 1
            self.code -= self.range & (t.wrapping_sub(1)); // If 0, subtract range. If 1, subtract 0
            let bit = 1 - t;

            result = (result << 1) | bit;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_direct_bits() {
        let mut buf = Vec::new();

        let mut encoder = RangeEncoder::new(&mut buf);
        for i in 0..100u32 {
            encoder.encode_direct_bits(i * 2 + 1, 8).unwrap();
        }
        encoder.finish().unwrap();

        // The leading cache byte, one byte per 8 direct bits and 4 flushed bytes of `low`
        assert_eq!(buf.len(), 105);

        let mut decoder = RangeDecoder::new(Cursor::new(buf)).unwrap();
        for i in 0..100u32 {
            let result = decoder.decode_direct_bits(8).unwrap();
            assert_eq!(result, (i * 2 + 1) & 0xFF);
        }

        assert!(decoder.is_finished());
    }

    #[test]
    fn test_mixed_bits() {
        let mut buf = Vec::new();

        let mut probs = [RangeEncProbability::new(); 4];
        let mut encoder = RangeEncoder::new(&mut buf);
        for i in 0..500u32 {
            encoder.encode_bit(&mut probs[(i % 4) as usize], (i / 3) & 1).unwrap();
            encoder.encode_direct_bits(i, 13).unwrap();
        }
        encoder.finish().unwrap();

        let mut probs = [RangeEncProbability::new(); 4];
        let mut decoder = RangeDecoder::new(Cursor::new(buf)).unwrap();
        for i in 0..500u32 {
            let bit = decoder.decode_bit(&mut probs[(i % 4) as usize]).unwrap();
            assert_eq!(bit, (i / 3) & 1);
            assert_eq!(decoder.decode_direct_bits(13).unwrap(), i & 0x1FFF);
        }

        assert!(decoder.is_finished());
    }

    #[test]
    fn test_skewed_bits_compress_well() {
        let mut buf = Vec::new();

        let mut prob = RangeEncProbability::new();
        let mut encoder = RangeEncoder::new(&mut buf);
        for _ in 0..1000 {
            encoder.encode_bit(&mut prob, 0).unwrap();
        }
        encoder.encode_bit(&mut prob, 1).unwrap();
        for _ in 0..1000 {
            encoder.encode_bit(&mut prob, 0).unwrap();
        }
        encoder.finish().unwrap();

        assert!(buf.len() < 30, "2001 skewed bits took {} bytes", buf.len());

        let mut prob = RangeEncProbability::new();
        let mut decoder = RangeDecoder::new(Cursor::new(buf)).unwrap();
        for _ in 0..1000 {
            assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 0);
        }
        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 1);
        for _ in 0..1000 {
            assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 0);
        }

        assert!(decoder.is_finished());
    }

    #[test]
    fn test_carry_propagation() {
        // Long runs of 1 bits at a low probability push carries through the cached 0xFF bytes
        let mut buf = Vec::new();

        let mut prob = RangeEncProbability::new();
        let mut encoder = RangeEncoder::new(&mut buf);
        for i in 0..5000u32 {
            let bit = u32::from(i % 7 != 0);
            encoder.encode_bit(&mut prob, bit).unwrap();
        }
        encoder.finish().unwrap();

        let mut prob = RangeEncProbability::new();
        let mut decoder = RangeDecoder::new(Cursor::new(buf)).unwrap();
        for i in 0..5000u32 {
            let bit = u32::from(i % 7 != 0);
            assert_eq!(decoder.decode_bit(&mut prob).unwrap(), bit);
        }
    }

    #[test]
    fn test_nonzero_first_byte_is_corrupt() {
        let err = RangeDecoder::new(Cursor::new(vec![1, 0, 0, 0, 0])).err().unwrap();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_truncated_input() {
        let err = RangeDecoder::new(Cursor::new(vec![0, 0])).err().unwrap();
        assert!(matches!(err, LzmaError::TruncatedInput));

        let mut decoder = RangeDecoder::new(Cursor::new(vec![0, 0x12, 0x34, 0x56, 0x78])).unwrap();
        let result = (0..64).try_for_each(|_| decoder.decode_direct_bits(8).map(|_| ()));
        assert!(matches!(result, Err(LzmaError::TruncatedInput)));
    }
}
