use lazy_static::lazy_static;

use super::{RangeEncProbability, BIT_MODEL_TOTAL, BIT_MODEL_TOTAL_BITS};

const MOVE_REDUCING_BITS: u32 = 2;
const BIT_PRICE_SHIFT_BITS: u32 = 6;

const PRICE_TABLE_BITS: u32 = BIT_MODEL_TOTAL_BITS - MOVE_REDUCING_BITS;
const PRICE_TABLE_SIZE: usize = 1 << PRICE_TABLE_BITS;

lazy_static! {
    /// Approximate cost of coding a bit, indexed by its probability with the
    /// lowest `MOVE_REDUCING_BITS` dropped. Prices are in 1/64ths of a bit.
    static ref PROB_PRICES: [u32; PRICE_TABLE_SIZE] = build_price_table();
}

fn build_price_table() -> [u32; PRICE_TABLE_SIZE] {
    let mut prices = [0u32; PRICE_TABLE_SIZE];

    for i in (0..PRICE_TABLE_BITS).rev() {
        let start = 1u32 << (PRICE_TABLE_BITS - i - 1);
        let end = 1u32 << (PRICE_TABLE_BITS - i);
        for j in start..end {
            prices[j as usize] = (i << BIT_PRICE_SHIFT_BITS)
                + (((end - j) << BIT_PRICE_SHIFT_BITS) >> (PRICE_TABLE_BITS - i - 1));
        }
    }

    prices
}

/// The estimated cost of encoding some symbols, used by the encoder to compare choices.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RangeEncPrice(u32);

impl RangeEncPrice {
    pub const fn zero() -> Self {
        Self(0)
    }

    /// A price higher than anything real encoding can add up to.
    pub const fn infinity() -> Self {
        Self(1 << 30)
    }

    pub fn is_infinite(self) -> bool {
        self >= Self::infinity()
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn get_bit_price(prob: RangeEncProbability, bit: u32) -> Self {
        let prob = prob.0 as u32;
        let index = if bit == 0 {
            prob
        } else {
            BIT_MODEL_TOTAL - prob
        };
        Self(PROB_PRICES[(index >> MOVE_REDUCING_BITS) as usize])
    }

    pub fn get_direct_bits_price(count: u32) -> Self {
        Self(count << BIT_PRICE_SHIFT_BITS)
    }
}

impl std::ops::Add for RangeEncPrice {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for RangeEncPrice {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
