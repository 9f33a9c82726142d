/// The match finder's position counter. It isn't absolute: once it reaches 0x7FFFFFFF every
/// stored position is shifted down, together with the counter.
///
/// Stored positions are raw `u32` values so that tables of them can be zero-allocated. A
/// stored 0 is never within reach of the counter, which starts above the window size.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MatchReadPos(u32);

impl MatchReadPos {
    const MAX_SAFE_READ_POS: u32 = 0x7FFFFFFF;

    pub fn new(pos: u32) -> Self {
        Self(pos)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn increment(&mut self) -> PosIncrementResult {
        self.0 += 1;

        if self.0 >= Self::MAX_SAFE_READ_POS {
            PosIncrementResult::ShouldNormalize
        } else {
            PosIncrementResult::Ok
        }
    }

    /// How far the counter and every stored position get shifted down, keeping the last
    /// `window` positions distinguishable.
    pub fn get_norm_offset(self, window: u32) -> u32 {
        debug_assert!(self.0 > window, "normalizing at an unexpected position");
        self.0 - window
    }

    pub fn subtract_offset(&mut self, offset: u32) {
        debug_assert!(offset <= self.0, "normalizing offset is too high");
        self.0 -= offset;
    }

    /// Distance from a stored position to the counter. 1 is the previous position.
    pub fn delta(self, stored: u32) -> u32 {
        self.0.wrapping_sub(stored)
    }
}

#[must_use]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PosIncrementResult {
    Ok,
    ShouldNormalize,
}

/// Shift stored positions down by `offset`. Positions that fall off the bottom become 0.
pub fn normalize(positions: &mut [u32], offset: u32) {
    for pos in positions {
        *pos = pos.saturating_sub(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_requests_normalization() {
        let mut pos = MatchReadPos::new(0x7FFFFFFD);
        assert_eq!(pos.increment(), PosIncrementResult::Ok);
        assert_eq!(pos.increment(), PosIncrementResult::ShouldNormalize);

        let offset = pos.get_norm_offset(100);
        pos.subtract_offset(offset);
        assert_eq!(pos.value(), 100);
    }

    #[test]
    fn test_normalize_keeps_deltas() {
        let read = MatchReadPos::new(1000);
        let mut stored = [0, 10, 950, 999];
        let before: Vec<u32> = stored.iter().map(|&s| read.delta(s)).collect();

        normalize(&mut stored, 900);
        let mut read = read;
        read.subtract_offset(900);

        assert_eq!(stored, [0, 0, 50, 99]);
        assert_eq!(read.delta(stored[2]), before[2]);
        assert_eq!(read.delta(stored[3]), before[3]);
    }
}
