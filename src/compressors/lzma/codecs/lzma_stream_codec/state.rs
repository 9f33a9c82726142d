pub const REPS: usize = 4;

pub const STATES: usize = 12;

const LIT_STATES: u8 = 7;

const LIT_LIT: u8 = 0;
const SHORTREP_LIT_LIT: u8 = 3;
const LIT_MATCH: u8 = 7;
const LIT_LONGREP: u8 = 8;
const LIT_SHORTREP: u8 = 9;
const NONLIT_MATCH: u8 = 10;
const NONLIT_REP: u8 = 11;

/// The kind of the last few symbols plus the four most recent match distances.
///
/// States 0-6 follow a literal, 7-11 follow a match or rep. Distances are stored as
/// `distance - 1`, so rep0 = 0 copies the previous byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct State {
    reps: [u32; REPS],
    state: u8,
}

impl State {
    pub fn new() -> Self {
        Self {
            state: LIT_LIT,
            reps: [0; REPS],
        }
    }

    /// Index into the per-state probability tables.
    pub fn index(&self) -> usize {
        self.state as usize
    }

    pub fn get_rep(&self, index: usize) -> u32 {
        self.reps[index]
    }

    pub fn reps(&self) -> &[u32; REPS] {
        &self.reps
    }

    pub fn update_literal(&mut self) {
        if self.state <= SHORTREP_LIT_LIT {
            self.state = LIT_LIT;
        } else if self.state <= LIT_SHORTREP {
            self.state -= 3;
        } else {
            self.state -= 6;
        }
    }

    #[inline(always)]
    pub fn update_match(&mut self, distance: u32) {
        self.reps.copy_within(0..REPS - 1, 1);
        self.reps[0] = distance;

        self.state = if self.state < LIT_STATES {
            LIT_MATCH
        } else {
            NONLIT_MATCH
        };
    }

    /// Move rep `rep` to the front and return its distance.
    #[inline(always)]
    pub fn update_long_rep(&mut self, rep: usize) -> u32 {
        let rep_value = self.reps[rep];
        self.reps.copy_within(0..rep, 1);
        self.reps[0] = rep_value;

        self.state = if self.state < LIT_STATES {
            LIT_LONGREP
        } else {
            NONLIT_REP
        };

        rep_value
    }

    #[inline(always)]
    pub fn update_short_rep(&mut self) {
        self.state = if self.state < LIT_STATES {
            LIT_SHORTREP
        } else {
            NONLIT_REP
        };
    }

    /// Whether the last symbol was a literal, in which case the next literal is coded
    /// without a match byte.
    pub fn is_literal(&self) -> bool {
        self.state < LIT_STATES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_chain_settles() {
        let mut state = State::new();
        state.update_match(10);
        assert_eq!(state.index(), 7);
        assert!(!state.is_literal());

        state.update_literal();
        assert_eq!(state.index(), 4);
        assert!(state.is_literal());
        state.update_literal();
        assert_eq!(state.index(), 1);
        state.update_literal();
        assert_eq!(state.index(), 0);
        state.update_literal();
        assert_eq!(state.index(), 0);
    }

    #[test]
    fn test_non_literal_transitions() {
        let mut state = State::new();
        state.update_short_rep();
        assert_eq!(state.index(), 9);
        state.update_short_rep();
        assert_eq!(state.index(), 11);
        state.update_match(1);
        assert_eq!(state.index(), 10);
        state.update_long_rep(0);
        assert_eq!(state.index(), 11);
        state.update_literal();
        assert_eq!(state.index(), 5);
        state.update_long_rep(0);
        assert_eq!(state.index(), 8);
        state.update_literal();
        assert_eq!(state.index(), 5);
        state.update_literal();
        assert_eq!(state.index(), 2);
    }

    #[test]
    fn test_rep_history() {
        let mut state = State::new();
        for d in [10, 20, 30, 40] {
            state.update_match(d);
        }
        assert_eq!(state.reps(), &[40, 30, 20, 10]);

        assert_eq!(state.update_long_rep(2), 20);
        assert_eq!(state.reps(), &[20, 40, 30, 10]);

        assert_eq!(state.update_long_rep(3), 10);
        assert_eq!(state.reps(), &[10, 20, 40, 30]);

        assert_eq!(state.update_long_rep(1), 20);
        assert_eq!(state.reps(), &[20, 10, 40, 30]);

        assert_eq!(state.update_long_rep(0), 20);
        assert_eq!(state.reps(), &[20, 10, 40, 30]);

        state.update_match(50);
        assert_eq!(state.reps(), &[50, 20, 10, 40]);
    }
}
