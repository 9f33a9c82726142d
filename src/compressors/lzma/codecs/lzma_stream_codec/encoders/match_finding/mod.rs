use super::super::data_buffers::EncoderDataBuffer;

mod bin_tree;
pub mod bt2;
pub mod bt4;
pub mod utils;

#[cfg(test)]
mod brute_force;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Match {
    pub distance: u32,
    pub len: u32,
}

pub trait MatchFinder {
    /// Lookahead needed before the finder indexes a position. Positions closer to the end
    /// of the input than this produce no matches.
    const MIN_FORWARDS_BYTES: u32;

    /// Writes the matches at the buffer head, shortest first. Each match is longer than the
    /// one before it and has a larger distance.
    fn find_and_write_matches(&mut self, buffer: &EncoderDataBuffer, matches: &mut Vec<Match>);

    /// Indexes the buffer head without looking for matches.
    fn skip_byte(&mut self, buffer: &EncoderDataBuffer);
}
