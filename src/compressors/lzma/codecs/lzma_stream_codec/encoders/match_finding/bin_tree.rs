//! The binary tree shared by the BT2 and BT4 match finders.
//!
//! Every position in the window owns two child slots in `tree`. Positions with a common
//! hash form a tree sorted by the bytes that follow them, with the newest position at the
//! root and older positions further down. Inserting the current position walks from the
//! old root towards the leaves, splitting the old tree into the new root's two subtrees,
//! and reports every match longer than the previous best along the way.
//!
//! Since parents are always newer than their children, the walk can stop at the first
//! position that has slid out of the window.

use super::super::super::data_buffers::EncoderDataBuffer;
use super::super::super::super::length_codec::MATCH_LEN_MAX;
use super::utils::match_positions::{normalize, MatchReadPos, PosIncrementResult};
use super::Match;

/// Length limits at the current position, cut down to the available lookahead.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub match_len_limit: u32,
    pub nice_len_limit: u32,
}

pub struct BinTree {
    /// Child slots, two per window position: `2 * cyclic_pos` holds the subtree of larger
    /// suffixes, `2 * cyclic_pos + 1` the smaller ones.
    tree: Vec<u32>,
    cyclic_size: u32,
    cyclic_pos: u32,
    lz_pos: MatchReadPos,

    depth_limit: u32,
    nice_len: u32,
}

impl BinTree {
    pub fn get_mem_usage(dict_size: u32) -> u64 {
        (dict_size as u64 + 1) * 2 * std::mem::size_of::<u32>() as u64
    }

    pub fn new(dict_size: u32, nice_len: u32, depth_limit: u32) -> Self {
        let cyclic_size = dict_size + 1;
        Self {
            tree: vec![0; cyclic_size as usize * 2],
            cyclic_size,
            cyclic_pos: 0,
            lz_pos: MatchReadPos::new(cyclic_size),

            depth_limit,
            nice_len,
        }
    }

    /// Start the position counter somewhere else, to reach normalization quickly in tests.
    #[cfg(test)]
    pub fn set_start_pos(&mut self, pos: u32) {
        self.lz_pos = MatchReadPos::new(pos);
    }

    pub fn lz_pos(&self) -> MatchReadPos {
        self.lz_pos
    }

    /// Whether a stored position is still inside the window.
    pub fn is_in_window(&self, delta: u32) -> bool {
        delta < self.cyclic_size
    }

    /// Move to the next position. Returns the offset to shift the caller's hash tables
    /// by when the counter had to be normalized.
    pub fn move_pos(&mut self) -> Option<u32> {
        self.cyclic_pos += 1;
        if self.cyclic_pos == self.cyclic_size {
            self.cyclic_pos = 0;
        }

        match self.lz_pos.increment() {
            PosIncrementResult::Ok => None,
            PosIncrementResult::ShouldNormalize => {
                let offset = self.lz_pos.get_norm_offset(self.cyclic_size);
                normalize(&mut self.tree, offset);
                self.lz_pos.subtract_offset(offset);
                Some(offset)
            }
        }
    }

    pub fn get_limits(&self, avail: u32) -> SearchLimits {
        SearchLimits {
            match_len_limit: avail.min(MATCH_LEN_MAX as u32),
            nice_len_limit: avail.min(self.nice_len),
        }
    }

    fn get_pair_index(&self, delta: u32) -> usize {
        let pair = if delta > self.cyclic_pos {
            self.cyclic_pos + self.cyclic_size - delta
        } else {
            self.cyclic_pos - delta
        };
        pair as usize * 2
    }

    /// Insert the current position under `current_match`, the newest position with the
    /// same hash, and push every match longer than `len_best` found on the way.
    pub fn search(
        &mut self,
        buffer: &EncoderDataBuffer,
        mut current_match: u32,
        limits: SearchLimits,
        mut len_best: u32,
        matches: &mut Vec<Match>,
    ) {
        let mut ptr0 = self.cyclic_pos as usize * 2 + 1;
        let mut ptr1 = self.cyclic_pos as usize * 2;
        let mut len0 = 0;
        let mut len1 = 0;

        for _ in 0..self.depth_limit {
            let delta = self.lz_pos.delta(current_match);
            if !self.is_in_window(delta) {
                break;
            }

            let pair = self.get_pair_index(delta);
            let mut len = len0.min(len1);

            if buffer.get_byte(len as i32 - delta as i32) == buffer.get_byte(len as i32) {
                len = buffer.get_match_length(len + 1, delta - 1, limits.match_len_limit);

                if len > len_best {
                    len_best = len;
                    matches.push(Match {
                        distance: delta - 1,
                        len,
                    });

                    if len >= limits.nice_len_limit {
                        // Long enough, the old node is replaced by the new one
                        self.tree[ptr1] = self.tree[pair];
                        self.tree[ptr0] = self.tree[pair + 1];
                        return;
                    }
                }
            }

            if buffer.get_byte(len as i32 - delta as i32) < buffer.get_byte(len as i32) {
                self.tree[ptr1] = current_match;
                ptr1 = pair + 1;
                current_match = self.tree[ptr1];
                len1 = len;
            } else {
                self.tree[ptr0] = current_match;
                ptr0 = pair;
                current_match = self.tree[ptr0];
                len0 = len;
            }
        }

        self.tree[ptr0] = 0;
        self.tree[ptr1] = 0;
    }

    /// Insert the current position without collecting matches. The walk stops at
    /// `nice_len_limit` bytes.
    pub fn skip(&mut self, buffer: &EncoderDataBuffer, mut current_match: u32, nice_len_limit: u32) {
        let mut ptr0 = self.cyclic_pos as usize * 2 + 1;
        let mut ptr1 = self.cyclic_pos as usize * 2;
        let mut len0 = 0;
        let mut len1 = 0;

        for _ in 0..self.depth_limit {
            let delta = self.lz_pos.delta(current_match);
            if !self.is_in_window(delta) {
                break;
            }

            let pair = self.get_pair_index(delta);
            let mut len = len0.min(len1);

            if buffer.get_byte(len as i32 - delta as i32) == buffer.get_byte(len as i32) {
                len = buffer.get_match_length(len + 1, delta - 1, nice_len_limit);
                if len >= nice_len_limit {
                    self.tree[ptr1] = self.tree[pair];
                    self.tree[ptr0] = self.tree[pair + 1];
                    return;
                }
            }

            if buffer.get_byte(len as i32 - delta as i32) < buffer.get_byte(len as i32) {
                self.tree[ptr1] = current_match;
                ptr1 = pair + 1;
                current_match = self.tree[ptr1];
                len1 = len;
            } else {
                self.tree[ptr0] = current_match;
                ptr0 = pair;
                current_match = self.tree[ptr0];
                len0 = len;
            }
        }

        self.tree[ptr0] = 0;
        self.tree[ptr1] = 0;
    }
}
