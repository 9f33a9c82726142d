use super::super::super::data_buffers::EncoderDataBuffer;

use super::bin_tree::BinTree;
use super::utils::match_positions::normalize;
use super::{Match, MatchFinder};

const HASH_2_SIZE: usize = 1 << 16;

/// Binary tree match finder keyed directly by the next two bytes. Uses less memory than
/// BT4 on small dictionaries and never loses a 2 byte match to a hash collision.
pub struct BT2MatchFinder {
    hash2_table: Vec<u32>,
    tree: BinTree,
}

fn get_hash2(buffer: &EncoderDataBuffer) -> usize {
    (buffer.get_byte(0) as usize) << 8 | buffer.get_byte(1) as usize
}

impl BT2MatchFinder {
    pub fn get_mem_usage(dict_size: u32) -> u64 {
        (HASH_2_SIZE * std::mem::size_of::<u32>()) as u64 + BinTree::get_mem_usage(dict_size)
    }

    pub fn new(dict_size: u32, nice_len: u32, depth_limit: u32) -> Self {
        Self {
            hash2_table: vec![0; HASH_2_SIZE],
            tree: BinTree::new(dict_size, nice_len, depth_limit),
        }
    }

    #[cfg(test)]
    fn with_start_pos(mut self, pos: u32) -> Self {
        self.tree.set_start_pos(pos);
        self
    }

    fn move_pos(&mut self, buffer: &EncoderDataBuffer) -> u32 {
        if let Some(offset) = self.tree.move_pos() {
            normalize(&mut self.hash2_table, offset);
        }
        buffer.forwards_bytes()
    }

    /// Swaps the current position into the hash table, returning the previous one.
    fn update_hash(&mut self, buffer: &EncoderDataBuffer) -> u32 {
        let hash = get_hash2(buffer);
        std::mem::replace(&mut self.hash2_table[hash], self.tree.lz_pos().value())
    }
}

impl MatchFinder for BT2MatchFinder {
    const MIN_FORWARDS_BYTES: u32 = 2;

    fn find_and_write_matches(&mut self, buffer: &EncoderDataBuffer, matches: &mut Vec<Match>) {
        matches.clear();

        let avail = self.move_pos(buffer);
        if avail < Self::MIN_FORWARDS_BYTES {
            return;
        }
        let limits = self.tree.get_limits(avail);
        let current_match = self.update_hash(buffer);

        self.tree.search(buffer, current_match, limits, 1, matches);
    }

    fn skip_byte(&mut self, buffer: &EncoderDataBuffer) {
        let avail = self.move_pos(buffer);
        if avail < Self::MIN_FORWARDS_BYTES {
            return;
        }
        let limits = self.tree.get_limits(avail);
        let current_match = self.update_hash(buffer);

        self.tree.skip(buffer, current_match, limits.nice_len_limit);
    }
}
