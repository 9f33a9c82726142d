use super::super::super::data_buffers::EncoderDataBuffer;

use super::bin_tree::BinTree;
use super::utils::hash234::Hash234;
use super::{Match, MatchFinder};

/// Binary tree match finder keyed by 4 byte hashes, with 2 and 3 byte hash tables for the
/// most recent short matches.
pub struct BT4MatchFinder {
    hash: Hash234,
    tree: BinTree,
}

fn get_next_4_bytes(buffer: &EncoderDataBuffer) -> [u8; 4] {
    [
        buffer.get_byte(0),
        buffer.get_byte(1),
        buffer.get_byte(2),
        buffer.get_byte(3),
    ]
}

impl BT4MatchFinder {
    pub fn get_mem_usage(dict_size: u32) -> u64 {
        Hash234::get_mem_usage(dict_size) + BinTree::get_mem_usage(dict_size)
    }

    pub fn new(dict_size: u32, nice_len: u32, depth_limit: u32) -> Self {
        Self {
            hash: Hash234::new(dict_size),
            tree: BinTree::new(dict_size, nice_len, depth_limit),
        }
    }

    #[cfg(test)]
    fn with_start_pos(mut self, pos: u32) -> Self {
        self.tree.set_start_pos(pos);
        self
    }

    /// Advance to the buffer head, returning the bytes available from it.
    fn move_pos(&mut self, buffer: &EncoderDataBuffer) -> u32 {
        if let Some(offset) = self.tree.move_pos() {
            self.hash.normalize(offset);
        }
        buffer.forwards_bytes()
    }
}

impl MatchFinder for BT4MatchFinder {
    const MIN_FORWARDS_BYTES: u32 = 4;

    fn find_and_write_matches(&mut self, buffer: &EncoderDataBuffer, matches: &mut Vec<Match>) {
        matches.clear();

        let avail = self.move_pos(buffer);
        if avail < Self::MIN_FORWARDS_BYTES {
            return;
        }
        let limits = self.tree.get_limits(avail);
        let lz_pos = self.tree.lz_pos();

        let index = self.hash.calc_hash_index(get_next_4_bytes(buffer));
        let (hash2_pos, hash3_pos, current_match) = self.hash.get_table_values(&index);
        self.hash.update_tables(&index, lz_pos.value());

        let mut delta2 = lz_pos.delta(hash2_pos);
        let delta3 = lz_pos.delta(hash3_pos);
        let mut len_best = 0;

        // The hashes are exact past the first byte, so only that one needs checking
        if self.tree.is_in_window(delta2) && buffer.get_byte(-(delta2 as i32)) == buffer.get_byte(0) {
            len_best = 2;
            matches.push(Match {
                distance: delta2 - 1,
                len: 2,
            });
        }

        if delta2 != delta3
            && self.tree.is_in_window(delta3)
            && buffer.get_byte(-(delta3 as i32)) == buffer.get_byte(0)
        {
            len_best = 3;
            matches.push(Match {
                distance: delta3 - 1,
                len: 3,
            });
            delta2 = delta3;
        }

        if let Some(last) = matches.last_mut() {
            len_best = buffer.get_match_length(len_best, delta2 - 1, limits.match_len_limit);
            last.len = len_best;

            if len_best >= limits.nice_len_limit {
                self.tree.skip(buffer, current_match, limits.nice_len_limit);
                return;
            }
        }

        // Anything the tree finds shares the 4 byte hash
        self.tree
            .search(buffer, current_match, limits, len_best.max(3), matches);
    }

    fn skip_byte(&mut self, buffer: &EncoderDataBuffer) {
        let avail = self.move_pos(buffer);
        if avail < Self::MIN_FORWARDS_BYTES {
            return;
        }
        let limits = self.tree.get_limits(avail);

        let index = self.hash.calc_hash_index(get_next_4_bytes(buffer));
        let (_, _, current_match) = self.hash.get_table_values(&index);
        self.hash.update_tables(&index, self.tree.lz_pos().value());

        self.tree.skip(buffer, current_match, limits.nice_len_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::super::brute_force::{check_against_brute_force, random_data};
    use super::*;

    #[test]
    fn test_finds_the_longest_matches() {
        let data = random_data(20_000, 4, 1);
        check_against_brute_force(&data, 1024, 32, 4, BT4MatchFinder::new(1024, 32, 1 << 16));
    }

    #[test]
    fn test_small_window_and_nice_len() {
        let data = random_data(8_000, 3, 2);
        check_against_brute_force(&data, 100, 5, 4, BT4MatchFinder::new(100, 5, 1 << 16));
    }

    #[test]
    fn test_long_repeats() {
        let mut data = random_data(3_000, 256, 3);
        let copy = data[500..2500].to_vec();
        data.extend_from_slice(&copy);
        data.extend(std::iter::repeat(b'z').take(1000));
        check_against_brute_force(&data, 4096, 273, 4, BT4MatchFinder::new(4096, 273, 1 << 16));
    }

    #[test]
    fn test_survives_normalization() {
        let data = random_data(6_000, 4, 4);
        let finder = BT4MatchFinder::new(512, 16, 1 << 16).with_start_pos(0x7FFFFFFF - 3_000);
        check_against_brute_force(&data, 512, 16, 4, finder);
    }

    #[test]
    fn test_matches_report_shortest_distance_first() {
        let data = b"abcdXabcdYabcdZabcdW";
        let mut buffer = EncoderDataBuffer::new(64, 64);
        buffer.append_data(data);

        let mut finder = BT4MatchFinder::new(64, 32, 64);
        let mut matches = Vec::new();
        for _ in 0..15 {
            finder.skip_byte(&buffer);
            buffer.increment_pos();
        }
        finder.find_and_write_matches(&buffer, &mut matches);

        // "abcdW" at 15: "abcd" at 10 (distance 4), nothing longer further back
        assert_eq!(
            matches,
            vec![Match {
                distance: 4,
                len: 4
            }]
        );
    }
}
