//! A brute force match finder, which compares the current position against every
//! distance in the window. Only used to check the real match finders.

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::super::super::super::length_codec::MATCH_LEN_MAX;
use super::super::super::data_buffers::EncoderDataBuffer;
use super::{Match, MatchFinder};

pub struct BruteForceMatchFinder {
    dict_size: u32,
}

impl BruteForceMatchFinder {
    pub fn new(dict_size: u32) -> Self {
        Self { dict_size }
    }

    /// Every match at `data[pos..]` that is longer than all closer ones.
    pub fn find_matches(&self, data: &[u8], pos: usize, matches: &mut Vec<Match>) {
        matches.clear();

        let max_len = (data.len() - pos).min(MATCH_LEN_MAX);
        let max_dist = pos.min(self.dict_size as usize);
        let mut len_best = 1;

        for distance in 0..max_dist {
            let start = pos - distance - 1;
            let len = (0..max_len)
                .take_while(|&i| data[start + i] == data[pos + i])
                .count();

            if len > len_best {
                len_best = len;
                matches.push(Match {
                    distance: distance as u32,
                    len: len as u32,
                });

                if len == max_len {
                    break;
                }
            }
        }
    }
}

pub fn random_data(len: usize, alphabet: u32, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(0..alphabet) as u8).collect()
}

/// Run `finder` over `data`, randomly skipping positions, and compare what it reports with
/// the brute force result.
///
/// Matches from the 2 and 3 byte hashes can be lost to collisions in BT4, so the longest
/// match is only required to be found when it is at least `exact_from` bytes long.
pub fn check_against_brute_force<M: MatchFinder>(
    data: &[u8],
    dict_size: u32,
    nice_len: u32,
    exact_from: u32,
    mut finder: M,
) {
    let mut buffer = EncoderDataBuffer::new(dict_size, data.len() as u32);
    buffer.append_data(data);

    let brute = BruteForceMatchFinder::new(dict_size);
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let mut found = Vec::new();
    let mut expected = Vec::new();

    while buffer.forwards_bytes() > 0 {
        let pos = buffer.pos() as usize;
        let forwards = buffer.forwards_bytes();

        if rng.gen_bool(0.25) {
            finder.skip_byte(&buffer);
            buffer.increment_pos();
            continue;
        }

        finder.find_and_write_matches(&buffer, &mut found);

        let mut prev_len = 1;
        for m in &found {
            assert!(m.len > prev_len, "lengths must grow at {}: {:?}", pos, found);
            assert!(m.len <= forwards.min(MATCH_LEN_MAX as u32));
            assert!(m.distance < dict_size);
            assert_eq!(buffer.get_match_length(0, m.distance, m.len), m.len, "at {}", pos);
            prev_len = m.len;
        }

        if forwards >= M::MIN_FORWARDS_BYTES {
            brute.find_matches(data, pos, &mut expected);

            let longest = expected.last().map_or(0, |m| m.len);
            let found_longest = found.last().map_or(0, |m| m.len);
            let nice_limit = nice_len.min(forwards);

            if longest >= nice_limit {
                assert!(found_longest >= nice_limit, "at {}: {:?}", pos, found);
            } else if longest >= exact_from {
                assert_eq!(found_longest, longest, "at {}: {:?}", pos, found);
            } else {
                assert!(found_longest <= longest);
            }
        } else {
            assert!(found.is_empty());
        }

        buffer.increment_pos();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brute_force_reports_growing_matches() {
        let data = b"abcXabcdYabcdeZabcdef";
        let finder = BruteForceMatchFinder::new(64);
        let mut matches = Vec::new();

        finder.find_matches(data, 15, &mut matches);
        assert_eq!(
            matches,
            vec![
                Match {
                    distance: 5,
                    len: 5
                },
            ]
        );

        // "abcde" is 5 back, just out of reach of a 5 byte window
        let finder = BruteForceMatchFinder::new(5);
        finder.find_matches(data, 15, &mut matches);
        assert!(matches.is_empty());
    }
}
