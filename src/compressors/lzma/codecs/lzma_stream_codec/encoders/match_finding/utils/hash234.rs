use lazy_static::lazy_static;

use super::match_positions::normalize;

const HASH_2_SIZE: usize = 1 << 10;
const HASH_2_MASK: u32 = HASH_2_SIZE as u32 - 1;
const HASH_3_SIZE: usize = 1 << 16;
const HASH_3_MASK: u32 = HASH_3_SIZE as u32 - 1;

lazy_static! {
    static ref CRC_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut r = i as u32;
            for _ in 0..8 {
                r = if r & 1 != 0 { (r >> 1) ^ 0xEDB88320 } else { r >> 1 };
            }
            *entry = r;
        }
        table
    };
}

/// Table slots for the 2, 3 and 4 byte hashes of one position.
#[derive(Debug, Clone, Copy)]
pub struct HashIndex {
    hash2: usize,
    hash3: usize,
    hash4: usize,
}

/// The most recent positions seen for each 2, 3 and 4 byte hash.
///
/// Given equal first bytes, equal 2 and 3 byte hashes imply equal second and third bytes,
/// so only the 4 byte hash can collide.
pub struct Hash234 {
    hash2_table: Vec<u32>,
    hash3_table: Vec<u32>,
    hash4_table: Vec<u32>,
    hash4_mask: u32,
}

impl Hash234 {
    fn get_hash4_size(dict_size: u32) -> usize {
        let mut h = dict_size.max(1) - 1;
        h |= h >> 1;
        h |= h >> 2;
        h |= h >> 4;
        h |= h >> 8;
        h >>= 1;
        h |= 0xFFFF;
        if h > (1 << 24) {
            h >>= 1;
        }
        h as usize + 1
    }

    pub fn get_mem_usage(dict_size: u32) -> u64 {
        let entries = HASH_2_SIZE + HASH_3_SIZE + Self::get_hash4_size(dict_size);
        (entries * std::mem::size_of::<u32>()) as u64
    }

    pub fn new(dict_size: u32) -> Self {
        let hash4_size = Self::get_hash4_size(dict_size);
        Self {
            hash2_table: vec![0; HASH_2_SIZE],
            hash3_table: vec![0; HASH_3_SIZE],
            hash4_table: vec![0; hash4_size],
            hash4_mask: hash4_size as u32 - 1,
        }
    }

    pub fn calc_hash_index(&self, bytes: [u8; 4]) -> HashIndex {
        let mut temp = CRC_TABLE[bytes[0] as usize] ^ bytes[1] as u32;
        let hash2 = temp & HASH_2_MASK;

        temp ^= (bytes[2] as u32) << 8;
        let hash3 = temp & HASH_3_MASK;

        temp ^= CRC_TABLE[bytes[3] as usize] << 5;
        let hash4 = temp & self.hash4_mask;

        HashIndex {
            hash2: hash2 as usize,
            hash3: hash3 as usize,
            hash4: hash4 as usize,
        }
    }

    /// The stored 2, 3 and 4 byte positions.
    pub fn get_table_values(&self, index: &HashIndex) -> (u32, u32, u32) {
        (
            self.hash2_table[index.hash2],
            self.hash3_table[index.hash3],
            self.hash4_table[index.hash4],
        )
    }

    pub fn update_tables(&mut self, index: &HashIndex, pos: u32) {
        self.hash2_table[index.hash2] = pos;
        self.hash3_table[index.hash3] = pos;
        self.hash4_table[index.hash4] = pos;
    }

    pub fn normalize(&mut self, offset: u32) {
        normalize(&mut self.hash2_table, offset);
        normalize(&mut self.hash3_table, offset);
        normalize(&mut self.hash4_table, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_table() {
        assert_eq!(CRC_TABLE[0], 0);
        assert_eq!(CRC_TABLE[1], 0x77073096);
        assert_eq!(CRC_TABLE[255], 0x2D02EF8D);
    }

    #[test]
    fn test_hash4_size() {
        assert_eq!(Hash234::get_hash4_size(1), 1 << 16);
        assert_eq!(Hash234::get_hash4_size(1 << 20), 1 << 19);
        assert_eq!(Hash234::get_hash4_size(1 << 26), 1 << 24);
        assert_eq!(Hash234::get_hash4_size(1 << 30), 1 << 28);
    }

    #[test]
    fn test_short_hashes_are_exact_given_the_first_byte() {
        let hash = Hash234::new(1 << 16);
        let base = hash.calc_hash_index([7, 1, 2, 3]);
        for b1 in 0..=255u8 {
            for b2 in [0u8, 2, 200] {
                let other = hash.calc_hash_index([7, b1, b2, 3]);
                assert_eq!(other.hash2 == base.hash2, b1 == 1);
                assert_eq!(other.hash3 == base.hash3, b1 == 1 && b2 == 2);
            }
        }
    }

    #[test]
    fn test_tables_round_trip() {
        let mut hash = Hash234::new(4096);
        let index = hash.calc_hash_index(*b"abcd");
        assert_eq!(hash.get_table_values(&index), (0, 0, 0));

        hash.update_tables(&index, 5000);
        assert_eq!(hash.get_table_values(&index), (5000, 5000, 5000));

        hash.normalize(4000);
        assert_eq!(hash.get_table_values(&index), (1000, 1000, 1000));
    }
}
