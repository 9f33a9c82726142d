//! Property-based round trips over random data and random encoder settings.

use proptest::prelude::*;

use lzmacodec::{compress, decompress, LzmaOptions, MatchFinderKind};

/// Bytes from a tiny alphabet, so matches of every length show up.
fn repetitive_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..4, 0..3000)
}

fn random_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2000)
}

fn options_strategy() -> impl Strategy<Value = LzmaOptions> {
    (
        0u32..=8,
        0u32..=4,
        0u32..=4,
        0u32..=2,
        prop_oneof![Just(MatchFinderKind::BT2), Just(MatchFinderKind::BT4)],
        any::<bool>(),
        prop_oneof![Just(5u32), Just(32), Just(128), Just(273)],
        prop_oneof![Just(0u32), Just(12), Just(16), Just(23)],
    )
        .prop_map(
            |(lc, lp, pb, algorithm, match_finder, end_marker, fast_bytes, dict_bits)| {
                LzmaOptions::default()
                    .with_lc(lc)
                    .with_lp(lp)
                    .with_pb(pb)
                    .with_algorithm(algorithm)
                    .with_match_finder(match_finder)
                    .with_end_marker(end_marker)
                    .with_fast_bytes(fast_bytes)
                    .with_dict_bits(dict_bits)
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    })]

    /// Property: any valid settings reproduce repetitive input exactly.
    #[test]
    fn prop_repetitive_roundtrip(
        data in repetitive_data_strategy(),
        options in options_strategy(),
    ) {
        let compressed = compress(&data, &options).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        prop_assert_eq!(decompressed, data);
    }

    /// Property: any valid settings reproduce random input exactly.
    #[test]
    fn prop_random_roundtrip(
        data in random_data_strategy(),
        options in options_strategy(),
    ) {
        let compressed = compress(&data, &options).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        prop_assert_eq!(decompressed, data);
    }

    /// Property: the header always carries the properties byte for the settings used.
    #[test]
    fn prop_header_properties_byte(options in options_strategy()) {
        let compressed = compress(b"abc", &options).unwrap();
        let expected = ((options.pb * 5 + options.lp) * 9 + options.lc) as u8;
        prop_assert_eq!(compressed[0], expected);
        prop_assert_eq!(&compressed[1..5], &options.dict_size.to_le_bytes()[..]);
    }
}
