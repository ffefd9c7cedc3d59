// Property tests for in-memory round trips

use bsig::{BsigReader, BsigWriter, ReaderOptions, SignalArray, WriterConfig};
use proptest::prelude::*;
use std::io::Cursor;

fn round_trip(config: WriterConfig, signal: &SignalArray) -> SignalArray {
    let mut writer = BsigWriter::new(Vec::new(), config).unwrap();
    writer.append_signal("sig", signal).unwrap();
    let bytes = writer.finish().unwrap();
    let reader = BsigReader::from_reader(Cursor::new(bytes), ReaderOptions::default()).unwrap();
    reader.read("sig").unwrap()
}

fn block_size() -> impl Strategy<Value = u32> {
    (8u32..=16).prop_map(|shift| 1 << shift)
}

/// Constant runs and slow ramps, which deflate far below the block size.
fn low_entropy_i64() -> impl Strategy<Value = Vec<i64>> {
    prop_oneof![
        (any::<i64>(), 0usize..20_000).prop_map(|(v, len)| vec![v; len]),
        (any::<i32>(), 0i64..3, 0usize..20_000).prop_map(|(start, step, len)| {
            (0..len as i64).map(|i| start as i64 + i * step).collect()
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_i16_arrays_round_trip(
        width in 1usize..6,
        rows in 0usize..400,
        seed in any::<i16>(),
        block_size in block_size(),
    ) {
        let flat: Vec<i16> = (0..width * rows)
            .map(|i| seed.wrapping_add((i as i16).wrapping_mul(31)))
            .collect();
        let signal = SignalArray::from_flat(flat, width).unwrap();
        let got = round_trip(WriterConfig::default().with_block_size(block_size), &signal);
        prop_assert_eq!(got, signal);
    }

    #[test]
    fn prop_f64_bits_round_trip(
        bits in prop::collection::vec(any::<u64>(), 0..700),
        block_size in block_size(),
    ) {
        let values: Vec<f64> = bits.iter().map(|&b| f64::from_bits(b)).collect();
        let got = round_trip(WriterConfig::default().with_block_size(block_size), &values.into());
        let got_bits: Vec<u64> = got
            .as_slice::<f64>()
            .unwrap()
            .iter()
            .map(|v| v.to_bits())
            .collect();
        prop_assert_eq!(got_bits, bits);
    }

    #[test]
    fn prop_read_range_matches_slice(
        data in prop::collection::vec(any::<u32>(), 1..600),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let (lo, hi) = {
            let (x, y) = (a.index(data.len() + 1), b.index(data.len() + 1));
            (x.min(y), x.max(y))
        };
        let mut writer =
            BsigWriter::new(Vec::new(), WriterConfig::default().with_block_size(256)).unwrap();
        writer.append("sig", data.clone()).unwrap();
        let bytes = writer.finish().unwrap();
        let reader =
            BsigReader::from_reader(Cursor::new(bytes), ReaderOptions::default()).unwrap();

        let got = reader.read_range("sig", lo as i64, Some(hi - lo)).unwrap();
        let expected: &[u32] = &data[lo..hi];
        prop_assert_eq!(got.as_slice::<u32>().unwrap_or(&[]), expected);
    }

    #[test]
    fn prop_low_entropy_round_trip(
        data in low_entropy_i64(),
        block_size in block_size(),
    ) {
        let signal = SignalArray::from(data.clone());
        let got = round_trip(WriterConfig::default().with_block_size(block_size), &signal);
        prop_assert_eq!(got.as_slice::<i64>().unwrap_or(&[]), data.as_slice());
    }
}
