mod common;

use bufrtables::{ElementEntry, TableStore};
use common::{BitWriter, MASTER_VERSION, MessageBuilder, decode_one, fxy};
use libtreebufr::{Decoder, DecoderConfig, Value};
use proptest::prelude::*;
use std::sync::Arc;

fn decoder_for_width(width: u32) -> Decoder {
    let store = TableStore::new();
    store.insert_master(
        MASTER_VERSION,
        vec![ElementEntry::new(fxy(0, 13, 11), "Total precipitation", "kg m-2", 0, 0, width)],
        vec![],
    );
    Decoder::new(Arc::new(store), DecoderConfig::default())
}

fn decode_raw(width: u32, raw: u64) -> Value {
    let mut bits = BitWriter::new();
    bits.put(raw, width as usize);
    let bytes = MessageBuilder::new(&[fxy(0, 13, 11)], bits.to_bytes()).build();
    let decoded = decode_one(&mut decoder_for_width(width), &bytes);
    decoded.observations[0].leaves()[0].value().cloned().unwrap()
}

proptest! {
    #[test]
    fn all_ones_is_missing(width in 1u32..=64) {
        let all_ones = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
        prop_assert_eq!(decode_raw(width, all_ones), Value::Missing);
        prop_assert_eq!(decode_raw(width, all_ones - 1), Value::Number((all_ones - 1) as f64));
    }
}

#[test]
fn test_flags_are_never_missing() {
    let mut bits = BitWriter::new();
    bits.put(1, 1);
    let bytes = MessageBuilder::new(&[fxy(0, 31, 31)], bits.to_bytes()).build();
    let decoded = decode_one(&mut common::decoder(), &bytes);
    assert_eq!(decoded.observations[0].leaves()[0].value(), Some(&Value::Code(1)));
}
