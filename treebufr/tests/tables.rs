mod common;

use common::{BitWriter, MessageBuilder, decoder, decoder_with, events, fxy};
use libtreebufr::{DecoderConfig, Error, StreamEvent, Value};

/// Category 11 message defining element 0-63-200.
fn table_message() -> Vec<u8> {
    let mut bits = BitWriter::new();
    bits.put_str("0", 1)
        .put_str("63", 2)
        .put_str("200", 3)
        .put_str("LOCAL TEMPERATURE", 32)
        .put_str("", 32)
        .put_str("K", 24)
        .put_str("+", 1)
        .put_str("1", 3)
        .put_str("-", 1)
        .put_str("500", 10)
        .put_str("12", 3);
    let descriptors: Vec<_> = (10..=20).map(|y| fxy(0, 0, y)).collect();
    MessageBuilder::new(&descriptors, bits.to_bytes())
        .category(11)
        .build()
}

fn local_message() -> Vec<u8> {
    let mut bits = BitWriter::new();
    bits.put(1000, 12);
    MessageBuilder::new(&[fxy(0, 63, 200)], bits.to_bytes()).build()
}

#[test]
fn test_embedded_element_applies_to_later_messages() {
    let mut stream = table_message();
    let offset = stream.len();
    stream.extend(local_message());

    let mut decoder = decoder();
    let found = events(&mut decoder, &stream);
    assert_eq!(found.len(), 2);
    assert!(matches!(
        found[0],
        StreamEvent::TablesLoaded {
            offset: 0,
            elements: 1,
            sequences: 0
        }
    ));

    let StreamEvent::Decoded(decoded) = &found[1] else {
        panic!("local message was not decoded: {:?}", found[1]);
    };
    assert_eq!(decoded.message.offset(), offset);
    assert!(!decoded.incomplete);
    let field = decoded.observations[0].record.by_fxy(fxy(0, 63, 200)).unwrap();
    assert_eq!(field.name, "LOCAL TEMPERATURE");
    assert_eq!(field.unit, "K");
    assert_eq!(field.value(), Some(&Value::Number(50.0)));
}

#[test]
fn test_embedded_tables_can_be_disabled() {
    let mut decoder = decoder_with(DecoderConfig {
        apply_embedded_tables: false,
        ..Default::default()
    });
    let found = events(&mut decoder, &table_message());
    let StreamEvent::Decoded(decoded) = &found[0] else {
        panic!("table message was not decoded: {:?}", found[0]);
    };
    assert!(decoded.message.is_table_message());
    let name = decoded.observations[0].record.by_fxy(fxy(0, 0, 13)).unwrap();
    assert_eq!(name.value(), Some(&Value::String("LOCAL TEMPERATURE".into())));
}

#[test]
fn test_unknown_local_element_is_incomplete() {
    // The unknown element reads no bits, so the declared size cannot match.
    let found = events(&mut decoder(), &local_message());
    assert!(matches!(
        found.as_slice(),
        [StreamEvent::Rejected {
            error: Error::SizeMismatch { consumed_bits: 0, .. },
            ..
        }]
    ));
}
