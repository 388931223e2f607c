mod common;

use bufrtables::FXY;
use common::{BitWriter, MessageBuilder, decode_one, decoder, events, fxy};
use libtreebufr::{Error, FieldData, StreamEvent, Value};

fn substitution_descriptors() -> Vec<FXY> {
    vec![
        fxy(0, 4, 1),
        fxy(0, 12, 101),
        fxy(2, 23, 0),
        fxy(1, 1, 2),
        fxy(0, 31, 31),
        fxy(2, 23, 255),
    ]
}

#[test]
fn test_fixed_replication_is_read_slot_by_slot() {
    let mut bits = BitWriter::new();
    // Slot 1: month 3 and missing, names sent as 8-byte increments.
    bits.put(3, 4).put(2, 6).put(0, 2).put(3, 2);
    bits.put(0, 64).put(8, 6).put_str("ONE", 8).put_str("TWO", 8);
    // Slot 2: constant columns.
    bits.put(5, 4).put(0, 6);
    bits.put_str("SAME", 8).put(0, 6);
    let bytes = MessageBuilder::new(
        &[fxy(1, 2, 2), fxy(0, 4, 2), fxy(0, 1, 15)],
        bits.to_bytes(),
    )
    .subsets(2)
    .compressed()
    .build();

    let decoded = decode_one(&mut decoder(), &bytes);
    assert_eq!(decoded.budget.slack(), 0);

    let slots: Vec<Vec<(Value, Value)>> = decoded
        .observations
        .iter()
        .map(|o| {
            let group = &o.record.fields[0];
            assert!(matches!(group.data, FieldData::Group(_)));
            group
                .records()
                .iter()
                .map(|r| {
                    (
                        r.fields[0].value().unwrap().clone(),
                        r.fields[1].value().unwrap().clone(),
                    )
                })
                .collect()
        })
        .collect();

    let name = |s: &str| Value::String(s.into());
    assert_eq!(
        slots,
        vec![
            vec![(Value::Number(3.0), name("ONE")), (Value::Number(5.0), name("SAME"))],
            vec![(Value::Missing, name("TWO")), (Value::Number(5.0), name("SAME"))],
        ]
    );
}

#[test]
fn test_substitution_marker_in_compressed_data() {
    let mut bits = BitWriter::new();
    bits.put(2024, 12).put(0, 6);
    bits.put(27315, 16).put(0, 6);
    // Year not present, temperature present, in both observations.
    bits.put(1, 1).put(0, 6);
    bits.put(0, 1).put(0, 6);
    bits.put(27400, 16).put(0, 6);
    let bytes = MessageBuilder::new(&substitution_descriptors(), bits.to_bytes())
        .subsets(2)
        .compressed()
        .build();

    let decoded = decode_one(&mut decoder(), &bytes);
    assert!(!decoded.incomplete);
    assert_eq!(decoded.budget.slack(), 0);
    for observation in &decoded.observations {
        let marker = &observation.record.fields[3];
        assert_eq!(marker.fxy, fxy(0, 12, 101));
        assert_eq!(marker.name, "Substituted Temperature/air temperature");
        assert_eq!(marker.value(), Some(&Value::Number(274.0)));
    }
}

#[test]
fn test_marker_targets_of_different_widths_are_rejected() {
    let mut bits = BitWriter::new();
    bits.put(2024, 12).put(0, 6);
    bits.put(27315, 16).put(0, 6);
    // The year is present in the first observation only.
    bits.put(0, 1).put(1, 6).put(0, 1).put(1, 1);
    bits.put(0, 1).put(0, 6);
    let bytes = MessageBuilder::new(&substitution_descriptors(), bits.to_bytes())
        .subsets(2)
        .compressed()
        .build();

    let found = events(&mut decoder(), &bytes);
    assert!(matches!(
        found.as_slice(),
        [StreamEvent::Rejected {
            error: Error::Compressed(_),
            ..
        }]
    ));
}

#[test]
fn test_associated_field_columns() {
    let mut bits = BitWriter::new();
    bits.put(1, 6).put(0, 6);
    // Associated bits 1 and 3; all ones is a value here, not missing.
    bits.put(0, 2).put(2, 6).put(1, 2).put(3, 2);
    bits.put(27315, 16).put(0, 6);
    let bytes = MessageBuilder::new(
        &[fxy(2, 4, 2), fxy(0, 31, 21), fxy(0, 12, 101), fxy(2, 4, 0)],
        bits.to_bytes(),
    )
    .subsets(2)
    .compressed()
    .build();

    let decoded = decode_one(&mut decoder(), &bytes);
    assert_eq!(decoded.budget.slack(), 0);

    let associated: Vec<Option<u64>> = decoded
        .observations
        .iter()
        .map(|o| {
            let temperature = o.record.by_fxy(fxy(0, 12, 101)).unwrap();
            assert_eq!(temperature.value(), Some(&Value::Number(273.15)));
            temperature.associated
        })
        .collect();
    assert_eq!(associated, vec![Some(1), Some(3)]);

    let significance = decoded.observations[0].record.by_fxy(fxy(0, 31, 21)).unwrap();
    assert_eq!(significance.associated, None);
}

#[test]
fn test_delayed_repetition_reads_the_body_once() {
    let descriptors = [fxy(1, 1, 0), fxy(0, 31, 11), fxy(0, 12, 101)];

    let mut bits = BitWriter::new();
    bits.put(3, 8).put(27315, 16);
    let plain = MessageBuilder::new(&descriptors, bits.to_bytes()).build();

    let mut bits = BitWriter::new();
    bits.put(3, 8).put(0, 6);
    bits.put(27315, 16).put(1, 6).put(0, 1).put(1, 1);
    let compressed = MessageBuilder::new(&descriptors, bits.to_bytes())
        .subsets(2)
        .compressed()
        .build();

    let repeated = |bytes: &[u8]| -> Vec<Vec<Value>> {
        let decoded = decode_one(&mut decoder(), bytes);
        assert_eq!(decoded.budget.slack(), 0);
        decoded
            .observations
            .iter()
            .map(|o| {
                o.leaves()
                    .iter()
                    .map(|f| f.value().unwrap().clone())
                    .collect()
            })
            .collect()
    };

    assert_eq!(repeated(&plain), vec![vec![Value::Number(273.15); 3]]);
    assert_eq!(
        repeated(&compressed),
        vec![
            vec![Value::Number(273.15); 3],
            vec![Value::Number(273.16); 3]
        ]
    );
}
