//! Property-based tests for the codecs.
//!
//! Values are generated against fixed schemas and must survive a write and
//! read in both encodings unchanged.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use proptest::prelude::*;

use avrokit::binary::varint::{decode_zigzag, put_zigzag};
use avrokit::{
    from_binary, from_binary_with_writer, from_json_str, parse_schema, to_binary,
    to_json_string, AvroValue, Schema,
};

const EVENT: &str = r#"{"type":"record","name":"Event","namespace":"test","fields":[
    {"name":"id","type":"long"},
    {"name":"name","type":"string"},
    {"name":"score","type":"double"},
    {"name":"tags","type":{"type":"array","items":"string"}},
    {"name":"attrs","type":{"type":"map","values":"int"}},
    {"name":"opt","type":["null","int"],"default":null},
    {"name":"choice","type":["string","long","boolean"]},
    {"name":"flag","type":"boolean","default":false}]}"#;

fn event_schema() -> Schema {
    parse_schema(EVENT).unwrap()
}

// ============================================================================
// Value Generators
// ============================================================================

fn arb_choice() -> impl Strategy<Value = AvroValue> {
    prop_oneof![
        "[a-z]{0,8}".prop_map(|s| AvroValue::Union(0, Box::new(AvroValue::String(s)))),
        any::<i64>().prop_map(|v| AvroValue::Union(1, Box::new(AvroValue::Long(v)))),
        any::<bool>().prop_map(|v| AvroValue::Union(2, Box::new(AvroValue::Boolean(v)))),
    ]
}

fn arb_opt() -> impl Strategy<Value = AvroValue> {
    prop_oneof![
        Just(AvroValue::Union(0, Box::new(AvroValue::Null))),
        any::<i32>().prop_map(|v| AvroValue::Union(1, Box::new(AvroValue::Int(v)))),
    ]
}

/// Map keys must be unique for the decoded value to compare equal.
fn arb_attrs() -> impl Strategy<Value = AvroValue> {
    prop::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..5).prop_map(|m| {
        AvroValue::Map(m.into_iter().map(|(k, v)| (k, AvroValue::Int(v))).collect())
    })
}

fn arb_event() -> impl Strategy<Value = AvroValue> {
    (
        any::<i64>(),
        "\\PC{0,16}",
        -1.0e6f64..1.0e6f64,
        prop::collection::vec("\\PC{0,6}", 0..4),
        arb_attrs(),
        arb_opt(),
        arb_choice(),
        any::<bool>(),
    )
        .prop_map(|(id, name, score, tags, attrs, opt, choice, flag)| {
            AvroValue::Record(vec![
                ("id".into(), AvroValue::Long(id)),
                ("name".into(), AvroValue::String(name)),
                ("score".into(), AvroValue::Double(score)),
                (
                    "tags".into(),
                    AvroValue::Array(tags.into_iter().map(AvroValue::String).collect()),
                ),
                ("attrs".into(), attrs),
                ("opt".into(), opt),
                ("choice".into(), choice),
                ("flag".into(), AvroValue::Boolean(flag)),
            ])
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_zigzag_round_trip(value in any::<i64>()) {
        let mut buf = Vec::new();
        put_zigzag(&mut buf, value);
        prop_assert!(buf.len() <= 10);
        let mut cursor = buf.as_slice();
        prop_assert_eq!(decode_zigzag(&mut cursor).unwrap(), value);
        prop_assert!(cursor.is_empty());
    }

    #[test]
    fn prop_record_binary_round_trip(event in arb_event()) {
        let schema = event_schema();
        let bytes = to_binary(&event, &schema).unwrap();
        prop_assert_eq!(from_binary(&bytes, &schema).unwrap(), event);
    }

    #[test]
    fn prop_record_json_round_trip(event in arb_event()) {
        let schema = event_schema();
        let text = to_json_string(&event, &schema).unwrap();
        prop_assert_eq!(from_json_str(&text, &schema).unwrap(), event);
    }

    #[test]
    fn prop_reader_sees_projection(event in arb_event()) {
        let writer = event_schema();
        let reader = parse_schema(
            r#"{"type":"record","name":"Event","namespace":"test","fields":[
                {"name":"flag","type":"boolean"},
                {"name":"id","type":"long"}]}"#,
        )
        .unwrap();
        let bytes = to_binary(&event, &writer).unwrap();
        let projected = from_binary_with_writer(&bytes, &writer, &reader).unwrap();
        prop_assert_eq!(projected.field("id"), event.field("id"));
        prop_assert_eq!(projected.field("flag"), event.field("flag"));
    }

    #[test]
    fn prop_decimal_round_trip(unscaled in any::<i64>(), scale in 0i64..8) {
        let schema = parse_schema(r#"{"type":"bytes","logicalType":"decimal"}"#).unwrap();
        let value = AvroValue::Decimal(BigDecimal::new(BigInt::from(unscaled), scale));
        let bytes = to_binary(&value, &schema).unwrap();
        prop_assert_eq!(&from_binary(&bytes, &schema).unwrap(), &value);
        let text = to_json_string(&value, &schema).unwrap();
        prop_assert_eq!(BigDecimal::from_str(&text).ok(), match &value {
            AvroValue::Decimal(d) => Some(d.clone()),
            _ => None,
        });
        prop_assert_eq!(from_json_str(&text, &schema).unwrap(), value);
    }
}
