//! Logical types through the binary and JSON codecs.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, TimeZone, Utc};
use num_bigint::BigInt;
use serde_json::json;
use uuid::Uuid;

use avrokit::logical::{LogicalTarget, LogicalType};
use avrokit::{
    from_binary, from_json_str, parse_schema, parse_schema_with_options, to_binary,
    to_json_string, to_json_string_with_options, AnyValue, AvroValue, ConversionError,
    CustomLogicalType, DecodeError, EncodeError, JsonCodecOptions, LogicalTypeRegistry,
    ParseOptions, Properties, Schema, SchemaError, SchemaType,
};

fn schema(json: &str) -> Schema {
    parse_schema(json).unwrap()
}

fn dec(s: &str) -> AvroValue {
    AvroValue::Decimal(BigDecimal::from_str(s).unwrap())
}

fn round_trip(value: &AvroValue, s: &Schema) -> (AvroValue, AvroValue) {
    let binary = from_binary(&to_binary(value, s).unwrap(), s).unwrap();
    let json = from_json_str(&to_json_string(value, s).unwrap(), s).unwrap();
    (binary, json)
}

// ============================================================================
// Decimal
// ============================================================================

const MONEY: &str = r#"{"type":"bytes","logicalType":"decimal","precision":9,"scale":2}"#;

#[test]
fn test_decimal_binary_layout() {
    let s = schema(MONEY);
    let bytes = to_binary(&dec("12.30"), &s).unwrap();
    // length 2, scale 1, unscaled 123
    assert_eq!(bytes, vec![4, 2, 0x7b]);
    assert_eq!(from_binary(&bytes, &s).unwrap(), dec("12.3"));
}

#[test]
fn test_decimal_json_direct_and_physical() {
    let s = schema(MONEY);
    let direct = to_json_string(&dec("12.30"), &s).unwrap();
    assert_eq!(direct, "12.3");
    assert_eq!(from_json_str(&direct, &s).unwrap(), dec("12.3"));

    let physical = to_json_string_with_options(
        &dec("12.30"),
        &s,
        JsonCodecOptions::default().with_direct_decimals(false),
    )
    .unwrap();
    assert!(physical.starts_with('"'));
    // readers take either form
    assert_eq!(from_json_str(&physical, &s).unwrap(), dec("12.3"));
}

#[test]
fn test_decimal_precision_exceeded() {
    let s = schema(r#"{"type":"bytes","logicalType":"decimal","precision":5,"scale":2}"#);
    let expected = ConversionError::PrecisionExceeded {
        received: 6,
        max: 5,
    };
    assert!(matches!(
        to_binary(&dec("12345.6"), &s),
        Err(EncodeError::Conversion(e)) if e == expected
    ));
    assert!(matches!(
        to_json_string(&dec("12345.6"), &s),
        Err(EncodeError::Conversion(e)) if e == expected
    ));
    assert!(matches!(
        from_json_str("12345.6", &s),
        Err(DecodeError::Conversion(ConversionError::PrecisionExceeded { .. }))
    ));
}

#[test]
fn test_decimal_inexact_rescale_without_rounding() {
    let s = schema(MONEY);
    assert!(matches!(
        to_binary(&dec("1.005"), &s),
        Err(EncodeError::Conversion(ConversionError::InexactRescale { .. }))
    ));

    let rounded = schema(
        r#"{"type":"bytes","logicalType":"decimal","precision":9,"scale":2,"serRounding":"HALF_EVEN"}"#,
    );
    let bytes = to_binary(&dec("1.005"), &rounded).unwrap();
    assert_eq!(from_binary(&bytes, &rounded).unwrap(), dec("1"));
}

#[test]
fn test_decimal_fixed_and_string_encodings() {
    let fixed = schema(
        r#"{"type":"fixed","name":"Amount","size":8,"logicalType":"decimal","precision":12,"scale":3}"#,
    );
    let (binary, json) = round_trip(&dec("-42.125"), &fixed);
    assert_eq!(binary, dec("-42.125"));
    assert_eq!(json, dec("-42.125"));

    let text = schema(r#"{"type":"string","logicalType":"decimal","usePlainString":true}"#);
    let bytes = to_binary(&dec("1E+3"), &text).unwrap();
    assert_eq!(&bytes[1..], b"1000");
    assert_eq!(from_binary(&bytes, &text).unwrap(), dec("1000"));
}

#[test]
fn test_decimal_in_union() {
    let s = schema(&format!(r#"["null",{}]"#, MONEY));
    let bytes = to_binary(&dec("0.5"), &s).unwrap();
    assert_eq!(bytes[0], 2);
    assert_eq!(
        from_binary(&bytes, &s).unwrap(),
        AvroValue::Union(1, Box::new(dec("0.5")))
    );
    let text = to_json_string(&dec("0.5"), &s).unwrap();
    assert_eq!(
        from_json_str(&text, &s).unwrap(),
        AvroValue::Union(1, Box::new(dec("0.5")))
    );
}

// ============================================================================
// Big integers
// ============================================================================

#[test]
fn test_bigint_encodings() {
    let big = BigInt::from_str("-123456789012345678901234567890").unwrap();
    for doc in [
        r#"{"type":"string","logicalType":"bigint"}"#,
        r#"{"type":"bytes","logicalType":"bigint"}"#,
    ] {
        let s = schema(doc);
        let (binary, json) = round_trip(&AvroValue::BigInteger(big.clone()), &s);
        assert_eq!(binary, AvroValue::BigInteger(big.clone()), "{}", doc);
        assert_eq!(json, AvroValue::BigInteger(big.clone()), "{}", doc);
    }
}

// ============================================================================
// Dates and instants
// ============================================================================

#[test]
fn test_date_encodings() {
    let leap = AvroValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

    let days = schema(r#"{"type":"int","logicalType":"date"}"#);
    let bytes = to_binary(
        &AvroValue::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()),
        &days,
    )
    .unwrap();
    assert_eq!(bytes, vec![2]);
    assert_eq!(round_trip(&leap, &days), (leap.clone(), leap.clone()));

    let text = schema(r#"{"type":"string","logicalType":"date"}"#);
    assert_eq!(to_json_string(&leap, &text).unwrap(), r#""2024-02-29""#);
    assert_eq!(round_trip(&leap, &text), (leap.clone(), leap.clone()));
    assert!(matches!(
        from_json_str(r#""2023-02-29""#, &text),
        Err(DecodeError::Conversion(_))
    ));
}

#[test]
fn test_year_month() {
    let s = schema(r#"{"type":"int","logicalType":"year-month"}"#);
    let value = AvroValue::YearMonth(avrokit::YearMonth::new(1969, 12).unwrap());
    let bytes = to_binary(&value, &s).unwrap();
    // one month before the epoch
    assert_eq!(bytes, vec![1]);
    assert_eq!(from_binary(&bytes, &s).unwrap(), value);
}

#[test]
fn test_instant_encodings() {
    let t = AvroValue::Instant(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());
    for doc in [
        r#"{"type":"long","logicalType":"instant"}"#,
        r#"{"type":"string","logicalType":"instant"}"#,
        r#"{"type":"long","logicalType":"timestamp-millis"}"#,
    ] {
        let s = schema(doc);
        assert_eq!(round_trip(&t, &s), (t.clone(), t.clone()), "{}", doc);
    }

    let s = schema(r#"{"type":"long","logicalType":"instant"}"#);
    assert_eq!(to_json_string(&t, &s).unwrap(), "1700000000123");
}

// ============================================================================
// Text and embedded JSON
// ============================================================================

#[test]
fn test_uuid_and_url() {
    let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let s = schema(r#"{"type":"string","logicalType":"uuid"}"#);
    let value = AvroValue::Uuid(id);
    assert_eq!(
        to_json_string(&value, &s).unwrap(),
        r#""67e55044-10b1-426f-9247-bb680e5fe0c8""#
    );
    assert_eq!(round_trip(&value, &s), (value.clone(), value.clone()));
    assert!(from_json_str(r#""not-a-uuid""#, &s).is_err());

    let s = schema(r#"{"type":"string","logicalType":"url"}"#);
    let value = AvroValue::Url(url::Url::parse("https://example.org/a?b=c").unwrap());
    assert_eq!(round_trip(&value, &s), (value.clone(), value.clone()));
}

#[test]
fn test_embedded_json() {
    let s = schema(r#"{"type":"string","logicalType":"json_record"}"#);
    let value = AvroValue::Json(json!({"a": 1, "b": [true, null]}));
    let text = to_json_string(&value, &s).unwrap();
    // carried as a JSON string holding the document
    assert!(text.starts_with('"'));
    assert_eq!(round_trip(&value, &s), (value.clone(), value.clone()));

    assert!(to_binary(&AvroValue::Json(json!([1])), &s).is_err());
}

// ============================================================================
// Self-describing payloads
// ============================================================================

#[test]
fn test_any_carries_its_schema() {
    let s = schema(
        r#"{"type":"record","name":"Any","logicalType":"any","fields":[
            {"name":"avsc","type":"string"},{"name":"content","type":"bytes"}]}"#,
    );
    let inner = AvroValue::Map(vec![("k".to_string(), AvroValue::Long(4))]);
    let value = AvroValue::Any(Box::new(AnyValue {
        schema: None,
        value: inner.clone(),
    }));

    for decoded in [
        from_binary(&to_binary(&value, &s).unwrap(), &s).unwrap(),
        from_json_str(&to_json_string(&value, &s).unwrap(), &s).unwrap(),
    ] {
        match decoded {
            AvroValue::Any(any) => {
                assert_eq!(any.value, inner);
                assert_eq!(
                    any.schema.map(|s| s.to_json()).as_deref(),
                    Some(r#"{"type":"map","values":"long"}"#)
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

// ============================================================================
// Custom logical types
// ============================================================================

#[derive(Debug)]
struct Cents;

impl CustomLogicalType for Cents {
    fn name(&self) -> &str {
        "cents"
    }

    fn validate(&self, target: &LogicalTarget) -> Result<(), SchemaError> {
        match target.schema_type {
            SchemaType::Long => Ok(()),
            other => Err(SchemaError::InvalidLogicalType {
                logical_type: "cents".into(),
                reason: format!("requires long, found {}", other),
            }),
        }
    }

    fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        match value {
            AvroValue::Double(d) => Ok(AvroValue::Long((d * 100.0).round() as i64)),
            other => Ok(other.clone()),
        }
    }

    fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        match value {
            AvroValue::Long(c) => Ok(AvroValue::Double(c as f64 / 100.0)),
            other => Ok(other),
        }
    }
}

#[test]
fn test_custom_logical_type_end_to_end() {
    let registry = Arc::new(LogicalTypeRegistry::new());
    registry
        .register(
            "cents",
            Arc::new(|_: &Properties| Ok(LogicalType::Custom(Arc::new(Cents)))),
        )
        .unwrap();
    let options = ParseOptions::default().with_registry(registry);
    let s = parse_schema_with_options(r#"{"type":"long","logicalType":"cents"}"#, &options)
        .unwrap();

    let bytes = to_binary(&AvroValue::Double(12.34), &s).unwrap();
    assert_eq!(bytes, to_binary(&AvroValue::Long(1234), &schema(r#""long""#)).unwrap());
    assert_eq!(from_binary(&bytes, &s).unwrap(), AvroValue::Double(12.34));

    assert!(matches!(
        parse_schema_with_options(r#"{"type":"int","logicalType":"cents"}"#, &options),
        Err(SchemaError::InvalidLogicalType { .. })
    ));
}
