//! Reader/writer schema resolution rules.
//!
//! These are the building blocks the resolving grammar is generated from:
//! - primitive type promotions (int→long, float→double, etc.)
//! - matching writer and reader named types, union branches and fields
//! - materializing JSON default values for fields missing from the writer

use serde_json::Value;

use crate::error::DecodeError;
use crate::value::AvroValue;

use super::types::{Field, Schema, SchemaKind, SchemaType};

/// Type promotions supported by Avro schema resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypePromotion {
    /// int → long
    IntToLong,
    /// int → float
    IntToFloat,
    /// int → double
    IntToDouble,
    /// long → float
    LongToFloat,
    /// long → double
    LongToDouble,
    /// float → double
    FloatToDouble,
    /// string → bytes
    StringToBytes,
    /// bytes → string
    BytesToString,
}

impl TypePromotion {
    /// The promotion reading `writer` data as `reader`, if there is one.
    /// Identical types need no promotion and yield `None`.
    pub fn between(writer: SchemaType, reader: SchemaType) -> Option<Self> {
        use SchemaType::*;
        match (writer, reader) {
            (Int, Long) => Some(TypePromotion::IntToLong),
            (Int, Float) => Some(TypePromotion::IntToFloat),
            (Int, Double) => Some(TypePromotion::IntToDouble),
            (Long, Float) => Some(TypePromotion::LongToFloat),
            (Long, Double) => Some(TypePromotion::LongToDouble),
            (Float, Double) => Some(TypePromotion::FloatToDouble),
            (String, Bytes) => Some(TypePromotion::StringToBytes),
            (Bytes, String) => Some(TypePromotion::BytesToString),
            _ => None,
        }
    }

    /// The type found on the wire.
    pub fn source(self) -> SchemaType {
        match self {
            TypePromotion::IntToLong | TypePromotion::IntToFloat | TypePromotion::IntToDouble => {
                SchemaType::Int
            }
            TypePromotion::LongToFloat | TypePromotion::LongToDouble => SchemaType::Long,
            TypePromotion::FloatToDouble => SchemaType::Float,
            TypePromotion::StringToBytes => SchemaType::String,
            TypePromotion::BytesToString => SchemaType::Bytes,
        }
    }

    /// The type handed to the reader.
    pub fn target(self) -> SchemaType {
        match self {
            TypePromotion::IntToLong => SchemaType::Long,
            TypePromotion::IntToFloat | TypePromotion::LongToFloat => SchemaType::Float,
            TypePromotion::IntToDouble
            | TypePromotion::LongToDouble
            | TypePromotion::FloatToDouble => SchemaType::Double,
            TypePromotion::StringToBytes => SchemaType::Bytes,
            TypePromotion::BytesToString => SchemaType::String,
        }
    }

    /// Convert a value of the source type to the target type.
    pub fn apply(self, value: AvroValue) -> Result<AvroValue, DecodeError> {
        match (value, self) {
            (AvroValue::Int(v), TypePromotion::IntToLong) => Ok(AvroValue::Long(v as i64)),
            (AvroValue::Int(v), TypePromotion::IntToFloat) => Ok(AvroValue::Float(v as f32)),
            (AvroValue::Int(v), TypePromotion::IntToDouble) => Ok(AvroValue::Double(v as f64)),
            (AvroValue::Long(v), TypePromotion::LongToFloat) => Ok(AvroValue::Float(v as f32)),
            (AvroValue::Long(v), TypePromotion::LongToDouble) => Ok(AvroValue::Double(v as f64)),
            (AvroValue::Float(v), TypePromotion::FloatToDouble) => {
                Ok(AvroValue::Double(v as f64))
            }
            (AvroValue::String(s), TypePromotion::StringToBytes) => {
                Ok(AvroValue::Bytes(s.into_bytes()))
            }
            (AvroValue::Bytes(b), TypePromotion::BytesToString) => {
                let s = String::from_utf8(b).map_err(|e| {
                    DecodeError::InvalidData(format!("Cannot convert bytes to string: {}", e))
                })?;
                Ok(AvroValue::String(s))
            }
            (value, promotion) => Err(DecodeError::TypeMismatch(format!(
                "Cannot apply {:?} promotion to {}",
                promotion,
                value.type_name()
            ))),
        }
    }
}

/// Whether a writer named type may be read as a reader named type: same full
/// name, same simple name, or a reader alias naming the writer.
pub fn names_match(writer: &Schema, reader: &Schema) -> bool {
    match (writer.name(), reader.name()) {
        (Some(w), Some(r)) => {
            let full = w.fullname();
            w == r || w.name == r.name || reader.kind().aliases().iter().any(|a| *a == full)
        }
        _ => false,
    }
}

/// Whether two schemas have the same shape at the top level, so that the
/// writer needs no promotion to be read as the reader.
fn same_shape(writer: &Schema, reader: &Schema) -> bool {
    let (w, r) = (writer.kind(), reader.kind());
    if w.schema_type() != r.schema_type() {
        return false;
    }
    match (w, r) {
        (SchemaKind::Record(_), SchemaKind::Record(_))
        | (SchemaKind::Enum(_), SchemaKind::Enum(_))
        | (SchemaKind::Fixed(_), SchemaKind::Fixed(_)) => names_match(writer, reader),
        _ => true,
    }
}

/// The reader union branch a writer (non-union) schema resolves to: the
/// first branch of the same shape, else the first promotable branch.
pub fn find_reader_branch(writer: &Schema, reader: &Schema) -> Option<usize> {
    let branches = reader.branches();
    branches
        .iter()
        .position(|b| same_shape(writer, b))
        .or_else(|| {
            branches.iter().position(|b| {
                TypePromotion::between(writer.schema_type(), b.schema_type()).is_some()
            })
        })
}

/// The writer field a reader field reads from: by name, then by the reader
/// field's aliases, then by the writer field's aliases.
pub fn match_writer_field<'a>(reader_field: &Field, writer_fields: &'a [Field]) -> Option<&'a Field> {
    writer_fields
        .iter()
        .find(|w| w.name == reader_field.name)
        .or_else(|| {
            writer_fields
                .iter()
                .find(|w| reader_field.aliases.iter().any(|a| *a == w.name))
        })
        .or_else(|| writer_fields.iter().find(|w| w.answers_to(&reader_field.name)))
}

/// Convert a JSON default value to a physical [`AvroValue`] of `schema`.
///
/// Logical types are not applied: the result has the wire shape. A union
/// default may match any branch; the first branch that accepts it wins.
pub fn json_to_avro_value(json: &Value, schema: &Schema) -> Result<AvroValue, DecodeError> {
    let mismatch = || {
        DecodeError::InvalidData(format!(
            "Cannot convert default {} to {}",
            json,
            schema.full_name()
        ))
    };

    match (json, schema.kind()) {
        (Value::Null, SchemaKind::Null) => Ok(AvroValue::Null),
        (Value::Bool(b), SchemaKind::Boolean) => Ok(AvroValue::Boolean(*b)),
        (Value::Number(n), SchemaKind::Int) => {
            let v = n.as_i64().ok_or_else(mismatch)?;
            let v = i32::try_from(v).map_err(|_| {
                DecodeError::InvalidData(format!("Value {} out of range for int", v))
            })?;
            Ok(AvroValue::Int(v))
        }
        (Value::Number(n), SchemaKind::Long) => n.as_i64().map(AvroValue::Long).ok_or_else(mismatch),
        (Value::Number(n), SchemaKind::Float) => n
            .as_f64()
            .map(|v| AvroValue::Float(v as f32))
            .ok_or_else(mismatch),
        (Value::Number(n), SchemaKind::Double) => {
            n.as_f64().map(AvroValue::Double).ok_or_else(mismatch)
        }
        // float defaults may be written as strings, including NaN and Infinity
        (Value::String(s), SchemaKind::Float) => parse_double(s)
            .map(|v| AvroValue::Float(v as f32))
            .ok_or_else(mismatch),
        (Value::String(s), SchemaKind::Double) => {
            parse_double(s).map(AvroValue::Double).ok_or_else(mismatch)
        }
        (Value::String(s), SchemaKind::String) => Ok(AvroValue::String(s.clone())),
        // bytes defaults are ISO-8859-1 strings
        (Value::String(s), SchemaKind::Bytes) => latin1_bytes(s).map(AvroValue::Bytes),
        (Value::String(s), SchemaKind::Fixed(fixed)) => {
            let bytes = latin1_bytes(s)?;
            if bytes.len() != fixed.size {
                return Err(DecodeError::InvalidData(format!(
                    "Fixed default has wrong size: expected {}, got {}",
                    fixed.size,
                    bytes.len()
                )));
            }
            Ok(AvroValue::Fixed(bytes))
        }
        (Value::String(s), SchemaKind::Enum(enum_schema)) => {
            let index = enum_schema
                .resolve_symbol(s)
                .ok_or_else(|| DecodeError::UnknownEnumSymbol {
                    symbol: s.clone(),
                    enum_name: enum_schema.name.fullname(),
                })?;
            Ok(AvroValue::Enum(index, enum_schema.symbols[index].clone()))
        }
        (Value::Array(items), SchemaKind::Array(item)) => {
            let item = schema.at(*item);
            items
                .iter()
                .map(|v| json_to_avro_value(v, &item))
                .collect::<Result<Vec<_>, _>>()
                .map(AvroValue::Array)
        }
        (Value::Object(obj), SchemaKind::Map(values)) => {
            let values = schema.at(*values);
            obj.iter()
                .map(|(k, v)| Ok((k.clone(), json_to_avro_value(v, &values)?)))
                .collect::<Result<Vec<_>, DecodeError>>()
                .map(AvroValue::Map)
        }
        (Value::Object(obj), SchemaKind::Record(record)) => record
            .fields()
            .iter()
            .map(|field| {
                let field_schema = schema.at(field.schema);
                let value = match obj.get(&field.name) {
                    Some(v) => json_to_avro_value(v, &field_schema)?,
                    None => match &field.default {
                        Some(default) => json_to_avro_value(default, &field_schema)?,
                        None => {
                            return Err(DecodeError::MissingField {
                                record: record.name.fullname(),
                                field: field.name.clone(),
                            })
                        }
                    },
                };
                Ok((field.name.clone(), value))
            })
            .collect::<Result<Vec<_>, DecodeError>>()
            .map(AvroValue::Record),
        (json, SchemaKind::Union(_)) => {
            for (index, branch) in schema.branches().iter().enumerate() {
                if let Ok(value) = json_to_avro_value(json, branch) {
                    return Ok(AvroValue::Union(index, Box::new(value)));
                }
            }
            Err(mismatch())
        }
        _ => Err(mismatch()),
    }
}

/// Parse a double from text, accepting `NaN` and the infinities.
pub(crate) fn parse_double(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.trim().parse().ok(),
    }
}

/// Decode an ISO-8859-1 string to bytes.
pub(crate) fn latin1_bytes(text: &str) -> Result<Vec<u8>, DecodeError> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                DecodeError::InvalidData(format!("Character {:?} is not ISO-8859-1", c))
            })
        })
        .collect()
}

/// Encode bytes as an ISO-8859-1 string.
pub(crate) fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;
    use serde_json::json;

    #[test]
    fn test_type_promotion_rules() {
        use SchemaType::*;
        assert_eq!(TypePromotion::between(Int, Int), None);
        assert_eq!(TypePromotion::between(Int, Long), Some(TypePromotion::IntToLong));
        assert_eq!(TypePromotion::between(Long, Double), Some(TypePromotion::LongToDouble));
        assert_eq!(TypePromotion::between(Float, Double), Some(TypePromotion::FloatToDouble));
        assert_eq!(TypePromotion::between(Bytes, String), Some(TypePromotion::BytesToString));
        assert_eq!(TypePromotion::between(Long, Int), None);
        assert_eq!(TypePromotion::between(Double, Float), None);
        assert_eq!(TypePromotion::IntToFloat.source(), Int);
        assert_eq!(TypePromotion::IntToFloat.target(), Float);
    }

    #[test]
    fn test_apply_promotion() {
        assert_eq!(
            TypePromotion::IntToLong.apply(AvroValue::Int(42)).unwrap(),
            AvroValue::Long(42)
        );
        assert_eq!(
            TypePromotion::LongToDouble.apply(AvroValue::Long(-7)).unwrap(),
            AvroValue::Double(-7.0)
        );
        assert_eq!(
            TypePromotion::StringToBytes
                .apply(AvroValue::String("hi".into()))
                .unwrap(),
            AvroValue::Bytes(b"hi".to_vec())
        );
        assert!(TypePromotion::BytesToString
            .apply(AvroValue::Bytes(vec![0xff, 0xfe]))
            .is_err());
        assert!(TypePromotion::IntToLong.apply(AvroValue::Null).is_err());
    }

    #[test]
    fn test_reader_branch_selection() {
        let union = parse_schema(r#"["null","long","string"]"#).unwrap();
        let int = parse_schema(r#""int""#).unwrap();
        let string = parse_schema(r#""string""#).unwrap();
        let boolean = parse_schema(r#""boolean""#).unwrap();
        assert_eq!(find_reader_branch(&string, &union), Some(2));
        assert_eq!(find_reader_branch(&int, &union), Some(1));
        assert_eq!(find_reader_branch(&boolean, &union), None);
    }

    #[test]
    fn test_named_branch_by_alias() {
        let union = parse_schema(
            r#"["null",{"type":"fixed","name":"a.New","aliases":["b.Old"],"size":2}]"#,
        )
        .unwrap();
        let old = parse_schema(r#"{"type":"fixed","name":"b.Old","size":2}"#).unwrap();
        assert_eq!(find_reader_branch(&old, &union), Some(1));
    }

    #[test]
    fn test_match_writer_field() {
        let writer = parse_schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"a","type":"int"},
                {"name":"b","type":"int","aliases":["c"]}
            ]}"#,
        )
        .unwrap();
        let reader = parse_schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"x","type":"int","aliases":["a"]},
                {"name":"c","type":"int"},
                {"name":"z","type":"int","default":0}
            ]}"#,
        )
        .unwrap();
        let fields = reader.fields();
        assert_eq!(match_writer_field(&fields[0], writer.fields()).unwrap().name, "a");
        assert_eq!(match_writer_field(&fields[1], writer.fields()).unwrap().name, "b");
        assert!(match_writer_field(&fields[2], writer.fields()).is_none());
    }

    #[test]
    fn test_json_to_avro_primitives() {
        let int = parse_schema(r#""int""#).unwrap();
        assert_eq!(json_to_avro_value(&json!(42), &int).unwrap(), AvroValue::Int(42));
        assert!(json_to_avro_value(&json!(1i64 << 40), &int).is_err());

        let double = parse_schema(r#""double""#).unwrap();
        assert_eq!(
            json_to_avro_value(&json!("1.5"), &double).unwrap(),
            AvroValue::Double(1.5)
        );
        match json_to_avro_value(&json!("NaN"), &double).unwrap() {
            AvroValue::Double(v) => assert!(v.is_nan()),
            other => panic!("unexpected {:?}", other),
        }

        let bytes = parse_schema(r#""bytes""#).unwrap();
        assert_eq!(
            json_to_avro_value(&json!("\u{00ff}A"), &bytes).unwrap(),
            AvroValue::Bytes(vec![0xff, 0x41])
        );
    }

    #[test]
    fn test_json_to_avro_composites() {
        let schema = parse_schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"tags","type":{"type":"array","items":"string"}},
                {"name":"counts","type":{"type":"map","values":"long"},"default":{}},
                {"name":"maybe","type":["null","string"],"default":null},
                {"name":"color","type":{"type":"enum","name":"C","symbols":["RED","BLUE"]}}
            ]}"#,
        )
        .unwrap();
        let value = json_to_avro_value(
            &json!({"tags": ["a"], "maybe": "x", "color": "BLUE"}),
            &schema,
        )
        .unwrap();
        assert_eq!(
            value,
            AvroValue::Record(vec![
                ("tags".into(), AvroValue::Array(vec!["a".into()])),
                ("counts".into(), AvroValue::Map(vec![])),
                ("maybe".into(), AvroValue::Union(1, Box::new("x".into()))),
                ("color".into(), AvroValue::Enum(1, "BLUE".into())),
            ])
        );
        assert!(matches!(
            json_to_avro_value(&json!({"tags": []}), &schema),
            Err(DecodeError::MissingField { .. })
        ));
    }
}
