//! JSON token streams.
//!
//! The decoder works on a flat token stream rather than a parsed tree so
//! that a field value found out of order can be cut out, kept aside and
//! replayed later as its own stream.

use std::str::FromStr;

use serde_json::{Number, Value};

use crate::error::{DecodeError, EncodeError};
use crate::schema::{latin1_string, Schema, SchemaKind};
use crate::value::AvroValue;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonToken {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(String),
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

/// Tokenize a sequence of whitespace-separated JSON documents.
pub fn tokenize(text: &str) -> Result<Vec<JsonToken>, DecodeError> {
    let mut tokens = Vec::new();
    for value in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        flatten(value?, &mut tokens);
    }
    Ok(tokens)
}

fn flatten(value: Value, out: &mut Vec<JsonToken>) {
    match value {
        Value::Null => out.push(JsonToken::Null),
        Value::Bool(b) => out.push(JsonToken::Bool(b)),
        Value::Number(n) => out.push(JsonToken::Number(n)),
        Value::String(s) => out.push(JsonToken::String(s)),
        Value::Array(items) => {
            out.push(JsonToken::StartArray);
            for item in items {
                flatten(item, out);
            }
            out.push(JsonToken::EndArray);
        }
        Value::Object(entries) => {
            out.push(JsonToken::StartObject);
            for (key, value) in entries {
                out.push(JsonToken::FieldName(key));
                flatten(value, out);
            }
            out.push(JsonToken::EndObject);
        }
    }
}

/// Number of tokens making up the value that starts at `tokens[0]`.
pub fn value_len(tokens: &[JsonToken]) -> Result<usize, DecodeError> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            JsonToken::StartObject | JsonToken::StartArray => depth += 1,
            JsonToken::EndObject | JsonToken::EndArray => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    DecodeError::TypeMismatch("expected a value, found end of container".into())
                })?;
            }
            JsonToken::FieldName(_) => continue,
            _ => {}
        }
        if depth == 0 {
            return Ok(i + 1);
        }
    }
    Err(DecodeError::UnexpectedEof)
}

/// The JSON text of a float: `None` for NaN and infinities.
pub(crate) fn float_number(text: String) -> Option<Number> {
    Number::from_str(&text).ok()
}

/// The string standing for a non-finite float.
pub(crate) fn non_finite(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn float_token(value: f64, text: String) -> JsonToken {
    if value.is_finite() {
        if let Some(n) = float_number(text) {
            return JsonToken::Number(n);
        }
    }
    JsonToken::String(non_finite(value).to_string())
}

/// Tokens of a physical value in the extended JSON encoding.
pub fn value_tokens(
    value: &AvroValue,
    schema: &Schema,
    out: &mut Vec<JsonToken>,
) -> Result<(), EncodeError> {
    let mismatch = || EncodeError::TypeMismatch {
        expected: schema.full_name(),
        found: value.type_name().to_string(),
    };
    match (schema.kind(), value) {
        (SchemaKind::Null, AvroValue::Null) => out.push(JsonToken::Null),
        (SchemaKind::Boolean, AvroValue::Boolean(b)) => out.push(JsonToken::Bool(*b)),
        (SchemaKind::Int, AvroValue::Int(v)) => out.push(JsonToken::Number((*v).into())),
        (SchemaKind::Long, AvroValue::Long(v)) => out.push(JsonToken::Number((*v).into())),
        (SchemaKind::Float, AvroValue::Float(v)) => {
            out.push(float_token(f64::from(*v), v.to_string()))
        }
        (SchemaKind::Double, AvroValue::Double(v)) => out.push(float_token(*v, v.to_string())),
        (SchemaKind::Bytes, AvroValue::Bytes(b)) => out.push(JsonToken::String(latin1_string(b))),
        (SchemaKind::Fixed(fixed), AvroValue::Fixed(b)) if b.len() == fixed.size => {
            out.push(JsonToken::String(latin1_string(b)))
        }
        (SchemaKind::String, AvroValue::String(s)) => out.push(JsonToken::String(s.clone())),
        (SchemaKind::Enum(e), AvroValue::Enum(index, symbol)) => {
            let symbol = e.symbols.get(*index).unwrap_or(symbol);
            out.push(JsonToken::String(symbol.clone()));
        }
        (SchemaKind::Array(items), AvroValue::Array(values)) => {
            let items = schema.at(*items);
            out.push(JsonToken::StartArray);
            for v in values {
                value_tokens(v, &items, out)?;
            }
            out.push(JsonToken::EndArray);
        }
        (SchemaKind::Map(values), AvroValue::Map(entries)) => {
            let values = schema.at(*values);
            out.push(JsonToken::StartObject);
            for (k, v) in entries {
                out.push(JsonToken::FieldName(k.clone()));
                value_tokens(v, &values, out)?;
            }
            out.push(JsonToken::EndObject);
        }
        (SchemaKind::Record(record), AvroValue::Record(fields)) => {
            out.push(JsonToken::StartObject);
            for field in record.fields() {
                let (_, v) = fields
                    .iter()
                    .find(|(name, _)| *name == field.name)
                    .ok_or_else(|| EncodeError::MissingField {
                        record: record.name.fullname(),
                        field: field.name.clone(),
                    })?;
                out.push(JsonToken::FieldName(field.name.clone()));
                value_tokens(v, &schema.at(field.schema), out)?;
            }
            out.push(JsonToken::EndObject);
        }
        (SchemaKind::Union(_), AvroValue::Union(index, inner)) => {
            let branch = schema.branches().get(*index).cloned().ok_or_else(mismatch)?;
            if schema.null_branch() == Some(*index) || schema.compact_union_branch().is_some() {
                value_tokens(inner, &branch, out)?;
            } else {
                out.push(JsonToken::StartObject);
                out.push(JsonToken::FieldName(branch.full_name()));
                value_tokens(inner, &branch, out)?;
                out.push(JsonToken::EndObject);
            }
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}
