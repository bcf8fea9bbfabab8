//! Writers for the Avro binary format.
//!
//! The `put_*` functions append one primitive each. [`encode_value`] writes a
//! whole physical value without a grammar; it is used for field defaults,
//! which are materialized once and replayed as a sub-stream.

use crate::error::EncodeError;
use crate::schema::{Schema, SchemaKind};
use crate::value::AvroValue;

use super::varint::put_zigzag;

#[inline]
pub fn put_boolean(buf: &mut Vec<u8>, value: bool) {
    buf.push(u8::from(value));
}

#[inline]
pub fn put_int(buf: &mut Vec<u8>, value: i32) {
    put_zigzag(buf, i64::from(value));
}

#[inline]
pub fn put_long(buf: &mut Vec<u8>, value: i64) {
    put_zigzag(buf, value);
}

#[inline]
pub fn put_float(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn put_double(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write a length-prefixed byte sequence.
#[inline]
pub fn put_bytes(buf: &mut Vec<u8>, value: &[u8]) {
    put_zigzag(buf, value.len() as i64);
    buf.extend_from_slice(value);
}

/// Write a length-prefixed UTF-8 string.
#[inline]
pub fn put_string(buf: &mut Vec<u8>, value: &str) {
    put_bytes(buf, value.as_bytes());
}

/// Write a physical value under `schema`.
///
/// Logical values must already be converted to their wire form. Union
/// values must name their branch.
pub fn encode_value(buf: &mut Vec<u8>, value: &AvroValue, schema: &Schema) -> Result<(), EncodeError> {
    let mismatch = || EncodeError::TypeMismatch {
        expected: schema.full_name(),
        found: value.type_name().to_string(),
    };
    match (schema.kind(), value) {
        (SchemaKind::Null, AvroValue::Null) => {}
        (SchemaKind::Boolean, AvroValue::Boolean(b)) => put_boolean(buf, *b),
        (SchemaKind::Int, AvroValue::Int(v)) => put_int(buf, *v),
        (SchemaKind::Long, AvroValue::Long(v)) => put_long(buf, *v),
        (SchemaKind::Float, AvroValue::Float(v)) => put_float(buf, *v),
        (SchemaKind::Double, AvroValue::Double(v)) => put_double(buf, *v),
        (SchemaKind::Bytes, AvroValue::Bytes(b)) => put_bytes(buf, b),
        (SchemaKind::String, AvroValue::String(s)) => put_string(buf, s),
        (SchemaKind::Fixed(fixed), AvroValue::Fixed(b)) if b.len() == fixed.size => {
            buf.extend_from_slice(b)
        }
        (SchemaKind::Enum(_), AvroValue::Enum(index, _)) => put_int(buf, *index as i32),
        (SchemaKind::Array(items), AvroValue::Array(values)) => {
            let items = schema.at(*items);
            if !values.is_empty() {
                put_long(buf, values.len() as i64);
                for v in values {
                    encode_value(buf, v, &items)?;
                }
            }
            put_long(buf, 0);
        }
        (SchemaKind::Map(values), AvroValue::Map(entries)) => {
            let values = schema.at(*values);
            if !entries.is_empty() {
                put_long(buf, entries.len() as i64);
                for (k, v) in entries {
                    put_string(buf, k);
                    encode_value(buf, v, &values)?;
                }
            }
            put_long(buf, 0);
        }
        (SchemaKind::Record(record), AvroValue::Record(fields)) => {
            for field in record.fields() {
                let (_, v) = fields
                    .iter()
                    .find(|(name, _)| *name == field.name)
                    .ok_or_else(|| EncodeError::MissingField {
                        record: record.name.fullname(),
                        field: field.name.clone(),
                    })?;
                encode_value(buf, v, &schema.at(field.schema))?;
            }
        }
        (SchemaKind::Union(union), AvroValue::Union(index, inner)) => {
            let branch = union.branches.get(*index).ok_or_else(mismatch)?;
            put_long(buf, *index as i64);
            encode_value(buf, inner, &schema.at(*branch))?;
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}
