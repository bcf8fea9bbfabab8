//! Primitive readers for the Avro binary format.
//!
//! - Varints use zigzag encoding for signed integers
//! - Floats and doubles are little-endian IEEE 754
//! - Bytes and strings are length-prefixed
//!
//! Every function takes a cursor (`&mut &[u8]`) and advances it past the
//! value it consumed.

use crate::error::DecodeError;
use crate::schema::{Schema, SchemaKind};

use super::varint;

/// Decode a boolean value.
///
/// Avro booleans are encoded as a single byte: 0x00 for false, 0x01 for true.
#[inline]
pub fn decode_boolean(data: &mut &[u8]) -> Result<bool, DecodeError> {
    let (&byte, rest) = data.split_first().ok_or(DecodeError::UnexpectedEof)?;
    *data = rest;
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::InvalidData(format!(
            "Invalid boolean value: {}, expected 0 or 1",
            byte
        ))),
    }
}

/// Decode a 32-bit signed integer (zigzag varint encoded).
#[inline]
pub fn decode_int(data: &mut &[u8]) -> Result<i32, DecodeError> {
    let long = decode_long(data)?;
    i32::try_from(long).map_err(|_| {
        DecodeError::InvalidData(format!("Integer overflow: {} does not fit in i32", long))
    })
}

/// Decode a 64-bit signed integer (zigzag varint encoded).
#[inline]
pub fn decode_long(data: &mut &[u8]) -> Result<i64, DecodeError> {
    varint::decode_zigzag(data)
}

/// Decode a 32-bit IEEE 754 floating-point number (little-endian).
#[inline]
pub fn decode_float(data: &mut &[u8]) -> Result<f32, DecodeError> {
    let bytes = take(data, 4)?;
    Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a 64-bit IEEE 754 floating-point number (little-endian).
#[inline]
pub fn decode_double(data: &mut &[u8]) -> Result<f64, DecodeError> {
    let bytes = take(data, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(f64::from_le_bytes(buf))
}

/// Decode a length-prefixed byte sequence without copying.
#[inline]
pub fn decode_bytes_ref<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = decode_length(data)?;
    take(data, len)
}

/// Decode a length-prefixed UTF-8 string.
#[inline]
pub fn decode_string(data: &mut &[u8]) -> Result<String, DecodeError> {
    let bytes = decode_bytes_ref(data)?;
    String::from_utf8(bytes.to_vec()).map_err(DecodeError::from)
}

/// Decode `size` raw bytes of a fixed value without copying.
#[inline]
pub fn decode_fixed_ref<'a>(data: &mut &'a [u8], size: usize) -> Result<&'a [u8], DecodeError> {
    take(data, size)
}

/// Decode an array or map block count.
///
/// A negative count means the absolute value is the item count and is
/// followed by the block's byte size, which is read and discarded here.
pub fn decode_block_count(data: &mut &[u8]) -> Result<u64, DecodeError> {
    let count = decode_long(data)?;
    if count < 0 {
        let _byte_size = decode_long(data)?;
        Ok(count.unsigned_abs())
    } else {
        Ok(count as u64)
    }
}

fn decode_length(data: &mut &[u8]) -> Result<usize, DecodeError> {
    let len = decode_long(data)?;
    if len < 0 {
        return Err(DecodeError::InvalidData(format!(
            "Negative bytes length: {}",
            len
        )));
    }
    Ok(len as usize)
}

#[inline]
fn take<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], DecodeError> {
    if data.len() < len {
        return Err(DecodeError::UnexpectedEof);
    }
    let (head, rest) = data.split_at(len);
    *data = rest;
    Ok(head)
}

// ============================================================================
// Skipping
// ============================================================================

/// Skip over a fixed-size value.
#[inline]
pub fn skip_fixed(data: &mut &[u8], size: usize) -> Result<(), DecodeError> {
    take(data, size).map(|_| ())
}

/// Skip over a bytes or string value.
#[inline]
pub fn skip_bytes(data: &mut &[u8]) -> Result<(), DecodeError> {
    let len = decode_length(data)?;
    skip_fixed(data, len)
}

/// Skip a sequence of array or map blocks, using byte sizes when present.
fn skip_blocks(
    data: &mut &[u8],
    mut skip_item: impl FnMut(&mut &[u8]) -> Result<(), DecodeError>,
) -> Result<(), DecodeError> {
    loop {
        let count = decode_long(data)?;
        if count == 0 {
            return Ok(());
        }
        if count < 0 {
            let byte_size = decode_long(data)?;
            if byte_size < 0 {
                return Err(DecodeError::InvalidData(format!(
                    "Negative block byte size: {}",
                    byte_size
                )));
            }
            skip_fixed(data, byte_size as usize)?;
            continue;
        }
        for _ in 0..count {
            skip_item(data)?;
        }
    }
}

/// Skip over any value written with `schema` without materializing it.
///
/// Used to step over writer fields the reader does not want and to capture
/// out-of-order fields as raw byte ranges.
pub fn skip_value(data: &mut &[u8], schema: &Schema) -> Result<(), DecodeError> {
    match schema.kind() {
        SchemaKind::Null => Ok(()),
        SchemaKind::Boolean => skip_fixed(data, 1),
        SchemaKind::Int | SchemaKind::Long | SchemaKind::Enum(_) => varint::skip_varint(data),
        SchemaKind::Float => skip_fixed(data, 4),
        SchemaKind::Double => skip_fixed(data, 8),
        SchemaKind::Bytes | SchemaKind::String => skip_bytes(data),
        SchemaKind::Fixed(fixed) => skip_fixed(data, fixed.size),
        SchemaKind::Array(items) => {
            let items = schema.at(*items);
            skip_blocks(data, |d| skip_value(d, &items))
        }
        SchemaKind::Map(values) => {
            let values = schema.at(*values);
            skip_blocks(data, |d| {
                skip_bytes(d)?;
                skip_value(d, &values)
            })
        }
        SchemaKind::Union(union) => {
            let index = decode_long(data)?;
            let branch = usize::try_from(index)
                .ok()
                .and_then(|i| union.branches.get(i))
                .ok_or_else(|| {
                    DecodeError::InvalidData(format!(
                        "Union index {} out of range (0..{})",
                        index,
                        union.branches.len()
                    ))
                })?;
            skip_value(data, &schema.at(*branch))
        }
        SchemaKind::Record(record) => {
            for field in record.fields() {
                skip_value(data, &schema.at(field.schema))?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    #[test]
    fn test_decode_boolean() {
        let mut cursor: &[u8] = &[0x01, 0x00];
        assert!(decode_boolean(&mut cursor).unwrap());
        assert!(!decode_boolean(&mut cursor).unwrap());
        assert!(matches!(
            decode_boolean(&mut cursor),
            Err(DecodeError::UnexpectedEof)
        ));

        let mut cursor: &[u8] = &[0x02];
        assert!(matches!(
            decode_boolean(&mut cursor),
            Err(DecodeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_decode_int_overflow() {
        let encoded = super::super::varint::encode_zigzag(i64::from(i32::MAX) + 1);
        let mut cursor = &encoded[..];
        assert!(matches!(
            decode_int(&mut cursor),
            Err(DecodeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_decode_float_and_double() {
        let mut data = 1.5f32.to_le_bytes().to_vec();
        data.extend_from_slice(&(-2.25f64).to_le_bytes());
        let mut cursor = &data[..];
        assert_eq!(decode_float(&mut cursor).unwrap(), 1.5);
        assert_eq!(decode_double(&mut cursor).unwrap(), -2.25);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_decode_string() {
        let mut cursor: &[u8] = &[0x06, b'f', b'o', b'o'];
        assert_eq!(decode_string(&mut cursor).unwrap(), "foo");

        let mut cursor: &[u8] = &[0x06, b'f'];
        assert!(matches!(
            decode_string(&mut cursor),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_decode_negative_length() {
        let mut cursor: &[u8] = &[0x01];
        assert!(matches!(
            decode_bytes_ref(&mut cursor),
            Err(DecodeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_decode_block_count_with_byte_size() {
        // -2 items, 4 bytes
        let mut cursor: &[u8] = &[0x03, 0x08];
        assert_eq!(decode_block_count(&mut cursor).unwrap(), 2);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_skip_record_with_nested_containers() {
        let schema = parse_schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"a","type":{"type":"array","items":"string"}},
                {"name":"m","type":{"type":"map","values":"long"}},
                {"name":"u","type":["null","double"]},
                {"name":"f","type":{"type":"fixed","name":"F","size":2}}
            ]}"#,
        )
        .unwrap();
        let data: &[u8] = &[
            0x02, 0x02, b'x', 0x00, // array ["x"]
            0x02, 0x02, b'k', 0x04, 0x00, // map {"k": 2}
            0x00, // null branch
            0xAA, 0xBB, // fixed
            0x7F, // trailing byte
        ];
        let mut cursor = data;
        skip_value(&mut cursor, &schema).unwrap();
        assert_eq!(cursor, &[0x7F]);
    }

    #[test]
    fn test_skip_blocks_with_byte_size() {
        let schema = parse_schema(r#"{"type":"array","items":"int"}"#).unwrap();
        // block of -2 items spanning 2 bytes, then end marker
        let data: &[u8] = &[0x03, 0x04, 0x02, 0x04, 0x00];
        let mut cursor = data;
        skip_value(&mut cursor, &schema).unwrap();
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_skip_union_index_out_of_range() {
        let schema = parse_schema(r#"["null","int"]"#).unwrap();
        let mut cursor: &[u8] = &[0x04];
        assert!(matches!(
            skip_value(&mut cursor, &schema),
            Err(DecodeError::InvalidData(_))
        ));
    }
}
