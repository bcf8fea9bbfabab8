//! Zigzag varint encoding and decoding.
//!
//! Avro uses the same base-128 varint layout as Protocol Buffers:
//! - Each byte has 7 bits of data and 1 continuation bit (MSB)
//! - Bytes are in little-endian group order
//!
//! Signed integers are zigzag mapped first so small magnitudes stay short:
//! - 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
//! - Encoding formula: (n << 1) ^ (n >> 63)
//! - Decoding formula: (n >> 1) ^ -(n & 1)

use crate::error::DecodeError;

// ============================================================================
// Decoding Functions
// ============================================================================

/// Decode an unsigned variable-length integer.
///
/// # Arguments
/// * `data` - The input byte slice (cursor is advanced past the varint)
///
/// # Errors
/// - `DecodeError::UnexpectedEof` if the input is truncated
/// - `DecodeError::InvalidVarint` if the varint exceeds 10 bytes
#[inline]
pub fn decode_varint(data: &mut &[u8]) -> Result<u64, DecodeError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let (&byte, rest) = data.split_first().ok_or(DecodeError::UnexpectedEof)?;
        *data = rest;

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;

        // max 10 bytes for 64-bit
        if shift >= 64 {
            return Err(DecodeError::InvalidVarint);
        }
    }
}

/// Decode a signed, zigzag-encoded variable-length integer.
#[inline]
pub fn decode_zigzag(data: &mut &[u8]) -> Result<i64, DecodeError> {
    let unsigned = decode_varint(data)?;
    Ok(((unsigned >> 1) as i64) ^ (-((unsigned & 1) as i64)))
}

/// Skip over a varint without decoding its value.
#[inline]
pub fn skip_varint(data: &mut &[u8]) -> Result<(), DecodeError> {
    loop {
        let (&byte, rest) = data.split_first().ok_or(DecodeError::UnexpectedEof)?;
        *data = rest;
        if byte & 0x80 == 0 {
            return Ok(());
        }
    }
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Append an unsigned varint to `buf`.
#[inline]
pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Append a zigzag-encoded signed varint to `buf`.
#[inline]
pub fn put_zigzag(buf: &mut Vec<u8>, value: i64) {
    put_varint(buf, ((value << 1) ^ (value >> 63)) as u64);
}

/// Encode a signed integer as a standalone zigzag varint.
pub fn encode_zigzag(value: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    put_zigzag(&mut buf, value);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // decode_varint tests
    // ========================================================================

    #[test]
    fn test_decode_varint_single_byte() {
        let mut cursor: &[u8] = &[0x00];
        assert_eq!(decode_varint(&mut cursor).unwrap(), 0);
        assert!(cursor.is_empty());

        let mut cursor: &[u8] = &[0x7F];
        assert_eq!(decode_varint(&mut cursor).unwrap(), 127);
    }

    #[test]
    fn test_decode_varint_multi_byte() {
        let mut cursor: &[u8] = &[0x80, 0x01];
        assert_eq!(decode_varint(&mut cursor).unwrap(), 128);
        assert!(cursor.is_empty());

        let mut cursor: &[u8] = &[0xAC, 0x02];
        assert_eq!(decode_varint(&mut cursor).unwrap(), 300);

        let mut cursor: &[u8] = &[0x80, 0x80, 0x01];
        assert_eq!(decode_varint(&mut cursor).unwrap(), 16384);
    }

    #[test]
    fn test_decode_varint_eof() {
        let mut cursor: &[u8] = &[];
        assert!(matches!(
            decode_varint(&mut cursor),
            Err(DecodeError::UnexpectedEof)
        ));

        // continuation bit set but nothing follows
        let mut cursor: &[u8] = &[0x80];
        assert!(matches!(
            decode_varint(&mut cursor),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_decode_varint_too_long() {
        let mut cursor: &[u8] = &[0xFF; 11];
        assert!(matches!(
            decode_varint(&mut cursor),
            Err(DecodeError::InvalidVarint)
        ));
    }

    // ========================================================================
    // zigzag tests
    // ========================================================================

    #[test]
    fn test_decode_zigzag_signs() {
        for (bytes, expected) in [(0x00u8, 0i64), (0x01, -1), (0x02, 1), (0x03, -2), (0x04, 2)] {
            let data = [bytes];
            let mut cursor = &data[..];
            assert_eq!(decode_zigzag(&mut cursor).unwrap(), expected);
        }
    }

    #[test]
    fn test_encode_zigzag() {
        assert_eq!(encode_zigzag(0), vec![0x00]);
        assert_eq!(encode_zigzag(-1), vec![0x01]);
        assert_eq!(encode_zigzag(1), vec![0x02]);
        assert_eq!(encode_zigzag(-64), vec![0x7F]);
        assert_eq!(encode_zigzag(64), vec![0x80, 0x01]);
    }

    #[test]
    fn test_skip_varint() {
        let mut cursor: &[u8] = &[0x80, 0x80, 0x01, 0xFF];
        skip_varint(&mut cursor).unwrap();
        assert_eq!(cursor, &[0xFF]);
    }

    #[test]
    fn test_zigzag_extremes_roundtrip() {
        for value in [i64::MAX, i64::MIN, i32::MAX as i64, i32::MIN as i64] {
            let encoded = encode_zigzag(value);
            let mut cursor = &encoded[..];
            assert_eq!(decode_zigzag(&mut cursor).unwrap(), value);
            assert!(cursor.is_empty());
        }
    }
}
