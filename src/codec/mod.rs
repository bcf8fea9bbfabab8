//! Grammar-driven encoders and decoders.
//!
//! [`Encoder`] and [`Decoder`] are the primitive-level interfaces the datum
//! layer drives. Every call is checked against the grammar: asking for an
//! `int` where the schema has a `string` is an error, not a silent
//! misread. Two implementations exist for each:
//!
//! - [`binary`]: the standard Avro binary encoding
//! - [`json`]: the extended JSON encoding (compact `{null, T}` unions,
//!   default elision, out-of-order and unknown field tolerance, decimals as
//!   bare numbers)

pub mod binary;
pub mod json;

use bigdecimal::BigDecimal;

use crate::error::{DecodeError, EncodeError, GrammarError};
use crate::logical::DecimalType;

pub use binary::{BinaryDecoder, BinaryEncoder};
pub use json::{JsonDecoder, JsonEncoder};

/// Writes primitive values in the order the grammar dictates.
pub trait Encoder {
    fn write_null(&mut self) -> Result<(), EncodeError>;
    fn write_boolean(&mut self, value: bool) -> Result<(), EncodeError>;
    fn write_int(&mut self, value: i32) -> Result<(), EncodeError>;
    fn write_long(&mut self, value: i64) -> Result<(), EncodeError>;
    fn write_float(&mut self, value: f32) -> Result<(), EncodeError>;
    fn write_double(&mut self, value: f64) -> Result<(), EncodeError>;
    fn write_bytes(&mut self, value: &[u8]) -> Result<(), EncodeError>;
    fn write_string(&mut self, value: &str) -> Result<(), EncodeError>;
    fn write_fixed(&mut self, value: &[u8]) -> Result<(), EncodeError>;
    /// Write an enum by symbol index.
    fn write_enum(&mut self, index: usize) -> Result<(), EncodeError>;

    fn write_record_start(&mut self) -> Result<(), EncodeError>;
    fn write_record_end(&mut self) -> Result<(), EncodeError>;

    fn write_array_start(&mut self) -> Result<(), EncodeError>;
    fn write_array_end(&mut self) -> Result<(), EncodeError>;
    fn write_map_start(&mut self) -> Result<(), EncodeError>;
    fn write_map_key(&mut self, key: &str) -> Result<(), EncodeError>;
    fn write_map_end(&mut self) -> Result<(), EncodeError>;
    /// Announce the number of items or entries that follow.
    fn set_item_count(&mut self, count: usize) -> Result<(), EncodeError>;

    /// Select a union branch. The branch value is written next.
    fn write_index(&mut self, index: usize) -> Result<(), EncodeError>;

    /// Whether [`skip_field`](Self::skip_field) may be used to leave out
    /// fields equal to their default.
    fn supports_elision(&self) -> bool {
        false
    }

    /// Leave out the next record field entirely.
    fn skip_field(&mut self) -> Result<(), EncodeError> {
        Err(EncodeError::Grammar(GrammarError::InvalidState(
            "this encoder cannot leave out fields".to_string(),
        )))
    }

    /// Capability to write decimals as native numbers.
    fn direct_decimal(&mut self) -> Option<&mut dyn DirectDecimalEncoder> {
        None
    }
}

/// Reads primitive values in the order the grammar dictates, resolving the
/// writer's data to the reader's schema on the way.
pub trait Decoder {
    fn read_null(&mut self) -> Result<(), DecodeError>;
    fn read_boolean(&mut self) -> Result<bool, DecodeError>;
    fn read_int(&mut self) -> Result<i32, DecodeError>;
    fn read_long(&mut self) -> Result<i64, DecodeError>;
    fn read_float(&mut self) -> Result<f32, DecodeError>;
    fn read_double(&mut self) -> Result<f64, DecodeError>;
    fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError>;
    fn read_string(&mut self) -> Result<String, DecodeError>;
    fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>, DecodeError>;
    /// Read an enum as a reader symbol index.
    fn read_enum(&mut self) -> Result<usize, DecodeError>;

    fn read_record_start(&mut self) -> Result<(), DecodeError>;
    fn read_record_end(&mut self) -> Result<(), DecodeError>;

    /// Start an array. Returns the number of items in the first block; zero
    /// means the array is empty and already closed.
    fn read_array_start(&mut self) -> Result<u64, DecodeError>;
    /// Items in the next block; zero closes the array.
    fn array_next(&mut self) -> Result<u64, DecodeError>;
    fn read_map_start(&mut self) -> Result<u64, DecodeError>;
    fn read_map_key(&mut self) -> Result<String, DecodeError>;
    fn map_next(&mut self) -> Result<u64, DecodeError>;

    /// Read a union as a reader branch index. The branch value is read
    /// next.
    fn read_index(&mut self) -> Result<usize, DecodeError>;

    /// Capability to read decimals written as native numbers.
    fn direct_decimal(&mut self) -> Option<&mut dyn DirectDecimalDecoder> {
        None
    }
}

/// Writes a decimal as a native number in place of its physical form.
pub trait DirectDecimalEncoder {
    fn write_decimal(&mut self, logical: &DecimalType, value: &BigDecimal)
        -> Result<(), EncodeError>;
}

/// Reads a decimal written as a native number.
pub trait DirectDecimalDecoder {
    /// `Ok(None)` when the next value is not a native number; the caller
    /// then reads the physical form.
    fn read_decimal(&mut self, logical: &DecimalType) -> Result<Option<BigDecimal>, DecodeError>;
}

/// Options of the extended JSON codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonCodecOptions {
    /// Fail on object keys neither schema knows instead of skipping them.
    pub strict_unknown_fields: bool,
    /// Leave out record fields equal to their default when writing.
    pub elide_defaults: bool,
    /// Write and accept decimals as bare JSON numbers.
    pub direct_decimals: bool,
}

impl Default for JsonCodecOptions {
    fn default() -> Self {
        Self {
            strict_unknown_fields: false,
            elide_defaults: true,
            direct_decimals: true,
        }
    }
}

impl JsonCodecOptions {
    pub fn with_strict_unknown_fields(mut self, strict: bool) -> Self {
        self.strict_unknown_fields = strict;
        self
    }

    pub fn with_elide_defaults(mut self, elide: bool) -> Self {
        self.elide_defaults = elide;
        self
    }

    pub fn with_direct_decimals(mut self, direct: bool) -> Self {
        self.direct_decimals = direct;
        self
    }
}
