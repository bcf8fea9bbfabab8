//! Extended JSON codec.
//!
//! The encoding follows the Avro JSON encoding with these differences:
//!
//! - a `{null, T}` union is written bare: `null` or the `T` value, never
//!   wrapped in `{"T": ...}`
//! - record fields equal to their default may be left out when writing
//! - record fields may come in any order, and fields neither schema knows
//!   are skipped (or rejected in strict mode)
//! - decimals may be written as bare JSON numbers
//! - non-finite floats are written as the strings `"NaN"`, `"Infinity"` and
//!   `"-Infinity"`

mod decoder;
mod encoder;
pub(crate) mod tokens;

pub use decoder::JsonDecoder;
pub use encoder::JsonEncoder;
pub use tokens::JsonToken;
