//! Avro schemas, logical types and grammar-driven codecs
//!
//! This library models Avro schemas as an arena-backed graph, attaches
//! logical types (decimal, big integer, dates, instants, UUID/URL, embedded
//! JSON, self-describing payloads) and reads and writes data in the binary
//! and an extended JSON encoding. Both encodings are driven by a grammar
//! derived from the schema, which also carries reader/writer schema
//! resolution: field reordering, defaults, promotions, enum and union
//! mapping.
//!
//! # Example
//!
//! ```ignore
//! use avrokit::{from_json_str, to_binary, from_binary, Schema};
//!
//! let schema = Schema::parse(r#"{"type":"record","name":"User","fields":[
//!     {"name":"name","type":"string"},
//!     {"name":"email","type":["null","string"],"default":null}]}"#)?;
//! let user = from_json_str(r#"{"name":"ann"}"#, &schema)?;
//! let bytes = to_binary(&user, &schema)?;
//! assert_eq!(from_binary(&bytes, &schema)?, user);
//! ```

pub mod binary;
pub mod codec;
pub mod datum;
pub mod error;
pub mod grammar;
pub mod logical;
pub mod schema;
pub mod value;

// Re-export main types
pub use codec::{
    BinaryDecoder, BinaryEncoder, Decoder, DirectDecimalDecoder, DirectDecimalEncoder, Encoder,
    JsonCodecOptions, JsonDecoder, JsonEncoder,
};
pub use datum::{
    from_binary, from_binary_with_writer, from_json_str, from_json_str_with_options, to_binary,
    to_json_string, to_json_string_with_options, DatumReader, DatumWriter,
};
pub use error::{ConversionError, DecodeError, EncodeError, GrammarError, SchemaError};
pub use grammar::{Grammar, Parser};
pub use logical::{
    BuiltinConfig, CustomLogicalType, DateStringCache, DecimalType, LogicalType,
    LogicalTypeFactory, LogicalTypeRegistry, RoundingMode, SchemaInference,
};
pub use schema::{
    parse_schema, parse_schema_with_options, rewrite_writer_schema, Field, FieldOrder,
    MapSchemaResolver, Name, ParseOptions, Properties, Schema, SchemaBuilder, SchemaKind,
    SchemaParser, SchemaResolver, SchemaType, TypePromotion,
};
pub use value::{AnyValue, AvroValue, YearMonth};
