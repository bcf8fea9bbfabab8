//! Avro schema types and parsing.
//!
//! This module defines the Avro schema type system: the arena-backed schema
//! graph and its builder, JSON parsing and canonical serialization, structural
//! equality that terminates on recursive records, alias-based writer
//! rewriting, external schema references, and reader/writer resolution rules.

mod aliases;
mod builder;
mod equality;
mod parser;
mod reader_writer_resolution;
mod resolver;
mod serialize;
mod types;

pub use aliases::rewrite_writer_schema;
pub use builder::{SchemaBuilder, FIELD_RESERVED, SCHEMA_RESERVED};
pub use equality::{schema_hash, EqualityContext};
pub use parser::{parse_schema, parse_schema_with_options, ParseOptions, SchemaParser};
pub use reader_writer_resolution::{
    find_reader_branch, json_to_avro_value, match_writer_field, names_match, TypePromotion,
};
pub(crate) use reader_writer_resolution::{latin1_bytes, latin1_string, parse_double};
pub use resolver::{MapSchemaResolver, SchemaResolver, SchemaResolvers};
pub use serialize::SchemaWriter;
pub use types::*;
