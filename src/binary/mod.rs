//! Byte-level substrate for the Avro binary format.
//!
//! The grammar-driven codecs call into these functions for every primitive;
//! nothing here knows about schema resolution.

pub mod decode;
pub mod encode;
pub mod varint;
