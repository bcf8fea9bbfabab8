//! Whole-value reading and writing.
//!
//! [`DatumWriter`] walks an [`AvroValue`] alongside the writer schema and
//! drives an [`Encoder`]; [`DatumReader`] walks the reader schema and pulls
//! values from a [`Decoder`]. Logical types are applied here, at the leaves:
//! the codecs only ever see physical values.
//!
//! # Example
//!
//! ```ignore
//! let schema = Schema::parse(r#"{"type":"array","items":"long"}"#)?;
//! let value = AvroValue::Array(vec![AvroValue::Long(1), AvroValue::Long(2)]);
//! let bytes = to_binary(&value, &schema)?;
//! assert_eq!(from_binary(&bytes, &schema)?, value);
//! ```

use std::collections::HashMap;

use tracing::warn;

use crate::codec::{BinaryDecoder, BinaryEncoder, Decoder, Encoder, JsonCodecOptions};
use crate::codec::{JsonDecoder, JsonEncoder};
use crate::error::{DecodeError, EncodeError};
use crate::grammar::Grammar;
use crate::schema::{json_to_avro_value, Schema, SchemaId, SchemaKind, SchemaType};
use crate::value::AvroValue;

/// Writes values of one schema to any encoder.
#[derive(Debug, Clone)]
pub struct DatumWriter {
    schema: Schema,
    /// Physical field defaults by record node and field position.
    defaults: HashMap<(SchemaId, usize), AvroValue>,
}

impl DatumWriter {
    pub fn new(schema: &Schema) -> Self {
        let mut defaults = HashMap::new();
        for node in schema.arena_nodes() {
            for field in node.fields() {
                let Some(json) = &field.default else {
                    continue;
                };
                match json_to_avro_value(json, &node.field_schema(field)) {
                    Ok(value) => {
                        defaults.insert((node.id(), field.position), value);
                    }
                    Err(e) => warn!(field = %field.name, error = %e, "Ignoring unusable field default"),
                }
            }
        }
        Self {
            schema: schema.clone(),
            defaults,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Write one value.
    pub fn write<E: Encoder + ?Sized>(
        &self,
        value: &AvroValue,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        self.write_value(value, &self.schema, encoder)
    }

    fn write_value<E: Encoder + ?Sized>(
        &self,
        value: &AvroValue,
        schema: &Schema,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        let Some(logical) = schema.logical_type() else {
            return self.write_physical(value, schema, encoder);
        };
        if let (Some(decimal), AvroValue::Decimal(d)) = (logical.as_decimal(), value) {
            if decimal.supports_direct() {
                if let Some(direct) = encoder.direct_decimal() {
                    return direct.write_decimal(decimal, d);
                }
            }
        }
        let wire = logical.to_wire(value)?;
        self.write_physical(&wire, schema, encoder)
    }

    fn write_physical<E: Encoder + ?Sized>(
        &self,
        value: &AvroValue,
        schema: &Schema,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        let mismatch = || type_mismatch(schema, value);
        match schema.kind() {
            SchemaKind::Null => match value {
                AvroValue::Null => encoder.write_null(),
                _ => Err(mismatch()),
            },
            SchemaKind::Boolean => match value {
                AvroValue::Boolean(b) => encoder.write_boolean(*b),
                _ => Err(mismatch()),
            },
            SchemaKind::Int => match value {
                AvroValue::Int(v) => encoder.write_int(*v),
                _ => Err(mismatch()),
            },
            SchemaKind::Long => encoder.write_long(value.as_i64().ok_or_else(mismatch)?),
            SchemaKind::Float => match value {
                AvroValue::Float(v) => encoder.write_float(*v),
                AvroValue::Int(v) => encoder.write_float(*v as f32),
                AvroValue::Long(v) => encoder.write_float(*v as f32),
                _ => Err(mismatch()),
            },
            SchemaKind::Double => match value {
                AvroValue::Double(v) => encoder.write_double(*v),
                AvroValue::Float(v) => encoder.write_double(f64::from(*v)),
                AvroValue::Int(v) => encoder.write_double(f64::from(*v)),
                AvroValue::Long(v) => encoder.write_double(*v as f64),
                _ => Err(mismatch()),
            },
            SchemaKind::Bytes => match value {
                AvroValue::Bytes(b) => encoder.write_bytes(b),
                _ => Err(mismatch()),
            },
            SchemaKind::String => match value {
                AvroValue::String(s) => encoder.write_string(s),
                _ => Err(mismatch()),
            },
            SchemaKind::Fixed(_) => match value {
                AvroValue::Fixed(b) | AvroValue::Bytes(b) => encoder.write_fixed(b),
                _ => Err(mismatch()),
            },
            SchemaKind::Enum(e) => {
                let index = match value {
                    AvroValue::Enum(index, symbol) => e.resolve_symbol(symbol).unwrap_or(*index),
                    AvroValue::String(symbol) => e.resolve_symbol(symbol).ok_or_else(|| {
                        EncodeError::InvalidValue(format!(
                            "'{}' is not a symbol of enum '{}'",
                            symbol,
                            e.name.fullname()
                        ))
                    })?,
                    _ => return Err(mismatch()),
                };
                encoder.write_enum(index)
            }
            SchemaKind::Array(items) => {
                let AvroValue::Array(values) = value else {
                    return Err(mismatch());
                };
                let items = schema.at(*items);
                encoder.write_array_start()?;
                encoder.set_item_count(values.len())?;
                for v in values {
                    self.write_value(v, &items, encoder)?;
                }
                encoder.write_array_end()
            }
            SchemaKind::Map(values) => {
                let AvroValue::Map(entries) = value else {
                    return Err(mismatch());
                };
                let values = schema.at(*values);
                encoder.write_map_start()?;
                encoder.set_item_count(entries.len())?;
                for (k, v) in entries {
                    encoder.write_map_key(k)?;
                    self.write_value(v, &values, encoder)?;
                }
                encoder.write_map_end()
            }
            SchemaKind::Record(record) => {
                let AvroValue::Record(supplied) = value else {
                    return Err(mismatch());
                };
                encoder.write_record_start()?;
                for field in record.fields() {
                    let field_schema = schema.field_schema(field);
                    let given = supplied
                        .iter()
                        .find(|(name, _)| field.answers_to(name))
                        .map(|(_, v)| v);
                    let default = self.defaults.get(&(schema.id(), field.position));
                    match (given, default) {
                        (Some(v), Some(d)) if encoder.supports_elision() => {
                            if self.to_physical(v, &field_schema).ok().as_ref() == Some(d) {
                                encoder.skip_field()?;
                            } else {
                                self.write_value(v, &field_schema, encoder)?;
                            }
                        }
                        (Some(v), _) => self.write_value(v, &field_schema, encoder)?,
                        (None, Some(_)) if encoder.supports_elision() => encoder.skip_field()?,
                        (None, Some(d)) => self.write_value(d, &field_schema, encoder)?,
                        (None, None) => {
                            return Err(EncodeError::MissingField {
                                record: record.name.fullname(),
                                field: field.name.clone(),
                            })
                        }
                    }
                }
                encoder.write_record_end()
            }
            SchemaKind::Union(_) => {
                let branches = schema.branches();
                let (index, inner) = select_branch(value, schema, &branches)?;
                encoder.write_index(index)?;
                self.write_value(inner, &branches[index], encoder)
            }
        }
    }

    /// The physical form `value` takes under `schema`, with unions and enums
    /// normalized. Used to compare a field value with its default.
    fn to_physical(&self, value: &AvroValue, schema: &Schema) -> Result<AvroValue, EncodeError> {
        if let Some(logical) = schema.logical_type() {
            let wire = logical.to_wire(value)?;
            return self.physical_shape(&wire, schema);
        }
        self.physical_shape(value, schema)
    }

    fn physical_shape(&self, value: &AvroValue, schema: &Schema) -> Result<AvroValue, EncodeError> {
        let mismatch = || type_mismatch(schema, value);
        Ok(match (schema.kind(), value) {
            (SchemaKind::Long, v) => AvroValue::Long(v.as_i64().ok_or_else(mismatch)?),
            (SchemaKind::Float, AvroValue::Int(v)) => AvroValue::Float(*v as f32),
            (SchemaKind::Float, AvroValue::Long(v)) => AvroValue::Float(*v as f32),
            (SchemaKind::Double, AvroValue::Float(v)) => AvroValue::Double(f64::from(*v)),
            (SchemaKind::Double, AvroValue::Int(v)) => AvroValue::Double(f64::from(*v)),
            (SchemaKind::Double, AvroValue::Long(v)) => AvroValue::Double(*v as f64),
            (SchemaKind::Fixed(_), AvroValue::Bytes(b)) => AvroValue::Fixed(b.clone()),
            (SchemaKind::Enum(e), AvroValue::Enum(_, symbol) | AvroValue::String(symbol)) => {
                let index = e.resolve_symbol(symbol).ok_or_else(mismatch)?;
                AvroValue::Enum(index, e.symbols[index].clone())
            }
            (SchemaKind::Array(items), AvroValue::Array(values)) => {
                let items = schema.at(*items);
                AvroValue::Array(
                    values
                        .iter()
                        .map(|v| self.to_physical(v, &items))
                        .collect::<Result<_, _>>()?,
                )
            }
            (SchemaKind::Map(values), AvroValue::Map(entries)) => {
                let values = schema.at(*values);
                AvroValue::Map(
                    entries
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), self.to_physical(v, &values)?)))
                        .collect::<Result<_, EncodeError>>()?,
                )
            }
            (SchemaKind::Record(record), AvroValue::Record(supplied)) => {
                let mut fields = Vec::with_capacity(record.fields().len());
                for field in record.fields() {
                    let given = supplied.iter().find(|(name, _)| field.answers_to(name));
                    let v = match (given, self.defaults.get(&(schema.id(), field.position))) {
                        (Some((_, v)), _) => self.to_physical(v, &schema.field_schema(field))?,
                        (None, Some(d)) => d.clone(),
                        (None, None) => {
                            return Err(EncodeError::MissingField {
                                record: record.name.fullname(),
                                field: field.name.clone(),
                            })
                        }
                    };
                    fields.push((field.name.clone(), v));
                }
                AvroValue::Record(fields)
            }
            (SchemaKind::Union(_), v) => {
                let branches = schema.branches();
                let (index, inner) = select_branch(v, schema, &branches)?;
                AvroValue::Union(index, Box::new(self.to_physical(inner, &branches[index])?))
            }
            (_, v) => v.clone(),
        })
    }
}

fn type_mismatch(schema: &Schema, value: &AvroValue) -> EncodeError {
    EncodeError::TypeMismatch {
        expected: schema.full_name(),
        found: value.type_name().to_string(),
    }
}

/// Pick the union branch a value is written under: the branch an explicit
/// `Union` value names, else the first branch that takes the value as is,
/// else the first branch a numeric value widens to.
fn select_branch<'v>(
    value: &'v AvroValue,
    schema: &Schema,
    branches: &[Schema],
) -> Result<(usize, &'v AvroValue), EncodeError> {
    if let AvroValue::Union(index, inner) = value {
        return if *index < branches.len() {
            Ok((*index, inner))
        } else {
            Err(EncodeError::Grammar(
                crate::error::GrammarError::IndexOutOfRange {
                    what: "union",
                    index: *index,
                    len: branches.len(),
                },
            ))
        };
    }
    if let Some(index) = branches.iter().position(|b| accepts(b, value)) {
        return Ok((index, value));
    }
    branches
        .iter()
        .position(|b| widens_to(value, b.schema_type()))
        .map(|index| (index, value))
        .ok_or_else(|| EncodeError::TypeMismatch {
            expected: schema.to_json(),
            found: value.type_name().to_string(),
        })
}

/// Whether `schema` takes `value` without numeric widening.
fn accepts(schema: &Schema, value: &AvroValue) -> bool {
    if let Some(logical) = schema.logical_type() {
        if !is_physical(value) {
            return logical
                .to_wire(value)
                .map(|wire| accepts_physical(schema, &wire))
                .unwrap_or(false);
        }
    }
    accepts_physical(schema, value)
}

fn is_physical(value: &AvroValue) -> bool {
    !matches!(
        value,
        AvroValue::Decimal(_)
            | AvroValue::BigInteger(_)
            | AvroValue::Date(_)
            | AvroValue::YearMonth(_)
            | AvroValue::Instant(_)
            | AvroValue::Uuid(_)
            | AvroValue::Url(_)
            | AvroValue::Uri(_)
            | AvroValue::Json(_)
            | AvroValue::Any(_)
    )
}

fn accepts_physical(schema: &Schema, value: &AvroValue) -> bool {
    match (schema.kind(), value) {
        (SchemaKind::Null, AvroValue::Null)
        | (SchemaKind::Boolean, AvroValue::Boolean(_))
        | (SchemaKind::Int, AvroValue::Int(_))
        | (SchemaKind::Long, AvroValue::Long(_))
        | (SchemaKind::Float, AvroValue::Float(_))
        | (SchemaKind::Double, AvroValue::Double(_))
        | (SchemaKind::Bytes, AvroValue::Bytes(_))
        | (SchemaKind::String, AvroValue::String(_))
        | (SchemaKind::Array(_), AvroValue::Array(_))
        | (SchemaKind::Map(_), AvroValue::Map(_)) => true,
        (SchemaKind::Fixed(f), AvroValue::Fixed(b)) => b.len() == f.size,
        (SchemaKind::Enum(e), AvroValue::Enum(_, symbol)) => e.resolve_symbol(symbol).is_some(),
        (SchemaKind::Record(r), AvroValue::Record(fields)) => {
            fields
                .iter()
                .all(|(name, _)| r.fields().iter().any(|f| f.answers_to(name)))
                && r.fields().iter().all(|f| {
                    f.default.is_some() || fields.iter().any(|(name, _)| f.answers_to(name))
                })
        }
        _ => false,
    }
}

fn widens_to(value: &AvroValue, target: SchemaType) -> bool {
    matches!(
        (value, target),
        (AvroValue::Int(_), SchemaType::Long | SchemaType::Float | SchemaType::Double)
            | (AvroValue::Long(_), SchemaType::Float | SchemaType::Double)
            | (AvroValue::Float(_), SchemaType::Double)
    )
}

/// Reads values of one reader schema from any decoder.
#[derive(Debug, Clone)]
pub struct DatumReader {
    schema: Schema,
}

impl DatumReader {
    pub fn new(reader: &Schema) -> Self {
        Self {
            schema: reader.clone(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Read one value.
    pub fn read<D: Decoder + ?Sized>(&self, decoder: &mut D) -> Result<AvroValue, DecodeError> {
        self.read_value(&self.schema, decoder)
    }

    fn read_value<D: Decoder + ?Sized>(
        &self,
        schema: &Schema,
        decoder: &mut D,
    ) -> Result<AvroValue, DecodeError> {
        let Some(logical) = schema.logical_type() else {
            return self.read_physical(schema, decoder);
        };
        if let Some(decimal) = logical.as_decimal() {
            if decimal.supports_direct() {
                if let Some(direct) = decoder.direct_decimal() {
                    if let Some(value) = direct.read_decimal(decimal)? {
                        return Ok(AvroValue::Decimal(value));
                    }
                }
            }
        }
        let raw = self.read_physical(schema, decoder)?;
        Ok(logical.from_wire(raw)?)
    }

    fn read_physical<D: Decoder + ?Sized>(
        &self,
        schema: &Schema,
        decoder: &mut D,
    ) -> Result<AvroValue, DecodeError> {
        Ok(match schema.kind() {
            SchemaKind::Null => {
                decoder.read_null()?;
                AvroValue::Null
            }
            SchemaKind::Boolean => AvroValue::Boolean(decoder.read_boolean()?),
            SchemaKind::Int => AvroValue::Int(decoder.read_int()?),
            SchemaKind::Long => AvroValue::Long(decoder.read_long()?),
            SchemaKind::Float => AvroValue::Float(decoder.read_float()?),
            SchemaKind::Double => AvroValue::Double(decoder.read_double()?),
            SchemaKind::Bytes => AvroValue::Bytes(decoder.read_bytes()?),
            SchemaKind::String => AvroValue::String(decoder.read_string()?),
            SchemaKind::Fixed(f) => AvroValue::Fixed(decoder.read_fixed(f.size)?),
            SchemaKind::Enum(e) => {
                let index = decoder.read_enum()?;
                let symbol = e.symbols.get(index).cloned().ok_or_else(|| {
                    DecodeError::InvalidData(format!(
                        "Enum index {} out of range for '{}'",
                        index,
                        e.name.fullname()
                    ))
                })?;
                AvroValue::Enum(index, symbol)
            }
            SchemaKind::Array(items) => {
                let items = schema.at(*items);
                let mut values = Vec::new();
                let mut count = decoder.read_array_start()?;
                while count > 0 {
                    for _ in 0..count {
                        values.push(self.read_value(&items, decoder)?);
                    }
                    count = decoder.array_next()?;
                }
                AvroValue::Array(values)
            }
            SchemaKind::Map(values) => {
                let values = schema.at(*values);
                let mut entries = Vec::new();
                let mut count = decoder.read_map_start()?;
                while count > 0 {
                    for _ in 0..count {
                        let key = decoder.read_map_key()?;
                        entries.push((key, self.read_value(&values, decoder)?));
                    }
                    count = decoder.map_next()?;
                }
                AvroValue::Map(entries)
            }
            SchemaKind::Record(record) => {
                decoder.read_record_start()?;
                let mut fields = Vec::with_capacity(record.fields().len());
                for field in record.fields() {
                    let value = self.read_value(&schema.field_schema(field), decoder)?;
                    fields.push((field.name.clone(), value));
                }
                decoder.read_record_end()?;
                AvroValue::Record(fields)
            }
            SchemaKind::Union(_) => {
                let index = decoder.read_index()?;
                let branch = schema.branches().into_iter().nth(index).ok_or_else(|| {
                    DecodeError::InvalidData(format!("Union branch {} out of range", index))
                })?;
                AvroValue::Union(index, Box::new(self.read_value(&branch, decoder)?))
            }
        })
    }
}

/// Encode one value in the binary format.
pub fn to_binary(value: &AvroValue, schema: &Schema) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = BinaryEncoder::new(schema);
    DatumWriter::new(schema).write(value, &mut encoder)?;
    Ok(encoder.into_bytes())
}

/// Decode one binary value written with `schema`.
pub fn from_binary(bytes: &[u8], schema: &Schema) -> Result<AvroValue, DecodeError> {
    let mut decoder = BinaryDecoder::new(bytes, schema);
    DatumReader::new(schema).read(&mut decoder)
}

/// Decode one binary value written with `writer` as the `reader` schema.
pub fn from_binary_with_writer(
    bytes: &[u8],
    writer: &Schema,
    reader: &Schema,
) -> Result<AvroValue, DecodeError> {
    let mut decoder = BinaryDecoder::resolving(bytes, writer, reader);
    DatumReader::new(reader).read(&mut decoder)
}

/// Encode one value in the extended JSON format with default options.
pub fn to_json_string(value: &AvroValue, schema: &Schema) -> Result<String, EncodeError> {
    to_json_string_with_options(value, schema, JsonCodecOptions::default())
}

pub fn to_json_string_with_options(
    value: &AvroValue,
    schema: &Schema,
    options: JsonCodecOptions,
) -> Result<String, EncodeError> {
    let mut encoder = JsonEncoder::with_options(schema, options);
    DatumWriter::new(schema).write(value, &mut encoder)?;
    Ok(encoder.into_string())
}

/// Decode one extended JSON value written with `schema`.
pub fn from_json_str(text: &str, schema: &Schema) -> Result<AvroValue, DecodeError> {
    from_json_str_with_options(text, schema, JsonCodecOptions::default())
}

pub fn from_json_str_with_options(
    text: &str,
    schema: &Schema,
    options: JsonCodecOptions,
) -> Result<AvroValue, DecodeError> {
    let mut decoder = JsonDecoder::with_grammar(text, Grammar::for_writing(schema), options)?;
    DatumReader::new(schema).read(&mut decoder)
}
