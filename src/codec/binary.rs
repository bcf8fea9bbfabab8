//! Grammar-driven Avro binary codec.
//!
//! The encoder writes exactly the standard binary encoding. The decoder
//! reads it under a resolving grammar: fields the reader takes in a
//! different order than the writer wrote them are buffered as raw bytes and
//! replayed when the reader reaches them, fields only the reader has are
//! served from the pre-encoded default, and writer-only fields are skipped.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::binary::decode::{
    decode_block_count, decode_boolean, decode_bytes_ref, decode_double, decode_fixed_ref,
    decode_float, decode_int, decode_long, decode_string, skip_value,
};
use crate::binary::encode::{
    put_boolean, put_bytes, put_double, put_float, put_int, put_long, put_string,
};
use crate::error::{DecodeError, EncodeError, GrammarError};
use crate::grammar::{FieldInfo, Grammar, Parser, RecordLayout, Symbol};
use crate::schema::{Schema, SchemaType};
use crate::value::AvroValue;

use super::{Decoder, Encoder};

/// Binary encoder over a growable buffer.
#[derive(Debug)]
pub struct BinaryEncoder {
    buf: Vec<u8>,
    parser: Parser,
}

impl BinaryEncoder {
    pub fn new(schema: &Schema) -> Self {
        Self::with_grammar(Grammar::for_writing(schema))
    }

    pub fn with_grammar(grammar: Arc<Grammar>) -> Self {
        Self {
            buf: Vec::new(),
            parser: Parser::new(grammar),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Next terminal, handling the actions in front of it.
    fn advance(&mut self) -> Result<Symbol, EncodeError> {
        loop {
            let symbol = self.parser.next()?;
            match symbol {
                Symbol::Field(_) | Symbol::FieldEnd | Symbol::UnionEnd => self.parser.consume(),
                Symbol::Error(msg) => return Err(GrammarError::Resolution(msg.to_string()).into()),
                other => return Ok(other),
            }
        }
    }

    fn expect(
        &mut self,
        expected: &str,
        accept: impl Fn(&Symbol) -> bool,
    ) -> Result<Symbol, EncodeError> {
        let symbol = self.advance()?;
        if !accept(&symbol) {
            return Err(crate::grammar::mismatch(expected, &symbol).into());
        }
        self.parser.consume();
        Ok(symbol)
    }

    /// Pop the field and union closers that follow a completed value.
    fn drain(&mut self) {
        while matches!(
            self.parser.peek_raw(),
            Some(Symbol::FieldEnd) | Some(Symbol::UnionEnd)
        ) {
            self.parser.pop();
        }
    }

    fn scalar(&mut self, ty: SchemaType, write: impl FnOnce(&mut Vec<u8>)) -> Result<(), EncodeError> {
        self.expect(ty.as_str(), |s| s.primitive_type() == Some(ty))?;
        write(&mut self.buf);
        self.drain();
        Ok(())
    }
}

impl Encoder for BinaryEncoder {
    fn write_null(&mut self) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Null, |_| {})
    }

    fn write_boolean(&mut self, value: bool) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Boolean, |buf| put_boolean(buf, value))
    }

    fn write_int(&mut self, value: i32) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Int, |buf| put_int(buf, value))
    }

    fn write_long(&mut self, value: i64) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Long, |buf| put_long(buf, value))
    }

    fn write_float(&mut self, value: f32) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Float, |buf| put_float(buf, value))
    }

    fn write_double(&mut self, value: f64) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Double, |buf| put_double(buf, value))
    }

    fn write_bytes(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Bytes, |buf| put_bytes(buf, value))
    }

    fn write_string(&mut self, value: &str) -> Result<(), EncodeError> {
        self.scalar(SchemaType::String, |buf| put_string(buf, value))
    }

    fn write_fixed(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        let symbol = self.expect("fixed", |s| matches!(s, Symbol::Fixed(_)))?;
        if let Symbol::Fixed(size) = symbol {
            if size != value.len() {
                return Err(EncodeError::InvalidValue(format!(
                    "Fixed value has {} bytes, schema requires {}",
                    value.len(),
                    size
                )));
            }
        }
        self.buf.extend_from_slice(value);
        self.drain();
        Ok(())
    }

    fn write_enum(&mut self, index: usize) -> Result<(), EncodeError> {
        let symbol = self.expect("enum", |s| matches!(s, Symbol::Enum(_)))?;
        if let Symbol::Enum(adjust) = symbol {
            let len = adjust.writer_symbols.len();
            if index >= len {
                return Err(GrammarError::IndexOutOfRange {
                    what: "enum",
                    index,
                    len,
                }
                .into());
            }
        }
        put_int(&mut self.buf, index as i32);
        self.drain();
        Ok(())
    }

    fn write_record_start(&mut self) -> Result<(), EncodeError> {
        self.expect("record", |s| matches!(s, Symbol::RecordStart(_)))?;
        Ok(())
    }

    fn write_record_end(&mut self) -> Result<(), EncodeError> {
        self.expect("record end", |s| matches!(s, Symbol::RecordEnd))?;
        self.drain();
        Ok(())
    }

    fn write_array_start(&mut self) -> Result<(), EncodeError> {
        self.expect("array", |s| matches!(s, Symbol::ArrayStart))?;
        Ok(())
    }

    fn write_array_end(&mut self) -> Result<(), EncodeError> {
        self.parser.end_repeat()?;
        self.expect("array end", |s| matches!(s, Symbol::ArrayEnd))?;
        put_long(&mut self.buf, 0);
        self.drain();
        Ok(())
    }

    fn write_map_start(&mut self) -> Result<(), EncodeError> {
        self.expect("map", |s| matches!(s, Symbol::MapStart))?;
        Ok(())
    }

    fn write_map_key(&mut self, key: &str) -> Result<(), EncodeError> {
        self.expect("map key", |s| matches!(s, Symbol::MapKey))?;
        put_string(&mut self.buf, key);
        Ok(())
    }

    fn write_map_end(&mut self) -> Result<(), EncodeError> {
        self.parser.end_repeat()?;
        self.expect("map end", |s| matches!(s, Symbol::MapEnd))?;
        put_long(&mut self.buf, 0);
        self.drain();
        Ok(())
    }

    fn set_item_count(&mut self, count: usize) -> Result<(), EncodeError> {
        if count > 0 {
            put_long(&mut self.buf, count as i64);
        }
        Ok(())
    }

    fn write_index(&mut self, index: usize) -> Result<(), EncodeError> {
        let symbol = self.expect("union", |s| matches!(s, Symbol::WriterUnion(_)))?;
        if let Symbol::WriterUnion(info) = symbol {
            let branch = info.production(index)?;
            put_long(&mut self.buf, index as i64);
            self.parser.push(branch);
        }
        Ok(())
    }
}

/// Where the decoder currently reads from: the input itself, or a buffered
/// field or default being replayed.
#[derive(Debug)]
enum Source<'a> {
    Borrowed(&'a [u8]),
    Shared { data: Arc<[u8]>, pos: usize },
}

#[derive(Debug)]
struct Frame {
    layout: Arc<RecordLayout>,
    /// Next writer field still on the wire.
    next_writer: usize,
    /// Writer fields read ahead of the reader, by writer position.
    captured: HashMap<usize, Arc<[u8]>>,
}

/// Binary decoder over a byte slice.
#[derive(Debug)]
pub struct BinaryDecoder<'a> {
    sources: Vec<Source<'a>>,
    parser: Parser,
    frames: Vec<Frame>,
    /// Per open field, whether it pushed a source.
    field_sources: Vec<bool>,
}

impl<'a> BinaryDecoder<'a> {
    /// Decoder for data written with `schema` and read as the same schema.
    pub fn new(data: &'a [u8], schema: &Schema) -> Self {
        Self::with_grammar(data, Grammar::for_writing(schema))
    }

    /// Decoder for data written with `writer` and read as `reader`.
    pub fn resolving(data: &'a [u8], writer: &Schema, reader: &Schema) -> Self {
        Self::with_grammar(data, Grammar::resolving(writer, reader))
    }

    pub fn with_grammar(data: &'a [u8], grammar: Arc<Grammar>) -> Self {
        Self {
            sources: vec![Source::Borrowed(data)],
            parser: Parser::new(grammar),
            frames: Vec::new(),
            field_sources: Vec::new(),
        }
    }

    /// Bytes of input not yet consumed.
    pub fn remaining(&self) -> usize {
        match self.sources.first() {
            Some(Source::Borrowed(data)) => data.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn read<T>(
        &mut self,
        f: impl FnOnce(&mut &[u8]) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        match self.sources.last_mut() {
            Some(Source::Borrowed(data)) => f(data),
            Some(Source::Shared { data, pos }) => {
                let mut cursor = data.get(*pos..).unwrap_or_default();
                let before = cursor.len();
                let value = f(&mut cursor)?;
                *pos += before - cursor.len();
                Ok(value)
            }
            None => Err(DecodeError::UnexpectedEof),
        }
    }

    /// Next terminal, handling the actions in front of it.
    fn advance(&mut self) -> Result<Symbol, DecodeError> {
        loop {
            let symbol = self.parser.next()?;
            match symbol {
                Symbol::Field(info) => {
                    self.parser.consume();
                    self.enter_field(&info)?;
                }
                Symbol::FieldEnd => {
                    self.parser.consume();
                    self.leave_field();
                }
                Symbol::UnionEnd => self.parser.consume(),
                Symbol::WriterUnion(info) => {
                    self.parser.consume();
                    let index = self.read(decode_long)?;
                    let branch = usize::try_from(index)
                        .map_err(|_| {
                            DecodeError::InvalidData(format!("Negative union index {}", index))
                        })
                        .and_then(|i| Ok(info.branch(i)?))?;
                    self.parser.push(branch);
                }
                Symbol::Error(msg) => return Err(GrammarError::Resolution(msg.to_string()).into()),
                other => return Ok(other),
            }
        }
    }

    fn expect(
        &mut self,
        expected: &str,
        accept: impl Fn(&Symbol) -> bool,
    ) -> Result<Symbol, DecodeError> {
        let symbol = self.advance()?;
        if !accept(&symbol) {
            return Err(crate::grammar::mismatch(expected, &symbol).into());
        }
        self.parser.consume();
        Ok(symbol)
    }

    fn drain(&mut self) {
        loop {
            match self.parser.peek_raw() {
                Some(Symbol::FieldEnd) => {
                    self.parser.pop();
                    self.leave_field();
                }
                Some(Symbol::UnionEnd) => {
                    self.parser.pop();
                }
                _ => return,
            }
        }
    }

    fn enter_field(&mut self, info: &FieldInfo) -> Result<(), DecodeError> {
        let Some(position) = info.writer_position else {
            let default = info.default.as_ref().ok_or_else(|| DecodeError::MissingField {
                record: self
                    .frames
                    .last()
                    .map(|f| f.layout.name.clone())
                    .unwrap_or_default(),
                field: info.name.clone(),
            })?;
            trace!(field = %info.name, "Reading field default");
            self.sources.push(Source::Shared {
                data: default.binary()?,
                pos: 0,
            });
            self.field_sources.push(true);
            return Ok(());
        };
        let mut frame = self.frames.pop().ok_or_else(|| {
            GrammarError::InvalidState("field outside of a record".to_string())
        })?;
        let result = self.position_on(&mut frame, position);
        self.frames.push(frame);
        result
    }

    /// Make the writer field at `position` the next thing read, buffering
    /// any fields before it that the reader still needs.
    fn position_on(&mut self, frame: &mut Frame, position: usize) -> Result<(), DecodeError> {
        if let Some(data) = frame.captured.remove(&position) {
            self.sources.push(Source::Shared { data, pos: 0 });
            self.field_sources.push(true);
            return Ok(());
        }
        let writer = frame.layout.writer.clone();
        let fields = writer.fields();
        while frame.next_writer < position {
            let index = frame.next_writer;
            let schema = writer.field_schema(&fields[index]);
            if frame.layout.writer_used[index] {
                let raw = self.read(|data| {
                    let start = *data;
                    skip_value(data, &schema)?;
                    Ok(start[..start.len() - data.len()].to_vec())
                })?;
                trace!(field = %fields[index].name, bytes = raw.len(), "Buffered field read out of order");
                frame.captured.insert(index, Arc::from(raw));
            } else {
                self.read(|data| skip_value(data, &schema))?;
            }
            frame.next_writer += 1;
        }
        if frame.next_writer != position {
            return Err(GrammarError::InvalidState(format!(
                "writer field {} of '{}' was already consumed",
                position, frame.layout.name
            ))
            .into());
        }
        frame.next_writer = position + 1;
        self.field_sources.push(false);
        Ok(())
    }

    fn leave_field(&mut self) {
        if self.field_sources.pop() == Some(true) {
            self.sources.pop();
        }
    }

    fn read_physical(&mut self, ty: SchemaType) -> Result<AvroValue, DecodeError> {
        Ok(match ty {
            SchemaType::Null => AvroValue::Null,
            SchemaType::Boolean => AvroValue::Boolean(self.read(decode_boolean)?),
            SchemaType::Int => AvroValue::Int(self.read(decode_int)?),
            SchemaType::Long => AvroValue::Long(self.read(decode_long)?),
            SchemaType::Float => AvroValue::Float(self.read(decode_float)?),
            SchemaType::Double => AvroValue::Double(self.read(decode_double)?),
            SchemaType::Bytes => {
                AvroValue::Bytes(self.read(|data| decode_bytes_ref(data).map(<[u8]>::to_vec))?)
            }
            SchemaType::String => AvroValue::String(self.read(decode_string)?),
            other => {
                return Err(DecodeError::TypeMismatch(format!(
                    "{} is not a primitive",
                    other
                )))
            }
        })
    }

    /// Read a primitive of type `ty`, promoting a narrower writer value.
    fn scalar(&mut self, ty: SchemaType) -> Result<AvroValue, DecodeError> {
        let symbol = self.advance()?;
        let value = match &symbol {
            s if s.primitive_type() == Some(ty) => {
                self.parser.consume();
                self.read_physical(ty)?
            }
            Symbol::Promote(promotion) if promotion.target() == ty => {
                self.parser.consume();
                let raw = self.read_physical(promotion.source())?;
                promotion.apply(raw)?
            }
            other => return Err(crate::grammar::mismatch(ty.as_str(), other).into()),
        };
        self.drain();
        Ok(value)
    }

    fn block(&mut self, end: Symbol) -> Result<u64, DecodeError> {
        let count = self.read(decode_block_count)?;
        if count == 0 {
            self.parser.end_repeat()?;
            let expected = end.describe();
            self.expect(expected, |s| s.describe() == expected)?;
            self.drain();
        }
        Ok(count)
    }
}

fn unexpected(ty: SchemaType, value: &AvroValue) -> DecodeError {
    DecodeError::TypeMismatch(format!("expected {}, found {}", ty, value.type_name()))
}

impl Decoder for BinaryDecoder<'_> {
    fn read_null(&mut self) -> Result<(), DecodeError> {
        self.scalar(SchemaType::Null).map(|_| ())
    }

    fn read_boolean(&mut self) -> Result<bool, DecodeError> {
        match self.scalar(SchemaType::Boolean)? {
            AvroValue::Boolean(v) => Ok(v),
            other => Err(unexpected(SchemaType::Boolean, &other)),
        }
    }

    fn read_int(&mut self) -> Result<i32, DecodeError> {
        match self.scalar(SchemaType::Int)? {
            AvroValue::Int(v) => Ok(v),
            other => Err(unexpected(SchemaType::Int, &other)),
        }
    }

    fn read_long(&mut self) -> Result<i64, DecodeError> {
        match self.scalar(SchemaType::Long)? {
            AvroValue::Long(v) => Ok(v),
            other => Err(unexpected(SchemaType::Long, &other)),
        }
    }

    fn read_float(&mut self) -> Result<f32, DecodeError> {
        match self.scalar(SchemaType::Float)? {
            AvroValue::Float(v) => Ok(v),
            other => Err(unexpected(SchemaType::Float, &other)),
        }
    }

    fn read_double(&mut self) -> Result<f64, DecodeError> {
        match self.scalar(SchemaType::Double)? {
            AvroValue::Double(v) => Ok(v),
            other => Err(unexpected(SchemaType::Double, &other)),
        }
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        match self.scalar(SchemaType::Bytes)? {
            AvroValue::Bytes(v) => Ok(v),
            other => Err(unexpected(SchemaType::Bytes, &other)),
        }
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        match self.scalar(SchemaType::String)? {
            AvroValue::String(v) => Ok(v),
            other => Err(unexpected(SchemaType::String, &other)),
        }
    }

    fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>, DecodeError> {
        let symbol = self.expect("fixed", |s| matches!(s, Symbol::Fixed(n) if *n == size))?;
        let Symbol::Fixed(size) = symbol else {
            return Err(crate::grammar::mismatch("fixed", &symbol).into());
        };
        let value = self.read(|data| decode_fixed_ref(data, size).map(<[u8]>::to_vec))?;
        self.drain();
        Ok(value)
    }

    fn read_enum(&mut self) -> Result<usize, DecodeError> {
        let symbol = self.expect("enum", |s| matches!(s, Symbol::Enum(_)))?;
        let Symbol::Enum(adjust) = symbol else {
            return Err(crate::grammar::mismatch("enum", &symbol).into());
        };
        let index = self.read(decode_int)?;
        let index = usize::try_from(index)
            .map_err(|_| DecodeError::InvalidData(format!("Negative enum index {}", index)))?;
        let reader_index = adjust.reader_index(index)?;
        self.drain();
        Ok(reader_index)
    }

    fn read_record_start(&mut self) -> Result<(), DecodeError> {
        let symbol = self.expect("record", |s| matches!(s, Symbol::RecordStart(_)))?;
        if let Symbol::RecordStart(layout) = symbol {
            self.frames.push(Frame {
                layout,
                next_writer: 0,
                captured: HashMap::new(),
            });
        }
        Ok(())
    }

    fn read_record_end(&mut self) -> Result<(), DecodeError> {
        self.expect("record end", |s| matches!(s, Symbol::RecordEnd))?;
        let frame = self.frames.pop().ok_or_else(|| {
            GrammarError::InvalidState("record end outside of a record".to_string())
        })?;
        let writer = &frame.layout.writer;
        let fields = writer.fields();
        for field in &fields[frame.next_writer.min(fields.len())..] {
            let schema = writer.field_schema(field);
            self.read(|data| skip_value(data, &schema))?;
        }
        self.drain();
        Ok(())
    }

    fn read_array_start(&mut self) -> Result<u64, DecodeError> {
        self.expect("array", |s| matches!(s, Symbol::ArrayStart))?;
        self.block(Symbol::ArrayEnd)
    }

    fn array_next(&mut self) -> Result<u64, DecodeError> {
        self.block(Symbol::ArrayEnd)
    }

    fn read_map_start(&mut self) -> Result<u64, DecodeError> {
        self.expect("map", |s| matches!(s, Symbol::MapStart))?;
        self.block(Symbol::MapEnd)
    }

    fn read_map_key(&mut self) -> Result<String, DecodeError> {
        self.expect("map key", |s| matches!(s, Symbol::MapKey))?;
        self.read(decode_string)
    }

    fn map_next(&mut self) -> Result<u64, DecodeError> {
        self.block(Symbol::MapEnd)
    }

    fn read_index(&mut self) -> Result<usize, DecodeError> {
        let symbol = self.expect("union", |s| matches!(s, Symbol::UnionAdjust(..)))?;
        let Symbol::UnionAdjust(index, production) = symbol else {
            return Err(crate::grammar::mismatch("union", &symbol).into());
        };
        self.parser.push((*production).clone());
        Ok(index)
    }
}
