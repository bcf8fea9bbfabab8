use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use tracing::{debug, trace};

use crate::codec::{Decoder, DirectDecimalDecoder, JsonCodecOptions};
use crate::error::{ConversionError, DecodeError, GrammarError};
use crate::grammar::{mismatch, FieldInfo, Grammar, Parser, RecordLayout, Symbol, UnionInfo};
use crate::logical::DecimalType;
use crate::schema::{latin1_bytes, parse_double, Schema, SchemaType};
use crate::value::AvroValue;

use super::tokens::{tokenize, value_len, JsonToken};

#[derive(Debug)]
struct TokenSource {
    tokens: Arc<[JsonToken]>,
    pos: usize,
}

#[derive(Debug)]
struct Frame {
    layout: Arc<RecordLayout>,
    /// Values of keys met before the reader asked for them.
    captured: Vec<(String, Arc<[JsonToken]>)>,
}

/// Extended JSON decoder over a sequence of JSON documents.
#[derive(Debug)]
pub struct JsonDecoder {
    sources: Vec<TokenSource>,
    parser: Parser,
    frames: Vec<Frame>,
    field_sources: Vec<bool>,
    options: JsonCodecOptions,
}

impl JsonDecoder {
    pub fn new(text: &str, schema: &Schema) -> Result<Self, DecodeError> {
        Self::with_grammar(text, Grammar::for_writing(schema), JsonCodecOptions::default())
    }

    pub fn resolving(text: &str, writer: &Schema, reader: &Schema) -> Result<Self, DecodeError> {
        Self::with_grammar(
            text,
            Grammar::resolving(writer, reader),
            JsonCodecOptions::default(),
        )
    }

    pub fn with_grammar(
        text: &str,
        grammar: Arc<Grammar>,
        options: JsonCodecOptions,
    ) -> Result<Self, DecodeError> {
        let tokens = tokenize(text)?;
        Ok(Self {
            sources: vec![TokenSource {
                tokens: Arc::from(tokens),
                pos: 0,
            }],
            parser: Parser::new(grammar),
            frames: Vec::new(),
            field_sources: Vec::new(),
            options,
        })
    }

    /// Whether every document of the input has been read.
    pub fn is_empty(&self) -> bool {
        self.sources
            .first()
            .map_or(true, |s| s.pos >= s.tokens.len())
    }

    fn peek(&self) -> Result<&JsonToken, DecodeError> {
        self.sources
            .last()
            .and_then(|s| s.tokens.get(s.pos))
            .ok_or(DecodeError::UnexpectedEof)
    }

    fn bump(&mut self) {
        if let Some(source) = self.sources.last_mut() {
            source.pos += 1;
        }
    }

    fn next_token(&mut self) -> Result<JsonToken, DecodeError> {
        let token = self.peek()?.clone();
        self.bump();
        Ok(token)
    }

    fn expect_token(&mut self, expected: &str, accept: impl Fn(&JsonToken) -> bool) -> Result<(), DecodeError> {
        let token = self.peek()?;
        if !accept(token) {
            return Err(DecodeError::TypeMismatch(format!(
                "expected {}, found {:?}",
                expected, token
            )));
        }
        self.bump();
        Ok(())
    }

    /// Cut the next complete value out of the stream.
    fn take_value(&mut self) -> Result<Arc<[JsonToken]>, DecodeError> {
        let source = self.sources.last_mut().ok_or(DecodeError::UnexpectedEof)?;
        let rest = source.tokens.get(source.pos..).unwrap_or_default();
        let len = value_len(rest)?;
        let value = Arc::from(&rest[..len]);
        source.pos += len;
        Ok(value)
    }

    fn skip_value(&mut self) -> Result<(), DecodeError> {
        let source = self.sources.last_mut().ok_or(DecodeError::UnexpectedEof)?;
        let rest = source.tokens.get(source.pos..).unwrap_or_default();
        source.pos += value_len(rest)?;
        Ok(())
    }

    fn push_source(&mut self, tokens: Arc<[JsonToken]>) {
        self.sources.push(TokenSource { tokens, pos: 0 });
        self.field_sources.push(true);
    }

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
                Symbol::UnionEnd => {
                    self.parser.consume();
                    self.expect_token("end of union", |t| *t == JsonToken::EndObject)?;
                }
                Symbol::WriterUnion(info) => {
                    self.parser.consume();
                    self.enter_union(&info)?;
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
            return Err(mismatch(expected, &symbol).into());
        }
        self.parser.consume();
        Ok(symbol)
    }

    fn drain(&mut self) -> Result<(), DecodeError> {
        loop {
            match self.parser.peek_raw() {
                Some(Symbol::FieldEnd) => {
                    self.parser.pop();
                    self.leave_field();
                }
                Some(Symbol::UnionEnd) => {
                    self.parser.pop();
                    self.expect_token("end of union", |t| *t == JsonToken::EndObject)?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn record_name(&self) -> String {
        self.frames
            .last()
            .map(|f| f.layout.name.clone())
            .unwrap_or_default()
    }

    fn inject_default(&mut self, info: &FieldInfo) -> Result<(), DecodeError> {
        let default = info.default.as_ref().ok_or_else(|| DecodeError::MissingField {
            record: self.record_name(),
            field: info.name.clone(),
        })?;
        trace!(field = %info.name, "Reading field default");
        let tokens = default.tokens()?;
        self.push_source(tokens);
        Ok(())
    }

    /// Position on the value of a reader field: a value met earlier, the
    /// key further on in the object, or the default.
    fn enter_field(&mut self, info: &FieldInfo) -> Result<(), DecodeError> {
        if info.writer_position.is_none() {
            return self.inject_default(info);
        }
        let frame = self.frames.last_mut().ok_or_else(|| {
            GrammarError::InvalidState("field outside of a record".to_string())
        })?;
        if let Some(i) = frame.captured.iter().position(|(k, _)| info.answers_to(k)) {
            let (_, tokens) = frame.captured.remove(i);
            self.push_source(tokens);
            return Ok(());
        }
        loop {
            match self.peek()? {
                JsonToken::FieldName(key) if info.answers_to(key) => {
                    self.bump();
                    self.field_sources.push(false);
                    return Ok(());
                }
                JsonToken::FieldName(key) => {
                    let key = key.clone();
                    self.bump();
                    let value = self.take_value()?;
                    trace!(key = %key, wanted = %info.name, "Buffered field read out of order");
                    if let Some(frame) = self.frames.last_mut() {
                        frame.captured.push((key, value));
                    }
                }
                JsonToken::EndObject => return self.inject_default(info),
                other => {
                    return Err(DecodeError::TypeMismatch(format!(
                        "expected a field name, found {:?}",
                        other
                    )))
                }
            }
        }
    }

    fn leave_field(&mut self) {
        if self.field_sources.pop() == Some(true) {
            self.sources.pop();
        }
    }

    fn enter_union(&mut self, info: &UnionInfo) -> Result<(), DecodeError> {
        let (is_null, is_object) = match self.peek()? {
            JsonToken::Null => (true, false),
            JsonToken::StartObject => (false, true),
            _ => (false, false),
        };
        if let (true, Some(null)) = (is_null, info.null_index) {
            self.parser.push(info.branch(null)?);
            return Ok(());
        }
        if let Some(compact) = info.compact {
            self.parser.push(info.branch(compact)?);
            return Ok(());
        }
        if !is_object {
            return Err(DecodeError::TypeMismatch(format!(
                "expected a union object, found {:?}",
                self.peek()?
            )));
        }
        self.bump();
        let label = match self.next_token()? {
            JsonToken::FieldName(label) => label,
            other => {
                return Err(DecodeError::TypeMismatch(format!(
                    "expected a union branch name, found {:?}",
                    other
                )))
            }
        };
        let index = info.branch_for(&label)?;
        self.parser.push(Symbol::UnionEnd);
        self.parser.push(info.branch(index)?);
        Ok(())
    }

    fn read_physical(&mut self, ty: SchemaType) -> Result<AvroValue, DecodeError> {
        let token = self.next_token()?;
        let value = match (ty, token) {
            (SchemaType::Null, JsonToken::Null) => AvroValue::Null,
            (SchemaType::Boolean, JsonToken::Bool(b)) => AvroValue::Boolean(b),
            (SchemaType::Int, JsonToken::Number(n)) => {
                let v = n
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| DecodeError::InvalidData(format!("{} is not an int", n)))?;
                AvroValue::Int(v)
            }
            (SchemaType::Long, JsonToken::Number(n)) => AvroValue::Long(
                n.as_i64()
                    .ok_or_else(|| DecodeError::InvalidData(format!("{} is not a long", n)))?,
            ),
            (SchemaType::Float, JsonToken::Number(n)) => AvroValue::Float(number_f64(&n)? as f32),
            (SchemaType::Double, JsonToken::Number(n)) => AvroValue::Double(number_f64(&n)?),
            (SchemaType::Float, JsonToken::String(s)) => AvroValue::Float(text_f64(&s)? as f32),
            (SchemaType::Double, JsonToken::String(s)) => AvroValue::Double(text_f64(&s)?),
            (SchemaType::Bytes, JsonToken::String(s)) => AvroValue::Bytes(latin1_bytes(&s)?),
            (SchemaType::String, JsonToken::String(s)) => AvroValue::String(s),
            (ty, other) => {
                return Err(DecodeError::TypeMismatch(format!(
                    "expected {}, found {:?}",
                    ty, other
                )))
            }
        };
        Ok(value)
    }

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
            other => return Err(mismatch(ty.as_str(), other).into()),
        };
        self.drain()?;
        Ok(value)
    }

    /// 1 if another item follows, otherwise 0 after closing the container.
    fn items(&mut self, close: JsonToken, end: &'static str) -> Result<u64, DecodeError> {
        if *self.peek()? != close {
            return Ok(1);
        }
        self.bump();
        self.parser.end_repeat()?;
        self.expect(end, |s| s.describe() == end)?;
        self.drain()?;
        Ok(0)
    }
}

fn number_f64(n: &serde_json::Number) -> Result<f64, DecodeError> {
    n.as_f64()
        .ok_or_else(|| DecodeError::InvalidData(format!("{} is not a floating point number", n)))
}

fn text_f64(text: &str) -> Result<f64, DecodeError> {
    parse_double(text)
        .ok_or_else(|| DecodeError::InvalidData(format!("'{}' is not a floating point number", text)))
}

fn unexpected(ty: SchemaType, value: &AvroValue) -> DecodeError {
    DecodeError::TypeMismatch(format!("expected {}, found {}", ty, value.type_name()))
}

impl Decoder for JsonDecoder {
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
        self.expect("fixed", |s| matches!(s, Symbol::Fixed(n) if *n == size))?;
        let bytes = match self.next_token()? {
            JsonToken::String(s) => latin1_bytes(&s)?,
            other => {
                return Err(DecodeError::TypeMismatch(format!(
                    "expected fixed, found {:?}",
                    other
                )))
            }
        };
        if bytes.len() != size {
            return Err(DecodeError::InvalidData(format!(
                "Fixed value has {} bytes, schema requires {}",
                bytes.len(),
                size
            )));
        }
        self.drain()?;
        Ok(bytes)
    }

    fn read_enum(&mut self) -> Result<usize, DecodeError> {
        let symbol = self.expect("enum", |s| matches!(s, Symbol::Enum(_)))?;
        let Symbol::Enum(adjust) = symbol else {
            return Err(mismatch("enum", &symbol).into());
        };
        let index = match self.next_token()? {
            JsonToken::String(name) => adjust.reader_index(adjust.writer_index(&name)?)?,
            other => {
                return Err(DecodeError::TypeMismatch(format!(
                    "expected enum symbol, found {:?}",
                    other
                )))
            }
        };
        self.drain()?;
        Ok(index)
    }

    fn read_record_start(&mut self) -> Result<(), DecodeError> {
        let symbol = self.expect("record", |s| matches!(s, Symbol::RecordStart(_)))?;
        let Symbol::RecordStart(layout) = symbol else {
            return Err(mismatch("record", &symbol).into());
        };
        self.expect_token("object", |t| *t == JsonToken::StartObject)?;
        self.frames.push(Frame {
            layout,
            captured: Vec::new(),
        });
        Ok(())
    }

    fn read_record_end(&mut self) -> Result<(), DecodeError> {
        self.expect("record end", |s| matches!(s, Symbol::RecordEnd))?;
        let frame = self.frames.pop().ok_or_else(|| {
            GrammarError::InvalidState("record end outside of a record".to_string())
        })?;
        let mut leftover: Vec<String> = frame.captured.into_iter().map(|(k, _)| k).collect();
        loop {
            match self.next_token()? {
                JsonToken::FieldName(key) => {
                    self.skip_value()?;
                    leftover.push(key);
                }
                JsonToken::EndObject => break,
                other => {
                    return Err(DecodeError::TypeMismatch(format!(
                        "expected a field name, found {:?}",
                        other
                    )))
                }
            }
        }
        let (unknown, known): (Vec<String>, Vec<String>) = leftover
            .into_iter()
            .partition(|key| !frame.layout.known_keys.contains(key));
        if !known.is_empty() {
            trace!(record = %frame.layout.name, fields = ?known, "Skipped fields the reader does not use");
        }
        if !unknown.is_empty() {
            if self.options.strict_unknown_fields {
                return Err(DecodeError::UnknownFields {
                    record: frame.layout.name.clone(),
                    fields: unknown,
                });
            }
            debug!(record = %frame.layout.name, fields = ?unknown, "Skipped unknown fields");
        }
        self.drain()
    }

    fn read_array_start(&mut self) -> Result<u64, DecodeError> {
        self.expect("array", |s| matches!(s, Symbol::ArrayStart))?;
        self.expect_token("array", |t| *t == JsonToken::StartArray)?;
        self.items(JsonToken::EndArray, "array end")
    }

    fn array_next(&mut self) -> Result<u64, DecodeError> {
        self.items(JsonToken::EndArray, "array end")
    }

    fn read_map_start(&mut self) -> Result<u64, DecodeError> {
        self.expect("map", |s| matches!(s, Symbol::MapStart))?;
        self.expect_token("object", |t| *t == JsonToken::StartObject)?;
        self.items(JsonToken::EndObject, "map end")
    }

    fn read_map_key(&mut self) -> Result<String, DecodeError> {
        self.expect("map key", |s| matches!(s, Symbol::MapKey))?;
        match self.next_token()? {
            JsonToken::FieldName(key) => Ok(key),
            other => Err(DecodeError::TypeMismatch(format!(
                "expected a map key, found {:?}",
                other
            ))),
        }
    }

    fn map_next(&mut self) -> Result<u64, DecodeError> {
        self.items(JsonToken::EndObject, "map end")
    }

    fn read_index(&mut self) -> Result<usize, DecodeError> {
        let symbol = self.expect("union", |s| matches!(s, Symbol::UnionAdjust(..)))?;
        let Symbol::UnionAdjust(index, production) = symbol else {
            return Err(mismatch("union", &symbol).into());
        };
        self.parser.push((*production).clone());
        Ok(index)
    }

    fn direct_decimal(&mut self) -> Option<&mut dyn DirectDecimalDecoder> {
        if self.options.direct_decimals {
            Some(self)
        } else {
            None
        }
    }
}

impl DirectDecimalDecoder for JsonDecoder {
    fn read_decimal(&mut self, logical: &DecimalType) -> Result<Option<BigDecimal>, DecodeError> {
        let symbol = self.advance()?;
        if !matches!(symbol, Symbol::Bytes | Symbol::String | Symbol::Fixed(_)) {
            return Ok(None);
        }
        let text = match self.peek()? {
            JsonToken::Number(n) => n.to_string(),
            _ => return Ok(None),
        };
        self.bump();
        self.parser.consume();
        let value = BigDecimal::from_str(&text)
            .map_err(|e| ConversionError::invalid("decimal", e.to_string()))?;
        let value = logical.finish(value)?;
        self.drain()?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    fn schema(json: &str) -> Schema {
        parse_schema(json).unwrap()
    }

    const PERSON: &str = r#"{"type":"record","name":"Person","fields":[
        {"name":"name","type":"string"},
        {"name":"age","type":"int","default":0},
        {"name":"email","type":["null","string"],"default":null}]}"#;

    #[test]
    fn test_out_of_order_fields_and_defaults() {
        let s = schema(PERSON);
        let mut decoder = JsonDecoder::new(r#"{"email":"a@b","name":"Ann"}"#, &s).unwrap();
        decoder.read_record_start().unwrap();
        assert_eq!(decoder.read_string().unwrap(), "Ann");
        assert_eq!(decoder.read_int().unwrap(), 0);
        assert_eq!(decoder.read_index().unwrap(), 1);
        assert_eq!(decoder.read_string().unwrap(), "a@b");
        decoder.read_record_end().unwrap();
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_unknown_fields_skipped_or_rejected() {
        let s = schema(PERSON);
        let text = r#"{"name":"Ann","extra":{"deep":[1,2]},"age":3}"#;
        let mut decoder = JsonDecoder::new(text, &s).unwrap();
        decoder.read_record_start().unwrap();
        decoder.read_string().unwrap();
        assert_eq!(decoder.read_int().unwrap(), 3);
        decoder.read_index().unwrap();
        decoder.read_null().unwrap();
        decoder.read_record_end().unwrap();

        let strict = JsonCodecOptions::default().with_strict_unknown_fields(true);
        let mut decoder = JsonDecoder::with_grammar(text, Grammar::for_writing(&s), strict).unwrap();
        decoder.read_record_start().unwrap();
        decoder.read_string().unwrap();
        decoder.read_int().unwrap();
        decoder.read_index().unwrap();
        decoder.read_null().unwrap();
        assert!(matches!(
            decoder.read_record_end(),
            Err(DecodeError::UnknownFields { fields, .. }) if fields == vec!["extra".to_string()]
        ));
    }

    #[test]
    fn test_missing_required_field() {
        let s = schema(PERSON);
        let mut decoder = JsonDecoder::new(r#"{"age":1}"#, &s).unwrap();
        decoder.read_record_start().unwrap();
        assert!(matches!(
            decoder.read_string(),
            Err(DecodeError::MissingField { field, .. }) if field == "name"
        ));
    }

    #[test]
    fn test_wrapped_union_and_unknown_branch() {
        let s = schema(r#"["null","int","string"]"#);
        let mut decoder = JsonDecoder::new(r#"{"string":"x"} null {"bool":true}"#, &s).unwrap();
        assert_eq!(decoder.read_index().unwrap(), 2);
        assert_eq!(decoder.read_string().unwrap(), "x");
        assert_eq!(decoder.read_index().unwrap(), 0);
        decoder.read_null().unwrap();
        assert!(matches!(
            decoder.read_index(),
            Err(DecodeError::UnknownUnionBranch { .. })
        ));
    }

    #[test]
    fn test_map_and_non_finite_double() {
        let s = schema(r#"{"type":"map","values":"double"}"#);
        let mut decoder = JsonDecoder::new(r#"{"a":1.5,"b":"-Infinity"}"#, &s).unwrap();
        assert_eq!(decoder.read_map_start().unwrap(), 1);
        assert_eq!(decoder.read_map_key().unwrap(), "a");
        assert_eq!(decoder.read_double().unwrap(), 1.5);
        assert_eq!(decoder.map_next().unwrap(), 1);
        assert_eq!(decoder.read_map_key().unwrap(), "b");
        assert_eq!(decoder.read_double().unwrap(), f64::NEG_INFINITY);
        assert_eq!(decoder.map_next().unwrap(), 0);
        assert!(decoder.is_empty());
    }
}
