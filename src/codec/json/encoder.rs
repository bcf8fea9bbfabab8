use std::sync::Arc;

use bigdecimal::BigDecimal;

use crate::codec::{DirectDecimalEncoder, Encoder, JsonCodecOptions};
use crate::error::{EncodeError, GrammarError};
use crate::grammar::{mismatch, Grammar, Parser, Symbol};
use crate::logical::{to_plain_string, DecimalType};
use crate::schema::{latin1_string, Schema, SchemaType};

use super::tokens::non_finite;

/// Text output with comma placement.
#[derive(Debug, Default)]
struct JsonWriter {
    out: String,
    /// Per open container, whether nothing has been written in it yet.
    scopes: Vec<bool>,
    after_key: bool,
}

impl JsonWriter {
    fn separate(&mut self) {
        if self.after_key {
            self.after_key = false;
            return;
        }
        match self.scopes.last_mut() {
            Some(first) if *first => *first = false,
            Some(_) => self.out.push(','),
            None if !self.out.is_empty() => self.out.push('\n'),
            None => {}
        }
    }

    fn raw(&mut self, text: &str) {
        self.separate();
        self.out.push_str(text);
    }

    fn string(&mut self, text: &str) -> Result<(), EncodeError> {
        self.separate();
        self.out.push_str(&serde_json::to_string(text)?);
        Ok(())
    }

    fn key(&mut self, key: &str) -> Result<(), EncodeError> {
        self.string(key)?;
        self.out.push(':');
        self.after_key = true;
        Ok(())
    }

    fn open(&mut self, bracket: char) {
        self.separate();
        self.out.push(bracket);
        self.scopes.push(true);
    }

    fn close(&mut self, bracket: char) {
        self.scopes.pop();
        self.out.push(bracket);
    }
}

/// Extended JSON encoder. Successive values are separated by newlines.
#[derive(Debug)]
pub struct JsonEncoder {
    writer: JsonWriter,
    parser: Parser,
    options: JsonCodecOptions,
}

impl JsonEncoder {
    pub fn new(schema: &Schema) -> Self {
        Self::with_options(schema, JsonCodecOptions::default())
    }

    pub fn with_options(schema: &Schema, options: JsonCodecOptions) -> Self {
        Self::with_grammar(Grammar::for_writing(schema), options)
    }

    pub fn with_grammar(grammar: Arc<Grammar>, options: JsonCodecOptions) -> Self {
        Self {
            writer: JsonWriter::default(),
            parser: Parser::new(grammar),
            options,
        }
    }

    pub fn options(&self) -> JsonCodecOptions {
        self.options
    }

    pub fn as_str(&self) -> &str {
        &self.writer.out
    }

    pub fn into_string(self) -> String {
        self.writer.out
    }

    fn advance(&mut self) -> Result<Symbol, EncodeError> {
        loop {
            let symbol = self.parser.next()?;
            match symbol {
                Symbol::Field(info) => {
                    self.parser.consume();
                    self.writer.key(&info.name)?;
                }
                Symbol::FieldEnd => self.parser.consume(),
                Symbol::UnionEnd => {
                    self.parser.consume();
                    self.writer.close('}');
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
    ) -> Result<Symbol, EncodeError> {
        let symbol = self.advance()?;
        if !accept(&symbol) {
            return Err(mismatch(expected, &symbol).into());
        }
        self.parser.consume();
        Ok(symbol)
    }

    fn drain(&mut self) {
        loop {
            match self.parser.peek_raw() {
                Some(Symbol::FieldEnd) => {
                    self.parser.pop();
                }
                Some(Symbol::UnionEnd) => {
                    self.parser.pop();
                    self.writer.close('}');
                }
                _ => return,
            }
        }
    }

    fn scalar(&mut self, ty: SchemaType) -> Result<(), EncodeError> {
        self.expect(ty.as_str(), |s| s.primitive_type() == Some(ty))?;
        Ok(())
    }

    fn float(&mut self, value: f64, text: String) {
        if value.is_finite() {
            self.writer.raw(&text);
        } else {
            self.writer.raw(&format!("\"{}\"", non_finite(value)));
        }
    }
}

impl Encoder for JsonEncoder {
    fn write_null(&mut self) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Null)?;
        self.writer.raw("null");
        self.drain();
        Ok(())
    }

    fn write_boolean(&mut self, value: bool) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Boolean)?;
        self.writer.raw(if value { "true" } else { "false" });
        self.drain();
        Ok(())
    }

    fn write_int(&mut self, value: i32) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Int)?;
        self.writer.raw(&value.to_string());
        self.drain();
        Ok(())
    }

    fn write_long(&mut self, value: i64) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Long)?;
        self.writer.raw(&value.to_string());
        self.drain();
        Ok(())
    }

    fn write_float(&mut self, value: f32) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Float)?;
        self.float(f64::from(value), value.to_string());
        self.drain();
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Double)?;
        self.float(value, value.to_string());
        self.drain();
        Ok(())
    }

    fn write_bytes(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        self.scalar(SchemaType::Bytes)?;
        self.writer.string(&latin1_string(value))?;
        self.drain();
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<(), EncodeError> {
        self.scalar(SchemaType::String)?;
        self.writer.string(value)?;
        self.drain();
        Ok(())
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
        self.writer.string(&latin1_string(value))?;
        self.drain();
        Ok(())
    }

    fn write_enum(&mut self, index: usize) -> Result<(), EncodeError> {
        let symbol = self.expect("enum", |s| matches!(s, Symbol::Enum(_)))?;
        let Symbol::Enum(adjust) = symbol else {
            return Err(mismatch("enum", &symbol).into());
        };
        let name = adjust
            .writer_symbols
            .get(index)
            .ok_or(GrammarError::IndexOutOfRange {
                what: "enum",
                index,
                len: adjust.writer_symbols.len(),
            })?;
        self.writer.string(name)?;
        self.drain();
        Ok(())
    }

    fn write_record_start(&mut self) -> Result<(), EncodeError> {
        self.expect("record", |s| matches!(s, Symbol::RecordStart(_)))?;
        self.writer.open('{');
        Ok(())
    }

    fn write_record_end(&mut self) -> Result<(), EncodeError> {
        self.expect("record end", |s| matches!(s, Symbol::RecordEnd))?;
        self.writer.close('}');
        self.drain();
        Ok(())
    }

    fn write_array_start(&mut self) -> Result<(), EncodeError> {
        self.expect("array", |s| matches!(s, Symbol::ArrayStart))?;
        self.writer.open('[');
        Ok(())
    }

    fn write_array_end(&mut self) -> Result<(), EncodeError> {
        self.parser.end_repeat()?;
        self.expect("array end", |s| matches!(s, Symbol::ArrayEnd))?;
        self.writer.close(']');
        self.drain();
        Ok(())
    }

    fn write_map_start(&mut self) -> Result<(), EncodeError> {
        self.expect("map", |s| matches!(s, Symbol::MapStart))?;
        self.writer.open('{');
        Ok(())
    }

    fn write_map_key(&mut self, key: &str) -> Result<(), EncodeError> {
        self.expect("map key", |s| matches!(s, Symbol::MapKey))?;
        self.writer.key(key)
    }

    fn write_map_end(&mut self) -> Result<(), EncodeError> {
        self.parser.end_repeat()?;
        self.expect("map end", |s| matches!(s, Symbol::MapEnd))?;
        self.writer.close('}');
        self.drain();
        Ok(())
    }

    fn set_item_count(&mut self, _count: usize) -> Result<(), EncodeError> {
        Ok(())
    }

    fn write_index(&mut self, index: usize) -> Result<(), EncodeError> {
        let symbol = self.expect("union", |s| matches!(s, Symbol::WriterUnion(_)))?;
        let Symbol::WriterUnion(info) = symbol else {
            return Err(mismatch("union", &symbol).into());
        };
        let branch = info.production(index)?;
        if !info.is_bare(index) {
            let label = info.label(index).unwrap_or_default();
            self.writer.open('{');
            self.writer.key(label)?;
            self.parser.push(Symbol::UnionEnd);
        }
        self.parser.push(branch);
        Ok(())
    }

    fn supports_elision(&self) -> bool {
        self.options.elide_defaults
    }

    fn skip_field(&mut self) -> Result<(), EncodeError> {
        let symbol = self.parser.next()?;
        if !matches!(symbol, Symbol::Field(_)) {
            return Err(mismatch("field", &symbol).into());
        }
        self.parser.consume();
        // the value production, then its field end
        self.parser.pop();
        match self.parser.pop() {
            Some(Symbol::FieldEnd) => Ok(()),
            Some(other) => Err(mismatch("field end", &other).into()),
            None => Err(GrammarError::InvalidState("field without an end".to_string()).into()),
        }
    }

    fn direct_decimal(&mut self) -> Option<&mut dyn DirectDecimalEncoder> {
        if self.options.direct_decimals {
            Some(self)
        } else {
            None
        }
    }
}

impl DirectDecimalEncoder for JsonEncoder {
    fn write_decimal(&mut self, logical: &DecimalType, value: &BigDecimal) -> Result<(), EncodeError> {
        let symbol = self.advance()?;
        if !matches!(symbol, Symbol::Bytes | Symbol::String | Symbol::Fixed(_)) {
            return Err(mismatch("decimal", &symbol).into());
        }
        let prepared = logical.prepare(value)?;
        self.parser.consume();
        let (unscaled, scale) = prepared.as_bigint_and_exponent();
        self.writer.raw(&to_plain_string(&unscaled, scale));
        self.drain();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    #[test]
    fn test_record_with_unions() {
        let schema = parse_schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"opt","type":["null","string"]},
                {"name":"choice","type":["null","int","string"]},
                {"name":"tags","type":{"type":"array","items":"string"}}]}"#,
        )
        .unwrap();
        let mut encoder = JsonEncoder::new(&schema);
        encoder.write_record_start().unwrap();
        encoder.write_index(1).unwrap();
        encoder.write_string("x").unwrap();
        encoder.write_index(1).unwrap();
        encoder.write_int(3).unwrap();
        encoder.write_array_start().unwrap();
        encoder.set_item_count(2).unwrap();
        encoder.write_string("a").unwrap();
        encoder.write_string("b\"").unwrap();
        encoder.write_array_end().unwrap();
        encoder.write_record_end().unwrap();
        assert_eq!(
            encoder.as_str(),
            r#"{"opt":"x","choice":{"int":3},"tags":["a","b\""]}"#
        );
    }

    #[test]
    fn test_skip_field() {
        let schema = parse_schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"a","type":"int","default":1},{"name":"b","type":"int"}]}"#,
        )
        .unwrap();
        let mut encoder = JsonEncoder::new(&schema);
        assert!(encoder.supports_elision());
        encoder.write_record_start().unwrap();
        encoder.skip_field().unwrap();
        encoder.write_int(2).unwrap();
        encoder.write_record_end().unwrap();
        assert_eq!(encoder.as_str(), r#"{"b":2}"#);
    }

    #[test]
    fn test_values_are_newline_separated_and_non_finite_quoted() {
        let schema = parse_schema(r#""double""#).unwrap();
        let mut encoder = JsonEncoder::new(&schema);
        encoder.write_double(1.5).unwrap();
        encoder.write_double(f64::NAN).unwrap();
        assert_eq!(encoder.into_string(), "1.5\n\"NaN\"");
    }

    #[test]
    fn test_direct_decimal() {
        let schema =
            parse_schema(r#"{"type":"bytes","logicalType":"decimal","precision":6,"scale":2}"#)
                .unwrap();
        let logical = schema.logical_type().and_then(|t| t.as_decimal()).cloned().unwrap();
        let mut encoder = JsonEncoder::new(&schema);
        let value: BigDecimal = "12.3".parse().unwrap();
        encoder
            .direct_decimal()
            .unwrap()
            .write_decimal(&logical, &value)
            .unwrap();
        assert!(encoder.as_str().starts_with("12.3"));
    }
}
