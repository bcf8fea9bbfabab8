//! Production symbols.
//!
//! A grammar is a set of symbols of three sorts:
//! - terminals, one per primitive read or write the codec performs
//! - non-terminals, which expand in place into other symbols
//! - actions, which the codec handles while advancing to the next terminal
//!   (positioning on a record field, closing a union wrapper, raising a
//!   deferred resolution error)
//!
//! Symbols are cheap to clone: every payload sits behind an [`Arc`].

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::warn;

use crate::binary::encode::encode_value;
use crate::codec::json::tokens::{value_tokens, JsonToken};
use crate::error::{DecodeError, EncodeError, GrammarError};
use crate::schema::{json_to_avro_value, Schema, SchemaType, TypePromotion};
use crate::value::AvroValue;

/// Index into [`Grammar::rules`](super::Grammar).
pub type RuleId = usize;

#[derive(Clone)]
pub enum Symbol {
    // terminals
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Fixed(usize),
    Enum(Arc<EnumAdjust>),
    ArrayStart,
    ArrayEnd,
    MapStart,
    MapEnd,
    MapKey,
    RecordStart(Arc<RecordLayout>),
    RecordEnd,
    /// Writer value read as a wider reader type.
    Promote(TypePromotion),
    /// Reader union branch selection: the branch index and its production.
    UnionAdjust(usize, Arc<Symbol>),
    /// A union on the wire. Encoders treat it as a terminal (the branch
    /// index is written); decoders handle it as an action that reads the
    /// index and pushes the branch production.
    WriterUnion(Arc<UnionInfo>),

    // non-terminals
    Seq(Arc<[Symbol]>),
    Rule(RuleId),
    /// Array items and map entries: the body is pushed once per item.
    Repeater(Arc<Symbol>),

    // actions
    Field(Arc<FieldInfo>),
    FieldEnd,
    UnionEnd,
    /// Writer and reader cannot be reconciled here. Raised only if data
    /// reaches it.
    Error(Arc<str>),
}

impl Symbol {
    pub fn error(message: impl Into<String>) -> Symbol {
        Symbol::Error(Arc::from(message.into()))
    }

    pub fn seq(items: Vec<Symbol>) -> Symbol {
        Symbol::Seq(Arc::from(items))
    }

    pub fn is_action(&self) -> bool {
        matches!(
            self,
            Symbol::Field(_) | Symbol::FieldEnd | Symbol::UnionEnd | Symbol::Error(_)
        )
    }

    /// The primitive type a scalar terminal stands for.
    pub fn primitive_type(&self) -> Option<SchemaType> {
        Some(match self {
            Symbol::Null => SchemaType::Null,
            Symbol::Boolean => SchemaType::Boolean,
            Symbol::Int => SchemaType::Int,
            Symbol::Long => SchemaType::Long,
            Symbol::Float => SchemaType::Float,
            Symbol::Double => SchemaType::Double,
            Symbol::Bytes => SchemaType::Bytes,
            Symbol::String => SchemaType::String,
            _ => return None,
        })
    }

    /// Name used in mismatch errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Symbol::Null => "null",
            Symbol::Boolean => "boolean",
            Symbol::Int => "int",
            Symbol::Long => "long",
            Symbol::Float => "float",
            Symbol::Double => "double",
            Symbol::Bytes => "bytes",
            Symbol::String => "string",
            Symbol::Fixed(_) => "fixed",
            Symbol::Enum(_) => "enum",
            Symbol::ArrayStart => "array start",
            Symbol::ArrayEnd => "array end",
            Symbol::MapStart => "map start",
            Symbol::MapEnd => "map end",
            Symbol::MapKey => "map key",
            Symbol::RecordStart(_) => "record start",
            Symbol::RecordEnd => "record end",
            Symbol::Promote(_) => "promoted value",
            Symbol::UnionAdjust(..) => "union branch",
            Symbol::WriterUnion(_) => "union index",
            Symbol::Seq(_) => "sequence",
            Symbol::Rule(_) => "rule",
            Symbol::Repeater(_) => "repeated items",
            Symbol::Field(_) => "field",
            Symbol::FieldEnd => "field end",
            Symbol::UnionEnd => "union end",
            Symbol::Error(_) => "error",
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Fixed(size) => write!(f, "Fixed({})", size),
            Symbol::RecordStart(layout) => write!(f, "RecordStart({})", layout.name),
            Symbol::Field(info) => write!(f, "Field({})", info.name),
            Symbol::Promote(p) => write!(f, "Promote({:?})", p),
            Symbol::UnionAdjust(index, sym) => write!(f, "UnionAdjust({}, {:?})", index, sym),
            Symbol::Seq(items) => f.debug_list().entries(items.iter()).finish(),
            Symbol::Rule(id) => write!(f, "Rule({})", id),
            Symbol::Repeater(body) => write!(f, "Repeater({:?})", body),
            Symbol::Error(msg) => write!(f, "Error({})", msg),
            other => f.write_str(other.describe()),
        }
    }
}

/// Writer enum symbols mapped onto reader indices.
#[derive(Debug)]
pub struct EnumAdjust {
    /// The writer enum, for symbol lookup in text formats.
    pub writer: Schema,
    pub writer_symbols: Vec<String>,
    pub reader_symbols: Vec<String>,
    /// Per writer index, the reader index or the symbol the reader lacks.
    pub mapping: Vec<Result<usize, String>>,
    pub reader_name: String,
}

impl EnumAdjust {
    /// Reader index for a writer index.
    pub fn reader_index(&self, writer_index: usize) -> Result<usize, DecodeError> {
        match self.mapping.get(writer_index) {
            Some(Ok(index)) => Ok(*index),
            Some(Err(symbol)) => Err(DecodeError::UnknownEnumSymbol {
                symbol: symbol.clone(),
                enum_name: self.reader_name.clone(),
            }),
            None => Err(DecodeError::InvalidData(format!(
                "Enum index {} out of range (0..{}) for '{}'",
                writer_index,
                self.mapping.len(),
                self.reader_name
            ))),
        }
    }

    /// Writer index for a symbol found on the wire, accepting the writer's
    /// symbol synonyms.
    pub fn writer_index(&self, symbol: &str) -> Result<usize, DecodeError> {
        match self.writer.kind() {
            crate::schema::SchemaKind::Enum(e) => e.resolve_symbol(symbol),
            _ => None,
        }
        .ok_or_else(|| DecodeError::UnknownEnumSymbol {
            symbol: symbol.to_string(),
            enum_name: self.writer.full_name(),
        })
    }
}

/// What a record production needs at run time.
#[derive(Debug)]
pub struct RecordLayout {
    /// Reader full name.
    pub name: String,
    /// The writer record, for stepping over fields the reader skips or
    /// reads out of order.
    pub writer: Schema,
    /// Per writer field, whether some reader field reads it.
    pub writer_used: Vec<bool>,
    /// Every field name and alias known to either side.
    pub known_keys: HashSet<String>,
}

/// A record field about to be read or written.
#[derive(Debug)]
pub struct FieldInfo {
    /// Reader field name.
    pub name: String,
    /// Names the field may carry on the wire.
    pub keys: Vec<String>,
    /// Writer field position; `None` when only the reader has the field.
    pub writer_position: Option<usize>,
    pub default: Option<Arc<DefaultValue>>,
}

impl FieldInfo {
    pub fn answers_to(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// A union on the wire.
#[derive(Debug)]
pub struct UnionInfo {
    /// Per writer branch, the production that reads it.
    pub branches: Vec<Symbol>,
    /// Per writer branch, the label used by text formats followed by any
    /// aliases.
    pub labels: Vec<Vec<String>>,
    pub null_index: Option<usize>,
    /// For `{null, T}` unions, the index of `T`.
    pub compact: Option<usize>,
    pub name: String,
}

impl UnionInfo {
    /// Branch for a text label.
    pub fn branch_for(&self, label: &str) -> Result<usize, DecodeError> {
        self.labels
            .iter()
            .position(|names| names.iter().any(|n| n == label))
            .ok_or_else(|| DecodeError::UnknownUnionBranch {
                label: label.to_string(),
                union: self.name.clone(),
            })
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels
            .get(index)
            .and_then(|names| names.first())
            .map(String::as_str)
    }

    /// Production a decoder pushes for the writer branch found on the wire.
    pub fn branch(&self, index: usize) -> Result<Symbol, GrammarError> {
        self.branches
            .get(index)
            .cloned()
            .ok_or(GrammarError::IndexOutOfRange {
                what: "union",
                index,
                len: self.branches.len(),
            })
    }

    /// Production an encoder pushes for the branch it selected.
    pub fn production(&self, index: usize) -> Result<Symbol, GrammarError> {
        match self.branch(index)? {
            Symbol::UnionAdjust(_, inner) => Ok((*inner).clone()),
            other => Ok(other),
        }
    }

    /// Whether the branch is written without a wrapping object.
    pub fn is_bare(&self, index: usize) -> bool {
        self.null_index == Some(index) || self.compact.is_some()
    }
}

/// A field default, materialized on demand for each wire format.
pub struct DefaultValue {
    pub json: Value,
    pub schema: Schema,
    value: AvroValue,
    binary: OnceLock<Arc<[u8]>>,
    tokens: OnceLock<Arc<[JsonToken]>>,
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultValue")
            .field("json", &self.json)
            .field("schema", &self.schema.full_name())
            .finish()
    }
}

impl DefaultValue {
    /// Materialize `json` under `schema`. Defaults that do not conform are
    /// dropped with a warning; the field then behaves as if it had none.
    pub fn new(json: &Value, schema: &Schema, field: &str) -> Option<Arc<DefaultValue>> {
        match json_to_avro_value(json, schema) {
            Ok(value) => Some(Arc::new(DefaultValue {
                json: json.clone(),
                schema: schema.clone(),
                value,
                binary: OnceLock::new(),
                tokens: OnceLock::new(),
            })),
            Err(e) => {
                warn!(field, error = %e, "Ignoring unusable field default");
                None
            }
        }
    }

    /// The physical value.
    pub fn value(&self) -> &AvroValue {
        &self.value
    }

    /// Binary encoding under the default's schema.
    pub fn binary(&self) -> Result<Arc<[u8]>, EncodeError> {
        if let Some(bytes) = self.binary.get() {
            return Ok(Arc::clone(bytes));
        }
        let mut buf = Vec::new();
        encode_value(&mut buf, &self.value, &self.schema)?;
        Ok(Arc::clone(self.binary.get_or_init(|| Arc::from(buf))))
    }

    /// JSON token stream under the default's schema.
    pub fn tokens(&self) -> Result<Arc<[JsonToken]>, EncodeError> {
        if let Some(tokens) = self.tokens.get() {
            return Ok(Arc::clone(tokens));
        }
        let mut out = Vec::new();
        value_tokens(&self.value, &self.schema, &mut out)?;
        Ok(Arc::clone(self.tokens.get_or_init(|| Arc::from(out))))
    }
}
