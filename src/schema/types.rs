//! Avro schema types and representations.
//!
//! Schemas live in an arena: every node is addressed by a [`SchemaId`] and
//! composite nodes refer to their children by id. A record may therefore
//! reference itself (directly or through other named types) without any
//! reference cycle between owned values. The public handle is [`Schema`],
//! which pairs a shared arena with the id of one of its nodes.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::logical::LogicalType;

/// Custom schema properties, in declaration order.
pub type Properties = Map<String, Value>;

/// Index of a node inside a schema arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) u32);

impl SchemaId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The variant tag of a schema, without any payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Record,
    Enum,
    Array,
    Map,
    Union,
    Fixed,
}

impl SchemaType {
    /// The type name used in schema documents.
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaType::Null => "null",
            SchemaType::Boolean => "boolean",
            SchemaType::Int => "int",
            SchemaType::Long => "long",
            SchemaType::Float => "float",
            SchemaType::Double => "double",
            SchemaType::Bytes => "bytes",
            SchemaType::String => "string",
            SchemaType::Record => "record",
            SchemaType::Enum => "enum",
            SchemaType::Array => "array",
            SchemaType::Map => "map",
            SchemaType::Union => "union",
            SchemaType::Fixed => "fixed",
        }
    }

    /// Parse a primitive type name.
    pub fn primitive(name: &str) -> Option<SchemaType> {
        match name {
            "null" => Some(SchemaType::Null),
            "boolean" => Some(SchemaType::Boolean),
            "int" => Some(SchemaType::Int),
            "long" => Some(SchemaType::Long),
            "float" => Some(SchemaType::Float),
            "double" => Some(SchemaType::Double),
            "bytes" => Some(SchemaType::Bytes),
            "string" => Some(SchemaType::String),
            _ => None,
        }
    }

    /// Whether this is one of the eight primitive types.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            SchemaType::Null
                | SchemaType::Boolean
                | SchemaType::Int
                | SchemaType::Long
                | SchemaType::Float
                | SchemaType::Double
                | SchemaType::Bytes
                | SchemaType::String
        )
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A possibly namespaced name of a record, enum or fixed type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    /// The simple name.
    pub name: String,
    /// Optional namespace.
    pub namespace: Option<String>,
}

impl Name {
    /// Create a name. A dotted name carries its own namespace.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.rsplit_once('.') {
            Some((ns, simple)) => Self {
                name: simple.to_string(),
                namespace: (!ns.is_empty()).then(|| ns.to_string()),
            },
            None => Self {
                name,
                namespace: None,
            },
        }
    }

    /// Resolve a name against an enclosing namespace. An explicit namespace
    /// or a dotted name wins over `enclosing`.
    pub fn resolve(name: &str, namespace: Option<&str>, enclosing: Option<&str>) -> Self {
        if name.contains('.') {
            return Self::new(name);
        }
        let namespace = namespace
            .or(enclosing)
            .filter(|ns| !ns.is_empty())
            .map(String::from);
        Self {
            name: name.to_string(),
            namespace,
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    /// Get the fully qualified name.
    pub fn fullname(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Sort order directive of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldOrder {
    #[default]
    Ascending,
    Descending,
    Ignore,
}

impl FieldOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldOrder::Ascending => "ascending",
            FieldOrder::Descending => "descending",
            FieldOrder::Ignore => "ignore",
        }
    }

    pub fn parse(value: &str) -> Option<FieldOrder> {
        match value {
            "ascending" => Some(FieldOrder::Ascending),
            "descending" => Some(FieldOrder::Descending),
            "ignore" => Some(FieldOrder::Ignore),
            _ => None,
        }
    }
}

/// A record field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Schema of the field value, in the owning arena.
    pub schema: SchemaId,
    /// Optional documentation.
    pub doc: Option<String>,
    /// Default value in its JSON form.
    pub default: Option<Value>,
    /// Sort order.
    pub order: FieldOrder,
    /// Alternate names used during schema evolution.
    pub aliases: Vec<String>,
    /// Position within the record, assigned when fields are set.
    pub position: usize,
    /// Custom field properties.
    pub props: Properties,
}

impl Field {
    /// Create a field of the given schema.
    pub fn new(name: impl Into<String>, schema: SchemaId) -> Self {
        Self {
            name: name.into(),
            schema,
            doc: None,
            default: None,
            order: FieldOrder::Ascending,
            aliases: Vec::new(),
            position: 0,
            props: Properties::new(),
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the documentation.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Set the sort order.
    pub fn with_order(mut self, order: FieldOrder) -> Self {
        self.order = order;
        self
    }

    /// Add an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add a custom property.
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Whether `name` is this field's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }
}

/// Schema for a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    /// The name of the record.
    pub name: Name,
    /// Optional documentation.
    pub doc: Option<String>,
    /// Fully qualified aliases for this record.
    pub aliases: Vec<String>,
    /// Fields, assigned at most once.
    pub(crate) fields: Option<Vec<Field>>,
    pub(crate) lookup: HashMap<String, usize>,
}

impl RecordSchema {
    pub(crate) fn new(name: Name) -> Self {
        Self {
            name,
            doc: None,
            aliases: Vec::new(),
            fields: None,
            lookup: HashMap::new(),
        }
    }

    /// The fields in declaration order; empty until assigned.
    pub fn fields(&self) -> &[Field] {
        self.fields.as_deref().unwrap_or(&[])
    }

    /// Whether the field list has been assigned.
    pub fn has_fields(&self) -> bool {
        self.fields.is_some()
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.lookup.get(name).and_then(|&i| self.fields().get(i))
    }
}

/// Schema for an enum type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    /// The name of the enum.
    pub name: Name,
    /// Optional documentation.
    pub doc: Option<String>,
    /// Fully qualified aliases for this enum.
    pub aliases: Vec<String>,
    /// Ordered, duplicate-free symbols.
    pub symbols: Vec<String>,
    /// Symbol used when a writer symbol is unknown to the reader.
    pub default: Option<String>,
    /// Synonyms accepted on the wire for each symbol.
    pub symbol_aliases: Vec<(String, Vec<String>)>,
}

impl EnumSchema {
    /// Get the index of a symbol.
    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Synonyms declared for `symbol`.
    pub fn synonyms(&self, symbol: &str) -> &[String] {
        self.symbol_aliases
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, aliases)| aliases.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a wire symbol to an index, accepting declared synonyms.
    pub fn resolve_symbol(&self, symbol: &str) -> Option<usize> {
        self.symbol_index(symbol).or_else(|| {
            self.symbol_aliases
                .iter()
                .find(|(_, aliases)| aliases.iter().any(|a| a == symbol))
                .and_then(|(s, _)| self.symbol_index(s))
        })
    }
}

/// Schema for a fixed type.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    /// The name of the fixed type.
    pub name: Name,
    /// Optional documentation.
    pub doc: Option<String>,
    /// Fully qualified aliases.
    pub aliases: Vec<String>,
    /// Size in bytes.
    pub size: usize,
}

/// Schema for a union type.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionSchema {
    /// Branch schemas in declaration order.
    pub branches: Vec<SchemaId>,
}

/// The shape of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Record(RecordSchema),
    Enum(EnumSchema),
    Array(SchemaId),
    Map(SchemaId),
    Union(UnionSchema),
    Fixed(FixedSchema),
}

impl SchemaKind {
    /// The variant tag.
    pub fn schema_type(&self) -> SchemaType {
        match self {
            SchemaKind::Null => SchemaType::Null,
            SchemaKind::Boolean => SchemaType::Boolean,
            SchemaKind::Int => SchemaType::Int,
            SchemaKind::Long => SchemaType::Long,
            SchemaKind::Float => SchemaType::Float,
            SchemaKind::Double => SchemaType::Double,
            SchemaKind::Bytes => SchemaType::Bytes,
            SchemaKind::String => SchemaType::String,
            SchemaKind::Record(_) => SchemaType::Record,
            SchemaKind::Enum(_) => SchemaType::Enum,
            SchemaKind::Array(_) => SchemaType::Array,
            SchemaKind::Map(_) => SchemaType::Map,
            SchemaKind::Union(_) => SchemaType::Union,
            SchemaKind::Fixed(_) => SchemaType::Fixed,
        }
    }

    pub(crate) fn from_primitive(ty: SchemaType) -> Option<SchemaKind> {
        Some(match ty {
            SchemaType::Null => SchemaKind::Null,
            SchemaType::Boolean => SchemaKind::Boolean,
            SchemaType::Int => SchemaKind::Int,
            SchemaType::Long => SchemaKind::Long,
            SchemaType::Float => SchemaKind::Float,
            SchemaType::Double => SchemaKind::Double,
            SchemaType::Bytes => SchemaKind::Bytes,
            SchemaType::String => SchemaKind::String,
            _ => return None,
        })
    }

    /// Name of a record, enum or fixed.
    pub fn name(&self) -> Option<&Name> {
        match self {
            SchemaKind::Record(r) => Some(&r.name),
            SchemaKind::Enum(e) => Some(&e.name),
            SchemaKind::Fixed(f) => Some(&f.name),
            _ => None,
        }
    }

    /// Aliases of a record, enum or fixed.
    pub fn aliases(&self) -> &[String] {
        match self {
            SchemaKind::Record(r) => &r.aliases,
            SchemaKind::Enum(e) => &e.aliases,
            SchemaKind::Fixed(f) => &f.aliases,
            _ => &[],
        }
    }

    pub(crate) fn aliases_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            SchemaKind::Record(r) => Some(&mut r.aliases),
            SchemaKind::Enum(e) => Some(&mut e.aliases),
            SchemaKind::Fixed(f) => Some(&mut f.aliases),
            _ => None,
        }
    }

    pub(crate) fn doc_mut(&mut self) -> Option<&mut Option<String>> {
        match self {
            SchemaKind::Record(r) => Some(&mut r.doc),
            SchemaKind::Enum(e) => Some(&mut e.doc),
            SchemaKind::Fixed(f) => Some(&mut f.doc),
            _ => None,
        }
    }

    /// Documentation of a named type.
    pub fn doc(&self) -> Option<&str> {
        match self {
            SchemaKind::Record(r) => r.doc.as_deref(),
            SchemaKind::Enum(e) => e.doc.as_deref(),
            SchemaKind::Fixed(f) => f.doc.as_deref(),
            _ => None,
        }
    }
}

/// One arena slot.
#[derive(Debug, Clone)]
pub(crate) struct SchemaNode {
    pub(crate) kind: SchemaKind,
    pub(crate) props: Properties,
    pub(crate) logical: Option<LogicalType>,
    pub(crate) hash: OnceLock<u64>,
}

impl SchemaNode {
    pub(crate) fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            props: Properties::new(),
            logical: None,
            hash: OnceLock::new(),
        }
    }
}

/// Immutable storage shared by every [`Schema`] handle built together.
#[derive(Debug)]
pub(crate) struct SchemaArena {
    pub(crate) nodes: Vec<SchemaNode>,
}

impl SchemaArena {
    pub(crate) fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.index()]
    }
}

/// A schema: a shared, immutable arena plus the id of the node it denotes.
///
/// Cloning is cheap. Handles into the same arena share all named types, so
/// a recursive record reached through a field is the same node as its
/// enclosing definition.
#[derive(Clone)]
pub struct Schema {
    pub(crate) arena: Arc<SchemaArena>,
    pub(crate) id: SchemaId,
}

impl Schema {
    pub(crate) fn node(&self) -> &SchemaNode {
        self.arena.node(self.id)
    }

    /// Parse a schema from its JSON document form.
    pub fn parse(json: &str) -> Result<Schema, SchemaError> {
        super::parser::parse_schema(json)
    }

    /// The id of this node within its arena.
    pub fn id(&self) -> SchemaId {
        self.id
    }

    /// The shape of this schema.
    pub fn kind(&self) -> &SchemaKind {
        &self.node().kind
    }

    /// The variant tag.
    pub fn schema_type(&self) -> SchemaType {
        self.kind().schema_type()
    }

    /// Custom properties, including any contributed by a logical type.
    pub fn props(&self) -> &Properties {
        &self.node().props
    }

    /// A single property.
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.node().props.get(key)
    }

    /// The attached logical type, if any.
    pub fn logical_type(&self) -> Option<&LogicalType> {
        self.node().logical.as_ref()
    }

    /// Another node of the same arena.
    pub fn at(&self, id: SchemaId) -> Schema {
        Schema {
            arena: Arc::clone(&self.arena),
            id,
        }
    }

    /// Name of a record, enum or fixed.
    pub fn name(&self) -> Option<&Name> {
        self.kind().name()
    }

    /// The full name used to identify this schema as a union branch:
    /// the primitive or composite type name, or a named type's full name.
    pub fn full_name(&self) -> String {
        match self.kind().name() {
            Some(name) => name.fullname(),
            None => self.schema_type().as_str().to_string(),
        }
    }

    /// Whether this is a record, enum or fixed.
    pub fn is_named(&self) -> bool {
        self.kind().name().is_some()
    }

    /// Record fields; empty for other kinds.
    pub fn fields(&self) -> &[Field] {
        match self.kind() {
            SchemaKind::Record(r) => r.fields(),
            _ => &[],
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        match self.kind() {
            SchemaKind::Record(r) => r.field(name),
            _ => None,
        }
    }

    /// The schema of a field of this record.
    pub fn field_schema(&self, field: &Field) -> Schema {
        self.at(field.schema)
    }

    /// Array item schema.
    pub fn items(&self) -> Option<Schema> {
        match self.kind() {
            SchemaKind::Array(items) => Some(self.at(*items)),
            _ => None,
        }
    }

    /// Map value schema.
    pub fn values(&self) -> Option<Schema> {
        match self.kind() {
            SchemaKind::Map(values) => Some(self.at(*values)),
            _ => None,
        }
    }

    /// Union branches in declaration order; empty for other kinds.
    pub fn branches(&self) -> Vec<Schema> {
        match self.kind() {
            SchemaKind::Union(u) => u.branches.iter().map(|&b| self.at(b)).collect(),
            _ => Vec::new(),
        }
    }

    /// Index of the `null` branch of a union.
    pub fn null_branch(&self) -> Option<usize> {
        match self.kind() {
            SchemaKind::Union(u) => u
                .branches
                .iter()
                .position(|&b| matches!(self.arena.node(b).kind, SchemaKind::Null)),
            _ => None,
        }
    }

    /// For a two-branch union with one `null` branch, the index of the
    /// other branch. Such unions use the compact JSON form.
    pub fn compact_union_branch(&self) -> Option<usize> {
        match self.kind() {
            SchemaKind::Union(u) if u.branches.len() == 2 => {
                self.null_branch().map(|null_index| 1 - null_index)
            }
            _ => None,
        }
    }

    /// Identity of this node: arena address and id.
    pub(crate) fn identity(&self) -> (usize, SchemaId) {
        (Arc::as_ptr(&self.arena) as usize, self.id)
    }

    /// Whether two handles denote the very same node.
    pub fn same_node(&self, other: &Schema) -> bool {
        self.identity() == other.identity()
    }

    /// Iterate every node of this schema's arena.
    pub(crate) fn arena_nodes(&self) -> impl Iterator<Item = Schema> + '_ {
        (0..self.arena.nodes.len()).map(|i| self.at(SchemaId(i as u32)))
    }

    /// Render the canonical JSON document.
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Render the canonical JSON document as a value.
    pub fn to_json_value(&self) -> Value {
        super::serialize::SchemaWriter::new().write(self)
    }

    /// Render with indentation.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_json_value()).unwrap_or_else(|_| self.to_json())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema({})", self.to_json())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        super::equality::EqualityContext::new().equals(self, other)
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(super::equality::schema_hash(self));
    }
}
