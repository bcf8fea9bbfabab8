//! Two-phase construction of schema graphs.
//!
//! Named types are allocated first and registered under their full name, so
//! other nodes (including their own fields) can refer to them before their
//! bodies are complete. A record's field list is assigned exactly once.
//! [`SchemaBuilder::build`] freezes the arena into an immutable, shareable
//! [`Schema`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::error::SchemaError;
use crate::logical::{LogicalTarget, LogicalType};

use super::types::{
    EnumSchema, Field, FixedSchema, Name, Properties, RecordSchema, Schema, SchemaArena, SchemaId,
    SchemaKind, SchemaNode, SchemaType, UnionSchema,
};

/// Property names owned by the schema grammar itself.
pub const SCHEMA_RESERVED: &[&str] = &[
    "doc",
    "fields",
    "items",
    "name",
    "namespace",
    "size",
    "symbols",
    "values",
    "type",
    "aliases",
    "default",
    "symbolAliases",
    "fallbackSymbol",
];

/// Property names owned by the field grammar.
pub const FIELD_RESERVED: &[&str] = &["default", "doc", "name", "order", "type", "aliases"];

/// Builder for a schema arena.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    nodes: Vec<SchemaNode>,
    names: HashMap<String, SchemaId>,
    imported: HashMap<(usize, SchemaId), SchemaId>,
    // keeps imported arenas alive so their addresses stay unique keys
    sources: Vec<Arc<SchemaArena>>,
}

impl SchemaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reopen an existing schema for further construction. The returned id
    /// denotes `schema` inside the new builder.
    pub fn edit(schema: &Schema) -> (Self, SchemaId) {
        let nodes = schema.arena.nodes.clone();
        let names = nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.kind.name().map(|name| (name.fullname(), SchemaId(i as u32))))
            .collect();
        let builder = Self {
            nodes,
            names,
            imported: HashMap::new(),
            sources: Vec::new(),
        };
        (builder, schema.id)
    }

    fn push(&mut self, kind: SchemaKind) -> SchemaId {
        let id = SchemaId(self.nodes.len() as u32);
        self.nodes.push(SchemaNode::new(kind));
        id
    }

    fn node(&self, id: SchemaId) -> Result<&SchemaNode, SchemaError> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| SchemaError::InvalidSchema(format!("Unknown schema id {}", id.0)))
    }

    fn node_mut(&mut self, id: SchemaId) -> Result<&mut SchemaNode, SchemaError> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| SchemaError::InvalidSchema(format!("Unknown schema id {}", id.0)))
    }

    /// The shape of a node under construction.
    pub fn kind(&self, id: SchemaId) -> Result<&SchemaKind, SchemaError> {
        self.node(id).map(|n| &n.kind)
    }

    /// Properties of a node under construction.
    pub fn props(&self, id: SchemaId) -> Result<&Properties, SchemaError> {
        self.node(id).map(|n| &n.props)
    }

    /// Find a registered named type.
    pub fn lookup(&self, fullname: &str) -> Option<SchemaId> {
        self.names.get(fullname).copied()
    }

    fn register(&mut self, name: &Name, id: SchemaId) -> Result<(), SchemaError> {
        let fullname = name.fullname();
        if SchemaType::primitive(&fullname).is_some() {
            return Err(SchemaError::InvalidSchema(format!(
                "Cannot redefine primitive type '{}'",
                fullname
            )));
        }
        if self.names.contains_key(&fullname) {
            return Err(SchemaError::DuplicateName(fullname));
        }
        self.names.insert(fullname, id);
        Ok(())
    }

    /// Allocate a primitive schema node.
    pub fn primitive(&mut self, ty: SchemaType) -> Result<SchemaId, SchemaError> {
        let kind = SchemaKind::from_primitive(ty).ok_or_else(|| {
            SchemaError::InvalidSchema(format!("'{}' is not a primitive type", ty))
        })?;
        Ok(self.push(kind))
    }

    /// Allocate and register an empty record. Its fields are assigned later
    /// with [`SchemaBuilder::set_fields`].
    pub fn record(&mut self, name: Name) -> Result<SchemaId, SchemaError> {
        let id = SchemaId(self.nodes.len() as u32);
        self.register(&name, id)?;
        Ok(self.push(SchemaKind::Record(RecordSchema::new(name))))
    }

    /// Assign a record's fields. Fails if they were already assigned.
    pub fn set_fields(&mut self, record: SchemaId, fields: Vec<Field>) -> Result<(), SchemaError> {
        let len = self.nodes.len();
        let node = self.node_mut(record)?;
        let SchemaKind::Record(schema) = &mut node.kind else {
            return Err(SchemaError::InvalidSchema(
                "Fields can only be set on a record".to_string(),
            ));
        };
        if schema.fields.is_some() {
            return Err(SchemaError::FieldsAlreadySet(schema.name.fullname()));
        }

        let mut lookup = HashMap::with_capacity(fields.len());
        let mut taken = HashSet::new();
        let mut positioned = Vec::with_capacity(fields.len());
        for (position, mut field) in fields.into_iter().enumerate() {
            if field.schema.index() >= len {
                return Err(SchemaError::InvalidSchema(format!(
                    "Field '{}' refers to unknown schema id {}",
                    field.name, field.schema.0
                )));
            }
            if let Some(key) = field.props.keys().find(|k| FIELD_RESERVED.contains(&k.as_str())) {
                return Err(SchemaError::ReservedProperty(key.clone()));
            }
            for name in std::iter::once(&field.name).chain(field.aliases.iter()) {
                if !taken.insert(name.clone()) {
                    return Err(SchemaError::DuplicateName(format!(
                        "{}.{}",
                        schema.name.fullname(),
                        name
                    )));
                }
            }
            field.position = position;
            lookup.insert(field.name.clone(), position);
            positioned.push(field);
        }

        schema.fields = Some(positioned);
        schema.lookup = lookup;
        Ok(())
    }

    /// Allocate and register an enum.
    pub fn enumeration(
        &mut self,
        name: Name,
        symbols: Vec<String>,
        default: Option<String>,
    ) -> Result<SchemaId, SchemaError> {
        let mut seen = HashSet::new();
        if let Some(dup) = symbols.iter().find(|s| !seen.insert(s.as_str())) {
            return Err(SchemaError::InvalidSchema(format!(
                "Duplicate enum symbol '{}' in '{}'",
                dup,
                name.fullname()
            )));
        }
        if let Some(default) = &default {
            if !symbols.contains(default) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Default symbol '{}' is not a symbol of enum '{}'",
                    default,
                    name.fullname()
                )));
            }
        }
        let id = SchemaId(self.nodes.len() as u32);
        self.register(&name, id)?;
        Ok(self.push(SchemaKind::Enum(EnumSchema {
            name,
            doc: None,
            aliases: Vec::new(),
            symbols,
            default,
            symbol_aliases: Vec::new(),
        })))
    }

    /// Declare wire synonyms for enum symbols.
    pub fn set_symbol_aliases(
        &mut self,
        id: SchemaId,
        aliases: Vec<(String, Vec<String>)>,
    ) -> Result<(), SchemaError> {
        let node = self.node_mut(id)?;
        let SchemaKind::Enum(schema) = &mut node.kind else {
            return Err(SchemaError::InvalidSchema(
                "Symbol aliases require an enum".to_string(),
            ));
        };
        for (symbol, synonyms) in &aliases {
            if schema.symbol_index(symbol).is_none() {
                return Err(SchemaError::InvalidSchema(format!(
                    "Symbol alias for unknown symbol '{}' in '{}'",
                    symbol,
                    schema.name.fullname()
                )));
            }
            if let Some(clash) = synonyms.iter().find(|s| schema.symbol_index(s).is_some()) {
                return Err(SchemaError::DuplicateName(format!(
                    "{} (synonym shadows a symbol of '{}')",
                    clash,
                    schema.name.fullname()
                )));
            }
        }
        schema.symbol_aliases = aliases;
        Ok(())
    }

    /// Allocate and register a fixed type.
    pub fn fixed(&mut self, name: Name, size: usize) -> Result<SchemaId, SchemaError> {
        let id = SchemaId(self.nodes.len() as u32);
        self.register(&name, id)?;
        Ok(self.push(SchemaKind::Fixed(FixedSchema {
            name,
            doc: None,
            aliases: Vec::new(),
            size,
        })))
    }

    /// Allocate an array of `items`.
    pub fn array(&mut self, items: SchemaId) -> SchemaId {
        self.push(SchemaKind::Array(items))
    }

    /// Allocate a map with values of `values`.
    pub fn map(&mut self, values: SchemaId) -> SchemaId {
        self.push(SchemaKind::Map(values))
    }

    /// Allocate a union. Branches must have distinct full names and may not
    /// themselves be unions.
    pub fn union(&mut self, branches: Vec<SchemaId>) -> Result<SchemaId, SchemaError> {
        let mut seen = HashSet::new();
        for &branch in &branches {
            let kind = self.kind(branch)?;
            if matches!(kind, SchemaKind::Union(_)) {
                return Err(SchemaError::InvalidUnion(
                    "Unions may not immediately contain other unions".to_string(),
                ));
            }
            let label = match kind.name() {
                Some(name) => name.fullname(),
                None => kind.schema_type().as_str().to_string(),
            };
            if !seen.insert(label.clone()) {
                return Err(SchemaError::InvalidUnion(format!("Duplicate in union: {}", label)));
            }
        }
        Ok(self.push(SchemaKind::Union(UnionSchema { branches })))
    }

    /// Set the documentation of a named type.
    pub fn set_doc(&mut self, id: SchemaId, doc: impl Into<String>) -> Result<(), SchemaError> {
        let node = self.node_mut(id)?;
        let slot = node.kind.doc_mut().ok_or_else(|| {
            SchemaError::InvalidSchema("Only named types carry documentation".to_string())
        })?;
        *slot = Some(doc.into());
        Ok(())
    }

    /// Add a fully qualified alias to a named type.
    pub fn add_alias(&mut self, id: SchemaId, alias: impl Into<String>) -> Result<(), SchemaError> {
        let alias = alias.into();
        let node = self.node_mut(id)?;
        let aliases = node.kind.aliases_mut().ok_or_else(|| {
            SchemaError::InvalidSchema("Only named types carry aliases".to_string())
        })?;
        if aliases.contains(&alias) {
            return Err(SchemaError::DuplicateName(alias));
        }
        aliases.push(alias);
        Ok(())
    }

    /// Add a custom property. Properties are append-only: re-adding an equal
    /// value is a no-op, a differing value is an error.
    pub fn add_prop(
        &mut self,
        id: SchemaId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), SchemaError> {
        let key = key.into();
        if SCHEMA_RESERVED.contains(&key.as_str()) {
            return Err(SchemaError::ReservedProperty(key));
        }
        merge_prop(&mut self.node_mut(id)?.props, key, value)
    }

    /// Attach a logical type. The type validates the node's physical shape,
    /// and its properties are merged into the node's properties.
    pub fn set_logical_type(
        &mut self,
        id: SchemaId,
        logical: LogicalType,
    ) -> Result<(), SchemaError> {
        if let Some(existing) = &self.node(id)?.logical {
            return Err(SchemaError::LogicalTypeAlreadySet {
                existing: existing.name().to_string(),
                attempted: logical.name().to_string(),
            });
        }
        let target = self.target(id)?;
        let bound = logical.bind(&target)?;
        let contributed = bound.properties();

        let node = self.node_mut(id)?;
        let mut props = node.props.clone();
        for (key, value) in contributed {
            merge_prop(&mut props, key, value)?;
        }
        node.props = props;
        node.logical = Some(bound);
        Ok(())
    }

    fn target(&self, id: SchemaId) -> Result<LogicalTarget, SchemaError> {
        let node = self.node(id)?;
        let fields = match &node.kind {
            SchemaKind::Record(r) => r
                .fields()
                .iter()
                .map(|f| Ok((f.name.clone(), self.kind(f.schema)?.schema_type())))
                .collect::<Result<Vec<_>, SchemaError>>()?,
            _ => Vec::new(),
        };
        Ok(LogicalTarget {
            schema_type: node.kind.schema_type(),
            props: node.props.clone(),
            fields,
            fixed_size: match &node.kind {
                SchemaKind::Fixed(f) => Some(f.size),
                _ => None,
            },
        })
    }

    /// Copy the graph reachable from `schema` into this builder.
    ///
    /// Named types already registered here under the same full name are
    /// reused rather than copied.
    pub fn import(&mut self, schema: &Schema) -> SchemaId {
        if !self.sources.iter().any(|a| Arc::ptr_eq(a, &schema.arena)) {
            self.sources.push(Arc::clone(&schema.arena));
        }
        self.import_node(schema)
    }

    fn import_node(&mut self, schema: &Schema) -> SchemaId {
        let key = schema.identity();
        if let Some(&id) = self.imported.get(&key) {
            return id;
        }
        if let Some(name) = schema.name() {
            if let Some(&id) = self.names.get(&name.fullname()) {
                self.imported.insert(key, id);
                return id;
            }
        }

        let id = self.push(SchemaKind::Null);
        self.imported.insert(key, id);
        if let Some(name) = schema.name() {
            self.names.insert(name.fullname(), id);
        }

        let source = schema.node();
        let kind = match &source.kind {
            SchemaKind::Record(record) => {
                let mut copy = record.clone();
                if let Some(fields) = copy.fields.as_mut() {
                    for field in fields.iter_mut() {
                        field.schema = self.import_node(&schema.at(field.schema));
                    }
                }
                SchemaKind::Record(copy)
            }
            SchemaKind::Array(items) => SchemaKind::Array(self.import_node(&schema.at(*items))),
            SchemaKind::Map(values) => SchemaKind::Map(self.import_node(&schema.at(*values))),
            SchemaKind::Union(union) => SchemaKind::Union(UnionSchema {
                branches: union
                    .branches
                    .iter()
                    .map(|&b| self.import_node(&schema.at(b)))
                    .collect(),
            }),
            other => other.clone(),
        };
        self.nodes[id.index()] = SchemaNode {
            kind,
            props: source.props.clone(),
            logical: source.logical.clone(),
            hash: OnceLock::new(),
        };
        id
    }

    /// Freeze the arena. Every record must have had its fields assigned.
    pub fn build(self, root: SchemaId) -> Result<Schema, SchemaError> {
        if root.index() >= self.nodes.len() {
            return Err(SchemaError::InvalidSchema(format!(
                "Unknown root schema id {}",
                root.0
            )));
        }
        let mut nodes = self.nodes;
        for node in &mut nodes {
            if let SchemaKind::Record(r) = &node.kind {
                if !r.has_fields() {
                    return Err(SchemaError::FieldsNotSet(r.name.fullname()));
                }
            }
            // cached hashes may predate edits
            node.hash = OnceLock::new();
        }
        Ok(Schema {
            arena: Arc::new(SchemaArena { nodes }),
            id: root,
        })
    }
}

fn merge_prop(
    props: &mut Properties,
    key: String,
    value: Value,
) -> Result<(), SchemaError> {
    match props.get(&key) {
        Some(existing) if *existing == value => Ok(()),
        Some(existing) => Err(SchemaError::PropertyConflict {
            name: key,
            existing: existing.to_string(),
            attempted: value.to_string(),
        }),
        None => {
            props.insert(key, value);
            Ok(())
        }
    }
}
