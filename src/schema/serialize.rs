//! Canonical JSON rendering of schemas.
//!
//! A named type is rendered in full the first time it is reached and by
//! name afterwards, which is how shared and self-referential types stay
//! finite. Names are written relative to the enclosing namespace.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use super::resolver::SchemaResolver;
use super::types::{Field, FieldOrder, Name, Schema, SchemaId, SchemaKind};

/// Renders schemas to JSON, tracking which named types were already written.
pub struct SchemaWriter<'r> {
    written: HashSet<(usize, SchemaId)>,
    namespace: Option<String>,
    resolver: Option<&'r dyn SchemaResolver>,
}

impl Default for SchemaWriter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> SchemaWriter<'r> {
    pub fn new() -> Self {
        Self {
            written: HashSet::new(),
            namespace: None,
            resolver: None,
        }
    }

    /// Render named types the resolver knows as `{"$ref": id}`.
    pub fn with_resolver(mut self, resolver: &'r dyn SchemaResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Render `schema`. The root is always inlined.
    pub fn write(&mut self, schema: &Schema) -> Value {
        self.write_node(schema, true)
    }

    fn write_node(&mut self, schema: &Schema, root: bool) -> Value {
        let node = schema.node();
        match &node.kind {
            SchemaKind::Record(_) | SchemaKind::Enum(_) | SchemaKind::Fixed(_) => {
                self.write_named(schema, root)
            }
            SchemaKind::Union(union) => Value::Array(
                union
                    .branches
                    .iter()
                    .map(|&b| self.write_node(&schema.at(b), false))
                    .collect(),
            ),
            SchemaKind::Array(items) => {
                let mut obj = Map::new();
                obj.insert("type".into(), json!("array"));
                obj.insert("items".into(), self.write_node(&schema.at(*items), false));
                self.finish(obj, schema)
            }
            SchemaKind::Map(values) => {
                let mut obj = Map::new();
                obj.insert("type".into(), json!("map"));
                obj.insert("values".into(), self.write_node(&schema.at(*values), false));
                self.finish(obj, schema)
            }
            primitive => {
                let name = primitive.schema_type().as_str();
                if node.props.is_empty() {
                    json!(name)
                } else {
                    let mut obj = Map::new();
                    obj.insert("type".into(), json!(name));
                    self.finish(obj, schema)
                }
            }
        }
    }

    fn finish(&self, mut obj: Map<String, Value>, schema: &Schema) -> Value {
        for (key, value) in schema.props() {
            obj.insert(key.clone(), value.clone());
        }
        Value::Object(obj)
    }

    fn relative(&self, name: &Name) -> String {
        if name.namespace == self.namespace {
            name.name.clone()
        } else {
            name.fullname()
        }
    }

    fn relative_alias(&self, alias: &str, namespace: Option<&str>) -> String {
        match (alias.rsplit_once('.'), namespace) {
            (Some((ns, simple)), Some(own)) if ns == own => simple.to_string(),
            _ => alias.to_string(),
        }
    }

    fn write_named(&mut self, schema: &Schema, root: bool) -> Value {
        let kind = schema.kind();
        let Some(name) = kind.name() else {
            return Value::Null;
        };
        if !self.written.insert(schema.identity()) {
            return json!(self.relative(name));
        }
        if !root {
            if let Some(id) = self.resolver.and_then(|r| r.id_of(schema)) {
                return json!({ "$ref": id });
            }
        }

        let mut obj = Map::new();
        obj.insert("type".into(), json!(kind.schema_type().as_str()));
        obj.insert("name".into(), json!(name.name));
        if name.namespace != self.namespace {
            obj.insert(
                "namespace".into(),
                json!(name.namespace.clone().unwrap_or_default()),
            );
        }
        if let Some(doc) = kind.doc() {
            obj.insert("doc".into(), json!(doc));
        }
        if !kind.aliases().is_empty() {
            let aliases: Vec<String> = kind
                .aliases()
                .iter()
                .map(|a| self.relative_alias(a, name.namespace.as_deref()))
                .collect();
            obj.insert("aliases".into(), json!(aliases));
        }

        match kind {
            SchemaKind::Record(record) => {
                let previous = std::mem::replace(&mut self.namespace, name.namespace.clone());
                let fields: Vec<Value> = record
                    .fields()
                    .iter()
                    .map(|f| self.write_field(schema, f))
                    .collect();
                self.namespace = previous;
                obj.insert("fields".into(), Value::Array(fields));
            }
            SchemaKind::Enum(e) => {
                obj.insert("symbols".into(), json!(e.symbols));
                if let Some(default) = &e.default {
                    obj.insert("default".into(), json!(default));
                }
                if !e.symbol_aliases.is_empty() {
                    let aliases: Map<String, Value> = e
                        .symbol_aliases
                        .iter()
                        .map(|(s, a)| (s.clone(), json!(a)))
                        .collect();
                    obj.insert("symbolAliases".into(), Value::Object(aliases));
                }
            }
            SchemaKind::Fixed(f) => {
                obj.insert("size".into(), json!(f.size));
            }
            _ => {}
        }
        self.finish(obj, schema)
    }

    fn write_field(&mut self, record: &Schema, field: &Field) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), json!(field.name));
        obj.insert("type".into(), self.write_node(&record.at(field.schema), false));
        if let Some(doc) = &field.doc {
            obj.insert("doc".into(), json!(doc));
        }
        if let Some(default) = &field.default {
            obj.insert("default".into(), default.clone());
        }
        if field.order != FieldOrder::Ascending {
            obj.insert("order".into(), json!(field.order.as_str()));
        }
        if !field.aliases.is_empty() {
            obj.insert("aliases".into(), json!(field.aliases));
        }
        for (key, value) in &field.props {
            obj.insert(key.clone(), value.clone());
        }
        Value::Object(obj)
    }
}
