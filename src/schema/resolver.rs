//! External schema references.
//!
//! A [`SchemaResolver`] maps textual ids to schemas and back. The parser uses
//! it to resolve `{"$ref": "<id>"}` nodes, and the serializer can use it to
//! render known named types as references instead of inlining them.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::SchemaError;

use super::types::Schema;

/// Resolves schema references for registries and catalogs.
pub trait SchemaResolver: Send + Sync {
    /// Look up a schema by id.
    fn resolve(&self, id: &str) -> Result<Schema, SchemaError>;

    /// The id under which `schema` is known, if any.
    fn id_of(&self, schema: &Schema) -> Option<String>;
}

/// In-memory resolver backed by a map of ids to schemas.
#[derive(Debug, Default)]
pub struct MapSchemaResolver {
    schemas: RwLock<HashMap<String, Schema>>,
}

impl MapSchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema` under `id`, replacing any previous entry.
    pub fn register(&self, id: impl Into<String>, schema: Schema) {
        self.schemas.write().insert(id.into(), schema);
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}

impl SchemaResolver for MapSchemaResolver {
    fn resolve(&self, id: &str) -> Result<Schema, SchemaError> {
        self.schemas
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SchemaError::Reference(format!("Unknown schema id '{}'", id)))
    }

    fn id_of(&self, schema: &Schema) -> Option<String> {
        self.schemas
            .read()
            .iter()
            .find(|(_, candidate)| candidate.same_node(schema) || *candidate == schema)
            .map(|(id, _)| id.clone())
    }
}

/// Named resolvers with a process-wide default.
#[derive(Default)]
pub struct SchemaResolvers {
    resolvers: RwLock<HashMap<String, Arc<dyn SchemaResolver>>>,
    default: RwLock<Option<String>>,
}

static GLOBAL_RESOLVERS: Lazy<SchemaResolvers> = Lazy::new(SchemaResolvers::default);

impl SchemaResolvers {
    /// The process-wide resolver table.
    pub fn global() -> &'static SchemaResolvers {
        &GLOBAL_RESOLVERS
    }

    /// Register a resolver by name. Fails if the name is taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        resolver: Arc<dyn SchemaResolver>,
    ) -> Result<(), SchemaError> {
        let name = name.into();
        let mut resolvers = self.resolvers.write();
        if resolvers.contains_key(&name) {
            return Err(SchemaError::DuplicateName(name));
        }
        resolvers.insert(name, resolver);
        Ok(())
    }

    /// Look up a resolver by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn SchemaResolver>> {
        self.resolvers.read().get(name).cloned()
    }

    /// Make a registered resolver the default one.
    pub fn set_default(&self, name: &str) -> Result<(), SchemaError> {
        if !self.resolvers.read().contains_key(name) {
            return Err(SchemaError::Reference(format!(
                "No resolver registered as '{}'",
                name
            )));
        }
        *self.default.write() = Some(name.to_string());
        Ok(())
    }

    /// The default resolver, if one was selected.
    pub fn default_resolver(&self) -> Option<Arc<dyn SchemaResolver>> {
        let name = self.default.read().clone()?;
        self.get(&name)
    }
}
