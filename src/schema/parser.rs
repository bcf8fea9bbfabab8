//! JSON schema parser for Avro schemas.
//!
//! Parses schema documents into an arena through [`SchemaBuilder`]. Named
//! types are registered before their bodies are parsed, which is what makes
//! self-referential records expressible.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::error::SchemaError;
use crate::logical::LogicalTypeRegistry;

use super::builder::{SchemaBuilder, FIELD_RESERVED, SCHEMA_RESERVED};
use super::resolver::{SchemaResolver, SchemaResolvers};
use super::types::{Field, FieldOrder, Name, Schema, SchemaId, SchemaKind, SchemaType};

/// Parse an Avro schema from a JSON string with default options.
///
/// # Example
/// ```
/// use avrokit::schema::parse_schema;
///
/// let schema = parse_schema(r#""string""#).unwrap();
/// assert_eq!(schema.full_name(), "string");
/// ```
pub fn parse_schema(json: &str) -> Result<Schema, SchemaError> {
    SchemaParser::new().parse(json)
}

/// Parse an Avro schema from a JSON string with explicit options.
///
/// # Example
/// ```
/// use avrokit::schema::{parse_schema_with_options, ParseOptions};
///
/// // Permissive names: a warning is logged instead of failing
/// let options = ParseOptions::default().with_validate_names(false);
/// let schema = parse_schema_with_options(
///     r#"{"type":"fixed","name":"md5-hash","size":16}"#,
///     &options,
/// );
/// assert!(schema.is_ok());
///
/// let strict = parse_schema_with_options(
///     r#"{"type":"fixed","name":"md5-hash","size":16}"#,
///     &ParseOptions::default(),
/// );
/// assert!(strict.is_err());
/// ```
pub fn parse_schema_with_options(json: &str, options: &ParseOptions) -> Result<Schema, SchemaError> {
    SchemaParser::with_options(options.clone()).parse(json)
}

/// Options controlling schema parsing.
///
/// These are passed explicitly to each parse call, so toggling validation
/// for one parse never leaks into another.
#[derive(Clone)]
pub struct ParseOptions {
    /// Reject invalid identifiers (otherwise log a warning).
    pub validate_names: bool,
    /// Reject field defaults that do not match the field schema.
    pub validate_defaults: bool,
    /// Keep unknown `logicalType` values as plain properties.
    pub allow_undefined_logical_types: bool,
    /// Logical type factories to consult.
    pub registry: Arc<LogicalTypeRegistry>,
    /// Resolver for `{"$ref": ...}` schema references.
    pub resolver: Option<Arc<dyn SchemaResolver>>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            validate_names: true,
            validate_defaults: true,
            allow_undefined_logical_types: false,
            registry: LogicalTypeRegistry::global(),
            resolver: SchemaResolvers::global().default_resolver(),
        }
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("validate_names", &self.validate_names)
            .field("validate_defaults", &self.validate_defaults)
            .field(
                "allow_undefined_logical_types",
                &self.allow_undefined_logical_types,
            )
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validate_names(mut self, validate: bool) -> Self {
        self.validate_names = validate;
        self
    }

    pub fn with_validate_defaults(mut self, validate: bool) -> Self {
        self.validate_defaults = validate;
        self
    }

    pub fn with_allow_undefined_logical_types(mut self, allow: bool) -> Self {
        self.allow_undefined_logical_types = allow;
        self
    }

    pub fn with_registry(mut self, registry: Arc<LogicalTypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SchemaResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

/// Schema parser that remembers named types across documents.
///
/// Types defined by one [`SchemaParser::parse`] call may be referenced by
/// name in later calls on the same parser.
#[derive(Debug, Default)]
pub struct SchemaParser {
    options: ParseOptions,
    known: HashMap<String, Schema>,
}

impl SchemaParser {
    /// Create a parser with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with the given options.
    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            options,
            known: HashMap::new(),
        }
    }

    /// Named types parsed so far, by full name.
    pub fn known_types(&self) -> &HashMap<String, Schema> {
        &self.known
    }

    /// Parse a JSON schema document.
    pub fn parse(&mut self, json: &str) -> Result<Schema, SchemaError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;
        self.parse_value(&value)
    }

    /// Parse an already decoded JSON schema document.
    pub fn parse_value(&mut self, value: &Value) -> Result<Schema, SchemaError> {
        let mut session = Session {
            builder: SchemaBuilder::new(),
            namespace: None,
            options: &self.options,
            known: &self.known,
        };
        let root = session.parse(value)?;
        let schema = session.builder.build(root)?;
        for node in schema.arena_nodes() {
            if let Some(name) = node.name() {
                self.known.insert(name.fullname(), node.clone());
            }
        }
        Ok(schema)
    }
}

/// State of one document parse: the arena under construction and the
/// current default namespace.
struct Session<'a> {
    builder: SchemaBuilder,
    namespace: Option<String>,
    options: &'a ParseOptions,
    known: &'a HashMap<String, Schema>,
}

impl Session<'_> {
    fn parse(&mut self, value: &Value) -> Result<SchemaId, SchemaError> {
        match value {
            Value::String(s) => self.parse_reference(s),
            Value::Object(obj) => self.parse_object(obj),
            Value::Array(arr) => self.parse_union(arr),
            _ => Err(SchemaError::ParseError(format!(
                "Expected string, object, or array, found: {}",
                value
            ))),
        }
    }

    /// A primitive type name or a previously declared named type.
    fn parse_reference(&mut self, name: &str) -> Result<SchemaId, SchemaError> {
        if let Some(ty) = SchemaType::primitive(name) {
            return self.builder.primitive(ty);
        }
        let qualified = Name::resolve(name, None, self.namespace.as_deref()).fullname();
        if let Some(id) = self
            .builder
            .lookup(&qualified)
            .or_else(|| self.builder.lookup(name))
        {
            return Ok(id);
        }
        let known = self.known.get(&qualified).or_else(|| self.known.get(name));
        match known {
            Some(schema) => Ok(self.builder.import(schema)),
            None => Err(SchemaError::UndefinedName(qualified)),
        }
    }

    fn parse_union(&mut self, arr: &[Value]) -> Result<SchemaId, SchemaError> {
        let branches = arr
            .iter()
            .map(|v| self.parse(v))
            .collect::<Result<Vec<_>, _>>()?;
        self.builder.union(branches)
    }

    fn parse_object(&mut self, obj: &Map<String, Value>) -> Result<SchemaId, SchemaError> {
        if let Some(reference) = obj.get("$ref") {
            return self.parse_external(reference);
        }

        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::ParseError("Missing 'type' field".to_string()))?;
        let type_name = match type_value {
            Value::String(s) => s.as_str(),
            // {"type": {...}} or {"type": [...]}: the wrapper may not carry anything else
            other => {
                if let Some(key) = obj.keys().find(|key| key.as_str() != "type") {
                    return Err(SchemaError::ParseError(format!(
                        "'{}' cannot annotate a nested type definition",
                        key
                    )));
                }
                return self.parse(other);
            }
        };

        let id = match type_name {
            "record" | "error" => self.parse_record(obj)?,
            "enum" => self.parse_enum(obj)?,
            "fixed" => self.parse_fixed(obj)?,
            "array" => {
                let items = obj.get("items").ok_or_else(|| {
                    SchemaError::ParseError("Array missing 'items' field".to_string())
                })?;
                let items = self.parse(items)?;
                self.builder.array(items)
            }
            "map" => {
                let values = obj.get("values").ok_or_else(|| {
                    SchemaError::ParseError("Map missing 'values' field".to_string())
                })?;
                let values = self.parse(values)?;
                self.builder.map(values)
            }
            other => match SchemaType::primitive(other) {
                Some(ty) => self.builder.primitive(ty)?,
                // a named reference spelled as an object
                None => return self.parse_reference(other),
            },
        };

        for (key, value) in obj {
            if SCHEMA_RESERVED.contains(&key.as_str()) || key == "logicalType" {
                continue;
            }
            self.builder.add_prop(id, key.clone(), value.clone())?;
        }

        if let Some(logical) = obj.get("logicalType") {
            self.attach_logical_type(id, logical)?;
        }
        Ok(id)
    }

    fn parse_external(&mut self, reference: &Value) -> Result<SchemaId, SchemaError> {
        let reference = reference
            .as_str()
            .ok_or_else(|| SchemaError::Reference("'$ref' must be a string".to_string()))?;
        let resolver = self.options.resolver.as_ref().ok_or_else(|| {
            SchemaError::Reference(format!("No resolver configured for '{}'", reference))
        })?;
        let schema = resolver.resolve(reference)?;
        Ok(self.builder.import(&schema))
    }

    fn attach_logical_type(&mut self, id: SchemaId, logical: &Value) -> Result<(), SchemaError> {
        let name = logical
            .as_str()
            .ok_or_else(|| SchemaError::ParseError("'logicalType' must be a string".to_string()))?;
        match self.options.registry.factory(name) {
            Some(factory) => {
                let logical = factory.create(self.builder.props(id)?)?;
                self.builder.set_logical_type(id, logical)
            }
            None if self.options.allow_undefined_logical_types => {
                warn!(logical_type = name, "Undefined logical type kept as property");
                self.builder
                    .add_prop(id, "logicalType", Value::String(name.to_string()))
            }
            None => Err(SchemaError::UndefinedLogicalType(name.to_string())),
        }
    }


    fn parse_name(&self, obj: &Map<String, Value>, what: &str) -> Result<Name, SchemaError> {
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::ParseError(format!("{} missing 'name' field", what)))?;
        let namespace = match obj.get("namespace") {
            None | Some(Value::Null) => None,
            Some(Value::String(ns)) => Some(ns.as_str()),
            Some(other) => {
                return Err(SchemaError::ParseError(format!(
                    "Namespace must be a string, found {}",
                    other
                )))
            }
        };
        let name = Name::resolve(name, namespace, self.namespace.as_deref());
        self.validate_name(&name.name, what)?;
        if let Some(ns) = &name.namespace {
            for part in ns.split('.') {
                self.validate_name(part, "Namespace")?;
            }
        }
        Ok(name)
    }

    fn add_named_metadata(
        &mut self,
        id: SchemaId,
        name: &Name,
        obj: &Map<String, Value>,
    ) -> Result<(), SchemaError> {
        if let Some(doc) = obj.get("doc").and_then(Value::as_str) {
            self.builder.set_doc(id, doc)?;
        }
        for alias in string_list(obj.get("aliases"), "aliases")? {
            let alias = Name::resolve(&alias, None, name.namespace.as_deref());
            self.builder.add_alias(id, alias.fullname())?;
        }
        Ok(())
    }

    fn parse_record(&mut self, obj: &Map<String, Value>) -> Result<SchemaId, SchemaError> {
        let name = self.parse_name(obj, "Record")?;
        let id = self.builder.record(name.clone())?;
        self.add_named_metadata(id, &name, obj)?;

        let fields_value = obj
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::ParseError("Record missing 'fields' array".to_string()))?;

        // children default to this record's namespace; restored on every path
        let previous = std::mem::replace(&mut self.namespace, name.namespace.clone());
        let fields = fields_value
            .iter()
            .map(|f| self.parse_field(f))
            .collect::<Result<Vec<_>, _>>();
        self.namespace = previous;

        self.builder.set_fields(id, fields?)?;
        Ok(id)
    }

    fn parse_field(&mut self, value: &Value) -> Result<Field, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::ParseError("Field must be an object".to_string()))?;

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::ParseError("Field missing 'name'".to_string()))?;
        self.validate_name(name, "Field")?;

        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::ParseError(format!("Field '{}' missing 'type'", name)))?;
        let schema = self.parse(type_value)?;

        let mut field = Field::new(name, schema);
        field.doc = obj.get("doc").and_then(Value::as_str).map(String::from);
        field.aliases = string_list(obj.get("aliases"), "aliases")?;
        if let Some(order) = obj.get("order") {
            field.order = order
                .as_str()
                .and_then(FieldOrder::parse)
                .ok_or_else(|| SchemaError::ParseError(format!("Invalid field order: {}", order)))?;
        }
        if let Some(default) = obj.get("default") {
            field.default = Some(self.check_default(name, default, schema)?);
        }
        for (key, value) in obj {
            if !FIELD_RESERVED.contains(&key.as_str()) {
                field.props.insert(key.clone(), value.clone());
            }
        }
        Ok(field)
    }

    fn parse_enum(&mut self, obj: &Map<String, Value>) -> Result<SchemaId, SchemaError> {
        let name = self.parse_name(obj, "Enum")?;
        let symbols = obj
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::ParseError("Enum missing 'symbols' array".to_string()))?
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    SchemaError::ParseError(format!("Enum symbol must be a string: {}", v))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        for symbol in &symbols {
            self.validate_name(symbol, "Enum symbol")?;
        }

        // `fallbackSymbol` is the legacy spelling of `default`
        let default = obj
            .get("default")
            .or_else(|| obj.get("fallbackSymbol"))
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    SchemaError::ParseError(format!("Enum default must be a string: {}", v))
                })
            })
            .transpose()?;

        let id = self.builder.enumeration(name.clone(), symbols, default)?;
        self.add_named_metadata(id, &name, obj)?;

        if let Some(aliases) = obj.get("symbolAliases") {
            let aliases = aliases.as_object().ok_or_else(|| {
                SchemaError::ParseError("'symbolAliases' must be an object".to_string())
            })?;
            let aliases = aliases
                .iter()
                .map(|(symbol, synonyms)| {
                    Ok((symbol.clone(), string_list(Some(synonyms), "symbolAliases")?))
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            self.builder.set_symbol_aliases(id, aliases)?;
        }
        Ok(id)
    }

    fn parse_fixed(&mut self, obj: &Map<String, Value>) -> Result<SchemaId, SchemaError> {
        let name = self.parse_name(obj, "Fixed")?;
        let size = obj
            .get("size")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                SchemaError::ParseError("Fixed missing non-negative 'size' field".to_string())
            })?;
        let id = self.builder.fixed(name.clone(), size as usize)?;
        self.add_named_metadata(id, &name, obj)?;
        Ok(id)
    }

    /// Validate a name. In permissive mode violations are logged only.
    fn validate_name(&self, name: &str, context: &str) -> Result<(), SchemaError> {
        let reason = match name.chars().next() {
            None => Some("name cannot be empty".to_string()),
            Some(first) if !first.is_ascii_alphabetic() && first != '_' => {
                Some("must start with a letter or underscore".to_string())
            }
            Some(_) => name
                .chars()
                .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_')
                .map(|ch| format!("contains invalid character '{}'", ch)),
        };
        match reason {
            None => Ok(()),
            Some(reason) if self.options.validate_names => Err(SchemaError::InvalidName {
                name: name.to_string(),
                reason: format!("{} {}", context, reason),
            }),
            Some(reason) => {
                warn!(name, context, %reason, "Invalid name accepted");
                Ok(())
            }
        }
    }

    /// Check a field default against its schema, normalizing string-encoded
    /// float and double defaults to numbers.
    fn check_default(
        &self,
        field: &str,
        default: &Value,
        schema: SchemaId,
    ) -> Result<Value, SchemaError> {
        match self.conform_default(default, schema) {
            Ok(value) => Ok(value),
            Err(reason) if self.options.validate_defaults => Err(SchemaError::InvalidDefault {
                field: field.to_string(),
                reason,
            }),
            Err(reason) => {
                warn!(field, %reason, "Invalid default accepted");
                Ok(default.clone())
            }
        }
    }

    fn conform_default(&self, value: &Value, schema: SchemaId) -> Result<Value, String> {
        let kind = self.builder.kind(schema).map_err(|e| e.to_string())?;
        let mismatch = || format!("{} is not a valid {}", value, kind.schema_type());
        match (kind, value) {
            (SchemaKind::Null, Value::Null) => Ok(Value::Null),
            (SchemaKind::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (SchemaKind::Int, Value::Number(n)) => match n.as_i64() {
                Some(v) if i32::try_from(v).is_ok() => Ok(value.clone()),
                _ => Err(mismatch()),
            },
            (SchemaKind::Long, Value::Number(n)) if n.as_i64().is_some() => Ok(value.clone()),
            (SchemaKind::Float | SchemaKind::Double, Value::Number(_)) => Ok(value.clone()),
            (SchemaKind::Float | SchemaKind::Double, Value::String(s)) => {
                match s.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() => {
                        Number::from_f64(v).map(Value::Number).ok_or_else(mismatch)
                    }
                    Ok(_) => Ok(value.clone()),
                    Err(_) if matches!(s.as_str(), "NaN" | "Infinity" | "-Infinity") => {
                        Ok(value.clone())
                    }
                    Err(_) => Err(mismatch()),
                }
            }
            (SchemaKind::Bytes | SchemaKind::String, Value::String(_)) => Ok(value.clone()),
            (SchemaKind::Fixed(fixed), Value::String(s)) => {
                if s.chars().count() == fixed.size {
                    Ok(value.clone())
                } else {
                    Err(format!(
                        "fixed default has {} bytes, expected {}",
                        s.chars().count(),
                        fixed.size
                    ))
                }
            }
            (SchemaKind::Enum(e), Value::String(s)) => {
                if e.symbol_index(s).is_some() {
                    Ok(value.clone())
                } else {
                    Err(format!("'{}' is not a symbol of {}", s, e.name))
                }
            }
            (SchemaKind::Array(items), Value::Array(values)) => {
                let items = *items;
                values
                    .iter()
                    .map(|v| self.conform_default(v, items))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            (SchemaKind::Map(values_schema), Value::Object(entries)) => {
                let values_schema = *values_schema;
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.conform_default(v, values_schema)?)))
                    .collect::<Result<Map<_, _>, String>>()
                    .map(Value::Object)
            }
            (SchemaKind::Record(record), Value::Object(entries)) => {
                // a record still being defined cannot be checked yet
                if !record.has_fields() {
                    return Ok(value.clone());
                }
                let mut out = entries.clone();
                for field in record.fields() {
                    match entries.get(&field.name) {
                        Some(v) => {
                            out.insert(field.name.clone(), self.conform_default(v, field.schema)?);
                        }
                        None if field.default.is_some() => {}
                        None => {
                            return Err(format!(
                                "missing field '{}' of record {}",
                                field.name, record.name
                            ))
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            (SchemaKind::Union(union), _) => union
                .branches
                .iter()
                .find_map(|&b| self.conform_default(value, b).ok())
                .ok_or_else(|| format!("{} matches no branch of the union", value)),
            _ => Err(mismatch()),
        }
    }
}

fn string_list(value: Option<&Value>, what: &str) -> Result<Vec<String>, SchemaError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    SchemaError::ParseError(format!("'{}' entries must be strings", what))
                })
            })
            .collect(),
        Some(other) => Err(SchemaError::ParseError(format!(
            "'{}' must be an array of strings, found {}",
            what, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_primitives() {
        for name in ["null", "boolean", "int", "long", "float", "double", "bytes", "string"] {
            let schema = parse_schema(&format!("\"{}\"", name)).unwrap();
            assert_eq!(schema.full_name(), name);
        }
        let schema = parse_schema(r#"{"type":"long"}"#).unwrap();
        assert_eq!(schema.schema_type(), SchemaType::Long);
    }

    #[test]
    fn test_namespace_scoping() {
        let schema = parse_schema(
            r#"{"type":"record","name":"Outer","namespace":"a.b","fields":[
                {"name":"inner","type":{"type":"record","name":"Inner","fields":[
                    {"name":"x","type":{"type":"enum","name":"E","namespace":"c","symbols":["A"]}},
                    {"name":"y","type":{"type":"fixed","name":"F","size":1}}
                ]}},
                {"name":"again","type":"Inner"},
                {"name":"e","type":"c.E"}
            ]}"#,
        )
        .unwrap();
        let inner = schema.field_schema(schema.field("inner").unwrap());
        assert_eq!(inner.full_name(), "a.b.Inner");
        let x = inner.field_schema(inner.field("x").unwrap());
        assert_eq!(x.full_name(), "c.E");
        let y = inner.field_schema(inner.field("y").unwrap());
        assert_eq!(y.full_name(), "a.b.F");
        let again = schema.field_schema(schema.field("again").unwrap());
        assert!(again.same_node(&inner));
    }

    #[test]
    fn test_namespace_restored_after_error() {
        let options = ParseOptions::default();
        let known = HashMap::new();
        let mut session = Session {
            builder: SchemaBuilder::new(),
            namespace: Some("outer".to_string()),
            options: &options,
            known: &known,
        };
        let bad = json!({"type":"record","name":"R","namespace":"inner","fields":[
            {"name":"f","type":"Missing"}
        ]});
        assert!(session.parse(&bad).is_err());
        assert_eq!(session.namespace.as_deref(), Some("outer"));
    }

    #[test]
    fn test_nested_type_wrapper() {
        let schema = parse_schema(r#"{"type":{"type":"array","items":"int"}}"#).unwrap();
        assert_eq!(schema.schema_type(), SchemaType::Array);

        for doc in [
            r#"{"type":{"type":"bytes"},"logicalType":"decimal","precision":4}"#,
            r#"{"type":["null","int"],"x":1}"#,
        ] {
            let err = parse_schema(doc).unwrap_err();
            assert!(matches!(err, SchemaError::ParseError(_)), "{}", doc);
        }
    }

    #[test]
    fn test_undefined_name() {
        let err = parse_schema(r#"{"type":"array","items":"Nope"}"#).unwrap_err();
        assert!(matches!(err, SchemaError::UndefinedName(n) if n == "Nope"));
    }

    #[test]
    fn test_missing_required_attributes() {
        assert!(parse_schema(r#"{"type":"record","name":"R"}"#).is_err());
        assert!(parse_schema(r#"{"type":"enum","name":"E"}"#).is_err());
        assert!(parse_schema(r#"{"type":"fixed","name":"F"}"#).is_err());
        assert!(parse_schema(r#"{"type":"array"}"#).is_err());
        assert!(parse_schema("{").is_err());
    }

    #[test]
    fn test_enum_fallback_symbol() {
        let schema =
            parse_schema(r#"{"type":"enum","name":"E","symbols":["A","B"],"fallbackSymbol":"B"}"#)
                .unwrap();
        match schema.kind() {
            SchemaKind::Enum(e) => assert_eq!(e.default.as_deref(), Some("B")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(
            parse_schema(r#"{"type":"enum","name":"E","symbols":["A"],"default":"Z"}"#).is_err()
        );
    }

    #[test]
    fn test_enum_symbol_aliases() {
        let schema = parse_schema(
            r#"{"type":"enum","name":"E","symbols":["X","A"],"symbolAliases":{"X":["B"]}}"#,
        )
        .unwrap();
        match schema.kind() {
            SchemaKind::Enum(e) => assert_eq!(e.resolve_symbol("B"), Some(0)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_union_validation() {
        assert!(matches!(
            parse_schema(r#"["int","int"]"#),
            Err(SchemaError::InvalidUnion(_))
        ));
        assert!(matches!(
            parse_schema(r#"["int",["string"]]"#),
            Err(SchemaError::InvalidUnion(_))
        ));
    }

    #[test]
    fn test_name_validation_modes() {
        let doc = r#"{"type":"record","name":"1bad","fields":[]}"#;
        assert!(matches!(
            parse_schema(doc),
            Err(SchemaError::InvalidName { .. })
        ));
        let permissive = ParseOptions::default().with_validate_names(false);
        assert!(parse_schema_with_options(doc, &permissive).is_ok());
    }

    #[test]
    fn test_default_validation_modes() {
        let doc = r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int","default":"x"}]}"#;
        assert!(matches!(
            parse_schema(doc),
            Err(SchemaError::InvalidDefault { .. })
        ));
        let lenient = ParseOptions::default().with_validate_defaults(false);
        let schema = parse_schema_with_options(doc, &lenient).unwrap();
        assert_eq!(schema.fields()[0].default, Some(json!("x")));
    }

    #[test]
    fn test_string_float_default_converted() {
        let schema = parse_schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"d","type":"double","default":"1.5"},
                {"name":"n","type":"float","default":"NaN"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(schema.fields()[0].default.as_ref().unwrap().as_f64(), Some(1.5));
        assert_eq!(schema.fields()[1].default, Some(json!("NaN")));
    }

    #[test]
    fn test_union_default_any_branch() {
        let schema = parse_schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"u","type":["null","string"],"default":"x"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(schema.fields()[0].default, Some(json!("x")));
    }

    #[test]
    fn test_field_properties_preserved() {
        let schema = parse_schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"a","type":"int","order":"descending","aliases":["b"],"x-pii":true}
            ]}"#,
        )
        .unwrap();
        let field = &schema.fields()[0];
        assert_eq!(field.order, FieldOrder::Descending);
        assert_eq!(field.aliases, vec!["b".to_string()]);
        assert_eq!(field.props.get("x-pii"), Some(&json!(true)));
    }

    #[test]
    fn test_undefined_logical_type() {
        let doc = r#"{"type":"string","logicalType":"made-up"}"#;
        assert!(matches!(
            parse_schema(doc),
            Err(SchemaError::UndefinedLogicalType(_))
        ));
        let options = ParseOptions::default().with_allow_undefined_logical_types(true);
        let schema = parse_schema_with_options(doc, &options).unwrap();
        assert!(schema.logical_type().is_none());
        assert_eq!(schema.prop("logicalType"), Some(&json!("made-up")));
    }

    #[test]
    fn test_parser_remembers_types() {
        let mut parser = SchemaParser::new();
        parser
            .parse(r#"{"type":"fixed","name":"ns.Hash","size":4}"#)
            .unwrap();
        let schema = parser
            .parse(r#"{"type":"array","items":"ns.Hash"}"#)
            .unwrap();
        assert_eq!(schema.items().unwrap().full_name(), "ns.Hash");
        assert!(parser.known_types().contains_key("ns.Hash"));
    }
}
