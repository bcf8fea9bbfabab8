//! Structural schema equality and hashing.
//!
//! Two schemas are equal when they have the same variant, the same
//! properties, the same full name for named types and structurally equal
//! children. Record comparison remembers every pair of nodes it has entered,
//! so self-referential records terminate: a pair met again while it is still
//! being compared is assumed equal.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use super::types::{Field, Properties, Schema, SchemaId, SchemaKind};

type NodeKey = (usize, SchemaId);

/// Recursion guard for one top-level comparison. It is dropped when the
/// comparison returns, whatever the outcome.
#[derive(Debug, Default)]
pub struct EqualityContext {
    seen: HashSet<(NodeKey, NodeKey)>,
}

impl EqualityContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare two schemas.
    pub fn equals(&mut self, a: &Schema, b: &Schema) -> bool {
        if a.same_node(b) {
            return true;
        }
        let (left, right) = (a.kind(), b.kind());
        if left.schema_type() != right.schema_type() || a.props() != b.props() {
            return false;
        }
        match (left, right) {
            (SchemaKind::Record(x), SchemaKind::Record(y)) => {
                if x.name != y.name {
                    return false;
                }
                if !self.seen.insert((a.identity(), b.identity())) {
                    return true;
                }
                let (fx, fy) = (x.fields(), y.fields());
                fx.len() == fy.len()
                    && fx
                        .iter()
                        .zip(fy)
                        .all(|(f, g)| self.fields_equal(a, f, b, g))
            }
            (SchemaKind::Enum(x), SchemaKind::Enum(y)) => {
                x.name == y.name
                    && x.symbols == y.symbols
                    && x.default == y.default
                    && x.symbol_aliases == y.symbol_aliases
            }
            (SchemaKind::Fixed(x), SchemaKind::Fixed(y)) => x.name == y.name && x.size == y.size,
            (SchemaKind::Array(x), SchemaKind::Array(y))
            | (SchemaKind::Map(x), SchemaKind::Map(y)) => self.equals(&a.at(*x), &b.at(*y)),
            (SchemaKind::Union(x), SchemaKind::Union(y)) => {
                x.branches.len() == y.branches.len()
                    && x
                        .branches
                        .iter()
                        .zip(&y.branches)
                        .all(|(&p, &q)| self.equals(&a.at(p), &b.at(q)))
            }
            _ => true,
        }
    }

    fn fields_equal(&mut self, a: &Schema, f: &Field, b: &Schema, g: &Field) -> bool {
        f.name == g.name
            && f.order == g.order
            && f.default == g.default
            && f.props == g.props
            && self.equals(&a.at(f.schema), &b.at(g.schema))
    }
}

/// Cached structural hash of a schema, consistent with equality.
///
/// A record contributes its full name and its fields' names and properties
/// but not the field schemas, so hashing never follows a cycle.
pub fn schema_hash(schema: &Schema) -> u64 {
    *schema.node().hash.get_or_init(|| compute_hash(schema))
}

fn hash_props(props: &Properties, state: &mut DefaultHasher) {
    for (key, value) in props {
        key.hash(state);
        value.to_string().hash(state);
    }
}

fn compute_hash(schema: &Schema) -> u64 {
    let mut state = DefaultHasher::new();
    let kind = schema.kind();
    kind.schema_type().hash(&mut state);
    hash_props(schema.props(), &mut state);
    match kind {
        SchemaKind::Record(record) => {
            record.name.hash(&mut state);
            for field in record.fields() {
                field.name.hash(&mut state);
                hash_props(&field.props, &mut state);
            }
        }
        SchemaKind::Enum(e) => {
            e.name.hash(&mut state);
            e.symbols.hash(&mut state);
        }
        SchemaKind::Fixed(f) => {
            f.name.hash(&mut state);
            f.size.hash(&mut state);
        }
        SchemaKind::Array(child) | SchemaKind::Map(child) => {
            schema_hash(&schema.at(*child)).hash(&mut state);
        }
        SchemaKind::Union(union) => {
            for &branch in &union.branches {
                schema_hash(&schema.at(branch)).hash(&mut state);
            }
        }
        _ => {}
    }
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    const LIST: &str = r#"{"type":"record","name":"List","fields":[
        {"name":"value","type":"int"},
        {"name":"next","type":["null","List"]}
    ]}"#;

    #[test]
    fn test_self_referential_equality_terminates() {
        let a = parse_schema(LIST).unwrap();
        let b = parse_schema(LIST).unwrap();
        assert!(!a.same_node(&b));
        assert_eq!(a, a);
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_eq!(schema_hash(&a), schema_hash(&b));
    }

    #[test]
    fn test_mutually_recursive_records() {
        let doc = r#"{"type":"record","name":"A","fields":[
            {"name":"b","type":{"type":"record","name":"B","fields":[
                {"name":"a","type":["null","A"]}
            ]}}
        ]}"#;
        let a = parse_schema(doc).unwrap();
        let b = parse_schema(doc).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_differences_detected() {
        let base = parse_schema(LIST).unwrap();
        let renamed = parse_schema(&LIST.replace("\"value\"", "\"val\"")).unwrap();
        let retyped = parse_schema(&LIST.replace("\"int\"", "\"long\"")).unwrap();
        assert_ne!(base, renamed);
        assert_ne!(base, retyped);
        assert_ne!(schema_hash(&base), schema_hash(&renamed));
    }

    #[test]
    fn test_props_participate() {
        let a = parse_schema(r#"{"type":"string","k":"v"}"#).unwrap();
        let b = parse_schema(r#"{"type":"string","k":"w"}"#).unwrap();
        let c = parse_schema(r#""string""#).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(c, parse_schema(r#"{"type":"string"}"#).unwrap());
    }

    #[test]
    fn test_hash_usable_in_sets() {
        let mut set = HashSet::new();
        set.insert(parse_schema(LIST).unwrap());
        set.insert(parse_schema(LIST).unwrap());
        set.insert(parse_schema(r#"["null","int"]"#).unwrap());
        assert_eq!(set.len(), 2);
    }
}
