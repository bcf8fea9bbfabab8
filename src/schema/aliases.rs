//! Alias-based rewriting of writer schemas.
//!
//! A reader may rename named types and fields and declare the old names as
//! aliases. Before a resolving grammar is generated, the writer schema is
//! rewritten so that every writer name the reader knows under an alias
//! carries the reader's name instead. Data layout is untouched; the old name
//! is kept as an alias of the rewritten node so labels found on the wire
//! still match.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use super::types::{Name, Schema, SchemaArena, SchemaId, SchemaKind};

#[derive(Debug, Default)]
struct AliasTable {
    // writer full name -> reader name
    types: HashMap<String, Name>,
    // reader record full name -> (writer field name -> reader field name)
    fields: HashMap<String, HashMap<String, String>>,
}

impl AliasTable {
    fn collect(reader: &Schema) -> Self {
        let mut table = Self::default();
        let mut seen = HashSet::new();
        table.walk(reader, &mut seen);
        table
    }

    fn walk(&mut self, schema: &Schema, seen: &mut HashSet<SchemaId>) {
        if !seen.insert(schema.id()) {
            return;
        }
        let kind = schema.kind();
        if let Some(name) = kind.name() {
            for alias in kind.aliases() {
                self.types.insert(alias.clone(), name.clone());
            }
        }
        match kind {
            SchemaKind::Record(record) => {
                let renames: HashMap<String, String> = record
                    .fields()
                    .iter()
                    .flat_map(|f| f.aliases.iter().map(move |a| (a.clone(), f.name.clone())))
                    .collect();
                if !renames.is_empty() {
                    self.fields.insert(record.name.fullname(), renames);
                }
                for field in record.fields() {
                    self.walk(&schema.at(field.schema), seen);
                }
            }
            SchemaKind::Array(child) | SchemaKind::Map(child) => {
                self.walk(&schema.at(*child), seen)
            }
            SchemaKind::Union(union) => {
                for &branch in &union.branches {
                    self.walk(&schema.at(branch), seen);
                }
            }
            _ => {}
        }
    }

    fn is_empty(&self) -> bool {
        self.types.is_empty() && self.fields.is_empty()
    }
}

/// Rewrite `writer` so that names the reader declares as aliases become the
/// reader's names. Returns `writer` itself when nothing applies.
pub fn rewrite_writer_schema(writer: &Schema, reader: &Schema) -> Schema {
    let table = AliasTable::collect(reader);
    if table.is_empty() {
        return writer.clone();
    }

    let mut nodes = writer.arena.nodes.clone();
    let mut rewritten = HashSet::new();
    let mut changed = false;
    let mut pending = vec![writer.id()];

    while let Some(id) = pending.pop() {
        if !rewritten.insert(id) {
            continue;
        }
        let node = &mut nodes[id.index()];

        if let Some(target) = node.kind.name().and_then(|n| table.types.get(&n.fullname())) {
            let target = target.clone();
            let to = target.fullname();
            let from = rename(&mut node.kind, target);
            debug!(%from, %to, "Renamed writer type");
            changed = true;
        }

        match &mut node.kind {
            SchemaKind::Record(record) => {
                if let Some(renames) = table.fields.get(&record.name.fullname()) {
                    let mut touched = false;
                    if let Some(fields) = record.fields.as_mut() {
                        for field in fields.iter_mut() {
                            if let Some(new_name) = renames.get(&field.name) {
                                let old = std::mem::replace(&mut field.name, new_name.clone());
                                if !field.aliases.contains(&old) {
                                    field.aliases.push(old);
                                }
                                touched = true;
                            }
                        }
                    }
                    if touched {
                        record.lookup = record
                            .fields()
                            .iter()
                            .map(|f| (f.name.clone(), f.position))
                            .collect();
                        changed = true;
                    }
                }
                pending.extend(record.fields().iter().map(|f| f.schema));
            }
            SchemaKind::Array(child) | SchemaKind::Map(child) => pending.push(*child),
            SchemaKind::Union(union) => pending.extend(union.branches.iter().copied()),
            _ => {}
        }
    }

    if !changed {
        return writer.clone();
    }
    for node in &mut nodes {
        node.hash = OnceLock::new();
    }
    Schema {
        arena: Arc::new(SchemaArena { nodes }),
        id: writer.id(),
    }
}

/// Give a named type a new name, keeping the old one as an alias.
fn rename(kind: &mut SchemaKind, target: Name) -> String {
    let (name, aliases) = match kind {
        SchemaKind::Record(r) => (&mut r.name, &mut r.aliases),
        SchemaKind::Enum(e) => (&mut e.name, &mut e.aliases),
        SchemaKind::Fixed(f) => (&mut f.name, &mut f.aliases),
        _ => return String::new(),
    };
    let old = std::mem::replace(name, target).fullname();
    if !aliases.contains(&old) {
        aliases.push(old.clone());
    }
    old
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    #[test]
    fn test_no_aliases_is_noop() {
        let writer = parse_schema(r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int"}]}"#)
            .unwrap();
        let reader = writer.clone();
        assert!(rewrite_writer_schema(&writer, &reader).same_node(&writer));
    }

    #[test]
    fn test_renames_types_and_fields() {
        let writer = parse_schema(
            r#"{"type":"record","name":"old.Person","fields":[
                {"name":"fullName","type":"string"},
                {"name":"kind","type":{"type":"enum","name":"old.Kind","symbols":["A"]}}
            ]}"#,
        )
        .unwrap();
        let reader = parse_schema(
            r#"{"type":"record","name":"new.Person","aliases":["old.Person"],"fields":[
                {"name":"name","type":"string","aliases":["fullName"]},
                {"name":"kind","type":{"type":"enum","name":"Kind","aliases":["old.Kind"],"symbols":["A"]}}
            ]}"#,
        )
        .unwrap();
        let rewritten = rewrite_writer_schema(&writer, &reader);
        assert_eq!(rewritten.full_name(), "new.Person");
        assert_eq!(rewritten.kind().aliases(), &["old.Person".to_string()]);
        assert!(rewritten.field("name").is_some());
        assert!(rewritten.field("fullName").is_none());
        assert_eq!(rewritten.fields()[0].aliases, vec!["fullName".to_string()]);
        let kind = rewritten.field_schema(rewritten.field("kind").unwrap());
        assert_eq!(kind.full_name(), "new.Kind");
        // the writer is untouched
        assert_eq!(writer.full_name(), "old.Person");
    }

    #[test]
    fn test_recursive_writer_terminates() {
        let writer = parse_schema(
            r#"{"type":"record","name":"Old","fields":[{"name":"next","type":["null","Old"]}]}"#,
        )
        .unwrap();
        let reader = parse_schema(
            r#"{"type":"record","name":"New","aliases":["Old"],"fields":[{"name":"next","type":["null","New"]}]}"#,
        )
        .unwrap();
        let rewritten = rewrite_writer_schema(&writer, &reader);
        assert_eq!(rewritten.full_name(), "New");
        let branches = rewritten.field_schema(&rewritten.fields()[0]).branches();
        assert!(branches[1].same_node(&rewritten));
        assert_eq!(branches[1].full_name(), "New");
    }
}
