//! Schema → grammar generation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::schema::{
    find_reader_branch, match_writer_field, names_match, Schema, SchemaId, SchemaKind,
    TypePromotion,
};

use super::symbol::{DefaultValue, EnumAdjust, FieldInfo, RecordLayout, Symbol, UnionInfo};
use super::Grammar;

type NodeKey = (usize, SchemaId);

pub(super) struct Generator {
    rules: Vec<Symbol>,
    records: HashMap<(NodeKey, NodeKey), usize>,
}

impl Generator {
    pub(super) fn generate(writer: &Schema, reader: &Schema) -> Grammar {
        let mut generator = Generator {
            rules: Vec::new(),
            records: HashMap::new(),
        };
        let root = generator.resolve(writer, reader);
        Grammar {
            rules: generator.rules,
            root,
        }
    }

    fn resolve(&mut self, writer: &Schema, reader: &Schema) -> Symbol {
        if let SchemaKind::Union(_) = writer.kind() {
            return self.writer_union(writer, reader);
        }
        if let SchemaKind::Union(_) = reader.kind() {
            return self.reader_branch(writer, reader);
        }

        match (writer.kind(), reader.kind()) {
            (SchemaKind::Null, SchemaKind::Null) => Symbol::Null,
            (SchemaKind::Boolean, SchemaKind::Boolean) => Symbol::Boolean,
            (SchemaKind::Int, SchemaKind::Int) => Symbol::Int,
            (SchemaKind::Long, SchemaKind::Long) => Symbol::Long,
            (SchemaKind::Float, SchemaKind::Float) => Symbol::Float,
            (SchemaKind::Double, SchemaKind::Double) => Symbol::Double,
            (SchemaKind::Bytes, SchemaKind::Bytes) => Symbol::Bytes,
            (SchemaKind::String, SchemaKind::String) => Symbol::String,
            (SchemaKind::Fixed(w), SchemaKind::Fixed(r)) => {
                if !names_match(writer, reader) {
                    mismatch(writer, reader)
                } else if w.size != r.size {
                    Symbol::error(format!(
                        "Fixed '{}' has size {} but reader expects {}",
                        w.name, w.size, r.size
                    ))
                } else {
                    Symbol::Fixed(w.size)
                }
            }
            (SchemaKind::Enum(_), SchemaKind::Enum(_)) if names_match(writer, reader) => {
                enum_adjust(writer, reader)
            }
            (SchemaKind::Array(w), SchemaKind::Array(r)) => {
                let items = self.resolve(&writer.at(*w), &reader.at(*r));
                Symbol::seq(vec![
                    Symbol::ArrayStart,
                    Symbol::Repeater(Arc::new(items)),
                    Symbol::ArrayEnd,
                ])
            }
            (SchemaKind::Map(w), SchemaKind::Map(r)) => {
                let values = self.resolve(&writer.at(*w), &reader.at(*r));
                Symbol::seq(vec![
                    Symbol::MapStart,
                    Symbol::Repeater(Arc::new(Symbol::seq(vec![Symbol::MapKey, values]))),
                    Symbol::MapEnd,
                ])
            }
            (SchemaKind::Record(_), SchemaKind::Record(_)) if names_match(writer, reader) => {
                self.record(writer, reader)
            }
            _ => match TypePromotion::between(writer.schema_type(), reader.schema_type()) {
                Some(promotion) => Symbol::Promote(promotion),
                None => mismatch(writer, reader),
            },
        }
    }

    /// A writer union: every writer branch resolves on its own, so a branch
    /// the reader cannot take fails only if the data uses it.
    fn writer_union(&mut self, writer: &Schema, reader: &Schema) -> Symbol {
        let writer_branches = writer.branches();
        let branches = writer_branches
            .iter()
            .map(|branch| match reader.kind() {
                SchemaKind::Union(_) => self.reader_branch(branch, reader),
                _ => self.resolve(branch, reader),
            })
            .collect();
        let labels = writer_branches
            .iter()
            .map(|branch| {
                let mut names = vec![branch.full_name()];
                names.extend(branch.kind().aliases().iter().cloned());
                names
            })
            .collect();
        Symbol::WriterUnion(Arc::new(UnionInfo {
            branches,
            labels,
            null_index: writer.null_branch(),
            compact: writer.compact_union_branch(),
            name: writer.to_json(),
        }))
    }

    /// A non-union writer read as a reader union.
    fn reader_branch(&mut self, writer: &Schema, reader: &Schema) -> Symbol {
        match find_reader_branch(writer, reader) {
            Some(index) => {
                let branch = &reader.branches()[index];
                Symbol::UnionAdjust(index, Arc::new(self.resolve(writer, branch)))
            }
            None => Symbol::error(format!(
                "Writer {} matches no branch of reader union {}",
                writer.full_name(),
                reader
            )),
        }
    }

    fn record(&mut self, writer: &Schema, reader: &Schema) -> Symbol {
        let key = (writer.identity(), reader.identity());
        if let Some(&id) = self.records.get(&key) {
            return Symbol::Rule(id);
        }
        // reserve the rule first so recursive references resolve to it
        let id = self.rules.len();
        self.rules.push(Symbol::seq(Vec::new()));
        self.records.insert(key, id);

        let writer_fields = writer.fields();
        let mut writer_used = vec![false; writer_fields.len()];
        let mut known_keys = HashSet::new();
        for field in writer_fields.iter().chain(reader.fields()) {
            known_keys.insert(field.name.clone());
            known_keys.extend(field.aliases.iter().cloned());
        }

        let mut body = Vec::with_capacity(reader.fields().len() * 3 + 2);
        body.push(Symbol::RecordEnd); // replaced by RecordStart below
        for reader_field in reader.fields() {
            let reader_schema = reader.field_schema(reader_field);
            match match_writer_field(reader_field, writer_fields) {
                Some(writer_field) => {
                    writer_used[writer_field.position] = true;
                    let writer_schema = writer.field_schema(writer_field);
                    let value = self.resolve(&writer_schema, &reader_schema);
                    let mut keys = vec![reader_field.name.clone()];
                    for key in reader_field
                        .aliases
                        .iter()
                        .chain(std::iter::once(&writer_field.name))
                        .chain(writer_field.aliases.iter())
                    {
                        if !keys.contains(key) {
                            keys.push(key.clone());
                        }
                    }
                    let default = writer_field
                        .default
                        .as_ref()
                        .and_then(|d| DefaultValue::new(d, &writer_schema, &writer_field.name));
                    body.push(Symbol::Field(Arc::new(FieldInfo {
                        name: reader_field.name.clone(),
                        keys,
                        writer_position: Some(writer_field.position),
                        default,
                    })));
                    body.push(value);
                    body.push(Symbol::FieldEnd);
                }
                None => {
                    let default = reader_field
                        .default
                        .as_ref()
                        .and_then(|d| DefaultValue::new(d, &reader_schema, &reader_field.name));
                    match default {
                        Some(default) => {
                            let value = self.resolve(&reader_schema, &reader_schema);
                            body.push(Symbol::Field(Arc::new(FieldInfo {
                                name: reader_field.name.clone(),
                                keys: vec![reader_field.name.clone()],
                                writer_position: None,
                                default: Some(default),
                            })));
                            body.push(value);
                            body.push(Symbol::FieldEnd);
                        }
                        None => body.push(Symbol::error(format!(
                            "Reader field '{}' of '{}' is missing from the writer and has no default",
                            reader_field.name,
                            reader.full_name()
                        ))),
                    }
                }
            }
        }
        body.push(Symbol::RecordEnd);
        body[0] = Symbol::RecordStart(Arc::new(RecordLayout {
            name: reader.full_name(),
            writer: writer.clone(),
            writer_used,
            known_keys,
        }));

        self.rules[id] = Symbol::seq(body);
        Symbol::Rule(id)
    }
}

fn mismatch(writer: &Schema, reader: &Schema) -> Symbol {
    Symbol::error(format!(
        "Cannot read writer {} as reader {}",
        writer.full_name(),
        reader.full_name()
    ))
}

/// Map each writer symbol to a reader index: by name, then by the reader's
/// symbol synonyms, then by the writer's, then the reader default.
fn enum_adjust(writer: &Schema, reader: &Schema) -> Symbol {
    let (SchemaKind::Enum(w), SchemaKind::Enum(r)) = (writer.kind(), reader.kind()) else {
        return mismatch(writer, reader);
    };
    let default = r.default.as_deref().and_then(|d| r.symbol_index(d));
    let mapping = w
        .symbols
        .iter()
        .map(|symbol| {
            r.resolve_symbol(symbol)
                .or_else(|| w.synonyms(symbol).iter().find_map(|s| r.symbol_index(s)))
                .or(default)
                .ok_or_else(|| symbol.clone())
        })
        .collect();
    Symbol::Enum(Arc::new(EnumAdjust {
        writer: writer.clone(),
        writer_symbols: w.symbols.clone(),
        reader_symbols: r.symbols.clone(),
        mapping,
        reader_name: r.name.fullname(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    fn generate(writer: &str, reader: &str) -> Grammar {
        Generator::generate(&parse_schema(writer).unwrap(), &parse_schema(reader).unwrap())
    }

    #[test]
    fn test_recursive_record_is_finite() {
        let schema = r#"{"type":"record","name":"Node","fields":[
            {"name":"value","type":"int"},
            {"name":"next","type":["null","Node"]}
        ]}"#;
        let grammar = generate(schema, schema);
        assert_eq!(grammar.rules.len(), 1);
        assert!(matches!(grammar.root, Symbol::Rule(0)));
    }

    #[test]
    fn test_promotion_and_mismatch() {
        let grammar = generate(r#""int""#, r#""double""#);
        assert!(matches!(
            grammar.root,
            Symbol::Promote(TypePromotion::IntToDouble)
        ));
        let grammar = generate(r#""string""#, r#""int""#);
        assert!(matches!(grammar.root, Symbol::Error(_)));
    }

    #[test]
    fn test_enum_mapping_uses_synonyms_and_default() {
        let grammar = generate(
            r#"{"type":"enum","name":"E","symbols":["A","B","C","Z"]}"#,
            r#"{"type":"enum","name":"E","symbols":["X","A","C"],"default":"A",
                "symbolAliases":{"X":["B"]}}"#,
        );
        let Symbol::Enum(adjust) = grammar.root else {
            panic!("expected enum");
        };
        assert_eq!(adjust.mapping, vec![Ok(1), Ok(0), Ok(2), Ok(1)]);
    }

    #[test]
    fn test_writer_union_branches_resolve_lazily() {
        let grammar = generate(r#"["null","string","boolean"]"#, r#"["string","null"]"#);
        let Symbol::WriterUnion(info) = grammar.root else {
            panic!("expected union");
        };
        assert!(matches!(info.branches[0], Symbol::UnionAdjust(1, _)));
        assert!(matches!(info.branches[1], Symbol::UnionAdjust(0, _)));
        assert!(matches!(info.branches[2], Symbol::Error(_)));
        assert_eq!(info.label(1), Some("string"));
    }

    #[test]
    fn test_record_follows_reader_order() {
        let grammar = generate(
            r#"{"type":"record","name":"R","fields":[
                {"name":"a","type":"int"},{"name":"b","type":"string"}]}"#,
            r#"{"type":"record","name":"R","fields":[
                {"name":"b","type":"string"},{"name":"a","type":"long"},
                {"name":"c","type":"int","default":7}]}"#,
        );
        let Some(Symbol::Seq(body)) = grammar.rules.first() else {
            panic!("expected record rule");
        };
        let fields: Vec<(String, Option<usize>)> = body
            .iter()
            .filter_map(|s| match s {
                Symbol::Field(info) => Some((info.name.clone(), info.writer_position)),
                _ => None,
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                ("b".to_string(), Some(1)),
                ("a".to_string(), Some(0)),
                ("c".to_string(), None)
            ]
        );
    }
}
