//! Schema-derived production grammars.
//!
//! Both wire formats are driven by the same automaton. A [`Grammar`] lists
//! the exact, ordered sequence of primitive operations a value of a schema
//! takes on the wire; a [`Parser`] is the stack machine that walks it one
//! terminal at a time. Codecs differ only in how they implement terminals
//! and actions.
//!
//! Reading with a reader schema that differs from the writer's is encoded in
//! the grammar itself: the resolving grammar follows the reader's field
//! order, and carries field-adjustment actions, type promotions, enum
//! mappings and union branch adjustments.

mod generator;
mod parser;
mod symbol;

use std::sync::Arc;

use tracing::debug;

use crate::schema::{rewrite_writer_schema, Schema};

pub use parser::Parser;
pub(crate) use parser::mismatch;
pub use symbol::{
    DefaultValue, EnumAdjust, FieldInfo, RecordLayout, RuleId, Symbol, UnionInfo,
};

use generator::Generator;

/// A production grammar: the root symbol plus the record rules it refers to.
///
/// Records are rules so that recursive schemas yield a finite grammar.
#[derive(Debug)]
pub struct Grammar {
    rules: Vec<Symbol>,
    root: Symbol,
}

impl Grammar {
    /// Grammar for writing, and for reading data written with the same
    /// schema.
    pub fn for_writing(schema: &Schema) -> Arc<Grammar> {
        let grammar = Generator::generate(schema, schema);
        debug!(
            schema = %schema.full_name(),
            rules = grammar.rules.len(),
            "Generated grammar"
        );
        Arc::new(grammar)
    }

    /// Grammar for reading data written with `writer` as `reader`.
    ///
    /// The writer is first rewritten with the reader's aliases.
    pub fn resolving(writer: &Schema, reader: &Schema) -> Arc<Grammar> {
        let writer = rewrite_writer_schema(writer, reader);
        let grammar = Generator::generate(&writer, reader);
        debug!(
            writer = %writer.full_name(),
            reader = %reader.full_name(),
            rules = grammar.rules.len(),
            "Generated resolving grammar"
        );
        Arc::new(grammar)
    }

    pub fn root(&self) -> &Symbol {
        &self.root
    }

    pub fn rule(&self, id: RuleId) -> Option<&Symbol> {
        self.rules.get(id)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
