//! The stack machine that walks a grammar.

use std::sync::Arc;

use crate::error::GrammarError;

use super::symbol::Symbol;
use super::Grammar;

/// Parser state: a stack of symbols still to be processed, top last.
///
/// A parser belongs to exactly one encoder or decoder. When a value is
/// complete the stack is empty and the next request starts a new value
/// from the root.
#[derive(Debug)]
pub struct Parser {
    grammar: Arc<Grammar>,
    stack: Vec<Symbol>,
}

impl Parser {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        let stack = vec![grammar.root.clone()];
        Self { grammar, stack }
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Expand non-terminals on top of the stack and return the first action
    /// or terminal. Starts a new value if the previous one is complete.
    pub fn next(&mut self) -> Result<Symbol, GrammarError> {
        if self.stack.is_empty() {
            self.stack.push(self.grammar.root.clone());
        }
        loop {
            let top = match self.stack.last() {
                Some(top) => top,
                None => {
                    return Err(GrammarError::InvalidState(
                        "grammar stack is empty".to_string(),
                    ))
                }
            };
            match top {
                Symbol::Seq(items) => {
                    let items = Arc::clone(items);
                    self.stack.pop();
                    self.stack.extend(items.iter().rev().cloned());
                }
                Symbol::Rule(id) => {
                    let id = *id;
                    let rule = self.grammar.rules.get(id).cloned().ok_or_else(|| {
                        GrammarError::InvalidState(format!("unknown rule {}", id))
                    })?;
                    self.stack.pop();
                    self.stack.push(rule);
                }
                // the repeater stays below its body until the codec ends
                // the sequence
                Symbol::Repeater(body) => {
                    let body = (**body).clone();
                    self.stack.push(body);
                }
                other => return Ok(other.clone()),
            }
        }
    }

    /// The top symbol without expanding it.
    pub fn peek_raw(&self) -> Option<&Symbol> {
        self.stack.last()
    }

    /// Remove the top symbol without expanding it.
    pub fn pop(&mut self) -> Option<Symbol> {
        self.stack.pop()
    }

    pub fn push(&mut self, symbol: Symbol) {
        self.stack.push(symbol);
    }

    /// Pop the top symbol, which must be the terminal just returned by
    /// [`next`](Self::next).
    pub fn consume(&mut self) {
        self.stack.pop();
    }

    /// End an array or map: remove the repeater left on the stack.
    pub fn end_repeat(&mut self) -> Result<(), GrammarError> {
        match self.stack.pop() {
            Some(Symbol::Repeater(_)) => Ok(()),
            Some(other) => {
                let found = other.describe().to_string();
                self.stack.push(other);
                Err(GrammarError::Mismatch {
                    expected: "end of items".to_string(),
                    found,
                })
            }
            None => Err(GrammarError::InvalidState(
                "no array or map in progress".to_string(),
            )),
        }
    }

    /// Whether the current value is complete.
    pub fn is_done(&self) -> bool {
        self.stack.is_empty()
    }

    /// Drop any partial value.
    pub fn reset(&mut self) {
        self.stack.clear();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Error for a codec asking for `expected` where the grammar has `found`.
pub(crate) fn mismatch(expected: &str, found: &Symbol) -> GrammarError {
    match found {
        Symbol::Error(msg) => GrammarError::Resolution(msg.to_string()),
        other => GrammarError::Mismatch {
            expected: expected.to_string(),
            found: other.describe().to_string(),
        },
    }
}
