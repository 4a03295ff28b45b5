//! `__negIdx`: the side table backing nonpositive integer indices on lists.
//!
//! Wenyan indices are 1-based; `get`/`set`/`del` on a nonpositive integer
//! index go through this table instead of the list's own storage, keyed by
//! the list's identity (its `Rc` pointer) and the raw index. This is never
//! cleared on list mutation — not obviously correct, but the reference
//! implementation does exactly this and programs observably depend on it
//! (§9 "Negative-index side table... is a quirk, not obviously a bug").

use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct NegIndex {
    table: HashMap<(usize, i64), Value>,
}

impl NegIndex {
    pub fn new() -> Self {
        NegIndex::default()
    }

    pub fn get(&self, identity: usize, index: i64) -> Value {
        self.table
            .get(&(identity, index))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set(&mut self, identity: usize, index: i64, value: Value) {
        self.table.insert((identity, index), value);
    }

    pub fn delete(&mut self, identity: usize, index: i64) {
        self.table.remove(&(identity, index));
    }
}
