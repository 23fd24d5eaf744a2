// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Emitted rows and the type-map cache.

use serde_json::Value;
use std::collections::BTreeMap;

/// A single row queued by `emit_row`, bound for a named table.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedRow {
    pub table: String,
    pub fields: BTreeMap<String, Value>,
}

impl EmittedRow {
    pub fn new(table: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Self { table: table.into(), fields }
    }
}

/// Coarse column type, inferred from a sample row. Deliberately structural,
/// not a full schema language — just enough to reject obviously mismatched
/// rows before they reach the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnType {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Array,
    Object,
}

fn infer(value: &Value) -> ColumnType {
    match value {
        Value::Null => ColumnType::Null,
        Value::Bool(_) => ColumnType::Bool,
        Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
        Value::Number(_) => ColumnType::Float,
        Value::String(_) => ColumnType::String,
        Value::Array(_) => ColumnType::Array,
        Value::Object(_) => ColumnType::Object,
    }
}

/// The inferred column-type tree for one table, built from the first
/// sample row `declare_table`/the first successful insert ever saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTree {
    columns: BTreeMap<String, ColumnType>,
}

impl TypeTree {
    pub fn from_sample(fields: &BTreeMap<String, Value>) -> Self {
        Self { columns: fields.iter().map(|(k, v)| (k.clone(), infer(v))).collect() }
    }

    /// Every row that passes `insert` must have a type tree compatible
    /// with the first successfully-inserted row. A `Null` value is
    /// compatible with any previously-seen type (optional fields), and a
    /// column absent from `row` is always compatible.
    pub fn is_compatible(&self, fields: &BTreeMap<String, Value>) -> bool {
        fields.iter().all(|(key, value)| match self.columns.get(key) {
            None => true,
            Some(expected) => {
                let actual = infer(value);
                actual == ColumnType::Null || actual == *expected
            }
        })
    }
}

/// In-process cache of `table_name -> TypeTree`, guarded by a
/// writer-priority reader/writer lock.
#[derive(Default)]
pub struct TypeMapCache {
    inner: parking_lot::RwLock<BTreeMap<String, TypeTree>>,
}

impl TypeMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register, idempotently) the type tree for a table.
    pub fn declare(&self, table: &str, fields: &BTreeMap<String, Value>) {
        self.inner.write().entry(table.to_string()).or_insert_with(|| TypeTree::from_sample(fields));
    }

    /// Returns `true` if `fields` is compatible with the table's recorded
    /// type tree, declaring one from `fields` if the table is unseen.
    pub fn check_and_learn(&self, table: &str, fields: &BTreeMap<String, Value>) -> bool {
        {
            let guard = self.inner.read();
            if let Some(tree) = guard.get(table) {
                return tree.is_compatible(fields);
            }
        }
        self.declare(table, fields);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(n: i64) -> BTreeMap<String, Value> {
        BTreeMap::from([("x".to_string(), json!(n))])
    }

    #[test]
    fn compatible_row_passes() {
        let tree = TypeTree::from_sample(&row(1));
        assert!(tree.is_compatible(&row(42)));
    }

    #[test]
    fn mismatched_type_is_rejected() {
        let tree = TypeTree::from_sample(&row(1));
        let mismatched = BTreeMap::from([("x".to_string(), json!("one"))]);
        assert!(!tree.is_compatible(&mismatched));
    }

    #[test]
    fn cache_learns_first_row_then_enforces() {
        let cache = TypeMapCache::new();
        assert!(cache.check_and_learn("t", &row(1)));
        assert!(cache.check_and_learn("t", &row(2)));
        let mismatched = BTreeMap::from([("x".to_string(), json!("one"))]);
        assert!(!cache.check_and_learn("t", &mismatched));
    }

    #[test]
    fn null_value_is_always_compatible() {
        let tree = TypeTree::from_sample(&row(1));
        let with_null = BTreeMap::from([("x".to_string(), Value::Null)]);
        assert!(tree.is_compatible(&with_null));
    }
}
