//! The in-memory document built from one record.

use std::collections::BTreeMap;

use crate::error::{ImitatorError, Result};
use crate::naming::canonical_name;
use crate::value::Value;

/// Generic key-value document representing one record.
///
/// Column values live in `fields`. Loaded relations are kept apart from the
/// columns, keyed by their canonical name (see
/// [`canonical_name`](crate::naming::canonical_name)), so that a clause
/// naming `Subjects`, `subject` or `Subject` resolves to the same entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    fields: BTreeMap<String, Value>,
    relations: BTreeMap<String, Model>,
    back_relations: BTreeMap<String, Model>,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column value.
    pub fn with_field(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_field(column, value);
        self
    }

    /// Adds a forward relation under the canonical form of `name`.
    pub fn with_relation(mut self, name: &str, model: Model) -> Self {
        self.insert_relation(name, model);
        self
    }

    /// Adds a back relation under the canonical form of `name`.
    pub fn with_back_relation(mut self, name: &str, model: Model) -> Self {
        self.insert_back_relation(name, model);
        self
    }

    pub fn insert_field(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn insert_relation(&mut self, name: &str, model: Model) {
        self.relations.insert(canonical_name(name), model);
    }

    pub fn insert_back_relation(&mut self, name: &str, model: Model) {
        self.back_relations.insert(canonical_name(name), model);
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn relations(&self) -> &BTreeMap<String, Model> {
        &self.relations
    }

    pub fn back_relations(&self) -> &BTreeMap<String, Model> {
        &self.back_relations
    }

    /// Looks up a loaded relation by raw or canonical name.
    ///
    /// Forward relations are consulted before back relations.
    pub fn relation(&self, name: &str) -> Option<&Model> {
        let key = canonical_name(name);
        self.relations
            .get(&key)
            .or_else(|| self.back_relations.get(&key))
    }

    /// Resolves `[table.]column` to a value.
    ///
    /// A table of `None`, `""`, `"*"` or `"-"` addresses this model's own
    /// columns. Any other table is looked up as a relation.
    pub fn get(&self, table: Option<&str>, column: &str) -> Option<&Value> {
        match table {
            None | Some("") | Some("*") | Some("-") => self.fields.get(column),
            Some(name) => self.relation(name)?.fields.get(column),
        }
    }

    /// Like [`get`](Self::get), but a missing field is an error.
    pub fn lookup(&self, table: Option<&str>, column: &str) -> Result<&Value> {
        self.get(table, column)
            .ok_or_else(|| ImitatorError::field_not_found(table, column))
    }
}
