//! An in-memory repository double.
//!
//! [`DummyRepository`] stores records in a map keyed by their id column and
//! answers queries through the [`Evaluator`]. It stands in for a SQL-backed
//! repository in tests.
//!
//! ```
//! use standout_imitator::{DummyRepository, Expression, Operator, Record, Where};
//!
//! #[derive(Record, Clone, Debug)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let repo: DummyRepository<i64, User> = DummyRepository::new([
//!     User { id: 1, name: "Ann".into() },
//!     User { id: 2, name: "Bob".into() },
//! ])
//! .unwrap();
//!
//! let filter: Expression = Where::new("name", Operator::Eq, "Bob").into();
//! assert_eq!(repo.count(&[filter]).unwrap(), 1);
//! assert_eq!(repo.obtain_one(&1).unwrap().name, "Ann");
//! ```

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{ImitatorError, Result};
use crate::evaluate::Evaluator;
use crate::expression::Expression;
use crate::record::{merge, ColumnKind, Field, Record};
use crate::value::Value;

/// Column names tried, in order, by the default key extractor.
pub const ID_COLUMNS: [&str; 5] = ["id", "ID", "Id", "iD", "_id"];

type Hook<T> = Box<dyn Fn(&T) -> Result<()> + Send + Sync>;
type KeyExtractor<K, T> = Box<dyn Fn(&T) -> Result<K> + Send + Sync>;

struct Hooks<T> {
    before_create: Option<Hook<T>>,
    after_create: Option<Hook<T>>,
    before_create_or_update: Option<Hook<T>>,
    after_create_or_update: Option<Hook<T>>,
    before_update: Option<Hook<T>>,
    after_update: Option<Hook<T>>,
    before_delete: Option<Hook<T>>,
    after_delete: Option<Hook<T>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            before_create: None,
            after_create: None,
            before_create_or_update: None,
            after_create_or_update: None,
            before_update: None,
            after_update: None,
            before_delete: None,
            after_delete: None,
        }
    }
}

fn run_hook<T>(hook: &Option<Hook<T>>, record: &T) -> Result<()> {
    match hook {
        Some(hook) => hook(record),
        None => Ok(()),
    }
}

/// Extracts the key from the first id column present in the schema.
pub fn default_key<K: Field, T: Record>(record: &T) -> Result<K> {
    let schema = T::schema();
    let column = ID_COLUMNS
        .iter()
        .filter_map(|name| schema.column(name))
        .find(|column| column.kind() == ColumnKind::Field)
        .ok_or_else(|| {
            ImitatorError::KeyNotRecognized(format!("{} has no id column", schema.name()))
        })?;
    let value = column.read(record)?;
    K::from_value(value).map_err(|e| {
        ImitatorError::KeyNotRecognized(format!("{}.{}: {e}", schema.name(), column.name()))
    })
}

/// In-memory repository keyed by `K`.
///
/// The map sits behind an [`RwLock`]: queries share it, mutations take it
/// exclusively. Hooks run while the lock is held and must not call back
/// into the repository. Multi-record mutations stop at the first failing
/// record; earlier records stay applied.
pub struct DummyRepository<K, T> {
    entities: RwLock<BTreeMap<K, T>>,
    extractor: KeyExtractor<K, T>,
    evaluator: Evaluator,
    hooks: Hooks<T>,
}

impl<K, T> DummyRepository<K, T>
where
    K: Field + Ord + Clone + Debug + 'static,
    T: Record + Clone,
{
    /// Creates a repository keyed by the records' id column.
    pub fn new(items: impl IntoIterator<Item = T>) -> Result<Self> {
        Self::with_extractor(items, default_key::<K, T>)
    }

    /// Creates a repository with a custom key extractor.
    pub fn with_extractor<F>(items: impl IntoIterator<Item = T>, extractor: F) -> Result<Self>
    where
        F: Fn(&T) -> Result<K> + Send + Sync + 'static,
    {
        let mut entities = BTreeMap::new();
        for item in items {
            entities.insert(extractor(&item)?, item);
        }
        Ok(Self {
            entities: RwLock::new(entities),
            extractor: Box::new(extractor),
            evaluator: Evaluator::default(),
            hooks: Hooks::default(),
        })
    }

    /// Replaces the evaluator used by queries.
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn on_before_create(
        mut self,
        hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.before_create = Some(Box::new(hook));
        self
    }

    pub fn on_after_create(
        mut self,
        hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.after_create = Some(Box::new(hook));
        self
    }

    pub fn on_before_create_or_update(
        mut self,
        hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.before_create_or_update = Some(Box::new(hook));
        self
    }

    pub fn on_after_create_or_update(
        mut self,
        hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.after_create_or_update = Some(Box::new(hook));
        self
    }

    pub fn on_before_update(
        mut self,
        hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.before_update = Some(Box::new(hook));
        self
    }

    pub fn on_after_update(
        mut self,
        hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.after_update = Some(Box::new(hook));
        self
    }

    pub fn on_before_delete(
        mut self,
        hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.before_delete = Some(Box::new(hook));
        self
    }

    pub fn on_after_delete(
        mut self,
        hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.after_delete = Some(Box::new(hook));
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<K, T>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<K, T>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the records matching the Where expressions.
    ///
    /// All other expressions are ignored.
    pub fn count(&self, expressions: &[Expression]) -> Result<usize> {
        let where_: Vec<_> = expressions
            .iter()
            .filter_map(Expression::as_where)
            .cloned()
            .collect();
        let entities = self.read();
        Ok(self.evaluator.evaluate(entities.iter(), &where_, &[], &[])?.len())
    }

    /// Returns copies of the records selected by the expressions.
    ///
    /// Offset and Limit apply after filtering, grouping and ordering.
    pub fn obtain_all(&self, expressions: &[Expression]) -> Result<Vec<T>> {
        let entities = self.read();
        let found = self.evaluator.evaluate_expressions(entities.iter(), expressions)?;
        Ok(found.into_iter().cloned().collect())
    }

    /// Returns a copy of the record stored under `key`.
    pub fn obtain_one(&self, key: &K) -> Result<T> {
        self.read()
            .get(key)
            .cloned()
            .ok_or_else(|| ImitatorError::NotFound(format!("{key:?}")))
    }

    /// Inserts new records. A record whose key is taken is an error.
    pub fn create(&self, records: impl IntoIterator<Item = T>) -> Result<()> {
        let mut entities = self.write();
        for record in records {
            run_hook(&self.hooks.before_create, &record)?;
            let key = (self.extractor)(&record)?;
            if entities.contains_key(&key) {
                return Err(ImitatorError::AlreadyExists(format!("{key:?}")));
            }
            debug!(key = ?key, "create");
            entities.insert(key.clone(), record);
            if let Some(stored) = entities.get(&key) {
                run_hook(&self.hooks.after_create, stored)?;
            }
        }
        Ok(())
    }

    /// Inserts records or replaces the ones stored under the same keys.
    pub fn create_or_update(&self, records: impl IntoIterator<Item = T>) -> Result<()> {
        let mut entities = self.write();
        for record in records {
            run_hook(&self.hooks.before_create_or_update, &record)?;
            let key = (self.extractor)(&record)?;
            debug!(key = ?key, "create or update");
            entities.insert(key.clone(), record);
            if let Some(stored) = entities.get(&key) {
                run_hook(&self.hooks.after_create_or_update, stored)?;
            }
        }
        Ok(())
    }

    /// Replaces stored records. A record whose key is absent is an error.
    pub fn update(&self, records: impl IntoIterator<Item = T>) -> Result<()> {
        let mut entities = self.write();
        for record in records {
            run_hook(&self.hooks.before_update, &record)?;
            let key = (self.extractor)(&record)?;
            let Some(slot) = entities.get_mut(&key) else {
                return Err(ImitatorError::NotFound(format!("{key:?}")));
            };
            debug!(key = ?key, "update");
            *slot = record;
            run_hook(&self.hooks.after_update, slot)?;
        }
        Ok(())
    }

    /// Removes stored records. A record whose key is absent is an error.
    pub fn delete(&self, records: impl IntoIterator<Item = T>) -> Result<()> {
        let mut entities = self.write();
        for record in records {
            run_hook(&self.hooks.before_delete, &record)?;
            let key = (self.extractor)(&record)?;
            let Some(removed) = entities.remove(&key) else {
                return Err(ImitatorError::NotFound(format!("{key:?}")));
            };
            debug!(key = ?key, "delete");
            run_hook(&self.hooks.after_delete, &removed)?;
        }
        Ok(())
    }

    /// Removes the record stored under `key`.
    pub fn erase(&self, key: &K) -> Result<()> {
        let record = self.obtain_one(key)?;
        self.delete([record])
    }

    /// Assigns `values` to every selected record and stores the results.
    ///
    /// Nothing is stored if a merge fails or changes a record's key.
    pub fn update_all<S: AsRef<str>>(
        &self,
        values: &[(S, Value)],
        expressions: &[Expression],
    ) -> Result<()> {
        let mut records = self.obtain_all(expressions)?;
        for record in &mut records {
            let key = (self.extractor)(record)?;
            merge(record, values.iter().map(|(k, v)| (k.as_ref(), v.clone())))?;
            let merged = (self.extractor)(record)?;
            if merged != key {
                return Err(ImitatorError::KeyChanged {
                    from: format!("{key:?}"),
                    to: format!("{merged:?}"),
                });
            }
        }
        debug!(records = records.len(), "update all");
        self.update(records)
    }

    /// Removes every selected record.
    pub fn delete_all(&self, expressions: &[Expression]) -> Result<()> {
        let records = self.obtain_all(expressions)?;
        debug!(records = records.len(), "delete all");
        self.delete(records)
    }
}

impl<K: Debug, T> Debug for DummyRepository<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<_> = match self.entities.read() {
            Ok(entities) => entities.keys().map(|k| format!("{k:?}")).collect(),
            Err(_) => Vec::new(),
        };
        f.debug_struct("DummyRepository")
            .field("keys", &keys)
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}
