//! The evaluation pipeline.
//!
//! Records are reflected into [`Model`]s once per call. The filter, group
//! and sort stages then work on index selections into that model slice, so
//! the surviving indices map straight back to the original records:
//!
//! ```text
//! records ─reflect─▶ models ─where─▶ selection ─group by─▶ selection ─order by─▶ records
//! ```

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace, warn};

use crate::compare::{order_values, Comparator};
use crate::config::{EvaluatorOptions, NullOrder};
use crate::error::{ImitatorError, Result};
use crate::expression::{Expression, GroupBy, OrderBy, Where};
use crate::model::Model;
use crate::record::{reflect, Record};
use crate::value::{List, Value};

/// Runs filter, group and order clauses over record collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    options: EvaluatorOptions,
    comparator: Comparator,
}

impl Evaluator {
    pub fn new(options: EvaluatorOptions) -> Self {
        Self {
            options,
            comparator: Comparator::new(options.null_semantics),
        }
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Evaluates the clauses over a keyed collection.
    ///
    /// Returns the surviving records: those matching every `where_` clause,
    /// de-duplicated by `group_by` and sorted by `order_by`.
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use standout_imitator::{Evaluator, Operator, Record, Where};
    ///
    /// #[derive(Record)]
    /// struct User {
    ///     id: i64,
    ///     age: i64,
    /// }
    ///
    /// let users = BTreeMap::from([
    ///     (1, User { id: 1, age: 25 }),
    ///     (2, User { id: 2, age: 35 }),
    /// ]);
    /// let found = Evaluator::default()
    ///     .evaluate(&users, &[Where::new("age", Operator::Gt, 30)], &[], &[])
    ///     .unwrap();
    /// assert_eq!(found.len(), 1);
    /// assert_eq!(found[0].id, 2);
    /// ```
    pub fn evaluate<'a, K, T, I>(
        &self,
        records: I,
        where_: &[Where],
        group_by: &[GroupBy],
        order_by: &[OrderBy],
    ) -> Result<Vec<&'a T>>
    where
        K: 'a,
        T: Record,
        I: IntoIterator<Item = (&'a K, &'a T)>,
    {
        let records: Vec<&'a T> = records.into_iter().map(|(_, record)| record).collect();
        debug!(
            records = records.len(),
            where_clauses = where_.len(),
            group_by = group_by.len(),
            order_by = order_by.len(),
            "evaluating"
        );

        let models = records
            .iter()
            .map(|record| reflect(*record))
            .collect::<Result<Vec<_>>>()?;

        let selection = self.select_where(&models, (0..models.len()).collect(), where_)?;
        let mut selection = self.group(&models, selection, group_by);
        self.sort(&models, &mut selection, order_by)?;

        debug!(results = selection.len(), "evaluated");
        Ok(selection.into_iter().map(|i| records[i]).collect())
    }

    /// Evaluates a mixed expression list.
    ///
    /// Where, GroupBy and OrderBy clauses run as in
    /// [`evaluate`](Self::evaluate). The first Offset and the first Limit
    /// are then applied to the result, offset first. Relation and Select
    /// expressions do not affect in-memory evaluation.
    pub fn evaluate_expressions<'a, K, T, I>(
        &self,
        records: I,
        expressions: &[Expression],
    ) -> Result<Vec<&'a T>>
    where
        K: 'a,
        T: Record,
        I: IntoIterator<Item = (&'a K, &'a T)>,
    {
        let mut where_ = Vec::new();
        let mut group_by = Vec::new();
        let mut order_by = Vec::new();
        let mut limit = None;
        let mut offset = None;
        for expression in expressions {
            match expression {
                Expression::Where(e) => where_.push(e.clone()),
                Expression::GroupBy(e) => group_by.push(e.clone()),
                Expression::OrderBy(e) => order_by.push(e.clone()),
                Expression::Limit(e) => {
                    limit.get_or_insert(e.0);
                }
                Expression::Offset(e) => {
                    offset.get_or_insert(e.0);
                }
                Expression::Relation(_) | Expression::Select(_) => {}
            }
        }

        let results = self.evaluate(records, &where_, &group_by, &order_by)?;
        Ok(results
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Keeps the selected models that satisfy every clause.
    ///
    /// Clauses are checked in order and a model is dropped at its first
    /// failing clause.
    pub fn select_where(
        &self,
        models: &[Model],
        selection: Vec<usize>,
        clauses: &[Where],
    ) -> Result<Vec<usize>> {
        if clauses.is_empty() {
            return Ok(selection);
        }

        let mut kept = Vec::with_capacity(selection.len());
        'models: for i in selection {
            for clause in clauses {
                if !self.comparator.matches(&models[i], clause)? {
                    continue 'models;
                }
            }
            kept.push(i);
        }
        trace!(kept = kept.len(), "where stage");
        Ok(kept)
    }

    /// De-duplicates the selection by the grouped columns.
    ///
    /// For every clause and every observed value the last model seen wins.
    /// The result lists the winners in the order their groups were first
    /// seen, each model at most once. Models lacking a grouped column join
    /// no group.
    pub fn group(
        &self,
        models: &[Model],
        selection: Vec<usize>,
        clauses: &[GroupBy],
    ) -> Vec<usize> {
        if clauses.is_empty() {
            return selection;
        }

        // Winning model per group, in first-seen order.
        let mut groups: Vec<usize> = Vec::new();
        let mut index: HashMap<(usize, GroupKey<'_>), usize> = HashMap::new();
        for &i in &selection {
            for (c, clause) in clauses.iter().enumerate() {
                let Some(value) = models[i].get(clause.table.as_deref(), &clause.column) else {
                    continue;
                };
                match index.entry((c, GroupKey::new(value))) {
                    Entry::Occupied(slot) => groups[*slot.get()] = i,
                    Entry::Vacant(slot) => {
                        slot.insert(groups.len());
                        groups.push(i);
                    }
                }
            }
        }

        let mut winners = Vec::with_capacity(groups.len());
        for i in groups {
            if !winners.contains(&i) {
                winners.push(i);
            }
        }
        trace!(groups = winners.len(), "group by stage");
        winners
    }

    /// Sorts the selection in place by the order clauses.
    ///
    /// The sort is stable: models tying on every clause keep their relative
    /// order. Nulls sort first (or last, per [`NullOrder`]) regardless of
    /// direction. If any selected model lacks an ordered column, or a
    /// column holds values that cannot be ordered, every such problem is
    /// reported in one [`ImitatorError::Sort`] and the selection is left in
    /// its incoming order.
    pub fn sort(
        &self,
        models: &[Model],
        selection: &mut [usize],
        clauses: &[OrderBy],
    ) -> Result<()> {
        if clauses.is_empty() {
            return Ok(());
        }

        let errors = sort_errors(models, selection, clauses);
        if !errors.is_empty() {
            warn!(errors = errors.len(), "order by stage failed");
            return Err(ImitatorError::Sort(errors.into_values().collect()));
        }

        let nulls = self.options.nulls;
        selection.sort_by(|&a, &b| {
            for clause in clauses {
                let table = clause.table.as_deref();
                let ordering = match (
                    models[a].get(table, &clause.column),
                    models[b].get(table, &clause.column),
                ) {
                    (Some(x), Some(y)) => order_nullable(x, y, clause, nulls),
                    _ => Ordering::Equal,
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        trace!(sorted = selection.len(), "order by stage");
        Ok(())
    }
}

/// Hashable projection of a grouped value.
///
/// Floats key on their bits, with `-0.0` folded into `0.0`. Values that
/// have no cheap projection (nested models) key on their debug form.
#[derive(PartialEq, Eq, Hash)]
enum GroupKey<'a> {
    Null,
    Str(&'a str),
    Int(i64),
    UInt(u64),
    Float(u64),
    Bool(bool),
    Time(i64, u32),
    Bytes(&'a [u8]),
    Bools(&'a [bool]),
    Ints(&'a [i64]),
    UInts(&'a [u64]),
    Floats(Vec<u64>),
    Strs(&'a [String]),
    Nested(String),
}

impl<'a> GroupKey<'a> {
    fn new(value: &'a Value) -> Self {
        match value {
            Value::Null => GroupKey::Null,
            Value::Str(s) => GroupKey::Str(s),
            Value::Int(n) => GroupKey::Int(*n),
            Value::UInt(n) => GroupKey::UInt(*n),
            Value::Float(n) => GroupKey::Float(float_bits(*n)),
            Value::Bool(b) => GroupKey::Bool(*b),
            Value::Time(t) => GroupKey::Time(t.timestamp(), t.timestamp_subsec_nanos()),
            Value::Bytes(b) => GroupKey::Bytes(b),
            Value::List(List::Bool(items)) => GroupKey::Bools(items),
            Value::List(List::Int(items)) => GroupKey::Ints(items),
            Value::List(List::UInt(items)) => GroupKey::UInts(items),
            Value::List(List::Float(items)) => {
                GroupKey::Floats(items.iter().copied().map(float_bits).collect())
            }
            Value::List(List::Str(items)) => GroupKey::Strs(items),
            Value::Nested(model) => GroupKey::Nested(format!("{model:?}")),
        }
    }
}

fn float_bits(n: f64) -> u64 {
    if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

fn order_nullable(a: &Value, b: &Value, clause: &OrderBy, nulls: NullOrder) -> Ordering {
    let null_first = match nulls {
        NullOrder::First => Ordering::Less,
        NullOrder::Last => Ordering::Greater,
    };
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => null_first,
        (false, true) => null_first.reverse(),
        (false, false) => order_values(a, b)
            .map(|o| clause.direction.apply(o))
            .unwrap_or(Ordering::Equal),
    }
}

/// Collects, per (model, clause), why the selection cannot be ordered.
fn sort_errors(
    models: &[Model],
    selection: &[usize],
    clauses: &[OrderBy],
) -> BTreeMap<(usize, usize), ImitatorError> {
    let mut errors = BTreeMap::new();
    for (c, clause) in clauses.iter().enumerate() {
        let table = clause.table.as_deref();
        let mut first: Option<&Value> = None;
        for &i in selection {
            let value = match models[i].lookup(table, &clause.column) {
                Ok(value) => value,
                Err(e) => {
                    errors.insert((i, c), e);
                    continue;
                }
            };
            if value.is_null() {
                continue;
            }
            let reference = *first.get_or_insert(value);
            if let Err(e) = order_values(reference, value) {
                errors.insert((i, c), e);
            }
        }
    }
    errors
}

/// Evaluates with default options.
pub fn evaluate<'a, K, T, I>(
    records: I,
    where_: &[Where],
    group_by: &[GroupBy],
    order_by: &[OrderBy],
) -> Result<Vec<&'a T>>
where
    K: 'a,
    T: Record,
    I: IntoIterator<Item = (&'a K, &'a T)>,
{
    Evaluator::default().evaluate(records, where_, group_by, order_by)
}
