//! Query expressions.
//!
//! An [`Expression`] is one parsed clause of a query: a filter, an ordering,
//! a grouping, paging, a relation load or a column selection. Expressions
//! are produced by the [`parser`](crate::parser) or built directly with the
//! constructors below, and are consumed by the [`Evaluator`](crate::Evaluator)
//! and by [`query_mods`](Expression::query_mods).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ImitatorError;
use crate::naming::{split_slash, table_name};
use crate::value::Operand;

/// Filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Membership in a list.
    In,
    /// Non-membership in a list.
    NotIn,
    IsNull,
    IsNotNull,
    /// Substring match.
    Contains,
    /// Prefix match.
    StartsWith,
    /// Suffix match.
    EndsWith,
}

impl Operator {
    /// Every operator, in declaration order.
    pub const ALL: [Operator; 13] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
        Operator::In,
        Operator::NotIn,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
    ];

    /// Returns the raw token of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::IsNull => "isNull",
            Operator::IsNotNull => "isNotNull",
            Operator::Contains => "contains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
        }
    }

    /// Returns `true` for `in` and `notIn`.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Returns `true` for `isNull` and `isNotNull`.
    pub fn is_null_check(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    /// Evaluates an ordering operator against an ordering result.
    ///
    /// Returns `None` for operators that are not ordering-based.
    pub fn eval_ordering(self, ordering: Ordering) -> Option<bool> {
        match self {
            Operator::Eq => Some(ordering == Ordering::Equal),
            Operator::Ne => Some(ordering != Ordering::Equal),
            Operator::Gt => Some(ordering == Ordering::Greater),
            Operator::Ge => Some(ordering != Ordering::Less),
            Operator::Lt => Some(ordering == Ordering::Less),
            Operator::Le => Some(ordering != Ordering::Greater),
            _ => None,
        }
    }
}

impl FromStr for Operator {
    type Err = ImitatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ImitatorError::UnsupportedOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// No direction given. Sorts ascending and renders without a keyword.
    #[default]
    Unspecified,
    Ascending,
    Descending,
}

impl Direction {
    /// Matches a direction word by its first letter (`a…`/`d…`).
    ///
    /// Returns `None` for any other word.
    pub fn from_word(word: &str) -> Option<Direction> {
        match word.chars().next()? {
            'a' | 'A' => Some(Direction::Ascending),
            'd' | 'D' => Some(Direction::Descending),
            _ => None,
        }
    }

    /// Applies this direction to an ascending ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Unspecified | Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }

    /// SQL keyword, empty when unspecified.
    pub fn keyword(self) -> &'static str {
        match self {
            Direction::Unspecified => "",
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

fn write_reference(f: &mut fmt::Formatter<'_>, table: Option<&str>, column: &str) -> fmt::Result {
    match table {
        Some(t) if !t.is_empty() => write!(f, "{t}.{column}"),
        _ => f.write_str(column),
    }
}

fn owned_table(table: Option<&str>) -> Option<String> {
    table.filter(|t| !t.is_empty()).map(str::to_string)
}

/// Filter clause: `[table.]column operator [value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    pub table: Option<String>,
    pub column: String,
    pub operator: Operator,
    /// Absent for `isNull` and `isNotNull`.
    pub value: Option<Operand>,
}

impl Where {
    /// Creates a clause from a `table/column` or `column` reference.
    ///
    /// ```
    /// use standout_imitator::{Operator, Where};
    ///
    /// let w = Where::new("users/age", Operator::Gt, 30);
    /// assert_eq!(w.table.as_deref(), Some("users"));
    /// assert_eq!(w.to_string(), "users.age gt 30");
    /// ```
    pub fn new(reference: &str, operator: Operator, value: impl Into<Operand>) -> Self {
        let (table, column) = split_slash(reference);
        Self::with_table(table, column, operator, value)
    }

    /// Creates a clause with an explicit table.
    ///
    /// A single operand given to `in`/`notIn` becomes a one-element list.
    pub fn with_table(
        table: Option<&str>,
        column: &str,
        operator: Operator,
        value: impl Into<Operand>,
    ) -> Self {
        let value = value.into();
        let value = if operator.takes_list() {
            value.into_list()
        } else {
            value
        };
        Self {
            table: owned_table(table),
            column: column.to_string(),
            operator,
            value: if operator.is_null_check() {
                None
            } else {
                Some(value)
            },
        }
    }

    /// Creates an `isNull` clause.
    pub fn is_null(reference: &str) -> Self {
        Self::null_check(reference, Operator::IsNull)
    }

    /// Creates an `isNotNull` clause.
    pub fn is_not_null(reference: &str) -> Self {
        Self::null_check(reference, Operator::IsNotNull)
    }

    fn null_check(reference: &str, operator: Operator) -> Self {
        let (table, column) = split_slash(reference);
        Self {
            table: owned_table(table),
            column: column.to_string(),
            operator,
            value: None,
        }
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_reference(f, self.table.as_deref(), &self.column)?;
        write!(f, " {}", self.operator)?;
        match &self.value {
            Some(value) if !self.operator.is_null_check() => write!(f, " {value}"),
            _ => Ok(()),
        }
    }
}

/// Ordering clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub table: Option<String>,
    pub column: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(reference: &str, direction: Direction) -> Self {
        let (table, column) = split_slash(reference);
        Self::with_table(table, column, direction)
    }

    pub fn with_table(table: Option<&str>, column: &str, direction: Direction) -> Self {
        Self {
            table: owned_table(table),
            column: column.to_string(),
            direction,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.as_deref().map(table_name);
        write_reference(f, table.as_deref(), &self.column)?;
        match self.direction {
            Direction::Unspecified => Ok(()),
            direction => write!(f, " {}", direction.keyword()),
        }
    }
}

/// Grouping clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBy {
    pub table: Option<String>,
    pub column: String,
}

impl GroupBy {
    pub fn new(reference: &str) -> Self {
        let (table, column) = split_slash(reference);
        Self::with_table(table, column)
    }

    pub fn with_table(table: Option<&str>, column: &str) -> Self {
        Self {
            table: owned_table(table),
            column: column.to_string(),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_reference(f, self.table.as_deref(), &self.column)
    }
}

/// Maximum number of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub usize);

impl Limit {
    pub fn new(n: usize) -> Self {
        Self(n)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Limit {}", self.0)
    }
}

/// Number of results to skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub usize);

impl Offset {
    pub fn new(n: usize) -> Self {
        Self(n)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset {}", self.0)
    }
}

/// Relations to load alongside the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub tables: Vec<String>,
}

impl Relation {
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JOIN {}", self.tables.join(", "))
    }
}

/// Columns to select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub columns: Vec<String>,
}

impl Select {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Select {}", self.columns.join(", "))
    }
}

/// One clause of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Where(Where),
    OrderBy(OrderBy),
    GroupBy(GroupBy),
    Limit(Limit),
    Offset(Offset),
    Relation(Relation),
    Select(Select),
}

impl Expression {
    pub fn as_where(&self) -> Option<&Where> {
        match self {
            Expression::Where(w) => Some(w),
            _ => None,
        }
    }
}

macro_rules! expression_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Expression {
                fn from(e: $variant) -> Self {
                    Expression::$variant(e)
                }
            }
        )*
    };
}

expression_from!(Where, OrderBy, GroupBy, Limit, Offset, Relation, Select);

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Where(e) => fmt::Display::fmt(e, f),
            Expression::OrderBy(e) => fmt::Display::fmt(e, f),
            Expression::GroupBy(e) => fmt::Display::fmt(e, f),
            Expression::Limit(e) => fmt::Display::fmt(e, f),
            Expression::Offset(e) => fmt::Display::fmt(e, f),
            Expression::Relation(e) => fmt::Display::fmt(e, f),
            Expression::Select(e) => fmt::Display::fmt(e, f),
        }
    }
}
