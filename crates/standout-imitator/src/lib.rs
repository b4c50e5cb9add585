//! Imitator - an in-memory stand-in for SQL queries over Rust records.
//!
//! Imitator parses a small OData-flavoured query language and evaluates it
//! against keyed collections of records, reproducing the column and relation
//! naming conventions of an ORM. It is meant for test doubles that replace a
//! real database:
//!
//! - Filter grammar: `name eq 'John' and age gt 30`, `id in (1, 2)`,
//!   `deleted_at isNull`, `Subject.enabled eq 1`
//! - Ordering: `name asc, created_at:desc`
//! - Paging: limit and offset fragments
//! - Record reflection through `#[derive(Record)]`
//! - Grouping as last-write-wins de-duplication
//! - An in-memory [`DummyRepository`] with hooks
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use standout_imitator::{evaluate, parser, Direction, OrderBy, Record};
//!
//! #[derive(Record)]
//! struct Task {
//!     id: u32,
//!     name: String,
//!     priority: i64,
//! }
//!
//! let tasks = BTreeMap::from([
//!     (1, Task { id: 1, name: "Write docs".into(), priority: 3 }),
//!     (2, Task { id: 2, name: "Fix bug".into(), priority: 5 }),
//!     (3, Task { id: 3, name: "Old task".into(), priority: 1 }),
//! ]);
//!
//! let filter = parser::parse_filter("priority ge 3").unwrap();
//! let order = [OrderBy::new("priority", Direction::Descending)];
//!
//! let results = evaluate(&tasks, &filter, &[], &order).unwrap();
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[0].name, "Fix bug");
//! ```
//!
//! # Evaluation Semantics
//!
//! ```text
//! result = order_by(group_by(where(records)))
//! ```
//!
//! - **Where**: every clause must match (implicit AND)
//! - **GroupBy**: per grouped value, the last record seen survives
//! - **OrderBy**: stable multi-key sort, nulls first in either direction
//!
//! # Operators
//!
//! | Operator | Meaning |
//! |----------|---------|
//! | `eq`, `ne`, `gt`, `ge`, `lt`, `le` | Ordered comparison |
//! | `in`, `notIn` | List membership |
//! | `contains`, `startswith`, `endswith` | Case-sensitive substring match |
//! | `isNull`, `isNotNull` | Null checks, no operand |

// Lets the derive macro name this crate from inside it.
extern crate self as standout_imitator;

mod compare;
mod config;
mod error;
mod evaluate;
mod expression;
mod model;
pub mod naming;
pub mod parser;
mod query_mod;
mod record;
mod repository;
mod value;

pub use compare::{compare, order_values, Comparator};
pub use config::{EvaluatorOptions, NullOrder, NullSemantics, Pagination, QueryParams};
pub use error::{ImitatorError, Result};
pub use evaluate::{evaluate, Evaluator};
pub use expression::{
    Direction, Expression, GroupBy, Limit, Offset, Operator, OrderBy, Relation, Select, Where,
};
pub use model::Model;
pub use parser::QueryFragments;
pub use query_mod::{query_mods, QueryMod};
pub use record::{merge, mismatch, reflect, ColumnDef, ColumnKind, Field, Record, Schema};
pub use repository::{default_key, DummyRepository, ID_COLUMNS};
pub use value::{format_time, List, Literal, Operand, Value};

pub use standout_imitator_macros::Record;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::OnceCell;
}
