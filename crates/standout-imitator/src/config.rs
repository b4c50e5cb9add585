//! Configuration for parsing and evaluation.
//!
//! Every type here can be loaded from a configuration file; missing keys
//! take their defaults.

use serde::{Deserialize, Serialize};

/// What `isNull` and `isNotNull` treat as null.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullSemantics {
    /// Only an empty nullable field is null.
    #[default]
    Strict,
    /// The zero value of a kind (`""`, `0`, `false`, empty bytes) is null too.
    ZeroValue,
}

/// Where null values sort, independent of the clause direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullOrder {
    #[default]
    First,
    Last,
}

/// Options of the [`Evaluator`](crate::Evaluator).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorOptions {
    pub null_semantics: NullSemantics,
    pub nulls: NullOrder,
}

/// Request parameter names holding the query fragments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub filter: String,
    pub order_by: String,
    pub limit: String,
    pub offset: String,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            filter: "$filter".to_string(),
            order_by: "$sort".to_string(),
            limit: "$limit".to_string(),
            offset: "$offset".to_string(),
        }
    }
}

/// Paging applied when a request carries none.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Pagination {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}
