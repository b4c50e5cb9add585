//! Runtime value types.
//!
//! [`Value`] is what a record field widens into when its [`Model`] is built.
//! [`Literal`] and [`Operand`] are the owned comparison values stored in a
//! [`Where`](crate::Where) clause.

use std::fmt;

use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc};

use crate::model::Model;

/// Widened value of one record field.
///
/// The set of variants is closed: every supported Rust field type maps onto
/// exactly one of them (see [`Field`](crate::Field)).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Empty nullable field (`Option::None`).
    Null,
    /// String value.
    Str(String),
    /// Any signed integer width.
    Int(i64),
    /// Any unsigned integer width.
    UInt(u64),
    /// Any float width.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Time instant, normalized to UTC.
    Time(DateTime<Utc>),
    /// Raw byte sequence (also used for JSON columns).
    Bytes(Vec<u8>),
    /// Typed slice of scalars.
    List(List),
    /// Nested record.
    Nested(Model),
}

/// Typed slice value.
#[derive(Debug, Clone, PartialEq)]
pub enum List {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    Str(Vec<String>),
}

impl Value {
    /// Returns `true` if this is a `Null` value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float64",
            Value::Bool(_) => "bool",
            Value::Time(_) => "time",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Nested(_) => "model",
        }
    }

    /// Returns `true` if the value equals the zero value of its kind.
    ///
    /// Lists and nested models are never zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::Int(n) => *n == 0,
            Value::UInt(n) => *n == 0,
            Value::Float(n) => *n == 0.0,
            Value::Bool(b) => !b,
            Value::Time(t) => is_zero_time(t),
            Value::Bytes(b) => b.is_empty(),
            Value::List(_) | Value::Nested(_) => false,
        }
    }
}

/// The zero time is `0001-01-01T00:00:00Z`, not the Unix epoch.
fn is_zero_time(t: &DateTime<Utc>) -> bool {
    t.year() == 1 && t.ordinal() == 1 && t.num_seconds_from_midnight() == 0 && t.nanosecond() == 0
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Str(s) => Value::Str(s),
            Literal::Int(n) => Value::Int(n),
            Literal::UInt(n) => Value::UInt(n),
            Literal::Float(n) => Value::Float(n),
            Literal::Bool(b) => Value::Bool(b),
            Literal::Time(t) => Value::Time(t),
            Literal::Bytes(b) => Value::Bytes(b),
        }
    }
}

/// Formats a time the way every comparison sees it: RFC3339, UTC, seconds.
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Owned scalar stored in a clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl Literal {
    /// Returns the kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Str(_) => "string",
            Literal::Int(_) => "int",
            Literal::UInt(_) => "uint",
            Literal::Float(_) => "float64",
            Literal::Bool(_) => "bool",
            Literal::Time(_) => "time",
            Literal::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "'{s}'"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::UInt(n) => write!(f, "{n}"),
            Literal::Float(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{n}.0"),
            Literal::Float(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Time(t) => write!(f, "'{}'", format_time(t)),
            Literal::Bytes(b) => write!(f, "'{}'", hex::encode(b)),
        }
    }
}

macro_rules! literal_from {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Literal {
                fn from(n: $t) -> Self {
                    Literal::$variant(n as $target)
                }
            }
        )*
    };
}

literal_from!(Int as i64: i8, i16, i32, i64, isize);
literal_from!(UInt as u64: u8, u16, u32, u64, usize);
literal_from!(Float as f64: f32, f64);

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(t: DateTime<Utc>) -> Self {
        Literal::Time(t)
    }
}

impl From<Vec<u8>> for Literal {
    fn from(b: Vec<u8>) -> Self {
        Literal::Bytes(b)
    }
}

/// Comparison operand of a clause: one literal or a list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(Literal),
    List(Vec<Literal>),
}

impl Operand {
    /// Returns the operand as a slice of literals.
    pub fn literals(&self) -> &[Literal] {
        match self {
            Operand::Single(l) => std::slice::from_ref(l),
            Operand::List(items) => items,
        }
    }

    /// Converts a single literal into a one-element list.
    pub fn into_list(self) -> Operand {
        match self {
            Operand::Single(l) => Operand::List(vec![l]),
            list => list,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Single(l) => write!(f, "{l}"),
            Operand::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

impl From<Literal> for Operand {
    fn from(literal: Literal) -> Self {
        Operand::Single(literal)
    }
}

impl From<Vec<Literal>> for Operand {
    fn from(items: Vec<Literal>) -> Self {
        Operand::List(items)
    }
}

// Vec<u8> stays a list of numbers here; bytes go through `Literal::Bytes`.
macro_rules! operand_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(value: $t) -> Self {
                    Operand::Single(value.into())
                }
            }

            impl From<Vec<$t>> for Operand {
                fn from(values: Vec<$t>) -> Self {
                    Operand::List(values.into_iter().map(Into::into).collect())
                }
            }

            impl<const N: usize> From<[$t; N]> for Operand {
                fn from(values: [$t; N]) -> Self {
                    Operand::List(values.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

operand_from!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, &str, String,
    DateTime<Utc>
);
