//! Record reflection.
//!
//! A [`Record`] exposes a static [`Schema`]: the list of its columns, each
//! with a typed accessor that widens the field into a [`Value`] and, for
//! plain columns, a setter used by [`merge`]. The schema is normally
//! generated by `#[derive(Record)]` and built once per type.
//!
//! # Manual Implementation
//!
//! ```
//! use once_cell::sync::OnceCell;
//! use standout_imitator::{reflect, ColumnDef, Field, Record, Schema, Value};
//!
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Record for User {
//!     fn schema() -> &'static Schema<Self> {
//!         static SCHEMA: OnceCell<Schema<User>> = OnceCell::new();
//!         SCHEMA.get_or_init(|| {
//!             Schema::new(
//!                 "User",
//!                 vec![
//!                     ColumnDef::field("id", "i64", |u: &User| u.id.to_value())
//!                         .with_setter(|u, v| {
//!                             u.id = Field::from_value(v)?;
//!                             Ok(())
//!                         }),
//!                     ColumnDef::field("name", "String", |u: &User| u.name.to_value()),
//!                 ],
//!             )
//!         })
//!     }
//! }
//!
//! let model = reflect(&User { id: 7, name: "Ann".into() }).unwrap();
//! assert_eq!(model.get(None, "id"), Some(&Value::Int(7)));
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, FixedOffset, Utc};
use tracing::trace;

use crate::error::{ImitatorError, Result};
use crate::model::Model;
use crate::naming;
use crate::value::{List, Value};

/// Conversion between a Rust field type and a [`Value`].
///
/// Implemented for the supported scalar types, `Option<T>`, `Box<T>`,
/// byte vectors, typed vectors, chrono times and JSON values. Types
/// deriving [`Record`] get an implementation that produces
/// [`Value::Nested`].
pub trait Field {
    /// Widens the field into a value.
    fn to_value(&self) -> Result<Value>;

    /// Narrows a value back into the field type.
    fn from_value(value: Value) -> Result<Self>
    where
        Self: Sized,
    {
        Err(mismatch::<Self>(&value))
    }
}

/// Type error raised when a value cannot be narrowed into `T`.
pub fn mismatch<T: ?Sized>(value: &Value) -> ImitatorError {
    ImitatorError::TypeMismatch {
        op: "assign",
        actual: value.kind(),
        expected: std::any::type_name::<T>().to_string(),
    }
}

macro_rules! int_field {
    ($variant:ident as $wide:ty: $($t:ty),*) => {
        $(
            impl Field for $t {
                fn to_value(&self) -> Result<Value> {
                    Ok(Value::$variant(*self as $wide))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int(n) => <$t>::try_from(n).map_err(|_| mismatch::<$t>(&value)),
                        Value::UInt(n) => <$t>::try_from(n).map_err(|_| mismatch::<$t>(&value)),
                        other => Err(mismatch::<$t>(&other)),
                    }
                }
            }
        )*
    };
}

int_field!(Int as i64: i8, i16, i32, i64, isize);
int_field!(UInt as u64: u8, u16, u32, u64, usize);

macro_rules! float_field {
    ($($t:ty),*) => {
        $(
            impl Field for $t {
                fn to_value(&self) -> Result<Value> {
                    Ok(Value::Float(*self as f64))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Float(n) => Ok(n as $t),
                        Value::Int(n) => Ok(n as $t),
                        Value::UInt(n) => Ok(n as $t),
                        other => Err(mismatch::<$t>(&other)),
                    }
                }
            }
        )*
    };
}

float_field!(f32, f64);

impl Field for bool {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch::<bool>(&other)),
        }
    }
}

impl Field for String {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Str(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch::<String>(&other)),
        }
    }
}

impl Field for Vec<u8> {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bytes(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Str(s) => Ok(s.into_bytes()),
            other => Err(mismatch::<Vec<u8>>(&other)),
        }
    }
}

macro_rules! list_field {
    ($variant:ident as $wide:ty: $($t:ty),*) => {
        $(
            impl Field for Vec<$t> {
                fn to_value(&self) -> Result<Value> {
                    Ok(Value::List(List::$variant(
                        self.iter().map(|v| *v as $wide).collect(),
                    )))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::List(List::$variant(items)) => items
                            .into_iter()
                            .map(|v| <$t>::from_value(Value::from(v)))
                            .collect(),
                        other => Err(mismatch::<Vec<$t>>(&other)),
                    }
                }
            }
        )*
    };
}

list_field!(Int as i64: i8, i16, i32, i64, isize);
list_field!(UInt as u64: u16, u32, u64, usize);
list_field!(Float as f64: f32, f64);

impl Field for Vec<bool> {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::List(List::Bool(self.clone())))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(List::Bool(items)) => Ok(items),
            other => Err(mismatch::<Vec<bool>>(&other)),
        }
    }
}

impl Field for Vec<String> {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::List(List::Str(self.clone())))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(List::Str(items)) => Ok(items),
            other => Err(mismatch::<Vec<String>>(&other)),
        }
    }
}

impl<T: Field> Field for Option<T> {
    fn to_value(&self) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Field> Field for Box<T> {
    fn to_value(&self) -> Result<Value> {
        (**self).to_value()
    }

    fn from_value(value: Value) -> Result<Self> {
        T::from_value(value).map(Box::new)
    }
}

impl Field for DateTime<Utc> {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Time(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(t) => Ok(t),
            Value::Str(ref s) => DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| mismatch::<Self>(&value)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl Field for DateTime<FixedOffset> {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Time(self.with_timezone(&Utc)))
    }

    fn from_value(value: Value) -> Result<Self> {
        DateTime::<Utc>::from_value(value).map(|t| t.fixed_offset())
    }
}

impl Field for serde_json::Value {
    fn to_value(&self) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        serde_json::to_vec(self).map(Value::Bytes).map_err(|e| {
            ImitatorError::unsupported_type("", "serde_json::Value", e.to_string())
        })
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bytes(ref b) => serde_json::from_slice(b).map_err(|_| mismatch::<Self>(&value)),
            Value::Str(ref s) => serde_json::from_str(s).map_err(|_| mismatch::<Self>(&value)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// Role of a column in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// A plain column stored in [`Model::fields`].
    Field,
    /// Struct of loaded forward relations.
    Relations,
    /// Struct of loaded back relations.
    BackRelations,
}

type Getter<T> = fn(&T) -> Result<Value>;
type Setter<T> = fn(&mut T, Value) -> Result<()>;

/// One column of a [`Schema`].
pub struct ColumnDef<T> {
    name: &'static str,
    type_name: &'static str,
    kind: ColumnKind,
    get: Getter<T>,
    set: Option<Setter<T>>,
}

impl<T> ColumnDef<T> {
    /// A plain column, read-only until [`with_setter`](Self::with_setter).
    pub fn field(name: &'static str, type_name: &'static str, get: Getter<T>) -> Self {
        Self {
            name,
            type_name,
            kind: ColumnKind::Field,
            get,
            set: None,
        }
    }

    /// The forward-relations column.
    pub fn relations(name: &'static str, type_name: &'static str, get: Getter<T>) -> Self {
        Self {
            kind: ColumnKind::Relations,
            ..Self::field(name, type_name, get)
        }
    }

    /// The back-relations column.
    pub fn back_relations(name: &'static str, type_name: &'static str, get: Getter<T>) -> Self {
        Self {
            kind: ColumnKind::BackRelations,
            ..Self::field(name, type_name, get)
        }
    }

    pub fn with_setter(mut self, set: Setter<T>) -> Self {
        self.set = Some(set);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    /// Reads the column, turning a panicking accessor into an
    /// [`ImitatorError::UnsupportedType`].
    pub fn read(&self, record: &T) -> Result<Value> {
        let get = self.get;
        match panic::catch_unwind(AssertUnwindSafe(|| get(record))) {
            Ok(result) => result.map_err(|e| e.in_column(self.name)),
            Err(payload) => Err(ImitatorError::unsupported_type(
                self.name,
                self.type_name,
                panic_message(payload.as_ref()),
            )),
        }
    }

    /// Assigns a value to the column.
    pub fn write(&self, record: &mut T, value: Value) -> Result<()> {
        match self.set {
            Some(set) => set(record, value),
            None => Err(ImitatorError::ReadOnlyColumn(self.name.to_string())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "accessor panicked".to_string()
    }
}

/// Column layout of a record type.
pub struct Schema<T> {
    name: &'static str,
    columns: Vec<ColumnDef<T>>,
}

impl<T> Schema<T> {
    pub fn new(name: &'static str, columns: Vec<ColumnDef<T>>) -> Self {
        Self { name, columns }
    }

    /// The record type name, e.g. `UserAccount`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The SQL table name, e.g. `user_accounts`.
    pub fn table(&self) -> String {
        naming::table_name(self.name)
    }

    pub fn columns(&self) -> &[ColumnDef<T>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef<T>> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A type with a static column schema.
///
/// Usually derived with `#[derive(Record)]`.
pub trait Record: Sized + 'static {
    fn schema() -> &'static Schema<Self>;

    /// Builds the [`Model`] of this record.
    fn to_model(&self) -> Result<Model> {
        reflect(self)
    }
}

/// Converts a record into its [`Model`].
///
/// Columns are read in schema order. The first failing column aborts the
/// conversion; no partial model is returned. Entries of a relations column
/// are stored under their canonical names, and empty entries are skipped.
pub fn reflect<T: Record>(record: &T) -> Result<Model> {
    let mut model = Model::new();
    for column in T::schema().columns() {
        let value = column.read(record)?;
        match column.kind() {
            ColumnKind::Field => model.insert_field(column.name(), value),
            ColumnKind::Relations => {
                for (name, related) in relation_entries(column, value)? {
                    model.insert_relation(&name, related);
                }
            }
            ColumnKind::BackRelations => {
                for (name, related) in relation_entries(column, value)? {
                    model.insert_back_relation(&name, related);
                }
            }
        }
    }
    Ok(model)
}

fn relation_entries<T>(column: &ColumnDef<T>, value: Value) -> Result<Vec<(String, Model)>> {
    let holder = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Nested(m) => m,
        other => {
            return Err(ImitatorError::unsupported_type(
                column.name(),
                column.type_name(),
                format!("relations must be a record, got {}", other.kind()),
            ))
        }
    };

    let mut entries = Vec::new();
    for (name, entry) in holder.fields() {
        match entry {
            Value::Null => {}
            Value::Nested(related) => entries.push((name.clone(), related.clone())),
            other => {
                return Err(ImitatorError::unsupported_type(
                    format!("{}.{}", column.name(), name),
                    other.kind(),
                    "relation entries must be records",
                ))
            }
        }
    }
    Ok(entries)
}

/// Assigns column values to a record by column name.
///
/// Unknown columns are ignored. Relation columns cannot be set.
pub fn merge<T, I, S>(record: &mut T, values: I) -> Result<()>
where
    T: Record,
    I: IntoIterator<Item = (S, Value)>,
    S: AsRef<str>,
{
    let schema = T::schema();
    for (name, value) in values {
        let name = name.as_ref();
        match schema.column(name) {
            Some(column) => column.write(record, value)?,
            None => trace!(column = name, record = schema.name(), "merge skips unknown column"),
        }
    }
    Ok(())
}
