//! Proc macros for Standout Imitator.
//!
//! - [`Record`] - Generate the column schema a record is reflected through

mod record;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives the `Record` trait for a struct with named fields.
///
/// Every field becomes a column named after the field. Field types must
/// implement `standout_imitator::Field`; plain columns also get a setter so
/// they can be assigned by `merge`.
///
/// # Field Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `"name"` | Use a custom column name |
/// | `rename = "..."` | Same as a bare name |
/// | `skip` | Exclude this field from the schema |
/// | `relations` | Field holds a struct of loaded forward relations |
/// | `back_relations` | Field holds a struct of loaded back relations |
///
/// A relations field is usually an `Option` of another derived struct
/// whose fields are `Option<Related>`; each present entry is filed under
/// its canonical relation name.
///
/// # Generated Code
///
/// 1. `impl Record`, with the schema built once on first use
/// 2. `impl Field`, producing `Value::Nested` with the record's model
///
/// # Example
///
/// ```ignore
/// use standout_imitator::{reflect, Record, Value};
///
/// #[derive(Record)]
/// struct Subject {
///     id: u32,
///     enabled: bool,
/// }
///
/// #[derive(Record)]
/// struct TaskRelations {
///     #[column("Subject")]
///     subject: Option<Subject>,
/// }
///
/// #[derive(Record)]
/// struct Task {
///     #[column("ID")]
///     id: u32,
///     name: String,
///     #[column("R", relations)]
///     r: Option<TaskRelations>,
///     #[column(skip)]
///     scratch: Vec<u8>,
/// }
///
/// let task = Task {
///     id: 1,
///     name: "Write docs".into(),
///     r: Some(TaskRelations { subject: Some(Subject { id: 4, enabled: true }) }),
///     scratch: Vec::new(),
/// };
/// let model = reflect(&task).unwrap();
/// assert_eq!(model.get(Some("subject"), "enabled"), Some(&Value::Bool(true)));
/// ```
#[proc_macro_derive(Record, attributes(column))]
pub fn record_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::record_derive_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
