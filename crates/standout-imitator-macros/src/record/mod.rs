//! Implementation of the `#[derive(Record)]` macro.
//!
//! Generates the static column schema that `standout-imitator` reflects
//! records through, plus a `Field` impl so the type can nest inside
//! relation structs.

mod attrs;
mod derive;

pub use derive::record_derive_impl;
