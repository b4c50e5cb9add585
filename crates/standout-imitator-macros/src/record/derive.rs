//! Code generation for `#[derive(Record)]`.
//!
//! Emits a `Record` impl whose schema lives in a per-type `OnceCell`, and a
//! `Field` impl that nests the record as a `Value::Nested`.

use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use syn::{ext::IdentExt, spanned::Spanned, Data, DeriveInput, Error, Fields, LitStr, Result};

use super::attrs::parse_column_attrs;

/// Main implementation of the Record derive macro.
pub fn record_derive_impl(input: DeriveInput) -> Result<TokenStream> {
    let struct_name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new(
                    input.span(),
                    "Record can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.span(),
                "Record can only be derived for structs",
            ))
        }
    };

    // The schema is a single static per type.
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Record cannot be derived for generic structs",
        ));
    }

    let mut columns: Vec<TokenStream> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for field in fields.iter() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "expected named field"))?;

        let attrs = parse_column_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let column_name = attrs
            .rename
            .unwrap_or_else(|| field_name.unraw().to_string());
        if seen.contains(&column_name) {
            return Err(Error::new(
                field.span(),
                format!("duplicate column name '{column_name}'"),
            ));
        }
        seen.push(column_name.clone());

        let ty = &field.ty;
        let name_lit = LitStr::new(&column_name, field_name.span());
        let type_lit = LitStr::new(
            &ty.to_token_stream().to_string().replace(' ', ""),
            ty.span(),
        );

        let getter = quote! {
            |record: &#struct_name| ::standout_imitator::Field::to_value(&record.#field_name)
        };

        let column = if attrs.relations {
            quote! {
                ::standout_imitator::ColumnDef::relations(#name_lit, #type_lit, #getter)
            }
        } else if attrs.back_relations {
            quote! {
                ::standout_imitator::ColumnDef::back_relations(#name_lit, #type_lit, #getter)
            }
        } else {
            quote! {
                ::standout_imitator::ColumnDef::field(#name_lit, #type_lit, #getter)
                    .with_setter(|record: &mut #struct_name, value: ::standout_imitator::Value| {
                        record.#field_name = ::standout_imitator::Field::from_value(value)?;
                        ::std::result::Result::Ok(())
                    })
            }
        };
        columns.push(column);
    }

    let schema_name = LitStr::new(&struct_name.unraw().to_string(), struct_name.span());

    Ok(quote! {
        impl ::standout_imitator::Record for #struct_name {
            fn schema() -> &'static ::standout_imitator::Schema<Self> {
                static SCHEMA: ::standout_imitator::__private::OnceCell<
                    ::standout_imitator::Schema<#struct_name>,
                > = ::standout_imitator::__private::OnceCell::new();
                SCHEMA.get_or_init(|| {
                    ::standout_imitator::Schema::new(#schema_name, ::std::vec![#(#columns),*])
                })
            }
        }

        impl ::standout_imitator::Field for #struct_name {
            fn to_value(&self) -> ::standout_imitator::Result<::standout_imitator::Value> {
                ::standout_imitator::reflect(self).map(::standout_imitator::Value::Nested)
            }
        }
    })
}
