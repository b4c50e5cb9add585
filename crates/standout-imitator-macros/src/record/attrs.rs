//! Attribute parsing for `#[derive(Record)]`.

use proc_macro2::Span;
use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Error, Expr, ExprLit, Lit, LitStr, Meta, Result, Token};

/// Parsed `#[column(...)]` attribute.
#[derive(Debug, Default)]
pub struct ColumnAttr {
    pub skip: bool,
    pub rename: Option<String>,
    pub relations: bool,
    pub back_relations: bool,
}

impl Parse for ColumnAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = ColumnAttr::default();

        while !input.is_empty() {
            if input.peek(LitStr) {
                let name: LitStr = input.parse()?;
                attr.set_rename(name.value(), name.span())?;
            } else {
                let meta: Meta = input.parse()?;
                attr.apply(meta)?;
            }

            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }

        if attr.relations && attr.back_relations {
            return Err(Error::new(
                input.span(),
                "a column cannot hold both relations and back_relations",
            ));
        }
        if attr.skip && (attr.relations || attr.back_relations || attr.rename.is_some()) {
            return Err(Error::new(
                input.span(),
                "skip cannot be combined with other column options",
            ));
        }

        Ok(attr)
    }
}

impl ColumnAttr {
    fn set_rename(&mut self, name: String, span: Span) -> Result<()> {
        if self.rename.is_some() {
            return Err(Error::new(span, "column name given twice"));
        }
        if name.is_empty() {
            return Err(Error::new(span, "column name must not be empty"));
        }
        self.rename = Some(name);
        Ok(())
    }

    fn apply(&mut self, meta: Meta) -> Result<()> {
        match meta {
            Meta::Path(path) => {
                let ident = path
                    .get_ident()
                    .ok_or_else(|| Error::new_spanned(&path, "expected identifier"))?
                    .to_string();

                match ident.as_str() {
                    "skip" => self.skip = true,
                    "relations" => self.relations = true,
                    "back_relations" => self.back_relations = true,
                    other => {
                        return Err(Error::new_spanned(
                            &path,
                            format!(
                                "unknown column option '{other}'. Expected one of: skip, relations, back_relations, rename"
                            ),
                        ))
                    }
                }
            }
            Meta::NameValue(nv) => {
                if !nv.path.is_ident("rename") {
                    return Err(Error::new_spanned(&nv.path, "expected 'rename'"));
                }
                let Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) = &nv.value
                else {
                    return Err(Error::new_spanned(
                        &nv.value,
                        "rename value must be a string literal",
                    ));
                };
                self.set_rename(s.value(), s.span())?;
            }
            Meta::List(list) => {
                return Err(Error::new_spanned(list, "unexpected nested list"));
            }
        }
        Ok(())
    }
}

/// Reads the first `#[column(...)]` attribute on a field.
pub fn parse_column_attrs(attrs: &[Attribute]) -> Result<ColumnAttr> {
    for attr in attrs {
        if attr.path().is_ident("column") {
            return attr.parse_args::<ColumnAttr>();
        }
    }
    Ok(ColumnAttr::default())
}
