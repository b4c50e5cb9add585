//! Type-dispatching comparison of model values against clause operands.
//!
//! The runtime kind of the model value decides how a clause is evaluated.
//! Operands are coerced to that kind first:
//!
//! | Value kind | Accepted literals |
//! |------------|-------------------|
//! | string | string |
//! | int | int, uint in range, string parsing as int |
//! | uint | uint, non-negative int, string parsing as uint |
//! | float64 | float, int, uint, string parsing as float |
//! | bool | bool, `0`/`1`, `'true'`/`'false'` |
//! | time | time, RFC3339 string |
//! | bytes | bytes, string (its UTF-8 bytes) |
//!
//! Anything else is an [`ImitatorError::TypeMismatch`]. Times compare in
//! their RFC3339 UTC form with seconds precision, bytes in their hex form,
//! and booleans as `0`/`1`.

use std::cmp::Ordering;
use std::fmt::Display;

use chrono::{DateTime, Utc};

use crate::config::NullSemantics;
use crate::error::{ImitatorError, Result};
use crate::expression::{Operator, Where};
use crate::model::Model;
use crate::value::{format_time, Literal, Operand, Value};

/// Evaluates [`Where`] clauses against models.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    null_semantics: NullSemantics,
}

impl Comparator {
    pub fn new(null_semantics: NullSemantics) -> Self {
        Self { null_semantics }
    }

    /// Returns whether `model` satisfies `clause`.
    ///
    /// A clause naming a column or relation the model lacks is
    /// [`ImitatorError::FieldNotFound`].
    pub fn matches(&self, model: &Model, clause: &Where) -> Result<bool> {
        let actual = model.lookup(clause.table.as_deref(), &clause.column)?;
        self.compare_value(clause.operator, actual, clause.value.as_ref())
    }

    /// Compares one value against an optional operand.
    pub fn compare_value(
        &self,
        op: Operator,
        actual: &Value,
        expected: Option<&Operand>,
    ) -> Result<bool> {
        match op {
            Operator::IsNull => return Ok(self.is_null(actual)),
            Operator::IsNotNull => return Ok(!self.is_null(actual)),
            _ => {}
        }

        let expected = expected.map(Operand::literals).unwrap_or(&[]);
        if expected.is_empty() && !op.takes_list() {
            return Err(ImitatorError::TypeMismatch {
                op: op.as_str(),
                actual: actual.kind(),
                expected: "nothing".to_string(),
            });
        }

        match actual {
            Value::Null => Ok(false),
            Value::Str(s) => {
                let items = coerce_all(op, actual, expected, |l| match l {
                    Literal::Str(e) => Some(e.clone()),
                    _ => None,
                })?;
                Ok(compare(op, s, &items))
            }
            Value::Int(n) => {
                let items = coerce_all(op, actual, expected, |l| match l {
                    Literal::Int(e) => Some(*e),
                    Literal::UInt(e) => i64::try_from(*e).ok(),
                    Literal::Str(e) => e.parse().ok(),
                    _ => None,
                })?;
                Ok(compare(op, n, &items))
            }
            Value::UInt(n) => {
                let items = coerce_all(op, actual, expected, |l| match l {
                    Literal::UInt(e) => Some(*e),
                    Literal::Int(e) => u64::try_from(*e).ok(),
                    Literal::Str(e) => e.parse().ok(),
                    _ => None,
                })?;
                Ok(compare(op, n, &items))
            }
            Value::Float(n) => {
                let items = coerce_all(op, actual, expected, |l| match l {
                    Literal::Float(e) => Some(*e),
                    Literal::Int(e) => Some(*e as f64),
                    Literal::UInt(e) => Some(*e as f64),
                    Literal::Str(e) => e.parse().ok(),
                    _ => None,
                })?;
                Ok(compare(op, n, &items))
            }
            Value::Bool(b) => {
                let items = coerce_all(op, actual, expected, |l| match l {
                    Literal::Bool(e) => Some(u8::from(*e)),
                    Literal::Int(0) | Literal::UInt(0) => Some(0),
                    Literal::Int(1) | Literal::UInt(1) => Some(1),
                    Literal::Str(e) => e.parse::<bool>().ok().map(u8::from),
                    _ => None,
                })?;
                Ok(compare(op, &u8::from(*b), &items))
            }
            Value::Time(t) => {
                let items = coerce_all(op, actual, expected, |l| match l {
                    Literal::Time(e) => Some(format_time(e)),
                    Literal::Str(e) => DateTime::parse_from_rfc3339(e)
                        .ok()
                        .map(|t| format_time(&t.with_timezone(&Utc))),
                    _ => None,
                })?;
                Ok(compare(op, &format_time(t), &items))
            }
            Value::Bytes(b) => {
                let items = coerce_all(op, actual, expected, |l| match l {
                    Literal::Bytes(e) => Some(hex::encode(e)),
                    Literal::Str(e) => Some(hex::encode(e.as_bytes())),
                    _ => None,
                })?;
                Ok(compare(op, &hex::encode(b), &items))
            }
            Value::List(_) | Value::Nested(_) => Err(ImitatorError::TypeMismatch {
                op: op.as_str(),
                actual: actual.kind(),
                expected: expected_kinds(expected),
            }),
        }
    }

    /// Returns whether `value` counts as null under the configured semantics.
    pub fn is_null(&self, value: &Value) -> bool {
        match self.null_semantics {
            NullSemantics::Strict => value.is_null(),
            NullSemantics::ZeroValue => value.is_zero(),
        }
    }
}

fn coerce_all<T>(
    op: Operator,
    actual: &Value,
    expected: &[Literal],
    coerce: impl Fn(&Literal) -> Option<T>,
) -> Result<Vec<T>> {
    expected
        .iter()
        .map(|literal| {
            coerce(literal).ok_or_else(|| ImitatorError::TypeMismatch {
                op: op.as_str(),
                actual: actual.kind(),
                expected: format!("{} {}", literal.kind(), literal),
            })
        })
        .collect()
}

fn expected_kinds(expected: &[Literal]) -> String {
    match expected.first() {
        Some(literal) => literal.kind().to_string(),
        None => "nothing".to_string(),
    }
}

/// Applies a non-null operator to a value and its coerced operands.
///
/// Ordering operators use the first operand; `in`/`notIn` test membership
/// in all operands; substring operators compare the display forms.
pub fn compare<T: PartialOrd + Display>(op: Operator, actual: &T, expected: &[T]) -> bool {
    match op {
        Operator::In => expected.iter().any(|e| e == actual),
        Operator::NotIn => !expected.iter().any(|e| e == actual),
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
            let Some(first) = expected.first() else {
                return false;
            };
            let (haystack, needle) = (actual.to_string(), first.to_string());
            match op {
                Operator::Contains => haystack.contains(&needle),
                Operator::StartsWith => haystack.starts_with(&needle),
                _ => haystack.ends_with(&needle),
            }
        }
        Operator::IsNull | Operator::IsNotNull => false,
        _ => {
            let Some(first) = expected.first() else {
                return false;
            };
            match actual.partial_cmp(first) {
                Some(ordering) => op.eval_ordering(ordering).unwrap_or(false),
                None => op == Operator::Ne,
            }
        }
    }
}

/// Orders two non-null values of the same kind, ascending.
///
/// Values of different kinds, lists and models are a
/// [`ImitatorError::TypeMismatch`].
pub fn order_values(a: &Value, b: &Value) -> Result<Ordering> {
    let ordering = match (a, b) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
        (Value::Bool(a), Value::Bool(b)) => u8::from(*a).cmp(&u8::from(*b)),
        (Value::Time(a), Value::Time(b)) => format_time(a).cmp(&format_time(b)),
        (Value::Bytes(a), Value::Bytes(b)) => hex::encode(a).cmp(&hex::encode(b)),
        _ => {
            return Err(ImitatorError::TypeMismatch {
                op: "order",
                actual: a.kind(),
                expected: b.kind().to_string(),
            })
        }
    };
    Ok(ordering)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::List;
    use chrono::TimeZone;

    fn check(op: Operator, actual: impl Into<Value>, expected: impl Into<Operand>) -> bool {
        Comparator::default()
            .compare_value(op, &actual.into(), Some(&expected.into()))
            .unwrap()
    }

    mod ordered {
        use super::*;

        #[test]
        fn integers() {
            assert!(check(Operator::Gt, 35i64, 30));
            assert!(!check(Operator::Gt, 25i64, 30));
            assert!(check(Operator::Ge, 30i64, 30));
            assert!(check(Operator::Le, 30i64, 31));
            assert!(check(Operator::Lt, -1i64, 0));
            assert!(check(Operator::Ne, 1i64, 2));
        }

        #[test]
        fn unsigned_and_signed_mix() {
            assert!(check(Operator::Eq, 7u64, 7i64));
            assert!(check(Operator::Gt, 1i64, 0u32));
            let err = Comparator::default()
                .compare_value(Operator::Eq, &Value::UInt(1), Some(&(-1).into()))
                .unwrap_err();
            assert!(matches!(err, ImitatorError::TypeMismatch { actual: "uint", .. }));
        }

        #[test]
        fn floats_accept_integers() {
            assert!(check(Operator::Gt, 100.5f64, 100));
            assert!(check(Operator::Eq, 2.0f64, 2u8));
            assert!(!check(Operator::Eq, f64::NAN, 1.0));
            assert!(check(Operator::Ne, f64::NAN, 1.0));
        }

        #[test]
        fn strings_from_numbers() {
            assert!(check(Operator::Eq, 42i64, "42"));
            assert!(check(Operator::Lt, 1.5f64, "2.5"));
        }

        #[test]
        fn strings() {
            assert!(check(Operator::Eq, "John", "John"));
            assert!(check(Operator::Lt, "Alice", "Bob"));
            assert!(!check(Operator::Eq, "john", "John"));
        }
    }

    mod kinds {
        use super::*;

        #[test]
        fn bools_reduce_to_bits() {
            assert!(check(Operator::Eq, true, true));
            assert!(check(Operator::Gt, true, false));
            assert!(check(Operator::Eq, true, 1));
            assert!(check(Operator::Eq, false, "false"));
            assert!(Comparator::default()
                .compare_value(Operator::Eq, &Value::Bool(true), Some(&2.into()))
                .is_err());
        }

        #[test]
        fn times_compare_at_second_precision() {
            let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
            let later = t + chrono::Duration::milliseconds(400);
            assert!(check(Operator::Eq, later, t));
            assert!(check(Operator::Eq, t, "2024-05-01T12:00:00+02:00"));
            assert!(check(Operator::Gt, t, "2024-04-30T00:00:00Z"));
        }

        #[test]
        fn bytes_compare_as_hex() {
            let v = Value::Bytes(b"abc".to_vec());
            let c = Comparator::default();
            assert!(c
                .compare_value(Operator::Eq, &v, Some(&Literal::Bytes(b"abc".to_vec()).into()))
                .unwrap());
            assert!(c.compare_value(Operator::Eq, &v, Some(&"abc".into())).unwrap());
            // "b" is 62 in hex
            assert!(c.compare_value(Operator::Contains, &v, Some(&"b".into())).unwrap());
        }

        #[test]
        fn lists_and_models_are_not_comparable() {
            let c = Comparator::default();
            let list = Value::List(List::Int(vec![1]));
            assert!(c.compare_value(Operator::Eq, &list, Some(&1.into())).is_err());
            let nested = Value::Nested(Model::new());
            assert!(c.compare_value(Operator::Eq, &nested, Some(&1.into())).is_err());
        }

        #[test]
        fn kind_mismatch_is_an_error() {
            let err = Comparator::default()
                .compare_value(Operator::Eq, &Value::from("a"), Some(&1.into()))
                .unwrap_err();
            assert_eq!(err.to_string(), "type mismatch: string eq int 1");
        }

        #[test]
        fn missing_operand_is_an_error() {
            assert!(Comparator::default()
                .compare_value(Operator::Eq, &Value::Int(1), None)
                .is_err());
        }
    }

    mod membership {
        use super::*;

        #[test]
        fn in_and_not_in() {
            assert!(check(Operator::In, 2i64, vec![1, 2, 3]));
            assert!(!check(Operator::In, 5i64, vec![1, 2, 3]));
            assert!(check(Operator::NotIn, 5i64, vec![1, 2, 3]));
            assert!(check(Operator::In, "b", vec!["a", "b"]));
        }

        #[test]
        fn empty_lists() {
            let empty = Operand::List(Vec::new());
            let c = Comparator::default();
            assert!(!c.compare_value(Operator::In, &Value::Int(1), Some(&empty)).unwrap());
            assert!(c.compare_value(Operator::NotIn, &Value::Int(1), Some(&empty)).unwrap());
        }
    }

    mod substrings {
        use super::*;

        #[test]
        fn case_sensitive() {
            assert!(check(Operator::Contains, "Num 12", "Num"));
            assert!(!check(Operator::Contains, "num 12", "Num"));
            assert!(check(Operator::StartsWith, "Num 12", "Num"));
            assert!(check(Operator::EndsWith, "Num 12", "12"));
            assert!(!check(Operator::EndsWith, "Num 12", "Num"));
        }

        #[test]
        fn numbers_are_stringified() {
            assert!(check(Operator::Contains, 1234i64, 23));
            assert!(check(Operator::StartsWith, 1234i64, "12"));
        }
    }

    mod nulls {
        use super::*;

        #[test]
        fn strict_semantics() {
            let c = Comparator::default();
            assert!(c.compare_value(Operator::IsNull, &Value::Null, None).unwrap());
            assert!(!c.compare_value(Operator::IsNull, &Value::from(""), None).unwrap());
            assert!(c.compare_value(Operator::IsNotNull, &Value::Int(0), None).unwrap());
        }

        #[test]
        fn zero_value_semantics() {
            let c = Comparator::new(NullSemantics::ZeroValue);
            assert!(c.compare_value(Operator::IsNull, &Value::Null, None).unwrap());
            assert!(c.compare_value(Operator::IsNull, &Value::from(""), None).unwrap());
            assert!(c.compare_value(Operator::IsNull, &Value::Bool(false), None).unwrap());
            assert!(!c.compare_value(Operator::IsNull, &Value::Int(3), None).unwrap());
        }

        #[test]
        fn null_matches_nothing_else() {
            let c = Comparator::default();
            for op in [Operator::Eq, Operator::Ne, Operator::Gt, Operator::Contains] {
                assert!(!c.compare_value(op, &Value::Null, Some(&1.into())).unwrap());
            }
            assert!(!c
                .compare_value(Operator::NotIn, &Value::Null, Some(&vec![1].into()))
                .unwrap());
        }
    }

    #[test]
    fn matches_resolves_relations() {
        let model = Model::new()
            .with_field("id", 1i64)
            .with_relation("Subject", Model::new().with_field("enabled", true));
        let c = Comparator::default();
        let clause = Where::with_table(Some("Subject"), "enabled", Operator::Eq, true);
        assert!(c.matches(&model, &clause).unwrap());

        let clause = Where::new("missing", Operator::Eq, 1);
        let err = c.matches(&model, &clause).unwrap_err();
        assert!(matches!(err, ImitatorError::FieldNotFound { .. }));
    }

    #[test]
    fn value_ordering() {
        assert_eq!(order_values(&Value::Int(1), &Value::Int(2)).unwrap(), Ordering::Less);
        assert_eq!(
            order_values(&Value::Bool(false), &Value::Bool(true)).unwrap(),
            Ordering::Less
        );
        assert!(order_values(&Value::Int(1), &Value::from("a")).is_err());
    }
}
