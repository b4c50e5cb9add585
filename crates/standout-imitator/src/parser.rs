//! Query text parsing.
//!
//! Four fragments are parsed independently:
//!
//! | Fragment | Syntax | Result |
//! |----------|--------|--------|
//! | filter | `name eq 'John' and age gt 30` | [`Where`] clauses |
//! | order by | `name asc, users.id:desc` | [`OrderBy`] clauses |
//! | limit | `10` | at most one [`Limit`] |
//! | offset | `20` | at most one [`Offset`] |
//!
//! Filter clauses are joined by implicit AND. The words `and`/`AND` and
//! commas between clauses are separators only. [`QueryFragments`] combines
//! the four fragments of a request into one expression list.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::trace;

use crate::config::{Pagination, QueryParams};
use crate::error::{ImitatorError, Result};
use crate::expression::{Direction, Expression, Limit, Offset, Operator, OrderBy, Where};
use crate::naming::split_dot;
use crate::value::{Literal, Operand};

static FILTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<field>[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?)\s+(?:(?P<nullop>isNull|isNotNull)\b|(?P<op>[A-Za-z]+)\s*(?P<value>'[^']*'|\([^)]*\)|-?\d+(?:\.\d+)?))",
    )
    .unwrap()
});

/// Parses a limit fragment. An empty fragment yields no clause.
///
/// ```
/// use standout_imitator::parser::parse_limit;
///
/// assert_eq!(parse_limit(" 10 ").unwrap()[0].0, 10);
/// assert!(parse_limit("").unwrap().is_empty());
/// assert!(parse_limit("-1").is_err());
/// ```
pub fn parse_limit(input: &str) -> Result<Vec<Limit>> {
    Ok(parse_count("limit", input)?.map(Limit).into_iter().collect())
}

/// Parses an offset fragment. An empty fragment yields no clause.
pub fn parse_offset(input: &str) -> Result<Vec<Offset>> {
    Ok(parse_count("offset", input)?.map(Offset).into_iter().collect())
}

fn parse_count(fragment: &'static str, input: &str) -> Result<Option<usize>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.starts_with('-') {
        return Err(ImitatorError::parse(fragment, trimmed, "must not be negative"));
    }
    trimmed
        .parse::<usize>()
        .map(Some)
        .map_err(|e| ImitatorError::parse(fragment, trimmed, e.to_string()))
}

/// Parses a filter fragment into its clauses, in textual order.
///
/// ```
/// use standout_imitator::parser::parse_filter;
///
/// let clauses = parse_filter("name eq 'John' and users.age gt 30").unwrap();
/// assert_eq!(clauses.len(), 2);
/// assert_eq!(clauses[1].to_string(), "users.age gt 30");
/// ```
pub fn parse_filter(input: &str) -> Result<Vec<Where>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let clauses = FILTER_RE
        .captures_iter(trimmed)
        .map(|caps| clause_from_captures(&caps))
        .collect::<Result<Vec<_>>>()?;

    if clauses.is_empty() {
        return Err(ImitatorError::parse("filter", trimmed, "no clause found"));
    }
    trace!(input = trimmed, clauses = clauses.len(), "parsed filter");
    Ok(clauses)
}

fn clause_from_captures(caps: &Captures<'_>) -> Result<Where> {
    let (table, column) = split_dot(&caps["field"]);

    if let Some(op) = caps.name("nullop") {
        let operator: Operator = op.as_str().parse()?;
        return Ok(Where {
            table: table.map(str::to_string),
            column: column.to_string(),
            operator,
            value: None,
        });
    }

    let operator: Operator = caps["op"].parse()?;
    if operator.is_null_check() {
        return Err(ImitatorError::parse(
            "filter",
            &caps[0],
            format!("{operator} takes no value"),
        ));
    }

    let raw = &caps["value"];
    let operand = if let Some(inner) = raw.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        if !operator.takes_list() {
            return Err(ImitatorError::parse(
                "filter",
                &caps[0],
                format!("a list needs in or notIn, not {operator}"),
            ));
        }
        Operand::List(split_list(inner).into_iter().map(list_element).collect())
    } else if let Some(unquoted) = unquote(raw) {
        Operand::Single(Literal::Str(unquoted.to_string()))
    } else {
        Operand::Single(number(raw).ok_or_else(|| {
            ImitatorError::parse("filter", &caps[0], format!("{raw} is not a number"))
        })?)
    };

    Ok(Where::with_table(table, column, operator, operand))
}

fn unquote(s: &str) -> Option<&str> {
    s.strip_prefix('\'').and_then(|r| r.strip_suffix('\''))
}

fn number(s: &str) -> Option<Literal> {
    let numeric = !s.is_empty()
        && s.strip_prefix('-')
            .unwrap_or(s)
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.');
    if !numeric {
        return None;
    }
    if s.contains('.') {
        return s.parse().ok().map(Literal::Float);
    }
    s.parse::<i64>()
        .map(Literal::Int)
        .or_else(|_| s.parse::<u64>().map(Literal::UInt))
        .ok()
}

fn list_element(element: &str) -> Literal {
    if let Some(unquoted) = unquote(element) {
        return Literal::Str(unquoted.to_string());
    }
    number(element).unwrap_or_else(|| Literal::Str(element.to_string()))
}

/// Splits a list body on commas outside single quotes.
fn split_list(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            ',' if !quoted => {
                items.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(body[start..].trim());
    items.retain(|item| !item.is_empty());
    items
}

/// Parses an order-by fragment.
///
/// Entries are comma separated. Within an entry the field and direction are
/// separated by `:` or whitespace. A missing direction is
/// [`Direction::Unspecified`].
pub fn parse_order_by(input: &str) -> Result<Vec<OrderBy>> {
    let mut clauses = Vec::new();
    for entry in input.split(',') {
        let entry = entry.trim().replace(':', " ");
        if entry.trim().is_empty() {
            continue;
        }
        let (field, word) = match entry.trim().split_once(char::is_whitespace) {
            Some((field, word)) => (field, word.trim()),
            None => (entry.trim(), ""),
        };
        let direction = if word.is_empty() {
            Direction::Unspecified
        } else {
            Direction::from_word(word).ok_or_else(|| {
                ImitatorError::parse("order by", entry.trim(), format!("unknown direction {word}"))
            })?
        };
        let (table, column) = split_dot(field);
        clauses.push(OrderBy::with_table(table, column, direction));
    }
    trace!(input, clauses = clauses.len(), "parsed order by");
    Ok(clauses)
}

/// The raw query fragments of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFragments {
    pub filter: String,
    pub order_by: String,
    pub limit: String,
    pub offset: String,
}

impl QueryFragments {
    /// Picks the fragments out of decoded request parameters.
    ///
    /// Unknown parameters are ignored. A repeated parameter keeps its last
    /// value.
    pub fn from_pairs<I, K, V>(pairs: I, params: &QueryParams) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut fragments = Self::default();
        for (key, value) in pairs {
            let key = key.as_ref();
            let slot = if key == params.filter {
                &mut fragments.filter
            } else if key == params.order_by {
                &mut fragments.order_by
            } else if key == params.limit {
                &mut fragments.limit
            } else if key == params.offset {
                &mut fragments.offset
            } else {
                continue;
            };
            *slot = value.into();
        }
        fragments
    }

    /// Parses all fragments.
    ///
    /// The result holds the limit, the offset, the filter clauses and the
    /// order-by clauses, in that order. An empty limit or offset fragment
    /// falls back to `defaults`.
    pub fn parse(&self, defaults: &Pagination) -> Result<Vec<Expression>> {
        let mut expressions: Vec<Expression> = Vec::new();

        let limits = parse_limit(&self.limit)?;
        if limits.is_empty() {
            expressions.extend(defaults.limit.map(|n| Expression::from(Limit(n))));
        } else {
            expressions.extend(limits.into_iter().map(Expression::from));
        }

        let offsets = parse_offset(&self.offset)?;
        if offsets.is_empty() {
            expressions.extend(defaults.offset.map(|n| Expression::from(Offset(n))));
        } else {
            expressions.extend(offsets.into_iter().map(Expression::from));
        }

        expressions.extend(parse_filter(&self.filter)?.into_iter().map(Expression::from));
        expressions.extend(parse_order_by(&self.order_by)?.into_iter().map(Expression::from));
        Ok(expressions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(input: &str) -> Vec<String> {
        parse_filter(input)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    mod limit_offset {
        use super::*;

        #[test]
        fn values() {
            assert_eq!(parse_limit("10").unwrap(), vec![Limit(10)]);
            assert_eq!(parse_offset(" 0 ").unwrap(), vec![Offset(0)]);
            assert!(parse_limit("   ").unwrap().is_empty());
        }

        #[test]
        fn rejects_negative_and_garbage() {
            let err = parse_limit("-1").unwrap_err();
            assert!(err.to_string().contains("\"-1\""));
            let err = parse_offset("ten").unwrap_err();
            assert!(matches!(err, ImitatorError::Parse { fragment: "offset", .. }));
        }
    }

    mod filter {
        use super::*;

        #[test]
        fn simple_clauses() {
            let clauses = parse_filter("age gt 30").unwrap();
            assert_eq!(clauses.len(), 1);
            assert_eq!(clauses[0].column, "age");
            assert_eq!(clauses[0].operator, Operator::Gt);
            assert_eq!(clauses[0].value, Some(Operand::Single(Literal::Int(30))));
        }

        #[test]
        fn literal_kinds() {
            let clauses = parse_filter("a eq 'x' and b eq 1.5 and c eq -2").unwrap();
            assert_eq!(clauses[0].value, Some(Operand::Single(Literal::from("x"))));
            assert_eq!(clauses[1].value, Some(Operand::Single(Literal::Float(1.5))));
            assert_eq!(clauses[2].value, Some(Operand::Single(Literal::Int(-2))));
        }

        #[test]
        fn whole_floats_stay_floats() {
            assert_eq!(rendered("price eq 2.0"), vec!["price eq 2.0"]);
            let reparsed = parse_filter(&rendered("price eq 2.0")[0]).unwrap();
            assert_eq!(reparsed[0].value, Some(Operand::Single(Literal::Float(2.0))));
        }

        #[test]
        fn separators_are_not_combinators() {
            assert_eq!(
                rendered("name eq 'John' AND age ge 18, id ne 3"),
                vec!["name eq 'John'", "age ge 18", "id ne 3"]
            );
        }

        #[test]
        fn quoted_values_keep_keywords() {
            assert_eq!(
                rendered("name eq 'a and b eq 1'"),
                vec!["name eq 'a and b eq 1'"]
            );
        }

        #[test]
        fn qualified_fields() {
            let clauses = parse_filter("Subject.enabled eq 1").unwrap();
            assert_eq!(clauses[0].table.as_deref(), Some("Subject"));
            assert_eq!(clauses[0].column, "enabled");
        }

        #[test]
        fn null_checks() {
            let clauses = parse_filter("deleted_at isNull and name isNotNull").unwrap();
            assert_eq!(clauses[0].operator, Operator::IsNull);
            assert_eq!(clauses[0].value, None);
            assert_eq!(clauses[1].operator, Operator::IsNotNull);
        }

        #[test]
        fn lists() {
            let clauses = parse_filter("id in (1, 2,3) and name notIn ('a, b', c)").unwrap();
            assert_eq!(
                clauses[0].value,
                Some(Operand::List(vec![
                    Literal::Int(1),
                    Literal::Int(2),
                    Literal::Int(3)
                ]))
            );
            assert_eq!(
                clauses[1].value,
                Some(Operand::List(vec![Literal::from("a, b"), Literal::from("c")]))
            );
        }

        #[test]
        fn single_in_value_becomes_list() {
            assert_eq!(rendered("id in 4"), vec!["id in (4)"]);
        }

        #[test]
        fn list_requires_membership_operator() {
            let err = parse_filter("id eq (1, 2)").unwrap_err();
            assert!(matches!(err, ImitatorError::Parse { fragment: "filter", .. }));
        }

        #[test]
        fn unsupported_operator_is_named() {
            let err = parse_filter("name like 'x'").unwrap_err();
            assert!(matches!(err, ImitatorError::UnsupportedOperator(ref op) if op == "like"));
        }

        #[test]
        fn no_clause_is_an_error() {
            assert!(parse_filter("").unwrap().is_empty());
            let err = parse_filter("nothing to see").unwrap_err();
            assert!(matches!(err, ImitatorError::Parse { .. }));
        }
    }

    mod order_by {
        use super::*;

        #[test]
        fn directions() {
            let clauses = parse_order_by("id desc, name:asc, age, users.created_at D").unwrap();
            assert_eq!(clauses.len(), 4);
            assert_eq!(clauses[0].direction, Direction::Descending);
            assert_eq!(clauses[1].direction, Direction::Ascending);
            assert_eq!(clauses[1].column, "name");
            assert_eq!(clauses[2].direction, Direction::Unspecified);
            assert_eq!(clauses[3].table.as_deref(), Some("users"));
            assert_eq!(clauses[3].direction, Direction::Descending);
        }

        #[test]
        fn skips_empty_entries() {
            assert_eq!(parse_order_by(" , id asc ,, ").unwrap().len(), 1);
            assert!(parse_order_by("").unwrap().is_empty());
        }

        #[test]
        fn rejects_unknown_direction() {
            let err = parse_order_by("id sideways").unwrap_err();
            assert!(matches!(err, ImitatorError::Parse { fragment: "order by", .. }));
        }
    }

    mod fragments {
        use super::*;

        #[test]
        fn from_pairs_uses_param_names() {
            let pairs = [
                ("$filter", "age gt 30"),
                ("$sort", "id desc"),
                ("$limit", "5"),
                ("other", "x"),
            ];
            let fragments = QueryFragments::from_pairs(pairs, &QueryParams::default());
            assert_eq!(fragments.filter, "age gt 30");
            assert_eq!(fragments.order_by, "id desc");
            assert_eq!(fragments.limit, "5");
            assert_eq!(fragments.offset, "");
        }

        #[test]
        fn combined_order() {
            let fragments = QueryFragments {
                filter: "a eq 1 and b eq 2".into(),
                order_by: "a desc".into(),
                limit: "10".into(),
                offset: "20".into(),
            };
            let rendered: Vec<String> = fragments
                .parse(&Pagination::default())
                .unwrap()
                .iter()
                .map(ToString::to_string)
                .collect();
            assert_eq!(
                rendered,
                vec!["Limit 10", "Offset 20", "a eq 1", "b eq 2", "a DESC"]
            );
        }

        #[test]
        fn defaults_fill_missing_paging() {
            let fragments = QueryFragments {
                limit: "3".into(),
                ..Default::default()
            };
            let expressions = fragments.parse(&Pagination::new(50, 7)).unwrap();
            assert_eq!(
                expressions,
                vec![Expression::Limit(Limit(3)), Expression::Offset(Offset(7))]
            );
        }
    }
}
