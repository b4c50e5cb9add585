//! Lowering of expressions into SQL-builder fragments.
//!
//! A real repository hands these fragments to its query builder; the
//! in-memory double never uses them. Identifiers are double-quoted, and a
//! table-qualified column adds an inner join on `<table>.id = <table>_id`.

use crate::expression::{Expression, GroupBy, Operator, OrderBy, Where};
use crate::naming::{pluralize, snake_case};
use crate::value::{Literal, Operand};

/// One SQL-builder fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryMod {
    /// A condition with `?` placeholders and its bound arguments.
    Where { clause: String, args: Vec<Literal> },
    InnerJoin(String),
    OrderBy(String),
    GroupBy(String),
    Limit(usize),
    Offset(usize),
    /// Relations to eager-load.
    Load(Vec<String>),
    Select(Vec<String>),
}

impl Expression {
    /// Lowers this expression into query mods.
    ///
    /// ```
    /// use standout_imitator::{Operator, QueryMod, Where, Expression};
    ///
    /// let mods = Expression::from(Where::new("User/age", Operator::Gt, 30)).query_mods();
    /// assert_eq!(
    ///     mods[0],
    ///     QueryMod::InnerJoin(r#""users" ON "users"."id" = "user_id""#.to_string())
    /// );
    /// assert!(matches!(
    ///     &mods[1],
    ///     QueryMod::Where { clause, .. } if clause == r#""users"."age" > ?"#
    /// ));
    /// ```
    pub fn query_mods(&self) -> Vec<QueryMod> {
        match self {
            Expression::Where(w) => where_mods(w),
            Expression::OrderBy(o) => order_by_mods(o),
            Expression::GroupBy(g) => group_by_mods(g),
            Expression::Limit(l) => vec![QueryMod::Limit(l.0)],
            Expression::Offset(o) => vec![QueryMod::Offset(o.0)],
            Expression::Relation(r) => vec![QueryMod::Load(r.tables.clone())],
            Expression::Select(s) => vec![QueryMod::Select(s.columns.clone())],
        }
    }
}

/// Lowers a whole expression list, in order.
pub fn query_mods(expressions: &[Expression]) -> Vec<QueryMod> {
    expressions.iter().flat_map(Expression::query_mods).collect()
}

fn qualified_column(table: Option<&str>, column: &str, mods: &mut Vec<QueryMod>) -> String {
    let column = format!("\"{column}\"");
    let Some(table) = table.filter(|t| !t.is_empty()) else {
        return column;
    };
    let snake = snake_case(table);
    let plural = format!("\"{}\"", pluralize(&snake));
    mods.push(QueryMod::InnerJoin(format!(
        "{plural} ON {plural}.\"id\" = \"{snake}_id\""
    )));
    format!("{plural}.{column}")
}

fn where_mods(w: &Where) -> Vec<QueryMod> {
    let mut mods = Vec::new();
    let column = qualified_column(w.table.as_deref(), &w.column, &mut mods);
    let args: Vec<Literal> = w
        .value
        .as_ref()
        .map(|v| v.literals().to_vec())
        .unwrap_or_default();

    let (clause, args) = match w.operator {
        Operator::Eq => (format!("{column} = ?"), args),
        Operator::Ne => (format!("{column} <> ?"), args),
        Operator::Gt => (format!("{column} > ?"), args),
        Operator::Ge => (format!("{column} >= ?"), args),
        Operator::Lt => (format!("{column} < ?"), args),
        Operator::Le => (format!("{column} <= ?"), args),
        Operator::In => (format!("{column} IN ?"), args),
        Operator::NotIn => (format!("{column} NOT IN ?"), args),
        Operator::Contains => (format!("{column} LIKE ?"), like(&w.value, "%", "%")),
        Operator::StartsWith => (format!("{column} LIKE ?"), like(&w.value, "", "%")),
        Operator::EndsWith => (format!("{column} LIKE ?"), like(&w.value, "%", "")),
        Operator::IsNull => (format!("{column} IS NULL"), Vec::new()),
        Operator::IsNotNull => (format!("{column} IS NOT NULL"), Vec::new()),
    };
    mods.push(QueryMod::Where { clause, args });
    mods
}

fn like(value: &Option<Operand>, prefix: &str, suffix: &str) -> Vec<Literal> {
    value
        .as_ref()
        .and_then(|v| v.literals().first())
        .map(|l| {
            let bare = match l {
                Literal::Str(s) => s.clone(),
                other => other.to_string(),
            };
            vec![Literal::Str(format!("{prefix}{bare}{suffix}"))]
        })
        .unwrap_or_default()
}

fn order_by_mods(o: &OrderBy) -> Vec<QueryMod> {
    let mut mods = Vec::new();
    let column = qualified_column(o.table.as_deref(), &o.column, &mut mods);
    let keyword = o.direction.keyword();
    mods.push(QueryMod::OrderBy(if keyword.is_empty() {
        column
    } else {
        format!("{column} {keyword}")
    }));
    mods
}

fn group_by_mods(g: &GroupBy) -> Vec<QueryMod> {
    let mut mods = Vec::new();
    let column = qualified_column(g.table.as_deref(), &g.column, &mut mods);
    mods.push(QueryMod::GroupBy(column));
    mods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Direction, Limit, Offset, Relation, Select};

    fn single(w: Where) -> (String, Vec<Literal>) {
        match Expression::from(w).query_mods().pop() {
            Some(QueryMod::Where { clause, args }) => (clause, args),
            other => panic!("unexpected mod: {other:?}"),
        }
    }

    #[test]
    fn comparison_operators() {
        let cases = [
            (Operator::Eq, "\"age\" = ?"),
            (Operator::Ne, "\"age\" <> ?"),
            (Operator::Gt, "\"age\" > ?"),
            (Operator::Ge, "\"age\" >= ?"),
            (Operator::Lt, "\"age\" < ?"),
            (Operator::Le, "\"age\" <= ?"),
        ];
        for (op, expected) in cases {
            let (clause, args) = single(Where::new("age", op, 30));
            assert_eq!(clause, expected);
            assert_eq!(args, vec![Literal::Int(30)]);
        }
    }

    #[test]
    fn membership_binds_every_element() {
        let (clause, args) = single(Where::new("id", Operator::In, vec![1, 2]));
        assert_eq!(clause, "\"id\" IN ?");
        assert_eq!(args.len(), 2);
        let (clause, _) = single(Where::new("id", Operator::NotIn, vec![1, 2]));
        assert_eq!(clause, "\"id\" NOT IN ?");
    }

    #[test]
    fn like_patterns() {
        let (_, args) = single(Where::new("name", Operator::Contains, "Num"));
        assert_eq!(args, vec![Literal::from("%Num%")]);
        let (_, args) = single(Where::new("name", Operator::StartsWith, "Num"));
        assert_eq!(args, vec![Literal::from("Num%")]);
        let (_, args) = single(Where::new("name", Operator::EndsWith, "Num"));
        assert_eq!(args, vec![Literal::from("%Num")]);
    }

    #[test]
    fn null_checks_bind_nothing() {
        let (clause, args) = single(Where::is_null("deleted_at"));
        assert_eq!(clause, "\"deleted_at\" IS NULL");
        assert!(args.is_empty());
        let (clause, _) = single(Where::is_not_null("deleted_at"));
        assert_eq!(clause, "\"deleted_at\" IS NOT NULL");
    }

    #[test]
    fn qualified_columns_join() {
        let mods = Expression::from(OrderBy::new("OrderItem/price", Direction::Descending))
            .query_mods();
        assert_eq!(
            mods,
            vec![
                QueryMod::InnerJoin(
                    "\"order_items\" ON \"order_items\".\"id\" = \"order_item_id\"".into()
                ),
                QueryMod::OrderBy("\"order_items\".\"price\" DESC".into()),
            ]
        );
    }

    #[test]
    fn other_expressions() {
        let mods = query_mods(&[
            GroupBy::new("team").into(),
            OrderBy::new("id", Direction::Unspecified).into(),
            Limit::new(10).into(),
            Offset::new(5).into(),
            Relation::new(["Subject"]).into(),
            Select::new(["id"]).into(),
        ]);
        assert_eq!(
            mods,
            vec![
                QueryMod::GroupBy("\"team\"".into()),
                QueryMod::OrderBy("\"id\"".into()),
                QueryMod::Limit(10),
                QueryMod::Offset(5),
                QueryMod::Load(vec!["Subject".into()]),
                QueryMod::Select(vec!["id".into()]),
            ]
        );
    }
}
