//! End-to-end tests: query fragments parsed and evaluated over derived records.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use standout_imitator::{
    evaluate, parser, Direction, Evaluator, EvaluatorOptions, Expression, GroupBy, ImitatorError,
    Limit, NullOrder, NullSemantics, Offset, Operator, OrderBy, Pagination, QueryFragments,
    QueryParams, Record, Where,
};

// ============================================================================
// Test fixtures
// ============================================================================

#[derive(Record, Debug, Clone, PartialEq)]
struct Person {
    id: u32,
    name: String,
    age: i64,
}

fn people() -> BTreeMap<&'static str, Person> {
    BTreeMap::from([
        ("A", Person { id: 1, name: "A".into(), age: 25 }),
        ("B", Person { id: 2, name: "B".into(), age: 35 }),
        ("C", Person { id: 3, name: "C".into(), age: 40 }),
    ])
}

#[derive(Record, Debug, Clone)]
struct Subject {
    id: u32,
    enabled: bool,
}

#[derive(Record, Debug, Clone)]
struct TaskRelations {
    #[column("Subject")]
    subject: Option<Subject>,
}

#[derive(Record, Debug, Clone)]
struct Task {
    id: u32,
    name: String,
    is_enabled: bool,
    deleted_at: Option<DateTime<Utc>>,
    #[column("R", relations)]
    r: Option<TaskRelations>,
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Seven tasks: ids 1..=7, names "Num 1".."Num 7" except task 4, which is
/// "Other". Odd ids point at an enabled subject.
fn tasks() -> BTreeMap<u32, Task> {
    let enabled = [true, false, true, true, false, true, false];
    (1..=7u32)
        .map(|id| {
            let name = if id == 4 { "Other".to_string() } else { format!("Num {id}") };
            let task = Task {
                id,
                name,
                is_enabled: enabled[id as usize - 1],
                deleted_at: (id % 3 == 0).then(|| base_time() + Duration::days(id as i64)),
                r: Some(TaskRelations {
                    subject: Some(Subject { id: id * 10, enabled: id % 2 == 1 }),
                }),
            };
            (id, task)
        })
        .collect()
}

fn ids(found: &[&Task]) -> Vec<u32> {
    found.iter().map(|t| t.id).collect()
}

fn filter_tasks(data: &BTreeMap<u32, Task>, filter: &str) -> Vec<u32> {
    let clauses = parser::parse_filter(filter).unwrap();
    ids(&evaluate(data, &clauses, &[], &[]).unwrap())
}

fn filter_error(data: &BTreeMap<u32, Task>, filter: &str) -> ImitatorError {
    let clauses = parser::parse_filter(filter).unwrap();
    evaluate(data, &clauses, &[], &[]).unwrap_err()
}

// ============================================================================
// Where
// ============================================================================

#[test]
fn filter_greater_than() {
    let data = people();
    let filter = parser::parse_filter("age gt 30").unwrap();
    let found = evaluate(&data, &filter, &[], &[]).unwrap();
    let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["B", "C"]);
}

#[test]
fn filter_contains_is_case_sensitive() {
    let data = tasks();
    assert_eq!(filter_tasks(&data, "name contains 'Num'"), [1, 2, 3, 5, 6, 7]);
    assert!(filter_tasks(&data, "name contains 'num'").is_empty());
}

#[test]
fn filter_clauses_are_conjunctive() {
    let data = tasks();
    let filter = parser::parse_filter("name startswith 'Num' and id le 3 and id ne 2").unwrap();
    assert_eq!(ids(&evaluate(&data, &filter, &[], &[]).unwrap()), [1, 3]);
}

#[test]
fn filter_membership() {
    let data = tasks();
    assert_eq!(filter_tasks(&data, "id in (2, 4, 9)"), [2, 4]);
    assert_eq!(
        filter_tasks(&data, "name notIn ('Num 1', 'Other')"),
        [2, 3, 5, 6, 7]
    );
}

#[test]
fn filter_on_relation_column() {
    let data = tasks();
    let references = [
        "Subject.enabled eq 1",
        "subjects.enabled eq 1",
        "subject.enabled eq 'true'",
    ];
    for reference in references {
        assert_eq!(filter_tasks(&data, reference), [1, 3, 5, 7], "{reference}");
    }

    let filter = [Where::with_table(Some("Subject"), "id", Operator::Ge, 60)];
    assert_eq!(ids(&evaluate(&data, &filter, &[], &[]).unwrap()), [6, 7]);
}

#[test]
fn filter_null_checks() {
    let data = tasks();
    assert_eq!(filter_tasks(&data, "deleted_at isNotNull"), [3, 6]);

    let found = evaluate(&data, &[Where::is_null("deleted_at")], &[], &[]).unwrap();
    assert_eq!(ids(&found), [1, 2, 4, 5, 7]);
}

#[test]
fn zero_value_semantics_treat_false_as_null() {
    let data = tasks();
    let evaluator = Evaluator::new(EvaluatorOptions {
        null_semantics: NullSemantics::ZeroValue,
        ..EvaluatorOptions::default()
    });
    let found = evaluator
        .evaluate(&data, &[Where::is_null("is_enabled")], &[], &[])
        .unwrap();
    assert_eq!(ids(&found), [2, 5, 7]);

    let strict = Evaluator::default()
        .evaluate(&data, &[Where::is_null("is_enabled")], &[], &[])
        .unwrap();
    assert!(strict.is_empty());
}

#[test]
fn filter_times_by_rfc3339_literal() {
    let data = tasks();
    let cutoff = (base_time() + Duration::days(4)).to_rfc3339();
    let filter = parser::parse_filter(&format!("deleted_at gt '{cutoff}'")).unwrap();
    assert_eq!(ids(&evaluate(&data, &filter, &[], &[]).unwrap()), [6]);
}

#[test]
fn filter_errors() {
    let data = tasks();

    let err = filter_error(&data, "missing eq 1");
    assert!(matches!(err, ImitatorError::FieldNotFound { .. }), "{err}");

    let err = filter_error(&data, "name eq 5");
    assert!(matches!(err, ImitatorError::TypeMismatch { .. }), "{err}");

    let err = filter_error(&data, "Owner.id eq 1");
    assert!(matches!(err, ImitatorError::FieldNotFound { .. }), "{err}");

    assert!(matches!(
        parser::parse_filter("id like 3"),
        Err(ImitatorError::UnsupportedOperator(_))
    ));
}

// ============================================================================
// OrderBy
// ============================================================================

#[test]
fn order_by_id_descending() {
    let data = tasks();
    let order = parser::parse_order_by("id desc").unwrap();
    assert_eq!(ids(&evaluate(&data, &[], &[], &order).unwrap()), [7, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn order_by_multiple_keys_is_stable() {
    let data = tasks();
    let order = parser::parse_order_by("is_enabled:desc, id").unwrap();
    assert_eq!(ids(&evaluate(&data, &[], &[], &order).unwrap()), [1, 3, 4, 6, 2, 5, 7]);

    let order = [OrderBy::with_table(Some("Subject"), "enabled", Direction::Ascending)];
    assert_eq!(ids(&evaluate(&data, &[], &[], &order).unwrap()), [2, 4, 6, 1, 3, 5, 7]);
}

#[test]
fn nulls_sort_first_in_both_directions() {
    let data = tasks();
    for direction in [Direction::Ascending, Direction::Descending] {
        let order = [OrderBy::new("deleted_at", direction)];
        let found = ids(&evaluate(&data, &[], &[], &order).unwrap());
        assert_eq!(&found[..5], [1, 2, 4, 5, 7], "{direction:?}");
    }

    let order = [OrderBy::new("deleted_at", Direction::Descending)];
    assert_eq!(ids(&evaluate(&data, &[], &[], &order).unwrap())[5..], [6, 3]);
}

#[test]
fn nulls_can_sort_last() {
    let data = tasks();
    let evaluator = Evaluator::new(EvaluatorOptions {
        nulls: NullOrder::Last,
        ..EvaluatorOptions::default()
    });
    let order = [OrderBy::new("deleted_at", Direction::Ascending)];
    let found = evaluator.evaluate(&data, &[], &[], &order).unwrap();
    assert_eq!(ids(&found), [3, 6, 1, 2, 4, 5, 7]);
}

#[test]
fn order_by_missing_column_fails_for_every_model() {
    let data = people();
    let order = [OrderBy::new("height", Direction::Ascending)];
    let err = evaluate(&data, &[], &[], &order).unwrap_err();
    match err {
        ImitatorError::Sort(errors) => assert_eq!(errors.len(), 3),
        other => panic!("expected sort error, got {other}"),
    }
}

// ============================================================================
// GroupBy
// ============================================================================

#[test]
fn group_by_keeps_last_of_each_value() {
    let data = tasks();
    let found = evaluate(&data, &[], &[GroupBy::new("is_enabled")], &[]).unwrap();
    assert_eq!(ids(&found), [6, 7]);
}

#[test]
fn group_by_then_order_by() {
    let data = tasks();
    let found = evaluate(
        &data,
        &[],
        &[GroupBy::new("is_enabled")],
        &[OrderBy::new("id", Direction::Descending)],
    )
    .unwrap();
    assert_eq!(ids(&found), [7, 6]);
}

#[test]
fn group_by_relation_column() {
    let data = tasks();
    let group = [GroupBy::with_table(Some("Subject"), "enabled")];
    assert_eq!(ids(&evaluate(&data, &[], &group, &[]).unwrap()), [7, 6]);
}

// ============================================================================
// Paging and full requests
// ============================================================================

#[test]
fn limit_fragments() {
    assert!(matches!(parser::parse_limit("-1"), Err(ImitatorError::Parse { .. })));
    assert!(parser::parse_limit("").unwrap().is_empty());
    assert_eq!(parser::parse_offset("3").unwrap(), [Offset(3)]);
}

#[test]
fn expressions_apply_offset_then_limit() {
    let data = tasks();
    let expressions: Vec<Expression> = vec![
        OrderBy::new("id", Direction::Ascending).into(),
        Limit::new(2).into(),
        Offset::new(3).into(),
    ];
    let found = Evaluator::default().evaluate_expressions(&data, &expressions).unwrap();
    assert_eq!(ids(&found), [4, 5]);
}

#[test]
fn request_parameters_end_to_end() {
    let data = tasks();
    let params = QueryParams::default();
    let fragments = QueryFragments::from_pairs(
        [
            ("$filter", "name startswith 'Num' and is_enabled eq 1"),
            ("$sort", "id:desc"),
            ("$limit", "2"),
            ("page", "ignored"),
        ],
        &params,
    );
    let expressions = fragments.parse(&Pagination::new(50, 1)).unwrap();

    let rendered: Vec<_> = expressions.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        ["Limit 2", "Offset 1", "name startswith 'Num'", "is_enabled eq 1", "id DESC"]
    );

    let found = Evaluator::default().evaluate_expressions(&data, &expressions).unwrap();
    assert_eq!(ids(&found), [3, 1]);
}

#[test]
fn empty_request_uses_default_paging() {
    let expressions = QueryFragments::default().parse(&Pagination::new(10, 0)).unwrap();
    assert_eq!(expressions, vec![Expression::from(Limit(10)), Expression::from(Offset(0))]);

    let expressions = QueryFragments::default().parse(&Pagination::default()).unwrap();
    assert!(expressions.is_empty());
}
