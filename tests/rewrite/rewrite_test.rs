//! Physical table substitution and clause edits on parsed queries.

use std::collections::HashMap;

use bkquery::bridge::convert_to_expression;
use bkquery::model::TimeWindow;
use bkquery::rewrite::{
    collect_table_names, push_partition_predicate, strip_ordering, transform_table, RewriteError,
};
use chrono::NaiveDate;
use sqlparser::ast::SetExpr;

fn suffixes() -> Vec<String> {
    vec!["doris".to_string()]
}

fn names(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn january() -> TimeWindow {
    TimeWindow::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .unwrap()
}

fn rewrite(sql: &str, map: &[(&str, &str)]) -> String {
    let query = convert_to_expression(sql).unwrap();
    transform_table(query, &names(map), &suffixes())
        .unwrap()
        .to_string()
}

#[test]
fn test_logical_name_becomes_alias() {
    let query =
        convert_to_expression("SELECT orders.id FROM orders WHERE orders.status = 'paid'").unwrap();
    let selection_before = match query.body.as_ref() {
        SetExpr::Select(select) => select.selection.clone(),
        _ => None,
    };

    let rewritten =
        transform_table(query, &names(&[("orders", "ns.wh.orders.doris")]), &suffixes()).unwrap();

    let selection_after = match rewritten.body.as_ref() {
        SetExpr::Select(select) => select.selection.clone(),
        _ => None,
    };
    assert_eq!(selection_before, selection_after);
    assert_eq!(
        rewritten.to_string(),
        "SELECT orders.id FROM ns.wh.orders.doris AS orders WHERE orders.status = 'paid'"
    );
}

#[test]
fn test_explicit_alias_is_kept() {
    let sql = rewrite(
        "SELECT o.id FROM orders o",
        &[("orders", "wh.orders.doris")],
    );
    assert_eq!(sql, "SELECT o.id FROM wh.orders.doris AS o");
}

#[test]
fn test_joins_and_subqueries_are_rewritten() {
    let sql = rewrite(
        "SELECT t.id, u.name FROM (SELECT id, uid FROM orders) t JOIN users u ON t.uid = u.id",
        &[("orders", "wh.orders.doris"), ("users", "wh.users")],
    );
    assert!(sql.contains("FROM wh.orders.doris AS orders"), "{sql}");
    assert!(sql.contains("JOIN wh.users AS u ON t.uid = u.id"), "{sql}");
}

#[test]
fn test_unmapped_tables_untouched() {
    let sql = rewrite(
        "SELECT * FROM orders JOIN audit_log ON orders.id = audit_log.order_id",
        &[("orders", "wh.orders.doris")],
    );
    assert!(sql.contains("JOIN audit_log ON"), "{sql}");
    assert!(!sql.contains("audit_log AS"), "{sql}");
}

#[test]
fn test_invalid_physical_name() {
    let query = convert_to_expression("SELECT * FROM orders").unwrap();
    let err = transform_table(query, &names(&[("orders", "wh..orders")]), &suffixes()).unwrap_err();
    assert_eq!(err, RewriteError::InvalidTableName("wh..orders".into()));
}

#[test]
fn test_partition_predicate_on_innermost_scan() {
    let query = convert_to_expression(
        "SELECT t.risk_id FROM (SELECT risk_id FROM risk WHERE status = 'new') AS t",
    )
    .unwrap();
    let mut query = transform_table(query, &names(&[("risk", "wh.risk.doris")]), &suffixes()).unwrap();
    push_partition_predicate(&mut query, "thedate", &january()).unwrap();

    let sql = query.to_string();
    assert!(
        sql.contains(
            "FROM wh.risk.doris AS risk WHERE (status = 'new') \
             AND risk.thedate >= '20240101' AND risk.thedate <= '20240131'"
        ),
        "{sql}"
    );
    assert!(!sql.contains("t.thedate"), "{sql}");
}

#[test]
fn test_partition_predicate_without_existing_where() {
    let mut query = convert_to_expression("SELECT id FROM risk r").unwrap();
    push_partition_predicate(&mut query, "thedate", &january()).unwrap();
    assert_eq!(
        query.to_string(),
        "SELECT id FROM risk AS r WHERE r.thedate >= '20240101' AND r.thedate <= '20240131'"
    );
}

#[test]
fn test_partition_predicate_needs_a_scan() {
    let mut query = convert_to_expression("SELECT 1").unwrap();
    assert_eq!(
        push_partition_predicate(&mut query, "thedate", &january()),
        Err(RewriteError::NoTableScan)
    );
}

#[test]
fn test_strip_ordering() {
    let mut query = convert_to_expression("SELECT id FROM t ORDER BY id DESC LIMIT 5 OFFSET 10").unwrap();
    strip_ordering(&mut query);
    assert_eq!(query.to_string(), "SELECT id FROM t");
}

#[test]
fn test_collect_table_names() {
    let query = convert_to_expression(
        "SELECT a.id FROM a JOIN b ON a.id = b.id JOIN a AS a2 ON a2.id = b.id \
         WHERE a.x IN (SELECT x FROM c)",
    )
    .unwrap();
    assert_eq!(collect_table_names(&query), vec!["a", "b", "c"]);
}
