//! ORM SQL bridge: parameter splicing and grammar fallback.

use bkquery::bridge::{
    compile_queryset_sql, convert_to_expression, orm_query_to_ast, parse_with_fallback,
    BridgeError, CompiledQuery, LiteralRenderer, OrmQuery, ParserStrategy, SqlParam,
};
use chrono::{FixedOffset, NaiveDate, TimeZone};
use sqlparser::ast::{BinaryOperator, Expr, SetExpr, Value};

/// Queryset stand-in with a fixed tenant filter.
struct TenantRisks {
    tenant: String,
    min_level: i64,
}

impl OrmQuery for TenantRisks {
    fn sql_with_params(&self) -> (String, Vec<SqlParam>) {
        (
            "SELECT risk_id, title FROM risk WHERE tenant = %s AND level >= %s".to_string(),
            vec![SqlParam::Str(self.tenant.clone()), SqlParam::Int(self.min_level)],
        )
    }
}

fn where_rhs(query: &sqlparser::ast::Query) -> Expr {
    let SetExpr::Select(select) = query.body.as_ref() else {
        panic!("expected a plain select");
    };
    match select.selection.as_ref() {
        Some(Expr::BinaryOp {
            op: BinaryOperator::Eq,
            right,
            ..
        }) => (**right).clone(),
        other => panic!("expected an equality, got {other:?}"),
    }
}

#[test]
fn test_injection_param_stays_a_literal() {
    let hostile = "x' OR '1'='1";
    let query = CompiledQuery::new(
        "SELECT * FROM risk WHERE title = %s",
        vec![SqlParam::Str(hostile.into())],
    );

    let ast = orm_query_to_ast(&query, &LiteralRenderer::default()).unwrap();
    assert_eq!(
        where_rhs(&ast),
        Expr::Value(Value::SingleQuotedString(hostile.into()))
    );
}

#[test]
fn test_statement_smuggling_rejected() {
    let query = CompiledQuery::new(
        "SELECT * FROM risk WHERE title = %s",
        vec![SqlParam::Str("a'; DELETE FROM risk; --".into())],
    );
    let ast = orm_query_to_ast(&query, &LiteralRenderer::default()).unwrap();
    assert_eq!(
        where_rhs(&ast),
        Expr::Value(Value::SingleQuotedString("a'; DELETE FROM risk; --".into()))
    );
}

#[test]
fn test_custom_orm_query() {
    let sql = compile_queryset_sql(
        &TenantRisks {
            tenant: "acme".into(),
            min_level: 2,
        },
        &LiteralRenderer::default(),
    )
    .unwrap();
    assert_eq!(
        sql,
        "SELECT risk_id, title FROM risk WHERE tenant = 'acme' AND level >= 2"
    );
}

#[test]
fn test_placeholder_mismatch() {
    let query = CompiledQuery::new("SELECT * FROM risk WHERE a = %s AND b = %s", vec![SqlParam::Int(1)]);
    let err = compile_queryset_sql(&query, &LiteralRenderer::default()).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::PlaceholderMismatch {
            placeholders: 2,
            params: 1
        }
    ));
}

#[test]
fn test_bool_date_and_datetime_params() {
    let renderer = LiteralRenderer::default();
    let query = CompiledQuery::new(
        "SELECT * FROM risk WHERE muted = %s AND day = %s AND created_at >= %s AND closed_at IS %s",
        vec![
            SqlParam::Bool(false),
            SqlParam::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()),
            SqlParam::DateTime(
                FixedOffset::east_opt(0)
                    .unwrap()
                    .with_ymd_and_hms(2024, 3, 9, 23, 0, 0)
                    .unwrap(),
            ),
            SqlParam::Null,
        ],
    );

    let sql = compile_queryset_sql(&query, &renderer).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM risk WHERE muted = 'false' AND day = '2024-03-09' \
         AND created_at >= '2024-03-10 07:00:00' AND closed_at IS NULL"
    );
}

#[test]
fn test_renderer_with_custom_offset() {
    let renderer = LiteralRenderer::from_offset_minutes(-60).unwrap();
    let utc_noon = FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .unwrap();
    assert_eq!(
        renderer.render(&SqlParam::DateTime(utc_noon)).unwrap(),
        "'2024-06-01 11:00:00'"
    );
}

#[test]
fn test_compiled_query_from_json() {
    let query: CompiledQuery = serde_json::from_str(
        r#"{"sql": "SELECT * FROM risk WHERE a = %s AND b = %s AND c = %s AND d = %s", "params": [1, 2.5, "x", true]}"#,
    )
    .unwrap();
    assert_eq!(
        query.params,
        vec![
            SqlParam::Int(1),
            SqlParam::Float(2.5),
            SqlParam::Str("x".into()),
            SqlParam::Bool(true),
        ]
    );

    let sql = compile_queryset_sql(&query, &LiteralRenderer::default()).unwrap();
    assert_eq!(sql, "SELECT * FROM risk WHERE a = 1 AND b = 2.5 AND c = 'x' AND d = 'true'");
}

#[test]
fn test_parse_failure_reports_last_grammar() {
    let err = convert_to_expression("SELECT * FROM (").unwrap_err();
    match err {
        BridgeError::Parse { dialect, .. } => assert_eq!(dialect, "hive"),
        other => panic!("expected parse error, got {other:?}"),
    }

    let err = parse_with_fallback("SELECT * FROM (", &[ParserStrategy::MySql]).unwrap_err();
    assert!(matches!(err, BridgeError::Parse { dialect: "mysql", .. }));
}

#[test]
fn test_multiple_statements_rejected() {
    let err = convert_to_expression("SELECT 1; SELECT 2").unwrap_err();
    assert!(matches!(err, BridgeError::StatementCount(2)));
}

#[test]
fn test_non_select_rejected() {
    let err = convert_to_expression("UPDATE risk SET status = 'closed'").unwrap_err();
    assert!(matches!(err, BridgeError::NotASelect(ref keyword) if keyword == "UPDATE"));
}
