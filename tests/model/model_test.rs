//! Deserialization and validation of query configs.

use bkquery::model::{
    AggregateType, Connector, FieldType, JoinType, ModelError, Operator, SortOrder, SqlConfig,
    TimeWindow, WhereCondition,
};
use chrono::NaiveDate;

fn config_with_where(where_json: &str) -> String {
    format!(
        r#"{{
            "select_fields": [{{"table": "users", "raw_name": "id"}}],
            "from_table": {{"table_name": "users"}},
            "where": {where_json}
        }}"#
    )
}

fn parse_error(json: &str) -> String {
    match SqlConfig::from_json(json) {
        Err(ModelError::Parse(message)) => message,
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_full_config_deserializes() {
    let json = r#"{
        "select_fields": [
            {"table": "o", "raw_name": "id", "display_name": "order_id", "field_type": "long"},
            {"table": "u", "raw_name": "extra", "field_type": "double", "keys": ["score"], "aggregate": "avg"}
        ],
        "from_table": {"table_name": "orders", "alias": "o"},
        "join_tables": [{
            "join_type": "inner",
            "left_table": {"table_name": "orders", "alias": "o"},
            "right_table": {"table_name": "users", "alias": "u"},
            "link_fields": [{
                "left_field": {"table": "o", "raw_name": "user_id"},
                "right_field": {"table": "u", "raw_name": "id"}
            }]
        }],
        "where": {"condition": {"field": {"table": "o", "raw_name": "status"}, "operator": "neq", "filter": "void"}},
        "order_by": [{"field": {"table": "o", "raw_name": "id"}, "order": "desc"}],
        "pagination": {"limit": 10, "offset": 30}
    }"#;

    let config = SqlConfig::from_json(json).unwrap();
    assert_eq!(config.from_table.alias(), "o");
    assert_eq!(config.select_fields[0].field_type, FieldType::Long);
    assert_eq!(config.select_fields[0].alias(), "order_id");
    assert_eq!(config.select_fields[1].aggregate, Some(AggregateType::Avg));
    assert!(config.select_fields[1].uses_json());
    assert_eq!(config.join_tables[0].join_type, JoinType::Inner);
    assert_eq!(config.order_by[0].order, SortOrder::Desc);
    assert_eq!(config.pagination.map(|p| p.offset), Some(30));
    assert!(config.has_aggregate());

    match config.where_condition {
        Some(WhereCondition::Leaf(condition)) => assert_eq!(condition.operator, Operator::Neq),
        other => panic!("expected leaf, got {other:?}"),
    }
}

#[test]
fn test_display_name_defaults_to_raw_name() {
    let config = SqlConfig::from_json(
        r#"{"select_fields": [{"table": "users", "raw_name": "email"}], "from_table": {"table_name": "users"}}"#,
    )
    .unwrap();
    assert_eq!(config.select_fields[0].alias(), "email");
    assert_eq!(config.select_fields[0].field_type, FieldType::String);
}

#[test]
fn test_nested_where_tree() {
    let json = config_with_where(
        r#"{
            "connector": "OR",
            "conditions": [
                {"condition": {"field": {"table": "users", "raw_name": "a"}, "operator": "eq", "filter": 1}},
                {"connector": "and", "conditions": [
                    {"condition": {"field": {"table": "users", "raw_name": "b"}, "operator": "gt", "filter": 2.5}},
                    {"condition": {"field": {"table": "users", "raw_name": "c"}, "operator": "notnull"}}
                ]}
            ]
        }"#,
    );

    let config = SqlConfig::from_json(&json).unwrap();
    let tree = config.where_condition.unwrap();
    assert_eq!(tree.effective_connector(), Some(Connector::Or));
    assert_eq!(tree.fields().len(), 3);
}

#[test]
fn test_mixed_condition_node_rejected() {
    let json = config_with_where(
        r#"{
            "condition": {"field": {"table": "users", "raw_name": "a"}, "operator": "eq", "filter": 1},
            "conditions": [
                {"condition": {"field": {"table": "users", "raw_name": "b"}, "operator": "eq", "filter": 2}}
            ]
        }"#,
    );
    assert!(parse_error(&json).contains("both a condition and child conditions"));
}

#[test]
fn test_empty_condition_node_rejected() {
    let json = config_with_where(r#"{"connector": "and"}"#);
    assert!(parse_error(&json).contains("neither a condition nor child conditions"));
}

#[test]
fn test_empty_condition_group_rejected() {
    let json = config_with_where(r#"{"connector": "and", "conditions": []}"#);
    assert!(parse_error(&json).contains("condition group has no conditions"));
}

#[test]
fn test_invalid_enums_rejected() {
    let bad_operator = config_with_where(
        r#"{"condition": {"field": {"table": "users", "raw_name": "a"}, "operator": "contains", "filter": 1}}"#,
    );
    assert!(parse_error(&bad_operator).contains("invalid operator: contains"));

    let bad_connector = config_with_where(
        r#"{"connector": "xor", "conditions": [
            {"condition": {"field": {"table": "users", "raw_name": "a"}, "operator": "eq", "filter": 1}}
        ]}"#,
    );
    assert!(parse_error(&bad_connector).contains("invalid connector: xor"));

    let bad_type = r#"{"select_fields": [{"table": "users", "raw_name": "id", "field_type": "uuid"}], "from_table": {"table_name": "users"}}"#;
    assert!(parse_error(bad_type).contains("invalid field type: uuid"));

    let bad_aggregate = r#"{"select_fields": [{"table": "users", "raw_name": "id", "aggregate": "median"}], "from_table": {"table_name": "users"}}"#;
    assert!(parse_error(bad_aggregate).contains("invalid aggregate: median"));

    let bad_order = r#"{
        "select_fields": [{"table": "users", "raw_name": "id"}],
        "from_table": {"table_name": "users"},
        "order_by": [{"field": {"table": "users", "raw_name": "id"}, "order": "sideways"}]
    }"#;
    assert!(parse_error(bad_order).contains("invalid sort order: sideways"));
}

#[test]
fn test_join_validation() {
    let bad_join_type = r#"{
        "select_fields": [{"table": "o", "raw_name": "id"}],
        "from_table": {"table_name": "orders", "alias": "o"},
        "join_tables": [{
            "join_type": "full",
            "left_table": {"table_name": "orders", "alias": "o"},
            "right_table": {"table_name": "users", "alias": "u"},
            "link_fields": [{"left_field": {"table": "o", "raw_name": "uid"}, "right_field": {"table": "u", "raw_name": "id"}}]
        }]
    }"#;
    assert!(parse_error(bad_join_type).contains("invalid join type: full"));

    let no_links = r#"{
        "select_fields": [{"table": "o", "raw_name": "id"}],
        "from_table": {"table_name": "orders", "alias": "o"},
        "join_tables": [{
            "join_type": "left",
            "left_table": {"table_name": "orders", "alias": "o"},
            "right_table": {"table_name": "users", "alias": "u"},
            "link_fields": []
        }]
    }"#;
    assert!(parse_error(no_links).contains("join on table 'users' has no link fields"));
}

#[test]
fn test_operand_arity_rejected() {
    let between = config_with_where(
        r#"{"condition": {"field": {"table": "users", "raw_name": "age"}, "operator": "between", "filters": [1, 2, 3]}}"#,
    );
    assert!(parse_error(&between).contains("expects 2 filter values, got 3"));

    let gt_null = config_with_where(
        r#"{"condition": {"field": {"table": "users", "raw_name": "age"}, "operator": "gt", "filter": null}}"#,
    );
    assert!(parse_error(&gt_null).contains("requires a non-null filter value"));
}

#[test]
fn test_eq_null_is_accepted() {
    let json = config_with_where(
        r#"{"condition": {"field": {"table": "users", "raw_name": "name"}, "operator": "eq", "filter": null}}"#,
    );
    let config = SqlConfig::from_json(&json).unwrap();
    match config.where_condition {
        Some(WhereCondition::Leaf(condition)) => assert!(condition.scalar().is_none()),
        other => panic!("expected leaf, got {other:?}"),
    }
}

#[test]
fn test_time_window_order() {
    let jan = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
    let window = TimeWindow::new(jan(1), jan(31)).unwrap();
    assert_eq!(
        window.partition_bounds(),
        ("20240101".to_string(), "20240131".to_string())
    );
    assert!(matches!(
        TimeWindow::new(jan(31), jan(1)),
        Err(ModelError::InvalidWindow { .. })
    ));

    let parsed: TimeWindow =
        serde_json::from_str(r#"{"start": "2024-01-05", "end": "2024-01-06"}"#).unwrap();
    assert_eq!(parsed.start(), jan(5));
    assert!(serde_json::from_str::<TimeWindow>(r#"{"start": "2024-01-06", "end": "2024-01-05"}"#).is_err());
}
