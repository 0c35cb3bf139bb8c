//! End-to-end tests for declarative SQL generation.

use bkquery::generator::{GenerateError, SqlGenerator};
use bkquery::model::{
    AggregateType, Condition, Field, FieldType, FilterValue, JoinTable, JoinType, LinkField,
    ModelError, Operator, Order, SqlConfig, Table, WhereCondition,
};
use bkquery::sql::test_utils::validate_sql;
use bkquery::Dialect;
use insta::assert_snapshot;

fn users_id() -> Field {
    Field::new("users", "id", FieldType::Int).with_display_name("user_id")
}

fn leaf(field: Field, op: Operator, value: impl Into<FilterValue>) -> WhereCondition {
    WhereCondition::leaf(Condition::new(field, op, value).unwrap())
}

#[test]
fn test_json_profile_select() {
    let config = SqlConfig::new(Table::new("users")).select(users_id()).select(
        Field::new("users", "profile", FieldType::String)
            .with_display_name("user_profile")
            .with_keys(["address", "city"]),
    );

    let sql = SqlGenerator::new(Dialect::Hive).generate(&config).unwrap();
    assert_snapshot!(sql, @r#"SELECT "users"."id" "user_id", CAST(GET_JSON_OBJECT("users"."profile",'$.["address"].["city"]') AS STRING) "user_profile" FROM "users" "users""#);
    validate_sql(&sql, Dialect::Hive).unwrap();
}

#[test]
fn test_same_config_in_doris() {
    let config = SqlConfig::new(Table::new("users")).select(users_id()).select(
        Field::new("users", "profile", FieldType::String)
            .with_display_name("user_profile")
            .with_keys(["address", "city"]),
    );

    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert!(sql.starts_with("SELECT `users`.`id` AS `user_id`, CAST(JSON_EXTRACT_STRING("));
    assert!(sql.ends_with("FROM `users` AS `users`"));
    validate_sql(&sql, Dialect::Doris).unwrap();
}

#[test]
fn test_unregistered_table_in_select() {
    let config = SqlConfig::new(Table::new("users"))
        .select(users_id())
        .select(Field::new("orders", "id", FieldType::Int));

    let err = SqlGenerator::default().generate(&config).unwrap_err();
    assert!(matches!(err, GenerateError::TableNotRegistered(ref t) if t == "orders"));
    assert!(err.to_string().contains("orders"));
}

#[test]
fn test_join_on_two_link_fields() {
    let join = JoinTable::new(
        JoinType::Left,
        Table::new("orders").with_alias("o"),
        Table::new("users").with_alias("u"),
        vec![
            LinkField {
                left_field: Field::new("o", "user_id", FieldType::Int),
                right_field: Field::new("u", "id", FieldType::Int),
            },
            LinkField {
                left_field: Field::new("o", "tenant", FieldType::String),
                right_field: Field::new("u", "tenant", FieldType::String),
            },
        ],
    )
    .unwrap();

    let config = SqlConfig::new(Table::new("orders").with_alias("o"))
        .select(Field::new("o", "id", FieldType::Int))
        .select(Field::new("u", "name", FieldType::String))
        .join(join);

    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert_eq!(
        sql,
        "SELECT `o`.`id` AS `id`, `u`.`name` AS `name` FROM `orders` AS `o` \
         LEFT JOIN `users` AS `u` ON `o`.`user_id` = `u`.`id` AND `o`.`tenant` = `u`.`tenant`"
    );
    validate_sql(&sql, Dialect::Doris).unwrap();
}

#[test]
fn test_join_on_unknown_left_table() {
    let join = JoinTable::new(
        JoinType::Inner,
        Table::new("ghost"),
        Table::new("users"),
        vec![LinkField {
            left_field: Field::new("ghost", "user_id", FieldType::Int),
            right_field: Field::new("users", "id", FieldType::Int),
        }],
    )
    .unwrap();

    let config = SqlConfig::new(Table::new("orders"))
        .select(Field::new("orders", "id", FieldType::Int))
        .join(join);

    let err = SqlGenerator::default().generate(&config).unwrap_err();
    assert!(matches!(err, GenerateError::TableNotRegistered(t) if t == "ghost"));
}

#[test]
fn test_mixed_connectors_are_parenthesized() {
    let age = Field::new("users", "age", FieldType::Int);
    let name = Field::new("users", "name", FieldType::String);

    let tree = WhereCondition::and(vec![
        leaf(age.clone(), Operator::Gte, 18i64),
        WhereCondition::or(vec![
            leaf(name.clone(), Operator::Eq, "alice"),
            leaf(name, Operator::Eq, "bob"),
        ])
        .unwrap(),
    ])
    .unwrap();

    let config = SqlConfig::new(Table::new("users")).select(users_id()).filter(tree);
    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert!(sql.ends_with(
        "WHERE `users`.`age` >= 18 AND (`users`.`name` = 'alice' OR `users`.`name` = 'bob')"
    ));
    validate_sql(&sql, Dialect::Doris).unwrap();
}

#[test]
fn test_same_connector_groups_stay_flat() {
    let age = Field::new("users", "age", FieldType::Int);

    let tree = WhereCondition::and(vec![
        leaf(age.clone(), Operator::Gt, 1i64),
        WhereCondition::and(vec![
            leaf(age.clone(), Operator::Lt, 90i64),
            leaf(age, Operator::Neq, 50i64),
        ])
        .unwrap(),
    ])
    .unwrap();

    let config = SqlConfig::new(Table::new("users")).select(users_id()).filter(tree);
    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert!(sql.ends_with(
        "WHERE `users`.`age` > 1 AND `users`.`age` < 90 AND `users`.`age` <> 50"
    ));
}

#[test]
fn test_between_and_null_checks() {
    let created = Field::new("users", "created_at", FieldType::String);
    let deleted = Field::new("users", "deleted_at", FieldType::String);

    let tree = WhereCondition::and(vec![
        WhereCondition::leaf(
            Condition::with_filters(
                created,
                Operator::Between,
                vec!["2024-01-01".into(), "2024-01-31".into()],
            )
            .unwrap(),
        ),
        WhereCondition::leaf(Condition::unary(deleted, Operator::IsNull).unwrap()),
    ])
    .unwrap();

    let config = SqlConfig::new(Table::new("users")).select(users_id()).filter(tree);
    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert!(sql.ends_with(
        "WHERE `users`.`created_at` BETWEEN '2024-01-01' AND '2024-01-31' AND `users`.`deleted_at` IS NULL"
    ));
    validate_sql(&sql, Dialect::Doris).unwrap();
}

#[test]
fn test_aggregate_group_having_order_paginate() {
    let region = Field::new("sales", "region", FieldType::String);
    let total = Field::new("sales", "amount", FieldType::Double)
        .with_display_name("total")
        .with_aggregate(AggregateType::Sum);

    let config = SqlConfig::new(Table::new("sales"))
        .select(region.clone())
        .select(total.clone())
        .having(leaf(total.clone(), Operator::Gt, 100i64))
        .order_by(Order::desc(total))
        .paginate(10, 20);

    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert_snapshot!(sql, @"SELECT `sales`.`region` AS `region`, SUM(`sales`.`amount`) AS `total` FROM `sales` AS `sales` GROUP BY `sales`.`region` HAVING SUM(`sales`.`amount`) > 100 ORDER BY SUM(`sales`.`amount`) DESC LIMIT 10 OFFSET 20");
    validate_sql(&sql, Dialect::Doris).unwrap();
}

#[test]
fn test_explicit_group_by_wins() {
    let region = Field::new("sales", "region", FieldType::String);
    let city = Field::new("sales", "city", FieldType::String);
    let n = Field::new("sales", "id", FieldType::Int)
        .with_display_name("n")
        .with_aggregate(AggregateType::Count);

    let config = SqlConfig::new(Table::new("sales"))
        .select(region.clone())
        .select(n)
        .group_by(vec![region, city]);

    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert!(sql.ends_with("GROUP BY `sales`.`region`, `sales`.`city`"));
}

#[test]
fn test_zero_offset_is_omitted() {
    let config = SqlConfig::new(Table::new("users"))
        .select(users_id())
        .paginate(5, 0);

    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert!(sql.ends_with("LIMIT 5"));
    assert!(!sql.contains("OFFSET"));
}

#[test]
fn test_quote_in_filter_value() {
    let config = SqlConfig::new(Table::new("users"))
        .select(users_id())
        .filter(leaf(
            Field::new("users", "name", FieldType::String),
            Operator::Eq,
            "o'brien",
        ));

    let sql = SqlGenerator::new(Dialect::Hive).generate(&config).unwrap();
    assert!(sql.ends_with("WHERE \"users\".\"name\" = 'o''brien'"));
    validate_sql(&sql, Dialect::Hive).unwrap();
}

#[test]
fn test_generate_from_json() {
    let json = r#"{
        "select_fields": [
            {"table": "users", "raw_name": "id", "display_name": "user_id", "field_type": "int"},
            {"table": "users", "raw_name": "id", "display_name": "n", "field_type": "int", "aggregate": "count"}
        ],
        "from_table": {"table_name": "users"},
        "where": {
            "connector": "or",
            "conditions": [
                {"condition": {"field": {"table": "users", "raw_name": "level"}, "operator": "include", "filters": ["a", "b"]}},
                {"condition": {"field": {"table": "users", "raw_name": "level"}, "operator": "isnull"}}
            ]
        },
        "pagination": {"limit": 50}
    }"#;

    let config = SqlConfig::from_json(json).unwrap();
    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert_eq!(
        sql,
        "SELECT `users`.`id` AS `user_id`, COUNT(`users`.`id`) AS `n` FROM `users` AS `users` \
         WHERE `users`.`level` IN ('a', 'b') OR `users`.`level` IS NULL \
         GROUP BY `users`.`id` LIMIT 50"
    );
}

#[test]
fn test_non_finite_filter_never_reaches_sql() {
    let err = Condition::new(users_id(), Operator::Gt, f64::NAN).unwrap_err();
    assert!(matches!(err, ModelError::NonFiniteFilter { .. }));

    // Public fields skip validation; rendering still must not panic.
    let unchecked = Condition {
        field: users_id(),
        operator: Operator::Gt,
        filter: Some(FilterValue::Float(f64::INFINITY)),
        filters: vec![],
    };
    let config = SqlConfig::new(Table::new("users"))
        .select(users_id())
        .filter(WhereCondition::leaf(unchecked));
    let sql = SqlGenerator::new(Dialect::Doris).generate(&config).unwrap();
    assert!(sql.ends_with("WHERE `users`.`id` > NULL"), "{sql}");
}
