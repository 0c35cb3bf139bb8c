//! Escaping of user-supplied keys and values spliced into SQL text.

use bkquery::escape::{
    dotted_json_path, escape_like, escape_mysql_string, format_keys_quote, json_path,
    sanitize_json_key, EscapeError,
};
use bkquery::Dialect;
use serde_json::json;
use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

const HOSTILE_KEYS: &[&str] = &[
    "plain",
    "it's",
    "back\\slash",
    "trailing\\",
    "'; DROP TABLE users; --",
    "/* comment */",
    "double\"quote",
    "new\nline",
    "\\'",
];

fn tokenize(sql: &str) -> Vec<Token> {
    Tokenizer::new(&MySqlDialect {}, sql)
        .tokenize()
        .unwrap_or_else(|e| panic!("tokenize failed for {sql}: {e}"))
}

#[test]
fn test_variant_keys_stay_inside_literals() {
    for key in HOSTILE_KEYS {
        let sql = format!(
            "SELECT col{} FROM t",
            format_keys_quote(&[*key, "tail"], Dialect::Doris).unwrap()
        );
        let tokens = tokenize(&sql);

        let literals: Vec<&str> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::SingleQuotedString(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(literals, vec![*key, "tail"], "sql: {sql}");
        assert!(
            !tokens.iter().any(|t| matches!(t, Token::SemiColon)),
            "statement terminator escaped the literal: {sql}"
        );
    }
}

#[test]
fn test_mysql_string_round_trips_through_tokenizer() {
    for value in HOSTILE_KEYS {
        let sql = format!("SELECT '{}'", escape_mysql_string(value));
        let tokens = tokenize(&sql);
        assert!(
            tokens.contains(&Token::SingleQuotedString(value.to_string())),
            "sql: {sql}"
        );
    }
}

#[test]
fn test_format_keys_quote_hive_uses_single_quotes() {
    assert_eq!(
        format_keys_quote(&["a", "b"], Dialect::Hive).unwrap(),
        "['a']['b']"
    );
}

#[test]
fn test_empty_key_rejected() {
    assert_eq!(
        format_keys_quote(&["ok", ""], Dialect::Doris),
        Err(EscapeError::EmptyKey)
    );
}

#[test]
fn test_json_keys_must_be_strings() {
    assert_eq!(sanitize_json_key(&json!("a'b")), Ok("a\\'b".to_string()));
    for (value, kind) in [
        (json!(null), "null"),
        (json!(true), "bool"),
        (json!(1.5), "number"),
        (json!(["a"]), "array"),
        (json!({"a": 1}), "object"),
    ] {
        assert_eq!(
            sanitize_json_key(&value),
            Err(EscapeError::NotAString(kind.to_string()))
        );
    }
}

#[test]
fn test_json_paths() {
    assert_eq!(json_path(&["address", "city"]), r#"$.["address"].["city"]"#);
    assert_eq!(dotted_json_path("user.ip"), "$.user.ip");
    assert_eq!(dotted_json_path("user.first-name"), r#"$.user."first-name""#);
}

#[test]
fn test_escape_like_wildcards() {
    assert_eq!(escape_like("50%_off"), r"50\%\_off");
    assert_eq!(escape_like("plain"), "plain");
}
