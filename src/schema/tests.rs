//! Tests for schema inference and coercion

use super::*;
use crate::error::{Error, ErrorKind};
use crate::types::Row;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

fn rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

fn column_rows(name: &str, values: Vec<Value>) -> Vec<Row> {
    rows(values.into_iter().map(|v| json!({ name: v })).collect())
}

fn type_of(schema: &TableSchema, name: &str) -> ColumnType {
    schema.get(name).unwrap().column_type
}

// ============================================================================
// Classification Tests
// ============================================================================

#[test]
fn test_boolean_strings() {
    let data = column_rows("flag", vec![json!("true"), json!("false"), json!("1")]);
    let inferred = SchemaInferrer::new().infer(&data);
    assert_eq!(type_of(&inferred.schema, "flag"), ColumnType::Boolean);
    assert!(inferred.boolean_fields.contains("flag"));
}

#[test_case(vec![json!("true"), json!("false")], ColumnType::Boolean ; "words")]
#[test_case(vec![json!(true), json!(false), json!(null)], ColumnType::Boolean ; "native with null")]
#[test_case(vec![json!(1), json!(0), json!(1)], ColumnType::Boolean ; "ones and zeros")]
#[test_case(vec![json!("1.0"), json!("0.0")], ColumnType::Boolean ; "float strings")]
#[test_case(vec![json!(1), json!(2)], ColumnType::Integer ; "two is not boolean")]
#[test_case(vec![json!(1), json!(2.5)], ColumnType::Float ; "mixed numbers")]
#[test_case(vec![json!("12"), json!("7")], ColumnType::Integer ; "numeric strings")]
#[test_case(vec![json!("1.5"), json!(3)], ColumnType::Float ; "float string and int")]
#[test_case(vec![json!("2024-01-01T00:00:00Z"), json!("2024-02-01 10:00:00")], ColumnType::Timestamp ; "timestamps")]
#[test_case(vec![json!("2024-01-01T00:00:00Z"), json!("soon")], ColumnType::Text ; "timestamp and text")]
#[test_case(vec![json!(5), json!("abc")], ColumnType::Text ; "number and text")]
#[test_case(vec![json!([1, 2]), json!({"a": 1})], ColumnType::Text ; "nested")]
#[test_case(vec![json!(null), json!(null)], ColumnType::Text ; "all null")]
#[test_case(vec![json!("inf"), json!("NaN")], ColumnType::Text ; "float words are text")]
fn test_native_classification(values: Vec<Value>, expected: ColumnType) {
    let data = column_rows("value", values);
    let inferred = SchemaInferrer::new().infer(&data);
    assert_eq!(type_of(&inferred.schema, "value"), expected);
}

#[test]
fn test_text_override_wins_over_boolean_and_numbers() {
    let data = column_rows("subject", vec![json!("1"), json!("0"), json!("2")]);
    let inferred = SchemaInferrer::new().infer(&data);
    assert_eq!(type_of(&inferred.schema, "subject"), ColumnType::Text);

    let data = column_rows("Title", vec![json!("1"), json!("0")]);
    let inferred = SchemaInferrer::new().infer(&data);
    assert_eq!(type_of(&inferred.schema, "Title"), ColumnType::Text);
    assert!(inferred.boolean_fields.is_empty());
}

#[test]
fn test_custom_text_fields_replace_defaults() {
    let data = rows(vec![json!({"subject": 1, "code": 2})]);
    let inferred = SchemaInferrer::new().with_text_fields(["code"]).infer(&data);
    assert_eq!(type_of(&inferred.schema, "code"), ColumnType::Text);
    assert_eq!(type_of(&inferred.schema, "subject"), ColumnType::Boolean);
}

#[test]
fn test_key_columns_skip_boolean_rule() {
    let data = column_rows("id", vec![json!(1)]);
    let inferred = SchemaInferrer::new()
        .without_boolean_detection(["ID"])
        .infer(&data);
    assert_eq!(type_of(&inferred.schema, "id"), ColumnType::Integer);
}

#[test]
fn test_forced_column_type() {
    let data = column_rows("_loaded_at", vec![json!("whenever")]);
    let inferred = SchemaInferrer::new()
        .with_column_type("_loaded_at", ColumnType::Timestamp)
        .infer(&data);
    assert_eq!(type_of(&inferred.schema, "_loaded_at"), ColumnType::Timestamp);
}

#[test]
fn test_sample_size_limits_inspection() {
    let data = column_rows("n", vec![json!(1), json!(2), json!("x")]);
    let inferred = SchemaInferrer::new().with_sample_size(2).infer(&data);
    assert_eq!(type_of(&inferred.schema, "n"), ColumnType::Integer);

    // the unsampled value then fails coercion
    let err = coerce_rows("t", &inferred.schema, &data).unwrap_err();
    assert!(matches!(err, Error::SchemaDrift { ref column, .. } if column == "n"));
    assert_eq!(err.kind(), ErrorKind::StoreError);
}

#[test]
fn test_column_order_follows_first_appearance() {
    let data = rows(vec![json!({"b": 1, "a": 2}), json!({"c": 3, "a": 4})]);
    let inferred = SchemaInferrer::new().infer(&data);
    assert_eq!(inferred.schema.names(), vec!["b", "a", "c"]);
}

// ============================================================================
// Coercion Tests
// ============================================================================

#[test]
fn test_boolean_is_tri_state() {
    assert_eq!(coerce(&json!("TRUE"), ColumnType::Boolean), Some(Cell::Boolean(true)));
    assert_eq!(coerce(&json!(0), ColumnType::Boolean), Some(Cell::Boolean(false)));
    assert_eq!(coerce(&json!("maybe"), ColumnType::Boolean), Some(Cell::Null));
    assert_eq!(coerce(&json!(null), ColumnType::Boolean), Some(Cell::Null));
    assert_eq!(parse_bool(&json!("1.0")), Some(true));
    assert_eq!(parse_bool(&json!(2)), None);
}

#[test]
fn test_nested_values_become_json_text_or_null() {
    assert_eq!(
        coerce(&json!([1, 2]), ColumnType::Text),
        Some(Cell::Text("[1,2]".to_string()))
    );
    assert_eq!(
        coerce(&json!({"b": 1, "a": 2}), ColumnType::Text),
        Some(Cell::Text(r#"{"b":1,"a":2}"#.to_string()))
    );
    assert_eq!(coerce(&json!([]), ColumnType::Text), Some(Cell::Null));
    assert_eq!(coerce(&json!({}), ColumnType::Integer), Some(Cell::Null));
}

#[test]
fn test_numeric_coercion() {
    assert_eq!(coerce(&json!(5), ColumnType::Float), Some(Cell::Float(5.0)));
    assert_eq!(coerce(&json!(5.0), ColumnType::Integer), Some(Cell::Integer(5)));
    assert_eq!(coerce(&json!("42"), ColumnType::Integer), Some(Cell::Integer(42)));
    assert_eq!(coerce(&json!(""), ColumnType::Integer), Some(Cell::Null));
    assert_eq!(coerce(&json!(2.5), ColumnType::Integer), None);
    assert_eq!(coerce(&json!("abc"), ColumnType::Float), None);
    assert_eq!(coerce(&json!(true), ColumnType::Integer), None);
    assert_eq!(coerce(&json!(7), ColumnType::Text), Some(Cell::Text("7".to_string())));
    assert_eq!(coerce(&json!(""), ColumnType::Text), Some(Cell::Text(String::new())));
}

#[test]
fn test_timestamp_coercion() {
    let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(
        coerce(&json!("2024-01-01T00:00:00Z"), ColumnType::Timestamp),
        Some(Cell::Timestamp(expected))
    );
    assert_eq!(
        coerce(&json!(1_704_067_200), ColumnType::Timestamp),
        Some(Cell::Timestamp(expected))
    );
    assert_eq!(coerce(&json!("later"), ColumnType::Timestamp), None);
}

#[test]
fn test_coerce_rows_reports_unknown_booleans() {
    let schema = TableSchema::new(vec![
        ColumnSchema::new("id", ColumnType::Integer),
        ColumnSchema::new("active", ColumnType::Boolean),
    ]);
    let data = rows(vec![
        json!({"id": 1, "active": "yes"}),
        json!({"id": 2, "active": true}),
        json!({"id": 3}),
    ]);

    let (cells, warnings) = coerce_rows("users", &schema, &data).unwrap();
    assert_eq!(
        cells,
        vec![
            vec![Cell::Integer(1), Cell::Null],
            vec![Cell::Integer(2), Cell::Boolean(true)],
            vec![Cell::Integer(3), Cell::Null],
        ]
    );
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "active");
}

#[test]
fn test_coerce_rows_matches_columns_case_insensitively() {
    let schema = TableSchema::new(vec![ColumnSchema::new("Subject", ColumnType::Text)]);
    let data = rows(vec![json!({"subject": "hello"})]);
    let (cells, _) = coerce_rows("tickets", &schema, &data).unwrap();
    assert_eq!(cells, vec![vec![Cell::Text("hello".to_string())]]);
}

#[test]
fn test_infer_schema_end_to_end() {
    let data = rows(vec![
        json!({"id": 1, "subject": "1", "active": "true", "updated_at": "2024-01-01T00:00:00Z"}),
        json!({"id": 2, "subject": "0", "active": "false", "updated_at": "2024-01-02T00:00:00Z"}),
    ]);

    let typed = infer_schema(&data, None, 1000).unwrap();
    assert_eq!(typed.schema.names(), vec!["id", "subject", "active", "updated_at"]);
    assert_eq!(type_of(&typed.schema, "subject"), ColumnType::Text);
    assert_eq!(type_of(&typed.schema, "active"), ColumnType::Boolean);
    assert_eq!(type_of(&typed.schema, "updated_at"), ColumnType::Timestamp);
    assert_eq!(typed.boolean_fields.iter().collect::<Vec<_>>(), vec!["active"]);
    assert_eq!(typed.rows[1][1], Cell::Text("0".to_string()));
    assert_eq!(typed.rows[1][2], Cell::Boolean(false));
}

// ============================================================================
// Type Mapping Tests
// ============================================================================

#[test_case("BIGINT", ColumnType::Integer)]
#[test_case("INTEGER", ColumnType::Integer)]
#[test_case("BOOLEAN", ColumnType::Boolean)]
#[test_case("DOUBLE", ColumnType::Float)]
#[test_case("DECIMAL(18,3)", ColumnType::Float)]
#[test_case("TIMESTAMP WITH TIME ZONE", ColumnType::Timestamp)]
#[test_case("VARCHAR", ColumnType::Text)]
#[test_case("JSON", ColumnType::Text)]
fn test_from_sql_type(sql: &str, expected: ColumnType) {
    assert_eq!(ColumnType::from_sql_type(sql), expected);
}

#[test]
fn test_missing_columns_case_insensitive() {
    let existing = TableSchema::new(vec![ColumnSchema::new("Subject", ColumnType::Text)]);
    let incoming = TableSchema::new(vec![
        ColumnSchema::new("subject", ColumnType::Text),
        ColumnSchema::new("status", ColumnType::Text),
    ]);
    assert_eq!(
        incoming.missing_from(&existing),
        vec![ColumnSchema::new("status", ColumnType::Text)]
    );
}
