//! Per-family type mapping and value binding

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use std::str::FromStr;

use rivven_sql_sink::dialect::{DatabaseDialect, DatabaseVersion, Engine};
use rivven_sql_sink::error::Error;
use rivven_sql_sink::schema::{Field, Schema};
use rivven_sql_sink::types::{connect, logical};
use rivven_sql_sink::value::Value;

fn postgres() -> DatabaseDialect {
    DatabaseDialect::new(Engine::Postgres, DatabaseVersion::new(15, 0, 0))
}

fn mysql() -> DatabaseDialect {
    DatabaseDialect::new(Engine::MySql, DatabaseVersion::new(8, 0, 34))
}

/// Native type name and bound value of one payload value
fn map(dialect: &DatabaseDialect, schema: &Schema, value: JsonValue) -> (String, Value) {
    let ty = dialect.resolve_type(schema).unwrap();
    (
        ty.type_name(dialect, schema, false),
        ty.bind(schema, &value).unwrap(),
    )
}

#[test]
fn test_integers() {
    let pg = postgres();
    assert_eq!(
        map(&pg, &Schema::int8(), json!(-5)),
        ("smallint".to_string(), Value::Int8(-5))
    );
    assert_eq!(
        map(&pg, &Schema::int32(), json!(42)),
        ("integer".to_string(), Value::Int32(42))
    );
    assert_eq!(
        map(&pg, &Schema::int64(), json!(9_007_199_254_740_993_i64)),
        ("bigint".to_string(), Value::Int64(9_007_199_254_740_993))
    );

    let schema = Schema::int16();
    let err = pg
        .resolve_type(&schema)
        .unwrap()
        .bind(&schema, &json!(70_000))
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedValue { .. }));
}

#[test]
fn test_strings_and_keys() {
    let pg = postgres();
    let my = mysql();
    let schema = Schema::string();

    assert_eq!(map(&pg, &schema, json!("Ada")).0, "text");
    assert_eq!(map(&my, &schema, json!("Ada")).0, "longtext");

    let ty = my.resolve_type(&schema).unwrap();
    assert_eq!(ty.type_name(&my, &schema, true), "varchar(255)");

    let sized = Schema::string().with_parameter("__debezium.source.column.length", "64");
    assert_eq!(pg.resolve_type(&sized).unwrap().type_name(&pg, &sized, false), "varchar(64)");

    let err = ty.bind(&schema, &json!(12)).unwrap_err();
    assert!(matches!(err, Error::UnsupportedValue { .. }));
}

#[test]
fn test_null_binds_as_null() {
    let schema = Schema::int32().optional();
    let ty = postgres().resolve_type(&schema).unwrap();
    assert_eq!(ty.bind(&schema, &JsonValue::Null).unwrap(), Value::Null);
}

#[test]
fn test_decimal() {
    let schema = Schema::bytes()
        .named(connect::DECIMAL_LOGICAL)
        .with_parameter("scale", "2")
        .with_parameter("connect.decimal.precision", "10");

    let (name, value) = map(&postgres(), &schema, json!("MDk="));
    assert_eq!(name, "numeric(10,2)");
    assert_eq!(value, Value::Decimal(Decimal::from_str("123.45").unwrap()));

    let (name, _) = map(&mysql(), &schema, json!("MDk="));
    assert_eq!(name, "decimal(10,2)");
}

#[test]
fn test_bytes() {
    let schema = Schema::bytes();
    assert_eq!(
        map(&postgres(), &schema, json!("AQID")),
        ("bytea".to_string(), Value::Bytes(vec![1, 2, 3]))
    );

    let my = mysql();
    let ty = my.resolve_type(&schema).unwrap();
    assert_eq!(ty.type_name(&my, &schema, false), "longblob");
    assert_eq!(ty.type_name(&my, &schema, true), "varbinary(255)");
}

#[test]
fn test_debezium_temporal_types() {
    let pg = postgres();

    let (name, value) = map(&pg, &Schema::int32().named(logical::DATE), json!(19_000));
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    assert_eq!(name, "date");
    assert_eq!(value, Value::Date(epoch + Duration::days(19_000)));

    let micros = 1_700_000_000_123_456_i64;
    let (name, value) = map(
        &pg,
        &Schema::int64().named(logical::MICRO_TIMESTAMP),
        json!(micros),
    );
    assert_eq!(name, "timestamp");
    assert_eq!(
        value,
        Value::DateTime(DateTime::from_timestamp_micros(micros).unwrap().naive_utc())
    );

    let (name, value) = map(
        &pg,
        &Schema::int64().named(logical::MICRO_TIME),
        json!(3_600_000_001_i64),
    );
    assert_eq!(name, "time");
    assert_eq!(
        value,
        Value::Time(NaiveTime::from_hms_micro_opt(1, 0, 0, 1).unwrap())
    );

    let (name, value) = map(
        &pg,
        &Schema::string().named(logical::ZONED_TIMESTAMP),
        json!("2024-03-01T10:15:30-05:00"),
    );
    assert_eq!(name, "timestamptz");
    assert_eq!(
        value,
        Value::DateTimeTz(Utc.with_ymd_and_hms(2024, 3, 1, 15, 15, 30).unwrap())
    );
}

#[test]
fn test_zoned_timestamp_keeps_offset_on_mysql() {
    let schema = Schema::string().named(logical::ZONED_TIMESTAMP);
    let (name, value) = map(&mysql(), &schema, json!("2024-03-01T10:15:30+02:00"));
    assert_eq!(name, "timestamp(6)");
    match value {
        Value::DateTimeOffset(ts) => assert_eq!(ts.offset().local_minus_utc(), 7200),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_uuid_and_json() {
    let uuid = "5f0c3e3a-7c1b-4e8e-9d7e-0d9f1b2a3c4d";
    let schema = Schema::string().named(logical::UUID);

    let (name, value) = map(&postgres(), &schema, json!(uuid));
    assert_eq!(name, "uuid");
    assert_eq!(value, Value::Uuid(uuid::Uuid::parse_str(uuid).unwrap()));

    let (name, value) = map(&mysql(), &schema, json!(uuid));
    assert_eq!(name, "char(36)");
    assert_eq!(value, Value::String(uuid.to_string()));

    let schema = Schema::string().named(logical::JSON);
    let (name, value) = map(&postgres(), &schema, json!(r#"{"a":1}"#));
    assert_eq!(name, "jsonb");
    assert_eq!(value, Value::String(r#"{"a":1}"#.to_string()));
}

#[test]
fn test_mysql_enum_set_and_bits() {
    let my = mysql();

    let schema = Schema::string()
        .named(logical::ENUM_SET)
        .with_parameter("allowed", "a,b,c");
    assert_eq!(map(&my, &schema, json!("a,c")).0, "set('a','b','c')");

    let schema = Schema::bytes()
        .named(logical::BITS)
        .with_parameter("length", "12");
    assert_eq!(
        map(&my, &schema, json!("AQI=")),
        ("bit(12)".to_string(), Value::Bytes(vec![1, 2]))
    );

    // PostgreSQL stores enums as plain text
    let schema = Schema::string()
        .named(logical::ENUM)
        .with_parameter("allowed", "x,y");
    assert_eq!(map(&postgres(), &schema, json!("x")).0, "text");
}

#[test]
fn test_unknown_type() {
    let schema = Schema::structure(vec![Field::new("a", Schema::int32())]);
    let err = postgres().resolve_type(&schema).unwrap_err();
    assert!(matches!(err, Error::UnknownType { .. }));
}
