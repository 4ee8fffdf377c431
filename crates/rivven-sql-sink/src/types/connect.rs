//! Types for plain Connect schema kinds and Connect logical types

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::str::FromStr;

use super::{
    bind_json_text, bind_string, boolean_default, character_type, no_default, numeric_default,
    string_default, unexpected, SqlType, TypeRegistry, PLAIN_BINDING,
};
use crate::dialect::ColumnType;
use crate::error::{Error, Result};
use crate::value::Value;

/// Connect `Decimal` logical type name
pub const DECIMAL_LOGICAL: &str = "org.apache.kafka.connect.data.Decimal";
/// Connect `Date` logical type name
pub const DATE_LOGICAL: &str = "org.apache.kafka.connect.data.Date";
/// Connect `Time` logical type name
pub const TIME_LOGICAL: &str = "org.apache.kafka.connect.data.Time";
/// Connect `Timestamp` logical type name
pub const TIMESTAMP_LOGICAL: &str = "org.apache.kafka.connect.data.Timestamp";

const DECIMAL_SCALE: &str = "scale";
const DECIMAL_PRECISION: &str = "connect.decimal.precision";

/// Register every type in this module
pub fn register(registry: &mut TypeRegistry) {
    for ty in [
        &INT8, &INT16, &INT32, &INT64, &FLOAT32, &FLOAT64, &BOOLEAN, &STRING, &BYTES, &ARRAY,
        &MAP, &DECIMAL, &DATE, &TIME, &TIMESTAMP,
    ] {
        registry.register(ty);
    }
}

/// `INT8`
pub static INT8: SqlType = SqlType {
    name: "Int8",
    keys: &["INT8"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::TinyInt),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        let n = integer("INT8", value)?;
        i8::try_from(n)
            .map(Value::Int8)
            .map_err(|_| out_of_range("INT8", n))
    },
    default_value: numeric_default,
};

/// `INT16`
pub static INT16: SqlType = SqlType {
    name: "Int16",
    keys: &["INT16"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::SmallInt),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        let n = integer("INT16", value)?;
        i16::try_from(n)
            .map(Value::Int16)
            .map_err(|_| out_of_range("INT16", n))
    },
    default_value: numeric_default,
};

/// `INT32`
pub static INT32: SqlType = SqlType {
    name: "Int32",
    keys: &["INT32"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Integer),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        let n = integer("INT32", value)?;
        i32::try_from(n)
            .map(Value::Int32)
            .map_err(|_| out_of_range("INT32", n))
    },
    default_value: numeric_default,
};

/// `INT64`
pub static INT64: SqlType = SqlType {
    name: "Int64",
    keys: &["INT64"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::BigInt),
    binding: PLAIN_BINDING,
    binder: |_, value| integer("INT64", value).map(Value::Int64),
    default_value: numeric_default,
};

/// `FLOAT32`
pub static FLOAT32: SqlType = SqlType {
    name: "Float32",
    keys: &["FLOAT32"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Real),
    binding: PLAIN_BINDING,
    binder: |_, value| float("FLOAT32", value).map(|f| Value::Float32(f as f32)),
    default_value: numeric_default,
};

/// `FLOAT64`
pub static FLOAT64: SqlType = SqlType {
    name: "Float64",
    keys: &["FLOAT64"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Double),
    binding: PLAIN_BINDING,
    binder: |_, value| float("FLOAT64", value).map(Value::Float64),
    default_value: numeric_default,
};

/// `BOOLEAN`
pub static BOOLEAN: SqlType = SqlType {
    name: "Boolean",
    keys: &["BOOLEAN"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Boolean),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| unexpected("BOOLEAN", value, "boolean"))
    },
    default_value: boolean_default,
};

/// `STRING`
pub static STRING: SqlType = SqlType {
    name: "String",
    keys: &["STRING"],
    native_type: character_type,
    binding: PLAIN_BINDING,
    binder: bind_string,
    default_value: string_default,
};

/// `BYTES`, base64 encoded in JSON payloads
pub static BYTES: SqlType = SqlType {
    name: "Bytes",
    keys: &["BYTES"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Bytes),
    binding: PLAIN_BINDING,
    binder: |_, value| bytes("BYTES", value).map(Value::Bytes),
    default_value: no_default,
};

/// `ARRAY`, stored as JSON text
pub static ARRAY: SqlType = SqlType {
    name: "Array",
    keys: &["ARRAY"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Text),
    binding: PLAIN_BINDING,
    binder: bind_json_text,
    default_value: no_default,
};

/// `MAP`, stored as JSON text
pub static MAP: SqlType = SqlType {
    name: "Map",
    keys: &["MAP"],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Text),
    binding: PLAIN_BINDING,
    binder: bind_json_text,
    default_value: no_default,
};

/// Connect `Decimal`: base64 of the unscaled two's-complement big-endian integer
pub static DECIMAL: SqlType = SqlType {
    name: "Decimal",
    keys: &[DECIMAL_LOGICAL],
    native_type: |dialect, schema, _| {
        dialect.native_type(ColumnType::Decimal {
            precision: schema
                .parameter(DECIMAL_PRECISION)
                .and_then(|p| p.parse().ok()),
            scale: schema.parameter(DECIMAL_SCALE).and_then(|s| s.parse().ok()),
        })
    },
    binding: PLAIN_BINDING,
    binder: |schema, value| {
        let scale = schema
            .parameter(DECIMAL_SCALE)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        decimal(value, scale).map(Value::Decimal)
    },
    default_value: no_default,
};

/// Connect `Date`: days since the epoch
pub static DATE: SqlType = SqlType {
    name: "ConnectDate",
    keys: &[DATE_LOGICAL],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Date),
    binding: PLAIN_BINDING,
    binder: |_, value| epoch_days("Date", integer("Date", value)?).map(Value::Date),
    default_value: no_default,
};

/// Connect `Time`: milliseconds since midnight
pub static TIME: SqlType = SqlType {
    name: "ConnectTime",
    keys: &[TIME_LOGICAL],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Time),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        time_of_day("Time", integer("Time", value)?, 1_000_000).map(Value::Time)
    },
    default_value: no_default,
};

/// Connect `Timestamp`: milliseconds since the epoch
pub static TIMESTAMP: SqlType = SqlType {
    name: "ConnectTimestamp",
    keys: &[TIMESTAMP_LOGICAL],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Timestamp),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        epoch_timestamp("Timestamp", integer("Timestamp", value)?, 1_000_000).map(Value::DateTime)
    },
    default_value: no_default,
};

// ---------------------------------------------------------------------------
// Conversions shared with the logical types
// ---------------------------------------------------------------------------

pub(crate) fn integer(type_name: &str, value: &JsonValue) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| unexpected(type_name, value, "integer"))
}

pub(crate) fn float(type_name: &str, value: &JsonValue) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| unexpected(type_name, value, "number"))
}

fn out_of_range(type_name: &str, n: i64) -> Error {
    Error::unsupported_value(type_name, format!("{} is out of range", n))
}

pub(crate) fn bytes(type_name: &str, value: &JsonValue) -> Result<Vec<u8>> {
    let text = value
        .as_str()
        .ok_or_else(|| unexpected(type_name, value, "base64 string"))?;
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| Error::unsupported_value(type_name, format!("invalid base64: {}", e)))
}

/// Decode a decimal from base64 unscaled bytes or a plain number
pub(crate) fn decimal(value: &JsonValue, scale: u32) -> Result<Decimal> {
    match value {
        JsonValue::String(_) => {
            let raw = bytes("Decimal", value)?;
            if raw.is_empty() || raw.len() > 16 {
                return Err(Error::unsupported_value(
                    "Decimal",
                    format!("unscaled value of {} bytes is not supported", raw.len()),
                ));
            }
            let mut unscaled: i128 = if raw[0] & 0x80 != 0 { -1 } else { 0 };
            for byte in raw {
                unscaled = (unscaled << 8) | i128::from(byte);
            }
            Decimal::try_from_i128_with_scale(unscaled, scale)
                .map_err(|e| Error::unsupported_value("Decimal", e.to_string()))
        }
        JsonValue::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(|e| Error::unsupported_value("Decimal", e.to_string())),
        other => Err(unexpected("Decimal", other, "base64 string or number")),
    }
}

pub(crate) fn epoch_days(type_name: &str, days: i64) -> Result<NaiveDate> {
    days.checked_mul(86_400)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.date_naive())
        .ok_or_else(|| out_of_range(type_name, days))
}

/// `nanos_per_unit` is 1_000_000 for millis, 1_000 for micros and 1 for nanos
pub(crate) fn epoch_timestamp(
    type_name: &str,
    value: i64,
    nanos_per_unit: i64,
) -> Result<NaiveDateTime> {
    let units_per_second = 1_000_000_000 / nanos_per_unit;
    let secs = value.div_euclid(units_per_second);
    let nanos = value.rem_euclid(units_per_second) * nanos_per_unit;
    DateTime::from_timestamp(secs, nanos as u32)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| out_of_range(type_name, value))
}

pub(crate) fn time_of_day(type_name: &str, value: i64, nanos_per_unit: i64) -> Result<NaiveTime> {
    let units_per_second = 1_000_000_000 / nanos_per_unit;
    let secs = value.div_euclid(units_per_second);
    let nanos = value.rem_euclid(units_per_second) * nanos_per_unit;
    u32::try_from(secs)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos as u32))
        .ok_or_else(|| out_of_range(type_name, value))
}
