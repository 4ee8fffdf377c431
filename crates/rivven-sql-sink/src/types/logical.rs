//! Debezium logical types
//!
//! Temporal values arrive as epoch offsets in the unit named by the logical
//! type (`MicroTimestamp` is microseconds since the epoch, `NanoTime` is
//! nanoseconds since midnight, ...). Zoned values arrive as ISO-8601 text.

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Utc};
use serde_json::Value as JsonValue;

use super::connect::{bytes, epoch_days, epoch_timestamp, integer, time_of_day};
use super::{
    bind_string, character_type, no_default, string_default, unexpected, SqlType, TypeRegistry,
    PLAIN_BINDING,
};
use crate::dialect::ColumnType;
use crate::error::{Error, Result};
use crate::value::Value;

/// `Date` logical type name
pub const DATE: &str = "io.debezium.time.Date";
/// `Time` logical type name
pub const TIME: &str = "io.debezium.time.Time";
/// `MicroTime` logical type name
pub const MICRO_TIME: &str = "io.debezium.time.MicroTime";
/// `NanoTime` logical type name
pub const NANO_TIME: &str = "io.debezium.time.NanoTime";
/// `Timestamp` logical type name
pub const TIMESTAMP: &str = "io.debezium.time.Timestamp";
/// `MicroTimestamp` logical type name
pub const MICRO_TIMESTAMP: &str = "io.debezium.time.MicroTimestamp";
/// `NanoTimestamp` logical type name
pub const NANO_TIMESTAMP: &str = "io.debezium.time.NanoTimestamp";
/// `ZonedTimestamp` logical type name
pub const ZONED_TIMESTAMP: &str = "io.debezium.time.ZonedTimestamp";
/// `ZonedTime` logical type name
pub const ZONED_TIME: &str = "io.debezium.time.ZonedTime";
/// `Year` logical type name
pub const YEAR: &str = "io.debezium.time.Year";
/// `Json` logical type name
pub const JSON: &str = "io.debezium.data.Json";
/// `Uuid` logical type name
pub const UUID: &str = "io.debezium.data.Uuid";
/// `Enum` logical type name
pub const ENUM: &str = "io.debezium.data.Enum";
/// `EnumSet` logical type name
pub const ENUM_SET: &str = "io.debezium.data.EnumSet";
/// `Bits` logical type name
pub const BITS: &str = "io.debezium.data.Bits";

/// Register every type in this module
pub fn register(registry: &mut TypeRegistry) {
    for ty in [
        &DATE_TYPE,
        &TIME_TYPE,
        &MICRO_TIME_TYPE,
        &NANO_TIME_TYPE,
        &TIMESTAMP_TYPE,
        &MICRO_TIMESTAMP_TYPE,
        &NANO_TIMESTAMP_TYPE,
        &ZONED_TIMESTAMP_TYPE,
        &ZONED_TIME_TYPE,
        &JSON_TYPE,
        &UUID_TYPE,
        &ENUM_TYPE,
        &ENUM_SET_TYPE,
        &BITS_TYPE,
    ] {
        registry.register(ty);
    }
}

/// Debezium `Date`: days since the epoch
pub static DATE_TYPE: SqlType = SqlType {
    name: "Date",
    keys: &[DATE],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Date),
    binding: PLAIN_BINDING,
    binder: |_, value| epoch_days("Date", integer("Date", value)?).map(Value::Date),
    default_value: no_default,
};

/// Debezium `Time`: milliseconds since midnight
pub static TIME_TYPE: SqlType = SqlType {
    name: "Time",
    keys: &[TIME],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Time),
    binding: PLAIN_BINDING,
    binder: |_, value| time_of_day("Time", integer("Time", value)?, 1_000_000).map(Value::Time),
    default_value: no_default,
};

/// Debezium `MicroTime`: microseconds since midnight
pub static MICRO_TIME_TYPE: SqlType = SqlType {
    name: "MicroTime",
    keys: &[MICRO_TIME],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Time),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        time_of_day("MicroTime", integer("MicroTime", value)?, 1_000).map(Value::Time)
    },
    default_value: no_default,
};

/// Debezium `NanoTime`: nanoseconds since midnight
pub static NANO_TIME_TYPE: SqlType = SqlType {
    name: "NanoTime",
    keys: &[NANO_TIME],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Time),
    binding: PLAIN_BINDING,
    binder: |_, value| time_of_day("NanoTime", integer("NanoTime", value)?, 1).map(Value::Time),
    default_value: no_default,
};

/// Debezium `Timestamp`: milliseconds since the epoch
pub static TIMESTAMP_TYPE: SqlType = SqlType {
    name: "Timestamp",
    keys: &[TIMESTAMP],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Timestamp),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        epoch_timestamp("Timestamp", integer("Timestamp", value)?, 1_000_000).map(Value::DateTime)
    },
    default_value: no_default,
};

/// Debezium `MicroTimestamp`: microseconds since the epoch
pub static MICRO_TIMESTAMP_TYPE: SqlType = SqlType {
    name: "MicroTimestamp",
    keys: &[MICRO_TIMESTAMP],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Timestamp),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        epoch_timestamp("MicroTimestamp", integer("MicroTimestamp", value)?, 1_000)
            .map(Value::DateTime)
    },
    default_value: no_default,
};

/// Debezium `NanoTimestamp`: nanoseconds since the epoch
pub static NANO_TIMESTAMP_TYPE: SqlType = SqlType {
    name: "NanoTimestamp",
    keys: &[NANO_TIMESTAMP],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Timestamp),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        epoch_timestamp("NanoTimestamp", integer("NanoTimestamp", value)?, 1).map(Value::DateTime)
    },
    default_value: no_default,
};

/// ISO-8601 timestamp with offset, normalized to UTC
pub static ZONED_TIMESTAMP_TYPE: SqlType = SqlType {
    name: "ZonedTimestamp",
    keys: &[ZONED_TIMESTAMP],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::TimestampTz),
    binding: PLAIN_BINDING,
    binder: |_, value| zoned_timestamp(value).map(|ts| Value::DateTimeTz(ts.with_timezone(&Utc))),
    default_value: no_default,
};

/// ISO-8601 time with offset, normalized to UTC
pub static ZONED_TIME_TYPE: SqlType = SqlType {
    name: "ZonedTime",
    keys: &[ZONED_TIME],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Time),
    binding: PLAIN_BINDING,
    binder: |_, value| zoned_time(value).map(Value::Time),
    default_value: no_default,
};

/// Debezium `Json` text
pub static JSON_TYPE: SqlType = SqlType {
    name: "Json",
    keys: &[JSON],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Json),
    binding: PLAIN_BINDING,
    binder: bind_string,
    default_value: no_default,
};

/// Debezium `Uuid` text
pub static UUID_TYPE: SqlType = SqlType {
    name: "Uuid",
    keys: &[UUID],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Uuid),
    binding: PLAIN_BINDING,
    binder: bind_string,
    default_value: string_default,
};

/// Debezium `Enum` text
pub static ENUM_TYPE: SqlType = SqlType {
    name: "Enum",
    keys: &[ENUM],
    native_type: character_type,
    binding: PLAIN_BINDING,
    binder: bind_string,
    default_value: string_default,
};

/// Debezium `EnumSet`, comma-separated text
pub static ENUM_SET_TYPE: SqlType = SqlType {
    name: "EnumSet",
    keys: &[ENUM_SET],
    native_type: character_type,
    binding: PLAIN_BINDING,
    binder: bind_string,
    default_value: string_default,
};

/// Debezium `Bits` bytes
pub static BITS_TYPE: SqlType = SqlType {
    name: "Bits",
    keys: &[BITS],
    native_type: |dialect, _, _| dialect.native_type(ColumnType::Bytes),
    binding: PLAIN_BINDING,
    binder: |_, value| bytes("Bits", value).map(Value::Bytes),
    default_value: no_default,
};

pub(crate) fn zoned_timestamp(value: &JsonValue) -> Result<DateTime<FixedOffset>> {
    let text = value
        .as_str()
        .ok_or_else(|| unexpected("ZonedTimestamp", value, "ISO-8601 string"))?;
    DateTime::parse_from_rfc3339(text)
        .map_err(|e| Error::unsupported_value("ZonedTimestamp", format!("'{}': {}", text, e)))
}

/// Parse `HH:MM:SS[.fff](Z|+HH:MM)` and shift it to UTC
fn zoned_time(value: &JsonValue) -> Result<NaiveTime> {
    let text = value
        .as_str()
        .ok_or_else(|| unexpected("ZonedTime", value, "ISO-8601 string"))?;
    let invalid = || Error::unsupported_value("ZonedTime", format!("invalid zoned time '{}'", text));

    let (time, offset_secs) = if let Some(time) = text.strip_suffix('Z') {
        (time, 0)
    } else {
        let split = text.rfind(['+', '-']).ok_or_else(invalid)?;
        (&text[..split], parse_offset(&text[split..]).ok_or_else(invalid)?)
    };

    let time = NaiveTime::parse_from_str(time, "%H:%M:%S%.f").map_err(|_| invalid())?;
    let (utc, _) = time.overflowing_sub_signed(TimeDelta::seconds(i64::from(offset_secs)));
    Ok(utc)
}

/// `+HH:MM`, `+HHMM` or `+HH` as seconds east of UTC
fn parse_offset(text: &str) -> Option<i32> {
    let sign = match text.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits: String = text[1..].chars().filter(|c| *c != ':').collect();
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    (hours < 24 && minutes < 60).then_some(sign * (hours * 3600 + minutes * 60))
}
