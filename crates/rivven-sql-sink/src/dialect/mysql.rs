//! MySQL and MariaDB syntax and type overrides
//!
//! MariaDB shares MySQL's syntax and types except for its upsert table: it
//! never gained the `INSERT ... AS new` row alias, so it always uses
//! `VALUES(col)`.

use sea_query::{Alias, Expr, MysqlQueryBuilder, Order, Query, SimpleExpr};

use super::{ColumnType, DatabaseVersion, Engine, SqlDialect, UpsertSyntax, VersionedSyntax};
use crate::error::Error;
use crate::schema::Schema;
use crate::table::TableId;
use crate::types::connect::{bytes, integer};
use crate::types::logical::{self, zoned_timestamp};
use crate::types::{
    bind_json_text, bind_string, boolean_default, no_default, numeric_default, string_default,
    unexpected, SqlType, TypeRegistry, PLAIN_BINDING,
};
use crate::value::Value;

const MAX_VARCHAR_LENGTH_IN_KEY: u32 = 255;

const NO_DEFAULT_TYPES: &[&str] = &[
    "tinytext",
    "mediumtext",
    "longtext",
    "text",
    "tinyblob",
    "mediumblob",
    "longblob",
    "blob",
];

const MYSQL_UPSERT_SYNTAXES: &[VersionedSyntax] = &[
    VersionedSyntax::new(
        DatabaseVersion::new(8, 0, 20),
        UpsertSyntax::DuplicateKeyRowAlias,
    ),
    VersionedSyntax::new(DatabaseVersion::new(0, 0, 0), UpsertSyntax::DuplicateKeyValues),
];

const MARIADB_UPSERT_SYNTAXES: &[VersionedSyntax] = &[VersionedSyntax::new(
    DatabaseVersion::new(0, 0, 0),
    UpsertSyntax::DuplicateKeyValues,
)];

/// MySQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn table_exists_sql(&self, table: &TableId) -> String {
        let exists = Query::select()
            .expr(Expr::val(1))
            .from((Alias::new("information_schema"), Alias::new("tables")))
            .and_where(schema_filter(table))
            .and_where(Expr::col(Alias::new("table_name")).eq(table.table.as_str()))
            .to_owned();
        Query::select()
            .expr(Expr::exists(exists))
            .to_string(MysqlQueryBuilder)
    }

    fn list_columns_sql(&self, table: &TableId) -> String {
        Query::select()
            .expr_as(Expr::col(Alias::new("column_name")), Alias::new("column_name"))
            .expr_as(Expr::col(Alias::new("column_type")), Alias::new("data_type"))
            .expr_as(
                Expr::col(Alias::new("is_nullable")).eq("YES"),
                Alias::new("nullable"),
            )
            .expr_as(
                Expr::col(Alias::new("ordinal_position")),
                Alias::new("ordinal_position"),
            )
            .expr_as(
                Expr::col(Alias::new("column_default")),
                Alias::new("column_default"),
            )
            .expr_as(
                Expr::col(Alias::new("column_key")).eq("PRI"),
                Alias::new("is_primary_key"),
            )
            .from((Alias::new("information_schema"), Alias::new("columns")))
            .and_where(schema_filter(table))
            .and_where(Expr::col(Alias::new("table_name")).eq(table.table.as_str()))
            .order_by(Alias::new("ordinal_position"), Order::Asc)
            .to_string(MysqlQueryBuilder)
    }

    fn native_type(&self, column: ColumnType) -> String {
        mysql_native_type(column)
    }

    fn register_types(&self, registry: &mut TypeRegistry) {
        register_mysql_types(registry);
    }

    fn max_varchar_length_in_key(&self) -> Option<u32> {
        Some(MAX_VARCHAR_LENGTH_IN_KEY)
    }

    fn no_default_types(&self) -> &'static [&'static str] {
        NO_DEFAULT_TYPES
    }

    fn upsert_syntaxes(&self) -> &'static [VersionedSyntax] {
        MYSQL_UPSERT_SYNTAXES
    }

    fn escape_string(&self, value: &str) -> String {
        mysql_escape_string(value)
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }
}

/// MariaDB dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct MariaDbDialect;

impl SqlDialect for MariaDbDialect {
    fn engine(&self) -> Engine {
        Engine::MariaDb
    }

    fn quote_identifier(&self, name: &str) -> String {
        MySqlDialect.quote_identifier(name)
    }

    fn placeholder(&self, index: usize) -> String {
        MySqlDialect.placeholder(index)
    }

    fn table_exists_sql(&self, table: &TableId) -> String {
        MySqlDialect.table_exists_sql(table)
    }

    fn list_columns_sql(&self, table: &TableId) -> String {
        MySqlDialect.list_columns_sql(table)
    }

    fn native_type(&self, column: ColumnType) -> String {
        match column {
            // native UUID since 10.7
            ColumnType::Uuid => "uuid".to_string(),
            other => mysql_native_type(other),
        }
    }

    fn register_types(&self, registry: &mut TypeRegistry) {
        register_mysql_types(registry);
    }

    fn max_varchar_length_in_key(&self) -> Option<u32> {
        Some(MAX_VARCHAR_LENGTH_IN_KEY)
    }

    fn no_default_types(&self) -> &'static [&'static str] {
        NO_DEFAULT_TYPES
    }

    fn upsert_syntaxes(&self) -> &'static [VersionedSyntax] {
        MARIADB_UPSERT_SYNTAXES
    }

    fn escape_string(&self, value: &str) -> String {
        mysql_escape_string(value)
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        MySqlDialect.boolean_literal(value)
    }
}

fn schema_filter(table: &TableId) -> SimpleExpr {
    let schema = table.schema.as_deref().or(table.catalog.as_deref());
    match schema {
        Some(db) => Expr::col(Alias::new("table_schema")).eq(db),
        None => Expr::col(Alias::new("table_schema")).eq(Expr::cust("DATABASE()")),
    }
}

fn mysql_escape_string(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
}

fn mysql_native_type(column: ColumnType) -> String {
    match column {
        ColumnType::Boolean => "boolean".to_string(),
        ColumnType::TinyInt => "tinyint".to_string(),
        ColumnType::SmallInt => "smallint".to_string(),
        ColumnType::Integer => "int".to_string(),
        ColumnType::BigInt => "bigint".to_string(),
        ColumnType::Real => "float".to_string(),
        ColumnType::Double => "double".to_string(),
        ColumnType::Decimal { precision, scale } => match (precision, scale) {
            (Some(p), Some(s)) => format!("decimal({},{})", p, s),
            (Some(p), None) => format!("decimal({})", p),
            // DECIMAL(M) requires M >= D
            (None, Some(s)) => format!("decimal(65,{})", s.min(30)),
            (None, None) => "decimal(65,30)".to_string(),
        },
        ColumnType::Varchar(Some(len)) if len <= 65535 => format!("varchar({})", len),
        ColumnType::Varchar(_) | ColumnType::Text => "longtext".to_string(),
        ColumnType::Bytes => "longblob".to_string(),
        ColumnType::Date => "date".to_string(),
        ColumnType::Time => "time".to_string(),
        ColumnType::Timestamp => "datetime".to_string(),
        ColumnType::TimestampTz => "timestamp".to_string(),
        ColumnType::Uuid => "char(36)".to_string(),
        ColumnType::Json => "json".to_string(),
    }
}

fn register_mysql_types(registry: &mut TypeRegistry) {
    for ty in [
        &BOOLEAN,
        &BIT,
        &BYTES,
        &ENUM,
        &SET,
        &TINYINT,
        &MEDIUMINT,
        &INT,
        &YEAR,
        &JSON,
        &MAP,
        &ZONED_TIMESTAMP,
    ] {
        registry.register(ty);
    }
}

/// `allowed` parameter rendered as a quoted value list
fn allowed_values(schema: &Schema) -> String {
    schema
        .parameter("allowed")
        .unwrap_or_default()
        .split(',')
        .filter(|v| !v.is_empty())
        .map(|v| format!("'{}'", mysql_escape_string(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// `BOOLEAN` as `tinyint(1)`
pub static BOOLEAN: SqlType = SqlType {
    name: "MySqlBoolean",
    keys: &["BOOLEAN"],
    native_type: |_, _, _| "tinyint(1)".to_string(),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        value
            .as_bool()
            .map(|b| Value::Int8(i8::from(b)))
            .ok_or_else(|| unexpected("BOOLEAN", value, "boolean"))
    },
    default_value: boolean_default,
};

/// Debezium `Bits` as `bit(n)`
pub static BIT: SqlType = SqlType {
    name: "MySqlBit",
    keys: &[logical::BITS, "BIT"],
    native_type: |_, schema, _| {
        let length = schema
            .parameter("length")
            .and_then(|l| l.parse::<u32>().ok())
            .or_else(|| schema.source_column_length())
            .unwrap_or(1);
        format!("bit({})", length)
    },
    binding: PLAIN_BINDING,
    binder: |_, value| bytes("BIT", value).map(Value::Bytes),
    default_value: no_default,
};

/// `BYTES` as `longblob`, or `varbinary` in keys
pub static BYTES: SqlType = SqlType {
    name: "MySqlBytes",
    keys: &["BYTES"],
    native_type: |_, schema, key| {
        if key {
            let length = schema
                .source_column_length()
                .unwrap_or(MAX_VARCHAR_LENGTH_IN_KEY)
                .min(MAX_VARCHAR_LENGTH_IN_KEY);
            format!("varbinary({})", length)
        } else {
            "longblob".to_string()
        }
    },
    binding: PLAIN_BINDING,
    binder: |_, value| bytes("BYTES", value).map(Value::Bytes),
    default_value: no_default,
};

/// Debezium `Enum` as a native `enum`
pub static ENUM: SqlType = SqlType {
    name: "MySqlEnum",
    keys: &[logical::ENUM, "ENUM"],
    native_type: |_, schema, _| format!("enum({})", allowed_values(schema)),
    binding: PLAIN_BINDING,
    binder: bind_string,
    default_value: string_default,
};

/// Debezium `EnumSet` as a native `set`
pub static SET: SqlType = SqlType {
    name: "MySqlSet",
    keys: &[logical::ENUM_SET, "SET"],
    native_type: |_, schema, _| format!("set({})", allowed_values(schema)),
    binding: PLAIN_BINDING,
    binder: bind_string,
    default_value: string_default,
};

/// `TINYINT` source columns
pub static TINYINT: SqlType = SqlType {
    name: "MySqlTinyInt",
    keys: &["TINYINT"],
    native_type: |_, _, _| "tinyint".to_string(),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        let n = integer("TINYINT", value)?;
        i16::try_from(n)
            .map(Value::Int16)
            .map_err(|_| Error::unsupported_value("TINYINT", format!("{} is out of range", n)))
    },
    default_value: numeric_default,
};

/// `MEDIUMINT` source columns
pub static MEDIUMINT: SqlType = SqlType {
    name: "MySqlMediumInt",
    keys: &["MEDIUMINT"],
    native_type: |_, _, _| "mediumint".to_string(),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        let n = integer("MEDIUMINT", value)?;
        i32::try_from(n)
            .map(Value::Int32)
            .map_err(|_| Error::unsupported_value("MEDIUMINT", format!("{} is out of range", n)))
    },
    default_value: numeric_default,
};

/// `INT` source columns
pub static INT: SqlType = SqlType {
    name: "MySqlInt",
    keys: &["INT", "INTEGER"],
    native_type: |_, _, _| "int".to_string(),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        let n = integer("INT", value)?;
        i32::try_from(n)
            .map(Value::Int32)
            .map_err(|_| Error::unsupported_value("INT", format!("{} is out of range", n)))
    },
    default_value: numeric_default,
};

/// Debezium `Year`
pub static YEAR: SqlType = SqlType {
    name: "MySqlYear",
    keys: &[logical::YEAR, "YEAR"],
    native_type: |_, _, _| "year".to_string(),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        let n = integer("YEAR", value)?;
        i32::try_from(n)
            .map(Value::Int32)
            .map_err(|_| Error::unsupported_value("YEAR", format!("{} is out of range", n)))
    },
    default_value: numeric_default,
};

/// Debezium `Json` as native `json`
pub static JSON: SqlType = SqlType {
    name: "MySqlJson",
    keys: &[logical::JSON, "JSON"],
    native_type: |_, _, _| "json".to_string(),
    binding: PLAIN_BINDING,
    binder: bind_json_text,
    default_value: no_default,
};

/// `MAP` as native `json`
pub static MAP: SqlType = SqlType {
    name: "MySqlMap",
    keys: &["MAP"],
    native_type: |_, _, _| "json".to_string(),
    binding: PLAIN_BINDING,
    binder: bind_json_text,
    default_value: no_default,
};

/// Bound with its original offset; the MySQL driver converts it to the session zone
pub static ZONED_TIMESTAMP: SqlType = SqlType {
    name: "MySqlZonedTimestamp",
    keys: &[logical::ZONED_TIMESTAMP],
    native_type: |_, _, _| "timestamp(6)".to_string(),
    binding: PLAIN_BINDING,
    binder: |_, value| zoned_timestamp(value).map(Value::DateTimeOffset),
    default_value: no_default,
};
