//! SQL Server syntax and type overrides
//!
//! sea-query has no SQL Server backend, so all SQL here is written by hand.

use super::{ColumnType, DatabaseVersion, Engine, SqlDialect, UpsertSyntax, VersionedSyntax};
use crate::security::escape_string_literal;
use crate::table::TableId;
use crate::types::logical::{self, zoned_timestamp};
use crate::types::{
    bind_json_text, boolean_default, no_default, unexpected, SqlType, TypeRegistry, PLAIN_BINDING,
};
use crate::value::Value;

const DEFAULT_SCHEMA: &str = "dbo";

/// nvarchar(n) is limited to 4000 characters
const MAX_VARCHAR_LENGTH_IN_KEY: u32 = 4000;

const UPSERT_SYNTAXES: &[VersionedSyntax] = &[VersionedSyntax::new(
    DatabaseVersion::new(0, 0, 0),
    UpsertSyntax::Merge,
)];

/// SQL Server dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn engine(&self) -> Engine {
        Engine::SqlServer
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{}", index)
    }

    fn table_exists_sql(&self, table: &TableId) -> String {
        let schema = escape_string_literal(table.schema.as_deref().unwrap_or(DEFAULT_SCHEMA));
        let name = escape_string_literal(&table.table);
        format!(
            "SELECT CASE WHEN EXISTS(SELECT 1 FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}') THEN 1 ELSE 0 END",
            schema, name
        )
    }

    fn list_columns_sql(&self, table: &TableId) -> String {
        let schema = escape_string_literal(table.schema.as_deref().unwrap_or(DEFAULT_SCHEMA));
        let name = escape_string_literal(&table.table);
        format!(
            r#"SELECT
                c.COLUMN_NAME as column_name,
                c.DATA_TYPE as data_type,
                CASE c.IS_NULLABLE WHEN 'YES' THEN 1 ELSE 0 END as nullable,
                c.ORDINAL_POSITION as ordinal_position,
                c.COLUMN_DEFAULT as column_default,
                pk.ORDINAL_POSITION as pk_ordinal
            FROM INFORMATION_SCHEMA.COLUMNS c
            LEFT JOIN (
                SELECT ku.COLUMN_NAME, ku.ORDINAL_POSITION
                FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
                JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE ku
                    ON tc.CONSTRAINT_NAME = ku.CONSTRAINT_NAME
                    AND tc.TABLE_SCHEMA = ku.TABLE_SCHEMA
                WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
                    AND tc.TABLE_SCHEMA = '{}'
                    AND tc.TABLE_NAME = '{}'
            ) pk ON c.COLUMN_NAME = pk.COLUMN_NAME
            WHERE c.TABLE_SCHEMA = '{}' AND c.TABLE_NAME = '{}'
            ORDER BY c.ORDINAL_POSITION"#,
            schema, name, schema, name
        )
    }

    fn native_type(&self, column: ColumnType) -> String {
        match column {
            ColumnType::Boolean => "bit".to_string(),
            // tinyint is unsigned in SQL Server
            ColumnType::TinyInt | ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "int".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Real => "real".to_string(),
            ColumnType::Double => "float".to_string(),
            ColumnType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("decimal({},{})", p, s),
                (Some(p), None) => format!("decimal({})", p),
                (None, Some(s)) => format!("decimal(38,{})", s.min(38)),
                (None, None) => "decimal(38,10)".to_string(),
            },
            ColumnType::Varchar(Some(len)) if len <= MAX_VARCHAR_LENGTH_IN_KEY => {
                format!("nvarchar({})", len)
            }
            ColumnType::Varchar(_) | ColumnType::Text | ColumnType::Json => {
                "nvarchar(max)".to_string()
            }
            ColumnType::Bytes => "varbinary(max)".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Time => "time".to_string(),
            ColumnType::Timestamp => "datetime2".to_string(),
            ColumnType::TimestampTz => "datetimeoffset".to_string(),
            ColumnType::Uuid => "uniqueidentifier".to_string(),
        }
    }

    fn register_types(&self, registry: &mut TypeRegistry) {
        registry.register(&BOOLEAN);
        registry.register(&ZONED_TIMESTAMP);
        registry.register(&JSON);
    }

    fn max_varchar_length_in_key(&self) -> Option<u32> {
        Some(MAX_VARCHAR_LENGTH_IN_KEY)
    }

    fn upsert_syntaxes(&self) -> &'static [VersionedSyntax] {
        UPSERT_SYNTAXES
    }

    fn alter_table_add_columns(&self, table: &str, columns: &[String]) -> String {
        format!("ALTER TABLE {} ADD {}", table, columns.join(", "))
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }
}

/// `BOOLEAN` as `bit`
pub static BOOLEAN: SqlType = SqlType {
    name: "SqlServerBit",
    keys: &["BOOLEAN"],
    native_type: |_, _, _| "bit".to_string(),
    binding: PLAIN_BINDING,
    binder: |_, value| {
        value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| unexpected("BOOLEAN", value, "boolean"))
    },
    default_value: boolean_default,
};

/// Bound with its original offset into `datetimeoffset`
pub static ZONED_TIMESTAMP: SqlType = SqlType {
    name: "SqlServerZonedTimestamp",
    keys: &[logical::ZONED_TIMESTAMP],
    native_type: |_, _, _| "datetimeoffset".to_string(),
    binding: PLAIN_BINDING,
    binder: |_, value| zoned_timestamp(value).map(Value::DateTimeOffset),
    default_value: no_default,
};

/// `Json` and `MAP` as `nvarchar(max)`
pub static JSON: SqlType = SqlType {
    name: "SqlServerJson",
    keys: &[logical::JSON, "MAP"],
    native_type: |_, _, _| "nvarchar(max)".to_string(),
    binding: PLAIN_BINDING,
    binder: bind_json_text,
    default_value: no_default,
};
