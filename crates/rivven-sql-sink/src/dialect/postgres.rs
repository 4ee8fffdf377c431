//! PostgreSQL syntax and type overrides

use sea_query::{Alias, Expr, PostgresQueryBuilder, Query};
use serde_json::Value as JsonValue;

use super::{ColumnType, DatabaseVersion, Engine, SqlDialect, UpsertSyntax, VersionedSyntax};
use crate::error::Error;
use crate::security::escape_string_literal;
use crate::table::TableId;
use crate::types::logical;
use crate::types::{
    bind_json_text, bind_string, no_default, string_default, unexpected, SqlType, TypeRegistry,
    PLAIN_BINDING,
};
use crate::value::Value;

const DEFAULT_SCHEMA: &str = "public";

const UPSERT_SYNTAXES: &[VersionedSyntax] = &[VersionedSyntax::new(
    DatabaseVersion::new(9, 5, 0),
    UpsertSyntax::OnConflict,
)];

/// PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn fold_unquoted_identifier(&self, name: &str) -> String {
        name.to_lowercase()
    }

    fn table_exists_sql(&self, table: &TableId) -> String {
        let schema = table.schema.as_deref().unwrap_or(DEFAULT_SCHEMA);
        let exists = Query::select()
            .expr(Expr::val(1))
            .from((Alias::new("information_schema"), Alias::new("tables")))
            .and_where(Expr::col(Alias::new("table_schema")).eq(schema))
            .and_where(Expr::col(Alias::new("table_name")).eq(table.table.as_str()))
            .to_owned();
        Query::select()
            .expr(Expr::exists(exists))
            .to_string(PostgresQueryBuilder)
    }

    fn list_columns_sql(&self, table: &TableId) -> String {
        let schema = escape_string_literal(table.schema.as_deref().unwrap_or(DEFAULT_SCHEMA));
        let name = escape_string_literal(&table.table);
        format!(
            r#"SELECT
                c.column_name,
                c.data_type,
                c.is_nullable = 'YES' as nullable,
                c.ordinal_position,
                c.column_default,
                CASE WHEN pk.column_name IS NOT NULL THEN pk.ordinal_position END as pk_ordinal
            FROM information_schema.columns c
            LEFT JOIN (
                SELECT ku.column_name, ku.ordinal_position
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage ku
                    ON tc.constraint_name = ku.constraint_name
                    AND tc.table_schema = ku.table_schema
                    AND tc.table_name = ku.table_name
                WHERE tc.constraint_type = 'PRIMARY KEY'
                    AND tc.table_schema = '{}'
                    AND tc.table_name = '{}'
            ) pk ON c.column_name = pk.column_name
            WHERE c.table_schema = '{}' AND c.table_name = '{}'
            ORDER BY c.ordinal_position"#,
            schema, name, schema, name
        )
    }

    fn native_type(&self, column: ColumnType) -> String {
        match column {
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::TinyInt | ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Real => "real".to_string(),
            ColumnType::Double => "double precision".to_string(),
            ColumnType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("numeric({},{})", p, s),
                (Some(p), None) => format!("numeric({})", p),
                _ => "numeric".to_string(),
            },
            ColumnType::Varchar(Some(len)) => format!("varchar({})", len),
            ColumnType::Varchar(None) => "varchar".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Bytes => "bytea".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Time => "time".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::TimestampTz => "timestamptz".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Json => "json".to_string(),
        }
    }

    fn register_types(&self, registry: &mut TypeRegistry) {
        registry.register(&ARRAY);
        registry.register(&JSONB);
        registry.register(&UUID);
    }

    fn upsert_syntaxes(&self) -> &'static [VersionedSyntax] {
        UPSERT_SYNTAXES
    }
}

/// `ARRAY` as `text[]`, bound as a comma-joined string
pub static ARRAY: SqlType = SqlType {
    name: "PostgresArray",
    keys: &["ARRAY"],
    native_type: |_, _, _| "text[]".to_string(),
    binding: "STRING_TO_ARRAY(?, ',')",
    binder: |_, value| match value {
        JsonValue::Array(items) => Ok(Value::String(
            items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        )),
        JsonValue::String(s) => Ok(Value::String(s.clone())),
        other => Err(unexpected("ARRAY", other, "array")),
    },
    default_value: no_default,
};

/// `Json` and `MAP` as `jsonb`
pub static JSONB: SqlType = SqlType {
    name: "PostgresJsonb",
    keys: &[logical::JSON, "MAP", "JSON", "JSONB"],
    native_type: |_, _, _| "jsonb".to_string(),
    binding: "CAST(? AS jsonb)",
    binder: bind_json_text,
    default_value: no_default,
};

/// `Uuid` as native `uuid`
pub static UUID: SqlType = SqlType {
    name: "PostgresUuid",
    keys: &[logical::UUID, "UUID"],
    native_type: |_, _, _| "uuid".to_string(),
    binding: PLAIN_BINDING,
    binder: |schema, value| {
        let text = bind_string(schema, value)?;
        let text = text.as_str().unwrap_or_default();
        uuid::Uuid::parse_str(text)
            .map(Value::Uuid)
            .map_err(|e| Error::unsupported_value("Uuid", e.to_string()))
    },
    default_value: string_default,
};
