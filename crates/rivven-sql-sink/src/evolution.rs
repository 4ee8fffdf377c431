//! Destination table creation and additive evolution
//!
//! Every table moves through `Unknown -> Cached -> (Stale -> Cached)*`. The
//! first write introspects the table, later writes compare against the cached
//! shape, and any failed DDL marks the entry stale so the next write
//! re-introspects.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::descriptor::{FieldDescriptor, SinkRecordDescriptor};
use crate::dialect::DatabaseDialect;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::statement::StatementBuilder;
use crate::table::{ColumnDescriptor, TableDescriptor, TableId};

/// Whether the sink may create and alter tables
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SchemaEvolutionMode {
    /// Tables must already exist with every column
    #[default]
    None,
    /// Create missing tables and add missing columns
    Basic,
}

/// What `ensure_schema` changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaEvolutionResult {
    /// The table was created
    pub table_created: bool,
    /// Columns added by ALTER TABLE
    pub columns_added: Vec<String>,
}

impl SchemaEvolutionResult {
    /// Whether any DDL was issued
    pub fn has_changes(&self) -> bool {
        self.table_created || !self.columns_added.is_empty()
    }
}

/// Cached knowledge about one destination table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    /// Never introspected
    Unknown,
    /// Last known shape
    Cached(TableDescriptor),
    /// Shape may be out of date; re-introspect before use
    Stale,
}

/// Per-table schema cache and DDL driver
#[derive(Debug, Default)]
pub struct SchemaEvolutionController {
    mode: SchemaEvolutionMode,
    cache: DashMap<TableId, Arc<Mutex<CacheState>>>,
}

impl SchemaEvolutionController {
    /// Create a controller with an empty cache
    pub fn new(mode: SchemaEvolutionMode) -> Self {
        Self {
            mode,
            cache: DashMap::new(),
        }
    }

    /// Configured evolution mode
    pub fn mode(&self) -> SchemaEvolutionMode {
        self.mode
    }

    fn entry(&self, table: &TableId) -> Arc<Mutex<CacheState>> {
        self.cache
            .entry(table.clone())
            .or_insert_with(|| Arc::new(Mutex::new(CacheState::Unknown)))
            .clone()
    }

    /// Current cache state of a table
    pub async fn state(&self, table: &TableId) -> CacheState {
        let entry = match self.cache.get(table) {
            Some(entry) => entry.clone(),
            None => return CacheState::Unknown,
        };
        let state = entry.lock().await;
        state.clone()
    }

    /// Force the next access to re-introspect the table
    pub async fn invalidate(&self, table: &TableId) {
        let entry = match self.cache.get(table) {
            Some(entry) => entry.clone(),
            None => return,
        };
        *entry.lock().await = CacheState::Stale;
        debug!(table = %table, "Schema cache entry invalidated");
    }

    /// Cached or freshly introspected shape, `None` if the table does not exist
    pub async fn describe<S>(&self, session: &S, table: &TableId) -> Result<Option<TableDescriptor>>
    where
        S: Session + ?Sized,
    {
        let entry = self.entry(table);
        let mut state = entry.lock().await;
        if let CacheState::Cached(descriptor) = &*state {
            return Ok(Some(descriptor.clone()));
        }

        let found = session.introspect_table(table).await?;
        if let Some(descriptor) = &found {
            *state = CacheState::Cached(descriptor.clone());
        }
        Ok(found)
    }

    /// Make sure the table exists and holds a column for every record field.
    ///
    /// The per-table lock is held across introspection, comparison and DDL
    /// and released before returning.
    pub async fn ensure_schema<S>(
        &self,
        session: &S,
        dialect: &DatabaseDialect,
        table: &TableId,
        record: &SinkRecordDescriptor,
    ) -> Result<(TableDescriptor, SchemaEvolutionResult)>
    where
        S: Session + ?Sized,
    {
        let entry = self.entry(table);
        let mut state = entry.lock().await;

        let existing = match &*state {
            CacheState::Cached(descriptor) => Some(descriptor.clone()),
            CacheState::Unknown | CacheState::Stale => {
                debug!(table = %table, "Introspecting destination table");
                session.introspect_table(table).await?
            }
        };

        let builder = StatementBuilder::new(dialect);

        let Some(mut descriptor) = existing else {
            if self.mode == SchemaEvolutionMode::None {
                return Err(Error::table_not_found(table.to_string()));
            }

            let statement = builder.build_create_table(table, record);
            if let Err(e) = session.execute(&statement.sql, &[]).await {
                warn!(table = %table, error = %e, "CREATE TABLE failed");
                *state = CacheState::Stale;
                return Err(e);
            }

            let created = created_shape(dialect, table, record);
            info!(
                table = %table,
                columns = ?created.column_names(),
                "Created destination table"
            );
            *state = CacheState::Cached(created.clone());
            return Ok((
                created,
                SchemaEvolutionResult {
                    table_created: true,
                    columns_added: Vec::new(),
                },
            ));
        };

        if let Err(e) = check_compatibility(&descriptor, record) {
            *state = CacheState::Cached(descriptor);
            return Err(e);
        }

        let missing: Vec<&FieldDescriptor> = builder.missing_fields(&descriptor, record);
        if missing.is_empty() {
            *state = CacheState::Cached(descriptor.clone());
            return Ok((descriptor, SchemaEvolutionResult::default()));
        }

        let names: Vec<String> = missing.iter().map(|f| f.column_name.clone()).collect();
        if self.mode == SchemaEvolutionMode::None {
            *state = CacheState::Cached(descriptor);
            return Err(Error::incompatible_schema(
                table.to_string(),
                format!("missing columns {:?}", names),
            ));
        }

        if let Some(statement) = builder.build_alter_table_add_columns(&descriptor, record) {
            if let Err(e) = session.execute(&statement.sql, &[]).await {
                warn!(table = %table, error = %e, "ALTER TABLE failed");
                *state = CacheState::Stale;
                return Err(e);
            }
        }

        for field in missing {
            descriptor.add_column(added_column(dialect, field));
        }
        info!(table = %table, columns = ?names, "Added columns to destination table");

        *state = CacheState::Cached(descriptor.clone());
        Ok((
            descriptor,
            SchemaEvolutionResult {
                table_created: false,
                columns_added: names,
            },
        ))
    }
}

/// Shape of a table created from a record
fn created_shape(
    dialect: &DatabaseDialect,
    table: &TableId,
    record: &SinkRecordDescriptor,
) -> TableDescriptor {
    let mut descriptor = TableDescriptor::new(table.clone());
    let mut ordinal = 0;
    for field in record.all_fields() {
        let mut column = ColumnDescriptor::new(&field.column_name, &field.type_name);
        column.default_value = field.default_literal(dialect);
        column.nullable = field.nullable;
        if field.key {
            ordinal += 1;
            column = column.primary_key(ordinal);
        }
        descriptor.columns.push(column);
    }
    descriptor
}

fn added_column(dialect: &DatabaseDialect, field: &FieldDescriptor) -> ColumnDescriptor {
    let mut column = ColumnDescriptor::new(&field.column_name, &field.type_name);
    column.default_value = field.default_literal(dialect);
    column.nullable = field.nullable || column.default_value.is_none();
    column
}

fn check_compatibility(table: &TableDescriptor, record: &SinkRecordDescriptor) -> Result<()> {
    for field in record.all_fields() {
        let Some(column) = table.column(&field.column_name) else {
            continue;
        };

        let existing = TypeFamily::of(&column.type_name);
        let incoming = TypeFamily::of(&field.type_name);
        if !existing.accepts(incoming) {
            return Err(Error::incompatible_schema(
                table.id.to_string(),
                format!(
                    "column {} has type {} which cannot hold {}",
                    column.name, column.type_name, field.type_name
                ),
            ));
        }

        if field.nullable && !column.nullable {
            warn!(
                table = %table.id,
                column = %column.name,
                "Nullable field maps to a NOT NULL column"
            );
        }
    }
    Ok(())
}

/// Broad grouping of native column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeFamily {
    Boolean,
    /// Integer with a width rank, wider is larger
    Integer(u8),
    Float,
    Decimal,
    String,
    Binary,
    Date,
    Time,
    Timestamp,
    Uuid,
    Json,
    Array,
    Unknown,
}

impl TypeFamily {
    pub(crate) fn of(type_name: &str) -> Self {
        let lower = type_name.trim().to_ascii_lowercase();
        if lower.ends_with("[]") || lower == "array" {
            return Self::Array;
        }

        let (base, args) = match lower.split_once('(') {
            Some((base, rest)) => (base.trim(), Some(rest.trim_end_matches(')'))),
            None => (lower.as_str(), None),
        };
        let base = base.trim_end_matches(" unsigned");

        match base {
            "bool" | "boolean" => Self::Boolean,
            // bit(n > 1) is a bit string
            "bit" => match args.and_then(|a| a.trim().parse::<u32>().ok()) {
                Some(n) if n > 1 => Self::Binary,
                _ => Self::Boolean,
            },
            "tinyint" if args.map(str::trim) == Some("1") => Self::Boolean,
            "tinyint" => Self::Integer(1),
            "smallint" | "int2" | "smallserial" => Self::Integer(2),
            "mediumint" | "year" => Self::Integer(3),
            "int" | "integer" | "int4" | "serial" => Self::Integer(4),
            "bigint" | "int8" | "bigserial" => Self::Integer(5),
            "real" | "float" | "float4" | "float8" | "double" | "double precision" => Self::Float,
            "numeric" | "decimal" | "money" | "smallmoney" => Self::Decimal,
            "char" | "character" | "varchar" | "character varying" | "nchar" | "nvarchar"
            | "text" | "tinytext" | "mediumtext" | "longtext" | "ntext" | "citext" | "enum"
            | "set" | "xml" => Self::String,
            "bytea" | "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob"
            | "longblob" | "image" | "bit varying" | "varbit" => Self::Binary,
            "date" => Self::Date,
            "time" | "timetz" | "time with time zone" | "time without time zone" => Self::Time,
            "timestamp" | "timestamptz" | "timestamp with time zone"
            | "timestamp without time zone" | "datetime" | "datetime2" | "smalldatetime"
            | "datetimeoffset" => Self::Timestamp,
            "uuid" | "uniqueidentifier" => Self::Uuid,
            "json" | "jsonb" => Self::Json,
            _ => Self::Unknown,
        }
    }

    /// Whether a column of this family can store values of `incoming`
    pub(crate) fn accepts(self, incoming: Self) -> bool {
        use TypeFamily::*;
        match (self, incoming) {
            (Unknown, _) | (_, Unknown) => true,
            (Integer(existing), Integer(new)) => new <= existing,
            (Integer(_), Boolean) => true,
            (Float | Decimal, Integer(_)) => true,
            // decimal columns never take floats
            (Float, Decimal) => true,
            (String, String | Json | Uuid) => true,
            (Json, String) => true,
            (existing, new) => existing == new,
        }
    }
}
