//! SQL dialect abstraction for rivven-sql-sink
//!
//! Two layers:
//!
//! - [`SqlDialect`]: stateless per-engine syntax (quoting, placeholders,
//!   native type names, introspection SQL, upsert syntax table, type
//!   overrides).
//! - [`DatabaseDialect`]: the context threaded through every stage of a
//!   write. It owns the engine syntax, the type registry (generic types first,
//!   engine overrides after), the naming strategies, the table name format,
//!   the identifier quoting policy and the live engine version.
//!
//! The PostgreSQL existence check and the MySQL catalog queries are built
//! with sea-query. The PostgreSQL column listing joins the primary key
//! constraints and is written by hand with escaped literals, as is all SQL
//! Server introspection.

pub mod mysql;
pub mod postgres;
pub mod sqlserver;
pub mod version;

pub use mysql::{MariaDbDialect, MySqlDialect};
pub use postgres::PostgresDialect;
pub use sqlserver::SqlServerDialect;
pub use version::{select_syntax, DatabaseVersion, UpsertSyntax, VersionedSyntax};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::naming::{ColumnNaming, ColumnNamingStrategy, TableNaming, TableNamingStrategy};
use crate::schema::Schema;
use crate::security::validate_unquoted_identifier;
use crate::table::TableId;
use crate::types::{SqlType, TypeRegistry};

/// Default table name format
pub const DEFAULT_TABLE_NAME_FORMAT: &str = "${topic}";

/// Engine-neutral column types a dialect renders into native names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// True/false
    Boolean,
    /// 8-bit integer
    TinyInt,
    /// 16-bit integer
    SmallInt,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    BigInt,
    /// Single precision float
    Real,
    /// Double precision float
    Double,
    /// Exact numeric
    Decimal {
        /// Total digits
        precision: Option<u32>,
        /// Digits after the decimal point
        scale: Option<u32>,
    },
    /// Bounded character data; `None` is the engine's unbounded varchar
    Varchar(Option<u32>),
    /// Unbounded character data
    Text,
    /// Binary data
    Bytes,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Timestamp without zone
    Timestamp,
    /// Timestamp with zone
    TimestampTz,
    /// UUID
    Uuid,
    /// JSON document
    Json,
}

/// Supported destination engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// PostgreSQL
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,
    /// MySQL
    MySql,
    /// MariaDB
    MariaDb,
    /// Microsoft SQL Server
    #[serde(alias = "mssql")]
    SqlServer,
}

impl Engine {
    /// Display name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::MySql => "MySQL",
            Self::MariaDb => "MariaDB",
            Self::SqlServer => "SQL Server",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "mariadb" => Ok(Self::MariaDb),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            other => Err(Error::config(format!("unsupported dialect '{}'", other))),
        }
    }
}

/// Per-engine SQL syntax
pub trait SqlDialect: Send + Sync + fmt::Debug {
    /// Engine this syntax belongs to
    fn engine(&self) -> Engine;

    /// Get the dialect name
    fn name(&self) -> &'static str {
        self.engine().name()
    }

    /// Quote an identifier (table, column name)
    fn quote_identifier(&self, name: &str) -> String;

    /// Get the placeholder for a 1-based parameter index (e.g., $1, ?, @p1)
    fn placeholder(&self, index: usize) -> String;

    /// Name under which the engine stores an unquoted identifier
    fn fold_unquoted_identifier(&self, name: &str) -> String {
        name.to_string()
    }

    /// SQL returning a single row whose first column is true when the table exists
    fn table_exists_sql(&self, table: &TableId) -> String;

    /// SQL listing a table's columns in the shape `TableDescriptor::from_rows` reads
    fn list_columns_sql(&self, table: &TableId) -> String;

    /// Native type name for an engine-neutral column type
    fn native_type(&self, column: ColumnType) -> String;

    /// Register engine-specific types over the generic ones
    fn register_types(&self, _registry: &mut TypeRegistry) {}

    /// Longest varchar usable in a primary key, if the engine limits it
    fn max_varchar_length_in_key(&self) -> Option<u32> {
        None
    }

    /// Native types that cannot carry a DEFAULT clause
    fn no_default_types(&self) -> &'static [&'static str] {
        &[]
    }

    /// Upsert syntaxes ordered newest first
    fn upsert_syntaxes(&self) -> &'static [VersionedSyntax];

    /// `ALTER TABLE` adding the given rendered column definitions
    fn alter_table_add_columns(&self, table: &str, columns: &[String]) -> String {
        let adds: Vec<String> = columns.iter().map(|c| format!("ADD COLUMN {}", c)).collect();
        format!("ALTER TABLE {} {}", table, adds.join(", "))
    }

    /// Escape a string literal
    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    /// Get the boolean literal
    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }
}

/// Get the syntax for an engine
pub fn dialect_for(engine: Engine) -> Box<dyn SqlDialect> {
    match engine {
        Engine::Postgres => Box::new(PostgresDialect),
        Engine::MySql => Box::new(MySqlDialect),
        Engine::MariaDb => Box::new(MariaDbDialect),
        Engine::SqlServer => Box::new(SqlServerDialect),
    }
}

/// Shared write context for one destination engine
#[derive(Debug)]
pub struct DatabaseDialect {
    syntax: Box<dyn SqlDialect>,
    registry: TypeRegistry,
    table_naming: Arc<dyn TableNamingStrategy>,
    column_naming: Arc<dyn ColumnNamingStrategy>,
    table_name_format: String,
    quote_identifiers: bool,
    version: DatabaseVersion,
}

impl DatabaseDialect {
    /// Create a dialect with default naming and unquoted identifiers
    pub fn new(engine: Engine, version: DatabaseVersion) -> Self {
        let syntax = dialect_for(engine);
        let mut registry = TypeRegistry::with_generic_types();
        syntax.register_types(&mut registry);

        Self {
            syntax,
            registry,
            table_naming: Arc::new(TableNaming::Default),
            column_naming: Arc::new(ColumnNaming::Default),
            table_name_format: DEFAULT_TABLE_NAME_FORMAT.to_string(),
            quote_identifiers: false,
            version,
        }
    }

    /// Create a dialect from sink configuration
    pub fn from_config(config: &SinkConfig, version: DatabaseVersion) -> Self {
        Self::new(config.dialect, version)
            .with_table_naming(Arc::new(config.table_naming))
            .with_column_naming(Arc::new(config.column_naming))
            .with_table_name_format(config.table_name_format.clone())
            .with_quote_identifiers(config.quote_identifiers)
    }

    /// Set the table naming strategy
    pub fn with_table_naming(mut self, strategy: Arc<dyn TableNamingStrategy>) -> Self {
        self.table_naming = strategy;
        self
    }

    /// Set the column naming strategy
    pub fn with_column_naming(mut self, strategy: Arc<dyn ColumnNamingStrategy>) -> Self {
        self.column_naming = strategy;
        self
    }

    /// Set the table name format
    pub fn with_table_name_format(mut self, format: impl Into<String>) -> Self {
        self.table_name_format = format.into();
        self
    }

    /// Enable or disable identifier quoting
    pub fn with_quote_identifiers(mut self, quote: bool) -> Self {
        self.quote_identifiers = quote;
        self
    }

    /// Register an additional type after the engine's own
    pub fn with_type(mut self, ty: &'static SqlType) -> Self {
        self.registry.register(ty);
        self
    }

    /// Destination engine
    #[inline]
    pub fn engine(&self) -> Engine {
        self.syntax.engine()
    }

    /// Dialect name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.syntax.name()
    }

    /// Server version the dialect was built for
    #[inline]
    pub fn version(&self) -> DatabaseVersion {
        self.version
    }

    /// Engine syntax
    #[inline]
    pub fn syntax(&self) -> &dyn SqlDialect {
        self.syntax.as_ref()
    }

    /// Registered type mappings
    #[inline]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Table name format
    #[inline]
    pub fn table_name_format(&self) -> &str {
        &self.table_name_format
    }

    /// Resolve the type for a field schema
    pub fn resolve_type(&self, schema: &Schema) -> Result<&'static SqlType> {
        self.registry.resolve_schema(schema)
    }

    /// Native name of an engine-neutral column type
    pub fn native_type(&self, column: ColumnType) -> String {
        self.syntax.native_type(column)
    }

    /// Placeholder for a 1-based parameter index
    pub fn placeholder(&self, index: usize) -> String {
        self.syntax.placeholder(index)
    }

    /// Identifier as written into SQL, quoted only when quoting is enabled
    pub fn quote(&self, name: &str) -> String {
        if self.quote_identifiers {
            self.syntax.quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    /// Qualified table name as written into SQL
    pub fn table_name(&self, id: &TableId) -> String {
        id.parts().map(|p| self.quote(p)).collect::<Vec<_>>().join(".")
    }

    /// Column name for a payload field
    pub fn column_name(&self, field_name: &str) -> String {
        self.column_naming.resolve_column_name(field_name)
    }

    /// Destination table for an event; `None` when the event maps to no table.
    ///
    /// Unquoted names are checked and folded to the case the engine stores
    /// them in, so catalog lookups find tables created from the same name.
    pub fn resolve_table_name(&self, event: &ChangeEvent) -> Result<Option<TableId>> {
        let Some(name) = self
            .table_naming
            .resolve_table_name(&self.table_name_format, event)?
        else {
            return Ok(None);
        };

        let id = TableId::parse(&name)?;
        if self.quote_identifiers {
            return Ok(Some(id));
        }
        id.parts().try_for_each(validate_unquoted_identifier)?;

        let fold = |part: &str| self.syntax.fold_unquoted_identifier(part);
        Ok(Some(TableId {
            catalog: id.catalog.as_deref().map(fold),
            schema: id.schema.as_deref().map(fold),
            table: fold(&id.table),
        }))
    }

    /// Column name for a payload field, checked when it is written unquoted
    pub fn checked_column_name(&self, field_name: &str) -> Result<String> {
        let name = self.column_name(field_name);
        if !self.quote_identifiers {
            validate_unquoted_identifier(&name)?;
        }
        Ok(name)
    }

    /// Longest varchar allowed in a primary key column, if limited
    pub fn max_varchar_length_in_key(&self) -> Option<u32> {
        self.syntax.max_varchar_length_in_key()
    }

    /// Whether a column of this native type may carry a DEFAULT clause
    pub fn allows_default(&self, native_type: &str) -> bool {
        let base = native_type
            .split('(')
            .next()
            .unwrap_or(native_type)
            .trim();
        !self
            .syntax
            .no_default_types()
            .iter()
            .any(|t| t.eq_ignore_ascii_case(base))
    }

    /// Literal for a boolean default
    pub fn boolean_literal(&self, value: bool) -> &'static str {
        self.syntax.boolean_literal(value)
    }

    /// Single-quoted, escaped string literal
    pub fn string_literal(&self, value: &str) -> String {
        format!("'{}'", self.syntax.escape_string(value))
    }

    /// Upsert syntax for the live engine version
    pub fn upsert_syntax(&self) -> Result<UpsertSyntax> {
        select_syntax(self.syntax.upsert_syntaxes(), self.version).ok_or_else(|| {
            Error::unsupported(format!(
                "{} {} has no upsert syntax",
                self.name(),
                self.version
            ))
        })
    }
}
