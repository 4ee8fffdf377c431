//! Sink configuration
//!
//! ```yaml
//! dialect: postgres
//! table_name_format: "sink_${source.db}_${source.table}"
//! table_naming: lowercase
//! write_mode: upsert
//! primary_key_mode: record_key
//! delete_enabled: true
//! schema_evolution: basic
//! ```

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dialect::{Engine, DEFAULT_TABLE_NAME_FORMAT};
use crate::error::{Error, Result};
use crate::evolution::SchemaEvolutionMode;
use crate::naming::{validate_table_name_format, ColumnNaming, TableNaming};

/// How records are written
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Insert only
    #[default]
    Insert,
    /// Insert or update on key conflict
    Upsert,
    /// Update only
    Update,
}

/// Where primary key fields come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKeyMode {
    /// No primary key
    #[default]
    None,
    /// Fields of the record key
    RecordKey,
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Destination engine
    #[serde(default)]
    pub dialect: Engine,

    /// Table name template (`${topic}`, `${source.<field>}`)
    #[serde(default = "default_table_name_format")]
    #[validate(length(min = 1, max = 512))]
    pub table_name_format: String,

    /// Table naming strategy applied after the template
    #[serde(default)]
    pub table_naming: TableNaming,

    /// Column naming strategy
    #[serde(default)]
    pub column_naming: ColumnNaming,

    /// Quote identifiers in generated SQL
    #[serde(default)]
    pub quote_identifiers: bool,

    /// Write mode
    #[serde(default)]
    pub write_mode: WriteMode,

    /// Delete rows on delete and tombstone events
    #[serde(default)]
    pub delete_enabled: bool,

    /// Primary key source
    #[serde(default)]
    pub primary_key_mode: PrimaryKeyMode,

    /// Key fields to use; all key fields when empty
    #[serde(default)]
    pub primary_key_fields: Vec<String>,

    /// Whether tables may be created and altered
    #[serde(default)]
    pub schema_evolution: SchemaEvolutionMode,
}

fn default_table_name_format() -> String {
    DEFAULT_TABLE_NAME_FORMAT.to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            dialect: Engine::default(),
            table_name_format: default_table_name_format(),
            table_naming: TableNaming::default(),
            column_naming: ColumnNaming::default(),
            quote_identifiers: false,
            write_mode: WriteMode::default(),
            delete_enabled: false,
            primary_key_mode: PrimaryKeyMode::default(),
            primary_key_fields: Vec::new(),
            schema_evolution: SchemaEvolutionMode::default(),
        }
    }
}

impl SinkConfig {
    /// Create a builder
    pub fn builder() -> SinkConfigBuilder {
        SinkConfigBuilder::new()
    }

    /// Validate mode-specific requirements
    pub fn validate_mode(&self) -> std::result::Result<(), String> {
        if self.primary_key_mode == PrimaryKeyMode::None {
            if matches!(self.write_mode, WriteMode::Upsert | WriteMode::Update) {
                return Err(
                    "'primary_key_mode: record_key' required for upsert/update modes".to_string(),
                );
            }
            if self.delete_enabled {
                return Err("'primary_key_mode: record_key' required when delete_enabled".to_string());
            }
        }
        validate_table_name_format(&self.table_name_format).map_err(|e| e.to_string())
    }

    /// Run field and mode validation
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;
        self.validate_mode().map_err(Error::config)
    }

    /// Whether every record must carry a key
    #[inline]
    pub fn key_required(&self) -> bool {
        self.delete_enabled || matches!(self.write_mode, WriteMode::Upsert | WriteMode::Update)
    }
}

/// Builder for [`SinkConfig`]
#[derive(Debug, Clone, Default)]
pub struct SinkConfigBuilder {
    config: SinkConfig,
}

impl SinkConfigBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the destination engine
    pub fn dialect(mut self, dialect: Engine) -> Self {
        self.config.dialect = dialect;
        self
    }

    /// Set the table name template
    pub fn table_name_format(mut self, format: impl Into<String>) -> Self {
        self.config.table_name_format = format.into();
        self
    }

    /// Set the table naming strategy
    pub fn table_naming(mut self, naming: TableNaming) -> Self {
        self.config.table_naming = naming;
        self
    }

    /// Set the column naming strategy
    pub fn column_naming(mut self, naming: ColumnNaming) -> Self {
        self.config.column_naming = naming;
        self
    }

    /// Quote identifiers in generated SQL
    pub fn quote_identifiers(mut self, quote: bool) -> Self {
        self.config.quote_identifiers = quote;
        self
    }

    /// Set the write mode
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.config.write_mode = mode;
        self
    }

    /// Enable deletes
    pub fn delete_enabled(mut self, enabled: bool) -> Self {
        self.config.delete_enabled = enabled;
        self
    }

    /// Set the primary key mode
    pub fn primary_key_mode(mut self, mode: PrimaryKeyMode) -> Self {
        self.config.primary_key_mode = mode;
        self
    }

    /// Restrict the key fields used as primary key
    pub fn primary_key_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.primary_key_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the schema evolution mode
    pub fn schema_evolution(mut self, mode: SchemaEvolutionMode) -> Self {
        self.config.schema_evolution = mode;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<SinkConfig> {
        self.config.check()?;
        Ok(self.config)
    }
}
