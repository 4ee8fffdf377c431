//! # rivven-sql-sink
//!
//! Writes row-level change events (Debezium / Kafka Connect style) into
//! relational databases.
//!
//! For every event the sink resolves a destination table, maps each field to
//! a native column type and a bound parameter, creates or evolves the table
//! when allowed, and renders dialect-correct SQL for insert, upsert, update
//! or delete.
//!
//! ## Features
//!
//! - **Dialects**: PostgreSQL, MySQL, MariaDB and SQL Server, with
//!   version-gated upsert syntax
//! - **Type Registry**: Kafka Connect and Debezium logical types with
//!   per-engine overrides
//! - **Naming**: table name templates (`${topic}`, `${source.<field>}`) and
//!   pluggable table/column naming strategies
//! - **Schema Evolution**: create missing tables and add missing columns,
//!   with a per-table cache
//! - **Session boundary**: SQL is executed by a caller-supplied [`Session`];
//!   no driver is bundled
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rivven_sql_sink::prelude::*;
//!
//! let config = SinkConfig::builder()
//!     .dialect(Engine::Postgres)
//!     .table_name_format("sink_${source.table}")
//!     .write_mode(WriteMode::Upsert)
//!     .primary_key_mode(PrimaryKeyMode::RecordKey)
//!     .schema_evolution(SchemaEvolutionMode::Basic)
//!     .build()?;
//!
//! let writer = RecordWriter::connect(config, &session).await?;
//! let event = ChangeEvent::from_connect_json("server1.inventory.customers", key, value)?;
//! writer.write(&session, &event).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod descriptor;
pub mod dialect;
pub mod error;
pub mod event;
pub mod evolution;
pub mod naming;
pub mod schema;
pub mod security;
pub mod session;
pub mod statement;
pub mod table;
pub mod types;
pub mod value;
pub mod writer;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Values and events
    pub use crate::event::{ChangeEvent, Operation, Payload};
    pub use crate::schema::{Field, Schema, SchemaKind};
    pub use crate::value::{Row, Value};

    // Configuration
    pub use crate::config::{PrimaryKeyMode, SinkConfig, SinkConfigBuilder, WriteMode};

    // Dialects and types
    pub use crate::dialect::{
        dialect_for, DatabaseDialect, DatabaseVersion, Engine, MariaDbDialect, MySqlDialect,
        PostgresDialect, SqlDialect, SqlServerDialect, UpsertSyntax,
    };
    pub use crate::types::{SqlType, TypeRegistry};

    // Naming
    pub use crate::naming::{ColumnNaming, ColumnNamingStrategy, TableNaming, TableNamingStrategy};

    // Tables, records and statements
    pub use crate::descriptor::{DescriptorOptions, FieldDescriptor, SinkRecordDescriptor};
    pub use crate::statement::{Binding, Statement, StatementBuilder};
    pub use crate::table::{ColumnDescriptor, TableDescriptor, TableId};

    // Schema evolution, sessions and writing
    pub use crate::evolution::{
        CacheState, SchemaEvolutionController, SchemaEvolutionMode, SchemaEvolutionResult,
    };
    pub use crate::session::Session;
    pub use crate::writer::{AtomicWriterStats, RecordWriter, SkipReason, WriteOutcome, WriterStats};
}

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use session::Session;
pub use value::Value;
