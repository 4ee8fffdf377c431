//! Single-event write orchestration
//!
//! [`RecordWriter`] ties the stages together for one change event: resolve
//! the destination table, build the record descriptor, make sure the table
//! can hold it, render the statement and execute it through the caller's
//! [`Session`].
//!
//! # Example
//!
//! ```rust,ignore
//! use rivven_sql_sink::prelude::*;
//!
//! let config = SinkConfig::builder()
//!     .dialect(Engine::MySql)
//!     .write_mode(WriteMode::Upsert)
//!     .primary_key_mode(PrimaryKeyMode::RecordKey)
//!     .schema_evolution(SchemaEvolutionMode::Basic)
//!     .build()?;
//!
//! let writer = RecordWriter::connect(config, &session).await?;
//! let outcome = writer.write(&session, &event).await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{SinkConfig, WriteMode};
use crate::descriptor::{DescriptorOptions, SinkRecordDescriptor};
use crate::dialect::{DatabaseDialect, DatabaseVersion};
use crate::error::Result;
use crate::event::ChangeEvent;
use crate::evolution::{SchemaEvolutionController, SchemaEvolutionResult};
use crate::session::Session;
use crate::statement::{Statement, StatementBuilder};
use crate::table::TableId;

/// Why an event produced no statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The table name template resolved to no table
    NoTable,
    /// Delete handling is disabled
    DeletesDisabled,
    /// The row to delete lives in a table that does not exist
    TableMissing,
    /// Truncate events are not applied
    Truncate,
}

/// Result of writing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Row inserted, upserted or updated
    Written {
        /// Destination table
        table: TableId,
        /// Rows reported by the session
        rows_affected: u64,
        /// DDL issued before the write
        schema_changes: SchemaEvolutionResult,
    },
    /// Row deleted
    Deleted {
        /// Destination table
        table: TableId,
        /// Rows reported by the session
        rows_affected: u64,
    },
    /// Nothing executed
    Skipped(SkipReason),
}

/// Writer statistics
#[derive(Debug, Clone, Default)]
pub struct WriterStats {
    /// Events written as insert/upsert/update
    pub records_written: u64,
    /// Events applied as deletes
    pub records_deleted: u64,
    /// Events skipped
    pub records_skipped: u64,
    /// Events that failed
    pub records_failed: u64,
    /// Tables created
    pub tables_created: u64,
    /// Columns added
    pub columns_added: u64,
    /// Total time spent writing (milliseconds)
    pub total_write_time_ms: u64,
}

/// Atomic writer statistics
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicWriterStats {
    pub records_written: AtomicU64,
    pub records_deleted: AtomicU64,
    pub records_skipped: AtomicU64,
    pub records_failed: AtomicU64,
    pub tables_created: AtomicU64,
    pub columns_added: AtomicU64,
    pub total_write_time_ms: AtomicU64,
}

impl AtomicWriterStats {
    /// Record a finished event
    pub fn record_outcome(&self, outcome: &WriteOutcome, duration: Duration) {
        match outcome {
            WriteOutcome::Written { schema_changes, .. } => {
                self.records_written.fetch_add(1, Ordering::Relaxed);
                if schema_changes.table_created {
                    self.tables_created.fetch_add(1, Ordering::Relaxed);
                }
                self.columns_added
                    .fetch_add(schema_changes.columns_added.len() as u64, Ordering::Relaxed);
            }
            WriteOutcome::Deleted { .. } => {
                self.records_deleted.fetch_add(1, Ordering::Relaxed);
            }
            WriteOutcome::Skipped(_) => {
                self.records_skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.total_write_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a failed event
    pub fn record_failure(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> WriterStats {
        WriterStats {
            records_written: self.records_written.load(Ordering::Relaxed),
            records_deleted: self.records_deleted.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            tables_created: self.tables_created.load(Ordering::Relaxed),
            columns_added: self.columns_added.load(Ordering::Relaxed),
            total_write_time_ms: self.total_write_time_ms.load(Ordering::Relaxed),
        }
    }
}

/// Writes change events into one destination database
#[derive(Debug)]
pub struct RecordWriter {
    config: SinkConfig,
    dialect: DatabaseDialect,
    evolution: SchemaEvolutionController,
    stats: AtomicWriterStats,
}

impl RecordWriter {
    /// Create a writer for a known engine version
    pub fn new(config: SinkConfig, version: DatabaseVersion) -> Result<Self> {
        config.check()?;
        let dialect = DatabaseDialect::from_config(&config, version);
        Ok(Self::with_dialect(config, dialect))
    }

    /// Create a writer with a prepared dialect
    pub fn with_dialect(config: SinkConfig, dialect: DatabaseDialect) -> Self {
        let evolution = SchemaEvolutionController::new(config.schema_evolution);
        Self {
            config,
            dialect,
            evolution,
            stats: AtomicWriterStats::default(),
        }
    }

    /// Create a writer for the engine version reported by the session
    pub async fn connect<S>(config: SinkConfig, session: &S) -> Result<Self>
    where
        S: Session + ?Sized,
    {
        let version = session.engine_version().await?;
        info!(
            dialect = %config.dialect,
            version = %version,
            "Connected record writer"
        );
        Self::new(config, version)
    }

    /// Active configuration
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Dialect context
    pub fn dialect(&self) -> &DatabaseDialect {
        &self.dialect
    }

    /// Schema cache and DDL driver
    pub fn evolution(&self) -> &SchemaEvolutionController {
        &self.evolution
    }

    /// Get a statistics snapshot
    pub fn stats(&self) -> WriterStats {
        self.stats.snapshot()
    }

    fn descriptor_options(&self) -> DescriptorOptions {
        DescriptorOptions {
            primary_key_mode: self.config.primary_key_mode,
            primary_key_fields: self.config.primary_key_fields.clone(),
            key_required: self.config.key_required(),
        }
    }

    /// Write one change event
    pub async fn write<S>(&self, session: &S, event: &ChangeEvent) -> Result<WriteOutcome>
    where
        S: Session + ?Sized,
    {
        let start = Instant::now();
        match self.write_event(session, event).await {
            Ok(outcome) => {
                self.stats.record_outcome(&outcome, start.elapsed());
                Ok(outcome)
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    async fn write_event<S>(&self, session: &S, event: &ChangeEvent) -> Result<WriteOutcome>
    where
        S: Session + ?Sized,
    {
        if event.is_truncate() {
            debug!(topic = %event.topic, "Truncate event, skipping");
            return Ok(WriteOutcome::Skipped(SkipReason::Truncate));
        }

        let Some(table) = self.dialect.resolve_table_name(event)? else {
            debug!(topic = %event.topic, "Event maps to no table, skipping");
            return Ok(WriteOutcome::Skipped(SkipReason::NoTable));
        };

        if event.is_delete() && !self.config.delete_enabled {
            debug!(table = %table, "Deletes disabled, skipping delete event");
            return Ok(WriteOutcome::Skipped(SkipReason::DeletesDisabled));
        }

        let record = SinkRecordDescriptor::from_event(event, &self.dialect, &self.descriptor_options())?;
        let builder = StatementBuilder::new(&self.dialect);

        if record.is_delete() {
            let Some(descriptor) = self.evolution.describe(session, &table).await? else {
                debug!(table = %table, "Delete for missing table, skipping");
                return Ok(WriteOutcome::Skipped(SkipReason::TableMissing));
            };
            let statement = builder.build_delete(&descriptor, &record)?;
            let rows_affected = execute(session, &statement).await?;
            debug!(table = %table, rows = rows_affected, "Deleted row");
            return Ok(WriteOutcome::Deleted {
                table,
                rows_affected,
            });
        }

        let (descriptor, schema_changes) = self
            .evolution
            .ensure_schema(session, &self.dialect, &table, &record)
            .await?;

        let statement = match self.config.write_mode {
            WriteMode::Insert => builder.build_insert(&descriptor, &record)?,
            WriteMode::Upsert => builder.build_upsert(&descriptor, &record)?,
            WriteMode::Update => builder.build_update(&descriptor, &record)?,
        };
        let rows_affected = execute(session, &statement).await?;
        debug!(
            table = %table,
            mode = ?self.config.write_mode,
            rows = rows_affected,
            "Wrote row"
        );

        Ok(WriteOutcome::Written {
            table,
            rows_affected,
            schema_changes,
        })
    }
}

async fn execute<S>(session: &S, statement: &Statement) -> Result<u64>
where
    S: Session + ?Sized,
{
    session.execute(&statement.sql, &statement.values()).await
}
