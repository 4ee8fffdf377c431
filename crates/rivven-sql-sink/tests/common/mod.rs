//! Shared fixtures for rivven-sql-sink integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rivven_sql_sink::dialect::DatabaseVersion;
use rivven_sql_sink::error::{Error, Result};
use rivven_sql_sink::event::ChangeEvent;
use rivven_sql_sink::schema::{Field, Schema};
use rivven_sql_sink::session::Session;
use rivven_sql_sink::table::{TableDescriptor, TableId};
use rivven_sql_sink::value::{Row, Value};

/// In-memory session that records every statement it executes.
///
/// Tables are only known when registered with [`RecordingSession::with_table`];
/// executed DDL does not change them, so a re-introspection sees the
/// registered shape.
#[derive(Debug, Default)]
pub struct RecordingSession {
    version: DatabaseVersion,
    tables: Mutex<HashMap<TableId, TableDescriptor>>,
    executed: Mutex<Vec<(String, Vec<Value>)>>,
    fail_next: Mutex<Option<String>>,
    introspections: AtomicUsize,
}

impl RecordingSession {
    pub fn new(version: DatabaseVersion) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    pub fn with_table(self, table: TableDescriptor) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(table.id.clone(), table);
        self
    }

    /// Fail the next statement starting with `prefix`
    pub fn fail_next(&self, prefix: &str) {
        *self.fail_next.lock().unwrap() = Some(prefix.to_string());
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.executed().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn introspections(&self) -> usize {
        self.introspections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        {
            let mut fail = self.fail_next.lock().unwrap();
            if fail.as_deref().is_some_and(|prefix| sql.starts_with(prefix)) {
                *fail = None;
                return Err(Error::query_with_sql("simulated failure", sql));
            }
        }
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(1)
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    async fn introspect_table(&self, table: &TableId) -> Result<Option<TableDescriptor>> {
        self.introspections.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().unwrap().get(table).cloned())
    }

    async fn engine_version(&self) -> Result<DatabaseVersion> {
        Ok(self.version)
    }
}

pub fn id_key_schema() -> Schema {
    Schema::structure(vec![Field::new("id", Schema::int32())])
}

pub fn people_value_schema() -> Schema {
    Schema::structure(vec![
        Field::new("id", Schema::int32()),
        Field::new("name", Schema::string().optional()),
    ])
}

pub fn people_with_email_schema() -> Schema {
    Schema::structure(vec![
        Field::new("id", Schema::int32()),
        Field::new("name", Schema::string().optional()),
        Field::new("email", Schema::string().optional()),
    ])
}

/// `people` row with key `id` and a `name`
pub fn person(id: i32, name: &str) -> ChangeEvent {
    ChangeEvent::new("people")
        .with_key(id_key_schema(), json!({ "id": id }))
        .with_value(people_value_schema(), json!({ "id": id, "name": name }))
}

/// `people` row that also carries an `email`
pub fn person_with_email(id: i32, name: &str, email: &str) -> ChangeEvent {
    ChangeEvent::new("people")
        .with_key(id_key_schema(), json!({ "id": id }))
        .with_value(
            people_with_email_schema(),
            json!({ "id": id, "name": name, "email": email }),
        )
}

/// Tombstone for a `people` row
pub fn tombstone(id: i32) -> ChangeEvent {
    ChangeEvent::tombstone("people", id_key_schema(), json!({ "id": id }))
}

pub fn source(db: &str, table: &str) -> serde_json::Map<String, JsonValue> {
    let mut source = serde_json::Map::new();
    source.insert("db".into(), json!(db));
    source.insert("table".into(), json!(table));
    source
}
