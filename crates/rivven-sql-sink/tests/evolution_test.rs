//! Schema cache states and DDL driven by the evolution controller

mod common;

use std::sync::Arc;

use rivven_sql_sink::config::PrimaryKeyMode;
use rivven_sql_sink::descriptor::{DescriptorOptions, SinkRecordDescriptor};
use rivven_sql_sink::dialect::{DatabaseDialect, DatabaseVersion, Engine};
use rivven_sql_sink::error::Error;
use rivven_sql_sink::event::ChangeEvent;
use rivven_sql_sink::evolution::{CacheState, SchemaEvolutionController, SchemaEvolutionMode};
use rivven_sql_sink::table::{ColumnDescriptor, TableDescriptor, TableId};

use common::{person, person_with_email, RecordingSession};

fn postgres() -> DatabaseDialect {
    DatabaseDialect::new(Engine::Postgres, DatabaseVersion::new(15, 0, 0))
}

fn record(dialect: &DatabaseDialect, event: &ChangeEvent) -> SinkRecordDescriptor {
    let options = DescriptorOptions {
        primary_key_mode: PrimaryKeyMode::RecordKey,
        ..Default::default()
    };
    SinkRecordDescriptor::from_event(event, dialect, &options).unwrap()
}

fn people_table() -> TableDescriptor {
    TableDescriptor::new(TableId::new("people"))
        .with_column(ColumnDescriptor::new("id", "integer").not_null().primary_key(1))
        .with_column(ColumnDescriptor::new("name", "text"))
}

#[tokio::test]
async fn test_state_starts_unknown() {
    let controller = SchemaEvolutionController::new(SchemaEvolutionMode::Basic);
    let table = TableId::new("people");
    assert_eq!(controller.state(&table).await, CacheState::Unknown);

    // invalidating an unknown table keeps it unknown
    controller.invalidate(&table).await;
    assert_eq!(controller.state(&table).await, CacheState::Unknown);
}

#[tokio::test]
async fn test_create_caches_created_shape() {
    let dialect = postgres();
    let session = RecordingSession::new(DatabaseVersion::new(15, 0, 0));
    let controller = SchemaEvolutionController::new(SchemaEvolutionMode::Basic);
    let table = TableId::new("people");

    let (descriptor, result) = controller
        .ensure_schema(&session, &dialect, &table, &record(&dialect, &person(1, "Ada")))
        .await
        .unwrap();

    assert!(result.table_created);
    assert!(result.has_changes());
    assert_eq!(descriptor.column_names(), vec!["id", "name"]);
    assert!(descriptor.column("id").unwrap().is_primary_key());
    assert_eq!(
        controller.state(&table).await,
        CacheState::Cached(descriptor)
    );
}

#[tokio::test]
async fn test_added_columns_are_merged() {
    let dialect = postgres();
    let session = RecordingSession::new(DatabaseVersion::new(15, 0, 0)).with_table(people_table());
    let controller = SchemaEvolutionController::new(SchemaEvolutionMode::Basic);
    let table = TableId::new("people");

    let event = person_with_email(1, "Ada", "ada@example.com");
    let (descriptor, result) = controller
        .ensure_schema(&session, &dialect, &table, &record(&dialect, &event))
        .await
        .unwrap();

    assert!(!result.table_created);
    assert_eq!(result.columns_added, vec!["email".to_string()]);
    let email = descriptor.column("email").unwrap();
    assert_eq!(email.type_name, "text");
    assert!(email.nullable);

    // the merged shape satisfies the same record without more DDL
    let (_, result) = controller
        .ensure_schema(&session, &dialect, &table, &record(&dialect, &event))
        .await
        .unwrap();
    assert!(!result.has_changes());
    assert_eq!(session.sql().len(), 1);
    assert_eq!(session.introspections(), 1);
}

#[tokio::test]
async fn test_describe_caches_existing_tables_only() {
    let session = RecordingSession::new(DatabaseVersion::new(15, 0, 0)).with_table(people_table());
    let controller = SchemaEvolutionController::new(SchemaEvolutionMode::None);

    let people = TableId::new("people");
    assert!(controller.describe(&session, &people).await.unwrap().is_some());
    assert!(controller.describe(&session, &people).await.unwrap().is_some());
    assert_eq!(session.introspections(), 1);

    let missing = TableId::new("missing");
    assert!(controller.describe(&session, &missing).await.unwrap().is_none());
    assert!(controller.describe(&session, &missing).await.unwrap().is_none());
    assert_eq!(session.introspections(), 3);
    assert_eq!(controller.state(&missing).await, CacheState::Unknown);
}

#[tokio::test]
async fn test_invalidate_forces_reintrospection() {
    let dialect = postgres();
    let session = RecordingSession::new(DatabaseVersion::new(15, 0, 0)).with_table(people_table());
    let controller = SchemaEvolutionController::new(SchemaEvolutionMode::None);
    let table = TableId::new("people");
    let record = record(&dialect, &person(1, "Ada"));

    controller
        .ensure_schema(&session, &dialect, &table, &record)
        .await
        .unwrap();
    controller.invalidate(&table).await;
    assert_eq!(controller.state(&table).await, CacheState::Stale);

    controller
        .ensure_schema(&session, &dialect, &table, &record)
        .await
        .unwrap();
    assert_eq!(session.introspections(), 2);
    assert!(matches!(
        controller.state(&table).await,
        CacheState::Cached(_)
    ));
}

#[tokio::test]
async fn test_missing_columns_without_evolution() {
    let dialect = postgres();
    let session = RecordingSession::new(DatabaseVersion::new(15, 0, 0)).with_table(people_table());
    let controller = SchemaEvolutionController::new(SchemaEvolutionMode::None);
    let table = TableId::new("people");

    let event = person_with_email(1, "Ada", "ada@example.com");
    let err = controller
        .ensure_schema(&session, &dialect, &table, &record(&dialect, &event))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IncompatibleSchema { .. }));
    assert!(session.sql().is_empty());

    // the introspected shape stays cached
    assert_eq!(
        controller.state(&table).await,
        CacheState::Cached(people_table())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_create_once() {
    let dialect = Arc::new(postgres());
    let session = Arc::new(RecordingSession::new(DatabaseVersion::new(15, 0, 0)));
    let controller = Arc::new(SchemaEvolutionController::new(SchemaEvolutionMode::Basic));

    let mut handles = Vec::new();
    for id in 0..8 {
        let dialect = Arc::clone(&dialect);
        let session = Arc::clone(&session);
        let controller = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            let record = record(&dialect, &person(id, "Ada"));
            controller
                .ensure_schema(&*session, &dialect, &TableId::new("people"), &record)
                .await
                .map(|(_, result)| result.table_created)
        }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(session.introspections(), 1);
    let creates = session
        .sql()
        .iter()
        .filter(|sql| sql.starts_with("CREATE TABLE"))
        .count();
    assert_eq!(creates, 1);
}
