//! End-to-end tests for RecordWriter against a recording session

mod common;

use common::{person, person_with_email, source, tombstone, RecordingSession};
use rivven_sql_sink::config::{PrimaryKeyMode, SinkConfig, WriteMode};
use rivven_sql_sink::dialect::{DatabaseVersion, Engine};
use rivven_sql_sink::error::Error;
use rivven_sql_sink::event::{ChangeEvent, Operation};
use rivven_sql_sink::evolution::{CacheState, SchemaEvolutionMode};
use rivven_sql_sink::schema::{Field, Schema};
use rivven_sql_sink::table::{ColumnDescriptor, TableDescriptor, TableId};
use rivven_sql_sink::value::Value;
use rivven_sql_sink::writer::{RecordWriter, SkipReason, WriteOutcome};

fn pg() -> DatabaseVersion {
    DatabaseVersion::new(15, 4, 0)
}

fn people_table(id_type: &str, name_type: &str) -> TableDescriptor {
    TableDescriptor::new(TableId::new("people"))
        .with_column(ColumnDescriptor::new("id", id_type).primary_key(1))
        .with_column(ColumnDescriptor::new("name", name_type))
}

fn config(engine: Engine, mode: WriteMode) -> SinkConfig {
    SinkConfig::builder()
        .dialect(engine)
        .write_mode(mode)
        .primary_key_mode(PrimaryKeyMode::RecordKey)
        .delete_enabled(true)
        .schema_evolution(SchemaEvolutionMode::Basic)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_first_write_creates_table_then_inserts() {
    let session = RecordingSession::new(pg());
    let writer = RecordWriter::connect(config(Engine::Postgres, WriteMode::Insert), &session)
        .await
        .unwrap();

    let outcome = writer.write(&session, &person(42, "Ada")).await.unwrap();
    match outcome {
        WriteOutcome::Written {
            table,
            schema_changes,
            ..
        } => {
            assert_eq!(table, TableId::new("people"));
            assert!(schema_changes.table_created);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let executed = session.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(
        executed[0].0,
        "CREATE TABLE people (id integer NOT NULL, name text NULL, PRIMARY KEY(id))"
    );
    assert!(executed[0].1.is_empty());
    assert_eq!(executed[1].0, "INSERT INTO people (id, name) VALUES ($1, $2)");
    assert_eq!(
        executed[1].1,
        vec![Value::Int32(42), Value::String("Ada".into())]
    );
}

#[tokio::test]
async fn test_new_field_alters_then_upserts_non_key_columns() {
    let session = RecordingSession::new(pg()).with_table(people_table("integer", "text"));
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Upsert), pg()).unwrap();

    let outcome = writer
        .write(&session, &person_with_email(42, "Ada", "a@b.com"))
        .await
        .unwrap();
    let WriteOutcome::Written { schema_changes, .. } = outcome else {
        panic!("expected a write");
    };
    assert!(!schema_changes.table_created);
    assert_eq!(schema_changes.columns_added, vec!["email".to_string()]);

    let sql = session.sql();
    assert_eq!(sql[0], "ALTER TABLE people ADD COLUMN email text NULL");
    assert_eq!(
        sql[1],
        "INSERT INTO people (id, name, email) VALUES ($1, $2, $3) \
         ON CONFLICT (id) DO UPDATE SET name=EXCLUDED.name, email=EXCLUDED.email"
    );
    assert!(!sql[1].contains("id=EXCLUDED.id"));
}

#[tokio::test]
async fn test_tombstone_deletes_by_key() {
    let session = RecordingSession::new(pg()).with_table(people_table("integer", "text"));
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Upsert), pg()).unwrap();

    let outcome = writer.write(&session, &tombstone(42)).await.unwrap();
    assert_eq!(
        outcome,
        WriteOutcome::Deleted {
            table: TableId::new("people"),
            rows_affected: 1,
        }
    );

    let executed = session.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].0, "DELETE FROM people WHERE id=$1");
    assert_eq!(executed[0].1, vec![Value::Int32(42)]);
    assert_eq!(writer.stats().records_deleted, 1);
}

#[tokio::test]
async fn test_delete_skipped_when_disabled_or_table_missing() {
    let session = RecordingSession::new(pg());

    let disabled = SinkConfig::builder()
        .primary_key_mode(PrimaryKeyMode::RecordKey)
        .build()
        .unwrap();
    let writer = RecordWriter::new(disabled, pg()).unwrap();
    assert_eq!(
        writer.write(&session, &tombstone(1)).await.unwrap(),
        WriteOutcome::Skipped(SkipReason::DeletesDisabled)
    );

    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Upsert), pg()).unwrap();
    assert_eq!(
        writer.write(&session, &tombstone(1)).await.unwrap(),
        WriteOutcome::Skipped(SkipReason::TableMissing)
    );
    assert!(session.executed().is_empty());
    assert_eq!(writer.stats().records_skipped, 1);
}

#[tokio::test]
async fn test_repeated_writes_issue_ddl_once() {
    let session = RecordingSession::new(pg());
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Upsert), pg()).unwrap();

    for id in 1..=3 {
        writer.write(&session, &person(id, "Ada")).await.unwrap();
    }

    let creates = session
        .sql()
        .iter()
        .filter(|s| s.starts_with("CREATE TABLE"))
        .count();
    assert_eq!(creates, 1);
    assert_eq!(session.introspections(), 1);
    assert_eq!(writer.stats().records_written, 3);
    assert_eq!(writer.stats().tables_created, 1);
}

#[tokio::test]
async fn test_failed_ddl_marks_table_stale_and_recovers() {
    let session = RecordingSession::new(pg());
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Insert), pg()).unwrap();
    let table = TableId::new("people");

    session.fail_next("CREATE TABLE");
    let err = writer.write(&session, &person(1, "Ada")).await.unwrap_err();
    assert!(matches!(err, Error::Query { .. }));
    assert_eq!(writer.evolution().state(&table).await, CacheState::Stale);
    assert_eq!(writer.stats().records_failed, 1);

    writer.write(&session, &person(1, "Ada")).await.unwrap();
    assert_eq!(session.introspections(), 2);
    assert!(matches!(
        writer.evolution().state(&table).await,
        CacheState::Cached(_)
    ));
    assert!(session.sql()[0].starts_with("CREATE TABLE people"));
}

#[tokio::test]
async fn test_failed_alter_recovers() {
    let session = RecordingSession::new(pg()).with_table(people_table("integer", "text"));
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Insert), pg()).unwrap();

    session.fail_next("ALTER TABLE");
    assert!(writer
        .write(&session, &person_with_email(1, "Ada", "a@b.com"))
        .await
        .is_err());
    assert_eq!(
        writer.evolution().state(&TableId::new("people")).await,
        CacheState::Stale
    );

    writer
        .write(&session, &person_with_email(1, "Ada", "a@b.com"))
        .await
        .unwrap();
    let sql = session.sql();
    assert_eq!(sql[0], "ALTER TABLE people ADD COLUMN email text NULL");
    assert_eq!(sql.len(), 2);
}

#[tokio::test]
async fn test_evolution_disabled() {
    let session = RecordingSession::new(pg());
    let config = SinkConfig::builder()
        .primary_key_mode(PrimaryKeyMode::RecordKey)
        .build()
        .unwrap();
    let writer = RecordWriter::new(config.clone(), pg()).unwrap();

    let err = writer.write(&session, &person(1, "Ada")).await.unwrap_err();
    assert!(matches!(err, Error::TableNotFound { .. }));

    let session = RecordingSession::new(pg()).with_table(people_table("integer", "text"));
    let writer = RecordWriter::new(config, pg()).unwrap();
    let err = writer
        .write(&session, &person_with_email(1, "Ada", "a@b.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IncompatibleSchema { .. }));
    assert!(session.executed().is_empty());
}

#[tokio::test]
async fn test_incompatible_column_type() {
    let session = RecordingSession::new(pg()).with_table(people_table("integer", "integer"));
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Insert), pg()).unwrap();

    let err = writer.write(&session, &person(1, "Ada")).await.unwrap_err();
    assert!(matches!(err, Error::IncompatibleSchema { .. }));
    assert!(session.executed().is_empty());
}

#[tokio::test]
async fn test_float_into_decimal_column_is_incompatible() {
    let scores = TableDescriptor::new(TableId::new("scores"))
        .with_column(ColumnDescriptor::new("id", "integer").primary_key(1))
        .with_column(ColumnDescriptor::new("score", "numeric(10,2)"));
    let session = RecordingSession::new(pg()).with_table(scores);
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Insert), pg()).unwrap();

    let event = ChangeEvent::new("scores")
        .with_key(common::id_key_schema(), serde_json::json!({"id": 1}))
        .with_value(
            Schema::structure(vec![
                Field::new("id", Schema::int32()),
                Field::new("score", Schema::float64()),
            ]),
            serde_json::json!({"id": 1, "score": 0.1}),
        );
    let err = writer.write(&session, &event).await.unwrap_err();
    assert!(matches!(err, Error::IncompatibleSchema { .. }));
    assert!(session.executed().is_empty());
}

#[tokio::test]
async fn test_introspected_type_names_are_compatible() {
    let session =
        RecordingSession::new(pg()).with_table(people_table("bigint", "character varying"));
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Insert), pg()).unwrap();

    writer.write(&session, &person(1, "Ada")).await.unwrap();
    assert_eq!(
        session.sql(),
        vec!["INSERT INTO people (id, name) VALUES ($1, $2)".to_string()]
    );
}

#[tokio::test]
async fn test_mysql_upsert_syntax_by_version() {
    let new = DatabaseVersion::new(8, 0, 20);
    let session = RecordingSession::new(new).with_table(people_table("int", "longtext"));
    let writer = RecordWriter::connect(config(Engine::MySql, WriteMode::Upsert), &session)
        .await
        .unwrap();
    assert_eq!(writer.dialect().version(), new);
    writer.write(&session, &person(1, "Ada")).await.unwrap();
    assert_eq!(
        session.sql()[0],
        "INSERT INTO people (id, name) VALUES (?, ?) AS new ON DUPLICATE KEY UPDATE name=new.name"
    );

    let old = DatabaseVersion::new(8, 0, 19);
    let session = RecordingSession::new(old).with_table(people_table("int", "longtext"));
    let writer = RecordWriter::new(config(Engine::MySql, WriteMode::Upsert), old).unwrap();
    writer.write(&session, &person(1, "Ada")).await.unwrap();
    assert_eq!(
        session.sql()[0],
        "INSERT INTO people (id, name) VALUES (?, ?) ON DUPLICATE KEY UPDATE name=VALUES(name)"
    );
}

#[tokio::test]
async fn test_mariadb_never_uses_row_alias() {
    let version = DatabaseVersion::new(11, 4, 2);
    let session = RecordingSession::new(version).with_table(people_table("int", "longtext"));
    let writer = RecordWriter::new(config(Engine::MariaDb, WriteMode::Upsert), version).unwrap();

    writer.write(&session, &person(1, "Ada")).await.unwrap();
    let sql = &session.sql()[0];
    assert!(sql.ends_with("ON DUPLICATE KEY UPDATE name=VALUES(name)"));
    assert!(!sql.contains("AS new"));
}

#[tokio::test]
async fn test_sqlserver_merge() {
    let version = DatabaseVersion::new(16, 0, 0);
    let session = RecordingSession::new(version).with_table(people_table("int", "nvarchar"));
    let writer = RecordWriter::new(config(Engine::SqlServer, WriteMode::Upsert), version).unwrap();

    writer.write(&session, &person(7, "Ada")).await.unwrap();
    let executed = session.executed();
    assert_eq!(
        executed[0].0,
        "MERGE INTO people WITH (HOLDLOCK) AS TARGET USING (SELECT @p1 AS id, @p2 AS name) AS INCOMING \
         ON (TARGET.id=INCOMING.id) WHEN MATCHED THEN UPDATE SET name=INCOMING.name \
         WHEN NOT MATCHED THEN INSERT (id, name) VALUES (INCOMING.id,INCOMING.name);"
    );
    assert_eq!(
        executed[0].1,
        vec![Value::Int32(7), Value::String("Ada".into())]
    );
}

#[tokio::test]
async fn test_update_mode() {
    let session = RecordingSession::new(pg()).with_table(people_table("integer", "text"));
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Update), pg()).unwrap();

    writer.write(&session, &person(5, "Grace")).await.unwrap();
    let executed = session.executed();
    assert_eq!(executed[0].0, "UPDATE people SET name=$1 WHERE id=$2");
    assert_eq!(
        executed[0].1,
        vec![Value::String("Grace".into()), Value::Int32(5)]
    );
}

#[tokio::test]
async fn test_source_template() {
    let session = RecordingSession::new(pg());
    let mut config = config(Engine::Postgres, WriteMode::Upsert);
    config.table_name_format = "${source.db}_${source.table}".to_string();
    let writer = RecordWriter::new(config, pg()).unwrap();

    let event = person(1, "Ada").with_source(source("inventory", "people"));
    let WriteOutcome::Written { table, .. } = writer.write(&session, &event).await.unwrap() else {
        panic!("expected a write");
    };
    assert_eq!(table, TableId::new("inventory_people"));

    // tombstones carry no source metadata
    assert_eq!(
        writer.write(&session, &tombstone(1)).await.unwrap(),
        WriteOutcome::Skipped(SkipReason::NoTable)
    );

    let err = writer.write(&session, &person(2, "Bob")).await.unwrap_err();
    assert!(matches!(err, Error::Naming { .. }));
}

#[tokio::test]
async fn test_mixed_case_source_table_on_postgres() {
    let session = RecordingSession::new(pg()).with_table(people_table("integer", "text"));
    let mut config = config(Engine::Postgres, WriteMode::Upsert);
    config.table_name_format = "${source.table}".to_string();
    let writer = RecordWriter::new(config, pg()).unwrap();

    let event = person(1, "Ada").with_source(source("inventory", "People"));
    let WriteOutcome::Written {
        table,
        schema_changes,
        ..
    } = writer.write(&session, &event).await.unwrap()
    else {
        panic!("expected a write");
    };
    assert_eq!(table, TableId::new("people"));
    assert!(!schema_changes.has_changes());

    // the existing table is found, so no DDL is issued
    let sql = session.sql();
    assert_eq!(sql.len(), 1);
    assert!(sql[0].starts_with("INSERT INTO people (id, name)"), "{}", sql[0]);
    assert_eq!(session.introspections(), 1);
}

#[tokio::test]
async fn test_mixed_case_source_table_keeps_case_on_mysql() {
    let version = DatabaseVersion::new(8, 0, 34);
    let session = RecordingSession::new(version);
    let mut config = config(Engine::MySql, WriteMode::Insert);
    config.table_name_format = "${source.table}".to_string();
    let writer = RecordWriter::new(config, version).unwrap();

    let event = person(1, "Ada").with_source(source("inventory", "People"));
    let WriteOutcome::Written { table, .. } = writer.write(&session, &event).await.unwrap() else {
        panic!("expected a write");
    };
    assert_eq!(table, TableId::new("People"));
    assert!(session.sql()[0].starts_with("CREATE TABLE People ("));
}

#[tokio::test]
async fn test_quoted_identifiers() {
    let session = RecordingSession::new(pg());
    let mut config = config(Engine::Postgres, WriteMode::Insert);
    config.quote_identifiers = true;
    config.table_name_format = "SYS.${topic}".to_string();
    let writer = RecordWriter::new(config, pg()).unwrap();

    writer.write(&session, &person(1, "Ada")).await.unwrap();
    let sql = session.sql();
    assert_eq!(
        sql[0],
        r#"CREATE TABLE "SYS"."people" ("id" integer NOT NULL, "name" text NULL, PRIMARY KEY("id"))"#
    );
    assert_eq!(
        sql[1],
        r#"INSERT INTO "SYS"."people" ("id", "name") VALUES ($1, $2)"#
    );
}

#[tokio::test]
async fn test_unquoted_unsafe_table_name_rejected() {
    let session = RecordingSession::new(pg());
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Insert), pg()).unwrap();

    let event = ChangeEvent::new("people;drop")
        .with_key(common::id_key_schema(), serde_json::json!({"id": 1}))
        .with_value(
            common::people_value_schema(),
            serde_json::json!({"id": 1, "name": "Ada"}),
        );
    let err = writer.write(&session, &event).await.unwrap_err();
    assert!(matches!(err, Error::Naming { .. }));
    assert!(session.executed().is_empty());
}

#[tokio::test]
async fn test_connect_json_envelope() {
    let key = r#"{"schema":{"type":"struct","fields":[{"field":"id","type":"int32"}]},"payload":{"id":42}}"#;
    let value = r#"{
        "schema": {"type": "struct", "name": "server1.inventory.people.Envelope", "fields": [
            {"field": "before", "type": "struct", "optional": true, "fields": [
                {"field": "id", "type": "int32"}, {"field": "name", "type": "string", "optional": true}]},
            {"field": "after", "type": "struct", "optional": true, "fields": [
                {"field": "id", "type": "int32"}, {"field": "name", "type": "string", "optional": true}]},
            {"field": "source", "type": "struct", "fields": [
                {"field": "db", "type": "string"}, {"field": "table", "type": "string"}]},
            {"field": "op", "type": "string"}
        ]},
        "payload": {
            "before": null,
            "after": {"id": 42, "name": "Ada"},
            "source": {"db": "inventory", "table": "people"},
            "op": "c"
        }
    }"#;
    let event =
        ChangeEvent::from_connect_json("server1.inventory.people", Some(key), Some(value)).unwrap();

    let session = RecordingSession::new(pg());
    let mut config = config(Engine::Postgres, WriteMode::Upsert);
    config.table_name_format = "kafka_${topic}".to_string();
    let writer = RecordWriter::new(config, pg()).unwrap();

    writer.write(&session, &event).await.unwrap();
    let executed = session.executed();
    assert!(executed[0]
        .0
        .starts_with("CREATE TABLE kafka_server1_inventory_people ("));
    assert_eq!(
        executed[1].1,
        vec![Value::Int32(42), Value::String("Ada".into())]
    );
}

#[tokio::test]
async fn test_truncate_is_skipped() {
    let value = r#"{
        "schema": {"type": "struct", "name": "server1.inventory.people.Envelope", "fields": [
            {"field": "before", "type": "struct", "optional": true, "fields": [
                {"field": "id", "type": "int32"}]},
            {"field": "after", "type": "struct", "optional": true, "fields": [
                {"field": "id", "type": "int32"}]},
            {"field": "op", "type": "string"}
        ]},
        "payload": {"before": null, "after": null, "op": "t"}
    }"#;
    let truncate = ChangeEvent::from_connect_json("people", None, Some(value)).unwrap();

    let session = RecordingSession::new(pg()).with_table(people_table("integer", "text"));
    let writer = RecordWriter::new(config(Engine::Postgres, WriteMode::Upsert), pg()).unwrap();

    assert_eq!(
        writer.write(&session, &truncate).await.unwrap(),
        WriteOutcome::Skipped(SkipReason::Truncate)
    );

    // a keyed truncate never turns into a row delete
    let keyed = person(1, "Ada").with_op(Operation::Truncate);
    assert_eq!(
        writer.write(&session, &keyed).await.unwrap(),
        WriteOutcome::Skipped(SkipReason::Truncate)
    );

    assert!(session.executed().is_empty());
    assert_eq!(session.introspections(), 0);
    let stats = writer.stats();
    assert_eq!(stats.records_skipped, 2);
    assert_eq!(stats.records_deleted, 0);
}
