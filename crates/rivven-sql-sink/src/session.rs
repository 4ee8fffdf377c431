//! Relational session boundary
//!
//! The sink never owns a driver. Callers hand it a [`Session`] that executes
//! SQL against the destination; the sink only produces statements and reads
//! back table shapes.

use async_trait::async_trait;
use std::sync::Arc;

use crate::dialect::{DatabaseVersion, SqlDialect};
use crate::error::Result;
use crate::table::{TableDescriptor, TableId};
use crate::value::{Row, Value};

/// A live session against the destination database
#[async_trait]
pub trait Session: Send + Sync {
    /// Execute a statement that modifies data or schema, returns affected row count
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Current shape of a table, `None` if it does not exist
    async fn introspect_table(&self, table: &TableId) -> Result<Option<TableDescriptor>>;

    /// Version of the connected engine
    async fn engine_version(&self) -> Result<DatabaseVersion>;

    /// Execute a query and return the first row
    async fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        let rows = self.query(sql, params).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl<S: Session + ?Sized> Session for Arc<S> {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params).await
    }

    async fn introspect_table(&self, table: &TableId) -> Result<Option<TableDescriptor>> {
        (**self).introspect_table(table).await
    }

    async fn engine_version(&self) -> Result<DatabaseVersion> {
        (**self).engine_version().await
    }
}

/// Introspect a table through the dialect's catalog queries.
///
/// Session implementations backed by a real driver can delegate
/// [`Session::introspect_table`] here.
pub async fn introspect_table<S>(
    session: &S,
    dialect: &dyn SqlDialect,
    table: &TableId,
) -> Result<Option<TableDescriptor>>
where
    S: Session + ?Sized,
{
    let exists = session
        .query_one(&dialect.table_exists_sql(table), &[])
        .await?
        .and_then(|row| row.get(0).and_then(Value::as_bool))
        .unwrap_or(false);
    if !exists {
        return Ok(None);
    }

    let rows = session.query(&dialect.list_columns_sql(table), &[]).await?;
    TableDescriptor::from_rows(table.clone(), &rows).map(Some)
}
