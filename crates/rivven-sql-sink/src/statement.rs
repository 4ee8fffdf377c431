//! DDL and DML generation
//!
//! Statements are rendered as text plus an ordered list of bindings. Every
//! placeholder is produced from the field's query binding (`?` or a wrapper
//! such as `CAST(? AS jsonb)`) with the `?` replaced by the dialect's
//! positional placeholder, so the n-th placeholder in the text always
//! matches the n-th binding.
//!
//! Column order is key fields first, then non-key fields. UPDATE lists the
//! SET columns before the WHERE key columns, matching text order.

use crate::dialect::{DatabaseDialect, UpsertSyntax};
use crate::descriptor::{FieldDescriptor, SinkRecordDescriptor};
use crate::error::{Error, Result};
use crate::table::{TableDescriptor, TableId};
use crate::value::Value;

/// One bound parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Payload field name
    pub field: String,
    /// Bound value
    pub value: Value,
}

/// Rendered SQL with its ordered bindings
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with engine placeholders
    pub sql: String,
    /// Bound values in placeholder order
    pub bindings: Vec<Binding>,
}

impl Statement {
    fn ddl(sql: String) -> Self {
        Self {
            sql,
            bindings: Vec::new(),
        }
    }

    /// Bound values in placeholder order
    pub fn values(&self) -> Vec<Value> {
        self.bindings.iter().map(|b| b.value.clone()).collect()
    }
}

/// Renders statements for one dialect
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    dialect: &'a DatabaseDialect,
}

/// Accumulates placeholders and bindings in text order
struct Params<'r> {
    record: &'r SinkRecordDescriptor,
    bindings: Vec<Binding>,
}

impl<'r> Params<'r> {
    fn new(record: &'r SinkRecordDescriptor) -> Self {
        Self {
            record,
            bindings: Vec::new(),
        }
    }

    /// Bind a field and return its placeholder text
    fn push(&mut self, dialect: &DatabaseDialect, field: &FieldDescriptor) -> Result<String> {
        let value = field.bind(self.record.value(&field.name))?;
        self.bindings.push(Binding {
            field: field.name.clone(),
            value,
        });
        let placeholder = dialect.placeholder(self.bindings.len());
        Ok(field.query_binding().replacen('?', &placeholder, 1))
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            bindings: self.bindings,
        }
    }
}

impl<'a> StatementBuilder<'a> {
    /// Create a builder rendering for `dialect`
    pub fn new(dialect: &'a DatabaseDialect) -> Self {
        Self { dialect }
    }

    fn table_name(&self, table: &TableDescriptor) -> String {
        self.dialect.table_name(&table.id)
    }

    fn column(&self, field: &FieldDescriptor) -> String {
        self.dialect.quote(&field.column_name)
    }

    /// `INSERT INTO t (cols) VALUES (...)`
    pub fn build_insert(
        &self,
        table: &TableDescriptor,
        record: &SinkRecordDescriptor,
    ) -> Result<Statement> {
        let mut params = Params::new(record);
        let (columns, values) = self.columns_and_values(&mut params, record)?;
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_name(table),
            columns.join(", "),
            values.join(", ")
        );
        Ok(params.finish(sql))
    }

    /// Insert-or-update in the dialect's version-appropriate syntax
    pub fn build_upsert(
        &self,
        table: &TableDescriptor,
        record: &SinkRecordDescriptor,
    ) -> Result<Statement> {
        if !record.has_key() {
            return Err(Error::missing_key(table.id.to_string()));
        }

        let keys: Vec<String> = record.key_fields().map(|f| self.column(f)).collect();
        let non_keys: Vec<String> = record.non_key_fields().map(|f| self.column(f)).collect();
        // key-only records update the key columns to themselves
        let targets = if non_keys.is_empty() { &keys } else { &non_keys };

        let conflict = match self.dialect.upsert_syntax()? {
            UpsertSyntax::Merge => return self.build_merge(table, record),
            UpsertSyntax::OnConflict if non_keys.is_empty() => {
                format!(" ON CONFLICT ({}) DO NOTHING", keys.join(", "))
            }
            UpsertSyntax::OnConflict => {
                let updates: Vec<String> = non_keys
                    .iter()
                    .map(|c| format!("{}=EXCLUDED.{}", c, c))
                    .collect();
                format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    keys.join(", "),
                    updates.join(", ")
                )
            }
            UpsertSyntax::DuplicateKeyRowAlias => {
                let updates: Vec<String> =
                    targets.iter().map(|c| format!("{}=new.{}", c, c)).collect();
                format!(" AS new ON DUPLICATE KEY UPDATE {}", updates.join(","))
            }
            UpsertSyntax::DuplicateKeyValues => {
                let updates: Vec<String> = targets
                    .iter()
                    .map(|c| format!("{}=VALUES({})", c, c))
                    .collect();
                format!(" ON DUPLICATE KEY UPDATE {}", updates.join(","))
            }
        };

        let mut params = Params::new(record);
        let (columns, values) = self.columns_and_values(&mut params, record)?;
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            self.table_name(table),
            columns.join(", "),
            values.join(", "),
            conflict
        );
        Ok(params.finish(sql))
    }

    fn build_merge(
        &self,
        table: &TableDescriptor,
        record: &SinkRecordDescriptor,
    ) -> Result<Statement> {
        let mut params = Params::new(record);
        let mut sources = Vec::new();
        let mut columns = Vec::new();
        for field in record.all_fields() {
            let column = self.column(field);
            sources.push(format!("{} AS {}", params.push(self.dialect, field)?, column));
            columns.push(column);
        }

        let on: Vec<String> = record
            .key_fields()
            .map(|f| {
                let c = self.column(f);
                format!("TARGET.{}=INCOMING.{}", c, c)
            })
            .collect();
        let updates: Vec<String> = record
            .non_key_fields()
            .map(|f| {
                let c = self.column(f);
                format!("{}=INCOMING.{}", c, c)
            })
            .collect();
        let incoming: Vec<String> = columns.iter().map(|c| format!("INCOMING.{}", c)).collect();

        let mut sql = format!(
            "MERGE INTO {} WITH (HOLDLOCK) AS TARGET USING (SELECT {}) AS INCOMING ON ({})",
            self.table_name(table),
            sources.join(", "),
            on.join(" AND ")
        );
        if !updates.is_empty() {
            sql.push_str(&format!(
                " WHEN MATCHED THEN UPDATE SET {}",
                updates.join(", ")
            ));
        }
        sql.push_str(&format!(
            " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({});",
            columns.join(", "),
            incoming.join(",")
        ));

        Ok(params.finish(sql))
    }

    /// `UPDATE t SET c=? ... WHERE k=? ...`
    pub fn build_update(
        &self,
        table: &TableDescriptor,
        record: &SinkRecordDescriptor,
    ) -> Result<Statement> {
        if !record.has_key() {
            return Err(Error::missing_key(table.id.to_string()));
        }
        if record.non_key_field_names().is_empty() {
            return Err(Error::unsupported(format!(
                "cannot update {}: the record has no non-key fields",
                table.id
            )));
        }

        let mut params = Params::new(record);
        let mut sets = Vec::new();
        for field in record.non_key_fields() {
            sets.push(format!(
                "{}={}",
                self.column(field),
                params.push(self.dialect, field)?
            ));
        }
        let conditions = self.key_conditions(&mut params, record)?;

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table_name(table),
            sets.join(", "),
            conditions.join(" AND ")
        );
        Ok(params.finish(sql))
    }

    /// `DELETE FROM t WHERE k=? ...`
    pub fn build_delete(
        &self,
        table: &TableDescriptor,
        record: &SinkRecordDescriptor,
    ) -> Result<Statement> {
        if !record.has_key() {
            return Err(Error::missing_key(table.id.to_string()));
        }

        let mut params = Params::new(record);
        let conditions = self.key_conditions(&mut params, record)?;
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            self.table_name(table),
            conditions.join(" AND ")
        );
        Ok(params.finish(sql))
    }

    /// `CREATE TABLE` with every field of the record
    pub fn build_create_table(&self, id: &TableId, record: &SinkRecordDescriptor) -> Statement {
        let mut definitions: Vec<String> = record
            .all_fields()
            .map(|f| self.column_definition(f, f.nullable))
            .collect();

        if record.has_key() {
            let keys: Vec<String> = record.key_fields().map(|f| self.column(f)).collect();
            definitions.push(format!("PRIMARY KEY({})", keys.join(", ")));
        }

        Statement::ddl(format!(
            "CREATE TABLE {} ({})",
            self.dialect.table_name(id),
            definitions.join(", ")
        ))
    }

    /// `ALTER TABLE` adding the record's fields the table lacks; `None` when
    /// nothing is missing
    pub fn build_alter_table_add_columns(
        &self,
        table: &TableDescriptor,
        record: &SinkRecordDescriptor,
    ) -> Option<Statement> {
        let definitions: Vec<String> = self
            .missing_fields(table, record)
            .into_iter()
            .map(|f| {
                // added columns cannot be NOT NULL without a default
                let nullable = f.default_literal(self.dialect).is_none() || f.nullable;
                self.column_definition(f, nullable)
            })
            .collect();

        if definitions.is_empty() {
            return None;
        }
        Some(Statement::ddl(self.dialect.syntax().alter_table_add_columns(
            &self.table_name(table),
            &definitions,
        )))
    }

    /// Fields of the record with no matching column in the table
    pub fn missing_fields<'r>(
        &self,
        table: &TableDescriptor,
        record: &'r SinkRecordDescriptor,
    ) -> Vec<&'r FieldDescriptor> {
        record
            .all_fields()
            .filter(|f| !table.has_column(&f.column_name))
            .collect()
    }

    /// `name type [DEFAULT x] NULL|NOT NULL`
    fn column_definition(&self, field: &FieldDescriptor, nullable: bool) -> String {
        let mut definition = format!("{} {}", self.column(field), field.type_name);
        if let Some(default) = field.default_literal(self.dialect) {
            definition.push_str(" DEFAULT ");
            definition.push_str(&default);
        }
        definition.push_str(if nullable { " NULL" } else { " NOT NULL" });
        definition
    }

    fn columns_and_values(
        &self,
        params: &mut Params<'_>,
        record: &SinkRecordDescriptor,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in record.all_fields() {
            columns.push(self.column(field));
            values.push(params.push(self.dialect, field)?);
        }
        Ok((columns, values))
    }

    fn key_conditions(
        &self,
        params: &mut Params<'_>,
        record: &SinkRecordDescriptor,
    ) -> Result<Vec<String>> {
        record
            .key_fields()
            .map(|field| {
                Ok(format!(
                    "{}={}",
                    self.column(field),
                    params.push(self.dialect, field)?
                ))
            })
            .collect()
    }
}
