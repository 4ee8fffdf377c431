//! Destination table identity and shape

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::value::Row;

/// Identifier of a destination table, optionally catalog/schema qualified
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    /// Catalog (database) name
    pub catalog: Option<String>,
    /// Schema name
    pub schema: Option<String>,
    /// Table name
    pub table: String,
}

impl TableId {
    /// Create an unqualified table id
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            table: table.into(),
        }
    }

    /// Create a schema-qualified table id
    pub fn with_schema(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    /// Parse a dotted name: `table`, `schema.table` or `catalog.schema.table`
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::naming(format!("invalid table name '{}'", name)));
        }

        match parts.as_slice() {
            [table] => Ok(Self::new(*table)),
            [schema, table] => Ok(Self::with_schema(*schema, *table)),
            [catalog, schema, table] => Ok(Self {
                catalog: Some((*catalog).to_string()),
                schema: Some((*schema).to_string()),
                table: (*table).to_string(),
            }),
            _ => Err(Error::naming(format!(
                "table name '{}' has more than three parts",
                name
            ))),
        }
    }

    /// Qualifier parts followed by the table name
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.catalog
            .as_deref()
            .into_iter()
            .chain(self.schema.as_deref())
            .chain(std::iter::once(self.table.as_str()))
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in self.parts() {
            if !first {
                f.write_str(".")?;
            }
            f.write_str(part)?;
            first = false;
        }
        Ok(())
    }
}

/// One column of a destination table as last observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,
    /// Native type name as reported by (or issued to) the engine
    pub type_name: String,
    /// Whether column is nullable
    pub nullable: bool,
    /// Default value expression
    pub default_value: Option<String>,
    /// Primary key ordinal (1-based, None if not PK)
    pub primary_key_ordinal: Option<u32>,
}

impl ColumnDescriptor {
    /// Create a nullable, non-key column
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            default_value: None,
            primary_key_ordinal: None,
        }
    }

    /// Mark as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as primary key column at the given ordinal
    pub fn primary_key(mut self, ordinal: u32) -> Self {
        self.primary_key_ordinal = Some(ordinal);
        self.nullable = false;
        self
    }

    /// Check if this column is part of the primary key
    #[inline]
    pub fn is_primary_key(&self) -> bool {
        self.primary_key_ordinal.is_some()
    }
}

/// Persisted shape of a destination table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table identity
    pub id: TableId,
    /// Columns in ordinal order
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Create an empty descriptor
    pub fn new(id: TableId) -> Self {
        Self {
            id,
            columns: Vec::new(),
        }
    }

    /// Append a column
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Get column by name (case-insensitive)
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether a column exists (case-insensitive)
    #[inline]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Get primary key columns in key order
    pub fn primary_key_columns(&self) -> Vec<&ColumnDescriptor> {
        let mut pk_cols: Vec<_> = self.columns.iter().filter(|c| c.is_primary_key()).collect();
        pk_cols.sort_by_key(|c| c.primary_key_ordinal);
        pk_cols
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Add a column unless one with the same name exists; returns whether it was added
    pub fn add_column(&mut self, column: ColumnDescriptor) -> bool {
        if self.has_column(&column.name) {
            return false;
        }
        self.columns.push(column);
        true
    }

    /// Build a descriptor from the rows of a dialect's `list_columns_sql`.
    ///
    /// Recognized columns (case-insensitive): `column_name`, `data_type`,
    /// `nullable`, `ordinal_position`, `column_default`, and either
    /// `pk_ordinal` or `is_primary_key`.
    pub fn from_rows(id: TableId, rows: &[Row]) -> Result<Self> {
        let mut columns: Vec<(i64, ColumnDescriptor)> = Vec::with_capacity(rows.len());
        let mut flagged_keys = 0u32;

        for (idx, row) in rows.iter().enumerate() {
            let name = row
                .get_by_name("column_name")
                .and_then(|v| v.as_string())
                .ok_or_else(|| {
                    Error::schema(format!("column row {} of {} has no column_name", idx, id))
                })?;
            let type_name = row
                .get_by_name("data_type")
                .and_then(|v| v.as_string())
                .ok_or_else(|| {
                    Error::schema(format!("column {} of {} has no data_type", name, id))
                })?;

            let nullable = row
                .get_by_name("nullable")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            let ordinal = row
                .get_by_name("ordinal_position")
                .and_then(|v| v.as_i64())
                .unwrap_or(idx as i64 + 1);
            let default_value = row
                .get_by_name("column_default")
                .filter(|v| !v.is_null())
                .and_then(|v| v.as_string());

            let primary_key_ordinal = match row.get_by_name("pk_ordinal") {
                Some(v) if !v.is_null() => v.as_i64().map(|n| n as u32),
                _ => match row.get_by_name("is_primary_key").and_then(|v| v.as_bool()) {
                    Some(true) => {
                        flagged_keys += 1;
                        Some(flagged_keys)
                    }
                    _ => None,
                },
            };

            columns.push((
                ordinal,
                ColumnDescriptor {
                    name,
                    type_name,
                    nullable,
                    default_value,
                    primary_key_ordinal,
                },
            ));
        }

        columns.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(Self {
            id,
            columns: columns.into_iter().map(|(_, c)| c).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_parse_table_id() {
        let id = TableId::parse("people").unwrap();
        assert_eq!(id, TableId::new("people"));

        let id = TableId::parse("SYS.people").unwrap();
        assert_eq!(id.schema.as_deref(), Some("SYS"));
        assert_eq!(id.table, "people");
        assert_eq!(id.to_string(), "SYS.people");

        let id = TableId::parse("db.dbo.people").unwrap();
        assert_eq!(id.catalog.as_deref(), Some("db"));
        assert_eq!(id.to_string(), "db.dbo.people");

        assert!(TableId::parse("a..b").is_err());
        assert!(TableId::parse("a.b.c.d").is_err());
    }

    #[test]
    fn test_table_descriptor() {
        let mut table = TableDescriptor::new(TableId::new("users"))
            .with_column(ColumnDescriptor::new("id", "integer").primary_key(1))
            .with_column(ColumnDescriptor::new("name", "text"));

        assert_eq!(table.primary_key_columns().len(), 1);
        assert!(table.column("ID").unwrap().is_primary_key());
        assert!(!table.add_column(ColumnDescriptor::new("Name", "text")));
        assert!(table.add_column(ColumnDescriptor::new("email", "text")));
        assert_eq!(table.column_names(), vec!["id", "name", "email"]);
    }

    #[test]
    fn test_from_rows() {
        let columns = vec![
            "column_name".to_string(),
            "data_type".to_string(),
            "nullable".to_string(),
            "ordinal_position".to_string(),
            "column_default".to_string(),
            "is_primary_key".to_string(),
        ];
        let rows = vec![
            Row::new(
                columns.clone(),
                vec![
                    Value::String("name".into()),
                    Value::String("varchar".into()),
                    Value::Int32(1),
                    Value::Int64(2),
                    Value::String("'n/a'".into()),
                    Value::Int32(0),
                ],
            ),
            Row::new(
                columns,
                vec![
                    Value::String("id".into()),
                    Value::String("int".into()),
                    Value::Int32(0),
                    Value::Int64(1),
                    Value::Null,
                    Value::Int32(1),
                ],
            ),
        ];

        let table = TableDescriptor::from_rows(TableId::new("people"), &rows).unwrap();
        assert_eq!(table.column_names(), vec!["id", "name"]);
        assert_eq!(table.columns[0].primary_key_ordinal, Some(1));
        assert!(!table.columns[0].nullable);
        assert_eq!(table.columns[0].default_value, None);
        assert_eq!(table.columns[1].default_value.as_deref(), Some("'n/a'"));
    }
}
