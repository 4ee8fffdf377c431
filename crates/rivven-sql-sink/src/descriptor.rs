//! Per-record field descriptors
//!
//! A [`SinkRecordDescriptor`] is the resolved view of one change event: which
//! fields form the key, which are plain columns, the type each one binds
//! through, and the payload values to bind.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::warn;

use crate::config::PrimaryKeyMode;
use crate::dialect::DatabaseDialect;
use crate::error::{Error, Result};
use crate::event::{ChangeEvent, Payload};
use crate::schema::{Schema, SchemaKind};
use crate::types::SqlType;
use crate::value::Value;

static NULL: JsonValue = JsonValue::Null;

/// Options controlling key extraction
#[derive(Debug, Clone, Default)]
pub struct DescriptorOptions {
    /// Where key fields come from
    pub primary_key_mode: PrimaryKeyMode,
    /// Key fields to use; all when empty, the column name for primitive keys
    pub primary_key_fields: Vec<String>,
    /// Fail records whose key is empty
    pub key_required: bool,
}

/// One resolved field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Payload field name
    pub name: String,
    /// Destination column name
    pub column_name: String,
    /// Field schema
    pub schema: Schema,
    /// Type the field binds through
    pub sql_type: &'static SqlType,
    /// Native column type
    pub type_name: String,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Whether the field is part of the primary key
    pub key: bool,
    /// Schema default
    pub default_value: Option<JsonValue>,
}

impl FieldDescriptor {
    /// Resolve a field against the dialect
    pub fn new(
        dialect: &DatabaseDialect,
        name: impl Into<String>,
        schema: &Schema,
        key: bool,
    ) -> Result<Self> {
        let name = name.into();
        let sql_type = dialect.resolve_type(schema)?;
        Ok(Self {
            column_name: dialect.checked_column_name(&name)?,
            type_name: sql_type.type_name(dialect, schema, key),
            nullable: schema.optional && !key,
            default_value: schema.default.clone().filter(|v| !v.is_null()),
            sql_type,
            schema: schema.clone(),
            key,
            name,
        })
    }

    /// Convert a payload value into a bound parameter
    pub fn bind(&self, value: &JsonValue) -> Result<Value> {
        self.sql_type.bind(&self.schema, value)
    }

    /// SQL text for this field's placeholder
    #[inline]
    pub fn query_binding(&self) -> &'static str {
        self.sql_type.query_binding()
    }

    /// DEFAULT literal, when the field has a default the dialect can render
    pub fn default_literal(&self, dialect: &DatabaseDialect) -> Option<String> {
        if !dialect.allows_default(&self.type_name) {
            return None;
        }
        let value = self.default_value.as_ref()?;
        self.sql_type.default_literal(dialect, &self.schema, value)
    }

    fn promote_to_key(&mut self, dialect: &DatabaseDialect) {
        self.key = true;
        self.nullable = false;
        self.type_name = self.sql_type.type_name(dialect, &self.schema, true);
    }
}

/// Resolved view of one change event
#[derive(Debug, Clone)]
pub struct SinkRecordDescriptor {
    topic: String,
    key_field_names: Vec<String>,
    non_key_field_names: Vec<String>,
    fields: HashMap<String, FieldDescriptor>,
    values: HashMap<String, JsonValue>,
    delete: bool,
}

impl SinkRecordDescriptor {
    /// Build the descriptor for an event
    pub fn from_event(
        event: &ChangeEvent,
        dialect: &DatabaseDialect,
        options: &DescriptorOptions,
    ) -> Result<Self> {
        let mut record = Self {
            topic: event.topic.clone(),
            key_field_names: Vec::new(),
            non_key_field_names: Vec::new(),
            fields: HashMap::new(),
            values: HashMap::new(),
            delete: event.is_delete(),
        };

        if options.primary_key_mode == PrimaryKeyMode::RecordKey {
            if let Some(key) = event.key.as_ref() {
                record.apply_key(key, dialect, options)?;
            }
        }

        if options.key_required && record.key_field_names.is_empty() {
            return Err(Error::missing_key(&record.topic));
        }

        if !record.delete {
            if let Some(value) = event.value.as_ref() {
                record.apply_value(value, dialect)?;
            }
        }

        Ok(record)
    }

    fn apply_key(
        &mut self,
        key: &Payload,
        dialect: &DatabaseDialect,
        options: &DescriptorOptions,
    ) -> Result<()> {
        if key.schema.kind != SchemaKind::Struct {
            let [name] = options.primary_key_fields.as_slice() else {
                return Err(Error::config(format!(
                    "topic {} has a primitive key; exactly one primary key field name is required",
                    self.topic
                )));
            };
            let field = FieldDescriptor::new(dialect, name.as_str(), &key.schema, true)?;
            self.insert_key(field, key.data.clone());
            return Ok(());
        }

        for name in &options.primary_key_fields {
            if key.schema.field(name).is_none() {
                return Err(Error::config(format!(
                    "primary key field '{}' is not part of the key of topic {}",
                    name, self.topic
                )));
            }
        }

        for field in &key.schema.fields {
            if !options.primary_key_fields.is_empty()
                && !options.primary_key_fields.contains(&field.name)
            {
                continue;
            }
            let descriptor = FieldDescriptor::new(dialect, field.name.as_str(), &field.schema, true)?;
            let value = key.get(&field.name).cloned().unwrap_or(JsonValue::Null);
            self.insert_key(descriptor, value);
        }
        Ok(())
    }

    fn insert_key(&mut self, field: FieldDescriptor, value: JsonValue) {
        self.key_field_names.push(field.name.clone());
        self.values.insert(field.name.clone(), value);
        self.fields.insert(field.name.clone(), field);
    }

    fn apply_value(&mut self, value: &Payload, dialect: &DatabaseDialect) -> Result<()> {
        if value.schema.kind != SchemaKind::Struct {
            return Err(Error::schema(format!(
                "value of topic {} is {} but a struct is required",
                self.topic,
                value.schema.type_name()
            )));
        }

        for field in &value.schema.fields {
            let mut descriptor =
                FieldDescriptor::new(dialect, field.name.as_str(), &field.schema, false)?;
            let data = value.get(&field.name).cloned().unwrap_or(JsonValue::Null);

            if let Some(existing) = self.fields.get(&field.name) {
                if existing.sql_type.name != descriptor.sql_type.name {
                    warn!(
                        topic = %self.topic,
                        field = %field.name,
                        key_type = existing.sql_type.name,
                        value_type = descriptor.sql_type.name,
                        "key and value schemas disagree on field type, using the value schema"
                    );
                }
                descriptor.promote_to_key(dialect);
            } else {
                self.non_key_field_names.push(field.name.clone());
            }

            self.values.insert(field.name.clone(), data);
            self.fields.insert(field.name.clone(), descriptor);
        }
        Ok(())
    }

    /// Source topic
    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether the record removes its row
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.delete
    }

    /// Key field names in key order
    #[inline]
    pub fn key_field_names(&self) -> &[String] {
        &self.key_field_names
    }

    /// Non-key field names in value order
    #[inline]
    pub fn non_key_field_names(&self) -> &[String] {
        &self.non_key_field_names
    }

    /// Field by payload name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Key fields in key order
    pub fn key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.key_field_names
            .iter()
            .filter_map(|name| self.fields.get(name))
    }

    /// Non-key fields in value order
    pub fn non_key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.non_key_field_names
            .iter()
            .filter_map(|name| self.fields.get(name))
    }

    /// Key fields followed by non-key fields
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.key_fields().chain(self.non_key_fields())
    }

    /// Payload value of a field; JSON null when absent
    pub fn value(&self, name: &str) -> &JsonValue {
        self.values.get(name).unwrap_or(&NULL)
    }

    /// Whether the record carries any key field
    #[inline]
    pub fn has_key(&self) -> bool {
        !self.key_field_names.is_empty()
    }
}
