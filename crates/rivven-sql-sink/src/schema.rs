//! Connect schema model for change-event keys and values
//!
//! Mirrors the JSON schema envelope written by Kafka Connect's JSON converter:
//!
//! ```json
//! {"type": "struct", "fields": [
//!     {"field": "id", "type": "int32", "optional": false},
//!     {"field": "created", "type": "string", "name": "io.debezium.time.ZonedTimestamp"}
//! ]}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema parameter carrying the source column's native type
pub const SOURCE_COLUMN_TYPE: &str = "__debezium.source.column.type";
/// Schema parameter carrying the source column's length
pub const SOURCE_COLUMN_LENGTH: &str = "__debezium.source.column.length";
/// Schema parameter carrying the source column's scale
pub const SOURCE_COLUMN_SCALE: &str = "__debezium.source.column.scale";

/// Connect schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit IEEE 754 float
    Float32,
    /// 64-bit IEEE 754 float
    Float64,
    /// Boolean
    Boolean,
    /// UTF-8 string
    String,
    /// Byte array (base64 in JSON)
    Bytes,
    /// Ordered collection
    Array,
    /// Key/value map
    Map,
    /// Named fields
    Struct,
}

impl SchemaKind {
    /// Registry key of the Connect type
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
            Self::Boolean => "BOOLEAN",
            Self::String => "STRING",
            Self::Bytes => "BYTES",
            Self::Array => "ARRAY",
            Self::Map => "MAP",
            Self::Struct => "STRUCT",
        }
    }
}

/// Schema of a key, value, or field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Connect type
    #[serde(rename = "type")]
    pub kind: SchemaKind,
    /// Logical type name (e.g. `io.debezium.time.ZonedTimestamp`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the value may be null
    #[serde(default)]
    pub optional: bool,
    /// Default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Schema parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    /// Struct fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    /// Array element schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Map key schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Box<Schema>>,
    /// Map value schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Box<Schema>>,
}

/// Named field of a struct schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name
    #[serde(rename = "field")]
    pub name: String,
    /// Field schema
    #[serde(flatten)]
    pub schema: Schema,
}

impl Field {
    /// Create a field
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

impl Schema {
    /// Create a required schema of the given kind
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            name: None,
            optional: false,
            default: None,
            parameters: BTreeMap::new(),
            fields: Vec::new(),
            items: None,
            keys: None,
            values: None,
        }
    }

    /// `int8` schema
    pub fn int8() -> Self {
        Self::new(SchemaKind::Int8)
    }

    /// `int16` schema
    pub fn int16() -> Self {
        Self::new(SchemaKind::Int16)
    }

    /// `int32` schema
    pub fn int32() -> Self {
        Self::new(SchemaKind::Int32)
    }

    /// `int64` schema
    pub fn int64() -> Self {
        Self::new(SchemaKind::Int64)
    }

    /// `float32` schema
    pub fn float32() -> Self {
        Self::new(SchemaKind::Float32)
    }

    /// `float64` schema
    pub fn float64() -> Self {
        Self::new(SchemaKind::Float64)
    }

    /// `boolean` schema
    pub fn boolean() -> Self {
        Self::new(SchemaKind::Boolean)
    }

    /// `string` schema
    pub fn string() -> Self {
        Self::new(SchemaKind::String)
    }

    /// `bytes` schema
    pub fn bytes() -> Self {
        Self::new(SchemaKind::Bytes)
    }

    /// `array` schema
    pub fn array(items: Schema) -> Self {
        let mut schema = Self::new(SchemaKind::Array);
        schema.items = Some(Box::new(items));
        schema
    }

    /// `map` schema
    pub fn map(keys: Schema, values: Schema) -> Self {
        let mut schema = Self::new(SchemaKind::Map);
        schema.keys = Some(Box::new(keys));
        schema.values = Some(Box::new(values));
        schema
    }

    /// `struct` schema
    pub fn structure(fields: Vec<Field>) -> Self {
        let mut schema = Self::new(SchemaKind::Struct);
        schema.fields = fields;
        schema
    }

    /// Set the logical type name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set the default value
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Add a schema parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Get a struct field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a parameter value
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Connect type name used as the last-resort registry key
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Native type of the source column, if propagated
    pub fn source_column_type(&self) -> Option<&str> {
        self.parameter(SOURCE_COLUMN_TYPE)
    }

    /// Length of the source column, if propagated
    pub fn source_column_length(&self) -> Option<u32> {
        self.parameter(SOURCE_COLUMN_LENGTH)?.parse().ok()
    }

    /// Scale of the source column, if propagated
    pub fn source_column_scale(&self) -> Option<u32> {
        self.parameter(SOURCE_COLUMN_SCALE)?.parse().ok()
    }
}
