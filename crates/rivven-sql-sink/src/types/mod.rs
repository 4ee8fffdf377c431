//! Value-to-SQL type mapping
//!
//! A [`SqlType`] is an immutable record of functions that, for one family of
//! logical schema types, renders the native column type, wraps the bound
//! placeholder in SQL text, converts payload values into bound [`Value`]s and
//! renders schema defaults as literals.
//!
//! Types are `'static` and registered by key in a [`TypeRegistry`]. Generic
//! types are registered first; each dialect then re-registers its own
//! variants for the same keys, so the last registration wins.

pub mod connect;
pub mod logical;

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

use crate::dialect::{ColumnType, DatabaseDialect};
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::value::Value;

/// Renders the native column type for a field
pub type TypeNameFn = fn(&DatabaseDialect, &Schema, bool) -> String;
/// Converts a non-null payload value into a bound parameter
pub type BindFn = fn(&Schema, &JsonValue) -> Result<Value>;
/// Renders a schema default as a SQL literal
pub type DefaultFn = fn(&DatabaseDialect, &Schema, &JsonValue) -> Option<String>;

/// Placeholder binding used by most types
pub const PLAIN_BINDING: &str = "?";

/// Value-to-SQL mapping for one family of logical types
pub struct SqlType {
    /// Diagnostic name
    pub name: &'static str,
    /// Registry keys this type claims
    pub keys: &'static [&'static str],
    /// Native column type renderer
    pub native_type: TypeNameFn,
    /// SQL text around the placeholder, containing exactly one `?`
    pub binding: &'static str,
    /// Value binder
    pub binder: BindFn,
    /// Default literal renderer
    pub default_value: DefaultFn,
}

impl SqlType {
    /// Native column type for a field of this type
    pub fn type_name(&self, dialect: &DatabaseDialect, schema: &Schema, key: bool) -> String {
        (self.native_type)(dialect, schema, key)
    }

    /// SQL text for this type's placeholder
    #[inline]
    pub fn query_binding(&self) -> &'static str {
        self.binding
    }

    /// Convert a payload value into a bound parameter; JSON null binds as NULL
    pub fn bind(&self, schema: &Schema, value: &JsonValue) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        (self.binder)(schema, value)
    }

    /// Render a schema default as a SQL literal
    pub fn default_literal(
        &self,
        dialect: &DatabaseDialect,
        schema: &Schema,
        value: &JsonValue,
    ) -> Option<String> {
        if value.is_null() {
            return None;
        }
        (self.default_value)(dialect, schema, value)
    }
}

impl fmt::Debug for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlType")
            .field("name", &self.name)
            .field("keys", &self.keys)
            .field("binding", &self.binding)
            .finish()
    }
}

/// Registry of types by key
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<&'static str, &'static SqlType>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the engine-independent types
    pub fn with_generic_types() -> Self {
        let mut registry = Self::new();
        connect::register(&mut registry);
        logical::register(&mut registry);
        registry
    }

    /// Register a type under all of its keys, replacing earlier registrations
    pub fn register(&mut self, ty: &'static SqlType) {
        for key in ty.keys {
            if let Some(previous) = self.types.insert(*key, ty) {
                trace!(
                    key = %key,
                    replaced = previous.name,
                    by = ty.name,
                    "type registration overridden"
                );
            }
        }
    }

    /// Look up a type by key
    pub fn resolve(&self, key: &str) -> Result<&'static SqlType> {
        self.types
            .get(key)
            .copied()
            .ok_or_else(|| Error::unknown_type(key))
    }

    /// Look up the type for a schema: logical name, then propagated source
    /// column type, then Connect type name
    pub fn resolve_schema(&self, schema: &Schema) -> Result<&'static SqlType> {
        if let Some(ty) = schema.name.as_deref().and_then(|n| self.types.get(n)) {
            return Ok(*ty);
        }
        if let Some(ty) = schema
            .source_column_type()
            .and_then(|t| self.types.get(t.to_uppercase().as_str()))
        {
            return Ok(*ty);
        }
        self.resolve(schema.type_name())
    }

    /// Whether a key is registered
    pub fn contains(&self, key: &str) -> bool {
        self.types.contains_key(key)
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers for type implementations
// ---------------------------------------------------------------------------

pub(crate) fn unexpected(type_name: &str, value: &JsonValue, expected: &str) -> Error {
    Error::unsupported_value(
        type_name,
        format!("expected {}, got {}", expected, json_kind(value)),
    )
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

pub(crate) fn no_default(_: &DatabaseDialect, _: &Schema, _: &JsonValue) -> Option<String> {
    None
}

pub(crate) fn numeric_default(_: &DatabaseDialect, _: &Schema, value: &JsonValue) -> Option<String> {
    value.is_number().then(|| value.to_string())
}

pub(crate) fn string_default(
    dialect: &DatabaseDialect,
    _: &Schema,
    value: &JsonValue,
) -> Option<String> {
    value.as_str().map(|s| dialect.string_literal(s))
}

pub(crate) fn boolean_default(
    dialect: &DatabaseDialect,
    _: &Schema,
    value: &JsonValue,
) -> Option<String> {
    value
        .as_bool()
        .map(|b| dialect.boolean_literal(b).to_string())
}

pub(crate) fn bind_string(_: &Schema, value: &JsonValue) -> Result<Value> {
    match value {
        JsonValue::String(s) => Ok(Value::String(s.clone())),
        other => Err(unexpected("STRING", other, "string")),
    }
}

/// Bind any JSON value as its text; strings pass through unchanged
pub(crate) fn bind_json_text(_: &Schema, value: &JsonValue) -> Result<Value> {
    match value {
        JsonValue::String(s) => Ok(Value::String(s.clone())),
        other => Ok(Value::String(other.to_string())),
    }
}

/// `varchar(n)` bounded by the dialect's key limit for key columns, `text` otherwise
pub(crate) fn character_type(dialect: &DatabaseDialect, schema: &Schema, key: bool) -> String {
    let length = schema.source_column_length();
    let length = if key {
        match (length, dialect.max_varchar_length_in_key()) {
            (Some(len), Some(max)) => Some(len.min(max)),
            (len, max) => len.or(max),
        }
    } else {
        length
    };
    match length {
        Some(len) => dialect.native_type(ColumnType::Varchar(Some(len))),
        None => dialect.native_type(ColumnType::Text),
    }
}
