//! Change events consumed by the sink
//!
//! A [`ChangeEvent`] is one row-level change: the record key, the current row
//! state (absent for deletes and tombstones), the optional prior state, and
//! source metadata used by table-name templates.

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};
use crate::schema::{Schema, SchemaKind};

/// Change operation carried by a Debezium envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Row inserted (`c`)
    Create,
    /// Row updated (`u`)
    Update,
    /// Row deleted (`d`)
    Delete,
    /// Snapshot read (`r`)
    Read,
    /// Table truncated (`t`)
    Truncate,
}

impl Operation {
    /// Parse a Debezium operation code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(Self::Create),
            "u" => Some(Self::Update),
            "d" => Some(Self::Delete),
            "r" => Some(Self::Read),
            "t" => Some(Self::Truncate),
            _ => None,
        }
    }
}

/// Schema plus data for a key or value
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Payload schema
    pub schema: Schema,
    /// Payload data (an object for struct schemas)
    pub data: JsonValue,
}

impl Payload {
    /// Create a payload
    pub fn new(schema: Schema, data: JsonValue) -> Self {
        Self { schema, data }
    }

    /// Get a struct field's value
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.data.as_object().and_then(|m| m.get(field))
    }
}

/// One row-level change event
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Originating topic (stream identity)
    pub topic: String,
    /// Record key
    pub key: Option<Payload>,
    /// Current row state; `None` for deletes and tombstones
    pub value: Option<Payload>,
    /// Row state before the change
    pub before: Option<JsonValue>,
    /// Source metadata (`db`, `schema`, `table`, ...)
    pub source: Option<Map<String, JsonValue>>,
    /// Operation, when known
    pub op: Option<Operation>,
}

#[derive(Debug, Deserialize)]
struct ConnectDocument {
    #[serde(default)]
    schema: Option<Schema>,
    #[serde(default)]
    payload: JsonValue,
}

impl ChangeEvent {
    /// Create an event with no key or value
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            value: None,
            before: None,
            source: None,
            op: None,
        }
    }

    /// Create a tombstone for the given key
    pub fn tombstone(topic: impl Into<String>, key_schema: Schema, key: JsonValue) -> Self {
        Self::new(topic).with_key(key_schema, key)
    }

    /// Set the key
    pub fn with_key(mut self, schema: Schema, data: JsonValue) -> Self {
        self.key = Some(Payload::new(schema, data));
        self
    }

    /// Set the current row state
    pub fn with_value(mut self, schema: Schema, data: JsonValue) -> Self {
        self.value = Some(Payload::new(schema, data));
        self
    }

    /// Set the source metadata
    pub fn with_source(mut self, source: Map<String, JsonValue>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the operation
    pub fn with_op(mut self, op: Operation) -> Self {
        self.op = Some(op);
        self
    }

    /// Whether the event carries no value
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Whether the event empties its whole table
    #[inline]
    pub fn is_truncate(&self) -> bool {
        self.op == Some(Operation::Truncate)
    }

    /// Whether the event removes its row; a truncate is never a row delete
    #[inline]
    pub fn is_delete(&self) -> bool {
        !self.is_truncate() && (self.is_tombstone() || self.op == Some(Operation::Delete))
    }

    /// Source metadata field rendered as text
    pub fn source_field(&self, name: &str) -> Option<String> {
        match self.source.as_ref()?.get(name)? {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Decode Kafka Connect JSON key/value documents.
    ///
    /// Each document has the shape `{"schema": ..., "payload": ...}`. A value
    /// wrapped in a Debezium envelope (`before`/`after`/`source`/`op`) is
    /// unwrapped; a missing or null value yields a tombstone.
    pub fn from_connect_json(
        topic: impl Into<String>,
        key: Option<&str>,
        value: Option<&str>,
    ) -> Result<Self> {
        let mut event = Self::new(topic);

        if let Some(doc) = parse_document(key, "key")? {
            if let Some(schema) = doc.schema {
                if !doc.payload.is_null() {
                    event.key = Some(Payload::new(schema, doc.payload));
                }
            }
        }

        let Some(doc) = parse_document(value, "value")? else {
            return Ok(event);
        };
        if doc.payload.is_null() {
            return Ok(event);
        }
        let schema = doc
            .schema
            .ok_or_else(|| Error::schema("value document has no schema"))?;

        if !is_envelope(&schema) {
            event.value = Some(Payload::new(schema, doc.payload));
            return Ok(event);
        }

        let JsonValue::Object(mut envelope) = doc.payload else {
            return Err(Error::schema("envelope payload is not an object"));
        };

        event.op = match envelope.get("op").and_then(JsonValue::as_str) {
            Some(code) => Some(
                Operation::from_code(code)
                    .ok_or_else(|| Error::schema(format!("unknown operation code '{}'", code)))?,
            ),
            None => None,
        };
        event.source = match envelope.remove("source") {
            Some(JsonValue::Object(source)) => Some(source),
            _ => None,
        };
        event.before = envelope.remove("before").filter(|v| !v.is_null());

        let after = envelope.remove("after").unwrap_or(JsonValue::Null);
        if event.op != Some(Operation::Delete) && !after.is_null() {
            let after_schema = schema
                .field("after")
                .map(|f| f.schema.clone())
                .ok_or_else(|| Error::schema("envelope schema has no 'after' field"))?;
            event.value = Some(Payload::new(after_schema, after));
        }

        Ok(event)
    }
}

fn parse_document(text: Option<&str>, what: &str) -> Result<Option<ConnectDocument>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty() && *t != "null") else {
        return Ok(None);
    };
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| Error::schema(format!("invalid {} document: {}", what, e)))
}

fn is_envelope(schema: &Schema) -> bool {
    schema.kind == SchemaKind::Struct
        && schema.field("after").is_some()
        && schema.field("op").is_some()
}
