//! Error types for rivven-sql-sink
//!
//! Every failure surfaced by the sink core is one of these variants. The
//! categories split them into:
//! - Retriable errors raised by the relational session (connection, timeout)
//! - Record-fatal errors (unknown type, unsupported value, missing key,
//!   incompatible schema) that belong to the caller's dead-letter policy

use std::fmt;
use thiserror::Error;

/// Result type for rivven-sql-sink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// No type registered for a logical schema type
    UnknownType,
    /// A runtime value could not be bound by its type
    UnsupportedValue,
    /// Key-required table received an empty key
    MissingKey,
    /// Destructive DDL would be required
    IncompatibleSchema,
    /// Table name could not be resolved from the event
    Naming,
    /// Schema-related errors (table not found, bad introspection data)
    Schema,
    /// Connection-related errors (retriable)
    Connection,
    /// Statement execution errors
    Query,
    /// Timeout errors (retriable)
    Timeout,
    /// Configuration error
    Configuration,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }

    /// Whether the failing record should be handed to a dead-letter policy
    #[inline]
    pub const fn is_record_fatal(self) -> bool {
        matches!(
            self,
            Self::UnknownType
                | Self::UnsupportedValue
                | Self::MissingKey
                | Self::IncompatibleSchema
                | Self::Naming
        )
    }
}

/// Main error type for rivven-sql-sink
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// No type claims the logical type name
    #[error("unknown type: no type registered for '{key}'")]
    UnknownType { key: String },

    /// Value shape does not match what the type can bind
    #[error("unsupported value for type {type_name}: {message}")]
    UnsupportedValue { type_name: String, message: String },

    /// Empty key for a table that requires one
    #[error("missing key: table {table} requires a primary key but the record key is empty")]
    MissingKey { table: String },

    /// Existing column cannot hold the incoming field without destructive DDL
    #[error("incompatible schema for table {table}: {message}")]
    IncompatibleSchema { table: String, message: String },

    /// Table name template could not be resolved
    #[error("naming error: {message}")]
    Naming { message: String },

    /// Schema error (bad introspection data, unexpected shape)
    #[error("schema error: {message}")]
    Schema { message: String },

    /// Table not found and table creation is disabled
    #[error("table not found: {table}")]
    TableNotFound { table: String },

    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Statement execution failed
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Unsupported operation for this engine or engine version
    #[error("unsupported: {message}")]
    Unsupported { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownType { .. } => ErrorCategory::UnknownType,
            Self::UnsupportedValue { .. } => ErrorCategory::UnsupportedValue,
            Self::MissingKey { .. } => ErrorCategory::MissingKey,
            Self::IncompatibleSchema { .. } => ErrorCategory::IncompatibleSchema,
            Self::Naming { .. } => ErrorCategory::Naming,
            Self::Schema { .. } | Self::TableNotFound { .. } => ErrorCategory::Schema,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Unsupported { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Create an unknown type error
    pub fn unknown_type(key: impl Into<String>) -> Self {
        Self::UnknownType { key: key.into() }
    }

    /// Create an unsupported value error
    pub fn unsupported_value(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a missing key error
    pub fn missing_key(table: impl Into<String>) -> Self {
        Self::MissingKey {
            table: table.into(),
        }
    }

    /// Create an incompatible schema error
    pub fn incompatible_schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IncompatibleSchema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a naming error
    pub fn naming(message: impl Into<String>) -> Self {
        Self::Naming {
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a table-not-found error
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create a query error with SQL
    pub fn query_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType => write!(f, "unknown_type"),
            Self::UnsupportedValue => write!(f, "unsupported_value"),
            Self::MissingKey => write!(f, "missing_key"),
            Self::IncompatibleSchema => write!(f, "incompatible_schema"),
            Self::Naming => write!(f, "naming"),
            Self::Schema => write!(f, "schema"),
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::Timeout => write!(f, "timeout"),
            Self::Configuration => write!(f, "configuration"),
            Self::Other => write!(f, "other"),
        }
    }
}
