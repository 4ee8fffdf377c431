//! Table and column naming strategies
//!
//! Table names come from a format template resolved against the event:
//!
//! | Placeholder | Replaced with |
//! |-------------|---------------|
//! | `${topic}` | Topic name with `.` replaced by `_` |
//! | `${source.<field>}` | Field of the event's source metadata |
//!
//! A template referencing `${source.*}` resolves to no table for a tombstone
//! without source metadata; a missing source field is a naming error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::event::ChangeEvent;

/// Pre-compiled regex for template placeholders
static PLACEHOLDER_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([^}]*)\}").expect("placeholder regex pattern is invalid - this is a bug")
});

/// Pre-compiled regex for `_uXXXX` escapes
static UNICODE_ESCAPE_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"_u([0-9a-fA-F]{4})")
        .expect("unicode escape regex pattern is invalid - this is a bug")
});

const TOPIC_PLACEHOLDER: &str = "topic";
const SOURCE_PREFIX: &str = "source.";

/// Resolves the destination table name for an event
pub trait TableNamingStrategy: Send + Sync + fmt::Debug {
    /// Resolve the table name; `Ok(None)` when the event maps to no table
    fn resolve_table_name(&self, format: &str, event: &ChangeEvent) -> Result<Option<String>>;
}

/// Resolves the destination column name for a field
pub trait ColumnNamingStrategy: Send + Sync + fmt::Debug {
    /// Resolve the column name
    fn resolve_column_name(&self, field_name: &str) -> String;
}

/// Built-in table naming strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableNaming {
    /// Template result as-is
    #[default]
    Default,
    /// Template result lowercased
    Lowercase,
    /// Template result uppercased
    Uppercase,
    /// Template result with `_uXXXX` escapes reverted
    Unicode,
}

impl TableNamingStrategy for TableNaming {
    fn resolve_table_name(&self, format: &str, event: &ChangeEvent) -> Result<Option<String>> {
        let Some(table) = resolve_table_name_format(format, event)? else {
            return Ok(None);
        };
        Ok(Some(match self {
            Self::Default => table,
            Self::Lowercase => table.to_lowercase(),
            Self::Uppercase => table.to_uppercase(),
            Self::Unicode => revert_unicode(&table),
        }))
    }
}

/// Built-in column naming strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnNaming {
    /// Field name as-is
    #[default]
    Default,
    /// Field name lowercased
    Lowercase,
    /// Field name uppercased
    Uppercase,
    /// Field name with `_uXXXX` escapes reverted
    Unicode,
}

impl ColumnNamingStrategy for ColumnNaming {
    fn resolve_column_name(&self, field_name: &str) -> String {
        match self {
            Self::Default => field_name.to_string(),
            Self::Lowercase => field_name.to_lowercase(),
            Self::Uppercase => field_name.to_uppercase(),
            Self::Unicode => revert_unicode(field_name),
        }
    }
}

/// Substitute `${topic}` and `${source.<field>}` placeholders in a table name format
pub fn resolve_table_name_format(format: &str, event: &ChangeEvent) -> Result<Option<String>> {
    let mut resolved = String::with_capacity(format.len() + event.topic.len());
    let mut last = 0;

    for caps in PLACEHOLDER_REGEX.captures_iter(format) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        resolved.push_str(&format[last..whole.start()]);
        last = whole.end();

        let placeholder = name.as_str();
        if placeholder == TOPIC_PLACEHOLDER {
            resolved.push_str(&event.topic.replace('.', "_"));
        } else if let Some(field) = placeholder.strip_prefix(SOURCE_PREFIX) {
            if event.source.is_none() {
                if event.is_tombstone() {
                    return Ok(None);
                }
                return Err(Error::naming(format!(
                    "table name format '{}' references source field '{}' but the event has no source metadata",
                    format, field
                )));
            }
            let value = event.source_field(field).ok_or_else(|| {
                Error::naming(format!(
                    "source field '{}' referenced by table name format '{}' is not present",
                    field, format
                ))
            })?;
            resolved.push_str(&value);
        } else {
            return Err(Error::naming(format!(
                "unknown placeholder '${{{}}}' in table name format '{}'",
                placeholder, format
            )));
        }
    }

    resolved.push_str(&format[last..]);
    Ok(Some(resolved))
}

/// Validate that a table name format only uses known placeholders
pub fn validate_table_name_format(format: &str) -> Result<()> {
    if format.trim().is_empty() {
        return Err(Error::config("table name format cannot be empty"));
    }
    for caps in PLACEHOLDER_REGEX.captures_iter(format) {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let valid = name == TOPIC_PLACEHOLDER
            || name
                .strip_prefix(SOURCE_PREFIX)
                .is_some_and(|field| !field.is_empty());
        if !valid {
            return Err(Error::config(format!(
                "invalid placeholder '${{{}}}' in table name format '{}'",
                name, format
            )));
        }
    }
    Ok(())
}

/// Revert `_uXXXX` escapes to the characters they encode
pub fn revert_unicode(name: &str) -> String {
    UNICODE_ESCAPE_REGEX
        .replace_all(name, |caps: &regex::Captures<'_>| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
