//! Guards for text interpolated into generated SQL.
//!
//! Values always travel as bound parameters. Identifiers and catalog lookups
//! cannot, so they pass through here:
//! - unquoted identifiers must not contain anything that ends the identifier
//! - string literals in catalog queries are escaped

use crate::error::{Error, Result};

/// Maximum identifier length accepted by any supported engine
const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Validate an identifier that is written into SQL without quoting.
///
/// Letters, digits, `_` and `$` are accepted, including non-ASCII letters
/// produced by unicode-preserving naming. Anything that could terminate the
/// identifier (whitespace, quotes, `;`, comment markers, parentheses, commas,
/// dots) is rejected.
///
/// # Examples
///
/// ```
/// use rivven_sql_sink::security::validate_unquoted_identifier;
///
/// assert!(validate_unquoted_identifier("customers").is_ok());
/// assert!(validate_unquoted_identifier("CAR$BRAND").is_ok());
///
/// assert!(validate_unquoted_identifier("x; DROP TABLE users--").is_err());
/// assert!(validate_unquoted_identifier("").is_err());
/// ```
pub fn validate_unquoted_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::naming("identifier cannot be empty"));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(Error::naming(format!(
            "identifier too long: {} chars (max {})",
            name.chars().count(),
            MAX_IDENTIFIER_LENGTH
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
    {
        return Err(Error::naming(format!(
            "identifier '{}' contains '{}' and must be quoted (enable quote_identifiers)",
            name,
            c.escape_default()
        )));
    }

    Ok(())
}

/// Escape a string for a single-quoted SQL literal by doubling `'`.
///
/// Used for catalog queries (`table_exists_sql`, `list_columns_sql`) that are
/// returned as complete SQL text.
///
/// ```
/// use rivven_sql_sink::security::escape_string_literal;
///
/// assert_eq!(escape_string_literal("orders"), "orders");
/// assert_eq!(escape_string_literal("o'rders"), "o''rders");
/// ```
pub fn escape_string_literal(value: &str) -> String {
    if !value.contains('\'') {
        return value.to_string();
    }
    value.replace('\'', "''")
}
