//! Destination engine versions and version-gated syntax

use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};

static VERSION_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?")
        .expect("version regex pattern is invalid - this is a bug")
});

/// Live version of the destination engine, ordered by (major, minor, patch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DatabaseVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl DatabaseVersion {
    /// Create a version
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether this version is the same as or newer than `major.minor.patch`
    #[inline]
    pub fn is_same_or_after(&self, major: u32, minor: u32, patch: u32) -> bool {
        *self >= Self::new(major, minor, patch)
    }

    /// Extract the first `major.minor[.patch]` from a server version string
    /// such as `8.0.34-log`, `10.11.6-MariaDB` or `PostgreSQL 15.3 on x86_64`.
    pub fn parse(text: &str) -> Result<Self> {
        let caps = VERSION_REGEX
            .captures(text)
            .ok_or_else(|| Error::config(format!("cannot parse engine version '{}'", text)))?;
        let part = |idx: usize| -> Result<u32> {
            caps.get(idx).map_or(Ok(0), |m| {
                m.as_str()
                    .parse()
                    .map_err(|_| Error::config(format!("version component out of range in '{}'", text)))
            })
        };
        Ok(Self::new(part(1)?, part(2)?, part(3)?))
    }
}

impl fmt::Display for DatabaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Upsert statement shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpsertSyntax {
    /// `INSERT ... ON CONFLICT (keys) DO UPDATE SET c=EXCLUDED.c`
    OnConflict,
    /// `INSERT ... AS new ON DUPLICATE KEY UPDATE c=new.c`
    DuplicateKeyRowAlias,
    /// `INSERT ... ON DUPLICATE KEY UPDATE c=VALUES(c)`
    DuplicateKeyValues,
    /// `MERGE INTO ... USING (SELECT ...) AS INCOMING ...`
    Merge,
}

/// A syntax available from a minimum engine version onwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedSyntax {
    /// First version supporting the syntax
    pub since: DatabaseVersion,
    /// The syntax
    pub syntax: UpsertSyntax,
}

impl VersionedSyntax {
    /// Create a table entry
    pub const fn new(since: DatabaseVersion, syntax: UpsertSyntax) -> Self {
        Self { since, syntax }
    }
}

/// Pick the newest syntax the version supports from a table ordered newest first
pub fn select_syntax(table: &[VersionedSyntax], version: DatabaseVersion) -> Option<UpsertSyntax> {
    table
        .iter()
        .find(|entry| version >= entry.since)
        .map(|entry| entry.syntax)
}
