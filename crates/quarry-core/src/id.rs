//! Identifiers for catalog assets.
//!
//! Assets carry two identifiers:
//! - **Guid**: opaque, server-assigned at creation and stable for the asset's lifetime
//! - **Qualified name**: deterministic, derived from the parent scope plus the asset name
//!
//! # Example
//!
//! ```rust
//! use quarry_core::id::{Guid, QualifiedName};
//!
//! let guid = Guid::generate();
//! let parsed: Guid = guid.to_string().parse().unwrap();
//! assert_eq!(guid, parsed);
//!
//! let schema = QualifiedName::new("default/snowflake/warehouse/analytics/public").unwrap();
//! let table = schema.child("orders").unwrap();
//! assert_eq!(table.as_str(), "default/snowflake/warehouse/analytics/public/orders");
//! assert_eq!(table.parent(), Some(schema));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

/// Separator between qualified name segments.
pub const QUALIFIED_NAME_SEPARATOR: char = '/';

/// A server-assigned unique identifier for an asset.
///
/// Guids are ULIDs: sortable by creation time and unique without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Ulid);

impl Guid {
    /// Generates a new unique guid.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creates a guid from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("invalid guid '{s}': {e}")))
    }
}

/// A scope-qualified name, unique per asset type.
///
/// Segments are separated by `/`. A qualified name is never empty and never
/// contains empty segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName(String);

impl QualifiedName {
    /// Creates a qualified name after validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or has an empty segment.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidInput("qualified name cannot be empty".into()));
        }
        if value.split(QUALIFIED_NAME_SEPARATOR).any(str::is_empty) {
            return Err(Error::InvalidInput(format!(
                "qualified name '{value}' has an empty segment"
            )));
        }
        Ok(Self(value))
    }

    /// Builds a qualified name from individual segments.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is empty or itself contains a separator.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            validate_segment(segment)?;
            if !joined.is_empty() {
                joined.push(QUALIFIED_NAME_SEPARATOR);
            }
            joined.push_str(segment);
        }
        Self::new(joined)
    }

    /// Returns the qualified name of a child scoped under this one.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is empty or contains a separator.
    pub fn child(&self, name: &str) -> Result<Self> {
        validate_segment(name)?;
        Ok(Self(format!("{}{QUALIFIED_NAME_SEPARATOR}{name}", self.0)))
    }

    /// Returns the enclosing scope, if this name has more than one segment.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once(QUALIFIED_NAME_SEPARATOR)
            .map(|(parent, _)| Self(parent.to_string()))
    }

    /// Returns true if this name equals `scope` or lives underneath it.
    #[must_use]
    pub fn is_within(&self, scope: &str) -> bool {
        self.0 == scope
            || self
                .0
                .strip_prefix(scope)
                .is_some_and(|rest| rest.starts_with(QUALIFIED_NAME_SEPARATOR))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::InvalidInput("name segment cannot be empty".into()));
    }
    if segment.contains(QUALIFIED_NAME_SEPARATOR) {
        return Err(Error::InvalidInput(format!(
            "name segment '{segment}' cannot contain '{QUALIFIED_NAME_SEPARATOR}'"
        )));
    }
    Ok(())
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QualifiedName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.0
    }
}

impl AsRef<str> for QualifiedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_roundtrip() {
        let id = Guid::generate();
        let parsed: Guid = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn invalid_guid_returns_error() {
        let result: Result<Guid> = "not-a-valid-ulid".parse();
        assert!(result.is_err());
    }

    #[test]
    fn qualified_name_rejects_empty_segments() {
        assert!(QualifiedName::new("").is_err());
        assert!(QualifiedName::new("default//x").is_err());
        assert!(QualifiedName::new("default/x/").is_err());
    }

    #[test]
    fn child_rejects_separator() {
        let qn = QualifiedName::new("glossary/finance").unwrap();
        assert!(qn.child("a/b").is_err());
        assert!(qn.child("").is_err());
    }

    #[test]
    fn is_within_respects_segment_boundaries() {
        let qn = QualifiedName::new("default/pg/prod/sales").unwrap();
        assert!(qn.is_within("default/pg/prod"));
        assert!(qn.is_within("default/pg/prod/sales"));
        assert!(!qn.is_within("default/pg/pro"));
    }

    #[test]
    fn from_segments_joins() {
        let qn = QualifiedName::from_segments(["default", "pg", "prod"]).unwrap();
        assert_eq!(qn.as_str(), "default/pg/prod");
        assert_eq!(qn.parent().unwrap().as_str(), "default/pg");
    }

    #[test]
    fn deserialize_validates() {
        let bad: std::result::Result<QualifiedName, _> = serde_json::from_str("\"a//b\"");
        assert!(bad.is_err());
    }
}
