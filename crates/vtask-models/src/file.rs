//! Stored-file references.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a stored file.
///
/// Every job that produces an artifact allocates a fresh id with [`StoredFileId::new`];
/// existing ids are never written to again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct StoredFileId(pub String);

impl StoredFileId {
    /// Generate a new random file ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is usable as a lookup key.
    pub fn is_well_formed(&self) -> bool {
        let s = self.0.trim();
        !s.is_empty() && s.len() <= 128 && !s.contains(['/', '\\', ' '])
    }
}

impl Default for StoredFileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoredFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StoredFileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StoredFileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        assert_ne!(StoredFileId::new(), StoredFileId::new());
    }

    #[test]
    fn well_formed_rejects_path_like_ids() {
        assert!(StoredFileId::new().is_well_formed());
        assert!(!StoredFileId::from("").is_well_formed());
        assert!(!StoredFileId::from("../etc/passwd").is_well_formed());
        assert!(!StoredFileId::from("a b").is_well_formed());
    }

    #[test]
    fn serializes_transparently() {
        let id = StoredFileId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
