//! Collection model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::library::LibraryId;

/// A unique identifier for a collection
///
/// Ordered so collection memberships can live in sorted sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionId(Uuid);

impl CollectionId {
    /// Create a new unique collection ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CollectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A named group of papers inside a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Unique identifier
    pub id: CollectionId,
    /// Library this collection belongs to
    pub library_id: LibraryId,
    /// Collection name
    pub name: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Collection {
    /// Create a new collection in the given library
    #[must_use]
    pub fn new(library_id: LibraryId, name: impl Into<String>) -> Self {
        Self {
            id: CollectionId::new(),
            library_id,
            name: name.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
