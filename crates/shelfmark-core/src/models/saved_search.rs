//! Saved search model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::library::LibraryId;

/// A unique identifier for a saved search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SavedSearchId(Uuid);

impl SavedSearchId {
    /// Create a new unique saved search ID
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

impl Default for SavedSearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SavedSearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SavedSearchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A stored query scoped to a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSearch {
    /// Unique identifier
    pub id: SavedSearchId,
    /// Library this search belongs to
    pub library_id: LibraryId,
    /// Display name
    pub name: String,
    /// Query string
    pub query: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl SavedSearch {
    /// Create a new saved search in the given library
    #[must_use]
    pub fn new(
        library_id: LibraryId,
        name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            id: SavedSearchId::new(),
            library_id,
            name: name.into(),
            query: query.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_search_id_parse() {
        let id = SavedSearchId::new();
        let parsed: SavedSearchId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
