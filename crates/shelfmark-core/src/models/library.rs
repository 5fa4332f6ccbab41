//! Library model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryId(Uuid);

impl LibraryId {
    /// Create a new unique library ID
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

impl Default for LibraryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LibraryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A named grouping of papers, collections, and saved searches
///
/// Every installation bootstraps one library with the well-known
/// [`Library::DEFAULT_ID`]; deduplication treats that id as the preferred
/// survivor when duplicate libraries are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Unique identifier
    pub id: LibraryId,
    /// Library name (duplicate detection compares trimmed + case-folded)
    pub name: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// System libraries are managed by the app and never auto-merged
    pub is_system: bool,
    /// Local-only libraries never sync and are never auto-merged
    pub is_local_only: bool,
}

impl Library {
    /// Well-known identifier of the default library on every installation
    pub const DEFAULT_ID: LibraryId = LibraryId(Uuid::from_u128(1));

    /// Name given to the bootstrapped default library
    pub const DEFAULT_NAME: &'static str = "My Library";

    /// Create a new user library with the given name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LibraryId::new(),
            name: name.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
            is_system: false,
            is_local_only: false,
        }
    }

    /// The default library every installation starts with
    #[must_use]
    pub fn default_library() -> Self {
        Self {
            id: Self::DEFAULT_ID,
            name: Self::DEFAULT_NAME.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            is_system: false,
            is_local_only: false,
        }
    }

    /// True when deduplication may consider this library for merging
    #[must_use]
    pub const fn is_deduplicable(&self) -> bool {
        !self.is_system && !self.is_local_only
    }
}
