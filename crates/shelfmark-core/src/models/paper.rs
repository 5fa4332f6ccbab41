//! Paper model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::collection::CollectionId;
use super::field_timestamps::FieldTimestamps;
use crate::util::{unix_timestamp_ms, unix_timestamp_us};

/// A unique identifier for a paper, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaperId(Uuid);

impl PaperId {
    /// Create a new unique paper ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }

    /// First four hex characters of the ID, used for citekey disambiguation
    #[must_use]
    pub fn short_suffix(&self) -> String {
        self.0.simple().to_string().chars().take(4).collect()
    }
}

impl Default for PaperId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PaperId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The merge-relevant scalar fields of a paper
///
/// Tags and collection memberships are set-valued and merge by union;
/// everything listed here merges field-by-field under last-writer-wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarField {
    Citekey,
    Title,
    Year,
    Abstract,
    Doi,
    ArxivId,
    Url,
    Read,
    CitationCount,
}

impl ScalarField {
    /// Every scalar field, in a fixed order
    pub const ALL: [Self; 9] = [
        Self::Citekey,
        Self::Title,
        Self::Year,
        Self::Abstract,
        Self::Doi,
        Self::ArxivId,
        Self::Url,
        Self::Read,
        Self::CitationCount,
    ];

    /// Canonical field name, used as the timestamp map key
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Citekey => "citekey",
            Self::Title => "title",
            Self::Year => "year",
            Self::Abstract => "abstract",
            Self::Doi => "doi",
            Self::ArxivId => "arxiv_id",
            Self::Url => "url",
            Self::Read => "read",
            Self::CitationCount => "citation_count",
        }
    }
}

impl fmt::Display for ScalarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed value of a single scalar field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Boolean(bool),
}

/// A bibliographic entry
///
/// Scalar fields carry per-field modification timestamps (see
/// [`FieldTimestamps`]); tags and collection memberships are plain sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    /// Unique identifier
    pub id: PaperId,
    /// Human-chosen citation key, unique across the corpus
    pub citekey: String,
    /// Title
    pub title: Option<String>,
    /// Publication year
    pub year: Option<i64>,
    /// Abstract text
    pub abstract_text: Option<String>,
    /// DOI, stored as written (compared case-insensitively)
    pub doi: Option<String>,
    /// arXiv identifier, stored as written (compared version-insensitively)
    pub arxiv_id: Option<String>,
    /// Source URL
    pub url: Option<String>,
    /// Read marker
    pub read: bool,
    /// Citation count
    pub citation_count: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Per-field last-modification instants
    pub field_timestamps: FieldTimestamps,
    /// Tag names (stored in lowercase)
    pub tags: BTreeSet<String>,
    /// Collections this paper belongs to
    pub collections: BTreeSet<CollectionId>,
}

impl Paper {
    /// Create a new paper with the given citekey
    ///
    /// The citekey counts as an explicit edit and is stamped; every other
    /// field starts unstamped.
    #[must_use]
    pub fn new(citekey: impl Into<String>) -> Self {
        let now_ms = unix_timestamp_ms();
        let mut field_timestamps = FieldTimestamps::new();
        field_timestamps.touch_at(ScalarField::Citekey.name(), unix_timestamp_us());
        Self {
            id: PaperId::new(),
            citekey: citekey.into(),
            title: None,
            year: None,
            abstract_text: None,
            doi: None,
            arxiv_id: None,
            url: None,
            read: false,
            citation_count: 0,
            created_at: now_ms,
            updated_at: now_ms,
            is_deleted: false,
            field_timestamps,
            tags: BTreeSet::new(),
            collections: BTreeSet::new(),
        }
    }

    /// Current value of a scalar field
    #[must_use]
    pub fn get_field(&self, field: ScalarField) -> FieldValue {
        match field {
            ScalarField::Citekey => FieldValue::Text(self.citekey.clone()),
            ScalarField::Title => self.title.clone().map_or(FieldValue::Null, FieldValue::Text),
            ScalarField::Year => self.year.map_or(FieldValue::Null, FieldValue::Integer),
            ScalarField::Abstract => self
                .abstract_text
                .clone()
                .map_or(FieldValue::Null, FieldValue::Text),
            ScalarField::Doi => self.doi.clone().map_or(FieldValue::Null, FieldValue::Text),
            ScalarField::ArxivId => self
                .arxiv_id
                .clone()
                .map_or(FieldValue::Null, FieldValue::Text),
            ScalarField::Url => self.url.clone().map_or(FieldValue::Null, FieldValue::Text),
            ScalarField::Read => FieldValue::Boolean(self.read),
            ScalarField::CitationCount => FieldValue::Integer(self.citation_count),
        }
    }

    /// Set a scalar field and stamp it with the current instant
    pub fn set_field(&mut self, field: ScalarField, value: FieldValue) {
        self.set_field_at(field, value, unix_timestamp_us());
    }

    /// Set a scalar field and stamp it with an explicit instant (Unix us)
    ///
    /// A value whose type does not fit the field is ignored (no value
    /// change, no stamp), which keeps merging total over arbitrary input.
    pub fn set_field_at(&mut self, field: ScalarField, value: FieldValue, at_us: i64) {
        match (field, value) {
            (ScalarField::Citekey, FieldValue::Text(v)) => self.citekey = v,
            (ScalarField::Title, FieldValue::Text(v)) => self.title = Some(v),
            (ScalarField::Title, FieldValue::Null) => self.title = None,
            (ScalarField::Year, FieldValue::Integer(v)) => self.year = Some(v),
            (ScalarField::Year, FieldValue::Null) => self.year = None,
            (ScalarField::Abstract, FieldValue::Text(v)) => self.abstract_text = Some(v),
            (ScalarField::Abstract, FieldValue::Null) => self.abstract_text = None,
            (ScalarField::Doi, FieldValue::Text(v)) => self.doi = Some(v),
            (ScalarField::Doi, FieldValue::Null) => self.doi = None,
            (ScalarField::ArxivId, FieldValue::Text(v)) => self.arxiv_id = Some(v),
            (ScalarField::ArxivId, FieldValue::Null) => self.arxiv_id = None,
            (ScalarField::Url, FieldValue::Text(v)) => self.url = Some(v),
            (ScalarField::Url, FieldValue::Null) => self.url = None,
            (ScalarField::Read, FieldValue::Boolean(v)) => self.read = v,
            (ScalarField::CitationCount, FieldValue::Integer(v)) => self.citation_count = v,
            _ => return,
        }
        self.field_timestamps.touch_at(field.name(), at_us);
        self.updated_at = self.updated_at.max(at_us / 1000);
    }

    /// Add a tag, normalized to lowercase
    ///
    /// Empty names are ignored.
    pub fn add_tag(&mut self, name: impl Into<String>) {
        let name = name.into().trim().to_lowercase();
        if !name.is_empty() {
            self.tags.insert(name);
        }
    }

    /// Add this paper to a collection
    pub fn add_to_collection(&mut self, collection: CollectionId) {
        self.collections.insert(collection);
    }
}
