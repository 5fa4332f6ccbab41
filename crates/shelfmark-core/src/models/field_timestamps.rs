//! Per-field modification timestamps
//!
//! Each paper carries a map from field name to the instant that field was
//! last explicitly set. The map is what makes field-level last-writer-wins
//! merging possible: two devices can edit different fields of the same
//! paper and both edits survive reconciliation.
//!
//! Instants are Unix microseconds. Millisecond precision is not enough:
//! a merge followed by a local edit can land in the same millisecond, and
//! the serialized form must preserve which one came second.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::util::unix_timestamp_us;

/// Ordered map from field name to last-modification instant (Unix us).
///
/// Fields absent from the map have never been explicitly set. Empty field
/// names are ignored rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldTimestamps(BTreeMap<String, i64>);

impl FieldTimestamps {
    /// Create an empty timestamp map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-modification instant for `field`, or `None` if never set
    #[must_use]
    pub fn get(&self, field: &str) -> Option<i64> {
        self.0.get(field).copied()
    }

    /// Stamp `field` with the current instant
    pub fn touch(&mut self, field: &str) {
        self.touch_at(field, unix_timestamp_us());
    }

    /// Stamp `field` with an explicit instant (Unix us)
    ///
    /// The instant is supplied by the caller so the clock source stays
    /// swappable. Empty field names are ignored.
    pub fn touch_at(&mut self, field: &str, at_us: i64) {
        if field.is_empty() {
            return;
        }
        self.0.insert(field.to_string(), at_us);
    }

    /// Stamp every given field with the same instant
    pub fn touch_all_at<I, S>(&mut self, fields: I, at_us: i64)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in fields {
            self.touch_at(field.as_ref(), at_us);
        }
    }

    /// Per-field maximum union of two timestamp maps
    ///
    /// This is the timestamp map a merged paper carries: for every field
    /// stamped on either side, the later of the two instants.
    #[must_use]
    pub fn merged_max(&self, other: &Self) -> Self {
        let mut merged = self.0.clone();
        for (field, &ts) in &other.0 {
            merged
                .entry(field.clone())
                .and_modify(|existing| *existing = (*existing).max(ts))
                .or_insert(ts);
        }
        Self(merged)
    }

    /// Iterate over `(field, instant)` pairs in field-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// True when no field has ever been stamped
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of stamped fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Serialize to the JSON object form stored in the database
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Parse the stored JSON form, degrading to empty on malformed data
    ///
    /// A paper with an unreadable timestamp map is still a valid paper;
    /// it just loses field-level precision (every field reads as "never
    /// explicitly set", so local values win the next merge).
    #[must_use]
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<BTreeMap<String, i64>>(json) {
            Ok(map) => Self(map),
            Err(e) => {
                tracing::warn!("Malformed field timestamp payload, treating as empty: {e}");
                Self::default()
            }
        }
    }
}
