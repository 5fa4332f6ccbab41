//! Field-level merge of two versions of the same paper
//!
//! The merge is pure: it takes a local and a remote snapshot and produces
//! a merged paper plus a report of what happened. Persistence is the
//! caller's job.
//!
//! Scalar fields merge under last-writer-wins with per-field timestamps:
//! a field explicitly set on only one side comes from that side; a field
//! set on both sides goes to the strictly later writer, with ties kept
//! local; a field never explicitly set on either side stays local, which
//! protects values that predate timestamp tracking. Tags and collection
//! memberships merge by set union; a merge never removes anything.

use std::collections::BTreeSet;

use crate::models::{CollectionId, Paper, ScalarField};

/// Which side of a merge supplied a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSide {
    Local,
    Remote,
}

/// A field both sides had explicitly set to different values
///
/// The losing value is overwritten by the merge, so conflicts are
/// reported for recording rather than for blocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConflict {
    /// Field that conflicted
    pub field: ScalarField,
    /// Local side's stamp for the field (Unix us)
    pub local_ts: i64,
    /// Remote side's stamp for the field (Unix us)
    pub remote_ts: i64,
    /// Side whose value survived
    pub winner: MergeSide,
}

/// Outcome of merging a remote snapshot into a local paper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// The merged paper, keyed by the local paper's identity
    pub merged: Paper,
    /// Fields whose value changed to the remote side's
    pub fields_from_remote: Vec<ScalarField>,
    /// Fields both sides had set to different values
    pub conflicts: Vec<FieldConflict>,
}

/// Pure merge engine for papers
pub struct FieldMerger;

impl FieldMerger {
    /// Merge a remote snapshot into a local paper
    ///
    /// The merged paper keeps the local identity and creation instant;
    /// its timestamp map is the per-field maximum union of both sides.
    #[must_use]
    pub fn merge_papers(local: &Paper, remote: &Paper) -> MergeResult {
        let (mut merged, fields_from_remote, conflicts) =
            Self::merge_scalar_fields(local, remote);

        merged.field_timestamps = local
            .field_timestamps
            .merged_max(&remote.field_timestamps);
        merged.tags = Self::merge_tags(&local.tags, &remote.tags);
        merged.collections = Self::merge_collections(&local.collections, &remote.collections);
        merged.updated_at = local.updated_at.max(remote.updated_at);

        MergeResult {
            merged,
            fields_from_remote,
            conflicts,
        }
    }

    /// Per-field last-writer-wins over the scalar fields only
    ///
    /// Returns the merged paper (tags and collections still the local
    /// side's; the caller rebuilds the stamp union), the fields taken
    /// from the remote side, and the true conflicts.
    #[must_use]
    pub fn merge_scalar_fields(
        local: &Paper,
        remote: &Paper,
    ) -> (Paper, Vec<ScalarField>, Vec<FieldConflict>) {
        let mut merged = local.clone();
        let mut fields_from_remote = Vec::new();
        let mut conflicts = Vec::new();

        for field in ScalarField::ALL {
            let local_ts = local.field_timestamps.get(field.name());
            let remote_ts = remote.field_timestamps.get(field.name());
            let local_value = local.get_field(field);
            let remote_value = remote.get_field(field);
            let values_differ = local_value != remote_value;

            let remote_wins = match (local_ts, remote_ts) {
                (Some(l), Some(r)) => r > l,
                (None, Some(_)) => true,
                (Some(_) | None, None) => false,
            };

            if let (Some(l), Some(r)) = (local_ts, remote_ts) {
                if values_differ {
                    conflicts.push(FieldConflict {
                        field,
                        local_ts: l,
                        remote_ts: r,
                        winner: if r > l { MergeSide::Remote } else { MergeSide::Local },
                    });
                }
            }

            if remote_wins && values_differ {
                // The caller rebuilds the stamps from the full union, so
                // the instant passed here does not matter.
                merged.set_field_at(field, remote_value, remote_ts.unwrap_or_default());
                fields_from_remote.push(field);
            }
        }

        (merged, fields_from_remote, conflicts)
    }

    /// Union of two tag sets
    #[must_use]
    pub fn merge_tags(
        local: &BTreeSet<String>,
        remote: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        local.union(remote).cloned().collect()
    }

    /// Union of two collection membership sets
    #[must_use]
    pub fn merge_collections(
        local: &BTreeSet<CollectionId>,
        remote: &BTreeSet<CollectionId>,
    ) -> BTreeSet<CollectionId> {
        local.union(remote).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use pretty_assertions::assert_eq;

    fn paper(citekey: &str) -> Paper {
        let mut p = Paper::new(citekey);
        // Fixed stamp so tests control every instant explicitly.
        p.field_timestamps = crate::models::FieldTimestamps::new();
        p.field_timestamps.touch_at("citekey", 1);
        p
    }

    #[test]
    fn test_only_remote_stamped_takes_remote() {
        let local = paper("vaswani2017");
        let mut remote = local.clone();
        remote.set_field_at(
            ScalarField::Title,
            FieldValue::Text("Attention Is All You Need".to_string()),
            100,
        );

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(
            result.merged.title.as_deref(),
            Some("Attention Is All You Need")
        );
        assert_eq!(result.fields_from_remote, vec![ScalarField::Title]);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_only_local_stamped_keeps_local() {
        let mut local = paper("vaswani2017");
        local.set_field_at(ScalarField::Year, FieldValue::Integer(2017), 100);
        let remote = paper("vaswani2017");

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(result.merged.year, Some(2017));
        assert!(result.fields_from_remote.is_empty());
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_later_remote_wins_and_is_a_conflict() {
        let mut local = paper("vaswani2017");
        local.set_field_at(
            ScalarField::Title,
            FieldValue::Text("Old title".to_string()),
            100,
        );
        let mut remote = paper("vaswani2017");
        remote.set_field_at(
            ScalarField::Title,
            FieldValue::Text("New title".to_string()),
            200,
        );

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(result.merged.title.as_deref(), Some("New title"));
        assert_eq!(result.fields_from_remote, vec![ScalarField::Title]);
        assert_eq!(
            result.conflicts,
            vec![FieldConflict {
                field: ScalarField::Title,
                local_ts: 100,
                remote_ts: 200,
                winner: MergeSide::Remote,
            }]
        );
    }

    #[test]
    fn test_reversed_recency_reverses_winner() {
        let mut local = paper("vaswani2017");
        local.set_field_at(
            ScalarField::Title,
            FieldValue::Text("Old title".to_string()),
            200,
        );
        let mut remote = paper("vaswani2017");
        remote.set_field_at(
            ScalarField::Title,
            FieldValue::Text("New title".to_string()),
            100,
        );

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(result.merged.title.as_deref(), Some("Old title"));
        assert!(result.fields_from_remote.is_empty());
        assert_eq!(result.conflicts[0].winner, MergeSide::Local);
    }

    #[test]
    fn test_exact_tie_keeps_local() {
        let mut local = paper("vaswani2017");
        local.set_field_at(
            ScalarField::Title,
            FieldValue::Text("Local title".to_string()),
            150,
        );
        let mut remote = paper("vaswani2017");
        remote.set_field_at(
            ScalarField::Title,
            FieldValue::Text("Remote title".to_string()),
            150,
        );

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(result.merged.title.as_deref(), Some("Local title"));
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].winner, MergeSide::Local);
    }

    #[test]
    fn test_neither_stamped_keeps_local() {
        // Values that predate timestamp tracking: present but unstamped.
        let mut local = paper("vaswani2017");
        local.url = Some("https://local.example".to_string());
        let mut remote = paper("vaswani2017");
        remote.url = Some("https://remote.example".to_string());

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(result.merged.url.as_deref(), Some("https://local.example"));
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_equal_values_are_not_conflicts() {
        let mut local = paper("vaswani2017");
        local.set_field_at(ScalarField::Year, FieldValue::Integer(2017), 100);
        let mut remote = paper("vaswani2017");
        remote.set_field_at(ScalarField::Year, FieldValue::Integer(2017), 200);

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(result.merged.year, Some(2017));
        assert!(result.conflicts.is_empty());
        assert!(result.fields_from_remote.is_empty());
    }

    #[test]
    fn test_merge_is_deterministic() {
        let mut local = paper("vaswani2017");
        local.set_field_at(ScalarField::Year, FieldValue::Integer(2016), 100);
        local.add_tag("transformers");
        let mut remote = paper("vaswani2017");
        remote.set_field_at(ScalarField::Year, FieldValue::Integer(2017), 200);
        remote.add_tag("attention");

        let first = FieldMerger::merge_papers(&local, &remote);
        let second = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(first, second);
    }

    #[test]
    fn test_merged_timestamps_are_per_field_max() {
        let mut local = paper("vaswani2017");
        local.set_field_at(ScalarField::Year, FieldValue::Integer(2016), 300);
        let mut remote = paper("vaswani2017");
        remote.set_field_at(ScalarField::Year, FieldValue::Integer(2017), 200);
        remote.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/abc".to_string()),
            400,
        );

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(result.merged.field_timestamps.get("year"), Some(300));
        assert_eq!(result.merged.field_timestamps.get("doi"), Some(400));
    }

    #[test]
    fn test_tags_union_commutative() {
        let a: BTreeSet<String> = ["ml", "nlp"].iter().map(ToString::to_string).collect();
        let b: BTreeSet<String> = ["nlp", "vision"].iter().map(ToString::to_string).collect();

        let ab = FieldMerger::merge_tags(&a, &b);
        let ba = FieldMerger::merge_tags(&b, &a);
        assert_eq!(ab, ba);
        assert_eq!(ab.len(), 3);
    }

    #[test]
    fn test_collections_union_never_removes() {
        let c1 = CollectionId::new();
        let c2 = CollectionId::new();
        let c3 = CollectionId::new();
        let local: BTreeSet<_> = [c1, c2].into_iter().collect();
        let remote: BTreeSet<_> = [c2, c3].into_iter().collect();

        let merged = FieldMerger::merge_collections(&local, &remote);
        assert_eq!(merged.len(), 3);
        assert!(merged.contains(&c1));
        assert!(merged.contains(&c2));
        assert!(merged.contains(&c3));
    }

    #[test]
    fn test_merge_keeps_local_identity() {
        let local = paper("vaswani2017");
        let mut remote = Paper::new("vaswani2017");
        remote.field_timestamps = crate::models::FieldTimestamps::new();
        remote.field_timestamps.touch_at("citekey", 2);

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(result.merged.id, local.id);
        assert_eq!(result.merged.created_at, local.created_at);
    }

    #[test]
    fn test_disjoint_edits_both_survive() {
        // Device A set the year, device B set the DOI; both edits land.
        let mut local = paper("vaswani2017");
        local.set_field_at(ScalarField::Year, FieldValue::Integer(2017), 100);
        let mut remote = paper("vaswani2017");
        remote.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/abc".to_string()),
            110,
        );

        let result = FieldMerger::merge_papers(&local, &remote);
        assert_eq!(result.merged.year, Some(2017));
        assert_eq!(result.merged.doi.as_deref(), Some("10.1/abc"));
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_scalar_merge_leaves_sets_alone() {
        let mut local = paper("vaswani2017");
        local.add_tag("transformers");
        let mut remote = paper("vaswani2017");
        remote.add_tag("attention");
        remote.set_field_at(
            ScalarField::Title,
            FieldValue::Text("Attention Is All You Need".to_string()),
            100,
        );

        let (merged, fields_from_remote, conflicts) =
            FieldMerger::merge_scalar_fields(&local, &remote);
        assert_eq!(
            merged.title.as_deref(),
            Some("Attention Is All You Need")
        );
        assert_eq!(fields_from_remote, vec![ScalarField::Title]);
        assert!(conflicts.is_empty());
        // Tags stay the local side's; merge_papers unions them afterwards.
        assert_eq!(merged.tags, local.tags);
    }
}
