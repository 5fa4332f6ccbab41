//! Shared utility functions used across multiple modules.

use regex::Regex;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Normalize a library name for duplicate comparison.
///
/// Trims surrounding whitespace and case-folds, so `" My Library "` and
/// `"my library"` compare equal. Interior whitespace is preserved.
#[must_use]
pub fn normalize_library_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalize a DOI for comparison.
///
/// DOIs are case-insensitive per the Crossref display guidelines, so
/// comparisons use the trimmed, lowercased form.
#[must_use]
pub fn normalize_doi(doi: &str) -> String {
    doi.trim().to_lowercase()
}

/// Strip a trailing arXiv version suffix (`v1`, `v2`, ...) from an id.
///
/// `2301.01234v2` and `2301.01234` refer to the same paper. Old-style ids
/// (`math/0211159v1`) are handled the same way. Ids without a version
/// suffix are returned trimmed and lowercased.
#[must_use]
pub fn strip_arxiv_version(id: &str) -> String {
    let id = id.trim().to_lowercase();
    let re = Regex::new(r"v\d+$").expect("Invalid regex");
    re.replace(&id, "").into_owned()
}

/// Current Unix timestamp in milliseconds.
#[must_use]
pub fn unix_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current Unix timestamp in microseconds.
///
/// Field timestamps carry microsecond precision so that two edits within
/// the same millisecond still order deterministically.
#[must_use]
pub fn unix_timestamp_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" 10.1000/xyz123 ".to_string())),
            Some("10.1000/xyz123".to_string())
        );
    }

    #[test]
    fn normalize_library_name_folds_case_and_trims() {
        assert_eq!(normalize_library_name("  My Library "), "my library");
        assert_eq!(normalize_library_name("MY LIBRARY"), "my library");
        assert_ne!(normalize_library_name("My  Library"), "my library");
    }

    #[test]
    fn normalize_doi_is_case_insensitive() {
        assert_eq!(
            normalize_doi("10.1000/XYZ123"),
            normalize_doi(" 10.1000/xyz123 ")
        );
    }

    #[test]
    fn strip_arxiv_version_removes_suffix() {
        assert_eq!(strip_arxiv_version("2301.01234v2"), "2301.01234");
        assert_eq!(strip_arxiv_version("2301.01234"), "2301.01234");
        assert_eq!(strip_arxiv_version("math/0211159v12"), "math/0211159");
    }

    #[test]
    fn strip_arxiv_version_keeps_interior_v() {
        // Only a trailing version marker is stripped.
        assert_eq!(strip_arxiv_version("cs.cv/9901001"), "cs.cv/9901001");
    }

    #[test]
    fn timestamps_are_monotonic_enough() {
        let ms = unix_timestamp_ms();
        let us = unix_timestamp_us();
        assert!(ms > 0);
        assert!(us / 1000 >= ms - 1);
    }
}
