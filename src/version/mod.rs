// src/version/mod.rs

//! Version ordering for package descriptors
//!
//! The comparator is descending: the newest version sorts first. Ordering is
//! semver-aware with a plain-string fallback, and the parsed build timestamp
//! breaks remaining ties. These primitives are the only source of ordering
//! truth in the crate; every "latest" view is derived from them.

use crate::package::PackageInfo;
use chrono::{DateTime, NaiveDateTime};
use semver::Version;
use std::cmp::Ordering;

/// Marker suffix identifying snapshot builds
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Pattern for build timestamps (`yyyyMMdd-HHmm`)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M";

/// True when the version or file name denotes a snapshot build
pub fn is_snapshot(version_or_file_name: &str) -> bool {
    version_or_file_name.contains(SNAPSHOT_SUFFIX)
}

/// Parse a `yyyyMMdd-HHmm` build timestamp
///
/// Unparsable input maps to the epoch so it sorts behind every real build.
pub fn parse_build_timestamp(timestamp: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| DateTime::UNIX_EPOCH.naive_utc())
}

/// Compare two descriptors, descending: `Less` means `a` is newer
///
/// Both versions parsing as SemVer compare semantically; otherwise, or on a
/// semantic tie, the raw version strings compare lexicographically. The
/// build timestamp is the final tie-break.
pub fn compare(a: &PackageInfo, b: &PackageInfo) -> Ordering {
    ascending(a, b).reverse()
}

fn ascending(a: &PackageInfo, b: &PackageInfo) -> Ordering {
    let by_version = match (Version::parse(&a.version), Version::parse(&b.version)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb).then_with(|| a.version.cmp(&b.version)),
        _ => a.version.cmp(&b.version),
    };

    by_version.then_with(|| {
        parse_build_timestamp(&a.timestamp).cmp(&parse_build_timestamp(&b.timestamp))
    })
}

/// True when `a` ranks newer than `b`; anything is newer than nothing
pub fn is_newer(a: &PackageInfo, b: Option<&PackageInfo>) -> bool {
    match b {
        Some(b) => compare(a, b) == Ordering::Less,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(version: &str, timestamp: &str) -> PackageInfo {
        let mut info = PackageInfo::new("demo", version);
        info.timestamp = timestamp.to_string();
        info
    }

    #[test]
    fn test_is_snapshot() {
        assert!(is_snapshot("2.0.0-SNAPSHOT"));
        assert!(is_snapshot("demo-2.0.0-SNAPSHOT-20240101-0000.zip"));
        assert!(!is_snapshot("2.0.0"));
        assert!(!is_snapshot("2.0.0-rc.1"));
    }

    #[test]
    fn test_semver_ordering_descending() {
        let newer = info("1.10.0", "");
        let older = info("1.9.0", "");
        // Semantic, not lexicographic: 1.10.0 > 1.9.0
        assert_eq!(compare(&newer, &older), Ordering::Less);
        assert_eq!(compare(&older, &newer), Ordering::Greater);
    }

    #[test]
    fn test_string_fallback_when_not_semver() {
        let a = info("2024.1", "");
        let b = info("2024.2", "");
        assert_eq!(compare(&b, &a), Ordering::Less);
    }

    #[test]
    fn test_timestamp_breaks_ties() {
        let older = info("2.0.0-SNAPSHOT", "20240101-0000");
        let newer = info("2.0.0-SNAPSHOT", "20240102-0000");
        assert_eq!(compare(&newer, &older), Ordering::Less);
    }

    #[test]
    fn test_unparsable_timestamp_sorts_last() {
        let stamped = info("2.0.0-SNAPSHOT", "20240101-0000");
        let garbage = info("2.0.0-SNAPSHOT", "not-a-timestamp");
        assert_eq!(compare(&stamped, &garbage), Ordering::Less);
    }

    #[test]
    fn test_snapshot_precedes_release_of_same_version() {
        // SemVer prerelease ranks below the release it precedes
        let release = info("2.0.0", "");
        let snapshot = info("2.0.0-SNAPSHOT", "20240101-0000");
        assert_eq!(compare(&release, &snapshot), Ordering::Less);
    }

    #[test]
    fn test_equal_descriptors_tie() {
        let a = info("1.0.0", "20240101-0000");
        let b = info("1.0.0", "20240101-0000");
        assert_eq!(compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_is_newer_matches_compare() {
        let a = info("1.0.1", "");
        let b = info("1.0.0", "");
        assert!(is_newer(&a, Some(&b)));
        assert!(!is_newer(&b, Some(&a)));
        assert_eq!(is_newer(&a, Some(&b)), compare(&a, &b) == Ordering::Less);
    }

    #[test]
    fn test_is_newer_than_absent() {
        assert!(is_newer(&info("0.0.1", ""), None));
    }

    #[test]
    fn test_sort_is_deterministic() {
        let mut first = vec![
            info("1.0.0", ""),
            info("2.0.0-SNAPSHOT", "20240102-0000"),
            info("1.0.1", ""),
            info("2.0.0-SNAPSHOT", "20240101-0000"),
            info("not-semver", ""),
        ];
        let mut second = first.clone();
        second.reverse();

        first.sort_by(compare);
        second.sort_by(compare);
        assert_eq!(first, second);

        let keys: Vec<String> = first.iter().map(|i| i.version_key()).collect();
        assert_eq!(
            keys,
            vec![
                // Non-semver strings fall back to lexicographic comparison
                "not-semver",
                "2.0.0-SNAPSHOT-20240102-0000",
                "2.0.0-SNAPSHOT-20240101-0000",
                "1.0.1",
                "1.0.0",
            ]
        );
    }
}
