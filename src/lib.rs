//! # gitsocial — social interactions over plain git
//!
//! Posts, comments, reposts and curated lists encoded as commits; peers
//! exchange content through ordinary git fetch/push. This library crate
//! exposes the pure core primitives (repository identity, date ranges);
//! the full engine (codec, stores, fetch coordination, broker) lives in
//! the binary crate.

pub mod protocol;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

// ─── Repository identity ─────────────────────────────────────────────

/// Normalize a repository URL into its canonical identity form.
///
/// Lowercases the protocol, strips a trailing `.git` and trailing slash,
/// and rewrites SSH remotes (`git@host:path` and `ssh://git@host/path`)
/// to HTTPS. Two URLs naming the same repository normalize equal.
///
/// # Examples
///
/// ```
/// use gitsocial::normalize_url;
///
/// assert_eq!(
///     normalize_url("git@github.com:alice/diary.git"),
///     "https://github.com/alice/diary"
/// );
/// assert_eq!(
///     normalize_url("HTTPS://github.com/alice/diary/"),
///     "https://github.com/alice/diary"
/// );
/// ```
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();

    // scp-like SSH syntax: git@host:path
    let mut normalized = if let Some(rest) = url.strip_prefix("git@") {
        match rest.split_once(':') {
            Some((host, path)) => format!("https://{}/{}", host, path.trim_start_matches('/')),
            None => format!("https://{}", rest),
        }
    } else if let Some((proto, rest)) = url.split_once("://") {
        let proto = proto.to_lowercase();
        if proto == "ssh" {
            let rest = rest.strip_prefix("git@").unwrap_or(rest);
            format!("https://{}", rest)
        } else {
            format!("{}://{}", proto, rest)
        }
    } else {
        url.to_string()
    };

    loop {
        while normalized.ends_with('/') {
            normalized.pop();
        }
        match normalized.strip_suffix(".git") {
            Some(stripped) => normalized = stripped.to_string(),
            None => break,
        }
    }
    normalized
}

/// Directory slug for an isolated clone, derived from the normalized URL:
/// protocol stripped, path separators become `-`, everything that is not
/// alphanumeric or `-` is removed.
///
/// # Examples
///
/// ```
/// use gitsocial::repo_slug;
///
/// assert_eq!(repo_slug("https://github.com/alice/diary"), "githubcom-alice-diary");
/// ```
pub fn repo_slug(url: &str) -> String {
    let normalized = normalize_url(url);
    let without_proto = normalized
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&normalized);

    without_proto
        .chars()
        .map(|c| if c == '/' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Compose a branched repository identifier: `<url>#branch:<branch>`.
pub fn branched_identity(url: &str, branch: &str) -> String {
    format!("{}#branch:{}", normalize_url(url), branch)
}

/// Split a repository identifier into `(url, branch)`. The branch part is
/// `None` when the identifier carries no `#branch:` suffix.
///
/// # Examples
///
/// ```
/// use gitsocial::split_identity;
///
/// let (url, branch) = split_identity("https://github.com/a/b#branch:main");
/// assert_eq!(url, "https://github.com/a/b");
/// assert_eq!(branch.as_deref(), Some("main"));
/// ```
pub fn split_identity(identity: &str) -> (String, Option<String>) {
    match identity.split_once("#branch:") {
        Some((url, branch)) => (url.to_string(), Some(branch.to_string())),
        None => (identity.to_string(), None),
    }
}

// ─── Date ranges ─────────────────────────────────────────────────────

/// A closed day interval. Serializes as `{"start":"YYYY-MM-DD","end":"YYYY-MM-DD"}`,
/// the on-disk shape of `gitsocial.fetchedranges`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// True when the two ranges overlap or are adjacent (gap of zero days).
    /// Adjacent ranges coalesce: `[..,14]` touches `[15,..]`.
    pub fn touches(&self, other: &DateRange) -> bool {
        let left_end = self.end.checked_add_days(Days::new(1)).unwrap_or(self.end);
        let right_end = other.end.checked_add_days(Days::new(1)).unwrap_or(other.end);
        self.start <= right_end && other.start <= left_end
    }

    pub fn merge(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Union a range into an existing set, coalescing touching/overlapping
/// intervals. The set stays sorted by start date and disjoint.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use gitsocial::{add_range, DateRange};
///
/// let d = |s: &str| s.parse::<NaiveDate>().unwrap();
/// let mut ranges = vec![DateRange::new(d("2024-01-10"), d("2024-01-15"))];
/// add_range(&mut ranges, DateRange::new(d("2024-01-14"), d("2024-01-20")));
/// assert_eq!(ranges, vec![DateRange::new(d("2024-01-10"), d("2024-01-20"))]);
/// ```
pub fn add_range(ranges: &mut Vec<DateRange>, new: DateRange) {
    let mut merged = new;
    let mut kept: Vec<DateRange> = Vec::with_capacity(ranges.len() + 1);

    for range in ranges.drain(..) {
        if range.touches(&merged) {
            merged = merged.merge(&range);
        } else {
            kept.push(range);
        }
    }

    kept.push(merged);
    kept.sort_by_key(|r| r.start);
    *ranges = kept;
}

/// True iff `date` lies inside the union of `ranges`.
pub fn ranges_cover(ranges: &[DateRange], date: NaiveDate) -> bool {
    ranges.iter().any(|r| r.contains(date))
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod lib_tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalize_scp_ssh() {
        assert_eq!(
            normalize_url("git@gitlab.com:team/project.git"),
            "https://gitlab.com/team/project"
        );
    }

    #[test]
    fn test_normalize_ssh_scheme() {
        assert_eq!(
            normalize_url("ssh://git@github.com/alice/diary.git"),
            "https://github.com/alice/diary"
        );
    }

    #[test]
    fn test_normalize_protocol_lowercased() {
        assert_eq!(
            normalize_url("HTTP://example.com/repo"),
            "http://example.com/repo"
        );
    }

    #[test]
    fn test_normalize_strips_git_suffix_and_slash() {
        assert_eq!(
            normalize_url("https://github.com/a/b.git/"),
            "https://github.com/a/b"
        );
    }

    #[test]
    fn test_normalize_plain_path_untouched() {
        assert_eq!(normalize_url("/home/alice/repos/diary"), "/home/alice/repos/diary");
    }

    #[test]
    fn test_repo_slug_drops_protocol_and_dots() {
        assert_eq!(repo_slug("https://github.com/alice/diary"), "githubcom-alice-diary");
    }

    #[test]
    fn test_repo_slug_equal_for_equivalent_urls() {
        assert_eq!(
            repo_slug("git@github.com:alice/diary.git"),
            repo_slug("https://github.com/alice/diary")
        );
    }

    #[test]
    fn test_branched_identity_roundtrip() {
        let id = branched_identity("https://github.com/a/b", "main");
        assert_eq!(id, "https://github.com/a/b#branch:main");
        let (url, branch) = split_identity(&id);
        assert_eq!(url, "https://github.com/a/b");
        assert_eq!(branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_split_identity_without_branch() {
        let (url, branch) = split_identity("https://github.com/a/b");
        assert_eq!(url, "https://github.com/a/b");
        assert!(branch.is_none());
    }

    #[test]
    fn test_range_contains_bounds() {
        let r = DateRange::new(d("2024-01-10"), d("2024-01-15"));
        assert!(r.contains(d("2024-01-10")));
        assert!(r.contains(d("2024-01-15")));
        assert!(!r.contains(d("2024-01-16")));
    }

    #[test]
    fn test_overlapping_ranges_coalesce() {
        let mut ranges = vec![DateRange::new(d("2024-01-10"), d("2024-01-15"))];
        add_range(&mut ranges, DateRange::new(d("2024-01-14"), d("2024-01-20")));
        assert_eq!(ranges, vec![DateRange::new(d("2024-01-10"), d("2024-01-20"))]);
    }

    #[test]
    fn test_adjacent_ranges_coalesce() {
        let mut ranges = vec![DateRange::new(d("2024-01-10"), d("2024-01-14"))];
        add_range(&mut ranges, DateRange::new(d("2024-01-15"), d("2024-01-20")));
        assert_eq!(ranges, vec![DateRange::new(d("2024-01-10"), d("2024-01-20"))]);
    }

    #[test]
    fn test_disjoint_ranges_stay_separate() {
        let mut ranges = vec![DateRange::new(d("2024-01-01"), d("2024-01-05"))];
        add_range(&mut ranges, DateRange::new(d("2024-02-01"), d("2024-02-05")));
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].start, d("2024-01-01"));
        assert_eq!(ranges[1].start, d("2024-02-01"));
    }

    #[test]
    fn test_range_bridging_gap_merges_both_sides() {
        let mut ranges = vec![
            DateRange::new(d("2024-01-01"), d("2024-01-05")),
            DateRange::new(d("2024-01-20"), d("2024-01-25")),
        ];
        add_range(&mut ranges, DateRange::new(d("2024-01-04"), d("2024-01-21")));
        assert_eq!(ranges, vec![DateRange::new(d("2024-01-01"), d("2024-01-25"))]);
    }

    #[test]
    fn test_ranges_cover() {
        let ranges = vec![
            DateRange::new(d("2024-01-01"), d("2024-01-05")),
            DateRange::new(d("2024-02-01"), d("2024-02-05")),
        ];
        assert!(ranges_cover(&ranges, d("2024-01-03")));
        assert!(ranges_cover(&ranges, d("2024-02-01")));
        assert!(!ranges_cover(&ranges, d("2024-01-10")));
    }

    #[test]
    fn test_range_serialization_shape() {
        let r = DateRange::new(d("2024-01-10"), d("2024-01-20"));
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"start":"2024-01-10","end":"2024-01-20"}"#);
        let back: DateRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_reversed_bounds_are_swapped() {
        let r = DateRange::new(d("2024-01-20"), d("2024-01-10"));
        assert_eq!(r.start, d("2024-01-10"));
        assert_eq!(r.end, d("2024-01-20"));
    }
}

// ─── Property-based tests (proptest) ─────────────────────────────────
