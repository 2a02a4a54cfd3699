//! Dotted numeric version comparison for release tags.

use std::cmp::Ordering;

/// Strips a single leading `v` from a release tag ("v1.2.1" -> "1.2.1").
pub fn normalize_tag(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

fn segments(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|segment| segment.trim().parse::<u64>().unwrap_or(0))
        .collect()
}

/// Compares two dotted versions segment by segment, most significant first.
///
/// Each segment is parsed as an integer, so "1.10.0" is newer than "1.2.0".
/// Missing trailing segments count as 0 and so do segments that are not numbers.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let left = segments(left);
    let right = segments(right);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// True when the release `tag` is strictly newer than the running `current` version.
pub fn is_newer_release(tag: &str, current: &str) -> bool {
    compare_versions(normalize_tag(tag), current) == Ordering::Greater
}
