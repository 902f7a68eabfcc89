//! Context-window expansion around direct hits.

use std::collections::BTreeSet;

/// Every index within `radius` lines of a hit, clamped to `[0, total_lines)`.
///
/// Overlapping windows merge through the set union, so no index is kept
/// twice. Hits at or beyond `total_lines` contribute only their in-range part.
pub fn expand(hit_indices: &BTreeSet<usize>, total_lines: usize, radius: usize) -> BTreeSet<usize> {
    let mut keep = BTreeSet::new();
    if total_lines == 0 {
        return keep;
    }
    let last = total_lines - 1;

    // Hits are visited in ascending order, so anything at or below `covered`
    // is already in the set.
    let mut covered: Option<usize> = None;
    for &hit in hit_indices {
        let start = hit.saturating_sub(radius);
        let end = hit.saturating_add(radius).min(last);
        if start > last {
            break;
        }
        let start = match covered {
            Some(c) if c >= start => c + 1,
            _ => start,
        };
        if start <= end {
            keep.extend(start..=end);
            covered = Some(end);
        }
    }
    keep
}
