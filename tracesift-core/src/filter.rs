use crate::context::expand;
use crate::matcher::find_hits;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How the retained lines are cut down when they exceed the output cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Keep the first lines of the file.
    #[default]
    Head,
    /// Keep the last lines of the file.
    Tail,
    /// Keep lines spread evenly across the retained range.
    Sampled,
}

impl std::str::FromStr for TruncationPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "head" => Ok(TruncationPolicy::Head),
            "tail" => Ok(TruncationPolicy::Tail),
            "sampled" | "sample" | "even" => Ok(TruncationPolicy::Sampled),
            _ => Err(anyhow::anyhow!("Invalid truncation policy: {}", s)),
        }
    }
}

impl std::fmt::Display for TruncationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TruncationPolicy::Head => write!(f, "head"),
            TruncationPolicy::Tail => write!(f, "tail"),
            TruncationPolicy::Sampled => write!(f, "sampled"),
        }
    }
}

/// Counters describing one filtering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub total_lines: usize,
    /// Lines matching a token directly, counted before expansion or truncation.
    pub hits: usize,
    /// Size of the keep set before truncation.
    pub kept_before_truncation: usize,
    pub filtered_lines: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredLines {
    pub lines: Vec<String>,
    pub stats: FilterStats,
}

impl FilteredLines {
    pub fn hit_count(&self) -> usize {
        self.stats.hits
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Filtered lines joined by newlines and trimmed, ready for chunking.
    pub fn text(&self) -> String {
        self.lines.join("\n").trim().to_string()
    }
}

/// Keeps every line matching a target token plus `context` lines around it.
///
/// The result preserves the original line order. `max_lines == 0` disables
/// the cap; otherwise the retained set is cut to `max_lines` entries with the
/// given policy.
pub fn filter_lines_with_context<L, T>(
    lines: &[L],
    target_services: &[T],
    context: usize,
    max_lines: usize,
    policy: TruncationPolicy,
) -> FilteredLines
where
    L: AsRef<str>,
    T: AsRef<str>,
{
    let hits = find_hits(lines, target_services);
    let keep = expand(&hits, lines.len(), context);
    debug!(
        "{} direct hits expanded to {} lines with context {}",
        hits.len(),
        keep.len(),
        context
    );

    let kept_sorted: Vec<usize> = keep.into_iter().collect();
    let kept_before_truncation = kept_sorted.len();
    let selected = truncate_indices(kept_sorted, max_lines, policy);
    let truncated = selected.len() < kept_before_truncation;
    if truncated {
        warn!(
            "Filtered output capped at {} of {} lines ({} truncation)",
            selected.len(),
            kept_before_truncation,
            policy
        );
    }

    let filtered: Vec<String> = selected
        .into_iter()
        .map(|i| strip_line_terminator(lines[i].as_ref()).to_string())
        .collect();

    info!(
        "Filtered {} lines down to {} ({} hits)",
        lines.len(),
        filtered.len(),
        hits.len()
    );

    FilteredLines {
        stats: FilterStats {
            total_lines: lines.len(),
            hits: hits.len(),
            kept_before_truncation,
            filtered_lines: filtered.len(),
            truncated,
        },
        lines: filtered,
    }
}

fn truncate_indices(sorted: Vec<usize>, max_lines: usize, policy: TruncationPolicy) -> Vec<usize> {
    if max_lines == 0 || sorted.len() <= max_lines {
        return sorted;
    }
    match policy {
        TruncationPolicy::Head => sorted.into_iter().take(max_lines).collect(),
        TruncationPolicy::Tail => {
            let skip = sorted.len() - max_lines;
            sorted.into_iter().skip(skip).collect()
        }
        TruncationPolicy::Sampled => {
            // k * len / max is strictly increasing in k because len > max.
            let len = sorted.len();
            (0..max_lines).map(|k| sorted[k * len / max_lines]).collect()
        }
    }
}

fn strip_line_terminator(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOURNAL: [&str; 6] = ["a", "SVC1 start", "b", "c", "SVC1 stop", "d"];

    #[test]
    fn test_overlapping_windows_cover_full_range() {
        let out = filter_lines_with_context(&JOURNAL, &["SVC1"], 1, 100, TruncationPolicy::Head);
        assert_eq!(out.hit_count(), 2);
        assert_eq!(out.lines, JOURNAL.to_vec());
        assert!(!out.stats.truncated);
    }

    #[test]
    fn test_radius_zero_keeps_only_hits() {
        let out = filter_lines_with_context(&JOURNAL, &["SVC1"], 0, 100, TruncationPolicy::Head);
        assert_eq!(out.hit_count(), 2);
        assert_eq!(out.lines, vec!["SVC1 start", "SVC1 stop"]);
    }

    #[test]
    fn test_no_match() {
        let out = filter_lines_with_context(&JOURNAL, &["nonexistent"], 3, 100, TruncationPolicy::Head);
        assert_eq!(out.hit_count(), 0);
        assert!(out.is_empty());
        assert_eq!(out.text(), "");
    }

    #[test]
    fn test_empty_tokens_return_nothing() {
        let empty: [&str; 0] = [];
        let out = filter_lines_with_context(&JOURNAL, &empty, 5, 10, TruncationPolicy::Tail);
        assert!(out.lines.is_empty());
        assert_eq!(out.hit_count(), 0);
    }

    #[test]
    fn test_head_truncation_keeps_prefix_and_reports_all_hits() {
        let lines: Vec<String> = (0..50).map(|i| format!("svc line {}", i)).collect();
        let out = filter_lines_with_context(&lines, &["svc"], 0, 10, TruncationPolicy::Head);
        assert_eq!(out.lines.len(), 10);
        assert_eq!(out.lines, lines[..10].to_vec());
        assert_eq!(out.hit_count(), 50);
        assert!(out.stats.truncated);
        assert_eq!(out.stats.kept_before_truncation, 50);
    }

    #[test]
    fn test_tail_truncation_keeps_suffix() {
        let lines: Vec<String> = (0..20).map(|i| format!("svc {}", i)).collect();
        let out = filter_lines_with_context(&lines, &["svc"], 0, 5, TruncationPolicy::Tail);
        assert_eq!(out.lines, lines[15..].to_vec());
    }

    #[test]
    fn test_sampled_truncation_is_ordered_and_spread() {
        let lines: Vec<String> = (0..100).map(|i| format!("svc {}", i)).collect();
        let out = filter_lines_with_context(&lines, &["svc"], 0, 4, TruncationPolicy::Sampled);
        assert_eq!(out.lines, vec!["svc 0", "svc 25", "svc 50", "svc 75"]);
    }

    #[test]
    fn test_zero_cap_disables_truncation() {
        let lines: Vec<String> = (0..30).map(|i| format!("svc {}", i)).collect();
        let out = filter_lines_with_context(&lines, &["svc"], 0, 0, TruncationPolicy::Head);
        assert_eq!(out.lines.len(), 30);
    }

    #[test]
    fn test_output_is_monotonic_subsequence() {
        let lines: Vec<String> = (0..200)
            .map(|i| if i % 17 == 0 { format!("gateway {}", i) } else { format!("noise {}", i) })
            .collect();
        let out = filter_lines_with_context(&lines, &["GATEWAY"], 3, 0, TruncationPolicy::Head);
        let positions: Vec<usize> = out
            .lines
            .iter()
            .map(|l| lines.iter().position(|o| o == l).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_trailing_terminators_stripped() {
        let lines = vec!["svc up\r\n".to_string(), "svc down\n".to_string()];
        let out = filter_lines_with_context(&lines, &["svc"], 0, 0, TruncationPolicy::Head);
        assert_eq!(out.lines, vec!["svc up", "svc down"]);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("HEAD".parse::<TruncationPolicy>().unwrap(), TruncationPolicy::Head);
        assert_eq!("tail".parse::<TruncationPolicy>().unwrap(), TruncationPolicy::Tail);
        assert_eq!("sampled".parse::<TruncationPolicy>().unwrap(), TruncationPolicy::Sampled);
        assert!("middle".parse::<TruncationPolicy>().is_err());
    }
}
