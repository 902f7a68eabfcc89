//! Direct-hit detection for target service tokens.

use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

/// Case-insensitive literal matcher over a set of target tokens.
///
/// Tokens are escaped before compilation, so `svc.*` only matches the text
/// `svc.*`, never a pattern.
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    pattern: Option<Regex>,
}

impl TokenMatcher {
    pub fn new<S: AsRef<str>>(tokens: &[S]) -> Self {
        let alternatives: Vec<String> = tokens
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !t.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Self { pattern: None };
        }

        // Escaped literals joined by `|` always form a valid pattern; a build
        // failure can only come from the size limit, in which case the
        // matcher falls back to plain case-folded substring search.
        let pattern = RegexBuilder::new(&alternatives.join("|"))
            .case_insensitive(true)
            .size_limit(64 * (1 << 20))
            .build()
            .ok();

        Self { pattern }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(line))
    }
}

/// Indices of lines containing at least one token (case-insensitive literal).
///
/// An empty token list matches nothing.
pub fn find_hits<L, T>(lines: &[L], tokens: &[T]) -> BTreeSet<usize>
where
    L: AsRef<str>,
    T: AsRef<str>,
{
    let matcher = TokenMatcher::new(tokens);
    if matcher.is_empty() {
        if tokens.iter().any(|t| !t.as_ref().is_empty()) {
            return find_hits_folded(lines, tokens);
        }
        return BTreeSet::new();
    }

    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| matcher.is_match(line.as_ref()))
        .map(|(i, _)| i)
        .collect()
}

fn find_hits_folded<L, T>(lines: &[L], tokens: &[T]) -> BTreeSet<usize>
where
    L: AsRef<str>,
    T: AsRef<str>,
{
    let folded: Vec<String> = tokens
        .iter()
        .map(|t| t.as_ref().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.as_ref().to_lowercase();
            folded.iter().any(|t| line.contains(t.as_str()))
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> Vec<&'static str> {
        vec!["a", "SVC1 start", "b", "c", "svc1 stop", "d"]
    }

    #[test]
    fn test_case_insensitive_hits() {
        let hits = find_hits(&lines(), &["Svc1"]);
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![1, 4]);
    }

    #[test]
    fn test_empty_tokens_match_nothing() {
        let empty: [&str; 0] = [];
        assert!(find_hits(&lines(), &empty).is_empty());
        assert!(find_hits(&lines(), &[""]).is_empty());
    }

    #[test]
    fn test_tokens_are_literal_text() {
        let log = vec![
            "freeswitch[12]: sofia.profile reload",
            "sofiaXprofile unrelated",
            "tai6-manager (pid 7) exited",
        ];
        let hits = find_hits(&log, &["sofia.profile"]);
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![0]);

        let hits = find_hits(&log, &["(pid 7)"]);
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_any_token_counts_once_per_line() {
        let log = vec!["freeswitch and tai6-manager", "other", "TAI6-MANAGER"];
        let hits = find_hits(&log, &["freeswitch", "tai6-manager"]);
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_deterministic() {
        let a = find_hits(&lines(), &["svc1", "b"]);
        let b = find_hits(&lines(), &["svc1", "b"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_folded_fallback_agrees() {
        let tokens = ["SVC1"];
        assert_eq!(
            find_hits_folded(&lines(), &tokens),
            find_hits(&lines(), &tokens)
        );
    }
}
