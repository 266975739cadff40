//! Diversity-constrained top-K selection.
//!
//! Walks candidates in descending score order and accepts one result per
//! host, so a single domain cannot dominate the report's source list.

use tracing::{debug, warn};

use crate::providers::SearchResult;

/// Select up to `max_count` results scoring above `score_floor`, no two
/// sharing a host. Returns an empty vector when nothing clears the floor;
/// callers surface that as a "no good results" condition.
pub fn select_diverse(
    ranked: &[SearchResult],
    max_count: usize,
    score_floor: f64,
) -> Vec<SearchResult> {
    let mut by_score: Vec<&SearchResult> = ranked.iter().collect();
    by_score.sort_by(|a, b| {
        b.score
            .unwrap_or(0.0)
            .partial_cmp(&a.score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen_hosts = std::collections::HashSet::new();
    let mut selected = Vec::new();

    for result in by_score {
        if selected.len() >= max_count {
            break;
        }
        if result.score.unwrap_or(0.0) <= score_floor {
            // Sorted descending: nothing after this clears the floor either.
            break;
        }
        let Some(host) = result.host() else {
            warn!(url = %result.url, "skipping result with unparseable URL");
            continue;
        };
        if seen_hosts.insert(host) {
            selected.push(result.clone());
        }
    }

    debug!(
        selected = selected.len(),
        candidates = ranked.len(),
        "diversity selection complete"
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, score: f64) -> SearchResult {
        SearchResult {
            id: format!("id-{url}"),
            url: url.to_string(),
            name: url.to_string(),
            snippet: "s".to_string(),
            score: Some(score),
            ..SearchResult::default()
        }
    }

    #[test]
    fn never_returns_two_results_from_one_host() {
        let ranked = vec![
            result("https://a.com/1", 0.9),
            result("https://a.com/2", 0.8),
            result("https://b.com/1", 0.7),
        ];

        let selected = select_diverse(&ranked, 10, 0.5);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].url, "https://a.com/1");
        assert_eq!(selected[1].url, "https://b.com/1");
    }

    #[test]
    fn single_host_input_selects_only_the_best() {
        let ranked = vec![
            result("https://a.com/low", 0.6),
            result("https://a.com/high", 0.95),
            result("https://a.com/mid", 0.8),
        ];

        let selected = select_diverse(&ranked, 10, 0.5);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].url, "https://a.com/high");
    }

    #[test]
    fn nothing_above_floor_selects_none() {
        let ranked = vec![
            result("https://a.com", 0.3),
            result("https://b.com", 0.5), // floor is exclusive
        ];

        assert!(select_diverse(&ranked, 10, 0.5).is_empty());
    }

    #[test]
    fn respects_max_count() {
        let ranked: Vec<SearchResult> = (0..10)
            .map(|i| result(&format!("https://site{i}.com"), 0.9))
            .collect();

        assert_eq!(select_diverse(&ranked, 3, 0.5).len(), 3);
    }

    #[test]
    fn input_order_does_not_matter() {
        let ranked = vec![
            result("https://low.com", 0.55),
            result("https://high.com", 0.99),
        ];

        let selected = select_diverse(&ranked, 1, 0.5);
        assert_eq!(selected[0].url, "https://high.com");
    }

    #[test]
    fn unscored_results_never_clear_the_floor() {
        let mut unscored = result("https://a.com", 0.0);
        unscored.score = None;

        assert!(select_diverse(&[unscored], 10, 0.5).is_empty());
    }

    #[test]
    fn unparseable_urls_are_skipped_not_fatal() {
        let ranked = vec![result("not a url", 0.9), result("https://b.com", 0.8)];

        let selected = select_diverse(&ranked, 10, 0.5);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].url, "https://b.com");
    }

    #[test]
    fn hosts_compare_case_insensitively() {
        let ranked = vec![
            result("https://A.com/1", 0.9),
            result("https://a.com/2", 0.8),
        ];

        assert_eq!(select_diverse(&ranked, 10, 0.5).len(), 1);
    }
}
