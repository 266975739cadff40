use std::time::Duration;

use crate::retry::RetryPolicy;

/// Immutable application configuration, constructed once in `main` and
/// threaded into every component. Tests inject alternate values directly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Fixed logical page size used for every provider and for page
    /// redistribution after re-prioritization.
    pub results_per_page: usize,
    /// Upper bound on results selected for report generation.
    pub max_selectable: usize,
    /// Minimum score a result must exceed to be eligible for selection.
    pub score_floor: f64,
    /// Maximum number of results gathered in fetch-all mode.
    pub fetch_all_cap: usize,
    /// Market/locale hint forwarded to web providers that accept one.
    pub market: String,
    /// Retry policy for provider searches, content fetches, and model calls.
    pub retry: RetryPolicy,
    /// PMIDs per esummary request. NCBI throttles aggressively; small
    /// batches with a pause between them stay under the limit.
    pub pubmed_batch_size: usize,
    pub pubmed_batch_delay: Duration,
    /// The biomedical upstream gets the jittered variant.
    pub pubmed_retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            results_per_page: 10,
            max_selectable: 20,
            score_floor: 0.5,
            fetch_all_cap: 100,
            market: "en-US".to_string(),
            retry: RetryPolicy::default(),
            pubmed_batch_size: 5,
            pubmed_batch_delay: Duration::from_millis(500),
            pubmed_retry: RetryPolicy::default().with_jitter(),
        }
    }
}

impl AppConfig {
    /// Number of pages fetch-all may request, derived from the cap.
    pub fn max_fetch_pages(&self) -> usize {
        self.fetch_all_cap.div_ceil(self.results_per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_page_math() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.max_fetch_pages(), 10);
    }

    #[test]
    fn max_fetch_pages_rounds_up() {
        let cfg = AppConfig {
            fetch_all_cap: 25,
            results_per_page: 10,
            ..AppConfig::default()
        };
        assert_eq!(cfg.max_fetch_pages(), 3);
    }
}
