//! Multi-provider result aggregation: concurrent fan-out, priority-order
//! merge, URL dedup against the held set, and capped fetch-all.

use std::collections::HashSet;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::providers::{
    ProviderId, ProviderRegistry, SearchError, SearchRequest, SearchResult, TimeFilter,
};
use crate::retry::retry;

/// One merged page across providers.
#[derive(Debug, Default)]
pub struct AggregatedPage {
    pub results: Vec<SearchResult>,
    /// Sum of each provider's reported total. An approximation: overlapping
    /// URLs are counted once per provider. No provider exposes a
    /// deduplicated cross-provider count.
    pub total_results: usize,
    pub total_pages: u32,
    /// Per-provider share of `results`, computed once during the merge.
    pub breakdown: Vec<(ProviderId, usize)>,
}

/// Fan a query out to `providers` (in priority order) and merge.
///
/// Partial failures are tolerated: as long as one provider answers, its
/// results are returned and the failures are logged. Only when every
/// provider fails does the first error surface.
pub async fn aggregate(
    registry: &ProviderRegistry,
    req: &SearchRequest,
    providers: &[ProviderId],
    config: &AppConfig,
) -> Result<AggregatedPage, SearchError> {
    let outcomes = join_all(providers.iter().map(|&id| async move {
        let outcome = retry(config.retry, || registry.search(id, req)).await;
        (id, outcome)
    }))
    .await;

    let mut results = Vec::new();
    let mut total_results = 0usize;
    let mut breakdown = Vec::with_capacity(providers.len());
    let mut first_error = None;

    // Merge in the order the providers were requested: primary first.
    for (id, outcome) in outcomes {
        match outcome {
            Ok(page) => {
                breakdown.push((id, page.results.len()));
                total_results += page.total_results;
                results.extend(page.results);
            }
            Err(e) => {
                warn!(provider = %id, error = %e, "provider failed (continuing with others)");
                first_error.get_or_insert(e);
            }
        }
    }

    if breakdown.is_empty() {
        return Err(first_error.unwrap_or(SearchError::EmptyQuery));
    }

    let total_pages = total_pages_for(total_results, config.results_per_page);
    debug!(
        merged = results.len(),
        total_results, "aggregation complete"
    );
    Ok(AggregatedPage {
        results,
        total_results,
        total_pages,
        breakdown,
    })
}

/// Merge freshly fetched results into the held set.
///
/// Pinned (custom) URLs and currently-selected items are retained verbatim;
/// everything else held is dropped in favor of the incoming page. Incoming
/// results whose URL is already retained are skipped, which makes repeated
/// aggregation of the same query idempotent.
pub fn merge_results(
    held: &[SearchResult],
    selected_ids: &HashSet<String>,
    incoming: Vec<SearchResult>,
) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = held
        .iter()
        .filter(|r| r.is_custom_url || selected_ids.contains(&r.id))
        .cloned()
        .collect();

    let retained_urls: HashSet<String> = merged.iter().map(|r| r.url.clone()).collect();
    merged.extend(
        incoming
            .into_iter()
            .filter(|r| !retained_urls.contains(&r.url)),
    );
    merged
}

/// Paginate a single provider up to `config.fetch_all_cap` results.
///
/// Page 1 is fetched first; an empty page 1 short-circuits with no further
/// requests. Remaining pages are fetched concurrently and merged in page
/// order, stopping at the first short page (upstream exhaustion).
pub async fn fetch_all(
    registry: &ProviderRegistry,
    query: &str,
    time: TimeFilter,
    provider: ProviderId,
    config: &AppConfig,
) -> Result<AggregatedPage, SearchError> {
    let size = config.results_per_page;
    let first_req = SearchRequest::new(query, time, 1, size);
    let first = retry(config.retry, || registry.search(provider, &first_req)).await?;

    if first.results.is_empty() {
        debug!("fetch-all: empty first page, stopping");
        return Ok(AggregatedPage::default());
    }

    let total_pages_available = total_pages_for(first.total_results, size);
    let pages_to_fetch = (config.max_fetch_pages() as u32).min(total_pages_available.max(1));

    let mut results = first.results;
    let exhausted = results.len() < size;

    if !exhausted && pages_to_fetch > 1 {
        let mut later: Vec<(u32, _)> = join_all((2..=pages_to_fetch).map(|page| {
            let req = SearchRequest::new(query, time, page, size);
            async move {
                let outcome = retry(config.retry, || registry.search(provider, &req)).await;
                (page, outcome)
            }
        }))
        .await;
        later.sort_by_key(|(page, _)| *page);

        for (page, outcome) in later {
            let page_results = outcome?.results;
            let short = page_results.len() < size;
            results.extend(page_results);
            if short {
                debug!(page, "fetch-all: short page, upstream exhausted");
                break;
            }
        }
    }

    results.truncate(config.fetch_all_cap);
    let total_results = (total_pages_available as usize * size).min(config.fetch_all_cap);
    let breakdown = vec![(provider, results.len())];

    debug!(fetched = results.len(), "fetch-all complete");
    Ok(AggregatedPage {
        results,
        total_results,
        total_pages: total_pages_available,
        breakdown,
    })
}

pub fn total_pages_for(total_results: usize, page_size: usize) -> u32 {
    total_results.div_ceil(page_size.max(1)) as u32
}
