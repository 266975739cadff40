//! Pagination bookkeeping for one search session.
//!
//! The store exclusively owns every result page for the lifetime of a
//! query + filter combination. It is replaced wholesale on a new query and
//! individually overwritten on re-prioritization.

use std::collections::BTreeMap;

use tracing::debug;

use crate::aggregate::total_pages_for;
use crate::providers::SearchResult;

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("cannot navigate beyond prioritized results")]
    OutOfRange,
}

#[derive(Debug)]
pub struct PaginationStore {
    page_size: usize,
    pages: BTreeMap<u32, Vec<SearchResult>>,
    current_page: u32,
    total_results: usize,
    total_pages: u32,
    /// Once set, every page is materialized and out-of-range navigation is
    /// a user error instead of a fetch trigger.
    prioritized: bool,
}

impl PaginationStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            pages: BTreeMap::new(),
            current_page: 1,
            total_results: 0,
            total_pages: 0,
            prioritized: false,
        }
    }

    /// Start a fresh session for a new query + filter combination.
    pub fn reset(&mut self) {
        self.pages.clear();
        self.current_page = 1;
        self.total_results = 0;
        self.total_pages = 0;
        self.prioritized = false;
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_results(&self) -> usize {
        self.total_results
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn is_prioritized(&self) -> bool {
        self.prioritized
    }

    pub fn get_page(&self, n: u32) -> Option<&[SearchResult]> {
        self.pages.get(&n).map(Vec::as_slice)
    }

    /// Insert or overwrite one page, adopting the provider-reported totals.
    pub fn put_page(&mut self, n: u32, results: Vec<SearchResult>, reported_total: usize) {
        self.pages.insert(n, results);
        if !self.prioritized {
            self.total_results = reported_total;
        }
        self.recompute_totals();
    }

    /// Navigate to page `n`.
    ///
    /// `Ok(Some(..))`: the page is held, no fetch needed.
    /// `Ok(None)`: absent, the caller should fetch and `put_page` it.
    /// `Err(OutOfRange)`: absent in prioritized mode, where every page is
    /// guaranteed materialized already.
    pub fn navigate(&mut self, n: u32) -> Result<Option<&[SearchResult]>, PageError> {
        if self.pages.contains_key(&n) {
            self.current_page = n;
            return Ok(self.pages.get(&n).map(Vec::as_slice));
        }
        if self.prioritized {
            return Err(PageError::OutOfRange);
        }
        self.current_page = n;
        Ok(None)
    }

    /// Replace every page with `results` redistributed across fixed-size
    /// pages, pinning custom URLs to the front of page 1 regardless of
    /// score. The new page map is built completely before the swap, so a
    /// reader never observes a mix of old and new assignments.
    pub fn redistribute(&mut self, results: Vec<SearchResult>) {
        let mut ordered: Vec<SearchResult> = Vec::with_capacity(results.len());
        let (custom, rest): (Vec<_>, Vec<_>) =
            results.into_iter().partition(|r| r.is_custom_url);
        ordered.extend(custom);
        ordered.extend(rest);

        let mut pages = BTreeMap::new();
        for (i, chunk) in ordered.chunks(self.page_size).enumerate() {
            pages.insert(i as u32 + 1, chunk.to_vec());
        }

        self.total_results = ordered.len();
        self.pages = pages;
        self.current_page = 1;
        self.prioritized = true;
        self.recompute_totals();

        debug!(
            pages = self.total_pages,
            results = self.total_results,
            "results redistributed"
        );
    }

    fn recompute_totals(&mut self) {
        if self.prioritized {
            self.total_results = self.pages.values().map(Vec::len).sum();
        }
        self.total_pages = total_pages_for(self.total_results, self.page_size);
    }
}
