//! Interactive search session: held results, selection, custom URLs, page
//! navigation, and LLM re-prioritization over one query + filter
//! combination.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::aggregate::{self, merge_results};
use crate::config::AppConfig;
use crate::llm::{GenerateClient, LlmError};
use crate::pages::{PageError, PaginationStore};
use crate::providers::{
    ProviderId, ProviderRegistry, SearchError, SearchRequest, SearchResult, TimeFilter,
};
use crate::rank;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("failed to prioritize results: {0}")]
    Prioritize(#[source] LlmError),

    #[error("please enter a valid URL")]
    InvalidUrl,

    #[error("no results to prioritize")]
    NothingToPrioritize,
}

/// One user-facing search session. Owns the pagination store and the held
/// result list for the current query; replaced state on every new query.
pub struct Session<'a> {
    registry: &'a ProviderRegistry,
    config: &'a AppConfig,
    query: String,
    time: TimeFilter,
    providers: Vec<ProviderId>,
    results: Vec<SearchResult>,
    selected: Vec<String>,
    store: PaginationStore,
}

impl<'a> Session<'a> {
    pub fn new(registry: &'a ProviderRegistry, config: &'a AppConfig) -> Self {
        Self {
            registry,
            config,
            query: String::new(),
            time: TimeFilter::default(),
            providers: vec![ProviderId::Google],
            results: Vec::new(),
            selected: Vec::new(),
            store: PaginationStore::new(config.results_per_page),
        }
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    pub fn store(&self) -> &PaginationStore {
        &self.store
    }

    /// Run a new search, replacing the session's pages while keeping
    /// pinned and selected results in the held list.
    pub async fn search(
        &mut self,
        query: &str,
        time: TimeFilter,
        providers: &[ProviderId],
    ) -> Result<(), SessionError> {
        self.query = query.to_string();
        self.time = time;
        self.providers = providers.to_vec();
        self.store.reset();

        self.fetch_page_into_session(1).await
    }

    /// Navigate to a page, fetching it only when absent and permitted.
    pub async fn go_to_page(&mut self, n: u32) -> Result<(), SessionError> {
        match self.store.navigate(n) {
            Ok(Some(page)) => {
                let page = page.to_vec();
                self.display(page);
                Ok(())
            }
            Ok(None) => self.fetch_page_into_session(n).await,
            Err(e) => {
                warn!(page = n, "navigation beyond prioritized results");
                Err(e.into())
            }
        }
    }

    /// Pin a custom URL to the session. Duplicates are ignored.
    pub fn add_custom_url(&mut self, url: &str) -> Result<(), SessionError> {
        if url::Url::parse(url).is_err() {
            return Err(SessionError::InvalidUrl);
        }
        if self.results.iter().any(|r| r.url == url) {
            return Ok(());
        }
        self.results.insert(0, SearchResult::custom(url));
        Ok(())
    }

    /// Toggle a result in or out of the selection, bounded by the
    /// configured maximum.
    pub fn toggle_selection(&mut self, id: &str) {
        if let Some(pos) = self.selected.iter().position(|s| s == id) {
            self.selected.remove(pos);
        } else if self.selected.len() < self.config.max_selectable {
            self.selected.push(id.to_string());
        }
    }

    /// Re-rank the whole result set (up to the fetch-all cap) with the
    /// scoring collaborator and redistribute it across pages, pinned URLs
    /// first. Returns the scorer's overall analysis.
    pub async fn reprioritize(
        &mut self,
        llm: &impl GenerateClient,
        model: &str,
    ) -> Result<String, SessionError> {
        if self.results.is_empty() {
            return Err(SessionError::NothingToPrioritize);
        }

        // Widen to the full result set; fall back to what the session
        // already holds when the wider fetch fails.
        let provider = self.providers.first().copied().unwrap_or(ProviderId::Google);
        let mut candidates = match aggregate::fetch_all(
            self.registry,
            &self.query,
            self.time,
            provider,
            self.config,
        )
        .await
        {
            Ok(page) if !page.results.is_empty() => page.results,
            Ok(_) => self.held_non_custom(),
            Err(e) => {
                warn!(error = %e, "fetch-all failed, prioritizing held results");
                self.held_non_custom()
            }
        };

        let ranked = rank::rank(llm, &self.query, &candidates, model)
            .await
            .map_err(SessionError::Prioritize)?;
        rank::apply_rankings(&mut candidates, &ranked.rankings);

        // Pinned URLs lead, then score order.
        let customs: Vec<SearchResult> = self
            .results
            .iter()
            .filter(|r| r.is_custom_url)
            .cloned()
            .collect();
        let mut full: Vec<SearchResult> = customs;
        full.extend(candidates.into_iter().filter(|r| !r.is_custom_url));
        rank::sort_for_display(&mut full);

        self.store.redistribute(full);
        let first_page = self
            .store
            .get_page(1)
            .map(|p| p.to_vec())
            .unwrap_or_default();
        self.display(first_page);

        info!(
            pages = self.store.total_pages(),
            results = self.store.total_results(),
            "results prioritized"
        );
        Ok(ranked.analysis)
    }

    async fn fetch_page_into_session(&mut self, n: u32) -> Result<(), SessionError> {
        let req = SearchRequest::new(&self.query, self.time, n, self.config.results_per_page);
        let page = aggregate::aggregate(self.registry, &req, &self.providers, self.config).await?;

        self.store.put_page(n, page.results.clone(), page.total_results);
        self.store.navigate(n)?;
        self.display(page.results);
        Ok(())
    }

    fn display(&mut self, page: Vec<SearchResult>) {
        let selected: HashSet<String> = self.selected.iter().cloned().collect();
        self.results = merge_results(&self.results, &selected, page);
    }

    fn held_non_custom(&self) -> Vec<SearchResult> {
        self.results
            .iter()
            .filter(|r| !r.is_custom_url)
            .cloned()
            .collect()
    }
}
