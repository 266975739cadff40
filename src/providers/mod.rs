pub mod bing;
pub mod exa;
pub mod google;
pub mod mesh;
pub mod pubmed;
pub mod types;

pub use bing::BingProvider;
pub use exa::ExaProvider;
pub use google::GoogleProvider;
pub use pubmed::PubMedProvider;
pub use types::{SearchPage, SearchRequest, SearchResult, TimeFilter, composite_id};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AppConfig;
use crate::retry::Retryable;

/// Closed enumeration of search providers. Adding one means a new variant,
/// a new adapter module, and one arm in `ProviderRegistry::search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Google,
    Bing,
    Exa,
    #[value(name = "pubmed")]
    PubMed,
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderId::Google => "google",
            ProviderId::Bing => "bing",
            ProviderId::Exa => "exa",
            ProviderId::PubMed => "pubmed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("{0} search is not configured. Please check your environment variables.")]
    Misconfigured(&'static str),

    #[error("search rate limit exceeded. Please wait a moment before trying again.")]
    RateLimited,

    #[error("search quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("provider error ({code}): {message}")]
    Upstream { code: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Retryable for SearchError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, SearchError::RateLimited)
    }
}

/// Contract every provider adapter implements: normalized request in,
/// normalized page out.
pub trait SearchProvider {
    async fn search(&self, req: &SearchRequest) -> Result<SearchPage, SearchError>;
}

/// Holds one adapter per provider; `search` is the single dispatch site.
pub struct ProviderRegistry {
    google: GoogleProvider,
    bing: BingProvider,
    exa: ExaProvider,
    pubmed: PubMedProvider,
}

impl ProviderRegistry {
    pub fn from_env(http: Client, config: &AppConfig) -> Self {
        Self {
            google: GoogleProvider::from_env(http.clone()),
            bing: BingProvider::from_env(http.clone(), config),
            exa: ExaProvider::from_env(http.clone()),
            pubmed: PubMedProvider::from_env(http, config),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_providers(
        google: GoogleProvider,
        bing: BingProvider,
        exa: ExaProvider,
        pubmed: PubMedProvider,
    ) -> Self {
        Self {
            google,
            bing,
            exa,
            pubmed,
        }
    }

    pub async fn search(
        &self,
        id: ProviderId,
        req: &SearchRequest,
    ) -> Result<SearchPage, SearchError> {
        if req.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        // Sentinel query: deterministic results for end-to-end testing
        // without touching any upstream.
        if is_test_query(&req.query) {
            info!("returning canned results for test query");
            return Ok(canned_results());
        }

        match id {
            ProviderId::Google => self.google.search(req).await,
            ProviderId::Bing => self.bing.search(req).await,
            ProviderId::Exa => self.exa.search(req).await,
            ProviderId::PubMed => self.pubmed.search(req).await,
        }
    }
}

pub fn is_test_query(query: &str) -> bool {
    query.trim().eq_ignore_ascii_case("test")
}

fn canned_results() -> SearchPage {
    let canned = [
        (
            "test-1",
            "https://example.com/test-1",
            "Test Result 1",
            "This is a test search result for testing purposes. It contains some sample text about research and analysis.",
        ),
        (
            "test-2",
            "https://example.com/test-2",
            "Test Result 2",
            "Another test result with different content. This one discusses methodology and data collection.",
        ),
        (
            "test-3",
            "https://example.com/test-3",
            "Test Result 3",
            "A third test result focusing on academic research and scientific papers.",
        ),
    ];

    let results: Vec<SearchResult> = canned
        .into_iter()
        .map(|(id, url, name, snippet)| SearchResult {
            id: id.to_string(),
            url: url.to_string(),
            name: name.to_string(),
            snippet: snippet.to_string(),
            ..SearchResult::default()
        })
        .collect();

    SearchPage {
        total_results: results.len(),
        results,
    }
}
