//! Tertiary web provider: Exa neural search.

use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{SearchPage, SearchRequest, SearchResult, TimeFilter, composite_id};
use super::{ProviderId, SearchError, SearchProvider};

const API_BASE: &str = "https://api.exa.ai";
const SNIPPET_MAX_CHARS: usize = 500;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    search_type: &'static str,
    num_results: usize,
    offset: usize,
    contents: Contents,
    #[serde(skip_serializing_if = "Option::is_none")]
    recency: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct Contents {
    text: TextOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextOptions {
    max_characters: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    results: Option<Vec<Item>>,
    total_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: Option<String>,
    url: String,
    title: Option<String>,
    #[serde(default)]
    text: String,
}

#[derive(Clone)]
pub struct ExaProvider {
    http: Client,
    api_key: Option<String>,
    base_url: String,
}

impl ExaProvider {
    pub fn from_env(http: Client) -> Self {
        Self {
            http,
            api_key: env::var("EXA_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: Some("test-key".to_string()),
            base_url: base_url.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn unconfigured(http: Client) -> Self {
        Self {
            http,
            api_key: None,
            base_url: API_BASE.to_string(),
        }
    }
}

/// Exa's recency vocabulary is coarse: month / months (~6) / year / years.
/// Sub-month windows coarsen to month; "all" omits the field.
fn recency(time: TimeFilter) -> Option<&'static str> {
    match time {
        TimeFilter::Day | TimeFilter::Week | TimeFilter::Month => Some("month"),
        TimeFilter::SixMonths => Some("months"),
        TimeFilter::Year => Some("year"),
        TimeFilter::FiveYears | TimeFilter::TenYears => Some("years"),
        TimeFilter::All => None,
    }
}

impl SearchProvider for ExaProvider {
    async fn search(&self, req: &SearchRequest) -> Result<SearchPage, SearchError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or(SearchError::Misconfigured("Exa"))?;

        let body = SearchBody {
            query: &req.query,
            search_type: "auto",
            num_results: req.page_size,
            offset: req.offset(),
            contents: Contents {
                text: TextOptions {
                    max_characters: SNIPPET_MAX_CHARS,
                },
            },
            recency: recency(req.time),
        };

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(key)
            .header("User-Agent", crate::USER_AGENT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!("Exa search rate limited");
                return Err(SearchError::RateLimited);
            }
            let text = response.text().await.unwrap_or_default();
            let snippet = if text.len() > 200 { &text[..200] } else { &text };
            warn!(status = %status, "Exa search error");
            return Err(SearchError::Upstream {
                code: status.as_u16(),
                message: format!("HTTP {status}: {snippet}"),
            });
        }

        let body: SearchResponse = response.json().await?;
        let items = body.results.ok_or(SearchError::Upstream {
            code: 0,
            message: "unexpected Exa response format".to_string(),
        })?;

        let total_results = body.total_count.unwrap_or(items.len());
        let results: Vec<SearchResult> = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| SearchResult {
                id: composite_id(ProviderId::Exa, req.page, i, item.id.as_deref(), &item.url),
                name: item.title.unwrap_or_else(|| "Untitled".to_string()),
                snippet: item.text,
                url: item.url,
                source: Some(ProviderId::Exa),
                ..SearchResult::default()
            })
            .collect();

        debug!(count = results.len(), total_results, "exa search complete");
        Ok(SearchPage {
            results,
            total_results,
        })
    }
}
