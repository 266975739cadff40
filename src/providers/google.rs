//! Primary web provider: Google Programmable Search (Custom Search JSON API).

use std::env;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::types::{SearchPage, SearchRequest, SearchResult, TimeFilter, composite_id};
use super::{ProviderId, SearchError, SearchProvider};

const API_BASE: &str = "https://customsearch.googleapis.com";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Option<Vec<Item>>,
    #[serde(rename = "searchInformation")]
    search_information: Option<SearchInformation>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(rename = "cacheId")]
    cache_id: Option<String>,
    link: String,
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearchInformation {
    /// The API reports this as a decimal string.
    #[serde(rename = "totalResults")]
    total_results: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Clone)]
struct Credentials {
    api_key: String,
    cx: String,
}

#[derive(Clone)]
pub struct GoogleProvider {
    http: Client,
    credentials: Option<Credentials>,
    base_url: String,
}

impl GoogleProvider {
    pub fn from_env(http: Client) -> Self {
        let credentials = match (
            env::var("GOOGLE_SEARCH_API_KEY"),
            env::var("GOOGLE_SEARCH_CX"),
        ) {
            (Ok(api_key), Ok(cx)) if !api_key.is_empty() && !cx.is_empty() => {
                Some(Credentials { api_key, cx })
            }
            _ => None,
        };
        Self {
            http,
            credentials,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            credentials: Some(Credentials {
                api_key: "test-key".to_string(),
                cx: "test-cx".to_string(),
            }),
            base_url: base_url.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn unconfigured(http: Client) -> Self {
        Self {
            http,
            credentials: None,
            base_url: API_BASE.to_string(),
        }
    }
}

/// Google `dateRestrict` values: `[dwmy]N`.
fn date_restrict(time: TimeFilter) -> Option<&'static str> {
    match time {
        TimeFilter::Day => Some("d1"),
        TimeFilter::Week => Some("w1"),
        TimeFilter::Month => Some("m1"),
        TimeFilter::SixMonths => Some("m6"),
        TimeFilter::Year => Some("y1"),
        TimeFilter::FiveYears => Some("y5"),
        TimeFilter::TenYears => Some("y10"),
        TimeFilter::All => None,
    }
}

impl SearchProvider for GoogleProvider {
    async fn search(&self, req: &SearchRequest) -> Result<SearchPage, SearchError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(SearchError::Misconfigured("Google"))?;

        // The API uses a 1-based start index.
        let start = req.offset() + 1;
        let num = req.page_size.to_string();
        let start = start.to_string();

        let mut params = vec![
            ("q", req.query.as_str()),
            ("key", credentials.api_key.as_str()),
            ("cx", credentials.cx.as_str()),
            ("num", num.as_str()),
            ("start", start.as_str()),
            ("safe", "active"),
        ];
        if let Some(restrict) = date_restrict(req.time) {
            params.push(("dateRestrict", restrict));
        }

        let response = self
            .http
            .get(format!("{}/customsearch/v1", self.base_url))
            .query(&params)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SearchResponse>(&text)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status}"));

            // The daily free-tier limit comes back as a 403 with this
            // message; treat it like any other rate limit.
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || message.contains("Quota exceeded")
            {
                warn!("Google search rate limited");
                return Err(SearchError::RateLimited);
            }
            warn!(status = %status, "Google search error");
            return Err(SearchError::Upstream {
                code: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = response.json().await?;

        let total_results = body
            .search_information
            .and_then(|info| info.total_results)
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(0);

        let results: Vec<SearchResult> = body
            .items
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, item)| SearchResult {
                id: composite_id(
                    ProviderId::Google,
                    req.page,
                    i,
                    item.cache_id.as_deref(),
                    &item.link,
                ),
                url: item.link,
                name: item.title,
                snippet: item.snippet,
                source: Some(ProviderId::Google),
                ..SearchResult::default()
            })
            .collect();

        debug!(count = results.len(), total_results, "google search complete");
        Ok(SearchPage {
            results,
            total_results,
        })
    }
}
