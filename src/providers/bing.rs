//! Secondary web provider: Bing Web Search v7.

use std::env;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AppConfig;

use super::types::{SearchPage, SearchRequest, SearchResult, TimeFilter, composite_id};
use super::{ProviderId, SearchError, SearchProvider};

const API_BASE: &str = "https://api.bing.microsoft.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    web_pages: Option<WebPages>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebPages {
    total_estimated_matches: Option<usize>,
    #[serde(default)]
    value: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: Option<String>,
    url: String,
    name: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Clone)]
pub struct BingProvider {
    http: Client,
    subscription_key: Option<String>,
    market: String,
    base_url: String,
}

impl BingProvider {
    pub fn from_env(http: Client, config: &AppConfig) -> Self {
        Self {
            http,
            subscription_key: env::var("AZURE_SUB_KEY").ok().filter(|k| !k.is_empty()),
            market: config.market.clone(),
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            subscription_key: Some("test-key".to_string()),
            market: "en-US".to_string(),
            base_url: base_url.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn unconfigured(http: Client) -> Self {
        Self {
            http,
            subscription_key: None,
            market: "en-US".to_string(),
            base_url: API_BASE.to_string(),
        }
    }
}

/// Bing `freshness` tops out at Year; longer windows coarsen to "no filter"
/// rather than narrowing.
fn freshness(time: TimeFilter) -> Option<&'static str> {
    match time {
        TimeFilter::Day => Some("Day"),
        TimeFilter::Week => Some("Week"),
        TimeFilter::Month => Some("Month"),
        TimeFilter::SixMonths | TimeFilter::Year => Some("Year"),
        TimeFilter::FiveYears | TimeFilter::TenYears | TimeFilter::All => None,
    }
}

impl SearchProvider for BingProvider {
    async fn search(&self, req: &SearchRequest) -> Result<SearchPage, SearchError> {
        let key = self
            .subscription_key
            .as_ref()
            .ok_or(SearchError::Misconfigured("Bing"))?;

        let count = req.page_size.to_string();
        let offset = req.offset().to_string();

        let mut params = vec![
            ("q", req.query.as_str()),
            ("count", count.as_str()),
            ("offset", offset.as_str()),
            ("mkt", self.market.as_str()),
            ("safeSearch", "Moderate"),
        ];
        if let Some(fresh) = freshness(req.time) {
            params.push(("freshness", fresh));
        }

        let response = self
            .http
            .get(format!("{}/v7.0/search", self.base_url))
            .query(&params)
            .header("Ocp-Apim-Subscription-Key", key)
            .header("Accept-Language", "en-US")
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

            return Err(match status.as_u16() {
                429 => {
                    warn!("Bing search rate limited");
                    SearchError::RateLimited
                }
                // Bing signals an exhausted monthly quota with 403.
                403 => {
                    warn!("Bing search quota exhausted");
                    SearchError::QuotaExhausted(message)
                }
                code => {
                    warn!(status = %status, "Bing search error");
                    SearchError::Upstream { code, message }
                }
            });
        }

        let body: SearchResponse = response.json().await?;
        let web_pages = body.web_pages.unwrap_or(WebPages {
            total_estimated_matches: None,
            value: Vec::new(),
        });

        let total_results = web_pages.total_estimated_matches.unwrap_or(0);
        let results: Vec<SearchResult> = web_pages
            .value
            .into_iter()
            .enumerate()
            .map(|(i, item)| SearchResult {
                id: composite_id(ProviderId::Bing, req.page, i, item.id.as_deref(), &item.url),
                url: item.url,
                name: item.name,
                snippet: item.snippet,
                source: Some(ProviderId::Bing),
                ..SearchResult::default()
            })
            .collect();

        debug!(count = results.len(), total_results, "bing search complete");
        Ok(SearchPage {
            results,
            total_results,
        })
    }
}
