use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use super::ProviderId;

/// Abstract publication-time window. Each adapter maps this onto its
/// provider's native filter vocabulary, choosing the closest
/// coarser-or-equal granularity and omitting the filter when none exists.
/// Never a narrower window than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    Day,
    Week,
    Month,
    #[value(name = "6months")]
    #[serde(rename = "6months")]
    SixMonths,
    #[value(name = "12months")]
    #[serde(rename = "12months")]
    Year,
    #[value(name = "5years")]
    #[serde(rename = "5years")]
    FiveYears,
    #[value(name = "10years")]
    #[serde(rename = "10years")]
    TenYears,
    #[default]
    All,
}

/// Normalized query request handed to every provider adapter.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub time: TimeFilter,
    /// 1-based logical page number.
    pub page: u32,
    pub page_size: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, time: TimeFilter, page: u32, page_size: usize) -> Self {
        Self {
            query: query.into(),
            time,
            page,
            page_size,
        }
    }

    /// Zero-based item offset for providers with offset pagination.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1)) as usize * self.page_size
    }
}

/// One provider's response to a single page request.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub results: Vec<SearchResult>,
    /// Provider-reported match count, often a rough estimate.
    pub total_results: usize,
}

/// Normalized search result shared by every provider and pipeline stage.
///
/// `url` is the deduplication key within one aggregated set; `id` is a
/// synthetic composite unique across repeated fetches of overlapping pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub url: String,
    pub name: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ProviderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(default)]
    pub is_custom_url: bool,
    #[serde(default)]
    pub is_pubmed: bool,
}

impl SearchResult {
    /// A user-pinned URL. Survives merges and sorts to the front on
    /// redistribution regardless of score.
    pub fn custom(url: &str) -> Self {
        Self {
            id: format!("custom-{}", utf8_percent_encode(url, NON_ALPHANUMERIC)),
            url: url.to_string(),
            name: "Custom URL".to_string(),
            snippet: "Custom URL added by user".to_string(),
            is_custom_url: true,
            ..Self::default()
        }
    }

    /// Hostname used as the uniqueness key for diversity selection.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()?
            .host_str()
            .map(|h| h.to_ascii_lowercase())
    }
}

/// Composite result id: page index + position + provider id, falling back
/// to the percent-encoded URL when the provider supplies no native id.
pub fn composite_id(
    provider: ProviderId,
    page: u32,
    index: usize,
    native_id: Option<&str>,
    url: &str,
) -> String {
    let tail = match native_id.filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => utf8_percent_encode(url, NON_ALPHANUMERIC).to_string(),
    };
    format!("{provider}-page{page}-{index}-{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_id_uses_native_id_when_present() {
        let id = composite_id(
            ProviderId::Google,
            2,
            4,
            Some("abc123"),
            "https://example.com/x",
        );
        assert_eq!(id, "google-page2-4-abc123");
    }

    #[test]
    fn composite_id_falls_back_to_encoded_url() {
        let id = composite_id(ProviderId::Bing, 1, 0, None, "https://example.com/a?b=c");
        assert!(id.starts_with("bing-page1-0-https%3A%2F%2F"));
        assert!(!id.contains('?'));
    }

    #[test]
    fn composite_id_treats_empty_native_id_as_missing() {
        let id = composite_id(ProviderId::Google, 1, 0, Some(""), "https://example.com");
        assert!(id.contains("https%3A"));
    }

    #[test]
    fn ids_unique_across_overlapping_pages() {
        let a = composite_id(ProviderId::Google, 1, 3, None, "https://example.com/same");
        let b = composite_id(ProviderId::Google, 2, 3, None, "https://example.com/same");
        assert_ne!(a, b);
    }

    #[test]
    fn host_lowercases_and_parses() {
        let mut r = SearchResult::custom("https://Example.COM/path");
        assert_eq!(r.host().as_deref(), Some("example.com"));

        r.url = "not a url".to_string();
        assert_eq!(r.host(), None);
    }

    #[test]
    fn offset_is_zero_based() {
        let req = SearchRequest::new("q", TimeFilter::All, 3, 10);
        assert_eq!(req.offset(), 20);
        let first = SearchRequest::new("q", TimeFilter::All, 1, 10);
        assert_eq!(first.offset(), 0);
    }
}
