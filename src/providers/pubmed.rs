//! Biomedical literature provider: NCBI E-utilities (esearch + esummary).
//!
//! Two-step flow: esearch resolves the controlled-vocabulary query to PMIDs,
//! esummary hydrates them in small batches. NCBI throttles hard, so batches
//! are capped at a handful of PMIDs with a pause in between, and a failed
//! batch is skipped rather than failing the whole search.

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::retry::{RetryPolicy, retry};

use super::types::{SearchPage, SearchRequest, SearchResult, TimeFilter, composite_id};
use super::{ProviderId, SearchError, SearchProvider, mesh};

const API_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const ARTICLE_BASE: &str = "https://pubmed.ncbi.nlm.nih.gov";
const MAX_LISTED_AUTHORS: usize = 3;

#[derive(Debug, Deserialize)]
struct EsearchEnvelope {
    esearchresult: Option<EsearchResult>,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EsummaryEnvelope {
    result: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct SummaryDoc {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    fulljournalname: Option<String>,
    source: Option<String>,
    pubdate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Clone)]
pub struct PubMedProvider {
    http: Client,
    api_key: Option<String>,
    email: Option<String>,
    batch_size: usize,
    batch_delay: Duration,
    retry_policy: RetryPolicy,
    base_url: String,
}

impl PubMedProvider {
    pub fn from_env(http: Client, config: &AppConfig) -> Self {
        Self {
            http,
            // Both are optional: unauthenticated access works at a lower
            // rate limit.
            api_key: env::var("PUBMED_API_KEY").ok().filter(|k| !k.is_empty()),
            email: env::var("PUBMED_API_EMAIL").ok().filter(|e| !e.is_empty()),
            batch_size: config.pubmed_batch_size,
            batch_delay: config.pubmed_batch_delay,
            retry_policy: config.pubmed_retry,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str, config: &AppConfig) -> Self {
        Self {
            http,
            api_key: None,
            email: None,
            batch_size: config.pubmed_batch_size,
            batch_delay: Duration::ZERO,
            retry_policy: config.pubmed_retry,
            base_url: base_url.to_string(),
        }
    }

    fn auth_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = Vec::new();
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
        if let Some(email) = &self.email {
            params.push(("email", email.as_str()));
        }
        params
    }

    async fn esearch(&self, req: &SearchRequest, term: &str) -> Result<EsearchResult, SearchError> {
        let retmax = req.page_size.to_string();
        let retstart = req.offset().to_string();
        let reldate = relative_days(req.time).map(|d| d.to_string());

        let mut params = vec![
            ("db", "pubmed"),
            ("term", term),
            ("retmax", retmax.as_str()),
            ("retstart", retstart.as_str()),
            ("retmode", "json"),
        ];
        if let Some(days) = reldate.as_deref() {
            params.push(("reldate", days));
            params.push(("datetype", "pdat"));
        }
        params.extend(self.auth_params());

        let envelope: EsearchEnvelope = self
            .get_json(&format!("{}/esearch.fcgi", self.base_url), &params)
            .await?;

        Ok(envelope.esearchresult.unwrap_or(EsearchResult {
            count: None,
            idlist: Vec::new(),
        }))
    }

    async fn esummary_batch(
        &self,
        pmids: &[String],
    ) -> Result<serde_json::Map<String, serde_json::Value>, SearchError> {
        let ids = pmids.join(",");
        let mut params = vec![("db", "pubmed"), ("id", ids.as_str()), ("retmode", "json")];
        params.extend(self.auth_params());

        let envelope: EsummaryEnvelope = self
            .get_json(&format!("{}/esummary.fcgi", self.base_url), &params)
            .await?;

        Ok(envelope.result.unwrap_or_default())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, SearchError> {
        let response = self
            .http
            .get(url)
            .query(params)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(SearchError::RateLimited);
            }
            return Err(SearchError::Upstream {
                code: status.as_u16(),
                message: format!("HTTP {status}"),
            });
        }

        Ok(response.json().await?)
    }
}

/// E-utilities filter publication dates with a relative day count, which
/// matches every abstract window exactly.
fn relative_days(time: TimeFilter) -> Option<u32> {
    match time {
        TimeFilter::Day => Some(1),
        TimeFilter::Week => Some(7),
        TimeFilter::Month => Some(30),
        TimeFilter::SixMonths => Some(182),
        TimeFilter::Year => Some(365),
        TimeFilter::FiveYears => Some(1825),
        TimeFilter::TenYears => Some(3650),
        TimeFilter::All => None,
    }
}

fn author_line(doc: &SummaryDoc) -> String {
    let names: Vec<&str> = doc
        .authors
        .iter()
        .filter_map(|a| a.name.as_deref())
        .collect();
    if names.is_empty() {
        return String::new();
    }
    let mut line = names[..names.len().min(MAX_LISTED_AUTHORS)].join(", ");
    if names.len() > MAX_LISTED_AUTHORS {
        line.push_str(" et al.");
    }
    line
}

fn to_result(page: u32, index: usize, pmid: &str, doc: SummaryDoc) -> SearchResult {
    let authors = author_line(&doc);
    let journal = doc
        .fulljournalname
        .clone()
        .or_else(|| doc.source.clone())
        .unwrap_or_default();
    let pub_date = doc.pubdate.clone().unwrap_or_default();

    let mut snippet = String::new();
    if !authors.is_empty() {
        snippet.push_str(&format!("{authors}. "));
    }
    if !journal.is_empty() {
        snippet.push_str(&format!("{journal}. "));
    }
    if !pub_date.is_empty() {
        snippet.push_str(&format!("Published: {pub_date}"));
    }

    SearchResult {
        id: composite_id(ProviderId::PubMed, page, index, Some(pmid), ""),
        url: format!("{ARTICLE_BASE}/{pmid}/"),
        name: doc
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No title available".to_string()),
        snippet: snippet.trim_end().to_string(),
        source: Some(ProviderId::PubMed),
        authors: if authors.is_empty() {
            Vec::new()
        } else {
            authors
                .trim_end_matches(" et al.")
                .split(", ")
                .map(str::to_string)
                .collect()
        },
        journal: (!journal.is_empty()).then_some(journal),
        pub_date: (!pub_date.is_empty()).then_some(pub_date),
        pmid: Some(pmid.to_string()),
        is_pubmed: true,
        ..SearchResult::default()
    }
}

impl SearchProvider for PubMedProvider {
    async fn search(&self, req: &SearchRequest) -> Result<SearchPage, SearchError> {
        if req.query.trim().len() < 2 {
            return Err(SearchError::EmptyQuery);
        }

        let term = mesh::to_mesh_query(&req.query);
        debug!(term = %term, "pubmed controlled-vocabulary query");

        let search = retry(self.retry_policy, || self.esearch(req, &term)).await?;
        let total_results = search
            .count
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);

        if search.idlist.is_empty() {
            return Ok(SearchPage {
                results: Vec::new(),
                total_results,
            });
        }

        let mut results = Vec::with_capacity(search.idlist.len());
        let batches: Vec<&[String]> = search.idlist.chunks(self.batch_size).collect();
        let batch_count = batches.len();

        for (batch_no, batch) in batches.into_iter().enumerate() {
            match retry(self.retry_policy, || self.esummary_batch(batch)).await {
                Ok(summaries) => {
                    for pmid in batch {
                        let Some(value) = summaries.get(pmid.as_str()) else {
                            continue;
                        };
                        match serde_json::from_value::<SummaryDoc>(value.clone()) {
                            Ok(doc) => {
                                results.push(to_result(req.page, results.len(), pmid, doc));
                            }
                            Err(e) => warn!(pmid = %pmid, error = %e, "skipping malformed summary"),
                        }
                    }
                }
                // A lost batch costs a few results, not the search.
                Err(e) => warn!(batch = batch_no + 1, error = %e, "esummary batch failed, skipping"),
            }

            if batch_no + 1 < batch_count && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        debug!(count = results.len(), total_results, "pubmed search complete");
        Ok(SearchPage {
            results,
            total_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(uri: &str) -> PubMedProvider {
        PubMedProvider::with_base_url(Client::new(), uri, &AppConfig::default())
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest::new(query, TimeFilter::All, 1, 10)
    }

    fn esearch_body(count: usize, ids: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "esearchresult": {
                "count": count.to_string(),
                "idlist": ids
            }
        })
    }

    fn summary(title: &str, authors: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "title": title,
            "authors": authors.iter().map(|a| serde_json::json!({"name": a})).collect::<Vec<_>>(),
            "fulljournalname": "The Journal",
            "pubdate": "2025 Jan 10"
        })
    }

    #[tokio::test]
    async fn searches_and_hydrates_summaries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("db", "pubmed"))
            .and(query_param("retmode", "json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(esearch_body(2, &["111", "222"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .and(query_param("id", "111,222"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {
                    "uids": ["111", "222"],
                    "111": summary("First Article", &["Smith J", "Doe A"]),
                    "222": summary("Second Article", &["Lee K"])
                }
            })))
            .mount(&server)
            .await;

        let page = provider(&server.uri())
            .search(&request("malaria"))
            .await
            .unwrap();

        assert_eq!(page.total_results, 2);
        assert_eq!(page.results.len(), 2);
        let first = &page.results[0];
        assert_eq!(first.name, "First Article");
        assert_eq!(first.url, "https://pubmed.ncbi.nlm.nih.gov/111/");
        assert_eq!(first.pmid.as_deref(), Some("111"));
        assert!(first.is_pubmed);
        assert_eq!(first.authors, vec!["Smith J", "Doe A"]);
        assert!(first.snippet.contains("The Journal"));
        assert!(first.snippet.contains("Published: 2025 Jan 10"));
    }

    #[tokio::test]
    async fn query_is_reduced_to_controlled_vocabulary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("term", "\"Malaria\"[MeSH Terms]"))
            .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(0, &[])))
            .mount(&server)
            .await;

        let page = provider(&server.uri())
            .search(&request("malaria"))
            .await
            .unwrap();
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn time_filter_becomes_reldate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("reldate", "365"))
            .and(query_param("datetype", "pdat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(0, &[])))
            .mount(&server)
            .await;

        let req = SearchRequest::new("malaria", TimeFilter::Year, 1, 10);
        assert!(provider(&server.uri()).search(&req).await.is_ok());
    }

    #[tokio::test]
    async fn summaries_are_batched_in_fives() {
        let ids: Vec<String> = (1..=7).map(|i| i.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(7, &id_refs)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .and(query_param("id", "1,2,3,4,5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {
                    "1": summary("A1", &[]), "2": summary("A2", &[]),
                    "3": summary("A3", &[]), "4": summary("A4", &[]),
                    "5": summary("A5", &[])
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .and(query_param("id", "6,7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": { "6": summary("A6", &[]), "7": summary("A7", &[]) }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = provider(&server.uri())
            .search(&request("malaria"))
            .await
            .unwrap();
        assert_eq!(page.results.len(), 7);
    }

    #[tokio::test]
    async fn failed_batch_is_skipped_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(
                7,
                &["1", "2", "3", "4", "5", "6", "7"],
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .and(query_param("id", "1,2,3,4,5"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .and(query_param("id", "6,7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": { "6": summary("A6", &[]), "7": summary("A7", &[]) }
            })))
            .mount(&server)
            .await;

        let page = provider(&server.uri())
            .search(&request("malaria"))
            .await
            .unwrap();
        // First batch lost, second survived.
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].name, "A6");
    }

    #[tokio::test]
    async fn esearch_429_is_rate_limited_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let mut p = provider(&server.uri());
        p.retry_policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let err = p.search(&request("malaria")).await.unwrap_err();
        assert!(matches!(err, SearchError::RateLimited));
    }

    #[tokio::test]
    async fn too_short_query_is_rejected() {
        let server = MockServer::start().await;
        let err = provider(&server.uri())
            .search(&request("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::EmptyQuery));
    }

    #[test]
    fn author_line_truncates_with_et_al() {
        let doc = SummaryDoc {
            title: None,
            authors: ["A", "B", "C", "D"]
                .iter()
                .map(|n| Author {
                    name: Some(n.to_string()),
                })
                .collect(),
            fulljournalname: None,
            source: None,
            pubdate: None,
        };
        assert_eq!(author_line(&doc), "A, B, C et al.");
    }

    #[test]
    fn relative_days_covers_every_window() {
        assert_eq!(relative_days(TimeFilter::Day), Some(1));
        assert_eq!(relative_days(TimeFilter::SixMonths), Some(182));
        assert_eq!(relative_days(TimeFilter::TenYears), Some(3650));
        assert_eq!(relative_days(TimeFilter::All), None);
    }
}
