//! Full-text acquisition for selected results.
//!
//! Downloads a page, extracts the main article content, and converts it to
//! Markdown. Consumers treat failures as non-fatal: the caller falls back
//! to the result's snippet.

mod extractor;

use reqwest::Client;
use tracing::debug;

use crate::retry::Retryable;

use extractor::extract_article;

const MAX_RESPONSE_BYTES: usize = 10_000_000;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: must be HTTP(S)")]
    InvalidScheme,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("content fetch rate limited")]
    RateLimited,

    #[error("fetch failed: status {0}")]
    Status(u16),

    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response too large (>{} bytes)", MAX_RESPONSE_BYTES)]
    TooLarge,
}

impl Retryable for FetchError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

/// External content-fetch collaborator: URL in, extracted text out.
/// Implemented by `PageFetcher` for production; mocks in tests.
pub trait ContentFetcher {
    async fn fetch_content(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct PageFetcher {
    http: Client,
}

impl PageFetcher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl ContentFetcher for PageFetcher {
    async fn fetch_content(&self, url: &str) -> Result<String, FetchError> {
        validate_url(url)?;

        let html = download(&self.http, url).await?;
        let article = extract_article(&html, Some(url));
        let markdown = html2md::rewrite_html(&article.content_html, false);

        debug!(
            url,
            bytes = html.len(),
            fallback = article.used_raw_fallback,
            "page fetched"
        );
        Ok(markdown)
    }
}

async fn download(client: &Client, url: &str) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .header("User-Agent", crate::USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited);
    }
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    if let Some(len) = response.content_length()
        && len as usize > MAX_RESPONSE_BYTES
    {
        return Err(FetchError::TooLarge);
    }

    let mut body = Vec::new();
    let mut stream = response;
    while let Some(chunk) = stream.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::TooLarge);
        }
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn validate_url(raw: &str) -> Result<(), FetchError> {
    let parsed = url::Url::parse(raw)?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(FetchError::InvalidScheme),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_url() {
        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(FetchError::InvalidScheme)
        ));
        assert!(matches!(
            validate_url("file:///tmp/test"),
            Err(FetchError::InvalidScheme)
        ));
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(matches!(
            validate_url("not-a-url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("https://example.com").is_ok());
    }
}
