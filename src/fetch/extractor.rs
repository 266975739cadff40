use dom_smoothie::{Config, Readability};
use tracing::warn;

pub(super) struct ExtractedArticle {
    pub content_html: String,
    /// True when readability extraction failed and raw HTML was used as
    /// fallback. False for successful extraction.
    pub used_raw_fallback: bool,
}

pub(super) fn extract_article(html: &str, url: Option<&str>) -> ExtractedArticle {
    let mut readability = match Readability::new(html, url, Some(Config::default())) {
        Ok(r) => r,
        Err(e) => {
            warn!(%e, "readability init failed, using raw fallback");
            return raw_fallback(html);
        }
    };

    let readable = readability.is_probably_readable();

    match readability.parse() {
        Ok(article) if readable => ExtractedArticle {
            content_html: article.content.to_string(),
            used_raw_fallback: false,
        },
        Ok(_) => ExtractedArticle {
            content_html: html.to_string(),
            used_raw_fallback: true,
        },
        Err(e) => {
            warn!(%e, "readability parse failed, using raw fallback");
            raw_fallback(html)
        }
    }
}

fn raw_fallback(html: &str) -> ExtractedArticle {
    ExtractedArticle {
        content_html: html.to_string(),
        used_raw_fallback: true,
    }
}
