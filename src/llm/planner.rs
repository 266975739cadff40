//! Query-optimization collaborator: turns a raw research topic into a
//! focused search query plus a refined report prompt.

use serde::Deserialize;
use tracing::debug;

use super::parse::parse_json_block;
use super::{GenerateClient, LlmError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchPlan {
    /// Optimized web search query.
    pub query: String,
    /// Refined prompt for ranking and report generation.
    pub optimized_prompt: String,
    /// One-paragraph explanation of the research strategy.
    pub explanation: String,
    /// Suggested report outline, possibly empty.
    #[serde(default)]
    pub suggested_structure: Vec<String>,
}

pub async fn plan_research(
    llm: &impl GenerateClient,
    topic: &str,
    model: &str,
) -> Result<ResearchPlan, LlmError> {
    let prompt = build_prompt(topic);
    let response = llm.generate(&prompt, model).await?;
    let plan: ResearchPlan = parse_json_block(&response)?;

    if plan.query.trim().is_empty() {
        return Err(LlmError::Parse("plan contained an empty query".into()));
    }

    debug!(query = %plan.query, "research plan ready");
    Ok(plan)
}

fn build_prompt(topic: &str) -> String {
    format!(
        r#"You are a research assistant planning an automated web investigation.

Research Topic: "{topic}"

Produce:
1. A single focused web search query likely to surface high-quality, authoritative sources on the topic.
2. A refined research prompt suitable for judging source relevance and writing a report.
3. A short explanation of your search strategy.
4. A suggested report structure as a list of section titles.

Format your response as a JSON object with this structure:
{{
  "query": "the optimized search query",
  "optimizedPrompt": "the refined research prompt",
  "explanation": "why this query and approach",
  "suggestedStructure": ["Section 1", "Section 2"]
}}"#
    )
}
