//! Report-generation collaborator: synthesizes the gathered source content
//! into a structured, cited report.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::providers::SearchResult;

use super::parse::parse_json_block;
use super::{GenerateClient, LlmError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    pub id: String,
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    /// 1-based indices into `sources` that were actually cited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_sources: Option<Vec<usize>>,
}

/// One selected source with its acquired full text (or snippet fallback).
#[derive(Debug, Clone)]
pub struct SelectedContent {
    pub url: String,
    pub title: String,
    pub content: String,
}

pub async fn generate_report(
    llm: &impl GenerateClient,
    selected: &[SelectedContent],
    sources: &[SearchResult],
    prompt: &str,
    model: &str,
) -> Result<Report, LlmError> {
    // Sources whose content came back empty have nothing to contribute.
    let usable: Vec<&SelectedContent> = selected
        .iter()
        .filter(|s| !s.content.trim().is_empty())
        .collect();
    if usable.is_empty() {
        return Err(LlmError::Parse("no source content to synthesize".into()));
    }

    let request = build_prompt(&usable, sources, prompt);
    let response = llm.generate(&request, model).await?;
    let mut report: Report = parse_json_block(&response)?;

    if report.sources.is_empty() {
        warn!("model omitted the source list, rebuilding from input");
        report.sources = sources
            .iter()
            .map(|s| SourceRef {
                id: s.id.clone(),
                url: s.url.clone(),
                name: s.name.clone(),
            })
            .collect();
    }

    debug!(sections = report.sections.len(), "report generated");
    Ok(report)
}

fn build_prompt(selected: &[&SelectedContent], sources: &[SearchResult], prompt: &str) -> String {
    let mut out = format!(
        r#"You are a research analyst writing a structured report.

Research Request: "{prompt}"

Write a report with a title, an executive summary, and several titled sections. Cite sources by their number in square brackets, e.g. [1]. Base every claim on the source material below.

Sources:
"#
    );

    for (i, source) in sources.iter().enumerate() {
        out.push_str(&format!("{}. {} — {}\n", i + 1, source.name, source.url));
    }

    out.push_str("\nSource material:\n");
    for item in selected {
        out.push_str(&format!("\n### {} ({})\n{}\n", item.title, item.url, item.content));
    }

    out.push_str(
        r#"
Format your response as a JSON object with this structure:
{
  "title": "Report title",
  "summary": "Executive summary",
  "sections": [{"title": "Section title", "content": "Section content with [1] citations"}],
  "sources": [{"id": "1", "url": "source url", "name": "source name"}],
  "usedSources": [1, 2]
}

"usedSources" lists the 1-based numbers of the sources you actually cited."#,
    );

    out
}
