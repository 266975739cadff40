//! Automated research pipeline: plan → search → rank → select → fetch →
//! report, driven as an explicit state machine with per-stage failure
//! semantics.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{info, warn};

use crate::aggregate;
use crate::config::AppConfig;
use crate::fetch::ContentFetcher;
use crate::llm::planner::plan_research;
use crate::llm::report::{Report, SelectedContent, generate_report};
use crate::llm::{GenerateClient, LlmError};
use crate::providers::{ProviderId, ProviderRegistry, SearchError, SearchRequest, TimeFilter};
use crate::rank;
use crate::retry::retry;
use crate::select::select_diverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentStep {
    #[default]
    Idle,
    Planning,
    Searching,
    Analyzing,
    Selecting,
    Generating,
    Error,
}

impl std::fmt::Display for AgentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgentStep::Idle => "idle",
            AgentStep::Planning => "planning",
            AgentStep::Searching => "searching",
            AgentStep::Analyzing => "analyzing",
            AgentStep::Selecting => "selecting",
            AgentStep::Generating => "generating",
            AgentStep::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Full content acquired.
    Fetched,
    /// Fell back to the search snippet.
    Preview,
}

#[derive(Debug, Default, Clone)]
pub struct FetchTally {
    pub total: usize,
    pub successful: usize,
    pub fallback: usize,
    pub statuses: HashMap<String, FetchOutcome>,
}

/// Transient state for one agent run. Created at run start, discarded at
/// the next run's start. The insight log is append-only for the lifetime
/// of the run.
#[derive(Debug, Default)]
pub struct AgentRunState {
    pub step: AgentStep,
    pub insights: Vec<String>,
    pub search_queries: Vec<String>,
    pub selected_ids: Vec<String>,
    pub fetch: FetchTally,
    pub last_error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("please provide a research topic")]
    EmptyPrompt,

    #[error("failed to plan research: {0}")]
    Plan(#[source] LlmError),

    #[error("no search results found. Please try a different query.")]
    NoResults,

    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    #[error("failed to analyze results: {0}")]
    Analyze(#[source] LlmError),

    #[error("no relevant results found. Please try a different query.")]
    NoRelevantResults,

    #[error("could not find enough diverse, high-quality sources. Please try a different query.")]
    SelectionEmpty,

    #[error("content fetch rate limit exceeded while gathering sources")]
    ContentRateLimited,

    #[error("failed to generate report: {0}")]
    Report(#[source] LlmError),
}

#[derive(Debug)]
pub struct AgentOutcome {
    pub report: Report,
    /// Every retrieved result, scored and sorted.
    pub results: Vec<crate::providers::SearchResult>,
    pub selected: Vec<crate::providers::SearchResult>,
}

pub struct Agent<'a, L, F> {
    registry: &'a ProviderRegistry,
    llm: &'a L,
    fetcher: &'a F,
    config: &'a AppConfig,
    pub state: AgentRunState,
}

impl<'a, L, F> Agent<'a, L, F>
where
    L: GenerateClient,
    F: ContentFetcher,
{
    pub fn new(
        registry: &'a ProviderRegistry,
        llm: &'a L,
        fetcher: &'a F,
        config: &'a AppConfig,
    ) -> Self {
        Self {
            registry,
            llm,
            fetcher,
            config,
            state: AgentRunState::default(),
        }
    }

    /// Execute one full run. Takes `&mut self`, so concurrent runs over one
    /// agent are unrepresentable; callers serialize re-entry. There is no
    /// cancellation: a run ends by completing or failing.
    ///
    /// On failure the triggering error is surfaced with stage context and
    /// the step resets to `Idle` so a new run can start. The failed run's
    /// insight log survives for display until the next run discards it.
    pub async fn run(
        &mut self,
        topic: &str,
        model: &str,
        time: TimeFilter,
        providers: &[ProviderId],
    ) -> Result<AgentOutcome, AgentError> {
        // Discard any previous run's state, including its insights.
        self.state = AgentRunState::default();

        if topic.trim().is_empty() {
            return Err(AgentError::EmptyPrompt);
        }

        let outcome = self.run_stages(topic, model, time, providers).await;
        match &outcome {
            Ok(_) => {
                self.state.step = AgentStep::Idle;
            }
            Err(e) => {
                self.state.step = AgentStep::Error;
                self.state.last_error = Some(e.to_string());
                warn!(error = %e, "agent run failed");
                // Leave the machine ready for the next run.
                self.state.step = AgentStep::Idle;
            }
        }
        outcome
    }

    async fn run_stages(
        &mut self,
        topic: &str,
        model: &str,
        time: TimeFilter,
        providers: &[ProviderId],
    ) -> Result<AgentOutcome, AgentError> {
        let retry_policy = self.config.retry;

        // -- planning --------------------------------------------------
        self.state.step = AgentStep::Planning;
        info!(step = %self.state.step, "agent step");
        let llm = self.llm;
        let plan = retry(retry_policy, || plan_research(llm, topic, model))
            .await
            .map_err(AgentError::Plan)?;

        self.state.search_queries.push(plan.query.clone());
        self.state
            .insights
            .push(format!("Research strategy: {}", plan.explanation));
        if !plan.suggested_structure.is_empty() {
            self.state.insights.push(format!(
                "Suggested structure: {}",
                plan.suggested_structure.join(" → ")
            ));
        }

        // -- searching -------------------------------------------------
        self.state.step = AgentStep::Searching;
        info!(step = %self.state.step, query = %plan.query, "agent step");
        let req = SearchRequest::new(
            plan.query.clone(),
            time,
            1,
            self.config.results_per_page,
        );
        let page = aggregate::aggregate(self.registry, &req, providers, self.config).await?;
        if page.results.is_empty() {
            return Err(AgentError::NoResults);
        }

        // -- analyzing -------------------------------------------------
        self.state.step = AgentStep::Analyzing;
        info!(step = %self.state.step, candidates = page.results.len(), "agent step");
        let mut results = page.results;
        let optimized_prompt = plan.optimized_prompt.clone();
        let ranked_set = retry(retry_policy, || {
            rank::rank(llm, &optimized_prompt, &results, model)
        })
        .await
        .map_err(AgentError::Analyze)?;

        rank::apply_rankings(&mut results, &ranked_set.rankings);
        rank::sort_for_display(&mut results);

        // All-zero means the scorer found nothing relevant, which is a
        // different condition from "some low scores".
        if results.iter().all(|r| r.score == Some(0.0)) {
            return Err(AgentError::NoRelevantResults);
        }

        self.state
            .insights
            .push(format!("Analysis: {}", ranked_set.analysis));
        self.state
            .insights
            .push(format!("Found {} relevant results", results.len()));

        // -- selecting -------------------------------------------------
        self.state.step = AgentStep::Selecting;
        info!(step = %self.state.step, "agent step");
        let selected = select_diverse(&results, self.config.max_selectable, self.config.score_floor);
        if selected.is_empty() {
            return Err(AgentError::SelectionEmpty);
        }

        self.state.selected_ids = selected.iter().map(|r| r.id.clone()).collect();
        let unique_hosts: std::collections::HashSet<_> =
            selected.iter().filter_map(|r| r.host()).collect();
        self.state.insights.push(format!(
            "Selected {} diverse sources from {} unique domains",
            selected.len(),
            unique_hosts.len()
        ));

        // -- generating ------------------------------------------------
        self.state.step = AgentStep::Generating;
        info!(step = %self.state.step, sources = selected.len(), "agent step");
        let gathered = self.gather_content(&selected).await?;

        let report_prompt = format!("{}. Provide comprehensive analysis.", plan.optimized_prompt);
        let report = retry(retry_policy, || {
            generate_report(llm, &gathered, &selected, &report_prompt, model)
        })
        .await
        .map_err(AgentError::Report)?;

        self.state
            .insights
            .push("Report generated successfully".to_string());

        Ok(AgentOutcome {
            report,
            results,
            selected,
        })
    }

    /// Acquire full content for every selected result, fan-out/fan-in.
    ///
    /// Individual failures degrade to the snippet and are tallied; only a
    /// rate limit (after its own retries) aborts the whole batch, and even
    /// then sibling fetches run to completion first.
    async fn gather_content(
        &mut self,
        selected: &[crate::providers::SearchResult],
    ) -> Result<Vec<SelectedContent>, AgentError> {
        self.state.fetch = FetchTally {
            total: selected.len(),
            ..FetchTally::default()
        };

        let fetcher = self.fetcher;
        let retry_policy = self.config.retry;

        let outcomes = join_all(selected.iter().map(|article| async move {
            // Content already in hand (custom/file-backed) needs no fetch.
            if let Some(content) = &article.content {
                return (article, Ok(content.clone()));
            }
            let fetched = retry(retry_policy, || fetcher.fetch_content(&article.url)).await;
            (article, fetched)
        }))
        .await;

        let mut gathered = Vec::with_capacity(outcomes.len());
        let mut rate_limited = false;

        for (article, outcome) in outcomes {
            match outcome {
                Ok(content) if !content.trim().is_empty() => {
                    self.state.fetch.successful += 1;
                    self.state
                        .fetch
                        .statuses
                        .insert(article.url.clone(), FetchOutcome::Fetched);
                    gathered.push(SelectedContent {
                        url: article.url.clone(),
                        title: article.name.clone(),
                        content,
                    });
                }
                outcome => {
                    if let Err(e) = &outcome {
                        if crate::retry::Retryable::is_rate_limited(e) {
                            rate_limited = true;
                        }
                        warn!(url = %article.url, error = %e, "content fetch failed, using snippet");
                    }
                    self.state.fetch.fallback += 1;
                    self.state
                        .fetch
                        .statuses
                        .insert(article.url.clone(), FetchOutcome::Preview);
                    gathered.push(SelectedContent {
                        url: article.url.clone(),
                        title: article.name.clone(),
                        content: article.snippet.clone(),
                    });
                }
            }
        }

        if rate_limited {
            return Err(AgentError::ContentRateLimited);
        }
        Ok(gathered)
    }
}
