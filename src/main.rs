mod agent;
mod aggregate;
mod config;
mod export;
mod fetch;
mod llm;
mod pages;
mod providers;
mod rank;
mod retry;
mod select;
mod session;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Client;
use tracing::{debug, info};

use agent::{Agent, FetchOutcome};
use config::AppConfig;
use fetch::{ContentFetcher, PageFetcher};
use llm::gemini::{DEFAULT_MODEL, GeminiClient};
use llm::report::{Report, SelectedContent, generate_report};
use providers::{ProviderId, ProviderRegistry, SearchResult, TimeFilter};
use retry::{Retryable, retry};
use session::Session;

pub const USER_AGENT: &str = concat!("sift/", env!("CARGO_PKG_VERSION"));

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout covering DNS + connect + response body.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;

#[derive(Parser)]
#[command(name = "sift", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search one or more providers and print the merged results
    Search {
        query: String,
        /// Primary provider
        #[arg(long, value_enum, default_value = "google")]
        provider: ProviderId,
        /// Publication time window
        #[arg(long, value_enum, default_value = "all")]
        time: TimeFilter,
        /// 1-based result page
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Also query the biomedical literature provider and merge
        #[arg(long)]
        pubmed: bool,
        /// Re-rank the full result set with the scoring model
        #[arg(long)]
        prioritize: bool,
        /// Model id for --prioritize
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
    },
    /// Generate a report from explicitly pinned source URLs
    Report {
        prompt: String,
        /// Source URL (repeatable)
        #[arg(long = "url", required = true)]
        urls: Vec<String>,
        /// Model id passed to the generation collaborator
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
        /// Write the report as plain text to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the full research agent and print the generated report
    Research {
        prompt: String,
        /// Model id passed to the generation collaborators
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
        /// Publication time window for the search stage
        #[arg(long, value_enum, default_value = "all")]
        time: TimeFilter,
        /// Primary provider for the search stage
        #[arg(long, value_enum, default_value = "google")]
        provider: ProviderId,
        /// Write the report as plain text to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sift=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;

    let config = AppConfig::default();
    let registry = ProviderRegistry::from_env(http.clone(), &config);

    match cli.command {
        Command::Search {
            query,
            provider,
            time,
            page,
            pubmed,
            prioritize,
            model,
        } => {
            run_search(
                &registry, &config, http, &query, provider, time, page, pubmed, prioritize, &model,
            )
            .await?;
        }
        Command::Report {
            prompt,
            urls,
            model,
            out,
        } => {
            run_report(&registry, &config, http, &prompt, &urls, &model, out).await?;
        }
        Command::Research {
            prompt,
            model,
            time,
            provider,
            out,
        } => {
            run_research(&registry, &config, http, &prompt, &model, time, provider, out).await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_search(
    registry: &ProviderRegistry,
    config: &AppConfig,
    http: Client,
    query: &str,
    provider: ProviderId,
    time: TimeFilter,
    page: u32,
    pubmed: bool,
    prioritize: bool,
    model: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut providers = vec![provider];
    if pubmed && provider != ProviderId::PubMed {
        providers.push(ProviderId::PubMed);
    }

    let mut session = Session::new(registry, config);
    session.search(query, time, &providers).await?;
    if page > 1 {
        session.go_to_page(page).await?;
    }

    if prioritize {
        let llm = GeminiClient::from_env(http)?;
        let analysis = session.reprioritize(&llm, model).await?;
        eprintln!("• {analysis}");
    }

    print_results(session.results());

    let store = session.store();
    let mode = if store.is_prioritized() {
        " (prioritized)"
    } else {
        ""
    };
    println!(
        "\nPage {}/{} — about {} results{mode}",
        store.current_page(),
        store.total_pages(),
        store.total_results(),
    );
    Ok(())
}

fn print_results(results: &[SearchResult]) {
    for (i, result) in results.iter().enumerate() {
        let tag = result
            .source
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default();
        let score = result
            .score
            .map(|s| format!(" ({s:.2})"))
            .unwrap_or_default();
        println!("{}. {}{}{}", i + 1, result.name, tag, score);
        println!("   {}", result.url);
        if !result.snippet.is_empty() {
            println!("   {}", result.snippet);
        }
    }
}

async fn run_report(
    registry: &ProviderRegistry,
    config: &AppConfig,
    http: Client,
    prompt: &str,
    urls: &[String],
    model: &str,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let llm = GeminiClient::from_env(http.clone())?;
    let fetcher = PageFetcher::new(http);

    let mut session = Session::new(registry, config);
    for url in urls {
        session.add_custom_url(url)?;
    }
    let ids: Vec<String> = session.results().iter().map(|r| r.id.clone()).collect();
    for id in &ids {
        session.toggle_selection(id);
    }

    let selected: Vec<SearchResult> = session
        .results()
        .iter()
        .filter(|r| session.selected_ids().contains(&r.id))
        .cloned()
        .collect();

    let mut gathered = Vec::with_capacity(selected.len());
    for article in &selected {
        let content = match retry(config.retry, || fetcher.fetch_content(&article.url)).await {
            Ok(c) if !c.trim().is_empty() => c,
            Err(e) if e.is_rate_limited() => return Err(e.into()),
            _ => {
                eprintln!("could not fetch {}, using preview text", article.url);
                article.snippet.clone()
            }
        };
        gathered.push(SelectedContent {
            url: article.url.clone(),
            title: article.name.clone(),
            content,
        });
    }

    let report_prompt = format!("{prompt}. Provide comprehensive analysis.");
    let report = retry(config.retry, || {
        generate_report(&llm, &gathered, &selected, &report_prompt, model)
    })
    .await?;

    emit_report(&report, out)
}

#[allow(clippy::too_many_arguments)]
async fn run_research(
    registry: &ProviderRegistry,
    config: &AppConfig,
    http: Client,
    prompt: &str,
    model: &str,
    time: TimeFilter,
    provider: ProviderId,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let llm = GeminiClient::from_env(http.clone())?;
    let fetcher = PageFetcher::new(http);
    let mut agent = Agent::new(registry, &llm, &fetcher, config);

    info!(prompt, model, "starting research run");
    let outcome = agent.run(prompt, model, time, &[provider]).await;

    for query in &agent.state.search_queries {
        eprintln!("• Search query: {query}");
    }
    for insight in &agent.state.insights {
        eprintln!("• {insight}");
    }
    debug!(selected = agent.state.selected_ids.len(), "agent selection");

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(message) = &agent.state.last_error {
                eprintln!("agent run failed: {message}");
            }
            return Err(e.into());
        }
    };

    eprintln!(
        "• Retrieved {} results, selected {}",
        outcome.results.len(),
        outcome.selected.len()
    );
    eprintln!(
        "• Sources: {} fetched, {} snippet fallback",
        agent.state.fetch.successful, agent.state.fetch.fallback
    );
    for (url, status) in &agent.state.fetch.statuses {
        let label = match status {
            FetchOutcome::Fetched => "fetched",
            FetchOutcome::Preview => "preview",
        };
        eprintln!("  - {url}: {label}");
    }

    emit_report(&outcome.report, out)
}

fn emit_report(report: &Report, out: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let text = export::report_to_text(report);
    match out {
        Some(path) => {
            std::fs::write(&path, &text)?;
            eprintln!("report written to {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}
