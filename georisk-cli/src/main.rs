//! GeoRisk CLI
//!
//! Classifies news articles into low/medium/high geopolitical risk.
//! Results are written to stdout as JSON, logs to stderr.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn, Level};
use tracing_subscriber::FmtSubscriber;

use georisk_core::{ArticleInput, RiskResult};
use georisk_providers::{AnalyzeOptions, RiskService, ServiceConfig};

#[derive(Parser)]
#[command(name = "georisk")]
#[command(author, version, about = "GeoRisk: geopolitical risk classification for news articles", long_about = None)]
struct Cli {
    /// Service configuration file (providers, weights, thresholds)
    #[arg(short, long, env = "GEORISK_CONFIG")]
    config: Option<PathBuf>,

    /// Article headline
    #[arg(short, long, required_unless_present = "stdin")]
    title: Option<String>,

    /// Article body
    #[arg(long, default_value = "")]
    content: String,

    /// Country the article is about
    #[arg(long)]
    country: Option<String>,

    /// Language for the reasoning text
    #[arg(long)]
    language: Option<String>,

    /// Give up on remote providers after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Read the article as a JSON document from stdin
    #[arg(long, conflicts_with = "title")]
    stdin: bool,

    /// Skip remote providers
    #[arg(long)]
    local_only: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServiceConfig::default(),
    };

    let service = Arc::new(RiskService::init(config).context("Failed to start risk service")?);

    let available = service.providers().iter().filter(|p| p.available).count();
    debug!(providers = available, local_only = cli.local_only, "Risk service ready");

    // Ctrl-C aborts provider calls; pending articles still get local results
    let watcher = Arc::clone(&service);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with local analysis");
            watcher.shutdown();
        }
    });

    let options = AnalyzeOptions {
        deadline: cli.deadline_ms.map(Duration::from_millis),
        cancel: None,
    };

    let article = if cli.stdin {
        article_from_stdin(&cli)?
    } else {
        article_from_args(&cli)
    };
    let result = classify(&service, &article, &cli, &options).await;
    emit(&result, cli.pretty)?;

    service.shutdown();
    Ok(())
}

fn article_from_args(cli: &Cli) -> ArticleInput {
    let mut article = ArticleInput::new(cli.title.as_deref().unwrap_or_default(), &cli.content);
    if let Some(country) = &cli.country {
        article = article.with_country(country);
    }
    if let Some(language) = &cli.language {
        article = article.with_language(language);
    }
    article
}

async fn classify(service: &RiskService, article: &ArticleInput, cli: &Cli, options: &AnalyzeOptions) -> RiskResult {
    if cli.local_only {
        service.analyze_local(article)
    } else {
        service.analyze_with(article, options.clone()).await
    }
}

fn article_from_stdin(cli: &Cli) -> Result<ArticleInput> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input).context("Failed to read stdin")?;

    let mut article: ArticleInput =
        serde_json::from_str(&input).context("stdin is not a JSON article")?;
    // Flags fill in what the document leaves out
    if article.country().is_none() {
        article.country = cli.country.clone();
    }
    if article.language().is_none() {
        article.language = cli.language.clone();
    }
    Ok(article)
}

fn emit(result: &RiskResult, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}
