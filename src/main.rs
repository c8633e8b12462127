mod api;
mod db;
mod fetch;
mod inspect;
mod opinion;
mod parser;
mod pipeline;
mod settings;
mod summary;
mod text;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use tracing::info;

use fetch::{Fetcher, HttpFetcher, RenderFetcher};
use parser::court::CourtIdentity;
use parser::PageExtractor;
use pipeline::Pipeline;
use settings::{CourtConfig, Renderer, Settings, SourceConfig};

#[derive(Parser)]
#[command(name = "fl_opinions", about = "Florida appellate opinion scraper")]
struct Cli {
    /// Settings file (default: ./fl_opinions.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Capture database
    #[arg(long, global = true, default_value = db::DEFAULT_DB_PATH)]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every enabled court and print the opinions as JSON
    Run {
        /// Lookback window in days (overrides settings)
        #[arg(short, long, value_parser = clap::value_parser!(i64).range(0..=settings::MAX_LOOKBACK_DAYS))]
        lookback: Option<i64>,
        /// Only these courts (repeatable); may name disabled courts
        #[arg(short, long)]
        court: Vec<String>,
        /// Download each opinion PDF and extract its text
        #[arg(long)]
        with_text: bool,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// JSON object of unique_id -> summary to attach
        #[arg(long)]
        summaries: Option<PathBuf>,
        /// Program run per opinion: request JSON on stdin, summary on stdout
        #[arg(long)]
        summarize_with: Option<String>,
    },
    /// Fetch listing pages into the capture DB and describe their structure
    Capture {
        /// Only these courts (default: all configured)
        #[arg(short, long)]
        court: Vec<String>,
    },
    /// Re-run the page extractor over stored captures
    Reparse {
        /// Max captures to parse (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(short, long)]
        court: Option<String>,
        /// Lookback window in days, counted from each capture time
        #[arg(short, long, value_parser = clap::value_parser!(i64).range(0..=settings::MAX_LOOKBACK_DAYS))]
        lookback: Option<i64>,
    },
    /// Show capture statistics
    Stats,
    /// List configured courts and their sources
    Courts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = settings::load(cli.config.as_deref()).context("loading settings")?;

    let result = match cli.command {
        Commands::Run {
            lookback,
            court,
            with_text,
            output,
            summaries,
            summarize_with,
        } => {
            if let Some(days) = lookback {
                settings.lookback_days = days;
            }
            check_courts(&settings, &court)?;

            let pages = page_fetcher(&settings)?;
            let data = data_fetcher(&settings)?;
            let pipeline = Pipeline::new(&settings, pages.as_ref(), &data);
            let mut report = pipeline.run(Local::now().naive_local(), &court).await;

            if with_text {
                let docs = HttpFetcher::new(
                    &settings.user_agent,
                    std::time::Duration::from_secs(settings.document_timeout_secs),
                )?;
                text::enrich_text(&docs, &mut report.opinions, settings.text_delay()).await;
            }
            if let Some(path) = summaries {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let map: HashMap<String, String> = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?;
                let applied = summary::apply_summaries(&mut report.opinions, &map);
                info!("Applied {} of {} summaries", applied, map.len());
            }
            if let Some(command) = summarize_with {
                let summarizer =
                    summary::CommandSummarizer::from_command_line(&command, settings.summarize_timeout())
                        .context("--summarize-with needs a command")?;
                summary::summarize_all(&summarizer, &mut report.opinions, settings.text_delay()).await;
            }

            eprintln!("{:<24} | {:>8}", "Court", "Opinions");
            eprintln!("{}", "-".repeat(35));
            for (key, count) in &report.per_court {
                eprintln!("{:<24} | {:>8}", key, count);
            }
            for failure in &report.failures {
                eprintln!("FAILED {}: {}", failure.court, failure.errors.join("; "));
            }

            let json = serde_json::to_string_pretty(&report.opinions)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("Wrote {} opinions to {}", report.opinions.len(), path.display());
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        Commands::Capture { court } => {
            check_courts(&settings, &court)?;
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let pages = page_fetcher(&settings)?;
            let courts: Vec<&CourtConfig> = if court.is_empty() {
                settings.courts.iter().collect()
            } else {
                court.iter().filter_map(|k| settings.court(k)).collect()
            };
            capture(&conn, &settings, pages.as_ref(), &courts).await
        }
        Commands::Reparse {
            limit,
            court,
            lookback,
        } => {
            if let Some(days) = lookback {
                settings.lookback_days = days;
            }
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let captures = db::fetch_captures(&conn, court.as_deref(), limit)?;
            if captures.is_empty() {
                println!("No captures stored. Run 'capture' first.");
                return Ok(());
            }
            println!("Parsing {} captures...", captures.len());
            reparse(&conn, &settings, &captures)
        }
        Commands::Stats => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Captures:      {}", s.captures);
            println!("Errors:        {}", s.errors);
            println!("Courts:        {}", s.courts);
            println!("Parsed:        {}", s.parsed);
            println!("With opinions: {}", s.with_opinions);
            for (strategy, count) in &s.by_strategy {
                println!("  {:<16} {}", strategy, count);
            }
            Ok(())
        }
        Commands::Courts => {
            for c in &settings.courts {
                let state = if c.enabled { "enabled" } else { "disabled" };
                println!("{} ({}, {}) [{}]", c.key, c.name, c.short_name, state);
                for s in &c.sources {
                    match s {
                        SourceConfig::Api { upstream } => println!("  api    {}", upstream),
                        SourceConfig::Page { label, url } => println!("  {:<6} {}", label, url),
                    }
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn check_courts(settings: &Settings, keys: &[String]) -> anyhow::Result<()> {
    if let Some(unknown) = keys.iter().find(|k| settings.court(k).is_none()) {
        anyhow::bail!("unknown court '{}' (see `fl_opinions courts`)", unknown);
    }
    Ok(())
}

fn page_fetcher(settings: &Settings) -> anyhow::Result<Box<dyn Fetcher>> {
    Ok(match settings.renderer {
        Renderer::Http => Box::new(HttpFetcher::new(
            &settings.user_agent,
            std::time::Duration::from_secs(settings.request_timeout_secs),
        )?),
        Renderer::Spider => Box::new(RenderFetcher::from_env()?),
    })
}

fn data_fetcher(settings: &Settings) -> anyhow::Result<HttpFetcher> {
    let fetcher = HttpFetcher::new(
        &settings.user_agent,
        std::time::Duration::from_secs(settings.request_timeout_secs),
    )?;
    Ok(match &settings.api.token {
        Some(token) => fetcher.with_token(&settings.api.base_url, token),
        None => fetcher,
    })
}

async fn capture(
    conn: &rusqlite::Connection,
    settings: &Settings,
    pages: &dyn Fetcher,
    courts: &[&CourtConfig],
) -> anyhow::Result<()> {
    let mut summary_lines = Vec::new();
    let mut first = true;
    for court in courts {
        for source in &court.sources {
            let SourceConfig::Page { label, url } = source else {
                continue;
            };
            if !first {
                tokio::time::sleep(settings.page_delay()).await;
            }
            first = false;

            println!("\n{}", "=".repeat(60));
            println!("[{}] Fetching {}: {}", court.key, label, url);
            let row = match pages.fetch(url).await {
                Ok(fetched) => {
                    let html = fetched.text();
                    let page = inspect::inspect(&html);
                    println!("  Status: {}", fetched.status);
                    println!("{}", page);
                    summary_lines.push(format!(
                        "[{} - {}] Status={}, {}",
                        court.key,
                        label,
                        fetched.status,
                        page.headline()
                    ));
                    db::CaptureRow {
                        court_key: court.key.clone(),
                        label: label.clone(),
                        url: url.clone(),
                        html: Some(html),
                        status: Some(i32::from(fetched.status)),
                        error: None,
                        latency_ms: Some(fetched.latency_ms),
                    }
                }
                Err(e) => {
                    println!("  ERROR: {}", e);
                    summary_lines.push(format!("[{} - {}] ERROR: {}", court.key, label, e));
                    db::CaptureRow {
                        court_key: court.key.clone(),
                        label: label.clone(),
                        url: url.clone(),
                        html: None,
                        status: None,
                        error: Some(e.to_string()),
                        latency_ms: None,
                    }
                }
            };
            db::save_capture(conn, &row)?;
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("SUMMARY");
    println!("{}", "=".repeat(60));
    for line in &summary_lines {
        println!("{}", line);
    }
    Ok(())
}

fn reparse(
    conn: &rusqlite::Connection,
    settings: &Settings,
    captures: &[db::StoredCapture],
) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(captures.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let extractor = PageExtractor::new(settings.cascade);
    let mut total = 0usize;
    let mut lines = Vec::new();
    for chunk in captures.chunks(500) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|c| reparse_one(c, &extractor, settings))
            .collect();

        let mut rows = Vec::with_capacity(results.len());
        for (capture, extraction) in chunk.iter().zip(results) {
            total += extraction.opinions.len();
            lines.push(format!(
                "{:>5} | {:<22} | {:<8} | {:<14} | {:>4}",
                capture.id,
                capture.court_key,
                capture.label,
                extraction.strategy.unwrap_or("-"),
                extraction.opinions.len()
            ));
            rows.push(db::ExtractionRow {
                capture_id: capture.id,
                strategy: extraction.strategy.map(str::to_string),
                opinion_count: extraction.opinions.len(),
            });
        }
        db::save_extractions(conn, &rows)?;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    println!(
        "{:>5} | {:<22} | {:<8} | {:<14} | {:>4}",
        "#", "Court", "Source", "Strategy", "Ops"
    );
    println!("{}", "-".repeat(64));
    for line in &lines {
        println!("{}", line);
    }
    println!("\n{} opinions from {} captures.", total, captures.len());
    Ok(())
}

/// The window is anchored at capture time so old captures still parse.
fn reparse_one(
    capture: &db::StoredCapture,
    extractor: &PageExtractor,
    settings: &Settings,
) -> parser::Extraction {
    let now = NaiveDateTime::parse_from_str(&capture.captured_at, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Local::now().naive_local());
    let window = opinion::Window::new(now, settings.lookback_days, settings.undated);

    let (identity, base_url) = match settings.court(&capture.court_key) {
        Some(c) => (CourtIdentity::from_config(c), c.base_url.clone()),
        None => (
            CourtIdentity {
                id: capture.court_key.clone(),
                name: capture.court_key.clone(),
                short_name: capture.court_key.clone(),
            },
            url::Url::parse(&capture.url)
                .map(|u| u.origin().ascii_serialization())
                .unwrap_or_default(),
        ),
    };
    extractor.extract(&capture.html, &identity, &base_url, &capture.url, &window)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
