use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use journal_swiper::config::{load_config, AppConfig, LogFormat};
use journal_swiper::download::{download_articles, DownloadOutcome};
use journal_swiper::fetch::HttpFetcher;
use journal_swiper::models::Article;
use journal_swiper::settings::{SettingsConfig, SettingsReader};
use journal_swiper::utils::HttpClient;
use journal_swiper::walker::{CancelToken, RunSummary, Walker};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Journal Swiper - Crawl a journal's table of contents and collect its articles
#[derive(Parser, Debug)]
#[command(name = "journal-swiper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "GlocktopusPrime")]
#[command(about = "Crawl a journal's table of contents and collect its articles", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Modes settings file, overriding the configured path
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the modes stored in the settings file
    Modes,

    /// Walk a table of contents with a mode and list the articles found
    #[command(alias = "c")]
    Crawl {
        /// Name of the mode to use
        mode: String,

        /// URL of the table-of-contents page
        url: String,

        /// Download each article's PDF after the walk
        #[arg(long, short)]
        download: bool,

        /// Directory for downloaded PDFs (default: from configuration)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Maximum number of concurrent fetches
        #[arg(long, short)]
        workers: Option<usize>,

        /// Overall time budget for the walk, in seconds
        #[arg(long)]
        budget: Option<u64>,
    },
}

fn init_tracing(cli: &Cli, config: &AppConfig) {
    let level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    let json = config.logging.format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("journal_swiper={}", level)),
        ))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&cli, &config);

    if let Some(path) = &cli.config {
        tracing::debug!("Using config file: {}", path.display());
    }

    let settings = match &cli.settings {
        Some(path) => SettingsConfig::new(path),
        None => config.settings_config(),
    };

    match &cli.command {
        Commands::Modes => {
            let reader = SettingsReader::open(&settings)
                .with_context(|| format!("Failed to read {}", settings.path.display()))?;
            output_modes(&reader, cli.output.resolve())?;
        }

        Commands::Crawl {
            mode,
            url,
            download,
            dir,
            workers,
            budget,
        } => {
            let reader = SettingsReader::open(&settings)
                .with_context(|| format!("Failed to read {}", settings.path.display()))?;
            let mode = Arc::new(
                reader
                    .mode(mode)
                    .with_context(|| format!("Invalid mode '{}'", mode))?,
            );

            let client = HttpClient::with_user_agent(&config.fetch.user_agent)?;
            let fetcher = Arc::new(HttpFetcher::new(client).with_retry(config.retry_config()));

            let mut options = config.walk_options();
            if let Some(workers) = workers {
                options = options.workers((*workers).max(1));
            }
            if let Some(budget) = budget {
                options = options.time_budget(Duration::from_secs(*budget));
            }

            // The walk's token is also cancelled by the time budget; `interrupted`
            // only by Ctrl-C
            let cancel = CancelToken::new();
            let interrupted = CancelToken::new();
            {
                let cancel = cancel.clone();
                let interrupted = interrupted.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("Interrupted, finishing in-flight fetches");
                        interrupted.cancel();
                        cancel.cancel();
                    }
                });
            }

            let walker = Walker::new(fetcher.clone(), options);
            let report = walker.run_with_cancel(mode, url, cancel).await;

            output_articles(&report.articles, cli.output.resolve())?;
            if !cli.quiet {
                print_summary(&report.summary);
            }

            if should_download(*download, &interrupted) {
                let directory = dir.clone().unwrap_or_else(|| config.downloads.directory.clone());
                let outcomes = download_articles(
                    fetcher.as_ref(),
                    &report.articles,
                    &directory,
                    config.fetch_timeout(),
                )
                .await?;
                if !cli.quiet {
                    print_downloads(&outcomes);
                }
            }
        }
    }

    Ok(())
}

/// Downloads are skipped once the user has interrupted the crawl
fn should_download(requested: bool, interrupted: &CancelToken) -> bool {
    if requested && interrupted.is_cancelled() {
        tracing::warn!("Crawl was interrupted, skipping PDF downloads");
        return false;
    }
    requested
}

fn output_modes(reader: &SettingsReader, format: OutputFormat) -> Result<()> {
    let names = reader.mode_names();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
        OutputFormat::Plain => {
            for name in names {
                println!("{}", name);
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Mode", "Steps"]);
            for name in names {
                let steps = reader
                    .load_mode(name)
                    .map(|raw| raw.nsteps.to_string())
                    .unwrap_or_default();
                table.add_row(vec![Cell::new(name), Cell::new(steps)]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn output_articles(articles: &[Article], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(articles)?);
        }
        OutputFormat::Plain => {
            for (i, article) in articles.iter().enumerate() {
                println!(
                    "{:>3}. {}",
                    i + 1,
                    article.title.as_deref().unwrap_or("(untitled)")
                );
                if !article.authors.is_empty() {
                    println!("     Authors: {}", article.author_line());
                }
                if let Some(ref doi) = article.citation.doi {
                    println!("     DOI: {}", doi);
                }
                if let Some(ref pdf) = article.pdf_link {
                    println!("     PDF: {}", pdf);
                }
                if let Some(ref page) = article.article_page_link {
                    println!("     Page: {}", page);
                }
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["#", "Title", "Authors", "Year", "PDF"]);

            for (i, article) in articles.iter().enumerate() {
                table.add_row(vec![
                    Cell::new(i + 1),
                    Cell::new(shorten(article.title.as_deref().unwrap_or(""), 50))
                        .add_attribute(Attribute::Bold),
                    Cell::new(shorten(&article.author_line(), 30)),
                    Cell::new(article.citation.year.as_deref().unwrap_or("")),
                    Cell::new(if article.has_pdf() { "yes" } else { "no" }),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    eprintln!(
        "Mode '{}': {} branches in {:.1}s, {} failed, {} empty expansions, {} records dropped{}",
        summary.mode,
        summary.branches,
        summary.elapsed.as_secs_f64(),
        summary.failed.len(),
        summary.empty_expansions.len(),
        summary.dropped_records,
        if summary.cancelled {
            format!(
                " (cancelled: {} skipped, {} discarded)",
                summary.skipped, summary.discarded
            )
        } else {
            String::new()
        }
    );
    for issue in &summary.failed {
        eprintln!("  step {}: {}", issue.step_index, issue.error);
    }
}

fn print_downloads(outcomes: &[DownloadOutcome]) {
    let saved = outcomes.iter().filter(|o| o.is_success()).count();
    eprintln!("Downloaded {} of {} PDFs", saved, outcomes.len());
    for outcome in outcomes.iter().filter(|o| !o.is_success()) {
        if let Err(e) = &outcome.result {
            eprintln!(
                "  {:>3}. {}: {}",
                outcome.position,
                outcome.title.as_deref().unwrap_or("(untitled)"),
                e
            );
        }
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_crawl_args() {
        let cli = Cli::parse_from([
            "journal-swiper",
            "crawl",
            "Example",
            "http://journal.test/toc",
            "--download",
            "--workers",
            "4",
            "--budget",
            "60",
        ]);
        assert_eq!(cli.output, OutputFormat::Auto);
        match cli.command {
            Commands::Crawl {
                mode,
                url,
                download,
                workers,
                budget,
                dir,
            } => {
                assert_eq!(mode, "Example");
                assert_eq!(url, "http://journal.test/toc");
                assert!(download);
                assert_eq!(workers, Some(4));
                assert_eq!(budget, Some(60));
                assert!(dir.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["journal-swiper", "-vv", "modes"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);

        let cli = Cli::parse_from(["journal-swiper", "modes", "--output", "json", "-q"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.quiet);
    }

    #[test]
    fn test_no_downloads_after_interrupt() {
        let interrupted = CancelToken::new();
        assert!(should_download(true, &interrupted));
        assert!(!should_download(false, &interrupted));

        interrupted.cancel();
        assert!(!should_download(true, &interrupted));
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("short", 10), "short");
        assert_eq!(shorten("ééééééééééé", 6), "ééé...");
    }
}
