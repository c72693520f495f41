//! `prowl` - discover product pages across e-commerce domains.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use prowl_core::{AppConfig, BrowserKind, CrawlStatus, Domain};
use prowl_crawler::{CrawlEngine, DomainReport};
use prowl_rules::Rulebook;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "prowl")]
#[command(about = "Discover product pages across e-commerce domains")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "PROWL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl domains and export the product URLs found
    Crawl {
        /// Domains to crawl, replacing the configured list
        domains: Vec<String>,
        /// Where to write the JSON results
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Rendering engine
        #[arg(long, value_enum)]
        engine: Option<EngineArg>,
        /// Show the browser window (needed to solve CAPTCHAs by hand)
        #[arg(long)]
        headed: bool,
        /// Extra rule file layered over the built-in tables
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Chromium,
    Static,
}

impl From<EngineArg> for BrowserKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Chromium => Self::Chromium,
            EngineArg::Static => Self::Static,
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,prowl=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            domains,
            output,
            engine,
            headed,
            rules,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if !domains.is_empty() {
                config.crawl.domains = domains
                    .iter()
                    .map(|d| Domain::parse(d))
                    .collect::<Result<Vec<_>, _>>()
                    .context("invalid domain argument")?;
            }
            if let Some(output) = output {
                config.output.results_path = output;
            }
            if let Some(engine) = engine {
                config.browser.engine = engine.into();
            }
            if headed {
                config.browser.headless = false;
            }
            if rules.is_some() {
                config.rules.file = rules;
            }
            config.validate().context("invalid configuration")?;
            if config.crawl.domains.is_empty() {
                bail!("no domains to crawl: pass them as arguments or set crawl.domains");
            }

            crawl(config).await
        }
        Commands::Init { force } => init(force),
        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load().context("loading config")?,
    };
    Ok(config.with_env_overrides())
}

fn init(force: bool) -> anyhow::Result<()> {
    let path = AppConfig::config_path()?;
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AppConfig::default().save()?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn crawl(config: AppConfig) -> anyhow::Result<()> {
    let rules = match &config.rules.file {
        Some(path) => Rulebook::with_file(path)
            .with_context(|| format!("loading rules from {}", path.display()))?,
        None => Rulebook::builtin().context("building rule tables")?,
    };

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping crawl");
                shutdown.cancel();
            }
        }
    });

    info!(
        domains = config.crawl.domains.len(),
        engine = ?config.browser.engine,
        max_urls = config.crawl.max_urls_per_domain,
        max_depth = config.crawl.max_depth,
        "starting crawl"
    );

    let engine = CrawlEngine::new(config.clone(), Arc::new(rules));
    let reports = engine.run(&shutdown).await;

    let path = &config.output.results_path;
    engine
        .store()
        .export(path)
        .with_context(|| format!("writing results to {}", path.display()))?;

    for report in &reports {
        summarize(report);
    }
    let total: usize = reports.iter().map(|r| r.products).sum();
    println!("{total} product URLs written to {}", path.display());

    if !reports.is_empty() && reports.iter().all(|r| r.status == CrawlStatus::Failed) {
        bail!("every domain failed");
    }
    Ok(())
}

fn summarize(report: &DomainReport) {
    info!(
        domain = %report.domain,
        session_id = %report.session_id,
        status = report.status.display_name(),
        visited = report.visited,
        products = report.products,
        failed = report.failed,
        duration = ?report.duration,
        "domain summary"
    );
    if report.status == CrawlStatus::Failed {
        warn!(domain = %report.domain, "session aborted, results are partial");
    }
}
