use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod config;
mod driver;
mod extract;
mod harvest;
mod models;
mod query;
mod retry;
mod runner;
mod store;

use config::Config;
use driver::webdriver::WebDriverFactory;
use store::xlsx::XlsxStore;

// ── Command line ────────────────────────────────────────────────────────────

/// Collect PubMed abstracts for every kinase listed in a spreadsheet.
///
/// Flags override the KINASE_* environment variables.
#[derive(Debug, Parser)]
#[command(name = "kinase-abstracts", version, about)]
struct Cli {
    /// Input workbook with a kinase column
    input: Option<PathBuf>,

    /// Output workbook (a `_partial` sibling is used for checkpoints)
    output: Option<PathBuf>,

    /// Name of the kinase column (default: first header containing "kinase")
    #[arg(long)]
    column: Option<String>,

    /// Maximum papers collected per kinase
    #[arg(long)]
    max_papers: Option<usize>,

    /// Write a checkpoint after every N kinases
    #[arg(long)]
    checkpoint_every: Option<usize>,

    /// User recorded in the metadata sheet
    #[arg(long)]
    user: Option<String>,

    /// WebDriver server URL (chromedriver)
    #[arg(long)]
    webdriver_url: Option<String>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(input) = self.input {
            config.input_path = input;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if self.column.is_some() {
            config.kinase_column = self.column;
        }
        if let Some(max) = self.max_papers {
            config.max_papers_per_kinase = max;
        }
        if let Some(every) = self.checkpoint_every {
            config.checkpoint_every = every;
        }
        if let Some(user) = self.user {
            config.user_name = user;
        }
        if let Some(url) = self.webdriver_url {
            config.webdriver_url = url;
        }
        config.headless |= self.headless;
    }
}

// ── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Invalid configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing::info!("Starting PubMed kinase scraper");
    tracing::info!("Current directory: {}", std::env::current_dir()?.display());

    let store = XlsxStore;
    let factory = WebDriverFactory::new(
        config.webdriver_url.clone(),
        config.effective_browser_args(),
    );
    let summary = runner::run_from_store(&factory, &store, &config).await?;
    if summary.kinases_listed == 0 {
        return Ok(());
    }

    tracing::info!(
        "Processed {} of {} kinases, {} with abstracts{}",
        summary.kinases_attempted,
        summary.kinases_listed,
        summary.results_written,
        if summary.stopped_early { " (stopped early)" } else { "" }
    );
    if let Some(path) = &summary.final_output {
        tracing::info!("Results: {}", path.display());
    }
    if let Some(path) = &summary.last_checkpoint {
        tracing::info!("Last checkpoint: {}", path.display());
    }

    Ok(())
}
