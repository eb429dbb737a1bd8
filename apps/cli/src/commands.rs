//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use enricher_core::{EnrichmentPipeline, PipelineConfig, ProgressReporter, PromptStore, RunSummary};
use enricher_providers::{OpenAiClient, PerplexityClient};
use enricher_shared::{
    AppConfig, init_config, load_config, load_config_from, resolve_api_key, validate_config,
};
use enricher_warehouse::Warehouse;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Company enricher: fill, normalize and load company records.
#[derive(Parser)]
#[command(
    name = "enricher",
    version,
    about = "Enrich company records with LLM-retrieved fields and load them into the warehouse.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.enricher/enricher.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich every unprocessed record, chunk by chunk.
    Run {
        /// Records per chunk (overrides `enrichment.chunk_size`).
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "enricher=info",
        1 => "enricher=debug",
        _ => "enricher=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { chunk_size } => cmd_run(config_path, chunk_size).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, chunk_size: Option<usize>) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(size) = chunk_size {
        config.enrichment.chunk_size = size;
    }
    // Fail fast before any network or warehouse access.
    validate_config(&config)?;

    let search = PerplexityClient::new(
        &config.search,
        resolve_api_key(&config.search.api_key_env)?,
    )?;
    let generative = OpenAiClient::new(
        &config.generative,
        resolve_api_key(&config.generative.api_key_env)?,
    )?;
    let prompts = PromptStore::from_dir(config.enrichment.prompt_dir.as_deref().map(Path::new))?;
    let warehouse = Warehouse::open(Path::new(&config.warehouse.root_dir)).await?;

    let enrichment = &config.enrichment;
    info!(
        warehouse = %config.warehouse.root_dir,
        source = %format!("{}.{}", enrichment.unprocessed_dataset, enrichment.unprocessed_table),
        destination = %format!("{}.{}", enrichment.processed_dataset, enrichment.processed_table),
        chunk_size = enrichment.chunk_size,
        "starting enrichment"
    );

    let pipeline = EnrichmentPipeline::new(
        PipelineConfig::from(&config),
        Arc::new(warehouse),
        Arc::new(search),
        Arc::new(generative),
        Arc::new(prompts),
    );

    let reporter = CliProgress::new()?;
    let result = pipeline.run(None, &reporter).await;
    reporter.spinner.finish_and_clear();
    let summary = result?;

    // Print summary
    println!();
    if summary.selected == 0 {
        println!("  Nothing to enrich: every record is already processed.");
    } else {
        println!("  Enrichment complete!");
        println!("  Run:        {}", summary.run_id);
        println!("  Selected:   {}", summary.selected);
        println!("  Chunks:     {}", summary.chunks_completed);
        println!("  Rows:       {}", summary.rows_loaded);
        println!("  Lookups:    {}", summary.retrieval_calls);
        println!("  Repairs:    {}", summary.repair_requests);
        println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn chunk_started(&self, current: usize, total: usize, records: usize) {
        self.spinner.set_prefix(format!("[{current}/{total}]"));
        self.spinner.set_message(format!("Processing {records} records"));
    }

    fn chunk_loaded(&self, current: usize, total: usize, rows: u64) {
        self.spinner.println(format!("  chunk {current}/{total}: loaded {rows} rows"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
