//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use recap_core::pipeline::{ProgressReporter, RunConfig, RunResult, Tables};
use recap_extract::{ExtractOptions, builtin_rules_toml};
use recap_recommend::builtin_catalog_toml;
use recap_shared::{AppConfig, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// recap — turn meeting transcripts into owned action items and resources.
#[derive(Parser)]
#[command(
    name = "recap",
    version,
    about = "Extract action items from meeting transcripts and recommend resources for each.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Table overrides shared by `run` and `check`.
#[derive(clap::Args, Debug, Clone, Default)]
pub(crate) struct TableArgs {
    /// Config file (defaults to ~/.recap/recap.toml).
    #[arg(long, env = "RECAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Extraction rule table (TOML). Overrides the config file.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Knowledge base catalog (TOML). Overrides the config file.
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process every transcript under a directory.
    Run {
        /// Directory of .tsv/.csv/.txt transcripts (searched recursively).
        input: PathBuf,

        /// Output directory (defaults to `defaults.output_dir` from config).
        output: Option<PathBuf>,

        #[command(flatten)]
        tables: TableArgs,

        /// Meetings processed in parallel.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Drop action items at or below this confidence.
        #[arg(long)]
        min_confidence: Option<f64>,
    },

    /// Load and validate the rule table and knowledge base.
    Check {
        #[command(flatten)]
        tables: TableArgs,
    },

    /// Verify an output directory against its manifest checksums.
    Verify {
        /// Output directory from a previous run.
        output: PathBuf,
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
    Show {
        /// Config file (defaults to ~/.recap/recap.toml).
        #[arg(long, env = "RECAP_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print the built-in extraction rule table.
    Rules,
    /// Print the built-in knowledge base catalog.
    Catalog,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "recap=info",
        1 => "recap=debug",
        _ => "recap=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            input,
            output,
            tables,
            concurrency,
            min_confidence,
        } => cmd_run(&input, output, &tables, concurrency, min_confidence).await,
        Command::Check { tables } => cmd_check(&tables),
        Command::Verify { output } => cmd_verify(&output),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()),
            ConfigAction::Rules => {
                print!("{}", builtin_rules_toml());
                Ok(())
            }
            ConfigAction::Catalog => {
                print!("{}", builtin_catalog_toml());
                Ok(())
            }
        },
    }
}

/// Load config from `--config` when given, else the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Apply table path overrides (flags beat the config file).
fn apply_table_args(config: &mut AppConfig, args: &TableArgs) {
    if let Some(rules) = &args.rules {
        config.extraction.rules_path = Some(rules.to_string_lossy().into_owned());
    }
    if let Some(catalog) = &args.catalog {
        config.recommendation.knowledge_base_path = Some(catalog.to_string_lossy().into_owned());
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    input: &Path,
    output: Option<PathBuf>,
    table_args: &TableArgs,
    concurrency: Option<usize>,
    min_confidence: Option<f64>,
) -> Result<()> {
    let mut config = resolve_config(table_args.config.as_deref())?;
    apply_table_args(&mut config, table_args);
    if let Some(n) = concurrency {
        config.defaults.concurrency = n;
    }
    if let Some(c) = min_confidence {
        config.extraction.min_confidence = c;
    }
    config.validate()?;

    // Tables are loaded before anything touches the output directory.
    let tables = Tables::from_config(&config)?;

    let output_dir = output.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    if !input.is_dir() {
        return Err(eyre!("input '{}' is not a directory", input.display()));
    }

    let run_config = RunConfig {
        input_dir: input.to_path_buf(),
        output_dir,
        concurrency: config.defaults.concurrency,
        extract: ExtractOptions::from(&config.extraction),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    info!(
        input = %run_config.input_dir.display(),
        output = %run_config.output_dir.display(),
        concurrency = run_config.concurrency,
        "processing transcripts"
    );

    let reporter = CliProgress::new();
    let result = recap_core::pipeline::run(&run_config, &tables, &reporter).await?;

    println!();
    println!("  Run complete!");
    println!("  Run ID:       {}", result.run_id);
    println!("  Meetings:     {}", result.meeting_count);
    println!("  Action items: {}", result.action_item_count);
    println!("  Fallbacks:    {}", result.fallback_count);
    println!("  Output:       {}", result.output_dir.display());
    println!(
        "  Time:         {:.1}s",
        result.elapsed.as_secs_f64()
    );
    if !result.failures.is_empty() {
        println!();
        println!("  Skipped {} transcript(s):", result.failures.len());
        for failure in &result.failures {
            println!("    {}: {}", failure.path.display(), failure.error);
        }
    }
    println!();

    Ok(())
}

fn cmd_check(table_args: &TableArgs) -> Result<()> {
    let mut config = resolve_config(table_args.config.as_deref())?;
    apply_table_args(&mut config, table_args);
    config.validate()?;

    let tables = Tables::from_config(&config)?;

    println!("  Rule table:");
    println!(
        "    source:   {}",
        config.extraction.rules_path.as_deref().unwrap_or("built-in")
    );
    println!("    triggers: {}", tables.rules.action_rules().len());
    println!("    temporal: {}", tables.rules.temporal_rules().len());
    println!("  Knowledge base:");
    println!(
        "    source:   {}",
        config
            .recommendation
            .knowledge_base_path
            .as_deref()
            .unwrap_or("built-in")
    );
    println!("    entries:  {}", tables.knowledge_base.len());
    println!("    fallback: {}", tables.knowledge_base.fallback().title);

    Ok(())
}

fn cmd_verify(output: &Path) -> Result<()> {
    let manifest = recap_core::validate_output(output)?;
    println!("  Output verified: {}", output.display());
    println!("  Run ID:   {}", manifest.run_id);
    println!("  Created:  {}", manifest.created_at.to_rfc3339());
    println!("  Files:    {}", manifest.files.len());
    println!("  Meetings: {}", manifest.meeting_count);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using indicatif spinners.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn meeting_done(&self, meeting: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Processing [{current}/{total}] {meeting}"));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}
