//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use pdfharvest_core::{
    HarvestReport, ProgressReporter, checkpoint_status, discover_categories, harvest,
};
use pdfharvest_crawler::{ChromiumSession, LaunchOptions};
use pdfharvest_shared::{
    AppConfig, HarvestConfig, config_file_path, init_config, load_config, load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pdfharvest: mirror every PDF in a content library, resuming where it left off.
#[derive(Parser)]
#[command(
    name = "pdfharvest",
    version,
    about = "Resumable PDF harvester for SharePoint-style document libraries.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.pdfharvest/pdfharvest.toml).
    #[arg(long, global = true, env = "PDFHARVEST_CONFIG")]
    pub config: Option<PathBuf>,

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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Discover categories, expand every category page and download new documents.
    Run {
        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// Print the categories found on the landing page. No browser needed.
    Discover,

    /// Summarize the checkpoint.
    Status {
        /// Check that every downloaded document still exists on disk.
        #[arg(long)]
        verify: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Per-run settings that take precedence over the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunOverrides {
    /// Run Chrome without a window.
    #[arg(long)]
    pub headless: bool,

    /// Directory that receives one subdirectory per category.
    #[arg(long)]
    pub save_root: Option<PathBuf>,

    /// Checkpoint file location.
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Only process this category (repeatable).
    #[arg(long = "category", value_name = "NAME")]
    pub categories: Vec<String>,
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
        0 => "pdfharvest=info",
        1 => "pdfharvest=debug",
        _ => "pdfharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Run { overrides } => cmd_run(config_path, overrides).await,
        Command::Discover => cmd_discover(config_path).await,
        Command::Status { verify } => cmd_status(config_path, verify),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load_app_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(&p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Merge CLI overrides into the file config and validate.
fn resolve_config(mut app: AppConfig, overrides: RunOverrides) -> Result<HarvestConfig> {
    if overrides.headless {
        app.browser.headless = true;
    }
    if let Some(root) = overrides.save_root {
        app.storage.save_root = root.to_string_lossy().into_owned();
    }
    if let Some(checkpoint) = overrides.checkpoint {
        app.storage.checkpoint_path = checkpoint.to_string_lossy().into_owned();
    }

    let mut config = HarvestConfig::try_from(&app)?;
    config.only_categories = overrides.categories;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<PathBuf>, overrides: RunOverrides) -> Result<()> {
    let config = resolve_config(load_app_config(config_path)?, overrides)?;

    info!(
        origin = %config.site.base_origin,
        save_root = %config.save_root.display(),
        checkpoint = %config.checkpoint_path.display(),
        headless = config.headless,
        "starting harvest"
    );

    let mut session = ChromiumSession::launch(&LaunchOptions::from(&config))
        .await
        .map_err(|e| eyre!("could not start Chrome: {e}"))?;

    let reporter = CliProgress::new();
    let report = harvest(&config, &mut session, &reporter).await?;

    print_report(&report);
    Ok(())
}

async fn cmd_discover(config_path: Option<PathBuf>) -> Result<()> {
    let config = HarvestConfig::try_from(&load_app_config(config_path)?)?;
    let categories = discover_categories(&config).await?;

    if categories.is_empty() {
        println!("No categories found at {}", config.site.landing_url);
        return Ok(());
    }

    let width = categories.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    for category in categories.values() {
        println!("  {:<width$}  {}", category.name, category.landing_url);
    }
    println!();
    println!("  {} categories", categories.len());
    Ok(())
}

fn cmd_status(config_path: Option<PathBuf>, verify: bool) -> Result<()> {
    let config = HarvestConfig::try_from(&load_app_config(config_path)?)?;
    let status = checkpoint_status(&config, verify)?;

    let Some(checkpoint) = status.checkpoint else {
        println!("No checkpoint at {}", status.path.display());
        return Ok(());
    };

    println!();
    println!("  Checkpoint:  {}", status.path.display());
    if let Some(updated) = checkpoint.updated_at {
        println!("  Updated:     {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("  Categories:  {}", checkpoint.categories.len());
    println!("  Downloaded:  {}", checkpoint.downloaded.len());

    if let Some(missing) = status.missing_files {
        if missing.is_empty() {
            println!("  Verified:    all files present");
        } else {
            println!("  Missing:     {}", missing.len());
            for url in &missing {
                println!("    {url}");
            }
        }
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let source = match &config_path {
        Some(p) => p.clone(),
        None => config_file_path()?,
    };
    let config = load_app_config(config_path)?;
    println!("# {}", source.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_report(report: &HarvestReport) {
    let source = if report.categories_from_checkpoint {
        "checkpoint"
    } else {
        "landing page"
    };

    println!();
    println!("  Harvest finished.");
    println!(
        "  Categories:  {}/{} processed (from {source})",
        report.categories_processed, report.categories_total
    );
    println!("  Found:       {}", report.documents_found);
    println!("  Downloaded:  {}", report.documents_downloaded);
    println!("  Skipped:     {} already present", report.documents_already_present);
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());

    if !report.categories_failed.is_empty() {
        println!();
        println!("  Skipped categories:");
        for (name, cause) in &report.categories_failed {
            println!("    {name}: {cause}");
        }
    }
    if !report.documents_failed.is_empty() {
        println!();
        println!("  Failed downloads (retried next run):");
        for (url, cause) in &report.documents_failed {
            println!("    {url}: {cause}");
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn category_started(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Category [{current}/{total}] {name}"));
    }

    fn document_saved(&self, filename: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Downloaded [{current}/{total}] {filename}"));
    }

    fn done(&self, _report: &HarvestReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "pdfharvest",
            "-vv",
            "run",
            "--headless",
            "--save-root",
            "/tmp/out",
            "--category",
            "Reports",
            "--category",
            "Training Manuals",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Run { overrides } = cli.command else {
            panic!("expected run");
        };
        assert!(overrides.headless);
        assert_eq!(overrides.save_root, Some(PathBuf::from("/tmp/out")));
        assert_eq!(overrides.categories, vec!["Reports", "Training Manuals"]);
    }

    #[test]
    fn overrides_take_precedence_over_file() {
        let mut app = AppConfig::default();
        app.storage.save_root = "from-file".into();

        let config = resolve_config(
            app,
            RunOverrides {
                headless: true,
                save_root: Some(PathBuf::from("from-cli")),
                checkpoint: None,
                categories: vec!["Reports".into()],
            },
        )
        .unwrap();

        assert!(config.headless);
        assert_eq!(config.save_root, PathBuf::from("from-cli"));
        assert_eq!(config.checkpoint_path, PathBuf::from("checkpoint.json"));
        assert_eq!(config.only_categories, vec!["Reports"]);
    }

    #[test]
    fn status_verify_flag_parses() {
        let cli = Cli::try_parse_from(["pdfharvest", "status", "--verify"]).unwrap();
        assert!(matches!(cli.command, Command::Status { verify: true }));
    }
}
