//! # SlotWatch — appointment calendar watcher
//!
//! Drives Chrome (through chromedriver) against a booking calendar, keeps the
//! booking category selected, scans the next few months and emails when the
//! set of open dates changes.
//!
//! Usage:
//!   slotwatch                       # Supervised watch loop (same as `run`)
//!   slotwatch scan                  # One scan, print the report, exit
//!   slotwatch config                # Print the effective configuration
//!   slotwatch --dry-run --headless  # Log reports instead of emailing

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use slotwatch_core::SlotWatchConfig;
use slotwatch_core::config::expand_path;
use slotwatch_core::secrets::Secrets;
use slotwatch_core::traits::Notifier;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(
    name = "slotwatch",
    version,
    about = "👀 SlotWatch — appointment calendar watcher"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: ~/.slotwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log reports instead of sending email; no credentials needed
    #[arg(long, global = true)]
    dry_run: bool,

    /// Run Chrome without a window
    #[arg(long, global = true)]
    headless: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Watch forever, restarting the browser after crashes
    Run,
    /// Load, select the category, scan once and print the report
    Scan,
    /// Print the effective configuration as TOML
    Config,
}

fn load_config(cli: &Cli) -> Result<SlotWatchConfig> {
    let mut config = match &cli.config {
        Some(path) => SlotWatchConfig::load_from(path)?,
        None => SlotWatchConfig::load()?,
    };
    if cli.headless {
        config.browser.headless = true;
    }
    Ok(config)
}

/// Log to stdout and append to `<log_dir>/slotwatch.log`.
fn init_logging(config: &SlotWatchConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        "slotwatch=debug,slotwatch_monitor=debug,slotwatch_browser=debug,slotwatch_channels=debug,slotwatch_core=debug"
    } else {
        "slotwatch=info,slotwatch_monitor=info,slotwatch_browser=info,slotwatch_channels=info,slotwatch_core=info"
    };

    let log_file = config.paths.log_file();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn ensure_dirs(config: &SlotWatchConfig) -> Result<()> {
    for dir in [
        &config.paths.log_dir,
        &config.paths.screenshot_dir,
        &config.browser.profile_dir,
    ] {
        let dir = expand_path(dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

fn build_notifier(config: &SlotWatchConfig, dry_run: bool) -> Result<Arc<dyn Notifier>> {
    if dry_run {
        tracing::info!("📝 Dry run: reports go to the log only");
        return Ok(Arc::new(slotwatch_channels::LogNotifier));
    }
    let secrets_file = config.email.secrets_file.as_deref().map(expand_path);
    let secrets = Secrets::load(secrets_file.as_deref())
        .context("Email credentials are required unless --dry-run is given")?;
    Ok(Arc::new(slotwatch_channels::EmailNotifier::new(
        config.email.clone(),
        secrets,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Some(Command::Config) = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    ensure_dirs(&config)?;
    init_logging(&config, cli.verbose)?;

    let launcher = Arc::new(slotwatch_browser::WebDriverLauncher::new(
        config.browser.clone(),
    ));

    match cli.command.unwrap_or(Command::Run) {
        Command::Scan => {
            let notifier = Arc::new(slotwatch_channels::LogNotifier);
            let url = config.target.url.clone();
            let mut supervisor = slotwatch_monitor::Supervisor::new(config, launcher, notifier);
            let result = supervisor.scan_once().await?;
            println!(
                "{}",
                slotwatch_monitor::format_report(&result, chrono::Local::now().naive_local(), &url)
            );
        }
        Command::Run | Command::Config => {
            let notifier = build_notifier(&config, cli.dry_run)?;
            tracing::info!(
                "👀 SlotWatch v{} started. Log file: {}",
                env!("CARGO_PKG_VERSION"),
                config.paths.log_file().display()
            );
            let mut supervisor = slotwatch_monitor::Supervisor::new(config, launcher, notifier);
            supervisor.run().await;
        }
    }

    Ok(())
}
