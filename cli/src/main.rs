mod config;
mod error;
mod logging;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use privreset_core::{Reconciler, RunReport, SinkReport, SnowflakeCatalog};

use crate::config::{AppConfig, Overrides};
use crate::error::Result;
use crate::logging::init_logging;

#[derive(Parser)]
#[command(
    name = "privreset",
    about = "Converge warehouse grants and ownership onto one role"
)]
struct Cli {
    /// Configuration file (defaults to $PRIVRESET_CONFIG, then ./privreset.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write statement artifacts without executing them
    #[arg(long)]
    dry_run: bool,

    /// Directory for statement artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Role that receives ownership and access
    #[arg(long)]
    new_owner: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            log_report(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            fatal!("privreset aborted: {err}");
            eprintln!("privreset: {err}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<RunReport> {
    let overrides = Overrides {
        dry_run: cli.dry_run,
        output_directory: cli.output_dir,
        new_owner: cli.new_owner,
    };
    let config = AppConfig::from_sources(cli.config.as_deref(), &overrides)?;
    init_logging(&config)?;

    let settings = config.reconcile_settings();
    fs::create_dir_all(&settings.output_directory)?;

    let catalog = SnowflakeCatalog::connect(config.snowflake_settings()?).await?;
    log::info!(
        "reconciling onto role {} ({} worker(s), run_dry={})",
        settings.new_owner,
        settings.workers,
        settings.run_dry
    );

    let report = Reconciler::new(&catalog, settings).run().await?;
    Ok(report)
}

fn log_report(report: &RunReport) {
    log::info!("{} object(s) inspected, {} grant(s) collected.", report.objects, report.grants);
    for artifact in [&report.revokes, &report.ownerships, &report.new_grants] {
        log_artifact(artifact);
    }
    if report.failed_statements() > 0 {
        log::warn!("{} statement(s) failed; see errors above.", report.failed_statements());
    }
}

fn log_artifact(artifact: &SinkReport) {
    match &artifact.execution {
        Some(summary) => log::info!(
            "{}: {} written, {} executed, {} failed.",
            artifact.path.display(),
            artifact.written,
            summary.succeeded,
            summary.failed()
        ),
        None => log::info!("{}: {} written.", artifact.path.display(), artifact.written),
    }
}
