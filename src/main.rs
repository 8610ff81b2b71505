// Fleet Sync - CLI
// Download the maintenance workbook, publish data.json, push it to the site.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use fleet_sync::{logging, LogFormat, Pipeline, RunMode, SyncConfig, SyncError};

#[derive(Parser, Debug)]
#[command(name = "fleet-sync", version, about = "Publish the fleet maintenance workbook as JSON")]
struct Cli {
    /// Write the JSON locally only (no git commit/push)
    #[arg(long)]
    local: bool,

    /// Config file (default: fleet-sync.toml when present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Source URL or local path of the workbook
    #[arg(long, value_name = "URL")]
    source: Option<String>,

    /// Output document path
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Extra download attempts after a failure
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Exit non-zero when the remote publish fails
    #[arg(long)]
    strict_remote: bool,

    /// Rewrite the output even when the data did not change
    #[arg(long)]
    force_write: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    /// CLI flags win over file and environment
    fn apply(&self, config: &mut SyncConfig) {
        if let Some(source) = &self.source {
            config.source_url = source.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if self.strict_remote {
            config.strict_remote = true;
        }
        if self.force_write {
            config.rewrite_unchanged = true;
        }
    }

    fn mode(&self) -> RunMode {
        if self.local {
            RunMode::LocalOnly
        } else {
            RunMode::Full
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.log_format, "info");

    if let Err(err) = run(&cli) {
        let code = err
            .downcast_ref::<SyncError>()
            .map(SyncError::exit_code)
            .unwrap_or(1);
        error!("ERROR: {:#}", err);
        std::process::exit(code);
    }
}

fn run(cli: &Cli) -> Result<()> {
    println!("🔄 Fleet Sync v{}", fleet_sync::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut config = SyncConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    info!(
        "Source: {} | sheet: {} | output: {}",
        config.source_url,
        config.sheet_name,
        config.resolved_output().display()
    );

    let strict = config.strict_remote;
    let mut pipeline = Pipeline::from_config(config, cli.mode())?;
    let report = pipeline.run()?;

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    report.log_summary();

    if let Some(err) = report.strict_failure(strict) {
        return Err(err).context("remote publish failed (strict mode)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "fleet-sync",
            "--local",
            "--source",
            "file:///tmp/book.xlsx",
            "--output",
            "site/data.json",
            "--retries",
            "2",
            "--force-write",
            "--log-format",
            "json",
        ]);
        let mut config = SyncConfig::default();
        cli.apply(&mut config);

        assert_eq!(cli.mode(), RunMode::LocalOnly);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(config.source_url, "file:///tmp/book.xlsx");
        assert_eq!(config.output_path, PathBuf::from("site/data.json"));
        assert_eq!(config.retries, 2);
        assert!(config.rewrite_unchanged);
        assert!(!config.strict_remote);
    }

    #[test]
    fn test_defaults_run_full_mode() {
        let cli = Cli::parse_from(["fleet-sync"]);
        let mut config = SyncConfig::default();
        cli.apply(&mut config);

        assert_eq!(cli.mode(), RunMode::Full);
        assert_eq!(config.retries, 0);
        assert!(config.source_url.is_empty());
    }

    #[test]
    fn test_strict_failure_keeps_exit_code_through_anyhow() {
        let err: anyhow::Error = Err::<(), _>(SyncError::RemotePublish {
            step: "push".to_string(),
            message: "rejected".to_string(),
        })
        .context("remote publish failed (strict mode)")
        .unwrap_err();

        assert_eq!(err.downcast_ref::<SyncError>().map(SyncError::exit_code), Some(7));
    }
}
