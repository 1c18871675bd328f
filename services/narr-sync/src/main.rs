//! NARR archive synchronizer.
//!
//! Compares the local auxiliary archive against the NCEP NARR archive for a
//! range of days and refreshes every stale 3-hourly slice:
//! - Lists the remote archive once per run
//! - Downloads stale files with retry
//! - Extracts HGT, TMP and SPFH with wgrib
//! - Archives the extracts under `<aux-dir>/<YYYY>/<MM>/<DD>/`
//!
//! Meant to be run periodically by an external scheduler.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use narr_archive::config::{AUX_DIR_ENV, DEFAULT_CONFIG_FILE};
use narr_archive::{RetryPolicy, SyncConfig, SyncContext, Synchronizer, TemplateConfig};

/// Days before today synchronized when no start date is given.
const DEFAULT_LOOKBACK_DAYS: i64 = 10;

#[derive(Parser, Debug)]
#[command(name = "narr-sync")]
#[command(version)]
#[command(about = "Downloads and archives NARR data that is newer on the remote archive")]
struct Args {
    /// First day to synchronize (YYYYMMDD, default: ten days ago)
    #[arg(long, value_parser = parse_date)]
    start_date: Option<NaiveDate>,

    /// Last day to synchronize (YYYYMMDD, default: today)
    #[arg(long, value_parser = parse_date)]
    end_date: Option<NaiveDate>,

    /// Synchronize a single day (YYYYMMDD); overrides start and end
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Print a freshness report instead of synchronizing
    #[arg(long)]
    report: bool,

    /// Settings file with naming templates
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Root of the local auxiliary archive
    #[arg(long, env = "LST_AUX_DIR")]
    aux_dir: Option<PathBuf>,

    /// Directory for downloads and intermediate extracts
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Maximum transfer attempts per file
    #[arg(long, default_value = "5")]
    max_attempts: u32,

    /// Timeout for a single transfer, in seconds
    #[arg(long, default_value = "300")]
    request_timeout: u64,

    /// wgrib executable
    #[arg(long, default_value = "wgrib")]
    wgrib: PathBuf,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Inclusive day range to work on.
    fn date_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        if let Some(date) = self.date {
            return (date, date);
        }
        (
            self.start_date
                .unwrap_or(today - Duration::days(DEFAULT_LOOKBACK_DAYS)),
            self.end_date.unwrap_or(today),
        )
    }
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {}", e))
}

fn init_tracing(debug: bool, json: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=warn,reqwest=warn", level)));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.debug, args.json_logs)?;

    let (start, end) = args.date_range(Utc::now().date_naive());

    let templates = TemplateConfig::load(&args.config).context("Failed to load settings")?;
    let aux_dir = args
        .aux_dir
        .clone()
        .ok_or_else(|| anyhow!("Archive directory not set; use --aux-dir or {}", AUX_DIR_ENV))?;

    let config = SyncConfig::new(aux_dir)
        .with_work_dir(&args.work_dir)
        .with_templates(templates)
        .with_wgrib(&args.wgrib)
        .with_retry(RetryPolicy {
            max_attempts: args.max_attempts,
            ..RetryPolicy::default()
        })
        .with_request_timeout(std::time::Duration::from_secs(args.request_timeout));

    let ctx = SyncContext::connect(config).context("Failed to initialize synchronizer")?;
    let synchronizer = Synchronizer::new(ctx);

    if args.report {
        let report = synchronizer
            .report(start, end)
            .await
            .context("Failed to build report")?;
        println!("{}", report);
        return Ok(());
    }

    info!(start = %start, end = %end, "Starting NARR synchronization");
    let summary = synchronizer
        .synchronize(start, end)
        .await
        .context("Synchronization aborted")?;

    info!(
        updated = summary.updated,
        unavailable = summary.unavailable.len(),
        failed = summary.failed.len(),
        "NARR synchronization complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("20150115").unwrap(), day(2015, 1, 15));
        assert!(parse_date("2015-01-15").is_err());
        assert!(parse_date("20150230").is_err());
    }

    #[test]
    fn test_default_range_is_last_ten_days() {
        let args = Args::parse_from(["narr-sync", "--aux-dir", "/aux"]);
        assert_eq!(
            args.date_range(day(2015, 1, 15)),
            (day(2015, 1, 5), day(2015, 1, 15))
        );
    }

    #[test]
    fn test_date_overrides_range() {
        let args = Args::parse_from([
            "narr-sync",
            "--start-date",
            "20140101",
            "--end-date",
            "20140201",
            "--date",
            "20150115",
        ]);
        assert_eq!(
            args.date_range(day(2020, 1, 1)),
            (day(2015, 1, 15), day(2015, 1, 15))
        );
        assert_eq!(args.max_attempts, 5);
        assert_eq!(args.config, PathBuf::from("lst_auxillary.config"));
    }

    #[test]
    fn test_rejects_malformed_date() {
        assert!(Args::try_parse_from(["narr-sync", "--date", "yesterday"]).is_err());
    }
}
