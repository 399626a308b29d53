use anyhow::Result;

use stride_core::service::StrideService;

use super::helpers::parse_date;
use crate::config::Config;

/// Snapshot every user's day. Defaults to yesterday, the day a nightly run
/// closes out.
pub(crate) fn cmd_job_nightly(
    svc: &StrideService,
    config: &Config,
    date: Option<String>,
    attempts: Option<u32>,
    json: bool,
) -> Result<()> {
    let date = parse_date(Some(date.unwrap_or_else(|| "yesterday".to_string())))?;
    let max_attempts = attempts.unwrap_or(config.job.max_attempts);
    let report = svc.run_nightly_summary(date, max_attempts)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Nightly summary for {}", report.date);
        println!("  Users:   {}", report.users_seen);
        println!("  Written: {}", report.written);
        println!("  Skipped: {}", report.skipped);
    }
    Ok(())
}

pub(crate) fn cmd_job_status(svc: &StrideService, config: &Config, json: bool) -> Result<()> {
    let last_run = svc.last_summary_run()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "last_run": last_run,
                "max_attempts": config.job.max_attempts,
                "db_path": config.db_path,
                "data_dir": config.data_dir,
            })
        );
    } else {
        println!(
            "  Last run:     {}",
            last_run.as_deref().unwrap_or("never")
        );
        println!("  Max attempts: {}", config.job.max_attempts);
        println!("  Database:     {}", config.db_path.display());
        println!("  Data dir:     {}", config.data_dir.display());
    }
    Ok(())
}
