use std::path::Path;

use anyhow::{Context, Result};

use stride_core::service::StrideService;

use super::helpers::session_user;

pub fn cmd_import_health(svc: &StrideService, path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let summary = svc.import_health_csv(user.id, &content, dry_run)?;

    if summary.rows_parsed == 0 {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": "No rows found in CSV file" })
            );
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dry_run": dry_run,
                "rows_parsed": summary.rows_parsed,
                "steps_days": summary.steps_days,
                "weights_logged": summary.weights_logged,
                "rows_skipped": summary.rows_skipped,
                "dates_spanned": summary.dates_spanned,
            })
        );
    } else {
        if dry_run {
            println!("Dry run: no changes made.\n");
        } else {
            println!("Import complete.\n");
        }
        println!("  Rows parsed:   {}", summary.rows_parsed);
        println!("  Step days:     {}", summary.steps_days);
        println!("  Weights:       {}", summary.weights_logged);
        println!("  Rows skipped:  {}", summary.rows_skipped);
        println!("  Dates spanned: {}", summary.dates_spanned);
    }

    Ok(())
}

/// Write the logged-in user's data as JSON to `output`, or stdout.
pub fn cmd_export(svc: &StrideService, output: Option<&Path>) -> Result<()> {
    let user = session_user(svc)?;
    let data = svc.export_user(user.id)?;
    let body = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Exported {} weights, {} food entries and {} summaries to {}",
                data.weight_logs.len(),
                data.consumed_foods.len(),
                data.summaries.len(),
                path.display()
            );
        }
        None => println!("{body}"),
    }
    Ok(())
}
