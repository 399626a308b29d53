use anyhow::{Result, bail};
use std::process;

use stride_core::models::UpdateConsumedFood;
use stride_core::service::StrideService;

use super::helpers::{parse_grams, parse_moment, report_missing, session_user};
use super::log::format_entry;

pub(crate) fn cmd_delete(svc: &StrideService, entry_id: i64, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    if svc.delete_consumed(user.id, entry_id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": entry_id }));
        } else {
            println!("Deleted entry {entry_id}");
        }
        Ok(())
    } else {
        report_missing(&format!("Entry {entry_id} not found"), json);
        process::exit(2);
    }
}

pub(crate) fn cmd_update(
    svc: &StrideService,
    entry_id: i64,
    grams: Option<&str>,
    meal: Option<String>,
    date: Option<String>,
    time: Option<&str>,
    json: bool,
) -> Result<()> {
    if grams.is_none() && meal.is_none() && date.is_none() && time.is_none() {
        bail!("Nothing to update. Provide at least one of --grams, --meal, --date, or --time");
    }
    let user = session_user(svc)?;

    let consumed_at = if date.is_some() || time.is_some() {
        Some(parse_moment(date, time)?)
    } else {
        None
    };
    let update = UpdateConsumedFood {
        grams: grams.map(parse_grams).transpose()?,
        meal_type: meal,
        consumed_at,
    };

    if svc.get_consumed(user.id, entry_id).is_err() {
        report_missing(&format!("Entry {entry_id} not found"), json);
        process::exit(2);
    }
    let entry = svc.update_consumed(user.id, entry_id, &update)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("Updated entry {entry_id}: {}", format_entry(&entry));
    }
    Ok(())
}
