mod account;
mod activity;
mod food;
mod helpers;
mod import;
mod job;
mod log;
mod meal;
mod profile;
mod summary;
mod weight;

use anyhow::Result;
use std::process;

use stride_core::models::Food;
use stride_core::service::StrideService;

use helpers::{print_food_table, prompt_choice, report_missing};

pub(crate) use account::{
    RegisterArgs, cmd_account_delete, cmd_login, cmd_logout, cmd_register, cmd_whoami,
};
pub(crate) use activity::{cmd_steps_add, cmd_steps_show, cmd_water_add, cmd_water_show};
pub(crate) use food::{cmd_food_add, cmd_food_delete, cmd_food_list, cmd_food_update, cmd_search};
pub(crate) use import::{cmd_export, cmd_import_health};
pub(crate) use job::{cmd_job_nightly, cmd_job_status};
pub(crate) use log::cmd_log;
pub(crate) use meal::{cmd_delete, cmd_update};
pub(crate) use profile::{
    GoalArgs, ProfileArgs, cmd_energy, cmd_goals_macros, cmd_goals_recalculate, cmd_goals_set,
    cmd_goals_show, cmd_profile_set, cmd_profile_show,
};
pub(crate) use summary::{cmd_history, cmd_summary};
pub(crate) use weight::{
    cmd_weight_averages, cmd_weight_delete, cmd_weight_history, cmd_weight_log, cmd_weight_week,
};

/// Resolve a food name to a catalog entry, asking the user to pick when the
/// search is ambiguous.
pub(super) fn resolve_food(svc: &StrideService, food_query: &str, json: bool) -> Result<Food> {
    let mut all = svc.search_foods(food_query)?;

    if all.is_empty() {
        report_missing(&format!("No food found for '{food_query}'"), json);
        process::exit(2);
    }

    // An exact name match wins over picking from a list
    if let Some(pos) = all
        .iter()
        .position(|f| f.name.eq_ignore_ascii_case(food_query.trim()))
    {
        return Ok(all.swap_remove(pos));
    }

    let idx = if all.len() == 1 {
        0
    } else {
        let refs: Vec<&Food> = all.iter().collect();
        print_food_table(&refs);
        prompt_choice(all.len())?
    };
    Ok(all.swap_remove(idx))
}
