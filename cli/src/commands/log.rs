use anyhow::Result;

use stride_core::models::ConsumedFood;
use stride_core::service::StrideService;

use super::helpers::{parse_grams, parse_moment, session_user};
use super::resolve_food;

pub(crate) fn format_entry(entry: &ConsumedFood) -> String {
    let grams = if entry.grams.fract() == 0.0 {
        format!("{:.0}g", entry.grams)
    } else {
        format!("{}g", entry.grams)
    };
    format!(
        "{} {grams} for {}: {:.0} kcal",
        entry.food_name, entry.meal_type, entry.calories
    )
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_log(
    svc: &StrideService,
    food_query: &str,
    grams_str: &str,
    meal: &str,
    food_id: Option<i64>,
    date: Option<String>,
    time: Option<&str>,
    json: bool,
) -> Result<()> {
    let user = session_user(svc)?;
    let grams = parse_grams(grams_str)?;
    let consumed_at = parse_moment(date, time)?;

    let food = match food_id {
        Some(id) => svc.get_food(id)?,
        None => resolve_food(svc, food_query, json)?,
    };

    let entry = svc.log_food(user.id, food.id, grams, meal, consumed_at)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("Logged [{}] {}", entry.id, format_entry(&entry));
    }

    Ok(())
}
