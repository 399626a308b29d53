use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::service::StrideService;

use super::helpers::{no_neg_zero, parse_date, session_user};

pub(crate) fn cmd_summary(svc: &StrideService, date: Option<String>, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let date = parse_date(date)?;
    let day = svc.daily_nutrition(user.id, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&day)?);
        return Ok(());
    }

    if day.meals.iter().all(|m| m.entries.is_empty()) {
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    println!("=== {date} ===\n");

    for meal in &day.meals {
        let meal_label = meal.meal_type.to_uppercase();
        let sub_cal = meal.subtotal.calories;
        println!("  {meal_label} ({sub_cal:.0} kcal)");
        for e in &meal.entries {
            let id = e.id;
            let name = &e.food_name;
            let grams = e.grams;
            let cal = e.calories;
            let protein = e.protein;
            let fat = e.fat;
            let carbs = e.carbs;
            println!(
                "    [{id}] {name} {grams:.0}g: {cal:.0} kcal | P:{protein:.0}g F:{fat:.0}g C:{carbs:.0}g"
            );
        }
        println!();
    }

    let t = &day.total;
    println!(
        "  TOTAL: {:.0} kcal | P:{:.0}g F:{:.0}g C:{:.0}g",
        t.calories, t.protein, t.fat, t.carbs
    );

    if let Some(goals) = &day.goals {
        println!(
            "  GOAL: {} kcal | P:{:.0}g F:{:.0}g C:{:.0}g",
            goals.calories, goals.protein_g, goals.fat_g, goals.carbs_g
        );
    }
    if let Some(r) = &day.remaining {
        println!(
            "  REMAINING: {:.0} kcal | P:{:.0}g F:{:.0}g C:{:.0}g",
            no_neg_zero(r.calories),
            no_neg_zero(r.protein),
            no_neg_zero(r.fat),
            no_neg_zero(r.carbs)
        );
    }

    Ok(())
}

/// Stored nightly snapshots, newest first.
pub(crate) fn cmd_history(svc: &StrideService, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight (kg)")]
        weight: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Steps")]
        steps: i64,
        #[tabled(rename = "Water (ml)")]
        water: i64,
    }

    let user = session_user(svc)?;
    let summaries = svc.summaries(user.id, Some(i64::from(days)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        eprintln!("No daily summaries yet. Run `stride job nightly` to record one.");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = summaries
        .iter()
        .map(|s| HistoryRow {
            date: s.date.to_string(),
            weight: s
                .weight_kg
                .map(|kg| format!("{kg:.1}"))
                .unwrap_or_else(|| "-".to_string()),
            calories: format!("{:.0}", no_neg_zero(s.calories)),
            steps: s.steps,
            water: s.water_ml,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
