use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::day::local_date;
use stride_core::service::StrideService;

use super::helpers::{LBS_PER_KG, parse_date, parse_moment, report_missing, session_user, to_kg};

pub(crate) fn cmd_weight_log(
    svc: &StrideService,
    value: f64,
    unit: &str,
    date: Option<String>,
    time: Option<&str>,
    json: bool,
) -> Result<()> {
    if value <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    let user = session_user(svc)?;
    let weight_kg = to_kg(value, unit)?;
    if !unit.eq_ignore_ascii_case("kg") {
        eprintln!("Converting {value:.1} lbs to {weight_kg:.2} kg");
    }

    let logged_at = parse_moment(date, time)?;
    let log = svc.log_weight(user.id, weight_kg, Some(logged_at))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        println!(
            "Logged {:.1} kg ({:.1} lbs) for {}",
            log.weight_kg,
            log.weight_kg * LBS_PER_KG,
            local_date(log.logged_at)
        );
    }

    Ok(())
}

pub(crate) fn cmd_weight_history(svc: &StrideService, limit: Option<u32>, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let entries = svc.weight_history(user.id, limit.map(i64::from))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No weight entries found. Use `stride weight log` to record your weight.");
    } else {
        #[derive(Tabled)]
        struct WeightRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Logged")]
            logged: String,
            #[tabled(rename = "Weight (kg)")]
            kg: String,
            #[tabled(rename = "Weight (lbs)")]
            lbs: String,
            #[tabled(rename = "Source")]
            source: String,
        }

        let rows: Vec<WeightRow> = entries
            .iter()
            .map(|e| WeightRow {
                id: e.id,
                logged: e
                    .logged_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
                kg: format!("{:.1}", e.weight_kg),
                lbs: format!("{:.1}", e.weight_kg * LBS_PER_KG),
                source: e.source.clone(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

/// Seven-day chart data ending on `date`.
pub(crate) fn cmd_weight_week(svc: &StrideService, date: Option<String>, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let end = parse_date(date)?;
    let series = svc.weekly_weight_series(user.id, end)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&series)?);
        return Ok(());
    }

    for point in &series {
        let day = point.date.format("%a %Y-%m-%d");
        match point.weight_kg {
            Some(kg) => println!("  {day}  {kg:>6.1} kg"),
            None => println!("  {day}       -"),
        }
    }
    Ok(())
}

pub(crate) fn cmd_weight_averages(
    svc: &StrideService,
    weeks: u32,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct AverageRow {
        #[tabled(rename = "Week of")]
        week_start: String,
        #[tabled(rename = "Average (kg)")]
        average: String,
        #[tabled(rename = "Logs")]
        samples: usize,
    }

    let user = session_user(svc)?;
    let end = parse_date(date)?;
    let averages = svc.weekly_averages(user.id, weeks, end)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&averages)?);
        return Ok(());
    }

    let rows: Vec<AverageRow> = averages
        .iter()
        .map(|a| AverageRow {
            week_start: a.week_start.to_string(),
            average: a
                .average_kg
                .map(|kg| format!("{kg:.1}"))
                .unwrap_or_else(|| "-".to_string()),
            samples: a.samples,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_weight_delete(svc: &StrideService, id: i64, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    if !svc.delete_weight(user.id, id)? {
        report_missing(&format!("Weight entry {id} not found"), json);
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted weight entry {id}");
    }

    Ok(())
}
