use anyhow::{Result, bail};

use stride_core::models::{DailyWater, StepsReport};
use stride_core::service::StrideService;

use super::helpers::{parse_date, session_user};

fn print_water(water: &DailyWater) {
    match water.target_ml {
        Some(target) => println!(
            "{}: {} / {target} ml of water",
            water.date, water.amount_ml
        ),
        None => println!("{}: {} ml of water", water.date, water.amount_ml),
    }
}

fn print_steps(report: &StepsReport) {
    let total = report.total_steps;
    match report.target_steps {
        Some(target) => println!("{}: {total} / {target} steps", report.date),
        None => println!("{}: {total} steps", report.date),
    }
    if report.provider_steps > 0 {
        println!(
            "  Recorded: {} | Health service: {}",
            report.recorded_steps, report.provider_steps
        );
    }
    println!(
        "  Distance: {:.2} km | Active: {:.0} kcal",
        report.distance_km, report.active_kcal
    );
}

pub(crate) fn cmd_water_add(
    svc: &StrideService,
    amount_ml: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if amount_ml == 0 {
        bail!("Amount must not be 0");
    }
    let user = session_user(svc)?;
    let date = parse_date(date)?;
    let water = svc.add_water(user.id, date, amount_ml)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&water)?);
    } else {
        print_water(&water);
    }
    Ok(())
}

pub(crate) fn cmd_water_show(svc: &StrideService, date: Option<String>, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let date = parse_date(date)?;
    let water = svc.water(user.id, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&water)?);
    } else {
        print_water(&water);
    }
    Ok(())
}

pub(crate) fn cmd_steps_add(
    svc: &StrideService,
    steps: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if steps == 0 {
        bail!("Steps must not be 0");
    }
    let user = session_user(svc)?;
    let date = parse_date(date)?;
    let report = svc.add_steps(user.id, date, steps)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_steps(&report);
    }
    Ok(())
}

pub(crate) fn cmd_steps_show(svc: &StrideService, date: Option<String>, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let date = parse_date(date)?;
    let report = svc.daily_steps(user.id, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_steps(&report);
    }
    Ok(())
}
