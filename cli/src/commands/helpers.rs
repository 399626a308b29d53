use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::models::{Food, User};
use stride_core::service::StrideService;

pub(crate) const LBS_PER_KG: f64 = 2.20462;
const KG_PER_LB: f64 = 0.453_592;

pub(crate) fn parse_grams(s: &str) -> Result<f64> {
    let trimmed = s.trim().trim_end_matches('g').trim();
    let value: f64 = trimmed
        .parse()
        .with_context(|| format!("Invalid quantity: '{s}'. Use a number like '150' or '150g'"))?;
    if value <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    Ok(value)
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Resolve an optional date and `HH:MM` time to a UTC instant.
///
/// With neither given this is now. A date alone means noon on that day, a
/// time alone means that time today.
pub(crate) fn parse_moment(date: Option<String>, time: Option<&str>) -> Result<DateTime<Utc>> {
    if date.is_none() && time.is_none() {
        return Ok(Utc::now());
    }
    let day = parse_date(date)?;
    let time = match time {
        Some(t) => NaiveTime::parse_from_str(t.trim(), "%H:%M")
            .with_context(|| format!("Invalid time '{t}'. Use HH:MM"))?,
        None => NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
    };
    Ok(day
        .and_time(time)
        .and_local_timezone(Local)
        .earliest()
        .with_context(|| format!("{day} {time} does not exist in the local timezone"))?
        .with_timezone(&Utc))
}

/// Convert a weight in `unit` (kg or lbs) to kilograms.
pub(crate) fn to_kg(value: f64, unit: &str) -> Result<f64> {
    match unit.to_lowercase().as_str() {
        "kg" => Ok(value),
        "lbs" | "lb" => Ok(no_neg_zero(value * KG_PER_LB)),
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

/// The logged-in user, or a hint to log in.
pub(crate) fn session_user(svc: &StrideService) -> Result<User> {
    svc.require_user()
        .context("Run `stride login <username>` or `stride register` first")
}

pub(crate) fn prompt_line(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(line.trim().to_string())
}

/// Use the flag value when given, otherwise ask on stdin.
pub(crate) fn value_or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => prompt_line(label),
    }
}

pub(crate) fn prompt_choice(count: usize) -> Result<usize> {
    eprint!("\nSelect a food (1-{count}): ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let n: usize = line.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

pub(crate) fn print_food_table(foods: &[&Food]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Cal/100g")]
        calories: String,
        #[tabled(rename = "P/100g")]
        protein: String,
        #[tabled(rename = "F/100g")]
        fat: String,
        #[tabled(rename = "C/100g")]
        carbs: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .enumerate()
        .map(|(i, f)| FoodRow {
            idx: i + 1,
            id: f.id,
            name: truncate(&f.name, 35),
            category: f
                .category
                .as_deref()
                .map(|c| truncate(c, 20))
                .unwrap_or_default(),
            calories: f.calories_per_100g.to_string(),
            protein: format!("{:.1}", f.protein_per_100g),
            fat: format!("{:.1}", f.fat_per_100g),
            carbs: format!("{:.1}", f.carbs_per_100g),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Print a not-found style message in the requested format.
pub(crate) fn report_missing(message: &str, json: bool) {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::day::local_date;

    #[test]
    fn test_parse_grams() {
        assert!((parse_grams("200").unwrap() - 200.0).abs() < f64::EPSILON);
        assert!((parse_grams("200g").unwrap() - 200.0).abs() < f64::EPSILON);
        assert!((parse_grams("42.5g").unwrap() - 42.5).abs() < f64::EPSILON);
        assert!((parse_grams(" 200 ").unwrap() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_grams_invalid() {
        assert!(parse_grams("abc").is_err());
        assert!(parse_grams("0g").is_err());
        assert!(parse_grams("-50").is_err());
    }

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_parse_moment() {
        let ts = parse_moment(Some("2024-01-15".to_string()), Some("08:30")).unwrap();
        let local = ts.with_timezone(&Local);
        assert_eq!(local_date(ts), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(local.format("%H:%M").to_string(), "08:30");

        let noon = parse_moment(Some("2024-01-15".to_string()), None).unwrap();
        assert_eq!(noon.with_timezone(&Local).format("%H:%M").to_string(), "12:00");

        assert!(parse_moment(None, Some("25:00")).is_err());
    }

    #[test]
    fn test_to_kg() {
        assert!((to_kg(80.0, "kg").unwrap() - 80.0).abs() < f64::EPSILON);
        assert!((to_kg(100.0, "LBS").unwrap() - 45.3592).abs() < 1e-9);
        assert!(to_kg(80.0, "stone").is_err());
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("Not logged in"), r#"{"error":"Not logged in"}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
        assert_eq!(no_neg_zero(-3.0), -3.0);
    }
}
