use std::collections::HashSet;
use std::io::Read;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::day::at;
use crate::db::Database;
use crate::models::{NewWeightLog, validate_weight_kg};

pub const IMPORT_SOURCE: &str = "import";

/// A single day parsed from a health-service CSV export.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRow {
    pub date: NaiveDate,
    pub steps: Option<i64>,
    pub weight_kg: Option<f64>,
}

/// Summary of what a health import would do / did.
#[derive(Debug, Clone, Default)]
pub struct HealthImportSummary {
    pub rows_parsed: usize,
    pub steps_days: usize,
    pub weights_logged: usize,
    pub rows_skipped: usize,
    pub dates_spanned: usize,
}

/// Parse a health export from any reader.
///
/// Expected header: `Date,Steps,Weight (kg)`. `Date` is required along with at
/// least one of the other two columns. Empty cells are treated as missing.
pub fn parse_health_csv<R: Read>(reader: R) -> Result<Vec<HealthRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_date = col("Date").context("Missing required column: Date")?;
    let idx_steps = col("Steps");
    let idx_weight = col("Weight (kg)").or_else(|| col("Weight"));
    if idx_steps.is_none() && idx_weight.is_none() {
        bail!("Expected a 'Steps' or 'Weight (kg)' column");
    }

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV row {line}"))?;

        let raw_date = record.get(idx_date).unwrap_or("").trim();
        if raw_date.is_empty() {
            continue;
        }
        let date = normalize_date(raw_date).with_context(|| format!("Row {line}"))?;

        let steps = match cell(&record, idx_steps) {
            Some(v) => Some(
                v.replace(',', "")
                    .parse::<i64>()
                    .with_context(|| format!("Row {line}: invalid step count '{v}'"))?,
            ),
            None => None,
        };
        let weight_kg = match cell(&record, idx_weight) {
            Some(v) => Some(
                v.parse::<f64>()
                    .with_context(|| format!("Row {line}: invalid weight '{v}'"))?,
            ),
            None => None,
        };

        rows.push(HealthRow {
            date,
            steps,
            weight_kg,
        });
    }

    Ok(rows)
}

fn cell(record: &csv::StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Accepts `YYYY-MM-DD`, then `M/D/YYYY`, then `D/M/YYYY`.
pub fn normalize_date(raw: &str) -> Result<NaiveDate> {
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(d);
        }
    }
    bail!("Cannot parse date: '{raw}'")
}

/// Write parsed rows for `user_id`.
///
/// Steps replace the stored count for that day. Weights are logged at local
/// noon with source `import`, so re-importing the same file is a no-op.
/// Rows with a negative step count or an out-of-range weight are skipped.
/// When `dry_run` is true, nothing is written.
pub fn import_health_rows(
    db: &Database,
    user_id: i64,
    rows: &[HealthRow],
    dry_run: bool,
) -> Result<HealthImportSummary> {
    // Fail before writing anything if the user is gone
    db.get_user(user_id)?;

    let mut summary = HealthImportSummary {
        rows_parsed: rows.len(),
        ..Default::default()
    };
    let mut dates: HashSet<NaiveDate> = HashSet::new();

    let apply = |summary: &mut HealthImportSummary, dates: &mut HashSet<NaiveDate>| -> Result<()> {
        for row in rows {
            let steps = row.steps.filter(|s| *s >= 0);
            let weight = row.weight_kg.filter(|w| validate_weight_kg(*w).is_ok());
            if steps.is_none() && weight.is_none() {
                debug!(date = %row.date, "skipping health row without usable values");
                summary.rows_skipped += 1;
                continue;
            }
            dates.insert(row.date);

            if let Some(steps) = steps {
                if !dry_run {
                    db.set_steps(user_id, row.date, steps)?;
                }
                summary.steps_days += 1;
            }
            if let Some(weight_kg) = weight {
                if !dry_run {
                    db.insert_weight(&NewWeightLog {
                        user_id,
                        weight_kg,
                        logged_at: at(row.date, 12, 0),
                        source: IMPORT_SOURCE.to_string(),
                    })?;
                }
                summary.weights_logged += 1;
            }
        }
        Ok(())
    };

    if dry_run {
        apply(&mut summary, &mut dates)?;
    } else {
        // A failing row undoes the whole file
        db.in_transaction(|| apply(&mut summary, &mut dates))?;
    }

    summary.dates_spanned = dates.len();
    info!(
        user_id,
        dry_run,
        steps_days = summary.steps_days,
        weights = summary.weights_logged,
        "health import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::calculator::calories_from_macros;
    use crate::day::day_window;
    use crate::models::{ActivityLevel, Gender, GoalType, NewGoals, NewRegistration};

    const SAMPLE_CSV: &str = "\
Date,Steps,Weight (kg)
2024-01-15,8500,82.4
1/16/2024,\"10,200\",
2024-01-17,,81.9
2024-01-18,-20,9000
";

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .register_user(
                &NewRegistration {
                    username: "sam".to_string(),
                    password: "secret123".to_string(),
                    name: "Sam".to_string(),
                    gender: Gender::Male,
                    height_cm: 180.0,
                    birth_date: NaiveDate::from_ymd_opt(1988, 2, 1).unwrap(),
                    weight_kg: 83.0,
                    goal_type: GoalType::Lose,
                    target_weight_kg: Some(78.0),
                    activity_level: ActivityLevel::Light,
                },
                &hash_password("secret123").unwrap(),
                &NewGoals {
                    goal_type: GoalType::Lose,
                    target_weight_kg: 78.0,
                    target_water_ml: 2900,
                    target_steps: 10_000,
                    protein_g: 182.6,
                    fat_g: 66.4,
                    carbs_g: 166.0,
                    calories: calories_from_macros(182.6, 66.4, 166.0),
                },
            )
            .unwrap();
        (db, user.id)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_health_csv() {
        let rows = parse_health_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].date, d(2024, 1, 15));
        assert_eq!(rows[0].steps, Some(8500));
        assert_eq!(rows[0].weight_kg, Some(82.4));
        assert_eq!(rows[1].date, d(2024, 1, 16));
        assert_eq!(rows[1].steps, Some(10_200));
        assert_eq!(rows[1].weight_kg, None);
        assert_eq!(rows[2].steps, None);
    }

    #[test]
    fn test_parse_requires_date_column() {
        let err = parse_health_csv("Day,Steps\n2024-01-01,5\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Date"));
    }

    #[test]
    fn test_parse_requires_a_value_column() {
        assert!(parse_health_csv("Date,Notes\n2024-01-01,x\n".as_bytes()).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_numbers() {
        let err = parse_health_csv("Date,Steps\n2024-01-01,lots\n".as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("Row 2"));
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2024-01-15").unwrap(), d(2024, 1, 15));
        assert_eq!(normalize_date("1/15/2024").unwrap(), d(2024, 1, 15));
        // Not a valid M/D, so falls through to D/M
        assert_eq!(normalize_date("25/12/2024").unwrap(), d(2024, 12, 25));
        assert!(normalize_date("yesterday").is_err());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (db, user_id) = setup();
        let rows = parse_health_csv(SAMPLE_CSV.as_bytes()).unwrap();
        let summary = import_health_rows(&db, user_id, &rows, true).unwrap();

        assert_eq!(summary.rows_parsed, 4);
        assert_eq!(summary.steps_days, 2);
        assert_eq!(summary.weights_logged, 2);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.dates_spanned, 3);
        assert_eq!(db.get_steps(user_id, d(2024, 1, 15)).unwrap(), 0);
        assert_eq!(db.weight_history(user_id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_import_writes_steps_and_weights() {
        let (db, user_id) = setup();
        let rows = parse_health_csv(SAMPLE_CSV.as_bytes()).unwrap();
        import_health_rows(&db, user_id, &rows, false).unwrap();

        assert_eq!(db.get_steps(user_id, d(2024, 1, 15)).unwrap(), 8500);
        assert_eq!(db.get_steps(user_id, d(2024, 1, 16)).unwrap(), 10_200);
        assert_eq!(db.get_steps(user_id, d(2024, 1, 18)).unwrap(), 0);

        let (start, end) = day_window(d(2024, 1, 17));
        let weights = db.weights_between(user_id, start, end).unwrap();
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].source, IMPORT_SOURCE);
        assert!((weights[0].weight_kg - 81.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let (db, user_id) = setup();
        let rows = parse_health_csv(SAMPLE_CSV.as_bytes()).unwrap();
        import_health_rows(&db, user_id, &rows, false).unwrap();
        import_health_rows(&db, user_id, &rows, false).unwrap();

        // Registration weight plus two imported days
        assert_eq!(db.weight_history(user_id, None).unwrap().len(), 3);
        assert_eq!(db.get_steps(user_id, d(2024, 1, 15)).unwrap(), 8500);
    }

    #[test]
    fn test_import_unknown_user_fails() {
        let (db, _) = setup();
        let rows = parse_health_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert!(import_health_rows(&db, 999, &rows, false).is_err());
    }
}
