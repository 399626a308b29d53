//! Nightly end-of-day snapshots.
//!
//! The host's scheduler decides *when* to call [`SummaryJob::run`]; this module
//! only decides *what* gets written. A run walks every known user and writes
//! one `daily_summaries` row per (user, date) unless one already exists, so
//! re-running a date never duplicates or overwrites a snapshot.

use anyhow::{Result, anyhow};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::day::{date_key, day_window};
use crate::db::Database;
use crate::health::{HealthDataProvider, step_counts};
use crate::models::{NewDailySummary, User};

pub const LAST_RUN_KEY: &str = "job.summary.last_run";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobReport {
    pub date: NaiveDate,
    pub users_seen: usize,
    pub written: usize,
    pub skipped: usize,
}

/// Result of one run. `Retry` asks the scheduler to run the whole date again.
#[derive(Debug)]
pub enum JobOutcome {
    Success(JobReport),
    Retry(anyhow::Error),
}

pub struct SummaryJob<'a> {
    db: &'a Database,
    health: &'a dyn HealthDataProvider,
}

impl<'a> SummaryJob<'a> {
    pub fn new(db: &'a Database, health: &'a dyn HealthDataProvider) -> Self {
        Self { db, health }
    }

    pub fn run(&self, date: NaiveDate) -> JobOutcome {
        match self.try_run(date) {
            Ok(report) => {
                info!(
                    date = %report.date,
                    users = report.users_seen,
                    written = report.written,
                    skipped = report.skipped,
                    "summary job finished"
                );
                JobOutcome::Success(report)
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(%date, %error, "summary job failed");
                JobOutcome::Retry(e)
            }
        }
    }

    /// Run until success or `max_attempts` runs have failed (at least one run).
    pub fn run_with_retry(&self, date: NaiveDate, max_attempts: u32) -> Result<JobReport> {
        let attempts = max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.run(date) {
                JobOutcome::Success(report) => return Ok(report),
                JobOutcome::Retry(e) => {
                    debug!(attempt, attempts, "summary job will retry");
                    last_error = Some(e);
                }
            }
        }
        let err = last_error.unwrap_or_else(|| anyhow!("summary job did not run"));
        Err(err.context(format!(
            "Summary job for {} failed after {attempts} attempt(s)",
            date_key(date)
        )))
    }

    fn try_run(&self, date: NaiveDate) -> Result<JobReport> {
        let users = self.db.list_users()?;
        let mut report = JobReport {
            date,
            users_seen: users.len(),
            ..Default::default()
        };

        for user in &users {
            if self.db.summary_exists(user.id, date)? {
                debug!(user_id = user.id, date = %date, "snapshot exists, skipping");
                report.skipped += 1;
                continue;
            }
            let snapshot = self.snapshot(user, date)?;
            if self.db.insert_summary(&snapshot)? {
                report.written += 1;
            } else {
                // Lost a race with another writer for the same key
                report.skipped += 1;
            }
        }

        self.db
            .set_setting(LAST_RUN_KEY, &Local::now().to_rfc3339())?;
        Ok(report)
    }

    fn snapshot(&self, user: &User, date: NaiveDate) -> Result<NewDailySummary> {
        let (start, end) = day_window(date);
        let profile = self.db.get_profile(user.id)?;
        let weight_kg = self
            .db
            .latest_weight_before(user.id, end)?
            .map(|w| w.weight_kg);
        let calories = self.db.calories_between(user.id, start, end)?;
        let steps = step_counts(self.db, self.health, &profile, date)?.total();
        let water_ml = self.db.get_water(user.id, date)?;

        Ok(NewDailySummary {
            user_id: user.id,
            date,
            weight_kg,
            calories,
            steps,
            water_ml,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::day::at;
    use crate::db::tests::register;
    use crate::health::NoHealthProvider;
    use crate::models::{NewConsumedFood, NewFood, NewWeightLog, UpdateProfile};

    /// Fails the first `failures` reads, then reports `steps`.
    struct FlakyProvider {
        failures: usize,
        calls: AtomicUsize,
        steps: i64,
    }

    impl HealthDataProvider for FlakyProvider {
        fn is_available(&self) -> bool {
            true
        }

        fn read_steps(&self, _date: NaiveDate) -> Result<i64> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                anyhow::bail!("provider offline");
            }
            Ok(self.steps)
        }

        fn write_steps(&self, _date: NaiveDate, _steps: i64) -> Result<()> {
            Ok(())
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn seed_day(db: &Database, user_id: i64) {
        let food = db
            .insert_food(&NewFood {
                name: "Rice".to_string(),
                category: None,
                protein_per_100g: 2.5,
                fat_per_100g: 0.5,
                carbs_per_100g: 28.0,
            })
            .unwrap();
        db.insert_consumed(&NewConsumedFood {
            user_id,
            food_id: food.id,
            grams: 200.0,
            meal_type: "dinner".to_string(),
            consumed_at: at(day(), 19, 0),
        })
        .unwrap();
        db.insert_weight(&NewWeightLog {
            user_id,
            weight_kg: 63.2,
            logged_at: at(day(), 7, 0),
            source: "manual".to_string(),
        })
        .unwrap();
        db.add_steps(user_id, day(), 4000).unwrap();
        db.add_water(user_id, day(), 1500).unwrap();
    }

    #[test]
    fn test_run_writes_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        seed_day(&db, user.id);

        let job = SummaryJob::new(&db, &NoHealthProvider);
        let JobOutcome::Success(report) = job.run(day()) else {
            panic!("expected success");
        };
        assert_eq!(report.users_seen, 1);
        assert_eq!(report.written, 1);

        let summary = db.get_summary(user.id, day()).unwrap().unwrap();
        assert_eq!(summary.weight_kg, Some(63.2));
        // Rice: round(4*2.5 + 9*0.5 + 4*28) = 127 kcal/100g
        assert!((summary.calories - 254.0).abs() < 1e-9);
        assert_eq!(summary.steps, 4000);
        assert_eq!(summary.water_ml, 1500);
        assert!(db.get_setting(LAST_RUN_KEY).unwrap().is_some());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        seed_day(&db, user.id);
        let job = SummaryJob::new(&db, &NoHealthProvider);

        job.run_with_retry(day(), 1).unwrap();
        db.add_steps(user.id, day(), 9999).unwrap();
        let report = job.run_with_retry(day(), 1).unwrap();

        assert_eq!(report.written, 0);
        assert_eq!(report.skipped, 1);
        let summary = db.get_summary(user.id, day()).unwrap().unwrap();
        assert_eq!(summary.steps, 4000);
        assert_eq!(db.list_summaries(user.id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_end_of_day_weight_ignores_later_logs() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        seed_day(&db, user.id);
        db.insert_weight(&NewWeightLog {
            user_id: user.id,
            weight_kg: 70.0,
            logged_at: at(day() + chrono::Duration::days(1), 7, 0),
            source: "manual".to_string(),
        })
        .unwrap();

        SummaryJob::new(&db, &NoHealthProvider)
            .run_with_retry(day(), 1)
            .unwrap();
        let summary = db.get_summary(user.id, day()).unwrap().unwrap();
        assert_eq!(summary.weight_kg, Some(63.2));
    }

    #[test]
    fn test_day_without_weight_has_none() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        // Registration weight is logged now, after this date
        let past = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();

        SummaryJob::new(&db, &NoHealthProvider)
            .run_with_retry(past, 1)
            .unwrap();
        let summary = db.get_summary(user.id, past).unwrap().unwrap();
        assert_eq!(summary.weight_kg, None);
        assert_eq!(summary.steps, 0);
        assert!(summary.calories.abs() < f64::EPSILON);
    }

    #[test]
    fn test_provider_steps_are_added_when_sync_enabled() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        seed_day(&db, user.id);
        db.update_profile(
            user.id,
            &UpdateProfile {
                health_sync_enabled: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        let provider = FlakyProvider {
            failures: 0,
            calls: AtomicUsize::new(0),
            steps: 2500,
        };

        SummaryJob::new(&db, &provider)
            .run_with_retry(day(), 1)
            .unwrap();
        let summary = db.get_summary(user.id, day()).unwrap().unwrap();
        assert_eq!(summary.steps, 6500);
    }

    #[test]
    fn test_provider_failure_requests_retry() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        db.update_profile(
            user.id,
            &UpdateProfile {
                health_sync_enabled: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        let provider = FlakyProvider {
            failures: 2,
            calls: AtomicUsize::new(0),
            steps: 100,
        };
        let job = SummaryJob::new(&db, &provider);

        assert!(matches!(job.run(day()), JobOutcome::Retry(_)));
        assert!(!db.summary_exists(user.id, day()).unwrap());

        // One more failure, then the third read succeeds
        let report = job.run_with_retry(day(), DEFAULT_MAX_ATTEMPTS).unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_gives_up() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        db.update_profile(
            user.id,
            &UpdateProfile {
                health_sync_enabled: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        let provider = FlakyProvider {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
            steps: 0,
        };

        let err = SummaryJob::new(&db, &provider)
            .run_with_retry(day(), 2)
            .unwrap_err();
        assert!(err.to_string().contains("failed after 2 attempt(s)"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_multiple_users_each_get_one_row() {
        let db = Database::open_in_memory().unwrap();
        let a = register(&db, "alex");
        let b = register(&db, "blake");
        seed_day(&db, a.id);

        let report = SummaryJob::new(&db, &NoHealthProvider)
            .run_with_retry(day(), 1)
            .unwrap();
        assert_eq!(report.users_seen, 2);
        assert_eq!(report.written, 2);
        assert!(db.summary_exists(b.id, day()).unwrap());
    }
}
