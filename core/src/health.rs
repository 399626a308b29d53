use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use crate::db::Database;
use crate::models::Profile;

/// Platform health-data aggregation service (step counts).
///
/// Hosts with a health service implement this; the CLI uses
/// [`NoHealthProvider`]. Calls are synchronous, so a host backed by a slow
/// service should call `StrideService` from a background thread.
pub trait HealthDataProvider: Send + Sync {
    /// Whether the service is installed and permissions are granted.
    fn is_available(&self) -> bool;

    /// Steps the provider recorded for the local day.
    fn read_steps(&self, date: NaiveDate) -> Result<i64>;

    /// Record additional steps for the local day.
    fn write_steps(&self, date: NaiveDate, steps: i64) -> Result<()>;
}

/// Stand-in for hosts without a health service.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHealthProvider;

impl HealthDataProvider for NoHealthProvider {
    fn is_available(&self) -> bool {
        false
    }

    fn read_steps(&self, _date: NaiveDate) -> Result<i64> {
        Ok(0)
    }

    fn write_steps(&self, _date: NaiveDate, _steps: i64) -> Result<()> {
        bail!("No health data provider is available")
    }
}

/// Locally recorded and provider step counts for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepCounts {
    pub recorded: i64,
    pub provider: i64,
}

impl StepCounts {
    #[must_use]
    pub fn total(self) -> i64 {
        self.recorded + self.provider
    }
}

/// The provider is only consulted when the user enabled sync and the host
/// reports it available. Provider errors are returned to the caller.
pub fn step_counts(
    db: &Database,
    health: &dyn HealthDataProvider,
    profile: &Profile,
    date: NaiveDate,
) -> Result<StepCounts> {
    let recorded = db.get_steps(profile.user_id, date)?;
    let provider = if profile.health_sync_enabled && health.is_available() {
        health
            .read_steps(date)
            .with_context(|| format!("Failed to read steps for {date} from health provider"))?
            .max(0)
    } else {
        0
    };
    Ok(StepCounts { recorded, provider })
}
