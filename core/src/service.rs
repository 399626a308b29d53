use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::auth::{hash_password, verify_password};
use crate::calculator::{
    DEFAULT_STEP_GOAL, age_on, bmr, macro_targets, steps_to_distance_km, steps_to_kcal,
    stride_length_cm, tdee, water_target_ml,
};
use crate::day::{day_window, local_date, today};
use crate::db::Database;
use crate::error::StrideError;
use crate::health::{HealthDataProvider, NoHealthProvider, StepCounts, step_counts};
use crate::health_import::{self, HealthImportSummary};
use crate::models::{
    ConsumedFood, DailySummary, DailyWater, DayNutrition, EnergyReport, ExportData, Food, Goals,
    MEAL_TYPES, MacroTotals, MealGroup, NewConsumedFood, NewFood, NewGoals, NewRegistration,
    NewWeightLog, Profile, StepsReport, UpdateConsumedFood, UpdateGoals, UpdateProfile, User,
    WeeklyAverage, WeightLog, WeightPoint, validate_grams, validate_height_cm, validate_macros,
    validate_meal_type, validate_new_food, validate_password, validate_username,
    validate_weight_kg,
};
use crate::summary_job::{JobReport, LAST_RUN_KEY, SummaryJob};

pub const SESSION_KEY: &str = "session.user_id";
const EXPORT_VERSION: i64 = 1;

pub struct StrideService {
    db: Database,
    health: Box<dyn HealthDataProvider>,
}

impl StrideService {
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self {
            db,
            health: Box::new(NoHealthProvider),
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db,
            health: Box::new(NoHealthProvider),
        })
    }

    #[must_use]
    pub fn with_health_provider(mut self, health: Box<dyn HealthDataProvider>) -> Self {
        self.health = health;
        self
    }

    // --- Accounts and session ---

    /// Create the user with profile, derived goals and initial weight.
    pub fn register(&self, reg: &NewRegistration) -> Result<User> {
        validate_username(&reg.username)?;
        validate_password(&reg.password)?;
        if reg.name.trim().is_empty() {
            bail!("Name must not be empty");
        }
        validate_height_cm(reg.height_cm)?;
        validate_weight_kg(reg.weight_kg)?;
        age_on(reg.birth_date, today())?;
        let target_weight_kg = reg.target_weight_kg.unwrap_or(reg.weight_kg);
        validate_weight_kg(target_weight_kg)?;

        if self.db.get_user_by_username(&reg.username)?.is_some() {
            return Err(StrideError::UsernameTaken(reg.username.trim().to_string()).into());
        }

        let macros = macro_targets(reg.weight_kg, reg.goal_type)?;
        let goals = NewGoals {
            goal_type: reg.goal_type,
            target_weight_kg,
            target_water_ml: water_target_ml(reg.weight_kg),
            target_steps: DEFAULT_STEP_GOAL,
            protein_g: macros.protein_g,
            fat_g: macros.fat_g,
            carbs_g: macros.carbs_g,
            calories: macros.calories,
        };
        let password_hash = hash_password(&reg.password)?;

        match self.db.register_user(reg, &password_hash, &goals) {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "registered user");
                Ok(user)
            }
            Err(e) if is_username_conflict(&e) => {
                Err(StrideError::UsernameTaken(reg.username.trim().to_string()).into())
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(%error, "registration rolled back");
                Err(StrideError::RegistrationFailed(error).into())
            }
        }
    }

    /// Verify credentials and make the user the active session.
    pub fn login(&self, username: &str, password: &str) -> Result<User> {
        let Some((user, password_hash)) = self.db.get_credentials(username)? else {
            debug!(username, "login for unknown user");
            return Err(StrideError::InvalidCredentials.into());
        };
        if !verify_password(password, &password_hash)? {
            warn!(user_id = user.id, "login failed: wrong password");
            return Err(StrideError::InvalidCredentials.into());
        }
        self.db.set_setting(SESSION_KEY, &user.id.to_string())?;
        info!(user_id = user.id, "logged in");
        Ok(user)
    }

    pub fn logout(&self) -> Result<bool> {
        self.db.delete_setting(SESSION_KEY)
    }

    pub fn current_user(&self) -> Result<Option<User>> {
        let Some(raw) = self.db.get_setting(SESSION_KEY)? else {
            return Ok(None);
        };
        let id: i64 = raw
            .parse()
            .with_context(|| format!("Corrupt session value '{raw}'"))?;
        match self.db.get_user(id) {
            Ok(user) => Ok(Some(user)),
            Err(e) if matches!(e.downcast_ref::<StrideError>(), Some(StrideError::UserNotFound(_))) => {
                // Session points at a deleted account
                self.db.delete_setting(SESSION_KEY)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn require_user(&self) -> Result<User> {
        self.current_user()?
            .ok_or_else(|| StrideError::NotLoggedIn.into())
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.db.get_user(id)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    /// Delete the account and everything recorded for it.
    pub fn delete_user(&self, user_id: i64) -> Result<bool> {
        let deleted = self.db.delete_user(user_id)?;
        if deleted {
            if self.db.get_setting(SESSION_KEY)?.as_deref() == Some(user_id.to_string().as_str()) {
                self.db.delete_setting(SESSION_KEY)?;
            }
            info!(user_id, "deleted user");
        }
        Ok(deleted)
    }

    // --- Profile and goals ---

    pub fn get_profile(&self, user_id: i64) -> Result<Profile> {
        self.db.get_profile(user_id)
    }

    pub fn update_profile(&self, user_id: i64, update: &UpdateProfile) -> Result<Profile> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            bail!("Name must not be empty");
        }
        if let Some(height) = update.height_cm {
            validate_height_cm(height)?;
        }
        if let Some(birth_date) = update.birth_date {
            age_on(birth_date, today())?;
        }
        self.db.update_profile(user_id, update)
    }

    pub fn get_goals(&self, user_id: i64) -> Result<Goals> {
        self.db.get_goals(user_id)
    }

    /// Changing the goal type re-derives macros from the latest weight.
    pub fn update_goals(&self, user_id: i64, update: &UpdateGoals) -> Result<Goals> {
        if let Some(kg) = update.target_weight_kg {
            validate_weight_kg(kg)?;
        }
        if update.target_water_ml.is_some_and(|ml| ml < 0) {
            bail!("Water target must not be negative");
        }
        if update.target_steps.is_some_and(|s| s < 0) {
            bail!("Step target must not be negative");
        }
        // Macros are derived up front so a failure leaves the row untouched
        let macros = match update.goal_type {
            Some(goal_type) => Some(macro_targets(self.current_weight(user_id)?, goal_type)?),
            None => None,
        };
        self.db.update_goals(user_id, update, macros.as_ref())
    }

    pub fn recalculate_goals(&self, user_id: i64) -> Result<Goals> {
        let goals = self.db.get_goals(user_id)?;
        let weight = self.current_weight(user_id)?;
        let macros = macro_targets(weight, goals.goal_type)?;
        debug!(user_id, weight, calories = macros.calories, "recalculated macros");
        self.db
            .set_goal_macros(user_id, macros.protein_g, macros.fat_g, macros.carbs_g)
    }

    pub fn set_custom_macros(
        &self,
        user_id: i64,
        protein_g: f64,
        fat_g: f64,
        carbs_g: f64,
    ) -> Result<Goals> {
        validate_macros(protein_g, fat_g, carbs_g)?;
        self.db.set_goal_macros(user_id, protein_g, fat_g, carbs_g)
    }

    pub fn energy_report(&self, user_id: i64, date: NaiveDate) -> Result<EnergyReport> {
        let profile = self.db.get_profile(user_id)?;
        let goals = self.db.get_goals(user_id)?;
        let weight_kg = self.weight_on(user_id, date)?;
        let age = age_on(profile.birth_date, date)?;
        let bmr = bmr(weight_kg, profile.height_cm, age, profile.gender)?;
        Ok(EnergyReport {
            date,
            age,
            weight_kg,
            bmr,
            tdee: tdee(bmr, profile.activity_level),
            activity_level: profile.activity_level,
            goal_calories: goals.calories,
        })
    }

    // --- Food catalog ---

    pub fn add_food(&self, food: &NewFood) -> Result<Food> {
        validate_new_food(food)?;
        self.db.insert_food(food)
    }

    pub fn get_food(&self, id: i64) -> Result<Food> {
        self.db.get_food(id)
    }

    pub fn search_foods(&self, query: &str) -> Result<Vec<Food>> {
        self.db.search_foods(query)
    }

    pub fn list_foods(&self, search: Option<&str>) -> Result<Vec<Food>> {
        self.db.list_foods(search)
    }

    pub fn find_food_by_name(&self, name: &str) -> Result<Option<Food>> {
        self.db.find_food_by_name(name)
    }

    pub fn update_food_nutrients(
        &self,
        id: i64,
        protein_per_100g: f64,
        fat_per_100g: f64,
        carbs_per_100g: f64,
    ) -> Result<Food> {
        let existing = self.db.get_food(id)?;
        validate_new_food(&NewFood {
            name: existing.name,
            category: existing.category,
            protein_per_100g,
            fat_per_100g,
            carbs_per_100g,
        })?;
        self.db
            .update_food_nutrients(id, protein_per_100g, fat_per_100g, carbs_per_100g)
    }

    /// Removes the food and every diary entry that references it.
    pub fn delete_food(&self, id: i64) -> Result<bool> {
        self.db.delete_food(id)
    }

    // --- Food diary ---

    pub fn log_food(
        &self,
        user_id: i64,
        food_id: i64,
        grams: f64,
        meal_type: &str,
        consumed_at: DateTime<Utc>,
    ) -> Result<ConsumedFood> {
        validate_grams(grams)?;
        let meal_type = validate_meal_type(meal_type)?;
        self.db.get_food(food_id)?;
        self.db.insert_consumed(&NewConsumedFood {
            user_id,
            food_id,
            grams,
            meal_type,
            consumed_at,
        })
    }

    pub fn get_consumed(&self, user_id: i64, id: i64) -> Result<ConsumedFood> {
        let entry = self.db.get_consumed(id)?;
        if entry.user_id != user_id {
            bail!("Consumed food entry not found");
        }
        Ok(entry)
    }

    pub fn update_consumed(
        &self,
        user_id: i64,
        id: i64,
        update: &UpdateConsumedFood,
    ) -> Result<ConsumedFood> {
        self.get_consumed(user_id, id)?;
        if let Some(grams) = update.grams {
            validate_grams(grams)?;
        }
        let mut update = update.clone();
        if let Some(ref meal) = update.meal_type {
            update.meal_type = Some(validate_meal_type(meal)?);
        }
        self.db.update_consumed(id, &update)
    }

    pub fn delete_consumed(&self, user_id: i64, id: i64) -> Result<bool> {
        self.db.delete_consumed(user_id, id)
    }

    /// The local day's entries grouped by meal, with totals and what is left
    /// of the goal.
    pub fn daily_nutrition(&self, user_id: i64, date: NaiveDate) -> Result<DayNutrition> {
        let (start, end) = day_window(date);
        let entries = self.db.consumed_between(user_id, start, end)?;
        let goals = self.db.get_goals(user_id)?;

        let meals: Vec<MealGroup> = MEAL_TYPES
            .iter()
            .map(|meal| {
                let entries: Vec<ConsumedFood> = entries
                    .iter()
                    .filter(|e| e.meal_type == *meal)
                    .cloned()
                    .collect();
                MealGroup {
                    meal_type: (*meal).to_string(),
                    subtotal: MacroTotals::of(&entries),
                    entries,
                }
            })
            .collect();
        let total = MacroTotals::of(&entries);

        #[allow(clippy::cast_precision_loss)]
        let remaining = MacroTotals {
            calories: goals.calories as f64 - total.calories,
            protein: goals.protein_g - total.protein,
            fat: goals.fat_g - total.fat,
            carbs: goals.carbs_g - total.carbs,
        };

        Ok(DayNutrition {
            date,
            meals,
            total,
            goals: Some(goals),
            remaining: Some(remaining),
        })
    }

    // --- Water ---

    pub fn water(&self, user_id: i64, date: NaiveDate) -> Result<DailyWater> {
        let goals = self.db.get_goals(user_id)?;
        Ok(DailyWater {
            date,
            user_id,
            amount_ml: self.db.get_water(user_id, date)?,
            target_ml: Some(goals.target_water_ml),
        })
    }

    /// Negative deltas remove water; the day's total stops at zero.
    pub fn add_water(&self, user_id: i64, date: NaiveDate, delta_ml: i64) -> Result<DailyWater> {
        self.db.get_user(user_id)?;
        self.db.add_water(user_id, date, delta_ml)?;
        self.water(user_id, date)
    }

    // --- Steps ---

    /// Record a manual step change for the day.
    ///
    /// Positive additions are written to the health provider when the user
    /// enabled write-back. If sync is also on, a successful write is not
    /// stored locally, since the provider count already includes it.
    pub fn add_steps(&self, user_id: i64, date: NaiveDate, delta: i64) -> Result<StepsReport> {
        let profile = self.db.get_profile(user_id)?;
        let mut mirrored = false;
        if delta > 0 && profile.health_write_enabled && self.health.is_available() {
            match self.health.write_steps(date, delta) {
                Ok(()) => mirrored = true,
                Err(e) => {
                    let error = format!("{e:#}");
                    warn!(user_id, %date, delta, %error, "failed to write steps to health provider");
                }
            }
        }
        if !(mirrored && profile.health_sync_enabled) {
            self.db.add_steps(user_id, date, delta)?;
        }
        self.daily_steps(user_id, date)
    }

    /// Local and provider steps combined, with distance and active energy.
    pub fn daily_steps(&self, user_id: i64, date: NaiveDate) -> Result<StepsReport> {
        let profile = self.db.get_profile(user_id)?;
        let goals = self.db.get_goals(user_id)?;
        let counts = match step_counts(&self.db, self.health.as_ref(), &profile, date) {
            Ok(counts) => counts,
            Err(e) => {
                let error = format!("{e:#}");
                warn!(user_id, %date, %error, "using local steps only");
                StepCounts {
                    recorded: self.db.get_steps(user_id, date)?,
                    provider: 0,
                }
            }
        };
        let total = counts.total();
        let stride = stride_length_cm(profile.height_cm, profile.gender);
        let weight = self.weight_on(user_id, date).ok();

        Ok(StepsReport {
            date,
            recorded_steps: counts.recorded,
            provider_steps: counts.provider,
            total_steps: total,
            target_steps: Some(goals.target_steps),
            distance_km: steps_to_distance_km(total, stride),
            active_kcal: weight.map_or(0.0, |kg| steps_to_kcal(total, kg)),
        })
    }

    // --- Weight ---

    pub fn log_weight(
        &self,
        user_id: i64,
        weight_kg: f64,
        logged_at: Option<DateTime<Utc>>,
    ) -> Result<WeightLog> {
        validate_weight_kg(weight_kg)?;
        self.db.get_user(user_id)?;
        self.db.insert_weight(&NewWeightLog {
            user_id,
            weight_kg,
            logged_at: logged_at.unwrap_or_else(Utc::now),
            source: "manual".to_string(),
        })
    }

    pub fn delete_weight(&self, user_id: i64, id: i64) -> Result<bool> {
        self.db.delete_weight_log(user_id, id)
    }

    pub fn weight_history(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<WeightLog>> {
        self.db.weight_history(user_id, limit)
    }

    /// Latest weight logged at or before `at`.
    pub fn latest_weight(&self, user_id: i64, at: DateTime<Utc>) -> Result<Option<WeightLog>> {
        self.db
            .latest_weight_before(user_id, at.timestamp_millis() + 1)
    }

    /// The seven local days ending on `end`, oldest first, each carrying the
    /// last weight logged that day.
    pub fn weekly_weight_series(&self, user_id: i64, end: NaiveDate) -> Result<Vec<WeightPoint>> {
        let first = end - Duration::days(6);
        let (start_ms, _) = day_window(first);
        let (_, end_ms) = day_window(end);
        let logs = self.db.weights_between(user_id, start_ms, end_ms)?;

        Ok((0..7)
            .map(|offset| {
                let date = first + Duration::days(offset);
                let weight_kg = logs
                    .iter()
                    .rev()
                    .find(|log| local_date(log.logged_at) == date)
                    .map(|log| log.weight_kg);
                WeightPoint { date, weight_kg }
            })
            .collect())
    }

    /// Mean of all logs in each of the last `weeks` seven-day blocks ending
    /// on `end`, oldest first.
    #[allow(clippy::cast_precision_loss)]
    pub fn weekly_averages(
        &self,
        user_id: i64,
        weeks: u32,
        end: NaiveDate,
    ) -> Result<Vec<WeeklyAverage>> {
        let mut averages = Vec::new();
        for i in (0..i64::from(weeks)).rev() {
            let week_end = end - Duration::days(7 * i);
            let week_start = week_end - Duration::days(6);
            let (start_ms, _) = day_window(week_start);
            let (_, end_ms) = day_window(week_end);
            let logs = self.db.weights_between(user_id, start_ms, end_ms)?;
            let average_kg = if logs.is_empty() {
                None
            } else {
                Some(logs.iter().map(|l| l.weight_kg).sum::<f64>() / logs.len() as f64)
            };
            averages.push(WeeklyAverage {
                week_start,
                average_kg,
                samples: logs.len(),
            });
        }
        Ok(averages)
    }

    /// Latest weight up to now, else the newest log. With every log deleted
    /// the goal's target weight stands in.
    fn current_weight(&self, user_id: i64) -> Result<f64> {
        let latest = self
            .latest_weight(user_id, Utc::now())?
            .or(self.db.weight_history(user_id, Some(1))?.into_iter().next());
        match latest {
            Some(log) => Ok(log.weight_kg),
            None => {
                debug!(user_id, "no weight logged, using target weight");
                Ok(self.db.get_goals(user_id)?.target_weight_kg)
            }
        }
    }

    /// Weight at the end of `date`, falling back to the newest log.
    fn weight_on(&self, user_id: i64, date: NaiveDate) -> Result<f64> {
        let (_, end) = day_window(date);
        match self.db.latest_weight_before(user_id, end)? {
            Some(log) => Ok(log.weight_kg),
            None => self.current_weight(user_id),
        }
    }

    // --- Nightly summary ---

    #[must_use]
    pub fn summary_job(&self) -> SummaryJob<'_> {
        SummaryJob::new(&self.db, self.health.as_ref())
    }

    pub fn run_nightly_summary(&self, date: NaiveDate, max_attempts: u32) -> Result<JobReport> {
        self.summary_job().run_with_retry(date, max_attempts)
    }

    pub fn last_summary_run(&self) -> Result<Option<String>> {
        self.db.get_setting(LAST_RUN_KEY)
    }

    pub fn summaries(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<DailySummary>> {
        self.db.list_summaries(user_id, limit)
    }

    // --- Import / export ---

    pub fn import_health_csv(
        &self,
        user_id: i64,
        csv_data: &str,
        dry_run: bool,
    ) -> Result<HealthImportSummary> {
        let rows = health_import::parse_health_csv(csv_data.as_bytes())?;
        health_import::import_health_rows(&self.db, user_id, &rows, dry_run)
    }

    pub fn export_user(&self, user_id: i64) -> Result<ExportData> {
        Ok(ExportData {
            version: EXPORT_VERSION,
            exported_at: Local::now().to_rfc3339(),
            user: self.db.get_user(user_id)?,
            profile: self.db.get_profile(user_id)?,
            goals: self.db.get_goals(user_id)?,
            weight_logs: self.db.weight_history(user_id, None)?,
            consumed_foods: self.db.consumed_between(user_id, i64::MIN, i64::MAX)?,
            steps: self.db.list_steps(user_id)?,
            water: self.db.list_water(user_id)?,
            summaries: self.db.list_summaries(user_id, None)?,
        })
    }
}

/// Only the UNIQUE index on `users.username`; other constraint failures are
/// registration errors.
fn is_username_conflict(e: &anyhow::Error) -> bool {
    match e.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(err, message)) => {
            err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && message
                    .as_deref()
                    .is_some_and(|m| m.contains("users.username"))
        }
        _ => false,
    }
}
