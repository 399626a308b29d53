use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

// --- Enumerations stored as TEXT ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            _ => bail!("Invalid gender '{s}'. Use: male, female"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Lose,
    Maintain,
    Gain,
}

impl GoalType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GoalType::Lose => "lose",
            GoalType::Maintain => "maintain",
            GoalType::Gain => "gain",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lose" | "loss" | "cut" => Ok(GoalType::Lose),
            "maintain" | "maintenance" => Ok(GoalType::Maintain),
            "gain" | "bulk" => Ok(GoalType::Gain),
            _ => bail!("Invalid goal '{s}'. Use: lose, maintain, gain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    #[default]
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very_active",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" => Ok(ActivityLevel::Light),
            "moderate" => Ok(ActivityLevel::Moderate),
            "active" => Ok(ActivityLevel::Active),
            "very_active" => Ok(ActivityLevel::VeryActive),
            _ => bail!(
                "Invalid activity level '{s}'. Use: sedentary, light, moderate, active, very-active"
            ),
        }
    }
}

// --- Users, profile, goals ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: i64,
    pub name: String,
    pub gender: Gender,
    pub height_cm: f64,
    pub birth_date: NaiveDate,
    pub activity_level: ActivityLevel,
    pub health_sync_enabled: bool,
    pub health_write_enabled: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goals {
    pub user_id: i64,
    pub goal_type: GoalType,
    pub target_weight_kg: f64,
    pub target_water_ml: i64,
    pub target_steps: i64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    pub calories: i64,
    pub updated_at: String,
}

/// Everything collected by the sign-up flow.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub username: String,
    pub password: String,
    pub name: String,
    pub gender: Gender,
    pub height_cm: f64,
    pub birth_date: NaiveDate,
    pub weight_kg: f64,
    pub goal_type: GoalType,
    pub target_weight_kg: Option<f64>,
    pub activity_level: ActivityLevel,
}

/// Derived goal values written alongside a new user.
#[derive(Debug, Clone)]
pub struct NewGoals {
    pub goal_type: GoalType,
    pub target_weight_kg: f64,
    pub target_water_ml: i64,
    pub target_steps: i64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    pub calories: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub birth_date: Option<NaiveDate>,
    pub activity_level: Option<ActivityLevel>,
    pub health_sync_enabled: Option<bool>,
    pub health_write_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateGoals {
    pub goal_type: Option<GoalType>,
    pub target_weight_kg: Option<f64>,
    pub target_water_ml: Option<i64>,
    pub target_steps: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnergyReport {
    pub date: NaiveDate,
    pub age: u32,
    pub weight_kg: f64,
    pub bmr: f64,
    pub tdee: f64,
    pub activity_level: ActivityLevel,
    pub goal_calories: i64,
}

// --- Weight ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightLog {
    pub id: i64,
    pub user_id: i64,
    pub weight_kg: f64,
    pub logged_at: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct NewWeightLog {
    pub user_id: i64,
    pub weight_kg: f64,
    pub logged_at: DateTime<Utc>,
    pub source: String,
}

/// One local day in a weight series; `None` when nothing was logged.
#[derive(Debug, Clone, Serialize)]
pub struct WeightPoint {
    pub date: NaiveDate,
    pub weight_kg: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyAverage {
    pub week_start: NaiveDate,
    pub average_kg: Option<f64>,
    pub samples: usize,
}

// --- Food catalog and diary ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub category: Option<String>,
    pub protein_per_100g: f64,
    pub fat_per_100g: f64,
    pub carbs_per_100g: f64,
    pub calories_per_100g: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFood {
    pub name: String,
    pub category: Option<String>,
    pub protein_per_100g: f64,
    pub fat_per_100g: f64,
    pub carbs_per_100g: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumedFood {
    pub id: i64,
    pub user_id: i64,
    pub food_id: i64,
    pub grams: f64,
    pub meal_type: String,
    pub consumed_at: DateTime<Utc>,
    // Joined from the catalog, scaled to `grams`
    pub food_name: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
}

#[derive(Debug, Clone)]
pub struct NewConsumedFood {
    pub user_id: i64,
    pub food_id: i64,
    pub grams: f64,
    pub meal_type: String,
    pub consumed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateConsumedFood {
    pub grams: Option<f64>,
    pub meal_type: Option<String>,
    pub consumed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
}

impl MacroTotals {
    fn add(&mut self, entry: &ConsumedFood) {
        self.calories += entry.calories;
        self.protein += entry.protein;
        self.fat += entry.fat;
        self.carbs += entry.carbs;
    }

    #[must_use]
    pub fn of(entries: &[ConsumedFood]) -> Self {
        let mut totals = Self::default();
        for e in entries {
            totals.add(e);
        }
        totals
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MealGroup {
    pub meal_type: String,
    pub entries: Vec<ConsumedFood>,
    pub subtotal: MacroTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayNutrition {
    pub date: NaiveDate,
    pub meals: Vec<MealGroup>,
    pub total: MacroTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goals: Option<Goals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<MacroTotals>,
}

// --- Daily counters ---

#[derive(Debug, Clone, Serialize)]
pub struct DailyWater {
    pub date: NaiveDate,
    pub user_id: i64,
    pub amount_ml: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ml: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepsReport {
    pub date: NaiveDate,
    pub recorded_steps: i64,
    pub provider_steps: i64,
    pub total_steps: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_steps: Option<i64>,
    pub distance_km: f64,
    pub active_kcal: f64,
}

/// End-of-day snapshot written by the nightly job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub user_id: i64,
    pub date: NaiveDate,
    pub weight_kg: Option<f64>,
    pub calories: f64,
    pub steps: i64,
    pub water_ml: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewDailySummary {
    pub user_id: i64,
    pub date: NaiveDate,
    pub weight_kg: Option<f64>,
    pub calories: f64,
    pub steps: i64,
    pub water_ml: i64,
}

// --- Export ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDayCount {
    pub date: NaiveDate,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    pub version: i64,
    pub exported_at: String,
    pub user: User,
    pub profile: Profile,
    pub goals: Goals,
    pub weight_logs: Vec<WeightLog>,
    pub consumed_foods: Vec<ConsumedFood>,
    pub steps: Vec<ExportDayCount>,
    pub water: Vec<ExportDayCount>,
    pub summaries: Vec<DailySummary>,
}

// --- Validation ---

pub fn validate_meal_type(meal: &str) -> Result<String> {
    let lower = meal.trim().to_lowercase();
    if MEAL_TYPES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!(
            "Invalid meal type '{meal}'. Use: {}",
            MEAL_TYPES.join(", ")
        )
    }
}

pub fn validate_username(username: &str) -> Result<()> {
    let trimmed = username.trim();
    if trimmed.len() < 3 || trimmed.len() > 32 {
        bail!("Username must be between 3 and 32 characters");
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        bail!("Username may only contain letters, digits, '.', '_' and '-'");
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 6 {
        bail!("Password must be at least 6 characters");
    }
    Ok(())
}

pub fn validate_weight_kg(weight_kg: f64) -> Result<()> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 || weight_kg > 700.0 {
        bail!("Weight must be between 0 and 700 kg");
    }
    Ok(())
}

pub fn validate_height_cm(height_cm: f64) -> Result<()> {
    if !height_cm.is_finite() || height_cm <= 0.0 || height_cm > 300.0 {
        bail!("Height must be between 0 and 300 cm");
    }
    Ok(())
}

pub fn validate_macros(protein: f64, fat: f64, carbs: f64) -> Result<()> {
    for (name, v) in [("protein", protein), ("fat", fat), ("carbs", carbs)] {
        if !v.is_finite() || v < 0.0 {
            bail!("{name} must be a non-negative number");
        }
    }
    Ok(())
}

pub fn validate_new_food(food: &NewFood) -> Result<()> {
    if food.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    validate_macros(food.protein_per_100g, food.fat_per_100g, food.carbs_per_100g)?;
    if food.protein_per_100g + food.fat_per_100g + food.carbs_per_100g > 100.0 {
        bail!("Macros per 100g cannot add up to more than 100g");
    }
    Ok(())
}

pub fn validate_grams(grams: f64) -> Result<()> {
    if !grams.is_finite() || grams <= 0.0 {
        bail!("Quantity must be greater than 0 g");
    }
    Ok(())
}
