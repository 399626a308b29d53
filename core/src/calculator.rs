//! Energy and macro arithmetic.
//!
//! - BMR uses the Mifflin-St Jeor equation:
//!   `10·kg + 6.25·cm − 5·age + 5` (male) or `− 161` (female).
//! - TDEE is BMR scaled by an activity multiplier (sedentary 1.2 by default).
//! - Macro targets are grams per kilogram of body weight, chosen by goal.
//! - Calories always derive from macros: `round(4·protein + 9·fat + 4·carbs)`.

use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{ActivityLevel, Gender, GoalType, validate_height_cm, validate_weight_kg};

pub const KCAL_PER_G_PROTEIN: f64 = 4.0;
pub const KCAL_PER_G_FAT: f64 = 9.0;
pub const KCAL_PER_G_CARBS: f64 = 4.0;

pub const DEFAULT_STEP_GOAL: i64 = 10_000;

const WATER_ML_PER_KG: f64 = 35.0;
const KCAL_PER_STEP_AT_70KG: f64 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroTargets {
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    pub calories: i64,
}

#[must_use]
pub fn calories_from_macros(protein_g: f64, fat_g: f64, carbs_g: f64) -> i64 {
    (KCAL_PER_G_PROTEIN * protein_g + KCAL_PER_G_FAT * fat_g + KCAL_PER_G_CARBS * carbs_g).round()
        as i64
}

/// Grams of (protein, fat, carbs) per kilogram of body weight.
#[must_use]
pub fn macro_coefficients(goal: GoalType) -> (f64, f64, f64) {
    match goal {
        GoalType::Lose => (2.2, 0.8, 2.0),
        GoalType::Maintain => (1.8, 1.0, 3.0),
        GoalType::Gain => (2.0, 1.0, 4.0),
    }
}

pub fn macro_targets(weight_kg: f64, goal: GoalType) -> Result<MacroTargets> {
    validate_weight_kg(weight_kg)?;
    let (p, f, c) = macro_coefficients(goal);
    let protein_g = p * weight_kg;
    let fat_g = f * weight_kg;
    let carbs_g = c * weight_kg;
    Ok(MacroTargets {
        protein_g,
        fat_g,
        carbs_g,
        calories: calories_from_macros(protein_g, fat_g, carbs_g),
    })
}

pub fn bmr(weight_kg: f64, height_cm: f64, age: u32, gender: Gender) -> Result<f64> {
    validate_weight_kg(weight_kg)?;
    validate_height_cm(height_cm)?;
    if age > 130 {
        bail!("Age must be between 0 and 130 years");
    }
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age);
    Ok(match gender {
        Gender::Male => base + 5.0,
        Gender::Female => base - 161.0,
    })
}

#[must_use]
pub fn tdee(bmr: f64, activity: ActivityLevel) -> f64 {
    bmr * activity.multiplier()
}

/// Age in whole years on `on`.
pub fn age_on(birth_date: NaiveDate, on: NaiveDate) -> Result<u32> {
    if birth_date > on {
        bail!("Birth date {birth_date} is in the future");
    }
    let mut years = on.year() - birth_date.year();
    if (on.month(), on.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    let years = u32::try_from(years)?;
    if years > 130 {
        bail!("Age must be between 0 and 130 years");
    }
    Ok(years)
}

#[must_use]
pub fn stride_length_cm(height_cm: f64, gender: Gender) -> f64 {
    match gender {
        Gender::Male => height_cm * 0.415,
        Gender::Female => height_cm * 0.413,
    }
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn steps_to_distance_km(steps: i64, stride_cm: f64) -> f64 {
    steps.max(0) as f64 * stride_cm / 100_000.0
}

/// Rough active energy for walking, scaled linearly from a 70 kg reference.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn steps_to_kcal(steps: i64, weight_kg: f64) -> f64 {
    steps.max(0) as f64 * KCAL_PER_STEP_AT_70KG * (weight_kg / 70.0)
}

/// Daily water target, rounded to the nearest 50 ml.
#[must_use]
pub fn water_target_ml(weight_kg: f64) -> i64 {
    ((weight_kg * WATER_ML_PER_KG) / 50.0).round() as i64 * 50
}
