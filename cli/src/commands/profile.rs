use anyhow::{Result, bail};

use stride_core::models::{
    ActivityLevel, Gender, GoalType, Goals, Profile, UpdateGoals, UpdateProfile,
};
use stride_core::service::StrideService;

use super::helpers::{LBS_PER_KG, parse_date, session_user, to_kg};

fn print_profile(profile: &Profile) {
    println!("  Name:          {}", profile.name);
    println!("  Gender:        {}", profile.gender.as_str());
    println!("  Height:        {:.1} cm", profile.height_cm);
    println!("  Birth date:    {}", profile.birth_date);
    println!("  Activity:      {}", profile.activity_level.as_str());
    println!(
        "  Health sync:   {} (write-back: {})",
        on_off(profile.health_sync_enabled),
        on_off(profile.health_write_enabled)
    );
}

fn print_goals(goals: &Goals) {
    println!("  Goal:          {}", goals.goal_type.as_str());
    println!(
        "  Target weight: {:.1} kg ({:.1} lbs)",
        goals.target_weight_kg,
        goals.target_weight_kg * LBS_PER_KG
    );
    println!(
        "  Calories:      {} kcal | P:{:.0}g F:{:.0}g C:{:.0}g",
        goals.calories, goals.protein_g, goals.fat_g, goals.carbs_g
    );
    println!("  Water:         {} ml", goals.target_water_ml);
    println!("  Steps:         {}", goals.target_steps);
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

fn parse_switch(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => bail!("Invalid value '{s}'. Use on or off"),
    }
}

pub(crate) fn cmd_profile_show(svc: &StrideService, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let profile = svc.get_profile(user.id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("=== {} ===\n", user.username);
        print_profile(&profile);
    }
    Ok(())
}

/// Raw profile flags; every field is optional.
pub(crate) struct ProfileArgs {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub height_cm: Option<f64>,
    pub birth_date: Option<String>,
    pub activity: Option<String>,
    pub health_sync: Option<String>,
    pub health_write: Option<String>,
}

pub(crate) fn cmd_profile_set(svc: &StrideService, args: ProfileArgs, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let update = UpdateProfile {
        name: args.name,
        gender: args.gender.as_deref().map(Gender::parse).transpose()?,
        height_cm: args.height_cm,
        birth_date: args.birth_date.map(Some).map(parse_date).transpose()?,
        activity_level: args
            .activity
            .as_deref()
            .map(ActivityLevel::parse)
            .transpose()?,
        health_sync_enabled: args.health_sync.as_deref().map(parse_switch).transpose()?,
        health_write_enabled: args.health_write.as_deref().map(parse_switch).transpose()?,
    };
    if update.name.is_none()
        && update.gender.is_none()
        && update.height_cm.is_none()
        && update.birth_date.is_none()
        && update.activity_level.is_none()
        && update.health_sync_enabled.is_none()
        && update.health_write_enabled.is_none()
    {
        bail!("Nothing to update. Provide at least one profile option");
    }

    let profile = svc.update_profile(user.id, &update)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Updated profile\n");
        print_profile(&profile);
    }
    Ok(())
}

pub(crate) fn cmd_goals_show(svc: &StrideService, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let goals = svc.get_goals(user.id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else {
        print_goals(&goals);
    }
    Ok(())
}

pub(crate) struct GoalArgs {
    pub goal: Option<String>,
    pub target_weight: Option<f64>,
    pub unit: String,
    pub water_ml: Option<i64>,
    pub steps: Option<i64>,
}

pub(crate) fn cmd_goals_set(svc: &StrideService, args: GoalArgs, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let update = UpdateGoals {
        goal_type: args.goal.as_deref().map(GoalType::parse).transpose()?,
        target_weight_kg: args
            .target_weight
            .map(|w| to_kg(w, &args.unit))
            .transpose()?,
        target_water_ml: args.water_ml,
        target_steps: args.steps,
    };
    if update.goal_type.is_none()
        && update.target_weight_kg.is_none()
        && update.target_water_ml.is_none()
        && update.target_steps.is_none()
    {
        bail!("Nothing to update. Provide at least one of --goal, --target-weight, --water, --steps");
    }

    let goals = svc.update_goals(user.id, &update)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else {
        println!("Updated goals\n");
        print_goals(&goals);
    }
    Ok(())
}

pub(crate) fn cmd_goals_macros(
    svc: &StrideService,
    protein: f64,
    fat: f64,
    carbs: f64,
    json: bool,
) -> Result<()> {
    let user = session_user(svc)?;
    let goals = svc.set_custom_macros(user.id, protein, fat, carbs)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else {
        println!(
            "Macros set: P:{protein:.0}g F:{fat:.0}g C:{carbs:.0}g = {} kcal",
            goals.calories
        );
    }
    Ok(())
}

pub(crate) fn cmd_goals_recalculate(svc: &StrideService, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let goals = svc.recalculate_goals(user.id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else {
        println!("Recalculated from latest weight\n");
        print_goals(&goals);
    }
    Ok(())
}

pub(crate) fn cmd_energy(svc: &StrideService, date: Option<String>, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    let date = parse_date(date)?;
    let report = svc.energy_report(user.id, date)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("=== Energy for {date} ===\n");
        println!("  Age:      {}", report.age);
        println!("  Weight:   {:.1} kg", report.weight_kg);
        println!("  BMR:      {:.0} kcal", report.bmr);
        println!(
            "  TDEE:     {:.0} kcal ({} x{})",
            report.tdee,
            report.activity_level.as_str(),
            report.activity_level.multiplier()
        );
        println!("  Goal:     {} kcal", report.goal_calories);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch() {
        assert!(parse_switch("on").unwrap());
        assert!(parse_switch("YES").unwrap());
        assert!(!parse_switch("off").unwrap());
        assert!(parse_switch("maybe").is_err());
    }
}
