use anyhow::{Result, bail};
use std::process;

use stride_core::error::StrideError;
use stride_core::models::{ActivityLevel, Gender, GoalType, NewRegistration};
use stride_core::service::StrideService;

use super::helpers::{parse_date, report_missing, session_user, to_kg, value_or_prompt};

/// Sign-up values as given on the command line.
pub(crate) struct RegisterArgs {
    pub username: String,
    pub password: Option<String>,
    pub name: String,
    pub gender: String,
    pub height_cm: f64,
    pub birth_date: String,
    pub weight: f64,
    pub unit: String,
    pub goal: String,
    pub target_weight: Option<f64>,
    pub activity: String,
}

pub(crate) fn cmd_register(svc: &StrideService, args: RegisterArgs, json: bool) -> Result<()> {
    let password = value_or_prompt(args.password, "Password")?;
    let weight_kg = to_kg(args.weight, &args.unit)?;
    let target_weight_kg = args
        .target_weight
        .map(|w| to_kg(w, &args.unit))
        .transpose()?;

    let reg = NewRegistration {
        username: args.username,
        password,
        name: args.name,
        gender: Gender::parse(&args.gender)?,
        height_cm: args.height_cm,
        birth_date: parse_date(Some(args.birth_date))?,
        weight_kg,
        goal_type: GoalType::parse(&args.goal)?,
        target_weight_kg,
        activity_level: ActivityLevel::parse(&args.activity)?,
    };

    let user = match svc.register(&reg) {
        Ok(user) => user,
        Err(e) if matches!(e.downcast_ref::<StrideError>(), Some(StrideError::UsernameTaken(_))) => {
            report_missing(&e.to_string(), json);
            process::exit(2);
        }
        Err(e) => return Err(e),
    };
    // A fresh account starts its own session
    svc.login(&user.username, &reg.password)?;
    let goals = svc.get_goals(user.id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "user": user, "goals": goals })
        );
    } else {
        let username = &user.username;
        println!("Registered {username} (id: {})", user.id);
        println!(
            "  Daily goal: {} kcal | P:{:.0}g F:{:.0}g C:{:.0}g",
            goals.calories, goals.protein_g, goals.fat_g, goals.carbs_g
        );
        println!(
            "  Water: {} ml | Steps: {}",
            goals.target_water_ml, goals.target_steps
        );
    }

    Ok(())
}

pub(crate) fn cmd_login(
    svc: &StrideService,
    username: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = value_or_prompt(password, "Password")?;
    match svc.login(username, &password) {
        Ok(user) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                println!("Logged in as {}", user.username);
            }
            Ok(())
        }
        Err(e) if matches!(e.downcast_ref::<StrideError>(), Some(StrideError::InvalidCredentials)) => {
            report_missing(&e.to_string(), json);
            process::exit(2);
        }
        Err(e) => Err(e),
    }
}

pub(crate) fn cmd_logout(svc: &StrideService, json: bool) -> Result<()> {
    let was_logged_in = svc.logout()?;
    if json {
        println!("{}", serde_json::json!({ "logged_out": was_logged_in }));
    } else if was_logged_in {
        println!("Logged out");
    } else {
        eprintln!("Not logged in");
    }
    Ok(())
}

pub(crate) fn cmd_whoami(svc: &StrideService, json: bool) -> Result<()> {
    let Some(user) = svc.current_user()? else {
        report_missing("Not logged in", json);
        process::exit(2);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        println!("{} (id: {}, since {})", user.username, user.id, user.created_at);
    }
    Ok(())
}

pub(crate) fn cmd_account_delete(svc: &StrideService, confirm: bool, json: bool) -> Result<()> {
    let user = session_user(svc)?;
    if !confirm {
        bail!(
            "This deletes '{}' and all of their data. Re-run with --yes to confirm",
            user.username
        );
    }
    svc.delete_user(user.id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": user.id }));
    } else {
        println!("Deleted account {}", user.username);
    }
    Ok(())
}
