use anyhow::{Result, bail};
use std::process;

use stride_core::models::{Food, NewFood};
use stride_core::service::StrideService;

use super::helpers::{print_food_table, report_missing};

pub(crate) fn cmd_search(svc: &StrideService, query: &str, json: bool) -> Result<()> {
    let foods = svc.search_foods(query)?;

    if foods.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No results found for '{query}'");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else {
        let refs: Vec<&Food> = foods.iter().collect();
        print_food_table(&refs);
    }

    Ok(())
}

pub(crate) fn cmd_food_add(
    svc: &StrideService,
    name: &str,
    protein: f64,
    fat: f64,
    carbs: f64,
    category: Option<String>,
    json: bool,
) -> Result<()> {
    let food = svc.add_food(&NewFood {
        name: name.to_string(),
        category,
        protein_per_100g: protein,
        fat_per_100g: fat,
        carbs_per_100g: carbs,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        let name = &food.name;
        let id = food.id;
        let cal = food.calories_per_100g;
        println!("Added food: {name} (id: {id}, {cal} kcal/100g)");
    }

    Ok(())
}

pub(crate) fn cmd_food_list(svc: &StrideService, search: Option<&str>, json: bool) -> Result<()> {
    let foods = svc.list_foods(search)?;

    if foods.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No foods found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else {
        let refs: Vec<&Food> = foods.iter().collect();
        print_food_table(&refs);
    }

    Ok(())
}

pub(crate) fn cmd_food_update(
    svc: &StrideService,
    id: i64,
    protein: Option<f64>,
    fat: Option<f64>,
    carbs: Option<f64>,
    json: bool,
) -> Result<()> {
    if protein.is_none() && fat.is_none() && carbs.is_none() {
        bail!("Nothing to update. Provide at least one of --protein, --fat, or --carbs");
    }
    let Ok(existing) = svc.get_food(id) else {
        report_missing(&format!("Food {id} not found"), json);
        process::exit(2);
    };

    let food = svc.update_food_nutrients(
        id,
        protein.unwrap_or(existing.protein_per_100g),
        fat.unwrap_or(existing.fat_per_100g),
        carbs.unwrap_or(existing.carbs_per_100g),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        println!(
            "Updated {}: {} kcal/100g | P:{:.1}g F:{:.1}g C:{:.1}g",
            food.name,
            food.calories_per_100g,
            food.protein_per_100g,
            food.fat_per_100g,
            food.carbs_per_100g
        );
    }

    Ok(())
}

pub(crate) fn cmd_food_delete(svc: &StrideService, id: i64, json: bool) -> Result<()> {
    if svc.delete_food(id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted food {id} and its diary entries");
        }
        Ok(())
    } else {
        report_missing(&format!("Food {id} not found"), json);
        process::exit(2);
    }
}
