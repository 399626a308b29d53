mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::commands::{
    GoalArgs, ProfileArgs, RegisterArgs, cmd_account_delete, cmd_delete, cmd_energy, cmd_export,
    cmd_food_add, cmd_food_delete, cmd_food_list, cmd_food_update, cmd_goals_macros,
    cmd_goals_recalculate, cmd_goals_set, cmd_goals_show, cmd_history, cmd_import_health,
    cmd_job_nightly, cmd_job_status, cmd_log, cmd_login, cmd_logout, cmd_profile_set,
    cmd_profile_show, cmd_register, cmd_search, cmd_steps_add, cmd_steps_show, cmd_summary,
    cmd_update, cmd_water_add, cmd_water_show, cmd_weight_averages, cmd_weight_delete,
    cmd_weight_history, cmd_weight_log, cmd_weight_week, cmd_whoami,
};
use crate::config::Config;
use stride_core::service::StrideService;

#[derive(Parser)]
#[command(
    name = "stride",
    version,
    about = "Track food, water, steps and weight against your goals"
)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and compute starting goals
    Register {
        /// Login name (3-32 letters, digits, '_' or '-')
        username: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Display name
        #[arg(long)]
        name: String,
        /// Gender: male or female
        #[arg(long)]
        gender: String,
        /// Height in centimeters
        #[arg(long)]
        height: f64,
        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: String,
        /// Current weight
        #[arg(long)]
        weight: f64,
        /// Unit for weights: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Goal: lose, maintain, gain
        #[arg(long, default_value = "maintain")]
        goal: String,
        /// Target weight (defaults to current weight)
        #[arg(long)]
        target_weight: Option<f64>,
        /// Activity level: sedentary, light, moderate, active, very-active
        #[arg(long, default_value = "sedentary")]
        activity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log in and remember the session
    Login {
        username: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget the current session
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the logged-in user
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the logged-in account
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Show or edit the body profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Show or edit nutrition, water and step goals
    Goals {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Show BMR and TDEE for a day
    Energy {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food entry by searching the catalog
    Log {
        /// Food name to search for
        food: String,
        /// Amount in grams (e.g. "150" or "150g")
        grams: String,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Log directly by food ID (skip search)
        #[arg(long)]
        food_id: Option<i64>,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Time of day (HH:MM)
        #[arg(long)]
        time: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search the food catalog
    Search {
        /// Search query
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the food diary for a day (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show stored nightly summaries
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a diary entry by ID
    Delete {
        /// Entry ID to delete
        entry_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a diary entry (grams, meal type, or time)
    Update {
        /// Entry ID to update
        entry_id: i64,
        /// New amount in grams
        #[arg(short, long)]
        grams: Option<String>,
        /// New meal type: breakfast, lunch, dinner, snack
        #[arg(long)]
        meal: Option<String>,
        /// New date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
        /// New time of day (HH:MM)
        #[arg(long)]
        time: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the food catalog
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Track water intake
    Water {
        #[command(subcommand)]
        command: WaterCommands,
    },
    /// Track steps
    Steps {
        #[command(subcommand)]
        command: StepsCommands,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Run or inspect background jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Import data from external sources
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Export the logged-in user's data as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Delete the logged-in account and all of its data
    Delete {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change profile fields
    Set {
        #[arg(long)]
        name: Option<String>,
        /// male or female
        #[arg(long)]
        gender: Option<String>,
        /// Height in centimeters
        #[arg(long)]
        height: Option<f64>,
        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<String>,
        /// sedentary, light, moderate, active, very-active
        #[arg(long)]
        activity: Option<String>,
        /// Read steps from the health service: on or off
        #[arg(long)]
        health_sync: Option<String>,
        /// Mirror manual steps to the health service: on or off
        #[arg(long)]
        health_write: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Show current goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change goal type, target weight, water or steps
    Set {
        /// lose, maintain, gain (recomputes macros)
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        target_weight: Option<f64>,
        /// Unit for --target-weight: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Daily water target in ml
        #[arg(long)]
        water: Option<i64>,
        /// Daily step target
        #[arg(long)]
        steps: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set custom daily macros in grams
    Macros {
        #[arg(long)]
        protein: f64,
        #[arg(long)]
        fat: f64,
        #[arg(long)]
        carbs: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompute macros and water from the latest weight
    Recalculate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food to the catalog
    Add {
        /// Food name
        name: String,
        /// Protein per 100g
        #[arg(long)]
        protein: f64,
        /// Fat per 100g
        #[arg(long)]
        fat: f64,
        /// Carbs per 100g
        #[arg(long)]
        carbs: f64,
        /// Category
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List/search the catalog
    List {
        /// Search query to filter foods
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a food's macros per 100g
    Update {
        id: i64,
        #[arg(long)]
        protein: Option<f64>,
        #[arg(long)]
        fat: Option<f64>,
        #[arg(long)]
        carbs: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food and its diary entries
    Delete {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WaterCommands {
    /// Add (or with a negative amount, remove) water in ml
    Add {
        #[arg(allow_hyphen_values = true)]
        amount: i64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the day's water total
    Show {
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum StepsCommands {
    /// Add (or with a negative count, remove) steps
    Add {
        #[arg(allow_hyphen_values = true)]
        steps: i64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the day's steps, distance and active calories
    Show {
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry
    Log {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: now)
        #[arg(long)]
        date: Option<String>,
        /// Time of day (HH:MM)
        #[arg(long)]
        time: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history, newest first
    History {
        /// Number of entries to show (default: all)
        #[arg(short, long)]
        limit: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the seven days ending on a date
    Week {
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weekly average weight
    Averages {
        /// Number of weeks
        #[arg(short, long, default_value = "4")]
        weeks: u32,
        /// Last day of the newest week (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a weight entry by ID
    Delete {
        /// Weight entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Write the daily summary snapshot for every user
    Nightly {
        /// Day to summarize (default: yesterday)
        #[arg(long)]
        date: Option<String>,
        /// Attempts before giving up (default: from config)
        #[arg(long)]
        attempts: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show when the nightly job last ran
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Import daily steps and weights from a health-service CSV export
    Health {
        /// Path to the CSV file (Date, Steps, Weight (kg))
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    // stdout carries --json output, so logs go to stderr
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    debug!(db = %config.db_path.display(), "opening database");
    let db_path = config
        .db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    let svc = StrideService::new(db_path)?;

    match cli.command {
        Commands::Register {
            username,
            password,
            name,
            gender,
            height,
            birth_date,
            weight,
            unit,
            goal,
            target_weight,
            activity,
            json,
        } => cmd_register(
            &svc,
            RegisterArgs {
                username,
                password,
                name,
                gender,
                height_cm: height,
                birth_date,
                weight,
                unit,
                goal,
                target_weight,
                activity,
            },
            json,
        ),
        Commands::Login {
            username,
            password,
            json,
        } => cmd_login(&svc, &username, password, json),
        Commands::Logout { json } => cmd_logout(&svc, json),
        Commands::Whoami { json } => cmd_whoami(&svc, json),
        Commands::Account { command } => match command {
            AccountCommands::Delete { yes, json } => cmd_account_delete(&svc, yes, json),
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&svc, json),
            ProfileCommands::Set {
                name,
                gender,
                height,
                birth_date,
                activity,
                health_sync,
                health_write,
                json,
            } => cmd_profile_set(
                &svc,
                ProfileArgs {
                    name,
                    gender,
                    height_cm: height,
                    birth_date,
                    activity,
                    health_sync,
                    health_write,
                },
                json,
            ),
        },
        Commands::Goals { command } => match command {
            GoalCommands::Show { json } => cmd_goals_show(&svc, json),
            GoalCommands::Set {
                goal,
                target_weight,
                unit,
                water,
                steps,
                json,
            } => cmd_goals_set(
                &svc,
                GoalArgs {
                    goal,
                    target_weight,
                    unit,
                    water_ml: water,
                    steps,
                },
                json,
            ),
            GoalCommands::Macros {
                protein,
                fat,
                carbs,
                json,
            } => cmd_goals_macros(&svc, protein, fat, carbs, json),
            GoalCommands::Recalculate { json } => cmd_goals_recalculate(&svc, json),
        },
        Commands::Energy { date, json } => cmd_energy(&svc, date, json),
        Commands::Log {
            food,
            grams,
            meal,
            food_id,
            date,
            time,
            json,
        } => cmd_log(
            &svc,
            &food,
            &grams,
            &meal,
            food_id,
            date,
            time.as_deref(),
            json,
        ),
        Commands::Search { query, json } => cmd_search(&svc, &query, json),
        Commands::Summary { date, json } => cmd_summary(&svc, date, json),
        Commands::History { days, json } => cmd_history(&svc, days, json),
        Commands::Delete { entry_id, json } => cmd_delete(&svc, entry_id, json),
        Commands::Update {
            entry_id,
            grams,
            meal,
            date,
            time,
            json,
        } => cmd_update(
            &svc,
            entry_id,
            grams.as_deref(),
            meal,
            date,
            time.as_deref(),
            json,
        ),
        Commands::Food { command } => match command {
            FoodCommands::Add {
                name,
                protein,
                fat,
                carbs,
                category,
                json,
            } => cmd_food_add(&svc, &name, protein, fat, carbs, category, json),
            FoodCommands::List { search, json } => cmd_food_list(&svc, search.as_deref(), json),
            FoodCommands::Update {
                id,
                protein,
                fat,
                carbs,
                json,
            } => cmd_food_update(&svc, id, protein, fat, carbs, json),
            FoodCommands::Delete { id, json } => cmd_food_delete(&svc, id, json),
        },
        Commands::Water { command } => match command {
            WaterCommands::Add { amount, date, json } => cmd_water_add(&svc, amount, date, json),
            WaterCommands::Show { date, json } => cmd_water_show(&svc, date, json),
        },
        Commands::Steps { command } => match command {
            StepsCommands::Add { steps, date, json } => cmd_steps_add(&svc, steps, date, json),
            StepsCommands::Show { date, json } => cmd_steps_show(&svc, date, json),
        },
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                unit,
                date,
                time,
                json,
            } => cmd_weight_log(&svc, value, &unit, date, time.as_deref(), json),
            WeightCommands::History { limit, json } => cmd_weight_history(&svc, limit, json),
            WeightCommands::Week { date, json } => cmd_weight_week(&svc, date, json),
            WeightCommands::Averages { weeks, date, json } => {
                cmd_weight_averages(&svc, weeks, date, json)
            }
            WeightCommands::Delete { id, json } => cmd_weight_delete(&svc, id, json),
        },
        Commands::Job { command } => match command {
            JobCommands::Nightly {
                date,
                attempts,
                json,
            } => cmd_job_nightly(&svc, &config, date, attempts, json),
            JobCommands::Status { json } => cmd_job_status(&svc, &config, json),
        },
        Commands::Import { command } => match command {
            ImportCommands::Health {
                file,
                dry_run,
                json,
            } => cmd_import_health(&svc, &file, dry_run, json),
        },
        Commands::Export { output } => cmd_export(&svc, output.as_deref()),
    }
}
