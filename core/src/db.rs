use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params, types::Type};
use uuid::Uuid;

use crate::calculator::{MacroTargets, calories_from_macros};
use crate::day::{DATE_FORMAT, date_key, from_millis};
use crate::error::StrideError;
use crate::models::{
    ActivityLevel, ConsumedFood, DailySummary, ExportDayCount, Food, Gender, Goals, GoalType,
    NewConsumedFood, NewDailySummary, NewFood, NewGoals, NewRegistration, NewWeightLog, Profile,
    UpdateConsumedFood, UpdateGoals, UpdateProfile, User, WeightLog,
};

pub struct Database {
    conn: Connection,
}

const FOOD_COLUMNS: &str = "f.id, f.uuid, f.name, f.category,
        n.protein_per_100g, n.fat_per_100g, n.carbs_per_100g, n.calories_per_100g, f.created_at
     FROM foods f
     JOIN food_nutrients n ON n.food_id = f.id";

const CONSUMED_COLUMNS: &str = "cf.id, cf.user_id, cf.food_id, cf.grams, cf.meal_type, cf.consumed_at,
        f.name, n.protein_per_100g, n.fat_per_100g, n.carbs_per_100g, n.calories_per_100g
     FROM consumed_foods cf
     JOIN foods f ON f.id = cf.food_id
     JOIN food_nutrients n ON n.food_id = cf.food_id";

const PROFILE_COLUMNS: &str = "user_id, name, gender, height_cm, birth_date, activity_level,
        health_sync_enabled, health_write_enabled, updated_at
     FROM profiles";

const GOALS_COLUMNS: &str = "user_id, goal_type, target_weight_kg, target_water_ml, target_steps,
        protein_g, fat_g, carbs_g, calories, updated_at
     FROM goals";

/// The two per-day counter tables share one shape: `(date, user_id) -> value`.
#[derive(Debug, Clone, Copy)]
enum DailyCounter {
    Steps,
    Water,
}

impl DailyCounter {
    fn table(self) -> &'static str {
        match self {
            DailyCounter::Steps => "daily_steps",
            DailyCounter::Water => "daily_water",
        }
    }

    fn column(self) -> &'static str {
        match self {
            DailyCounter::Steps => "steps",
            DailyCounter::Water => "amount_ml",
        }
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    fn configure(&self) -> Result<()> {
        // Cascade deletes depend on this; SQLite leaves it off per connection.
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS profiles (
                    user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    gender TEXT NOT NULL CHECK (gender IN ('male', 'female')),
                    height_cm REAL NOT NULL,
                    birth_date TEXT NOT NULL,
                    activity_level TEXT NOT NULL DEFAULT 'sedentary',
                    health_sync_enabled INTEGER NOT NULL DEFAULT 0,
                    health_write_enabled INTEGER NOT NULL DEFAULT 0,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS goals (
                    user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                    goal_type TEXT NOT NULL CHECK (goal_type IN ('lose', 'maintain', 'gain')),
                    target_weight_kg REAL NOT NULL,
                    target_water_ml INTEGER NOT NULL,
                    target_steps INTEGER NOT NULL,
                    protein_g REAL NOT NULL,
                    fat_g REAL NOT NULL,
                    carbs_g REAL NOT NULL,
                    calories INTEGER NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS weight_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    weight_kg REAL NOT NULL,
                    logged_at INTEGER NOT NULL,
                    source TEXT NOT NULL DEFAULT 'manual',
                    UNIQUE (user_id, logged_at)
                );

                CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    category TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_nutrients (
                    food_id INTEGER PRIMARY KEY REFERENCES foods(id) ON DELETE CASCADE,
                    protein_per_100g REAL NOT NULL,
                    fat_per_100g REAL NOT NULL,
                    carbs_per_100g REAL NOT NULL,
                    calories_per_100g INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS consumed_foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    food_id INTEGER NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
                    grams REAL NOT NULL CHECK (grams > 0),
                    meal_type TEXT NOT NULL,
                    consumed_at INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_steps (
                    date TEXT NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    steps INTEGER NOT NULL CHECK (steps >= 0),
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (date, user_id)
                );

                CREATE TABLE IF NOT EXISTS daily_water (
                    date TEXT NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    amount_ml INTEGER NOT NULL CHECK (amount_ml >= 0),
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (date, user_id)
                );

                CREATE TABLE IF NOT EXISTS daily_summaries (
                    date TEXT NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    weight_kg REAL,
                    calories REAL NOT NULL,
                    steps INTEGER NOT NULL,
                    water_ml INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (date, user_id)
                );

                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_consumed_user_time ON consumed_foods(user_id, consumed_at);
                CREATE INDEX IF NOT EXISTS idx_consumed_food ON consumed_foods(food_id);
                CREATE INDEX IF NOT EXISTS idx_weight_user_time ON weight_logs(user_id, logged_at);
                CREATE INDEX IF NOT EXISTS idx_foods_name ON foods(name);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn parse_text<T>(
        row: &rusqlite::Row,
        idx: usize,
        parse: fn(&str) -> Result<T>,
    ) -> rusqlite::Result<T> {
        let raw: String = row.get(idx)?;
        parse(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
    }

    fn parse_date(s: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("Invalid date '{s}'"))
    }

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            uuid: row.get(1)?,
            username: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            user_id: row.get(0)?,
            name: row.get(1)?,
            gender: Self::parse_text(row, 2, Gender::parse)?,
            height_cm: row.get(3)?,
            birth_date: Self::parse_text(row, 4, Self::parse_date)?,
            activity_level: Self::parse_text(row, 5, ActivityLevel::parse)?,
            health_sync_enabled: row.get(6)?,
            health_write_enabled: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn goals_from_row(row: &rusqlite::Row) -> rusqlite::Result<Goals> {
        Ok(Goals {
            user_id: row.get(0)?,
            goal_type: Self::parse_text(row, 1, GoalType::parse)?,
            target_weight_kg: row.get(2)?,
            target_water_ml: row.get(3)?,
            target_steps: row.get(4)?,
            protein_g: row.get(5)?,
            fat_g: row.get(6)?,
            carbs_g: row.get(7)?,
            calories: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn weight_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightLog> {
        Ok(WeightLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            weight_kg: row.get(2)?,
            logged_at: from_millis(row.get(3)?),
            source: row.get(4)?,
        })
    }

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<Food> {
        Ok(Food {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            category: row.get(3)?,
            protein_per_100g: row.get(4)?,
            fat_per_100g: row.get(5)?,
            carbs_per_100g: row.get(6)?,
            calories_per_100g: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    // Expects CONSUMED_COLUMNS order.
    #[allow(clippy::cast_precision_loss)]
    fn consumed_from_row(row: &rusqlite::Row) -> rusqlite::Result<ConsumedFood> {
        let grams: f64 = row.get(3)?;
        let scale = grams / 100.0;
        let protein_100: f64 = row.get(7)?;
        let fat_100: f64 = row.get(8)?;
        let carbs_100: f64 = row.get(9)?;
        let calories_100: i64 = row.get(10)?;
        Ok(ConsumedFood {
            id: row.get(0)?,
            user_id: row.get(1)?,
            food_id: row.get(2)?,
            grams,
            meal_type: row.get(4)?,
            consumed_at: from_millis(row.get(5)?),
            food_name: row.get(6)?,
            calories: calories_100 as f64 * scale,
            protein: protein_100 * scale,
            fat: fat_100 * scale,
            carbs: carbs_100 * scale,
        })
    }

    fn summary_from_row(row: &rusqlite::Row) -> rusqlite::Result<DailySummary> {
        Ok(DailySummary {
            date: Self::parse_text(row, 0, Self::parse_date)?,
            user_id: row.get(1)?,
            weight_kg: row.get(2)?,
            calories: row.get(3)?,
            steps: row.get(4)?,
            water_ml: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    /// Run `f` inside one transaction; an error rolls back everything it
    /// wrote through this `Database`.
    pub fn in_transaction<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f()?;
        tx.commit()?;
        Ok(value)
    }

    // --- Users ---

    /// Insert user, profile, goals and the initial weight as one unit.
    pub fn register_user(
        &self,
        reg: &NewRegistration,
        password_hash: &str,
        goals: &NewGoals,
    ) -> Result<User> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO users (uuid, username, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![uuid, reg.username.trim(), password_hash, now],
        )?;
        let user_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO profiles (user_id, name, gender, height_cm, birth_date, activity_level,
                                   health_sync_enabled, health_write_enabled, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7)",
            params![
                user_id,
                reg.name.trim(),
                reg.gender.as_str(),
                reg.height_cm,
                date_key(reg.birth_date),
                reg.activity_level.as_str(),
                now,
            ],
        )?;

        tx.execute(
            "INSERT INTO goals (user_id, goal_type, target_weight_kg, target_water_ml, target_steps,
                                protein_g, fat_g, carbs_g, calories, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user_id,
                goals.goal_type.as_str(),
                goals.target_weight_kg,
                goals.target_water_ml,
                goals.target_steps,
                goals.protein_g,
                goals.fat_g,
                goals.carbs_g,
                goals.calories,
                now,
            ],
        )?;

        tx.execute(
            "INSERT INTO weight_logs (user_id, weight_kg, logged_at, source)
             VALUES (?1, ?2, ?3, 'registration')",
            params![user_id, reg.weight_kg, Utc::now().timestamp_millis()],
        )?;

        tx.commit()?;
        self.get_user(user_id)
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        let user = self
            .conn
            .query_row(
                "SELECT id, uuid, username, created_at FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()?;
        user.ok_or_else(|| StrideError::UserNotFound(id).into())
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, uuid, username, created_at FROM users WHERE username = ?1",
                params![username.trim()],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// The user and their stored password hash.
    pub fn get_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        let found = self
            .conn
            .query_row(
                "SELECT id, uuid, username, created_at, password_hash
                 FROM users WHERE username = ?1",
                params![username.trim()],
                |row| Ok((Self::user_from_row(row)?, row.get(4)?)),
            )
            .optional()?;
        Ok(found)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, uuid, username, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Profile ---

    pub fn get_profile(&self, user_id: i64) -> Result<Profile> {
        let profile = self
            .conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} WHERE user_id = ?1"),
                params![user_id],
                Self::profile_from_row,
            )
            .optional()?;
        profile.ok_or_else(|| StrideError::UserNotFound(user_id).into())
    }

    pub fn update_profile(&self, user_id: i64, update: &UpdateProfile) -> Result<Profile> {
        // Verify existence
        self.get_profile(user_id)?;

        let now = Local::now().to_rfc3339();
        if let Some(ref name) = update.name {
            self.conn.execute(
                "UPDATE profiles SET name = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![name.trim(), now, user_id],
            )?;
        }
        if let Some(gender) = update.gender {
            self.conn.execute(
                "UPDATE profiles SET gender = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![gender.as_str(), now, user_id],
            )?;
        }
        if let Some(height_cm) = update.height_cm {
            self.conn.execute(
                "UPDATE profiles SET height_cm = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![height_cm, now, user_id],
            )?;
        }
        if let Some(birth_date) = update.birth_date {
            self.conn.execute(
                "UPDATE profiles SET birth_date = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![date_key(birth_date), now, user_id],
            )?;
        }
        if let Some(level) = update.activity_level {
            self.conn.execute(
                "UPDATE profiles SET activity_level = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![level.as_str(), now, user_id],
            )?;
        }
        if let Some(enabled) = update.health_sync_enabled {
            self.conn.execute(
                "UPDATE profiles SET health_sync_enabled = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![enabled, now, user_id],
            )?;
        }
        if let Some(enabled) = update.health_write_enabled {
            self.conn.execute(
                "UPDATE profiles SET health_write_enabled = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![enabled, now, user_id],
            )?;
        }

        self.get_profile(user_id)
    }

    // --- Goals ---

    pub fn get_goals(&self, user_id: i64) -> Result<Goals> {
        let goals = self
            .conn
            .query_row(
                &format!("SELECT {GOALS_COLUMNS} WHERE user_id = ?1"),
                params![user_id],
                Self::goals_from_row,
            )
            .optional()?;
        goals.ok_or_else(|| StrideError::UserNotFound(user_id).into())
    }

    /// Apply the changed goal fields, and new macro targets when given, as
    /// one write.
    pub fn update_goals(
        &self,
        user_id: i64,
        update: &UpdateGoals,
        macros: Option<&MacroTargets>,
    ) -> Result<Goals> {
        self.get_goals(user_id)?;

        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        if let Some(goal_type) = update.goal_type {
            tx.execute(
                "UPDATE goals SET goal_type = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![goal_type.as_str(), now, user_id],
            )?;
        }
        if let Some(kg) = update.target_weight_kg {
            tx.execute(
                "UPDATE goals SET target_weight_kg = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![kg, now, user_id],
            )?;
        }
        if let Some(ml) = update.target_water_ml {
            tx.execute(
                "UPDATE goals SET target_water_ml = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![ml, now, user_id],
            )?;
        }
        if let Some(steps) = update.target_steps {
            tx.execute(
                "UPDATE goals SET target_steps = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![steps, now, user_id],
            )?;
        }
        if let Some(m) = macros {
            tx.execute(
                "UPDATE goals SET protein_g = ?1, fat_g = ?2, carbs_g = ?3, calories = ?4,
                                  updated_at = ?5
                 WHERE user_id = ?6",
                params![m.protein_g, m.fat_g, m.carbs_g, m.calories, now, user_id],
            )?;
        }
        tx.commit()?;

        self.get_goals(user_id)
    }

    /// Store macro targets; calories are always recomputed from them.
    pub fn set_goal_macros(
        &self,
        user_id: i64,
        protein_g: f64,
        fat_g: f64,
        carbs_g: f64,
    ) -> Result<Goals> {
        let now = Local::now().to_rfc3339();
        let calories = calories_from_macros(protein_g, fat_g, carbs_g);
        let rows = self.conn.execute(
            "UPDATE goals SET protein_g = ?1, fat_g = ?2, carbs_g = ?3, calories = ?4, updated_at = ?5
             WHERE user_id = ?6",
            params![protein_g, fat_g, carbs_g, calories, now, user_id],
        )?;
        if rows == 0 {
            return Err(StrideError::UserNotFound(user_id).into());
        }
        self.get_goals(user_id)
    }

    // --- Weight logs ---

    /// Re-logging the same instant replaces the previous value.
    pub fn insert_weight(&self, entry: &NewWeightLog) -> Result<WeightLog> {
        let logged_at = entry.logged_at.timestamp_millis();
        self.conn.execute(
            "INSERT INTO weight_logs (user_id, weight_kg, logged_at, source)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, logged_at) DO UPDATE SET
                weight_kg = excluded.weight_kg,
                source = excluded.source",
            params![entry.user_id, entry.weight_kg, logged_at, entry.source],
        )?;
        self.conn
            .query_row(
                "SELECT id, user_id, weight_kg, logged_at, source
                 FROM weight_logs WHERE user_id = ?1 AND logged_at = ?2",
                params![entry.user_id, logged_at],
                Self::weight_log_from_row,
            )
            .context("Weight log not found after insert")
    }

    pub fn get_weight_log(&self, id: i64) -> Result<Option<WeightLog>> {
        let log = self
            .conn
            .query_row(
                "SELECT id, user_id, weight_kg, logged_at, source FROM weight_logs WHERE id = ?1",
                params![id],
                Self::weight_log_from_row,
            )
            .optional()?;
        Ok(log)
    }

    pub fn delete_weight_log(&self, user_id: i64, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM weight_logs WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Newest first.
    pub fn weight_history(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<WeightLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, weight_kg, logged_at, source
             FROM weight_logs WHERE user_id = ?1
             ORDER BY logged_at DESC, id DESC
             LIMIT ?2",
        )?;
        // SQLite treats a negative LIMIT as unbounded
        let logs = stmt
            .query_map(params![user_id, limit.unwrap_or(-1)], Self::weight_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Latest weight logged strictly before `before_ms`.
    pub fn latest_weight_before(&self, user_id: i64, before_ms: i64) -> Result<Option<WeightLog>> {
        let log = self
            .conn
            .query_row(
                "SELECT id, user_id, weight_kg, logged_at, source
                 FROM weight_logs
                 WHERE user_id = ?1 AND logged_at < ?2
                 ORDER BY logged_at DESC, id DESC
                 LIMIT 1",
                params![user_id, before_ms],
                Self::weight_log_from_row,
            )
            .optional()?;
        Ok(log)
    }

    /// Oldest first, `[start_ms, end_ms)`.
    pub fn weights_between(&self, user_id: i64, start_ms: i64, end_ms: i64) -> Result<Vec<WeightLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, weight_kg, logged_at, source
             FROM weight_logs
             WHERE user_id = ?1 AND logged_at >= ?2 AND logged_at < ?3
             ORDER BY logged_at, id",
        )?;
        let logs = stmt
            .query_map(params![user_id, start_ms, end_ms], Self::weight_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    // --- Foods ---

    pub fn insert_food(&self, food: &NewFood) -> Result<Food> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let calories = calories_from_macros(
            food.protein_per_100g,
            food.fat_per_100g,
            food.carbs_per_100g,
        );
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO foods (uuid, name, category, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![uuid, food.name.trim(), food.category, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO food_nutrients (food_id, protein_per_100g, fat_per_100g, carbs_per_100g, calories_per_100g)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                food.protein_per_100g,
                food.fat_per_100g,
                food.carbs_per_100g,
                calories,
            ],
        )?;
        tx.commit()?;
        self.get_food(id)
    }

    pub fn get_food(&self, id: i64) -> Result<Food> {
        let food = self
            .conn
            .query_row(
                &format!("SELECT {FOOD_COLUMNS} WHERE f.id = ?1"),
                params![id],
                Self::food_from_row,
            )
            .optional()?;
        food.ok_or_else(|| StrideError::FoodNotFound(id).into())
    }

    pub fn search_foods(&self, query: &str) -> Result<Vec<Food>> {
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS}
             WHERE f.name LIKE ?1 ESCAPE '\\' OR f.category LIKE ?1 ESCAPE '\\'
             ORDER BY f.name LIMIT 20"
        ))?;
        let foods = stmt
            .query_map(params![pattern], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn list_foods(&self, search: Option<&str>) -> Result<Vec<Food>> {
        if let Some(query) = search {
            return self.search_foods(query);
        }
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {FOOD_COLUMNS} ORDER BY f.name LIMIT 100"))?;
        let foods = stmt
            .query_map([], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn find_food_by_name(&self, name: &str) -> Result<Option<Food>> {
        let food = self
            .conn
            .query_row(
                &format!("SELECT {FOOD_COLUMNS} WHERE f.name = ?1 COLLATE NOCASE ORDER BY f.id LIMIT 1"),
                params![name.trim()],
                Self::food_from_row,
            )
            .optional()?;
        Ok(food)
    }

    pub fn update_food_nutrients(
        &self,
        id: i64,
        protein_per_100g: f64,
        fat_per_100g: f64,
        carbs_per_100g: f64,
    ) -> Result<Food> {
        let calories = calories_from_macros(protein_per_100g, fat_per_100g, carbs_per_100g);
        let rows = self.conn.execute(
            "UPDATE food_nutrients
             SET protein_per_100g = ?1, fat_per_100g = ?2, carbs_per_100g = ?3, calories_per_100g = ?4
             WHERE food_id = ?5",
            params![protein_per_100g, fat_per_100g, carbs_per_100g, calories, id],
        )?;
        if rows == 0 {
            return Err(StrideError::FoodNotFound(id).into());
        }
        self.get_food(id)
    }

    pub fn delete_food(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM foods WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Consumed foods ---

    pub fn insert_consumed(&self, entry: &NewConsumedFood) -> Result<ConsumedFood> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO consumed_foods (user_id, food_id, grams, meal_type, consumed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.user_id,
                entry.food_id,
                entry.grams,
                entry.meal_type,
                entry.consumed_at.timestamp_millis(),
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_consumed(id)
    }

    pub fn get_consumed(&self, id: i64) -> Result<ConsumedFood> {
        self.conn
            .query_row(
                &format!("SELECT {CONSUMED_COLUMNS} WHERE cf.id = ?1"),
                params![id],
                Self::consumed_from_row,
            )
            .context("Consumed food entry not found")
    }

    pub fn update_consumed(&self, id: i64, update: &UpdateConsumedFood) -> Result<ConsumedFood> {
        self.get_consumed(id)?;

        if let Some(grams) = update.grams {
            self.conn.execute(
                "UPDATE consumed_foods SET grams = ?1 WHERE id = ?2",
                params![grams, id],
            )?;
        }
        if let Some(ref meal_type) = update.meal_type {
            self.conn.execute(
                "UPDATE consumed_foods SET meal_type = ?1 WHERE id = ?2",
                params![meal_type, id],
            )?;
        }
        if let Some(at) = update.consumed_at {
            self.conn.execute(
                "UPDATE consumed_foods SET consumed_at = ?1 WHERE id = ?2",
                params![at.timestamp_millis(), id],
            )?;
        }

        self.get_consumed(id)
    }

    pub fn delete_consumed(&self, user_id: i64, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM consumed_foods WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Entries in `[start_ms, end_ms)`, in the order they were eaten.
    pub fn consumed_between(
        &self,
        user_id: i64,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<ConsumedFood>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONSUMED_COLUMNS}
             WHERE cf.user_id = ?1 AND cf.consumed_at >= ?2 AND cf.consumed_at < ?3
             ORDER BY cf.consumed_at, cf.id"
        ))?;
        let entries = stmt
            .query_map(params![user_id, start_ms, end_ms], Self::consumed_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn calories_between(&self, user_id: i64, start_ms: i64, end_ms: i64) -> Result<f64> {
        let total: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(n.calories_per_100g * cf.grams / 100.0), 0)
             FROM consumed_foods cf
             JOIN food_nutrients n ON n.food_id = cf.food_id
             WHERE cf.user_id = ?1 AND cf.consumed_at >= ?2 AND cf.consumed_at < ?3",
            params![user_id, start_ms, end_ms],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    // --- Daily counters (steps, water) ---

    fn get_daily(&self, counter: DailyCounter, user_id: i64, date: NaiveDate) -> Result<i64> {
        let value = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE date = ?1 AND user_id = ?2",
                    counter.column(),
                    counter.table()
                ),
                params![date_key(date), user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(0))
    }

    /// Apply `delta` to the day's running total, never going below zero.
    fn add_daily(
        &self,
        counter: DailyCounter,
        user_id: i64,
        date: NaiveDate,
        delta: i64,
    ) -> Result<i64> {
        let now = Local::now().to_rfc3339();
        let (table, column) = (counter.table(), counter.column());
        self.conn.execute(
            &format!(
                "INSERT INTO {table} (date, user_id, {column}, updated_at)
                 VALUES (?1, ?2, MAX(0, ?3), ?4)
                 ON CONFLICT(date, user_id) DO UPDATE SET
                    {column} = MAX(0, {table}.{column} + ?3),
                    updated_at = excluded.updated_at"
            ),
            params![date_key(date), user_id, delta, now],
        )?;
        self.get_daily(counter, user_id, date)
    }

    fn set_daily(
        &self,
        counter: DailyCounter,
        user_id: i64,
        date: NaiveDate,
        value: i64,
    ) -> Result<i64> {
        let now = Local::now().to_rfc3339();
        let (table, column) = (counter.table(), counter.column());
        self.conn.execute(
            &format!(
                "INSERT INTO {table} (date, user_id, {column}, updated_at)
                 VALUES (?1, ?2, MAX(0, ?3), ?4)
                 ON CONFLICT(date, user_id) DO UPDATE SET
                    {column} = excluded.{column},
                    updated_at = excluded.updated_at"
            ),
            params![date_key(date), user_id, value, now],
        )?;
        self.get_daily(counter, user_id, date)
    }

    fn list_daily(&self, counter: DailyCounter, user_id: i64) -> Result<Vec<ExportDayCount>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT date, {} FROM {} WHERE user_id = ?1 ORDER BY date",
            counter.column(),
            counter.table()
        ))?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(ExportDayCount {
                    date: Self::parse_text(row, 0, Self::parse_date)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_steps(&self, user_id: i64, date: NaiveDate) -> Result<i64> {
        self.get_daily(DailyCounter::Steps, user_id, date)
    }

    pub fn add_steps(&self, user_id: i64, date: NaiveDate, delta: i64) -> Result<i64> {
        self.add_daily(DailyCounter::Steps, user_id, date, delta)
    }

    pub fn set_steps(&self, user_id: i64, date: NaiveDate, steps: i64) -> Result<i64> {
        self.set_daily(DailyCounter::Steps, user_id, date, steps)
    }

    pub fn list_steps(&self, user_id: i64) -> Result<Vec<ExportDayCount>> {
        self.list_daily(DailyCounter::Steps, user_id)
    }

    pub fn get_water(&self, user_id: i64, date: NaiveDate) -> Result<i64> {
        self.get_daily(DailyCounter::Water, user_id, date)
    }

    pub fn add_water(&self, user_id: i64, date: NaiveDate, delta_ml: i64) -> Result<i64> {
        self.add_daily(DailyCounter::Water, user_id, date, delta_ml)
    }

    pub fn list_water(&self, user_id: i64) -> Result<Vec<ExportDayCount>> {
        self.list_daily(DailyCounter::Water, user_id)
    }

    // --- Daily summaries ---

    pub fn summary_exists(&self, user_id: i64, date: NaiveDate) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM daily_summaries WHERE date = ?1 AND user_id = ?2)",
            params![date_key(date), user_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Returns false when a snapshot for (user, date) already exists.
    pub fn insert_summary(&self, summary: &NewDailySummary) -> Result<bool> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO daily_summaries
                (date, user_id, weight_kg, calories, steps, water_ml, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                date_key(summary.date),
                summary.user_id,
                summary.weight_kg,
                summary.calories,
                summary.steps,
                summary.water_ml,
                now,
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn get_summary(&self, user_id: i64, date: NaiveDate) -> Result<Option<DailySummary>> {
        let summary = self
            .conn
            .query_row(
                "SELECT date, user_id, weight_kg, calories, steps, water_ml, created_at
                 FROM daily_summaries WHERE date = ?1 AND user_id = ?2",
                params![date_key(date), user_id],
                Self::summary_from_row,
            )
            .optional()?;
        Ok(summary)
    }

    /// Newest first.
    pub fn list_summaries(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<DailySummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, user_id, weight_kg, calories, steps, water_ml, created_at
             FROM daily_summaries WHERE user_id = ?1
             ORDER BY date DESC
             LIMIT ?2",
        )?;
        let summaries = stmt
            .query_map(params![user_id, limit.unwrap_or(-1)], Self::summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    // --- Settings (preference store) ---

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::day::{at, day_window};
    use crate::models::ActivityLevel;

    fn sample_registration(username: &str) -> NewRegistration {
        NewRegistration {
            username: username.to_string(),
            password: "secret123".to_string(),
            name: "Alex".to_string(),
            gender: Gender::Female,
            height_cm: 168.0,
            birth_date: NaiveDate::from_ymd_opt(1992, 4, 3).unwrap(),
            weight_kg: 64.0,
            goal_type: GoalType::Maintain,
            target_weight_kg: None,
            activity_level: ActivityLevel::Sedentary,
        }
    }

    fn sample_goals() -> NewGoals {
        NewGoals {
            goal_type: GoalType::Maintain,
            target_weight_kg: 64.0,
            target_water_ml: 2250,
            target_steps: 10_000,
            protein_g: 115.2,
            fat_g: 64.0,
            carbs_g: 192.0,
            calories: calories_from_macros(115.2, 64.0, 192.0),
        }
    }

    pub(crate) fn register(db: &Database, username: &str) -> User {
        db.register_user(
            &sample_registration(username),
            &hash_password("secret123").unwrap(),
            &sample_goals(),
        )
        .unwrap()
    }

    fn sample_food() -> NewFood {
        NewFood {
            name: "Chicken Breast".to_string(),
            category: Some("Meat".to_string()),
            protein_per_100g: 31.0,
            fat_per_100g: 3.6,
            carbs_per_100g: 0.0,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_register_creates_profile_goals_and_weight() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");

        assert_eq!(user.username, "alex");
        let profile = db.get_profile(user.id).unwrap();
        assert_eq!(profile.name, "Alex");
        assert_eq!(profile.gender, Gender::Female);
        assert!(!profile.health_sync_enabled);

        let goals = db.get_goals(user.id).unwrap();
        assert_eq!(goals.goal_type, GoalType::Maintain);
        assert_eq!(goals.calories, calories_from_macros(115.2, 64.0, 192.0));

        let weights = db.weight_history(user.id, None).unwrap();
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].source, "registration");
    }

    #[test]
    fn test_register_duplicate_username_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "alex");

        let result = db.register_user(
            &sample_registration("ALEX"),
            &hash_password("secret123").unwrap(),
            &sample_goals(),
        );
        assert!(result.is_err());
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_register_rolls_back_after_partial_insert() {
        let db = Database::open_in_memory().unwrap();
        // NaN binds as NULL, so the goals insert fails after users and profiles
        let goals = NewGoals {
            target_weight_kg: f64::NAN,
            ..sample_goals()
        };

        let result = db.register_user(
            &sample_registration("alex"),
            &hash_password("secret123").unwrap(),
            &goals,
        );
        assert!(result.is_err());
        assert!(db.list_users().unwrap().is_empty());
        assert!(db.get_user_by_username("alex").unwrap().is_none());

        // The same username is free again
        register(&db, "alex");
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_update_goals_writes_nothing_on_failure() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let before = db.get_goals(user.id).unwrap();

        let bad_macros = MacroTargets {
            protein_g: f64::NAN,
            fat_g: 80.0,
            carbs_g: 320.0,
            calories: 2640,
        };
        let result = db.update_goals(
            user.id,
            &UpdateGoals {
                goal_type: Some(GoalType::Gain),
                target_steps: Some(12_000),
                ..Default::default()
            },
            Some(&bad_macros),
        );
        assert!(result.is_err());

        let after = db.get_goals(user.id).unwrap();
        assert_eq!(after.goal_type, before.goal_type);
        assert_eq!(after.target_steps, before.target_steps);
        assert_eq!(after.calories, before.calories);
    }

    #[test]
    fn test_update_goals_with_macros() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let macros = MacroTargets {
            protein_g: 160.0,
            fat_g: 80.0,
            carbs_g: 320.0,
            calories: 2640,
        };
        let goals = db
            .update_goals(
                user.id,
                &UpdateGoals {
                    goal_type: Some(GoalType::Gain),
                    ..Default::default()
                },
                Some(&macros),
            )
            .unwrap();
        assert_eq!(goals.goal_type, GoalType::Gain);
        assert_eq!(goals.calories, 2640);
        assert!((goals.carbs_g - 320.0).abs() < 1e-9);
    }

    #[test]
    fn test_in_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");

        let result: Result<()> = db.in_transaction(|| {
            db.set_steps(user.id, day(), 4000)?;
            anyhow::bail!("stop")
        });
        assert!(result.is_err());
        assert_eq!(db.get_steps(user.id, day()).unwrap(), 0);

        db.in_transaction(|| db.set_steps(user.id, day(), 4000))
            .unwrap();
        assert_eq!(db.get_steps(user.id, day()).unwrap(), 4000);
    }

    #[test]
    fn test_health_import_is_all_or_nothing() {
        use crate::health_import::{HealthRow, import_health_rows};

        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        db.conn
            .execute_batch(
                "CREATE TRIGGER reject_imported_weight BEFORE INSERT ON weight_logs
                 WHEN NEW.source = 'import'
                 BEGIN SELECT RAISE(ABORT, 'weight rejected'); END;",
            )
            .unwrap();

        let rows = vec![
            HealthRow {
                date: day(),
                steps: Some(9000),
                weight_kg: None,
            },
            HealthRow {
                date: day() + chrono::Duration::days(1),
                steps: Some(7000),
                weight_kg: Some(63.5),
            },
        ];
        assert!(import_health_rows(&db, user.id, &rows, false).is_err());

        assert_eq!(db.get_steps(user.id, day()).unwrap(), 0);
        assert_eq!(
            db.get_steps(user.id, day() + chrono::Duration::days(1))
                .unwrap(),
            0
        );
        assert_eq!(db.weight_history(user.id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_get_user_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.get_user(42).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StrideError>(),
            Some(StrideError::UserNotFound(42))
        ));
    }

    #[test]
    fn test_username_lookup_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "Alex");
        let found = db.get_user_by_username("alex").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        let (_, password_hash) = db.get_credentials("ALEX").unwrap().unwrap();
        assert!(password_hash.starts_with("$2"));
    }

    #[test]
    fn test_delete_user_cascades() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let food = db.insert_food(&sample_food()).unwrap();
        db.insert_consumed(&NewConsumedFood {
            user_id: user.id,
            food_id: food.id,
            grams: 150.0,
            meal_type: "lunch".to_string(),
            consumed_at: at(day(), 12, 0),
        })
        .unwrap();
        db.add_steps(user.id, day(), 5000).unwrap();
        db.add_water(user.id, day(), 500).unwrap();

        assert!(db.delete_user(user.id).unwrap());
        assert!(db.get_profile(user.id).is_err());
        assert!(db.get_goals(user.id).is_err());
        assert!(db.weight_history(user.id, None).unwrap().is_empty());
        let (start, end) = day_window(day());
        assert!(db.consumed_between(user.id, start, end).unwrap().is_empty());
        assert_eq!(db.get_steps(user.id, day()).unwrap(), 0);
        assert!(db.list_water(user.id).unwrap().is_empty());
        // The catalog itself is untouched
        assert!(db.get_food(food.id).is_ok());
    }

    #[test]
    fn test_update_profile_fields() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let updated = db
            .update_profile(
                user.id,
                &UpdateProfile {
                    height_cm: Some(170.0),
                    health_sync_enabled: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!((updated.height_cm - 170.0).abs() < f64::EPSILON);
        assert!(updated.health_sync_enabled);
        assert!(!updated.health_write_enabled);
        assert_eq!(updated.name, "Alex");
    }

    #[test]
    fn test_set_goal_macros_derives_calories() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let goals = db.set_goal_macros(user.id, 150.0, 70.0, 200.0).unwrap();
        assert_eq!(goals.calories, 600 + 630 + 800);
        assert!(db.set_goal_macros(999, 1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_update_goals_targets() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let goals = db
            .update_goals(
                user.id,
                &UpdateGoals {
                    target_steps: Some(8000),
                    target_water_ml: Some(3000),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(goals.target_steps, 8000);
        assert_eq!(goals.target_water_ml, 3000);
        assert_eq!(goals.goal_type, GoalType::Maintain);
    }

    #[test]
    fn test_insert_food_derives_calories() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food(&sample_food()).unwrap();
        // 4*31 + 9*3.6 + 0 = 156.4
        assert_eq!(food.calories_per_100g, 156);
        assert_eq!(food.category.as_deref(), Some("Meat"));

        let updated = db.update_food_nutrients(food.id, 10.0, 10.0, 10.0).unwrap();
        assert_eq!(updated.calories_per_100g, 170);
    }

    #[test]
    fn test_search_foods_escapes_wildcards() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food(&sample_food()).unwrap();
        db.insert_food(&NewFood {
            name: "100% Oats".to_string(),
            category: None,
            protein_per_100g: 13.0,
            fat_per_100g: 7.0,
            carbs_per_100g: 68.0,
        })
        .unwrap();

        assert_eq!(db.search_foods("chicken").unwrap().len(), 1);
        assert_eq!(db.search_foods("meat").unwrap().len(), 1);
        let pct = db.search_foods("%").unwrap();
        assert_eq!(pct.len(), 1);
        assert_eq!(pct[0].name, "100% Oats");
        assert_eq!(db.list_foods(None).unwrap().len(), 2);
        assert!(db.find_food_by_name("chicken breast").unwrap().is_some());
    }

    #[test]
    fn test_delete_food_cascades_to_consumed() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let food = db.insert_food(&sample_food()).unwrap();
        let entry = db
            .insert_consumed(&NewConsumedFood {
                user_id: user.id,
                food_id: food.id,
                grams: 100.0,
                meal_type: "dinner".to_string(),
                consumed_at: at(day(), 19, 0),
            })
            .unwrap();

        assert!(db.delete_food(food.id).unwrap());
        assert!(db.get_consumed(entry.id).is_err());
        assert!(!db.delete_food(food.id).unwrap());
    }

    #[test]
    fn test_consumed_scaling_and_window() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let food = db.insert_food(&sample_food()).unwrap();

        let entry = db
            .insert_consumed(&NewConsumedFood {
                user_id: user.id,
                food_id: food.id,
                grams: 200.0,
                meal_type: "lunch".to_string(),
                consumed_at: at(day(), 12, 30),
            })
            .unwrap();
        assert_eq!(entry.food_name, "Chicken Breast");
        assert!((entry.calories - 312.0).abs() < 1e-9);
        assert!((entry.protein - 62.0).abs() < 1e-9);

        db.insert_consumed(&NewConsumedFood {
            user_id: user.id,
            food_id: food.id,
            grams: 100.0,
            meal_type: "breakfast".to_string(),
            consumed_at: at(day() + chrono::Duration::days(1), 0, 5),
        })
        .unwrap();

        let (start, end) = day_window(day());
        let entries = db.consumed_between(user.id, start, end).unwrap();
        assert_eq!(entries.len(), 1);
        assert!((db.calories_between(user.id, start, end).unwrap() - 312.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_and_delete_consumed() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let food = db.insert_food(&sample_food()).unwrap();
        let entry = db
            .insert_consumed(&NewConsumedFood {
                user_id: user.id,
                food_id: food.id,
                grams: 100.0,
                meal_type: "lunch".to_string(),
                consumed_at: at(day(), 12, 0),
            })
            .unwrap();

        let updated = db
            .update_consumed(
                entry.id,
                &UpdateConsumedFood {
                    grams: Some(50.0),
                    meal_type: Some("snack".to_string()),
                    consumed_at: None,
                },
            )
            .unwrap();
        assert!((updated.grams - 50.0).abs() < f64::EPSILON);
        assert_eq!(updated.meal_type, "snack");
        assert!((updated.calories - 78.0).abs() < 1e-9);

        // Another user's id cannot delete it
        assert!(!db.delete_consumed(user.id + 1, entry.id).unwrap());
        assert!(db.delete_consumed(user.id, entry.id).unwrap());
        assert!(db.update_consumed(entry.id, &UpdateConsumedFood::default()).is_err());
    }

    #[test]
    fn test_steps_never_negative() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");

        assert_eq!(db.get_steps(user.id, day()).unwrap(), 0);
        assert_eq!(db.add_steps(user.id, day(), 1200).unwrap(), 1200);
        assert_eq!(db.add_steps(user.id, day(), -200).unwrap(), 1000);
        assert_eq!(db.add_steps(user.id, day(), -5000).unwrap(), 0);
        assert_eq!(db.add_steps(user.id, day(), 300).unwrap(), 300);

        // A fresh day starting with a decrement stays at zero
        let next = day() + chrono::Duration::days(1);
        assert_eq!(db.add_steps(user.id, next, -10).unwrap(), 0);
        assert_eq!(db.set_steps(user.id, next, 4321).unwrap(), 4321);
    }

    #[test]
    fn test_water_never_negative() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");

        assert_eq!(db.add_water(user.id, day(), 250).unwrap(), 250);
        assert_eq!(db.add_water(user.id, day(), 250).unwrap(), 500);
        assert_eq!(db.add_water(user.id, day(), -750).unwrap(), 0);
        let rows = db.list_water(user.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 0);
    }

    #[test]
    fn test_insert_weight_same_instant_replaces() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let when = at(day(), 7, 0);

        let first = db
            .insert_weight(&NewWeightLog {
                user_id: user.id,
                weight_kg: 64.5,
                logged_at: when,
                source: "manual".to_string(),
            })
            .unwrap();
        let second = db
            .insert_weight(&NewWeightLog {
                user_id: user.id,
                weight_kg: 64.2,
                logged_at: when,
                source: "manual".to_string(),
            })
            .unwrap();
        assert_eq!(first.id, second.id);
        assert!((second.weight_kg - 64.2).abs() < f64::EPSILON);

        let (start, end) = day_window(day());
        assert_eq!(db.weights_between(user.id, start, end).unwrap().len(), 1);
        let latest = db.latest_weight_before(user.id, end).unwrap().unwrap();
        assert_eq!(latest.id, first.id);
        assert!(db.latest_weight_before(user.id, start).unwrap().is_none());

        assert!(db.delete_weight_log(user.id, first.id).unwrap());
        assert!(db.get_weight_log(first.id).unwrap().is_none());
    }

    #[test]
    fn test_weight_history_limit() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        for h in 6..9 {
            db.insert_weight(&NewWeightLog {
                user_id: user.id,
                weight_kg: 60.0 + f64::from(h),
                logged_at: at(day(), h, 0),
                source: "manual".to_string(),
            })
            .unwrap();
        }
        // Three manual logs plus the registration weight
        assert_eq!(db.weight_history(user.id, None).unwrap().len(), 4);
        assert_eq!(db.weight_history(user.id, Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_insert_summary_at_most_once() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, "alex");
        let snapshot = NewDailySummary {
            user_id: user.id,
            date: day(),
            weight_kg: Some(64.0),
            calories: 1800.0,
            steps: 9000,
            water_ml: 2000,
        };

        assert!(!db.summary_exists(user.id, day()).unwrap());
        assert!(db.insert_summary(&snapshot).unwrap());
        assert!(db.summary_exists(user.id, day()).unwrap());

        let changed = NewDailySummary {
            weight_kg: Some(99.0),
            ..snapshot
        };
        assert!(!db.insert_summary(&changed).unwrap());
        let stored = db.get_summary(user.id, day()).unwrap().unwrap();
        assert_eq!(stored.weight_kg, Some(64.0));
        assert_eq!(db.list_summaries(user.id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_settings_crud() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_setting("session.user_id").unwrap().is_none());
        db.set_setting("session.user_id", "1").unwrap();
        db.set_setting("session.user_id", "2").unwrap();
        assert_eq!(db.get_setting("session.user_id").unwrap().as_deref(), Some("2"));
        assert!(db.delete_setting("session.user_id").unwrap());
        assert!(!db.delete_setting("session.user_id").unwrap());
    }

    #[test]
    fn test_reopen_file_database_keeps_data() {
        let dir = std::env::temp_dir().join(format!("stride-db-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stride.db");
        {
            let db = Database::open(&path).unwrap();
            register(&db, "alex");
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_users().unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
