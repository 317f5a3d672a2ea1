//! Database initialization
//!
//! Creates the database on first run with the full schema. Input tables
//! (sections, registrations, status updates, add/drop periods, options) are
//! owned by the surrounding platform; they are created here as well so a
//! fresh database is usable for tests and local runs.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL keeps readers live while a recompute transaction writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_sections_table(pool).await?;
    create_registrations_table(pool).await?;
    create_status_updates_table(pool).await?;
    create_add_drop_periods_table(pool).await?;
    create_options_table(pool).await?;

    // Engine outputs
    create_demand_extrema_table(pool).await?;
    create_demand_distribution_estimates_table(pool).await?;
    create_section_percent_open_table(pool).await?;
    Ok(())
}

async fn create_sections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL,
            semester TEXT NOT NULL,
            capacity INTEGER,
            status TEXT NOT NULL DEFAULT 'U',
            UNIQUE (code, semester)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_registrations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS registrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            section_id INTEGER NOT NULL REFERENCES sections(id),
            created_at TEXT NOT NULL,
            notification_sent_at TEXT,
            cancelled_at TEXT,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_registrations_section ON registrations(section_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_status_updates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS status_updates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            section_id INTEGER NOT NULL REFERENCES sections(id),
            old_status TEXT NOT NULL,
            new_status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_status_updates_section ON status_updates(section_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_add_drop_periods_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS add_drop_periods (
            semester TEXT PRIMARY KEY,
            estimated_start TEXT NOT NULL,
            estimated_end TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_options_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS options (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_demand_extrema_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS demand_extrema (
            guid TEXT PRIMARY KEY,
            semester TEXT NOT NULL,
            created_at TEXT NOT NULL,
            most_popular_section_id INTEGER NOT NULL REFERENCES sections(id),
            most_popular_volume INTEGER NOT NULL,
            least_popular_section_id INTEGER NOT NULL REFERENCES sections(id),
            least_popular_volume INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_demand_extrema_semester ON demand_extrema(semester, created_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_demand_distribution_estimates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS demand_distribution_estimates (
            guid TEXT PRIMARY KEY,
            semester TEXT NOT NULL,
            created_at TEXT NOT NULL,
            highest_demand_section_id INTEGER NOT NULL REFERENCES sections(id),
            highest_demand_section_volume INTEGER NOT NULL,
            lowest_demand_section_id INTEGER NOT NULL REFERENCES sections(id),
            lowest_demand_section_volume INTEGER NOT NULL,
            frac_zero_demand REAL,
            lognorm_shape REAL,
            lognorm_loc REAL,
            lognorm_scale REAL,
            mean_log_likelihood REAL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_demand_estimates_semester ON demand_distribution_estimates(semester, created_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_section_percent_open_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS section_percent_open (
            section_id INTEGER PRIMARY KEY REFERENCES sections(id),
            semester TEXT NOT NULL,
            percent_open REAL NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
