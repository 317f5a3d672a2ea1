//! Options database access
//!
//! Read/write platform options from the options table (key-value store).
//! The engine only consumes `SEMESTER`, the current-semester resolver.

use crate::error::{Error, Result};
use crate::semester::Semester;
use sqlx::SqlitePool;
use std::str::FromStr;

/// Option key holding the current (live) semester
pub const SEMESTER_KEY: &str = "SEMESTER";

/// Generic option getter
pub async fn get_option<T: FromStr>(db: &SqlitePool, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM options WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse option '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic option setter
///
/// Inserts or updates the option in the database.
pub async fn set_option<T: ToString>(db: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO options (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Resolve the current (live) semester
pub async fn get_current_semester(db: &SqlitePool) -> Result<Semester> {
    get_option::<Semester>(db, SEMESTER_KEY)
        .await?
        .ok_or_else(|| Error::NotFound(format!("option '{SEMESTER_KEY}' is not set")))
}
