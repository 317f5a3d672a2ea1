//! Event collection
//!
//! Read-only gathering of the per-semester inputs: registration volume
//! deltas, in-add-drop-period status updates, initial section statuses, and
//! the add/drop window itself. Nothing here mutates the store.

use crate::merge::{StatusChange, VolumeChange};
use chrono::{DateTime, Utc};
use pulse_common::db::{AddDropPeriod, Section, SectionStatus, StatusUpdate};
use pulse_common::{Result, Semester};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// A section participating in extrema/demand computation
#[derive(Debug, Clone)]
pub struct EligibleSection {
    pub id: i64,
    pub code: String,
    /// Positive by construction; sections without positive capacity are
    /// excluded upstream.
    pub capacity: i64,
    pub initial_status: SectionStatus,
}

/// Raw registration row before volume-event derivation
#[derive(Debug, Clone, sqlx::FromRow)]
struct RegistrationRow {
    section_id: i64,
    created_at: DateTime<Utc>,
    notification_sent_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

/// Add/drop window for a semester, estimated from the calendar when the
/// store has no explicit record
pub async fn load_add_drop_period(db: &SqlitePool, semester: &Semester) -> Result<AddDropPeriod> {
    let row: Option<AddDropPeriod> = sqlx::query_as(
        "SELECT semester, estimated_start, estimated_end FROM add_drop_periods WHERE semester = ?",
    )
    .bind(semester.code())
    .fetch_optional(db)
    .await?;

    match row {
        Some(period) => Ok(period),
        None => {
            let (estimated_start, estimated_end) = semester.estimated_add_drop_window()?;
            Ok(AddDropPeriod {
                semester: semester.code(),
                estimated_start,
                estimated_end,
            })
        }
    }
}

/// All sections of a semester, any capacity
pub async fn load_sections(db: &SqlitePool, semester: &Semester) -> Result<Vec<Section>> {
    let sections = sqlx::query_as(
        "SELECT id, code, semester, capacity, status FROM sections WHERE semester = ? ORDER BY id",
    )
    .bind(semester.code())
    .fetch_all(db)
    .await?;
    Ok(sections)
}

/// Registration volume events for eligible sections, in row order
pub async fn load_volume_changes(db: &SqlitePool, semester: &Semester) -> Result<Vec<VolumeChange>> {
    let rows: Vec<RegistrationRow> = sqlx::query_as(
        r#"
        SELECT r.section_id, r.created_at, r.notification_sent_at, r.cancelled_at, r.deleted_at
        FROM registrations r
        JOIN sections s ON r.section_id = s.id
        WHERE s.semester = ? AND s.capacity > 0
        ORDER BY r.created_at, r.id
        "#,
    )
    .bind(semester.code())
    .fetch_all(db)
    .await?;

    Ok(volume_events_from_rows(&rows))
}

/// Derive at most one +1 and one -1 event per registration.
///
/// The -1 timestamp is the earliest non-null of notification_sent_at,
/// cancelled_at and deleted_at.
fn volume_events_from_rows(rows: &[RegistrationRow]) -> Vec<VolumeChange> {
    let mut events = Vec::with_capacity(rows.len() * 2);
    for row in rows {
        events.push(VolumeChange {
            section_id: row.section_id,
            at: row.created_at,
            delta: 1,
        });
        let deactivated_at = [row.notification_sent_at, row.cancelled_at, row.deleted_at]
            .into_iter()
            .flatten()
            .min();
        if let Some(at) = deactivated_at {
            events.push(VolumeChange {
                section_id: row.section_id,
                at,
                delta: -1,
            });
        }
    }
    events
}

/// Status updates inside the add/drop period, for all sections of the
/// semester, in deterministic time order
pub async fn load_status_updates_in_period(
    db: &SqlitePool,
    semester: &Semester,
    period: &AddDropPeriod,
) -> Result<Vec<StatusUpdate>> {
    let updates = sqlx::query_as(
        r#"
        SELECT su.id, su.section_id, su.old_status, su.new_status, su.created_at
        FROM status_updates su
        JOIN sections s ON su.section_id = s.id
        WHERE s.semester = ? AND su.created_at >= ? AND su.created_at <= ?
        ORDER BY su.created_at, su.id
        "#,
    )
    .bind(semester.code())
    .bind(period.estimated_start)
    .bind(period.estimated_end)
    .fetch_all(db)
    .await?;
    Ok(updates)
}

/// Last status known per section before the add/drop period starts
pub async fn load_pre_period_statuses(
    db: &SqlitePool,
    semester: &Semester,
    period_start: DateTime<Utc>,
) -> Result<HashMap<i64, SectionStatus>> {
    let updates: Vec<StatusUpdate> = sqlx::query_as(
        r#"
        SELECT su.id, su.section_id, su.old_status, su.new_status, su.created_at
        FROM status_updates su
        JOIN sections s ON su.section_id = s.id
        WHERE s.semester = ? AND su.created_at < ?
        ORDER BY su.created_at, su.id
        "#,
    )
    .bind(semester.code())
    .bind(period_start)
    .fetch_all(db)
    .await?;

    let mut statuses = HashMap::new();
    for update in &updates {
        if let Some(status) = SectionStatus::from_db_code(&update.new_status) {
            // Later updates overwrite earlier ones
            statuses.insert(update.section_id, status);
        }
    }
    Ok(statuses)
}

/// Convert raw status updates into merged-stream events for the eligible
/// sections, dropping rows with unknown status codes
pub fn status_changes(updates: &[StatusUpdate], eligible: &HashSet<i64>) -> Vec<StatusChange> {
    let mut changes = Vec::new();
    for update in updates {
        if !eligible.contains(&update.section_id) {
            continue;
        }
        let parsed = SectionStatus::from_db_code(&update.old_status)
            .zip(SectionStatus::from_db_code(&update.new_status));
        match parsed {
            Some((old_status, new_status)) => changes.push(StatusChange {
                section_id: update.section_id,
                at: update.created_at,
                old_status,
                new_status,
            }),
            None => warn!(
                update_id = update.id,
                old = %update.old_status,
                new = %update.new_status,
                "dropping status update with unknown status code"
            ),
        }
    }
    changes
}

/// Eligible sections with their initial statuses.
///
/// Initial status comes from the earliest in-period update's old_status;
/// sections with no in-period updates fall back to Open/Closed inferred from
/// percent_open > 0.5.
pub fn eligible_sections(
    sections: &[Section],
    in_period_updates: &[StatusUpdate],
    percent_open: &HashMap<i64, f64>,
) -> Vec<EligibleSection> {
    let mut earliest_old_status: HashMap<i64, SectionStatus> = HashMap::new();
    for update in in_period_updates {
        if let Some(status) = SectionStatus::from_db_code(&update.old_status) {
            earliest_old_status.entry(update.section_id).or_insert(status);
        }
    }

    sections
        .iter()
        .filter_map(|section| {
            let capacity = section.capacity.filter(|&c| c > 0)?;
            let initial_status = earliest_old_status
                .get(&section.id)
                .copied()
                .unwrap_or_else(|| {
                    let open = percent_open.get(&section.id).copied().unwrap_or(1.0) > 0.5;
                    if open {
                        SectionStatus::Open
                    } else {
                        SectionStatus::Closed
                    }
                });
            Some(EligibleSection {
                id: section.id,
                code: section.code.clone(),
                capacity,
                initial_status,
            })
        })
        .collect()
}
