//! Recompute orchestration
//!
//! Drives one full demand recomputation per semester: gather events, walk
//! the merged stream through both trackers, then atomically replace the
//! semester's output rows. Each semester commits (or rolls back) on its own,
//! so a failure never claws back earlier semesters' results.

use crate::collector::{
    eligible_sections, load_add_drop_period, load_pre_period_statuses, load_sections,
    load_status_updates_in_period, load_volume_changes, status_changes,
};
use crate::context::RecomputeContext;
use crate::extrema::ExtremaTracker;
use crate::fitter::DistributionFitter;
use crate::ledger::SectionLedger;
use crate::merge::merge_changes;
use crate::percent_open::recompute_percent_open;
use chrono::Duration;
use pulse_common::cache::{CURRENT_DEMAND_DISTRIBUTION_ESTIMATE, CURRENT_DEMAND_EXTREMA};
use pulse_common::db::options::{get_option, SEMESTER_KEY};
use pulse_common::db::{DemandDistributionEstimate, DemandExtremaSnapshot, SectionPercentOpen};
use pulse_common::{Error, Result, Semester};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{debug, info};

/// Advisory lock name guarding the current-semester cache keys
pub const DEMAND_CACHE_LOCK: &str = "demand_cache";

/// Per-semester recompute result, for the verbose summary
#[derive(Debug, Clone)]
pub struct SemesterSummary {
    pub semester: String,
    pub is_current: bool,
    pub sections: usize,
    pub eligible_sections: usize,
    pub changes: usize,
    pub snapshots: usize,
    pub estimates: usize,
    pub percent_open_rows: usize,
    /// Erroneous updates skipped by the extrema/fit walk
    pub erroneous_updates: u64,
    /// Erroneous updates skipped by the percent-open walk (same rule)
    pub percent_open_erroneous_updates: u64,
}

/// Resolve the `--semesters` argument into validated semesters.
///
/// `None` means the current semester; `all` expands to every semester with
/// sections on record. Validation happens here, before any transaction.
pub async fn resolve_semesters(db: &SqlitePool, arg: Option<&str>) -> Result<Vec<Semester>> {
    match arg {
        None => Ok(vec![pulse_common::db::get_current_semester(db).await?]),
        Some("all") => {
            let codes: Vec<String> =
                sqlx::query_scalar("SELECT DISTINCT semester FROM sections ORDER BY semester")
                    .fetch_all(db)
                    .await?;
            codes.iter().map(|code| Semester::parse(code)).collect()
        }
        Some(list) => list
            .split(',')
            .map(|code| Semester::parse(code))
            .collect(),
    }
}

/// Recompute all given semesters sequentially, one transaction each
pub async fn recompute_demand_stats(
    ctx: &RecomputeContext,
    semesters: &[Semester],
) -> Result<Vec<SemesterSummary>> {
    let mut summaries = Vec::with_capacity(semesters.len());
    for semester in semesters {
        summaries.push(recompute_semester(ctx, semester).await?);
    }
    Ok(summaries)
}

/// Recompute one semester's demand stats from scratch
pub async fn recompute_semester(
    ctx: &RecomputeContext,
    semester: &Semester,
) -> Result<SemesterSummary> {
    let current = get_option::<Semester>(&ctx.db, SEMESTER_KEY).await?;
    let is_current = current == Some(*semester);
    let period = load_add_drop_period(&ctx.db, semester).await?;
    let now = ctx.clock.now();
    let right_edge = if is_current {
        now.clamp(period.estimated_start, period.estimated_end)
    } else {
        period.estimated_end
    };

    info!(semester = %semester, is_current, "recomputing demand stats");

    // Read-only input gathering
    let sections = load_sections(&ctx.db, semester).await?;
    let in_period_updates = load_status_updates_in_period(&ctx.db, semester, &period).await?;
    let pre_period_statuses =
        load_pre_period_statuses(&ctx.db, semester, period.estimated_start).await?;
    let volume_changes = load_volume_changes(&ctx.db, semester).await?;

    // Percent-open first: its output seeds initial-status inference
    let percent_open = recompute_percent_open(
        &sections,
        &in_period_updates,
        &period,
        &pre_period_statuses,
        right_edge,
        now,
    );

    let eligible = eligible_sections(&sections, &in_period_updates, &percent_open.by_section());
    let eligible_ids: HashSet<i64> = eligible.iter().map(|s| s.id).collect();
    let status_events = status_changes(&in_period_updates, &eligible_ids);
    let merged = merge_changes(status_events, volume_changes);

    let mut ledger = SectionLedger::new(&eligible);
    let mut tracker = ExtremaTracker::new(&period.semester);
    let mut fitter = DistributionFitter::new(
        &period.semester,
        merged.len(),
        ctx.config.rough_minimum_estimates,
    );
    for change in &merged {
        let applied = ledger.apply(change);
        tracker.observe(&ledger, &applied, change.at());
        fitter.observe(&ledger, &applied, change.at());
    }
    let snapshots = tracker.into_snapshots();
    let estimates = fitter.into_estimates();

    debug!(
        semester = %semester,
        changes = merged.len(),
        snapshots = snapshots.len(),
        estimates = estimates.len(),
        "walk complete, persisting"
    );

    persist_outputs(ctx, &period.semester, &percent_open.rows, &snapshots, &estimates).await?;

    if is_current {
        update_current_cache(ctx, &period, snapshots.last(), estimates.last()).await?;
    }

    Ok(SemesterSummary {
        semester: period.semester,
        is_current,
        sections: sections.len(),
        eligible_sections: eligible.len(),
        changes: merged.len(),
        snapshots: snapshots.len(),
        estimates: estimates.len(),
        percent_open_rows: percent_open.rows.len(),
        erroneous_updates: ledger.erroneous_updates,
        percent_open_erroneous_updates: percent_open.erroneous_updates,
    })
}

/// Replace the semester's output rows inside one transaction
async fn persist_outputs(
    ctx: &RecomputeContext,
    semester: &str,
    percent_open_rows: &[SectionPercentOpen],
    snapshots: &[DemandExtremaSnapshot],
    estimates: &[DemandDistributionEstimate],
) -> Result<()> {
    let mut tx = ctx.db.begin().await?;

    sqlx::query("DELETE FROM demand_extrema WHERE semester = ?")
        .bind(semester)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM demand_distribution_estimates WHERE semester = ?")
        .bind(semester)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM section_percent_open WHERE semester = ?")
        .bind(semester)
        .execute(&mut *tx)
        .await?;

    for row in percent_open_rows {
        sqlx::query(
            r#"
            INSERT INTO section_percent_open (section_id, semester, percent_open, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(row.section_id)
        .bind(&row.semester)
        .bind(row.percent_open)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?;
    }

    for snap in snapshots {
        sqlx::query(
            r#"
            INSERT INTO demand_extrema
                (guid, semester, created_at,
                 most_popular_section_id, most_popular_volume,
                 least_popular_section_id, least_popular_volume)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snap.guid)
        .bind(&snap.semester)
        .bind(snap.created_at)
        .bind(snap.most_popular_section_id)
        .bind(snap.most_popular_volume)
        .bind(snap.least_popular_section_id)
        .bind(snap.least_popular_volume)
        .execute(&mut *tx)
        .await?;
    }

    for est in estimates {
        sqlx::query(
            r#"
            INSERT INTO demand_distribution_estimates
                (guid, semester, created_at,
                 highest_demand_section_id, highest_demand_section_volume,
                 lowest_demand_section_id, lowest_demand_section_volume,
                 frac_zero_demand, lognorm_shape, lognorm_loc, lognorm_scale,
                 mean_log_likelihood)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&est.guid)
        .bind(&est.semester)
        .bind(est.created_at)
        .bind(est.highest_demand_section_id)
        .bind(est.highest_demand_section_volume)
        .bind(est.lowest_demand_section_id)
        .bind(est.lowest_demand_section_volume)
        .bind(est.frac_zero_demand)
        .bind(est.lognorm_shape)
        .bind(est.lognorm_loc)
        .bind(est.lognorm_scale)
        .bind(est.mean_log_likelihood)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Refresh (or clear) the current-semester cache keys under the advisory
/// lock; timeout is a fraction of the add/drop duration
async fn update_current_cache(
    ctx: &RecomputeContext,
    period: &pulse_common::db::AddDropPeriod,
    snapshot: Option<&DemandExtremaSnapshot>,
    estimate: Option<&DemandDistributionEstimate>,
) -> Result<()> {
    let divisor = ctx.config.cache_timeout_divisor.max(1);
    let timeout_seconds = (period.estimated_duration().num_seconds() / divisor).max(1);
    let timeout = Some(Duration::seconds(timeout_seconds));

    let _guard = ctx.cache.lock(DEMAND_CACHE_LOCK).await;
    set_or_remove(ctx, CURRENT_DEMAND_EXTREMA, snapshot, timeout)?;
    set_or_remove(ctx, CURRENT_DEMAND_DISTRIBUTION_ESTIMATE, estimate, timeout)?;
    Ok(())
}

fn set_or_remove<T: Serialize>(
    ctx: &RecomputeContext,
    key: &str,
    value: Option<&T>,
    timeout: Option<Duration>,
) -> Result<()> {
    match value {
        Some(value) => {
            let json = serde_json::to_value(value)
                .map_err(|e| Error::Internal(format!("serializing cache entry {key}: {e}")))?;
            ctx.cache.set(key, json, timeout);
        }
        None => ctx.cache.remove(key),
    }
    Ok(())
}
