//! Asynchronous task entry points
//!
//! `section_demand_change` is invoked by the task queue once per course
//! status webhook delivery. It recomputes the live semester only; extrema
//! derivation is a pure function of the event history, so redelivery with
//! the same payload is idempotent.

use crate::context::RecomputeContext;
use crate::recompute::{recompute_semester, SemesterSummary};
use chrono::{DateTime, Utc};
use pulse_common::db::get_current_semester;
use pulse_common::{Result, Semester};
use tracing::{debug, info};

/// React to a section demand change in the given semester.
///
/// Non-current semesters are ignored (returns `Ok(None)`): historical
/// semesters are only recomputed by the full CLI run. On the current
/// semester this performs a full recompute of that semester and refreshes
/// the current-demand cache.
pub async fn section_demand_change(
    ctx: &RecomputeContext,
    semester: Semester,
    section_code: &str,
    triggered_at: DateTime<Utc>,
) -> Result<Option<SemesterSummary>> {
    let current = get_current_semester(&ctx.db).await?;
    if semester != current {
        debug!(
            semester = %semester,
            current = %current,
            section = section_code,
            "ignoring demand change outside the current semester"
        );
        return Ok(None);
    }

    info!(
        semester = %semester,
        section = section_code,
        %triggered_at,
        "demand change received, recomputing current semester"
    );
    let summary = recompute_semester(ctx, &semester).await?;
    Ok(Some(summary))
}
