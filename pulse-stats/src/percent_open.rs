//! Percent-open recomputation
//!
//! Derives, per section, the fraction of the add/drop period spent in Open
//! status by walking its in-period status updates. Erroneous updates (old
//! status disagreeing with tracked state) are counted and skipped with the
//! same rule the extrema walk applies.

use chrono::{DateTime, Utc};
use pulse_common::db::{AddDropPeriod, Section, SectionPercentOpen, SectionStatus, StatusUpdate};
use std::collections::HashMap;
use tracing::warn;

/// Result of a percent-open pass over one semester
#[derive(Debug, Clone)]
pub struct PercentOpenOutcome {
    pub rows: Vec<SectionPercentOpen>,
    pub erroneous_updates: u64,
}

impl PercentOpenOutcome {
    /// Section id → percent_open, for initial-status inference
    pub fn by_section(&self) -> HashMap<i64, f64> {
        self.rows
            .iter()
            .map(|row| (row.section_id, row.percent_open))
            .collect()
    }
}

/// Recompute percent-open for every section of a semester.
///
/// `right_edge` is the end of the measured window: the period's estimated
/// end for past semesters, "now" (clamped to the period) for the current
/// one. `updates` must be the in-period updates in (created_at, id) order.
pub fn recompute_percent_open(
    sections: &[Section],
    updates: &[StatusUpdate],
    period: &AddDropPeriod,
    pre_period_statuses: &HashMap<i64, SectionStatus>,
    right_edge: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> PercentOpenOutcome {
    let mut per_section: HashMap<i64, Vec<&StatusUpdate>> = HashMap::new();
    for update in updates {
        per_section.entry(update.section_id).or_default().push(update);
    }

    let mut rows = Vec::with_capacity(sections.len());
    let mut erroneous_updates = 0;

    for section in sections {
        let mut tracked = pre_period_statuses
            .get(&section.id)
            .copied()
            .unwrap_or(SectionStatus::Open);
        let mut cursor = period.estimated_start;
        let mut open_seconds: i64 = 0;

        for update in per_section.get(&section.id).into_iter().flatten() {
            let parsed = SectionStatus::from_db_code(&update.old_status)
                .zip(SectionStatus::from_db_code(&update.new_status));
            let Some((old_status, new_status)) = parsed else {
                warn!(
                    update_id = update.id,
                    old = %update.old_status,
                    new = %update.new_status,
                    "dropping status update with unknown status code"
                );
                continue;
            };
            if old_status != tracked {
                erroneous_updates += 1;
                continue;
            }
            let at = update
                .created_at
                .clamp(period.estimated_start, right_edge);
            if tracked.is_open() {
                open_seconds += (at - cursor).num_seconds();
            }
            cursor = at;
            tracked = new_status;
        }

        if tracked.is_open() && right_edge > cursor {
            open_seconds += (right_edge - cursor).num_seconds();
        }

        let total_seconds = (right_edge - period.estimated_start).num_seconds();
        let percent_open = if total_seconds <= 0 {
            if tracked.is_open() {
                1.0
            } else {
                0.0
            }
        } else {
            (open_seconds as f64 / total_seconds as f64).clamp(0.0, 1.0)
        };

        rows.push(SectionPercentOpen {
            section_id: section.id,
            semester: section.semester.clone(),
            percent_open,
            updated_at,
        });
    }

    PercentOpenOutcome {
        rows,
        erroneous_updates,
    }
}
