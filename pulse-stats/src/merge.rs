//! Change stream merging
//!
//! Volume changes and status changes are merged into one chronologically
//! sorted stream per semester. On identical timestamps a status change sorts
//! before a volume change: the status transition is causally prior within
//! the same instant, which decides whether the section counts as closed when
//! the simultaneous volume change is applied.

use chrono::{DateTime, Utc};
use pulse_common::db::SectionStatus;

/// A registration volume delta for one section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeChange {
    pub section_id: i64,
    pub at: DateTime<Utc>,
    /// +1 on registration creation, -1 on its earliest deactivation
    pub delta: i64,
}

/// A section status transition inside the add/drop period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub section_id: i64,
    pub at: DateTime<Utc>,
    pub old_status: SectionStatus,
    pub new_status: SectionStatus,
}

/// One element of the merged change stream
#[derive(Debug, Clone, PartialEq)]
pub enum DemandChange {
    Status(StatusChange),
    Volume(VolumeChange),
}

impl DemandChange {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            DemandChange::Status(c) => c.at,
            DemandChange::Volume(c) => c.at,
        }
    }

    pub fn section_id(&self) -> i64 {
        match self {
            DemandChange::Status(c) => c.section_id,
            DemandChange::Volume(c) => c.section_id,
        }
    }

    // Status before volume on timestamp ties
    fn kind_rank(&self) -> u8 {
        match self {
            DemandChange::Status(_) => 0,
            DemandChange::Volume(_) => 1,
        }
    }
}

/// Merge both event kinds into one deterministically ordered stream
pub fn merge_changes(
    status_changes: Vec<StatusChange>,
    volume_changes: Vec<VolumeChange>,
) -> Vec<DemandChange> {
    let mut merged: Vec<DemandChange> = status_changes
        .into_iter()
        .map(DemandChange::Status)
        .chain(volume_changes.into_iter().map(DemandChange::Volume))
        .collect();
    // Stable sort: equal (timestamp, kind) pairs keep their source order
    merged.sort_by_key(|c| (c.at(), c.kind_rank()));
    merged
}
