//! # CoursePulse Demand Engine
//!
//! Recomputes per-semester demand statistics from registration and
//! section-status history:
//! - extrema snapshots (highest/lowest raw-demand section over time)
//! - fitted demand distribution estimates over closed sections
//! - percent-open stats per section across the add/drop period
//!
//! The engine walks a merged, chronologically ordered change stream per
//! semester inside one transaction, so a failed run leaves prior output
//! untouched.

pub mod collector;
pub mod context;
pub mod dist;
pub mod extrema;
pub mod fitter;
pub mod ledger;
pub mod merge;
pub mod percent_open;
pub mod recompute;
pub mod tasks;

pub use context::RecomputeContext;
pub use recompute::{recompute_demand_stats, recompute_semester, SemesterSummary};
pub use tasks::section_demand_change;
