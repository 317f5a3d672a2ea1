//! Distribution estimation
//!
//! Maintains the raw-demand extremes among currently closed sections and
//! refits the demand distribution when they move, or when enough changes
//! have elapsed since the last fit. The throttle interval is derived from
//! the stream length so the number of estimates per semester stays near the
//! configured minimum regardless of event volume.

use crate::dist::fit_lognormal;
use crate::ledger::{Applied, SectionLedger};
use chrono::{DateTime, Utc};
use pulse_common::db::DemandDistributionEstimate;
use uuid::Uuid;

/// Incremental demand-distribution estimator for one semester
pub struct DistributionFitter {
    semester: String,
    refit_interval: usize,
    changes_since_fit: usize,
    last_recorded: Option<(i64, i64, i64, i64)>,
    last_high: Option<i64>,
    last_low: Option<i64>,
    estimates: Vec<DemandDistributionEstimate>,
}

impl DistributionFitter {
    /// `total_changes` is the merged stream length for the semester;
    /// `rough_minimum` the configured lower bound on estimates.
    pub fn new(semester: &str, total_changes: usize, rough_minimum: usize) -> DistributionFitter {
        DistributionFitter {
            semester: semester.to_string(),
            refit_interval: (total_changes / rough_minimum.max(1)).max(1),
            changes_since_fit: 0,
            last_recorded: None,
            last_high: None,
            last_low: None,
            estimates: Vec::new(),
        }
    }

    /// Observe one applied change; returns true when an estimate was emitted
    pub fn observe(&mut self, ledger: &SectionLedger, applied: &Applied, at: DateTime<Utc>) -> bool {
        match applied {
            Applied::Volume { .. } | Applied::Status { .. } => {}
            Applied::SkippedErroneous | Applied::Ignored => return false,
        }
        self.changes_since_fit += 1;

        // No closed active section: there is nothing to name in a record
        let Some((high_id, high_volume, _)) = ledger.elect_max(self.last_high, true) else {
            return false;
        };
        let Some((low_id, low_volume, _)) = ledger.elect_min(self.last_low, true) else {
            return false;
        };

        let recorded = (high_id, high_volume, low_id, low_volume);
        let extrema_moved = self.last_recorded != Some(recorded);
        if !extrema_moved && self.changes_since_fit < self.refit_interval {
            return false;
        }

        let values = ledger.closed_demand_values();
        let zeros = values.iter().filter(|&&v| v == 0.0).count();
        let frac_zero = zeros as f64 / values.len() as f64;
        let positive: Vec<f64> = values.iter().copied().filter(|&v| v > 0.0).collect();
        let fit = fit_lognormal(&positive);

        let name = format!(
            "demand-estimate:{}:{}:{}",
            self.semester,
            at.to_rfc3339(),
            self.estimates.len()
        );
        self.estimates.push(DemandDistributionEstimate {
            guid: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string(),
            semester: self.semester.clone(),
            created_at: at,
            highest_demand_section_id: high_id,
            highest_demand_section_volume: high_volume,
            lowest_demand_section_id: low_id,
            lowest_demand_section_volume: low_volume,
            frac_zero_demand: Some(frac_zero),
            lognorm_shape: fit.as_ref().map(|f| f.shape),
            lognorm_loc: fit.as_ref().map(|f| f.loc),
            lognorm_scale: fit.as_ref().map(|f| f.scale),
            mean_log_likelihood: fit.as_ref().and_then(|f| f.mean_log_likelihood),
        });

        self.last_recorded = Some(recorded);
        self.last_high = Some(high_id);
        self.last_low = Some(low_id);
        self.changes_since_fit = 0;
        true
    }

    pub fn estimates(&self) -> &[DemandDistributionEstimate] {
        &self.estimates
    }

    pub fn latest_estimate(&self) -> Option<&DemandDistributionEstimate> {
        self.estimates.last()
    }

    pub fn into_estimates(self) -> Vec<DemandDistributionEstimate> {
        self.estimates
    }
}
