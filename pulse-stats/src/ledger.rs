//! Per-walk section state
//!
//! One ledger backs a single pass over a semester's merged change stream.
//! It tracks cumulative registration volumes and current statuses for the
//! eligible (capacity > 0) sections, applies changes with the erroneous-
//! update rule, and answers the demand-ranking queries the trackers need.

use crate::collector::EligibleSection;
use crate::merge::DemandChange;
use pulse_common::db::SectionStatus;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Outcome of applying one change to the ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Applied {
    /// Volume delta applied; demand already recomputed
    Volume {
        section_id: i64,
        delta: i64,
        volume: i64,
        demand: f64,
    },
    /// Status transition applied
    Status { section_id: i64 },
    /// Status update whose old_status disagreed with tracked state
    SkippedErroneous,
    /// Event for a section outside the eligible set
    Ignored,
}

pub struct SectionLedger {
    capacities: HashMap<i64, i64>,
    volumes: HashMap<i64, i64>,
    statuses: HashMap<i64, SectionStatus>,
    /// Sections that have received at least one volume change, in
    /// first-activation order; only these participate in ranking.
    active: Vec<i64>,
    active_set: HashSet<i64>,
    pub erroneous_updates: u64,
}

impl SectionLedger {
    pub fn new(sections: &[EligibleSection]) -> SectionLedger {
        let mut capacities = HashMap::new();
        let mut volumes = HashMap::new();
        let mut statuses = HashMap::new();
        for section in sections {
            capacities.insert(section.id, section.capacity);
            volumes.insert(section.id, 0);
            statuses.insert(section.id, section.initial_status);
        }
        SectionLedger {
            capacities,
            volumes,
            statuses,
            active: Vec::new(),
            active_set: HashSet::new(),
            erroneous_updates: 0,
        }
    }

    /// Apply one change, returning what happened
    pub fn apply(&mut self, change: &DemandChange) -> Applied {
        match change {
            DemandChange::Status(c) => {
                let Some(tracked) = self.statuses.get_mut(&c.section_id) else {
                    return Applied::Ignored;
                };
                if *tracked != c.old_status {
                    debug!(
                        section_id = c.section_id,
                        tracked = tracked.to_db_code(),
                        claimed = c.old_status.to_db_code(),
                        "skipping erroneous status update"
                    );
                    self.erroneous_updates += 1;
                    return Applied::SkippedErroneous;
                }
                *tracked = c.new_status;
                Applied::Status {
                    section_id: c.section_id,
                }
            }
            DemandChange::Volume(c) => {
                let Some(&capacity) = self.capacities.get(&c.section_id) else {
                    return Applied::Ignored;
                };
                let volume = self.volumes.entry(c.section_id).or_insert(0);
                *volume += c.delta;
                let volume = *volume;
                if self.active_set.insert(c.section_id) {
                    self.active.push(c.section_id);
                }
                Applied::Volume {
                    section_id: c.section_id,
                    delta: c.delta,
                    volume,
                    demand: volume as f64 / capacity as f64,
                }
            }
        }
    }

    pub fn volume(&self, section_id: i64) -> i64 {
        self.volumes.get(&section_id).copied().unwrap_or(0)
    }

    /// Raw demand (volume / capacity) for an eligible section
    pub fn demand(&self, section_id: i64) -> Option<f64> {
        let capacity = *self.capacities.get(&section_id)?;
        Some(self.volume(section_id) as f64 / capacity as f64)
    }

    pub fn status(&self, section_id: i64) -> Option<SectionStatus> {
        self.statuses.get(&section_id).copied()
    }

    /// Raw-demand values of the currently closed active sections, in
    /// first-activation order
    pub fn closed_demand_values(&self) -> Vec<f64> {
        self.active
            .iter()
            .filter(|&&id| self.is_ranked(id, true))
            .filter_map(|&id| self.demand(id))
            .collect()
    }

    fn is_ranked(&self, section_id: i64, closed_only: bool) -> bool {
        !closed_only
            || self
                .status(section_id)
                .is_some_and(SectionStatus::is_closed)
    }

    /// Elect the highest-demand active section.
    ///
    /// Strictly greater demand dethrones; on exact ties the incumbent keeps
    /// the crown, otherwise the earliest-activated section wins. With
    /// `closed_only` the election is restricted to currently closed sections.
    pub fn elect_max(&self, incumbent: Option<i64>, closed_only: bool) -> Option<(i64, i64, f64)> {
        self.elect(incumbent, closed_only, |challenger, best| challenger > best)
    }

    /// Elect the lowest-demand active section; same tie rules as `elect_max`
    pub fn elect_min(&self, incumbent: Option<i64>, closed_only: bool) -> Option<(i64, i64, f64)> {
        self.elect(incumbent, closed_only, |challenger, best| challenger < best)
    }

    fn elect(
        &self,
        incumbent: Option<i64>,
        closed_only: bool,
        beats: impl Fn(f64, f64) -> bool,
    ) -> Option<(i64, i64, f64)> {
        let mut best: Option<(i64, f64)> = None;
        for &id in &self.active {
            if !self.is_ranked(id, closed_only) {
                continue;
            }
            let Some(demand) = self.demand(id) else {
                continue;
            };
            best = match best {
                None => Some((id, demand)),
                Some((_, best_demand)) if beats(demand, best_demand) => Some((id, demand)),
                // Exact tie: the incumbent holder takes precedence over
                // activation order
                Some((_, best_demand))
                    if demand == best_demand && incumbent == Some(id) =>
                {
                    Some((id, demand))
                }
                other => other,
            };
        }
        best.map(|(id, demand)| (id, self.volume(id), demand))
    }
}
