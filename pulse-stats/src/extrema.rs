//! Extrema tracking
//!
//! Walks the merged change stream and maintains the highest- and lowest-
//! demand sections, appending a snapshot whenever the recorded extrema
//! change. Snapshot identity is derived from (semester, timestamp, sequence)
//! so a recompute over the same history reproduces identical rows.

use crate::ledger::{Applied, SectionLedger};
use chrono::{DateTime, Utc};
use pulse_common::db::DemandExtremaSnapshot;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct Extrema {
    max_id: i64,
    max_volume: i64,
    max_demand: f64,
    min_id: i64,
    min_volume: i64,
    min_demand: f64,
}

impl Extrema {
    fn recorded_tuple(&self) -> (i64, i64, i64, i64) {
        (self.max_id, self.max_volume, self.min_id, self.min_volume)
    }
}

/// Incremental max/min raw-demand tracker for one semester
pub struct ExtremaTracker {
    semester: String,
    latest: Option<Extrema>,
    snapshots: Vec<DemandExtremaSnapshot>,
}

impl ExtremaTracker {
    pub fn new(semester: &str) -> ExtremaTracker {
        ExtremaTracker {
            semester: semester.to_string(),
            latest: None,
            snapshots: Vec::new(),
        }
    }

    /// Observe one applied change; returns true when a snapshot was emitted
    pub fn observe(&mut self, ledger: &SectionLedger, applied: &Applied, at: DateTime<Utc>) -> bool {
        let Applied::Volume {
            section_id,
            delta,
            volume,
            demand,
        } = *applied
        else {
            return false;
        };

        match self.latest.clone() {
            None => {
                // Bootstrap: the first section gaining volume is both max
                // and min
                if delta <= 0 {
                    return false;
                }
                let first = Extrema {
                    max_id: section_id,
                    max_volume: volume,
                    max_demand: demand,
                    min_id: section_id,
                    min_volume: volume,
                    min_demand: demand,
                };
                self.emit(first, at);
                true
            }
            Some(prev) => {
                let Some((max_id, max_volume, max_demand)) =
                    ledger.elect_max(Some(prev.max_id), false)
                else {
                    return false;
                };
                let Some((min_id, min_volume, min_demand)) =
                    ledger.elect_min(Some(prev.min_id), false)
                else {
                    return false;
                };
                let next = Extrema {
                    max_id,
                    max_volume,
                    max_demand,
                    min_id,
                    min_volume,
                    min_demand,
                };
                if next.recorded_tuple() == prev.recorded_tuple() {
                    self.latest = Some(next);
                    return false;
                }
                self.emit(next, at);
                true
            }
        }
    }

    fn emit(&mut self, extrema: Extrema, at: DateTime<Utc>) {
        let name = format!(
            "demand-extrema:{}:{}:{}",
            self.semester,
            at.to_rfc3339(),
            self.snapshots.len()
        );
        self.snapshots.push(DemandExtremaSnapshot {
            guid: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string(),
            semester: self.semester.clone(),
            created_at: at,
            most_popular_section_id: extrema.max_id,
            most_popular_volume: extrema.max_volume,
            least_popular_section_id: extrema.min_id,
            least_popular_volume: extrema.min_volume,
        });
        self.latest = Some(extrema);
    }

    pub fn snapshots(&self) -> &[DemandExtremaSnapshot] {
        &self.snapshots
    }

    pub fn latest_snapshot(&self) -> Option<&DemandExtremaSnapshot> {
        self.snapshots.last()
    }

    pub fn into_snapshots(self) -> Vec<DemandExtremaSnapshot> {
        self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::EligibleSection;
    use crate::merge::{DemandChange, VolumeChange};
    use chrono::TimeZone;
    use pulse_common::db::SectionStatus;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    fn sections() -> Vec<EligibleSection> {
        vec![
            EligibleSection {
                id: 1,
                code: "CIS-1200-001".into(),
                capacity: 10,
                initial_status: SectionStatus::Closed,
            },
            EligibleSection {
                id: 2,
                code: "CIS-1200-002".into(),
                capacity: 5,
                initial_status: SectionStatus::Closed,
            },
        ]
    }

    fn apply_volume(
        ledger: &mut SectionLedger,
        tracker: &mut ExtremaTracker,
        section_id: i64,
        millis: i64,
        delta: i64,
    ) -> bool {
        let change = DemandChange::Volume(VolumeChange {
            section_id,
            at: at(millis),
            delta,
        });
        let applied = ledger.apply(&change);
        tracker.observe(ledger, &applied, change.at())
    }

    #[test]
    fn test_bootstrap_first_section_is_both_extrema() {
        let sections = sections();
        let mut ledger = SectionLedger::new(&sections);
        let mut tracker = ExtremaTracker::new("2026C");

        assert!(apply_volume(&mut ledger, &mut tracker, 1, 0, 1));
        let snap = tracker.latest_snapshot().unwrap();
        assert_eq!(snap.most_popular_section_id, 1);
        assert_eq!(snap.least_popular_section_id, 1);
        assert_eq!(snap.most_popular_volume, 1);
    }

    #[test]
    fn test_no_bootstrap_on_negative_delta() {
        let sections = sections();
        let mut ledger = SectionLedger::new(&sections);
        let mut tracker = ExtremaTracker::new("2026C");

        assert!(!apply_volume(&mut ledger, &mut tracker, 1, 0, -1));
        assert!(tracker.snapshots().is_empty());
    }

    #[test]
    fn test_two_section_scenario() {
        // Section 1 (capacity 10): volumes 1,2,3 at t=0,1,2
        // Section 2 (capacity 5): volume 1 at t=1.5
        let sections = sections();
        let mut ledger = SectionLedger::new(&sections);
        let mut tracker = ExtremaTracker::new("2026C");

        assert!(apply_volume(&mut ledger, &mut tracker, 1, 0, 1));
        assert!(apply_volume(&mut ledger, &mut tracker, 1, 1000, 1));
        // 1/5 = 0.2 ties 2/10 = 0.2: incumbent keeps both crowns, no emission
        assert!(!apply_volume(&mut ledger, &mut tracker, 2, 1500, 1));
        // 3/10 = 0.3: section 1 stays max with a new volume, section 2
        // takes min
        assert!(apply_volume(&mut ledger, &mut tracker, 1, 2000, 1));

        let snap = tracker.latest_snapshot().unwrap();
        assert_eq!(snap.created_at, at(2000));
        assert_eq!(snap.most_popular_section_id, 1);
        assert_eq!(snap.most_popular_volume, 3);
        assert_eq!(snap.least_popular_section_id, 2);
        assert_eq!(snap.least_popular_volume, 1);
    }

    #[test]
    fn test_snapshot_timestamps_non_decreasing() {
        let sections = sections();
        let mut ledger = SectionLedger::new(&sections);
        let mut tracker = ExtremaTracker::new("2026C");

        for (i, (section, delta)) in [(1, 1), (2, 1), (1, 1), (2, 1), (1, -1)]
            .into_iter()
            .enumerate()
        {
            apply_volume(&mut ledger, &mut tracker, section, i as i64 * 500, delta);
        }
        let times: Vec<_> = tracker.snapshots().iter().map(|s| s.created_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn test_max_reelection_when_incumbent_drops() {
        let sections = sections();
        let mut ledger = SectionLedger::new(&sections);
        let mut tracker = ExtremaTracker::new("2026C");

        apply_volume(&mut ledger, &mut tracker, 1, 0, 1); // 0.1
        apply_volume(&mut ledger, &mut tracker, 2, 1000, 1); // 0.2, max
        apply_volume(&mut ledger, &mut tracker, 2, 2000, -1); // 0.0, dethroned

        let snap = tracker.latest_snapshot().unwrap();
        assert_eq!(snap.most_popular_section_id, 1);
        assert_eq!(snap.least_popular_section_id, 2);
        assert_eq!(snap.least_popular_volume, 0);
    }

    #[test]
    fn test_identical_history_reproduces_identical_guids() {
        let run = || {
            let sections = sections();
            let mut ledger = SectionLedger::new(&sections);
            let mut tracker = ExtremaTracker::new("2026C");
            apply_volume(&mut ledger, &mut tracker, 1, 0, 1);
            apply_volume(&mut ledger, &mut tracker, 2, 1000, 1);
            tracker.into_snapshots()
        };
        assert_eq!(run(), run());
    }
}
