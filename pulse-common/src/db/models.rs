//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Section status codes as stored in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionStatus {
    Open,
    Closed,
    Cancelled,
    Unlisted,
}

impl SectionStatus {
    /// Parse a database status code
    pub fn from_db_code(code: &str) -> Option<SectionStatus> {
        match code {
            "O" => Some(SectionStatus::Open),
            "C" => Some(SectionStatus::Closed),
            "X" => Some(SectionStatus::Cancelled),
            "U" => Some(SectionStatus::Unlisted),
            _ => None,
        }
    }

    pub fn to_db_code(self) -> &'static str {
        match self {
            SectionStatus::Open => "O",
            SectionStatus::Closed => "C",
            SectionStatus::Cancelled => "X",
            SectionStatus::Unlisted => "U",
        }
    }

    pub fn is_open(self) -> bool {
        self == SectionStatus::Open
    }

    pub fn is_closed(self) -> bool {
        self == SectionStatus::Closed
    }
}

/// A course section (read-only input)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Section {
    pub id: i64,
    /// Full course code, e.g. `CIS-1200-001`
    pub code: String,
    pub semester: String,
    pub capacity: Option<i64>,
    pub status: String,
}

/// A status-change record for a section (read-only input)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusUpdate {
    pub id: i64,
    pub section_id: i64,
    pub old_status: String,
    pub new_status: String,
    pub created_at: DateTime<Utc>,
}

/// Add/drop registration window for a semester
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AddDropPeriod {
    pub semester: String,
    pub estimated_start: DateTime<Utc>,
    pub estimated_end: DateTime<Utc>,
}

impl AddDropPeriod {
    pub fn estimated_duration(&self) -> chrono::Duration {
        self.estimated_end - self.estimated_start
    }
}

/// Point-in-time record of the highest- and lowest-demand sections (output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DemandExtremaSnapshot {
    pub guid: String,
    pub semester: String,
    pub created_at: DateTime<Utc>,
    pub most_popular_section_id: i64,
    pub most_popular_volume: i64,
    pub least_popular_section_id: i64,
    pub least_popular_volume: i64,
}

/// Fitted demand distribution over closed sections (output)
///
/// Fit parameters follow the lognormal shape/loc/scale convention; all of
/// them are null when no closed section had positive demand at fit time.
/// A null `mean_log_likelihood` marks the fit as untrustworthy downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DemandDistributionEstimate {
    pub guid: String,
    pub semester: String,
    pub created_at: DateTime<Utc>,
    pub highest_demand_section_id: i64,
    pub highest_demand_section_volume: i64,
    pub lowest_demand_section_id: i64,
    pub lowest_demand_section_volume: i64,
    pub frac_zero_demand: Option<f64>,
    pub lognorm_shape: Option<f64>,
    pub lognorm_loc: Option<f64>,
    pub lognorm_scale: Option<f64>,
    pub mean_log_likelihood: Option<f64>,
}

/// Fraction of the add/drop period a section spent open (output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SectionPercentOpen {
    pub section_id: i64,
    pub semester: String,
    pub percent_open: f64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_roundtrip() {
        for status in [
            SectionStatus::Open,
            SectionStatus::Closed,
            SectionStatus::Cancelled,
            SectionStatus::Unlisted,
        ] {
            assert_eq!(SectionStatus::from_db_code(status.to_db_code()), Some(status));
        }
        assert_eq!(SectionStatus::from_db_code("Q"), None);
        assert_eq!(SectionStatus::from_db_code(""), None);
    }

    #[test]
    fn test_status_predicates() {
        assert!(SectionStatus::Open.is_open());
        assert!(!SectionStatus::Open.is_closed());
        assert!(SectionStatus::Closed.is_closed());
        assert!(!SectionStatus::Cancelled.is_open());
    }
}
