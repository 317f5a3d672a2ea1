//! Semester identifiers
//!
//! Semesters are encoded as `YYYY` + season letter (`A` spring, `B` summer,
//! `C` fall), e.g. `2026A`. The letter ordering matches chronological order
//! within a year, so derived ordering on (year, season) is chronological.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Season within an academic year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Single-letter code used in semester strings
    pub fn code(&self) -> char {
        match self {
            Season::Spring => 'A',
            Season::Summer => 'B',
            Season::Fall => 'C',
        }
    }

    /// Parse a season letter (uppercase only)
    pub fn from_code(c: char) -> Option<Season> {
        match c {
            'A' => Some(Season::Spring),
            'B' => Some(Season::Summer),
            'C' => Some(Season::Fall),
            _ => None,
        }
    }
}

/// A validated semester identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Semester {
    year: u16,
    season: Season,
}

impl Semester {
    /// Parse and validate a semester string, e.g. `2026A`
    pub fn parse(s: &str) -> Result<Semester> {
        let s = s.trim();
        if s.len() != 5 {
            return Err(Error::InvalidSemester(s.to_string()));
        }
        let (digits, letter) = s.split_at(4);
        let year: u16 = digits
            .parse()
            .map_err(|_| Error::InvalidSemester(s.to_string()))?;
        if !(1900..=2999).contains(&year) {
            return Err(Error::InvalidSemester(s.to_string()));
        }
        let season = letter
            .chars()
            .next()
            .and_then(Season::from_code)
            .ok_or_else(|| Error::InvalidSemester(s.to_string()))?;
        Ok(Semester { year, season })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn season(&self) -> Season {
        self.season
    }

    /// Canonical string form, e.g. `2026C`
    pub fn code(&self) -> String {
        format!("{}{}", self.year, self.season.code())
    }

    /// Estimated add/drop window for semesters with no explicit record.
    ///
    /// Rough calendar defaults per season: spring registration settles in
    /// late January, summer in mid-May, fall in early September.
    pub fn estimated_add_drop_window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let (start_m, start_d, end_m, end_d) = match self.season {
            Season::Spring => (1, 10, 2, 10),
            Season::Summer => (5, 10, 6, 1),
            Season::Fall => (8, 25, 9, 25),
        };
        Ok((
            utc_midnight(self.year as i32, start_m, start_d)?,
            utc_midnight(self.year as i32, end_m, end_d)?,
        ))
    }
}

fn utc_midnight(year: i32, month: u32, day: u32) -> Result<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| Utc.from_utc_datetime(&n))
        .ok_or_else(|| Error::Internal(format!("invalid date {year}-{month}-{day}")))
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.year, self.season.code())
    }
}

impl FromStr for Semester {
    type Err = Error;

    fn from_str(s: &str) -> Result<Semester> {
        Semester::parse(s)
    }
}
