//! Time source
//!
//! Recomputation must be reproducible under test, so "now" is an injected
//! handle rather than an ambient call.

use chrono::{DateTime, Utc};

/// Injectable current-time source
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    /// Wall clock
    #[default]
    System,
    /// Frozen instant, for tests and replay
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn system() -> Clock {
        Clock::System
    }

    pub fn fixed(at: DateTime<Utc>) -> Clock {
        Clock::Fixed(at)
    }

    /// Current UTC timestamp
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }
}
