//! Recompute context
//!
//! Bundles the collaborators every recomputation needs. Handed down
//! explicitly so the engine has no ambient globals.

use pulse_common::cache::DemandCache;
use pulse_common::config::StatsConfig;
use pulse_common::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared handles for a recomputation run
#[derive(Clone)]
pub struct RecomputeContext {
    pub db: SqlitePool,
    pub cache: Arc<DemandCache>,
    pub clock: Clock,
    pub config: StatsConfig,
}

impl RecomputeContext {
    pub fn new(db: SqlitePool, cache: Arc<DemandCache>, clock: Clock, config: StatsConfig) -> Self {
        RecomputeContext {
            db,
            cache,
            clock,
            config,
        }
    }
}
