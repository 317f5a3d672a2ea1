//! CoursePulse demand statistics - CLI entry point
//!
//! Recomputes demand extrema, distribution estimates and percent-open stats
//! for one or more semesters.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_common::cache::DemandCache;
use pulse_common::config::{load_stats_config, resolve_database_path};
use pulse_common::db::init_database;
use pulse_common::Clock;
use pulse_stats::recompute::{recompute_demand_stats, resolve_semesters};
use pulse_stats::RecomputeContext;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for pulse-stats
#[derive(Parser, Debug)]
#[command(name = "pulse-stats")]
#[command(about = "Recompute demand statistics for the CoursePulse platform")]
#[command(version)]
struct Args {
    /// Comma-separated semesters (e.g. 2026A,2026C), or `all`.
    /// Defaults to the current semester.
    #[arg(short, long, env = "COURSEPULSE_SEMESTERS")]
    semesters: Option<String>,

    /// Database file path
    #[arg(short, long, env = "COURSEPULSE_DB")]
    database: Option<PathBuf>,

    /// Config file path (default: ./coursepulse.toml)
    #[arg(short, long, env = "COURSEPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Print a per-semester summary
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_stats=info,pulse_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = load_stats_config(args.config.as_deref()).context("Failed to load config")?;
    let db_path = resolve_database_path(
        args.database.as_deref(),
        "COURSEPULSE_DB",
        args.config.as_deref(),
    )
    .context("Failed to resolve database path")?;

    info!("Database: {}", db_path.display());
    let db = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let clock = Clock::system();
    let ctx = RecomputeContext::new(db, Arc::new(DemandCache::new(clock)), clock, config);

    let semesters = resolve_semesters(&ctx.db, args.semesters.as_deref())
        .await
        .context("Failed to resolve semesters")?;
    info!("Recomputing {} semester(s)", semesters.len());

    let summaries = recompute_demand_stats(&ctx, &semesters)
        .await
        .context("Recompute failed")?;

    if args.verbose {
        for summary in &summaries {
            println!(
                "{}{}: {} sections ({} eligible), {} changes, \
                 {} snapshots, {} estimates, {} percent-open rows, \
                 {} erroneous updates ({} in percent-open)",
                summary.semester,
                if summary.is_current { " [current]" } else { "" },
                summary.sections,
                summary.eligible_sections,
                summary.changes,
                summary.snapshots,
                summary.estimates,
                summary.percent_open_rows,
                summary.erroneous_updates,
                summary.percent_open_erroneous_updates,
            );
        }
    }

    info!("Recompute complete");
    Ok(())
}
