//! Integration tests for the demand recompute engine
//!
//! Each test seeds a fresh on-disk SQLite database through the engine's own
//! schema init, runs the real recompute, and asserts over the output tables.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pulse_common::cache::{DemandCache, CURRENT_DEMAND_DISTRIBUTION_ESTIMATE, CURRENT_DEMAND_EXTREMA};
use pulse_common::config::StatsConfig;
use pulse_common::db::{
    init_database, set_option, DemandDistributionEstimate, DemandExtremaSnapshot,
    SectionPercentOpen, SEMESTER_KEY,
};
use pulse_common::{Clock, Error, Semester};
use pulse_stats::recompute::{recompute_demand_stats, recompute_semester, resolve_semesters};
use pulse_stats::{section_demand_change, RecomputeContext};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

const SEMESTER: &str = "2026C";

fn period_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 25, 0, 0, 0).unwrap()
}

fn t(secs: i64) -> DateTime<Utc> {
    // Inside the seeded add/drop period
    period_start() + Duration::days(1) + Duration::seconds(secs)
}

/// Test helper: fresh database + context with a frozen clock inside the
/// add/drop period
async fn setup() -> (TempDir, RecomputeContext) {
    let dir = tempfile::tempdir().unwrap();
    let db = init_database(&dir.path().join("pulse.db")).await.unwrap();

    sqlx::query(
        "INSERT INTO add_drop_periods (semester, estimated_start, estimated_end) VALUES (?, ?, ?)",
    )
    .bind(SEMESTER)
    .bind(period_start())
    .bind(period_start() + Duration::days(20))
    .execute(&db)
    .await
    .unwrap();

    let clock = Clock::fixed(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    let ctx = RecomputeContext::new(
        db,
        Arc::new(DemandCache::new(clock)),
        clock,
        StatsConfig::default(),
    );
    (dir, ctx)
}

async fn insert_section(db: &SqlitePool, code: &str, capacity: Option<i64>) -> i64 {
    sqlx::query("INSERT INTO sections (code, semester, capacity, status) VALUES (?, ?, ?, 'O')")
        .bind(code)
        .bind(SEMESTER)
        .bind(capacity)
        .execute(db)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn insert_registration(
    db: &SqlitePool,
    section_id: i64,
    created_at: DateTime<Utc>,
    deactivated_at: Option<DateTime<Utc>>,
) {
    sqlx::query(
        "INSERT INTO registrations (section_id, created_at, notification_sent_at) VALUES (?, ?, ?)",
    )
    .bind(section_id)
    .bind(created_at)
    .bind(deactivated_at)
    .execute(db)
    .await
    .unwrap();
}

async fn insert_status_update(
    db: &SqlitePool,
    section_id: i64,
    at: DateTime<Utc>,
    old: &str,
    new: &str,
) {
    sqlx::query(
        "INSERT INTO status_updates (section_id, old_status, new_status, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(section_id)
    .bind(old)
    .bind(new)
    .bind(at)
    .execute(db)
    .await
    .unwrap();
}

async fn fetch_snapshots(db: &SqlitePool) -> Vec<DemandExtremaSnapshot> {
    sqlx::query_as(
        "SELECT * FROM demand_extrema WHERE semester = ? ORDER BY created_at, guid",
    )
    .bind(SEMESTER)
    .fetch_all(db)
    .await
    .unwrap()
}

async fn fetch_estimates(db: &SqlitePool) -> Vec<DemandDistributionEstimate> {
    sqlx::query_as(
        "SELECT * FROM demand_distribution_estimates WHERE semester = ? ORDER BY created_at, guid",
    )
    .bind(SEMESTER)
    .fetch_all(db)
    .await
    .unwrap()
}

fn semester() -> Semester {
    Semester::parse(SEMESTER).unwrap()
}

#[tokio::test]
async fn test_two_section_scenario() {
    let (_dir, ctx) = setup().await;
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    let b = insert_section(&ctx.db, "CIS-1200-002", Some(5)).await;

    // A: volumes 1,2,3 at t=0,1,2; B: volume 1 at t=1.5
    insert_registration(&ctx.db, a, t(0), None).await;
    insert_registration(&ctx.db, a, t(1000), None).await;
    insert_registration(&ctx.db, a, t(2000), None).await;
    insert_registration(&ctx.db, b, t(1500), None).await;

    let summary = recompute_semester(&ctx, &semester()).await.unwrap();
    assert_eq!(summary.eligible_sections, 2);
    assert_eq!(summary.changes, 4);

    let snapshots = fetch_snapshots(&ctx.db).await;
    let last = snapshots.last().unwrap();
    assert_eq!(last.created_at, t(2000));
    assert_eq!(last.most_popular_section_id, a);
    assert_eq!(last.most_popular_volume, 3);
    assert_eq!(last.least_popular_section_id, b);
    assert_eq!(last.least_popular_volume, 1);
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let (_dir, ctx) = setup().await;
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    let b = insert_section(&ctx.db, "MATH-1400-001", Some(5)).await;
    insert_registration(&ctx.db, a, t(0), Some(t(5000))).await;
    insert_registration(&ctx.db, a, t(1000), None).await;
    insert_registration(&ctx.db, b, t(2000), None).await;
    insert_status_update(&ctx.db, a, t(1500), "O", "C").await;

    recompute_semester(&ctx, &semester()).await.unwrap();
    let first_snapshots = fetch_snapshots(&ctx.db).await;
    let first_estimates = fetch_estimates(&ctx.db).await;
    assert!(!first_snapshots.is_empty());

    recompute_semester(&ctx, &semester()).await.unwrap();
    assert_eq!(fetch_snapshots(&ctx.db).await, first_snapshots);
    assert_eq!(fetch_estimates(&ctx.db).await, first_estimates);
}

#[tokio::test]
async fn test_snapshot_timestamps_monotonic() {
    let (_dir, ctx) = setup().await;
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    let b = insert_section(&ctx.db, "CIS-1200-002", Some(5)).await;
    for i in 0..6 {
        let section = if i % 2 == 0 { a } else { b };
        let deactivated = (i == 4).then(|| t(9000));
        insert_registration(&ctx.db, section, t(i * 1000), deactivated).await;
    }

    recompute_semester(&ctx, &semester()).await.unwrap();
    let times: Vec<_> = fetch_snapshots(&ctx.db)
        .await
        .iter()
        .map(|s| s.created_at)
        .collect();
    let mut sorted = times.clone();
    sorted.sort();
    assert_eq!(times, sorted);
}

#[tokio::test]
async fn test_no_eligible_sections_produces_no_snapshots() {
    let (_dir, ctx) = setup().await;
    let a = insert_section(&ctx.db, "CIS-1200-001", None).await;
    let b = insert_section(&ctx.db, "CIS-1200-002", Some(0)).await;
    insert_registration(&ctx.db, a, t(0), None).await;
    insert_status_update(&ctx.db, b, t(100), "O", "C").await;

    let summary = recompute_semester(&ctx, &semester()).await.unwrap();
    assert_eq!(summary.eligible_sections, 0);
    assert_eq!(summary.snapshots, 0);
    assert!(fetch_snapshots(&ctx.db).await.is_empty());

    // Capacity-less sections still get percent-open rows
    let rows: Vec<SectionPercentOpen> =
        sqlx::query_as("SELECT * FROM section_percent_open WHERE semester = ? ORDER BY section_id")
            .bind(SEMESTER)
            .fetch_all(&ctx.db)
            .await
            .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_erroneous_status_update_is_counted() {
    let (_dir, ctx) = setup().await;
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    insert_registration(&ctx.db, a, t(0), None).await;
    // Initial status comes from this update's old_status: Open
    insert_status_update(&ctx.db, a, t(100), "O", "C").await;
    // Tracked status is now Closed; claiming Open again is erroneous
    insert_status_update(&ctx.db, a, t(200), "O", "C").await;

    let summary = recompute_semester(&ctx, &semester()).await.unwrap();
    assert_eq!(summary.erroneous_updates, 1);
    assert_eq!(summary.percent_open_erroneous_updates, 1);
}

#[tokio::test]
async fn test_fit_null_safety_with_zero_demand() {
    let (_dir, ctx) = setup().await;
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    // Mark the section closed before any volume arrives, then let its one
    // registration deactivate: final closed demand is exactly zero
    insert_status_update(&ctx.db, a, t(0), "O", "C").await;
    insert_registration(&ctx.db, a, t(100), Some(t(200))).await;

    recompute_semester(&ctx, &semester()).await.unwrap();
    let estimates = fetch_estimates(&ctx.db).await;
    let last = estimates.last().unwrap();
    assert_eq!(last.frac_zero_demand, Some(1.0));
    assert_eq!(last.lognorm_shape, None);
    assert_eq!(last.lognorm_loc, None);
    assert_eq!(last.lognorm_scale, None);
    assert_eq!(last.mean_log_likelihood, None);
}

#[tokio::test]
async fn test_simultaneous_status_sorts_before_volume() {
    let (_dir, ctx) = setup().await;
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    // Status close and first registration share one timestamp: the close
    // applies first, so the volume lands on an already-closed section and
    // the estimate records positive closed demand
    insert_status_update(&ctx.db, a, t(0), "O", "C").await;
    insert_registration(&ctx.db, a, t(0), None).await;

    recompute_semester(&ctx, &semester()).await.unwrap();
    let estimates = fetch_estimates(&ctx.db).await;
    let last = estimates.last().unwrap();
    assert_eq!(last.highest_demand_section_id, a);
    assert_eq!(last.highest_demand_section_volume, 1);
    assert_eq!(last.frac_zero_demand, Some(0.0));
}

#[tokio::test]
async fn test_invalid_semester_is_rejected_before_any_work() {
    let (_dir, ctx) = setup().await;
    let err = resolve_semesters(&ctx.db, Some("2026C,garbage")).await.unwrap_err();
    match err {
        Error::InvalidSemester(s) => assert_eq!(s, "garbage"),
        other => panic!("expected InvalidSemester, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolve_all_semesters() {
    let (_dir, ctx) = setup().await;
    insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    let semesters = resolve_semesters(&ctx.db, Some("all")).await.unwrap();
    assert_eq!(semesters, vec![semester()]);
}

#[tokio::test]
async fn test_current_semester_populates_cache() {
    let (_dir, ctx) = setup().await;
    set_option(&ctx.db, SEMESTER_KEY, SEMESTER).await.unwrap();
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    insert_registration(&ctx.db, a, t(0), None).await;
    insert_status_update(&ctx.db, a, t(100), "O", "C").await;

    let summary = recompute_semester(&ctx, &semester()).await.unwrap();
    assert!(summary.is_current);

    let cached = ctx.cache.get(CURRENT_DEMAND_EXTREMA).unwrap();
    assert_eq!(cached["semester"], SEMESTER);
    assert_eq!(cached["most_popular_volume"], 1);
    assert!(ctx.cache.get(CURRENT_DEMAND_DISTRIBUTION_ESTIMATE).is_some());
}

#[tokio::test]
async fn test_past_semester_leaves_cache_alone() {
    let (_dir, ctx) = setup().await;
    // Current semester is a different one
    set_option(&ctx.db, SEMESTER_KEY, "2027A").await.unwrap();
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    insert_registration(&ctx.db, a, t(0), None).await;

    let summary = recompute_semester(&ctx, &semester()).await.unwrap();
    assert!(!summary.is_current);
    assert!(ctx.cache.get(CURRENT_DEMAND_EXTREMA).is_none());
}

#[tokio::test]
async fn test_rerun_replaces_rows_instead_of_appending() {
    let (_dir, ctx) = setup().await;
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    insert_registration(&ctx.db, a, t(0), None).await;

    recompute_demand_stats(&ctx, &[semester()]).await.unwrap();
    let first = fetch_snapshots(&ctx.db).await.len();
    recompute_demand_stats(&ctx, &[semester()]).await.unwrap();
    assert_eq!(fetch_snapshots(&ctx.db).await.len(), first);
}

#[tokio::test]
async fn test_percent_open_rows_reflect_history() {
    let (_dir, ctx) = setup().await;
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    // Closed from day 1 after period start; clock sits at day 7.5 of the
    // period, so roughly 1/7.5 of the elapsed window was open
    insert_status_update(&ctx.db, a, period_start() + Duration::days(1), "O", "C").await;
    set_option(&ctx.db, SEMESTER_KEY, SEMESTER).await.unwrap();

    recompute_semester(&ctx, &semester()).await.unwrap();
    let row: SectionPercentOpen =
        sqlx::query_as("SELECT * FROM section_percent_open WHERE section_id = ?")
            .bind(a)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert!(row.percent_open > 0.1 && row.percent_open < 0.2);
}

#[tokio::test]
async fn test_section_demand_change_ignores_other_semesters() {
    let (_dir, ctx) = setup().await;
    set_option(&ctx.db, SEMESTER_KEY, "2027A").await.unwrap();

    let outcome = section_demand_change(&ctx, semester(), "CIS-1200-001", t(0))
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert!(fetch_snapshots(&ctx.db).await.is_empty());
}

#[tokio::test]
async fn test_section_demand_change_recomputes_current() {
    let (_dir, ctx) = setup().await;
    set_option(&ctx.db, SEMESTER_KEY, SEMESTER).await.unwrap();
    let a = insert_section(&ctx.db, "CIS-1200-001", Some(10)).await;
    insert_registration(&ctx.db, a, t(0), None).await;

    let outcome = section_demand_change(&ctx, semester(), "CIS-1200-001", t(0))
        .await
        .unwrap();
    let summary = outcome.expect("current semester must be recomputed");
    assert_eq!(summary.snapshots, 1);

    // Redelivery with the same payload changes nothing
    let before = fetch_snapshots(&ctx.db).await;
    section_demand_change(&ctx, semester(), "CIS-1200-001", t(0))
        .await
        .unwrap();
    assert_eq!(fetch_snapshots(&ctx.db).await, before);
}
