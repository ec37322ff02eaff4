//! Live integration tests for serpwatch-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/serpwatch-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use chrono::Utc;
use serpwatch_core::ImpactPolicy;
use serpwatch_db::{
    acquire_term_lock, clear_in_flight, clear_stale_in_flight, commit_observation,
    create_project, create_tracked_term, delete_observation_for_day, get_term,
    mark_fetch_failure, mark_fetch_success, observation_exists_for_day, recent_observations,
    release_term_lock, repair_null_schedules, request_recheck, select_eligible,
    term_lock_is_live, NewObservation,
};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_project(pool: &sqlx::PgPool, name: &str, active: bool) -> i64 {
    let project = create_project(pool, name, "example.com")
        .await
        .expect("create_project failed");
    if !active {
        sqlx::query("UPDATE projects SET active = FALSE WHERE id = $1")
            .bind(project.id)
            .execute(pool)
            .await
            .expect("deactivate project failed");
    }
    project.id
}

/// Insert a term that is immediately eligible with the given priority.
async fn insert_eligible_term(
    pool: &sqlx::PgPool,
    project_id: i64,
    term_text: &str,
    priority: &str,
) -> i64 {
    let term = create_tracked_term(pool, project_id, term_text, "us")
        .await
        .expect("create_tracked_term failed");
    sqlx::query(
        "UPDATE tracked_terms \
         SET priority = $1, last_fetched_at = NOW() - INTERVAL '2 days', \
             next_eligible_at = NOW() - INTERVAL '1 hour' \
         WHERE id = $2",
    )
    .bind(priority)
    .bind(term.id)
    .execute(pool)
    .await
    .expect("prime term failed");
    term.id
}

fn observation(term_id: i64, position: i32) -> NewObservation {
    NewObservation {
        tracked_term_id: term_id,
        position,
        is_organic: true,
        has_map_pack: false,
        has_video: false,
        has_image: false,
        artifact_ref: format!("example.com/test-term/{}.json", Utc::now().date_naive()),
        observed_on: Utc::now().date_naive(),
        rank_url: Some("https://example.com/page".to_owned()),
    }
}

// ---------------------------------------------------------------------------
// Eligibility selection
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn select_eligible_orders_by_priority(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let low = insert_eligible_term(&pool, project, "low term", "low").await;
    let critical = insert_eligible_term(&pool, project, "critical term", "critical").await;
    let normal = insert_eligible_term(&pool, project, "normal term", "normal").await;
    let high = insert_eligible_term(&pool, project, "high term", "high").await;

    let selected = select_eligible(&pool, 10).await.expect("select failed");
    let ids: Vec<i64> = selected.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![critical, high, normal, low]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn select_eligible_marks_in_flight_and_respects_cap(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    for i in 0..6 {
        insert_eligible_term(&pool, project, &format!("term {i}"), "normal").await;
    }

    let first = select_eligible(&pool, 5).await.expect("select failed");
    assert_eq!(first.len(), 5, "batch cap must bound the selection");

    // The five selected are now in-flight; only the sixth remains eligible.
    let second = select_eligible(&pool, 5).await.expect("select failed");
    assert_eq!(second.len(), 1);
    assert!(!first.iter().any(|t| t.id == second[0].id));

    let row = get_term(&pool, first[0].id).await.expect("get_term failed");
    assert!(row.in_flight);
}

#[sqlx::test(migrations = "../../migrations")]
async fn select_eligible_skips_inactive_projects_and_archived_terms(pool: sqlx::PgPool) {
    let inactive = insert_project(&pool, "dormant", false).await;
    insert_eligible_term(&pool, inactive, "hidden", "critical").await;

    let project = insert_project(&pool, "acme", true).await;
    let archived = insert_eligible_term(&pool, project, "archived term", "critical").await;
    sqlx::query("UPDATE tracked_terms SET archived = TRUE WHERE id = $1")
        .bind(archived)
        .execute(&pool)
        .await
        .expect("archive failed");

    let visible = insert_eligible_term(&pool, project, "visible", "normal").await;

    let selected = select_eligible(&pool, 10).await.expect("select failed");
    let ids: Vec<i64> = selected.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![visible]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn never_fetched_terms_are_eligible_and_cold(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    // A freshly created term: last_fetched_at and next_eligible_at both null.
    let term = create_tracked_term(&pool, project, "brand new", "us")
        .await
        .expect("create failed");

    let selected = select_eligible(&pool, 10).await.expect("select failed");
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id, term.id);
    assert!(selected[0].is_cold());
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_cold_term_waits_out_its_schedule(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let term = create_tracked_term(&pool, project, "brand new", "us")
        .await
        .expect("create failed");

    let selected = select_eligible(&pool, 10).await.expect("select failed");
    assert_eq!(selected.len(), 1);

    // First-ever fetch fails terminally; the term has never been fetched but
    // must still honor the pushed-out schedule instead of hot-looping.
    mark_fetch_failure(&pool, term.id, "upstream returned 500", 24)
        .await
        .expect("failure failed");
    clear_in_flight(&pool, term.id).await.expect("clear failed");

    let selected = select_eligible(&pool, 10).await.expect("select failed");
    assert!(selected.is_empty(), "failed cold term selected again immediately");

    // Once the schedule elapses it comes back, still cold.
    sqlx::query("UPDATE tracked_terms SET next_eligible_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(term.id)
        .execute(&pool)
        .await
        .expect("rewind failed");
    let selected = select_eligible(&pool, 10).await.expect("select failed");
    assert_eq!(selected.len(), 1);
    assert!(selected[0].is_cold());
}

// ---------------------------------------------------------------------------
// Fetch outcome bookkeeping
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn fetch_success_and_failure_update_counters(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "counted", "normal").await;

    mark_fetch_success(&pool, id, 24).await.expect("success failed");
    let row = get_term(&pool, id).await.expect("get failed");
    assert_eq!(row.success_count, 1);
    assert!(row.last_error.is_none());
    assert!(row.next_eligible_at.expect("schedule set") > Utc::now());

    mark_fetch_failure(&pool, id, "upstream returned 429", 24)
        .await
        .expect("failure failed");
    let row = get_term(&pool, id).await.expect("get failed");
    assert_eq!(row.failure_count, 1);
    assert_eq!(row.last_error.as_deref(), Some("upstream returned 429"));
}

// ---------------------------------------------------------------------------
// Observation commit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn commit_observation_applies_rank_transition(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "ranked", "normal").await;
    let policy = ImpactPolicy::default();

    // First observation: new at position 5.
    let fresh = commit_observation(&pool, &observation(id, 5), &policy)
        .await
        .expect("commit failed");
    assert!(fresh);

    let row = get_term(&pool, id).await.expect("get failed");
    assert_eq!(row.current_rank, 5);
    assert_eq!(row.rank_status, "new");
    assert_eq!(row.initial_rank, 5);
    assert_eq!(row.best_rank_ever, 5);
}

#[sqlx::test(migrations = "../../migrations")]
async fn commit_observation_is_idempotent_per_day(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "idempotent", "normal").await;
    let policy = ImpactPolicy::default();

    assert!(commit_observation(&pool, &observation(id, 5), &policy)
        .await
        .expect("first commit failed"));

    // Second same-day commit must not insert and must not touch the term.
    assert!(!commit_observation(&pool, &observation(id, 2), &policy)
        .await
        .expect("second commit failed"));

    let row = get_term(&pool, id).await.expect("get failed");
    assert_eq!(row.current_rank, 5, "same-day repeat must not change rank");

    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM rank_observations WHERE tracked_term_id = $1",
    )
    .bind(id)
    .fetch_one(&pool)
    .await
    .expect("count failed");
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn forced_recheck_can_replace_same_day_observation(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "forced", "normal").await;
    let policy = ImpactPolicy::default();
    let today = Utc::now().date_naive();

    commit_observation(&pool, &observation(id, 10), &policy)
        .await
        .expect("commit failed");
    assert!(observation_exists_for_day(&pool, id, today)
        .await
        .expect("exists failed"));

    let deleted = delete_observation_for_day(&pool, id, today)
        .await
        .expect("delete failed");
    assert_eq!(deleted, 1);

    // A fresh commit now lands and the transition runs against rank 10.
    assert!(commit_observation(&pool, &observation(id, 3), &policy)
        .await
        .expect("recommit failed"));
    let row = get_term(&pool, id).await.expect("get failed");
    assert_eq!(row.current_rank, 3);
    assert_eq!(row.rank_status, "up");
    assert_eq!(row.rank_delta, 7);
    assert!(row.best_rank_ever <= 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn recent_observations_lists_newest_first(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "history", "normal").await;
    let policy = ImpactPolicy::default();

    for (days_ago, position) in [(2_i64, 30), (1, 12), (0, 4)] {
        let mut obs = observation(id, position);
        obs.observed_on = Utc::now().date_naive() - chrono::Duration::days(days_ago);
        assert!(commit_observation(&pool, &obs, &policy)
            .await
            .expect("commit failed"));
    }

    let rows = recent_observations(&pool, id, 2).await.expect("history failed");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].position, 4);
    assert_eq!(rows[1].position, 12);
}

// ---------------------------------------------------------------------------
// Locks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn lock_is_exclusive_until_released(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "locked", "normal").await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    assert!(acquire_term_lock(&pool, id, first, 300.0)
        .await
        .expect("acquire failed"));
    assert!(!acquire_term_lock(&pool, id, second, 300.0)
        .await
        .expect("second acquire failed"));
    assert!(term_lock_is_live(&pool, id).await.expect("liveness failed"));

    release_term_lock(&pool, id, first).await.expect("release failed");
    assert!(acquire_term_lock(&pool, id, second, 300.0)
        .await
        .expect("reacquire failed"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn expired_lock_can_be_taken_over(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "expired", "normal").await;
    let stale = Uuid::new_v4();
    let fresh = Uuid::new_v4();

    // TTL already elapsed at insert time.
    assert!(acquire_term_lock(&pool, id, stale, -1.0)
        .await
        .expect("acquire failed"));
    assert!(!term_lock_is_live(&pool, id).await.expect("liveness failed"));

    assert!(acquire_term_lock(&pool, id, fresh, 300.0)
        .await
        .expect("takeover failed"));

    // The stale holder's release must not free the new holder's lock.
    release_term_lock(&pool, id, stale).await.expect("release failed");
    assert!(term_lock_is_live(&pool, id).await.expect("liveness failed"));
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn watchdog_clears_only_stale_in_flight(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let stale = insert_eligible_term(&pool, project, "stale", "normal").await;
    let recent = insert_eligible_term(&pool, project, "recent", "normal").await;

    sqlx::query(
        "UPDATE tracked_terms SET in_flight = TRUE, \
         updated_at = NOW() - INTERVAL '3 hours' WHERE id = $1",
    )
    .bind(stale)
    .execute(&pool)
    .await
    .expect("age failed");
    sqlx::query(
        "UPDATE tracked_terms SET in_flight = TRUE, \
         updated_at = NOW() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(recent)
    .execute(&pool)
    .await
    .expect("freshen failed");

    let cleared = clear_stale_in_flight(&pool, 120).await.expect("clear failed");
    assert_eq!(cleared, vec![stale]);

    assert!(!get_term(&pool, stale).await.expect("get failed").in_flight);
    assert!(get_term(&pool, recent).await.expect("get failed").in_flight);
}

#[sqlx::test(migrations = "../../migrations")]
async fn watchdog_respects_live_locks(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "held", "normal").await;

    sqlx::query(
        "UPDATE tracked_terms SET in_flight = TRUE, \
         updated_at = NOW() - INTERVAL '3 hours' WHERE id = $1",
    )
    .bind(id)
    .execute(&pool)
    .await
    .expect("age failed");
    assert!(acquire_term_lock(&pool, id, Uuid::new_v4(), 300.0)
        .await
        .expect("acquire failed"));

    let cleared = clear_stale_in_flight(&pool, 120).await.expect("clear failed");
    assert!(cleared.is_empty(), "a live lock must block the repair");
    assert!(get_term(&pool, id).await.expect("get failed").in_flight);
}

#[sqlx::test(migrations = "../../migrations")]
async fn watchdog_repairs_null_schedules(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "broken", "normal").await;
    sqlx::query("UPDATE tracked_terms SET next_eligible_at = NULL WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .expect("break failed");

    let repaired = repair_null_schedules(&pool).await.expect("repair failed");
    assert_eq!(repaired, 1);

    let row = get_term(&pool, id).await.expect("get failed");
    assert!(row.next_eligible_at.is_some());
}

// ---------------------------------------------------------------------------
// Forced re-check rate limit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn recheck_is_rate_limited_per_term(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "rechecked", "normal").await;

    assert!(request_recheck(&pool, id, 60).await.expect("recheck failed"));
    let row = get_term(&pool, id).await.expect("get failed");
    assert_eq!(row.priority, "critical");

    // Within the window the second request is refused.
    assert!(!request_recheck(&pool, id, 60).await.expect("recheck failed"));

    // Outside the window it is allowed again.
    sqlx::query(
        "UPDATE tracked_terms SET last_recheck_at = NOW() - INTERVAL '2 hours' WHERE id = $1",
    )
    .bind(id)
    .execute(&pool)
    .await
    .expect("age recheck failed");
    assert!(request_recheck(&pool, id, 60).await.expect("recheck failed"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn recheck_refused_while_in_flight(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "busy", "normal").await;
    sqlx::query("UPDATE tracked_terms SET in_flight = TRUE WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .expect("mark busy failed");

    assert!(!request_recheck(&pool, id, 60).await.expect("recheck failed"));
}

// ---------------------------------------------------------------------------
// Release guarantee plumbing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn clear_in_flight_is_safe_to_repeat(pool: sqlx::PgPool) {
    let project = insert_project(&pool, "acme", true).await;
    let id = insert_eligible_term(&pool, project, "released", "normal").await;
    sqlx::query("UPDATE tracked_terms SET in_flight = TRUE WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .expect("mark failed");

    clear_in_flight(&pool, id).await.expect("clear failed");
    // Second clear (e.g. worker and watchdog racing) is a no-op, not an error.
    clear_in_flight(&pool, id).await.expect("second clear failed");
    assert!(!get_term(&pool, id).await.expect("get failed").in_flight);
}
