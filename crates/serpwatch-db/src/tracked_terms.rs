//! Database operations for `tracked_terms`.
//!
//! The scheduling mutations here are deliberately narrow: `select_eligible`
//! is the only code that sets `in_flight`, and [`clear_in_flight`] is the
//! only code that clears it outside the watchdog. Ranking fields are never
//! written here — they change only through
//! [`crate::observations::commit_observation`].

use chrono::{DateTime, Utc};
use serpwatch_core::Priority;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Maximum length of `last_error` in characters.
const MAX_ERROR_LEN: usize = 255;

/// A row from the `tracked_terms` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackedTermRow {
    pub id: i64,
    pub public_id: Uuid,
    pub project_id: i64,
    pub term_text: String,
    pub locale: String,
    pub archived: bool,
    pub priority: String,
    pub in_flight: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub next_eligible_at: Option<DateTime<Utc>>,
    pub last_recheck_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub success_count: i32,
    pub failure_count: i32,
    pub current_rank: i32,
    pub rank_status: String,
    pub rank_delta: i32,
    pub initial_rank: i32,
    pub best_rank_ever: i32,
    pub impact: String,
    pub rank_url: Option<String>,
    pub stored_artifact_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const TERM_COLUMNS: &str = "id, public_id, project_id, term_text, locale, archived, priority, \
     in_flight, last_fetched_at, next_eligible_at, last_recheck_at, last_error, \
     success_count, failure_count, current_rank, rank_status, rank_delta, \
     initial_rank, best_rank_ever, impact, rank_url, stored_artifact_paths, \
     created_at, updated_at";

/// A term selected for dispatch by a scheduling pass.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EligibleTerm {
    pub id: i64,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub priority: String,
}

impl EligibleTerm {
    /// Never-fetched terms are routed to the high-priority lane.
    #[must_use]
    pub fn is_cold(&self) -> bool {
        self.last_fetched_at.is_none()
    }
}

/// Condensed view for status listings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TermOverviewRow {
    pub id: i64,
    pub term_text: String,
    pub locale: String,
    pub priority: String,
    pub in_flight: bool,
    pub current_rank: i32,
    pub rank_status: String,
    pub rank_delta: i32,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Creates a tracked term under a project and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a duplicate
/// `(project_id, term_text, locale)`).
pub async fn create_tracked_term(
    pool: &PgPool,
    project_id: i64,
    term_text: &str,
    locale: &str,
) -> Result<TrackedTermRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, TrackedTermRow>(&format!(
        "INSERT INTO tracked_terms (public_id, project_id, term_text, locale) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {TERM_COLUMNS}"
    ))
    .bind(public_id)
    .bind(project_id)
    .bind(term_text)
    .bind(locale)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a single term by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_term(pool: &PgPool, id: i64) -> Result<TrackedTermRow, DbError> {
    let row = sqlx::query_as::<_, TrackedTermRow>(&format!(
        "SELECT {TERM_COLUMNS} FROM tracked_terms WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

// A NULL `next_eligible_at` means nothing has ever scheduled the term (a
// fresh insert), which makes it immediately eligible. Once any outcome
// stamps a schedule, including a failed first fetch, the term waits it out.
const ELIGIBILITY_PREDICATE: &str = "t.archived = FALSE \
     AND p.active = TRUE \
     AND t.in_flight = FALSE \
     AND (t.next_eligible_at IS NULL OR t.next_eligible_at <= NOW())";

/// `ORDER BY` key derived from [`Priority::rank`]. Unknown strings sort with
/// `normal`, matching [`Priority::parse`].
fn priority_order_sql() -> String {
    let arms: Vec<String> = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ]
    .iter()
    .map(|p| format!("WHEN '{}' THEN {}", p.as_str(), p.rank()))
    .collect();
    format!(
        "CASE t.priority {} ELSE {} END",
        arms.join(" "),
        Priority::Normal.rank()
    )
}

/// Selects up to `limit` eligible terms and marks them in-flight, in one
/// transaction.
///
/// Ordering: priority (critical first), then `next_eligible_at` ascending,
/// then `last_fetched_at` ascending so starved terms surface first. The
/// `FOR UPDATE SKIP LOCKED` clause lets concurrent passes interleave without
/// selecting the same rows; the `in_flight = TRUE` flip in the same
/// transaction keeps the next pass (and the watchdog) from double-dispatching
/// before a worker acquires its lock.
///
/// Returned order is the dispatch order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the selection or the flag update fails; on
/// error nothing is marked in-flight.
pub async fn select_eligible(pool: &PgPool, limit: i64) -> Result<Vec<EligibleTerm>, DbError> {
    let mut tx = pool.begin().await?;

    let priority_order = priority_order_sql();
    let terms = sqlx::query_as::<_, EligibleTerm>(&format!(
        "SELECT t.id, t.last_fetched_at, t.priority \
         FROM tracked_terms t \
         JOIN projects p ON p.id = t.project_id \
         WHERE {ELIGIBILITY_PREDICATE} \
         ORDER BY {priority_order}, \
             t.next_eligible_at ASC NULLS FIRST, \
             t.last_fetched_at ASC NULLS FIRST \
         LIMIT $1 \
         FOR UPDATE OF t SKIP LOCKED"
    ))
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    if terms.is_empty() {
        tx.commit().await?;
        return Ok(terms);
    }

    let ids: Vec<i64> = terms.iter().map(|t| t.id).collect();
    sqlx::query("UPDATE tracked_terms SET in_flight = TRUE, updated_at = NOW() WHERE id = ANY($1)")
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(terms)
}

/// Like [`select_eligible`] but ordered purely by how overdue the term is.
/// Used by the watchdog's bounded backlog drain.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the selection or the flag update fails.
pub async fn select_most_overdue(pool: &PgPool, limit: i64) -> Result<Vec<EligibleTerm>, DbError> {
    let mut tx = pool.begin().await?;

    let terms = sqlx::query_as::<_, EligibleTerm>(&format!(
        "SELECT t.id, t.last_fetched_at, t.priority \
         FROM tracked_terms t \
         JOIN projects p ON p.id = t.project_id \
         WHERE {ELIGIBILITY_PREDICATE} \
         ORDER BY t.next_eligible_at ASC NULLS FIRST \
         LIMIT $1 \
         FOR UPDATE OF t SKIP LOCKED"
    ))
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    if terms.is_empty() {
        tx.commit().await?;
        return Ok(terms);
    }

    let ids: Vec<i64> = terms.iter().map(|t| t.id).collect();
    sqlx::query("UPDATE tracked_terms SET in_flight = TRUE, updated_at = NOW() WHERE id = ANY($1)")
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(terms)
}

/// Records a successful fetch: bumps `success_count`, stamps
/// `last_fetched_at`, clears `last_error`, and schedules the next fetch
/// `interval_hours` out. Does not touch `in_flight` — release is a separate,
/// unconditional step.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the term does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_fetch_success(
    pool: &PgPool,
    id: i64,
    interval_hours: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE tracked_terms \
         SET success_count = success_count + 1, \
             last_fetched_at = NOW(), \
             next_eligible_at = NOW() + make_interval(hours => $1), \
             last_error = NULL, \
             updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(interval_hours)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Records a failed fetch: bumps `failure_count`, stores the (truncated)
/// error, and schedules the next attempt `interval_hours` out so a broken
/// term cannot hot-loop.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the term does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_fetch_failure(
    pool: &PgPool,
    id: i64,
    error: &str,
    interval_hours: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE tracked_terms \
         SET failure_count = failure_count + 1, \
             last_error = $1, \
             next_eligible_at = NOW() + make_interval(hours => $2), \
             updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(truncate_error(error))
    .bind(interval_hours)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Clears `in_flight`. Runs on every worker exit path.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails. A zero-row update is not
/// an error: the watchdog may have cleared the flag already.
pub async fn clear_in_flight(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE tracked_terms SET in_flight = FALSE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Swaps in the rotated raw-artifact path list (newest last).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn replace_artifact_paths(
    pool: &PgPool,
    id: i64,
    paths: &[String],
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE tracked_terms SET stored_artifact_paths = $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(paths)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Requests a forced re-check: bumps the term to critical priority and makes
/// it immediately eligible, at most once per `min_interval_mins` per term.
///
/// Returns `false` when the rate limit refuses the request (or the term is
/// archived / already in flight).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn request_recheck(
    pool: &PgPool,
    id: i64,
    min_interval_mins: i32,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE tracked_terms \
         SET priority = $1, \
             next_eligible_at = NOW(), \
             last_recheck_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $2 \
           AND archived = FALSE \
           AND in_flight = FALSE \
           AND (last_recheck_at IS NULL \
                OR last_recheck_at <= NOW() - make_interval(mins => $3))",
    )
    .bind(Priority::Critical.as_str())
    .bind(id)
    .bind(min_interval_mins)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Returns the most recently updated terms for status listings.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_terms_overview(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<TermOverviewRow>, DbError> {
    let rows = sqlx::query_as::<_, TermOverviewRow>(
        "SELECT id, term_text, locale, priority, in_flight, current_rank, \
                rank_status, rank_delta, last_fetched_at, last_error \
         FROM tracked_terms \
         WHERE archived = FALSE \
         ORDER BY updated_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Caps an error message at [`MAX_ERROR_LEN`] characters, respecting char
/// boundaries.
#[must_use]
pub fn truncate_error(error: &str) -> String {
    if error.chars().count() <= MAX_ERROR_LEN {
        return error.to_owned();
    }
    error.chars().take(MAX_ERROR_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_error_keeps_short_messages() {
        assert_eq!(truncate_error("connection refused"), "connection refused");
    }

    #[test]
    fn truncate_error_caps_at_255_chars() {
        let long = "x".repeat(400);
        assert_eq!(truncate_error(&long).chars().count(), 255);
    }

    #[test]
    fn truncate_error_respects_multibyte_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.chars().count(), 255);
        assert!(truncated.chars().all(|c| c == 'é'));
    }

    #[test]
    fn priority_order_sql_follows_dispatch_ranking() {
        assert_eq!(
            priority_order_sql(),
            "CASE t.priority WHEN 'critical' THEN 0 WHEN 'high' THEN 1 \
             WHEN 'normal' THEN 2 WHEN 'low' THEN 3 ELSE 2 END"
        );
    }

    #[test]
    fn cold_term_detection() {
        let cold = EligibleTerm {
            id: 1,
            last_fetched_at: None,
            priority: "normal".to_owned(),
        };
        assert!(cold.is_cold());

        let warm = EligibleTerm {
            id: 2,
            last_fetched_at: Some(chrono::Utc::now()),
            priority: "normal".to_owned(),
        };
        assert!(!warm.is_cold());
    }
}
