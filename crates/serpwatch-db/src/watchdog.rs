//! Repair queries for the watchdog job.

use sqlx::PgPool;

use crate::DbError;

/// Clears `in_flight` on terms whose last update is older than
/// `stale_mins`, skipping any term that still holds an unexpired lock.
///
/// This is the sole mechanism that guarantees forward progress after a
/// worker crash, process kill, or orphaned lock. The staleness window is
/// configured well above the lock TTL, so the lock-liveness guard is a
/// second line of defense rather than the only one.
///
/// Returns the ids that were cleared.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn clear_stale_in_flight(pool: &PgPool, stale_mins: i32) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "UPDATE tracked_terms t \
         SET in_flight = FALSE, updated_at = NOW() \
         WHERE t.in_flight = TRUE \
           AND t.updated_at <= NOW() - make_interval(mins => $1) \
           AND NOT EXISTS ( \
               SELECT 1 FROM term_locks l \
               WHERE l.term_id = t.id AND l.expires_at > NOW()) \
         RETURNING t.id",
    )
    .bind(stale_mins)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Sets `next_eligible_at = NOW()` on fetched terms where it is null.
///
/// Should not occur under correct scheduler behavior; kept as a data-quality
/// backstop so such terms do not fall out of the eligibility predicate
/// forever.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn repair_null_schedules(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE tracked_terms \
         SET next_eligible_at = NOW(), updated_at = NOW() \
         WHERE archived = FALSE \
           AND last_fetched_at IS NOT NULL \
           AND next_eligible_at IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
