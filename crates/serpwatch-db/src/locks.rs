//! The `term_locks` distributed lock.
//!
//! One row per tracked term, with a TTL comfortably above the worker's
//! fetch timeout (300s vs 90s by default) so an expired lock never
//! coincides with a still-running worker under normal conditions.
//!
//! Acquisition is non-blocking and single-attempt: the worker either gets
//! the lock in one statement or exits. There is no queueing on the lock —
//! the scheduler's `in_flight` flag already prevents redundant dispatch, so
//! contention here means another execution is genuinely active.

use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Attempts to acquire the lock for `term_id` with the given TTL.
///
/// A single statement: inserts a fresh row, or takes over an existing row
/// only if it has expired. Returns `true` when this `holder` now owns the
/// lock.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn acquire_term_lock(
    pool: &PgPool,
    term_id: i64,
    holder: Uuid,
    ttl_secs: f64,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO term_locks (term_id, holder, acquired_at, expires_at) \
         VALUES ($1, $2, NOW(), NOW() + make_interval(secs => $3)) \
         ON CONFLICT (term_id) DO UPDATE \
             SET holder = EXCLUDED.holder, \
                 acquired_at = NOW(), \
                 expires_at = EXCLUDED.expires_at \
             WHERE term_locks.expires_at <= NOW()",
    )
    .bind(term_id)
    .bind(holder)
    .bind(ttl_secs)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Releases the lock, but only if `holder` still owns it. A lock taken over
/// after expiry must not be released by the previous (slow) holder.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn release_term_lock(pool: &PgPool, term_id: i64, holder: Uuid) -> Result<(), DbError> {
    sqlx::query("DELETE FROM term_locks WHERE term_id = $1 AND holder = $2")
        .bind(term_id)
        .bind(holder)
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns whether an unexpired lock exists for `term_id`. Used by the
/// watchdog so it never clears `in_flight` under a live worker.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn term_lock_is_live(pool: &PgPool, term_id: i64) -> Result<bool, DbError> {
    let live = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS( \
             SELECT 1 FROM term_locks WHERE term_id = $1 AND expires_at > NOW())",
    )
    .bind(term_id)
    .fetch_one(pool)
    .await?;

    Ok(live)
}
