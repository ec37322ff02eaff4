//! Database operations for `rank_observations`.
//!
//! An observation is an immutable fact: inserted once, never updated. The
//! `(tracked_term_id, observed_on)` unique constraint is the idempotency
//! anchor for the whole pipeline — a repeated same-day extraction inserts
//! nothing and leaves the term's ranking fields alone.

use chrono::{DateTime, NaiveDate, Utc};
use serpwatch_core::{ImpactPolicy, RankTransition};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `rank_observations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RankObservationRow {
    pub id: i64,
    pub tracked_term_id: i64,
    pub position: i32,
    pub is_organic: bool,
    pub has_map_pack: bool,
    pub has_video: bool,
    pub has_image: bool,
    pub artifact_ref: String,
    pub observed_on: NaiveDate,
    pub observed_at: DateTime<Utc>,
}

/// Input for [`commit_observation`].
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub tracked_term_id: i64,
    pub position: i32,
    pub is_organic: bool,
    pub has_map_pack: bool,
    pub has_video: bool,
    pub has_image: bool,
    pub artifact_ref: String,
    pub observed_on: NaiveDate,
    /// URL of the matched result, if any.
    pub rank_url: Option<String>,
}

/// Inserts the observation and applies the rank-field transition to the
/// owning term, as one transaction.
///
/// Returns `true` if the observation was new. If an observation already
/// exists for `(tracked_term_id, observed_on)` nothing is written at all —
/// the conflicting insert is a no-op and the term row is left untouched, so
/// ranking fields are only ever written by the observation that owns the day.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the term does not exist, or
/// [`DbError::Sqlx`] on any query failure; the transaction rolls back and
/// neither write survives.
pub async fn commit_observation(
    pool: &PgPool,
    new: &NewObservation,
    policy: &ImpactPolicy,
) -> Result<bool, DbError> {
    let mut tx = pool.begin().await?;

    // Lock the term row for the transition read-modify-write. The worker's
    // term lock already serializes this in practice; the row lock makes the
    // transaction safe on its own.
    let prior = sqlx::query_as::<_, (i32, i32)>(
        "SELECT current_rank, best_rank_ever FROM tracked_terms WHERE id = $1 FOR UPDATE",
    )
    .bind(new.tracked_term_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DbError::NotFound)?;
    let (prior_rank, prior_best) = prior;

    let inserted = sqlx::query(
        "INSERT INTO rank_observations \
             (tracked_term_id, \"position\", is_organic, has_map_pack, \
              has_video, has_image, artifact_ref, observed_on) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (tracked_term_id, observed_on) DO NOTHING",
    )
    .bind(new.tracked_term_id)
    .bind(new.position)
    .bind(new.is_organic)
    .bind(new.has_map_pack)
    .bind(new.has_video)
    .bind(new.has_image)
    .bind(&new.artifact_ref)
    .bind(new.observed_on)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        tx.commit().await?;
        return Ok(false);
    }

    let transition = RankTransition::compute(prior_rank, prior_best, new.position);
    let impact = policy.classify(prior_rank, new.position, transition.rank_delta);

    sqlx::query(
        "UPDATE tracked_terms \
         SET current_rank = $1, \
             rank_status = $2, \
             rank_delta = $3, \
             initial_rank = COALESCE($4, initial_rank), \
             best_rank_ever = $5, \
             impact = $6, \
             rank_url = $7, \
             updated_at = NOW() \
         WHERE id = $8",
    )
    .bind(new.position)
    .bind(transition.status.as_str())
    .bind(transition.rank_delta)
    .bind(transition.initial_rank)
    .bind(transition.best_rank_ever)
    .bind(impact.as_str())
    .bind(&new.rank_url)
    .bind(new.tracked_term_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Returns whether an observation already exists for the term on `day`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn observation_exists_for_day(
    pool: &PgPool,
    tracked_term_id: i64,
    day: NaiveDate,
) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS( \
             SELECT 1 FROM rank_observations \
             WHERE tracked_term_id = $1 AND observed_on = $2)",
    )
    .bind(tracked_term_id)
    .bind(day)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Deletes the term's observation for `day`, if any. Used only by the
/// forced re-check path so the refetch is not short-circuited by the
/// same-day idempotency rule.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_observation_for_day(
    pool: &PgPool,
    tracked_term_id: i64,
    day: NaiveDate,
) -> Result<u64, DbError> {
    let result =
        sqlx::query("DELETE FROM rank_observations WHERE tracked_term_id = $1 AND observed_on = $2")
            .bind(tracked_term_id)
            .bind(day)
            .execute(pool)
            .await?;

    Ok(result.rows_affected())
}

/// Returns the most recent `limit` observations for a term, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn recent_observations(
    pool: &PgPool,
    tracked_term_id: i64,
    limit: i64,
) -> Result<Vec<RankObservationRow>, DbError> {
    let rows = sqlx::query_as::<_, RankObservationRow>(
        "SELECT id, tracked_term_id, \"position\", is_organic, has_map_pack, \
                has_video, has_image, artifact_ref, observed_on, observed_at \
         FROM rank_observations \
         WHERE tracked_term_id = $1 \
         ORDER BY observed_on DESC, id DESC \
         LIMIT $2",
    )
    .bind(tracked_term_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
