//! Command handlers for the CLI.
//!
//! These are called from `main` after the database pool and config are
//! established.

use chrono::Utc;

/// Print a table of the most recently updated terms.
///
/// # Errors
///
/// Returns an error if the listing query fails.
pub(crate) async fn run_status(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let rows = serpwatch_db::list_terms_overview(pool, limit).await?;

    if rows.is_empty() {
        println!("no tracked terms");
        return Ok(());
    }

    println!(
        "{:>6}  {:<32} {:<8} {:<9} {:>5} {:<10} {:>6}  {}",
        "id", "term", "locale", "priority", "rank", "status", "delta", "last fetched"
    );
    for row in &rows {
        let rank = if row.current_rank == serpwatch_core::UNRANKED {
            "-".to_owned()
        } else {
            row.current_rank.to_string()
        };
        let fetched = row
            .last_fetched_at
            .map_or_else(|| "never".to_owned(), |at| at.to_rfc3339());
        let flight = if row.in_flight { " [in flight]" } else { "" };
        println!(
            "{:>6}  {:<32} {:<8} {:<9} {:>5} {:<10} {:>6}  {}{}",
            row.id,
            truncate(&row.term_text, 32),
            row.locale,
            row.priority,
            rank,
            row.rank_status,
            row.rank_delta,
            fetched,
            flight
        );
        if let Some(err) = &row.last_error {
            println!("        last error: {err}");
        }
    }

    Ok(())
}

/// Print a term's recent observations, newest first.
///
/// # Errors
///
/// Returns an error if the term does not exist or a query fails.
pub(crate) async fn run_history(
    pool: &sqlx::PgPool,
    term_id: i64,
    limit: i64,
) -> anyhow::Result<()> {
    let term = serpwatch_db::get_term(pool, term_id).await?;
    let rows = serpwatch_db::recent_observations(pool, term_id, limit).await?;

    println!("term {term_id} ('{}', {})", term.term_text, term.locale);
    if rows.is_empty() {
        println!("no observations recorded");
        return Ok(());
    }

    println!(
        "{:<12} {:>5} {:<10} {}",
        "observed", "rank", "placement", "artifact"
    );
    for row in &rows {
        let rank = if row.position == serpwatch_core::UNRANKED {
            "-".to_owned()
        } else {
            row.position.to_string()
        };
        let placement = if row.is_organic { "organic" } else { "sponsored" };
        println!(
            "{:<12} {:>5} {:<10} {}",
            row.observed_on, rank, placement, row.artifact_ref
        );
    }

    Ok(())
}

/// Force an immediate re-check of a term.
///
/// On acceptance the term is bumped to critical priority and made
/// immediately eligible, and today's observation (if any) is deleted so the
/// refetch can record a fresh one. A refusal means the per-term rate limit
/// is still in effect, or the term is archived or currently executing.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub(crate) async fn run_recheck(
    pool: &sqlx::PgPool,
    config: &serpwatch_core::AppConfig,
    term_id: i64,
) -> anyhow::Result<()> {
    // Fails with NotFound before touching anything if the id is bogus.
    let term = serpwatch_db::get_term(pool, term_id).await?;

    let min_interval = i32::try_from(config.recheck_min_interval_mins).unwrap_or(i32::MAX);
    let accepted = serpwatch_db::request_recheck(pool, term_id, min_interval).await?;
    if !accepted {
        println!(
            "recheck refused for term {term_id} ('{}'): rate-limited, archived, or in flight",
            term.term_text
        );
        return Ok(());
    }

    let today = Utc::now().date_naive();
    let deleted = serpwatch_db::delete_observation_for_day(pool, term_id, today).await?;
    if deleted > 0 {
        println!("deleted today's observation so the re-check can record a new one");
    }
    println!(
        "recheck queued for term {term_id} ('{}'); next scheduling pass will dispatch it",
        term.term_text
    );

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
