//! Watchdog: recovers terms stranded by crashed or killed workers.
//!
//! Three repairs per pass, each independent and each safe to repeat:
//! stale `in_flight` flags are cleared (never under a live lock), null
//! schedules are backfilled, and a bounded slice of the most overdue
//! backlog is redispatched.

use serpwatch_core::AppConfig;
use sqlx::PgPool;

use crate::dispatch::Dispatcher;
use crate::scheduler;

pub async fn run_watchdog_pass(pool: &PgPool, config: &AppConfig, dispatcher: &Dispatcher) {
    let stale_mins = i32::try_from(config.stale_in_flight_mins).unwrap_or(i32::MAX);
    match serpwatch_db::clear_stale_in_flight(pool, stale_mins).await {
        Ok(ids) if !ids.is_empty() => {
            tracing::warn!(
                count = ids.len(),
                term_ids = ?ids,
                "watchdog: cleared stale in-flight flags"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "watchdog: stale in-flight sweep failed");
        }
    }

    match serpwatch_db::repair_null_schedules(pool).await {
        Ok(n) if n > 0 => {
            tracing::warn!(count = n, "watchdog: repaired null next_eligible_at values");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "watchdog: schedule repair failed");
        }
    }

    redispatch_overdue(pool, config, dispatcher).await;
}

/// Drains a bounded slice of the most overdue backlog, so recovery does not
/// wait for the next full scheduling pass.
async fn redispatch_overdue(pool: &PgPool, config: &AppConfig, dispatcher: &Dispatcher) {
    let terms =
        match serpwatch_db::select_most_overdue(pool, config.watchdog_redispatch_limit).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "watchdog: overdue selection failed");
                return;
            }
        };

    if terms.is_empty() {
        return;
    }

    tracing::info!(count = terms.len(), "watchdog: redispatching overdue terms");
    for term in &terms {
        scheduler::dispatch_or_release(pool, dispatcher, term).await;
    }
}
