//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at startup and registers the recurring
//! eligibility-scan and watchdog jobs.

use std::sync::Arc;

use serpwatch_core::AppConfig;
use serpwatch_db::EligibleTerm;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::dispatch::Dispatcher;
use crate::watchdog;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    dispatcher: Arc<Dispatcher>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_scan_job(
        &scheduler,
        pool.clone(),
        Arc::clone(&config),
        Arc::clone(&dispatcher),
    )
    .await?;
    register_watchdog_job(&scheduler, pool, config, dispatcher).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Registers the recurring eligibility scan on `scheduler_cron`.
async fn register_scan_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let cron = config.scheduler_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let dispatcher = Arc::clone(&dispatcher);

        Box::pin(async move {
            run_scan_pass(&pool, &config, &dispatcher).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Registers the watchdog on `watchdog_cron`.
async fn register_watchdog_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let cron = config.watchdog_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let dispatcher = Arc::clone(&dispatcher);

        Box::pin(async move {
            watchdog::run_watchdog_pass(&pool, &config, &dispatcher).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// One eligibility scan: select up to `batch_cap` terms (marked in-flight
/// by the selection itself) and hand them to the lanes.
async fn run_scan_pass(pool: &PgPool, config: &AppConfig, dispatcher: &Dispatcher) {
    let terms = match serpwatch_db::select_eligible(pool, config.batch_cap).await {
        Ok(t) => t,
        Err(e) => {
            // Nothing was marked in-flight, so this pass simply yields to
            // the next one.
            tracing::error!(error = %e, "scheduler: eligibility scan failed");
            return;
        }
    };

    if terms.is_empty() {
        tracing::debug!("scheduler: no eligible terms");
        return;
    }

    tracing::info!(count = terms.len(), "scheduler: dispatching eligible terms");
    for term in &terms {
        dispatch_or_release(pool, dispatcher, term).await;
    }
}

/// Enqueues a selected term; on a full lane the term's in-flight flag is
/// released so the next pass can pick it up again.
pub(crate) async fn dispatch_or_release(
    pool: &PgPool,
    dispatcher: &Dispatcher,
    term: &EligibleTerm,
) {
    match dispatcher.dispatch(term) {
        Ok(lane) => {
            tracing::debug!(term_id = term.id, lane = ?lane, "term enqueued");
        }
        Err(e) => {
            tracing::warn!(term_id = term.id, error = %e, "lane rejected term; releasing");
            if let Err(e) = serpwatch_db::clear_in_flight(pool, term.id).await {
                tracing::error!(
                    term_id = term.id,
                    error = %e,
                    "failed to release term after dispatch failure; watchdog will recover it"
                );
            }
        }
    }
}
