//! Term execution: the fetch → rotate → extract → observe pipeline.
//!
//! Every execution runs under two guards set up before any work happens:
//! the `in_flight` flag (set by the selecting pass) and the per-term lock
//! (acquired here). Both are released unconditionally on every exit path;
//! only a process kill can leave them set, and the watchdog plus the lock
//! TTL recover from that.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serpwatch_core::{AppConfig, ImpactPolicy};
use serpwatch_db::NewObservation;
use serpwatch_extract::{extract, FsObjectStore, TermContext};
use serpwatch_fetch::{run_with_policy, FetchError, RetryPolicy, SerpClient, SerpRequest};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dispatch::Lanes;
use crate::rotation::RotationStore;

/// Everything a worker needs, built once at startup and shared.
pub struct WorkerDeps {
    pub pool: PgPool,
    pub client: SerpClient,
    pub store: FsObjectStore,
    pub rotation: RotationStore,
    pub retry: RetryPolicy,
    pub impact: ImpactPolicy,
    pub config: Arc<AppConfig>,
    lock_ttl_secs: f64,
    interval_hours: i32,
    /// Soft budget for the whole retried fetch, from
    /// [`AppConfig::fetch_soft_timeout_secs`]. Wider than the per-attempt
    /// request timeout so a timed-out attempt still leaves room to retry.
    soft_timeout: Duration,
}

impl WorkerDeps {
    /// # Errors
    ///
    /// Returns [`FetchError`] if the HTTP client cannot be constructed.
    pub fn new(pool: PgPool, config: Arc<AppConfig>) -> Result<Self, FetchError> {
        let client = SerpClient::new(
            &config.serp_endpoint,
            config.serp_api_key.as_deref(),
            config.fetch_timeout_secs,
            &config.fetch_user_agent,
        )?;
        let store = FsObjectStore::new(config.object_store_root.clone());
        let rotation = RotationStore::new(config.rotation_root.clone(), config.rotation_keep);
        let retry = RetryPolicy {
            max_attempts: config.fetch_max_attempts,
            backoff_base_ms: config.fetch_backoff_base_ms,
        };
        #[allow(clippy::cast_precision_loss)]
        let lock_ttl_secs = config.lock_ttl_secs as f64;
        let interval_hours = i32::try_from(config.refetch_interval_hours).unwrap_or(i32::MAX);
        let soft_timeout = Duration::from_secs(config.fetch_soft_timeout_secs());

        Ok(Self {
            pool,
            client,
            store,
            rotation,
            retry,
            impact: ImpactPolicy::default(),
            config,
            lock_ttl_secs,
            interval_hours,
            soft_timeout,
        })
    }
}

/// Worker loop: pulls jobs until the lanes disconnect.
pub async fn run_worker(worker_id: usize, lanes: &Lanes, deps: &WorkerDeps) {
    tracing::debug!(worker_id, "worker started");
    while let Some(job) = lanes.next().await {
        run_term(deps, job.term_id).await;
    }
    tracing::debug!(worker_id, "worker stopped");
}

enum RunOutcome {
    Completed { new_observation: bool, position: i32 },
    Skipped(&'static str),
}

/// How a failed execution affects the term row.
enum RunError {
    /// The outbound fetch failed or timed out: recorded on the term with a
    /// bumped failure count and a pushed-out schedule.
    Fetch(String),
    /// A storage or database step after (or before) the fetch failed. The
    /// term's scheduling state is left untouched so it stays eligible and a
    /// later pass retries; any raw artifact already written is kept.
    Aborted(anyhow::Error),
}

impl From<serpwatch_db::DbError> for RunError {
    fn from(e: serpwatch_db::DbError) -> Self {
        Self::Aborted(e.into())
    }
}

impl From<std::io::Error> for RunError {
    fn from(e: std::io::Error) -> Self {
        Self::Aborted(e.into())
    }
}

impl From<serpwatch_extract::ExtractError> for RunError {
    fn from(e: serpwatch_extract::ExtractError) -> Self {
        Self::Aborted(e.into())
    }
}

/// Runs one term end to end. Never returns an error: every failure is
/// recorded or logged, and the guards are released.
pub async fn run_term(deps: &WorkerDeps, term_id: i64) {
    let holder = Uuid::new_v4();

    match serpwatch_db::acquire_term_lock(&deps.pool, term_id, holder, deps.lock_ttl_secs).await {
        Ok(true) => {}
        Ok(false) => {
            // Another execution is live; its release step clears in_flight.
            tracing::warn!(term_id, "term lock held elsewhere, skipping execution");
            return;
        }
        Err(e) => {
            tracing::error!(term_id, error = %e, "failed to acquire term lock");
            if let Err(e) = serpwatch_db::clear_in_flight(&deps.pool, term_id).await {
                tracing::error!(term_id, error = %e, "failed to release in-flight flag");
            }
            return;
        }
    }

    match execute(deps, term_id).await {
        Ok(RunOutcome::Completed {
            new_observation,
            position,
        }) => {
            tracing::info!(term_id, position, new_observation, "term execution complete");
        }
        Ok(RunOutcome::Skipped(reason)) => {
            tracing::info!(term_id, reason, "term execution skipped");
        }
        Err(RunError::Fetch(message)) => {
            tracing::error!(term_id, error = %message, "fetch failed");
            if let Err(e) =
                serpwatch_db::mark_fetch_failure(&deps.pool, term_id, &message, deps.interval_hours)
                    .await
            {
                tracing::error!(term_id, error = %e, "failed to record fetch failure");
            }
        }
        Err(RunError::Aborted(e)) => {
            tracing::error!(
                term_id,
                error = %format!("{e:#}"),
                "term execution aborted; a later pass will retry it"
            );
        }
    }

    release(deps, term_id, holder).await;
}

async fn execute(deps: &WorkerDeps, term_id: i64) -> Result<RunOutcome, RunError> {
    let term = serpwatch_db::get_term(&deps.pool, term_id).await?;
    if term.archived {
        return Ok(RunOutcome::Skipped("archived"));
    }
    // Eligibility can lapse between selection and execution, e.g. when a
    // forced re-check raced a scheduled pass and already ran.
    let now = Utc::now();
    if term.last_fetched_at.is_some() && term.next_eligible_at.is_some_and(|at| at > now) {
        return Ok(RunOutcome::Skipped("no longer eligible"));
    }

    let domain = serpwatch_db::get_project_domain(&deps.pool, term.project_id).await?;

    let request = SerpRequest {
        term: term.term_text.clone(),
        locale: term.locale.clone(),
        result_count: deps.config.result_count,
        geo: None,
    };
    let fetch = run_with_policy(deps.retry, || deps.client.fetch(&request));
    let page = match tokio::time::timeout(deps.soft_timeout, fetch).await {
        Ok(Ok(page)) => page,
        Ok(Err(e)) => return Err(RunError::Fetch(e.to_string())),
        Err(_) => {
            return Err(RunError::Fetch(format!(
                "fetch timed out after {}s",
                deps.soft_timeout.as_secs()
            )))
        }
    };

    let today = now.date_naive();
    let rotated = deps
        .rotation
        .write(term.project_id, term.id, today, &page.html)
        .await?;
    serpwatch_db::replace_artifact_paths(&deps.pool, term.id, &rotated.retained).await?;
    if !rotated.deleted.is_empty() {
        tracing::debug!(
            term_id,
            deleted = rotated.deleted.len(),
            "rotated out old raw artifacts"
        );
    }

    // A same-day re-run keeps the first stored artifact; extraction runs on
    // what is actually stored so the observation and the artifact agree.
    let html = if rotated.reused {
        match deps.rotation.read(&rotated.path).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(
                    term_id,
                    path = %rotated.path,
                    error = %e,
                    "failed to read stored raw artifact; using the fresh fetch"
                );
                page.html
            }
        }
    } else {
        page.html
    };

    let ctx = TermContext {
        term_id: term.id,
        project_id: term.project_id,
        term: term.term_text.clone(),
        locale: term.locale.clone(),
        domain,
    };
    let ranked = extract(&deps.store, &ctx, &html, today).await?;

    let new_observation = serpwatch_db::commit_observation(
        &deps.pool,
        &NewObservation {
            tracked_term_id: term.id,
            position: ranked.position,
            is_organic: ranked.is_organic,
            has_map_pack: ranked.features.map_pack,
            has_video: ranked.features.video,
            has_image: ranked.features.image,
            artifact_ref: ranked.artifact_ref,
            observed_on: today,
            rank_url: ranked.rank_url,
        },
        &deps.impact,
    )
    .await?;

    serpwatch_db::mark_fetch_success(&deps.pool, term.id, deps.interval_hours).await?;

    Ok(RunOutcome::Completed {
        new_observation,
        position: ranked.position,
    })
}

/// Unconditional release: clears `in_flight` and drops the lock. Failures
/// here are logged only; the watchdog is the backstop.
async fn release(deps: &WorkerDeps, term_id: i64, holder: Uuid) {
    if let Err(e) = serpwatch_db::clear_in_flight(&deps.pool, term_id).await {
        tracing::error!(term_id, error = %e, "failed to release in-flight flag");
    }
    if let Err(e) = serpwatch_db::release_term_lock(&deps.pool, term_id, holder).await {
        tracing::error!(term_id, error = %e, "failed to release term lock");
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
