mod dispatch;
mod rotation;
mod scheduler;
mod watchdog;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(serpwatch_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = serpwatch_db::PoolConfig::from_app_config(&config);
    let pool = serpwatch_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = serpwatch_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations up to date");

    let (dispatcher, lanes) = dispatch::lanes(config.lane_capacity);
    let dispatcher = Arc::new(dispatcher);
    let deps = Arc::new(worker::WorkerDeps::new(pool.clone(), Arc::clone(&config))?);

    let mut workers = tokio::task::JoinSet::new();
    for worker_id in 0..config.worker_count {
        let lanes = lanes.clone();
        let deps = Arc::clone(&deps);
        workers.spawn(async move { worker::run_worker(worker_id, &lanes, &deps).await });
    }
    tracing::info!(count = config.worker_count, "worker pool started");

    let mut sched = scheduler::build_scheduler(
        pool.clone(),
        Arc::clone(&config),
        Arc::clone(&dispatcher),
    )
    .await?;

    shutdown_signal().await;

    if let Err(e) = sched.shutdown().await {
        tracing::warn!(error = %e, "scheduler shutdown reported an error");
    }
    drop(dispatcher);

    // Workers drain in-flight jobs and exit once the lanes disconnect. A
    // worker stuck mid-fetch beyond the grace period is aborted; the
    // watchdog and lock TTL recover its term.
    let drain = async {
        while workers.join_next().await.is_some() {}
    };
    if tokio::time::timeout(Duration::from_secs(30), drain)
        .await
        .is_err()
    {
        tracing::warn!("workers did not drain within 30s; aborting remaining tasks");
        workers.shutdown().await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
