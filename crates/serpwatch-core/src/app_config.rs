use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,

    /// Base URL of the search endpoint the fetch client hits.
    pub serp_endpoint: String,
    pub serp_api_key: Option<String>,
    pub fetch_user_agent: String,
    /// Per-request timeout for a single fetch attempt. The full execution
    /// budget is [`AppConfig::fetch_soft_timeout_secs`].
    pub fetch_timeout_secs: u64,
    pub fetch_max_attempts: u32,
    pub fetch_backoff_base_ms: u64,
    pub result_count: u32,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub scheduler_cron: String,
    /// Hard ceiling on terms selected per scheduling pass.
    pub batch_cap: i64,
    pub worker_count: usize,
    pub lane_capacity: usize,
    pub lock_ttl_secs: u64,
    pub refetch_interval_hours: i64,
    pub recheck_min_interval_mins: i64,

    pub watchdog_cron: String,
    pub stale_in_flight_mins: i64,
    pub watchdog_redispatch_limit: i64,

    pub rotation_root: PathBuf,
    /// Raw artifacts kept per term; older ones are deleted on rotation.
    pub rotation_keep: usize,
    pub object_store_root: PathBuf,
}

impl AppConfig {
    /// Soft budget for one whole fetch execution: every retry attempt at the
    /// full per-request timeout plus the worst-case backoff between attempts
    /// (exponential from `fetch_backoff_base_ms`, capped at 60s per delay,
    /// with the +25% jitter ceiling). The lock TTL must stay above this.
    #[must_use]
    pub fn fetch_soft_timeout_secs(&self) -> u64 {
        const MAX_DELAY_MS: u64 = 60_000;

        let attempts = u64::from(self.fetch_max_attempts.max(1));
        let mut backoff_ms: u64 = 0;
        for n in 0..attempts - 1 {
            let exp = u32::try_from(n.min(10)).unwrap_or(10);
            let delay = self
                .fetch_backoff_base_ms
                .saturating_mul(1_u64 << exp)
                .min(MAX_DELAY_MS);
            backoff_ms = backoff_ms.saturating_add(delay.saturating_mul(5) / 4);
        }
        attempts
            .saturating_mul(self.fetch_timeout_secs)
            .saturating_add(backoff_ms.div_ceil(1000))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("serp_endpoint", &self.serp_endpoint)
            .field(
                "serp_api_key",
                &self.serp_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_max_attempts", &self.fetch_max_attempts)
            .field("fetch_backoff_base_ms", &self.fetch_backoff_base_ms)
            .field("result_count", &self.result_count)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("scheduler_cron", &self.scheduler_cron)
            .field("batch_cap", &self.batch_cap)
            .field("worker_count", &self.worker_count)
            .field("lane_capacity", &self.lane_capacity)
            .field("lock_ttl_secs", &self.lock_ttl_secs)
            .field("refetch_interval_hours", &self.refetch_interval_hours)
            .field("recheck_min_interval_mins", &self.recheck_min_interval_mins)
            .field("watchdog_cron", &self.watchdog_cron)
            .field("stale_in_flight_mins", &self.stale_in_flight_mins)
            .field(
                "watchdog_redispatch_limit",
                &self.watchdog_redispatch_limit,
            )
            .field("rotation_root", &self.rotation_root)
            .field("rotation_keep", &self.rotation_keep)
            .field("object_store_root", &self.object_store_root)
            .finish()
    }
}
