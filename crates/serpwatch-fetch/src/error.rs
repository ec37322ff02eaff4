use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure: timeout, connection reset, TLS. The only
    /// retriable class.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 — the upstream asked us to back off. Retrying immediately
    /// would worsen the quota situation, so this is terminal for the
    /// attempt; the term becomes eligible again after the normal interval.
    #[error("rate limited by search endpoint (status 429)")]
    RateLimited,

    /// Any other non-2xx application response. Usually quota exhaustion or
    /// blocking; recorded verbatim as the term's last error, never retried.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid search endpoint \"{endpoint}\": {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

impl FetchError {
    /// Returns `true` only for transient transport failures. Application
    /// responses (any status code we actually received) are terminal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect(),
            FetchError::RateLimited
            | FetchError::UnexpectedStatus { .. }
            | FetchError::InvalidEndpoint { .. } => false,
        }
    }
}
