//! HTTP client for the search endpoint.
//!
//! One request per tracked term per execution. Non-2xx responses become
//! typed terminal errors — the retry policy only ever sees transport
//! failures as retriable.

use std::time::Duration;

use reqwest::Client;

use crate::error::FetchError;
use crate::types::{FetchedPage, SerpRequest};

/// HTTP client for the SERP endpoint.
pub struct SerpClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl SerpClient {
    /// Creates a `SerpClient` with configured timeout and `User-Agent`.
    ///
    /// `timeout_secs` is the soft per-request timeout; the caller's lock TTL
    /// must stay well above it.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(
        endpoint: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            api_key: api_key.map(str::to_owned),
        })
    }

    /// Performs one search request and returns the raw result markup.
    ///
    /// # Errors
    ///
    /// - [`FetchError::RateLimited`] — HTTP 429 (terminal, never retried).
    /// - [`FetchError::UnexpectedStatus`] — any other non-2xx status.
    /// - [`FetchError::Http`] — transport failure (the retriable class).
    /// - [`FetchError::InvalidEndpoint`] — the configured endpoint does not
    ///   parse as a URL.
    pub async fn fetch(&self, request: &SerpRequest) -> Result<FetchedPage, FetchError> {
        let url = self.search_url(request)?;

        let mut req = self.client.get(&url).header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
        );
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let html = response.text().await?;
        Ok(FetchedPage {
            status: status.as_u16(),
            html,
        })
    }

    /// Builds the search URL for the given request.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidEndpoint`] if the configured endpoint
    /// cannot be parsed as a URL base.
    fn search_url(&self, request: &SerpRequest) -> Result<String, FetchError> {
        let mut url =
            reqwest::Url::parse(&self.endpoint).map_err(|e| FetchError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        url.query_pairs_mut()
            .append_pair("q", &request.term)
            .append_pair("gl", &request.locale)
            .append_pair("num", &request.result_count.to_string());

        if let Some(geo) = &request.geo {
            url.query_pairs_mut().append_pair("location", geo);
        }

        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SerpRequest {
        SerpRequest {
            term: "best espresso machine".to_owned(),
            locale: "us".to_owned(),
            result_count: 100,
            geo: None,
        }
    }

    #[test]
    fn search_url_encodes_term_and_locale() {
        let client =
            SerpClient::new("https://serp.example.com/search", None, 5, "serpwatch-test").unwrap();
        let url = client.search_url(&request()).unwrap();
        assert_eq!(
            url,
            "https://serp.example.com/search?q=best+espresso+machine&gl=us&num=100"
        );
    }

    #[test]
    fn search_url_appends_geo_bias() {
        let client =
            SerpClient::new("https://serp.example.com/search", None, 5, "serpwatch-test").unwrap();
        let mut req = request();
        req.geo = Some("Portland, OR".to_owned());
        let url = client.search_url(&req).unwrap();
        assert!(url.ends_with("&location=Portland%2C+OR"), "got: {url}");
    }

    #[test]
    fn search_url_strips_trailing_slash_from_endpoint() {
        let client =
            SerpClient::new("https://serp.example.com/search/", None, 5, "serpwatch-test").unwrap();
        let url = client.search_url(&request()).unwrap();
        assert!(
            url.starts_with("https://serp.example.com/search?"),
            "got: {url}"
        );
    }

    #[test]
    fn search_url_rejects_invalid_endpoint() {
        let client = SerpClient::new("not-a-url", None, 5, "serpwatch-test").unwrap();
        let result = client.search_url(&request());
        assert!(
            matches!(result, Err(FetchError::InvalidEndpoint { .. })),
            "expected InvalidEndpoint, got: {result:?}"
        );
    }
}
