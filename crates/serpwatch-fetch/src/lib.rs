//! Outbound SERP fetching: one request per tracked term, with a typed error
//! taxonomy and an explicit, inspectable retry policy.

mod client;
mod error;
mod retry;
mod types;

pub use client::SerpClient;
pub use error::FetchError;
pub use retry::{run_with_policy, RetryPolicy};
pub use types::{FetchedPage, SerpRequest};
