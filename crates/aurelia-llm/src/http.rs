//! Shared HTTP client construction.

use std::time::Duration;

/// Create the HTTP client used by remote providers.
///
/// Only the connect phase is bounded (30s). A generation call may run for as long as
/// the remote model needs; callers that want a deadline wrap the future themselves or
/// pass their own client through `with_client`.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("aurelia/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("falling back to default HTTP client: {e}");
            reqwest::Client::new()
        })
}
