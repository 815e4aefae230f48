//! Shared HTTP client construction for documentation-site adapters.
//!
//! Clients carry a request timeout slightly shorter than the fan-out
//! deadline and a User-Agent picked from a rotation list unless the
//! adapter configures its own.

use crate::error::AdapterError;
use rand::seq::SliceRandom;
use std::time::Duration;

/// Browser User-Agent strings; one is picked per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:143.0) Gecko/20100101 Firefox/143.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36 Edg/140.0.0.0",
];

/// Build a [`reqwest::Client`] for fetching documentation pages.
///
/// # Errors
///
/// Returns [`AdapterError::Http`] if the client cannot be constructed.
pub fn build_client(
    user_agent: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, AdapterError> {
    let ua = user_agent.unwrap_or_else(|| random_user_agent());

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| AdapterError::Http(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(USER_AGENTS[0])
}
