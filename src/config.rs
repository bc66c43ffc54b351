//! Client configuration.
//!
//! A [`ClientConfig`] can be built in code or loaded from a JSON file. Every
//! field has a default, so a file only needs the keys it changes:
//!
//! ```json
//! {
//!   "server": "https://api.example.com",
//!   "timeout": 5,
//!   "headers": { "accept": "application/json" },
//!   "retry_number": 3,
//!   "retry_delay": 0.5,
//!   "no_retry_on": ["HTTP-28140", "401"]
//! }
//! ```

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ErrorKind;
use crate::http::{Credentials, Headers, MAX_RETRIES, RETRY_DELAY, RetryPolicy};

/// Default per-attempt timeout in seconds.
pub const DEFAULT_TIMEOUT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL; request paths are appended to it.
    pub server: String,
    /// Per-attempt timeout, in seconds.
    pub timeout: f64,
    /// Sent with every request.
    pub headers: Headers,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_verify: bool,
    /// Attempts per request.
    pub retry_number: i64,
    /// Delay between attempts, in seconds.
    pub retry_delay: f64,
    /// Error kinds (message id, status code or name) never retried.
    pub no_retry_on: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            timeout: DEFAULT_TIMEOUT,
            headers: Headers::new(),
            username: None,
            password: None,
            ssl_verify: true,
            retry_number: MAX_RETRIES,
            retry_delay: RETRY_DELAY.as_secs_f64(),
            no_retry_on: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// A config for `server` with every other field at its default.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Loads a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading client configuration from {:?}", path);
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_json(&contents).with_context(|| format!("Invalid config file {:?}", path))
    }

    /// Parses a JSON config document.
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse client configuration")
    }

    /// The per-attempt timeout as a `Duration`.
    pub fn timeout_duration(&self) -> Result<Duration> {
        seconds(self.timeout, "timeout")
    }

    /// Builds the retry policy, resolving `no_retry_on` entries to kinds.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let mut policy = RetryPolicy::new(self.retry_number, seconds(self.retry_delay, "retry_delay")?);
        for name in &self.no_retry_on {
            let kind: ErrorKind = name
                .parse()
                .with_context(|| format!("Invalid no_retry_on entry '{}'", name))?;
            policy = policy.exclude(kind);
        }
        Ok(policy)
    }

    /// Basic-auth credentials, when both username and password are set.
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.username.as_deref(), self.password.as_deref())
    }
}

fn seconds(value: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("'{}' must be a non-negative number of seconds, got {}", field, value))
}
