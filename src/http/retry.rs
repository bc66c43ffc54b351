//! Retry loop over request attempts.

use log::{debug, warn};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use super::cancel::Cancellation;
use super::executor::AttemptOutcome;
use super::observe::Observer;
use super::response::Response;
use crate::error::{Error, ErrorKind, Extra, InternalError};

/// Default number of attempts per request.
pub const MAX_RETRIES: i64 = 10;

/// Default delay between attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(30);

/// How many times a request is attempted and which failures stop it early.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Zero or negative makes every request fail without being sent.
    pub max_attempts: i64,
    pub delay: Duration,
    /// Kinds that are propagated on first sight.
    pub excluded: HashSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            delay: RETRY_DELAY,
            excluded: HashSet::new(),
        }
    }
}

impl RetryPolicy {
    /// A policy with no excluded kinds.
    pub fn new(max_attempts: i64, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            excluded: HashSet::new(),
        }
    }

    /// Adds `kind` to the kinds propagated without retry.
    pub fn exclude(mut self, kind: ErrorKind) -> Self {
        self.excluded.insert(kind);
        self
    }

    /// This policy with `extra` kinds added to the exclusion set.
    pub fn with_excluded<'a>(&self, extra: impl IntoIterator<Item = &'a ErrorKind>) -> Self {
        let mut policy = self.clone();
        policy.excluded.extend(extra.into_iter().copied());
        policy
    }

    /// Whether a failure must stop the loop regardless of remaining attempts.
    pub fn is_terminal(&self, error: &Error) -> bool {
        !error.is_retryable() || error.kind().is_some_and(|k| self.excluded.contains(&k))
    }
}

/// Drives attempts until one succeeds, a terminal failure occurs, or the
/// budget runs out.
pub struct RetryController<'a> {
    policy: &'a RetryPolicy,
    observer: &'a dyn Observer,
    cancel: Option<&'a Cancellation>,
}

impl<'a> RetryController<'a> {
    /// Binds a controller to a policy, an observer and an optional cancellation token.
    pub fn new(
        policy: &'a RetryPolicy,
        observer: &'a dyn Observer,
        cancel: Option<&'a Cancellation>,
    ) -> Self {
        Self {
            policy,
            observer,
            cancel,
        }
    }

    /// Runs `attempt` up to `max_attempts` times.
    ///
    /// On exhaustion the last attempt's error is returned as is. `extra` is
    /// the context for errors raised by the controller itself.
    pub async fn run<F, Fut>(
        &self,
        method: &str,
        url: &str,
        extra: Extra,
        mut attempt: F,
    ) -> Result<Response, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AttemptOutcome>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;

        for n in 1..=max_attempts {
            let outcome = match self.until_cancelled(attempt()).await {
                Some(outcome) => outcome,
                None => return Err(InternalError::cancelled(method, url, extra).into()),
            };

            let error = match outcome.into_result() {
                Ok(response) => return Ok(response),
                Err(e) => Error::from(e),
            };

            if self.policy.is_terminal(&error) {
                debug!("[{}] - {}: non-retryable error: {}", method, url, error);
                return Err(error);
            }

            if n < max_attempts {
                warn!(
                    "[{}] - {}: attempt {}/{} failed ({}), retrying in {:?}...",
                    method, url, n, max_attempts, error, self.policy.delay
                );
                self.observer
                    .on_retry(n, max_attempts, self.policy.delay, &error);
                if self
                    .until_cancelled(tokio::time::sleep(self.policy.delay))
                    .await
                    .is_none()
                {
                    return Err(InternalError::cancelled(method, url, extra).into());
                }
            }
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| {
            InternalError::misconfigured(method, url, max_attempts, extra).into()
        }))
    }

    /// Runs `fut` to completion, or returns `None` if the call is cancelled
    /// first.
    async fn until_cancelled<Fut: Future>(&self, fut: Fut) -> Option<Fut::Output> {
        match self.cancel {
            Some(cancel) => tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                output = fut => Some(output),
            },
            None => Some(fut.await),
        }
    }
}
