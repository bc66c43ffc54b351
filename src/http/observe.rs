//! Observability sink for request attempts.
//!
//! The client reports to an explicit [`Observer`] instead of a global
//! logger. The default is [`NoopObserver`]; [`LogObserver`] writes through
//! the `log`/`tracing` facades.

use std::time::Duration;

use crate::error::Error;

/// Emitted once per attempt, whatever its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub method: String,
    pub url: String,
    pub server: String,
    /// Absent when the transport failed before a response existed.
    pub status_code: Option<u16>,
    pub content_length: usize,
    pub elapsed: Duration,
}

pub trait Observer: Send + Sync {
    /// Called right before the transport is invoked.
    fn before_attempt(&self, _method: &str, _url: &str) {}

    fn after_attempt(&self, _record: &AttemptRecord) {}

    /// Called when a failed attempt is about to be retried after `delay`.
    fn on_retry(&self, _attempt: i64, _max_attempts: i64, _delay: Duration, _error: &Error) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Logs the pre-flight line at debug level and the attempt record at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn before_attempt(&self, method: &str, url: &str) {
        tracing::debug!("{}", format_preflight(method, url));
    }

    fn after_attempt(&self, record: &AttemptRecord) {
        tracing::info!(
            method = %record.method,
            url = %record.url,
            server = %record.server,
            status_code = ?record.status_code,
            content_length = record.content_length,
            exec_time = record.elapsed.as_secs_f64(),
            "{}",
            format_record(record)
        );
    }
}

/// `[METHOD] - URL`
pub fn format_preflight(method: &str, url: &str) -> String {
    format!("[{}] - {}", method, url)
}

/// `[METHOD] - URL - STATUS: LENGTH - SECONDSs`, with `-` for a missing
/// status.
pub fn format_record(record: &AttemptRecord) -> String {
    let status = record
        .status_code
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "[{}] - {} - {}: {} - {:.3}s",
        record.method,
        record.url,
        status,
        record.content_length,
        record.elapsed.as_secs_f64()
    )
}
