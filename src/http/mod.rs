//! HTTP client module with retry logic and error classification.
//!
//! # Structure
//!
//! - `transport` - the collaborator performing one exchange (reqwest-backed)
//! - `executor` - one attempt: call the transport, time it, classify the outcome
//! - `retry` - the attempt loop, delays and exclusions
//! - `client` - the configured facade exposing `do_request`
//! - `observe` - the sink receiving one record per attempt
//! - `cancel` - caller-driven cancellation

mod cancel;
mod client;
mod executor;
mod observe;
mod response;
mod retry;
mod transport;

pub use cancel::Cancellation;
pub use client::{HttpClient, RequestOptions};
pub use executor::AttemptOutcome;
pub use observe::{
    AttemptRecord, LogObserver, NoopObserver, Observer, format_preflight, format_record,
};
pub use response::{Reply, Response};
pub use retry::{MAX_RETRIES, RETRY_DELAY, RetryPolicy};
pub use transport::{
    Body, Credentials, Headers, Payload, ReqwestTransport, Transport, TransportError,
    TransportRequest, TransportResponse,
};
