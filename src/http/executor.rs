//! A single request attempt and the classification of its outcome.

use std::time::{Duration, Instant};

use super::observe::{AttemptRecord, Observer};
use super::response::Response;
use super::transport::{Body, Payload, Transport, TransportRequest};
use crate::error::{self, HttpError, base_extra};

/// Result of one attempt, consumed straight away by the retry controller.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Response),
    /// The transport failed before any response existed.
    TransportFailure(HttpError),
    /// The transport returned no response object.
    EmptyResponse(HttpError),
    /// The server answered with a status of 300 or more.
    HttpError(HttpError),
}

impl AttemptOutcome {
    /// Splits the outcome into a success or its error.
    pub fn into_result(self) -> Result<Response, HttpError> {
        match self {
            AttemptOutcome::Success(response) => Ok(response),
            AttemptOutcome::TransportFailure(e)
            | AttemptOutcome::EmptyResponse(e)
            | AttemptOutcome::HttpError(e) => Err(e),
        }
    }
}

/// Reports the attempt to the observer when dropped, so every exit path is
/// timed, including a future dropped mid-flight.
struct AttemptTimer<'a> {
    observer: &'a dyn Observer,
    request: &'a TransportRequest,
    server: &'a str,
    started: Instant,
    elapsed: Option<Duration>,
    status_code: Option<u16>,
    content_length: usize,
}

impl<'a> AttemptTimer<'a> {
    fn start(observer: &'a dyn Observer, request: &'a TransportRequest, server: &'a str) -> Self {
        Self {
            observer,
            request,
            server,
            started: Instant::now(),
            elapsed: None,
            status_code: None,
            content_length: 0,
        }
    }

    /// Freezes the elapsed time at the point the transport returned.
    fn stop(&mut self) -> Duration {
        *self.elapsed.get_or_insert_with(|| self.started.elapsed())
    }
}

impl Drop for AttemptTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.stop();
        self.observer.after_attempt(&AttemptRecord {
            method: self.request.method.clone(),
            url: self.request.url.clone(),
            server: self.server.to_string(),
            status_code: self.status_code,
            content_length: self.content_length,
            elapsed,
        });
    }
}

pub struct RequestExecutor<'a, T: Transport + ?Sized> {
    transport: &'a T,
    observer: &'a dyn Observer,
    server: &'a str,
}

impl<'a, T: Transport + ?Sized> RequestExecutor<'a, T> {
    /// Binds the executor to a transport, an observer and the server name.
    pub fn new(transport: &'a T, observer: &'a dyn Observer, server: &'a str) -> Self {
        Self {
            transport,
            observer,
            server,
        }
    }

    /// Performs exactly one attempt.
    pub async fn execute(&self, request: &TransportRequest) -> AttemptOutcome {
        let extra = base_extra(&request.url, self.server, &request.method);

        self.observer.before_attempt(&request.method, &request.url);
        let mut timer = AttemptTimer::start(self.observer, request, self.server);

        let result = self.transport.perform(request).await;
        let elapsed = timer.stop();

        let response = match result {
            Err(e) => {
                return AttemptOutcome::TransportFailure(error::transport_failure(
                    e.message.as_deref(),
                    extra,
                ));
            }
            Ok(None) => return AttemptOutcome::EmptyResponse(error::empty_response(extra)),
            Ok(Some(response)) => response,
        };
        timer.status_code = Some(response.status);

        if response.status < 300 {
            timer.content_length = match &response.body {
                Body::Full(bytes) => bytes.len(),
                Body::Streaming(_) => response
                    .headers
                    .get("content-length")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
            };
            return AttemptOutcome::Success(Response {
                status: response.status,
                headers: response.headers,
                body: response.body,
                elapsed,
                url: request.url.clone(),
            });
        }

        let body = match response.body.collect().await {
            Ok(body) => body,
            Err(e) => {
                return AttemptOutcome::TransportFailure(error::transport_failure(
                    e.message.as_deref(),
                    extra,
                ));
            }
        };
        timer.content_length = body.len();

        AttemptOutcome::HttpError(error::from_response(
            response.status,
            &response.headers,
            &String::from_utf8_lossy(&body),
            request.data.as_ref().map(Payload::describe),
            extra,
        ))
    }
}
