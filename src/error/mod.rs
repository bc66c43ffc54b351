//! Typed errors raised by the client.
//!
//! Every error exposes the same four fields: a numeric `code`, a stable
//! `message_id`, a human `message` and an `extra` context map. Callers match
//! on `message_id` (or on [`ErrorKind`]) rather than on Rust types.

mod registry;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::http::Headers;

pub use registry::{ErrorKind, REGISTRY, classify_status};

/// Diagnostic context attached to an error.
pub type Extra = BTreeMap<String, Value>;

/// Builds the context every attempt error carries.
pub fn base_extra(url: &str, server: &str, method: &str) -> Extra {
    let mut extra = Extra::new();
    extra.insert("url".to_string(), Value::from(url));
    extra.insert("server".to_string(), Value::from(server));
    extra.insert("method".to_string(), Value::from(method));
    extra
}

/// An error derived from an HTTP status, or from a failed exchange that is
/// reported as one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct HttpError {
    kind: ErrorKind,
    code: u16,
    message: String,
    extra: Extra,
}

impl HttpError {
    /// The taxonomy entry this error was classified as.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The status code. For unregistered statuses this is the raw code, not
    /// the fallback kind's.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Stable identifier of the kind.
    pub fn message_id(&self) -> &'static str {
        self.kind.message_id
    }

    /// The response body, or the reason phrase when there was none.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Diagnostic context about the request and response.
    pub fn extra(&self) -> &Extra {
        &self.extra
    }
}

/// Builds an error from a status code.
///
/// Never fails: unregistered codes produce an [`ErrorKind::UNKNOWN`] error
/// that still carries `code`. A missing or empty message falls back to the
/// kind's reason phrase. `extra` is stored as given.
pub fn from_status(code: u16, message: Option<&str>, extra: Extra) -> HttpError {
    let kind = ErrorKind::lookup(code).unwrap_or(ErrorKind::UNKNOWN);
    let message = match message {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => kind.reason.to_string(),
    };
    HttpError {
        kind,
        code,
        message,
        extra,
    }
}

/// The transport raised before any response existed.
pub fn transport_failure(message: Option<&str>, extra: Extra) -> HttpError {
    from_status(ErrorKind::INTERNAL_SERVER_ERROR.code, message, extra)
}

/// The transport returned no response object at all.
pub fn empty_response(extra: Extra) -> HttpError {
    from_status(ErrorKind::MISDIRECTED_REQUEST.code, None, extra)
}

/// Builds the error for a response with a status of 300 or more.
///
/// The decoded body becomes the message verbatim and is also recorded under
/// `response`. `extra` is expected to hold `url`, `server` and `method`.
pub fn from_response(
    status: u16,
    headers: &Headers,
    body: &str,
    payload: Option<Value>,
    mut extra: Extra,
) -> HttpError {
    let header_map = headers
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
        .collect::<serde_json::Map<_, _>>();
    let request_id = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("x-request-id"))
        .map(|(_, v)| Value::from(v.as_str()))
        .unwrap_or(Value::Null);

    extra.insert("headers".to_string(), Value::Object(header_map));
    extra.insert("payload".to_string(), payload.unwrap_or(Value::Null));
    extra.insert("request_id".to_string(), request_id);
    extra.insert("response".to_string(), Value::from(body));

    from_status(status, Some(body), extra)
}

/// Failures outside the HTTP taxonomy: a client that cannot attempt the
/// request at all, or a call cancelled by its owner.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct InternalError {
    code: u16,
    message_id: &'static str,
    message: String,
    extra: Extra,
}

impl InternalError {
    pub const MISCONFIGURED_ID: &'static str = "ERR-29885";
    pub const CANCELLED_ID: &'static str = "ERR-49901";

    /// The retry budget is zero or negative, so no attempt was made.
    pub fn misconfigured(method: &str, url: &str, retries: i64, extra: Extra) -> Self {
        Self {
            code: 500,
            message_id: Self::MISCONFIGURED_ID,
            message: format!(
                "Unexpected error, failed to perform request '{}' on '{}' after {} retries",
                method, url, retries
            ),
            extra,
        }
    }

    /// The caller cancelled the call before it completed.
    pub fn cancelled(method: &str, url: &str, extra: Extra) -> Self {
        Self {
            code: 499,
            message_id: Self::CANCELLED_ID,
            message: format!("Request '{}' on '{}' was cancelled", method, url),
            extra,
        }
    }

    /// 499 for cancellation, 500 otherwise.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// `ERR-29885` or `ERR-49901`.
    pub fn message_id(&self) -> &'static str {
        self.message_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn extra(&self) -> &Extra {
        &self.extra
    }
}

/// Error returned by [`crate::http::HttpClient`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl Error {
    /// Numeric code of the underlying error.
    pub fn code(&self) -> u16 {
        match self {
            Error::Http(e) => e.code(),
            Error::Internal(e) => e.code(),
        }
    }

    /// Stable identifier callers branch on.
    pub fn message_id(&self) -> &'static str {
        match self {
            Error::Http(e) => e.message_id(),
            Error::Internal(e) => e.message_id(),
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        match self {
            Error::Http(e) => e.message(),
            Error::Internal(e) => e.message(),
        }
    }

    /// Diagnostic context map.
    pub fn extra(&self) -> &Extra {
        match self {
            Error::Http(e) => e.extra(),
            Error::Internal(e) => e.extra(),
        }
    }

    /// The taxonomy kind, or `None` for internal errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Http(e) => Some(e.kind()),
            Error::Internal(_) => None,
        }
    }

    /// HTTP-derived errors may be retried; internal errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Http(_))
    }
}

impl Serialize for Error {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Report<'a> {
            code: u16,
            message_id: &'a str,
            message: &'a str,
            extra: &'a Extra,
        }

        Report {
            code: self.code(),
            message_id: self.message_id(),
            message: self.message(),
            extra: self.extra(),
        }
        .serialize(serializer)
    }
}
