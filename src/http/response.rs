//! Successful responses handed back to callers.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::transport::{Body, Headers, TransportError};

/// A response with a status below 300.
#[derive(Debug)]
pub struct Response {
    pub(crate) status: u16,
    pub(crate) headers: Headers,
    pub(crate) body: Body,
    pub(crate) elapsed: Duration,
    pub(crate) url: String,
}

impl Response {
    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Time spent in the transport for this attempt.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The URL the request was sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the body is still unread on the wire.
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, Body::Streaming(_))
    }

    /// The body, if it has already been read.
    pub fn body(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Full(bytes) => Some(bytes.as_slice()),
            Body::Streaming(_) => None,
        }
    }

    /// Hands over the body, for callers that consume a stream themselves.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> Result<Vec<u8>, TransportError> {
        self.body.collect().await
    }

    /// Decodes the body as UTF-8, replacing invalid sequences.
    pub async fn text(self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Deserializes the JSON body.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await.context("Failed to read response body")?;
        serde_json::from_slice(&bytes).context("Failed to parse JSON response")
    }
}

/// What `do_request` returns on success.
#[derive(Debug)]
pub enum Reply {
    /// The decoded body (`parse_output = true`).
    Text(String),
    /// The response object itself (`parse_output = false`).
    Raw(Response),
}

impl Reply {
    /// The decoded body, if this is a text reply.
    pub fn into_text(self) -> Option<String> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Raw(_) => None,
        }
    }

    /// The response object, if this is a raw reply.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Reply::Raw(response) => Some(response),
            Reply::Text(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream::{self, StreamExt};

    fn response(body: Body) -> Response {
        let mut headers = Headers::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Response {
            status: 200,
            headers,
            body,
            elapsed: Duration::from_millis(12),
            url: "http://localhost/hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_text_from_full_body() {
        let resp = response(Body::Full(b"Hello world".to_vec()));
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body(), Some(&b"Hello world"[..]));
        assert_eq!(resp.text().await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn test_text_from_streaming_body() {
        let chunks = vec![Ok(b"Hello ".to_vec()), Ok(b"world".to_vec())];
        let resp = response(Body::Streaming(stream::iter(chunks).boxed()));

        assert!(resp.is_streaming());
        assert_eq!(resp.body(), None);
        assert_eq!(resp.text().await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn test_streaming_error_surfaces() {
        let chunks = vec![Ok(b"partial".to_vec()), Err(TransportError::new("reset"))];
        let resp = response(Body::Streaming(stream::iter(chunks).boxed()));

        assert_eq!(resp.bytes().await.unwrap_err().to_string(), "reset");
    }

    #[tokio::test]
    async fn test_json() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Payload {
            name: String,
            value: i32,
        }

        let resp = response(Body::Full(br#"{"name": "test", "value": 42}"#.to_vec()));
        let parsed: Payload = resp.json().await.unwrap();
        assert_eq!(
            parsed,
            Payload {
                name: "test".to_string(),
                value: 42
            }
        );
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let resp = response(Body::Full(Vec::new()));
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
        assert_eq!(resp.header("x-missing"), None);
    }

    #[test]
    fn test_reply_accessors() {
        assert_eq!(Reply::Text("hi".to_string()).into_text().as_deref(), Some("hi"));
        assert!(Reply::Text("hi".to_string()).into_response().is_none());
        assert!(Reply::Raw(response(Body::Full(Vec::new()))).into_text().is_none());
    }
}
