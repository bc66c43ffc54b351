//! Transport abstraction: perform one HTTP exchange and hand back the raw
//! status, headers and body.
//!
//! The retry and classification logic never talks to reqwest directly, which
//! keeps it testable with a mocked [`Transport`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use log::debug;
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Header map used on both sides of the exchange.
pub type Headers = BTreeMap<String, String>;

const USER_AGENT: &str = concat!("courier/", env!("COURIER_VERSION"));

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(Vec<u8>),
    /// Sent as `application/x-www-form-urlencoded`.
    Form(BTreeMap<String, String>),
}

impl Payload {
    /// How the payload is reported in error context.
    pub fn describe(&self) -> Value {
        match self {
            Payload::Raw(bytes) => Value::from(String::from_utf8_lossy(bytes).into_owned()),
            Payload::Form(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Raw(s.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Raw(s.into_bytes())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Raw(bytes)
    }
}

/// Basic-auth credentials, passed through to the transport untouched.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Credentials exist only when both parts are present and non-empty.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(Self {
                username: u.to_string(),
                password: p.to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"*********")
            .finish()
    }
}

/// Everything the transport needs for one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: String,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub data: Option<Payload>,
    pub headers: Headers,
    pub auth: Option<Credentials>,
    pub timeout: Duration,
    pub verify: bool,
    pub stream: bool,
}

/// Response body, either fully read or deferred.
pub enum Body {
    Full(Vec<u8>),
    Streaming(BoxStream<'static, Result<Vec<u8>, TransportError>>),
}

impl Body {
    /// Reads the whole body.
    pub async fn collect(self) -> Result<Vec<u8>, TransportError> {
        match self {
            Body::Full(bytes) => Ok(bytes),
            Body::Streaming(stream) => {
                stream
                    .try_fold(Vec::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(bytes) => write!(f, "Body::Full({} bytes)", bytes.len()),
            Body::Streaming(_) => write!(f, "Body::Streaming"),
        }
    }
}

#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

/// The exchange could not complete (DNS, refused connection, TLS, timeout).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", .message.as_deref().unwrap_or("transport error"))]
pub struct TransportError {
    pub message: Option<String>,
}

impl TransportError {
    /// A failure with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// A failure the transport could not describe.
    pub fn opaque() -> Self {
        Self { message: None }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Performs exactly one HTTP exchange.
///
/// `Ok(None)` means the transport produced no response object at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(
        &self,
        request: &TransportRequest,
    ) -> Result<Option<TransportResponse>, TransportError>;
}

/// [`Transport`] backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    insecure: Client,
}

impl ReqwestTransport {
    /// Builds the verifying and non-verifying reqwest clients.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        let insecure = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to build HTTP client without certificate verification")?;
        Ok(Self { client, insecure })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(
        &self,
        request: &TransportRequest,
    ) -> Result<Option<TransportResponse>, TransportError> {
        let client = if request.verify {
            &self.client
        } else {
            &self.insecure
        };
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::new(format!("Invalid method: {}", e)))?;

        let mut builder = client.request(method, &request.url).timeout(request.timeout);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(auth) = &request.auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        match &request.data {
            Some(Payload::Raw(bytes)) => builder = builder.body(bytes.clone()),
            Some(Payload::Form(fields)) => builder = builder.form(fields),
            None => {}
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let body = if request.stream {
            debug!("Deferring body of {} {}", request.method, request.url);
            Body::Streaming(
                response
                    .bytes_stream()
                    .map(|chunk| chunk.map(|b| b.to_vec()).map_err(TransportError::from))
                    .boxed(),
            )
        } else {
            Body::Full(response.bytes().await?.to_vec())
        };

        Ok(Some(TransportResponse {
            status,
            headers,
            body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn request(method: &str, url: String) -> TransportRequest {
        TransportRequest {
            method: method.to_string(),
            url,
            params: Vec::new(),
            data: None,
            headers: Headers::new(),
            auth: None,
            timeout: Duration::from_secs(5),
            verify: true,
            stream: false,
        }
    }

    #[test]
    fn test_credentials_require_both_parts() {
        assert!(Credentials::from_parts(Some("user"), Some("pass")).is_some());
        assert!(Credentials::from_parts(Some("user"), None).is_none());
        assert!(Credentials::from_parts(None, Some("pass")).is_none());
        assert!(Credentials::from_parts(Some(""), Some("pass")).is_none());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::from_parts(Some("user"), Some("hunter2")).unwrap();
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_payload_describe() {
        assert_eq!(Payload::from("a=b").describe(), serde_json::json!("a=b"));

        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), "demo".to_string());
        assert_eq!(
            Payload::Form(fields).describe(),
            serde_json::json!({"name": "demo"})
        );
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::new("boom").to_string(), "boom");
        assert_eq!(TransportError::opaque().to_string(), "transport error");
    }

    #[tokio::test]
    async fn test_perform_get_with_query_headers_and_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hello")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .match_header("x-trace", "on")
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(200)
            .with_header("x-request-id", "req-1")
            .with_body("Hello world")
            .create_async()
            .await;

        let mut req = request("GET", format!("{}/hello", server.url()));
        req.params.push(("page".to_string(), "2".to_string()));
        req.headers.insert("x-trace".to_string(), "on".to_string());
        req.auth = Credentials::from_parts(Some("user"), Some("pass"));

        let transport = ReqwestTransport::new().unwrap();
        let response = transport.perform(&req).await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("x-request-id").unwrap(), "req-1");
        assert_eq!(response.body.collect().await.unwrap(), b"Hello world");
    }

    #[tokio::test]
    async fn test_perform_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/items")
            .match_body(Matcher::UrlEncoded("name".into(), "demo".into()))
            .with_status(201)
            .create_async()
            .await;

        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), "demo".to_string());
        let mut req = request("POST", format!("{}/items", server.url()));
        req.data = Some(Payload::Form(fields));

        let transport = ReqwestTransport::new().unwrap();
        let response = transport.perform(&req).await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_perform_streaming_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/file.txt")
            .with_status(200)
            .with_body("test content")
            .create_async()
            .await;

        let mut req = request("GET", format!("{}/file.txt", server.url()));
        req.stream = true;

        let transport = ReqwestTransport::new().unwrap();
        let response = transport.perform(&req).await.unwrap().unwrap();

        assert!(matches!(response.body, Body::Streaming(_)));
        assert_eq!(response.body.collect().await.unwrap(), b"test content");
    }

    #[tokio::test]
    async fn test_perform_connection_failure() {
        let req = request("GET", "http://127.0.0.1:1/hello".to_string());

        let transport = ReqwestTransport::new().unwrap();
        let err = transport.perform(&req).await.unwrap_err();

        assert!(err.message.is_some());
    }

    #[tokio::test]
    async fn test_perform_rejects_invalid_method() {
        let req = request("NOT A METHOD", "http://127.0.0.1:1/".to_string());

        let transport = ReqwestTransport::new().unwrap();
        let err = transport.perform(&req).await.unwrap_err();

        assert!(err.to_string().contains("Invalid method"));
    }
}
