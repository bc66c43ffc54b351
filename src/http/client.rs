//! HTTP client with built-in retry logic and typed errors.

use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::cancel::Cancellation;
use super::executor::RequestExecutor;
use super::observe::{NoopObserver, Observer};
use super::response::{Reply, Response};
use super::retry::{RetryController, RetryPolicy};
use super::transport::{
    Credentials, Headers, Payload, ReqwestTransport, Transport, TransportRequest,
};
use crate::config::ClientConfig;
use crate::error::{self, Error, ErrorKind, base_extra};

/// Per-call settings for [`HttpClient::do_request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    pub data: Option<Payload>,
    /// Merged over the client's default headers.
    pub headers: Headers,
    /// Overrides the client's per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Return the decoded body instead of the response object.
    pub parse_output: bool,
    pub stream: bool,
    /// Added to the client's excluded kinds for this call only.
    pub no_retry_on: HashSet<ErrorKind>,
    pub cancel: Option<Cancellation>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            data: None,
            headers: Headers::new(),
            timeout: None,
            parse_output: true,
            stream: false,
            no_retry_on: HashSet::new(),
            cancel: None,
        }
    }
}

impl RequestOptions {
    /// Options with `parse_output` on and nothing else set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a query string parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Sets a raw request body.
    pub fn data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Adds a form field, turning the payload into a form if it was not one.
    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut fields = match self.data.take() {
            Some(Payload::Form(fields)) => fields,
            _ => BTreeMap::new(),
        };
        fields.insert(name.into(), value.into());
        self.data = Some(Payload::Form(fields));
        self
    }

    /// Adds a header, overriding a client default of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Overrides the client's per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether to return the decoded body instead of the response.
    pub fn parse_output(mut self, parse_output: bool) -> Self {
        self.parse_output = parse_output;
        self
    }

    /// Defer reading the body until the caller consumes it.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Never retry errors of `kind` for this call.
    pub fn no_retry_on(mut self, kind: ErrorKind) -> Self {
        self.no_retry_on.insert(kind);
        self
    }

    /// Lets the caller abort the call.
    pub fn cancel(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// HTTP client bound to one server.
///
/// Configuration is fixed at construction; a client can be shared between
/// tasks and cloned cheaply.
pub struct HttpClient<T: Transport = ReqwestTransport> {
    server: String,
    timeout: Duration,
    headers: Headers,
    auth: Option<Credentials>,
    ssl_verify: bool,
    retry: RetryPolicy,
    transport: Arc<T>,
    observer: Arc<dyn Observer>,
}

impl HttpClient {
    /// Creates a client using the reqwest transport.
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        Self::with_transport(config, ReqwestTransport::new()?)
    }
}

impl<T: Transport> HttpClient<T> {
    /// Creates a client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> anyhow::Result<Self> {
        Ok(Self {
            timeout: config.timeout_duration()?,
            retry: config.retry_policy()?,
            auth: config.credentials(),
            server: config.server,
            headers: config.headers,
            ssl_verify: config.ssl_verify,
            transport: Arc::new(transport),
            observer: Arc::new(NoopObserver),
        })
    }

    /// Replaces the default no-op observer.
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Base URL requests are sent to.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Default per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn auth(&self) -> Option<&Credentials> {
        self.auth.as_ref()
    }

    pub fn ssl_verify(&self) -> bool {
        self.ssl_verify
    }

    /// Retry policy applied to every call.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Builds the absolute URL for `path`.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server.trim_end_matches('/'), path)
    }

    /// Performs `method` on `path`, retrying failures per the client's
    /// policy.
    ///
    /// Returns the decoded body, or the response itself when
    /// `options.parse_output` is false. On terminal failure the classified
    /// error of the last attempt is returned.
    #[tracing::instrument(skip(self, options), fields(server = %self.server))]
    pub async fn do_request(
        &self,
        method: &str,
        path: &str,
        options: RequestOptions,
    ) -> Result<Reply, Error> {
        let request = TransportRequest {
            method: method.to_ascii_uppercase(),
            url: self.url_for(path),
            params: options.params,
            data: options.data,
            headers: merge_headers(&self.headers, &options.headers),
            auth: self.auth.clone(),
            timeout: options.timeout.unwrap_or(self.timeout),
            verify: self.ssl_verify,
            stream: options.stream,
        };
        let policy = self.retry.with_excluded(&options.no_retry_on);
        let extra = base_extra(&request.url, &self.server, &request.method);

        let executor =
            RequestExecutor::new(self.transport.as_ref(), self.observer.as_ref(), &self.server);
        let controller =
            RetryController::new(&policy, self.observer.as_ref(), options.cancel.as_ref());

        let response = controller
            .run(&request.method, &request.url, extra.clone(), || {
                executor.execute(&request)
            })
            .await?;

        if options.parse_output {
            parse_response(response, extra).await.map(Reply::Text)
        } else {
            Ok(Reply::Raw(response))
        }
    }

    /// GET `path` and return the body as text.
    pub async fn get(&self, path: &str) -> Result<String, Error> {
        let reply = self.do_request("GET", path, RequestOptions::new()).await?;
        Ok(reply.into_text().unwrap_or_default())
    }

    /// Performs the request and deserializes the JSON body.
    #[tracing::instrument(skip(self, options))]
    pub async fn request_json<D: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        options: RequestOptions,
    ) -> anyhow::Result<D> {
        let reply = self
            .do_request(method, path, options.parse_output(false))
            .await?;
        match reply {
            Reply::Raw(response) => response.json().await,
            Reply::Text(text) => Ok(serde_json::from_str(&text)?),
        }
    }
}

impl<T: Transport> Clone for HttpClient<T> {
    fn clone(&self) -> Self {
        Self {
            server: self.server.clone(),
            timeout: self.timeout,
            headers: self.headers.clone(),
            auth: self.auth.clone(),
            ssl_verify: self.ssl_verify,
            retry: self.retry.clone(),
            transport: Arc::clone(&self.transport),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<T: Transport> fmt::Display for HttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection: {}", self.server)
    }
}

impl<T: Transport> fmt::Debug for HttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("server", &self.server)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("auth", &self.auth)
            .field("ssl_verify", &self.ssl_verify)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Per-call headers win over defaults; names compare case-insensitively.
fn merge_headers(defaults: &Headers, overrides: &Headers) -> Headers {
    let mut merged: Headers = defaults
        .iter()
        .filter(|(name, _)| !overrides.keys().any(|o| o.eq_ignore_ascii_case(name)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

async fn parse_response(response: Response, extra: error::Extra) -> Result<String, Error> {
    response
        .text()
        .await
        .map_err(|e| error::transport_failure(e.message.as_deref(), extra).into())
}
