//! HTTP plumbing: a pooled client and the in-flight request handle.
//!
//! This module provides the networking side of respmap:
//!
//! - **HTTP Client**: a global, configured `reqwest` client with connection pooling,
//!   wrapped by [`HttpClient`] for default headers and a base URL
//! - **Data Requests**: [`DataRequest`], one request executed at most once, whose
//!   outcome fans out to every handler attached to it
//! - **JSON utilities**: key-path extraction and lenient parsing in [`json`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use respmap::mapper::{Map, Mappable};
//! use respmap::net::HttpClient;
//!
//! #[derive(Debug, Default)]
//! struct Weather {
//!     location: Option<String>,
//! }
//!
//! impl Mappable for Weather {
//!     fn mapping(&mut self, map: &Map<'_>) {
//!         map.bind(&mut self.location, "location");
//!     }
//! }
//!
//! # async fn example() {
//! let client = HttpClient::new().with_header("Accept", "application/json");
//!
//! let request = client.get("https://api.example.com/weather");
//! request.response_object::<Weather, _>("response.data", |response| {
//!     println!("{:?}", response.result);
//! });
//! request.finish().await;
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reqwest::{Client, Method, header::HeaderMap};
use tokio::task::JoinHandle;
use url::Url;

use crate::types::{RequestInfo, ResponseInfo};

pub mod json;

/// Global HTTP client instance with optimized configuration.
///
/// This client is configured with:
/// - 30-second timeout
/// - Connection pooling (10 idle connections per host)
/// - Compression support (gzip, brotli)
/// - Custom User-Agent header
///
/// The client is created lazily on first use and shared by every [`HttpClient`] that
/// does not bring its own.
static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("respmap/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .gzip(true)
        .brotli(true)
        .build()
        .expect("Failed to build HTTP client")
});

/// HTTP client wrapper that hands out [`DataRequest`]s.
///
/// Cloning is cheap; clones share the underlying connection pool.
///
/// # Examples
///
/// ```rust
/// use respmap::net::HttpClient;
/// use url::Url;
///
/// let client = HttpClient::new()
///     .with_base_url(Url::parse("https://api.example.com/v1/").unwrap())
///     .with_header("Authorization", "Bearer token");
/// ```
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    base_url: Option<Url>,
    headers: HeaderMap,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client backed by the shared connection pool, without default headers.
    pub fn new() -> Self {
        Self {
            client: CLIENT.clone(),
            base_url: None,
            headers: HeaderMap::new(),
        }
    }

    /// Replaces the underlying `reqwest` client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Resolves relative request URLs against `base_url`.
    ///
    /// Absolute URLs passed to the request methods are used as they are.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Adds a header to every request made by this client.
    ///
    /// Invalid header names or values are ignored.
    ///
    /// # Parameters
    ///
    /// * `name` - Header name
    /// * `value` - Header value
    ///
    /// # Examples
    ///
    /// ```rust
    /// use respmap::net::HttpClient;
    ///
    /// let client = HttpClient::new()
    ///     .with_header("Accept", "application/json")
    ///     .with_header("X-Api-Key", "secret");
    /// ```
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.parse::<reqwest::header::HeaderName>(),
            value.parse::<reqwest::header::HeaderValue>(),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Starts a `GET` request.
    pub fn get(&self, url: &str) -> DataRequest {
        self.request(Method::GET, url)
    }

    /// Starts a `POST` request without a body.
    pub fn post(&self, url: &str) -> DataRequest {
        self.request(Method::POST, url)
    }

    /// Starts a `PUT` request without a body.
    pub fn put(&self, url: &str) -> DataRequest {
        self.request(Method::PUT, url)
    }

    /// Starts a `DELETE` request.
    pub fn delete(&self, url: &str) -> DataRequest {
        self.request(Method::DELETE, url)
    }

    /// Starts a `HEAD` request. Its empty body is accepted by default.
    pub fn head(&self, url: &str) -> DataRequest {
        self.request(Method::HEAD, url)
    }

    /// Starts a request with any method.
    ///
    /// Nothing is sent until the first handler attached to the returned
    /// [`DataRequest`] runs. An invalid URL does not panic: it is delivered to the
    /// handlers as a transport error.
    pub fn request(&self, method: Method, url: &str) -> DataRequest {
        let url = self.resolve(url);
        let request = self
            .client
            .request(method.clone(), url.as_str())
            .headers(self.headers.clone())
            .build();

        let info = RequestInfo {
            method,
            url,
            headers: self.headers.clone(),
        };
        DataRequest::new(info, perform(self.client.clone(), request))
    }

    /// Sends a fully built `reqwest` request, for bodies and per-request settings.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use respmap::net::HttpClient;
    ///
    /// # async fn example() -> Result<(), reqwest::Error> {
    /// let client = HttpClient::new();
    /// let raw = reqwest::Client::new()
    ///     .post("https://api.example.com/search")
    ///     .json(&serde_json::json!({"query": "rain"}))
    ///     .build()?;
    /// let request = client.execute(raw);
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute(&self, mut request: reqwest::Request) -> DataRequest {
        for (name, value) in &self.headers {
            if !request.headers().contains_key(name) {
                request.headers_mut().insert(name.clone(), value.clone());
            }
        }

        let info = RequestInfo {
            method: request.method().clone(),
            url: request.url().to_string(),
            headers: request.headers().clone(),
        };
        DataRequest::new(info, perform(self.client.clone(), Ok(request)))
    }

    fn resolve(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) => base
                .join(url)
                .map(String::from)
                .unwrap_or_else(|_| url.to_string()),
            None => url.to_string(),
        }
    }
}

/// The raw outcome of one HTTP exchange, shared by every attached handler.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub(crate) response: Option<ResponseInfo>,
    pub(crate) data: Option<Bytes>,
    pub(crate) error: Option<Arc<reqwest::Error>>,
}

type Outcome = Shared<BoxFuture<'static, Arc<RawResponse>>>;

async fn perform(client: Client, request: reqwest::Result<reqwest::Request>) -> Arc<RawResponse> {
    let sent = match request {
        Ok(request) => {
            tracing::debug!(method = %request.method(), url = %request.url(), "sending request");
            client.execute(request).await
        }
        Err(e) => Err(e),
    };

    let raw = match sent {
        Ok(response) => {
            let info = ResponseInfo::from(&response);
            match response.bytes().await {
                Ok(data) => {
                    tracing::debug!(status = %info.status, bytes = data.len(), "response received");
                    RawResponse {
                        response: Some(info),
                        data: Some(data),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::debug!(status = %info.status, error = %e, "failed to read response body");
                    RawResponse {
                        response: Some(info),
                        data: None,
                        error: Some(Arc::new(e)),
                    }
                }
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "request failed");
            RawResponse {
                response: None,
                data: None,
                error: Some(Arc::new(e)),
            }
        }
    };

    Arc::new(raw)
}

/// One HTTP request and the handlers attached to it.
///
/// The request runs at most once, however many handlers are attached; each handler
/// serializes the same raw outcome independently. Cloning yields another handle to
/// the same request.
///
/// Handlers are attached with the `response*` methods (see [`crate::response`]) and
/// run on the tokio runtime. [`finish`](DataRequest::finish) waits for all of them.
/// Until it is called, every attached handler's task handle is kept, so a long-lived
/// request that is never finished holds one handle per attachment.
#[derive(Clone)]
pub struct DataRequest {
    info: Arc<RequestInfo>,
    outcome: Outcome,
    handlers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl DataRequest {
    fn new<F>(info: RequestInfo, outcome: F) -> Self
    where
        F: Future<Output = Arc<RawResponse>> + Send + 'static,
    {
        Self {
            info: Arc::new(info),
            outcome: outcome.boxed().shared(),
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Metadata of this request.
    pub fn info(&self) -> &RequestInfo {
        &self.info
    }

    pub(crate) async fn outcome(&self) -> Arc<RawResponse> {
        self.outcome.clone().await
    }

    pub(crate) fn push_handler(&self, handle: JoinHandle<()>) {
        self.handlers.lock().push(handle);
    }

    /// Waits until every handler attached so far has serialized and dispatched its
    /// callback.
    ///
    /// Handlers attached while waiting are waited for too. Callbacks sent to an
    /// [`ExecutionContext::Queue`](crate::response::ExecutionContext::Queue) are
    /// enqueued, not necessarily run, when this returns.
    pub async fn finish(&self) {
        loop {
            let pending = std::mem::take(&mut *self.handlers.lock());
            if pending.is_empty() {
                break;
            }

            for result in join_all(pending).await {
                if let Err(e) = result {
                    tracing::warn!(url = %self.info.url, error = %e, "response handler did not complete");
                }
            }
        }
    }
}

impl std::fmt::Debug for DataRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRequest")
            .field("info", &self.info)
            .field("handlers", &self.handlers.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_resolution() {
        let client = HttpClient::new()
            .with_base_url(Url::parse("https://api.example.com/v1/").unwrap());
        assert_eq!(client.resolve("weather"), "https://api.example.com/v1/weather");
        assert_eq!(
            client.resolve("https://other.example.com/x"),
            "https://other.example.com/x"
        );
        assert_eq!(HttpClient::new().resolve("weather"), "weather");
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let client = HttpClient::new()
            .with_header("X-Good", "yes")
            .with_header("bad header", "no");
        assert_eq!(client.headers.len(), 1);
        assert_eq!(client.headers["x-good"], "yes");
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_transport_error() {
        let request = HttpClient::new().get("not a url");
        assert_eq!(request.info().method, Method::GET);

        let raw = request.outcome().await;
        assert!(raw.error.is_some());
        assert!(raw.response.is_none());
    }
}
