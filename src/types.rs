//! Core data types shared by the serializers and the response handlers.
//!
//! - [`RequestInfo`] - what was asked for (method, URL, headers)
//! - [`ResponseInfo`] - what came back (status, headers, final URL)
//! - [`DataResponse`] - everything a completion callback receives
//! - [`ResponseOptions`] - per-call configuration for attaching a handler
//!
//! # Examples
//!
//! ```rust
//! use respmap::types::{ResponseOptions, ResponseOptionsBuilder};
//!
//! let options = ResponseOptionsBuilder::default()
//!     .key_path("response.data")
//!     .build()
//!     .unwrap();
//! assert_eq!(options.key_path.as_ref().map(|p| p.as_str()), Some("response.data"));
//! assert!(options.empty_response_codes.contains(&204));
//! ```

use std::collections::HashSet;

use bytes::Bytes;
use derive_builder::Builder;
use reqwest::{Method, StatusCode, header::HeaderMap};

use crate::{
    error::{Error, Result},
    mapper::MapContext,
    net::json::KeyPath,
    response::ExecutionContext,
};

/// Status codes for which an empty body is acceptable by default.
pub const DEFAULT_EMPTY_RESPONSE_CODES: [u16; 2] = [204, 205];

/// Metadata of the request a response belongs to.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// HTTP method
    pub method: Method,

    /// Requested URL, as given (it may be invalid if the request never left)
    pub url: String,

    /// Headers sent with the request
    pub headers: HeaderMap,
}

impl RequestInfo {
    /// Creates request metadata without headers.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }
}

/// Metadata of a received HTTP response.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    /// Status code
    pub status: StatusCode,

    /// Response headers
    pub headers: HeaderMap,

    /// Final URL after redirects
    pub url: Option<url::Url>,
}

impl ResponseInfo {
    /// Creates response metadata with just a status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url: None,
        }
    }
}

impl From<&reqwest::Response> for ResponseInfo {
    fn from(response: &reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            url: Some(response.url().clone()),
        }
    }
}

/// Everything delivered to a completion callback.
///
/// `result` holds either the mapped value or the error; the other fields describe the
/// exchange it came from and are present whenever the HTTP client produced them.
#[derive(Debug)]
pub struct DataResponse<T> {
    /// The request that was sent
    pub request: RequestInfo,

    /// The response, absent when the transport failed before one arrived
    pub response: Option<ResponseInfo>,

    /// Raw body bytes
    pub data: Option<Bytes>,

    /// Mapped value or error
    pub result: Result<T>,
}

impl<T> DataResponse<T> {
    /// The mapped value, if mapping succeeded.
    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// The error, if mapping failed.
    pub fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }

    /// Consumes the response, keeping only the result.
    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

/// Per-call configuration for mapping a response.
///
/// Every field has a default: whole document, no context, inline dispatch, empty
/// bodies accepted for `204`/`205` and for `HEAD` requests.
///
/// # Examples
///
/// ```rust
/// use respmap::mapper::MapContext;
/// use respmap::types::ResponseOptionsBuilder;
///
/// let options = ResponseOptionsBuilder::default()
///     .key_path("data")
///     .context(MapContext::new("en_US"))
///     .build()
///     .unwrap();
/// assert!(options.context.is_some());
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ResponseOptions {
    /// Key path of the subtree to map; `None` maps the whole document
    #[builder(setter(into, strip_option), default)]
    pub key_path: Option<KeyPath>,

    /// Context forwarded to the mapping functions
    #[builder(setter(into, strip_option), default)]
    pub context: Option<MapContext>,

    /// Where the completion callback runs
    #[builder(default)]
    pub queue: ExecutionContext,

    /// Status codes for which an empty body is acceptable
    #[builder(default = "default_empty_response_codes()")]
    pub empty_response_codes: HashSet<u16>,

    /// Request methods for which an empty body is acceptable
    #[builder(default = "default_empty_request_methods()")]
    pub empty_request_methods: HashSet<Method>,
}

fn default_empty_response_codes() -> HashSet<u16> {
    DEFAULT_EMPTY_RESPONSE_CODES.into_iter().collect()
}

fn default_empty_request_methods() -> HashSet<Method> {
    HashSet::from([Method::HEAD])
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            key_path: None,
            context: None,
            queue: ExecutionContext::default(),
            empty_response_codes: default_empty_response_codes(),
            empty_request_methods: default_empty_request_methods(),
        }
    }
}

impl From<&str> for ResponseOptions {
    /// Creates options that map the subtree at the given key path.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use respmap::types::ResponseOptions;
    ///
    /// let options: ResponseOptions = "response.data".into();
    /// assert_eq!(options.key_path.unwrap().as_str(), "response.data");
    /// ```
    fn from(key_path: &str) -> Self {
        ResponseOptions {
            key_path: Some(KeyPath::from(key_path)),
            ..Default::default()
        }
    }
}

impl From<KeyPath> for ResponseOptions {
    fn from(key_path: KeyPath) -> Self {
        ResponseOptions {
            key_path: Some(key_path),
            ..Default::default()
        }
    }
}

impl From<ExecutionContext> for ResponseOptions {
    fn from(queue: ExecutionContext) -> Self {
        ResponseOptions {
            queue,
            ..Default::default()
        }
    }
}
