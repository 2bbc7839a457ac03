//! Error types and result handling for response mapping.
//!
//! Every serializer in respmap reports its outcome as a [`Result<T>`], which is a type
//! alias for `std::result::Result<T, Error>`. The callback attached to a request always
//! receives exactly one of these, never a panic.
//!
//! # Error Categories
//!
//! Errors fall into three machine-checkable kinds (see [`ErrorKind`]):
//!
//! - **Transport**: the HTTP client itself failed (connection, TLS, timeout)
//! - **Empty Body**: the response carried no bytes where content was required
//! - **Data Serialization Failed**: the bytes were not JSON, or the JSON could not be
//!   mapped onto the target type
//!
//! # Examples
//!
//! ```rust
//! use respmap::error::{Error, ErrorKind};
//!
//! let error = Error::mapping(None);
//! assert_eq!(error.kind(), ErrorKind::DataSerializationFailed);
//!
//! match error {
//!     Error::Transport(e) => println!("Network error: {}", e),
//!     Error::EmptyBody => println!("Nothing to map"),
//!     e => println!("Mapping error: {}", e.failure_reason()),
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Reason attached to every mapping-stage failure.
pub const MAPPING_FAILED_REASON: &str = "failed to map response";

/// Type alias for Results with respmap errors.
///
/// # Examples
///
/// ```rust
/// use respmap::{Error, Result};
///
/// fn example_with_error() -> Result<()> {
///     Err(Error::mapping(None))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The coarse category of an [`enum@Error`].
///
/// Callers that only need to branch on "what went wrong" should match on this
/// instead of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The HTTP client reported a network or protocol failure.
    Transport,
    /// The body was absent or zero-length and could not be accepted.
    EmptyBody,
    /// The body could not be parsed or mapped.
    DataSerializationFailed,
}

/// Comprehensive error type for every serializer outcome.
///
/// # Variants
///
/// * [`Transport`](Error::Transport) - errors from the underlying HTTP client
/// * [`EmptyBody`](Error::EmptyBody) - absent or zero-length body
/// * [`InvalidEmptyResponse`](Error::InvalidEmptyResponse) - empty body allowed, but the
///   target type has no empty value
/// * [`Json`](Error::Json) - the body is not valid JSON
/// * [`Mapping`](Error::Mapping) - the JSON could not be mapped onto the target type
#[derive(Error, Debug)]
pub enum Error {
    /// Network-related errors from the HTTP client.
    ///
    /// The error is shared, not copied: every handler attached to the same request
    /// receives the very same `reqwest::Error` instance.
    #[error("Transport error: {0}")]
    Transport(Arc<reqwest::Error>),

    /// The response body was absent or zero-length and neither the status code nor
    /// the request method is in the configured allow-list.
    #[error("Response could not be serialized, input data was empty")]
    EmptyBody,

    /// The empty body was acceptable, but the target type declares no empty value.
    #[error("Empty response could not be serialized to type: {type_name}")]
    InvalidEmptyResponse { type_name: &'static str },

    /// The response body could not be parsed as JSON.
    ///
    /// The parser's error is kept as the source; it is never swallowed.
    #[error("JSON could not be serialized: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON was parsed but could not be mapped onto the target type.
    ///
    /// # Fields
    ///
    /// * `reason` - Human-readable reason, always [`MAPPING_FAILED_REASON`]
    /// * `cause` - Field-level diagnostic from the mapping engine, when it produced one
    #[error("{reason}{}", cause_suffix(.cause))]
    Mapping {
        reason: String,
        cause: Option<MappingFailure>,
    },
}

fn cause_suffix(cause: &Option<MappingFailure>) -> String {
    cause.as_ref().map(|c| format!(": {c}")).unwrap_or_default()
}

impl Error {
    /// Creates a mapping-stage error, optionally carrying the engine's diagnostic.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use respmap::error::{Error, MappingFailure};
    ///
    /// let error = Error::mapping(Some(MappingFailure::new("forecast.day", "missing field")));
    /// assert!(error.to_string().contains("forecast.day"));
    /// ```
    pub fn mapping(cause: Option<MappingFailure>) -> Self {
        Error::Mapping {
            reason: MAPPING_FAILED_REASON.to_string(),
            cause,
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::EmptyBody | Error::InvalidEmptyResponse { .. } => ErrorKind::EmptyBody,
            Error::Json(_) | Error::Mapping { .. } => ErrorKind::DataSerializationFailed,
        }
    }

    /// Returns the human-readable reason string.
    ///
    /// For transport and parse errors this is the underlying error's message.
    pub fn failure_reason(&self) -> String {
        match self {
            Error::Transport(e) => e.to_string(),
            Error::Json(e) => e.to_string(),
            Error::Mapping { reason, .. } => reason.clone(),
            e => e.to_string(),
        }
    }

    /// Returns the transport error, if this is one.
    pub fn transport(&self) -> Option<&reqwest::Error> {
        match self {
            Error::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Returns the mapping engine's diagnostic, if one was preserved.
    pub fn mapping_cause(&self) -> Option<&MappingFailure> {
        match self {
            Error::Mapping { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Transport(Arc::new(error))
    }
}

impl From<Arc<reqwest::Error>> for Error {
    fn from(error: Arc<reqwest::Error>) -> Self {
        Error::Transport(error)
    }
}

/// A field-level diagnostic produced by the mapping engine.
///
/// Carries the dotted path of the offending field (`three_day_forecast[1].day`) and a
/// message describing what was expected versus what was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingFailure {
    path: String,
    message: String,
}

impl MappingFailure {
    /// Creates a failure for the field at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Dotted path of the field that failed; empty for the document root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// What went wrong at that path.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prepends `prefix` to the path, used when bubbling out of nested structures.
    pub(crate) fn within(mut self, prefix: &str) -> Self {
        if prefix.is_empty() {
            return self;
        }
        self.path = if self.path.is_empty() {
            prefix.to_string()
        } else if self.path.starts_with('[') {
            format!("{prefix}{}", self.path)
        } else {
            format!("{prefix}.{}", self.path)
        };
        self
    }
}

impl fmt::Display for MappingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "at `{}`: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for MappingFailure {}
