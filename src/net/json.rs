//! JSON parsing and key-path extraction for response bodies.
//!
//! Responses often wrap the interesting payload in an envelope
//! (`{"response": {"data": {...}}}`). A [`KeyPath`] addresses that payload with
//! dot notation so only the subtree is handed to the mapping engine.
//!
//! Segments are always object keys. Array indices (`items.0.name`) and escaped dots
//! inside a key are not supported: a segment that meets an array simply finds nothing.
//!
//! # Examples
//!
//! ```rust
//! use respmap::net::json::{self, KeyPath};
//! use serde_json::json;
//!
//! let data = json!({
//!     "response": {
//!         "data": {"location": "NYC"}
//!     }
//! });
//!
//! let path = KeyPath::from("response.data");
//! assert_eq!(path.extract(&data), Some(&json!({"location": "NYC"})));
//! assert_eq!(json::extract_path(&data, Some("response.missing")), None);
//! assert_eq!(json::extract_path(&data, None), Some(&data));
//! ```

use std::fmt;

use serde_json::Value;

/// A dot-separated path addressing a nested location inside a JSON document.
///
/// An empty key path addresses the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath(String);

impl KeyPath {
    /// Creates a key path from its dotted string form.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the dotted string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this path addresses the whole document.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the individual key segments.
    ///
    /// An empty path yields no segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|_| !self.0.is_empty())
    }

    /// Follows this path through nested objects of `document`.
    ///
    /// Returns the document itself when the path is empty, and `None` as soon as a
    /// segment is missing or the current value is not an object.
    pub fn extract<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let mut current = document;

        for key in self.segments() {
            current = current.as_object()?.get(key)?;
        }

        Some(current)
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl From<String> for KeyPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts the subtree of `document` addressed by an optional dotted path.
///
/// # Parameters
///
/// * `document` - The parsed JSON document
/// * `path` - Dot-separated path (e.g. `"response.data"`); `None` or `""` selects the
///   whole document
///
/// # Returns
///
/// * `Some(&Value)` - The subtree at the path
/// * `None` - If any segment is missing or lands on a non-object
///
/// # Examples
///
/// ```rust
/// use respmap::net::json;
/// use serde_json::json;
///
/// let data = json!({"response": {"city": {"name": "Paris"}}});
///
/// let name = json::extract_path(&data, Some("response.city.name"));
/// assert_eq!(name.and_then(|v| v.as_str()), Some("Paris"));
///
/// let missing = json::extract_path(&data, Some("response.city.country"));
/// assert_eq!(missing, None);
/// ```
pub fn extract_path<'a>(document: &'a Value, path: Option<&str>) -> Option<&'a Value> {
    match path {
        Some(path) if !path.is_empty() => KeyPath::from(path).extract(document),
        _ => Some(document),
    }
}

/// Parses a response body as JSON.
///
/// Parsing is lenient about the top level: a bare scalar (`42`, `"ok"`, `null`) is
/// accepted just like an object or array.
///
/// # Errors
///
/// * [`Error::Json`](crate::Error::Json) - If the bytes are not valid JSON
pub fn parse_document(bytes: &[u8]) -> crate::Result<Value> {
    serde_json::from_slice(bytes).map_err(Into::into)
}
