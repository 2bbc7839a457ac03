//! Declarative mapping of JSON objects onto typed Rust values.
//!
//! This module is the mapping engine the response serializers funnel into. Leaf values
//! are decoded with serde; the per-type [`Mappable::mapping`] function decides which
//! JSON key feeds which field.
//!
//! Target types declare one of two capabilities:
//!
//! - [`Mappable`] - default-constructed, then populated field by field. A field whose key
//!   is missing or whose value does not convert is left as it was. The same mapping
//!   function also populates an existing instance ([`Mapper::map_onto`]).
//! - [`ImmutableMappable`] - constructed in one step from required fields. Any missing
//!   field or type mismatch fails the whole construction with a [`MappingFailure`] that
//!   names the field path.
//!
//! # Examples
//!
//! ```rust
//! use respmap::mapper::{Map, Mappable, Mapper};
//! use serde_json::json;
//!
//! #[derive(Debug, Default)]
//! struct Forecast {
//!     day: Option<String>,
//!     temperature: Option<i64>,
//! }
//!
//! impl Mappable for Forecast {
//!     fn mapping(&mut self, map: &Map<'_>) {
//!         map.bind(&mut self.day, "day");
//!         map.bind(&mut self.temperature, "temperature");
//!     }
//! }
//!
//! let json = json!({"day": "Mon", "temperature": 50});
//! let forecast: Forecast = Mapper::new().map(Some(&json)).unwrap();
//! assert_eq!(forecast.day.as_deref(), Some("Mon"));
//! assert_eq!(forecast.temperature, Some(50));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::MappingFailure;
use crate::net::json::KeyPath;

type JsonObject = serde_json::Map<String, Value>;

/// Opaque, caller-supplied value forwarded to every mapping function.
///
/// The pipeline never looks inside; mapping functions read it back with
/// [`Map::context`].
///
/// # Examples
///
/// ```rust
/// use respmap::mapper::MapContext;
///
/// struct Locale(&'static str);
///
/// let context = MapContext::new(Locale("en_US"));
/// assert_eq!(context.get::<Locale>().map(|l| l.0), Some("en_US"));
/// assert!(context.get::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct MapContext(Arc<dyn Any + Send + Sync>);

impl MapContext {
    /// Wraps any thread-safe value as a mapping context.
    pub fn new<C: Any + Send + Sync>(value: C) -> Self {
        Self(Arc::new(value))
    }

    /// Returns the context as `C`, if that is what it holds.
    pub fn get<C: Any>(&self) -> Option<&C> {
        self.0.downcast_ref::<C>()
    }
}

impl fmt::Debug for MapContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MapContext(..)")
    }
}

/// A view over one JSON object during mapping.
///
/// Carries the optional [`MapContext`] and the path of the object inside the mapped
/// document, so failures can name the exact field.
#[derive(Debug, Clone)]
pub struct Map<'a> {
    value: &'a Value,
    object: &'a JsonObject,
    context: Option<&'a MapContext>,
    path: String,
}

impl<'a> Map<'a> {
    /// Creates a map over `value`, or `None` if it is not a JSON object.
    pub fn new(value: &'a Value, context: Option<&'a MapContext>) -> Option<Self> {
        Self::at(value, context, String::new())
    }

    fn at(value: &'a Value, context: Option<&'a MapContext>, path: String) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            value,
            object,
            context,
            path,
        })
    }

    /// The JSON object being mapped.
    pub fn json(&self) -> &'a JsonObject {
        self.object
    }

    /// Path of this object inside the mapped document; empty at the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the mapping context as `C`, if one was supplied and has that type.
    pub fn context<C: Any>(&self) -> Option<&'a C> {
        self.context.and_then(|c| c.get::<C>())
    }

    /// Looks up `key`, following dots through nested objects when the exact key is
    /// not present.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        match self.object.get(key) {
            Some(value) => Some(value),
            None if key.contains('.') => KeyPath::from(key).extract(self.value),
            None => None,
        }
    }

    fn field_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn child(&self, value: &'a Value, path: String) -> Result<Map<'a>, MappingFailure> {
        Self::at(value, self.context, path.clone()).ok_or_else(|| {
            MappingFailure::new(path, format!("expected a JSON object, found {}", describe(value)))
        })
    }

    /// Assigns the value at `key` to `field` if it is present, non-null and converts.
    ///
    /// Otherwise `field` keeps whatever it held. Returns whether it was assigned.
    pub fn bind<V: DeserializeOwned>(&self, field: &mut Option<V>, key: &str) -> bool {
        match self.convert(key) {
            Some(value) => {
                *field = Some(value);
                true
            }
            None => false,
        }
    }

    /// Like [`bind`](Map::bind), for fields that are not wrapped in `Option`.
    pub fn bind_value<V: DeserializeOwned>(&self, field: &mut V, key: &str) -> bool {
        match self.convert(key) {
            Some(value) => {
                *field = value;
                true
            }
            None => false,
        }
    }

    fn convert<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let value = self.get(key).filter(|v| !v.is_null())?;
        match V::deserialize(value) {
            Ok(converted) => Some(converted),
            Err(e) => {
                tracing::trace!(field = %self.field_path(key), error = %e, "field left unchanged");
                None
            }
        }
    }

    /// Maps the nested object at `key` onto `field` with its own [`Mappable`] mapping.
    ///
    /// An existing value is populated in place; otherwise a new one is constructed.
    pub fn bind_object<V: Mappable>(&self, field: &mut Option<V>, key: &str) -> bool {
        let Some(nested) = self.get(key).and_then(|v| self.child(v, self.field_path(key)).ok())
        else {
            return false;
        };

        match field {
            Some(existing) => existing.mapping(&nested),
            None => match V::init(&nested) {
                Some(mut created) => {
                    created.mapping(&nested);
                    *field = Some(created);
                }
                None => return false,
            },
        }
        true
    }

    /// Maps the array of objects at `key` onto `field`, element by element.
    ///
    /// Every element must map; otherwise `field` is left unchanged.
    pub fn bind_array<V: Mappable>(&self, field: &mut Option<Vec<V>>, key: &str) -> bool {
        let Some(elements) = self.get(key).and_then(Value::as_array) else {
            return false;
        };

        let base = self.field_path(key);
        let mapped: Option<Vec<V>> = elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                let nested = self.child(element, format!("{base}[{i}]")).ok()?;
                let mut created = V::init(&nested)?;
                created.mapping(&nested);
                Some(created)
            })
            .collect();

        match mapped {
            Some(values) => {
                *field = Some(values);
                true
            }
            None => false,
        }
    }

    /// Reads a required field.
    ///
    /// # Errors
    ///
    /// A [`MappingFailure`] naming the field when it is missing or does not convert.
    pub fn value<V: DeserializeOwned>(&self, key: &str) -> Result<V, MappingFailure> {
        let path = self.field_path(key);
        let value = self
            .get(key)
            .ok_or_else(|| MappingFailure::new(path.clone(), "missing required field"))?;
        decode(value, &path)
    }

    /// Reads an optional field: absent or null yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// A [`MappingFailure`] when the field is present but does not convert.
    pub fn optional_value<V: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<V>, MappingFailure> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode(value, &self.field_path(key)).map(Some),
        }
    }

    /// Constructs a required nested [`ImmutableMappable`] from the object at `key`.
    pub fn object<V: ImmutableMappable>(&self, key: &str) -> Result<V, MappingFailure> {
        let path = self.field_path(key);
        let value = self
            .get(key)
            .ok_or_else(|| MappingFailure::new(path.clone(), "missing required field"))?;
        V::from_map(&self.child(value, path)?)
    }

    /// Constructs a required array of nested [`ImmutableMappable`] values from `key`.
    pub fn array<V: ImmutableMappable>(&self, key: &str) -> Result<Vec<V>, MappingFailure> {
        let path = self.field_path(key);
        let value = self
            .get(key)
            .ok_or_else(|| MappingFailure::new(path.clone(), "missing required field"))?;
        let elements = value.as_array().ok_or_else(|| {
            MappingFailure::new(
                path.clone(),
                format!("expected a JSON array, found {}", describe(value)),
            )
        })?;

        elements
            .iter()
            .enumerate()
            .map(|(i, element)| V::from_map(&self.child(element, format!("{path}[{i}]"))?))
            .collect()
    }

    /// Decodes the whole object with serde, for types that derive `Deserialize`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use respmap::error::MappingFailure;
    /// use respmap::mapper::{ImmutableMappable, Map, Mapper};
    /// use serde::Deserialize;
    /// use serde_json::json;
    ///
    /// #[derive(Deserialize)]
    /// struct Forecast {
    ///     day: String,
    ///     temperature: i64,
    /// }
    ///
    /// impl ImmutableMappable for Forecast {
    ///     fn from_map(map: &Map<'_>) -> Result<Self, MappingFailure> {
    ///         map.deserialize()
    ///     }
    /// }
    ///
    /// let json = json!({"day": "Mon", "temperature": "hot"});
    /// let failure = Mapper::new().map_immutable::<Forecast>(Some(&json)).err().unwrap();
    /// assert_eq!(failure.path(), "temperature");
    /// ```
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, MappingFailure> {
        decode(self.value, &self.path)
    }
}

/// Decodes `value` with serde, reporting failures with `base` joined to the inner path.
fn decode<T: DeserializeOwned>(value: &Value, base: &str) -> Result<T, MappingFailure> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let inner = err.path().to_string();
        let path = match (base.is_empty(), inner.as_str()) {
            (_, ".") => base.to_string(),
            (true, _) => inner,
            (false, p) if p.starts_with('[') => format!("{base}{p}"),
            (false, p) => format!("{base}.{p}"),
        };
        MappingFailure::new(path, err.into_inner().to_string())
    })
}

/// Short description of a JSON value's type, for diagnostics.
pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A type that is default-constructed and then populated from JSON.
///
/// Populating never fails as a whole: each [`Map::bind`] call either assigns its field
/// or leaves it untouched. The same `mapping` function serves both construction and
/// populating an existing instance.
///
/// # Examples
///
/// ```rust
/// use respmap::mapper::{Map, Mappable};
///
/// #[derive(Default)]
/// struct WeatherResponse {
///     location: Option<String>,
///     date: Option<String>,
/// }
///
/// impl Mappable for WeatherResponse {
///     fn mapping(&mut self, map: &Map<'_>) {
///         map.bind(&mut self.location, "location");
///     }
/// }
/// ```
pub trait Mappable: Default {
    /// Failable construction before the mapping runs.
    ///
    /// Returning `None` rejects the JSON; the default accepts any object.
    fn init(_map: &Map<'_>) -> Option<Self> {
        Some(Self::default())
    }

    /// Populates fields from `map`.
    fn mapping(&mut self, map: &Map<'_>);

    /// Value delivered for an acceptable empty response body, if the type has one.
    fn empty_value() -> Option<Self> {
        None
    }
}

/// A type that is constructed in one step from required fields.
///
/// # Examples
///
/// ```rust
/// use respmap::error::MappingFailure;
/// use respmap::mapper::{ImmutableMappable, Map};
///
/// struct Forecast {
///     day: String,
///     temperature: i64,
///     conditions: Option<String>,
/// }
///
/// impl ImmutableMappable for Forecast {
///     fn from_map(map: &Map<'_>) -> Result<Self, MappingFailure> {
///         Ok(Self {
///             day: map.value("day")?,
///             temperature: map.value("temperature")?,
///             conditions: map.optional_value("conditions")?,
///         })
///     }
/// }
/// ```
pub trait ImmutableMappable: Sized {
    /// Constructs the value, failing on the first missing or mistyped field.
    fn from_map(map: &Map<'_>) -> Result<Self, MappingFailure>;

    /// Value delivered for an acceptable empty response body, if the type has one.
    fn empty_value() -> Option<Self> {
        None
    }
}

/// Target type for responses that carry no content.
///
/// Its empty value is itself, so a `204 No Content` maps to `Ok(Empty)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Empty;

impl Mappable for Empty {
    fn mapping(&mut self, _map: &Map<'_>) {}

    fn empty_value() -> Option<Self> {
        Some(Empty)
    }
}

impl ImmutableMappable for Empty {
    fn from_map(_map: &Map<'_>) -> Result<Self, MappingFailure> {
        Ok(Empty)
    }

    fn empty_value() -> Option<Self> {
        Some(Empty)
    }
}

/// Entry points of the mapping engine.
///
/// A mapper carries the optional [`MapContext`]; it holds no other state and can be
/// reused across calls.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    context: Option<MapContext>,
}

impl Mapper {
    /// Creates a mapper without a context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mapper that forwards `context` to every mapping function.
    pub fn with_context(context: Option<MapContext>) -> Self {
        Self { context }
    }

    /// The context forwarded to mapping functions.
    pub fn context(&self) -> Option<&MapContext> {
        self.context.as_ref()
    }

    /// Constructs and populates a `T`.
    ///
    /// Returns `None` when there is no JSON, it is not an object, or
    /// [`Mappable::init`] rejects it.
    pub fn map<T: Mappable>(&self, json: Option<&Value>) -> Option<T> {
        let map = Map::new(json?, self.context.as_ref())?;
        let mut object = T::init(&map)?;
        object.mapping(&map);
        Some(object)
    }

    /// Populates an existing instance and hands it back.
    ///
    /// Never fails: fields without a usable JSON value keep their current value, and
    /// a missing or non-object input leaves the instance untouched.
    pub fn map_onto<T: Mappable>(&self, json: Option<&Value>, mut object: T) -> T {
        match json.and_then(|j| Map::new(j, self.context.as_ref())) {
            Some(map) => object.mapping(&map),
            None => tracing::trace!("no JSON object to populate from, instance unchanged"),
        }
        object
    }

    /// Constructs a `T` from required fields.
    ///
    /// # Errors
    ///
    /// A [`MappingFailure`] when there is no JSON, it is not an object, or any required
    /// field is missing or mistyped.
    pub fn map_immutable<T: ImmutableMappable>(
        &self,
        json: Option<&Value>,
    ) -> Result<T, MappingFailure> {
        let json = json.ok_or_else(|| MappingFailure::new("", "no JSON value to map"))?;
        let map = Map::new(json, self.context.as_ref()).ok_or_else(|| {
            MappingFailure::new("", format!("expected a JSON object, found {}", describe(json)))
        })?;
        T::from_map(&map)
    }

    /// Constructs and populates one `T` per element of a JSON array.
    ///
    /// Returns `None` unless the input is an array and every element maps.
    pub fn map_array<T: Mappable>(&self, json: Option<&Value>) -> Option<Vec<T>> {
        json?
            .as_array()?
            .iter()
            .map(|element| self.map(Some(element)))
            .collect()
    }

    /// Constructs one `T` per element of a JSON array, all or nothing.
    ///
    /// # Errors
    ///
    /// A [`MappingFailure`] whose path starts with the failing element's index.
    pub fn map_immutable_array<T: ImmutableMappable>(
        &self,
        json: Option<&Value>,
    ) -> Result<Vec<T>, MappingFailure> {
        let json = json.ok_or_else(|| MappingFailure::new("", "no JSON value to map"))?;
        let elements = json.as_array().ok_or_else(|| {
            MappingFailure::new("", format!("expected a JSON array, found {}", describe(json)))
        })?;

        elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                let path = format!("[{i}]");
                let map = Map::at(element, self.context.as_ref(), path.clone()).ok_or_else(
                    || {
                        MappingFailure::new(
                            path,
                            format!("expected a JSON object, found {}", describe(element)),
                        )
                    },
                )?;
                T::from_map(&map)
            })
            .collect()
    }
}
