//! Response serializers: raw HTTP exchange in, typed result out.
//!
//! Every "respond with a typed object/array" call funnels through
//! [`MappableSerializer::serialize`], which runs these steps in order and stops at the
//! first failure:
//!
//! 1. A transport error is returned as-is ([`Error::Transport`]).
//! 2. An empty body is accepted only for allow-listed status codes or methods, and only
//!    if the target has an empty value; otherwise [`Error::EmptyBody`] or
//!    [`Error::InvalidEmptyResponse`].
//! 3. The body is parsed as JSON, scalars included ([`Error::Json`] on failure).
//! 4. The key path selects the subtree to map.
//! 5. The mapping strategy turns the subtree into the output ([`Error::Mapping`]).
//!
//! Transport and empty-body checks come before parsing, so a missing body after a
//! network failure is never reported as a mapping problem.
//!
//! # Examples
//!
//! ```rust
//! use respmap::mapper::{Map, Mappable};
//! use respmap::serializer::{self, ResponseSerializer};
//! use respmap::types::ResponseOptions;
//!
//! #[derive(Default)]
//! struct Forecast {
//!     day: Option<String>,
//! }
//!
//! impl Mappable for Forecast {
//!     fn mapping(&mut self, map: &Map<'_>) {
//!         map.bind(&mut self.day, "day");
//!     }
//! }
//!
//! let options: ResponseOptions = "data".into();
//! let forecasts = serializer::array::<Forecast>(&options);
//! let body = br#"{"data": [{"day": "Mon"}, {"day": "Tue"}]}"#;
//!
//! let forecasts = forecasts.serialize(None, None, Some(body), None).unwrap();
//! assert_eq!(forecasts.len(), 2);
//! ```

use std::any::type_name;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use crate::{
    error::{Error, MappingFailure, Result},
    formatter::{ClassFormatter, FormatterConfig},
    mapper::{ImmutableMappable, Mappable, Mapper},
    net::json::{self, KeyPath},
    types::{RequestInfo, ResponseInfo, ResponseOptions},
};

/// Turns one HTTP exchange into a typed result.
///
/// The HTTP client calls `serialize` exactly once per attached handler with the
/// request metadata, the response metadata, the body and the transport error, each of
/// which may be absent.
pub trait ResponseSerializer: Send + 'static {
    /// The value produced on success.
    type Output: Send + 'static;

    /// Serializes the exchange. Consumes the serializer.
    fn serialize(
        self,
        request: Option<&RequestInfo>,
        response: Option<&ResponseInfo>,
        data: Option<&[u8]>,
        error: Option<Arc<reqwest::Error>>,
    ) -> Result<Self::Output>;
}

/// How the extracted JSON becomes the output value.
///
/// One implementation per construction variant; the caller picks it through the
/// [`MappableSerializer`] constructor.
pub trait MappingStrategy {
    /// The value produced on success.
    type Output;

    /// Value returned for an acceptable empty body, if the output type has one.
    fn empty_value() -> Option<Self::Output>;

    /// Maps the extracted JSON (absent if the key path found nothing).
    fn map(self, mapper: &Mapper, json: Option<&Value>) -> Result<Self::Output>;
}

/// Constructs a new [`Mappable`] object.
pub struct MapObject<T>(PhantomData<fn() -> T>);

/// Populates a caller-supplied [`Mappable`] instance.
pub struct MapOnto<T>(T);

/// Constructs an [`ImmutableMappable`] object.
pub struct MapImmutable<T>(PhantomData<fn() -> T>);

/// Constructs an array of [`Mappable`] objects.
pub struct MapArray<T>(PhantomData<fn() -> T>);

/// Constructs an array of [`ImmutableMappable`] objects.
pub struct MapImmutableArray<T>(PhantomData<fn() -> T>);

impl<T: Mappable> MappingStrategy for MapObject<T> {
    type Output = T;

    fn empty_value() -> Option<T> {
        T::empty_value()
    }

    fn map(self, mapper: &Mapper, json: Option<&Value>) -> Result<T> {
        mapper.map(json).ok_or_else(|| Error::mapping(None))
    }
}

impl<T: Mappable> MappingStrategy for MapOnto<T> {
    type Output = T;

    fn empty_value() -> Option<T> {
        T::empty_value()
    }

    fn map(self, mapper: &Mapper, json: Option<&Value>) -> Result<T> {
        Ok(mapper.map_onto(json, self.0))
    }
}

impl<T: ImmutableMappable> MappingStrategy for MapImmutable<T> {
    type Output = T;

    fn empty_value() -> Option<T> {
        T::empty_value()
    }

    fn map(self, mapper: &Mapper, json: Option<&Value>) -> Result<T> {
        mapper
            .map_immutable(json)
            .map_err(|cause| Error::mapping(Some(cause)))
    }
}

impl<T: Mappable> MappingStrategy for MapArray<T> {
    type Output = Vec<T>;

    fn empty_value() -> Option<Vec<T>> {
        Some(Vec::new())
    }

    fn map(self, mapper: &Mapper, json: Option<&Value>) -> Result<Vec<T>> {
        mapper.map_array(json).ok_or_else(|| Error::mapping(None))
    }
}

impl<T: ImmutableMappable> MappingStrategy for MapImmutableArray<T> {
    type Output = Vec<T>;

    fn empty_value() -> Option<Vec<T>> {
        Some(Vec::new())
    }

    fn map(self, mapper: &Mapper, json: Option<&Value>) -> Result<Vec<T>> {
        mapper
            .map_immutable_array(json)
            .map_err(|cause| Error::mapping(Some(cause)))
    }
}

/// Renders the JSON as model stub source with [`ClassFormatter`].
///
/// Accepts an object, or a non-empty array whose first element is an object.
pub struct ClassStub {
    class_name: String,
    include_substructures: bool,
    config: FormatterConfig,
}

impl MappingStrategy for ClassStub {
    type Output = String;

    fn empty_value() -> Option<String> {
        None
    }

    fn map(self, _mapper: &Mapper, json: Option<&Value>) -> Result<String> {
        let object = match json {
            Some(Value::Object(object)) => Some(object),
            Some(Value::Array(items)) => items.first().and_then(Value::as_object),
            _ => None,
        };

        object
            .map(|object| {
                ClassFormatter::serialize(
                    object,
                    &self.class_name,
                    self.include_substructures,
                    &self.config,
                )
            })
            .ok_or_else(|| {
                Error::mapping(Some(MappingFailure::new(
                    "",
                    format!(
                        "could not convert {} to a JSON object",
                        json.map(crate::mapper::describe).unwrap_or("a missing value")
                    ),
                )))
            })
    }
}

/// The key-path + mapping + error-normalization pipeline.
///
/// Built from [`ResponseOptions`] through [`object`], [`onto`], [`immutable`], [`array`]
/// or [`immutable_array`].
pub struct MappableSerializer<S> {
    strategy: S,
    key_path: Option<KeyPath>,
    mapper: Mapper,
    empty_response_codes: HashSet<u16>,
    empty_request_methods: HashSet<Method>,
}

/// Serializer that constructs a new `T`.
pub fn object<T: Mappable>(options: &ResponseOptions) -> MappableSerializer<MapObject<T>> {
    MappableSerializer::new(MapObject(PhantomData), options)
}

/// Serializer that populates `object` and hands it back.
pub fn onto<T: Mappable>(object: T, options: &ResponseOptions) -> MappableSerializer<MapOnto<T>> {
    MappableSerializer::new(MapOnto(object), options)
}

/// Serializer that constructs a `T` from required fields.
pub fn immutable<T: ImmutableMappable>(
    options: &ResponseOptions,
) -> MappableSerializer<MapImmutable<T>> {
    MappableSerializer::new(MapImmutable(PhantomData), options)
}

/// Serializer that constructs a `Vec<T>` from a JSON array.
pub fn array<T: Mappable>(options: &ResponseOptions) -> MappableSerializer<MapArray<T>> {
    MappableSerializer::new(MapArray(PhantomData), options)
}

/// Serializer that constructs a `Vec<T>` from a JSON array of required fields.
pub fn immutable_array<T: ImmutableMappable>(
    options: &ResponseOptions,
) -> MappableSerializer<MapImmutableArray<T>> {
    MappableSerializer::new(MapImmutableArray(PhantomData), options)
}

/// Serializer that renders the response JSON as model stub source.
///
/// # Examples
///
/// ```rust
/// use respmap::formatter::FormatterConfig;
/// use respmap::serializer::{self, ResponseSerializer};
/// use respmap::types::ResponseOptions;
///
/// let stub = serializer::class_stub(
///     &ResponseOptions::from("data"),
///     "Forecast",
///     false,
///     FormatterConfig::default(),
/// );
/// let body = br#"{"data": [{"day": "Mon", "temperature": 50}]}"#;
///
/// let source = stub.serialize(None, None, Some(body), None).unwrap();
/// assert!(source.contains("pub temperature: Option<i64>,"));
/// ```
pub fn class_stub(
    options: &ResponseOptions,
    class_name: impl Into<String>,
    include_substructures: bool,
    config: FormatterConfig,
) -> MappableSerializer<ClassStub> {
    let strategy = ClassStub {
        class_name: class_name.into(),
        include_substructures,
        config,
    };
    MappableSerializer::new(strategy, options)
}

impl<S> MappableSerializer<S> {
    /// Creates a serializer running `strategy` with the given options.
    pub fn new(strategy: S, options: &ResponseOptions) -> Self {
        Self {
            strategy,
            key_path: options.key_path.clone().filter(|p| !p.is_empty()),
            mapper: Mapper::with_context(options.context.clone()),
            empty_response_codes: options.empty_response_codes.clone(),
            empty_request_methods: options.empty_request_methods.clone(),
        }
    }

    /// The key path this serializer maps from, if any.
    pub fn key_path(&self) -> Option<&KeyPath> {
        self.key_path.as_ref()
    }

    /// Whether an empty body is acceptable for this request/response pair.
    pub fn empty_response_allowed(
        &self,
        request: Option<&RequestInfo>,
        response: Option<&ResponseInfo>,
    ) -> bool {
        request.is_some_and(|r| self.empty_request_methods.contains(&r.method))
            || response.is_some_and(|r| self.empty_response_codes.contains(&r.status.as_u16()))
    }
}

impl<S: MappingStrategy> MappableSerializer<S> {
    fn serialize_empty(
        &self,
        request: Option<&RequestInfo>,
        response: Option<&ResponseInfo>,
    ) -> Result<S::Output> {
        if !self.empty_response_allowed(request, response) {
            tracing::debug!(
                status = ?response.map(|r| r.status),
                "empty body not allowed for this response"
            );
            return Err(Error::EmptyBody);
        }

        S::empty_value().ok_or_else(|| {
            tracing::debug!(target_type = type_name::<S::Output>(), "no empty value for type");
            Error::InvalidEmptyResponse {
                type_name: type_name::<S::Output>(),
            }
        })
    }
}

impl<S> ResponseSerializer for MappableSerializer<S>
where
    S: MappingStrategy + Send + 'static,
    S::Output: Send + 'static,
{
    type Output = S::Output;

    fn serialize(
        self,
        request: Option<&RequestInfo>,
        response: Option<&ResponseInfo>,
        data: Option<&[u8]>,
        error: Option<Arc<reqwest::Error>>,
    ) -> Result<S::Output> {
        if let Some(error) = error {
            tracing::debug!(error = %error, "transport error, skipping serialization");
            return Err(Error::Transport(error));
        }

        let data = match data {
            Some(data) if !data.is_empty() => data,
            _ => return self.serialize_empty(request, response),
        };

        let document = json::parse_document(data).inspect_err(|e| {
            tracing::debug!(error = %e, bytes = data.len(), "response body is not JSON");
        })?;

        let Self {
            strategy,
            key_path,
            mapper,
            ..
        } = self;

        let extracted = match &key_path {
            Some(path) => path.extract(&document),
            None => Some(&document),
        };
        if extracted.is_none() {
            tracing::trace!(key_path = ?key_path, "nothing at key path");
        }

        strategy.map(&mapper, extracted).map_err(|e| {
            tracing::debug!(error = %e, "mapping failed");
            match (e, &key_path) {
                (Error::Mapping { reason, cause }, Some(path)) => Error::Mapping {
                    reason,
                    cause: cause.map(|c| c.within(path.as_str())),
                },
                (e, _) => e,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mapper::{Empty, Map};
    use crate::types::ResponseOptionsBuilder;
    use reqwest::StatusCode;

    #[derive(Debug, Default, Clone)]
    struct Forecast {
        day: Option<String>,
    }

    impl Mappable for Forecast {
        fn mapping(&mut self, map: &Map<'_>) {
            map.bind(&mut self.day, "day");
        }
    }

    #[derive(Debug)]
    struct Day(String);

    impl ImmutableMappable for Day {
        fn from_map(map: &Map<'_>) -> std::result::Result<Self, crate::MappingFailure> {
            Ok(Day(map.value("day")?))
        }
    }

    fn get() -> RequestInfo {
        RequestInfo::new(Method::GET, "http://localhost/")
    }

    fn status(code: u16) -> ResponseInfo {
        ResponseInfo::new(StatusCode::from_u16(code).unwrap())
    }

    #[test]
    fn test_empty_body_rules() {
        let options = ResponseOptions::default();

        let ok = object::<Empty>(&options)
            .serialize(Some(&get()), Some(&status(204)), None, None);
        assert_eq!(ok.unwrap(), Empty);

        let head = RequestInfo::new(Method::HEAD, "http://localhost/");
        let ok = object::<Empty>(&options)
            .serialize(Some(&head), Some(&status(200)), Some(b""), None);
        assert!(ok.is_ok());

        let err = object::<Empty>(&options)
            .serialize(Some(&get()), Some(&status(200)), Some(b""), None)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyBody));

        let err = object::<Forecast>(&options)
            .serialize(Some(&get()), Some(&status(205)), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEmptyResponse { .. }));
        assert_eq!(err.kind(), ErrorKind::EmptyBody);

        let forecasts = array::<Forecast>(&options)
            .serialize(Some(&get()), Some(&status(204)), None, None)
            .unwrap();
        assert!(forecasts.is_empty());
    }

    #[test]
    fn test_custom_empty_codes() {
        let options = ResponseOptionsBuilder::default()
            .empty_response_codes([200u16])
            .build()
            .unwrap();
        let serializer = object::<Empty>(&options);
        assert!(serializer.empty_response_allowed(None, Some(&status(200))));
        assert!(!serializer.empty_response_allowed(None, Some(&status(204))));
        assert!(!serializer.empty_response_allowed(None, None));
    }

    #[test]
    fn test_parse_failure_is_data_serialization() {
        let err = object::<Forecast>(&ResponseOptions::default())
            .serialize(None, None, Some(b"{oops"), None)
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert_eq!(err.kind(), ErrorKind::DataSerializationFailed);
    }

    #[test]
    fn test_missing_key_path() {
        let options: ResponseOptions = "data.missing".into();
        let body = br#"{"data": {"day": "Mon"}}"#;

        let err = object::<Forecast>(&options)
            .serialize(None, None, Some(body), None)
            .unwrap_err();
        assert_eq!(err.failure_reason(), crate::error::MAPPING_FAILED_REASON);

        let kept = onto(
            Forecast {
                day: Some("Sun".into()),
            },
            &options,
        )
        .serialize(None, None, Some(body), None)
        .unwrap();
        assert_eq!(kept.day.as_deref(), Some("Sun"));

        let err = immutable::<Day>(&options)
            .serialize(None, None, Some(body), None)
            .unwrap_err();
        assert_eq!(err.mapping_cause().map(|c| c.path()), Some("data.missing"));
    }

    #[test]
    fn test_immutable_cause_is_prefixed_with_key_path() {
        let options: ResponseOptions = "data".into();
        let err = immutable_array::<Day>(&options)
            .serialize(None, None, Some(br#"{"data": [{"day": "Mon"}, {"day": 1}]}"#), None)
            .unwrap_err();
        assert_eq!(err.mapping_cause().map(|c| c.path()), Some("data[1].day"));
    }

    #[test]
    fn test_class_stub_rejects_non_objects() {
        let options = ResponseOptions::default();
        let err = class_stub(&options, "Root", false, FormatterConfig::default())
            .serialize(None, None, Some(b"[1, 2]"), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataSerializationFailed);
        assert!(err.to_string().contains("could not convert an array"));

        let err = class_stub(&options, "Root", false, FormatterConfig::default())
            .serialize(Some(&get()), Some(&status(204)), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEmptyResponse { .. }));
    }

    #[test]
    fn test_scalar_document() {
        let err = object::<Forecast>(&ResponseOptions::default())
            .serialize(None, None, Some(b"42"), None)
            .unwrap_err();
        assert!(matches!(err, Error::Mapping { .. }));
    }
}
