use std::collections::HashSet;
use std::sync::Arc;

use reqwest::{Method, StatusCode};
use respmap::net::json::{self, KeyPath};
use respmap::prelude::*;
use respmap::serializer::{self, ResponseSerializer};
use respmap::types::{RequestInfo, ResponseInfo};
use serde_json::json;

mod common;
use common::{
    Forecast, StrictForecast, StrictWeather, WEATHER_JSON, WeatherResponse, expected_weather,
    wrapped_weather_json,
};

fn get_request() -> RequestInfo {
    RequestInfo::new(Method::GET, "http://localhost/weather")
}

fn with_status(code: u16) -> ResponseInfo {
    ResponseInfo::new(StatusCode::from_u16(code).unwrap())
}

fn transport_error() -> Arc<reqwest::Error> {
    Arc::new(reqwest::Client::new().get("not a url").build().unwrap_err())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_options_builder() {
        let options = ResponseOptionsBuilder::default()
            .key_path("response.data")
            .context(MapContext::new(42u32))
            .empty_response_codes([204u16, 304])
            .empty_request_methods([Method::HEAD, Method::OPTIONS])
            .build()
            .unwrap();

        assert_eq!(options.key_path, Some(KeyPath::from("response.data")));
        assert_eq!(options.context.as_ref().and_then(|c| c.get::<u32>()), Some(&42));
        assert_eq!(options.empty_response_codes, HashSet::from([204, 304]));
        assert!(options.empty_request_methods.contains(&Method::OPTIONS));
        assert!(matches!(options.queue, ExecutionContext::Inline));

        let defaults = ResponseOptions::default();
        assert!(defaults.key_path.is_none());
        assert_eq!(defaults.empty_response_codes, HashSet::from([204, 205]));
        assert_eq!(defaults.empty_request_methods, HashSet::from([Method::HEAD]));
    }

    #[test]
    fn test_key_path_totality() {
        let doc = json!({"a": {"b": {"c": [1, 2]}, "s": "x"}});

        assert_eq!(json::extract_path(&doc, None), Some(&doc));
        assert_eq!(json::extract_path(&doc, Some("a.b.c")), Some(&json!([1, 2])));
        assert_eq!(json::extract_path(&doc, Some("a.s.deeper")), None);
        assert_eq!(json::extract_path(&doc, Some("a.missing")), None);
        assert_eq!(json::extract_path(&doc, Some("a.b.c.0")), None);
    }

    #[test]
    fn test_scenario_a_whole_document() {
        let weather = serializer::object::<WeatherResponse>(&ResponseOptions::default())
            .serialize(None, None, Some(WEATHER_JSON.as_bytes()), None)
            .unwrap();
        assert_eq!(weather, expected_weather());
    }

    #[test]
    fn test_scenario_b_key_path() {
        let body = wrapped_weather_json();
        let weather = serializer::object::<WeatherResponse>(&"response.data".into())
            .serialize(None, None, Some(body.as_bytes()), None)
            .unwrap();
        assert_eq!(weather, expected_weather());
    }

    #[test]
    fn test_scenario_c_empty_sentinel() {
        let options = ResponseOptions::default();

        let empty = serializer::object::<Empty>(&options)
            .serialize(Some(&get_request()), Some(&with_status(204)), None, None)
            .unwrap();
        assert_eq!(empty, Empty);

        let forecasts = serializer::array::<Forecast>(&options)
            .serialize(Some(&get_request()), Some(&with_status(204)), Some(b""), None)
            .unwrap();
        assert!(forecasts.is_empty());

        let strict = serializer::immutable_array::<StrictForecast>(&options)
            .serialize(Some(&get_request()), Some(&with_status(205)), None, None)
            .unwrap();
        assert!(strict.is_empty());
    }

    #[test]
    fn test_scenario_d_empty_body_not_allowed() {
        let err = serializer::object::<Empty>(&ResponseOptions::default())
            .serialize(Some(&get_request()), Some(&with_status(200)), Some(b""), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyBody);
        assert!(matches!(err, Error::EmptyBody));

        let err = serializer::array::<Forecast>(&ResponseOptions::default())
            .serialize(Some(&get_request()), None, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyBody));
    }

    #[test]
    fn test_scenario_e_array_expected() {
        let err = serializer::array::<Forecast>(&ResponseOptions::default())
            .serialize(None, None, Some(br#"{"day":"Mon"}"#), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataSerializationFailed);
        assert_eq!(err.failure_reason(), "failed to map response");

        let err = serializer::immutable_array::<StrictForecast>(&ResponseOptions::default())
            .serialize(None, None, Some(br#"{"day":"Mon"}"#), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataSerializationFailed);
        assert!(err.mapping_cause().unwrap().message().contains("an object"));
    }

    #[test]
    fn test_transport_error_short_circuits() {
        let error = transport_error();
        let err = serializer::object::<WeatherResponse>(&ResponseOptions::default())
            .serialize(
                Some(&get_request()),
                None,
                Some(b"{definitely not json"),
                Some(error.clone()),
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        match err {
            Error::Transport(e) => assert!(Arc::ptr_eq(&e, &error)),
            other => panic!("expected a transport error, got {other:?}"),
        }

        let err = serializer::object::<Empty>(&ResponseOptions::default())
            .serialize(Some(&get_request()), Some(&with_status(204)), None, Some(error.clone()))
            .unwrap_err();
        assert_eq!(err.failure_reason(), error.to_string());
    }

    #[test]
    fn test_parse_error_is_wrapped() {
        let err = serializer::object::<WeatherResponse>(&ResponseOptions::default())
            .serialize(None, None, Some(b"<html>"), None)
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert_eq!(err.kind(), ErrorKind::DataSerializationFailed);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_array_all_or_nothing() {
        let body = br#"[{"day":"Mon"}, "not an object", {"day":"Wed"}]"#;
        let err = serializer::array::<Forecast>(&ResponseOptions::default())
            .serialize(None, None, Some(body), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataSerializationFailed);

        let body = br#"[{"day":"Mon","temperature":1},{"day":"Tue"}]"#;
        let err = serializer::immutable_array::<StrictForecast>(&ResponseOptions::default())
            .serialize(None, None, Some(body), None)
            .unwrap_err();
        assert_eq!(err.mapping_cause().unwrap().path(), "[1].temperature");
    }

    #[test]
    fn test_populate_in_place_keeps_missing_fields() {
        let existing = Forecast {
            day: Some("Sun".to_string()),
            temperature: Some(10),
            conditions: Some("Fog".to_string()),
        };

        let updated = serializer::onto(existing.clone(), &ResponseOptions::default())
            .serialize(None, None, Some(br#"{"temperature": 12}"#), None)
            .unwrap();
        assert_eq!(updated.day.as_deref(), Some("Sun"));
        assert_eq!(updated.temperature, Some(12));
        assert_eq!(updated.conditions.as_deref(), Some("Fog"));

        let untouched = serializer::onto(existing.clone(), &"nowhere".into())
            .serialize(None, None, Some(br#"{"temperature": 12}"#), None)
            .unwrap();
        assert_eq!(untouched, existing);
    }

    #[test]
    fn test_immutable_failure_names_the_field() {
        let body = wrapped_weather_json().replace("50", "\"warm\"");
        let err = serializer::immutable::<StrictWeather>(&"response.data".into())
            .serialize(None, None, Some(body.as_bytes()), None)
            .unwrap_err();

        let cause = err.mapping_cause().unwrap();
        assert_eq!(cause.path(), "response.data.three_day_forecast[0].temperature");
        assert!(err.to_string().starts_with("failed to map response: at `response.data"));

        let ok = serializer::immutable::<StrictWeather>(&"response.data".into())
            .serialize(None, None, Some(wrapped_weather_json().as_bytes()), None)
            .unwrap();
        assert_eq!(ok.location, "NYC");
        assert_eq!(ok.three_day_forecast[0].temperature, 50);
        assert_eq!(ok.three_day_forecast[0].conditions.as_deref(), Some("Rain"));
    }

    #[test]
    fn test_context_reaches_mapping() {
        #[derive(Debug, Default)]
        struct Localized {
            greeting: Option<String>,
        }

        impl Mappable for Localized {
            fn mapping(&mut self, map: &Map<'_>) {
                let key = match map.context::<&'static str>() {
                    Some(&"fr") => "fr",
                    _ => "en",
                };
                map.bind(&mut self.greeting, key);
            }
        }

        let options = ResponseOptionsBuilder::default()
            .context(MapContext::new("fr"))
            .build()
            .unwrap();
        let localized = serializer::object::<Localized>(&options)
            .serialize(None, None, Some(br#"{"en":"hello","fr":"bonjour"}"#), None)
            .unwrap();
        assert_eq!(localized.greeting.as_deref(), Some("bonjour"));
    }

    #[test]
    fn test_every_input_yields_one_result() {
        let bodies: [Option<&[u8]>; 6] = [
            None,
            Some(b""),
            Some(b"null"),
            Some(b"[]"),
            Some(b"{}"),
            Some(b"{broken"),
        ];

        for body in bodies {
            for status in [200, 204] {
                let result = serializer::object::<WeatherResponse>(&ResponseOptions::default())
                    .serialize(Some(&get_request()), Some(&with_status(status)), body, None);
                assert!(result.is_ok() != result.is_err());
            }
        }
    }
}
