//! Common test utilities and fixtures
//!
//! Shared functionality used across all test modules: a loopback HTTP server that
//! replays a canned response, and the weather models the scenarios map onto.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use respmap::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const WEATHER_JSON: &str = r#"{"location":"NYC","three_day_forecast":[{"day":"Mon","temperature":50,"conditions":"Rain"}]}"#;

/// The weather document wrapped in a `response.data` envelope.
pub fn wrapped_weather_json() -> String {
    format!(r#"{{"response":{{"data":{WEATHER_JSON}}}}}"#)
}

/// A loopback server replaying one canned response to every connection.
pub struct TestServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        205 => "Reset Content",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Starts a server answering every request with `status` and `body`.
///
/// `204` responses carry neither a body nor a `Content-Length`; `HEAD` requests get
/// the headers only.
pub async fn serve(status: u16, body: impl Into<String>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let body = body.into();

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let body = body.clone();

            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            request.extend_from_slice(&chunk[..n]);
                            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }

                let mut response = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nConnection: close\r\n",
                    reason(status)
                );
                if status != 204 {
                    response.push_str(&format!("Content-Length: {}\r\n", body.len()));
                }
                response.push_str("\r\n");
                if status != 204 && !request.starts_with(b"HEAD") {
                    response.push_str(&body);
                }

                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    TestServer {
        url: format!("http://{addr}"),
        hits,
    }
}

/// A URL on which nothing listens.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Installs a test-friendly subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Forecast {
    pub day: Option<String>,
    pub temperature: Option<i64>,
    pub conditions: Option<String>,
}

impl Mappable for Forecast {
    fn mapping(&mut self, map: &Map<'_>) {
        map.bind(&mut self.day, "day");
        map.bind(&mut self.temperature, "temperature");
        map.bind(&mut self.conditions, "conditions");
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WeatherResponse {
    pub location: Option<String>,
    pub three_day_forecast: Option<Vec<Forecast>>,
}

impl Mappable for WeatherResponse {
    fn mapping(&mut self, map: &Map<'_>) {
        map.bind(&mut self.location, "location");
        map.bind_array(&mut self.three_day_forecast, "three_day_forecast");
    }
}

/// Forecast with required fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StrictForecast {
    pub day: String,
    pub temperature: i64,
    pub conditions: Option<String>,
}

impl ImmutableMappable for StrictForecast {
    fn from_map(map: &Map<'_>) -> std::result::Result<Self, MappingFailure> {
        Ok(Self {
            day: map.value("day")?,
            temperature: map.value("temperature")?,
            conditions: map.optional_value("conditions")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrictWeather {
    pub location: String,
    pub three_day_forecast: Vec<StrictForecast>,
}

impl ImmutableMappable for StrictWeather {
    fn from_map(map: &Map<'_>) -> std::result::Result<Self, MappingFailure> {
        Ok(Self {
            location: map.value("location")?,
            three_day_forecast: map.array("three_day_forecast")?,
        })
    }
}

/// The mapped value scenario A expects.
pub fn expected_weather() -> WeatherResponse {
    WeatherResponse {
        location: Some("NYC".to_string()),
        three_day_forecast: Some(vec![Forecast {
            day: Some("Mon".to_string()),
            temperature: Some(50),
            conditions: Some("Rain".to_string()),
        }]),
    }
}
