//! # respmap - Typed response mapping for async HTTP clients
//!
//! respmap turns raw HTTP responses into typed Rust values through a declarative,
//! per-type field mapping. It sits between a `reqwest` client and your model types:
//! the request runs once, every attached handler runs the same serialization
//! pipeline, and each completion callback receives exactly one typed result.
//!
//! ## Features
//!
//! - **Declarative mapping**: [`Mappable`] types list which JSON key feeds which field;
//!   [`ImmutableMappable`] types are built in one step from required fields
//! - **Key paths**: map only the envelope's payload (`"response.data"`)
//! - **Empty bodies**: `204`/`205` and `HEAD` responses map to an explicit empty value
//! - **Precise errors**: transport, empty body, parse and mapping failures are kept
//!   apart, and mapping failures name the offending field
//! - **Callback queues**: run completions inline, on a runtime, or on a serial queue
//! - **Stub generation**: [`ClassFormatter`] infers model structs from a sample document
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use respmap::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Forecast {
//!     day: Option<String>,
//!     temperature: Option<i64>,
//!     conditions: Option<String>,
//! }
//!
//! impl Mappable for Forecast {
//!     fn mapping(&mut self, map: &Map<'_>) {
//!         map.bind(&mut self.day, "day");
//!         map.bind(&mut self.temperature, "temperature");
//!         map.bind(&mut self.conditions, "conditions");
//!     }
//! }
//!
//! #[derive(Debug, Default)]
//! struct WeatherResponse {
//!     location: Option<String>,
//!     three_day_forecast: Option<Vec<Forecast>>,
//! }
//!
//! impl Mappable for WeatherResponse {
//!     fn mapping(&mut self, map: &Map<'_>) {
//!         map.bind(&mut self.location, "location");
//!         map.bind_array(&mut self.three_day_forecast, "three_day_forecast");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let request = HttpClient::new().get("https://api.example.com/weather");
//!
//!     request
//!         .response_object::<WeatherResponse, _>("response.data", |response| {
//!             match response.result {
//!                 Ok(weather) => println!("{:?}", weather.location),
//!                 Err(e) => eprintln!("{e}"),
//!             }
//!         })
//!         .response_array::<Forecast, _>("response.data.three_day_forecast", |response| {
//!             println!("{} forecasts", response.result.map(|f| f.len()).unwrap_or(0));
//!         });
//!
//!     request.finish().await;
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`mapper`]: the mapping engine (`Map`, `Mappable`, `ImmutableMappable`)
//! - [`serializer`]: the response pipeline and its mapping strategies
//! - [`response`]: attaching handlers to requests, execution contexts
//! - [`net`]: HTTP client, data requests, key paths and JSON parsing
//! - [`types`]: request/response metadata and per-call options
//! - [`formatter`]: model stub generation from sample JSON
//! - [`error`]: error handling

pub mod error;
pub mod formatter;
pub mod mapper;
pub mod net;
pub mod response;
pub mod serializer;
pub mod types;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use respmap::prelude::*;` statement.
///
/// # Example
///
/// ```rust
/// use respmap::prelude::*;
///
/// // Now you have access to:
/// // - HttpClient, DataRequest
/// // - Map, Mappable, ImmutableMappable, MapContext, Empty
/// // - ResponseOptions, ResponseOptionsBuilder, DataResponse
/// // - ExecutionContext, DispatchQueue
/// // - Error, ErrorKind, Result
/// ```
pub mod prelude {
    pub use crate::{
        error::{Error, ErrorKind, MappingFailure, Result},
        mapper::{Empty, ImmutableMappable, Map, MapContext, Mappable, Mapper},
        net::{DataRequest, HttpClient, json::KeyPath},
        response::{DispatchQueue, ExecutionContext, QueueRunner},
        types::{DataResponse, ResponseOptions, ResponseOptionsBuilder},
    };
}

// Re-export main types at crate root for direct access
pub use error::{Error, ErrorKind, MappingFailure, Result};
pub use formatter::{ClassFormatter, FormatterConfig};
pub use mapper::{Empty, ImmutableMappable, Map, MapContext, Mappable, Mapper};
pub use net::{DataRequest, HttpClient};
pub use serializer::ResponseSerializer;
pub use types::{DataResponse, ResponseOptions, ResponseOptionsBuilder};
