//! A small client for tracking metrics, events and traces in [Azure Application Insights].
//!
//! [Azure Application Insights]: https://docs.microsoft.com/en-us/azure/azure-monitor/app/app-insights-overview
//!
//! **Disclaimer**: This is not an official Microsoft product.
//!
//! # Usage
//!
//! Create a [`TelemetryClient`] once at startup and share it. The instrumentation key is either
//! passed explicitly or read from the `ApplicationInsights.InstrumentationKey` setting of a
//! [`ConfigurationProvider`]:
//!
//! ```no_run
//! # #[cfg(feature = "reqwest-client")] {
//! use application_insights_telemetry::{Environment, Properties, SeverityLevel, TelemetryClient};
//!
//! let client = TelemetryClient::new("", &Environment, reqwest::blocking::Client::new())
//!     .expect("instrumentation key is configured");
//!
//! let mut properties = Properties::new();
//! properties.insert("env".into(), "prod".into());
//! client.track_event("Deploy.Started", &properties).unwrap();
//! client
//!     .track_trace("deploying 3 services", SeverityLevel::Information, &properties)
//!     .unwrap();
//! client.flush();
//! # }
//! ```
//!
//! Tracking methods only validate their arguments and hand the item to a [`Transport`]. Blank
//! names and messages are rejected with an [`InvalidArgumentError`] and nothing is forwarded.
//!
//! # Transport
//!
//! The default transport is a [`Channel`]. It buffers items on a background thread and uploads
//! them in gzipped batches to the Application Insights track endpoint through an
//! [`HttpClient`](opentelemetry_http::HttpClient). Uploads that fail with a transient status are
//! retried with exponential backoff. Failures are logged using [`tracing`] and never reach the
//! code that tracked the item.
//!
//! The background thread has no async runtime, so the HTTP client must not need one. Use a
//! blocking client such as `reqwest::blocking::Client`. Async clients like `reqwest::Client`
//! panic without a Tokio reactor; such panics are caught and logged as errors and the affected
//! batch is dropped.
//!
//! Enable the `reqwest-client` or `reqwest-client-rustls` feature to use
//! `reqwest::blocking::Client` as the HTTP client.
//!
//! # Configuration
//!
//! | Setting                                  | Meaning                                    |
//! | ---------------------------------------- | ------------------------------------------ |
//! | `ApplicationInsights.InstrumentationKey` | Key used when none is passed explicitly    |
//! | `ApplicationInsights.EndpointAddress`    | Ingestion endpoint, defaults to the global |
//!
//! [`Environment`] reads settings from environment variables. Maps implement
//! [`ConfigurationProvider`] too, and so does `config::Config` with the `config` feature.
#![doc(html_root_url = "https://docs.rs/application-insights-telemetry/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs, unreachable_pub, missing_debug_implementations)]

mod channel;
mod client;
mod config;
mod convert;
mod endpoint;
mod error;
mod models;
mod telemetry;
mod transport;
mod uploader;

pub use channel::{Channel, ChannelBuilder};
pub use client::TelemetryClient;
pub use config::{
    resolve_instrumentation_key, ConfigurationProvider, Environment, ENDPOINT_ADDRESS_SETTING,
    INSTRUMENTATION_KEY_SETTING,
};
pub use error::{Error, InvalidArgumentError};
pub use telemetry::{
    EventTelemetry, MetricSample, Properties, SampledMetric, SampledMetricSummary, SeverityLevel,
    Telemetry, TraceTelemetry,
};
pub use transport::Transport;
