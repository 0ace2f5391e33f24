//! Prometheus exporter for home meteo sensor telemetry.
//!
//! This crate bridges sensor readings published over Zenoh into gauges
//! exposed on an HTTP `/metrics` endpoint for Prometheus scraping.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Zenoh Network  │────>│    Ingestion    │────>│   HTTP Server   │
//! │ (homeapp/meteo) │     │ (normalization) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Each inbound message carries one or more JSON sensor readings, either
//! wrapped in a device envelope or as a bare array (a per-deployment
//! configuration choice). Readings are rounded to one decimal place and
//! stored last-write-wins under their `(name, type)` label pair; a series
//! once observed stays exposed at its last value for the process lifetime.
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! meteo-exporter-prometheus --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod http;
pub mod ingest;
pub mod payload;
pub mod registry;
pub mod subscriber;

pub use config::ExporterConfig;
pub use http::HttpServer;
pub use ingest::IngestionHandler;
pub use payload::{PayloadShape, Reading, round_tenths};
pub use registry::{MetricKey, SensorRegistry, SharedRegistry};
pub use subscriber::SensorSubscriber;
