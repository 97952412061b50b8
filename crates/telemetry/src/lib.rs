//! Client for the telemetry source: the monitored cluster's API.

pub mod client;
pub mod error;

pub use client::{ClusterClient, TelemetrySource};
pub use error::TelemetryError;
