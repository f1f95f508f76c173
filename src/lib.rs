//! `mijia-exporter` library.
//!
//! The binary (`src/main.rs`) is responsible for logging setup, signal
//! handling and process exit codes. The core lives in [`crate::poller`],
//! which drives [`crate::client`] over an injected [`Transport`] so the
//! whole collection path can be tested without Bluetooth hardware.

pub mod app;
pub mod client;
pub mod config;
pub mod decoder;
pub mod duration;
pub mod mac_address;
pub mod measurement;
pub mod metrics;
pub mod poller;
pub mod server;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types at the crate root
pub use client::{SensorClient, SensorError};
pub use config::{ConfigError, SensorConfig, SensorLabels};
pub use decoder::{DecodeError, decode_battery, decode_temperature_humidity};
pub use mac_address::MacAddress;
pub use measurement::{Measurement, TemperatureHumidity};
pub use metrics::MetricStore;
pub use poller::{CycleReport, Poller, PollerState, ProbeError, ProbeOutcome};
pub use transport::{Backend, Transport, TransportError};
