//! Per-sensor acquisition.
//!
//! A [`SensorClient`] turns one device address into a [`Measurement`] by
//! running the data notification exchange and then the battery read, each
//! under its own timeout. It never retries; the poller decides what a failure
//! means.

use crate::decoder::{self, BATTERY_HEADER, DecodeError, NOTIFICATION_HEADER};
use crate::mac_address::MacAddress;
use crate::measurement::Measurement;
use crate::transport::{BATTERY_HANDLE, NOTIFY_HANDLE, Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for a single exchange with a sensor.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Why a sensor could not be read.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] DecodeError),
}

/// Reads measurements from sensors through a [`Transport`].
#[derive(Clone)]
pub struct SensorClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl SensorClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            timeout: EXCHANGE_TIMEOUT,
        }
    }

    /// Replace the per-exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read temperature, humidity and battery level from the sensor at `mac`.
    pub async fn acquire(&self, mac: MacAddress) -> Result<Measurement, SensorError> {
        let notification = self
            .bounded(mac, self.transport.notify_read(mac, NOTIFY_HANDLE))
            .await?;
        let reading = decoder::decode_temperature_humidity(expect_header(
            &notification,
            NOTIFICATION_HEADER,
        )?)?;

        let battery = self
            .bounded(mac, self.transport.read_characteristic(mac, BATTERY_HANDLE))
            .await?;
        let battery_level = decoder::decode_battery(expect_header(&battery, BATTERY_HEADER)?)?;

        Ok(Measurement::new(reading, battery_level))
    }

    async fn bounded<F>(&self, mac: MacAddress, exchange: F) -> Result<String, TransportError>
    where
        F: Future<Output = Result<String, TransportError>>,
    {
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout {
                mac,
                seconds: self.timeout.as_secs(),
            })?
    }
}

fn expect_header<'a>(response: &'a str, header: &str) -> Result<&'a str, SensorError> {
    let response = response.trim();
    if response.starts_with(header) {
        Ok(response)
    } else {
        Err(SensorError::UnexpectedResponse(response.to_string()))
    }
}
