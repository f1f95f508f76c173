//! BLE transport abstraction for Mijia sensors.
//!
//! The exporter needs exactly two GATT exchanges from a sensor: enable the
//! data notification and wait for the first one, and read the battery
//! characteristic. Both are expressed by the [`Transport`] trait and answered
//! with a `gatttool`-style text frame, so the decoder does not care which
//! backend produced it.

#[cfg(feature = "bluer")]
pub mod bluer;

#[cfg(feature = "gatttool")]
pub mod gatttool;

use crate::mac_address::MacAddress;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;
use thiserror::Error;

/// Client characteristic configuration handle of the data characteristic.
pub const NOTIFY_HANDLE: u16 = 0x0010;

/// Value handle the data notifications are reported on.
pub const NOTIFICATION_VALUE_HANDLE: u16 = 0x000e;

/// Value written to [`NOTIFY_HANDLE`] to enable notifications.
pub const ENABLE_NOTIFICATIONS: &str = "0100";

/// Battery level characteristic handle.
pub const BATTERY_HANDLE: u16 = 0x0018;

/// Error type for transport exchanges.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The external tool could not be started
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The external tool exited unsuccessfully
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    /// I/O error while talking to the external tool
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
    /// The device has no characteristic for the requested handle
    #[error("{mac} has no characteristic {uuid}")]
    CharacteristicNotFound { mac: MacAddress, uuid: String },
    /// The backend cannot address the requested handle
    #[error("unsupported handle 0x{0:04x}")]
    UnsupportedHandle(u16),
    /// The exchange ended without a response
    #[error("no response from {0}")]
    NoResponse(MacAddress),
    /// The exchange did not finish within its time bound
    #[error("exchange with {mac} timed out after {seconds}s")]
    Timeout { mac: MacAddress, seconds: u64 },
}

/// Future returned by transport exchanges: the raw response frame.
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + 'a>>;

/// Transport abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Transport: Send + Sync {
    /// Enable notifications through `handle` and return the first notification frame.
    fn notify_read(&self, mac: MacAddress, handle: u16) -> ExchangeFuture<'_>;

    /// Read the characteristic at `handle` and return the response frame.
    fn read_characteristic(&self, mac: MacAddress, handle: u16) -> ExchangeFuture<'_>;
}

/// Available transport backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ `gatttool` command line tool
    #[cfg(feature = "gatttool")]
    Gatttool,
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    Bluer,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "gatttool")]
        return Backend::Gatttool;
        #[cfg(all(feature = "bluer", not(feature = "gatttool")))]
        return Backend::Bluer;
        #[cfg(not(any(feature = "bluer", feature = "gatttool")))]
        compile_error!("At least one backend feature must be enabled");
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "gatttool")]
            Backend::Gatttool => write!(f, "gatttool"),
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
            #[cfg(not(any(feature = "bluer", feature = "gatttool")))]
            _ => unreachable!("Backend enum has no variants when no backend features are enabled"),
        }
    }
}

/// Open the transport for the given backend.
pub async fn open(backend: Backend) -> Result<Arc<dyn Transport>, TransportError> {
    match backend {
        #[cfg(feature = "gatttool")]
        Backend::Gatttool => Ok(Arc::new(gatttool::Gatttool::default())),
        #[cfg(feature = "bluer")]
        Backend::Bluer => Ok(Arc::new(bluer::BluerTransport::new().await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TEST_MAC;
    use clap::ValueEnum;

    #[cfg(feature = "gatttool")]
    #[test]
    fn test_gatttool_backend() {
        assert_eq!(Backend::Gatttool.to_string(), "gatttool");
        assert_eq!(Backend::default(), Backend::Gatttool);
        assert_eq!(Backend::from_str("gatttool", false), Ok(Backend::Gatttool));
    }

    #[cfg(feature = "bluer")]
    #[test]
    fn test_bluer_backend() {
        assert_eq!(Backend::Bluer.to_string(), "bluer");
        assert_eq!(Backend::from_str("bluer", false), Ok(Backend::Bluer));
    }

    #[test]
    fn test_backend_names_match_display() {
        for backend in Backend::value_variants() {
            let name = backend.to_string();
            assert_eq!(Backend::from_str(&name, false).as_ref(), Ok(backend));
        }
        assert!(Backend::from_str("hci", false).is_err());
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Timeout {
            mac: TEST_MAC,
            seconds: 60,
        };
        assert_eq!(
            err.to_string(),
            "exchange with 4C:65:A8:D0:0A:1B timed out after 60s"
        );
        assert_eq!(
            TransportError::UnsupportedHandle(0x2a).to_string(),
            "unsupported handle 0x002a"
        );
        assert_eq!(
            TransportError::NoResponse(TEST_MAC).to_string(),
            "no response from 4C:65:A8:D0:0A:1B"
        );
    }
}
