//! BlueZ D-Bus backend.
//!
//! This backend uses the `bluer` crate to talk to the BlueZ daemon instead of
//! spawning `gatttool`. BlueZ addresses characteristics by UUID rather than
//! by ATT handle, so the two handles the exporter uses are mapped to their
//! characteristic UUIDs, and the raw values are rendered into the same text
//! frames `gatttool` prints.

use super::{
    BATTERY_HANDLE, ExchangeFuture, NOTIFICATION_VALUE_HANDLE, NOTIFY_HANDLE, Transport,
    TransportError,
};
use crate::decoder::{encode_battery, encode_notification};
use crate::mac_address::MacAddress;
use bluer::gatt::remote::Characteristic;
use bluer::{Adapter, Device, Session, Uuid};
use futures::StreamExt;

/// Mijia data characteristic carrying the `T=.. H=..` notifications.
pub const SENSOR_DATA_UUID: Uuid = Uuid::from_u128(0x226caa55_6476_4566_7562_66734470666d);

/// Standard Battery Level characteristic.
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

impl From<bluer::Error> for TransportError {
    fn from(err: bluer::Error) -> Self {
        TransportError::Bluetooth(err.to_string())
    }
}

/// Characteristic UUID addressed by a `gatttool` handle.
pub fn characteristic_uuid(handle: u16) -> Result<Uuid, TransportError> {
    match handle {
        NOTIFY_HANDLE => Ok(SENSOR_DATA_UUID),
        BATTERY_HANDLE => Ok(BATTERY_LEVEL_UUID),
        other => Err(TransportError::UnsupportedHandle(other)),
    }
}

/// Transport backed by the BlueZ daemon.
pub struct BluerTransport {
    // Keeps the D-Bus connection alive for the adapter.
    _session: Session,
    adapter: Adapter,
}

impl BluerTransport {
    /// Connect to BlueZ and power on the default adapter.
    pub async fn new() -> Result<Self, TransportError> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;
        Ok(Self {
            _session: session,
            adapter,
        })
    }

    async fn find_characteristic(
        &self,
        device: &Device,
        mac: MacAddress,
        uuid: Uuid,
    ) -> Result<Characteristic, TransportError> {
        if !device.is_connected().await? {
            device.connect().await?;
        }

        for service in device.services().await? {
            for characteristic in service.characteristics().await? {
                if characteristic.uuid().await? == uuid {
                    return Ok(characteristic);
                }
            }
        }

        Err(TransportError::CharacteristicNotFound {
            mac,
            uuid: uuid.to_string(),
        })
    }

    /// Run `exchange` against a connected device and always disconnect afterwards.
    async fn with_device<F, Fut>(&self, mac: MacAddress, exchange: F) -> Result<String, TransportError>
    where
        F: FnOnce(Device) -> Fut,
        Fut: Future<Output = Result<String, TransportError>>,
    {
        let device = self.adapter.device(mac.into())?;
        let result = exchange(device.clone()).await;

        if let Err(err) = device.disconnect().await {
            tracing::debug!(%mac, %err, "failed to disconnect sensor");
        }

        result
    }

    async fn listen(&self, mac: MacAddress, handle: u16) -> Result<String, TransportError> {
        let uuid = characteristic_uuid(handle)?;
        self.with_device(mac, |device| async move {
            let characteristic = self.find_characteristic(&device, mac, uuid).await?;
            let mut notifications = Box::pin(characteristic.notify().await?);
            let value = notifications
                .next()
                .await
                .ok_or(TransportError::NoResponse(mac))?;
            Ok(encode_notification(NOTIFICATION_VALUE_HANDLE, &value))
        })
        .await
    }

    async fn read(&self, mac: MacAddress, handle: u16) -> Result<String, TransportError> {
        let uuid = characteristic_uuid(handle)?;
        self.with_device(mac, |device| async move {
            let characteristic = self.find_characteristic(&device, mac, uuid).await?;
            let value = characteristic.read().await?;
            let counter = value.first().copied().ok_or(TransportError::NoResponse(mac))?;
            Ok(encode_battery(counter))
        })
        .await
    }
}

impl Transport for BluerTransport {
    fn notify_read(&self, mac: MacAddress, handle: u16) -> ExchangeFuture<'_> {
        Box::pin(self.listen(mac, handle))
    }

    fn read_characteristic(&self, mac: MacAddress, handle: u16) -> ExchangeFuture<'_> {
        Box::pin(self.read(mac, handle))
    }
}
