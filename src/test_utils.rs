use crate::config::SensorConfig;
use crate::decoder::{encode_battery, encode_notification};
use crate::mac_address::MacAddress;
use crate::transport::{
    ExchangeFuture, NOTIFICATION_VALUE_HANDLE, Transport, TransportError,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0x4C, 0x65, 0xA8, 0xD0, 0x0A, 0x1B]);

/// Build a sensor entry with the given last address byte.
pub fn sensor(last: u8, area: &str) -> SensorConfig {
    SensorConfig {
        mac: MacAddress([0x4C, 0x65, 0xA8, 0xD0, 0x0A, last]),
        area: area.to_string(),
        area_type: "indoor".to_string(),
    }
}

/// Data notification frame as gatttool prints it, null terminator included.
pub fn notification_frame(temperature: f64, humidity: f64) -> String {
    let mut payload = format!("T={temperature:.1} H={humidity:.1}").into_bytes();
    payload.push(0);
    encode_notification(NOTIFICATION_VALUE_HANDLE, &payload)
}

/// What the fake answers for one exchange.
#[derive(Debug, Clone)]
pub enum Reply {
    Frame(String),
    /// Answer with the frame after a delay
    Delayed(Duration, String),
    Fail,
    Hang,
}

/// Scripted transport: answers per device, records every exchange.
#[derive(Debug, Default)]
pub struct FakeTransport {
    notifications: Mutex<HashMap<MacAddress, Reply>>,
    batteries: Mutex<HashMap<MacAddress, Reply>>,
    exchanges: Mutex<Vec<(MacAddress, u16)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `mac` answer with a healthy reading.
    pub fn healthy(self, mac: MacAddress, temperature: f64, humidity: f64, counter: u8) -> Self {
        self.set_notification(mac, Reply::Frame(notification_frame(temperature, humidity)));
        self.set_battery(mac, Reply::Frame(encode_battery(counter)));
        self
    }

    pub fn set_notification(&self, mac: MacAddress, reply: Reply) {
        self.notifications.lock().unwrap().insert(mac, reply);
    }

    pub fn set_battery(&self, mac: MacAddress, reply: Reply) {
        self.batteries.lock().unwrap().insert(mac, reply);
    }

    /// Every `(mac, handle)` exchanged so far, in order.
    pub fn exchanges(&self) -> Vec<(MacAddress, u16)> {
        self.exchanges.lock().unwrap().clone()
    }

    fn answer(&self, replies: &Mutex<HashMap<MacAddress, Reply>>, mac: MacAddress, handle: u16) -> ExchangeFuture<'_> {
        self.exchanges.lock().unwrap().push((mac, handle));
        let reply = replies.lock().unwrap().get(&mac).cloned();
        Box::pin(async move {
            match reply {
                Some(Reply::Frame(frame)) => Ok(frame),
                Some(Reply::Delayed(delay, frame)) => {
                    tokio::time::sleep(delay).await;
                    Ok(frame)
                }
                Some(Reply::Fail) => Err(TransportError::Bluetooth("connection refused".into())),
                Some(Reply::Hang) => std::future::pending().await,
                None => Err(TransportError::NoResponse(mac)),
            }
        })
    }
}

impl Transport for FakeTransport {
    fn notify_read(&self, mac: MacAddress, handle: u16) -> ExchangeFuture<'_> {
        self.answer(&self.notifications, mac, handle)
    }

    fn read_characteristic(&self, mac: MacAddress, handle: u16) -> ExchangeFuture<'_> {
        self.answer(&self.batteries, mac, handle)
    }
}
