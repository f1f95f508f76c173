//! Decoding of Mijia sensor GATT responses.
//!
//! Both exchanges with a sensor come back as `gatttool`-style text frames: a
//! header, a `:` delimiter and a payload of hex byte tokens. The payloads are
//! encoded differently, so each has its own decoder:
//!
//! - The data notification carries ASCII text (`T=28.3 H=54.1`) with every
//!   character written as a hex byte, followed by a null terminator.
//! - The battery characteristic carries a single raw counter byte.
//!
//! Everything here is pure; the transport and header checks live in
//! [`crate::client`].

use crate::measurement::TemperatureHumidity;
use thiserror::Error;

/// Header of the line `gatttool --listen` prints for a notification.
pub const NOTIFICATION_HEADER: &str = "Notification handle = ";

/// Header of the line `gatttool --char-read` prints for a characteristic value.
pub const BATTERY_HEADER: &str = "Characteristic value/descriptor";

/// Raw battery counter the sensor reports when fully charged.
pub const BATTERY_FULL_SCALE: u8 = 64;

/// Error returned when a payload cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// No `:` separates the header from the payload
    #[error("missing ':' delimiter before payload")]
    MissingDelimiter,
    /// Nothing follows the delimiter
    #[error("empty payload")]
    EmptyPayload,
    /// A payload token is not a two-digit hex byte
    #[error("invalid hex byte '{0}'")]
    InvalidHexByte(String),
    /// A data byte does not map to a printable ASCII character
    #[error("byte 0x{0:02x} is not printable ASCII")]
    NonPrintable(u8),
    /// The text does not have the `T=<float> H=<float>` shape
    #[error("unexpected field layout in '{0}'")]
    InvalidFields(String),
    /// A field value is not a finite number
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    /// The battery counter is above [`BATTERY_FULL_SCALE`]
    #[error("battery counter {0} exceeds full scale of 64")]
    BatteryOutOfRange(u8),
}

/// Decode a data notification into temperature and humidity.
///
/// # Example
/// ```
/// use mijia_exporter::decoder::decode_temperature_humidity;
///
/// let frame = "Notification handle = 0x000e value: 54 3d 32 38 2e 33 20 48 3d 35 34 2e 31 00";
/// let reading = decode_temperature_humidity(frame).unwrap();
/// assert_eq!(reading.temperature, 28.3);
/// assert_eq!(reading.humidity, 54.1);
/// ```
pub fn decode_temperature_humidity(raw: &str) -> Result<TemperatureHumidity, DecodeError> {
    let (_, payload) = raw.split_once(':').ok_or(DecodeError::MissingDelimiter)?;

    let mut tokens: Vec<&str> = payload.split_whitespace().collect();
    if tokens.last() == Some(&"00") {
        tokens.pop();
    }
    if tokens.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let text = tokens
        .into_iter()
        .map(ascii_char)
        .collect::<Result<String, _>>()?;

    parse_plaintext(&text)
}

/// Parse the `T=<float> H=<float>` text carried by a data notification.
pub fn parse_plaintext(text: &str) -> Result<TemperatureHumidity, DecodeError> {
    let fields: Vec<&str> = text.split(' ').collect();
    let [temperature, humidity] = fields.as_slice() else {
        return Err(DecodeError::InvalidFields(text.to_string()));
    };

    Ok(TemperatureHumidity {
        temperature: field_value(temperature, "T", text)?,
        humidity: field_value(humidity, "H", text)?,
    })
}

/// Decode a battery characteristic read into a percentage.
///
/// The payload is the last `:`-separated part of the response; a bare hex
/// token is accepted as well.
///
/// # Example
/// ```
/// use mijia_exporter::decoder::decode_battery;
///
/// assert_eq!(decode_battery("Characteristic value/descriptor: 3c").unwrap(), 93.75);
/// assert_eq!(decode_battery("40").unwrap(), 100.0);
/// ```
pub fn decode_battery(raw: &str) -> Result<f64, DecodeError> {
    let payload = raw.rsplit_once(':').map_or(raw, |(_, payload)| payload);

    let mut tokens = payload.split_whitespace();
    let token = tokens.next().ok_or(DecodeError::EmptyPayload)?;
    if tokens.next().is_some() {
        return Err(DecodeError::InvalidFields(payload.trim().to_string()));
    }

    let counter = hex_byte(token)?;
    if counter > BATTERY_FULL_SCALE {
        return Err(DecodeError::BatteryOutOfRange(counter));
    }

    Ok(100.0 * f64::from(counter) / f64::from(BATTERY_FULL_SCALE))
}

/// Render raw notification bytes as the frame [`decode_temperature_humidity`] reads.
pub fn encode_notification(handle: u16, payload: &[u8]) -> String {
    let bytes: Vec<String> = payload.iter().map(|b| format!("{b:02x}")).collect();
    format!("{NOTIFICATION_HEADER}0x{handle:04x} value: {}", bytes.join(" "))
}

/// Render a raw battery counter as the frame [`decode_battery`] reads.
pub fn encode_battery(counter: u8) -> String {
    format!("{BATTERY_HEADER}: {counter:02x}")
}

fn hex_byte(token: &str) -> Result<u8, DecodeError> {
    if token.len() != 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHexByte(token.to_string()));
    }
    u8::from_str_radix(token, 16).map_err(|_| DecodeError::InvalidHexByte(token.to_string()))
}

fn ascii_char(token: &str) -> Result<char, DecodeError> {
    let byte = hex_byte(token)?;
    if byte == b' ' || byte.is_ascii_graphic() {
        Ok(char::from(byte))
    } else {
        Err(DecodeError::NonPrintable(byte))
    }
}

fn field_value(field: &str, key: &str, text: &str) -> Result<f64, DecodeError> {
    let value = match field.split_once('=') {
        Some((k, value)) if k == key => value,
        _ => return Err(DecodeError::InvalidFields(text.to_string())),
    };

    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeError::InvalidNumber(value.to_string()))
}
