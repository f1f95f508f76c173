//! Values read from a Mijia sensor during one poll.

/// Temperature and humidity, decoded from the sensor's data notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureHumidity {
    /// Temperature in Celsius
    pub temperature: f64,
    /// Relative humidity in percent (0-100)
    pub humidity: f64,
}

/// A complete measurement from one sensor.
///
/// Built fresh for every successful poll and handed to the metric store,
/// which keeps only the latest one per sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Temperature in Celsius
    pub temperature: f64,
    /// Relative humidity in percent (0-100)
    pub humidity: f64,
    /// Remaining battery in percent (0-100)
    pub battery_level: f64,
}

impl Measurement {
    /// Combine the two independently decoded exchanges into one measurement.
    pub fn new(reading: TemperatureHumidity, battery_level: f64) -> Self {
        Self {
            temperature: reading.temperature,
            humidity: reading.humidity,
            battery_level,
        }
    }
}
