//! Latest-value metric state and its Prometheus text rendering.

use crate::config::SensorLabels;
use crate::measurement::Measurement;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::{PoisonError, RwLock};

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// A gauge family exported per sensor.
struct Gauge {
    name: &'static str,
    help: &'static str,
    value: fn(&Measurement) -> f64,
}

const GAUGES: [Gauge; 3] = [
    Gauge {
        name: "mijia_temperature",
        help: "Temperature",
        value: |m| m.temperature,
    },
    Gauge {
        name: "mijia_humidity",
        help: "Humidity",
        value: |m| m.humidity,
    },
    Gauge {
        name: "mijia_battery_level",
        help: "Percentage of remaining battery",
        value: |m| m.battery_level,
    },
];

/// Latest measurement per sensor.
///
/// The three values of a sensor are stored together and replaced under one
/// write lock, so a scrape never sees a mix of two polls.
#[derive(Debug, Default)]
pub struct MetricStore {
    samples: RwLock<BTreeMap<SensorLabels, Measurement>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the values of `labels` with `measurement`.
    pub fn update(&self, labels: &SensorLabels, measurement: Measurement) {
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        match samples.get_mut(labels) {
            Some(sample) => *sample = measurement,
            None => {
                samples.insert(labels.clone(), measurement);
            }
        }
    }

    /// Latest values of `labels`, if the sensor was ever read successfully.
    pub fn get(&self, labels: &SensorLabels) -> Option<Measurement> {
        self.samples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(labels)
            .copied()
    }

    /// Number of sensors with values.
    pub fn len(&self) -> usize {
        self.samples.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write all gauges in the Prometheus text exposition format.
    pub fn render_prometheus(&self, writer: &mut impl Write) -> fmt::Result {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        for gauge in &GAUGES {
            writeln!(writer, "# HELP {} {}", gauge.name, gauge.help)?;
            writeln!(writer, "# TYPE {} gauge", gauge.name)?;
            for (labels, measurement) in samples.iter() {
                write!(writer, "{}", gauge.name)?;
                write_labels(writer, labels)?;
                writeln!(writer, " {}", (gauge.value)(measurement))?;
            }
        }
        Ok(())
    }

    /// Render all gauges into a new string.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.render_prometheus(&mut out);
        out
    }
}

fn write_labels(writer: &mut impl Write, labels: &SensorLabels) -> fmt::Result {
    write!(writer, "{{mac=\"{}\",area=\"", labels.mac)?;
    write_escaped(writer, &labels.area)?;
    write!(writer, "\",area_type=\"")?;
    write_escaped(writer, &labels.area_type)?;
    write!(writer, "\"}}")
}

fn write_escaped(writer: &mut impl Write, value: &str) -> fmt::Result {
    for c in value.chars() {
        match c {
            '\\' => writer.write_str("\\\\")?,
            '"' => writer.write_str("\\\"")?,
            '\n' => writer.write_str("\\n")?,
            c => writer.write_char(c)?,
        }
    }
    Ok(())
}
