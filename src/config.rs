//! Sensor list loading.
//!
//! The exporter polls a fixed, ordered list of sensors read once at startup
//! from a JSON file:
//!
//! ```json
//! [
//!   { "mac": "4C:65:A8:D0:0A:1B", "area": "kitchen", "area_type": "indoor" }
//! ]
//! ```

use crate::mac_address::MacAddress;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the sensor list.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mijia-sensor-exporter.json";

/// One configured sensor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SensorConfig {
    pub mac: MacAddress,
    pub area: String,
    pub area_type: String,
}

impl SensorConfig {
    /// The metric label set identifying this sensor's series.
    pub fn labels(&self) -> SensorLabels {
        SensorLabels {
            mac: self.mac,
            area: self.area.clone(),
            area_type: self.area_type.clone(),
        }
    }
}

/// Label set of a sensor's metric series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorLabels {
    pub mac: MacAddress,
    pub area: String,
    pub area_type: String,
}

/// Errors raised while loading the sensor list.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid sensor configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sensor {0} is configured more than once")]
    DuplicateMac(MacAddress),
    #[error("no sensors configured")]
    Empty,
}

/// Read and validate the sensor list at `path`.
pub fn load(path: &Path) -> Result<Vec<SensorConfig>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents)
}

/// Parse and validate a sensor list, keeping the configured order.
pub fn parse(contents: &str) -> Result<Vec<SensorConfig>, ConfigError> {
    let sensors: Vec<SensorConfig> = serde_json::from_str(contents)?;
    if sensors.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut seen = BTreeSet::new();
    for sensor in &sensors {
        if !seen.insert(sensor.mac) {
            return Err(ConfigError::DuplicateMac(sensor.mac));
        }
    }

    Ok(sensors)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"[
        { "mac": "4C:65:A8:D0:0A:1B", "area": "kitchen", "area_type": "indoor" },
        { "mac": "4c:65:a8:d0:0a:2c", "area": "balcony", "area_type": "outdoor" }
    ]"#;

    #[test]
    fn test_parse_keeps_order() {
        let sensors = parse(CONFIG).unwrap();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].area, "kitchen");
        assert_eq!(sensors[1].mac.to_string(), "4C:65:A8:D0:0A:2C");
        assert_eq!(sensors[1].area_type, "outdoor");
    }

    #[test]
    fn test_labels() {
        let sensors = parse(CONFIG).unwrap();
        let labels = sensors[0].labels();
        assert_eq!(labels.mac, sensors[0].mac);
        assert_eq!(labels.area, "kitchen");
        assert_eq!(labels.area_type, "indoor");
    }

    #[test]
    fn test_parse_rejects_duplicates_regardless_of_case() {
        let config = r#"[
            { "mac": "4C:65:A8:D0:0A:1B", "area": "kitchen", "area_type": "indoor" },
            { "mac": "4c:65:a8:d0:0a:1b", "area": "hall", "area_type": "indoor" }
        ]"#;
        assert!(matches!(parse(config), Err(ConfigError::DuplicateMac(_))));
    }

    #[test]
    fn test_parse_rejects_empty_list() {
        assert!(matches!(parse("[]"), Err(ConfigError::Empty)));
    }

    #[test]
    fn test_parse_rejects_bad_records() {
        let bad_mac = r#"[{ "mac": "4C:65:A8:D0:0A", "area": "kitchen", "area_type": "indoor" }]"#;
        let err = parse(bad_mac).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(
            err.to_string()
                .starts_with("invalid sensor configuration: invalid MAC address: expected 6 parts, got 5"),
            "{err}"
        );

        let missing_field = r#"[{ "mac": "4C:65:A8:D0:0A:1B", "area": "kitchen" }]"#;
        assert!(matches!(parse(missing_field), Err(ConfigError::Json(_))));

        assert!(matches!(parse("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/mijia-sensor-exporter.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().starts_with("cannot read /nonexistent/"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("mijia-exporter-{}.json", std::process::id()));
        std::fs::write(&path, CONFIG).unwrap();
        let sensors = load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(sensors.unwrap().len(), 2);
    }
}
