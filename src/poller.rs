//! The collection loop.
//!
//! The [`Poller`] reads every configured sensor in order, writes successful
//! measurements to the [`MetricStore`] and sleeps for the collection interval
//! before starting over. A failing sensor is logged and skipped; only the
//! startup [`Poller::probe`] treats a failure as fatal.

use crate::client::{SensorClient, SensorError};
use crate::config::SensorConfig;
use crate::mac_address::MacAddress;
use crate::metrics::MetricStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default pause between two collection cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Where the poller currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Collecting,
    Sleeping,
    Stopped,
}

/// A sensor failed during the startup probe.
#[derive(Error, Debug)]
#[error("sensor {mac} ({area}) failed its startup probe: {source}")]
pub struct ProbeError {
    pub mac: MacAddress,
    pub area: String,
    #[source]
    pub source: SensorError,
}

/// How the startup probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Every sensor answered
    Completed,
    /// Shutdown was requested before every sensor was read
    Interrupted,
}

/// Outcome of one collection cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Sensors whose values were updated
    pub updated: usize,
    /// Sensors that could not be read, with the reason
    pub failed: Vec<(MacAddress, SensorError)>,
    /// The cycle stopped early because of a shutdown request
    pub interrupted: bool,
}

/// Periodic collector for a fixed list of sensors.
pub struct Poller {
    sensors: Vec<SensorConfig>,
    client: SensorClient,
    store: Arc<MetricStore>,
    interval: Duration,
    state: watch::Sender<PollerState>,
}

impl Poller {
    pub fn new(
        sensors: Vec<SensorConfig>,
        client: SensorClient,
        store: Arc<MetricStore>,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(PollerState::Idle);
        Self {
            sensors,
            client,
            store,
            interval,
            state,
        }
    }

    /// Watch the poller's state transitions.
    pub fn state(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    /// Read every sensor once, failing on the first sensor that cannot be read.
    ///
    /// Values read here are stored, so metrics are available as soon as the
    /// endpoint starts. Shutdown is checked before each sensor and once more
    /// after the last one; an exchange in progress always finishes.
    pub async fn probe(&self, shutdown: &watch::Receiver<bool>) -> Result<ProbeOutcome, ProbeError> {
        for sensor in &self.sensors {
            if *shutdown.borrow() {
                return Ok(ProbeOutcome::Interrupted);
            }

            let measurement =
                self.client
                    .acquire(sensor.mac)
                    .await
                    .map_err(|source| ProbeError {
                        mac: sensor.mac,
                        area: sensor.area.clone(),
                        source,
                    })?;
            self.store.update(&sensor.labels(), measurement);
            info!(mac = %sensor.mac, area = %sensor.area, "sensor is ok");
        }

        if *shutdown.borrow() {
            return Ok(ProbeOutcome::Interrupted);
        }
        Ok(ProbeOutcome::Completed)
    }

    /// Read every sensor once, skipping the ones that fail.
    ///
    /// A shutdown request is honoured before each sensor; an exchange already
    /// in progress is allowed to finish.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let mut report = CycleReport::default();

        for sensor in &self.sensors {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }

            match self.client.acquire(sensor.mac).await {
                Ok(measurement) => {
                    debug!(
                        mac = %sensor.mac,
                        temperature = measurement.temperature,
                        humidity = measurement.humidity,
                        battery_level = measurement.battery_level,
                        "sensor read"
                    );
                    self.store.update(&sensor.labels(), measurement);
                    report.updated += 1;
                }
                Err(error) => {
                    warn!(mac = %sensor.mac, area = %sensor.area, %error, "failed to read sensor");
                    report.failed.push((sensor.mac, error));
                }
            }
        }

        report
    }

    /// Collect until `shutdown` turns true or its sender goes away.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.state.send_replace(PollerState::Collecting);
            let report = self.run_cycle(&shutdown).await;
            info!(
                updated = report.updated,
                failed = report.failed.len(),
                "collection cycle finished"
            );
            if report.interrupted {
                break;
            }

            self.state.send_replace(PollerState::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.state.send_replace(PollerState::Stopped);
        debug!("poller stopped");
    }
}
