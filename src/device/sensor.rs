//! GNSS adapter speaking the gpsd JSON protocol.
//!
//! Connects to a gpsd socket, enables the JSON watch, and waits for the first
//! TPV report with a good enough fix mode. Every failure collapses into the
//! three sensor outcomes the pipeline distinguishes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{GeoFix, LocationSensor};
use crate::error::SensorError;

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// One report line from gpsd; only the fields the fix logic reads.
#[derive(Debug, Deserialize)]
struct GpsdReport {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    message: String,
}

pub struct GpsdSensor {
    address: String,
}

impl GpsdSensor {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    async fn wait_for_fix(&self, high_accuracy: bool) -> Result<GeoFix, SensorError> {
        let stream = TcpStream::connect(&self.address).await.map_err(|err| {
            warn!(address = %self.address, error = %err, "gpsd unreachable");
            SensorError::Unavailable
        })?;
        let (reader, mut writer) = stream.into_split();
        writer
            .write_all(WATCH_COMMAND)
            .await
            .map_err(|_| SensorError::Unavailable)?;

        let mut lines = BufReader::new(reader).lines();
        // gpsd mode: 2 is a 2-D fix, 3 a full 3-D solution.
        let required_mode = if high_accuracy { 3 } else { 2 };
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|_| SensorError::Unavailable)?
        {
            let report: GpsdReport = match serde_json::from_str(&line) {
                Ok(report) => report,
                Err(err) => {
                    debug!(error = %err, "skipping unparseable gpsd line");
                    continue;
                }
            };
            match report.class.as_str() {
                "ERROR" => {
                    warn!(message = %report.message, "gpsd refused the watch");
                    return Err(SensorError::Denied);
                }
                "TPV" if report.mode >= required_mode => {
                    if let (Some(lat), Some(lon)) = (report.lat, report.lon) {
                        debug!(lat, lon, mode = report.mode, "usable fix received");
                        return Ok(GeoFix { lat, lon });
                    }
                }
                _ => {}
            }
        }
        // gpsd closed the stream before a usable TPV arrived.
        Err(SensorError::Unavailable)
    }
}

#[async_trait]
impl LocationSensor for GpsdSensor {
    async fn get_fix(
        &self,
        timeout: Duration,
        high_accuracy: bool,
    ) -> Result<GeoFix, SensorError> {
        match tokio::time::timeout(timeout, self.wait_for_fix(high_accuracy)).await {
            Ok(result) => result,
            Err(_) => Err(SensorError::Timeout),
        }
    }
}
