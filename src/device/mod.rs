//! Device capabilities the pipeline depends on.
//!
//! Each capability is a trait with a real adapter and a deterministic fake,
//! so the pipeline runs identically with and without camera or GNSS hardware.

pub mod camera;
pub mod fake;
pub mod sensor;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{CaptureError, SensorError};

/// Which way a camera points; used to pick between configured devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Facing {
    #[default]
    Rear,
    Front,
    /// Matches any device (and, as a device facing, is matched by any
    /// preference).
    Any,
}

/// An unprocessed sensor fix. Device coordinates arrive correctly signed;
/// bounds validation happens in the resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    pub lat: f64,
    pub lon: f64,
}

/// A still camera that can be opened into an exclusive live stream.
#[async_trait]
pub trait StillCamera: Send + Sync {
    /// Opens a stream, preferring devices that face `preference` and falling
    /// back to any other configured device. The returned stream holds the
    /// hardware until dropped.
    async fn open(&self, preference: Facing) -> Result<Box<dyn CameraStream>, CaptureError>;
}

/// A live camera stream.
///
/// Dropping the stream releases the device, and dropping is the only release
/// path; closing the view, abandoning the draft and pipeline teardown all
/// converge on it.
#[async_trait]
pub trait CameraStream: Send + std::fmt::Debug {
    /// Grabs one still frame as an encoded image buffer.
    async fn capture_still(&mut self) -> Result<Vec<u8>, CaptureError>;
}

/// One-shot device geolocation.
#[async_trait]
pub trait LocationSensor: Send + Sync {
    /// Obtains a single fix within `timeout`. `high_accuracy` asks the device
    /// for its best quality; for GNSS that means a full 3-D solution.
    async fn get_fix(&self, timeout: Duration, high_accuracy: bool)
        -> Result<GeoFix, SensorError>;
}
