//! Deterministic camera and sensor stand-ins for tests and bench rigs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{CameraStream, Facing, GeoFix, LocationSensor, StillCamera};
use crate::error::{CaptureError, SensorError};

/// Scripted camera. Frames are handed out in order; the open-stream count
/// tracks release, so tests can assert the device never leaks.
#[derive(Clone, Default)]
pub struct FakeCamera {
    state: Arc<Mutex<FakeCameraState>>,
}

#[derive(Debug, Default)]
struct FakeCameraState {
    frames: VecDeque<Vec<u8>>,
    open_error: Option<CaptureError>,
    open_streams: usize,
    opened_total: usize,
}

impl FakeCamera {
    pub fn with_frames(frames: Vec<Vec<u8>>) -> Self {
        let camera = Self::default();
        camera.state.lock().expect("fake camera state").frames = frames.into();
        camera
    }

    /// Every `open` call fails with the given error.
    pub fn failing_open(error: CaptureError) -> Self {
        let camera = Self::default();
        camera.state.lock().expect("fake camera state").open_error = Some(error);
        camera
    }

    pub fn push_frame(&self, frame: Vec<u8>) {
        self.state
            .lock()
            .expect("fake camera state")
            .frames
            .push_back(frame);
    }

    /// Streams currently open, i.e. not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.state.lock().expect("fake camera state").open_streams
    }

    pub fn opened_total(&self) -> usize {
        self.state.lock().expect("fake camera state").opened_total
    }
}

#[async_trait]
impl StillCamera for FakeCamera {
    async fn open(&self, _preference: Facing) -> Result<Box<dyn CameraStream>, CaptureError> {
        let mut state = self.state.lock().expect("fake camera state");
        if let Some(error) = state.open_error.clone() {
            return Err(error);
        }
        state.open_streams += 1;
        state.opened_total += 1;
        Ok(Box::new(FakeStream {
            state: Arc::clone(&self.state),
        }))
    }
}

#[derive(Debug)]
struct FakeStream {
    state: Arc<Mutex<FakeCameraState>>,
}

#[async_trait]
impl CameraStream for FakeStream {
    async fn capture_still(&mut self) -> Result<Vec<u8>, CaptureError> {
        self.state
            .lock()
            .expect("fake camera state")
            .frames
            .pop_front()
            .ok_or_else(|| CaptureError::DeviceUnavailable("fake camera has no more frames".into()))
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.state.lock().expect("fake camera state").open_streams -= 1;
    }
}

/// Scripted sensor: pops one outcome per fix request. An exhausted (or
/// never-filled) script behaves like an absent device.
#[derive(Clone, Default)]
pub struct FakeSensor {
    state: Arc<Mutex<FakeSensorState>>,
}

#[derive(Default)]
struct FakeSensorState {
    outcomes: VecDeque<Result<GeoFix, SensorError>>,
    calls: usize,
}

impl FakeSensor {
    /// Sensor that keeps answering with the same fix.
    pub fn with_fix(lat: f64, lon: f64) -> Self {
        let sensor = Self::default();
        sensor.state.lock().expect("fake sensor state").outcomes =
            std::iter::repeat(Ok(GeoFix { lat, lon })).take(32).collect();
        sensor
    }

    pub fn failing(error: SensorError) -> Self {
        let sensor = Self::default();
        sensor.push(Err(error));
        sensor
    }

    pub fn push(&self, outcome: Result<GeoFix, SensorError>) {
        self.state
            .lock()
            .expect("fake sensor state")
            .outcomes
            .push_back(outcome);
    }

    /// How many fix requests have been made.
    pub fn calls(&self) -> usize {
        self.state.lock().expect("fake sensor state").calls
    }
}

#[async_trait]
impl LocationSensor for FakeSensor {
    async fn get_fix(
        &self,
        _timeout: Duration,
        _high_accuracy: bool,
    ) -> Result<GeoFix, SensorError> {
        let mut state = self.state.lock().expect("fake sensor state");
        state.calls += 1;
        state
            .outcomes
            .pop_front()
            .unwrap_or(Err(SensorError::Unavailable))
    }
}
