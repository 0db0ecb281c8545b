//! Camera adapter driving an external capture command.
//!
//! Kiosk hardware exposes stills through a CLI (`rpicam-still`,
//! `libcamera-still`, `fswebcam`, ...) that writes one encoded frame to
//! stdout. Opening a stream picks a configured device by facing, probes its
//! device node when one is declared, and holds an exclusivity guard until the
//! stream is dropped.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::{CameraStream, Facing, StillCamera};
use crate::config::CameraDevice;
use crate::error::CaptureError;

pub struct CommandCamera {
    devices: Vec<CameraDevice>,
    capture_timeout: Duration,
    guard: Arc<Mutex<()>>,
}

impl CommandCamera {
    pub fn new(devices: Vec<CameraDevice>, capture_timeout: Duration) -> Self {
        Self {
            devices,
            capture_timeout,
            guard: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl StillCamera for CommandCamera {
    async fn open(&self, preference: Facing) -> Result<Box<dyn CameraStream>, CaptureError> {
        let mut saw_permission_denial = false;
        for device in candidates(&self.devices, preference) {
            match probe(device) {
                Ok(()) => {
                    let held = self.guard.clone().try_lock_owned().map_err(|_| {
                        CaptureError::DeviceUnavailable(
                            "camera already held by another stream".into(),
                        )
                    })?;
                    info!(camera = %device.name, "camera stream opened");
                    return Ok(Box::new(CommandStream {
                        device: device.clone(),
                        timeout: self.capture_timeout,
                        _held: held,
                    }));
                }
                Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                    warn!(camera = %device.name, "camera node not accessible");
                    saw_permission_denial = true;
                }
                Err(err) => {
                    debug!(camera = %device.name, error = %err, "camera probe failed; trying next");
                }
            }
        }
        if saw_permission_denial {
            Err(CaptureError::PermissionDenied)
        } else {
            Err(CaptureError::NotFound)
        }
    }
}

/// Devices matching the preference first, every other device after, original
/// order preserved within each group.
fn candidates(devices: &[CameraDevice], preference: Facing) -> Vec<&CameraDevice> {
    let mut ordered: Vec<&CameraDevice> = devices
        .iter()
        .filter(|d| matches_facing(d.facing, preference))
        .collect();
    ordered.extend(
        devices
            .iter()
            .filter(|d| !matches_facing(d.facing, preference)),
    );
    ordered
}

fn matches_facing(device: Facing, preference: Facing) -> bool {
    preference == Facing::Any || device == preference || device == Facing::Any
}

fn probe(device: &CameraDevice) -> io::Result<()> {
    if device.capture_command.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty capture command",
        ));
    }
    if let Some(node) = &device.device_node {
        std::fs::metadata(node)?;
    }
    Ok(())
}

#[derive(Debug)]
struct CommandStream {
    device: CameraDevice,
    timeout: Duration,
    _held: OwnedMutexGuard<()>,
}

#[async_trait]
impl CameraStream for CommandStream {
    async fn capture_still(&mut self) -> Result<Vec<u8>, CaptureError> {
        let (program, args) = self
            .device
            .capture_command
            .split_first()
            .ok_or_else(|| CaptureError::DeviceUnavailable("empty capture command".into()))?;
        debug!(camera = %self.device.name, command = %program, "capturing still frame");
        let mut command = Command::new(program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                CaptureError::DeviceUnavailable(format!(
                    "capture command timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|err| {
                CaptureError::DeviceUnavailable(format!("failed to run {program}: {err}"))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::DeviceUnavailable(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(CaptureError::DeviceUnavailable(format!(
                "{program} produced no frame data"
            )));
        }
        info!(
            camera = %self.device.name,
            bytes = output.stdout.len(),
            "still frame captured"
        );
        Ok(output.stdout)
    }
}

impl Drop for CommandStream {
    fn drop(&mut self) {
        debug!(camera = %self.device.name, "camera stream released");
    }
}
