use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Result};
use serde::Deserialize;

use crate::device::Facing;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Report service endpoint settings.
    pub api: ApiOptions,
    /// Configured still cameras, tried in order.
    pub camera: CameraOptions,
    /// Device location sensor settings.
    pub sensor: SensorOptions,
    /// Where preview files for stored photos live.
    pub previews: PreviewOptions,
    /// Where the signed-in reporter identity is read from.
    pub session: SessionOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.api.base_url.trim().is_empty(),
            "api.base-url must not be empty"
        );
        ensure!(
            !self.api.submit_route.trim().is_empty(),
            "api.submit-route must not be empty"
        );
        ensure!(
            self.previews.max_edge > 0,
            "previews.max-edge must be greater than zero"
        );
        for device in &self.camera.devices {
            ensure!(
                !device.capture_command.is_empty(),
                "camera device '{}' needs a capture-command",
                device.name
            );
        }
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api: ApiOptions::default(),
            camera: CameraOptions::default(),
            sensor: SensorOptions::default(),
            previews: PreviewOptions::default(),
            session: SessionOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ApiOptions {
    /// Base URL of the report service.
    pub base_url: String,
    /// Route the multipart submission is POSTed to, joined onto the base URL.
    pub submit_route: String,
    /// Outbound request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl ApiOptions {
    fn default_base_url() -> String {
        "https://backend-laporin.vercel.app/api/v1".to_string()
    }

    fn default_submit_route() -> String {
        "/reports/create".to_string()
    }

    const fn default_request_timeout() -> Duration {
        Duration::from_secs(30)
    }

    /// Full submission endpoint.
    pub fn submit_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.submit_route
        )
    }
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            submit_route: Self::default_submit_route(),
            request_timeout: Self::default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CameraOptions {
    /// Cameras attached to the kiosk. Empty means no camera capture; uploads
    /// still work.
    pub devices: Vec<CameraDevice>,
    /// Facing the live view prefers when several devices are configured.
    pub prefer_facing: Facing,
    /// How long one still capture may take.
    #[serde(with = "humantime_serde")]
    pub capture_timeout: Duration,
}

impl CameraOptions {
    const fn default_capture_timeout() -> Duration {
        Duration::from_secs(10)
    }
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            prefer_facing: Facing::Rear,
            capture_timeout: Self::default_capture_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CameraDevice {
    /// Name used in logs and doctor output.
    pub name: String,
    #[serde(default)]
    pub facing: Facing,
    /// Command that writes one encoded still frame to stdout.
    pub capture_command: Vec<String>,
    /// Device node probed before the camera counts as present.
    #[serde(default)]
    pub device_node: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SensorOptions {
    /// gpsd socket address.
    pub gpsd_address: String,
    /// How long to wait for a usable fix.
    #[serde(with = "humantime_serde")]
    pub fix_timeout: Duration,
    /// Require a full 3-D solution instead of accepting 2-D fixes.
    pub high_accuracy: bool,
}

impl SensorOptions {
    fn default_gpsd_address() -> String {
        "127.0.0.1:2947".to_string()
    }

    const fn default_fix_timeout() -> Duration {
        Duration::from_secs(5)
    }
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self {
            gpsd_address: Self::default_gpsd_address(),
            fix_timeout: Self::default_fix_timeout(),
            high_accuracy: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PreviewOptions {
    /// Directory preview files are written into.
    pub directory: PathBuf,
    /// Longest edge of a rendered preview, in pixels.
    pub max_edge: u32,
}

impl PreviewOptions {
    const fn default_max_edge() -> u32 {
        512
    }
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/cache/lapor-kiosk/previews"),
            max_edge: Self::default_max_edge(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionOptions {
    /// JSON file holding the signed-in reporter identity.
    pub path: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/lapor-kiosk/session.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.api.base_url, "https://backend-laporin.vercel.app/api/v1");
        assert_eq!(cfg.api.request_timeout, Duration::from_secs(30));
        assert!(cfg.camera.devices.is_empty());
        assert_eq!(cfg.camera.prefer_facing, Facing::Rear);
        assert_eq!(cfg.sensor.gpsd_address, "127.0.0.1:2947");
        assert_eq!(cfg.sensor.fix_timeout, Duration::from_secs(5));
        assert!(cfg.sensor.high_accuracy);
        assert_eq!(cfg.previews.max_edge, 512);
        assert!(cfg.validated().is_ok());
    }

    #[test]
    fn full_yaml_round_trips() {
        let yaml = r#"
api:
  base-url: "http://127.0.0.1:8080/api/v1"
  submit-route: "/reports/create"
  request-timeout: 10s
camera:
  prefer-facing: rear
  capture-timeout: 8s
  devices:
    - name: pi-rear
      facing: rear
      capture-command: ["rpicam-still", "--output", "-", "--nopreview"]
      device-node: /dev/video0
    - name: usb
      facing: any
      capture-command: ["fswebcam", "--save", "-"]
sensor:
  gpsd-address: "127.0.0.1:2947"
  fix-timeout: 5s
  high-accuracy: true
previews:
  directory: /tmp/previews
  max-edge: 256
session:
  path: /tmp/session.json
"#;
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        let cfg = cfg.validated().unwrap();
        assert_eq!(cfg.api.submit_endpoint(), "http://127.0.0.1:8080/api/v1/reports/create");
        assert_eq!(cfg.camera.devices.len(), 2);
        assert_eq!(cfg.camera.devices[0].name, "pi-rear");
        assert_eq!(cfg.camera.devices[0].facing, Facing::Rear);
        assert_eq!(
            cfg.camera.devices[0].device_node.as_deref(),
            Some(Path::new("/dev/video0"))
        );
        assert_eq!(cfg.camera.devices[1].facing, Facing::Any);
        assert_eq!(cfg.camera.capture_timeout, Duration::from_secs(8));
        assert_eq!(cfg.previews.max_edge, 256);
    }

    #[test]
    fn trailing_slash_on_base_url_is_tolerated() {
        let yaml = r#"
api:
  base-url: "http://127.0.0.1:8080/api/v1/"
"#;
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.api.submit_endpoint(), "http://127.0.0.1:8080/api/v1/reports/create");
    }

    #[test]
    fn blank_base_url_fails_validation() {
        let yaml = r#"
api:
  base-url: "  "
"#;
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn zero_max_edge_fails_validation() {
        let yaml = r#"
previews:
  max-edge: 0
"#;
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn device_without_capture_command_fails_validation() {
        let yaml = r#"
camera:
  devices:
    - name: broken
      capture-command: []
"#;
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn unknown_facing_is_rejected() {
        let yaml = r#"
camera:
  prefer-facing: sideways
"#;
        assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
    }
}
