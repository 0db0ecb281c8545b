#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lapor_kiosk::device::fake::{FakeCamera, FakeSensor};
use lapor_kiosk::events::{DraftSnapshot, IncomingFile};
use lapor_kiosk::metadata::FixedDecoder;
use lapor_kiosk::previews::DiskPreviewStore;
use lapor_kiosk::session::{SessionStore, StaticSession};
use lapor_kiosk::submit::RecordingTransport;
use lapor_kiosk::tasks::intake::{self, IntakeDeps, IntakeHandle, IntakeSettings};

/// A running intake task wired to fakes, plus probes into every side effect
/// the pipeline can have.
pub struct Rig {
    pub handle: IntakeHandle,
    pub snapshots: watch::Receiver<DraftSnapshot>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<anyhow::Result<()>>,
    pub camera: FakeCamera,
    pub sensor: FakeSensor,
    pub decoder: FixedDecoder,
    pub transport: RecordingTransport,
    pub previews_dir: TempDir,
}

impl Rig {
    pub fn snapshot(&mut self) -> DraftSnapshot {
        self.snapshots.borrow_and_update().clone()
    }

    /// Preview files currently on disk; the leak probe.
    pub fn preview_files(&self) -> usize {
        std::fs::read_dir(self.previews_dir.path())
            .expect("preview dir readable")
            .count()
    }

    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }
}

pub struct RigBuilder {
    camera: FakeCamera,
    sensor: FakeSensor,
    decoder: FixedDecoder,
    transport: RecordingTransport,
    session: Arc<dyn SessionStore>,
}

/// Defaults: a camera with plenty of frames, a sensor answering with a
/// Jakarta fix, no photo metadata, an accepting transport and a signed-in
/// reporter.
pub fn rig() -> RigBuilder {
    let frames = (0..8)
        .map(|n| format!("frame-{n}").into_bytes())
        .collect();
    RigBuilder {
        camera: FakeCamera::with_frames(frames),
        sensor: FakeSensor::with_fix(-6.2, 106.8),
        decoder: FixedDecoder::empty(),
        transport: RecordingTransport::accepting(),
        session: Arc::new(StaticSession::signed_in("user-17")),
    }
}

impl RigBuilder {
    pub fn camera(mut self, camera: FakeCamera) -> Self {
        self.camera = camera;
        self
    }

    pub fn sensor(mut self, sensor: FakeSensor) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn decoder(mut self, decoder: FixedDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn transport(mut self, transport: RecordingTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn session(mut self, session: impl SessionStore + 'static) -> Self {
        self.session = Arc::new(session);
        self
    }

    pub fn spawn(self) -> Rig {
        let previews_dir = tempfile::tempdir().expect("create preview dir");
        let deps = IntakeDeps {
            camera: Arc::new(self.camera.clone()),
            sensor: Arc::new(self.sensor.clone()),
            decoder: Arc::new(self.decoder.clone()),
            previews: Arc::new(DiskPreviewStore::new(previews_dir.path(), 64)),
            transport: Arc::new(self.transport.clone()),
            session: self.session,
            settings: IntakeSettings::default(),
        };
        let (command_tx, command_rx) = mpsc::channel(16);
        let (snapshot_tx, snapshot_rx) = watch::channel(DraftSnapshot::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(intake::run(deps, command_rx, snapshot_tx, cancel.clone()));
        Rig {
            handle: IntakeHandle::new(command_tx),
            snapshots: snapshot_rx,
            cancel,
            task,
            camera: self.camera,
            sensor: self.sensor,
            decoder: self.decoder,
            transport: self.transport,
            previews_dir,
        }
    }
}

pub fn file(name: &str, bytes: &[u8]) -> IncomingFile {
    IncomingFile {
        name: name.to_string(),
        bytes: bytes.to_vec(),
    }
}
