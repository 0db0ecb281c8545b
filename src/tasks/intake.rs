//! The serialized intake loop that owns one report draft.
//!
//! Every pipeline mutation goes through this task: commands arrive on an mpsc
//! channel and run to completion one at a time, so two captures can never
//! both observe an unlocked location and race to lock it. Later commands
//! queue behind the one in flight; nothing is rejected for timing.
//!
//! After each command the task publishes a fresh [`DraftSnapshot`] on a watch
//! channel for whatever display surface is attached.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::device::{CameraStream, Facing, LocationSensor, StillCamera};
use crate::draft::ReportDraft;
use crate::error::{CaptureError, PipelineError};
use crate::events::{DraftSnapshot, IncomingFile, IntakeCommand, SnapshotPhoto};
use crate::location::{CaptureTrigger, LocationResolver};
use crate::metadata::MetadataDecoder;
use crate::photoset::NewPhoto;
use crate::previews::PreviewStore;
use crate::session::SessionStore;
use crate::submit::{assemble_payload, ReportTransport};

/// Everything the intake loop talks to. Real adapters in production, fakes in
/// tests; the loop cannot tell the difference.
pub struct IntakeDeps {
    pub camera: Arc<dyn StillCamera>,
    pub sensor: Arc<dyn LocationSensor>,
    pub decoder: Arc<dyn MetadataDecoder>,
    pub previews: Arc<dyn PreviewStore>,
    pub transport: Arc<dyn ReportTransport>,
    pub session: Arc<dyn SessionStore>,
    pub settings: IntakeSettings,
}

#[derive(Debug, Clone)]
pub struct IntakeSettings {
    pub facing: Facing,
    pub fix_timeout: Duration,
    pub high_accuracy: bool,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            facing: Facing::Rear,
            fix_timeout: Duration::from_secs(5),
            high_accuracy: true,
        }
    }
}

/// Clonable handle over the command channel. Each method sends one command
/// and waits for its reply.
#[derive(Clone)]
pub struct IntakeHandle {
    commands: mpsc::Sender<IntakeCommand>,
}

impl IntakeHandle {
    pub fn new(commands: mpsc::Sender<IntakeCommand>) -> Self {
        Self { commands }
    }

    async fn request<F>(&self, build: F) -> Result<(), PipelineError>
    where
        F: FnOnce(oneshot::Sender<Result<(), PipelineError>>) -> IntakeCommand,
    {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| PipelineError::Closed)?;
        rx.await.map_err(|_| PipelineError::Closed)?
    }

    pub async fn open_camera(&self) -> Result<(), PipelineError> {
        self.request(|reply| IntakeCommand::OpenCamera { reply }).await
    }

    pub async fn capture_still(&self) -> Result<(), PipelineError> {
        self.request(|reply| IntakeCommand::CaptureStill { reply }).await
    }

    pub async fn close_camera(&self) -> Result<(), PipelineError> {
        self.request(|reply| IntakeCommand::CloseCamera { reply }).await
    }

    pub async fn upload(&self, files: Vec<IncomingFile>) -> Result<(), PipelineError> {
        self.request(|reply| IntakeCommand::UploadFiles { files, reply })
            .await
    }

    pub async fn remove_photo(&self, index: usize) -> Result<(), PipelineError> {
        self.request(|reply| IntakeCommand::RemovePhoto { index, reply })
            .await
    }

    pub async fn set_description(&self, text: impl Into<String>) -> Result<(), PipelineError> {
        let text = text.into();
        self.request(|reply| IntakeCommand::SetDescription { text, reply })
            .await
    }

    pub async fn set_category(
        &self,
        category: Option<crate::draft::Category>,
    ) -> Result<(), PipelineError> {
        self.request(|reply| IntakeCommand::SetCategory { category, reply })
            .await
    }

    pub async fn submit(&self) -> Result<(), PipelineError> {
        self.request(|reply| IntakeCommand::Submit { reply }).await
    }

    pub async fn abandon(&self) -> Result<(), PipelineError> {
        self.request(|reply| IntakeCommand::Abandon { reply }).await
    }
}

/// Runs the intake loop until the command channel closes or `cancel` fires.
/// Teardown releases the camera and every preview either way.
pub async fn run(
    deps: IntakeDeps,
    mut commands: mpsc::Receiver<IntakeCommand>,
    snapshots: watch::Sender<DraftSnapshot>,
    cancel: CancellationToken,
) -> Result<()> {
    let resolver = LocationResolver::new(
        Arc::clone(&deps.sensor),
        Arc::clone(&deps.decoder),
        deps.settings.fix_timeout,
        deps.settings.high_accuracy,
    );
    let mut draft = ReportDraft::new(Arc::clone(&deps.previews));
    let mut camera: Option<Box<dyn CameraStream>> = None;

    info!("intake loop started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; discarding draft");
                break;
            }
            maybe_command = commands.recv() => {
                let Some(command) = maybe_command else {
                    debug!("command channel closed");
                    break;
                };
                handle_command(&deps, &resolver, &mut draft, &mut camera, command).await;
                let _ = snapshots.send(snapshot_of(&draft, camera.is_some()));
            }
        }
    }

    // Teardown: stop the camera and release every preview no matter how the
    // loop exited.
    camera.take();
    draft.reset();
    let _ = snapshots.send(snapshot_of(&draft, false));
    Ok(())
}

async fn handle_command(
    deps: &IntakeDeps,
    resolver: &LocationResolver,
    draft: &mut ReportDraft,
    camera: &mut Option<Box<dyn CameraStream>>,
    command: IntakeCommand,
) {
    match command {
        IntakeCommand::OpenCamera { reply } => {
            let _ = reply.send(open_camera(deps, camera).await);
        }
        IntakeCommand::CaptureStill { reply } => {
            let _ = reply.send(capture_still(resolver, draft, camera).await);
        }
        IntakeCommand::CloseCamera { reply } => {
            if camera.take().is_some() {
                debug!("camera view closed");
            }
            let _ = reply.send(Ok(()));
        }
        IntakeCommand::UploadFiles { files, reply } => {
            let _ = reply.send(upload_files(resolver, draft, files).await);
        }
        IntakeCommand::RemovePhoto { index, reply } => {
            // An out-of-range index is ignored, matching how a display
            // surface with a stale index should be treated.
            draft.photos_mut().remove(index);
            let _ = reply.send(Ok(()));
        }
        IntakeCommand::SetDescription { text, reply } => {
            draft.set_description(text);
            let _ = reply.send(Ok(()));
        }
        IntakeCommand::SetCategory { category, reply } => {
            draft.set_category(category);
            let _ = reply.send(Ok(()));
        }
        IntakeCommand::Submit { reply } => {
            let _ = reply.send(submit(deps, draft).await);
        }
        IntakeCommand::Abandon { reply } => {
            camera.take();
            draft.reset();
            info!("draft abandoned");
            let _ = reply.send(Ok(()));
        }
    }
}

async fn open_camera(
    deps: &IntakeDeps,
    camera: &mut Option<Box<dyn CameraStream>>,
) -> Result<(), PipelineError> {
    if camera.is_some() {
        debug!("camera already open");
        return Ok(());
    }
    let stream = deps.camera.open(deps.settings.facing).await?;
    *camera = Some(stream);
    Ok(())
}

/// One camera capture: grab a frame, lock the location if none is locked,
/// store the photo. A failure at any step leaves the draft exactly as it
/// was; only the grabbed frame is lost.
async fn capture_still(
    resolver: &LocationResolver,
    draft: &mut ReportDraft,
    camera: &mut Option<Box<dyn CameraStream>>,
) -> Result<(), PipelineError> {
    let Some(stream) = camera.as_mut() else {
        return Err(CaptureError::DeviceUnavailable("camera view is not open".into()).into());
    };
    // Check the ceiling before the hardware does any work, so a full set
    // cannot end up locking a location for a photo that will be rejected.
    draft.photos().ensure_capacity(1)?;
    let frame = stream.capture_still().await?;
    let location = resolver
        .resolve(CaptureTrigger::Camera, draft.location())
        .await?;
    draft.lock_location(location);
    draft.photos_mut().add(vec![NewPhoto::camera_frame(frame)])?;
    info!(photos = draft.photos().len(), "camera still stored");
    Ok(())
}

/// One uploaded batch, accepted whole or not at all. The first file's
/// metadata is consulted only when no location is locked yet; later files
/// never are.
async fn upload_files(
    resolver: &LocationResolver,
    draft: &mut ReportDraft,
    files: Vec<IncomingFile>,
) -> Result<(), PipelineError> {
    if files.is_empty() {
        debug!("empty upload batch ignored");
        return Ok(());
    }
    draft.photos().ensure_capacity(files.len())?;
    let location = resolver
        .resolve(
            CaptureTrigger::Upload {
                first_file: &files[0].bytes,
            },
            draft.location(),
        )
        .await?;
    draft.lock_location(location);
    let batch: Vec<NewPhoto> = files.into_iter().map(NewPhoto::uploaded).collect();
    let added = batch.len();
    draft.photos_mut().add(batch)?;
    info!(added, photos = draft.photos().len(), "upload batch stored");
    Ok(())
}

/// Validate, assemble, hand off. The draft resets only after the transport
/// acknowledges; any failure leaves it intact for a retry.
async fn submit(deps: &IntakeDeps, draft: &mut ReportDraft) -> Result<(), PipelineError> {
    let submitter = deps.session.current();
    let payload = assemble_payload(draft, submitter.as_ref())?;
    let parts = payload.parts.len();
    deps.transport.submit(payload).await?;
    draft.reset();
    info!(parts, "report submitted; draft reset");
    Ok(())
}

fn snapshot_of(draft: &ReportDraft, camera_open: bool) -> DraftSnapshot {
    DraftSnapshot {
        phase: draft.phase(),
        photos: draft
            .photos()
            .photos()
            .iter()
            .map(|photo| SnapshotPhoto {
                file_name: photo.file_name().to_owned(),
                preview: photo.preview().path().map(|p| p.to_owned()),
            })
            .collect(),
        location: draft.location(),
        description: draft.description().to_owned(),
        category: draft.category(),
        camera_open,
    }
}
