//! Messages in and out of the intake task.

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::draft::{Category, DraftPhase};
use crate::error::PipelineError;
use crate::geo::GeoPoint;

/// A file handed to the pipeline by the picker/import surface.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Reply channel for one command.
pub type Reply<T> = oneshot::Sender<Result<T, PipelineError>>;

/// One user action against the shared draft. The intake task processes
/// commands strictly in arrival order, one at a time.
#[derive(Debug)]
pub enum IntakeCommand {
    /// Open the live camera view, claiming the device.
    OpenCamera { reply: Reply<()> },

    /// Grab one still from the open camera; locks the draft location from
    /// the device sensor if none is locked yet.
    CaptureStill { reply: Reply<()> },

    /// Close the camera view, releasing the device.
    CloseCamera { reply: Reply<()> },

    /// Add an uploaded batch; the first file's embedded metadata may lock
    /// the draft location.
    UploadFiles {
        files: Vec<IncomingFile>,
        reply: Reply<()>,
    },

    /// Remove the photo at `index`; later photos shift down.
    RemovePhoto { index: usize, reply: Reply<()> },

    SetDescription { text: String, reply: Reply<()> },

    SetCategory {
        category: Option<Category>,
        reply: Reply<()>,
    },

    /// Validate the draft, assemble the payload and hand it to the
    /// transport; the draft resets only on an acknowledged submission.
    Submit { reply: Reply<()> },

    /// Discard the draft and release everything without a transport call.
    Abandon { reply: Reply<()> },
}

/// Everything a display surface needs to mirror the draft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftSnapshot {
    pub phase: DraftPhase,
    pub photos: Vec<SnapshotPhoto>,
    pub location: Option<GeoPoint>,
    pub description: String,
    pub category: Option<Category>,
    pub camera_open: bool,
}

/// One stored photo as the display surface sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPhoto {
    pub file_name: String,
    pub preview: Option<PathBuf>,
}
