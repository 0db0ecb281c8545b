//! Preview resources for captured photos.
//!
//! Every photo accepted into a draft gets exactly one preview handle so a
//! display surface can show it before submission. Handles are acquired by the
//! photo set when a photo is stored and released exactly once, on removal or
//! reset. Release consumes the handle, so a double release does not compile.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::ImageFormat;
use tracing::{debug, warn};

/// Identity of one preview resource. Move-only by design.
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    path: Option<PathBuf>,
}

impl PreviewHandle {
    /// Builds a handle. Stores hand these out from [`PreviewStore::acquire`];
    /// `path` is `None` for stores with no backing file.
    pub fn new(id: u64, path: Option<PathBuf>) -> Self {
        Self { id, path }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Where the preview file lives, if one could be written.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Owns preview resources on behalf of the photo set.
pub trait PreviewStore: Send + Sync {
    /// Creates a preview for the given image bytes. Acquisition never fails:
    /// a photo whose bytes cannot be decoded or written still gets a handle,
    /// possibly without a backing file.
    fn acquire(&self, bytes: &[u8]) -> PreviewHandle;

    /// Releases a handle and whatever resource backs it.
    fn release(&self, handle: PreviewHandle);
}

/// Preview store that writes downscaled JPEG files into a cache directory.
///
/// Bytes that decode as an image are resized to fit `max_edge` and re-encoded;
/// bytes that do not decode are copied verbatim so the display surface can
/// still decide what to do with them.
pub struct DiskPreviewStore {
    dir: PathBuf,
    max_edge: u32,
    next_id: AtomicU64,
}

impl DiskPreviewStore {
    pub fn new(dir: impl Into<PathBuf>, max_edge: u32) -> Self {
        let dir = dir.into();
        if let Err(err) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %err, "could not create preview directory");
        }
        Self {
            dir,
            max_edge,
            next_id: AtomicU64::new(1),
        }
    }

    fn render(&self, bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        // thumbnail() never upscales below the source dimensions.
        let preview = decoded.thumbnail(self.max_edge, self.max_edge);
        let mut out = Cursor::new(Vec::new());
        preview.write_to(&mut out, ImageFormat::Jpeg)?;
        Ok(out.into_inner())
    }
}

impl PreviewStore for DiskPreviewStore {
    fn acquire(&self, bytes: &[u8]) -> PreviewHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (data, ext) = match self.render(bytes) {
            Ok(rendered) => (rendered, "jpg"),
            Err(err) => {
                debug!(id, error = %err, "preview source does not decode; copying verbatim");
                (bytes.to_vec(), "bin")
            }
        };
        let path = self.dir.join(format!("preview-{id:06}.{ext}"));
        match fs::write(&path, &data) {
            Ok(()) => {
                debug!(id, path = %path.display(), "preview written");
                PreviewHandle {
                    id,
                    path: Some(path),
                }
            }
            Err(err) => {
                warn!(id, path = %path.display(), error = %err, "could not write preview");
                PreviewHandle { id, path: None }
            }
        }
    }

    fn release(&self, handle: PreviewHandle) {
        let Some(path) = handle.path() else {
            return;
        };
        match fs::remove_file(path) {
            Ok(()) => debug!(id = handle.id, "preview released"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(id = handle.id, "preview already gone")
            }
            Err(err) => {
                warn!(id = handle.id, path = %path.display(), error = %err, "could not remove preview")
            }
        }
    }
}

/// Preview store for surfaces with nothing to display, such as the one-shot
/// CLI. Handles stay unique so accounting still works.
#[derive(Debug, Default)]
pub struct NullPreviewStore {
    next_id: AtomicU64,
}

impl PreviewStore for NullPreviewStore {
    fn acquire(&self, _bytes: &[u8]) -> PreviewHandle {
        PreviewHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            path: None,
        }
    }

    fn release(&self, _handle: PreviewHandle) {}
}
