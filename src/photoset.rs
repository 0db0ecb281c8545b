//! The ordered photo collection owned by one report draft.

use std::sync::Arc;

use tracing::debug;

use crate::error::CapacityError;
use crate::events::IncomingFile;
use crate::previews::{PreviewHandle, PreviewStore};

/// Hard ceiling on evidence photos per report.
pub const MAX_PHOTOS: usize = 4;

/// A photo on its way into the set, before a preview exists for it.
#[derive(Debug)]
pub struct NewPhoto {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: &'static str,
}

impl NewPhoto {
    /// Wraps a frame grabbed from the live camera. Named after the capture
    /// instant so two stills never collide.
    pub fn camera_frame(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: format!("capture-{}.jpg", chrono::Utc::now().timestamp_millis()),
            content_type: "image/jpeg",
        }
    }

    /// Wraps a file handed over by the picker/import surface.
    pub fn uploaded(file: IncomingFile) -> Self {
        let content_type = content_type_for(&file.name);
        Self {
            bytes: file.bytes,
            file_name: file.name,
            content_type,
        }
    }
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// One accepted photo together with its preview handle.
#[derive(Debug)]
pub struct CapturedPhoto {
    bytes: Vec<u8>,
    file_name: String,
    content_type: &'static str,
    preview: PreviewHandle,
}

impl CapturedPhoto {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

/// Ordered, bounded photo collection. Owns one preview handle per photo;
/// every photo leaving the set releases its handle, and `Drop` sweeps
/// whatever is left so an abandoned draft cannot leak.
pub struct PhotoSet {
    store: Arc<dyn PreviewStore>,
    photos: Vec<CapturedPhoto>,
}

impl PhotoSet {
    pub fn new(store: Arc<dyn PreviewStore>) -> Self {
        Self {
            store,
            photos: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn photos(&self) -> &[CapturedPhoto] {
        &self.photos
    }

    /// Checks whether a batch of `incoming` photos would fit.
    pub fn ensure_capacity(&self, incoming: usize) -> Result<(), CapacityError> {
        if self.photos.len() + incoming > MAX_PHOTOS {
            return Err(CapacityError::LimitExceeded {
                stored: self.photos.len(),
                incoming,
                limit: MAX_PHOTOS,
            });
        }
        Ok(())
    }

    /// Accepts a batch whole or not at all.
    ///
    /// Preview handles are acquired for the entire batch first, in insertion
    /// order; if the ceiling then rejects the batch, every handle acquired
    /// for it is released again and the set is left untouched.
    pub fn add(&mut self, batch: Vec<NewPhoto>) -> Result<(), CapacityError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut staged = Vec::with_capacity(batch.len());
        for photo in batch {
            let preview = self.store.acquire(&photo.bytes);
            staged.push(CapturedPhoto {
                bytes: photo.bytes,
                file_name: photo.file_name,
                content_type: photo.content_type,
                preview,
            });
        }
        if self.photos.len() + staged.len() > MAX_PHOTOS {
            let incoming = staged.len();
            for photo in staged {
                self.store.release(photo.preview);
            }
            return Err(CapacityError::LimitExceeded {
                stored: self.photos.len(),
                incoming,
                limit: MAX_PHOTOS,
            });
        }
        self.photos.extend(staged);
        Ok(())
    }

    /// Releases the preview of the photo at `index` and drops the photo;
    /// later photos shift down one position. An out-of-range index leaves
    /// the set untouched and returns `false`.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.photos.len() {
            debug!(index, len = self.photos.len(), "no photo at that position");
            return false;
        }
        let photo = self.photos.remove(index);
        self.store.release(photo.preview);
        true
    }

    /// Releases every preview and empties the set.
    pub fn clear(&mut self) {
        for photo in self.photos.drain(..) {
            self.store.release(photo.preview);
        }
    }
}

impl Drop for PhotoSet {
    fn drop(&mut self) {
        self.clear();
    }
}
