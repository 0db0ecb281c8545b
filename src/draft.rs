//! Report draft state and the submit gate.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::bail;
use tracing::warn;

use crate::error::ValidationError;
use crate::geo::GeoPoint;
use crate::photoset::PhotoSet;
use crate::previews::PreviewStore;
use crate::session::Submitter;

/// Incident categories the report service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Sampah,
    JalanRusak,
    Banjir,
    Lainnya,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Sampah,
        Category::JalanRusak,
        Category::Banjir,
        Category::Lainnya,
    ];

    /// The wire name the report service expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Sampah => "sampah",
            Category::JalanRusak => "jalan_rusak",
            Category::Banjir => "banjir",
            Category::Lainnya => "lainnya",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for category in Category::ALL {
            if s == category.as_str() {
                return Ok(category);
            }
        }
        bail!("unknown category '{s}'; expected one of sampah, jalan_rusak, banjir, lainnya")
    }
}

/// Where a draft stands in the capture lifecycle. Derived from the fields,
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftPhase {
    /// No photos stored yet.
    #[default]
    Empty,
    /// At least one photo stored; text fields still incomplete.
    Ready,
    /// Every submit-gated field is present.
    Submittable,
}

/// One in-progress report.
///
/// Owned by the intake task; every mutation goes through it, so one command
/// finishes before the next one observes the draft.
pub struct ReportDraft {
    photos: PhotoSet,
    location: Option<GeoPoint>,
    description: String,
    category: Option<Category>,
}

impl ReportDraft {
    pub fn new(previews: Arc<dyn PreviewStore>) -> Self {
        Self {
            photos: PhotoSet::new(previews),
            location: None,
            description: String::new(),
            category: None,
        }
    }

    pub fn photos(&self) -> &PhotoSet {
        &self.photos
    }

    pub fn photos_mut(&mut self) -> &mut PhotoSet {
        &mut self.photos
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    /// Locks the draft's location. The first lock wins; a later call with a
    /// different point is ignored, so photo metadata can never overwrite a
    /// location that an earlier capture established.
    pub fn lock_location(&mut self, point: GeoPoint) {
        if let Some(existing) = self.location {
            if existing != point {
                warn!(%existing, %point, "ignoring second location lock");
            }
            return;
        }
        self.location = Some(point);
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, text: String) {
        self.description = text;
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn set_category(&mut self, category: Option<Category>) {
        self.category = category;
    }

    /// Submit-gate checks in contract order; the first failure wins and no
    /// later check runs.
    pub fn validate(&self, submitter: Option<&Submitter>) -> Result<(), ValidationError> {
        if self.photos.is_empty() {
            return Err(ValidationError::NoPhotos);
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::NoDescription);
        }
        if self.category.is_none() {
            return Err(ValidationError::NoCategory);
        }
        if submitter.is_none() {
            return Err(ValidationError::NoIdentity);
        }
        Ok(())
    }

    /// Drops all photos (releasing their previews), the location lock, the
    /// description and the category. The draft is back at `Empty`.
    pub fn reset(&mut self) {
        self.photos.clear();
        self.location = None;
        self.description.clear();
        self.category = None;
    }

    pub fn phase(&self) -> DraftPhase {
        if self.photos.is_empty() {
            DraftPhase::Empty
        } else if self.description.trim().is_empty() || self.category.is_none() {
            DraftPhase::Ready
        } else {
            DraftPhase::Submittable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photoset::NewPhoto;
    use crate::previews::NullPreviewStore;

    fn draft() -> ReportDraft {
        ReportDraft::new(Arc::new(NullPreviewStore::default()))
    }

    fn draft_with_photo() -> ReportDraft {
        let mut draft = draft();
        draft
            .photos_mut()
            .add(vec![NewPhoto::camera_frame(vec![1, 2, 3])])
            .unwrap();
        draft
    }

    fn submitter() -> Submitter {
        Submitter {
            id: "user-17".into(),
            name: None,
        }
    }

    #[test]
    fn validation_checks_photos_first() {
        // Everything else is missing too; photos win.
        assert_eq!(draft().validate(None), Err(ValidationError::NoPhotos));
    }

    #[test]
    fn validation_rejects_blank_description() {
        let mut draft = draft_with_photo();
        draft.set_description("   \t".into());
        assert_eq!(
            draft.validate(Some(&submitter())),
            Err(ValidationError::NoDescription)
        );
    }

    #[test]
    fn validation_requires_a_category() {
        let mut draft = draft_with_photo();
        draft.set_description("jalan berlubang besar".into());
        assert_eq!(
            draft.validate(Some(&submitter())),
            Err(ValidationError::NoCategory)
        );
    }

    #[test]
    fn validation_requires_an_identity_last() {
        let mut draft = draft_with_photo();
        draft.set_description("jalan berlubang besar".into());
        draft.set_category(Some(Category::JalanRusak));
        assert_eq!(draft.validate(None), Err(ValidationError::NoIdentity));
        assert_eq!(draft.validate(Some(&submitter())), Ok(()));
    }

    #[test]
    fn first_location_lock_wins() {
        let mut draft = draft();
        let first = GeoPoint::try_new(-6.2, 106.8).unwrap();
        let second = GeoPoint::try_new(45.0, 9.0).unwrap();
        draft.lock_location(first);
        draft.lock_location(second);
        assert_eq!(draft.location(), Some(first));
    }

    #[test]
    fn reset_returns_to_empty() {
        let mut draft = draft_with_photo();
        draft.lock_location(GeoPoint::try_new(-6.2, 106.8).unwrap());
        draft.set_description("tumpukan sampah".into());
        draft.set_category(Some(Category::Sampah));
        assert_eq!(draft.phase(), DraftPhase::Submittable);

        draft.reset();
        assert_eq!(draft.phase(), DraftPhase::Empty);
        assert!(draft.photos().is_empty());
        assert_eq!(draft.location(), None);
        assert_eq!(draft.description(), "");
        assert_eq!(draft.category(), None);
    }

    #[test]
    fn phase_follows_the_fields() {
        let mut draft = draft();
        assert_eq!(draft.phase(), DraftPhase::Empty);

        draft
            .photos_mut()
            .add(vec![NewPhoto::camera_frame(vec![1])])
            .unwrap();
        assert_eq!(draft.phase(), DraftPhase::Ready);

        draft.set_description("banjir setinggi lutut".into());
        assert_eq!(draft.phase(), DraftPhase::Ready);

        draft.set_category(Some(Category::Banjir));
        assert_eq!(draft.phase(), DraftPhase::Submittable);

        draft.set_category(None);
        assert_eq!(draft.phase(), DraftPhase::Ready);
    }

    #[test]
    fn category_wire_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert_eq!("jalan_rusak".parse::<Category>().unwrap(), Category::JalanRusak);
        assert!("potholes".parse::<Category>().is_err());
    }
}
