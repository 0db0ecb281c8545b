use thiserror::Error;

/// Failures while resolving the single authoritative location for a draft.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocationError {
    /// The device has no usable location sensor.
    #[error("location sensor unavailable")]
    SensorUnavailable,

    /// No fix arrived within the configured deadline.
    #[error("location fix timed out")]
    SensorTimeout,

    /// The sensor refused to hand out a fix.
    #[error("location access denied")]
    SensorDenied,

    /// The first uploaded photo carries no readable location metadata.
    #[error("first photo has no usable location metadata")]
    NoMetadata,

    /// Coordinates fell outside the valid latitude/longitude range.
    #[error("coordinates out of range: {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// Failures while growing the photo set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapacityError {
    /// The batch would push the set past the photo ceiling; nothing was added.
    #[error("photo limit exceeded: {stored} stored + {incoming} incoming > {limit}")]
    LimitExceeded {
        stored: usize,
        incoming: usize,
        limit: usize,
    },
}

/// Submit-gate failures, in the order the gate checks them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a report needs at least one photo")]
    NoPhotos,

    #[error("a report needs a description")]
    NoDescription,

    #[error("a report needs a category")]
    NoCategory,

    #[error("no signed-in reporter in the session store")]
    NoIdentity,
}

/// Camera failures, both when opening a stream and when grabbing a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No configured camera matched the requested facing.
    #[error("no camera found")]
    NotFound,

    /// A camera exists but the kiosk may not touch it.
    #[error("camera access denied")]
    PermissionDenied,

    /// The device went away or refused to produce a frame.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Sensor-level outcomes of a fix request. The resolver maps these onto the
/// matching [`LocationError`] variants when surfacing them to the pipeline.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("location access denied")]
    Denied,

    #[error("no fix within the deadline")]
    Timeout,

    #[error("location sensor unavailable")]
    Unavailable,
}

impl From<SensorError> for LocationError {
    fn from(err: SensorError) -> Self {
        match err {
            SensorError::Denied => LocationError::SensorDenied,
            SensorError::Timeout => LocationError::SensorTimeout,
            SensorError::Unavailable => LocationError::SensorUnavailable,
        }
    }
}

/// Failures from the submission transport. The draft stays intact on any of
/// these; the reporter may retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The report service answered with a non-success status.
    #[error("submission rejected with HTTP status {status}")]
    Rejected { status: u16 },

    /// The report service could not be reached.
    #[error("failed to reach the report service: {0}")]
    Network(String),
}

/// Umbrella error surfaced at the intake boundary. Every command replies with
/// one of these; none of them is fatal to the pipeline itself.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The intake task is no longer running.
    #[error("capture pipeline is not running")]
    Closed,
}
