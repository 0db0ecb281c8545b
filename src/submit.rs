//! Payload assembly and the submission transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::draft::ReportDraft;
use crate::error::{TransportError, ValidationError};
use crate::session::Submitter;

/// One multipart field, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadPart {
    File {
        name: &'static str,
        file_name: String,
        content_type: &'static str,
        bytes: Vec<u8>,
    },
    Text {
        name: &'static str,
        value: String,
    },
}

/// The assembled submission, fields in exactly the order the report service
/// reads them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    pub parts: Vec<PayloadPart>,
}

impl Payload {
    pub fn file_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, PayloadPart::File { .. }))
            .count()
    }

    /// First text field with the given name, if any.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            PayloadPart::Text { name: n, value } if *n == name => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Validates the draft and builds the multipart payload.
///
/// No payload exists for an invalid draft: the submit gate runs first and its
/// first failure aborts assembly. Field order is part of the service
/// contract: photo parts in insertion order, then description, category, the
/// coordinate pair when a location is locked, and finally the submitter id.
pub fn assemble_payload(
    draft: &ReportDraft,
    submitter: Option<&Submitter>,
) -> Result<Payload, ValidationError> {
    draft.validate(submitter)?;
    let category = draft.category().ok_or(ValidationError::NoCategory)?;
    let submitter = submitter.ok_or(ValidationError::NoIdentity)?;

    let mut parts = Vec::with_capacity(draft.photos().len() + 5);
    for photo in draft.photos().photos() {
        parts.push(PayloadPart::File {
            name: "images",
            file_name: photo.file_name().to_owned(),
            content_type: photo.content_type(),
            bytes: photo.bytes().to_vec(),
        });
    }
    parts.push(PayloadPart::Text {
        name: "description",
        value: draft.description().to_owned(),
    });
    parts.push(PayloadPart::Text {
        name: "category",
        value: category.as_str().to_owned(),
    });
    if let Some(location) = draft.location() {
        parts.push(PayloadPart::Text {
            name: "latitude",
            value: location.latitude.to_string(),
        });
        parts.push(PayloadPart::Text {
            name: "longitude",
            value: location.longitude.to_string(),
        });
    }
    parts.push(PayloadPart::Text {
        name: "user_id",
        value: submitter.id.clone(),
    });
    Ok(Payload { parts })
}

/// Hands an assembled payload to the report service. The intake task resets
/// the draft only after `submit` returns `Ok`.
#[async_trait]
pub trait ReportTransport: Send + Sync {
    async fn submit(&self, payload: Payload) -> Result<(), TransportError>;
}

/// reqwest-backed transport POSTing the payload as multipart form data.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ReportTransport for HttpTransport {
    async fn submit(&self, payload: Payload) -> Result<(), TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for part in payload.parts {
            match part {
                PayloadPart::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let part = reqwest::multipart::Part::bytes(bytes)
                        .file_name(file_name)
                        .mime_str(content_type)
                        .map_err(|err| TransportError::Network(err.to_string()))?;
                    form = form.part(name, part);
                }
                PayloadPart::Text { name, value } => {
                    form = form.text(name, value);
                }
            }
        }
        debug!(endpoint = %self.endpoint, "posting report");
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            info!(status = status.as_u16(), "report accepted");
            Ok(())
        } else {
            Err(TransportError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

/// Records every payload that reaches the wire and answers with a scripted
/// outcome; the default is acceptance.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<RecordingState>>,
}

#[derive(Default)]
struct RecordingState {
    submissions: Vec<Payload>,
    failures: VecDeque<TransportError>,
}

impl RecordingTransport {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn failing(error: TransportError) -> Self {
        let transport = Self::default();
        transport.push_failure(error);
        transport
    }

    /// Queues a failure for the next submission; later ones succeed again.
    pub fn push_failure(&self, error: TransportError) {
        self.state
            .lock()
            .expect("transport state")
            .failures
            .push_back(error);
    }

    /// Every payload received so far, acknowledged or not.
    pub fn submissions(&self) -> Vec<Payload> {
        self.state.lock().expect("transport state").submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().expect("transport state").submissions.len()
    }
}

#[async_trait]
impl ReportTransport for RecordingTransport {
    async fn submit(&self, payload: Payload) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("transport state");
        state.submissions.push(payload);
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        Ok(())
    }
}
