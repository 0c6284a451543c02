#![warn(missing_docs)]
//! # safeheal-acquisition
//!
//! ## Purpose
//! Decides which media item is the active subject for analysis.
//!
//! ## Responsibilities
//! - Apply the upload-over-capture precedence rule per interaction cycle.
//! - Retain the last captured still across cycles until an upload replaces it.
//! - Degrade live video capture and unsupported uploads to notices.
//! - Define the media-ingestion boundary and a deterministic synthetic backend.
//!
//! ## Data flow
//! Media layer -> [`MediaIngest`] -> [`InteractionCycle`] ->
//! [`AcquisitionSelector::resolve`] -> active [`MediaSubject`].
//!
//! ## Ownership and lifetimes
//! The selector owns subject values (handle + kind) only. Media bytes stay in
//! the ingestion backend.
//!
//! ## Error model
//! Resolution never fails: unsupported inputs come back as
//! [`UnsupportedInput`] inside [`AcquisitionOutcome`]. Ingestion backends
//! report [`AcquisitionError`].
//!
//! ## Security and privacy notes
//! Only handle ids are logged.

use std::collections::HashMap;
use std::sync::Mutex;

use safeheal_core::{
    CaptureEvent, CaptureMode, CoreError, InteractionCycle, MediaHandle, MediaKind, MediaSubject,
    UploadEvent,
};
use thiserror::Error;
use tracing::{debug, info};

/// Input the workflow cannot use. Reported to the user, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedInput {
    /// A capture was attempted while the capture mode is video.
    LiveVideoCapture,
    /// Upload has an unsupported MIME category or extension.
    MediaType(String),
}

/// Result of folding one interaction cycle into the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionOutcome {
    /// Active subject after the cycle.
    pub active: Option<MediaSubject>,
    /// `true` when the active subject differs from the one before the cycle.
    pub changed: bool,
    /// Unsupported input encountered during the cycle, if any.
    pub unsupported: Option<UnsupportedInput>,
}

/// Which capture affordance the presentation layer should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureAffordance {
    /// Camera closed; offer the "Capture" button next to the uploader.
    Offer,
    /// Camera still capture is open.
    Camera,
    /// Live video capture is unsupported; ask for a video upload instead.
    VideoUploadOnly,
}

/// Returns the capture affordance for a capture mode and toggle state.
pub fn capture_affordance(mode: CaptureMode, capture_requested: bool) -> CaptureAffordance {
    match (capture_requested, mode) {
        (false, _) => CaptureAffordance::Offer,
        (true, CaptureMode::Image) => CaptureAffordance::Camera,
        (true, CaptureMode::Video) => CaptureAffordance::VideoUploadOnly,
    }
}

/// Pure precedence rule.
///
/// An upload wins. Otherwise a fresh capture wins over the retained one.
pub fn resolve_active(
    upload: Option<MediaSubject>,
    fresh_capture: Option<MediaSubject>,
    retained_capture: Option<MediaSubject>,
) -> Option<MediaSubject> {
    upload.or(fresh_capture).or(retained_capture)
}

/// Stateful selector holding the media candidates between cycles.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionSelector {
    upload: Option<MediaSubject>,
    capture: Option<MediaSubject>,
}

impl AcquisitionSelector {
    /// Creates an empty selector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one interaction cycle and returns the resolved active subject.
    ///
    /// # Semantics
    /// - A valid upload replaces any retained capture, including a capture
    ///   delivered in the same cycle.
    /// - A capture while `mode` is [`CaptureMode::Video`] is refused with
    ///   [`UnsupportedInput::LiveVideoCapture`] and changes nothing.
    /// - An unsupported upload is refused and changes nothing.
    /// - Once uploaded, a file stays active until [`Self::clear`]; later
    ///   captures are retained but do not displace it.
    pub fn resolve(&mut self, mode: CaptureMode, cycle: InteractionCycle) -> AcquisitionOutcome {
        let before = self.active().cloned();
        let mut unsupported = None;

        let fresh_capture = match cycle.capture {
            Some(_) if mode == CaptureMode::Video => {
                debug!("live video capture refused");
                unsupported = Some(UnsupportedInput::LiveVideoCapture);
                None
            }
            Some(event) => Some(event.into_subject()),
            None => None,
        };

        let fresh_upload = match cycle.upload.map(UploadEvent::into_subject) {
            Some(Ok(subject)) => Some(subject),
            Some(Err(error)) => {
                debug!(%error, "upload refused");
                unsupported = Some(UnsupportedInput::MediaType(error.to_string()));
                None
            }
            None => None,
        };

        if let Some(upload) = fresh_upload {
            self.upload = Some(upload);
            self.capture = None;
        } else if fresh_capture.is_some() {
            self.capture = fresh_capture;
        }

        let active = resolve_active(self.upload.clone(), None, self.capture.clone());
        let changed = active != before;
        if changed && let Some(subject) = &active {
            info!(
                handle = %subject.handle,
                kind = %subject.kind,
                origin = ?subject.origin,
                "active subject resolved"
            );
        }

        AcquisitionOutcome {
            active,
            changed,
            unsupported,
        }
    }

    /// Returns the active subject, if any.
    pub fn active(&self) -> Option<&MediaSubject> {
        self.upload.as_ref().or(self.capture.as_ref())
    }

    /// Returns the retained captured still, if any.
    pub fn retained_capture(&self) -> Option<&MediaSubject> {
        self.capture.as_ref()
    }

    /// Drops every candidate. Used on full session teardown.
    pub fn clear(&mut self) {
        self.upload = None;
        self.capture = None;
    }
}

/// Boundary to the external media layer.
///
/// Implementations store bytes however they like and hand back events that
/// carry only opaque handles.
pub trait MediaIngest: Send + Sync {
    /// Stores an uploaded file.
    ///
    /// # Errors
    /// Returns [`AcquisitionError`] when the backend cannot store the blob.
    fn ingest_upload(
        &self,
        file_name: Option<&str>,
        declared_mime: &str,
        bytes: &[u8],
    ) -> Result<UploadEvent, AcquisitionError>;

    /// Stores a captured still image.
    ///
    /// # Errors
    /// Returns [`AcquisitionError`] when the backend cannot store the blob.
    fn ingest_capture(&self, bytes: &[u8]) -> Result<CaptureEvent, AcquisitionError>;
}

/// Deterministic in-memory ingestion backend for tests and demos.
///
/// Handles are `upload-N` / `capture-N` with one shared sequence. Only byte
/// lengths are kept.
#[derive(Debug, Default)]
pub struct SyntheticMediaIngest {
    state: Mutex<SyntheticState>,
}

#[derive(Debug, Default)]
struct SyntheticState {
    sequence: u64,
    stored: HashMap<MediaHandle, (Option<MediaKind>, usize)>,
}

impl SyntheticMediaIngest {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns kind and stored byte length for a handle issued by this backend.
    ///
    /// The kind is `None` for uploads whose declared type is neither image
    /// nor video.
    pub fn stored(&self, handle: &MediaHandle) -> Option<(Option<MediaKind>, usize)> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.stored.get(handle).copied())
    }

    fn store(
        &self,
        prefix: &str,
        kind: Option<MediaKind>,
        bytes: &[u8],
    ) -> Result<MediaHandle, AcquisitionError> {
        if bytes.is_empty() {
            return Err(AcquisitionError::EmptyMedia);
        }

        let mut state = self
            .state
            .lock()
            .map_err(|_| AcquisitionError::Backend("synthetic ingest lock poisoned".to_string()))?;
        state.sequence += 1;

        let handle = MediaHandle::new(format!("{prefix}-{}", state.sequence))?;
        state.stored.insert(handle.clone(), (kind, bytes.len()));
        Ok(handle)
    }
}

impl MediaIngest for SyntheticMediaIngest {
    fn ingest_upload(
        &self,
        file_name: Option<&str>,
        declared_mime: &str,
        bytes: &[u8],
    ) -> Result<UploadEvent, AcquisitionError> {
        // Unsupported types are stored too; the selector refuses them with a notice.
        let kind = safeheal_core::classify_mime(declared_mime).ok();
        let handle = self.store("upload", kind, bytes)?;
        Ok(UploadEvent {
            handle,
            declared_mime: declared_mime.to_string(),
            file_name: file_name.map(str::to_string),
        })
    }

    fn ingest_capture(&self, bytes: &[u8]) -> Result<CaptureEvent, AcquisitionError> {
        let handle = self.store("capture", Some(MediaKind::Image), bytes)?;
        Ok(CaptureEvent { handle })
    }
}

/// Acquisition layer error type.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Media model validation failed.
    #[error("media error: {0}")]
    Core(#[from] CoreError),
    /// Media blob is empty.
    #[error("media blob is empty")]
    EmptyMedia,
    /// Backend runtime failure.
    #[error("ingest backend failure: {0}")]
    Backend(String),
}
