#![warn(missing_docs)]
//! # safeheal-core
//!
//! ## Purpose
//! Defines the pure media model shared across the `safeheal` workspace.
//!
//! ## Responsibilities
//! - Represent media kinds, opaque media handles, and the active subject.
//! - Classify declared MIME categories and upload file extensions.
//! - Model the upload and capture events delivered by one interaction cycle.
//!
//! ## Data flow
//! The media layer ingests raw bytes and hands the workflow an
//! [`UploadEvent`] or [`CaptureEvent`] carrying only a [`MediaHandle`].
//! The acquisition selector folds those events into one [`MediaSubject`].
//!
//! ## Ownership and lifetimes
//! Handles are owned opaque strings. The workflow never owns or borrows media
//! bytes; the media layer keeps them alive for as long as the handle is valid.
//!
//! ## Error model
//! Blank handles and unsupported MIME categories or extensions return
//! [`CoreError`] variants. Callers above this crate usually turn them into
//! user-facing notices instead of failing.
//!
//! ## Security and privacy notes
//! Wound media is health data. Nothing in this crate logs or stores media
//! bytes; handles are safe to log by id.
//!
//! ## Example
//! ```rust
//! use safeheal_core::{MediaKind, UploadEvent, classify_mime};
//!
//! assert_eq!(classify_mime("image/png").unwrap(), MediaKind::Image);
//! let upload = UploadEvent::new("upload-1", "video/mp4", Some("clip.mov")).unwrap();
//! assert_eq!(upload.kind().unwrap(), MediaKind::Video);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Image extensions accepted by the upload affordance.
pub const ACCEPTED_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Video extensions accepted by the upload affordance.
pub const ACCEPTED_VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mov", "avi"];

/// Broad category of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// Still image.
    Image,
    /// Video clip.
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Capture intent declared by the user.
///
/// Only decides which capture affordance is offered next. It never holds or
/// clears media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Capture a still image with the camera.
    #[default]
    Image,
    /// Capture video. Live video capture is not supported; uploads are.
    Video,
}

/// Where the active subject came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaOrigin {
    /// File uploaded from the device.
    Upload,
    /// Still image captured with the camera.
    Capture,
}

/// Opaque reference to media owned by the external media layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaHandle(String);

impl MediaHandle {
    /// Wraps a media-layer identifier.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidHandle`] when the identifier is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidHandle);
        }
        Ok(Self(id))
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single media item currently eligible for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSubject {
    /// Media kind.
    pub kind: MediaKind,
    /// Opaque source handle.
    pub handle: MediaHandle,
    /// Upload or capture.
    pub origin: MediaOrigin,
}

/// A freshly uploaded file as reported by the media layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEvent {
    /// Handle of the stored upload.
    pub handle: MediaHandle,
    /// Declared MIME type, for example `image/jpeg`.
    pub declared_mime: String,
    /// Original file name when the browser/device supplied one.
    pub file_name: Option<String>,
}

impl UploadEvent {
    /// Constructs an upload event.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidHandle`] for a blank handle id.
    pub fn new(
        handle: impl Into<String>,
        declared_mime: impl Into<String>,
        file_name: Option<&str>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            handle: MediaHandle::new(handle)?,
            declared_mime: declared_mime.into(),
            file_name: file_name.map(str::to_string),
        })
    }

    /// Resolves the media kind of this upload.
    ///
    /// The declared MIME category decides the kind. When a file name is
    /// present its extension must also be on the accepted list.
    ///
    /// # Errors
    /// Returns [`CoreError::UnsupportedMime`] or
    /// [`CoreError::UnsupportedExtension`].
    pub fn kind(&self) -> Result<MediaKind, CoreError> {
        let kind = classify_mime(&self.declared_mime)?;
        if let Some(name) = &self.file_name {
            kind_for_file_name(name)?;
        }
        Ok(kind)
    }

    /// Converts the upload into an active subject.
    ///
    /// # Errors
    /// Propagates [`UploadEvent::kind`] failures.
    pub fn into_subject(self) -> Result<MediaSubject, CoreError> {
        let kind = self.kind()?;
        Ok(MediaSubject {
            kind,
            handle: self.handle,
            origin: MediaOrigin::Upload,
        })
    }
}

/// A freshly captured still image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    /// Handle of the captured still.
    pub handle: MediaHandle,
}

impl CaptureEvent {
    /// Constructs a capture event.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidHandle`] for a blank handle id.
    pub fn new(handle: impl Into<String>) -> Result<Self, CoreError> {
        Ok(Self {
            handle: MediaHandle::new(handle)?,
        })
    }

    /// Converts the capture into an active image subject.
    pub fn into_subject(self) -> MediaSubject {
        MediaSubject {
            kind: MediaKind::Image,
            handle: self.handle,
            origin: MediaOrigin::Capture,
        }
    }
}

/// Events delivered during one interaction cycle.
///
/// At most one upload and at most one capture arrive per cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionCycle {
    /// Fresh upload, if any.
    pub upload: Option<UploadEvent>,
    /// Fresh captured still, if any.
    pub capture: Option<CaptureEvent>,
}

impl InteractionCycle {
    /// Cycle carrying only an upload.
    pub fn upload(event: UploadEvent) -> Self {
        Self {
            upload: Some(event),
            capture: None,
        }
    }

    /// Cycle carrying only a capture.
    pub fn capture(event: CaptureEvent) -> Self {
        Self {
            upload: None,
            capture: Some(event),
        }
    }

    /// Returns `true` when the cycle carries no media.
    pub fn is_empty(&self) -> bool {
        self.upload.is_none() && self.capture.is_none()
    }
}

/// Classifies a declared MIME type into a media kind.
///
/// Only the top-level category matters (`image/*`, `video/*`), compared
/// case-insensitively.
///
/// # Errors
/// Returns [`CoreError::UnsupportedMime`] for any other category.
pub fn classify_mime(declared_mime: &str) -> Result<MediaKind, CoreError> {
    let normalized = declared_mime.trim().to_ascii_lowercase();
    let category = normalized.split('/').next().unwrap_or_default();

    match category {
        "image" => Ok(MediaKind::Image),
        "video" => Ok(MediaKind::Video),
        _ => Err(CoreError::UnsupportedMime(declared_mime.to_string())),
    }
}

/// Maps a file name to a media kind by its extension.
///
/// # Errors
/// Returns [`CoreError::UnsupportedExtension`] when the extension is missing
/// or not on the accepted lists.
pub fn kind_for_file_name(file_name: &str) -> Result<MediaKind, CoreError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if ACCEPTED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(MediaKind::Image);
    }
    if ACCEPTED_VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(MediaKind::Video);
    }

    Err(CoreError::UnsupportedExtension(file_name.to_string()))
}

/// Error type for media model validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Media handle id is blank.
    #[error("media handle is empty")]
    InvalidHandle,
    /// Declared MIME category is neither image nor video.
    #[error("unsupported media type: {0}")]
    UnsupportedMime(String),
    /// File extension is not on the accepted lists.
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for media classification.

    use super::*;

    #[test]
    fn mime_category_ignores_subtype_and_case() {
        assert_eq!(classify_mime("IMAGE/JPEG").unwrap(), MediaKind::Image);
        assert_eq!(classify_mime(" video/quicktime ").unwrap(), MediaKind::Video);
        assert!(matches!(
            classify_mime("application/pdf"),
            Err(CoreError::UnsupportedMime(_))
        ));
        assert!(classify_mime("").is_err());
    }

    #[test]
    fn upload_rejects_unlisted_extension_even_with_valid_mime() {
        let upload = UploadEvent::new("upload-1", "image/gif", Some("wound.gif")).unwrap();
        assert!(matches!(
            upload.kind(),
            Err(CoreError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn capture_always_yields_image_subject() {
        let subject = CaptureEvent::new("capture-1").unwrap().into_subject();
        assert_eq!(subject.kind, MediaKind::Image);
        assert_eq!(subject.origin, MediaOrigin::Capture);
    }
}
