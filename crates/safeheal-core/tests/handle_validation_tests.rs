//! Integration tests for opaque media handles.

use safeheal_core::{CaptureEvent, CoreError, MediaHandle, UploadEvent};

#[test]
fn handle_validation_tests_rejects_blank_ids() {
    assert!(matches!(MediaHandle::new("  "), Err(CoreError::InvalidHandle)));
    assert!(CaptureEvent::new("").is_err());
    assert!(UploadEvent::new("", "image/png", None).is_err());
}

#[test]
fn handle_validation_tests_preserves_id_verbatim() {
    let handle = MediaHandle::new("capture-0042").unwrap();
    assert_eq!(handle.as_str(), "capture-0042");
    assert_eq!(handle.to_string(), "capture-0042");
}
