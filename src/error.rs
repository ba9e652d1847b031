//! Error types shared by the capture, editing and export paths.
//!
//! None of these are fatal. The UI decides how each family is shown:
//! camera errors as a persistent inline message, segmentation errors as a
//! dismissable alert, editor misuse as a short guidance line.

use thiserror::Error;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Camera device failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera unavailable: {0}")]
    Unavailable(String),

    #[error("Could not read a frame from the camera: {0}")]
    Frame(String),
}

/// Background segmentation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SegmentationError {
    #[error("The segmentation model is still loading, try again in a moment")]
    NotReady,

    #[error("Background removal is already running")]
    Busy,

    #[error("Failed to load segmentation model: {0}")]
    Model(String),

    #[error("Segmentation failed: {0}")]
    Inference(String),

    #[error("Nothing to keep: every region was classified as background")]
    NothingToKeep,
}

/// Object-scoped actions invoked without a suitable selection.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("Select a photo or sticker first")]
    NoImageSelected,

    #[error("Select something first")]
    NothingSelected,

    #[error("Photos in the frame can be replaced but not deleted")]
    PhotoNotDeletable,

    #[error("That object no longer exists")]
    UnknownObject,
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid image data URL: {0}")]
    DataUrl(String),

    #[error("Font error: {0}")]
    Font(String),
}
