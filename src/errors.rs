// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture studio and its collaborators
//!
//! Hardware configuration failures are values, not panics: every intent the
//! studio accepts resolves to a `StudioResult` that callers may inspect or
//! drop, and the failure is logged where it happens.

use crate::backends::permissions::MediaType;
use crate::studio::GraphMode;
use std::fmt;
use std::path::PathBuf;

/// Result type alias using StudioError
pub type StudioResult<T> = Result<T, StudioError>;

/// Top-level error for studio intents
#[derive(Debug, Clone, PartialEq)]
pub enum StudioError {
    /// Mode or configuration transition failed part way
    Transition(TransitionError),
    /// Device lookup, format selection or locking failed
    Device(DeviceError),
    /// Photo capture could not be issued or completed
    Capture(CaptureError),
    /// Movie recording could not be started or completed
    Recording(RecordingError),
    /// Video or audio access was refused
    Permission(PermissionError),
    /// The session queue shut down before the intent ran
    QueueClosed,
}

/// A configuration transaction failed at one of its steps.
///
/// The transaction was still committed with whatever succeeded before `step`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionError {
    pub from: GraphMode,
    pub to: GraphMode,
    pub step: TransitionStep,
    pub reason: String,
}

/// Individual steps of a mode transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStep {
    FindCamera,
    AddVideoInput,
    AddPhotoOutput,
    ConfigurePhotoOutput,
    ConfigureDevice,
    FindMicrophone,
    AddAudioInput,
    AddAudioDataOutput,
    AddMovieOutput,
    SetPreset,
    RecordingInProgress,
}

/// Device-level failures (no-op conditions, prior state preserved)
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// No video device input is attached
    NoDevice,
    /// No format matches the requested resolution and frame rate
    FormatUnavailable { resolution: String, frame_rate: u32 },
    /// lock_for_configuration failed
    LockFailed(String),
    /// The locked device refused to activate a format
    FormatRejected(String),
    /// The operation requires a different capture mode
    WrongMode { required: GraphMode, current: GraphMode },
    /// The device is busy recording
    Busy,
}

/// Photo capture errors
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// No capture-request template exists (no device input configured)
    NoPhotoSettings,
    /// No rotation coordinator is bound to the video input
    NoRotationCoordinator,
    /// The backend reported a capture failure
    Failed(String),
    /// Persisting the photo failed
    SaveFailed(String),
}

/// Movie recording errors
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingError {
    /// Not in movie mode or no movie output attached
    NoMovieOutput,
    /// The backend could not start writing
    StartFailed(String),
    /// The backend finished with an error
    Finished {
        message: String,
        /// Some errors still leave a usable file behind
        recorded_successfully: bool,
    },
    /// The finished file could not be moved into the library
    MoveFailed { path: PathBuf, message: String },
}

/// Authorization failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionError {
    /// Capture access for the given media type was refused
    Denied(MediaType),
    /// Media library access was refused
    LibraryDenied,
}

/// Storage/filesystem errors for the review collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    Io(String),
    Serialization(String),
    NotFound(String),
}

impl fmt::Display for StudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudioError::Transition(e) => write!(f, "Transition error: {}", e),
            StudioError::Device(e) => write!(f, "Device error: {}", e),
            StudioError::Capture(e) => write!(f, "Capture error: {}", e),
            StudioError::Recording(e) => write!(f, "Recording error: {}", e),
            StudioError::Permission(e) => write!(f, "Permission error: {}", e),
            StudioError::QueueClosed => write!(f, "Session queue closed"),
        }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} failed at {:?}: {}",
            self.from, self.to, self.step, self.reason
        )
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NoDevice => write!(f, "No video device input attached"),
            DeviceError::FormatUnavailable {
                resolution,
                frame_rate,
            } => write!(f, "No format for {} at {}fps", resolution, frame_rate),
            DeviceError::LockFailed(msg) => write!(f, "Cannot lock device: {}", msg),
            DeviceError::FormatRejected(msg) => write!(f, "Device rejected format: {}", msg),
            DeviceError::WrongMode { required, current } => {
                write!(f, "Requires {} mode, current mode is {}", required, current)
            }
            DeviceError::Busy => write!(f, "Device is recording"),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoPhotoSettings => write!(f, "No photo settings to capture"),
            CaptureError::NoRotationCoordinator => {
                write!(f, "Video device rotation coordinator is empty")
            }
            CaptureError::Failed(msg) => write!(f, "Capture failed: {}", msg),
            CaptureError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::NoMovieOutput => write!(f, "No movie file output attached"),
            RecordingError::StartFailed(msg) => write!(f, "Failed to start recording: {}", msg),
            RecordingError::Finished {
                message,
                recorded_successfully,
            } => write!(
                f,
                "Recording finished with error (usable file: {}): {}",
                recorded_successfully, message
            ),
            RecordingError::MoveFailed { path, message } => {
                write!(f, "Failed to move {}: {}", path.display(), message)
            }
        }
    }
}

impl fmt::Display for PermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionError::Denied(media) => write!(f, "{} access denied", media),
            PermissionError::LibraryDenied => write!(f, "Media library access denied"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "I/O error: {}", msg),
            StorageError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::NotFound(id) => write!(f, "Not found: {}", id),
        }
    }
}

impl std::error::Error for StudioError {}
impl std::error::Error for TransitionError {}
impl std::error::Error for DeviceError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for RecordingError {}
impl std::error::Error for PermissionError {}
impl std::error::Error for StorageError {}

impl From<TransitionError> for StudioError {
    fn from(err: TransitionError) -> Self {
        StudioError::Transition(err)
    }
}

impl From<DeviceError> for StudioError {
    fn from(err: DeviceError) -> Self {
        StudioError::Device(err)
    }
}

impl From<CaptureError> for StudioError {
    fn from(err: CaptureError) -> Self {
        StudioError::Capture(err)
    }
}

impl From<RecordingError> for StudioError {
    fn from(err: RecordingError) -> Self {
        StudioError::Recording(err)
    }
}

impl From<PermissionError> for StudioError {
    fn from(err: PermissionError) -> Self {
        StudioError::Permission(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_display_names_step() {
        let err = StudioError::from(TransitionError {
            from: GraphMode::Photo,
            to: GraphMode::Movie,
            step: TransitionStep::FindMicrophone,
            reason: "no microphone".to_string(),
        });
        let text = err.to_string();
        assert!(text.contains("FindMicrophone"));
        assert!(text.contains("photo -> movie"));
    }

    #[test]
    fn test_format_rejection_message() {
        let err = DeviceError::FormatRejected("1920x1080".to_string());
        assert_eq!(err.to_string(), "Device rejected format: 1920x1080");
        assert_eq!(StudioError::from(err.clone()), StudioError::Device(err));
    }

    #[test]
    fn test_no_photo_settings_message() {
        assert_eq!(
            CaptureError::NoPhotoSettings.to_string(),
            "No photo settings to capture"
        );
    }
}
