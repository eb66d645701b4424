// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The live capture pipeline belongs to the platform. The studio drives it
//! through the traits in this module and never touches hardware directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   UI Layer (intents)│
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ Studio + SessionQueue│  ← serial mutation of the capture graph
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← discovery, running, capture, recording
//! │ CaptureDevice Trait │  ← formats, locking, zoom, focus
//! └──────────┬──────────┘
//!            │
//!            ▼
//!     ┌─────────────┐
//!     │VirtualCamera│  ← in-process implementation
//!     └─────────────┘
//! ```
//!
//! Completion of photo and movie captures flows back through the
//! [`PhotoCaptureDelegate`] and [`RecordingDelegate`] callbacks, invoked on
//! backend-owned threads.

pub mod types;
pub mod virtual_camera;

pub use types::*;
pub use virtual_camera::{VirtualCamera, VirtualCameraOptions, VirtualDeviceState};

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

/// Camera backend trait
///
/// Every method may block; the studio only calls them from its session queue.
pub trait CameraBackend: Send + Sync {
    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Locate the system preferred camera and open it
    fn find_camera(&self) -> Option<Box<dyn CaptureDevice>>;

    /// Locate the default microphone
    fn find_microphone(&self) -> Option<AudioDevice>;

    /// Codecs the photo output can produce
    fn available_photo_codecs(&self) -> Vec<PhotoCodec>;

    /// Start the flow of data through the session (blocking)
    fn start_running(&self);

    /// Stop the flow of data through the session (blocking)
    fn stop_running(&self);

    fn is_running(&self) -> bool;

    /// Issue a photo capture
    ///
    /// The delegate receives `will_capture_photo`, `did_finish_processing_photo`
    /// and finally `did_finish_capture`, in that order, on a backend thread.
    /// `did_finish_capture` always fires once the request was accepted.
    fn capture_photo(
        &self,
        request: &CaptureRequest,
        rotation_angle: f64,
        delegate: Arc<dyn PhotoCaptureDelegate>,
    ) -> BackendResult<()>;

    /// Start writing a movie to `path`
    ///
    /// Exactly one `did_finish_recording` call follows once recording stops.
    fn start_recording(
        &self,
        path: &Path,
        rotation_angle: f64,
        stabilized: bool,
        delegate: Arc<dyn RecordingDelegate>,
    ) -> BackendResult<()>;

    /// Stop the active recording; finalization is reported to the delegate
    fn stop_recording(&self) -> BackendResult<()>;
}

/// An opened video device
pub trait CaptureDevice: Send {
    fn unique_id(&self) -> &str;

    fn name(&self) -> &str;

    /// Physical mounting of the sensor relative to the device
    fn sensor_rotation(&self) -> SensorRotation;

    /// All formats the device exposes, in device order
    fn formats(&self) -> Vec<DeviceFormat>;

    fn active_format(&self) -> DeviceFormat;

    /// Acquire exclusive configuration access; pair with `unlock_for_configuration`
    fn lock_for_configuration(&mut self) -> BackendResult<()>;

    fn unlock_for_configuration(&mut self);

    fn set_active_format(&mut self, format: &DeviceFormat) -> BackendResult<()>;

    /// Set min/max frame duration; the device must be locked
    fn set_frame_duration_range(&mut self, min: FrameDuration, max: FrameDuration);

    /// Supported zoom range, inclusive
    fn zoom_range(&self) -> (f64, f64);

    /// Set video zoom; values outside `zoom_range` are clamped by the device
    fn set_video_zoom_factor(&mut self, factor: f64);

    fn video_zoom_factor(&self) -> f64;

    fn is_focus_point_of_interest_supported(&self) -> bool;

    fn is_exposure_point_of_interest_supported(&self) -> bool;

    fn is_focus_mode_supported(&self, mode: FocusMode) -> bool;

    fn is_exposure_mode_supported(&self, mode: ExposureMode) -> bool;

    fn set_focus(&mut self, mode: FocusMode, point: Option<DevicePoint>);

    fn set_exposure(&mut self, mode: ExposureMode, point: Option<DevicePoint>);

    fn set_subject_area_change_monitoring(&mut self, enabled: bool);
}

/// Scoped `lock_for_configuration`: unlocks when dropped, on every path
pub struct ConfigurationLock<'a> {
    device: &'a mut dyn CaptureDevice,
}

impl<'a> ConfigurationLock<'a> {
    /// Lock the device; on failure nothing is held and nothing needs unlocking
    pub fn acquire(device: &'a mut dyn CaptureDevice) -> BackendResult<Self> {
        device.lock_for_configuration()?;
        Ok(Self { device })
    }
}

impl<'a> Deref for ConfigurationLock<'a> {
    type Target = dyn CaptureDevice + 'a;

    fn deref(&self) -> &Self::Target {
        self.device
    }
}

impl<'a> DerefMut for ConfigurationLock<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.device
    }
}

impl Drop for ConfigurationLock<'_> {
    fn drop(&mut self) {
        self.device.unlock_for_configuration();
    }
}

/// Callbacks for a single photo request
pub trait PhotoCaptureDelegate: Send + Sync {
    /// The shutter is about to fire
    fn will_capture_photo(&self, resolved: &ResolvedPhotoSettings);

    /// Processed photo bytes, or the processing error
    fn did_finish_processing_photo(&self, photo: BackendResult<Vec<u8>>);

    /// A deferred proxy was delivered in place of the final photo
    fn did_finish_capturing_deferred_proxy(&self, proxy: BackendResult<Vec<u8>>);

    /// Terminal callback for the request
    fn did_finish_capture(&self, resolved: &ResolvedPhotoSettings, error: Option<BackendError>);
}

/// Terminal callback for a movie recording
pub trait RecordingDelegate: Send + Sync {
    fn did_finish_recording(&self, output: &Path, error: Option<RecordingFailure>);
}

/// Opaque rendering target for the live session
pub trait PreviewSurface: Send + Sync {
    /// Attach the surface to a capture session
    fn attach(&self, session: SessionId);

    /// Rotate the preview connection to keep it level
    fn set_video_rotation_angle(&self, angle: f64);

    /// Shutter flash: fade out, then back in
    fn flash(&self);
}

/// Get a backend instance for the given type
pub fn get_backend(backend_type: CameraBackendType) -> Arc<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::Virtual => Arc::new(VirtualCamera::new(VirtualCameraOptions::default())),
    }
}
