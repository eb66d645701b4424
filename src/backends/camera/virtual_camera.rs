// SPDX-License-Identifier: GPL-3.0-only

//! In-process camera backend
//!
//! Simulates a camera with a fixed format list, a microphone, a photo output
//! that synthesizes JPEG frames, and a movie writer thread. Callbacks arrive
//! on backend threads exactly like a hardware pipeline would deliver them.
//!
//! Failure injection knobs (`fail_next_photo`, `set_lock_fails`, ...) let
//! callers exercise the studio's error paths.

use super::types::*;
use super::{CameraBackend, CaptureDevice, PhotoCaptureDelegate, RecordingDelegate};
use crate::constants::virtual_camera as constants;
use crate::utils::lock;
use image::{Rgb, RgbImage};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest edge of synthesized photo frames
const SYNTHETIC_FRAME_MAX_EDGE: u32 = 320;
/// Magic bytes at the start of a virtual movie file
const MOVIE_HEADER: &[u8] = b"SHARI-MOV\0";

/// Construction options for [`VirtualCamera`]
#[derive(Debug, Clone)]
pub struct VirtualCameraOptions {
    pub name: String,
    pub formats: Vec<DeviceFormat>,
    /// Index into `formats` of the format active when the device opens
    pub active_format_index: usize,
    pub sensor_rotation: SensorRotation,
    pub has_camera: bool,
    pub has_microphone: bool,
    pub photo_codecs: Vec<PhotoCodec>,
    pub zoom_range: (f64, f64),
    pub point_of_interest_supported: bool,
    /// Delay between accepting a photo request and its first callback
    pub capture_latency: Duration,
    /// Interval between frames written while recording
    pub frame_interval: Duration,
}

impl Default for VirtualCameraOptions {
    fn default() -> Self {
        let mut photo_format = DeviceFormat::new(4032, 3024, 1.0, 30.0);
        photo_format.supported_max_photo_dimensions =
            vec![Dimensions::new(2016, 1512), Dimensions::new(4032, 3024)];
        photo_format.video_stabilization_supported = false;

        Self {
            name: "Virtual Back Camera".to_string(),
            formats: vec![
                DeviceFormat::new(1920, 1080, 1.0, 30.0),
                DeviceFormat::new(1920, 1080, 1.0, 60.0),
                DeviceFormat::new(3840, 2160, 1.0, 30.0),
                DeviceFormat::new(3840, 2160, 1.0, 60.0),
                photo_format,
            ],
            active_format_index: 4,
            sensor_rotation: SensorRotation::Rotate90,
            has_camera: true,
            has_microphone: true,
            photo_codecs: vec![PhotoCodec::Hevc, PhotoCodec::Jpeg],
            zoom_range: (1.0, 10.0),
            point_of_interest_supported: true,
            capture_latency: constants::CAPTURE_LATENCY,
            frame_interval: constants::FRAME_INTERVAL,
        }
    }
}

/// Observable device state, shared between the backend and opened devices
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDeviceState {
    pub active_format: DeviceFormat,
    pub locked: bool,
    pub lock_count: u32,
    pub unlock_count: u32,
    pub lock_fails: bool,
    /// Locking succeeds but every format change is refused
    pub format_rejects: bool,
    pub frame_duration_range: Option<(FrameDuration, FrameDuration)>,
    pub zoom_factor: f64,
    pub focus_mode: FocusMode,
    pub focus_point: Option<DevicePoint>,
    pub exposure_mode: ExposureMode,
    pub exposure_point: Option<DevicePoint>,
    pub subject_area_change_monitoring: bool,
}

/// A photo request accepted by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPhoto {
    pub request: CaptureRequest,
    pub rotation_angle: f64,
}

/// A recording started on the backend
#[derive(Debug, Clone, PartialEq)]
pub struct StartedRecording {
    pub path: PathBuf,
    pub rotation_angle: f64,
    pub stabilized: bool,
}

#[derive(Debug, Default)]
struct Faults {
    next_photo_error: Option<String>,
    next_photo_empty: bool,
    deferred_photos: bool,
    next_recording_error: Option<RecordingFailure>,
    next_recording_frame_limit: Option<u64>,
    start_recording_fails: bool,
}

struct ActiveRecording {
    stop_sender: mpsc::Sender<Option<RecordingFailure>>,
    /// None once the handle moved to the pending callbacks
    writer: Option<JoinHandle<()>>,
    /// Set by the writer thread right before it reports completion
    finished: Arc<AtomicBool>,
}

impl ActiveRecording {
    fn is_active(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }
}

/// Simulated camera backend
pub struct VirtualCamera {
    options: VirtualCameraOptions,
    device: Arc<Mutex<VirtualDeviceState>>,
    running: AtomicBool,
    start_count: AtomicU32,
    stop_count: AtomicU32,
    faults: Mutex<Faults>,
    recording: Mutex<Option<ActiveRecording>>,
    /// Callback threads not yet joined
    pending: Mutex<Vec<JoinHandle<()>>>,
    captured: Mutex<Vec<CapturedPhoto>>,
    recordings: Mutex<Vec<StartedRecording>>,
}

impl VirtualCamera {
    pub fn new(options: VirtualCameraOptions) -> Self {
        let active_format = options
            .formats
            .get(options.active_format_index)
            .or_else(|| options.formats.first())
            .cloned()
            .unwrap_or_else(|| DeviceFormat::new(1920, 1080, 1.0, 30.0));

        info!(name = %options.name, formats = options.formats.len(), "Creating virtual camera");

        let device = VirtualDeviceState {
            active_format,
            locked: false,
            lock_count: 0,
            unlock_count: 0,
            lock_fails: false,
            format_rejects: false,
            frame_duration_range: None,
            zoom_factor: 1.0,
            focus_mode: FocusMode::ContinuousAutoFocus,
            focus_point: None,
            exposure_mode: ExposureMode::ContinuousAutoExposure,
            exposure_point: None,
            subject_area_change_monitoring: false,
        };

        Self {
            options,
            device: Arc::new(Mutex::new(device)),
            running: AtomicBool::new(false),
            start_count: AtomicU32::new(0),
            stop_count: AtomicU32::new(0),
            faults: Mutex::new(Faults::default()),
            recording: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
            captured: Mutex::new(Vec::new()),
            recordings: Mutex::new(Vec::new()),
        }
    }

    pub fn options(&self) -> &VirtualCameraOptions {
        &self.options
    }

    /// Snapshot of the device state
    pub fn device_state(&self) -> VirtualDeviceState {
        lock(&self.device).clone()
    }

    /// Make every following `lock_for_configuration` fail (or succeed again)
    pub fn set_lock_fails(&self, fails: bool) {
        lock(&self.device).lock_fails = fails;
    }

    /// Make every following `set_active_format` fail while locking still works
    pub fn set_format_rejects(&self, rejects: bool) {
        lock(&self.device).format_rejects = rejects;
    }

    /// The next photo reports `message` as its processing and capture error
    pub fn fail_next_photo(&self, message: &str) {
        lock(&self.faults).next_photo_error = Some(message.to_string());
    }

    /// The next photo finishes without any data
    pub fn empty_next_photo(&self) {
        lock(&self.faults).next_photo_empty = true;
    }

    /// Deliver deferred proxies instead of final photos
    pub fn set_deferred_photos(&self, deferred: bool) {
        lock(&self.faults).deferred_photos = deferred;
    }

    /// The next recording finishes with `failure`
    pub fn fail_next_recording(&self, failure: RecordingFailure) {
        lock(&self.faults).next_recording_error = Some(failure);
    }

    /// The next recording ends by itself after `frames` frames, the way a
    /// writer stops at its maximum duration
    pub fn limit_next_recording(&self, frames: u64) {
        lock(&self.faults).next_recording_frame_limit = Some(frames);
    }

    pub fn set_start_recording_fails(&self, fails: bool) {
        lock(&self.faults).start_recording_fails = fails;
    }

    pub fn captured_photos(&self) -> Vec<CapturedPhoto> {
        lock(&self.captured).clone()
    }

    pub fn started_recordings(&self) -> Vec<StartedRecording> {
        lock(&self.recordings).clone()
    }

    pub fn start_count(&self) -> u32 {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.recording)
            .as_ref()
            .is_some_and(ActiveRecording::is_active)
    }

    /// Join every callback thread spawned so far, including ones spawned
    /// while waiting
    pub fn wait_idle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.pending));
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if handle.join().is_err() {
                    warn!("Virtual camera callback thread panicked");
                }
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        lock(&self.pending).push(handle);
    }

    /// Synthesize a small JPEG frame with the aspect ratio of `dimensions`
    fn synthesize_jpeg(dimensions: Dimensions, seed: i64) -> BackendResult<Vec<u8>> {
        let (width, height) = scaled_to_edge(dimensions, SYNTHETIC_FRAME_MAX_EDGE);
        let shade = (seed.rem_euclid(256)) as u8;
        let frame = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                shade,
            ])
        });

        let mut buffer = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, 85);
        encoder
            .encode_image(&frame)
            .map_err(|e| BackendError::Other(format!("JPEG encoding failed: {}", e)))?;
        Ok(buffer)
    }
}

/// Scale `dimensions` so the longest edge is at most `max_edge`
fn scaled_to_edge(dimensions: Dimensions, max_edge: u32) -> (u32, u32) {
    let longest = dimensions.width.max(dimensions.height).max(1);
    if longest <= max_edge {
        return (dimensions.width.max(1), dimensions.height.max(1));
    }
    let width = (dimensions.width as u64 * max_edge as u64 / longest as u64).max(1) as u32;
    let height = (dimensions.height as u64 * max_edge as u64 / longest as u64).max(1) as u32;
    (width, height)
}

impl CameraBackend for VirtualCamera {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }

    fn find_camera(&self) -> Option<Box<dyn CaptureDevice>> {
        if !self.options.has_camera {
            debug!("Virtual camera configured without a video device");
            return None;
        }
        Some(Box::new(VirtualDevice {
            id: format!("virtual:{}", self.options.name.to_lowercase().replace(' ', "-")),
            name: self.options.name.clone(),
            rotation: self.options.sensor_rotation,
            formats: self.options.formats.clone(),
            zoom_range: self.options.zoom_range,
            point_of_interest_supported: self.options.point_of_interest_supported,
            state: Arc::clone(&self.device),
        }))
    }

    fn find_microphone(&self) -> Option<AudioDevice> {
        self.options.has_microphone.then(|| AudioDevice {
            name: "Virtual Microphone".to_string(),
            id: "virtual:microphone".to_string(),
            is_default: true,
        })
    }

    fn available_photo_codecs(&self) -> Vec<PhotoCodec> {
        self.options.photo_codecs.clone()
    }

    fn start_running(&self) {
        self.start_count.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        info!("Virtual session running");
    }

    fn stop_running(&self) {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        info!("Virtual session stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn capture_photo(
        &self,
        request: &CaptureRequest,
        rotation_angle: f64,
        delegate: Arc<dyn PhotoCaptureDelegate>,
    ) -> BackendResult<()> {
        lock(&self.captured).push(CapturedPhoto {
            request: request.clone(),
            rotation_angle,
        });

        let (error, empty, deferred) = {
            let mut faults = lock(&self.faults);
            (
                faults.next_photo_error.take(),
                std::mem::take(&mut faults.next_photo_empty),
                faults.deferred_photos,
            )
        };

        let request = request.clone();
        let latency = self.options.capture_latency;

        let handle = thread::spawn(move || {
            let resolved = ResolvedPhotoSettings {
                photo_dimensions: request.max_dimensions,
                deferred_proxy_dimensions: if deferred {
                    request.max_dimensions
                } else {
                    Dimensions::default()
                },
            };

            thread::sleep(latency);
            delegate.will_capture_photo(&resolved);

            if let Some(message) = error {
                delegate.did_finish_processing_photo(Err(BackendError::Other(message.clone())));
                delegate.did_finish_capture(&resolved, Some(BackendError::Other(message)));
                return;
            }

            if !empty {
                let photo = Self::synthesize_jpeg(request.max_dimensions, request.id.0);
                if deferred {
                    delegate.did_finish_capturing_deferred_proxy(photo);
                } else {
                    delegate.did_finish_processing_photo(photo);
                }
            }

            delegate.did_finish_capture(&resolved, None);
        });
        self.track(handle);

        Ok(())
    }

    fn start_recording(
        &self,
        path: &Path,
        rotation_angle: f64,
        stabilized: bool,
        delegate: Arc<dyn RecordingDelegate>,
    ) -> BackendResult<()> {
        let mut recording = lock(&self.recording);
        if let Some(previous) = recording.take() {
            if previous.is_active() {
                *recording = Some(previous);
                return Err(BackendError::RecordingInProgress);
            }
            if let Some(writer) = previous.writer {
                self.track(writer);
            }
        }
        if lock(&self.faults).start_recording_fails {
            return Err(BackendError::Other("movie writer unavailable".to_string()));
        }
        let frame_limit = lock(&self.faults).next_recording_frame_limit.take();

        let mut file = File::create(path)?;
        file.write_all(MOVIE_HEADER)?;

        lock(&self.recordings).push(StartedRecording {
            path: path.to_path_buf(),
            rotation_angle,
            stabilized,
        });

        let (stop_sender, stop_receiver) = mpsc::channel::<Option<RecordingFailure>>();
        let interval = self.options.frame_interval;
        let dimensions = self.device_state().active_format.dimensions;
        let output = path.to_path_buf();
        let finished = Arc::new(AtomicBool::new(false));
        let writer_finished = Arc::clone(&finished);

        info!(path = %output.display(), ?frame_limit, "Virtual recording started");

        let writer = thread::spawn(move || {
            let mut frame_index: u64 = 0;
            let mut injected = None;
            let mut write_error = None;
            let mut limit_reached = false;
            loop {
                match stop_receiver.recv_timeout(interval) {
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        let mut frame = Vec::with_capacity(16);
                        frame.extend_from_slice(&frame_index.to_le_bytes());
                        frame.extend_from_slice(&dimensions.width.to_le_bytes());
                        frame.extend_from_slice(&dimensions.height.to_le_bytes());
                        if let Err(e) = file.write_all(&frame) {
                            write_error = Some(e.to_string());
                            break;
                        }
                        frame_index += 1;
                        if frame_limit.is_some_and(|limit| frame_index >= limit) {
                            limit_reached = true;
                            break;
                        }
                    }
                    Ok(failure) => {
                        injected = failure;
                        break;
                    }
                    // The backend went away without stopping
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            if let Err(e) = file.flush() {
                write_error.get_or_insert(e.to_string());
            }
            drop(file);
            debug!(frames = frame_index, "Virtual movie writer finished");

            let failure = write_error
                .map(|message| RecordingFailure {
                    message,
                    recorded_successfully: false,
                })
                .or(injected)
                .or_else(|| {
                    limit_reached.then(|| RecordingFailure {
                        message: "Maximum recording duration reached".to_string(),
                        recorded_successfully: true,
                    })
                });
            writer_finished.store(true, Ordering::SeqCst);
            delegate.did_finish_recording(&output, failure);
        });

        // A writer that ends by itself is a callback thread like any other
        let writer = if frame_limit.is_some() {
            self.track(writer);
            None
        } else {
            Some(writer)
        };
        *recording = Some(ActiveRecording {
            stop_sender,
            writer,
            finished,
        });

        Ok(())
    }

    fn stop_recording(&self) -> BackendResult<()> {
        let active = lock(&self.recording)
            .take()
            .ok_or(BackendError::NoRecordingInProgress)?;
        if !active.is_active() {
            if let Some(writer) = active.writer {
                self.track(writer);
            }
            return Err(BackendError::NoRecordingInProgress);
        }
        let failure = lock(&self.faults).next_recording_error.take();

        info!(injected_failure = failure.is_some(), "Virtual recording stopping");

        // A writer that already exited delivered its own failure
        let _ = active.stop_sender.send(failure);
        if let Some(writer) = active.writer {
            self.track(writer);
        }
        Ok(())
    }
}

/// Video device opened from a [`VirtualCamera`]
struct VirtualDevice {
    id: String,
    name: String,
    rotation: SensorRotation,
    formats: Vec<DeviceFormat>,
    zoom_range: (f64, f64),
    point_of_interest_supported: bool,
    state: Arc<Mutex<VirtualDeviceState>>,
}

impl CaptureDevice for VirtualDevice {
    fn unique_id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sensor_rotation(&self) -> SensorRotation {
        self.rotation
    }

    fn formats(&self) -> Vec<DeviceFormat> {
        self.formats.clone()
    }

    fn active_format(&self) -> DeviceFormat {
        lock(&self.state).active_format.clone()
    }

    fn lock_for_configuration(&mut self) -> BackendResult<()> {
        let mut state = lock(&self.state);
        if state.lock_fails {
            return Err(BackendError::LockFailed(
                "device in use by another client".to_string(),
            ));
        }
        state.locked = true;
        state.lock_count += 1;
        Ok(())
    }

    fn unlock_for_configuration(&mut self) {
        let mut state = lock(&self.state);
        state.locked = false;
        state.unlock_count += 1;
    }

    fn set_active_format(&mut self, format: &DeviceFormat) -> BackendResult<()> {
        let mut state = lock(&self.state);
        if !state.locked {
            return Err(BackendError::Other("device not locked".to_string()));
        }
        if state.format_rejects || !self.formats.contains(format) {
            return Err(BackendError::FormatNotSupported(format.to_string()));
        }
        state.active_format = format.clone();
        // A new format starts at its own default frame rate
        state.frame_duration_range = None;
        Ok(())
    }

    fn set_frame_duration_range(&mut self, min: FrameDuration, max: FrameDuration) {
        let mut state = lock(&self.state);
        if !state.locked {
            warn!("Frame duration set on an unlocked device, ignored");
            return;
        }
        state.frame_duration_range = Some((min, max));
    }

    fn zoom_range(&self) -> (f64, f64) {
        self.zoom_range
    }

    fn set_video_zoom_factor(&mut self, factor: f64) {
        let (min, max) = self.zoom_range;
        lock(&self.state).zoom_factor = factor.clamp(min, max);
    }

    fn video_zoom_factor(&self) -> f64 {
        lock(&self.state).zoom_factor
    }

    fn is_focus_point_of_interest_supported(&self) -> bool {
        self.point_of_interest_supported
    }

    fn is_exposure_point_of_interest_supported(&self) -> bool {
        self.point_of_interest_supported
    }

    fn is_focus_mode_supported(&self, _mode: FocusMode) -> bool {
        true
    }

    fn is_exposure_mode_supported(&self, _mode: ExposureMode) -> bool {
        true
    }

    fn set_focus(&mut self, mode: FocusMode, point: Option<DevicePoint>) {
        let mut state = lock(&self.state);
        state.focus_mode = mode;
        if point.is_some() {
            state.focus_point = point;
        }
    }

    fn set_exposure(&mut self, mode: ExposureMode, point: Option<DevicePoint>) {
        let mut state = lock(&self.state);
        state.exposure_mode = mode;
        if point.is_some() {
            state.exposure_point = point;
        }
    }

    fn set_subject_area_change_monitoring(&mut self, enabled: bool) {
        lock(&self.state).subject_area_change_monitoring = enabled;
    }
}
