// SPDX-License-Identifier: GPL-3.0-only

//! Capture graph state machine
//!
//! ```text
//!                 integrate / change_capture
//!  Uninitialized ────────────────────────────▶ Photo ◀──────▶ Movie
//!        ▲                                       │              │
//!        └────────── stop_session_running ───────┴──────────────┘
//! ```
//!
//! Every transition runs inside one configuration transaction. A failing step
//! returns a [`TransitionError`] naming the step; the transaction still
//! commits what was done before it, `mode` keeps its previous value and the
//! setup result becomes `ConfigurationFailed` until a transition succeeds.
//! Steps only add what is missing, so re-issuing the transition completes it.
//!
//! All methods run on the session queue.

use super::readiness::{CaptureReadiness, ReadinessCoordinator, ReadinessDelegate};
use super::rotation::{OrientationSource, RotationCoordinator};
use super::session::{
    CaptureSession, Connection, InputKind, OutputKind, SessionInput, Transaction, TransactionOp,
};
use crate::backends::background::{BackgroundTask, BackgroundTasks};
use crate::backends::camera::{
    AudioDevice, BackendError, BackendResult, CameraBackend, CaptureDevice, ConfigurationLock,
    DeviceFormat, DevicePoint, ExposureMode, FocusMode, MovieFrameRate, MovieResolution,
    PreviewSurface, RecordingFailure, RequestId, SessionId, SessionPreset, ZoomFactor,
};
use crate::backends::permissions::{AuthorizationStatus, MediaType, PermissionPrompt};
use crate::errors::{
    CaptureError, DeviceError, RecordingError, StudioResult, TransitionError, TransitionStep,
};
use crate::library::MediaLibrary;
use crate::pipelines::photo::{
    InFlightTable, PhotoCaptureProcessor, PhotoPreferences, PhotoSettingsTemplate, RequestIds,
};
use crate::pipelines::video::{
    MovieFinalizer, MovieOutcome, RecordingState, RecordingTimer, temporary_movie_path,
};
use crate::utils::lock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Shared slot for the preview surface, filled by `set_session`
pub type PreviewSlot = Arc<Mutex<Option<Arc<dyn PreviewSurface>>>>;

/// State of the capture graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GraphMode {
    #[default]
    Uninitialized,
    Photo,
    Movie,
}

impl std::fmt::Display for GraphMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphMode::Uninitialized => write!(f, "uninitialized"),
            GraphMode::Photo => write!(f, "photo"),
            GraphMode::Movie => write!(f, "movie"),
        }
    }
}

/// Capture mode a user can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureMode {
    #[default]
    Photo,
    Movie,
}

impl From<CaptureMode> for GraphMode {
    fn from(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Photo => GraphMode::Photo,
            CaptureMode::Movie => GraphMode::Movie,
        }
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        GraphMode::from(*self).fmt(f)
    }
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photo" => Ok(CaptureMode::Photo),
            "movie" | "video" => Ok(CaptureMode::Movie),
            other => Err(format!("unknown capture mode '{}'", other)),
        }
    }
}

/// Result of configuring the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionSetupResult {
    #[default]
    Success,
    /// Video access was refused; the session will not start
    NotAuthorized,
    /// The last transition failed part way
    ConfigurationFailed,
}

/// What a `capture_movie` toggle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingToggle {
    Started(PathBuf),
    Stopped(PathBuf),
}

/// Point-in-time view of the graph, for status displays and tests
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub session: SessionId,
    pub mode: GraphMode,
    pub setup: SessionSetupResult,
    pub running: bool,
    pub preset: SessionPreset,
    pub inputs: Vec<InputKind>,
    pub outputs: Vec<OutputKind>,
    pub photo_connection: Option<Connection>,
    pub movie_connection: Option<Connection>,
    pub has_photo_settings: bool,
    pub audio_device: Option<String>,
    pub readiness: Option<CaptureReadiness>,
    pub preview_angle: Option<f64>,
    pub in_flight: Vec<RequestId>,
    pub completed_requests: u64,
    pub recording: Option<PathBuf>,
    pub commits: u64,
    pub last_commit: Vec<TransactionOp>,
}

/// Collaborators the graph calls out to
pub(crate) struct GraphServices {
    pub backend: Arc<dyn CameraBackend>,
    pub permissions: Arc<dyn PermissionPrompt>,
    pub library: Arc<dyn MediaLibrary>,
    pub background_tasks: Arc<dyn BackgroundTasks>,
    pub orientation: Arc<OrientationSource>,
    pub preview: PreviewSlot,
    pub timer: Arc<RecordingTimer>,
    pub temp_dir: PathBuf,
    pub photo_preferences: PhotoPreferences,
}

impl GraphServices {
    /// Rotation coordinator pushing preview angles into the preview slot
    fn bind_rotation(&self, device: &dyn CaptureDevice) -> RotationCoordinator {
        let preview = Arc::clone(&self.preview);
        RotationCoordinator::new(
            device.sensor_rotation(),
            Arc::clone(&self.orientation),
            move |angle| {
                if let Some(surface) = lock(&preview).clone() {
                    surface.set_video_rotation_angle(angle);
                }
            },
        )
    }
}

type StepResult = Result<(), (TransitionStep, String)>;

pub(crate) struct CaptureGraph {
    services: GraphServices,
    session: CaptureSession,
    mode: GraphMode,
    setup: SessionSetupResult,
    video_device: Option<Box<dyn CaptureDevice>>,
    audio_device: Option<AudioDevice>,
    photo_template: Option<PhotoSettingsTemplate>,
    readiness: Option<ReadinessCoordinator>,
    readiness_delegate: Option<Arc<dyn ReadinessDelegate>>,
    rotation: Option<RotationCoordinator>,
    in_flight: InFlightTable,
    request_ids: RequestIds,
    recording: RecordingState,
    movie_preset: SessionPreset,
    /// Last quality chosen in movie mode, restored on every return to it
    movie_quality: Option<(MovieResolution, MovieFrameRate)>,
}

impl CaptureGraph {
    pub fn new(session_id: SessionId, services: GraphServices, movie: MovieResolution) -> Self {
        Self {
            services,
            session: CaptureSession::new(session_id),
            mode: GraphMode::Uninitialized,
            setup: SessionSetupResult::Success,
            video_device: None,
            audio_device: None,
            photo_template: None,
            readiness: None,
            readiness_delegate: None,
            rotation: None,
            in_flight: InFlightTable::new(),
            request_ids: RequestIds::default(),
            recording: RecordingState::Idle,
            movie_preset: movie.preset(),
            movie_quality: None,
        }
    }

    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    pub fn setup(&self) -> SessionSetupResult {
        self.setup
    }

    pub fn set_setup(&mut self, setup: SessionSetupResult) {
        self.setup = setup;
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_recording()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            session: self.session.id(),
            mode: self.mode,
            setup: self.setup,
            running: self.session.is_running(),
            preset: self.session.preset(),
            inputs: self.session.input_kinds(),
            outputs: self.session.output_kinds(),
            photo_connection: self.session.connection(OutputKind::Photo),
            movie_connection: self.session.connection(OutputKind::MovieFile),
            has_photo_settings: self.photo_template.is_some(),
            audio_device: self.audio_device.as_ref().map(|device| device.name.clone()),
            readiness: self.readiness.as_ref().map(|r| r.readiness()),
            preview_angle: self.rotation.as_ref().map(|r| r.preview_angle()),
            in_flight: self.in_flight.ids(),
            completed_requests: self.in_flight.removed_count(),
            recording: self.recording.file_path().map(|p| p.to_path_buf()),
            commits: self.session.commits(),
            last_commit: self.session.last_commit().to_vec(),
        }
    }

    /// Build the graph for `mode` from scratch
    pub fn integrate(
        &mut self,
        mode: CaptureMode,
        movie_preset: SessionPreset,
        delegate: Option<Arc<dyn ReadinessDelegate>>,
    ) -> Result<GraphMode, TransitionError> {
        if self.mode != GraphMode::Uninitialized || !self.session.input_kinds().is_empty() {
            debug!(mode = %self.mode, "Integrating over an existing graph, detaching first");
            self.detach_all();
        }
        self.readiness_delegate = delegate;
        if movie_preset.movie_dimensions().is_some() {
            self.movie_preset = movie_preset;
            self.movie_quality = None;
        }
        info!(%mode, "Integrating capture session");
        self.transition_to(mode)
    }

    /// Switch between photo and movie; refused while recording
    pub fn change_capture(&mut self, mode: CaptureMode) -> Result<GraphMode, TransitionError> {
        let target = GraphMode::from(mode);
        if self.recording.is_recording() {
            return Err(TransitionError {
                from: self.mode,
                to: target,
                step: TransitionStep::RecordingInProgress,
                reason: "Cannot change capture mode while recording".to_string(),
            });
        }
        if self.mode == target && self.setup != SessionSetupResult::ConfigurationFailed {
            debug!(mode = %target, "Already in requested capture mode");
            return Ok(target);
        }
        info!(from = %self.mode, to = %target, "Changing capture mode");
        self.transition_to(mode)
    }

    fn transition_to(&mut self, mode: CaptureMode) -> Result<GraphMode, TransitionError> {
        let result = match mode {
            CaptureMode::Photo => self.enter_photo(),
            CaptureMode::Movie => self.enter_movie(),
        };
        match &result {
            Ok(mode) => {
                if self.setup == SessionSetupResult::ConfigurationFailed {
                    self.setup = SessionSetupResult::Success;
                }
                info!(%mode, "Capture graph configured");
            }
            Err(e) => {
                warn!(error = %e, "Capture graph configuration failed");
                if self.setup != SessionSetupResult::NotAuthorized {
                    self.setup = SessionSetupResult::ConfigurationFailed;
                }
            }
        }
        result
    }

    fn enter_photo(&mut self) -> Result<GraphMode, TransitionError> {
        let from = self.mode;
        let fail = |(step, reason): (TransitionStep, String)| TransitionError {
            from,
            to: GraphMode::Photo,
            step,
            reason,
        };

        let Self {
            services,
            session,
            video_device,
            audio_device,
            photo_template,
            readiness,
            readiness_delegate,
            rotation,
            ..
        } = self;
        let mut tx = session.begin_configuration();

        // Movie parts leave before the photo output arrives
        tx.remove_output(OutputKind::MovieFile);
        tx.remove_output(OutputKind::AudioData);
        tx.remove_input(InputKind::Audio);
        *audio_device = None;

        tx.set_preset(SessionPreset::Photo);
        attach_video_input(&mut tx, services, video_device, rotation).map_err(fail)?;
        let device = attached(video_device).map_err(fail)?;
        apply_preset_format(device, SessionPreset::Photo)
            .map_err(|e| fail((TransitionStep::ConfigureDevice, e.to_string())))?;

        ensure_output(&mut tx, OutputKind::Photo, TransitionStep::AddPhotoOutput).map_err(fail)?;

        let template = PhotoSettingsTemplate::for_device(
            &*device,
            &services.backend.available_photo_codecs(),
            services.photo_preferences,
        )
        .ok_or_else(|| {
            fail((
                TransitionStep::ConfigurePhotoOutput,
                "Video device input empty".to_string(),
            ))
        })?;
        debug!(codec = ?template.codec, dimensions = %template.max_dimensions, "Photo settings template built");
        *photo_template = Some(template);
        *readiness = Some(ReadinessCoordinator::new(
            tx.session().is_running(),
            readiness_delegate.clone(),
        ));
        tx.commit();

        self.mode = GraphMode::Photo;
        Ok(GraphMode::Photo)
    }

    fn enter_movie(&mut self) -> Result<GraphMode, TransitionError> {
        let from = self.mode;
        let preset = self.movie_preset;
        let quality = self.movie_quality;
        let fail = |(step, reason): (TransitionStep, String)| TransitionError {
            from,
            to: GraphMode::Movie,
            step,
            reason,
        };

        let Self {
            services,
            session,
            video_device,
            audio_device,
            photo_template,
            readiness,
            rotation,
            ..
        } = self;
        let mut tx = session.begin_configuration();

        attach_video_input(&mut tx, services, video_device, rotation).map_err(fail)?;

        // The photo output leaves before any movie output arrives
        tx.remove_output(OutputKind::Photo);
        *photo_template = None;
        *readiness = None;

        let device = attached(video_device).map_err(fail)?;
        set_continuous_auto(device).map_err(fail)?;

        if !tx.session().has_input(InputKind::Audio) {
            let status = services.permissions.authorization_status(MediaType::Audio);
            if matches!(
                status,
                AuthorizationStatus::Denied | AuthorizationStatus::Restricted
            ) {
                return Err(fail((
                    TransitionStep::FindMicrophone,
                    format!("Audio access {:?}", status),
                )));
            }
            let microphone = services.backend.find_microphone().ok_or_else(|| {
                fail((
                    TransitionStep::FindMicrophone,
                    "Cannot find audio device".to_string(),
                ))
            })?;
            if !tx.add_input(SessionInput::new(InputKind::Audio, &microphone.id)) {
                return Err(fail((
                    TransitionStep::AddAudioInput,
                    format!("Cannot add audio device input {}", microphone.name),
                )));
            }
            info!(microphone = %microphone.name, "Audio input attached");
            *audio_device = Some(microphone);
        }

        ensure_output(&mut tx, OutputKind::AudioData, TransitionStep::AddAudioDataOutput)
            .map_err(fail)?;
        ensure_output(&mut tx, OutputKind::MovieFile, TransitionStep::AddMovieOutput)
            .map_err(fail)?;

        match quality {
            Some((resolution, frame_rate)) => {
                tx.set_preset(SessionPreset::InputPriority);
                select_quality(device, frame_rate, resolution)
                    .map_err(|e| fail((TransitionStep::SetPreset, e.to_string())))?;
            }
            None => {
                tx.set_preset(preset);
                apply_preset_format(device, preset)
                    .map_err(|e| fail((TransitionStep::SetPreset, e.to_string())))?;
            }
        }

        let stabilization = device.active_format().video_stabilization_supported;
        if let Some(connection) = tx.connection_mut(OutputKind::MovieFile) {
            connection.stabilization_enabled = stabilization;
        }
        tx.commit();

        self.mode = GraphMode::Movie;
        Ok(GraphMode::Movie)
    }

    /// Remove every input and output and release the coordinators
    fn detach_all(&mut self) {
        self.session.begin_configuration().clear();
        self.video_device = None;
        self.audio_device = None;
        self.photo_template = None;
        self.readiness = None;
        self.rotation = None;
        self.mode = GraphMode::Uninitialized;
        if self.setup == SessionSetupResult::ConfigurationFailed {
            self.setup = SessionSetupResult::Success;
        }
    }

    pub fn start_running(&mut self) -> StudioResult<()> {
        if self.setup == SessionSetupResult::NotAuthorized {
            warn!("Camera access not authorized, session will not start");
            return Err(crate::errors::PermissionError::Denied(MediaType::Video).into());
        }
        if self.session.is_running() {
            return Ok(());
        }
        self.services.backend.start_running();
        self.session.set_running(true);
        if let Some(readiness) = &mut self.readiness {
            readiness.set_session_running(true);
        }
        info!(session = ?self.session.id(), "Capture session running");
        Ok(())
    }

    /// Stop the session and tear the graph down
    pub fn stop_running(&mut self) -> StudioResult<()> {
        if self.recording.is_recording() {
            if let Err(e) = self.services.backend.stop_recording() {
                warn!(error = %e, "Failed to stop recording during teardown");
            }
            self.recording.stop();
            self.services.timer.stop();
        }
        if self.session.is_running() {
            self.services.backend.stop_running();
            self.session.set_running(false);
        }
        self.detach_all();
        info!(session = ?self.session.id(), "Capture session stopped and torn down");
        Ok(())
    }

    /// Select the first format matching `resolution` that supports `frame_rate`
    pub fn change_video_quality(
        &mut self,
        frame_rate: MovieFrameRate,
        resolution: MovieResolution,
    ) -> StudioResult<DeviceFormat> {
        if self.mode != GraphMode::Movie {
            return Err(DeviceError::WrongMode {
                required: GraphMode::Movie,
                current: self.mode,
            }
            .into());
        }
        if self.recording.is_recording() {
            return Err(DeviceError::Busy.into());
        }
        let device = self.video_device.as_deref_mut().ok_or(DeviceError::NoDevice)?;
        let format = select_quality(device, frame_rate, resolution)?;

        let mut tx = self.session.begin_configuration();
        tx.set_preset(SessionPreset::InputPriority);
        if let Some(connection) = tx.connection_mut(OutputKind::MovieFile) {
            connection.stabilization_enabled = format.video_stabilization_supported;
        }
        tx.commit();
        self.movie_preset = resolution.preset();
        self.movie_quality = Some((resolution, frame_rate));

        info!(format = %format, fps = frame_rate.fps(), "Video quality changed");
        Ok(format)
    }

    /// Returns the zoom factor the device settled on
    pub fn change_zoom(&mut self, zoom: ZoomFactor) -> StudioResult<f64> {
        let Some(device) = self.video_device.as_deref_mut() else {
            warn!(zoom = zoom.label(), "No video device input, zoom ignored");
            return Err(DeviceError::NoDevice.into());
        };
        let mut locked =
            ConfigurationLock::acquire(device).map_err(|e| DeviceError::LockFailed(e.to_string()))?;
        locked.set_video_zoom_factor(zoom.video_zoom_factor());
        let applied = locked.video_zoom_factor();
        debug!(requested = zoom.label(), applied, "Zoom changed");
        Ok(applied)
    }

    /// Point focus/exposure; returns false when the device supports neither
    pub fn focus(
        &mut self,
        point: DevicePoint,
        focus_mode: FocusMode,
        exposure_mode: ExposureMode,
        monitor_subject_area_change: bool,
    ) -> StudioResult<bool> {
        let device = self.video_device.as_deref_mut().ok_or(DeviceError::NoDevice)?;

        let focus = device.is_focus_point_of_interest_supported()
            && device.is_focus_mode_supported(focus_mode);
        let exposure = device.is_exposure_point_of_interest_supported()
            && device.is_exposure_mode_supported(exposure_mode);
        if !focus && !exposure {
            debug!("Device has no point of interest support");
            return Ok(false);
        }

        let mut locked =
            ConfigurationLock::acquire(device).map_err(|e| DeviceError::LockFailed(e.to_string()))?;
        if focus {
            locked.set_focus(focus_mode, Some(point));
        }
        if exposure {
            locked.set_exposure(exposure_mode, Some(point));
        }
        locked.set_subject_area_change_monitoring(monitor_subject_area_change);
        debug!(x = point.x, y = point.y, ?focus_mode, ?exposure_mode, "Focus point set");
        Ok(true)
    }

    /// Issue a photo request built from the template
    ///
    /// `make_processor` receives the request snapshot and returns its delegate.
    pub fn capture_photo(
        &mut self,
        make_processor: impl FnOnce(crate::backends::camera::CaptureRequest) -> PhotoCaptureProcessor,
    ) -> StudioResult<RequestId> {
        let Some(template) = &self.photo_template else {
            warn!("No photo settings to capture");
            return Err(CaptureError::NoPhotoSettings.into());
        };
        let request = template.snapshot(self.request_ids.next());
        let id = request.id;

        if let Some(readiness) = &mut self.readiness {
            readiness.start_tracking(id);
        }
        let result = self.issue_photo(request, make_processor);
        if let Some(readiness) = &mut self.readiness {
            readiness.stop_tracking(id);
        }
        result
    }

    fn issue_photo(
        &mut self,
        request: crate::backends::camera::CaptureRequest,
        make_processor: impl FnOnce(crate::backends::camera::CaptureRequest) -> PhotoCaptureProcessor,
    ) -> StudioResult<RequestId> {
        let id = request.id;
        let Some(rotation) = &self.rotation else {
            warn!("Video device rotation coordinator is empty");
            return Err(CaptureError::NoRotationCoordinator.into());
        };
        let angle = rotation.capture_angle();
        match self.session.connection_mut(OutputKind::Photo) {
            Some(connection) => connection.video_rotation_angle = angle,
            None => warn!("Photo output connection is empty"),
        }

        let processor = Arc::new(make_processor(request.clone()));
        self.in_flight.insert(Arc::clone(&processor));

        if let Err(e) = self
            .services
            .backend
            .capture_photo(&request, angle, processor)
        {
            // No callbacks follow a refused request
            self.in_flight.remove(id);
            warn!(request = %id, error = %e, "Photo request refused");
            return Err(CaptureError::Failed(e.to_string()).into());
        }

        info!(request = %id, angle, in_flight = self.in_flight.len(), "Photo requested");
        Ok(id)
    }

    /// Drop a finished request; runs from its processor's completion
    pub fn remove_in_flight(&mut self, id: RequestId) -> bool {
        let removed = self.in_flight.remove(id).is_some();
        debug!(request = %id, removed, remaining = self.in_flight.len(), "In-flight request removed");
        removed
    }

    /// Start recording when idle, stop when recording
    ///
    /// `completion` receives the temporary path and the finalizer's outcome;
    /// it is only used when a recording starts.
    pub fn toggle_movie(
        &mut self,
        completion: impl FnOnce(PathBuf, MovieOutcome) + Send + 'static,
    ) -> StudioResult<RecordingToggle> {
        if let RecordingState::Recording { file_path, .. } = self.recording.stop() {
            if let Err(e) = self.services.backend.stop_recording() {
                warn!(error = %e, "Stop recording failed");
            }
            self.services.timer.stop();
            info!(path = %file_path.display(), "Recording stopped");
            return Ok(RecordingToggle::Stopped(file_path));
        }

        if self.mode != GraphMode::Movie || !self.session.has_output(OutputKind::MovieFile) {
            warn!(mode = %self.mode, "Movie file output is empty");
            return Err(RecordingError::NoMovieOutput.into());
        }

        let task = BackgroundTask::begin(Arc::clone(&self.services.background_tasks), "movie-recording");
        let path = temporary_movie_path(&self.services.temp_dir);
        let finished_path = path.clone();
        let finalizer = Arc::new(MovieFinalizer::new(
            path.clone(),
            Arc::clone(&self.services.library),
            task,
            move |outcome| completion(finished_path, outcome),
        ));

        let angle = self
            .rotation
            .as_ref()
            .map(|rotation| rotation.capture_angle())
            .unwrap_or_default();
        let stabilized = match self.session.connection_mut(OutputKind::MovieFile) {
            Some(connection) => {
                connection.video_rotation_angle = angle;
                connection.stabilization_enabled
            }
            None => false,
        };

        if let Err(e) = self.services.backend.start_recording(
            &path,
            angle,
            stabilized,
            Arc::clone(&finalizer) as Arc<dyn crate::backends::camera::RecordingDelegate>,
        ) {
            warn!(error = %e, "Failed to start recording");
            // Releases the token and removes anything written
            finalizer.finish(
                &path,
                Some(RecordingFailure {
                    message: e.to_string(),
                    recorded_successfully: false,
                }),
            );
            return Err(RecordingError::StartFailed(e.to_string()).into());
        }

        self.services.timer.start();
        self.recording = RecordingState::start(path.clone(), finalizer);
        info!(path = %path.display(), angle, stabilized, "Recording started");
        Ok(RecordingToggle::Started(path))
    }

    /// The recording writing to `path` has finished
    ///
    /// Clears the recording state when the backend ended the recording
    /// itself. A stale path (already stopped, or a newer recording running)
    /// leaves the state alone.
    pub fn recording_finished(&mut self, path: &Path) -> bool {
        if self.recording.file_path() != Some(path) {
            return false;
        }
        self.recording.stop();
        self.services.timer.stop();
        info!(path = %path.display(), "Recording ended by the backend");
        true
    }
}

/// Attach the camera if it is not attached yet and bind its rotation
fn attach_video_input(
    tx: &mut Transaction<'_>,
    services: &GraphServices,
    video_device: &mut Option<Box<dyn CaptureDevice>>,
    rotation: &mut Option<RotationCoordinator>,
) -> StepResult {
    if video_device.is_some() && tx.session().has_input(InputKind::Video) {
        return Ok(());
    }

    let device = services.backend.find_camera().ok_or_else(|| {
        (
            TransitionStep::FindCamera,
            "Cannot find video capture device".to_string(),
        )
    })?;
    if !tx.add_input(SessionInput::new(InputKind::Video, device.unique_id())) {
        return Err((
            TransitionStep::AddVideoInput,
            format!("Cannot add video device input {}", device.name()),
        ));
    }

    info!(camera = %device.name(), rotation = %device.sensor_rotation(), "Video input attached");
    *rotation = Some(services.bind_rotation(device.as_ref()));
    *video_device = Some(device);
    Ok(())
}

fn attached(
    video_device: &mut Option<Box<dyn CaptureDevice>>,
) -> Result<&mut dyn CaptureDevice, (TransitionStep, String)> {
    match video_device {
        Some(device) => Ok(device.as_mut()),
        None => Err((
            TransitionStep::FindCamera,
            "Video device input empty".to_string(),
        )),
    }
}

fn ensure_output(tx: &mut Transaction<'_>, kind: OutputKind, step: TransitionStep) -> StepResult {
    if tx.session().has_output(kind) || tx.add_output(kind) {
        return Ok(());
    }
    Err((step, format!("Cannot add {:?} output", kind)))
}

fn set_continuous_auto(device: &mut dyn CaptureDevice) -> StepResult {
    let mut locked = ConfigurationLock::acquire(device)
        .map_err(|e| (TransitionStep::ConfigureDevice, e.to_string()))?;
    if locked.is_focus_mode_supported(FocusMode::ContinuousAutoFocus) {
        locked.set_focus(FocusMode::ContinuousAutoFocus, None);
    }
    if locked.is_exposure_mode_supported(ExposureMode::ContinuousAutoExposure) {
        locked.set_exposure(ExposureMode::ContinuousAutoExposure, None);
    }
    Ok(())
}

/// Make the device's active format follow a session preset
/// Activate the format recording at `resolution` and `frame_rate` and pin
/// the frame duration to that rate
fn select_quality(
    device: &mut dyn CaptureDevice,
    frame_rate: MovieFrameRate,
    resolution: MovieResolution,
) -> Result<DeviceFormat, DeviceError> {
    let dimensions = resolution.dimensions();
    let rate = frame_rate.framerate();
    let Some(format) = device
        .formats()
        .into_iter()
        .find(|format| format.dimensions == dimensions && format.supports(rate))
    else {
        warn!(%resolution, fps = frame_rate.fps(), "No device format for requested quality");
        return Err(DeviceError::FormatUnavailable {
            resolution: resolution.to_string(),
            frame_rate: frame_rate.fps(),
        });
    };

    let mut locked =
        ConfigurationLock::acquire(device).map_err(|e| DeviceError::LockFailed(e.to_string()))?;
    locked
        .set_active_format(&format)
        .map_err(|e| DeviceError::FormatRejected(e.to_string()))?;
    let duration = rate.frame_duration();
    locked.set_frame_duration_range(duration, duration);
    Ok(format)
}

fn apply_preset_format(device: &mut dyn CaptureDevice, preset: SessionPreset) -> BackendResult<()> {
    let formats = device.formats();
    let target = match preset {
        SessionPreset::Photo => formats.into_iter().max_by_key(|format| {
            format
                .largest_photo_dimensions()
                .map(|dimensions| dimensions.pixels())
                .unwrap_or(0)
        }),
        SessionPreset::Hd1920x1080 | SessionPreset::Hd4k3840x2160 => {
            let dimensions = preset.movie_dimensions();
            formats
                .into_iter()
                .find(|format| Some(format.dimensions) == dimensions)
        }
        SessionPreset::InputPriority => return Ok(()),
    };

    let Some(format) = target else {
        return Err(BackendError::FormatNotSupported(format!("{:?}", preset)));
    };
    if device.active_format() == format {
        return Ok(());
    }

    let mut locked = ConfigurationLock::acquire(device)?;
    locked.set_active_format(&format)?;
    debug!(?preset, format = %format, "Active format follows preset");
    Ok(())
}
