// SPDX-License-Identifier: MPL-2.0

//! Capture studio
//!
//! The [`Studio`] owns one capture graph and serializes every change to it on
//! a dedicated [`SessionQueue`]. Intents return immediately with a
//! [`Pending`] handle; their effects are published through a status watch
//! channel and an event broadcast channel.
//!
//! ```text
//!  intents ──▶ SessionQueue ──▶ CaptureGraph ──▶ CameraBackend
//!                  ▲                 │
//!                  │                 ├── status (watch)
//!   completions ───┘                 └── events (broadcast)
//! ```
//!
//! Backend callbacks never touch the graph directly: photo completions hop
//! back onto the queue to release their in-flight entry.

mod graph;
pub mod queue;
pub mod readiness;
pub mod rotation;
pub mod session;

pub use graph::{
    CaptureMode, GraphMode, GraphSnapshot, PreviewSlot, RecordingToggle, SessionSetupResult,
};
pub use queue::SessionQueue;
pub use readiness::{CaptureReadiness, ReadinessDelegate};
pub use rotation::{DeviceOrientation, InterfaceOrientation, Orientation, OrientationSource};
pub use session::{Connection, InputKind, OutputKind, TransactionOp};

use crate::backends::background::{BackgroundTasks, TrackedBackgroundTasks};
use crate::backends::camera::{
    CameraBackend, DeviceFormat, DevicePoint, ExposureMode, FocusMode, MovieFrameRate,
    MovieResolution, PreviewSurface, RequestId, SessionId, SessionPreset, ZoomFactor,
};
use crate::backends::permissions::{
    AuthorizationStatus, MediaType, PermissionPrompt, StaticPermissions,
};
use crate::errors::{StudioError, StudioResult, TransitionError};
use crate::library::MediaLibrary;
use crate::pipelines::photo::{PhotoCaptureProcessor, PhotoOutcome, PhotoPreferences, SavedPhoto};
use crate::pipelines::video::{MovieOutcome, RecordingTimer, SavedMovie};
use crate::utils::lock;
use graph::{CaptureGraph, GraphServices};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, info, warn};

const QUEUE_LABEL: &str = "session-queue";
const EVENT_CAPACITY: usize = 64;

/// Published summary of the studio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StudioStatus {
    pub mode: GraphMode,
    pub running: bool,
    pub recording: bool,
    pub setup: SessionSetupResult,
    pub in_flight: usize,
}

/// Things that happened, in the order the studio observed them
#[derive(Debug, Clone)]
pub enum StudioEvent {
    ModeChanged(GraphMode),
    TransitionFailed(TransitionError),
    PhotoSaved(SavedPhoto),
    PhotoDiscarded {
        request: RequestId,
        reason: StudioError,
    },
    RecordingStarted {
        path: PathBuf,
    },
    RecordingSaved(SavedMovie),
    RecordingLost {
        reason: StudioError,
    },
}

/// Result of an intent that has not run yet
///
/// Dropping it is fine; the intent still runs.
pub struct Pending<T> {
    receiver: oneshot::Receiver<StudioResult<T>>,
}

impl<T> Pending<T> {
    fn new(receiver: oneshot::Receiver<StudioResult<T>>) -> Self {
        Self { receiver }
    }

    /// Block until the intent ran
    ///
    /// Must not be called from an async context or from the session queue.
    pub fn wait(self) -> StudioResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(StudioError::QueueClosed))
    }

    pub async fn outcome(self) -> StudioResult<T> {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(StudioError::QueueClosed))
    }
}

/// Collaborators a studio is built from
pub struct StudioServices {
    pub backend: Arc<dyn CameraBackend>,
    pub library: Arc<dyn MediaLibrary>,
    pub permissions: Arc<dyn PermissionPrompt>,
    pub background_tasks: Arc<dyn BackgroundTasks>,
    /// Where recordings are written before they move to the library
    pub temp_dir: PathBuf,
    pub photo_preferences: PhotoPreferences,
    pub movie_resolution: MovieResolution,
    pub orientation: Orientation,
}

impl StudioServices {
    pub fn new(backend: Arc<dyn CameraBackend>, library: Arc<dyn MediaLibrary>) -> Self {
        Self {
            backend,
            library,
            permissions: Arc::new(StaticPermissions::granted()),
            background_tasks: Arc::new(TrackedBackgroundTasks::new()),
            temp_dir: std::env::temp_dir(),
            photo_preferences: PhotoPreferences::default(),
            movie_resolution: MovieResolution::default(),
            orientation: Orientation::default(),
        }
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionPrompt>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_background_tasks(mut self, tasks: Arc<dyn BackgroundTasks>) -> Self {
        self.background_tasks = tasks;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    pub fn with_photo_preferences(mut self, preferences: PhotoPreferences) -> Self {
        self.photo_preferences = preferences;
        self
    }

    pub fn with_movie_resolution(mut self, resolution: MovieResolution) -> Self {
        self.movie_resolution = resolution;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }
}

/// Handles that queue jobs and backend callbacks publish through
#[derive(Clone)]
struct Outlets {
    queue: Weak<SessionQueue>,
    graph: Weak<Mutex<CaptureGraph>>,
    library: Arc<dyn MediaLibrary>,
    preview: PreviewSlot,
    status: Arc<watch::Sender<StudioStatus>>,
    events: broadcast::Sender<StudioEvent>,
}

impl Outlets {
    fn emit(&self, event: StudioEvent) {
        // No receivers is not an error
        let _ = self.events.send(event);
    }

    fn publish(&self, graph: &CaptureGraph) {
        let status = StudioStatus {
            mode: graph.mode(),
            running: graph.is_running(),
            recording: graph.is_recording(),
            setup: graph.setup(),
            in_flight: graph.in_flight_len(),
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    fn photo_processor(&self, request: crate::backends::camera::CaptureRequest) -> PhotoCaptureProcessor {
        let preview = Arc::clone(&self.preview);
        let outlets = self.clone();
        PhotoCaptureProcessor::new(
            request,
            Arc::clone(&self.library),
            move || {
                if let Some(surface) = lock(&preview).clone() {
                    surface.flash();
                }
            },
            move |id, outcome| outlets.photo_finished(id, outcome),
        )
    }

    /// Runs on a backend thread
    fn photo_finished(&self, id: RequestId, outcome: PhotoOutcome) {
        match outcome {
            Ok(saved) => self.emit(StudioEvent::PhotoSaved(saved)),
            Err(reason) => self.emit(StudioEvent::PhotoDiscarded {
                request: id,
                reason,
            }),
        }

        let Some(queue) = self.queue.upgrade() else {
            debug!(request = %id, "Studio gone, in-flight entry dropped with it");
            return;
        };
        let outlets = self.clone();
        queue.dispatch(move || {
            if let Some(graph) = outlets.graph.upgrade() {
                let mut graph = lock(&graph);
                graph.remove_in_flight(id);
                outlets.publish(&graph);
            }
        });
    }

    /// Runs on a backend thread
    fn movie_finished(&self, path: PathBuf, outcome: MovieOutcome) {
        match outcome {
            Ok(saved) => self.emit(StudioEvent::RecordingSaved(saved)),
            Err(reason) => self.emit(StudioEvent::RecordingLost { reason }),
        }

        let Some(queue) = self.queue.upgrade() else {
            debug!(path = %path.display(), "Studio gone, recording state dropped with it");
            return;
        };
        let outlets = self.clone();
        queue.dispatch(move || {
            if let Some(graph) = outlets.graph.upgrade() {
                let mut graph = lock(&graph);
                graph.recording_finished(&path);
                outlets.publish(&graph);
            }
        });
    }
}

/// Capture-session manager
///
/// Every method returns without waiting for the session queue; use the
/// returned [`Pending`] to observe the outcome.
pub struct Studio {
    session_id: SessionId,
    queue: Arc<SessionQueue>,
    graph: Arc<Mutex<CaptureGraph>>,
    backend: Arc<dyn CameraBackend>,
    permissions: Arc<dyn PermissionPrompt>,
    orientation: Arc<OrientationSource>,
    timer: Arc<RecordingTimer>,
    outlets: Outlets,
}

impl Studio {
    pub fn new(services: StudioServices) -> Self {
        let session_id = SessionId::new();
        let queue = Arc::new(SessionQueue::new(QUEUE_LABEL));
        let orientation = Arc::new(OrientationSource::new(services.orientation));
        let timer = Arc::new(RecordingTimer::default());
        let preview: PreviewSlot = Arc::new(Mutex::new(None));

        let graph = Arc::new(Mutex::new(CaptureGraph::new(
            session_id,
            GraphServices {
                backend: Arc::clone(&services.backend),
                permissions: Arc::clone(&services.permissions),
                library: Arc::clone(&services.library),
                background_tasks: services.background_tasks,
                orientation: Arc::clone(&orientation),
                preview: Arc::clone(&preview),
                timer: Arc::clone(&timer),
                temp_dir: services.temp_dir,
                photo_preferences: services.photo_preferences,
            },
            services.movie_resolution,
        )));

        let (status, _) = watch::channel(StudioStatus::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let outlets = Outlets {
            queue: Arc::downgrade(&queue),
            graph: Arc::downgrade(&graph),
            library: services.library,
            preview,
            status: Arc::new(status),
            events,
        };

        info!(session = ?session_id, backend = %services.backend.backend_type(), "Studio created");
        Self {
            session_id,
            queue,
            graph,
            backend: services.backend,
            permissions: services.permissions,
            orientation,
            timer,
            outlets,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn backend(&self) -> &Arc<dyn CameraBackend> {
        &self.backend
    }

    /// Run `op` on the session queue and publish what changed
    fn submit<T, F>(&self, intent: &'static str, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut CaptureGraph, &Outlets) -> StudioResult<T> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let graph = Arc::clone(&self.graph);
        let outlets = self.outlets.clone();

        let accepted = self.queue.dispatch(move || {
            let mut graph = lock(&graph);
            let before = graph.mode();
            debug!(intent, "Running intent");

            let result = op(&mut graph, &outlets);
            match &result {
                Err(StudioError::Transition(e)) => {
                    outlets.emit(StudioEvent::TransitionFailed(e.clone()));
                }
                Err(e) => warn!(intent, error = %e, "Intent failed"),
                Ok(_) => {}
            }
            if graph.mode() != before {
                outlets.emit(StudioEvent::ModeChanged(graph.mode()));
            }
            outlets.publish(&graph);
            let _ = sender.send(result);
        });

        if !accepted {
            warn!(intent, "Session queue closed, intent dropped");
        }
        // A dropped job drops its sender, which resolves to QueueClosed
        Pending::new(receiver)
    }

    /// Attach the preview surface to this session
    pub fn set_session(&self, preview: Arc<dyn PreviewSurface>) {
        preview.attach(self.session_id);
        *lock(&self.outlets.preview) = Some(preview);
        debug!(session = ?self.session_id, "Preview attached");
    }

    /// Build the capture graph for `mode`
    ///
    /// `movie_preset` selects the format used whenever the graph enters movie
    /// mode; non-movie presets keep the configured resolution.
    pub fn integrate_session(
        &self,
        mode: CaptureMode,
        movie_preset: SessionPreset,
        delegate: Option<Arc<dyn ReadinessDelegate>>,
    ) -> Pending<GraphMode> {
        self.submit("integrate_session", move |graph, _| {
            Ok(graph.integrate(mode, movie_preset, delegate)?)
        })
    }

    pub fn start_session_running(&self) -> Pending<()> {
        self.submit("start_session_running", |graph, _| graph.start_running())
    }

    /// Stop running and tear the graph down
    pub fn stop_session_running(&self) -> Pending<()> {
        self.submit("stop_session_running", |graph, _| graph.stop_running())
    }

    /// Hold back queued intents; pairs with [`Self::resume_session_queue`]
    pub fn suspend_session_queue(&self) {
        self.queue.suspend();
    }

    pub fn resume_session_queue(&self) {
        self.queue.resume();
    }

    /// Check video authorization, prompting when undetermined
    ///
    /// While the prompt is open the session queue stays suspended, so intents
    /// issued meanwhile run only once the user answered.
    pub fn check_authorization(&self) -> AuthorizationStatus {
        let status = self.permissions.authorization_status(MediaType::Video);
        match status {
            AuthorizationStatus::Authorized => {}
            AuthorizationStatus::NotDetermined => {
                self.queue.suspend();
                let queue = Arc::downgrade(&self.queue);
                let outlets = self.outlets.clone();
                self.permissions.request_access(
                    MediaType::Video,
                    Box::new(move |granted| {
                        info!(granted, "Camera access answered");
                        if !granted {
                            // The queue is suspended, so no intent is reading the flag
                            if let Some(graph) = outlets.graph.upgrade() {
                                let mut graph = lock(&graph);
                                graph.set_setup(SessionSetupResult::NotAuthorized);
                                outlets.publish(&graph);
                            }
                        }
                        if let Some(queue) = queue.upgrade() {
                            queue.resume();
                        }
                    }),
                );
            }
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                warn!(?status, "Camera access not authorized");
                drop(self.submit("check_authorization", |graph, _| {
                    graph.set_setup(SessionSetupResult::NotAuthorized);
                    Ok(())
                }));
            }
        }
        status
    }

    /// Capture one photo; resolves with the request id once issued
    ///
    /// The saved photo (or the reason it was discarded) arrives later as an
    /// event.
    pub fn capture_photo(&self) -> Pending<RequestId> {
        self.submit("capture_photo", |graph, outlets| {
            graph.capture_photo(|request| outlets.photo_processor(request))
        })
    }

    /// Toggle movie recording
    pub fn capture_movie(&self) -> Pending<RecordingToggle> {
        self.submit("capture_movie", |graph, outlets| {
            let completion_outlets = outlets.clone();
            let toggle = graph.toggle_movie(move |path, outcome| {
                completion_outlets.movie_finished(path, outcome)
            })?;
            if let RecordingToggle::Started(path) = &toggle {
                outlets.emit(StudioEvent::RecordingStarted { path: path.clone() });
            }
            Ok(toggle)
        })
    }

    /// Switch between photo and movie capture
    pub fn change_capture(&self, mode: CaptureMode) -> Pending<GraphMode> {
        self.submit("change_capture", move |graph, _| Ok(graph.change_capture(mode)?))
    }

    /// Returns the factor the device settled on
    pub fn change_zoom(&self, zoom: ZoomFactor) -> Pending<f64> {
        self.submit("change_zoom", move |graph, _| graph.change_zoom(zoom))
    }

    /// Change recording quality; only valid in movie mode
    pub fn change_video_quality(
        &self,
        frame_rate: MovieFrameRate,
        resolution: MovieResolution,
    ) -> Pending<DeviceFormat> {
        self.submit("change_video_quality", move |graph, _| {
            graph.change_video_quality(frame_rate, resolution)
        })
    }

    /// Tap to focus; resolves to false when the device cannot focus on a point
    pub fn focus(&self, point: DevicePoint, monitor_subject_area_change: bool) -> Pending<bool> {
        self.submit("focus", move |graph, _| {
            graph.focus(
                point,
                FocusMode::AutoFocus,
                ExposureMode::AutoExpose,
                monitor_subject_area_change,
            )
        })
    }

    /// The scene changed under a tap-focused point; return to continuous modes
    pub fn subject_area_did_change(&self) -> Pending<bool> {
        self.submit("subject_area_did_change", |graph, _| {
            graph.focus(
                DevicePoint::center(),
                FocusMode::ContinuousAutoFocus,
                ExposureMode::ContinuousAutoExposure,
                false,
            )
        })
    }

    pub fn update_interface_orientation(&self, orientation: InterfaceOrientation) {
        self.orientation.set_interface(orientation);
    }

    pub fn update_device_orientation(&self, orientation: DeviceOrientation) {
        self.orientation.set_device(orientation);
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation.current()
    }

    pub fn status(&self) -> watch::Receiver<StudioStatus> {
        self.outlets.status.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<StudioEvent> {
        self.outlets.events.subscribe()
    }

    /// Recording indicator text, "MM:SS"
    pub fn elapsed_time(&self) -> watch::Receiver<String> {
        self.timer.subscribe()
    }

    /// Read the graph on the session queue
    ///
    /// Blocks while the queue is suspended.
    pub fn snapshot(&self) -> StudioResult<GraphSnapshot> {
        let graph = Arc::clone(&self.graph);
        self.queue
            .sync(move || lock(&graph).snapshot())
            .ok_or(StudioError::QueueClosed)
    }

    /// Wait for every intent issued so far
    pub fn flush(&self) {
        self.queue.sync(|| ());
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        self.queue.shutdown();
        debug!(session = ?self.session_id, "Studio dropped");
    }
}
