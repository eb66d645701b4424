// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the capture studio against the virtual camera

use shari::backends::background::TrackedBackgroundTasks;
use shari::backends::camera::{
    AudioDevice, BackendResult, CameraBackend, CameraBackendType, CaptureDevice, CaptureRequest,
    DeviceFormat, DevicePoint, ExposureMode, FocusMode, MovieFrameRate, MovieResolution,
    PhotoCaptureDelegate, PhotoCodec, PreviewSurface, RecordingDelegate, RecordingFailure,
    RequestId, SessionId, SessionPreset, VirtualCamera, VirtualCameraOptions, ZoomFactor,
};
use shari::backends::permissions::{AuthorizationStatus, MediaType, StaticPermissions};
use shari::errors::{
    CaptureError, DeviceError, PermissionError, RecordingError, StudioError, TransitionStep,
};
use shari::library::DirectoryLibrary;
use shari::studio::{
    CaptureMode, CaptureReadiness, DeviceOrientation, GraphMode, InputKind, InterfaceOrientation,
    OutputKind, RecordingToggle, SessionSetupResult, Studio, StudioEvent, StudioServices,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::broadcast;

struct Fixture {
    studio: Studio,
    camera: Arc<VirtualCamera>,
    tasks: Arc<TrackedBackgroundTasks>,
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self::with(
            VirtualCameraOptions::default(),
            Arc::new(StaticPermissions::granted()),
        )
    }

    fn with(options: VirtualCameraOptions, permissions: Arc<StaticPermissions>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();

        let camera = Arc::new(VirtualCamera::new(options));
        let tasks = Arc::new(TrackedBackgroundTasks::new());
        let library = Arc::new(DirectoryLibrary::new(
            dir.path().join("photos"),
            dir.path().join("videos"),
        ));
        let services = StudioServices::new(camera.clone(), library)
            .with_permissions(permissions)
            .with_background_tasks(tasks.clone())
            .with_temp_dir(dir.path().join("tmp"));

        Self {
            studio: Studio::new(services),
            camera,
            tasks,
            dir,
        }
    }

    /// Wait until backend callbacks ran and their follow-up jobs drained
    fn settle(&self) {
        self.camera.wait_idle();
        self.studio.flush();
    }

    fn photo_running(&self) {
        self.studio
            .integrate_session(CaptureMode::Photo, SessionPreset::Hd1920x1080, None)
            .wait()
            .unwrap();
        self.studio.start_session_running().wait().unwrap();
    }

    fn movie_running(&self) {
        self.studio
            .integrate_session(CaptureMode::Movie, SessionPreset::Hd1920x1080, None)
            .wait()
            .unwrap();
        self.studio.start_session_running().wait().unwrap();
    }
}

fn drain(events: &mut broadcast::Receiver<StudioEvent>) -> Vec<StudioEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn files_in(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[derive(Default)]
struct RecordingPreview {
    angles: Mutex<Vec<f64>>,
    flashes: Mutex<u32>,
    session: Mutex<Option<SessionId>>,
}

impl PreviewSurface for RecordingPreview {
    fn attach(&self, session: SessionId) {
        *self.session.lock().unwrap() = Some(session);
    }

    fn set_video_rotation_angle(&self, angle: f64) {
        self.angles.lock().unwrap().push(angle);
    }

    fn flash(&self) {
        *self.flashes.lock().unwrap() += 1;
    }
}

#[test]
fn test_intents_run_in_submission_order() {
    let fixture = Fixture::new();
    fixture.photo_running();

    let pending: Vec<_> = (0..5).map(|_| fixture.studio.capture_photo()).collect();
    let ids: Vec<RequestId> = pending.into_iter().map(|p| p.wait().unwrap()).collect();
    assert_eq!(ids, (1..=5).map(RequestId).collect::<Vec<_>>());

    let issued: Vec<RequestId> = fixture
        .camera
        .captured_photos()
        .iter()
        .map(|photo| photo.request.id)
        .collect();
    assert_eq!(issued, ids);
    fixture.settle();
}

#[test]
fn test_zoom_intents_apply_last_one_wins() {
    let fixture = Fixture::new();
    fixture.photo_running();

    let first = fixture.studio.change_zoom(ZoomFactor::Two);
    let second = fixture.studio.change_zoom(ZoomFactor::OneAndHalf);
    assert_eq!(first.wait(), Ok(2.0));
    assert_eq!(second.wait(), Ok(1.5));
    assert_eq!(fixture.camera.device_state().zoom_factor, 1.5);
    assert!(!fixture.camera.device_state().locked);
}

#[test]
fn test_zoom_without_device_is_rejected() {
    let fixture = Fixture::new();
    assert_eq!(
        fixture.studio.change_zoom(ZoomFactor::Two).wait(),
        Err(StudioError::Device(DeviceError::NoDevice))
    );
}

#[test]
fn test_suspended_queue_preserves_order() {
    let fixture = Fixture::new();
    let mut events = fixture.studio.events();
    let status = fixture.studio.status();

    fixture.studio.suspend_session_queue();
    let a = fixture
        .studio
        .integrate_session(CaptureMode::Photo, SessionPreset::Hd1920x1080, None);
    let b = fixture.studio.change_capture(CaptureMode::Movie);
    let c = fixture.studio.change_capture(CaptureMode::Photo);

    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(status.borrow().mode, GraphMode::Uninitialized);
    assert!(drain(&mut events).is_empty());

    fixture.studio.resume_session_queue();
    assert_eq!(a.wait(), Ok(GraphMode::Photo));
    assert_eq!(b.wait(), Ok(GraphMode::Movie));
    assert_eq!(c.wait(), Ok(GraphMode::Photo));

    let modes: Vec<GraphMode> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            StudioEvent::ModeChanged(mode) => Some(mode),
            _ => None,
        })
        .collect();
    assert_eq!(modes, vec![GraphMode::Photo, GraphMode::Movie, GraphMode::Photo]);
}

#[test]
fn test_photo_saved_and_in_flight_released() {
    let fixture = Fixture::new();
    let preview = Arc::new(RecordingPreview::default());
    fixture.studio.set_session(preview.clone());
    let mut events = fixture.studio.events();
    fixture.photo_running();

    let id = fixture.studio.capture_photo().wait().unwrap();
    fixture.settle();

    let snapshot = fixture.studio.snapshot().unwrap();
    assert!(snapshot.in_flight.is_empty());
    assert_eq!(snapshot.completed_requests, 1);
    assert_eq!(snapshot.readiness, Some(CaptureReadiness::Ready));
    assert_eq!(*preview.flashes.lock().unwrap(), 1);
    assert_eq!(*preview.session.lock().unwrap(), Some(fixture.studio.session_id()));

    let saved = drain(&mut events)
        .into_iter()
        .find_map(|event| match event {
            StudioEvent::PhotoSaved(photo) => Some(photo),
            _ => None,
        })
        .expect("photo saved event");
    assert_eq!(saved.request, id);
    assert!(saved.location.exists());
    assert!(saved.thumbnail.is_some());
    assert_eq!(fixture.studio.status().borrow().in_flight, 0);
}

#[test]
fn test_failed_photo_still_releases_in_flight_once() {
    let fixture = Fixture::new();
    let mut events = fixture.studio.events();
    fixture.photo_running();

    fixture.camera.fail_next_photo("sensor glitch");
    let failed = fixture.studio.capture_photo().wait().unwrap();
    fixture.settle();
    fixture.camera.empty_next_photo();
    let empty = fixture.studio.capture_photo().wait().unwrap();
    fixture.settle();

    let snapshot = fixture.studio.snapshot().unwrap();
    assert!(snapshot.in_flight.is_empty());
    assert_eq!(snapshot.completed_requests, 2);

    let discarded: Vec<(RequestId, StudioError)> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            StudioEvent::PhotoDiscarded { request, reason } => Some((request, reason)),
            StudioEvent::PhotoSaved(photo) => panic!("unexpected save of {}", photo.request),
            _ => None,
        })
        .collect();
    assert_eq!(discarded.len(), 2);
    assert_eq!(discarded[0].0, failed);
    assert!(matches!(
        &discarded[0].1,
        StudioError::Capture(CaptureError::Failed(message)) if message.contains("sensor glitch")
    ));
    assert_eq!(discarded[1].0, empty);
    assert_eq!(files_in(&fixture.dir.path().join("photos")), 0);
}

#[test]
fn test_photo_discarded_when_library_refuses() {
    let dir = tempfile::tempdir().unwrap();
    let camera = Arc::new(VirtualCamera::new(VirtualCameraOptions::default()));
    let library = Arc::new(DirectoryLibrary::new(
        dir.path().join("photos"),
        dir.path().join("videos"),
    ));
    library.set_authorization(AuthorizationStatus::Denied);
    let studio = Studio::new(StudioServices::new(camera.clone(), library));
    let mut events = studio.events();

    studio
        .integrate_session(CaptureMode::Photo, SessionPreset::Hd1920x1080, None)
        .wait()
        .unwrap();
    studio.capture_photo().wait().unwrap();
    camera.wait_idle();
    studio.flush();

    assert!(drain(&mut events).iter().any(|event| matches!(
        event,
        StudioEvent::PhotoDiscarded {
            reason: StudioError::Permission(PermissionError::LibraryDenied),
            ..
        }
    )));
    assert_eq!(studio.snapshot().unwrap().in_flight.len(), 0);
}

#[test]
fn test_photo_without_device_has_no_settings() {
    let options = VirtualCameraOptions {
        has_camera: false,
        ..VirtualCameraOptions::default()
    };
    let fixture = Fixture::with(options, Arc::new(StaticPermissions::granted()));

    let integrated = fixture
        .studio
        .integrate_session(CaptureMode::Photo, SessionPreset::Hd1920x1080, None)
        .wait();
    assert!(matches!(
        integrated,
        Err(StudioError::Transition(ref e)) if e.step == TransitionStep::FindCamera
    ));

    assert_eq!(
        fixture.studio.capture_photo().wait(),
        Err(StudioError::Capture(CaptureError::NoPhotoSettings))
    );
    let snapshot = fixture.studio.snapshot().unwrap();
    assert!(snapshot.in_flight.is_empty());
    assert!(fixture.camera.captured_photos().is_empty());
}

#[test]
fn test_capture_mode_round_trip_leaves_photo_graph() {
    let fixture = Fixture::new();
    fixture.photo_running();

    assert_eq!(
        fixture.studio.change_capture(CaptureMode::Movie).wait(),
        Ok(GraphMode::Movie)
    );
    let movie = fixture.studio.snapshot().unwrap();
    assert_eq!(movie.inputs, vec![InputKind::Video, InputKind::Audio]);
    assert!(!movie.outputs.contains(&OutputKind::Photo));
    assert!(movie.outputs.contains(&OutputKind::MovieFile));
    assert!(movie.photo_connection.is_none());
    assert!(movie.movie_connection.is_some());
    assert_eq!(movie.audio_device.as_deref(), Some("Virtual Microphone"));
    assert_eq!(
        fixture.camera.device_state().active_format.dimensions,
        MovieResolution::Hd.dimensions()
    );

    assert_eq!(
        fixture.studio.change_capture(CaptureMode::Photo).wait(),
        Ok(GraphMode::Photo)
    );
    let photo = fixture.studio.snapshot().unwrap();
    assert_eq!(photo.outputs, vec![OutputKind::Photo]);
    assert_eq!(photo.inputs, vec![InputKind::Video]);
    assert_eq!(photo.preset, SessionPreset::Photo);
    assert!(photo.has_photo_settings);
    assert!(photo.audio_device.is_none());
    assert!(photo.running);
}

#[test]
fn test_change_capture_to_current_mode_is_noop() {
    let fixture = Fixture::new();
    fixture.photo_running();
    let commits = fixture.studio.snapshot().unwrap().commits;

    assert_eq!(
        fixture.studio.change_capture(CaptureMode::Photo).wait(),
        Ok(GraphMode::Photo)
    );
    assert_eq!(fixture.studio.snapshot().unwrap().commits, commits);
}

#[test]
fn test_missing_microphone_fails_then_reissue_completes() {
    let permissions = Arc::new(StaticPermissions::new(
        AuthorizationStatus::Authorized,
        AuthorizationStatus::Denied,
    ));
    let fixture = Fixture::with(VirtualCameraOptions::default(), permissions.clone());
    let mut events = fixture.studio.events();
    fixture.photo_running();

    let failed = fixture.studio.change_capture(CaptureMode::Movie).wait();
    let Err(StudioError::Transition(error)) = failed else {
        panic!("expected a transition error, got {:?}", failed);
    };
    assert_eq!(error.step, TransitionStep::FindMicrophone);
    assert_eq!(error.from, GraphMode::Photo);
    assert_eq!(error.to, GraphMode::Movie);

    let snapshot = fixture.studio.snapshot().unwrap();
    assert_eq!(snapshot.mode, GraphMode::Photo);
    assert_eq!(snapshot.setup, SessionSetupResult::ConfigurationFailed);
    assert!(!snapshot.outputs.contains(&OutputKind::MovieFile));
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, StudioEvent::TransitionFailed(e) if *e == error)));

    permissions.answer(MediaType::Audio, true);
    assert_eq!(
        fixture.studio.change_capture(CaptureMode::Movie).wait(),
        Ok(GraphMode::Movie)
    );
    let snapshot = fixture.studio.snapshot().unwrap();
    assert_eq!(snapshot.setup, SessionSetupResult::Success);
    assert!(snapshot.outputs.contains(&OutputKind::AudioData));
    assert!(snapshot.outputs.contains(&OutputKind::MovieFile));
}

#[test]
fn test_unmatched_quality_keeps_active_format() {
    let options = VirtualCameraOptions {
        formats: vec![
            DeviceFormat::new(1920, 1080, 1.0, 30.0),
            DeviceFormat::new(3840, 2160, 1.0, 60.0),
        ],
        active_format_index: 0,
        ..VirtualCameraOptions::default()
    };
    let fixture = Fixture::with(options, Arc::new(StaticPermissions::granted()));
    fixture.movie_running();
    let before = fixture.camera.device_state();

    assert_eq!(
        fixture
            .studio
            .change_video_quality(MovieFrameRate::Sixty, MovieResolution::Hd)
            .wait(),
        Err(StudioError::Device(DeviceError::FormatUnavailable {
            resolution: "1080p".to_string(),
            frame_rate: 60,
        }))
    );
    let after = fixture.camera.device_state();
    assert_eq!(after.active_format, before.active_format);
    assert_eq!(after.lock_count, before.lock_count);

    let format = fixture
        .studio
        .change_video_quality(MovieFrameRate::Sixty, MovieResolution::Hd4k)
        .wait()
        .unwrap();
    assert_eq!(format.dimensions, MovieResolution::Hd4k.dimensions());
    let state = fixture.camera.device_state();
    assert_eq!(state.active_format, format);
    let duration = MovieFrameRate::Sixty.framerate().frame_duration();
    assert_eq!(state.frame_duration_range, Some((duration, duration)));
    assert_eq!(
        fixture.studio.snapshot().unwrap().preset,
        SessionPreset::InputPriority
    );
}

#[test]
fn test_video_quality_requires_movie_mode() {
    let fixture = Fixture::new();
    fixture.photo_running();
    assert_eq!(
        fixture
            .studio
            .change_video_quality(MovieFrameRate::Thirty, MovieResolution::Hd)
            .wait(),
        Err(StudioError::Device(DeviceError::WrongMode {
            required: GraphMode::Movie,
            current: GraphMode::Photo,
        }))
    );
}

#[test]
fn test_video_quality_survives_photo_round_trip() {
    let fixture = Fixture::new();
    fixture.movie_running();
    let chosen = fixture
        .studio
        .change_video_quality(MovieFrameRate::Sixty, MovieResolution::Hd)
        .wait()
        .unwrap();
    let sixty = MovieFrameRate::Sixty.framerate();
    let duration = sixty.frame_duration();

    fixture
        .studio
        .change_capture(CaptureMode::Photo)
        .wait()
        .unwrap();
    let photo = fixture.camera.device_state();
    assert_ne!(photo.active_format, chosen);
    assert_eq!(photo.frame_duration_range, None);

    fixture
        .studio
        .change_capture(CaptureMode::Movie)
        .wait()
        .unwrap();
    let movie = fixture.camera.device_state();
    assert_eq!(movie.active_format, chosen);
    assert_eq!(
        movie.active_format.dimensions,
        MovieResolution::Hd.dimensions()
    );
    assert!(movie.active_format.supports(sixty));
    assert_eq!(movie.frame_duration_range, Some((duration, duration)));
    assert!(!movie.locked);
    assert_eq!(
        fixture.studio.snapshot().unwrap().preset,
        SessionPreset::InputPriority
    );
}

#[test]
fn test_rejected_format_is_reported_as_such() {
    let fixture = Fixture::new();
    fixture.movie_running();
    let before = fixture.camera.device_state();
    fixture.camera.set_format_rejects(true);

    let result = fixture
        .studio
        .change_video_quality(MovieFrameRate::Sixty, MovieResolution::Hd)
        .wait();
    assert!(matches!(
        result,
        Err(StudioError::Device(DeviceError::FormatRejected(_)))
    ));
    let after = fixture.camera.device_state();
    assert_eq!(after.active_format, before.active_format);
    assert_eq!(after.frame_duration_range, before.frame_duration_range);
    assert!(!after.locked);
    assert_eq!(after.lock_count, after.unlock_count);
}

#[test]
fn test_recording_finalized_once_and_token_released() {
    let fixture = Fixture::new();
    let mut events = fixture.studio.events();
    fixture.movie_running();

    let RecordingToggle::Started(temp) = fixture.studio.capture_movie().wait().unwrap() else {
        panic!("recording did not start");
    };
    assert!(temp.starts_with(fixture.dir.path().join("tmp")));
    assert_eq!(fixture.tasks.active_count(), 1);
    assert!(fixture.studio.status().borrow().recording);

    std::thread::sleep(std::time::Duration::from_millis(30));
    assert_eq!(
        fixture.studio.capture_movie().wait(),
        Ok(RecordingToggle::Stopped(temp.clone()))
    );
    fixture.settle();

    let events = drain(&mut events);
    let saved: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            StudioEvent::RecordingSaved(movie) => Some(movie.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].location.exists());
    assert!(saved[0].location.starts_with(fixture.dir.path().join("videos")));
    assert!(events
        .iter()
        .any(|event| matches!(event, StudioEvent::RecordingStarted { path } if *path == temp)));

    assert!(!temp.exists());
    assert_eq!(fixture.tasks.active_count(), 0);
    assert_eq!(fixture.tasks.ended().len(), 1);
    assert!(!fixture.studio.status().borrow().recording);
}

#[test]
fn test_unusable_recording_is_lost_and_cleaned_up() {
    let fixture = Fixture::new();
    let mut events = fixture.studio.events();
    fixture.movie_running();

    let RecordingToggle::Started(temp) = fixture.studio.capture_movie().wait().unwrap() else {
        panic!("recording did not start");
    };
    fixture.camera.fail_next_recording(RecordingFailure {
        message: "disk full".to_string(),
        recorded_successfully: false,
    });
    fixture.studio.capture_movie().wait().unwrap();
    fixture.settle();

    assert!(drain(&mut events).iter().any(|event| matches!(
        event,
        StudioEvent::RecordingLost {
            reason: StudioError::Recording(RecordingError::Finished { .. })
        }
    )));
    assert!(!temp.exists());
    assert_eq!(files_in(&fixture.dir.path().join("videos")), 0);
    assert_eq!(fixture.tasks.active_count(), 0);
    assert_eq!(fixture.tasks.ended().len(), 1);
}

#[test]
fn test_benign_recording_error_still_saves() {
    let fixture = Fixture::new();
    let mut events = fixture.studio.events();
    fixture.movie_running();

    fixture.studio.capture_movie().wait().unwrap();
    fixture.camera.fail_next_recording(RecordingFailure {
        message: "maximum duration reached".to_string(),
        recorded_successfully: true,
    });
    fixture.studio.capture_movie().wait().unwrap();
    fixture.settle();

    let saved = drain(&mut events)
        .into_iter()
        .find_map(|event| match event {
            StudioEvent::RecordingSaved(movie) => Some(movie),
            _ => None,
        })
        .expect("recording saved");
    assert_eq!(saved.warning.as_deref(), Some("maximum duration reached"));
}

#[test]
fn test_recording_ended_by_backend_returns_to_idle() {
    let fixture = Fixture::new();
    let mut events = fixture.studio.events();
    fixture.movie_running();
    fixture.camera.limit_next_recording(2);

    let RecordingToggle::Started(temp) = fixture.studio.capture_movie().wait().unwrap() else {
        panic!("recording did not start");
    };
    fixture.settle();

    assert!(!fixture.camera.is_recording());
    assert!(!fixture.studio.status().borrow().recording);
    assert_eq!(fixture.studio.snapshot().unwrap().recording, None);
    assert_eq!(*fixture.studio.elapsed_time().borrow(), "00:00");
    let saved = drain(&mut events)
        .into_iter()
        .find_map(|event| match event {
            StudioEvent::RecordingSaved(movie) => Some(movie),
            _ => None,
        })
        .expect("recording saved");
    assert_eq!(
        saved.warning.as_deref(),
        Some("Maximum recording duration reached")
    );
    assert!(!temp.exists());
    assert_eq!(fixture.tasks.active_count(), 0);

    // Idle again: mode changes are allowed and the next toggle starts anew
    assert_eq!(
        fixture.studio.change_capture(CaptureMode::Photo).wait(),
        Ok(GraphMode::Photo)
    );
    assert_eq!(
        fixture.studio.change_capture(CaptureMode::Movie).wait(),
        Ok(GraphMode::Movie)
    );
    let toggle = fixture.studio.capture_movie().wait().unwrap();
    assert!(matches!(toggle, RecordingToggle::Started(path) if path != temp));
    fixture.studio.capture_movie().wait().unwrap();
    fixture.settle();
}

/// Finishes every recording from inside `start_recording`
struct EndsOnStart(Arc<VirtualCamera>);

impl CameraBackend for EndsOnStart {
    fn backend_type(&self) -> CameraBackendType {
        self.0.backend_type()
    }

    fn find_camera(&self) -> Option<Box<dyn CaptureDevice>> {
        self.0.find_camera()
    }

    fn find_microphone(&self) -> Option<AudioDevice> {
        self.0.find_microphone()
    }

    fn available_photo_codecs(&self) -> Vec<PhotoCodec> {
        self.0.available_photo_codecs()
    }

    fn start_running(&self) {
        self.0.start_running()
    }

    fn stop_running(&self) {
        self.0.stop_running()
    }

    fn is_running(&self) -> bool {
        self.0.is_running()
    }

    fn capture_photo(
        &self,
        request: &CaptureRequest,
        rotation_angle: f64,
        delegate: Arc<dyn PhotoCaptureDelegate>,
    ) -> BackendResult<()> {
        self.0.capture_photo(request, rotation_angle, delegate)
    }

    fn start_recording(
        &self,
        path: &std::path::Path,
        _rotation_angle: f64,
        _stabilized: bool,
        delegate: Arc<dyn RecordingDelegate>,
    ) -> BackendResult<()> {
        std::fs::write(path, b"frames")?;
        delegate.did_finish_recording(
            path,
            Some(RecordingFailure {
                message: "max duration".to_string(),
                recorded_successfully: true,
            }),
        );
        Ok(())
    }

    fn stop_recording(&self) -> BackendResult<()> {
        self.0.stop_recording()
    }
}

#[test]
fn test_recording_finished_during_start_returns_to_idle() {
    let dir = tempfile::tempdir().unwrap();
    let camera = Arc::new(VirtualCamera::new(VirtualCameraOptions::default()));
    let library = Arc::new(DirectoryLibrary::new(
        dir.path().join("photos"),
        dir.path().join("videos"),
    ));
    let studio = Studio::new(
        StudioServices::new(Arc::new(EndsOnStart(camera.clone())), library)
            .with_temp_dir(dir.path().to_path_buf()),
    );
    let status = studio.status();

    studio
        .integrate_session(CaptureMode::Movie, SessionPreset::Hd1920x1080, None)
        .wait()
        .unwrap();
    studio.start_session_running().wait().unwrap();
    assert!(matches!(
        studio.capture_movie().wait(),
        Ok(RecordingToggle::Started(_))
    ));
    studio.flush();

    assert!(!status.borrow().recording);
    assert_eq!(
        studio.change_capture(CaptureMode::Photo).wait(),
        Ok(GraphMode::Photo)
    );
    assert_eq!(files_in(&dir.path().join("videos")), 1);
}

#[test]
fn test_recording_start_failure_releases_token() {
    let fixture = Fixture::new();
    fixture.movie_running();
    fixture.camera.set_start_recording_fails(true);

    let result = fixture.studio.capture_movie().wait();
    assert!(matches!(
        result,
        Err(StudioError::Recording(RecordingError::StartFailed(_)))
    ));
    assert_eq!(fixture.tasks.active_count(), 0);
    assert_eq!(fixture.tasks.ended().len(), 1);
    assert_eq!(files_in(&fixture.dir.path().join("tmp")), 0);
    assert!(!fixture.studio.status().borrow().recording);
}

#[test]
fn test_recording_needs_movie_mode() {
    let fixture = Fixture::new();
    fixture.photo_running();
    assert_eq!(
        fixture.studio.capture_movie().wait(),
        Err(StudioError::Recording(RecordingError::NoMovieOutput))
    );
    assert_eq!(fixture.tasks.active_count(), 0);
}

#[test]
fn test_mode_change_refused_while_recording() {
    let fixture = Fixture::new();
    fixture.movie_running();
    fixture.studio.capture_movie().wait().unwrap();

    let result = fixture.studio.change_capture(CaptureMode::Photo).wait();
    assert!(matches!(
        result,
        Err(StudioError::Transition(ref e)) if e.step == TransitionStep::RecordingInProgress
    ));
    assert_eq!(fixture.studio.snapshot().unwrap().mode, GraphMode::Movie);

    fixture.studio.capture_movie().wait().unwrap();
    fixture.settle();
}

#[test]
fn test_denied_camera_refuses_start() {
    let permissions = Arc::new(StaticPermissions::new(
        AuthorizationStatus::Denied,
        AuthorizationStatus::Authorized,
    ));
    let fixture = Fixture::with(VirtualCameraOptions::default(), permissions);

    assert_eq!(fixture.studio.check_authorization(), AuthorizationStatus::Denied);
    fixture
        .studio
        .integrate_session(CaptureMode::Photo, SessionPreset::Hd1920x1080, None)
        .wait()
        .unwrap();
    assert_eq!(
        fixture.studio.start_session_running().wait(),
        Err(StudioError::Permission(PermissionError::Denied(MediaType::Video)))
    );
    assert_eq!(fixture.camera.start_count(), 0);
    assert_eq!(
        fixture.studio.status().borrow().setup,
        SessionSetupResult::NotAuthorized
    );
}

#[test]
fn test_prompt_holds_intents_until_answered() {
    let permissions = Arc::new(StaticPermissions::new(
        AuthorizationStatus::NotDetermined,
        AuthorizationStatus::Authorized,
    ));
    let fixture = Fixture::with(VirtualCameraOptions::default(), permissions.clone());
    let status = fixture.studio.status();

    assert_eq!(
        fixture.studio.check_authorization(),
        AuthorizationStatus::NotDetermined
    );
    let integrated = fixture
        .studio
        .integrate_session(CaptureMode::Photo, SessionPreset::Hd1920x1080, None);
    let started = fixture.studio.start_session_running();

    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(permissions.pending_prompts(), 1);
    assert_eq!(status.borrow().mode, GraphMode::Uninitialized);

    permissions.answer(MediaType::Video, true);
    assert_eq!(integrated.wait(), Ok(GraphMode::Photo));
    assert_eq!(started.wait(), Ok(()));
    assert_eq!(fixture.camera.start_count(), 1);
}

#[test]
fn test_prompt_denial_marks_not_authorized() {
    let permissions = Arc::new(StaticPermissions::new(
        AuthorizationStatus::NotDetermined,
        AuthorizationStatus::Authorized,
    ));
    let fixture = Fixture::with(VirtualCameraOptions::default(), permissions.clone());

    fixture.studio.check_authorization();
    let started = fixture.studio.start_session_running();
    permissions.answer(MediaType::Video, false);

    assert_eq!(
        started.wait(),
        Err(StudioError::Permission(PermissionError::Denied(MediaType::Video)))
    );
    assert_eq!(fixture.camera.start_count(), 0);
}

#[test]
fn test_capture_angles_follow_orientation() {
    let fixture = Fixture::new();
    let preview = Arc::new(RecordingPreview::default());
    fixture.studio.set_session(preview.clone());
    fixture.photo_running();

    // Sensor mounted at 90 degrees, portrait
    assert_eq!(fixture.studio.snapshot().unwrap().preview_angle, Some(90.0));

    fixture
        .studio
        .update_interface_orientation(InterfaceOrientation::LandscapeRight);
    fixture.studio.flush();
    assert_eq!(fixture.studio.snapshot().unwrap().preview_angle, Some(180.0));
    assert_eq!(preview.angles.lock().unwrap().last(), Some(&180.0));

    fixture
        .studio
        .update_device_orientation(DeviceOrientation::LandscapeLeft);
    fixture.studio.capture_photo().wait().unwrap();
    fixture.settle();

    let photos = fixture.camera.captured_photos();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].rotation_angle, 180.0);
    let connection = fixture.studio.snapshot().unwrap().photo_connection.unwrap();
    assert_eq!(connection.video_rotation_angle, 180.0);
}

#[test]
fn test_focus_and_subject_area_change() {
    let fixture = Fixture::new();
    fixture.photo_running();

    let point = DevicePoint::new(0.2, 0.7);
    assert_eq!(fixture.studio.focus(point, true).wait(), Ok(true));
    let state = fixture.camera.device_state();
    assert_eq!(state.focus_mode, FocusMode::AutoFocus);
    assert_eq!(state.exposure_mode, ExposureMode::AutoExpose);
    assert_eq!(state.focus_point, Some(point));
    assert!(state.subject_area_change_monitoring);

    assert_eq!(fixture.studio.subject_area_did_change().wait(), Ok(true));
    let state = fixture.camera.device_state();
    assert_eq!(state.focus_mode, FocusMode::ContinuousAutoFocus);
    assert_eq!(state.exposure_mode, ExposureMode::ContinuousAutoExposure);
    assert_eq!(state.focus_point, Some(DevicePoint::center()));
    assert!(!state.subject_area_change_monitoring);
}

#[test]
fn test_focus_without_point_of_interest_support() {
    let options = VirtualCameraOptions {
        point_of_interest_supported: false,
        ..VirtualCameraOptions::default()
    };
    let fixture = Fixture::with(options, Arc::new(StaticPermissions::granted()));
    fixture.photo_running();
    assert_eq!(
        fixture.studio.focus(DevicePoint::center(), true).wait(),
        Ok(false)
    );
}

#[test]
fn test_lock_failure_leaves_device_untouched() {
    let fixture = Fixture::new();
    fixture.photo_running();
    fixture.camera.set_lock_fails(true);

    assert!(matches!(
        fixture.studio.change_zoom(ZoomFactor::Two).wait(),
        Err(StudioError::Device(DeviceError::LockFailed(_)))
    ));
    assert_eq!(fixture.camera.device_state().zoom_factor, 1.0);
}

#[test]
fn test_stop_tears_graph_down() {
    let fixture = Fixture::new();
    fixture.movie_running();
    fixture.studio.capture_movie().wait().unwrap();

    fixture.studio.stop_session_running().wait().unwrap();
    fixture.settle();

    let snapshot = fixture.studio.snapshot().unwrap();
    assert_eq!(snapshot.mode, GraphMode::Uninitialized);
    assert!(snapshot.inputs.is_empty());
    assert!(snapshot.outputs.is_empty());
    assert!(!snapshot.running);
    assert!(!fixture.camera.is_recording());
    assert_eq!(fixture.camera.stop_count(), 1);
    assert_eq!(fixture.tasks.active_count(), 0);
}

#[test]
fn test_intents_after_drop_of_queue_resolve_closed() {
    let fixture = Fixture::new();
    let camera: Arc<dyn CameraBackend> = fixture.camera.clone();
    let studio = Studio::new(StudioServices::new(
        camera,
        Arc::new(DirectoryLibrary::new(
            fixture.dir.path().join("photos"),
            fixture.dir.path().join("videos"),
        )),
    ));
    studio.suspend_session_queue();
    let pending = studio.capture_photo();
    drop(studio);
    assert_eq!(pending.wait(), Err(StudioError::QueueClosed));
}

#[tokio::test]
async fn test_pending_outcome_from_async_context() {
    let fixture = Fixture::new();
    let mode = fixture
        .studio
        .integrate_session(CaptureMode::Photo, SessionPreset::Hd1920x1080, None)
        .outcome()
        .await;
    assert_eq!(mode, Ok(GraphMode::Photo));
}
