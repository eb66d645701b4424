// SPDX-License-Identifier: GPL-3.0-only

//! Movie recording completion
//!
//! The backend reports the end of a recording once, with the output path and
//! an optional error. The finalizer decides whether the file is usable, moves
//! it into the media library, and then always cleans up: the temporary file is
//! deleted if still present and the background-execution token is released.

use crate::backends::background::BackgroundTask;
use crate::backends::camera::{RecordingDelegate, RecordingFailure};
use crate::errors::{PermissionError, RecordingError, StudioError};
use crate::library::MediaLibrary;
use crate::utils::lock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// A recording that reached the media library
#[derive(Debug, Clone, PartialEq)]
pub struct SavedMovie {
    pub location: PathBuf,
    /// The backend reported a benign error alongside the file
    pub warning: Option<String>,
}

pub type MovieOutcome = Result<SavedMovie, StudioError>;

/// Terminal callback of a finalizer, called exactly once
pub type MovieCompletion = Box<dyn FnOnce(MovieOutcome) + Send>;

/// Delegate for exactly one recording
pub struct MovieFinalizer {
    temp_path: PathBuf,
    library: Arc<dyn MediaLibrary>,
    background_task: Mutex<Option<BackgroundTask>>,
    finished: AtomicBool,
    completion: Mutex<Option<MovieCompletion>>,
}

impl MovieFinalizer {
    pub fn new(
        temp_path: PathBuf,
        library: Arc<dyn MediaLibrary>,
        background_task: BackgroundTask,
        completion: impl FnOnce(MovieOutcome) + Send + 'static,
    ) -> Self {
        Self {
            temp_path,
            library,
            background_task: Mutex::new(Some(background_task)),
            finished: AtomicBool::new(false),
            completion: Mutex::new(Some(Box::new(completion))),
        }
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Run finalization; later calls are ignored
    pub fn finish(&self, output: &Path, error: Option<RecordingFailure>) {
        if self.finished.swap(true, Ordering::SeqCst) {
            warn!(path = %output.display(), "Recording already finalized");
            return;
        }

        // The usable-file flag decides, not the presence of an error
        let (success, warning) = match error {
            None => (true, None),
            Some(failure) => {
                warn!(
                    error = %failure.message,
                    recorded_successfully = failure.recorded_successfully,
                    "Movie file finishing error"
                );
                (failure.recorded_successfully, Some(failure.message))
            }
        };

        let outcome = if success {
            self.persist(output, warning)
        } else {
            Err(RecordingError::Finished {
                message: warning.unwrap_or_default(),
                recorded_successfully: false,
            }
            .into())
        };

        if let Err(e) = &outcome {
            error!(path = %output.display(), error = %e, "Recording lost");
        }

        self.cleanup(output);

        if let Some(completion) = lock(&self.completion).take() {
            completion(outcome);
        }
    }

    fn persist(&self, output: &Path, warning: Option<String>) -> MovieOutcome {
        let status = self.library.request_authorization();
        if !status.is_authorized() {
            warn!(?status, "Photo library access denied, movie not saved");
            return Err(PermissionError::LibraryDenied.into());
        }

        let location = self.library.move_movie(output).map_err(|e| {
            RecordingError::MoveFailed {
                path: output.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        info!(path = %location.display(), "Movie saved");
        Ok(SavedMovie { location, warning })
    }

    fn cleanup(&self, output: &Path) {
        for path in [output, self.temp_path.as_path()] {
            if path.exists() {
                match std::fs::remove_file(path) {
                    Ok(()) => debug!(path = %path.display(), "Removed temporary movie file"),
                    Err(e) => warn!(path = %path.display(), error = %e, "Could not remove file"),
                }
            }
        }

        // Dropping the handle ends the task; invalid grants end nothing
        drop(lock(&self.background_task).take());
    }
}

impl RecordingDelegate for MovieFinalizer {
    fn did_finish_recording(&self, output: &Path, error: Option<RecordingFailure>) {
        self.finish(output, error);
    }
}
