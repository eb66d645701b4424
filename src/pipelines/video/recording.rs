// SPDX-License-Identifier: GPL-3.0-only

//! Recording state machine

use super::finalizer::MovieFinalizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Extension of temporary movie files
pub const MOVIE_EXTENSION: &str = "mov";

/// Process-unique temporary path for a new recording
pub fn temporary_movie_path(temp_dir: &Path) -> PathBuf {
    temp_dir.join(format!("{}.{}", uuid::Uuid::new_v4(), MOVIE_EXTENSION))
}

/// Either recording or not; at most one recording per graph
#[derive(Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording {
        /// When recording started
        start_time: Instant,
        /// Temporary output file
        file_path: PathBuf,
        /// Terminal delegate handed to the backend
        finalizer: Arc<MovieFinalizer>,
    },
}

impl RecordingState {
    pub fn start(file_path: PathBuf, finalizer: Arc<MovieFinalizer>) -> Self {
        RecordingState::Recording {
            start_time: Instant::now(),
            file_path,
            finalizer,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording { .. })
    }

    pub fn file_path(&self) -> Option<&Path> {
        match self {
            RecordingState::Idle => None,
            RecordingState::Recording { file_path, .. } => Some(file_path),
        }
    }

    /// Whole seconds since recording started
    pub fn elapsed_duration(&self) -> u64 {
        match self {
            RecordingState::Idle => 0,
            RecordingState::Recording { start_time, .. } => start_time.elapsed().as_secs(),
        }
    }

    /// Stop recording (returns the previous state, leaves Idle)
    pub fn stop(&mut self) -> Self {
        std::mem::replace(self, RecordingState::Idle)
    }
}

impl std::fmt::Debug for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Recording {
                file_path,
                start_time,
                ..
            } => write!(
                f,
                "Recording {{ path: {}, elapsed: {:?} }}",
                file_path.display(),
                start_time.elapsed()
            ),
        }
    }
}
