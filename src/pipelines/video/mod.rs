// SPDX-License-Identifier: MPL-2.0

//! Movie recording pipeline
//!
//! - [`recording`]: the idle/recording state and temporary file naming
//! - [`finalizer`]: terminal delegate that saves or discards the file and
//!   always cleans up
//! - [`timer`]: elapsed-time string for the recording indicator

pub mod finalizer;
pub mod recording;
pub mod timer;

pub use finalizer::{MovieCompletion, MovieFinalizer, MovieOutcome, SavedMovie};
pub use recording::{RecordingState, temporary_movie_path};
pub use timer::RecordingTimer;
