// SPDX-License-Identifier: MPL-2.0

//! Shari - tasting notes for restaurant dishes
//!
//! The core of the crate is a capture studio that serializes every change to
//! a live camera/microphone graph on one session queue, and hands finished
//! photos and recordings to the media library through one-shot delegates.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`studio`]: Session queue, capture graph, rotation and readiness
//! - [`backends`]: Camera, permission and background-task seams
//! - [`pipelines`]: Photo and movie completion pipelines
//! - [`library`]: Media library the captures are persisted to
//! - [`storage`]: Restaurants, dishes, settings and exports
//! - [`taxonomy`]: Taste descriptors
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use shari::backends::camera::{CameraBackendType, SessionPreset, get_backend};
//! use shari::library::DirectoryLibrary;
//! use shari::studio::{CaptureMode, Studio, StudioServices};
//! use std::sync::Arc;
//!
//! let backend = get_backend(CameraBackendType::Virtual);
//! let library = Arc::new(DirectoryLibrary::default_dirs());
//! let studio = Studio::new(StudioServices::new(backend, library));
//!
//! studio.integrate_session(CaptureMode::Photo, SessionPreset::Hd1920x1080, None);
//! studio.start_session_running();
//! let request = studio.capture_photo().wait();
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod library;
pub mod pipelines;
pub mod storage;
pub mod studio;
pub mod taxonomy;
pub mod utils;

pub use config::Config;
pub use errors::{StudioError, StudioResult};
pub use studio::{Studio, StudioEvent, StudioServices, StudioStatus};
