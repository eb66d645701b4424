// SPDX-License-Identifier: MPL-2.0

//! Completion pipelines for photo and movie capture
//!
//! The backend delivers results on its own threads. These pipelines turn
//! those callbacks into library writes and a single terminal outcome per
//! request, without touching the capture graph directly.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────────┐     ┌──────────────┐
//! │ Photo output │ ──▶ │ PhotoCaptureProcessor  │ ──▶ │ MediaLibrary │
//! │  callbacks   │     │  - store bytes         │     │  (photo)     │
//! │              │     │  - authorize + save    │     │              │
//! └──────────────┘     └────────────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌────────────────────────┐     ┌──────────────┐
//! │ Movie output │ ──▶ │    MovieFinalizer      │ ──▶ │ MediaLibrary │
//! │  terminal cb │     │  - authorize + move    │     │  (movie)     │
//! │              │     │  - delete temp, token  │     │              │
//! └──────────────┘     └────────────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`photo`]: capture-request template, processor, in-flight table, thumbnails
//! - [`video`]: recording state, finalizer, elapsed-time timer

pub mod photo;
pub mod video;
