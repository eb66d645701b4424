// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for the platform services the studio consumes
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Studio Layer                 │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │ Permissions │    │     Camera       │    │
//! │  └─────────────┘    │ (device, outputs)│    │
//! │  ┌─────────────┐    └──────────────────┘    │
//! │  │ Background  │                            │
//! │  │   tasks     │                            │
//! │  └─────────────┘                            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: capture backend and video device traits, virtual implementation
//! - [`permissions`]: video/audio authorization prompt
//! - [`background`]: background-execution tokens with scoped release

pub mod background;
pub mod camera;
pub mod permissions;
