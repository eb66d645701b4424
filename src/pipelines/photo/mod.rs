// SPDX-License-Identifier: MPL-2.0

//! Photo capture pipeline
//!
//! ```text
//! template ──snapshot──▶ CaptureRequest ──▶ backend
//!                                              │ will capture / processed / finished
//!                                              ▼
//!                                   PhotoCaptureProcessor ──▶ MediaLibrary
//!                                              │
//!                                              ▼ completion(id, outcome)
//!                                     in-flight table removal
//! ```
//!
//! Each request gets its own processor; the processor calls its completion
//! exactly once, whatever the outcome.

pub mod processor;
pub mod thumbnail;

pub use processor::{InFlightTable, PhotoCaptureProcessor, PhotoCompletion, PhotoOutcome, SavedPhoto};

use crate::backends::camera::{
    CaptureDevice, CaptureRequest, Dimensions, PhotoCodec, QualityPrioritization, RequestId,
};
use serde::{Deserialize, Serialize};

/// Pixel format of the embedded preview image
const PREVIEW_PIXEL_FORMAT: &str = "BGRA";

/// User-selectable photo output policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoPreferences {
    /// Used when the output offers it, JPEG otherwise
    pub codec: PhotoCodec,
    pub quality: QualityPrioritization,
}

impl Default for PhotoPreferences {
    fn default() -> Self {
        Self {
            codec: PhotoCodec::Hevc,
            quality: QualityPrioritization::Quality,
        }
    }
}

/// Settings every photo request is cloned from
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoSettingsTemplate {
    pub codec: PhotoCodec,
    pub max_dimensions: Dimensions,
    pub quality: QualityPrioritization,
    pub preview_pixel_format: Option<String>,
}

impl PhotoSettingsTemplate {
    /// Build the template for the device's active format
    ///
    /// Returns `None` when the active format reports no photo dimensions.
    pub fn for_device(
        device: &dyn CaptureDevice,
        available_codecs: &[PhotoCodec],
        preferences: PhotoPreferences,
    ) -> Option<Self> {
        let max_dimensions = device.active_format().largest_photo_dimensions()?;

        let codec = if available_codecs.contains(&preferences.codec) {
            preferences.codec
        } else {
            PhotoCodec::Jpeg
        };

        Some(Self {
            codec,
            max_dimensions,
            quality: preferences.quality,
            preview_pixel_format: Some(PREVIEW_PIXEL_FORMAT.to_string()),
        })
    }

    /// Immutable per-request copy
    pub fn snapshot(&self, id: RequestId) -> CaptureRequest {
        CaptureRequest {
            id,
            codec: self.codec,
            max_dimensions: self.max_dimensions,
            quality: self.quality,
            preview_pixel_format: self.preview_pixel_format.clone(),
        }
    }
}

/// Monotonic request identifiers; never reused for the generator's lifetime
#[derive(Debug, Default)]
pub struct RequestIds {
    last: i64,
}

impl RequestIds {
    pub fn next(&mut self) -> RequestId {
        self.last += 1;
        RequestId(self.last)
    }
}
