// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::camera::Dimensions;
use std::time::Duration;

/// Resolution class of a format, for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// 3840 wide and above
    FourK,
    /// 1920 wide
    FullHd,
    /// 1280 wide
    Hd,
    /// Anything smaller
    Sd,
}

impl ResolutionTier {
    pub fn display_name(&self) -> &'static str {
        match self {
            ResolutionTier::FourK => "4K",
            ResolutionTier::FullHd => "HD",
            ResolutionTier::Hd => "720p",
            ResolutionTier::Sd => "SD",
        }
    }
}

/// Width thresholds for the resolution tiers
pub mod resolution_thresholds {
    pub const THRESHOLD_4K: u32 = 3840;
    pub const THRESHOLD_HD: u32 = 1920;
    pub const THRESHOLD_720P: u32 = 1280;
}

/// Determine the resolution tier from its dimensions
///
/// Portrait sizes are classified by their long edge.
pub fn get_resolution_tier(dimensions: Dimensions) -> ResolutionTier {
    use resolution_thresholds::*;
    let long_edge = dimensions.width.max(dimensions.height);
    if long_edge >= THRESHOLD_4K {
        ResolutionTier::FourK
    } else if long_edge >= THRESHOLD_HD {
        ResolutionTier::FullHd
    } else if long_edge >= THRESHOLD_720P {
        ResolutionTier::Hd
    } else {
        ResolutionTier::Sd
    }
}

/// Studio timing
pub mod timing {
    use super::Duration;

    /// How often the recording indicator text is refreshed
    pub const RECORDING_TIMER_TICK: Duration = Duration::from_millis(250);

    /// Default length of a CLI recording
    pub const DEFAULT_VIDEO_DURATION_SECS: u64 = 5;

    /// Poll interval of the CLI while waiting for completions
    pub const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Longest the CLI waits for a capture completion
    pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Virtual camera simulation defaults
pub mod virtual_camera {
    use super::Duration;

    /// Delay between accepting a photo request and its first callback
    pub const CAPTURE_LATENCY: Duration = Duration::from_millis(5);

    /// Interval between frames written while recording
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(10);
}

/// File formats for exported notes
pub mod file_formats {
    pub const MARKDOWN_EXTENSION: &str = "md";
    pub const CSV_EXTENSION: &str = "csv";

    /// Extensions of files an export may have written
    pub const EXPORT_EXTENSIONS: &[&str] = &[MARKDOWN_EXTENSION, CSV_EXTENSION];

    pub fn is_export_extension(ext: &str) -> bool {
        EXPORT_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}

/// Application information utilities
pub mod app_info {
    /// Directory name under the user's config, pictures and videos folders
    pub const DIR_NAME: &str = "shari";

    pub const CONFIG_FILE: &str = "config.json";

    pub const REVIEWS_FILE: &str = "reviews.json";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
