// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use shari::backends::camera::{Dimensions, MovieResolution};
use shari::constants::{ResolutionTier, file_formats, get_resolution_tier, timing};

#[test]
fn test_movie_resolutions_have_expected_tiers() {
    assert_eq!(
        get_resolution_tier(MovieResolution::Hd.dimensions()),
        ResolutionTier::FullHd
    );
    assert_eq!(
        get_resolution_tier(MovieResolution::Hd4k.dimensions()),
        ResolutionTier::FourK
    );
}

#[test]
fn test_portrait_uses_long_edge() {
    assert_eq!(
        get_resolution_tier(Dimensions::new(1080, 1920)),
        ResolutionTier::FullHd
    );
    assert_eq!(get_resolution_tier(Dimensions::new(640, 480)), ResolutionTier::Sd);
}

#[test]
fn test_timer_tick_is_sub_second() {
    // The indicator shows seconds; a slower tick would skip some
    assert!(timing::RECORDING_TIMER_TICK.as_millis() < 1000);
    assert!(timing::EVENT_POLL_INTERVAL < timing::COMPLETION_TIMEOUT);
}

#[test]
fn test_export_extensions_case_insensitive() {
    assert!(file_formats::is_export_extension("MD"));
    assert!(file_formats::is_export_extension("csv"));
    assert!(!file_formats::is_export_extension("json"));
}
