// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use shari::Config;
use shari::backends::camera::{MovieFrameRate, MovieResolution, PhotoCodec, QualityPrioritization, ZoomFactor};
use shari::studio::CaptureMode;
use std::path::PathBuf;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.default_capture_mode, CaptureMode::Photo);
    assert_eq!(config.movie_resolution, MovieResolution::Hd);
    assert_eq!(config.zoom, ZoomFactor::One);
    assert!(
        !config.is_delete_immediate,
        "Deletion should ask for confirmation by default"
    );
}

#[test]
fn test_config_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings").join("config.json");
    let mut config = Config::default();
    config.movie_resolution = MovieResolution::Hd4k;
    config.movie_frame_rate = MovieFrameRate::Sixty;
    config.photo.codec = PhotoCodec::Jpeg;
    config.photo.quality = QualityPrioritization::Speed;
    config.data_dir = Some(PathBuf::from("/srv/shari"));

    config.save_to(&path).unwrap();
    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_derived_paths() {
    let config = Config {
        data_dir: Some(PathBuf::from("/srv/shari")),
        temp_dir: Some(PathBuf::from("/var/tmp/shari")),
        ..Config::default()
    };

    assert_eq!(config.reviews_path(), PathBuf::from("/srv/shari/reviews.json"));
    assert_eq!(config.export_dir(), PathBuf::from("/srv/shari/exports"));
    assert_eq!(config.temp_dir(), PathBuf::from("/var/tmp/shari"));
}

#[test]
fn test_config_default_media_dirs_are_app_scoped() {
    let config = Config::default();
    assert!(config.photos_dir().ends_with("shari"));
    assert!(config.videos_dir().ends_with("shari"));
}
