// SPDX-License-Identifier: GPL-3.0-only

//! User configuration, stored as JSON under the user's config directory

use crate::backends::camera::{MovieFrameRate, MovieResolution, ZoomFactor};
use crate::constants::app_info;
use crate::errors::StorageError;
use crate::library;
use crate::pipelines::photo::PhotoPreferences;
use crate::studio::CaptureMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture mode the studio integrates with
    pub default_capture_mode: CaptureMode,
    /// Resolution class used whenever the studio enters movie mode
    pub movie_resolution: MovieResolution,
    pub movie_frame_rate: MovieFrameRate,
    pub zoom: ZoomFactor,
    /// Delete restaurants and dishes without asking
    pub is_delete_immediate: bool,
    /// Photo codec and quality prioritization
    pub photo: PhotoPreferences,
    /// Override for `~/Pictures/shari`
    pub photos_dir: Option<PathBuf>,
    /// Override for `~/Videos/shari`
    pub videos_dir: Option<PathBuf>,
    /// Where recordings are written before they move into the library
    pub temp_dir: Option<PathBuf>,
    /// Review notes and exports; defaults to the user's data directory
    pub data_dir: Option<PathBuf>,
    /// JSON file replacing the built-in taste taxonomy
    pub taxonomy_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_capture_mode: CaptureMode::Photo,
            movie_resolution: MovieResolution::default(),
            movie_frame_rate: MovieFrameRate::default(),
            zoom: ZoomFactor::default(),
            is_delete_immediate: false, // Confirm before deleting
            photo: PhotoPreferences::default(),
            photos_dir: None,
            videos_dir: None,
            temp_dir: None,
            data_dir: None,
            taxonomy_path: None,
        }
    }
}

impl Config {
    /// Location of the config file, if the platform has a config directory
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::DIR_NAME).join(app_info::CONFIG_FILE))
    }

    /// Load the user's config, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            warn!("No config directory, using default configuration");
            return Self::default();
        };
        Self::load_or_default(&path)
    }

    /// Load `path`; a missing or unparsable file yields the defaults
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, StorageError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save to the user's config file
    pub fn save(&self) -> Result<(), StorageError> {
        let path = Self::path()
            .ok_or_else(|| StorageError::NotFound("config directory".to_string()))?;
        self.save_to(&path)
    }

    /// Write pretty JSON, creating the parent directory
    pub fn save_to(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.photos_dir
            .clone()
            .unwrap_or_else(library::default_photos_dir)
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.videos_dir
            .clone()
            .unwrap_or_else(library::default_videos_dir)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(app_info::DIR_NAME)
        })
    }

    /// JSON document holding restaurants, dishes and custom tastes
    pub fn reviews_path(&self) -> PathBuf {
        self.data_dir().join(app_info::REVIEWS_FILE)
    }

    /// Directory exported notes are written to
    pub fn export_dir(&self) -> PathBuf {
        self.data_dir().join("exports")
    }
}
