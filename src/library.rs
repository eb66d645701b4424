// SPDX-License-Identifier: GPL-3.0-only

//! Media library collaborator
//!
//! Finished photos and movies are handed to the platform media library as
//! opaque byte blobs. [`DirectoryLibrary`] keeps them in the user's picture
//! and video folders.

use crate::backends::camera::PhotoCodec;
use crate::backends::permissions::AuthorizationStatus;
use crate::constants::app_info;
use crate::errors::StorageError;
use crate::utils::lock;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// How the photo bytes relate to the final image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoResource {
    /// Final processed photo
    Photo,
    /// Deferred proxy, replaced by the final photo once processing ends
    PhotoProxy,
}

/// Platform media library
pub trait MediaLibrary: Send + Sync {
    /// Current authorization, prompting if undetermined (blocking)
    fn request_authorization(&self) -> AuthorizationStatus;

    /// Store photo bytes, returning where they landed
    fn save_photo(
        &self,
        data: &[u8],
        codec: PhotoCodec,
        resource: PhotoResource,
    ) -> Result<PathBuf, StorageError>;

    /// Move (not copy) a finished movie into the library
    fn move_movie(&self, source: &Path) -> Result<PathBuf, StorageError>;
}

/// Library backed by two directories on disk
pub struct DirectoryLibrary {
    photos_dir: PathBuf,
    videos_dir: PathBuf,
    authorization: Mutex<AuthorizationStatus>,
}

impl DirectoryLibrary {
    pub fn new(photos_dir: PathBuf, videos_dir: PathBuf) -> Self {
        Self {
            photos_dir,
            videos_dir,
            authorization: Mutex::new(AuthorizationStatus::Authorized),
        }
    }

    /// `~/Pictures/shari` and `~/Videos/shari`, falling back to the home
    /// directory layout when the XDG folders are unknown
    pub fn default_dirs() -> Self {
        Self::new(default_photos_dir(), default_videos_dir())
    }

    pub fn photos_dir(&self) -> &Path {
        &self.photos_dir
    }

    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    /// Override the answer `request_authorization` gives
    pub fn set_authorization(&self, status: AuthorizationStatus) {
        *lock(&self.authorization) = status;
    }

    fn ensure_dir(dir: &Path) -> Result<(), StorageError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            warn!(dir = %dir.display(), error = %e, "Failed to create library directory");
            StorageError::from(e)
        })
    }
}

impl MediaLibrary for DirectoryLibrary {
    fn request_authorization(&self) -> AuthorizationStatus {
        *lock(&self.authorization)
    }

    fn save_photo(
        &self,
        data: &[u8],
        codec: PhotoCodec,
        resource: PhotoResource,
    ) -> Result<PathBuf, StorageError> {
        Self::ensure_dir(&self.photos_dir)?;

        let suffix = match resource {
            PhotoResource::Photo => "",
            PhotoResource::PhotoProxy => "_proxy",
        };
        let path = self.photos_dir.join(format!(
            "{}{}.{}",
            timestamped_name("IMG"),
            suffix,
            codec.extension()
        ));

        std::fs::write(&path, data)?;
        info!(path = %path.display(), bytes = data.len(), ?resource, "Photo saved to library");
        Ok(path)
    }

    fn move_movie(&self, source: &Path) -> Result<PathBuf, StorageError> {
        if !source.exists() {
            return Err(StorageError::NotFound(source.display().to_string()));
        }
        Self::ensure_dir(&self.videos_dir)?;

        let extension = source
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mov".to_string());
        let destination = self
            .videos_dir
            .join(format!("{}.{}", timestamped_name("MOV"), extension));

        if let Err(e) = std::fs::rename(source, &destination) {
            // rename cannot cross filesystems
            debug!(error = %e, "Rename failed, falling back to copy and remove");
            std::fs::copy(source, &destination)?;
            std::fs::remove_file(source)?;
        }

        info!(from = %source.display(), to = %destination.display(), "Movie moved to library");
        Ok(destination)
    }
}

/// `PREFIX_yyyyMMdd_HHmmss_xxxxxxxx`, unique even within one second
fn timestamped_name(prefix: &str) -> String {
    let unique = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        prefix,
        Local::now().format("%Y%m%d_%H%M%S"),
        &unique[..8]
    )
}

pub fn default_photos_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .unwrap_or_else(std::env::temp_dir)
        .join(app_info::DIR_NAME)
}

pub fn default_videos_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Videos")))
        .unwrap_or_else(std::env::temp_dir)
        .join(app_info::DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_library() -> (DirectoryLibrary, tempfile::TempDir) {
        let root = tempfile::tempdir().unwrap();
        let library = DirectoryLibrary::new(root.path().join("photos"), root.path().join("videos"));
        (library, root)
    }

    #[test]
    fn test_save_photo_writes_bytes() {
        let (library, _root) = temp_library();
        let path = library
            .save_photo(b"jpeg", PhotoCodec::Jpeg, PhotoResource::Photo)
            .unwrap();
        assert_eq!(path.extension().unwrap(), "jpg");
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
    }

    #[test]
    fn test_move_movie_removes_source() {
        let (library, root) = temp_library();
        let source = root.path().join("clip.mov");
        std::fs::write(&source, b"movie").unwrap();

        let destination = library.move_movie(&source).unwrap();
        assert!(!source.exists());
        assert_eq!(std::fs::read(&destination).unwrap(), b"movie");
        assert!(destination.starts_with(library.videos_dir()));
    }

    #[test]
    fn test_move_missing_movie_fails() {
        let (library, root) = temp_library();
        let result = library.move_movie(&root.path().join("missing.mov"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
