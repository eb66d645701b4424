// SPDX-License-Identifier: GPL-3.0-only

//! One-shot photo capture delegate and the in-flight request table

use super::thumbnail::{THUMBNAIL_MAX_EDGE, make_thumbnail};
use crate::backends::camera::{
    BackendError, BackendResult, CaptureRequest, PhotoCaptureDelegate, RequestId,
    ResolvedPhotoSettings,
};
use crate::errors::{CaptureError, PermissionError, StudioError};
use crate::library::{MediaLibrary, PhotoResource};
use crate::utils::lock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// A photo that reached the media library
#[derive(Debug, Clone, PartialEq)]
pub struct SavedPhoto {
    pub request: RequestId,
    pub location: PathBuf,
    pub resource: PhotoResource,
    /// Small JPEG for the persistence collaborator, when decodable
    pub thumbnail: Option<Vec<u8>>,
}

pub type PhotoOutcome = Result<SavedPhoto, StudioError>;

/// Terminal callback of a processor, called exactly once
pub type PhotoCompletion = Box<dyn FnOnce(RequestId, PhotoOutcome) + Send>;

/// Delegate for exactly one capture request
pub struct PhotoCaptureProcessor {
    request: CaptureRequest,
    library: Arc<dyn MediaLibrary>,
    will_capture: Box<dyn Fn() + Send + Sync>,
    photo: Mutex<Option<(Vec<u8>, PhotoResource)>>,
    completion: Mutex<Option<PhotoCompletion>>,
}

impl PhotoCaptureProcessor {
    /// # Arguments
    /// * `request` - Settings snapshot this processor is bound to
    /// * `library` - Destination of the photo bytes
    /// * `will_capture` - Fired when the shutter is about to fire (flash animation)
    /// * `completion` - Terminal callback; receives the request id and outcome
    pub fn new(
        request: CaptureRequest,
        library: Arc<dyn MediaLibrary>,
        will_capture: impl Fn() + Send + Sync + 'static,
        completion: impl FnOnce(RequestId, PhotoOutcome) + Send + 'static,
    ) -> Self {
        Self {
            request,
            library,
            will_capture: Box::new(will_capture),
            photo: Mutex::new(None),
            completion: Mutex::new(Some(Box::new(completion))),
        }
    }

    pub fn request(&self) -> &CaptureRequest {
        &self.request
    }

    pub fn id(&self) -> RequestId {
        self.request.id
    }

    /// Whether the completion already ran
    pub fn is_finished(&self) -> bool {
        lock(&self.completion).is_none()
    }

    fn finish(&self, outcome: PhotoOutcome) {
        let Some(completion) = lock(&self.completion).take() else {
            warn!(request = %self.request.id, "Photo processor finished twice");
            return;
        };
        completion(self.request.id, outcome);
    }

    fn store(&self, photo: BackendResult<Vec<u8>>, resource: PhotoResource) {
        match photo {
            Ok(data) => {
                debug!(request = %self.request.id, bytes = data.len(), ?resource, "Photo data received");
                *lock(&self.photo) = Some((data, resource));
            }
            Err(e) => error!(request = %self.request.id, error = %e, "Error capturing photo"),
        }
    }

    /// Hand the bytes to the library; a refused library drops them
    fn persist(&self, data: Vec<u8>, resource: PhotoResource) -> PhotoOutcome {
        let status = self.library.request_authorization();
        if !status.is_authorized() {
            warn!(
                request = %self.request.id,
                ?status,
                "Photo library access denied, discarding captured photo"
            );
            return Err(PermissionError::LibraryDenied.into());
        }

        let location = self
            .library
            .save_photo(&data, self.request.codec, resource)
            .map_err(|e| {
                error!(request = %self.request.id, error = %e, "Failed to save photo");
                CaptureError::SaveFailed(e.to_string())
            })?;

        info!(request = %self.request.id, path = %location.display(), "Photo persisted");
        Ok(SavedPhoto {
            request: self.request.id,
            location,
            resource,
            thumbnail: make_thumbnail(&data, THUMBNAIL_MAX_EDGE),
        })
    }
}

impl PhotoCaptureDelegate for PhotoCaptureProcessor {
    fn will_capture_photo(&self, resolved: &ResolvedPhotoSettings) {
        debug!(
            request = %self.request.id,
            dimensions = %resolved.photo_dimensions,
            "Will capture photo"
        );
        (self.will_capture)();
    }

    fn did_finish_processing_photo(&self, photo: BackendResult<Vec<u8>>) {
        self.store(photo, PhotoResource::Photo);
    }

    fn did_finish_capturing_deferred_proxy(&self, proxy: BackendResult<Vec<u8>>) {
        self.store(proxy, PhotoResource::PhotoProxy);
    }

    fn did_finish_capture(&self, _resolved: &ResolvedPhotoSettings, error: Option<BackendError>) {
        if let Some(e) = error {
            error!(request = %self.request.id, error = %e, "Error capturing photo");
            self.finish(Err(CaptureError::Failed(e.to_string()).into()));
            return;
        }

        let Some((data, resource)) = lock(&self.photo).take() else {
            warn!(request = %self.request.id, "No photo data resource");
            self.finish(Err(CaptureError::Failed("no photo data".to_string()).into()));
            return;
        };

        let outcome = self.persist(data, resource);
        self.finish(outcome);
    }
}

/// Processors whose completion has not run yet, keyed by request id
///
/// Only the session queue touches the table.
#[derive(Default)]
pub struct InFlightTable {
    entries: HashMap<RequestId, Arc<PhotoCaptureProcessor>>,
    removed: u64,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor; false if its id is already in flight
    pub fn insert(&mut self, processor: Arc<PhotoCaptureProcessor>) -> bool {
        let id = processor.id();
        if self.entries.contains_key(&id) {
            warn!(request = %id, "Capture request already in flight");
            return false;
        }
        self.entries.insert(id, processor);
        true
    }

    pub fn remove(&mut self, id: RequestId) -> Option<Arc<PhotoCaptureProcessor>> {
        let removed = self.entries.remove(&id);
        match removed {
            Some(_) => self.removed += 1,
            None => warn!(request = %id, "Capture request not in flight"),
        }
        removed
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// In-flight ids, ascending
    pub fn ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Total successful removals
    pub fn removed_count(&self) -> u64 {
        self.removed
    }
}
