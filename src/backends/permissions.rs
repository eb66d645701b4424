// SPDX-License-Identifier: GPL-3.0-only

//! Capture authorization
//!
//! The platform owns the permission prompt. The studio asks for the current
//! status and, when undetermined, requests access and suspends its session
//! queue until the answer arrives.

use crate::utils::lock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

/// Media whose capture needs authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Video,
    Audio,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Video => write!(f, "Video"),
            MediaType::Audio => write!(f, "Audio"),
        }
    }
}

/// Authorization state for a media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationStatus::Authorized)
    }
}

/// Callback receiving the user's answer
pub type AccessCallback = Box<dyn FnOnce(bool) + Send>;

/// Permission prompt collaborator
pub trait PermissionPrompt: Send + Sync {
    fn authorization_status(&self, media: MediaType) -> AuthorizationStatus;

    /// Ask the user; `callback` may run later, on any thread
    fn request_access(&self, media: MediaType, callback: AccessCallback);
}

/// Prompt with fixed answers, used by the CLI and tests
///
/// A `NotDetermined` media type keeps its callbacks until [`answer`] is
/// called, modelling a prompt the user has not responded to yet.
///
/// [`answer`]: StaticPermissions::answer
pub struct StaticPermissions {
    statuses: Mutex<HashMap<MediaType, AuthorizationStatus>>,
    waiting: Mutex<Vec<(MediaType, AccessCallback)>>,
}

impl StaticPermissions {
    pub fn new(video: AuthorizationStatus, audio: AuthorizationStatus) -> Self {
        let statuses = HashMap::from([(MediaType::Video, video), (MediaType::Audio, audio)]);
        Self {
            statuses: Mutex::new(statuses),
            waiting: Mutex::new(Vec::new()),
        }
    }

    /// Everything already authorized
    pub fn granted() -> Self {
        Self::new(AuthorizationStatus::Authorized, AuthorizationStatus::Authorized)
    }

    /// Resolve pending prompts for `media`
    pub fn answer(&self, media: MediaType, granted: bool) {
        let status = if granted {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        lock(&self.statuses).insert(media, status);

        let callbacks: Vec<AccessCallback> = {
            let mut waiting = lock(&self.waiting);
            let (matching, rest): (Vec<_>, Vec<_>) =
                std::mem::take(&mut *waiting).into_iter().partition(|(m, _)| *m == media);
            *waiting = rest;
            matching.into_iter().map(|(_, cb)| cb).collect()
        };

        info!(%media, granted, prompts = callbacks.len(), "Permission prompt answered");
        for callback in callbacks {
            callback(granted);
        }
    }

    pub fn pending_prompts(&self) -> usize {
        lock(&self.waiting).len()
    }
}

impl PermissionPrompt for StaticPermissions {
    fn authorization_status(&self, media: MediaType) -> AuthorizationStatus {
        lock(&self.statuses).get(&media).copied().unwrap_or_default()
    }

    fn request_access(&self, media: MediaType, callback: AccessCallback) {
        match self.authorization_status(media) {
            AuthorizationStatus::NotDetermined => lock(&self.waiting).push((media, callback)),
            status => callback(status.is_authorized()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_undetermined_prompt_waits_for_answer() {
        let prompt = StaticPermissions::new(
            AuthorizationStatus::NotDetermined,
            AuthorizationStatus::Authorized,
        );
        let answered = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&answered);
        prompt.request_access(
            MediaType::Video,
            Box::new(move |granted| flag.store(granted, Ordering::SeqCst)),
        );
        assert_eq!(prompt.pending_prompts(), 1);
        assert!(!answered.load(Ordering::SeqCst));

        prompt.answer(MediaType::Video, true);
        assert!(answered.load(Ordering::SeqCst));
        assert_eq!(
            prompt.authorization_status(MediaType::Video),
            AuthorizationStatus::Authorized
        );
    }
}
