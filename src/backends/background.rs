// SPDX-License-Identifier: GPL-3.0-only

//! Background-execution tokens
//!
//! The OS grants a limited amount of run time after the app leaves the
//! foreground; a recording holds a token so its file can be finalized.
//! [`BackgroundTask`] owns one token and ends it exactly once, on drop.

use crate::utils::lock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// OS identifier of a background task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

impl BackgroundTaskId {
    /// Returned by the OS when no background time is granted
    pub const INVALID: BackgroundTaskId = BackgroundTaskId(0);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// OS background-execution collaborator
pub trait BackgroundTasks: Send + Sync {
    /// Begin a background task; may return [`BackgroundTaskId::INVALID`]
    fn begin(&self, name: &str) -> BackgroundTaskId;

    fn end(&self, id: BackgroundTaskId);
}

/// Single-owner background token, released when dropped
pub struct BackgroundTask {
    id: BackgroundTaskId,
    tasks: Arc<dyn BackgroundTasks>,
}

impl BackgroundTask {
    /// Begin a task; an invalid grant still yields a handle that releases nothing
    pub fn begin(tasks: Arc<dyn BackgroundTasks>, name: &str) -> Self {
        let id = tasks.begin(name);
        if !id.is_valid() {
            warn!(name, "Background execution not granted");
        }
        Self { id, tasks }
    }

    pub fn id(&self) -> BackgroundTaskId {
        self.id
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if self.id.is_valid() {
            debug!(id = self.id.0, "Ending background task");
            self.tasks.end(self.id);
        }
    }
}

impl std::fmt::Debug for BackgroundTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTask").field("id", &self.id).finish()
    }
}

/// In-process token source that records every begin/end
#[derive(Default)]
pub struct TrackedBackgroundTasks {
    next: AtomicU64,
    active: Mutex<HashSet<BackgroundTaskId>>,
    ended: Mutex<Vec<BackgroundTaskId>>,
    deny: AtomicBool,
}

impl TrackedBackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out invalid tokens from now on
    pub fn deny(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    /// Every `end` call received, valid or not
    pub fn ended(&self) -> Vec<BackgroundTaskId> {
        lock(&self.ended).clone()
    }
}

impl BackgroundTasks for TrackedBackgroundTasks {
    fn begin(&self, name: &str) -> BackgroundTaskId {
        if self.deny.load(Ordering::SeqCst) {
            return BackgroundTaskId::INVALID;
        }
        let id = BackgroundTaskId(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(name, id = id.0, "Background task begun");
        lock(&self.active).insert(id);
        id
    }

    fn end(&self, id: BackgroundTaskId) {
        if !lock(&self.active).remove(&id) {
            warn!(id = id.0, "Ending a background task that is not active");
        }
        lock(&self.ended).push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ends_once_on_drop() {
        let tasks = Arc::new(TrackedBackgroundTasks::new());
        let task = BackgroundTask::begin(tasks.clone(), "recording");
        assert_eq!(tasks.active_count(), 1);
        let id = task.id();
        drop(task);
        assert_eq!(tasks.active_count(), 0);
        assert_eq!(tasks.ended(), vec![id]);
    }

    #[test]
    fn test_invalid_token_is_never_ended() {
        let tasks = Arc::new(TrackedBackgroundTasks::new());
        tasks.deny(true);
        let task = BackgroundTask::begin(tasks.clone(), "recording");
        assert!(!task.id().is_valid());
        drop(task);
        assert!(tasks.ended().is_empty());
    }
}
