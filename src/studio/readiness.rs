// SPDX-License-Identifier: GPL-3.0-only

//! Shutter readiness tracking

use crate::backends::camera::RequestId;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Whether the shutter can accept another photo request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureReadiness {
    SessionNotRunning,
    Ready,
    /// A request is being prepared and handed to the backend
    NotReadyWaitingToStart,
}

/// Receives readiness changes, typically to enable or dim the shutter button
pub trait ReadinessDelegate: Send + Sync {
    fn readiness_changed(&self, readiness: CaptureReadiness);
}

/// Lives alongside the photo output and is released with it
pub struct ReadinessCoordinator {
    running: bool,
    tracked: HashSet<RequestId>,
    readiness: CaptureReadiness,
    delegate: Option<Arc<dyn ReadinessDelegate>>,
}

impl ReadinessCoordinator {
    pub fn new(running: bool, delegate: Option<Arc<dyn ReadinessDelegate>>) -> Self {
        let mut coordinator = Self {
            running,
            tracked: HashSet::new(),
            readiness: CaptureReadiness::SessionNotRunning,
            delegate,
        };
        coordinator.update();
        coordinator
    }

    pub fn readiness(&self) -> CaptureReadiness {
        self.readiness
    }

    pub fn start_tracking(&mut self, id: RequestId) {
        self.tracked.insert(id);
        self.update();
    }

    pub fn stop_tracking(&mut self, id: RequestId) {
        self.tracked.remove(&id);
        self.update();
    }

    pub fn set_session_running(&mut self, running: bool) {
        self.running = running;
        self.update();
    }

    fn update(&mut self) {
        let readiness = if !self.running {
            CaptureReadiness::SessionNotRunning
        } else if self.tracked.is_empty() {
            CaptureReadiness::Ready
        } else {
            CaptureReadiness::NotReadyWaitingToStart
        };
        if readiness == self.readiness {
            return;
        }
        debug!(?readiness, "Capture readiness changed");
        self.readiness = readiness;
        if let Some(delegate) = &self.delegate {
            delegate.readiness_changed(readiness);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CaptureReadiness>>);

    impl ReadinessDelegate for Recorder {
        fn readiness_changed(&self, readiness: CaptureReadiness) {
            self.0.lock().unwrap().push(readiness);
        }
    }

    #[test]
    fn test_tracking_toggles_readiness() {
        let recorder = Arc::new(Recorder::default());
        let mut coordinator = ReadinessCoordinator::new(true, Some(recorder.clone()));
        coordinator.start_tracking(RequestId(1));
        coordinator.start_tracking(RequestId(2));
        coordinator.stop_tracking(RequestId(1));
        assert_eq!(coordinator.readiness(), CaptureReadiness::NotReadyWaitingToStart);
        coordinator.stop_tracking(RequestId(2));
        coordinator.set_session_running(false);

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                CaptureReadiness::Ready,
                CaptureReadiness::NotReadyWaitingToStart,
                CaptureReadiness::Ready,
                CaptureReadiness::SessionNotRunning,
            ]
        );
    }

    #[test]
    fn test_not_running_reports_nothing_new() {
        let recorder = Arc::new(Recorder::default());
        let coordinator = ReadinessCoordinator::new(false, Some(recorder.clone()));
        assert_eq!(coordinator.readiness(), CaptureReadiness::SessionNotRunning);
        assert!(recorder.0.lock().unwrap().is_empty());
    }
}
