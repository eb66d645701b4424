// SPDX-License-Identifier: GPL-3.0-only

//! Serial execution context for capture-graph work
//!
//! Every mutation of the capture session and every blocking hardware call runs
//! on one dedicated thread, in submission order, one job at a time. Callers
//! enqueue and return immediately.
//!
//! ```text
//!  UI thread ──dispatch──▶ [ job | job | job ] ──▶ session-queue thread
//!                               ▲
//!                 suspend/resume gates dequeuing only
//! ```
//!
//! `suspend` stops the worker from taking the next job; a job already running
//! finishes. Suspensions nest, and each needs a matching `resume`. There is no
//! cancellation, priority or timeout.

use crate::utils::lock;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    jobs: VecDeque<Job>,
    suspend_count: u32,
    shutdown: bool,
}

struct Shared {
    label: String,
    state: Mutex<QueueState>,
    available: Condvar,
    worker: OnceLock<ThreadId>,
}

/// Single serial queue backed by a dedicated thread
pub struct SessionQueue {
    shared: Arc<Shared>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionQueue {
    /// Start the worker thread
    pub fn new(label: &str) -> Self {
        let shared = Arc::new(Shared {
            label: label.to_string(),
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                suspend_count: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
            worker: OnceLock::new(),
        });

        info!(label, "Starting session queue");

        let worker_shared = Arc::clone(&shared);
        let thread_handle = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || Self::run(worker_shared))
            .map_err(|e| error!(label, error = %e, "Failed to spawn session queue thread"))
            .ok();

        Self {
            shared,
            thread_handle: Mutex::new(thread_handle),
        }
    }

    fn run(shared: Arc<Shared>) {
        let _ = shared.worker.set(thread::current().id());
        debug!(label = %shared.label, "Session queue thread started");

        loop {
            let job = {
                let mut state = lock(&shared.state);
                loop {
                    if state.suspend_count == 0 {
                        if let Some(job) = state.jobs.pop_front() {
                            break Some(job);
                        }
                    }
                    if state.shutdown {
                        if !state.jobs.is_empty() {
                            warn!(
                                label = %shared.label,
                                dropped = state.jobs.len(),
                                "Session queue shut down while suspended, dropping jobs"
                            );
                            state.jobs.clear();
                        }
                        break None;
                    }
                    state = shared
                        .available
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
            };

            let Some(job) = job else { break };

            // A failing job must not take the queue down with it
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(label = %shared.label, "Session queue job panicked");
            }
        }

        info!(label = %shared.label, "Session queue thread exiting");
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Enqueue `job`; returns false if the queue has shut down
    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.shared.state);
        if state.shutdown {
            warn!(label = %self.shared.label, "Dispatch after shutdown ignored");
            return false;
        }
        state.jobs.push_back(Box::new(job));
        debug!(label = %self.shared.label, queued = state.jobs.len(), "Job enqueued");
        drop(state);
        self.shared.available.notify_one();
        true
    }

    /// Run `job` on the queue and wait for its result
    ///
    /// Runs inline when called from the queue thread itself. Blocks for as
    /// long as the queue stays suspended. Returns `None` if the queue shut
    /// down, or the job panicked, before producing a result.
    pub fn sync<R, F>(&self, job: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return Some(job());
        }

        let (sender, receiver) = mpsc::sync_channel(1);
        let dispatched = self.dispatch(move || {
            let _ = sender.send(job());
        });
        if !dispatched {
            return None;
        }
        receiver.recv().ok()
    }

    /// Pause dequeuing; queued and newly dispatched jobs wait for `resume`
    pub fn suspend(&self) {
        let mut state = lock(&self.shared.state);
        state.suspend_count += 1;
        debug!(label = %self.shared.label, depth = state.suspend_count, "Session queue suspended");
    }

    /// Undo one `suspend`
    pub fn resume(&self) {
        let mut state = lock(&self.shared.state);
        if state.suspend_count == 0 {
            warn!(label = %self.shared.label, "Resume without matching suspend ignored");
            return;
        }
        state.suspend_count -= 1;
        debug!(label = %self.shared.label, depth = state.suspend_count, "Session queue resumed");
        let resumed = state.suspend_count == 0;
        drop(state);
        if resumed {
            self.shared.available.notify_one();
        }
    }

    pub fn is_suspended(&self) -> bool {
        lock(&self.shared.state).suspend_count > 0
    }

    /// Jobs waiting to run (excluding the one running)
    pub fn pending(&self) -> usize {
        lock(&self.shared.state).jobs.len()
    }

    /// Whether the calling thread is the queue's worker
    pub fn is_current(&self) -> bool {
        self.shared.worker.get() == Some(&thread::current().id())
    }

    /// Stop accepting jobs; the worker drains what is queued, then exits
    ///
    /// Jobs still held back by a suspension are dropped.
    pub fn shutdown(&self) {
        lock(&self.shared.state).shutdown = true;
        self.shared.available.notify_all();

        if self.is_current() {
            return;
        }
        if let Some(handle) = lock(&self.thread_handle).take() {
            if handle.join().is_err() {
                warn!(label = %self.shared.label, "Session queue thread panicked");
            }
        }
    }
}

impl Drop for SessionQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
