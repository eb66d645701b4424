// SPDX-License-Identifier: GPL-3.0-only

//! Elapsed recording time publisher

use crate::constants::timing;
use crate::utils::{format_elapsed, lock};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

struct Ticker {
    stop_sender: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Publishes "MM:SS" while a recording runs, "00:00" otherwise
pub struct RecordingTimer {
    elapsed: Arc<watch::Sender<String>>,
    tick: Duration,
    ticker: Mutex<Option<Ticker>>,
}

impl Default for RecordingTimer {
    fn default() -> Self {
        Self::new(timing::RECORDING_TIMER_TICK)
    }
}

impl RecordingTimer {
    pub fn new(tick: Duration) -> Self {
        let (elapsed, _) = watch::channel(format_elapsed(0));
        Self {
            elapsed: Arc::new(elapsed),
            tick,
            ticker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.elapsed.subscribe()
    }

    pub fn current(&self) -> String {
        self.elapsed.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.ticker).is_some()
    }

    /// Start counting from zero; restarting replaces a running ticker
    pub fn start(&self) {
        self.stop();

        let (stop_sender, stop_receiver) = mpsc::channel::<()>();
        let elapsed = Arc::clone(&self.elapsed);
        let tick = self.tick;

        let spawned = thread::Builder::new()
            .name("recording-timer".to_string())
            .spawn(move || {
                let started = Instant::now();
                loop {
                    match stop_receiver.recv_timeout(tick) {
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            let text = format_elapsed(started.elapsed().as_secs());
                            elapsed.send_if_modified(|current| {
                                if *current == text {
                                    return false;
                                }
                                *current = text;
                                true
                            });
                        }
                        _ => break,
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                debug!("Recording timer started");
                *lock(&self.ticker) = Some(Ticker {
                    stop_sender,
                    handle,
                });
            }
            Err(e) => warn!(error = %e, "Failed to start recording timer"),
        }
    }

    /// Stop counting and reset to "00:00"
    pub fn stop(&self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            let _ = ticker.stop_sender.send(());
            if ticker.handle.join().is_err() {
                warn!("Recording timer thread panicked");
            }
            debug!("Recording timer stopped");
        }
        self.elapsed.send_replace(format_elapsed(0));
    }
}

impl Drop for RecordingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
