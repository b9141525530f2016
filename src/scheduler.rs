//! Processing-cycle scheduler
//!
//! Runs a [`ProcessingCycle`] on a tokio task, waiting a fixed delay between
//! cycles, until stopped. Stopping cancels the pending wait only; a cycle that
//! is already running finishes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One pass of processing, repeated by the scheduler
#[async_trait]
pub trait ProcessingCycle: Send + Sync + 'static {
    async fn run_cycle(&self);
}

/// Cancellation flag shared between a started cycle loop and its owner
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives a processing cycle at a fixed delay
pub struct Scheduler {
    delay: Duration,
    running: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            running: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .map(|running| !running.handle.is_finished())
            .unwrap_or(false)
    }

    /// Start the cycle loop. No-op when a loop is already running.
    pub fn start<C: ProcessingCycle>(&self, cycle: Arc<C>) {
        let mut running = self.running.lock();
        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                debug!("Processing loop already running");
                return;
            }
        }

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            let mut cycles: u64 = 0;
            loop {
                if loop_token.is_cancelled() {
                    break;
                }
                cycle.run_cycle().await;
                cycles += 1;
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            debug!(cycles, "Processing loop stopped");
        });

        info!(delay_ms = delay.as_millis() as u64, "Started processing loop");
        *running = Some(RunningLoop { token, handle });
    }

    /// Cancel the pending tick. Returns the loop's handle so callers can wait
    /// for an in-flight cycle to finish.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let running = self.running.lock().take()?;
        running.token.cancel();
        info!("Stopping processing loop");
        Some(running.handle)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.token.cancel();
        }
    }
}
