//! Bounded worker pool for agent deliberations
//!
//! Submitted jobs run as tokio tasks, at most `size` at a time. A job waits for
//! a permit inside its own task, so submitting never blocks the caller.

use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::warn;

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs waiting for a permit
    pub pending: usize,
    /// Jobs currently running
    pub running: usize,
    /// Jobs that ran to completion
    pub completed: usize,
}

/// Default pool size: twice the available parallelism
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    stats: Arc<RwLock<PoolStats>>,
}

impl WorkerPool {
    /// Create a pool running at most `size` jobs at once (minimum 1)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            stats: Arc::new(RwLock::new(PoolStats::default())),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.read().clone()
    }

    /// Run a job on the pool
    pub fn submit<F>(&self, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let stats = Arc::clone(&self.stats);
        stats.write().pending += 1;

        tokio::spawn(async move {
            let permit = permits.acquire_owned().await;
            {
                let mut stats = stats.write();
                stats.pending -= 1;
                stats.running += 1;
            }
            if permit.is_err() {
                warn!("Worker pool closed; dropping job");
                stats.write().running -= 1;
                return;
            }
            let _permit = permit;
            let _running = RunningGuard { stats };
            job.await;
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(default_pool_size())
    }
}

/// Moves a job from running to completed, even when the job panics
struct RunningGuard {
    stats: Arc<RwLock<PoolStats>>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut stats = self.stats.write();
        stats.running -= 1;
        stats.completed += 1;
    }
}
