//! Nanosecond timestamps for event stamping.
//!
//! Wall-clock readings can repeat (coarse clocks) or step backwards. Stamps
//! handed out by one `Clock` are strictly increasing regardless.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Clock {
    last: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp in nanoseconds since the Unix epoch
    pub fn now_ns(&self) -> u64 {
        let wall = wall_clock_ns();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(wall.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        wall.max(previous.saturating_add(1))
    }
}

fn wall_clock_ns() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .map(|ns| ns.max(0) as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_stamps_strictly_increase() {
        let clock = Clock::new();
        let mut last = 0;
        for _ in 0..10_000 {
            let now = clock.now_ns();
            assert!(now > last);
            last = now;
        }
    }

    #[test]
    fn test_concurrent_stamps_are_unique() {
        let clock = Arc::new(Clock::new());
        let mut handles = vec![];
        for _ in 0..4 {
            let clock = clock.clone();
            handles.push(thread::spawn(move || {
                (0..1000).map(|_| clock.now_ns()).collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
