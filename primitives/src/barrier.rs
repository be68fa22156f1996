//! Synchronization primitives used by the protocol driver.
//!
//! [CountingBarrier] is distinct from `std::sync::Barrier`: a plain cyclic barrier releases the
//! instant its party count is reached, with no way for an external actor to hold the gate shut
//! past that point. The driver needs exactly that extra gate — a round can have every local
//! worker thread ready (`waiting_count == threshold`) while the driver is still waiting on a
//! peer's message, and must not let threads through until both conditions hold (SPEC_FULL.md
//! §4.F). `std::sync::Barrier` is still the right tool wherever that second condition doesn't
//! apply, e.g. within a single round's local fan-out of independent operations.

use std::sync::{Condvar, Mutex};

struct State {
    waiting_count: usize,
    open: bool,
}

/// A barrier that releases waiting threads only when both the expected number of threads have
/// arrived *and* an external flag has been opened, resetting both atomically on release.
pub struct CountingBarrier {
    threshold: usize,
    state: Mutex<State>,
    condvar: Condvar,
}

impl CountingBarrier {
    /// Builds a barrier requiring `threshold` arrivals before it can release.
    pub fn new(threshold: usize) -> Self {
        Self { threshold, state: Mutex::new(State { waiting_count: 0, open: false }), condvar: Condvar::new() }
    }

    /// Registers this thread's arrival and blocks until the barrier opens.
    ///
    /// Returns `true` to exactly one caller per release (the "leader"), mirroring
    /// `std::sync::Barrier::wait`'s `BarrierWaitResult::is_leader`, so callers can elect one
    /// thread to do the post-release bookkeeping (e.g. resetting shared round state).
    #[allow(clippy::unwrap_used)]
    pub fn block(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.waiting_count += 1;
        let is_leader = state.waiting_count == self.threshold;
        state = self.condvar.wait_while(state, |s| !(s.waiting_count >= self.threshold && s.open)).unwrap();
        if is_leader {
            state.waiting_count = 0;
            state.open = false;
        }
        is_leader
    }

    /// Opens the gate, allowing release once `threshold` threads have also arrived.
    ///
    /// Idempotent: calling this before every thread has arrived simply leaves the gate open for
    /// whichever arrives last.
    #[allow(clippy::unwrap_used)]
    pub fn open(&self) {
        let mut state = self.state.lock().unwrap();
        state.open = true;
        self.condvar.notify_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn releases_only_after_open_and_threshold() {
        let barrier = Arc::new(CountingBarrier::new(2));
        let b1 = Arc::clone(&barrier);
        let handle = thread::spawn(move || b1.block());

        // Give the spawned thread a chance to reach `waiting_count == 1` before we open; it must
        // still not release since threshold (2) hasn't been reached.
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());

        barrier.open();
        let leader = barrier.block();
        assert!(handle.join().unwrap() || leader);
    }
}
