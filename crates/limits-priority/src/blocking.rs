//! Blocking limiter (spec §4.9): a simpler alternative to the priority
//! backlog. One shared wake channel, no ordering guarantees beyond arrival
//! race — "included as an external collaborator contract for completeness"
//! rather than the primary admission path.

use crate::error::PriorityError;
use limits_core::{AcquireGuard, Limiter, Outcome, SimpleLimiter};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Inner {
    delegate: SimpleLimiter,
    gate: Mutex<()>,
    wake: Condvar,
    timeout: Duration,
}

/// Wraps a delegate [`SimpleLimiter`]; on rejection, parks the calling
/// thread up to `timeout`, retrying on every release regardless of which
/// waiter's release woke it (spec §4.9: "fair only by arrival race").
#[derive(Clone)]
pub struct BlockingLimiter(Arc<Inner>);

impl BlockingLimiter {
    #[must_use]
    pub fn new(delegate: SimpleLimiter, timeout: Duration) -> Self {
        Self(Arc::new(Inner {
            delegate,
            gate: Mutex::new(()),
            wake: Condvar::new(),
            timeout,
        }))
    }

    /// Blocks the calling thread until admitted or `timeout` elapses.
    pub fn acquire(&self) -> Result<BlockingGuard, PriorityError> {
        let deadline = Instant::now() + self.0.timeout;
        loop {
            if let Ok(guard) = self.0.delegate.acquire() {
                return Ok(BlockingGuard {
                    limiter: Arc::clone(&self.0),
                    inner: Some(guard),
                });
            }
            let mut gate = self.0.gate.lock();
            let now = Instant::now();
            if now >= deadline {
                #[cfg(feature = "tracing")]
                tracing::trace!("waiter timed out in blocking limiter");
                return Err(PriorityError::WaitTimeout);
            }
            self.0.wake.wait_for(&mut gate, deadline - now);
        }
    }

    #[must_use]
    pub fn get_limit(&self) -> usize {
        self.0.delegate.get_limit()
    }
}

/// Returned by [`BlockingLimiter::acquire`]. Forwards completion to the
/// delegate, then wakes every parked waiter (spec §4.9: "wake on any
/// release").
#[must_use = "dropping this guard without calling `complete` leaks an inflight slot"]
pub struct BlockingGuard {
    limiter: Arc<Inner>,
    inner: Option<AcquireGuard>,
}

impl BlockingGuard {
    pub fn complete(mut self, outcome: Outcome) {
        if let Some(g) = self.inner.take() {
            g.complete(outcome);
        }
    }
}

impl Drop for BlockingGuard {
    fn drop(&mut self) {
        self.inner.take();
        let _gate = self.limiter.gate.lock();
        self.limiter.wake.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limits_core::{FakeClock, FixedLimit};
    use std::thread;

    fn make(limit: usize, timeout: Duration) -> BlockingLimiter {
        let clock = Arc::new(FakeClock::new());
        let delegate = SimpleLimiter::new(Arc::new(FixedLimit::new(limit)), clock);
        BlockingLimiter::new(delegate, timeout)
    }

    #[test]
    fn admits_immediately_when_under_the_limit() {
        let l = make(1, Duration::from_millis(50));
        let g = l.acquire().unwrap();
        g.complete(Outcome::Success);
    }

    #[test]
    fn times_out_when_never_released() {
        let l = make(1, Duration::from_millis(20));
        let _held = l.acquire().unwrap();
        let err = l.acquire().unwrap_err();
        assert_eq!(err, PriorityError::WaitTimeout);
    }

    #[test]
    fn wakes_and_admits_once_a_slot_is_released() {
        let l = make(1, Duration::from_millis(500));
        let held = l.acquire().unwrap();

        let l2 = l.clone();
        let waiter = thread::spawn(move || l2.acquire().map(|g| g.complete(Outcome::Success)));

        thread::sleep(Duration::from_millis(10));
        held.complete(Outcome::Success);

        assert!(waiter.join().unwrap().is_ok());
    }
}
