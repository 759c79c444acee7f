//! The admission-control surface (spec §4.7): acquire a token, do the work,
//! report what happened.
//!
//! The source threads an opaque "context" map through `acquire`/`release` so
//! that a priority backlog can stash its queue position there. Spec §9
//! replaces that with an explicit value-typed listener returned from
//! `acquire` — no hidden map, no downcast. A caller that drops the listener
//! without calling `complete` leaves the in-flight count permanently
//! inflated, the same leak the source has if `release` is never called.

use crate::limit::Limit;
use crate::error::LimiterError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What happened to the work the token admitted (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Completed normally within the expected latency envelope.
    Success,
    /// Completed, but signals overload (e.g. a 503, a queue-full response).
    /// Folded into the estimator as a dropped sample.
    Dropped,
    /// Completed, but for a reason uninformative about capacity (e.g. a 4xx
    /// client error). Excluded from the sample entirely.
    Ignored,
}

/// A trait object for anything that can gate concurrency (spec §4.7). Kept
/// separate from [`Limit`]: a `Limiter` owns admission (the inflight count,
/// start-time bookkeeping) while a `Limit` owns the estimate.
pub trait Limiter: Send + Sync {
    /// Attempts to admit one unit of work. `Ok` carries the listener the
    /// caller must call [`AcquireGuard::complete`] on exactly once; `Err`
    /// means the limit is currently exhausted.
    fn acquire(&self) -> Result<AcquireGuard, LimiterError>;

    fn get_limit(&self) -> usize;
}

struct Inner {
    limit: Arc<dyn Limit>,
    inflight: AtomicUsize,
    clock: Arc<dyn crate::clock::Clock>,
}

/// Returned by a successful [`Limiter::acquire`]. Value-typed rather than a
/// boxed closure (spec §9): the caller reports the outcome directly instead
/// of going through a listener interface. Owns an `Arc` back to the limiter
/// it came from (not a borrow) so it can cross a thread boundary — the
/// priority limiter's backlog hands a guard to its waiter through a
/// rendezvous channel (spec §4.8).
#[must_use = "dropping this guard without calling `complete` leaks an inflight slot"]
pub struct AcquireGuard {
    inner: Arc<Inner>,
    start_nanos: u64,
    completed: bool,
}

impl AcquireGuard {
    pub fn complete(mut self, outcome: Outcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Outcome) {
        if self.completed {
            return;
        }
        self.completed = true;
        let inflight = self.inner.inflight.fetch_sub(1, Ordering::AcqRel) - 1;
        if outcome == Outcome::Ignored {
            return;
        }
        let rtt_nanos = self.inner.clock.now_nanos().saturating_sub(self.start_nanos);
        self.inner.limit.on_sample(
            self.start_nanos,
            Duration::from_nanos(rtt_nanos),
            inflight,
            outcome == Outcome::Dropped,
        );
    }
}

impl Drop for AcquireGuard {
    fn drop(&mut self) {
        if !self.completed {
            // A guard dropped without `complete` is treated as `Ignored`:
            // the inflight slot is released but no sample is recorded,
            // matching "uninformative about capacity" rather than silently
            // leaking the slot forever.
            self.finish(Outcome::Ignored);
        }
    }
}

/// The baseline [`Limiter`]: one atomic inflight counter gated by a
/// [`Limit`] estimator (spec §4.7). Cheap to clone — clones share the same
/// inflight counter and estimator.
#[derive(Clone)]
pub struct SimpleLimiter(Arc<Inner>);

impl SimpleLimiter {
    #[must_use]
    pub fn new(limit: Arc<dyn Limit>, clock: Arc<dyn crate::clock::Clock>) -> Self {
        Self(Arc::new(Inner {
            limit,
            inflight: AtomicUsize::new(0),
            clock,
        }))
    }
}

impl Limiter for SimpleLimiter {
    fn acquire(&self) -> Result<AcquireGuard, LimiterError> {
        let limit = self.0.limit.get_limit();
        let inflight = self.0.inflight.fetch_add(1, Ordering::AcqRel) + 1;
        if inflight > limit {
            self.0.inflight.fetch_sub(1, Ordering::AcqRel);
            return Err(LimiterError::LimitExceeded);
        }
        Ok(AcquireGuard {
            inner: Arc::clone(&self.0),
            start_nanos: self.0.clock.now_nanos(),
            completed: false,
        })
    }

    fn get_limit(&self) -> usize {
        self.0.limit.get_limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::limit::FixedLimit;

    fn limiter(limit: usize) -> SimpleLimiter {
        SimpleLimiter::new(Arc::new(FixedLimit::new(limit)), Arc::new(FakeClock::new()))
    }

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let l = limiter(2);
        let g1 = l.acquire().unwrap();
        let g2 = l.acquire().unwrap();
        assert!(l.acquire().is_err());
        g1.complete(Outcome::Success);
        let g3 = l.acquire().unwrap();
        g2.complete(Outcome::Success);
        g3.complete(Outcome::Success);
    }

    #[test]
    fn dropping_guard_without_complete_releases_as_ignored() {
        let l = limiter(1);
        {
            let _g = l.acquire().unwrap();
            assert!(l.acquire().is_err());
        }
        // Guard dropped; slot released.
        let g = l.acquire().unwrap();
        g.complete(Outcome::Success);
    }

    #[test]
    fn complete_is_idempotent_across_double_drop() {
        let l = limiter(1);
        let g = l.acquire().unwrap();
        g.complete(Outcome::Success);
        assert!(l.acquire().is_ok());
    }

    #[test]
    fn zero_limit_rejects_immediately() {
        let l = limiter(0);
        assert!(l.acquire().is_err());
    }
}
