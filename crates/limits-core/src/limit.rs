//! The [`Limit`] abstraction (spec §4.6) and its concrete variants.
//!
//! The Go source models this as a base struct whose `OnSample` panics unless
//! a subtype overrides it — a workaround for lacking abstract methods. Per
//! spec §9 this is replaced with a plain trait with no default
//! implementation; `Gradient2Limit`, `FixedLimit`, and `WindowedLimit<L>` are
//! independent implementors, not subclasses of a shared base.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A limit-change listener. Must not re-enter `set_limit` on the same
/// `Limit` instance (spec §4.6) — doing so panics rather than deadlocking
/// silently.
pub type ChangeListener = Box<dyn Fn(usize) + Send + Sync>;

thread_local! {
    static NOTIFYING: Cell<bool> = const { Cell::new(false) };
}

/// The estimator interface every limit algorithm implements (spec §6).
pub trait Limit: Send + Sync {
    fn get_limit(&self) -> usize;
    fn on_sample(&self, start_nanos: u64, rtt: Duration, inflight: usize, dropped: bool);
    fn notify_change(&self, listener: ChangeListener);
    fn identity(&self) -> &str;
}

/// Shared bookkeeping for an atomically-readable limit plus its listeners.
/// Used as a building block by [`crate::gradient::Gradient2Limit`]; not
/// itself a `Limit` impl (no `on_sample` of its own), avoiding the
/// panic-on-override base-class pattern from the source.
pub struct LimitPublisher {
    id: String,
    limit: AtomicUsize,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl LimitPublisher {
    #[must_use]
    pub fn new(id: impl Into<String>, initial: usize) -> Self {
        Self {
            id: id.into(),
            limit: AtomicUsize::new(initial),
            listeners: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn get(&self) -> usize {
        self.limit.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.id
    }

    pub fn notify_change(&self, listener: ChangeListener) {
        self.listeners.lock().unwrap().push(listener);
    }

    /// Publishes a new limit. No-op if unchanged (spec §4.6). Panics if a
    /// listener re-enters `set` on this instance.
    pub fn set(&self, new: usize) {
        if self.limit.load(Ordering::Acquire) == new {
            return;
        }
        self.limit.store(new, Ordering::Release);
        self.publish(new);
    }

    fn publish(&self, new: usize) {
        let reentrant = NOTIFYING.with(Cell::get);
        assert!(
            !reentrant,
            "Limit listener re-entered set_limit on the same instance ({})",
            self.id
        );
        NOTIFYING.with(|c| c.set(true));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let listeners = self.listeners.lock().unwrap();
            for listener in listeners.iter() {
                listener(new);
            }
        }));
        NOTIFYING.with(|c| c.set(false));
        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    }
}

/// A limiter that never adapts: `get_limit()` always returns the configured
/// value. The thin pass-through collaborator named out of scope for the
/// core's adaptive logic in spec §1, kept as the fixed baseline every other
/// `Limit` is compared against in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedLimit(usize);

impl FixedLimit {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self(limit)
    }
}

impl Limit for FixedLimit {
    fn get_limit(&self) -> usize {
        self.0
    }

    fn on_sample(&self, _start_nanos: u64, _rtt: Duration, _inflight: usize, _dropped: bool) {}

    fn notify_change(&self, _listener: ChangeListener) {}

    fn identity(&self) -> &str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Arc;

    #[test]
    fn set_is_noop_when_unchanged() {
        let publisher = LimitPublisher::new("t", 10);
        let calls = Arc::new(StdAtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        publisher.notify_change(Box::new(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        publisher.set(10);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        publisher.set(11);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.get(), 11);
    }

    #[test]
    #[should_panic(expected = "re-entered set_limit")]
    fn reentrant_set_limit_panics() {
        let publisher = Arc::new(LimitPublisher::new("t", 10));
        let inner = Arc::clone(&publisher);
        publisher.notify_change(Box::new(move |_| {
            inner.set(12);
        }));
        publisher.set(11);
    }

    #[test]
    fn fixed_limit_never_changes() {
        let f = FixedLimit::new(42);
        assert_eq!(f.get_limit(), 42);
        f.on_sample(0, Duration::from_millis(1), 5, false);
        assert_eq!(f.get_limit(), 42);
    }
}
