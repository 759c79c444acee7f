//! Priority admission backlog (spec §4.8) — wraps a delegate limiter with a
//! bounded, priority-ordered wait queue so rejected callers can queue for a
//! slot instead of failing immediately.

use crate::error::PriorityError;
use crate::rng::SkipListRng;
use crate::skiplist::SkipList;
use limits_core::{AcquireGuard, Clock, Limiter, Outcome, SharedClock, SimpleLimiter};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

/// Tunables for [`PriorityLimiter`] (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct PriorityConfig {
    pub backlog_size: usize,
    pub timeout: Duration,
    pub fifo_mode: bool,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            backlog_size: 64,
            timeout: Duration::from_secs(1),
            fifo_mode: false,
        }
    }
}

type SignalOutcome = Result<PriorityGuard, PriorityError>;

struct BacklogEntry {
    priority: i32,
    deadline_nanos: u64,
    cancelled: Arc<AtomicBool>,
    sender: crossbeam_channel::Sender<SignalOutcome>,
}

/// Total order over backlog entries (spec §4.8): FIFO mode ranks earlier
/// deadlines first; the default ranks higher priority first, breaking ties
/// by later deadline (LIFO within a priority tier).
fn less(fifo_mode: bool) -> impl Fn(&BacklogEntry, &BacklogEntry) -> Ordering {
    move |a, b| {
        if fifo_mode {
            a.deadline_nanos.cmp(&b.deadline_nanos)
        } else {
            match b.priority.cmp(&a.priority) {
                Ordering::Equal => b.deadline_nanos.cmp(&a.deadline_nanos),
                other => other,
            }
        }
    }
}

type Deque = SkipList<BacklogEntry, Box<dyn Fn(&BacklogEntry, &BacklogEntry) -> Ordering + Send>>;

struct Inner {
    delegate: SimpleLimiter,
    deque: Mutex<Deque>,
    rng: Mutex<Box<dyn SkipListRng + Send>>,
    config: PriorityConfig,
    clock: SharedClock,
}

/// Wraps a delegate [`SimpleLimiter`] with a bounded priority backlog (spec
/// §4.8). Rejections from the delegate are recovered by enqueuing rather
/// than surfaced directly, unlike [`PriorityError::BacklogOverload`] /
/// [`PriorityError::Evicted`] / [`PriorityError::WaitTimeout`], which are
/// not recovered further (spec §7).
#[derive(Clone)]
pub struct PriorityLimiter(Arc<Inner>);

impl PriorityLimiter {
    #[must_use]
    pub fn new(
        delegate: SimpleLimiter,
        config: PriorityConfig,
        clock: SharedClock,
        rng: Box<dyn SkipListRng + Send>,
    ) -> Self {
        Self(Arc::new(Inner {
            delegate,
            deque: Mutex::new(SkipList::new(Box::new(less(config.fifo_mode)))),
            rng: Mutex::new(rng),
            config,
            clock,
        }))
    }

    /// Attempts admission at the given `priority`, waiting in the backlog
    /// past an immediate rejection until `min(deadline_nanos, now + timeout)`
    /// (spec §4.8 step 2). `priority` follows the source's "default 0 when
    /// absent" convention — callers with no opinion on priority pass `0`.
    pub fn acquire(&self, priority: i32, deadline_nanos: u64) -> Result<PriorityGuard, PriorityError> {
        if let Ok(guard) = self.0.delegate.acquire() {
            return Ok(PriorityGuard {
                limiter: Arc::clone(&self.0),
                inner: Some(guard),
            });
        }

        let now = self.0.clock.now_nanos();
        let timeout_nanos = self.0.config.timeout.as_nanos() as u64;
        let entry_deadline = deadline_nanos.min(now.saturating_add(timeout_nanos));
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::bounded::<SignalOutcome>(0);
        let entry = BacklogEntry {
            priority,
            deadline_nanos: entry_deadline,
            cancelled: Arc::clone(&cancelled),
            sender: tx,
        };

        let evicted = {
            let mut deque = self.0.deque.lock();
            let mut rng = self.0.rng.lock();
            match deque.offer_bounded(entry, self.0.config.backlog_size, &mut **rng) {
                Ok(evicted) => evicted,
                Err(_refused) => return Err(PriorityError::BacklogOverload),
            }
        };
        if let Some(evicted_entry) = evicted {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                priority = evicted_entry.priority,
                new_priority = priority,
                "backlog full, evicting lower-priority waiter"
            );
            let _ = evicted_entry.sender.try_send(Err(PriorityError::Evicted));
        }

        let wait_nanos = entry_deadline.saturating_sub(now);
        match rx.recv_timeout(Duration::from_nanos(wait_nanos)) {
            Ok(outcome) => outcome,
            Err(_timeout_or_disconnected) => {
                cancelled.store(true, AtomicOrdering::SeqCst);
                #[cfg(feature = "tracing")]
                tracing::trace!(priority, wait_nanos, "waiter timed out in priority backlog");
                Err(PriorityError::WaitTimeout)
            }
        }
    }

    #[must_use]
    pub fn get_limit(&self) -> usize {
        self.0.delegate.get_limit()
    }

    /// Number of waiters currently backlogged. Exposed for tests and
    /// observability, not part of the admission contract.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.0.deque.lock().len()
    }
}

/// Invoked after every release (spec §4.8 `signal()`): wakes the
/// highest-ranked live waiter, if the delegate now has room.
fn signal(inner: &Arc<Inner>) {
    loop {
        let claimed = {
            let mut deque = inner.deque.lock();
            loop {
                match deque.peek_first() {
                    None => return,
                    Some(e) if e.cancelled.load(AtomicOrdering::SeqCst) => {
                        deque.poll_first();
                    }
                    Some(_) => break,
                }
            }
            match inner.delegate.acquire() {
                Ok(guard) => {
                    let entry = deque.poll_first().expect("front checked above");
                    Some((entry, guard))
                }
                Err(_) => None,
            }
        };

        match claimed {
            None => return, // still saturated; the next release will retry
            Some((entry, guard)) => {
                let priority_guard = PriorityGuard {
                    limiter: Arc::clone(inner),
                    inner: Some(guard),
                };
                match entry.sender.try_send(Ok(priority_guard)) {
                    Ok(()) => return,
                    Err(crossbeam_channel::TrySendError::Full(Ok(guard)))
                    | Err(crossbeam_channel::TrySendError::Disconnected(Ok(guard))) => {
                        // Rendezvous lost the race against a cancellation or
                        // timeout: release the claimed slot instead of
                        // leaking it (spec §4.8 step 5 / §7 ignored-release
                        // compensation). `complete` re-enters `signal`.
                        guard.complete(Outcome::Ignored);
                        return;
                    }
                    Err(_) => unreachable!("message sent was always Ok(..)"),
                }
            }
        }
    }
}

/// Returned by [`PriorityLimiter::acquire`]. Forwards completion to the
/// delegate's listener, then calls [`signal`] to wake the next waiter (spec
/// §4.8 step 1).
#[must_use = "dropping this guard without calling `complete` leaks an inflight slot"]
pub struct PriorityGuard {
    limiter: Arc<Inner>,
    inner: Option<AcquireGuard>,
}

impl PriorityGuard {
    pub fn complete(mut self, outcome: Outcome) {
        if let Some(g) = self.inner.take() {
            g.complete(outcome);
        }
    }
}

impl Drop for PriorityGuard {
    fn drop(&mut self) {
        // If `inner` is still `Some`, this path drops the delegate guard
        // implicitly (its own `Drop` releases as `Outcome::Ignored`).
        self.inner.take();
        signal(&self.limiter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limits_core::{FakeClock, FixedLimit};
    use rand::rngs::mock::StepRng;

    fn make(backlog_size: usize, timeout_ms: u64, fifo_mode: bool) -> (PriorityLimiter, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new());
        let delegate = SimpleLimiter::new(Arc::new(FixedLimit::new(1)), clock.clone());
        let limiter = PriorityLimiter::new(
            delegate,
            PriorityConfig {
                backlog_size,
                timeout: Duration::from_millis(timeout_ms),
                fifo_mode,
            },
            clock.clone(),
            Box::new(StepRng::new(0xAAAA_AAAA, 0x1234_5678_9ABC_DEF0)),
        );
        (limiter, clock)
    }

    #[test]
    fn immediate_admission_when_delegate_has_room() {
        let (limiter, _clock) = make(4, 1000, false);
        let guard = limiter.acquire(0, u64::MAX).unwrap();
        guard.complete(Outcome::Success);
    }

    #[test]
    fn overload_rejects_once_backlog_is_full() {
        let (limiter, _clock) = make(0, 10_000_000, false);
        let _held = limiter.acquire(0, u64::MAX).unwrap();
        // backlog_size 0: immediate rejection with no room to enqueue.
        let err = limiter.acquire(0, 1).unwrap_err();
        assert_eq!(err, PriorityError::BacklogOverload);
    }

    #[test]
    fn timeout_fires_when_delegate_never_frees_a_slot() {
        let (limiter, _clock) = make(4, 1, false);
        let _held = limiter.acquire(0, u64::MAX).unwrap();
        let err = limiter.acquire(0, u64::MAX).unwrap_err();
        assert_eq!(err, PriorityError::WaitTimeout);
    }

    #[test]
    fn higher_priority_waiter_is_served_before_lower_priority_one() {
        use std::sync::mpsc;
        use std::thread;

        let (limiter, _clock) = make(4, 2000, false);
        let held = limiter.acquire(0, u64::MAX).unwrap();

        let (order_tx, order_rx) = mpsc::channel();
        let l_low = limiter.clone();
        let tx_low = order_tx.clone();
        let low = thread::spawn(move || {
            let g = l_low.acquire(1, u64::MAX).unwrap();
            tx_low.send("low").unwrap();
            g.complete(Outcome::Success);
        });
        // Ensure the low-priority waiter enqueues first.
        while limiter.backlog_len() < 1 {
            std::thread::yield_now();
        }
        let l_high = limiter.clone();
        let tx_high = order_tx;
        let high = thread::spawn(move || {
            let g = l_high.acquire(10, u64::MAX).unwrap();
            tx_high.send("high").unwrap();
            g.complete(Outcome::Success);
        });
        while limiter.backlog_len() < 2 {
            std::thread::yield_now();
        }

        held.complete(Outcome::Success); // frees a slot; signal() wakes highest priority first
        assert_eq!(order_rx.recv().unwrap(), "high");
        assert_eq!(order_rx.recv().unwrap(), "low");
        low.join().unwrap();
        high.join().unwrap();
    }
}
