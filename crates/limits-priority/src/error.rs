use thiserror::Error;

/// Error kinds surfaced by the priority and blocking limiters (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PriorityError {
    /// The delegate limiter rejected admission and no backlog applies
    /// (spec §7: surfaced unchanged from the delegate when not recovered).
    #[error("concurrency limit exceeded")]
    LimitExceeded,
    /// The backlog was already at capacity and the new entry did not
    /// outrank the current tail.
    #[error("priority backlog is full")]
    BacklogOverload,
    /// A higher-ranked entry evicted this one from the backlog before it
    /// was served.
    #[error("evicted from the priority backlog by a higher-priority entry")]
    Evicted,
    /// The entry's deadline elapsed before a slot became available.
    #[error("timed out waiting for a slot in the priority backlog")]
    WaitTimeout,
}

impl From<limits_core::LimiterError> for PriorityError {
    fn from(_: limits_core::LimiterError) -> Self {
        PriorityError::LimitExceeded
    }
}
