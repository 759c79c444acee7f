use thiserror::Error;

/// Errors surfaced by the simple limiter's admission test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimiterError {
    /// The configured limit is already saturated by in-flight work.
    #[error("concurrency limit exceeded")]
    LimitExceeded,
}
