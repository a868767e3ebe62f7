//! Error types for the scheduler crate.
//!
//! Only schedule definitions can be rejected. Scheduling, cancelling and
//! firing jobs operate on in-memory maps and have no failure mode; a
//! callback's own error is logged by the scheduler, never returned.

/// Errors from schedule operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Invalid cron expression.
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },
    /// Schedule evaluation failed.
    #[error("schedule evaluation failed: {reason}")]
    EvaluationFailed { reason: String },
    /// Invalid timezone.
    #[error("invalid timezone: {timezone}")]
    InvalidTimezone { timezone: String },
}
