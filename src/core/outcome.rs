//! # Attempt outcome classification.
//!
//! Every attempt ends in exactly one [`Outcome`]. The outcome is turned into
//! the attempt's terminal event by [`Outcome::into_event`].
//!
//! ```text
//! exit status 0 before deadline      → Success
//! exit status != 0 before deadline   → ExitFailure { status }
//! deadline elapsed, process killed   → Timeout
//! spawn / pipe / wait failure        → UnknownError { cause }
//! ```

use std::process::ExitStatus;
use std::sync::Arc;

use crate::events::{Event, EventKind, Span};

/// How one attempt ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Exited with status 0.
    Success {
        /// Attempt start to exit.
        span: Span,
    },
    /// Exited with a non-zero status.
    ExitFailure {
        /// Status reported by the OS.
        status: ExitStatus,
        /// Attempt start to exit.
        span: Span,
    },
    /// Killed after the per-attempt deadline.
    Timeout {
        /// Attempt start to termination confirmation.
        span: Span,
    },
    /// Any other failure.
    UnknownError {
        /// Human-readable cause.
        cause: Arc<str>,
        /// Attempt start to failure.
        span: Span,
    },
}

impl Outcome {
    /// True only for [`Outcome::Success`].
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::ExitFailure { .. } => "exit_failure",
            Outcome::Timeout { .. } => "timeout",
            Outcome::UnknownError { .. } => "unknown_error",
        }
    }

    /// Time range of the attempt.
    pub fn span(&self) -> &Span {
        match self {
            Outcome::Success { span }
            | Outcome::ExitFailure { span, .. }
            | Outcome::Timeout { span }
            | Outcome::UnknownError { span, .. } => span,
        }
    }

    /// Builds the terminal attempt event for this outcome.
    pub fn into_event(self, attempt: u32) -> Event {
        let kind = match self {
            Outcome::Success { span } => EventKind::AttemptSucceed { attempt, span },
            Outcome::ExitFailure { status, span } => EventKind::AttemptFail {
                attempt,
                status,
                span,
            },
            Outcome::Timeout { span } => EventKind::AttemptTimeout { attempt, span },
            Outcome::UnknownError { cause, span } => EventKind::AttemptUnknownError {
                attempt,
                error: cause,
                span,
            },
        };
        Event::ended(kind)
    }
}
