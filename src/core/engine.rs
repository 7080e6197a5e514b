//! # Retry engine: drives attempts until one succeeds or the budget is spent.
//!
//! ## Event flow
//! ```text
//! CommandStart
//!   ├─► attempt 1 ─► AttemptStart ─► stream events ─► terminal attempt event
//!   ├─► attempt 2 ─► ...                 (only if attempt 1 did not succeed)
//!   └─► attempt N
//! CommandSucceed | CommandFail
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially**, numbered from 1, without delay in between.
//! - The loop stops at the first success or after `max_attempts` attempts.
//! - Timeouts and unknown errors are retried like exit failures.
//! - Exactly one final command event, unless a fatal error aborts the run.

use std::time::Instant;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::core::Command;
use crate::core::outcome::Outcome;
use crate::core::runner::{millis, run_attempt};
use crate::error::RuntimeError;
use crate::events::{Event, EventKind, Span};

/// Summary of one finished execution.
#[derive(Debug, Clone)]
pub struct Execution {
    /// True if the last attempt succeeded.
    pub success: bool,
    /// Outcome of every attempt, in order.
    pub outcomes: Vec<Outcome>,
    /// Execution start to verdict.
    pub span: Span,
}

impl Execution {
    /// Number of attempts that ran.
    #[inline]
    pub fn attempts(&self) -> u32 {
        u32::try_from(self.outcomes.len()).unwrap_or(u32::MAX)
    }
}

/// Runs `cmd` through its retry loop.
///
/// A fatal attempt error aborts the loop and is returned before any final
/// command event is published.
pub(crate) async fn execute(cmd: &Command) -> Result<Execution, RuntimeError> {
    let bus = cmd.broadcaster();
    let started_at = Local::now();
    let clock = Instant::now();

    info!(id = %cmd.id(), name = cmd.name(), max_attempts = cmd.max_attempts(), "command started");
    bus.dispatch(Event::at(started_at, EventKind::CommandStart)).await;

    let mut outcomes = Vec::new();
    for attempt in 1..=cmd.max_attempts() {
        let outcome = match run_attempt(cmd, attempt).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(id = %cmd.id(), attempt, label = e.as_label(), error = %e, "command aborted");
                return Err(e);
            }
        };
        let done = outcome.is_success();
        outcomes.push(outcome);
        if done {
            break;
        }
        if attempt < cmd.max_attempts() {
            debug!(attempt, "attempt did not succeed, retrying");
        }
    }

    let success = outcomes.last().is_some_and(Outcome::is_success);
    let span = Span::close(started_at, clock);
    let kind = if success {
        EventKind::CommandSucceed { span }
    } else {
        EventKind::CommandFail { span }
    };
    bus.dispatch(Event::ended(kind)).await;
    info!(
        id = %cmd.id(),
        success,
        attempts = outcomes.len(),
        elapsed_ms = millis(span.elapsed),
        "command finished"
    );

    Ok(Execution {
        success,
        outcomes,
        span,
    })
}
