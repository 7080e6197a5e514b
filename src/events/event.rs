//! # Lifecycle events emitted while a command runs.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Command events**: start and final verdict of the whole execution
//! - **Attempt events**: start and exactly one terminal event per attempt
//! - **Stream events**: open, chunk, close of each captured output stream
//!
//! The [`Event`] struct wraps a kind with its wall-clock timestamp and the
//! sequence number stamped by the [`Broadcaster`](crate::Broadcaster).
//!
//! ## Ordering guarantees
//! `seq` is assigned at dispatch time and increases strictly per broadcaster.
//! Every sink sees events in `seq` order.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Event, EventKind, Stream};
//!
//! let ev = Event::now(EventKind::StreamOpen { attempt: 2, stream: Stream::Stderr });
//!
//! assert_eq!(ev.kind.label(), "stream_open");
//! assert_eq!(ev.kind.attempt(), Some(2));
//! assert!(ev.kind.span().is_none());
//! ```

use std::fmt;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

/// Captured output stream of the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl Stream {
    /// Stable lowercase label (`"stdout"` / `"stderr"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time range of an attempt or a whole execution.
///
/// `elapsed` is measured on the monotonic clock and `ended_at` is derived from
/// it, so `ended_at - started_at == elapsed` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Wall-clock start.
    pub started_at: DateTime<Local>,
    /// Wall-clock end (`started_at + elapsed`).
    pub ended_at: DateTime<Local>,
    /// Monotonic duration.
    pub elapsed: Duration,
}

impl Span {
    /// Closes a span opened at `started_at`, measuring with `clock`.
    pub fn close(started_at: DateTime<Local>, clock: Instant) -> Self {
        Self::from_elapsed(started_at, clock.elapsed())
    }

    /// Builds a span from a start and a known duration.
    pub fn from_elapsed(started_at: DateTime<Local>, elapsed: Duration) -> Self {
        let ended_at = chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|delta| started_at.checked_add_signed(delta))
            .unwrap_or(started_at);
        Self {
            started_at,
            ended_at,
            elapsed,
        }
    }

    /// Elapsed time in fractional seconds.
    #[inline]
    pub fn secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Classification of lifecycle events.
#[derive(Debug, Clone)]
pub enum EventKind {
    // === Command events ===
    /// Execution started; emitted once, before the first attempt.
    CommandStart,

    /// Some attempt succeeded.
    CommandSucceed {
        /// Execution start to verdict.
        span: Span,
    },

    /// Every attempt failed.
    CommandFail {
        /// Execution start to verdict.
        span: Span,
    },

    // === Attempt events ===
    /// The child process was spawned.
    AttemptStart {
        /// 1-based attempt number.
        attempt: u32,
        /// OS process id, when the platform reports one.
        pid: Option<u32>,
    },

    /// The child exited with status 0 before the deadline.
    AttemptSucceed {
        /// 1-based attempt number.
        attempt: u32,
        /// Attempt start to exit.
        span: Span,
    },

    /// The child exited with a non-zero status before the deadline.
    AttemptFail {
        /// 1-based attempt number.
        attempt: u32,
        /// Exit status reported by the OS.
        status: ExitStatus,
        /// Attempt start to exit.
        span: Span,
    },

    /// The deadline elapsed; the child was killed and reaped.
    AttemptTimeout {
        /// 1-based attempt number.
        attempt: u32,
        /// Attempt start to termination confirmation.
        span: Span,
    },

    /// The attempt could not be carried out (spawn or pipe failure, wait error).
    AttemptUnknownError {
        /// 1-based attempt number.
        attempt: u32,
        /// Human-readable cause.
        error: Arc<str>,
        /// Attempt start to failure.
        span: Span,
    },

    // === Stream events ===
    /// A drain started reading a stream.
    StreamOpen {
        /// 1-based attempt number.
        attempt: u32,
        /// Which stream.
        stream: Stream,
    },

    /// One non-empty read from a stream.
    StreamChunk {
        /// 1-based attempt number.
        attempt: u32,
        /// Which stream.
        stream: Stream,
        /// Raw bytes as read.
        data: Arc<[u8]>,
    },

    /// A drain observed end-of-stream (or a read error).
    StreamClose {
        /// 1-based attempt number.
        attempt: u32,
        /// Which stream.
        stream: Stream,
    },
}

impl EventKind {
    /// Returns a short stable label (snake_case).
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::CommandStart => "command_start",
            EventKind::CommandSucceed { .. } => "command_succeed",
            EventKind::CommandFail { .. } => "command_fail",
            EventKind::AttemptStart { .. } => "attempt_start",
            EventKind::AttemptSucceed { .. } => "attempt_succeed",
            EventKind::AttemptFail { .. } => "attempt_fail",
            EventKind::AttemptTimeout { .. } => "attempt_timeout",
            EventKind::AttemptUnknownError { .. } => "attempt_unknown_error",
            EventKind::StreamOpen { .. } => "stream_open",
            EventKind::StreamChunk { .. } => "stream_chunk",
            EventKind::StreamClose { .. } => "stream_close",
        }
    }

    /// Attempt number carried by attempt and stream events.
    pub fn attempt(&self) -> Option<u32> {
        match self {
            EventKind::AttemptStart { attempt, .. }
            | EventKind::AttemptSucceed { attempt, .. }
            | EventKind::AttemptFail { attempt, .. }
            | EventKind::AttemptTimeout { attempt, .. }
            | EventKind::AttemptUnknownError { attempt, .. }
            | EventKind::StreamOpen { attempt, .. }
            | EventKind::StreamChunk { attempt, .. }
            | EventKind::StreamClose { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }

    /// Span carried by terminal events.
    pub fn span(&self) -> Option<&Span> {
        match self {
            EventKind::CommandSucceed { span }
            | EventKind::CommandFail { span }
            | EventKind::AttemptSucceed { span, .. }
            | EventKind::AttemptFail { span, .. }
            | EventKind::AttemptTimeout { span, .. }
            | EventKind::AttemptUnknownError { span, .. } => Some(span),
            _ => None,
        }
    }
}

/// Lifecycle event with its timestamp.
///
/// - `seq`: dispatch order, stamped by the broadcaster (`0` until dispatched)
/// - `at`: start time for start events, end time for terminal events,
///   creation time for stream events
#[derive(Debug, Clone)]
pub struct Event {
    /// Dispatch sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: DateTime<Local>,
    /// Event classification and payload.
    pub kind: EventKind,
}

impl Event {
    /// Creates an event stamped with an explicit time.
    pub fn at(at: DateTime<Local>, kind: EventKind) -> Self {
        Self { seq: 0, at, kind }
    }

    /// Creates an event stamped with the current time.
    pub fn now(kind: EventKind) -> Self {
        Self::at(Local::now(), kind)
    }

    /// Creates a terminal event stamped with the end of its span.
    pub fn ended(kind: EventKind) -> Self {
        let at = kind.span().map(|s| s.ended_at).unwrap_or_else(Local::now);
        Self::at(at, kind)
    }

    /// Creates a chunk event from raw bytes.
    pub fn chunk(attempt: u32, stream: Stream, data: &[u8]) -> Self {
        Self::now(EventKind::StreamChunk {
            attempt,
            stream,
            data: Arc::from(data),
        })
    }
}
