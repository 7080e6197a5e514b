//! # Sink trait.
//!
//! Provides [`Sink`], the capability set every observer of a command implements:
//! lifecycle notifications, stream notifications and a final close.
//!
//! ## Architecture
//! ```text
//! Broadcaster::dispatch(Event)
//!     ├──► task ──► sink1.on_lifecycle / on_stream_* ──┐
//!     ├──► task ──► sink2.on_lifecycle / on_stream_* ──┼──► join (barrier)
//!     └──► task ──► sinkN.on_lifecycle / on_stream_* ──┘
//! ```
//!
//! ## Rules
//! - A sink is called for one event at a time, in dispatch order.
//! - Errors are returned, never panicked; the broadcaster logs them and moves on.
//! - `close` is called at most once, after the command's final event.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use jobvisor::{Event, EventKind, Sink, SinkError, Stream};
//!
//! struct Failures;
//!
//! #[async_trait]
//! impl Sink for Failures {
//!     fn name(&self) -> &'static str { "failures" }
//!
//!     async fn on_lifecycle(&self, ev: &Event) -> Result<(), SinkError> {
//!         if matches!(ev.kind, EventKind::AttemptFail { .. }) {
//!             // page someone
//!         }
//!         Ok(())
//!     }
//!
//!     async fn on_stream_chunk(&self, _: u32, _: Stream, _: &[u8]) -> Result<(), SinkError> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::SinkError;
use crate::events::{Event, Stream};

/// Observer of a command's lifecycle.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Own every resource exclusively (files, connections); sinks share nothing.
/// - Report failures through `SinkError`; do not panic.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Returns the sink name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Handles a command or attempt event.
    async fn on_lifecycle(&self, event: &Event) -> Result<(), SinkError>;

    /// A drain started reading `stream` for `attempt`.
    async fn on_stream_open(&self, attempt: u32, stream: Stream) -> Result<(), SinkError> {
        let _ = (attempt, stream);
        Ok(())
    }

    /// One chunk read from `stream`.
    async fn on_stream_chunk(
        &self,
        attempt: u32,
        stream: Stream,
        data: &[u8],
    ) -> Result<(), SinkError>;

    /// A drain finished reading `stream` for `attempt`.
    async fn on_stream_close(&self, attempt: u32, stream: Stream) -> Result<(), SinkError> {
        let _ = (attempt, stream);
        Ok(())
    }

    /// Releases the sink's resources.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
