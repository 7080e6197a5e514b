//! Lifecycle events: types only.
//!
//! This module groups the event **data model** produced by the retry engine,
//! the attempt runner and the output drains.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload
//! - [`Stream`] which output stream a stream event belongs to
//! - [`Span`] start/end/elapsed of an attempt or execution
//!
//! ## Quick reference
//! - **Producers**: `core::engine` (command events), `core::runner` (attempt
//!   events), `core::drain` (stream events).
//! - **Consumer**: [`Broadcaster`](crate::Broadcaster), which fans events out to sinks.

mod event;

pub use event::{Event, EventKind, Span, Stream};
