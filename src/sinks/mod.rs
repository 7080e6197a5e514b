//! # Event sinks for the jobvisor runtime.
//!
//! This module provides the [`Sink`] trait, the [`Broadcaster`] that fans
//! events out to sinks, and the built-in sinks.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   engine / runner / drains ── dispatch(Event) ──► Broadcaster (barrier)
//!                                                      │
//!                                   ┌──────────────────┼──────────────────┐
//!                                   ▼                  ▼                  ▼
//!                              ConsoleSink          FileSink        TelemetrySink
//!                          (stdout / stderr)   (<dir>/<name>/<id>)   (TCP, JSON lines)
//! ```
//!
//! ## Built-in sinks
//! - [`ConsoleSink`]: lifecycle lines and pass-through output on the terminal
//! - [`FileSink`]: summary log plus per-attempt capture files
//! - [`TelemetrySink`]: tagged records shipped to a log aggregator
//!
//! Custom sinks implement [`Sink`] and are handed to
//! [`Command::with_broadcaster`](crate::Command::with_broadcaster).

mod broadcaster;
mod console;
mod factory;
mod file;
pub(crate) mod format;
mod sink;
mod telemetry;

pub use broadcaster::Broadcaster;
pub use console::ConsoleSink;
pub use factory::build_sinks;
pub use file::{FileSink, SUMMARY_FILE};
pub use sink::Sink;
pub use telemetry::TelemetrySink;
