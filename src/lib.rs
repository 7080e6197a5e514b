//! # jobvisor
//!
//! **Jobvisor** runs one external command under supervision: every attempt
//! gets an optional timeout, failed attempts are retried up to a fixed budget,
//! and every lifecycle step is reported to a set of independent sinks.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!            Config ──► Command::from_config ──► build sinks
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  engine (retry loop)                                              │
//! │  CommandStart ─► attempt 1..=N ─► CommandSucceed | CommandFail    │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  runner (one attempt)                                             │
//! │  spawn ─► AttemptStart ─► wait() vs deadline ─► kill on timeout   │
//! │             │                                                     │
//! │             ├─► drain(stdout) ─► StreamOpen/Chunk*/Close          │
//! │             └─► drain(stderr) ─► StreamOpen/Chunk*/Close          │
//! │  join drains ─► terminal attempt event                            │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼  dispatch(Event), awaited
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Broadcaster (serialized, barrier per event)                      │
//! └──────┬──────────────────────┬──────────────────────┬──────────────┘
//!        ▼                      ▼                      ▼
//!   ConsoleSink              FileSink             TelemetrySink
//! ```
//!
//! ### Ordering
//! ```text
//! CommandStart
//!   AttemptStart(1) ─► stream events(1) ─► AttemptFail | AttemptTimeout | ...
//!   AttemptStart(2) ─► stream events(2) ─► AttemptSucceed
//! CommandSucceed
//! ```
//! Every sink observes events in exactly this order. A spawn failure skips
//! `AttemptStart` and the stream events of that attempt.
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                       |
//! |-------------------|----------------------------------------------------------|------------------------------------------|
//! | **Command**       | Validate, run and close one supervised command.          | [`Command`], [`Execution`]               |
//! | **Outcomes**      | How each attempt ended.                                  | [`Outcome`]                              |
//! | **Events**        | Lifecycle notifications with timestamps and spans.       | [`Event`], [`EventKind`], [`Span`]       |
//! | **Sinks**         | Observe events; built-in console, file and telemetry.    | [`Sink`], [`Broadcaster`]                |
//! | **Errors**        | Typed configuration, runtime and sink errors.            | [`ConfigError`], [`RuntimeError`]        |
//! | **Configuration** | Command line, policy and sink settings.                  | [`Config`], [`SinkKind`]                 |
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use jobvisor::{Command, Config, SinkKind};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::new("/usr/local/bin/backup.sh", ["--full"]);
//!     cfg.timeout = Duration::from_secs(600);
//!     cfg.max_attempts = 3;
//!     cfg.sinks = vec![SinkKind::Console, SinkKind::File];
//!
//!     let ok = Command::from_config(&cfg).await?.run().await?;
//!     std::process::exit(if ok { 0 } else { 1 });
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod sinks;

pub mod logging;

// ---- Public re-exports ----

pub use config::{
    Config, DEFAULT_FILE_DIR, DEFAULT_TAG_PREFIX, DEFAULT_TELEMETRY_HOST, DEFAULT_TELEMETRY_PORT,
    FileSinkConfig, SinkKind, TelemetrySinkConfig,
};
pub use crate::core::{Command, CommandId, CommandIdentity, Execution, Outcome};
pub use error::{ConfigError, RuntimeError, SinkError};
pub use events::{Event, EventKind, Span, Stream};
pub use sinks::{
    Broadcaster, ConsoleSink, FileSink, SUMMARY_FILE, Sink, TelemetrySink, build_sinks,
};
