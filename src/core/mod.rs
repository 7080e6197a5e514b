//! Runtime core: command, attempts and retries.
//!
//! The public API from this module is [`Command`], the supervised executable,
//! plus the value types it hands back ([`Execution`], [`Outcome`]).
//!
//! Internal modules:
//! - [`command`]: identity, validation and sink wiring;
//! - [`engine`]: the retry loop and command-level events;
//! - [`runner`]: executes one attempt with timeout and kill;
//! - [`drain`]: forwards one output stream to the broadcaster;
//! - [`outcome`]: classification of a finished attempt.

mod command;
mod drain;
mod engine;
mod outcome;
mod runner;

pub use command::{Command, CommandId, CommandIdentity};
pub use engine::Execution;
pub use outcome::Outcome;
