//! # Command: one supervised executable and its observers.
//!
//! A [`Command`] bundles identity ([`CommandIdentity`]), the command line, the
//! attempt policy (timeout, maximum attempts) and the [`Broadcaster`] its
//! events go to. It is immutable once constructed.
//!
//! ## Lifecycle
//! ```text
//! Config ──► Command::from_config ──► validate ──► build sinks ──► Command
//!                                                                    │
//!            Command::run(self) ──► engine::execute ──► Broadcaster::close
//! ```
//!
//! Construction rejects invalid configuration before any sink or process is
//! touched. [`Command::run`] consumes the command, so it executes once.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::debug;

use crate::config::Config;
use crate::core::engine::{self, Execution};
use crate::error::{ConfigError, RuntimeError};
use crate::sinks::{Broadcaster, build_sinks};

/// Opaque, generated command id: `<YYYYMMDD>-<HHMMSS>-<8 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandId(Arc<str>);

impl CommandId {
    /// Generates an id from the local time and 4 random bytes.
    pub fn generate() -> Self {
        let bytes: [u8; 4] = rand::random();
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        Self(format!("{stamp}-{hex}").into())
    }

    /// Borrows the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who a command is: generated id plus human-readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandIdentity {
    /// Generated id.
    pub id: CommandId,
    /// Human-readable name.
    pub name: Arc<str>,
}

impl CommandIdentity {
    /// Creates an identity with a freshly generated id.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: CommandId::generate(),
            name: name.into(),
        }
    }
}

/// A supervised executable with its attempt policy and observers.
pub struct Command {
    identity: CommandIdentity,
    program: OsString,
    args: Vec<OsString>,
    timeout: Option<Duration>,
    max_attempts: u32,
    broadcaster: Arc<Broadcaster>,
}

impl Command {
    /// Validates `cfg`, builds the configured sinks and returns the command.
    ///
    /// Sinks that fail to initialize are dropped (see [`build_sinks`]); this
    /// never fails because of a sink.
    pub async fn from_config(cfg: &Config) -> Result<Self, RuntimeError> {
        cfg.validate()?;
        let identity = CommandIdentity::new(cfg.command_name());
        let sinks = build_sinks(cfg, &identity).await;
        let cmd = Self::with_identity(cfg, identity, Broadcaster::new(sinks))?;
        debug!(
            id = %cmd.identity.id,
            name = %cmd.identity.name,
            sinks = ?cmd.broadcaster.sink_names(),
            "command constructed"
        );
        Ok(cmd)
    }

    /// Builds a command from `cfg` that reports to an explicit broadcaster.
    ///
    /// `cfg.sinks` is ignored; the caller chose the sinks already.
    pub fn with_broadcaster(cfg: &Config, broadcaster: Broadcaster) -> Result<Self, ConfigError> {
        Self::with_identity(cfg, CommandIdentity::new(cfg.command_name()), broadcaster)
    }

    /// Builds a command with an explicit identity.
    pub fn with_identity(
        cfg: &Config,
        identity: CommandIdentity,
        broadcaster: Broadcaster,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            identity,
            program: cfg.program.clone(),
            args: cfg.args.clone(),
            timeout: cfg.attempt_timeout(),
            max_attempts: cfg.max_attempts,
            broadcaster: Arc::new(broadcaster),
        })
    }

    /// Runs the retry loop, then closes every sink.
    ///
    /// Returns `Ok(true)` if some attempt succeeded. Sinks are closed on the
    /// error path too.
    pub async fn run(self) -> Result<bool, RuntimeError> {
        let res = self.execute().await;
        self.close().await;
        res.map(|exec| exec.success)
    }

    /// Runs the retry loop without closing sinks.
    pub async fn execute(&self) -> Result<Execution, RuntimeError> {
        engine::execute(self).await
    }

    /// Closes every sink (idempotent).
    pub async fn close(&self) {
        self.broadcaster.close().await;
    }

    /// Identity of this command.
    pub fn identity(&self) -> &CommandIdentity {
        &self.identity
    }

    /// Generated id.
    pub fn id(&self) -> &CommandId {
        &self.identity.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Executable.
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Per-attempt timeout (`None` = unlimited).
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Retry budget (always `>= 1`).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Broadcaster the command reports to.
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Command line for diagnostics, e.g. `sleep ["10"]`.
    pub fn command_line(&self) -> String {
        let args: Vec<_> = self.args.iter().map(|a| a.to_string_lossy()).collect();
        format!("{} {:?}", self.program.to_string_lossy(), args)
    }
}
