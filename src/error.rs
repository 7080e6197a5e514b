//! Error types used by the jobvisor runtime and its sinks.
//!
//! This module defines three error enums:
//!
//! - [`ConfigError`]: invalid configuration, rejected before anything runs.
//! - [`RuntimeError`]: unrecoverable failures that abort a whole execution.
//! - [`SinkError`]: failures confined to a single sink (init or delivery).
//!
//! Per-attempt failures (non-zero exit, timeout, spawn failure) are **not** errors;
//! they are classified as an [`Outcome`](crate::Outcome) and consumed by the retry loop.
//!
//! All types provide `as_label` for logs.

use std::io;

use thiserror::Error;

/// # Configuration errors.
///
/// Raised by [`Config::validate`](crate::Config::validate) and while parsing sink kinds.
/// A configuration error always happens before the first attempt runs.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `max_attempts` must be at least 1.
    #[error("maximum attempts must be at least 1, got {max_attempts}")]
    InvalidMaxAttempts {
        /// The rejected value.
        max_attempts: u32,
    },

    /// A sink kind that is not one of `console`, `file`, `telemetry`.
    #[error("unknown sink kind: {kind:?}")]
    UnknownSink {
        /// The unrecognized kind as written by the user.
        kind: String,
    },

    /// No executable was given.
    #[error("command must be specified")]
    EmptyProgram,
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use jobvisor::ConfigError;
    ///
    /// let err = ConfigError::InvalidMaxAttempts { max_attempts: 0 };
    /// assert_eq!(err.as_label(), "config_invalid_max_attempts");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidMaxAttempts { .. } => "config_invalid_max_attempts",
            ConfigError::UnknownSink { .. } => "config_unknown_sink",
            ConfigError::EmptyProgram => "config_empty_program",
        }
    }
}

/// # Errors that abort a whole execution.
///
/// Only two things can stop the engine: a configuration error (before any
/// attempt), or a failure to deliver the kill signal to a timed-out process,
/// after which process cleanup can no longer be guaranteed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The timed-out process could not be terminated.
    #[error("failed to kill process {pid:?}: {source}")]
    KillFailed {
        /// Process id of the child, if it was known.
        pid: Option<u32>,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Config(e) => e.as_label(),
            RuntimeError::KillFailed { .. } => "runtime_kill_failed",
        }
    }
}

/// # Errors produced by a sink.
///
/// These never reach the command's control flow: construction errors drop the
/// sink from the registry, delivery errors are logged by the
/// [`Broadcaster`](crate::Broadcaster) and otherwise ignored.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    /// Filesystem or stream I/O failed.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// The remote endpoint could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// `host:port` of the endpoint.
        addr: String,
        /// The underlying connect error.
        #[source]
        source: io::Error,
    },

    /// The local host name could not be determined.
    #[error("failed to determine host name")]
    Hostname,

    /// A record could not be serialized.
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink's outbound queue or connection is already closed.
    #[error("sink closed")]
    Closed,
}

impl SinkError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use jobvisor::SinkError;
    ///
    /// assert_eq!(SinkError::Closed.as_label(), "sink_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SinkError::Io(_) => "sink_io",
            SinkError::Connect { .. } => "sink_connect",
            SinkError::Hostname => "sink_hostname",
            SinkError::Encode(_) => "sink_encode",
            SinkError::Closed => "sink_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_wraps_config_label() {
        let err: RuntimeError = ConfigError::EmptyProgram.into();
        assert_eq!(err.as_label(), "config_empty_program");
        assert_eq!(err.to_string(), "command must be specified");
    }

    #[test]
    fn test_kill_failed_message_keeps_pid() {
        let err = RuntimeError::KillFailed {
            pid: Some(42),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.as_label(), "runtime_kill_failed");
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_unknown_sink_message() {
        let err = ConfigError::UnknownSink {
            kind: "syslog".into(),
        };
        assert_eq!(err.to_string(), "unknown sink kind: \"syslog\"");
    }
}
