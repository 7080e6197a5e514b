//! # Command configuration.
//!
//! Provides [`Config`], the settings consumed by
//! [`Command::from_config`](crate::Command::from_config), and [`SinkKind`], the
//! closed set of sinks that can be activated.
//!
//! ## Sentinel values
//! - `timeout = 0s` → no timeout (see [`Config::attempt_timeout`])
//! - `name = None` → base name of `program` (see [`Config::command_name`])

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default base directory of the file sink.
pub const DEFAULT_FILE_DIR: &str = "/var/log/jobvisor";
/// Default telemetry endpoint host.
pub const DEFAULT_TELEMETRY_HOST: &str = "localhost";
/// Default telemetry endpoint port.
pub const DEFAULT_TELEMETRY_PORT: u16 = 24224;
/// Default telemetry tag prefix.
pub const DEFAULT_TAG_PREFIX: &str = "command";

/// Kind of sink to activate for a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Human-readable lines on the terminal.
    Console,
    /// Summary and per-attempt output files on disk.
    File,
    /// Structured records shipped to a remote aggregator.
    Telemetry,
}

impl SinkKind {
    /// Stable lowercase name, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Console => "console",
            SinkKind::File => "file",
            SinkKind::Telemetry => "telemetry",
        }
    }

    /// Parses a comma-separated list such as `"console,file"`.
    ///
    /// Empty entries are skipped; the first unknown entry is rejected.
    ///
    /// # Example
    /// ```
    /// use jobvisor::SinkKind;
    ///
    /// let kinds = SinkKind::parse_list("console, file").unwrap();
    /// assert_eq!(kinds, vec![SinkKind::Console, SinkKind::File]);
    /// assert!(SinkKind::parse_list("console,syslog").is_err());
    /// ```
    pub fn parse_list(list: &str) -> Result<Vec<SinkKind>, ConfigError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SinkKind::from_str)
            .collect()
    }
}

impl FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(SinkKind::Console),
            "file" => Ok(SinkKind::File),
            "telemetry" | "fluentd" => Ok(SinkKind::Telemetry),
            other => Err(ConfigError::UnknownSink {
                kind: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of the file sink.
#[derive(Clone, Debug)]
pub struct FileSinkConfig {
    /// Base directory; logs land under `<dir>/<command name>/<command id>/`.
    pub dir: PathBuf,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_FILE_DIR),
        }
    }
}

/// Settings of the remote-telemetry sink.
#[derive(Clone, Debug)]
pub struct TelemetrySinkConfig {
    /// Aggregator host.
    pub host: String,
    /// Aggregator port.
    pub port: u16,
    /// Prefix of every record tag (`<prefix>.<event kind>`).
    pub tag_prefix: String,
}

impl TelemetrySinkConfig {
    /// Returns `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TelemetrySinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TELEMETRY_HOST.to_string(),
            port: DEFAULT_TELEMETRY_PORT,
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
        }
    }
}

/// Configuration of one supervised command.
///
/// ## Field semantics
/// - `program`/`args`: executable and its arguments (environment is inherited)
/// - `name`: human-readable command name (`None` = base name of `program`)
/// - `timeout`: per-attempt wall-clock limit (`0s` = no limit)
/// - `max_attempts`: retry budget, must be `>= 1`
/// - `sinks`: sinks to activate, in registration order
#[derive(Clone, Debug)]
pub struct Config {
    /// Executable to run.
    pub program: OsString,
    /// Arguments passed to the executable.
    pub args: Vec<OsString>,
    /// Optional command name.
    pub name: Option<String>,
    /// Per-attempt timeout; `Duration::ZERO` disables it.
    pub timeout: Duration,
    /// Maximum number of attempts (at least 1).
    pub max_attempts: u32,
    /// Sinks to activate.
    pub sinks: Vec<SinkKind>,
    /// File sink settings (used only when [`SinkKind::File`] is active).
    pub file: FileSinkConfig,
    /// Telemetry sink settings (used only when [`SinkKind::Telemetry`] is active).
    pub telemetry: TelemetrySinkConfig,
}

impl Config {
    /// Creates a configuration with defaults for everything but the command line.
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Returns the per-attempt timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → deadline applied to every attempt
    #[inline]
    pub fn attempt_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns the configured name, or the base name of the program.
    pub fn command_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Checks the configuration before anything is started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program.is_empty() {
            return Err(ConfigError::EmptyProgram);
        }
        if self.max_attempts < 1 {
            return Err(ConfigError::InvalidMaxAttempts {
                max_attempts: self.max_attempts,
            });
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `timeout = 0s` (no timeout)
    /// - `max_attempts = 1`
    /// - `sinks = [Console]`
    fn default() -> Self {
        Self {
            program: OsString::new(),
            args: Vec::new(),
            name: None,
            timeout: Duration::ZERO,
            max_attempts: 1,
            sinks: vec![SinkKind::Console],
            file: FileSinkConfig::default(),
            telemetry: TelemetrySinkConfig::default(),
        }
    }
}
