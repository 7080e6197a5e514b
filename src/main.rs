//! `jobvisor` command-line entry point.
//!
//! Runs one command with per-attempt timeout and bounded retries, reporting to
//! the selected sinks. Exit code: 0 if some attempt succeeded, 1 otherwise.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use jobvisor::{
    Command, Config, DEFAULT_FILE_DIR, DEFAULT_TAG_PREFIX, DEFAULT_TELEMETRY_HOST,
    DEFAULT_TELEMETRY_PORT, FileSinkConfig, SinkKind, TelemetrySinkConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "jobvisor",
    version,
    about = "Run a command with per-attempt timeouts, retries and lifecycle reporting"
)]
struct Cli {
    /// Per-attempt timeout: `500ms`, `10s`, `2m`, `1h` or bare seconds. `0` disables it.
    #[arg(long, value_parser = parse_duration, default_value = "0")]
    timeout: Duration,

    /// Maximum number of attempts (at least 1).
    #[arg(long, default_value_t = 1)]
    attempts: u32,

    /// Command name used in reports (defaults to the program's base name).
    #[arg(long)]
    name: Option<String>,

    /// Comma-separated sinks: console, file, telemetry.
    #[arg(long, value_delimiter = ',', default_value = "console")]
    sinks: Vec<SinkKind>,

    /// Base directory of the file sink.
    #[arg(long, default_value = DEFAULT_FILE_DIR)]
    file_dir: PathBuf,

    /// Host of the telemetry aggregator.
    #[arg(long, default_value = DEFAULT_TELEMETRY_HOST)]
    telemetry_host: String,

    /// Port of the telemetry aggregator.
    #[arg(long, default_value_t = DEFAULT_TELEMETRY_PORT)]
    telemetry_port: u16,

    /// Prefix of telemetry record tags.
    #[arg(long, default_value = DEFAULT_TAG_PREFIX)]
    telemetry_tag_prefix: String,

    /// Program to run, followed by its arguments.
    #[arg(last = true, required = true, value_name = "PROGRAM [ARGS]...")]
    command: Vec<OsString>,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut command = self.command.into_iter();
        let program = command.next().unwrap_or_default();
        Config {
            program,
            args: command.collect(),
            name: self.name,
            timeout: self.timeout,
            max_attempts: self.attempts,
            sinks: self.sinks,
            file: FileSinkConfig { dir: self.file_dir },
            telemetry: TelemetrySinkConfig {
                host: self.telemetry_host,
                port: self.telemetry_port,
                tag_prefix: self.telemetry_tag_prefix,
            },
        }
    }
}

/// Parses `500ms`, `10s`, `2m`, `1h` or a bare number of seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {s:?}: expected e.g. 500ms, 10s, 2m, 1h"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(n)),
        "" | "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 3600)),
        other => Err(format!("invalid duration unit {other:?} in {s:?}")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    jobvisor::logging::init();
    let cfg = Cli::parse().into_config();

    let cmd = match Command::from_config(&cfg).await {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("jobvisor: {e}");
            return ExitCode::FAILURE;
        }
    };
    match cmd.run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("jobvisor: {e}");
            ExitCode::FAILURE
        }
    }
}
