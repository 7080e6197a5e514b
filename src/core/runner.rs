//! # Run a single attempt of a command.
//!
//! Spawns the child process once, drains its output, enforces the optional
//! deadline and classifies the result into an [`Outcome`].
//!
//! ## Event flow
//!
//! ```text
//! Spawned:
//!   spawn() → AttemptStart{pid} → drains (stdout ‖ stderr)
//!           → wait() vs deadline
//!                ├─ exit 0        → join drains → AttemptSucceed
//!                ├─ exit != 0     → join drains → AttemptFail{status}
//!                ├─ wait error    → kill → reap → join drains → AttemptUnknownError
//!                └─ deadline      → kill → reap → join drains → AttemptTimeout
//!
//! Not spawned:
//!   spawn() → Err → AttemptUnknownError   (no AttemptStart, no stream events)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal attempt event.
//! - All stream events of the attempt precede its terminal event.
//! - The child is reaped before the attempt returns; `kill_on_drop` covers
//!   early returns.
//! - A failed kill on timeout is fatal: [`RuntimeError::KillFailed`].
//! - Once the child is gone the drains get [`DRAIN_GRACE`] to reach
//!   end-of-stream. Anything the child started may keep the pipes open, so
//!   after the grace period the drains are cancelled and close their streams.

use std::future::pending;
use std::io;
use std::pin::pin;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use chrono::Local;
use futures::future::join_all;
use tokio::process::{Child, Command as Process};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::Command;
use crate::core::drain::drain;
use crate::core::outcome::Outcome;
use crate::error::RuntimeError;
use crate::events::{Event, EventKind, Span, Stream};
use crate::sinks::Broadcaster;

/// How long the drains may run on after the child has exited or been reaped.
pub(crate) const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Executes attempt number `attempt` of `cmd`.
///
/// Returns the attempt's outcome after its terminal event was delivered to
/// every sink. `Err` only when a timed-out child could not be killed.
pub(crate) async fn run_attempt(cmd: &Command, attempt: u32) -> Result<Outcome, RuntimeError> {
    let bus = cmd.broadcaster();
    let started_at = Local::now();
    let clock = Instant::now();

    let mut child = match spawn(cmd) {
        Ok(child) => child,
        Err(e) => {
            warn!(attempt, program = %cmd.command_line(), error = %e, "failed to spawn process");
            let cause = format!("failed to start {}: {e}", cmd.command_line());
            let outcome = Outcome::UnknownError {
                cause: cause.into(),
                span: Span::close(started_at, clock),
            };
            return Ok(finish(bus, attempt, outcome).await);
        }
    };
    let pid = child.id();

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        _ => {
            warn!(attempt, ?pid, "child output pipes missing, killing process");
            if let Err(e) = kill(&mut child, pid).await {
                warn!(attempt, error = %e, "kill after missing pipes failed");
            }
            let outcome = Outcome::UnknownError {
                cause: "child output pipes were not captured".into(),
                span: Span::close(started_at, clock),
            };
            return Ok(finish(bus, attempt, outcome).await);
        }
    };

    bus.dispatch(Event::at(started_at, EventKind::AttemptStart { attempt, pid }))
        .await;
    debug!(attempt, ?pid, "attempt started");

    let stop = CancellationToken::new();
    // Early returns (a failed kill) must not leave the drains reading.
    let _stop_guard = stop.clone().drop_guard();
    let drains = [
        tokio::spawn(drain(stdout, attempt, Stream::Stdout, bus.clone(), stop.clone())),
        tokio::spawn(drain(stderr, attempt, Stream::Stderr, bus.clone(), stop.clone())),
    ];

    let exited = tokio::select! {
        res = child.wait() => Some(res),
        () = deadline(cmd.timeout()) => None,
    };

    let outcome = match exited {
        Some(Ok(status)) => {
            join_drains(drains, &stop, attempt).await;
            classify(status, Span::close(started_at, clock))
        }
        Some(Err(e)) => {
            warn!(attempt, ?pid, error = %e, "failed to wait for process, killing it");
            if let Err(kill_err) = kill(&mut child, pid).await {
                warn!(attempt, error = %kill_err, "kill after wait failure failed");
            }
            join_drains(drains, &stop, attempt).await;
            Outcome::UnknownError {
                cause: format!("failed to wait for process: {e}").into(),
                span: Span::close(started_at, clock),
            }
        }
        None => {
            let limit = cmd.timeout().unwrap_or_default();
            warn!(attempt, ?pid, timeout_ms = millis(limit), "attempt timed out, killing process");
            kill(&mut child, pid).await?;
            join_drains(drains, &stop, attempt).await;
            Outcome::Timeout {
                span: Span::close(started_at, clock),
            }
        }
    };

    Ok(finish(bus, attempt, outcome).await)
}

/// Spawns the child with piped stdout/stderr and no stdin.
fn spawn(cmd: &Command) -> io::Result<Child> {
    Process::new(cmd.program())
        .args(cmd.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Resolves when the attempt deadline passes; never without a timeout.
async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => pending::<()>().await,
    }
}

/// Sends the kill signal and waits for termination.
async fn kill(child: &mut Child, pid: Option<u32>) -> Result<(), RuntimeError> {
    child
        .start_kill()
        .map_err(|source| RuntimeError::KillFailed { pid, source })?;
    if let Err(e) = child.wait().await {
        warn!(?pid, error = %e, "failed to reap killed process");
    }
    Ok(())
}

/// Waits for both drains to emit their `StreamClose`.
///
/// Called only after the child is reaped. Drains still reading after
/// [`DRAIN_GRACE`] are cancelled, then awaited.
async fn join_drains(drains: [JoinHandle<()>; 2], stop: &CancellationToken, attempt: u32) {
    let mut joined = pin!(join_all(drains));
    let results = match tokio::time::timeout(DRAIN_GRACE, joined.as_mut()).await {
        Ok(results) => results,
        Err(_) => {
            debug!(attempt, grace_ms = millis(DRAIN_GRACE), "output pipes held open after exit, stopping drains");
            stop.cancel();
            joined.await
        }
    };
    for res in results {
        if let Err(e) = res {
            warn!(attempt, error = %e, "output drain task failed");
        }
    }
}

/// Maps an exit status to success or failure.
fn classify(status: ExitStatus, span: Span) -> Outcome {
    if status.success() {
        Outcome::Success { span }
    } else {
        Outcome::ExitFailure { status, span }
    }
}

/// Publishes the terminal event of the attempt and hands the outcome back.
async fn finish(bus: &Broadcaster, attempt: u32, outcome: Outcome) -> Outcome {
    info!(
        attempt,
        outcome = outcome.as_label(),
        elapsed_ms = millis(outcome.span().elapsed),
        "attempt finished"
    );
    bus.dispatch(outcome.clone().into_event(attempt)).await;
    outcome
}

/// Whole milliseconds for log fields, saturating.
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Config;

    fn command(program: &str, args: &[&str], timeout: Duration) -> Command {
        let cfg = Config {
            timeout,
            ..Config::new(program, args.iter().copied())
        };
        Command::with_broadcaster(&cfg, Broadcaster::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_exit_codes_are_classified() {
        let ok = run_attempt(&command("true", &[], Duration::ZERO), 1).await.unwrap();
        assert!(ok.is_success());

        let fail = run_attempt(&command("sh", &["-c", "exit 3"], Duration::ZERO), 1)
            .await
            .unwrap();
        match fail {
            Outcome::ExitFailure { status, .. } => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deadline_kills_child() {
        let started = Instant::now();
        let out = run_attempt(&command("sleep", &["10"], Duration::from_millis(100)), 1)
            .await
            .unwrap();
        assert_eq!(out.as_label(), "timeout");
        assert!(out.span().elapsed >= Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_program_is_unknown_error() {
        let out = run_attempt(&command("/nonexistent/jobvisor-test-bin", &[], Duration::ZERO), 1)
            .await
            .unwrap();
        match out {
            Outcome::UnknownError { cause, .. } => assert!(cause.contains("failed to start")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deadline_does_not_wait_for_grandchild() {
        let started = Instant::now();
        let out = run_attempt(
            &command("sh", &["-c", "echo x; sleep 30; true"], Duration::from_millis(200)),
            1,
        )
        .await
        .unwrap();
        assert_eq!(out.as_label(), "timeout");
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert!(out.span().elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_background_job_does_not_hold_exit() {
        let started = Instant::now();
        let out = run_attempt(&command("sh", &["-c", "sleep 30 & exit 0"], Duration::ZERO), 1)
            .await
            .unwrap();
        assert!(out.is_success());
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_kill_reaps_child() {
        let mut child = Process::new("sleep").arg("10").kill_on_drop(true).spawn().unwrap();
        let pid = child.id();

        kill(&mut child, pid).await.unwrap();
        assert!(child.try_wait().unwrap().is_some());

        // Already reaped: the signal cannot be delivered.
        assert!(matches!(
            kill(&mut child, pid).await,
            Err(RuntimeError::KillFailed { .. })
        ));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
