//! Human-readable rendering of lifecycle events.
//!
//! Shared by the console, file and telemetry sinks. Every call returns an owned
//! string; nothing is buffered between events.
//!
//! ## Example output
//! ```text
//! 2024-05-01 10:00:00.000000 +0200 [backup](20240501-100000-1a2b3c4d) The command has started
//! 2024-05-01 10:00:00.001000 +0200 [backup](20240501-100000-1a2b3c4d) The 1st attempt has started. pid: 4242
//! 2024-05-01 10:00:05.001000 +0200 [backup](20240501-100000-1a2b3c4d) The 1st attempt has been killed due to timeout. 5.000000 seconds has been exceeded.
//! ```

use chrono::{DateTime, Local};

use crate::core::CommandIdentity;
use crate::events::{Event, EventKind};

/// Timestamp layout used at the start of every line.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f %z";

/// Message for a lifecycle event; `None` for stream events.
pub fn describe(event: &Event) -> Option<String> {
    let msg = match &event.kind {
        EventKind::CommandStart => "The command has started".to_string(),
        EventKind::CommandSucceed { span } => format!(
            "The command has finished with success in {:.6} seconds.",
            span.secs()
        ),
        EventKind::CommandFail { span } => format!(
            "The command has finished with failure in {:.6} seconds.",
            span.secs()
        ),
        EventKind::AttemptStart { attempt, pid } => match pid {
            Some(pid) => format!("The {} attempt has started. pid: {pid}", ordinal(*attempt)),
            None => format!("The {} attempt has started. pid: unknown", ordinal(*attempt)),
        },
        EventKind::AttemptSucceed { attempt, span } => format!(
            "The {} attempt has finished with success in {:.6} seconds.",
            ordinal(*attempt),
            span.secs()
        ),
        EventKind::AttemptFail {
            attempt,
            status,
            span,
        } => format!(
            "The {} attempt has failed in {:.6} seconds.: {status}.",
            ordinal(*attempt),
            span.secs()
        ),
        EventKind::AttemptTimeout { attempt, span } => format!(
            "The {} attempt has been killed due to timeout. {:.6} seconds has been exceeded.",
            ordinal(*attempt),
            span.secs()
        ),
        EventKind::AttemptUnknownError { attempt, error, .. } => format!(
            "The {} attempt has failed with unknown error.: {error}.",
            ordinal(*attempt)
        ),
        EventKind::StreamOpen { .. }
        | EventKind::StreamChunk { .. }
        | EventKind::StreamClose { .. } => return None,
    };
    Some(msg)
}

/// Full line (with trailing newline) for a lifecycle event; `None` for stream events.
pub fn line(identity: &CommandIdentity, event: &Event) -> Option<String> {
    let msg = describe(event)?;
    Some(format!(
        "{} [{}]({}) {msg}\n",
        timestamp(&event.at),
        identity.name,
        identity.id
    ))
}

/// Renders a wall-clock time the way every line prefix does.
pub fn timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// English ordinal: 1st, 2nd, 3rd, 4th, 11th, 12th, 13th, 21st, ...
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CommandId;
    use crate::events::{Span, Stream};
    use std::time::Duration;

    fn identity() -> CommandIdentity {
        CommandIdentity {
            id: CommandId::from("20240501-100000-1a2b3c4d"),
            name: "backup".into(),
        }
    }

    #[test]
    fn test_ordinals() {
        let got: Vec<String> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 101, 111, 112]
            .into_iter()
            .map(ordinal)
            .collect();
        assert_eq!(
            got,
            [
                "1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "23rd",
                "101st", "111th", "112th"
            ]
        );
    }

    #[test]
    fn test_describe_attempt_events() {
        let span = Span::from_elapsed(Local::now(), Duration::from_millis(2500));

        let ev = Event::ended(EventKind::AttemptTimeout { attempt: 2, span });
        assert_eq!(
            describe(&ev).unwrap(),
            "The 2nd attempt has been killed due to timeout. 2.500000 seconds has been exceeded."
        );

        let ev = Event::now(EventKind::AttemptStart {
            attempt: 1,
            pid: Some(4242),
        });
        assert_eq!(describe(&ev).unwrap(), "The 1st attempt has started. pid: 4242");

        let ev = Event::ended(EventKind::AttemptUnknownError {
            attempt: 3,
            error: "no such file".into(),
            span,
        });
        assert_eq!(
            describe(&ev).unwrap(),
            "The 3rd attempt has failed with unknown error.: no such file."
        );
    }

    #[test]
    fn test_stream_events_have_no_line() {
        let ev = Event::chunk(1, Stream::Stdout, b"hello");
        assert!(describe(&ev).is_none());
        assert!(line(&identity(), &ev).is_none());
    }

    #[test]
    fn test_line_prefix() {
        let ev = Event::now(EventKind::CommandStart);
        let l = line(&identity(), &ev).unwrap();
        assert!(l.starts_with(&timestamp(&ev.at)));
        assert!(l.ends_with(" [backup](20240501-100000-1a2b3c4d) The command has started\n"));
    }
}
