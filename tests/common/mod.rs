#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jobvisor::{Broadcaster, Command, Config, Event, Sink, SinkError, Stream};

/// What a recorder saw, one entry per delivered event.
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Lifecycle { seq: u64, label: &'static str, attempt: Option<u32> },
    Open { attempt: u32, stream: Stream },
    Chunk { attempt: u32, stream: Stream, data: Vec<u8> },
    Close { attempt: u32, stream: Stream },
}

impl Seen {
    pub fn label(&self) -> &'static str {
        match self {
            Seen::Lifecycle { label, .. } => label,
            Seen::Open { .. } => "stream_open",
            Seen::Chunk { .. } => "stream_chunk",
            Seen::Close { .. } => "stream_close",
        }
    }
}

/// Sink that records everything it is handed.
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<Seen>>,
    events: Mutex<Vec<Event>>,
    closes: Mutex<u32>,
}

impl Recorder {
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    /// Lifecycle events only, as delivered.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.seen().iter().map(Seen::label).collect()
    }

    pub fn lifecycle_labels(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.kind.label()).collect()
    }

    pub fn output(&self, stream: Stream) -> Vec<u8> {
        self.seen()
            .into_iter()
            .filter_map(|s| match s {
                Seen::Chunk { stream: st, data, .. } if st == stream => Some(data),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn closes(&self) -> u32 {
        *self.closes.lock().unwrap()
    }
}

#[async_trait]
impl Sink for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    async fn on_lifecycle(&self, event: &Event) -> Result<(), SinkError> {
        self.seen.lock().unwrap().push(Seen::Lifecycle {
            seq: event.seq,
            label: event.kind.label(),
            attempt: event.kind.attempt(),
        });
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn on_stream_open(&self, attempt: u32, stream: Stream) -> Result<(), SinkError> {
        self.seen.lock().unwrap().push(Seen::Open { attempt, stream });
        Ok(())
    }

    async fn on_stream_chunk(&self, attempt: u32, stream: Stream, data: &[u8]) -> Result<(), SinkError> {
        self.seen.lock().unwrap().push(Seen::Chunk {
            attempt,
            stream,
            data: data.to_vec(),
        });
        Ok(())
    }

    async fn on_stream_close(&self, attempt: u32, stream: Stream) -> Result<(), SinkError> {
        self.seen.lock().unwrap().push(Seen::Close { attempt, stream });
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        *self.closes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Builds a command over `cfg` that reports only to a fresh recorder.
pub fn recorded(cfg: &Config) -> (Command, Arc<Recorder>) {
    let rec = Arc::new(Recorder::default());
    let cmd = Command::with_broadcaster(cfg, Broadcaster::new(vec![rec.clone()]))
        .expect("valid config");
    (cmd, rec)
}

/// `sh -c <script>` with the given policy.
pub fn shell(script: &str, max_attempts: u32) -> Config {
    Config {
        max_attempts,
        ..Config::new("sh", ["-c", script])
    }
}
