//! # Broadcaster: ordered fan-out with a barrier
//!
//! [`Broadcaster`] delivers each [`Event`] to every registered [`Sink`] and
//! **awaits** all deliveries before returning.
//!
//! ## What it guarantees
//! - `dispatch(event)` returns only after every sink handled `event`.
//! - Dispatches are serialized: two producers (e.g. the stdout and stderr
//!   drains) never interleave deliveries, so every sink sees the same order.
//! - `seq` is stamped under the gate, so it matches the order sinks observe.
//! - A failing or panicking sink only loses its own delivery.
//! - `close()` reaches each sink at most once.
//!
//! ## Diagram
//! ```text
//!    dispatch(Event)
//!        │  lock gate, stamp seq
//!        ├──► spawn ──► deliver(S1) ──┐
//!        ├──► spawn ──► deliver(S2) ──┼──► join_all ──► log failures ──► unlock
//!        └──► spawn ──► deliver(SN) ──┘
//! ```

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::error::SinkError;
use crate::events::{Event, EventKind};

use super::Sink;

/// Dispatch state guarded by the gate.
struct Gate {
    next_seq: u64,
    closed: bool,
}

/// Fan-out over a fixed, ordered list of sinks.
pub struct Broadcaster {
    sinks: Vec<Arc<dyn Sink>>,
    gate: Mutex<Gate>,
}

impl Broadcaster {
    /// Creates a broadcaster over `sinks`; the list is fixed from now on.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            sinks,
            gate: Mutex::new(Gate {
                next_seq: 0,
                closed: false,
            }),
        }
    }

    /// Creates a broadcaster with no sinks; events are unobserved.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Delivers `event` to every sink and waits for all of them.
    ///
    /// Sink failures are logged and swallowed. Events dispatched after
    /// [`close`](Self::close) are dropped.
    pub async fn dispatch(&self, mut event: Event) {
        let mut gate = self.gate.lock().await;
        if gate.closed {
            debug!(event = event.kind.label(), "broadcaster closed, dropping event");
            return;
        }
        event.seq = gate.next_seq;
        gate.next_seq += 1;

        if self.sinks.is_empty() {
            return;
        }

        let event = Arc::new(event);
        let handles = self.sinks.iter().map(|sink| {
            let sink = Arc::clone(sink);
            let ev = Arc::clone(&event);
            tokio::spawn(async move { deliver(sink.as_ref(), &ev).await })
        });
        let results = join_all(handles).await;

        for (sink, res) in self.sinks.iter().zip(results) {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        sink = sink.name(),
                        event = event.kind.label(),
                        seq = event.seq,
                        label = e.as_label(),
                        error = %e,
                        "sink delivery failed"
                    );
                }
                Err(join_err) if join_err.is_panic() => {
                    error!(
                        sink = sink.name(),
                        event = event.kind.label(),
                        seq = event.seq,
                        "sink panicked during delivery"
                    );
                }
                Err(join_err) => {
                    warn!(sink = sink.name(), error = %join_err, "sink delivery aborted");
                }
            }
        }
    }

    /// Closes every sink once. Later calls are no-ops.
    ///
    /// Waits for an in-flight dispatch to finish first.
    pub async fn close(&self) {
        let mut gate = self.gate.lock().await;
        if gate.closed {
            return;
        }
        gate.closed = true;

        let handles = self.sinks.iter().map(|sink| {
            let sink = Arc::clone(sink);
            tokio::spawn(async move { sink.close().await })
        });
        let results = join_all(handles).await;

        for (sink, res) in self.sinks.iter().zip(results) {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(sink = sink.name(), label = e.as_label(), error = %e, "sink close failed");
                }
                Err(join_err) => {
                    error!(sink = sink.name(), error = %join_err, "sink close panicked");
                }
            }
        }
    }

    /// True if there are no sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Sink names in registration order.
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

/// Routes one event to the matching sink method.
async fn deliver(sink: &dyn Sink, event: &Event) -> Result<(), SinkError> {
    match &event.kind {
        EventKind::StreamOpen { attempt, stream } => sink.on_stream_open(*attempt, *stream).await,
        EventKind::StreamChunk {
            attempt,
            stream,
            data,
        } => sink.on_stream_chunk(*attempt, *stream, data).await,
        EventKind::StreamClose { attempt, stream } => {
            sink.on_stream_close(*attempt, *stream).await
        }
        _ => sink.on_lifecycle(event).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Stream;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: StdMutex<Vec<(u64, &'static str)>>,
        closes: AtomicUsize,
        delay: Duration,
    }

    impl Recorder {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn seqs(&self) -> Vec<u64> {
            self.seen.lock().unwrap().iter().map(|(s, _)| *s).collect()
        }
    }

    #[async_trait]
    impl Sink for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn on_lifecycle(&self, ev: &Event) -> Result<(), SinkError> {
            tokio::time::sleep(self.delay).await;
            self.seen.lock().unwrap().push((ev.seq, ev.kind.label()));
            Ok(())
        }

        async fn on_stream_chunk(&self, _: u32, _: Stream, _: &[u8]) -> Result<(), SinkError> {
            self.seen.lock().unwrap().push((u64::MAX, "chunk"));
            Ok(())
        }

        async fn close(&self) -> Result<(), SinkError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Sink for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn on_lifecycle(&self, _: &Event) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }

        async fn on_stream_chunk(&self, _: u32, _: Stream, _: &[u8]) -> Result<(), SinkError> {
            panic!("chunk handler blew up");
        }
    }

    #[tokio::test]
    async fn test_every_sink_sees_dispatch_order() {
        let fast = Arc::new(Recorder::default());
        let slow = Arc::new(Recorder::slow(Duration::from_millis(5)));
        let b = Broadcaster::new(vec![fast.clone(), slow.clone()]);

        for attempt in 1..=5 {
            b.dispatch(Event::now(EventKind::AttemptStart { attempt, pid: None }))
                .await;
        }

        assert_eq!(fast.seqs(), vec![0, 1, 2, 3, 4]);
        assert_eq!(slow.seqs(), fast.seqs());
    }

    #[tokio::test]
    async fn test_concurrent_producers_keep_single_order() {
        let a = Arc::new(Recorder::slow(Duration::from_millis(1)));
        let c = Arc::new(Recorder::default());
        let b = Arc::new(Broadcaster::new(vec![a.clone(), c.clone()]));

        let mut producers = Vec::new();
        for _ in 0..4 {
            let b = Arc::clone(&b);
            producers.push(tokio::spawn(async move {
                for _ in 0..10 {
                    b.dispatch(Event::now(EventKind::CommandStart)).await;
                }
            }));
        }
        for p in producers {
            p.await.unwrap();
        }

        let expected: Vec<u64> = (0..40).collect();
        assert_eq!(a.seqs(), expected);
        assert_eq!(c.seqs(), expected);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let rec = Arc::new(Recorder::default());
        let b = Broadcaster::new(vec![Arc::new(Broken), rec.clone()]);

        b.dispatch(Event::now(EventKind::CommandStart)).await;
        b.dispatch(Event::chunk(1, Stream::Stdout, b"x")).await;
        b.dispatch(Event::now(EventKind::CommandStart)).await;

        let seen = rec.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(0, "command_start"), (u64::MAX, "chunk"), (2, "command_start")]
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let rec = Arc::new(Recorder::default());
        let b = Broadcaster::new(vec![rec.clone()]);

        b.close().await;
        b.close().await;
        assert_eq!(rec.closes.load(Ordering::SeqCst), 1);

        b.dispatch(Event::now(EventKind::CommandStart)).await;
        assert!(rec.seqs().is_empty());
    }

    #[tokio::test]
    async fn test_empty_broadcaster_is_noop() {
        let b = Broadcaster::empty();
        assert!(b.is_empty());
        b.dispatch(Event::now(EventKind::CommandStart)).await;
        b.close().await;
    }
}
