//! # Remote-telemetry sink.
//!
//! [`TelemetrySink`] ships every event as a tagged structured record to a log
//! aggregator over one TCP connection.
//!
//! ## Wire format
//! One JSON array per line:
//! ```text
//! ["command.attempt_start",1714550400,{"command_id":"…","command_name":"backup","hostname":"web1","attempt":1,"pid":4242,"message":"…"}]
//! ["command.stdout",1714550401,{"command_id":"…","command_name":"backup","hostname":"web1","attempt":1,"log":"hello\n"}]
//! ```
//!
//! ## Architecture
//! ```text
//! on_lifecycle ───────────────────────────────┐
//! on_stream_open  ─► per-(attempt,stream) queue ─► forwarder task ─┤
//! on_stream_chunk ─► same queue                                    ├─► writer task ─► TcpStream
//! on_stream_close ─► drop queue, join forwarder ───────────────────┘
//! ```
//!
//! The writer task owns the connection. Each stream gets its own ordered
//! queue so its chunks reach the writer in read order; closing the stream
//! waits until that queue has been handed to the writer.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use sysinfo::System;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::TelemetrySinkConfig;
use crate::core::CommandIdentity;
use crate::error::SinkError;
use crate::events::{Event, EventKind, Stream};

use super::{Sink, format};

/// Record body. Absent fields are omitted from the wire.
#[derive(Serialize, Default)]
struct Record<'a> {
    command_id: &'a str,
    command_name: &'a str,
    hostname: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log: Option<String>,
}

/// Ordered queue of one captured stream.
struct StreamQueue {
    tx: mpsc::UnboundedSender<String>,
    forwarder: JoinHandle<()>,
}

/// Aggregator sink.
pub struct TelemetrySink {
    identity: CommandIdentity,
    hostname: String,
    tag_prefix: String,
    out: Mutex<Option<mpsc::UnboundedSender<String>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    streams: Mutex<HashMap<(u32, Stream), StreamQueue>>,
}

impl TelemetrySink {
    /// Resolves the host name and connects to the configured endpoint.
    pub async fn connect(
        cfg: &TelemetrySinkConfig,
        identity: CommandIdentity,
    ) -> Result<Self, SinkError> {
        let hostname = System::host_name().ok_or(SinkError::Hostname)?;
        let addr = cfg.addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| SinkError::Connect {
                addr: addr.clone(),
                source,
            })?;
        debug!(%addr, "telemetry sink connected");
        Ok(Self::with_writer(identity, hostname, &cfg.tag_prefix, stream))
    }

    /// Ships records to an arbitrary writer.
    pub fn with_writer<W>(
        identity: CommandIdentity,
        hostname: impl Into<String>,
        tag_prefix: &str,
        writer: W,
    ) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            identity,
            hostname: hostname.into(),
            tag_prefix: tag_prefix.to_string(),
            out: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(tokio::spawn(write_loop(writer, rx)))),
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn tag(&self, kind: &str) -> String {
        format!("{}.{kind}", self.tag_prefix)
    }

    fn record(&self) -> Record<'_> {
        Record {
            command_id: self.identity.id.as_str(),
            command_name: &self.identity.name,
            hostname: &self.hostname,
            ..Record::default()
        }
    }

    /// Renders one wire line.
    fn encode(&self, tag: &str, unix_secs: i64, record: &Record<'_>) -> Result<String, SinkError> {
        let mut line = serde_json::to_string(&(tag, unix_secs, record))?;
        line.push('\n');
        Ok(line)
    }

    async fn send(&self, line: String) -> Result<(), SinkError> {
        let out = self.out.lock().await;
        let tx = out.as_ref().ok_or(SinkError::Closed)?;
        tx.send(line).map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl Sink for TelemetrySink {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    async fn on_lifecycle(&self, event: &Event) -> Result<(), SinkError> {
        let mut rec = self.record();
        rec.message = format::describe(event);
        rec.attempt = event.kind.attempt();
        rec.duration = event.kind.span().map(|s| s.secs());
        match &event.kind {
            EventKind::AttemptStart { pid, .. } => rec.pid = *pid,
            EventKind::AttemptFail { status, .. } => {
                rec.exit_code = status.code();
                rec.error = Some(status.to_string());
            }
            EventKind::AttemptUnknownError { error, .. } => rec.error = Some(error.to_string()),
            _ => {}
        }
        let line = self.encode(&self.tag(event.kind.label()), event.at.timestamp(), &rec)?;
        self.send(line).await
    }

    async fn on_stream_open(&self, attempt: u32, stream: Stream) -> Result<(), SinkError> {
        let out = self.out.lock().await.clone().ok_or(SinkError::Closed)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let forwarder = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if out.send(line).is_err() {
                    break;
                }
            }
        });
        let prev = self
            .streams
            .lock()
            .await
            .insert((attempt, stream), StreamQueue { tx, forwarder });
        if let Some(prev) = prev {
            drop(prev.tx);
            let _ = prev.forwarder.await;
        }
        Ok(())
    }

    async fn on_stream_chunk(
        &self,
        attempt: u32,
        stream: Stream,
        data: &[u8],
    ) -> Result<(), SinkError> {
        let mut rec = self.record();
        rec.attempt = Some(attempt);
        rec.log = Some(String::from_utf8_lossy(data).into_owned());
        let line = self.encode(&self.tag(stream.as_str()), Local::now().timestamp(), &rec)?;

        let streams = self.streams.lock().await;
        let Some(queue) = streams.get(&(attempt, stream)) else {
            debug!(attempt, %stream, "chunk for unopened stream dropped");
            return Ok(());
        };
        queue.tx.send(line).map_err(|_| SinkError::Closed)
    }

    async fn on_stream_close(&self, attempt: u32, stream: Stream) -> Result<(), SinkError> {
        let queue = self.streams.lock().await.remove(&(attempt, stream));
        if let Some(StreamQueue { tx, forwarder }) = queue {
            drop(tx);
            if let Err(e) = forwarder.await {
                warn!(attempt, %stream, error = %e, "telemetry stream forwarder failed");
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let queues: Vec<StreamQueue> = self.streams.lock().await.drain().map(|(_, q)| q).collect();
        for StreamQueue { tx, forwarder } in queues {
            drop(tx);
            let _ = forwarder.await;
        }
        self.out.lock().await.take();
        if let Some(writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.await {
                warn!(error = %e, "telemetry writer task failed");
            }
        }
        Ok(())
    }
}

/// Owns the connection: writes lines until every sender is gone.
async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut written = 0usize;
    while let Some(line) = rx.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!(error = %e, written, "telemetry write failed, dropping connection");
            return;
        }
        written += 1;
    }
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "telemetry shutdown failed");
    }
    debug!(written, "telemetry writer finished");
}
