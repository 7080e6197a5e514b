//! # Console sink.
//!
//! [`ConsoleSink`] prints lifecycle events as human-readable lines and passes
//! the child's output through verbatim.
//!
//! ## Routing
//! ```text
//! lifecycle line ──► out
//! stdout chunk   ──► out
//! stderr chunk   ──► err
//! ```
//!
//! By default `out`/`err` are the supervisor's own stdout and stderr. Tests and
//! embedders can hand in any [`AsyncWrite`] via [`ConsoleSink::with_writers`].

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stderr, Stdout};
use tokio::sync::Mutex;

use crate::core::CommandIdentity;
use crate::error::SinkError;
use crate::events::{Event, Stream};

use super::{Sink, format};

/// Terminal sink.
pub struct ConsoleSink<O = Stdout, E = Stderr> {
    identity: CommandIdentity,
    out: Mutex<O>,
    err: Mutex<E>,
}

impl ConsoleSink {
    /// Writes to the process's stdout and stderr.
    pub fn new(identity: CommandIdentity) -> Self {
        Self::with_writers(identity, tokio::io::stdout(), tokio::io::stderr())
    }
}

impl<O, E> ConsoleSink<O, E>
where
    O: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    /// Writes to explicit writers.
    pub fn with_writers(identity: CommandIdentity, out: O, err: E) -> Self {
        Self {
            identity,
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }

    /// Consumes the sink and returns its writers.
    pub fn into_writers(self) -> (O, E) {
        (self.out.into_inner(), self.err.into_inner())
    }
}

#[async_trait]
impl<O, E> Sink for ConsoleSink<O, E>
where
    O: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    fn name(&self) -> &'static str {
        "console"
    }

    async fn on_lifecycle(&self, event: &Event) -> Result<(), SinkError> {
        let Some(line) = format::line(&self.identity, event) else {
            return Ok(());
        };
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }

    async fn on_stream_chunk(
        &self,
        _attempt: u32,
        stream: Stream,
        data: &[u8],
    ) -> Result<(), SinkError> {
        match stream {
            Stream::Stdout => {
                let mut out = self.out.lock().await;
                out.write_all(data).await?;
                out.flush().await?;
            }
            Stream::Stderr => {
                let mut err = self.err.lock().await;
                err.write_all(data).await?;
                err.flush().await?;
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.out.lock().await.flush().await?;
        self.err.lock().await.flush().await?;
        Ok(())
    }
}
