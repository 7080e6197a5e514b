//! # Output drain for one captured stream.
//!
//! A drain owns the read end of a child's stdout or stderr for the lifetime of
//! one attempt and forwards everything it reads to the broadcaster:
//!
//! ```text
//! StreamOpen ──► StreamChunk* ──► StreamClose
//! ```
//!
//! Each non-empty read becomes exactly one chunk, bytes unmodified. Reading
//! stops at end-of-stream, on the first read error, or when the runner cancels
//! `stop`; every path still emits `StreamClose`. Because [`Broadcaster::dispatch`] is a barrier, a drain never
//! reads ahead of its sinks.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{Event, EventKind, Stream};
use crate::sinks::Broadcaster;

/// Read buffer size; one chunk is at most this many bytes.
pub(crate) const CHUNK_SIZE: usize = 4096;

/// Reads `reader` to the end (or until `stop` fires), dispatching stream
/// events for `attempt`.
pub(crate) async fn drain<R>(
    mut reader: R,
    attempt: u32,
    stream: Stream,
    bus: Arc<Broadcaster>,
    stop: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    bus.dispatch(Event::now(EventKind::StreamOpen { attempt, stream }))
        .await;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0usize;
    loop {
        let read = tokio::select! {
            biased;
            _ = stop.cancelled() => {
                debug!(attempt, %stream, "stream still open, drain stopped");
                break;
            }
            read = reader.read(&mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                bus.dispatch(Event::chunk(attempt, stream, &buf[..n])).await;
            }
            Err(e) => {
                debug!(attempt, %stream, error = %e, "stream read failed, closing");
                break;
            }
        }
    }

    debug!(attempt, %stream, bytes = total, "stream drained");
    bus.dispatch(Event::now(EventKind::StreamClose { attempt, stream }))
        .await;
}
