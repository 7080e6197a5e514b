//! # File sink.
//!
//! [`FileSink`] keeps a per-execution directory:
//!
//! ```text
//! <dir>/<command name>/<command id>/
//! ├── command.log      lifecycle lines, appended
//! ├── stdout.log.1     stdout of attempt 1, verbatim
//! ├── stderr.log.1     stderr of attempt 1, verbatim
//! └── ...
//! ```
//!
//! Stream files are opened (truncated) at stream open and closed at stream
//! close. A stream whose file could not be opened loses its chunks; the
//! failure is reported once, at open.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::CommandIdentity;
use crate::error::SinkError;
use crate::events::{Event, Stream};

use super::{Sink, format};

/// Name of the summary file.
pub const SUMMARY_FILE: &str = "command.log";

/// Open files of the sink.
struct Files {
    summary: Option<File>,
    streams: HashMap<(u32, Stream), File>,
}

/// On-disk sink.
pub struct FileSink {
    identity: CommandIdentity,
    dir: PathBuf,
    files: Mutex<Files>,
}

impl FileSink {
    /// Creates `<base>/<name>/<id>/` and opens the summary file.
    pub async fn create(base: &Path, identity: CommandIdentity) -> Result<Self, SinkError> {
        let dir = base.join(&*identity.name).join(identity.id.as_str());
        fs::create_dir_all(&dir).await?;
        let summary = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(SUMMARY_FILE))
            .await?;
        debug!(dir = %dir.display(), "file sink ready");
        Ok(Self {
            identity,
            dir,
            files: Mutex::new(Files {
                summary: Some(summary),
                streams: HashMap::new(),
            }),
        })
    }

    /// Directory holding this execution's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the capture file for `stream` of `attempt`.
    pub fn stream_path(&self, attempt: u32, stream: Stream) -> PathBuf {
        self.dir.join(format!("{}.log.{attempt}", stream.as_str()))
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn on_lifecycle(&self, event: &Event) -> Result<(), SinkError> {
        let Some(line) = format::line(&self.identity, event) else {
            return Ok(());
        };
        let mut files = self.files.lock().await;
        let summary = files.summary.as_mut().ok_or(SinkError::Closed)?;
        summary.write_all(line.as_bytes()).await?;
        summary.flush().await?;
        Ok(())
    }

    async fn on_stream_open(&self, attempt: u32, stream: Stream) -> Result<(), SinkError> {
        let file = File::create(self.stream_path(attempt, stream)).await?;
        self.files.lock().await.streams.insert((attempt, stream), file);
        Ok(())
    }

    async fn on_stream_chunk(
        &self,
        attempt: u32,
        stream: Stream,
        data: &[u8],
    ) -> Result<(), SinkError> {
        let mut files = self.files.lock().await;
        if let Some(file) = files.streams.get_mut(&(attempt, stream)) {
            file.write_all(data).await?;
        }
        Ok(())
    }

    async fn on_stream_close(&self, attempt: u32, stream: Stream) -> Result<(), SinkError> {
        let file = self.files.lock().await.streams.remove(&(attempt, stream));
        if let Some(mut file) = file {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut files = self.files.lock().await;
        for (_, mut file) in files.streams.drain() {
            file.flush().await?;
        }
        if let Some(mut summary) = files.summary.take() {
            summary.flush().await?;
            summary.sync_all().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CommandId;
    use crate::events::EventKind;

    fn identity() -> CommandIdentity {
        CommandIdentity {
            id: CommandId::from("20240501-100000-deadbeef"),
            name: "backup".into(),
        }
    }

    #[tokio::test]
    async fn test_layout_and_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileSink::create(tmp.path(), identity()).await.unwrap();
        let dir = tmp.path().join("backup").join("20240501-100000-deadbeef");
        assert_eq!(sink.dir(), dir);

        sink.on_lifecycle(&Event::now(EventKind::CommandStart)).await.unwrap();
        sink.on_stream_open(1, Stream::Stdout).await.unwrap();
        sink.on_stream_chunk(1, Stream::Stdout, b"hel").await.unwrap();
        sink.on_stream_chunk(1, Stream::Stdout, b"lo\n").await.unwrap();
        sink.on_stream_close(1, Stream::Stdout).await.unwrap();
        sink.on_stream_open(1, Stream::Stderr).await.unwrap();
        sink.on_stream_close(1, Stream::Stderr).await.unwrap();
        sink.close().await.unwrap();

        let summary = std::fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap();
        assert!(summary.ends_with("[backup](20240501-100000-deadbeef) The command has started\n"));
        assert_eq!(std::fs::read(dir.join("stdout.log.1")).unwrap(), b"hello\n");
        assert_eq!(std::fs::read(dir.join("stderr.log.1")).unwrap(), b"");
    }

    #[tokio::test]
    async fn test_chunk_without_open_is_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileSink::create(tmp.path(), identity()).await.unwrap();

        sink.on_stream_chunk(2, Stream::Stderr, b"lost").await.unwrap();
        assert!(!sink.stream_path(2, Stream::Stderr).exists());
    }

    #[tokio::test]
    async fn test_lifecycle_after_close_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileSink::create(tmp.path(), identity()).await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();

        let err = sink
            .on_lifecycle(&Event::now(EventKind::CommandStart))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }
}
