#![cfg(unix)]

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use common::{Recorder, shell};
use jobvisor::{
    Broadcaster, Command, ConfigError, Event, RuntimeError, SUMMARY_FILE, Sink, SinkError,
    SinkKind, Stream, TelemetrySinkConfig,
};

#[tokio::test]
async fn file_sink_writes_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = shell("echo out; echo err >&2; exit 1", 2);
    cfg.name = Some("nightly".into());
    cfg.sinks = vec![SinkKind::File];
    cfg.file.dir = tmp.path().to_path_buf();

    let cmd = Command::from_config(&cfg).await.unwrap();
    let dir = tmp.path().join("nightly").join(cmd.id().as_str());
    assert!(!cmd.run().await.unwrap());

    for attempt in 1..=2 {
        let out = std::fs::read_to_string(dir.join(format!("stdout.log.{attempt}"))).unwrap();
        let err = std::fs::read_to_string(dir.join(format!("stderr.log.{attempt}"))).unwrap();
        assert_eq!(out, "out\n");
        assert_eq!(err, "err\n");
    }

    let summary = std::fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines.iter().all(|l| l.contains("[nightly](")));
    assert!(lines[0].ends_with("The command has started"));
    assert!(lines[1].contains("The 1st attempt has started. pid: "));
    assert!(lines[4].contains("The 2nd attempt has failed in "));
    assert!(lines[5].contains("The command has finished with failure in "));
}

#[tokio::test]
async fn telemetry_sink_ships_records_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();
        let mut raw = String::new();
        conn.read_to_string(&mut raw).await.unwrap();
        raw
    });

    let mut cfg = shell("echo hi", 1);
    cfg.sinks = vec![SinkKind::Telemetry];
    cfg.telemetry = TelemetrySinkConfig {
        host: "127.0.0.1".into(),
        port,
        tag_prefix: "batch".into(),
    };

    let cmd = Command::from_config(&cfg).await.unwrap();
    let id = cmd.id().to_string();
    assert!(cmd.run().await.unwrap());

    let raw = server.await.unwrap();
    let records: Vec<Value> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    let tags: Vec<&str> = records.iter().map(|r| r[0].as_str().unwrap()).collect();
    assert_eq!(
        tags,
        vec![
            "batch.command_start",
            "batch.attempt_start",
            "batch.stdout",
            "batch.attempt_succeed",
            "batch.command_succeed"
        ]
    );
    for r in &records {
        assert_eq!(r[2]["command_id"], id.as_str());
        assert_eq!(r[2]["command_name"], "sh");
        assert!(r[2]["hostname"].is_string());
        assert!(r[1].is_i64());
    }
    assert_eq!(records[2]["log"], "hi\n");
    assert!(records[1][2]["pid"].is_u64());
    assert!(records[3][2]["duration"].is_f64());
}

#[tokio::test]
async fn unreachable_telemetry_does_not_stop_the_command() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let mut cfg = shell("true", 1);
    cfg.sinks = vec![SinkKind::Telemetry];
    cfg.telemetry.host = "127.0.0.1".into();
    cfg.telemetry.port = port;

    let cmd = Command::from_config(&cfg).await.unwrap();
    assert!(cmd.broadcaster().is_empty());
    assert!(cmd.run().await.unwrap());
}

#[tokio::test]
async fn invalid_config_is_rejected_before_anything_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = shell("touch should-not-exist", 0);
    cfg.sinks = vec![SinkKind::File];
    cfg.file.dir = tmp.path().to_path_buf();

    let err = Command::from_config(&cfg).await.err().expect("must fail");
    assert!(matches!(
        err,
        RuntimeError::Config(ConfigError::InvalidMaxAttempts { max_attempts: 0 })
    ));
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

struct Exploding;

#[async_trait]
impl Sink for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }

    async fn on_lifecycle(&self, _: &Event) -> Result<(), SinkError> {
        Err(SinkError::Closed)
    }

    async fn on_stream_chunk(&self, _: u32, _: Stream, _: &[u8]) -> Result<(), SinkError> {
        panic!("exploding sink");
    }
}

#[tokio::test]
async fn broken_sink_is_isolated() {
    let rec = Arc::new(Recorder::default());
    let bus = Broadcaster::new(vec![Arc::new(Exploding), rec.clone()]);
    let cmd = Command::with_broadcaster(&shell("echo fine", 1), bus).unwrap();

    assert!(cmd.run().await.unwrap());
    assert_eq!(rec.output(Stream::Stdout), b"fine\n");
    assert_eq!(rec.lifecycle_labels().last(), Some(&"command_succeed"));
    assert_eq!(rec.closes(), 1);
}
