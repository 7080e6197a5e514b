//! Builds the sink registry from configuration.

use std::sync::Arc;

use tracing::warn;

use crate::config::{Config, SinkKind};
use crate::core::CommandIdentity;

use super::{ConsoleSink, FileSink, Sink, TelemetrySink};

/// Instantiates every sink named in `cfg.sinks`, in order.
///
/// A sink that fails to initialize is logged and left out; the command runs
/// with the rest. Repeated kinds are built once.
pub async fn build_sinks(cfg: &Config, identity: &CommandIdentity) -> Vec<Arc<dyn Sink>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::with_capacity(cfg.sinks.len());
    let mut seen = Vec::with_capacity(cfg.sinks.len());

    for &kind in &cfg.sinks {
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);

        let built: Result<Arc<dyn Sink>, _> = match kind {
            SinkKind::Console => Ok(Arc::new(ConsoleSink::new(identity.clone()))),
            SinkKind::File => FileSink::create(&cfg.file.dir, identity.clone())
                .await
                .map(|s| Arc::new(s) as Arc<dyn Sink>),
            SinkKind::Telemetry => TelemetrySink::connect(&cfg.telemetry, identity.clone())
                .await
                .map(|s| Arc::new(s) as Arc<dyn Sink>),
        };
        match built {
            Ok(sink) => sinks.push(sink),
            Err(e) => {
                warn!(sink = %kind, label = e.as_label(), error = %e, "sink disabled");
            }
        }
    }
    sinks
}
