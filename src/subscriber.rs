//! Zenoh subscriber that delivers sensor messages to the ingestion handler.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, trace, warn};
use zenoh::Session;
use zenoh::sample::SampleKind;

use crate::config::ZenohConfig;
use crate::ingest::IngestionHandler;

/// Open a Zenoh session using the provided configuration.
///
/// This blocks until the connection outcome is known. Callers treat failure
/// as fatal: the exporter has no purpose without ingestion.
pub async fn connect(config: &ZenohConfig) -> anyhow::Result<Session> {
    let mut zenoh_config = zenoh::Config::default();

    zenoh_config
        .insert_json5("mode", &format!("\"{}\"", config.mode))
        .map_err(|e| anyhow::anyhow!("Failed to set mode: {}", e))?;

    if !config.connect.is_empty() {
        let endpoints_json = serde_json::to_string(&config.connect)?;
        zenoh_config
            .insert_json5("connect/endpoints", &endpoints_json)
            .map_err(|e| anyhow::anyhow!("Failed to set connect endpoints: {}", e))?;
    }

    if !config.listen.is_empty() {
        let endpoints_json = serde_json::to_string(&config.listen)?;
        zenoh_config
            .insert_json5("listen/endpoints", &endpoints_json)
            .map_err(|e| anyhow::anyhow!("Failed to set listen endpoints: {}", e))?;
    }

    info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open Zenoh session: {}", e))?;

    info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}

/// Subscribes to one fixed key expression and feeds each sample to the
/// ingestion handler. Per-message failures stay inside the handler; the
/// loop only stops on shutdown.
pub struct SensorSubscriber {
    handler: Arc<IngestionHandler>,
    key_expr: String,
}

impl SensorSubscriber {
    /// Create a subscriber bound to a fixed key expression.
    pub fn new(handler: Arc<IngestionHandler>, key_expr: impl Into<String>) -> Self {
        Self {
            handler,
            key_expr: key_expr.into(),
        }
    }

    /// Run the subscriber on an open session until the shutdown signal.
    pub async fn run(
        self,
        session: Session,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        info!(key_expr = %self.key_expr, "Subscribing to sensor telemetry");
        let subscriber = session
            .declare_subscriber(&self.key_expr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create subscriber: {}", e))?;

        info!("Subscriber started, waiting for messages...");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received, stopping subscriber");
                        break;
                    }
                }

                sample = subscriber.recv_async() => {
                    match sample {
                        Ok(sample) => {
                            if sample.kind() == SampleKind::Delete {
                                trace!(key = %sample.key_expr(), "Ignoring delete sample");
                                continue;
                            }

                            let payload = sample.payload().to_bytes();
                            self.handler.handle(sample.key_expr().as_str(), &payload);
                        }
                        Err(e) => {
                            warn!("Error receiving sample: {}", e);
                        }
                    }
                }
            }
        }

        // Clean shutdown
        subscriber
            .undeclare()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to undeclare subscriber: {}", e))?;
        session
            .close()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to close session: {}", e))?;

        info!("Subscriber stopped");
        Ok(())
    }
}
