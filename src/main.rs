//! Prometheus exporter for home meteo sensor telemetry.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use meteo_exporter_prometheus::{
    ExporterConfig, HttpServer, IngestionHandler, SensorRegistry, SensorSubscriber, subscriber,
};

/// Prometheus exporter for home meteo sensor telemetry.
#[derive(Parser, Debug)]
#[command(name = "meteo-exporter-prometheus")]
#[command(about = "Export sensor readings as Prometheus gauges")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Key expression to subscribe to (overrides config).
    #[arg(long)]
    key_expr: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // CLI overrides
    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(key_expr) = args.key_expr {
        config.subscription.key_expr = key_expr;
    }

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("meteo_exporter_prometheus={}", log_level).parse()?)
        .add_directive(format!("zenoh={}", Level::WARN).parse()?);

    match config.logging.format {
        meteo_exporter_prometheus::config::LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        meteo_exporter_prometheus::config::LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!("Starting meteo Prometheus exporter");

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create the registry and the ingestion handler
    let registry = Arc::new(SensorRegistry::new(config.prometheus.metric_name.clone()));
    let handler = Arc::new(IngestionHandler::new(
        registry.clone(),
        config.subscription.shape,
    ));

    // Parse listen address
    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // Connect to Zenoh. Failure here is fatal: the exporter has no purpose
    // without ingestion.
    let session = subscriber::connect(&config.zenoh).await?;

    // Create components
    let sensor_subscriber = SensorSubscriber::new(handler, config.subscription.key_expr.clone());
    let http_server = HttpServer::new(registry.clone(), listen_addr, config.prometheus.path.clone());

    // Start subscriber
    let subscriber_shutdown = shutdown_rx.clone();
    let subscriber_task = tokio::spawn(async move {
        if let Err(e) = sensor_subscriber.run(session, subscriber_shutdown).await {
            error!("Subscriber error: {}", e);
        }
    });

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).expect("failed to install SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = subscriber_task.await;
        let _ = http_task.await;
    })
    .await;

    // Print final stats
    let stats = registry.stats();
    info!(
        messages_received = stats.messages_received,
        messages_dropped = stats.messages_dropped,
        readings_applied = stats.readings_applied,
        series_count = registry.series_count(),
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}
