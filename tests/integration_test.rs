//! Integration tests for the meteo exporter.
//!
//! These tests verify the full flow from inbound message bytes through the
//! ingestion handler and registry to the HTTP /metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use meteo_exporter_prometheus::{
    HttpServer, IngestionHandler, MetricKey, PayloadShape, SensorRegistry, SharedRegistry,
};

/// Helper to create a registry and a handler for the given shape.
fn create_handler(shape: PayloadShape) -> (IngestionHandler, SharedRegistry) {
    let registry = Arc::new(SensorRegistry::new("sensors"));
    (IngestionHandler::new(registry.clone(), shape), registry)
}

/// Extract the non-comment exposition lines for a given series name.
fn series_lines<'a>(output: &'a str, name: &str) -> Vec<&'a str> {
    output
        .lines()
        .filter(|l| !l.starts_with('#') && l.contains(&format!("name=\"{}\"", name)))
        .collect()
}

#[tokio::test]
async fn test_device_shape_end_to_end() {
    let (handler, registry) = create_handler(PayloadShape::Device);

    handler.handle(
        "homeapp/meteo",
        br#"{"deviceId":"dev1","sensors":[{"name":"temp","type":"celsius","value":21.04}]}"#,
    );

    let output = registry.render();

    let lines = series_lines(&output, "dev1-temp");
    assert_eq!(lines.len(), 1, "Output: {}", output);
    assert!(lines[0].contains("type=\"celsius\""));
    assert!(lines[0].ends_with(" 21"), "Value should be rounded to 21.0");
}

#[tokio::test]
async fn test_list_shape_end_to_end() {
    let (handler, registry) = create_handler(PayloadShape::List);

    handler.handle(
        "homeapp/meteo2",
        br#"[{"name":"humidity","type":"percent","value":55.55}]"#,
    );

    // 55.55 * 10.0 re-rounds to exactly 555.5, a tie, which rounds away
    // from zero.
    assert_eq!(
        registry.get(&MetricKey::new("humidity", "percent")),
        Some(55.6)
    );

    // A later value for the same name/type updates the series rather than
    // duplicating it.
    handler.handle(
        "homeapp/meteo2",
        br#"[{"name":"humidity","type":"percent","value":60.0}]"#,
    );

    let output = registry.render();
    let lines = series_lines(&output, "humidity");
    assert_eq!(lines.len(), 1, "Output: {}", output);
    assert!(lines[0].ends_with(" 60"));
}

#[tokio::test]
async fn test_multiple_devices_and_sensors() {
    let (handler, registry) = create_handler(PayloadShape::Device);

    handler.handle(
        "homeapp/meteo",
        br#"{"deviceId":"dev1","sensors":[
            {"name":"temp","type":"celsius","value":21.27},
            {"name":"humidity","type":"percent","value":48.0}
        ]}"#,
    );
    handler.handle(
        "homeapp/meteo",
        br#"{"deviceId":"dev2","sensors":[{"name":"temp","type":"celsius","value":19.64}]}"#,
    );

    assert_eq!(registry.series_count(), 3);

    let output = registry.render();
    assert!(output.contains("sensors{name=\"dev1-temp\",type=\"celsius\"} 21.3"));
    assert!(output.contains("sensors{name=\"dev1-humidity\",type=\"percent\"} 48"));
    assert!(output.contains("sensors{name=\"dev2-temp\",type=\"celsius\"} 19.6"));
}

#[tokio::test]
async fn test_malformed_burst_leaves_scrape_intact() {
    let (handler, registry) = create_handler(PayloadShape::Device);

    handler.handle(
        "homeapp/meteo",
        br#"{"deviceId":"dev1","sensors":[{"name":"temp","type":"celsius","value":20.0}]}"#,
    );

    for _ in 0..100 {
        handler.handle("homeapp/meteo", b"not json");
        handler.handle("homeapp/meteo", br#"{"sensors": "not-an-array"}"#);
    }

    // The existing series is unchanged and still scrapeable.
    assert_eq!(
        registry.get(&MetricKey::new("dev1-temp", "celsius")),
        Some(20.0)
    );

    let output = registry.render();
    assert!(output.contains("sensors{name=\"dev1-temp\",type=\"celsius\"} 20"));
    assert!(output.contains("sensors_exporter_messages_dropped_total 200"));
}

#[tokio::test]
async fn test_stale_series_stay_exposed() {
    let (handler, registry) = create_handler(PayloadShape::List);

    handler.handle("t", br#"[{"name":"old","type":"c","value":1.5}]"#);
    for i in 0..10 {
        let payload = format!(r#"[{{"name":"fresh","type":"c","value":{}.0}}]"#, i);
        handler.handle("t", payload.as_bytes());
    }

    // "old" never reported again but every snapshot still carries it.
    let output = registry.render();
    assert!(output.contains("sensors{name=\"old\",type=\"c\"} 1.5"));
    assert!(output.contains("sensors{name=\"fresh\",type=\"c\"} 9"));
}

#[tokio::test]
async fn test_http_server_scrape_and_liveness() {
    let (handler, registry) = create_handler(PayloadShape::Device);

    handler.handle(
        "homeapp/meteo",
        br#"{"deviceId":"dev1","sensors":[{"name":"temp","type":"celsius","value":21.04}]}"#,
    );

    // Bind an ephemeral port and hand the listener to the server, so no
    // other process can claim the port in between.
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let actual_addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = HttpServer::new(registry, actual_addr, "/metrics".to_string());
    let server_handle = tokio::spawn(async move {
        let _ = server.run_with_listener(listener, shutdown_rx).await;
    });

    let client = reqwest::Client::new();
    let metrics = client
        .get(format!("http://{}/metrics", actual_addr))
        .send()
        .await
        .unwrap();
    let liveness = client
        .get(format!("http://{}/api", actual_addr))
        .send()
        .await
        .unwrap();

    // Shutdown server
    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(1), server_handle).await;

    assert!(metrics.status().is_success());
    let body = metrics.text().await.unwrap();
    assert!(body.contains("sensors{name=\"dev1-temp\",type=\"celsius\"} 21"));

    assert!(liveness.status().is_success());
    let body = liveness.text().await.unwrap();
    assert_eq!(body, "{\"status\": \"ok\"}");
}
