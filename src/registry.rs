//! Gauge registry holding the latest value of each sensor series.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;

/// A unique identifier for one exposed time series: the `(name, type)`
/// label pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricKey {
    /// Series name, already device-prefixed where applicable.
    pub name: String,
    /// The reading's `type` label (unit or kind).
    pub sensor_type: String,
}

impl MetricKey {
    pub fn new(name: impl Into<String>, sensor_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sensor_type: sensor_type.into(),
        }
    }
}

/// Ingestion statistics.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    /// Messages delivered by the subscription layer.
    pub messages_received: u64,
    /// Messages discarded because their payload failed to decode.
    pub messages_dropped: u64,
    /// Individual readings folded into the registry.
    pub readings_applied: u64,
}

/// Thread-safe last-write-wins gauge store.
///
/// A key once observed stays exposed at its last value for the rest of the
/// process lifetime; there is no expiry. Sensors that stop reporting keep
/// showing their last known value.
pub struct SensorRegistry {
    /// Current gauge values indexed by series key.
    gauges: RwLock<HashMap<MetricKey, f64>>,
    /// The exposed metric family name (default "sensors").
    metric_name: String,
    /// Statistics.
    stats: RwLock<IngestStats>,
}

impl SensorRegistry {
    /// Create an empty registry exposing the given metric family name.
    pub fn new(metric_name: impl Into<String>) -> Self {
        Self {
            gauges: RwLock::new(HashMap::new()),
            metric_name: metric_name.into(),
            stats: RwLock::new(IngestStats::default()),
        }
    }

    /// Set a series to a value, creating it on first use.
    pub fn set(&self, key: MetricKey, value: f64) {
        self.gauges.write().insert(key, value);
    }

    /// Get the current value of a series, if it exists.
    pub fn get(&self, key: &MetricKey) -> Option<f64> {
        self.gauges.read().get(key).copied()
    }

    /// A consistent point-in-time view of all series.
    pub fn snapshot(&self) -> Vec<(MetricKey, f64)> {
        self.gauges
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Number of exposed series.
    pub fn series_count(&self) -> usize {
        self.gauges.read().len()
    }

    /// Record that a message was delivered.
    pub fn note_message_received(&self) {
        self.stats.write().messages_received += 1;
    }

    /// Record that a message was discarded as undecodable.
    pub fn note_message_dropped(&self) {
        self.stats.write().messages_dropped += 1;
    }

    /// Record that `count` readings were folded into the registry.
    pub fn note_readings_applied(&self, count: u64) {
        self.stats.write().readings_applied += count;
    }

    /// Get a copy of the current statistics.
    pub fn stats(&self) -> IngestStats {
        self.stats.read().clone()
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut series = self.snapshot();
        // Sort for stable output across scrapes.
        series.sort_by(|a, b| {
            a.0.name
                .cmp(&b.0.name)
                .then_with(|| a.0.sensor_type.cmp(&b.0.sensor_type))
        });

        let mut output = Vec::with_capacity(series.len() * 64 + 512);

        if !series.is_empty() {
            writeln!(output, "# TYPE {} gauge", self.metric_name).ok();
            for (key, value) in &series {
                writeln!(
                    output,
                    "{}{{name=\"{}\",type=\"{}\"}} {}",
                    self.metric_name,
                    escape_label_value(&key.name),
                    escape_label_value(&key.sensor_type),
                    format_value(*value)
                )
                .ok();
            }
        }

        // Exporter self-metrics.
        let stats = self.stats.read();
        let prefix = &self.metric_name;
        writeln!(output, "# TYPE {}_exporter_series_total gauge", prefix).ok();
        writeln!(output, "{}_exporter_series_total {}", prefix, series.len()).ok();
        writeln!(
            output,
            "# TYPE {}_exporter_messages_received_total counter",
            prefix
        )
        .ok();
        writeln!(
            output,
            "{}_exporter_messages_received_total {}",
            prefix, stats.messages_received
        )
        .ok();
        writeln!(
            output,
            "# TYPE {}_exporter_messages_dropped_total counter",
            prefix
        )
        .ok();
        writeln!(
            output,
            "{}_exporter_messages_dropped_total {}",
            prefix, stats.messages_dropped
        )
        .ok();
        writeln!(
            output,
            "# TYPE {}_exporter_readings_applied_total counter",
            prefix
        )
        .ok();
        writeln!(
            output,
            "{}_exporter_readings_applied_total {}",
            prefix, stats.readings_applied
        )
        .ok();

        String::from_utf8(output).unwrap_or_default()
    }
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<SensorRegistry>;

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
