//! Ingestion handler: one invocation per inbound message.

use tracing::{trace, warn};

use crate::payload::{PayloadShape, decode_readings};
use crate::registry::{MetricKey, SharedRegistry};

/// Folds inbound messages into the registry.
///
/// The handler holds no state across invocations: each call decodes one
/// payload and applies its readings, last-write-wins. Decode failures drop
/// the message and never unwind past this boundary.
pub struct IngestionHandler {
    registry: SharedRegistry,
    shape: PayloadShape,
}

impl IngestionHandler {
    /// Create a handler for the configured payload shape.
    pub fn new(registry: SharedRegistry, shape: PayloadShape) -> Self {
        Self { registry, shape }
    }

    /// Handle one inbound message.
    ///
    /// The topic is accepted for diagnostics only; the payload shape is a
    /// per-deployment configuration choice, not inferred from the topic.
    pub fn handle(&self, topic: &str, payload: &[u8]) {
        self.registry.note_message_received();

        let readings = match decode_readings(self.shape, payload) {
            Ok(readings) => readings,
            Err(e) => {
                warn!(
                    topic = %topic,
                    payload_len = payload.len(),
                    error = %e,
                    "Dropping undecodable message"
                );
                self.registry.note_message_dropped();
                return;
            }
        };

        let count = readings.len() as u64;
        for reading in readings {
            trace!(
                name = %reading.name,
                sensor_type = %reading.sensor_type,
                value = reading.value,
                "Applying reading"
            );
            self.registry
                .set(MetricKey::new(reading.name, reading.sensor_type), reading.value);
        }
        self.registry.note_readings_applied(count);
    }
}
