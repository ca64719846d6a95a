use async_trait::async_trait;

use crate::api::TransportError;
use crate::event::Payload;
use crate::sinks::Sink;
use crate::transport::DeliveryMode;

/// Logs batches instead of sending them. Local debugging only.
pub struct PrintSink {}

#[async_trait]
impl Sink for PrintSink {
    async fn deliver(&self, batch: Vec<Payload>, mode: DeliveryMode) -> Result<(), TransportError> {
        let span = tracing::span!(tracing::Level::INFO, "batch of events", mode = mode.as_str());
        span.in_scope(|| {
            for payload in batch {
                tracing::info!("event: {}", serde_json::Value::Object(payload));
            }
        });

        Ok(())
    }
}
