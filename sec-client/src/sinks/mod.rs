use async_trait::async_trait;

use crate::api::TransportError;
use crate::event::Payload;
use crate::transport::DeliveryMode;

pub mod link;
pub mod print;

/// Where flushed batches go. One call per flush, elements in insertion order.
#[async_trait]
pub trait Sink {
    async fn deliver(&self, batch: Vec<Payload>, mode: DeliveryMode) -> Result<(), TransportError>;
}
