use bytes::Bytes;

use crate::api::TransportError;
use crate::event::Payload;

/// Wire format for a batch, picked from the submit link's content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serializer {
    Json,
}

impl Serializer {
    pub fn for_content_type(content_type: &str) -> Result<Self, TransportError> {
        if content_type.contains("json") {
            Ok(Serializer::Json)
        } else {
            Err(TransportError::UnsupportedContentType(
                content_type.to_owned(),
            ))
        }
    }

    pub fn serialize(&self, batch: &[Payload]) -> Result<Bytes, TransportError> {
        match self {
            Serializer::Json => serde_json::to_vec(batch)
                .map(Bytes::from)
                .map_err(TransportError::Serialization),
        }
    }
}
