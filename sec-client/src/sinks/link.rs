use std::sync::Arc;

use async_trait::async_trait;
use compression::Compressor;

use crate::api::TransportError;
use crate::event::Payload;
use crate::home_doc::LinkDescription;
use crate::serializer::Serializer;
use crate::sinks::Sink;
use crate::transport::{dispatch, merge_headers, DeliveryMode, Headers, HttpRequest, Transport};

struct SubmitTarget {
    link: LinkDescription,
    serializer: Serializer,
}

/// Sends batches to the submit-events link of the home document.
pub struct LinkSink {
    target: Option<SubmitTarget>,
    metadata: Headers,
    transport: Arc<dyn Transport + Send + Sync>,
    compressor: Option<Arc<dyn Compressor + Send + Sync>>,
}

impl LinkSink {
    /// Fails if the link's content type has no serializer. Without a link, for example when
    /// the client is blocked, every delivery is a no-op.
    pub fn new(
        link: Option<LinkDescription>,
        metadata: Headers,
        transport: Arc<dyn Transport + Send + Sync>,
        compressor: Option<Arc<dyn Compressor + Send + Sync>>,
    ) -> Result<Self, TransportError> {
        let target = match link {
            Some(link) => Some(SubmitTarget {
                serializer: Serializer::for_content_type(&link.content_type)?,
                link,
            }),
            None => {
                tracing::debug!("link description missing, will not make http requests");
                None
            }
        };

        Ok(Self {
            target,
            metadata,
            transport,
            compressor,
        })
    }

    fn request(
        &self,
        target: &SubmitTarget,
        batch: &[Payload],
    ) -> Result<HttpRequest, TransportError> {
        let mut body = target.serializer.serialize(batch)?;
        let mut headers = Headers::from([(
            "Content-Type".to_owned(),
            target.link.content_type.clone(),
        )]);

        if let Some(compressor) = &self.compressor {
            body = compressor
                .compress(&body)
                .map_err(TransportError::Compression)?
                .into();
            headers.insert(
                "Content-Encoding".to_owned(),
                compressor.encoding().to_owned(),
            );
        }
        merge_headers(&mut headers, &self.metadata);

        Ok(HttpRequest {
            method: target.link.method,
            url: target.link.href.clone(),
            headers,
            body: Some(body),
        })
    }
}

#[async_trait]
impl Sink for LinkSink {
    async fn deliver(&self, batch: Vec<Payload>, mode: DeliveryMode) -> Result<(), TransportError> {
        let Some(target) = &self.target else {
            return Ok(());
        };

        let request = self.request(target, &batch)?;
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            mode = mode.as_str(),
            events = batch.len(),
            "submitting batch"
        );

        match dispatch(self.transport.clone(), request, mode).await? {
            Some(response) if !response.is_success() => Err(TransportError::UnexpectedStatus {
                method: target.link.method.to_string(),
                url: target.link.href.clone(),
                status: response.status,
            }),
            _ => Ok(()),
        }
    }
}
