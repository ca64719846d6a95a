//! Service document discovery: the home document lists the links the client is allowed to use.
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::TransportError;
use crate::transport::{merge_headers, Headers, HttpMethod, HttpRequest, Transport};

pub const SUBMIT_EVENTS_REL: &str = "http://a42.vodafone.com/rels/sec/submit-events";
pub const SETTINGS_REL: &str = "http://a42.vodafone.com/rels/sec/settings";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkDescription {
    pub method: HttpMethod,
    pub href: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Only the relations the client uses are parsed. Other links may use any shape.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct HomeDocument {
    #[serde(default)]
    pub links: HashMap<String, Value>,
}

/// The links the pipeline uses. A missing link means the client was blocked from that
/// operation, which degrades to a no-op rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLinks {
    pub submit_events: Option<LinkDescription>,
    pub settings: Option<LinkDescription>,
}

impl TryFrom<&HomeDocument> for ServiceLinks {
    type Error = TransportError;

    fn try_from(home_doc: &HomeDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            submit_events: home_doc.link(SUBMIT_EVENTS_REL)?,
            settings: home_doc.link(SETTINGS_REL)?,
        })
    }
}

impl HomeDocument {
    /// `Ok(None)` when the relation is absent, an error when it is present but malformed.
    pub fn link(&self, relation: &str) -> Result<Option<LinkDescription>, TransportError> {
        self.links
            .get(relation)
            .map(|link| LinkDescription::deserialize(link).map_err(TransportError::InvalidBody))
            .transpose()
    }

    pub async fn fetch(
        transport: &Arc<dyn Transport + Send + Sync>,
        url: &str,
        metadata: &Headers,
    ) -> Result<HomeDocument, TransportError> {
        let mut headers = Headers::from([("Accept".to_owned(), "application/json".to_owned())]);
        merge_headers(&mut headers, metadata);

        tracing::info!(url, "fetching home document");
        get_json(transport, url, headers).await
    }
}

/// `Ok(None)` when no settings link is configured.
pub async fn get_client_settings(
    transport: &Arc<dyn Transport + Send + Sync>,
    link: Option<&LinkDescription>,
    metadata: &Headers,
) -> Result<Option<Value>, TransportError> {
    let Some(link) = link else {
        tracing::debug!("link description missing, will not make http request to get client settings");
        return Ok(None);
    };

    let mut headers = Headers::from([("Accept".to_owned(), link.content_type.clone())]);
    merge_headers(&mut headers, metadata);

    get_json(transport, &link.href, headers).await.map(Some)
}

async fn get_json<T: serde::de::DeserializeOwned>(
    transport: &Arc<dyn Transport + Send + Sync>,
    url: &str,
    headers: Headers,
) -> Result<T, TransportError> {
    // Always blocking: the caller needs the document before it can go on.
    let response = transport.send(HttpRequest::get(url, headers)).await?;

    TransportError::check_status("GET", url, response.status)?;
    response.json()
}
