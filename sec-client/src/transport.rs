use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::TransportError;
use crate::prometheus::report_delivery_error;

pub type Headers = HashMap<String, String>;

/// Whether a request may complete after the call returns.
///
/// `Background` is the normal mode: the request is spawned and the caller moves on.
/// `Blocking` waits for the response; it is used for settings and for the final flush
/// on shutdown, when the host may exit as soon as the call returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    #[default]
    Background,
    Blocking,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Background => "background",
            DeliveryMode::Blocking => "blocking",
        }
    }
}

/// HTTP methods a link descriptor may ask for. Parsed case-insensitively, e.g. `"post"`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(try_from = "String")]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_ref() {
            "GET" => Ok(HttpMethod::GET),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            _ => Err(format!("unsupported link method {s}")),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET => http::Method::GET,
            HttpMethod::POST => http::Method::POST,
            HttpMethod::PUT => http::Method::PUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, headers: Headers) -> Self {
        Self {
            method: HttpMethod::GET,
            url: url.into(),
            headers,
            body: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(TransportError::InvalidBody)
    }
}

/// Copy every header from `defaults` that `headers` does not already set.
/// Header names are compared case-insensitively.
pub fn merge_headers(headers: &mut Headers, defaults: &Headers) {
    for (name, value) in defaults {
        if !headers.keys().any(|existing| existing.eq_ignore_ascii_case(name)) {
            headers.insert(name.clone(), value.clone());
        }
    }
}

#[async_trait]
pub trait Transport {
    /// Perform the request and wait for its response, whatever the status.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Send `request` in the given mode. Background sends return `None` right away; their
/// failures are logged and counted, never reported to the caller.
pub async fn dispatch(
    transport: Arc<dyn Transport + Send + Sync>,
    request: HttpRequest,
    mode: DeliveryMode,
) -> Result<Option<HttpResponse>, TransportError> {
    match mode {
        DeliveryMode::Blocking => transport.send(request).await.map(Some),
        DeliveryMode::Background => {
            tokio::spawn(async move {
                let method = request.method;
                let url = request.url.clone();
                match transport.send(request).await {
                    Ok(response) if response.is_success() => {}
                    Ok(response) => {
                        report_delivery_error(mode.as_str());
                        tracing::warn!(%method, %url, status = response.status, "request rejected");
                    }
                    Err(err) => {
                        report_delivery_error(mode.as_str());
                        tracing::error!(%method, %url, "request failed: {}", err);
                    }
                }
            });
            Ok(None)
        }
    }
}

/// [`Transport`] over HTTP(S).
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sec-client/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method: http::Method = request.method.into();
        let url: reqwest::Url = request
            .url
            .parse()
            .map_err(|_| TransportError::InvalidUrl(request.url.clone()))?;
        let headers: reqwest::header::HeaderMap = (&request.headers)
            .try_into()
            .map_err(TransportError::InvalidHeaders)?;

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        tracing::debug!(method = %request.method, url = %request.url, status, "request completed");

        Ok(HttpResponse { status, body })
    }
}
