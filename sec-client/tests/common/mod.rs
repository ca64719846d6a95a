#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use sec_client::api::TransportError;
use sec_client::event::{Event, Payload};
use sec_client::home_doc::{LinkDescription, ServiceLinks};
use sec_client::sinks::Sink;
use sec_client::transport::{DeliveryMode, HttpMethod, HttpRequest, HttpResponse, Transport};

pub const SUBMIT_URL: &str = "https://sec.example/events";
pub const SETTINGS_URL: &str = "https://sec.example/settings";

/// Records every request and answers with a canned response per URL (200 with an
/// empty body when none is set).
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<HttpRequest>>,
    responses: Mutex<HashMap<String, (u16, Value)>>,
}

impl RecordingTransport {
    pub fn respond(&self, url: &str, status: u16, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_owned(), (status, body));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url == url)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let canned = self.responses.lock().unwrap().get(&request.url).cloned();
        self.requests.lock().unwrap().push(request);

        Ok(match canned {
            Some((status, body)) => HttpResponse {
                status,
                body: Bytes::from(serde_json::to_vec(&body).unwrap()),
            },
            None => HttpResponse {
                status: 200,
                body: Bytes::new(),
            },
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<(Vec<Payload>, DeliveryMode)>>,
}

impl RecordingSink {
    pub fn deliveries(&self) -> Vec<(Vec<Payload>, DeliveryMode)> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<Vec<Payload>> {
        self.deliveries()
            .into_iter()
            .map(|(batch, _)| batch)
            .collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn deliver(&self, batch: Vec<Payload>, mode: DeliveryMode) -> Result<(), TransportError> {
        self.deliveries.lock().unwrap().push((batch, mode));
        Ok(())
    }
}

pub fn links(content_type: &str) -> ServiceLinks {
    ServiceLinks {
        submit_events: Some(LinkDescription {
            method: HttpMethod::POST,
            href: SUBMIT_URL.to_owned(),
            content_type: content_type.to_owned(),
        }),
        settings: Some(LinkDescription {
            method: HttpMethod::GET,
            href: SETTINGS_URL.to_owned(),
            content_type: "application/json".to_owned(),
        }),
    }
}

pub fn client_event(name: &str) -> Event {
    Event::new(payload(json!({ "event-type": "client", "name": name })))
}

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(payload) => payload,
        other => panic!("not an object: {other}"),
    }
}
