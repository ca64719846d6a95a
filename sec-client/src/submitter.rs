use std::io;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use compression::{Compressor, GzipCompressor};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::api::{TransportError, ValidationError};
use crate::buffer::Buffer;
use crate::event::{add_timestamp, validate_events, Event, Payload};
use crate::home_doc::{get_client_settings, HomeDocument, ServiceLinks};
use crate::prometheus::{report_dropped_events, report_received_events};
use crate::shutdown::{self, ShutdownGuard};
use crate::sinks::link::LinkSink;
use crate::sinks::Sink;
use crate::throttle::ThrottleFilter;
use crate::time::{SystemTime, TimeSource};
use crate::transport::{DeliveryMode, Headers, Transport};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Events held before a flush is forced. 0 sends every submission straight away.
    pub buffer_size: usize,
    /// Flush after this long without a flush. Ignored when `buffer_size` is 0.
    pub buffer_flush_seconds: Option<NonZeroU64>,
    pub gzip_compressor: bool,
}

/// Entry point of the pipeline: throttle, validate, enrich, then buffer.
pub struct EventSubmitter {
    home_doc_url: Option<String>,
    links: ServiceLinks,
    metadata: Headers,
    options: Options,
    transport: Arc<dyn Transport + Send + Sync>,
    time: Arc<dyn TimeSource + Send + Sync>,
    throttle: ThrottleFilter,
    buffer: Arc<Buffer>,
    shutdown: ShutdownGuard,
}

pub struct EventSubmitterBuilder {
    home_doc_url: Option<String>,
    links: ServiceLinks,
    metadata: Headers,
    transport: Arc<dyn Transport + Send + Sync>,
    options: Options,
    time: Arc<dyn TimeSource + Send + Sync>,
    sink: Option<Arc<dyn Sink + Send + Sync>>,
}

impl EventSubmitterBuilder {
    /// Where `links` came from. Only shown by [`EventSubmitter::render`].
    pub fn home_doc_url(mut self, url: impl Into<String>) -> Self {
        self.home_doc_url = Some(url.into());
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn time_source(mut self, time: Arc<dyn TimeSource + Send + Sync>) -> Self {
        self.time = time;
        self
    }

    /// Deliver batches here instead of the submit-events link.
    pub fn sink(mut self, sink: Arc<dyn Sink + Send + Sync>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Starts the throttle clock and, when configured, the buffer flush timer, so it
    /// must run inside a tokio runtime.
    pub fn build(self) -> Result<Arc<EventSubmitter>, TransportError> {
        let sink = match self.sink {
            Some(sink) => sink,
            None => {
                let compressor: Option<Arc<dyn Compressor + Send + Sync>> =
                    if self.options.gzip_compressor {
                        Some(Arc::new(GzipCompressor::default()))
                    } else {
                        None
                    };
                Arc::new(LinkSink::new(
                    self.links.submit_events.clone(),
                    self.metadata.clone(),
                    self.transport.clone(),
                    compressor,
                )?)
            }
        };

        let flush_interval = self
            .options
            .buffer_flush_seconds
            .map(|seconds| Duration::from_secs(seconds.get()));
        let buffer = Buffer::new(
            self.options.buffer_size,
            sink,
            flush_interval,
            self.time.clone(),
        );

        let throttle = ThrottleFilter::default();
        drop(throttle.start_clock());

        tracing::info!(
            buffer_size = self.options.buffer_size,
            flush_interval = ?flush_interval,
            gzip = self.options.gzip_compressor,
            blocked = self.links.submit_events.is_none(),
            "event submitter ready"
        );

        Ok(Arc::new(EventSubmitter {
            home_doc_url: self.home_doc_url,
            links: self.links,
            metadata: self.metadata,
            options: self.options,
            transport: self.transport,
            time: self.time,
            throttle,
            buffer,
            shutdown: ShutdownGuard::new(),
        }))
    }
}

impl EventSubmitter {
    pub fn builder(
        links: ServiceLinks,
        metadata: Headers,
        transport: Arc<dyn Transport + Send + Sync>,
    ) -> EventSubmitterBuilder {
        EventSubmitterBuilder {
            home_doc_url: None,
            links,
            metadata,
            transport,
            options: Options::default(),
            time: Arc::new(SystemTime {}),
            sink: None,
        }
    }

    pub fn new(
        links: ServiceLinks,
        metadata: Headers,
        options: Options,
        transport: Arc<dyn Transport + Send + Sync>,
        time: Arc<dyn TimeSource + Send + Sync>,
    ) -> Result<Arc<Self>, TransportError> {
        Self::builder(links, metadata, transport)
            .options(options)
            .time_source(time)
            .build()
    }

    /// Fetch the home document and build a submitter for the links it grants.
    pub async fn connect(
        home_doc_url: &str,
        metadata: Headers,
        options: Options,
        transport: Arc<dyn Transport + Send + Sync>,
    ) -> Result<Arc<Self>, TransportError> {
        let home_doc = HomeDocument::fetch(&transport, home_doc_url, &metadata).await?;
        let links = ServiceLinks::try_from(&home_doc)?;

        Self::builder(links, metadata, transport)
            .home_doc_url(home_doc_url)
            .options(options)
            .build()
    }

    pub async fn submit_event(&self, event: Event) -> Result<(), ValidationError> {
        self.submit_events(vec![event]).await
    }

    pub async fn submit_events(&self, events: Vec<Event>) -> Result<(), ValidationError> {
        self.submit_events_with(events, self.buffer.default_mode())
            .await
    }

    /// Throttled events are dropped silently. If any remaining event is invalid the whole
    /// call fails and nothing is buffered.
    #[instrument(skip_all, fields(events = events.len(), mode = mode.as_str()))]
    pub async fn submit_events_with(
        &self,
        events: Vec<Event>,
        mode: DeliveryMode,
    ) -> Result<(), ValidationError> {
        report_received_events(events.len() as u64);

        let events = self.throttle.filter(events);
        if let Err(err) = validate_events(&events) {
            report_dropped_events("invalid", events.len() as u64);
            return Err(err);
        }

        let mut payloads: Vec<Payload> = events.into_iter().map(Event::into_payload).collect();
        add_timestamp(&mut payloads, &self.time.current_time());

        self.buffer.add_with(payloads, mode).await;
        Ok(())
    }

    /// Always waits for the response. `Ok(None)` when this client has no settings link.
    pub async fn get_settings(&self) -> Result<Option<Value>, TransportError> {
        get_client_settings(&self.transport, self.links.settings.as_ref(), &self.metadata).await
    }

    pub async fn flush_buffer(&self) {
        self.buffer.flush().await
    }

    pub fn clear_buffer(&self) {
        self.buffer.clear()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn throttle(&self) -> &ThrottleFilter {
        &self.throttle
    }

    pub async fn close(&self) {
        self.shutdown.close(self).await
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_closed()
    }

    /// Resolves once [`close`](Self::close) has finished.
    pub async fn closed(&self) {
        self.shutdown.closed().await
    }

    /// Close on SIGINT or SIGTERM.
    pub fn listen_for_close_signals(self: &Arc<Self>) -> io::Result<JoinHandle<()>> {
        shutdown::listen(self)
    }

    /// Debug snapshot of the submitter state.
    pub fn render(&self) -> Value {
        json!({
            "serviceDocument": self.home_doc_url,
            "links": self.links,
            "headers": self.metadata,
            "configuration": self.options,
            "buffer": self.buffer.elements(),
        })
    }
}
