use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cron::Cron;
use crate::event::Payload;
use crate::prometheus::{report_delivered_batch, report_delivery_error};
use crate::sinks::Sink;
use crate::time::TimeSource;
use crate::transport::DeliveryMode;

/// Pending payloads, delivered as one batch when the size threshold is exceeded,
/// when the flush interval passes without a flush, or on demand.
pub struct Buffer {
    size: usize,
    pending: Mutex<Vec<Payload>>,
    sink: Arc<dyn Sink + Send + Sync>,
    cron: Option<Arc<Cron>>,
    blocking: AtomicBool,
}

impl Buffer {
    /// A flush timer is only started when `size > 0` and `flush_interval` is set: with a
    /// size of 0 every add flushes anyway.
    pub fn new(
        size: usize,
        sink: Arc<dyn Sink + Send + Sync>,
        flush_interval: Option<Duration>,
        time: Arc<dyn TimeSource + Send + Sync>,
    ) -> Arc<Self> {
        let cron = match flush_interval {
            Some(interval) if size > 0 => Some(Arc::new(Cron::new(interval, time))),
            _ => None,
        };

        let buffer = Arc::new(Self {
            size,
            pending: Mutex::new(Vec::with_capacity(size)),
            sink,
            cron,
            blocking: AtomicBool::new(false),
        });

        if let Some(cron) = &buffer.cron {
            // Detached: the loop ends on its own once the buffer is dropped
            drop(buffer.start_timer(cron));
        }
        buffer
    }

    fn start_timer(self: &Arc<Self>, cron: &Arc<Cron>) -> JoinHandle<()> {
        tracing::debug!(repeat = ?cron.repeat(), "starting buffer flush timer");
        let buffer = Arc::downgrade(self);
        cron.start(move || {
            let buffer = buffer.upgrade()?;
            Some(async move { buffer.flush().await })
        })
    }

    pub fn has_timer(&self) -> bool {
        self.cron.is_some()
    }

    pub fn default_mode(&self) -> DeliveryMode {
        if self.blocking.load(Ordering::SeqCst) {
            DeliveryMode::Blocking
        } else {
            DeliveryMode::Background
        }
    }

    pub fn set_default_mode(&self, mode: DeliveryMode) {
        self.blocking
            .store(mode == DeliveryMode::Blocking, Ordering::SeqCst);
    }

    pub async fn add(&self, elements: Vec<Payload>) {
        self.add_with(elements, self.default_mode()).await
    }

    pub async fn add_with(&self, elements: Vec<Payload>, mode: DeliveryMode) {
        let over_threshold = {
            let mut pending = self.pending();
            pending.extend(elements);
            pending.len() > self.size
        };

        if over_threshold {
            self.flush_with(mode).await;
        }
    }

    pub async fn flush(&self) {
        self.flush_with(self.default_mode()).await
    }

    /// Delivers everything pending as a single batch. Failures are logged and counted;
    /// the batch is not retried.
    pub async fn flush_with(&self, mode: DeliveryMode) {
        let batch = mem::take(&mut *self.pending());
        if batch.is_empty() {
            return;
        }

        let size = batch.len();
        tracing::debug!(size, mode = mode.as_str(), "flushing buffer");
        match self.sink.deliver(batch, mode).await {
            Ok(()) => report_delivered_batch(mode.as_str(), size),
            Err(err) => {
                report_delivery_error(mode.as_str());
                tracing::error!(size, mode = mode.as_str(), "failed to deliver batch: {}", err);
            }
        }

        if let Some(cron) = &self.cron {
            cron.delay();
        }
    }

    /// Drops everything pending without delivering it.
    pub fn clear(&self) {
        let dropped = mem::take(&mut *self.pending()).len();
        if dropped > 0 {
            tracing::debug!(dropped, "cleared buffer");
        }
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    pub fn elements(&self) -> Vec<Payload> {
        self.pending().clone()
    }

    fn pending(&self) -> MutexGuard<'_, Vec<Payload>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
