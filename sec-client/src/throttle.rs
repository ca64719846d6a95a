use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::cache::TemporaryCache;
use crate::event::Event;
use crate::prometheus::report_throttled_events;

/// Drops events whose `duplication.key` was seen within its repeat window.
///
/// Suppression is not an error: throttled events simply never reach the buffer.
pub struct ThrottleFilter {
    cache: Arc<Mutex<TemporaryCache>>,
}

impl ThrottleFilter {
    pub fn new(cache: TemporaryCache) -> Self {
        Self {
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    /// Start expiring keys in real time. Without it, time only moves via [`Self::advance_time`].
    pub fn start_clock(&self) -> JoinHandle<()> {
        TemporaryCache::start_clock(&self.cache)
    }

    pub fn advance_time(&self, ticks: u64) {
        self.lock().advance_time(ticks);
    }

    pub fn is_throttled(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn filter(&self, events: Vec<Event>) -> Vec<Event> {
        let received = events.len();
        let mut cache = self.lock();

        let kept: Vec<Event> = events
            .into_iter()
            .filter(|event| match &event.duplication {
                None => true,
                Some(duplication) if cache.contains(&duplication.key) => {
                    tracing::debug!(key = %duplication.key, "dropping throttled event");
                    false
                }
                Some(duplication) => {
                    cache.put(duplication.key.clone(), duplication.repeat_seconds);
                    true
                }
            })
            .collect();

        report_throttled_events((received - kept.len()) as u64);
        kept
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TemporaryCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ThrottleFilter {
    fn default() -> Self {
        Self::new(TemporaryCache::new())
    }
}
