use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// How often [`TemporaryCache::start_clock`] advances time by one tick.
pub const TICK: Duration = Duration::from_secs(1);

/// Membership store whose entries expire after a number of ticks.
///
/// Time is external: nothing expires until [`advance_time`](TemporaryCache::advance_time) is
/// called, so driving ticks by hand behaves exactly like the real-time clock.
#[derive(Debug, Default)]
pub struct TemporaryCache {
    entries: HashMap<String, i64>,
}

impl TemporaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert `key` for `ticks` ticks, replacing any remaining lifetime.
    pub fn put(&mut self, key: impl Into<String>, ticks: u64) -> &mut Self {
        let ticks = i64::try_from(ticks).unwrap_or(i64::MAX);
        if ticks > 0 {
            self.entries.insert(key.into(), ticks);
        }
        self
    }

    pub fn advance_time(&mut self, ticks: u64) {
        let ticks = i64::try_from(ticks).unwrap_or(i64::MAX);
        self.entries.retain(|_, remaining| {
            *remaining = remaining.saturating_sub(ticks);
            *remaining > 0
        });
    }

    pub fn ticks_for(&self, key: &str) -> Option<i64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn the 1 tick per second driver. The task stops once the cache is dropped.
    pub fn start_clock(cache: &Arc<Mutex<TemporaryCache>>) -> JoinHandle<()> {
        let cache = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(shared) = cache.upgrade() else {
                    tracing::debug!("throttle cache dropped, stopping its clock");
                    break;
                };
                let advanced = match shared.lock() {
                    Ok(mut entries) => {
                        entries.advance_time(1);
                        true
                    }
                    Err(_) => false,
                };
                if !advanced {
                    tracing::error!("throttle cache lock poisoned, stopping its clock");
                    break;
                }
            }
        })
    }
}
