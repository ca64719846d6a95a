use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::macros::format_description;
use time::OffsetDateTime;

pub trait TimeSource {
    fn now(&self) -> OffsetDateTime;

    // Return an ISO timestamp
    fn current_time(&self) -> String {
        format_trace_timestamp(self.now())
    }
}

/// Millisecond precision UTC, e.g. `2024-01-02T03:04:05.678Z`.
pub fn format_trace_timestamp(at: OffsetDateTime) -> String {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    at.to_offset(time::UtcOffset::UTC)
        .format(format)
        .expect("failed to format timestamp")
}

#[derive(Clone, Default)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct ManualTime {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualTime {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
