use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::time::TimeSource;

/// How often the polling loop checks whether the task is due. Scheduled runs can
/// overshoot their interval by up to this much.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Approximate periodic runner. The task runs when `repeat` has elapsed since the
/// last run or the last [`delay`](Cron::delay), whichever is more recent.
pub struct Cron {
    repeat: Duration,
    last_run: Mutex<OffsetDateTime>,
    time: Arc<dyn TimeSource + Send + Sync>,
}

impl Cron {
    pub fn new(repeat: Duration, time: Arc<dyn TimeSource + Send + Sync>) -> Self {
        let last_run = Mutex::new(time.now());
        Self {
            repeat,
            last_run,
            time,
        }
    }

    pub fn repeat(&self) -> Duration {
        self.repeat
    }

    /// Restart the window without running the task.
    pub fn delay(&self) {
        *self.last_run() = self.time.now();
    }

    /// One poll cycle: returns true, and restarts the window, if the task is due.
    pub fn poll(&self) -> bool {
        let now = self.time.now();
        let mut last_run = self.last_run();
        if now - *last_run >= self.repeat {
            *last_run = now;
            true
        } else {
            false
        }
    }

    /// Spawn the polling loop. `task` produces the work for one run, or `None` once its
    /// owner is gone, which ends the loop. The loop also ends when the `Cron` is dropped.
    pub fn start<F, Fut>(self: &Arc<Self>, mut task: F) -> JoinHandle<()>
    where
        F: FnMut() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cron = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;
                let due = match cron.upgrade() {
                    Some(cron) => cron.poll(),
                    None => break,
                };
                if !due {
                    continue;
                }
                match task() {
                    Some(run) => run.await,
                    None => break,
                }
            }
            tracing::debug!("cron stopped");
        })
    }

    fn last_run(&self) -> std::sync::MutexGuard<'_, OffsetDateTime> {
        self.last_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
