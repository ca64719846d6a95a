use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::event::{Event, Payload};
use crate::submitter::EventSubmitter;
use crate::transport::DeliveryMode;

/// Runs the close sequence exactly once, however many times it is triggered.
#[derive(Default)]
pub struct ShutdownGuard {
    closed: AtomicBool,
    done: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to blocking delivery, send the terminal event, then flush what is left.
    /// The order matters: everything after the switch completes before this returns.
    pub async fn close(&self, submitter: &EventSubmitter) {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("already closed");
            return;
        }

        tracing::info!("closing, switching to blocking delivery");
        submitter.buffer().set_default_mode(DeliveryMode::Blocking);

        if let Err(err) = submitter
            .submit_events_with(close_events(), DeliveryMode::Blocking)
            .await
        {
            tracing::error!("failed to submit close event: {}", err);
        }
        submitter.buffer().flush_with(DeliveryMode::Blocking).await;

        self.done.cancel();
        tracing::info!("closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once a close sequence has run to completion.
    pub async fn closed(&self) {
        self.done.cancelled().await
    }
}

pub fn close_events() -> Vec<Event> {
    let mut payload = Payload::new();
    payload.insert("event-type".to_owned(), json!("client"));
    payload.insert("event-context".to_owned(), json!("window closed"));
    payload.insert("tags".to_owned(), json!(["generated_by_seclib"]));
    vec![Event::new(payload)]
}

/// Close `submitter` on SIGINT or SIGTERM. Every signal triggers a close, so whichever
/// arrives first wins and the rest are no-ops. The task ends with the submitter.
pub fn listen(submitter: &Arc<EventSubmitter>) -> io::Result<JoinHandle<()>> {
    let mut term = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let submitter = Arc::downgrade(submitter);

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(_) = term.recv() => tracing::info!("received SIGTERM"),
                Some(_) = interrupt.recv() => tracing::info!("received SIGINT"),
                else => break,
            }

            match submitter.upgrade() {
                Some(submitter) => submitter.close().await,
                None => break,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_event_is_a_valid_client_event() {
        let events = close_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].validate(), Ok(()));

        let payload = events[0].clone().into_payload();
        assert_eq!(payload["event-type"], "client");
        assert_eq!(payload["event-context"], "window closed");
        assert_eq!(payload["tags"], json!(["generated_by_seclib"]));
    }

    #[tokio::test]
    async fn closed_resolves_after_close_only() {
        let guard = ShutdownGuard::new();
        assert!(!guard.is_closed());

        let pending = tokio::time::timeout(std::time::Duration::from_millis(10), guard.closed());
        assert!(pending.await.is_err());
    }
}
