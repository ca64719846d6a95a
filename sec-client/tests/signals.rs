use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use sec_client::submitter::{EventSubmitter, Options};
use sec_client::transport::{DeliveryMode, Headers};

mod common;
use common::*;

fn raise(signal: &str) {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg(std::process::id().to_string())
        .status()
        .expect("failed to run kill");
    assert!(status.success());
}

#[tokio::test]
async fn first_signal_closes_and_later_ones_are_ignored() {
    let sink = Arc::new(RecordingSink::default());
    let submitter = EventSubmitter::builder(
        links("application/json"),
        Headers::new(),
        Arc::new(RecordingTransport::default()),
    )
    .options(Options {
        buffer_size: 10,
        ..Default::default()
    })
    .sink(sink.clone())
    .build()
    .unwrap();
    let _listener = submitter.listen_for_close_signals().unwrap();

    submitter.submit_event(client_event("pending")).await.unwrap();
    assert!(sink.deliveries().is_empty());

    raise("TERM");
    tokio::time::timeout(Duration::from_secs(5), submitter.closed())
        .await
        .expect("SIGTERM should close the submitter");

    raise("INT");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let deliveries = sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    let (batch, mode) = &deliveries[0];
    assert_eq!(*mode, DeliveryMode::Blocking);
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0]["name"], "pending");
    assert_eq!(batch[1]["event-context"], "window closed");
}
