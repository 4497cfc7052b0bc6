//! Integration tests that connect to a running backend.
//!
//! Gated by `PROGRESS_STREAM_TEST_URL`: either the stream URL
//! (e.g. `ws://localhost:8000/ws/data/`) or the backend base URL
//! (e.g. `http://localhost:8000`).

use std::pin::pin;
use std::time::Duration;

use progress_stream_client::{
    ClientConfig, ClientState, Handlers, OutboundRequest, StreamClient, StreamEvent, StreamTarget,
    subscribe,
};
use tokio_stream::StreamExt;

fn test_target() -> Option<StreamTarget> {
    let url = std::env::var("PROGRESS_STREAM_TEST_URL").ok()?;
    Some(StreamTarget::from_base_url(&url).unwrap())
}

#[tokio::test]
async fn open_and_close() {
    let Some(target) = test_target() else {
        eprintln!("skipping: PROGRESS_STREAM_TEST_URL not set");
        return;
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let (open_tx, close_tx) = (tx.clone(), tx);
    let handlers = Handlers::new()
        .on_open(move || {
            let _ = open_tx.send("open");
        })
        .on_close(move || {
            let _ = close_tx.send("close");
        });

    let client = StreamClient::new(target.as_str(), handlers).unwrap();
    client.connect().unwrap();
    let event = tokio::time::timeout(Duration::from_secs(15), rx.recv())
        .await
        .unwrap();
    assert_eq!(event, Some("open"));
    assert_eq!(client.state(), ClientState::Open);

    client.close();
    let event = tokio::time::timeout(Duration::from_secs(15), rx.recv())
        .await
        .unwrap();
    assert_eq!(event, Some("close"));
}

#[tokio::test]
async fn request_yields_data() {
    let Some(target) = test_target() else {
        eprintln!("skipping: PROGRESS_STREAM_TEST_URL not set");
        return;
    };

    let request = OutboundRequest::new(45, 15).unwrap();
    let (client, events) = subscribe(target.as_str(), request, ClientConfig::default()).unwrap();
    let mut events = pin!(events);

    let first = tokio::time::timeout(Duration::from_secs(15), events.next())
        .await
        .unwrap();
    assert_eq!(first, Some(StreamEvent::Open));

    let second = tokio::time::timeout(Duration::from_secs(30), events.next())
        .await
        .unwrap();
    match second {
        Some(StreamEvent::Message(msg)) => {
            eprintln!("received {} message: {msg:?}", msg.kind());
        }
        other => panic!("expected a message, got {other:?}"),
    }

    client.close();
}
