//! Connect to the progress stream, send one request and print every event.
//!
//! ```text
//! PROGRESS_STREAM_URL=http://backend:8000 cargo run --example probe
//! ```
//!
//! Exits on Ctrl-C or when the connection ends.

use std::pin::pin;

use futures_util::StreamExt;
use progress_stream_client::{
    ClientConfig, InboundMessage, OutboundRequest, StreamEvent, resolve_endpoint, subscribe,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("progress_stream_client=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let target = resolve_endpoint()?;
    let request = OutboundRequest::new(45, 15)?;
    println!("connecting to {target}");

    let (client, events) = subscribe(target.as_str(), request, ClientConfig::default())?;
    let mut events = pin!(events);
    let mut closing = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !closing => {
                println!("interrupted, closing");
                closing = true;
                client.close();
            }
            event = events.next() => match event {
                Some(StreamEvent::Open) => println!("open"),
                Some(StreamEvent::Message(msg)) => match &msg {
                    InboundMessage::Data(data) => println!(
                        "data point={} series_len={}",
                        data.point,
                        data.series.len()
                    ),
                    InboundMessage::Untyped(body) => println!(
                        "result progress={} window_sec={} points={}",
                        body.get("progress").unwrap_or(&Value::Null),
                        body.get("window_sec").unwrap_or(&Value::Null),
                        body.get("data").and_then(Value::as_array).map_or(0, Vec::len)
                    ),
                    _ => println!("{} {msg:?}", msg.kind()),
                },
                Some(StreamEvent::Close) => {
                    println!("closed");
                    break;
                }
                Some(StreamEvent::Error(e)) => {
                    eprintln!("error: {e}");
                    break;
                }
                None => break,
            },
        }
    }

    Ok(())
}
