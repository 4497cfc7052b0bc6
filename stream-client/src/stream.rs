use futures_core::Stream;
use progress_stream_protocol::{InboundMessage, OutboundRequest};
use tokio::sync::mpsc;

use crate::client::StreamClient;
use crate::error::Result;
use crate::handlers::Handlers;
use crate::state::ClientConfig;

/// A lifecycle event observed on a [`StreamClient`].
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Open,
    Message(InboundMessage),
    Close,
    /// Transport failure, rendered as text.
    Error(String),
}

impl StreamEvent {
    /// Whether no further events follow for this connection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Close | Self::Error(_))
    }
}

/// Connect to `target`, send `request` on open, and return the client with a
/// [`Stream`] of its events.
///
/// The stream ends after the first [`Close`](StreamEvent::Close) or
/// [`Error`](StreamEvent::Error). Keep the returned client alive while
/// consuming: dropping it closes the connection.
pub fn subscribe(
    target: &str,
    request: OutboundRequest,
    config: ClientConfig,
) -> Result<(StreamClient, impl Stream<Item = StreamEvent> + use<>)> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = ClientConfig {
        initial_request: Some(request),
        ..config
    };
    let client = StreamClient::with_config(target, event_handlers(tx), config)?;
    client.connect()?;

    let events = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            yield event;
            if terminal {
                break;
            }
        }
    };
    Ok((client, events))
}

/// Handlers that forward every event into `tx`.
pub(crate) fn event_handlers(tx: mpsc::UnboundedSender<StreamEvent>) -> Handlers {
    let (open_tx, message_tx, close_tx, error_tx) = (tx.clone(), tx.clone(), tx.clone(), tx);
    // Send failures mean the consumer is gone
    Handlers::new()
        .on_open(move || {
            let _ = open_tx.send(StreamEvent::Open);
        })
        .on_message(move |message| {
            let _ = message_tx.send(StreamEvent::Message(message));
        })
        .on_close(move || {
            let _ = close_tx.send(StreamEvent::Close);
        })
        .on_error(move |error| {
            let _ = error_tx.send(StreamEvent::Error(error.to_string()));
        })
}
