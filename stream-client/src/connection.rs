use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use progress_stream_protocol::InboundMessage;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::client::Shared;
use crate::endpoint::StreamTarget;
use crate::error::Result;
use crate::state::ClientConfig;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Requests from the owner to the connection worker.
#[derive(Debug)]
pub(crate) enum Command {
    Send(String),
    Close,
}

/// Drive one physical connection from handshake to release.
///
/// The worker is the only caller of handlers for its connection, so handler
/// invocations are serialized.
pub(crate) async fn run(
    target: StreamTarget,
    config: ClientConfig,
    shared: Arc<Shared>,
    generation: u64,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let outcome = drive(&target, &config, &shared, generation, &mut commands).await;
    if let Err(ref error) = outcome {
        debug!(url = %target, %error, "connection ended with error");
    }
    shared.terminate(generation, outcome.err());
}

async fn drive(
    target: &StreamTarget,
    config: &ClientConfig,
    shared: &Shared,
    generation: u64,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Result<()> {
    let connecting = connect_async(target.as_str());
    tokio::pin!(connecting);

    let mut socket = loop {
        tokio::select! {
            result = &mut connecting => break result?.0,
            command = commands.recv() => match command {
                Some(Command::Close) | None => {
                    debug!(url = %target, "close requested during handshake");
                    return Ok(());
                }
                // Rejected by `send` outside Open
                Some(Command::Send(_)) => {}
            },
        }
    };

    if !shared.mark_open(generation) {
        debug!(url = %target, "handshake completed after close, suppressing open");
        close_socket(&mut socket, config.close_timeout).await;
        return Ok(());
    }

    info!(url = %target, "open");
    shared.fire_open();

    if let Some(request) = config.initial_request
        && shared.claim_request(generation)
    {
        debug!(
            progress = request.progress,
            window_sec = request.window_sec,
            "sending initial request"
        );
        socket.send(Message::Text(request.encode()?)).await?;
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    trace!(frame = %text, "sending");
                    socket.send(Message::Text(text)).await?;
                }
                Some(Command::Close) | None => {
                    debug!(url = %target, "closing");
                    close_socket(&mut socket, config.close_timeout).await;
                    return Ok(());
                }
            },
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "frame received");
                    match InboundMessage::decode(&text) {
                        Ok(message) => shared.deliver(generation, message),
                        Err(error) => shared.decode_error(&error, &text),
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    trace!(len = bytes.len(), "binary frame received");
                    match InboundMessage::decode_bytes(&bytes) {
                        Ok(message) => shared.deliver(generation, message),
                        Err(error) => shared.decode_error(&error, &String::from_utf8_lossy(&bytes)),
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    socket.send(Message::Pong(payload)).await?;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(url = %target, ?frame, "peer closed");
                    close_socket(&mut socket, config.close_timeout).await;
                    return Ok(());
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Ok(());
                }
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }
}

/// Complete the closing handshake, bounded by `timeout`.
///
/// Frames arriving meanwhile are discarded.
async fn close_socket(socket: &mut Socket, timeout: Duration) {
    let handshake = async {
        if let Err(e) = socket.close(None).await {
            trace!(error = %e, "close frame not sent");
        }
        while let Some(Ok(_)) = socket.next().await {}
    };
    if tokio::time::timeout(timeout, handshake).await.is_err() {
        warn!(?timeout, "peer did not confirm close, dropping socket");
    }
}
