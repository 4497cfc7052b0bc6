use progress_stream_protocol::ProtocolError;
use tokio_tungstenite::tungstenite;

/// Errors that can occur during stream client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection target is not a usable `ws://` / `wss://` URI.
    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget {
        /// The rejected input.
        target: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Method called in a state that forbids it (e.g. `send` before open).
    #[error("invalid state: expected {expected}, actual {actual}")]
    InvalidState {
        /// The state(s) required for the operation.
        expected: &'static str,
        /// The current client state.
        actual: &'static str,
    },

    /// The connection already carried its one request.
    #[error("request already sent on this connection")]
    RequestAlreadySent,

    /// `connect` was called outside a tokio runtime.
    #[error("no tokio runtime available to drive the connection")]
    NoRuntime,

    /// The connection worker stopped without reporting a terminal state.
    #[error("disconnected")]
    Disconnected,

    /// Request encoding or frame decoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket transport failure (handshake, I/O, peer protocol violation).
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Reconnect attempts exhausted.
    #[error("reconnect failed after {attempts} attempts")]
    ReconnectFailed {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
}

/// Convenience alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;
