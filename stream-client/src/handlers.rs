use std::fmt;

use progress_stream_protocol::{InboundMessage, ProtocolError};
use tracing::warn;

use crate::error::ClientError;

pub(crate) type OpenHandler = Box<dyn FnMut() + Send>;
pub(crate) type MessageHandler = Box<dyn FnMut(InboundMessage) + Send>;
pub(crate) type CloseHandler = Box<dyn FnMut() + Send>;
pub(crate) type ErrorHandler = Box<dyn FnMut(&ClientError) + Send>;

/// Lifecycle callbacks for a [`StreamClient`](crate::StreamClient).
///
/// Every slot is optional; an empty slot means the event is ignored.
/// Handlers are invoked one at a time from the connection worker and must not
/// block.
///
/// ```
/// use progress_stream_client::Handlers;
///
/// let handlers = Handlers::new()
///     .on_open(|| println!("open"))
///     .on_message(|msg| println!("{}", msg.kind()))
///     .on_close(|| println!("closed"));
/// ```
#[derive(Default)]
pub struct Handlers {
    pub(crate) on_open: Option<OpenHandler>,
    pub(crate) on_message: Option<MessageHandler>,
    pub(crate) on_close: Option<CloseHandler>,
    pub(crate) on_error: Option<ErrorHandler>,
}

impl Handlers {
    /// An empty handler table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once the handshake completes.
    pub fn on_open(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_open = Some(Box::new(f));
        self
    }

    /// Called for every successfully decoded frame.
    pub fn on_message(mut self, f: impl FnMut(InboundMessage) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    /// Called once when the connection closes cleanly.
    pub fn on_close(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    /// Called on transport failure.
    pub fn on_error(mut self, f: impl FnMut(&ClientError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn open(&mut self) {
        if let Some(f) = self.on_open.as_mut() {
            f();
        }
    }

    pub(crate) fn message(&mut self, message: InboundMessage) {
        if let Some(f) = self.on_message.as_mut() {
            f(message);
        }
    }

    pub(crate) fn close(&mut self) {
        if let Some(f) = self.on_close.as_mut() {
            f();
        }
    }

    pub(crate) fn error(&mut self, error: &ClientError) {
        if let Some(f) = self.on_error.as_mut() {
            f(error);
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Sink for frames that could not be decoded.
///
/// Decode failures never reach `on_error` and never end the stream.
pub trait Diagnostics: Send + Sync {
    fn decode_error(&self, error: &ProtocolError, frame: &str);
}

/// Default [`Diagnostics`]: logs a warning through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn decode_error(&self, error: &ProtocolError, frame: &str) {
        warn!(%error, frame, "discarding undecodable frame");
    }
}
