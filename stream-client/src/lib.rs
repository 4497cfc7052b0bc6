//! Async WebSocket client for the progress data stream.
//!
//! A [`StreamClient`] opens a WebSocket to the backend's `/ws/data/` route,
//! sends one [`OutboundRequest`] per connection and surfaces the pushed
//! [`InboundMessage`]s through optional [`Handlers`]. [`subscribe`] offers the
//! same events as a `Stream`, and [`ReconnectingStream`] keeps a connection
//! alive with exponential backoff.

mod client;
mod connection;
pub mod endpoint;
pub mod error;
pub mod handlers;
#[cfg(test)]
mod mock;
pub mod reconnect;
pub mod state;
pub mod stream;

pub use client::{StreamClient, StreamClientBuilder};
pub use endpoint::{
    LOCAL_STREAM_ENDPOINT, STREAM_URL_ENV, StreamTarget, endpoint_from, resolve_endpoint,
};
pub use error::{ClientError, Result};
pub use handlers::{Diagnostics, Handlers, TracingDiagnostics};
pub use reconnect::{ReconnectConfig, ReconnectingStream};
pub use state::{ClientConfig, ClientState};
pub use stream::{StreamEvent, subscribe};

pub use progress_stream_protocol::{DataPayload, InboundMessage, OutboundRequest, ProtocolError};
