//! Wire types and JSON frame codec for the progress data stream.
//!
//! This crate provides the shared protocol layer: the request a client
//! sends once per connection and the typed messages the server pushes.
//! It performs no I/O.

pub mod error;
pub mod message;
pub mod request;

pub use error::{ProtocolError, Result};
pub use message::{DATA_TAG, DataPayload, InboundMessage};
pub use request::{DEFAULT_WINDOW_SEC, MAX_PROGRESS, OutboundRequest};
