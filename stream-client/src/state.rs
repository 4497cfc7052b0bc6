use std::time::Duration;

use progress_stream_protocol::OutboundRequest;

/// Client connection state machine.
///
/// Transitions: `Idle` → `Connecting` → `Open` → `Closing` → `Closed`.
/// `Faulted` is entered from `Connecting` or `Open` on transport failure.
/// `Closed` and `Faulted` accept a fresh `connect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Constructed, never connected.
    Idle,
    /// Handshake in flight.
    Connecting,
    /// Handshake complete; frames flow both ways.
    Open,
    /// Close requested; waiting for the transport to confirm.
    Closing,
    /// Connection released after `on_close`.
    Closed,
    /// Connection released after `on_error`.
    Faulted,
}

impl ClientState {
    /// Returns the state name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
            Self::Faulted => "Faulted",
        }
    }

    /// Whether no connection worker is attached in this state.
    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Faulted)
    }
}

/// Configuration for [`StreamClient`](crate::StreamClient) connections.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// How long to wait for the peer to confirm a close before the socket is
    /// dropped anyway. Default: 5 seconds.
    pub close_timeout: Duration,
    /// Request the client sends by itself right after `on_open`. Default: none,
    /// the owner calls [`send`](crate::StreamClient::send).
    pub initial_request: Option<OutboundRequest>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            close_timeout: Duration::from_secs(5),
            initial_request: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_states() {
        assert!(ClientState::Idle.is_detached());
        assert!(ClientState::Closed.is_detached());
        assert!(ClientState::Faulted.is_detached());
        assert!(!ClientState::Connecting.is_detached());
        assert!(!ClientState::Open.is_detached());
        assert!(!ClientState::Closing.is_detached());
    }

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.close_timeout, Duration::from_secs(5));
        assert!(config.initial_request.is_none());
    }
}
