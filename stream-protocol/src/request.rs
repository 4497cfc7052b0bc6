use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Upper bound for [`OutboundRequest::progress`] (a percentage).
pub const MAX_PROGRESS: u8 = 100;

/// Window the backend aggregates over when the client does not choose one.
pub const DEFAULT_WINDOW_SEC: u32 = 10;

/// The single request a client sends after the channel opens.
///
/// `progress` selects how much of the dataset to consider (0–100) and
/// `window_sec` the trailing time window, in seconds, to aggregate over.
///
/// Wire form: `{"progress":45,"window_sec":15}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub progress: u8,
    pub window_sec: u32,
}

impl OutboundRequest {
    /// Build a request, rejecting out-of-range values.
    pub fn new(progress: u8, window_sec: u32) -> Result<Self> {
        let request = Self {
            progress,
            window_sec,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check `progress <= 100` and `window_sec > 0`.
    pub fn validate(&self) -> Result<()> {
        if self.progress > MAX_PROGRESS {
            return Err(ProtocolError::InvalidRequest(format!(
                "progress must be within 0..={MAX_PROGRESS}, got {}",
                self.progress
            )));
        }
        if self.window_sec == 0 {
            return Err(ProtocolError::InvalidRequest(
                "window_sec must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a text frame as sent by a client.
    pub fn decode(text: &str) -> Result<Self> {
        let request: Self = serde_json::from_str(text)?;
        request.validate()?;
        Ok(request)
    }
}

impl Default for OutboundRequest {
    fn default() -> Self {
        Self {
            progress: 0,
            window_sec: DEFAULT_WINDOW_SEC,
        }
    }
}
