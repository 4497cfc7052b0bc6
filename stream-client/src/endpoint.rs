//! Connection targets and endpoint resolution.
//!
//! The stream lives at `/ws/data/` on the backend. Local development talks to
//! the loopback default; deployments set [`STREAM_URL_ENV`] to either the
//! full stream URL or the backend's HTTP base URL.

use std::fmt;
use std::str::FromStr;

use tokio_tungstenite::tungstenite::http::Uri;

use crate::error::{ClientError, Result};

/// Local development stream endpoint.
pub const LOCAL_STREAM_ENDPOINT: &str = "ws://localhost:8000/ws/data/";

/// Path of the stream route on the backend.
pub const STREAM_PATH: &str = "/ws/data/";

/// Environment variable overriding the stream endpoint.
pub const STREAM_URL_ENV: &str = "PROGRESS_STREAM_URL";

/// A validated `ws://` or `wss://` URI.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    url: String,
    secure: bool,
}

impl StreamTarget {
    /// Validate a WebSocket URI. Surrounding whitespace is ignored.
    pub fn parse(target: &str) -> Result<Self> {
        let url = target.trim();
        let uri: Uri = url.parse().map_err(|e| invalid(target, format!("{e}")))?;

        let secure = match uri.scheme_str() {
            Some("ws") => false,
            Some("wss") => true,
            Some(other) => {
                return Err(invalid(
                    target,
                    format!("scheme must be ws or wss, got {other:?}"),
                ));
            }
            None => return Err(invalid(target, "missing scheme".into())),
        };

        if uri.host().is_none_or(str::is_empty) {
            return Err(invalid(target, "missing host".into()));
        }

        Ok(Self {
            url: url.to_owned(),
            secure,
        })
    }

    /// Build a target from a backend base URL.
    ///
    /// `http`/`https` bases map to `ws`/`wss` with [`STREAM_PATH`] appended
    /// to the base path; `ws`/`wss` URLs are taken as is.
    pub fn from_base_url(base: &str) -> Result<Self> {
        let trimmed = base.trim();
        let uri: Uri = trimmed
            .parse()
            .map_err(|e| invalid(base, format!("{e}")))?;

        let scheme = match uri.scheme_str() {
            Some("ws") | Some("wss") => return Self::parse(trimmed),
            Some("http") => "ws",
            Some("https") => "wss",
            Some(other) => {
                return Err(invalid(base, format!("unsupported scheme {other:?}")));
            }
            None => return Err(invalid(base, "missing scheme".into())),
        };
        let authority = uri
            .authority()
            .ok_or_else(|| invalid(base, "missing host".into()))?;
        let base_path = uri.path().trim_end_matches('/');

        Self::parse(&format!("{scheme}://{authority}{base_path}{STREAM_PATH}"))
    }

    /// Returns the URI text.
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Whether the target uses `wss`.
    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

impl FromStr for StreamTarget {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Resolve the stream endpoint from [`STREAM_URL_ENV`], defaulting to
/// [`LOCAL_STREAM_ENDPOINT`].
pub fn resolve_endpoint() -> Result<StreamTarget> {
    endpoint_from(std::env::var(STREAM_URL_ENV).ok().as_deref())
}

/// Resolve the stream endpoint from an optional override.
///
/// An unset or blank override selects [`LOCAL_STREAM_ENDPOINT`].
pub fn endpoint_from(override_url: Option<&str>) -> Result<StreamTarget> {
    match override_url.map(str::trim) {
        Some(url) if !url.is_empty() => StreamTarget::from_base_url(url),
        _ => StreamTarget::parse(LOCAL_STREAM_ENDPOINT),
    }
}

fn invalid(target: &str, reason: String) -> ClientError {
    ClientError::InvalidTarget {
        target: target.to_owned(),
        reason,
    }
}
