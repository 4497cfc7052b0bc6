use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, Result};

/// Tag of the only message type the client interprets.
pub const DATA_TAG: &str = "data";

/// Body of a `"data"` message: the current sample plus the window history.
///
/// Samples are opaque to the protocol and kept as raw JSON values. Payload
/// fields beyond `point` and `series` are kept in `extra`; top-level fields
/// beside `type` and `payload` are not kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    pub point: Value,
    pub series: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataPayload {
    pub fn new(point: Value, series: Vec<Value>) -> Self {
        Self {
            point,
            series,
            extra: Map::new(),
        }
    }
}

/// A decoded server push.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    /// `{"type":"data","payload":{"point":..,"series":[..]}}`
    Data(DataPayload),
    /// `{"error":"..."}` without a `type`, sent when the server rejects a
    /// request or its query fails.
    ServerError { message: String },
    /// Any other tag. `body` is the complete object as received, `type`
    /// field included.
    Other { kind: String, body: Map<String, Value> },
    /// An object without a `type` tag, such as the backend's query result
    /// `{"progress":45,"data":[..],"window_sec":15}`.
    Untyped(Map<String, Value>),
}

impl InboundMessage {
    /// Parse one text frame.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let tag = match object.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(_) => return Err(ProtocolError::InvalidType),
            None => {
                return Ok(match object.remove("error") {
                    Some(Value::String(message)) if object.is_empty() => {
                        Self::ServerError { message }
                    }
                    Some(error) => {
                        object.insert("error".into(), error);
                        Self::Untyped(object)
                    }
                    None => Self::Untyped(object),
                });
            }
        };

        if tag != DATA_TAG {
            return Ok(Self::Other { kind: tag, body: object });
        }

        let payload = object
            .remove("payload")
            .ok_or_else(|| ProtocolError::InvalidPayload {
                tag: tag.clone(),
                reason: "missing payload".into(),
            })?;
        let payload: DataPayload =
            serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
                tag,
                reason: e.to_string(),
            })?;
        Ok(Self::Data(payload))
    }

    /// Parse a binary frame carrying UTF-8 JSON.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
        Self::decode(text)
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String> {
        let value = match self {
            Self::Data(payload) => {
                let mut object = Map::new();
                object.insert("type".into(), Value::String(DATA_TAG.into()));
                object.insert("payload".into(), serde_json::to_value(payload)?);
                Value::Object(object)
            }
            Self::ServerError { message } => {
                let mut object = Map::new();
                object.insert("error".into(), Value::String(message.clone()));
                Value::Object(object)
            }
            Self::Other { kind, body } => {
                let mut object = body.clone();
                object
                    .entry("type")
                    .or_insert_with(|| Value::String(kind.clone()));
                Value::Object(object)
            }
            Self::Untyped(body) => Value::Object(body.clone()),
        };
        Ok(serde_json::to_string(&value)?)
    }

    /// Returns the message tag (`"error"` for server error frames, empty for
    /// untyped frames).
    pub fn kind(&self) -> &str {
        match self {
            Self::Data(_) => DATA_TAG,
            Self::ServerError { .. } => "error",
            Self::Other { kind, .. } => kind,
            Self::Untyped(_) => "",
        }
    }

    /// Returns the data payload if this is a `"data"` message.
    pub fn as_data(&self) -> Option<&DataPayload> {
        match self {
            Self::Data(payload) => Some(payload),
            _ => None,
        }
    }
}
