//! Strict decoding of raw messages posted by the page.
//!
//! A page message is a port message carrying a mux frame, a tab event, or
//! an ironman request for the FIBOS accounts. Anything else is rejected at
//! the boundary.

use crate::domain::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ironman action asking the wallet to sign a FIBOS transaction
pub const SIGN_PROVIDER: &str = "signProvider";

/// Port message carrying a mux frame for one bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortMessage {
    /// Sender-side port name
    pub name: String,
    /// Mux frame
    pub data: Value,
    /// Origin of the posting window
    pub origin: String,
}

/// Events the injected page script reports to the tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TabEvent {
    /// A nested frame finished loading and wants a provider
    #[serde(rename = "FRAME_READY")]
    FrameReady { url: String },

    /// In-page navigation (history API)
    #[serde(rename = "NAV_CHANGE")]
    NavChange {
        url: String,
        #[serde(default)]
        title: String,
    },

    /// Answer to the window-information script
    #[serde(rename = "GET_TITLE_FOR_BOOKMARK")]
    TitleForBookmark {
        title: String,
        url: String,
        #[serde(default)]
        icon: Option<String>,
    },
}

/// Request posted by the injected ironman script.
#[derive(Debug, Clone, PartialEq)]
pub struct IronmanMessage {
    /// Requested action
    pub action: String,
    /// Action parameters (`{}` when absent)
    pub params: Value,
    /// The message as received; replies echo it back
    raw: Map<String, Value>,
}

impl IronmanMessage {
    fn from_object(raw: Map<String, Value>) -> Result<Self, TransportError> {
        let action = match raw.get("ironman") {
            Some(Value::String(action)) if !action.is_empty() => action.clone(),
            _ => {
                return Err(TransportError::MalformedFrame(
                    "ironman action is not a string".into(),
                ))
            }
        };
        let params = match raw.get("params") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(params) => params.clone(),
        };
        Ok(Self { action, params, raw })
    }

    /// Transaction of a `signProvider` request. Other actions and requests
    /// without a transaction have nothing to sign.
    pub fn transaction(&self) -> Option<&Value> {
        if self.action != SIGN_PROVIDER {
            return None;
        }
        self.params
            .get("transaction")
            .filter(|tx| !tx.is_null() && *tx != &Value::Bool(false))
    }

    /// The request with its `data` field replaced by `data`
    pub fn reply(&self, data: Value) -> Value {
        let mut reply = self.raw.clone();
        reply.insert("data".to_string(), data);
        Value::Object(reply)
    }
}

/// Any inbound page message.
#[derive(Debug, Clone, PartialEq)]
pub enum PageMessage {
    Port(PortMessage),
    Tab(TabEvent),
    Ironman(IronmanMessage),
}

impl PageMessage {
    /// Decode a raw message, rejecting oversized or unrecognized input.
    pub fn decode(raw: &str, max_size: usize) -> Result<Self, TransportError> {
        if raw.len() > max_size {
            return Err(TransportError::MessageTooLarge {
                size: raw.len(),
                max: max_size,
            });
        }

        let value: Value = serde_json::from_str(raw)
            .map_err(|e| TransportError::MalformedFrame(format!("invalid JSON: {}", e)))?;

        let Value::Object(object) = value else {
            return Err(TransportError::MalformedFrame("message is not an object".into()));
        };

        if object.contains_key("ironman") {
            IronmanMessage::from_object(object).map(PageMessage::Ironman)
        } else if object.contains_key("name") {
            serde_json::from_value(Value::Object(object))
                .map(PageMessage::Port)
                .map_err(|e| TransportError::MalformedFrame(format!("port message: {}", e)))
        } else if object.contains_key("type") {
            serde_json::from_value(Value::Object(object))
                .map(PageMessage::Tab)
                .map_err(|e| TransportError::MalformedFrame(format!("tab event: {}", e)))
        } else {
            Err(TransportError::MalformedFrame(
                "message has neither name nor type".into(),
            ))
        }
    }
}
