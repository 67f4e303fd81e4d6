//! Core JSON-RPC types for the provider bridge.
//!
//! Quantities follow Ethereum JSON-RPC conventions with hex string serialization.

use super::error::{ApiError, ApiResult};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use primitive_types::{H160 as Address, H256 as Hash};

/// JSON-RPC protocol version
pub const JSONRPC_VERSION: &str = "2.0";

/// u64 quantity with hex string serialization.
///
/// Serializes as `"0x..."`, deserializes from a hex string, a decimal string
/// or a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Quantity(pub u64);

impl Quantity {
    /// Parse `"0x1f"`, `"31"` or `31`
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Quantity),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromStr for Quantity {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex_str) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u64::from_str_radix(hex_str, 16)
                .map(Quantity)
                .map_err(|_| "invalid hex quantity")
        } else {
            s.parse::<u64>()
                .map(Quantity)
                .map_err(|_| "invalid decimal quantity")
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl From<u64> for Quantity {
    fn from(v: u64) -> Self {
        Quantity(v)
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct QuantityVisitor;

        impl<'de> de::Visitor<'de> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a hex string starting with 0x or a number")
            }

            fn visit_str<E>(self, value: &str) -> Result<Quantity, E>
            where
                E: de::Error,
            {
                value.parse().map_err(de::Error::custom)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Quantity, E>
            where
                E: de::Error,
            {
                Ok(Quantity(value))
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}

/// JSON-RPC request ID type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    /// Numeric ID (must fit in i64 for compatibility)
    Number(i64),
    /// String ID
    String(String),
    /// Missing or null ID
    #[default]
    Null,
}

impl JsonRpcId {
    /// Validate the ID is acceptable
    ///
    /// Rejects strings longer than 256 chars.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            JsonRpcId::String(s) if s.len() > 256 => {
                Err("request ID string too long (max 256 chars)")
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::String(s) => write!(f, "\"{}\"", s),
            JsonRpcId::Number(n) => write!(f, "{}", n),
            JsonRpcId::Null => f.write_str("null"),
        }
    }
}

fn default_jsonrpc() -> String {
    JSONRPC_VERSION.to_string()
}

/// Inbound JSON-RPC request from the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: JsonRpcId,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Hostname of the calling frame, stamped by the pipeline.
    #[serde(skip)]
    pub origin: Option<String>,
}

impl RpcRequest {
    /// Build a request (used by the emulator for backend calls and by tests)
    pub fn new(id: JsonRpcId, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id,
            method: method.into(),
            params,
            origin: None,
        }
    }

    /// Positional parameter `index`, if params is an array
    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.as_array().and_then(|p| p.get(index))
    }

    /// Positional parameter `index` as a string
    pub fn str_param(&self, index: usize) -> ApiResult<&str> {
        self.param(index)
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::invalid_params(format!("expected string at index {}", index)))
    }

    /// Origin stamped on the request, or an empty string
    pub fn origin(&self) -> &str {
        self.origin.as_deref().unwrap_or_default()
    }
}

/// Outbound JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: JsonRpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl RpcResponse {
    pub fn success(id: JsonRpcId, result: Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: JsonRpcId, error: ApiError) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn from_result(id: JsonRpcId, result: ApiResult<Value>) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(e) => Self::error(id, e),
        }
    }
}

/// JSON-RPC notification (no id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl RpcNotification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            method: method.into(),
            params,
        }
    }

    /// `eth_subscription` push for a live subscription
    pub fn subscription(subscription: &str, result: Value) -> Self {
        Self::new(
            "eth_subscription",
            serde_json::json!({ "subscription": subscription, "result": result }),
        )
    }
}

/// Block reference in a log filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockRef {
    Number(u64),
    #[default]
    Latest,
    Earliest,
    Pending,
}

impl<'de> Deserialize<'de> for BlockRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value.as_str() {
            Some("latest") => Ok(BlockRef::Latest),
            Some("earliest") => Ok(BlockRef::Earliest),
            Some("pending") => Ok(BlockRef::Pending),
            _ => Quantity::from_value(&value)
                .map(|q| BlockRef::Number(q.0))
                .ok_or_else(|| de::Error::custom("invalid block reference")),
        }
    }
}

impl Serialize for BlockRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            BlockRef::Number(n) => Quantity(*n).serialize(serializer),
            BlockRef::Latest => serializer.serialize_str("latest"),
            BlockRef::Earliest => serializer.serialize_str("earliest"),
            BlockRef::Pending => serializer.serialize_str("pending"),
        }
    }
}

/// Filter for `eth_newFilter`, `eth_getLogs` and `logs` subscriptions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<BlockRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<BlockRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<FilterAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<Option<FilterTopic>>>,
}

/// Filter address - single or multiple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterAddress {
    Single(Address),
    Multiple(Vec<Address>),
}

/// Filter topic - single or multiple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterTopic {
    Single(Hash),
    Multiple(Vec<Hash>),
}

/// The fields of a backend log entry the emulator inspects.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFields {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<Hash>,
    #[serde(default)]
    pub block_number: Option<Quantity>,
}
