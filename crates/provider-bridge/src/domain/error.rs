//! Provider bridge error types with JSON-RPC 2.0 and EIP-1193 error codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON-RPC 2.0 and provider error codes
pub mod codes {
    // JSON-RPC 2.0 standard errors (-32700 to -32600)
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Server errors (-32000 to -32099)
    pub const LIMIT_EXCEEDED: i32 = -32005;

    // EIP-1193 provider errors
    pub const USER_REJECTED: i32 = 4001;
    pub const UNAUTHORIZED: i32 = 4100;
}

/// JSON-RPC error returned to the page
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// JSON-RPC error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional data
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    // Standard JSON-RPC errors

    /// Parse error - invalid JSON
    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(
            codes::PARSE_ERROR,
            format!("Parse error: {}", details.into()),
        )
    }

    /// Invalid request, message passed through untouched
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, message)
    }

    /// Method not found
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("The method {} does not exist/is not available", method),
        )
    }

    /// Invalid parameters
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_PARAMS,
            format!("Invalid params: {}", details.into()),
        )
    }

    /// Internal error
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            format!("Internal error: {}", details.into()),
        )
    }

    /// Per-bridge limit exceeded (filters, subscriptions)
    pub fn limit_exceeded(limit: impl Into<String>) -> Self {
        Self::new(
            codes::LIMIT_EXCEEDED,
            format!("Limit exceeded: {}", limit.into()),
        )
    }

    // Provider errors

    /// The user rejected the request
    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self::new(codes::USER_REJECTED, message)
    }

    /// The origin is not allowed to call this method
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(codes::UNAUTHORIZED, message)
    }

    /// A pending request was abandoned because its bridge went away
    pub fn cancelled() -> Self {
        Self::new(
            codes::USER_REJECTED,
            "Request cancelled: bridge disconnected",
        )
    }

    /// Typed data was signed for another chain
    pub fn chain_mismatch(provided: impl fmt::Display, active: impl fmt::Display) -> Self {
        Self::invalid_request(format!(
            "Provided chainId ({}) must match the active chainId ({})",
            provided, active
        ))
    }

    /// Whether this is a user rejection (including cancellation)
    pub fn is_user_rejection(&self) -> bool {
        self.code == codes::USER_REJECTED
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ApiError", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if let Some(ref data) = self.data {
            state.serialize_field("data", data)?;
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for ApiError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ErrorHelper {
            code: i32,
            message: String,
            data: Option<serde_json::Value>,
        }

        let helper = ErrorHelper::deserialize(deserializer)?;
        Ok(ApiError {
            code: helper.code,
            message: helper.message,
            data: helper.data,
        })
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_syntax() || e.is_eof() {
            ApiError::parse_error(e.to_string())
        } else {
            ApiError::invalid_params(e.to_string())
        }
    }
}

/// Result type for RPC operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Mux and port failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// A channel with this name already exists
    #[error("stream already registered: {0}")]
    DuplicateStream(String),

    /// Inbound frame is not `{name, data}`
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Inbound message exceeds the configured limit
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Host failed to run the injected script
    #[error("script injection failed: {0}")]
    Injection(String),

    /// The multiplexer or port has been torn down
    #[error("transport closed")]
    Closed,
}

/// Bridge-level errors (not JSON-RPC, host-facing)
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Transport failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame URL could not be parsed
    #[error("invalid frame url: {0}")]
    InvalidUrl(String),

    /// Origin flagged by the phishing oracle
    #[error("origin blocked as phishing: {0}")]
    PhishingOrigin(String),

    /// Page message could not be decoded
    #[error("malformed page message: {0}")]
    MalformedMessage(String),

    /// The bridge was already disconnected
    #[error("bridge disconnected")]
    Disconnected,

    /// No approval prompt is pending
    #[error("no pending approval")]
    NoPendingApproval,

    /// Tracing subscriber could not be installed
    #[error("telemetry init failed: {0}")]
    Telemetry(String),
}
