//! Domain types for the provider bridge.
//!
//! This module contains the core types, configuration, and error handling.

pub mod config;
pub mod error;
pub mod ids;
pub mod methods;
pub mod networks;
pub mod types;

pub use config::{BridgeConfig, ConfigError};
pub use error::{ApiError, ApiResult, BridgeError, TransportError};
pub use ids::{BridgeId, HexIdGenerator};
pub use methods::{FilterMethod, SubscriptionMethod, WalletMethod};
pub use types::*;
