// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Provider Bridge - connects dApp pages in the in-app browser to the wallet.
//!
//! Every frame that loads a page gets its own bridge. The page's injected
//! provider talks JSON-RPC over a multiplexed message channel; the bridge
//! answers account, signing and wallet methods itself, emulates filters and
//! subscriptions on top of block arrivals, and forwards everything else to
//! the blockchain backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              TAB CONTROLLER                                  │
//! │   on_load_start / on_message / approve_accounts / notify_*_connections       │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐  ┌──────────────────────┐                         │
//! │  │ Bridge (main frame)  │  │ Bridge (iframe)      │   ...                   │
//! │  └──────────┬───────────┘  └──────────┬───────────┘                         │
//! │             │                         │                                     │
//! │  ┌──────────┴─────────────────────────┴──────────┐                          │
//! │  │  Port → Multiplexer ("provider", "publicConfig")│                        │
//! │  └──────────────────────┬─────────────────────────┘                         │
//! │                         │                                                   │
//! │  ┌──────────────────────┴─────────────────────────┐                         │
//! │  │              Middleware Pipeline                │                         │
//! │  │ Origin → Logging → Filters → Subscriptions →   │                         │
//! │  │ Wallet methods → Forward                        │                         │
//! │  └──────────────────────┬─────────────────────────┘                         │
//! └─────────────────────────┼───────────────────────────────────────────────────┘
//!                           │
//!            ┌──────────────┼───────────────┬──────────────────┐
//!            ▼              ▼               ▼                  ▼
//!      RpcExecutor    MessageSigner     WalletUi        wallet-bus store
//! ```
//!
//! # Permissions
//!
//! Accounts are disclosed to an origin only when privacy mode is off or the
//! user approved that hostname. A tab has at most one pending approval
//! prompt; concurrent `eth_requestAccounts` calls from the same hostname wait
//! on the same decision.
//!
//! # Usage
//!
//! ```ignore
//! use provider_bridge::{BridgeConfig, BridgeServices, TabController};
//!
//! let tab = TabController::new(BridgeConfig::default(), services)?;
//! tab.on_load_start("https://dapp.example/")?;
//! tab.on_message(raw_page_message)?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod bridge;
pub mod domain;
pub mod emulator;
pub mod middleware;
pub mod permission;
pub mod ports;
pub mod public_config;
pub mod rpc;
pub mod tab;
pub mod telemetry;
pub mod transport;

// Re-exports for public API
pub use bridge::{BridgeInstance, BridgeServices, BridgeState};
pub use domain::config::BridgeConfig;
pub use domain::error::{ApiError, ApiResult, BridgeError, TransportError};
pub use domain::methods::WalletMethod;
pub use domain::types::*;
pub use permission::ApprovalSlot;
pub use public_config::PublicConfig;
pub use tab::{PageMetaTracker, TabController};
pub use telemetry::{init_tracing, LogConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client version string for web3_clientVersion
pub fn client_version(name: &str, app_version: &str) -> String {
    format!("{}/{}/Beta/Mobile", name, app_version)
}
