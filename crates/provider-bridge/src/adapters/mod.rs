//! Adapters for the provider bridge.
//!
//! Implementations of the outbound ports over in-process infrastructure.

pub mod wallet_store;
