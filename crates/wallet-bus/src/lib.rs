//! # Wallet Bus - Wallet-Wide State and Change Notifications
//!
//! Every dApp provider bridge in the wallet reads the same wallet state
//! (unlock status, active network, selected account, approved hosts) and
//! reacts to the same change events and block arrivals. This crate owns that
//! shared surface.
//!
//! ```text
//! ┌──────────────┐   set_*()    ┌──────────────┐   publish()   ┌──────────────┐
//! │  Wallet UI / │ ───────────▶ │ WalletStore  │ ────────────▶ │  Wallet Bus  │
//! │  Controllers │              │ (RwLock)     │               │  (broadcast) │
//! └──────────────┘              └──────────────┘               └──────┬───────┘
//!                                                                      │ subscribe()
//!                                          ┌───────────────────────────┼─────────────┐
//!                                          ▼                           ▼             ▼
//!                                      Bridge A                    Bridge B      Tab watcher
//! ```
//!
//! ## Rules
//!
//! - Listeners are explicit [`Subscription`] handles. Dropping the handle
//!   unregisters the listener.
//! - Block arrivals travel on the same bus under [`EventTopic::Blocks`] and
//!   are fanned out read-only to every subscriber.
//! - Approved hosts are last-writer-wins; writes only come from the user
//!   approval flow or explicit revocation.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod state;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, WalletEvent};
pub use publisher::{InMemoryWalletBus, WalletEventPublisher};
pub use state::{WalletState, WalletStore};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
