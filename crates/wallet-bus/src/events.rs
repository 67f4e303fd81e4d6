//! # Wallet Events
//!
//! Every change a bridge may care about is published as a [`WalletEvent`].

use serde::{Deserialize, Serialize};

/// All events that flow through the wallet bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletEvent {
    // =========================================================================
    // NETWORK CONTROLLER
    // =========================================================================
    /// The active network changed.
    NetworkChanged {
        /// Network version id as reported by the node (e.g. `"1"`).
        network: String,
        /// Network type key (e.g. `"mainnet"`, `"rpc"`).
        network_type: String,
    },

    // =========================================================================
    // PREFERENCES CONTROLLER
    // =========================================================================
    /// The selected account changed.
    SelectedAddressChanged {
        /// Checksummed or lowercase address, as stored by the wallet.
        address: String,
    },

    // =========================================================================
    // KEYRING
    // =========================================================================
    /// The wallet was locked or unlocked.
    LockChanged {
        /// New unlock state.
        is_unlocked: bool,
    },

    // =========================================================================
    // PRIVACY
    // =========================================================================
    /// The approved-hosts map changed.
    ApprovedHostsChanged {
        /// Number of approved hosts before the change.
        previous: usize,
        /// Number of approved hosts after the change.
        current: usize,
    },

    /// Privacy mode (per-origin account gating) was toggled.
    PrivacyModeChanged {
        /// Whether privacy mode is now enforced.
        enabled: bool,
    },

    // =========================================================================
    // BLOCK TRACKER
    // =========================================================================
    /// A new block arrived at the backend.
    BlockArrived {
        /// Block number.
        number: u64,
    },
}

impl WalletEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::NetworkChanged { .. } => EventTopic::Network,
            Self::SelectedAddressChanged { .. } => EventTopic::Preferences,
            Self::LockChanged { .. } => EventTopic::Keyring,
            Self::ApprovedHostsChanged { .. } | Self::PrivacyModeChanged { .. } => {
                EventTopic::Privacy
            }
            Self::BlockArrived { .. } => EventTopic::Blocks,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Network controller events.
    Network,
    /// Preferences controller events (selected account).
    Preferences,
    /// Keyring lock/unlock events.
    Keyring,
    /// Privacy state (approved hosts, privacy mode).
    Privacy,
    /// Block arrivals.
    Blocks,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &WalletEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
