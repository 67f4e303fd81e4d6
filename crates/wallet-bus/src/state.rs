//! # Wallet State Store
//!
//! The single source of truth that bridges read synchronously. Every mutation
//! is published on the bus after the write lock is released.

use crate::events::{EventFilter, WalletEvent};
use crate::publisher::{InMemoryWalletBus, WalletEventPublisher};
use crate::subscriber::Subscription;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Snapshot of the wallet-wide state a provider bridge depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    /// Whether the wallet finished onboarding.
    pub is_initialized: bool,
    /// Whether the keyring is unlocked.
    pub is_unlocked: bool,
    /// Network version id (decimal string, e.g. `"1"`).
    pub network: String,
    /// Network type key (e.g. `"mainnet"`, `"rpc"`).
    pub network_type: String,
    /// Currently selected account, if any.
    pub selected_address: Option<String>,
    /// Whether account disclosure requires per-origin approval.
    pub privacy_mode: bool,
    /// Hostnames the user approved for account disclosure.
    pub approved_hosts: HashMap<String, bool>,
}

impl Default for WalletState {
    fn default() -> Self {
        Self {
            is_initialized: true,
            is_unlocked: true,
            network: "1".to_string(),
            network_type: "mainnet".to_string(),
            selected_address: None,
            privacy_mode: true,
            approved_hosts: HashMap::new(),
        }
    }
}

impl WalletState {
    /// Whether `hostname` has been approved.
    #[must_use]
    pub fn is_host_approved(&self, hostname: &str) -> bool {
        self.approved_hosts.get(hostname).copied().unwrap_or(false)
    }

    /// Number of approved hosts.
    #[must_use]
    pub fn approved_count(&self) -> usize {
        self.approved_hosts.values().filter(|v| **v).count()
    }

    /// Whether accounts may be disclosed to `hostname` without prompting.
    #[must_use]
    pub fn may_disclose_to(&self, hostname: &str) -> bool {
        !self.privacy_mode || self.is_host_approved(hostname)
    }
}

/// Wallet state plus change publication.
pub struct WalletStore {
    state: RwLock<WalletState>,
    bus: Arc<InMemoryWalletBus>,
}

impl WalletStore {
    /// Create a store with the given initial state and a fresh bus.
    #[must_use]
    pub fn new(initial: WalletState) -> Self {
        Self::with_bus(initial, Arc::new(InMemoryWalletBus::new()))
    }

    /// Create a store publishing on an existing bus.
    #[must_use]
    pub fn with_bus(initial: WalletState, bus: Arc<InMemoryWalletBus>) -> Self {
        Self {
            state: RwLock::new(initial),
            bus,
        }
    }

    /// Current state, cloned.
    #[must_use]
    pub fn snapshot(&self) -> WalletState {
        self.read(Clone::clone)
    }

    /// Subscribe to wallet events.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    /// The underlying bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<InMemoryWalletBus> {
        &self.bus
    }

    /// Switch the active network.
    pub async fn set_network(&self, network: impl Into<String>, network_type: impl Into<String>) {
        let network = network.into();
        let network_type = network_type.into();
        self.write(|s| {
            s.network = network.clone();
            s.network_type = network_type.clone();
        });
        info!(network = %network, network_type = %network_type, "Active network changed");
        self.bus
            .publish(WalletEvent::NetworkChanged {
                network,
                network_type,
            })
            .await;
    }

    /// Change the selected account.
    pub async fn set_selected_address(&self, address: impl Into<String>) {
        let address = address.into();
        let changed = self.write(|s| {
            let changed = s.selected_address.as_deref() != Some(address.as_str());
            s.selected_address = Some(address.clone());
            changed
        });
        if changed {
            self.bus
                .publish(WalletEvent::SelectedAddressChanged { address })
                .await;
        }
    }

    /// Lock or unlock the keyring.
    pub async fn set_unlocked(&self, is_unlocked: bool) {
        self.write(|s| s.is_unlocked = is_unlocked);
        self.bus
            .publish(WalletEvent::LockChanged { is_unlocked })
            .await;
    }

    /// Toggle privacy mode.
    pub async fn set_privacy_mode(&self, enabled: bool) {
        self.write(|s| s.privacy_mode = enabled);
        self.bus
            .publish(WalletEvent::PrivacyModeChanged { enabled })
            .await;
    }

    /// Record a user approval for `hostname`.
    pub async fn approve_host(&self, hostname: &str) {
        let (previous, current) = self.write(|s| {
            let previous = s.approved_count();
            s.approved_hosts.insert(hostname.to_string(), true);
            (previous, s.approved_count())
        });
        info!(hostname, "Host approved for account access");
        self.publish_hosts(previous, current).await;
    }

    /// Revoke a single host.
    pub async fn revoke_host(&self, hostname: &str) {
        let (previous, current) = self.write(|s| {
            let previous = s.approved_count();
            s.approved_hosts.remove(hostname);
            (previous, s.approved_count())
        });
        info!(hostname, "Host approval revoked");
        self.publish_hosts(previous, current).await;
    }

    /// Revoke every host.
    pub async fn clear_approved_hosts(&self) {
        let previous = self.write(|s| {
            let previous = s.approved_count();
            s.approved_hosts.clear();
            previous
        });
        info!(previous, "All host approvals cleared");
        self.publish_hosts(previous, 0).await;
    }

    /// Signal a new block from the backend block tracker.
    pub async fn notify_block(&self, number: u64) {
        self.bus.publish(WalletEvent::BlockArrived { number }).await;
    }

    async fn publish_hosts(&self, previous: usize, current: usize) {
        self.bus
            .publish(WalletEvent::ApprovedHostsChanged { previous, current })
            .await;
    }

    fn read<R>(&self, f: impl FnOnce(&WalletState) -> R) -> R {
        match self.state.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write<R>(&self, f: impl FnOnce(&mut WalletState) -> R) -> R {
        match self.state.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for WalletStore {
    fn default() -> Self {
        Self::new(WalletState::default())
    }
}
