//! `WalletStateSource` over the shared wallet store.

use crate::ports::outbound::WalletStateSource;
use async_trait::async_trait;
use wallet_bus::{EventFilter, Subscription, WalletState, WalletStore};

#[async_trait]
impl WalletStateSource for WalletStore {
    fn snapshot(&self) -> WalletState {
        WalletStore::snapshot(self)
    }

    fn subscribe(&self, filter: EventFilter) -> Subscription {
        WalletStore::subscribe(self, filter)
    }

    async fn approve_host(&self, hostname: &str) {
        WalletStore::approve_host(self, hostname).await;
    }
}
