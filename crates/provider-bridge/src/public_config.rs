//! Public config stream: unlock status and active network pushed to the page
//! outside the JSON-RPC protocol.

use crate::domain::networks::chain_id_hex;
use crate::ports::outbound::WalletStateSource;
use crate::transport::MuxWriter;
use crate::domain::TransportError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wallet_bus::{EventFilter, EventTopic, WalletState};

/// Snapshot written to the public config stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub is_unlocked: bool,
    pub network_version: String,
    /// `0x`-hex chain id, `null` for custom networks
    pub chain_id: Option<String>,
}

impl PublicConfig {
    pub fn from_state(state: &WalletState) -> Self {
        Self {
            is_unlocked: state.is_unlocked,
            network_version: state.network.clone(),
            chain_id: chain_id_hex(&state.network_type),
        }
    }
}

/// Topics that change the public config
fn config_topics() -> EventFilter {
    EventFilter::topics(vec![
        EventTopic::Network,
        EventTopic::Preferences,
        EventTopic::Keyring,
    ])
}

/// Writes a snapshot on start and after every relevant wallet event.
pub struct PublicConfigPublisher {
    updates: watch::Receiver<PublicConfig>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PublicConfigPublisher {
    /// Emit the current snapshot and start following wallet events.
    ///
    /// The wallet subscription is taken before the first snapshot is read,
    /// so no change between the two is missed.
    pub fn spawn(wallet: Arc<dyn WalletStateSource>, writer: MuxWriter) -> Self {
        let mut subscription = wallet.subscribe(config_topics());

        let initial = PublicConfig::from_state(&wallet.snapshot());
        if let Err(e) = writer.write_json(&initial) {
            warn!(error = %e, "Failed to write initial public config");
        }
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let snapshot = PublicConfig::from_state(&wallet.snapshot());
                debug!(topic = ?event.topic(), chain_id = ?snapshot.chain_id, "Publishing public config");

                match writer.write_json(&snapshot) {
                    Ok(()) => {}
                    Err(TransportError::Closed) => break,
                    Err(e) => warn!(error = %e, "Failed to write public config"),
                }
                tx.send_replace(snapshot);
            }
            debug!("Public config publisher stopped");
        });

        Self {
            updates: rx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Latest snapshot, observable by the host
    pub fn updates(&self) -> watch::Receiver<PublicConfig> {
        self.updates.clone()
    }

    pub fn current(&self) -> PublicConfig {
        self.updates.borrow().clone()
    }

    /// Abort the task; its wallet subscription is dropped with it.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PublicConfigPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}
