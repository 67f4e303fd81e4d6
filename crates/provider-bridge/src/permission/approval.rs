//! One-slot account approval prompt per tab.
//!
//! Flow:
//! 1. `eth_requestAccounts` from an unapproved origin calls [`ApprovalSlot::request`]
//! 2. The first caller opens the slot and schedules the prompt after the debounce
//! 3. Later callers for the same hostname join the open slot
//! 4. The user's decision (via the tab) resolves every waiter at once
//! 5. A bridge going away cancels its own waiters; the last one out clears the slot

use crate::domain::{ApiError, ApiResult, BridgeError, BridgeId};
use crate::ports::outbound::{ApprovalPrompt, PageMetaSource, WalletUi};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Message of the error returned when the user declines
pub const USER_DENIED_MESSAGE: &str = "User denied account authorization.";

struct Waiter {
    owner: BridgeId,
    tx: oneshot::Sender<ApiResult<()>>,
}

struct PendingApproval {
    hostname: String,
    generation: u64,
    prompted: bool,
    waiters: Vec<Waiter>,
}

impl PendingApproval {
    fn resolve_all(self, result: ApiResult<()>) -> usize {
        let count = self.waiters.len();
        for waiter in self.waiters {
            // Receiver gone means the request task was aborted
            let _ = waiter.tx.send(result.clone());
        }
        count
    }
}

/// Approval counters
#[derive(Debug, Default)]
pub struct ApprovalStats {
    pub prompts_shown: AtomicU64,
    pub approved: AtomicU64,
    pub rejected: AtomicU64,
    pub cancelled: AtomicU64,
}

/// The tab's single pending account approval.
pub struct ApprovalSlot {
    slot: Mutex<Option<PendingApproval>>,
    ui: Arc<dyn WalletUi>,
    meta: Arc<dyn PageMetaSource>,
    debounce: Duration,
    generation: AtomicU64,
    stats: ApprovalStats,
}

impl ApprovalSlot {
    pub fn new(
        ui: Arc<dyn WalletUi>,
        meta: Arc<dyn PageMetaSource>,
        debounce: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(None),
            ui,
            meta,
            debounce,
            generation: AtomicU64::new(0),
            stats: ApprovalStats::default(),
        })
    }

    /// Wait for the user's decision on `hostname`, opening a prompt if none
    /// is pending.
    pub async fn request(self: &Arc<Self>, owner: BridgeId, hostname: &str) -> ApiResult<()> {
        let (tx, rx) = oneshot::channel();

        let opened = {
            let mut slot = self.slot.lock();
            match slot.as_mut() {
                Some(pending) if pending.hostname == hostname => {
                    pending.waiters.push(Waiter { owner, tx });
                    debug!(hostname, waiters = pending.waiters.len(), "Joined pending approval");
                    None
                }
                Some(pending) => {
                    debug!(
                        hostname,
                        pending_for = %pending.hostname,
                        "Approval already pending for another host"
                    );
                    return Err(ApiError::user_rejected(
                        "Another account authorization request is pending.",
                    ));
                }
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    *slot = Some(PendingApproval {
                        hostname: hostname.to_string(),
                        generation,
                        prompted: false,
                        waiters: vec![Waiter { owner, tx }],
                    });
                    Some(generation)
                }
            }
        };

        if let Some(generation) = opened {
            info!(hostname, "Account approval requested");
            self.schedule_prompt(generation, hostname.to_string());
        }

        rx.await.unwrap_or_else(|_| Err(ApiError::cancelled()))
    }

    fn schedule_prompt(self: &Arc<Self>, generation: u64, hostname: String) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(this.debounce).await;
            if !this.is_current(generation) {
                return;
            }

            let meta = this.meta.page_meta().await;

            let show = {
                let mut slot = this.slot.lock();
                match slot.as_mut() {
                    Some(pending) if pending.generation == generation && !pending.prompted => {
                        pending.prompted = true;
                        true
                    }
                    _ => false,
                }
            };

            if show {
                this.stats.prompts_shown.fetch_add(1, Ordering::Relaxed);
                debug!(hostname = %hostname, "Showing account approval prompt");
                this.ui.show_approval(ApprovalPrompt { hostname, meta });
            }
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|p| p.generation == generation)
    }

    /// Hostname of the pending approval, if any
    pub fn pending_hostname(&self) -> Option<String> {
        self.slot.lock().as_ref().map(|p| p.hostname.clone())
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Whether the prompt for the pending approval has been shown
    pub fn is_prompted(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(|p| p.prompted)
    }

    /// Number of requests waiting on the pending approval
    pub fn waiter_count(&self) -> usize {
        self.slot.lock().as_ref().map_or(0, |p| p.waiters.len())
    }

    /// User accepted. Returns the approved hostname.
    pub fn approve(&self) -> Result<String, BridgeError> {
        let pending = self.slot.lock().take().ok_or(BridgeError::NoPendingApproval)?;
        let hostname = pending.hostname.clone();
        let count = pending.resolve_all(Ok(()));
        self.stats.approved.fetch_add(1, Ordering::Relaxed);
        info!(hostname = %hostname, waiters = count, "Account approval granted");
        Ok(hostname)
    }

    /// User declined.
    pub fn reject(&self) -> Result<String, BridgeError> {
        let pending = self.slot.lock().take().ok_or(BridgeError::NoPendingApproval)?;
        let hostname = pending.hostname.clone();
        let count = pending.resolve_all(Err(ApiError::user_rejected(USER_DENIED_MESSAGE)));
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        info!(hostname = %hostname, waiters = count, "Account approval rejected");
        Ok(hostname)
    }

    /// Cancel the waiters owned by a bridge that is going away.
    ///
    /// When no waiter is left the slot is cleared and a visible prompt is
    /// dismissed.
    pub fn cancel_owner(&self, owner: BridgeId) {
        let (cancelled, dismiss) = {
            let mut slot = self.slot.lock();
            let Some(pending) = slot.as_mut() else {
                return;
            };

            let mut cancelled = 0;
            let mut kept = Vec::with_capacity(pending.waiters.len());
            for waiter in pending.waiters.drain(..) {
                if waiter.owner == owner {
                    let _ = waiter.tx.send(Err(ApiError::cancelled()));
                    cancelled += 1;
                } else {
                    kept.push(waiter);
                }
            }
            pending.waiters = kept;

            let mut dismiss = false;
            if pending.waiters.is_empty() {
                dismiss = pending.prompted;
                *slot = None;
            }
            (cancelled, dismiss)
        };

        if cancelled > 0 {
            self.stats
                .cancelled
                .fetch_add(cancelled as u64, Ordering::Relaxed);
            debug!(bridge_id = %owner, cancelled, "Cancelled approval waiters");
        }
        if dismiss {
            self.ui.dismiss_approval();
        }
    }

    /// Cancel everything (tab closing).
    pub fn cancel_all(&self) {
        let Some(pending) = self.slot.lock().take() else {
            return;
        };
        let prompted = pending.prompted;
        let count = pending.resolve_all(Err(ApiError::cancelled()));
        self.stats
            .cancelled
            .fetch_add(count as u64, Ordering::Relaxed);
        if prompted {
            self.ui.dismiss_approval();
        }
        debug!(waiters = count, "Cancelled pending approval");
    }

    pub fn stats(&self) -> &ApprovalStats {
        &self.stats
    }
}
