//! `eth_subscribe` emulation: pushes `eth_subscription` notifications on
//! every block arrival.

use super::{block_by_number, current_block, logs_in_range, BlockListener, BlockTask};
use crate::domain::{
    ApiError, ApiResult, HexIdGenerator, LogFilter, RpcNotification, RpcRequest,
    SubscriptionMethod,
};
use crate::middleware::{Flow, Middleware};
use crate::ports::outbound::{RpcExecutor, WalletStateSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Supported subscription kinds
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionKind {
    /// Block headers
    NewHeads,
    /// Logs matching a filter
    Logs(LogFilter),
}

impl SubscriptionKind {
    fn parse(request: &RpcRequest) -> ApiResult<Self> {
        match request.str_param(0)? {
            "newHeads" => Ok(SubscriptionKind::NewHeads),
            "logs" => {
                let filter = match request.param(1) {
                    Some(raw) if !raw.is_null() => serde_json::from_value(raw.clone())?,
                    _ => LogFilter::default(),
                };
                Ok(SubscriptionKind::Logs(filter))
            }
            other => Err(ApiError::invalid_params(format!(
                "unsupported subscription type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug)]
struct LiveSubscription {
    kind: SubscriptionKind,
    cursor: u64,
}

struct SubscriptionState {
    backend: Arc<dyn RpcExecutor>,
    subscriptions: Mutex<HashMap<String, LiveSubscription>>,
    notifications: mpsc::UnboundedSender<RpcNotification>,
}

/// Per-bridge subscription polyfill.
pub struct SubscriptionManager {
    state: Arc<SubscriptionState>,
    wallet: Arc<dyn WalletStateSource>,
    ids: HexIdGenerator,
    max_subscriptions: usize,
    task: BlockTask,
}

impl SubscriptionManager {
    /// Notifications are pushed into `notifications`; the bridge forwards
    /// them to the page.
    pub fn new(
        backend: Arc<dyn RpcExecutor>,
        wallet: Arc<dyn WalletStateSource>,
        notifications: mpsc::UnboundedSender<RpcNotification>,
        max_subscriptions: usize,
    ) -> Self {
        Self {
            state: Arc::new(SubscriptionState {
                backend,
                subscriptions: Mutex::new(HashMap::new()),
                notifications,
            }),
            wallet,
            ids: HexIdGenerator::new(),
            max_subscriptions,
            task: BlockTask::default(),
        }
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.state.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the block task is running
    pub fn is_polling(&self) -> bool {
        self.task.is_running()
    }

    #[instrument(skip(self, request), fields(method = %request.method))]
    async fn subscribe(&self, request: &RpcRequest) -> ApiResult<Value> {
        let kind = SubscriptionKind::parse(request)?;

        if self.len() >= self.max_subscriptions {
            return Err(ApiError::limit_exceeded(format!(
                "at most {} subscriptions per page",
                self.max_subscriptions
            )));
        }

        let cursor = current_block(self.state.backend.as_ref()).await?;
        let id = self.ids.next_id();

        self.state
            .subscriptions
            .lock()
            .insert(id.clone(), LiveSubscription { kind, cursor });
        self.task
            .ensure_running(&self.wallet, Arc::clone(&self.state) as Arc<dyn BlockListener>);

        debug!(subscription_id = %id, cursor, "Created subscription");
        Ok(json!(id))
    }

    fn unsubscribe(&self, id: &str) -> Value {
        let removed = {
            let mut subscriptions = self.state.subscriptions.lock();
            let removed = subscriptions.remove(id).is_some();
            if subscriptions.is_empty() {
                self.task.stop();
            }
            removed
        };
        debug!(subscription_id = %id, removed, "Removed subscription");
        json!(removed)
    }
}

impl SubscriptionState {
    fn push(&self, id: &str, result: Value) {
        // Receiver gone means the bridge is tearing down
        let _ = self
            .notifications
            .send(RpcNotification::subscription(id, result));
    }
}

#[async_trait]
impl BlockListener for SubscriptionState {
    async fn on_block(&self, number: u64) {
        let due: Vec<(String, SubscriptionKind, u64)> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|(_, s)| s.cursor < number)
            .map(|(id, s)| (id.clone(), s.kind.clone(), s.cursor))
            .collect();
        if due.is_empty() {
            return;
        }

        let mut head: Option<Value> = None;
        for (id, kind, cursor) in due {
            let results = match &kind {
                SubscriptionKind::NewHeads => {
                    if head.is_none() {
                        match block_by_number(self.backend.as_ref(), number).await {
                            Ok(block) => head = Some(block),
                            Err(e) => {
                                warn!(block = number, error = %e, "Failed to fetch new head");
                                return;
                            }
                        }
                    }
                    head.iter().cloned().collect::<Vec<_>>()
                }
                SubscriptionKind::Logs(filter) => {
                    match logs_in_range(self.backend.as_ref(), filter, cursor + 1, number).await {
                        Ok(logs) => logs,
                        Err(e) => {
                            warn!(subscription_id = %id, block = number, error = %e, "Log poll failed");
                            continue;
                        }
                    }
                }
            };

            let still_live = {
                let mut subscriptions = self.subscriptions.lock();
                match subscriptions.get_mut(&id).filter(|s| s.cursor == cursor) {
                    Some(sub) => {
                        sub.cursor = number;
                        true
                    }
                    None => false,
                }
            };
            if still_live {
                for result in results {
                    self.push(&id, result);
                }
            }
        }
    }
}

#[async_trait]
impl Middleware for SubscriptionManager {
    fn name(&self) -> &'static str {
        "subscriptions"
    }

    async fn handle(&self, request: &mut RpcRequest) -> Flow {
        match SubscriptionMethod::from_name(&request.method) {
            Some(SubscriptionMethod::Subscribe) => Flow::Done(self.subscribe(request).await),
            Some(SubscriptionMethod::Unsubscribe) => {
                Flow::Done(request.str_param(0).map(|id| self.unsubscribe(id)))
            }
            None => Flow::Next,
        }
    }

    fn destroy(&self) {
        self.task.stop();
        self.state.subscriptions.lock().clear();
    }
}
