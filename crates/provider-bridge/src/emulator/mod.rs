//! Push-style subscriptions and polling filters over a plain request backend.
//!
//! Both polyfills are driven by the wallet's block-arrival signal. Their
//! block task starts with the first installed filter or subscription and is
//! aborted on teardown. Per block they snapshot their state, query the
//! backend without holding any lock, then apply the results.

pub mod filters;
pub mod log_filter;
pub mod subscriptions;

pub use filters::FilterManager;
pub use subscriptions::SubscriptionManager;

use crate::domain::{ApiError, ApiResult, JsonRpcId, LogFilter, Quantity, RpcRequest};
use crate::ports::outbound::{RpcExecutor, WalletStateSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;
use wallet_bus::{EventFilter, EventTopic, WalletEvent};

static NEXT_BACKEND_ID: AtomicI64 = AtomicI64::new(1);

/// Something that reacts to new blocks.
#[async_trait]
pub(crate) trait BlockListener: Send + Sync + 'static {
    async fn on_block(&self, number: u64);
}

/// Lazily started task feeding block arrivals to a listener.
#[derive(Default)]
pub(crate) struct BlockTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BlockTask {
    /// Start the task unless it is already running.
    pub(crate) fn ensure_running(
        &self,
        wallet: &Arc<dyn WalletStateSource>,
        listener: Arc<dyn BlockListener>,
    ) {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let mut blocks = wallet.subscribe(EventFilter::topics(vec![EventTopic::Blocks]));
        *handle = Some(tokio::spawn(async move {
            while let Some(event) = blocks.recv().await {
                if let WalletEvent::BlockArrived { number } = event {
                    listener.on_block(number).await;
                }
            }
            debug!("Block signal closed");
        }));
    }

    /// Abort the task. Dropping it releases the block subscription.
    pub(crate) fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for BlockTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Issue a request of our own to the backend.
pub(crate) async fn backend_call(
    backend: &dyn RpcExecutor,
    method: &str,
    params: Value,
) -> ApiResult<Value> {
    let id = NEXT_BACKEND_ID.fetch_add(1, Ordering::Relaxed);
    backend
        .execute(&RpcRequest::new(JsonRpcId::Number(id), method, params))
        .await
}

/// Current head block number.
pub(crate) async fn current_block(backend: &dyn RpcExecutor) -> ApiResult<u64> {
    let value = backend_call(backend, "eth_blockNumber", json!([])).await?;
    Quantity::from_value(&value)
        .map(|q| q.0)
        .ok_or_else(|| ApiError::internal(format!("bad eth_blockNumber result: {}", value)))
}

/// Logs matching `filter` in `from..=to`.
pub(crate) async fn logs_in_range(
    backend: &dyn RpcExecutor,
    filter: &LogFilter,
    from: u64,
    to: u64,
) -> ApiResult<Vec<Value>> {
    let mut query = serde_json::to_value(LogFilter {
        from_block: None,
        to_block: None,
        ..filter.clone()
    })?;
    query["fromBlock"] = json!(Quantity(from));
    query["toBlock"] = json!(Quantity(to));

    let logs = backend_call(backend, "eth_getLogs", json!([query])).await?;
    let logs = match logs {
        Value::Array(logs) => logs,
        Value::Null => Vec::new(),
        other => return Err(ApiError::internal(format!("bad eth_getLogs result: {}", other))),
    };

    Ok(logs
        .into_iter()
        .filter(|log| log_filter::matches_value(filter, log))
        .collect())
}

/// Block object by number, without full transactions.
pub(crate) async fn block_by_number(backend: &dyn RpcExecutor, number: u64) -> ApiResult<Value> {
    backend_call(
        backend,
        "eth_getBlockByNumber",
        json!([Quantity(number), false]),
    )
    .await
}
