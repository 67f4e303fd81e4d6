//! `eth_newFilter` family, answered locally from block-driven polling.

use super::{block_by_number, current_block, logs_in_range, BlockListener, BlockTask};
use crate::domain::{ApiError, ApiResult, FilterMethod, HexIdGenerator, LogFilter, RpcRequest};
use crate::middleware::{Flow, Middleware};
use crate::ports::outbound::{RpcExecutor, WalletStateSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Most blocks fetched for one block/pending filter catch-up.
const MAX_CATCH_UP_BLOCKS: u64 = 100;

/// What an installed filter collects
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// New block hashes
    Block,
    /// Hashes of transactions included in new blocks
    PendingTransaction,
    /// Logs matching a filter
    Log(LogFilter),
}

#[derive(Debug)]
struct InstalledFilter {
    kind: FilterKind,
    /// Last block whose changes were collected
    cursor: u64,
    /// Changes not yet returned by `eth_getFilterChanges`
    pending: Vec<Value>,
}

struct FilterState {
    backend: Arc<dyn RpcExecutor>,
    filters: Mutex<HashMap<String, InstalledFilter>>,
}

/// Per-bridge filter polyfill.
pub struct FilterManager {
    state: Arc<FilterState>,
    wallet: Arc<dyn WalletStateSource>,
    ids: HexIdGenerator,
    max_filters: usize,
    task: BlockTask,
}

impl FilterManager {
    pub fn new(
        backend: Arc<dyn RpcExecutor>,
        wallet: Arc<dyn WalletStateSource>,
        max_filters: usize,
    ) -> Self {
        Self {
            state: Arc::new(FilterState {
                backend,
                filters: Mutex::new(HashMap::new()),
            }),
            wallet,
            ids: HexIdGenerator::new(),
            max_filters,
            task: BlockTask::default(),
        }
    }

    /// Number of installed filters
    pub fn len(&self) -> usize {
        self.state.filters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the block task is running
    pub fn is_polling(&self) -> bool {
        self.task.is_running()
    }

    #[instrument(skip(self))]
    async fn install(&self, kind: FilterKind) -> ApiResult<Value> {
        if self.len() >= self.max_filters {
            return Err(ApiError::limit_exceeded(format!(
                "at most {} filters per page",
                self.max_filters
            )));
        }

        let cursor = current_block(self.state.backend.as_ref()).await?;
        let id = self.ids.next_id();

        self.state.filters.lock().insert(
            id.clone(),
            InstalledFilter {
                kind,
                cursor,
                pending: Vec::new(),
            },
        );
        self.task
            .ensure_running(&self.wallet, Arc::clone(&self.state) as Arc<dyn BlockListener>);

        debug!(filter_id = %id, cursor, "Filter installed");
        Ok(json!(id))
    }

    fn changes(&self, id: &str) -> ApiResult<Value> {
        let mut filters = self.state.filters.lock();
        let filter = filters
            .get_mut(id)
            .ok_or_else(|| ApiError::invalid_params(format!("filter not found: {}", id)))?;
        Ok(Value::Array(std::mem::take(&mut filter.pending)))
    }

    async fn all_logs(&self, id: &str) -> ApiResult<Value> {
        let kind = self
            .state
            .filters
            .lock()
            .get(id)
            .map(|f| f.kind.clone())
            .ok_or_else(|| ApiError::invalid_params(format!("filter not found: {}", id)))?;

        let FilterKind::Log(filter) = kind else {
            return Err(ApiError::invalid_params(format!(
                "filter {} is not a log filter",
                id
            )));
        };

        let query = serde_json::to_value(&filter)?;
        super::backend_call(self.state.backend.as_ref(), "eth_getLogs", json!([query])).await
    }

    fn uninstall(&self, id: &str) -> Value {
        let removed = {
            let mut filters = self.state.filters.lock();
            let removed = filters.remove(id).is_some();
            if filters.is_empty() {
                self.task.stop();
            }
            removed
        };
        debug!(filter_id = %id, removed, "Filter uninstalled");
        json!(removed)
    }

    async fn dispatch(&self, method: FilterMethod, request: &RpcRequest) -> ApiResult<Value> {
        match method {
            FilterMethod::NewBlockFilter => self.install(FilterKind::Block).await,
            FilterMethod::NewPendingTransactionFilter => {
                self.install(FilterKind::PendingTransaction).await
            }
            FilterMethod::NewFilter => {
                let filter: LogFilter = match request.param(0) {
                    Some(raw) => serde_json::from_value(raw.clone())?,
                    None => LogFilter::default(),
                };
                self.install(FilterKind::Log(filter)).await
            }
            FilterMethod::GetFilterChanges => self.changes(request.str_param(0)?),
            FilterMethod::GetFilterLogs => self.all_logs(request.str_param(0)?).await,
            FilterMethod::UninstallFilter => Ok(self.uninstall(request.str_param(0)?)),
        }
    }
}

impl FilterState {
    async fn collect(&self, kind: &FilterKind, from: u64, to: u64) -> ApiResult<Vec<Value>> {
        let backend = self.backend.as_ref();
        match kind {
            FilterKind::Log(filter) => logs_in_range(backend, filter, from, to).await,
            FilterKind::Block | FilterKind::PendingTransaction => {
                let start = from.max(to.saturating_sub(MAX_CATCH_UP_BLOCKS - 1));
                let mut out = Vec::new();
                for number in start..=to {
                    let block = block_by_number(backend, number).await?;
                    if *kind == FilterKind::Block {
                        if let Some(hash) = block.get("hash") {
                            out.push(hash.clone());
                        }
                    } else if let Some(Value::Array(txs)) = block.get("transactions") {
                        out.extend(txs.iter().map(|tx| match tx.get("hash") {
                            Some(hash) => hash.clone(),
                            None => tx.clone(),
                        }));
                    }
                }
                Ok(out)
            }
        }
    }
}

#[async_trait]
impl BlockListener for FilterState {
    async fn on_block(&self, number: u64) {
        let due: Vec<(String, FilterKind, u64)> = self
            .filters
            .lock()
            .iter()
            .filter(|(_, f)| f.cursor < number)
            .map(|(id, f)| (id.clone(), f.kind.clone(), f.cursor))
            .collect();

        for (id, kind, cursor) in due {
            match self.collect(&kind, cursor + 1, number).await {
                Ok(changes) => {
                    let mut filters = self.filters.lock();
                    // Uninstalled or already advanced while we were querying
                    if let Some(filter) = filters.get_mut(&id).filter(|f| f.cursor == cursor) {
                        filter.pending.extend(changes);
                        filter.cursor = number;
                    }
                }
                Err(e) => warn!(filter_id = %id, block = number, error = %e, "Filter update failed"),
            }
        }
    }
}

#[async_trait]
impl Middleware for FilterManager {
    fn name(&self) -> &'static str {
        "filters"
    }

    async fn handle(&self, request: &mut RpcRequest) -> Flow {
        match FilterMethod::from_name(&request.method) {
            Some(method) => Flow::Done(self.dispatch(method, request).await),
            None => Flow::Next,
        }
    }

    fn destroy(&self) {
        self.task.stop();
        self.state.filters.lock().clear();
    }
}
