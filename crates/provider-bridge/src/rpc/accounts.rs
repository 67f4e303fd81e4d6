//! Account disclosure methods (`eth_requestAccounts`, `eth_accounts`).

use crate::domain::{ApiResult, BridgeId, RpcRequest};
use crate::permission::{selected_account, visible_accounts, ApprovalSlot};
use crate::ports::outbound::WalletStateSource;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Account methods for one bridge
pub struct AccountsRpc {
    bridge_id: BridgeId,
    hostname: String,
    wallet: Arc<dyn WalletStateSource>,
    approvals: Arc<ApprovalSlot>,
}

impl AccountsRpc {
    pub fn new(
        bridge_id: BridgeId,
        hostname: impl Into<String>,
        wallet: Arc<dyn WalletStateSource>,
        approvals: Arc<ApprovalSlot>,
    ) -> Self {
        Self {
            bridge_id,
            hostname: hostname.into(),
            wallet,
            approvals,
        }
    }

    /// eth_requestAccounts - Returns the selected account, prompting the user
    /// when the origin is not yet approved
    #[instrument(skip(self, request), fields(hostname = %self.hostname))]
    pub async fn request_accounts(&self, request: &RpcRequest) -> ApiResult<Value> {
        let state = self.wallet.snapshot();
        let force = force_requested(&request.params);

        if !state.privacy_mode || (!force && state.is_host_approved(&self.hostname)) {
            return Ok(json!(selected_account(&state).into_iter().collect::<Vec<_>>()));
        }

        debug!(force, "Origin needs approval");
        self.approvals.request(self.bridge_id, &self.hostname).await?;

        // Approval may have changed the selected address while we waited
        let state = self.wallet.snapshot();
        Ok(json!(selected_account(&state).into_iter().collect::<Vec<_>>()))
    }

    /// eth_accounts - Returns the selected account if the origin may see it
    pub fn accounts(&self) -> Value {
        json!(visible_accounts(&self.wallet.snapshot(), &self.hostname))
    }
}

/// `force` may be passed as `{force: true}` or `[{force: true}]`
fn force_requested(params: &Value) -> bool {
    let options = match params {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    options
        .and_then(|o| o.get("force"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
