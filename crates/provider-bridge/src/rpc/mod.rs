//! User-facing RPC methods answered by the wallet.
//!
//! [`WalletDispatch`] is the pipeline stage in front of backend forwarding;
//! it claims every [`WalletMethod`] and lets all other methods through.

pub mod accounts;
pub mod signing;
pub mod wallet;
pub mod web3;

pub use accounts::AccountsRpc;
pub use signing::SigningRpc;
pub use wallet::WalletRpc;
pub use web3::Web3Rpc;

use crate::bridge::BridgeServices;
use crate::domain::{ApiResult, BridgeConfig, BridgeId, RpcRequest, WalletMethod};
use crate::middleware::{Flow, Middleware};
use crate::permission::ApprovalSlot;
use crate::ports::outbound::{PageMetaSource, TypedDataVersion};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// All wallet method handlers of one bridge
pub struct RpcHandlers {
    pub accounts: AccountsRpc,
    pub signing: SigningRpc,
    pub web3: Web3Rpc,
    pub wallet: WalletRpc,
}

impl RpcHandlers {
    /// Build the handlers for a bridge serving `hostname`
    pub fn new(
        config: &BridgeConfig,
        services: &BridgeServices,
        bridge_id: BridgeId,
        hostname: &str,
        approvals: Arc<ApprovalSlot>,
        meta: Arc<dyn PageMetaSource>,
    ) -> Self {
        Self {
            accounts: AccountsRpc::new(
                bridge_id,
                hostname,
                Arc::clone(&services.wallet),
                approvals,
            ),
            signing: SigningRpc::new(
                Arc::clone(&services.signer),
                Arc::clone(&meta),
                Arc::clone(&services.wallet),
            ),
            web3: Web3Rpc::new(config.client_version()),
            wallet: WalletRpc::new(
                Arc::clone(&services.ui),
                Arc::clone(&services.assets),
                config.home.clone(),
                meta,
            ),
        }
    }
}

/// Pipeline stage routing [`WalletMethod`]s to their handlers.
pub struct WalletDispatch {
    handlers: RpcHandlers,
}

impl WalletDispatch {
    pub fn new(handlers: RpcHandlers) -> Self {
        Self { handlers }
    }

    async fn dispatch(&self, method: WalletMethod, request: &RpcRequest) -> ApiResult<Value> {
        let h = &self.handlers;
        match method {
            WalletMethod::RequestAccounts => h.accounts.request_accounts(request).await,
            WalletMethod::Accounts => Ok(h.accounts.accounts()),
            WalletMethod::Sign => h.signing.sign(request).await,
            WalletMethod::PersonalSign => h.signing.personal_sign(request).await,
            WalletMethod::SignTypedData => h.signing.sign_typed_data_v1(request).await,
            WalletMethod::SignTypedDataV3 => {
                h.signing
                    .sign_typed_data(request, TypedDataVersion::V3)
                    .await
            }
            WalletMethod::SignTypedDataV4 => {
                h.signing
                    .sign_typed_data(request, TypedDataVersion::V4)
                    .await
            }
            WalletMethod::ClientVersion => h.web3.client_version(),
            WalletMethod::ScanQrCode => h.wallet.scan_qr_code().await,
            WalletMethod::WatchAsset => h.wallet.watch_asset(request).await,
            WalletMethod::RemoveFavorite => h.wallet.remove_favorite(request).await,
            WalletMethod::ShowTutorial => h.wallet.show_tutorial(),
            WalletMethod::ShowAutocomplete => h.wallet.show_autocomplete(),
        }
    }
}

#[async_trait]
impl Middleware for WalletDispatch {
    fn name(&self) -> &'static str {
        "wallet"
    }

    async fn handle(&self, request: &mut RpcRequest) -> Flow {
        match WalletMethod::from_name(&request.method) {
            Some(method) => Flow::Done(self.dispatch(method, request).await),
            None => Flow::Next,
        }
    }
}
