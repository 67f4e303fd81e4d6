//! `wallet_*` and `metamask_*` methods driving wallet screens.

use crate::domain::config::HomeConfig;
use crate::domain::{ApiError, ApiResult, RpcRequest};
use crate::ports::outbound::{AssetWatcher, PageMetaSource, WalletUi, WatchAssetRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// `wallet_watchAsset` params: `{type, options: {...}}`
#[derive(Debug, Deserialize)]
struct WatchAssetParams {
    #[serde(rename = "type")]
    asset_type: String,
    options: WatchAssetOptions,
}

#[derive(Debug, Deserialize)]
struct WatchAssetOptions {
    address: String,
    symbol: String,
    #[serde(default)]
    decimals: Value,
    #[serde(default)]
    image: Option<String>,
}

/// Wallet UI methods for one bridge
pub struct WalletRpc {
    ui: Arc<dyn WalletUi>,
    assets: Arc<dyn AssetWatcher>,
    home: HomeConfig,
    page: Arc<dyn PageMetaSource>,
}

impl WalletRpc {
    /// `page` tracks the URL currently loaded in the tab, which decides
    /// whether home-only methods are allowed.
    pub fn new(
        ui: Arc<dyn WalletUi>,
        assets: Arc<dyn AssetWatcher>,
        home: HomeConfig,
        page: Arc<dyn PageMetaSource>,
    ) -> Self {
        Self {
            ui,
            assets,
            home,
            page,
        }
    }

    /// The tab shows the home page. A URL that does not parse never counts.
    fn is_home(&self) -> bool {
        Url::parse(&self.page.current().url).is_ok_and(|url| self.home.is_home(&url))
    }

    /// wallet_scanQRCode - Opens the scanner and returns what it read
    #[instrument(skip(self))]
    pub async fn scan_qr_code(&self) -> ApiResult<Value> {
        let scan = self
            .ui
            .scan_qr_code()
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(scan_result(scan))
    }

    /// wallet_watchAsset - Suggests a token to the wallet
    #[instrument(skip(self, request))]
    pub async fn watch_asset(&self, request: &RpcRequest) -> ApiResult<Value> {
        let raw = match &request.params {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        let params: WatchAssetParams = serde_json::from_value(raw)
            .map_err(|e| ApiError::invalid_params(e.to_string()))?;

        debug!(asset_type = %params.asset_type, symbol = %params.options.symbol, "Watch asset");
        self.assets
            .watch_asset(WatchAssetRequest {
                asset_type: params.asset_type,
                address: params.options.address,
                symbol: params.options.symbol,
                decimals: params.options.decimals,
                image: params.options.image,
            })
            .await
    }

    /// metamask_removeFavorite - Home page only
    #[instrument(skip(self, request))]
    pub async fn remove_favorite(&self, request: &RpcRequest) -> ApiResult<Value> {
        if !self.is_home() {
            return Err(ApiError::unauthorized("Forbidden."));
        }
        let url = request.str_param(0)?;
        let favorites = self
            .ui
            .remove_favorite(url)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(json!({ "favorites": favorites }))
    }

    /// metamask_showTutorial
    pub fn show_tutorial(&self) -> ApiResult<Value> {
        self.ui.show_tutorial();
        Ok(json!(true))
    }

    /// metamask_showAutocomplete
    pub fn show_autocomplete(&self) -> ApiResult<Value> {
        self.ui.show_autocomplete();
        Ok(json!(true))
    }
}

/// Payment requests resolve to their target address, other structured
/// scans to their JSON text, anything else as scanned.
fn scan_result(scan: Value) -> Value {
    let target = scan
        .get("target_address")
        .filter(|t| !t.is_null() && t.as_str() != Some(""));
    if let Some(target) = target {
        return target.clone();
    }
    if scan.get("scheme").is_some() {
        return Value::String(scan.to_string());
    }
    scan
}
