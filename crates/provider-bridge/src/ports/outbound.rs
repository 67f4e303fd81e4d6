//! Outbound ports for the provider bridge.
//!
//! Everything the bridge needs from the host application is behind one of
//! these traits, so the whole pipeline can run against in-memory fakes.

use crate::domain::{ApiResult, RpcRequest, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wallet_bus::{EventFilter, Subscription, WalletState};

/// Title and URL of the page shown in the tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: String,
    pub url: String,
}

/// Message signing request handed to the signer UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequest {
    /// Payload to sign, exactly as the page sent it
    pub data: Value,
    /// Account that should sign
    pub from: String,
    /// Page the request came from
    pub meta: PageMeta,
}

/// Typed data encoding version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypedDataVersion {
    V1,
    V3,
    V4,
}

/// Asset the page asks the wallet to track (`wallet_watchAsset`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchAssetRequest {
    /// Asset standard, e.g. `"ERC20"`
    #[serde(rename = "type")]
    pub asset_type: String,
    pub address: String,
    pub symbol: String,
    pub decimals: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Account approval prompt contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPrompt {
    /// Hostname asking for accounts
    pub hostname: String,
    /// Page the request came from
    pub meta: PageMeta,
}

/// UI failures surfaced to the page as internal errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UiError {
    #[error("cancelled by user")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

/// Executes JSON-RPC requests against the blockchain backend.
#[async_trait]
pub trait RpcExecutor: Send + Sync {
    /// Run the request; backend errors are returned as-is.
    async fn execute(&self, request: &RpcRequest) -> ApiResult<Value>;
}

/// Signing UI and keyring.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// `eth_sign`
    async fn sign_message(&self, request: SignatureRequest) -> ApiResult<Value>;

    /// `personal_sign`
    async fn sign_personal_message(&self, request: SignatureRequest) -> ApiResult<Value>;

    /// `eth_signTypedData*`
    async fn sign_typed_message(
        &self,
        request: SignatureRequest,
        version: TypedDataVersion,
    ) -> ApiResult<Value>;
}

/// Signer for the FIBOS accounts exposed to pages through the ironman
/// script.
#[async_trait]
pub trait FibosSigner: Send + Sync {
    /// Ask the user to confirm `transaction`, then sign it without
    /// broadcasting. Returns the signatures.
    async fn sign_transaction(&self, transaction: &Value) -> Result<Value, UiError>;
}

/// Token tracking.
#[async_trait]
pub trait AssetWatcher: Send + Sync {
    async fn watch_asset(&self, asset: WatchAssetRequest) -> ApiResult<Value>;
}

/// Phishing list lookup.
pub trait PhishingOracle: Send + Sync {
    fn is_phishing(&self, hostname: &str) -> bool;
}

/// Wallet screens the bridge can drive.
#[async_trait]
pub trait WalletUi: Send + Sync {
    /// Show the account approval prompt
    fn show_approval(&self, prompt: ApprovalPrompt);

    /// Hide the approval prompt without a user decision
    fn dismiss_approval(&self);

    /// Open the QR scanner and wait for a scan
    async fn scan_qr_code(&self) -> Result<Value, UiError>;

    /// Remove a favorite from the home page; returns the remaining favorites
    async fn remove_favorite(&self, url: &str) -> Result<Vec<Value>, UiError>;

    fn show_tutorial(&self);

    fn show_autocomplete(&self);
}

/// The rendered frame a bridge talks to.
pub trait FrameHost: Send + Sync {
    /// Whether the frame can currently run scripts
    fn is_ready(&self) -> bool;

    /// Run a script in the frame
    fn inject_javascript(&self, script: &str) -> Result<(), TransportError>;
}

/// Read/write access to wallet-wide state.
#[async_trait]
pub trait WalletStateSource: Send + Sync {
    fn snapshot(&self) -> WalletState;

    fn subscribe(&self, filter: EventFilter) -> Subscription;

    async fn approve_host(&self, hostname: &str);
}

/// Metadata of the page currently loaded in the tab.
#[async_trait]
pub trait PageMetaSource: Send + Sync {
    /// Last known metadata, without asking the page
    fn current(&self) -> PageMeta;

    /// Ask the page for fresh metadata before returning it
    async fn page_meta(&self) -> PageMeta;
}
