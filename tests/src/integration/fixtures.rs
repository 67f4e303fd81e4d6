//! # Test Fixtures
//!
//! In-memory stand-ins for everything a tab talks to, plus a [`Harness`]
//! that speaks the page's side of the port protocol.
//!
//! Outbound traffic is observed the way a real page would see it: the
//! harness records every injected script and unwraps the `postMessage`
//! payload from it.

use async_trait::async_trait;
use parking_lot::Mutex;
use provider_bridge::ports::outbound::{
    ApprovalPrompt, AssetWatcher, FibosSigner, FrameHost, MessageSigner, PhishingOracle,
    RpcExecutor, SignatureRequest, TypedDataVersion, UiError, WalletUi, WatchAssetRequest,
};
use provider_bridge::transport::port::{
    iframe_script, main_frame_script, webview_message_script, ANY_ORIGIN,
};
use provider_bridge::{
    ApiError, ApiResult, BridgeConfig, BridgeError, BridgeServices, Quantity, RpcRequest,
    TabController,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wallet_bus::{WalletState, WalletStore};

pub const DAPP_URL: &str = "https://dapp.example/app?ref=1";
pub const DAPP_ORIGIN: &str = "https://dapp.example";
pub const DAPP_HOST: &str = "dapp.example";
pub const WIDGET_URL: &str = "https://widget.example/embed";
pub const WIDGET_HOST: &str = "widget.example";
pub const HOME_URL: &str = "https://home.metamask.io/";
pub const PHISHING_URL: &str = "https://metamask-giveaway.example/";

/// Mixed-case on purpose; the page must only ever see it lowercased.
pub const ADDRESS: &str = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";
pub const OTHER_ADDRESS: &str = "0x00000000000000000000000000000000000000Bb";

/// Upper bound for anything the tests wait on
pub const WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// FRAME
// =============================================================================

/// One message the bridge posted into the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Posted {
    /// Posted to the main window rather than into iframes
    pub main_frame: bool,
    /// Mux stream name (`provider`, `publicConfig`)
    pub channel: String,
    /// Stream payload
    pub payload: Value,
}

/// Rendered frame that records injected scripts.
pub struct PageFrame {
    ready: AtomicBool,
    scripts: Mutex<Vec<String>>,
}

impl PageFrame {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(true),
            scripts: Mutex::new(Vec::new()),
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    /// Every port message posted so far, in order.
    pub fn posted(&self) -> Vec<Posted> {
        self.scripts
            .lock()
            .iter()
            .filter_map(|script| parse_post(script))
            .collect()
    }

    /// Plain text messages posted to the main window (ironman replies),
    /// decoded as JSON.
    pub fn window_messages(&self) -> Vec<Value> {
        self.scripts
            .lock()
            .iter()
            .filter_map(|script| parse_window_message(script))
            .collect()
    }
}

impl FrameHost for PageFrame {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn inject_javascript(&self, script: &str) -> Result<(), provider_bridge::TransportError> {
        self.scripts.lock().push(script.to_string());
        Ok(())
    }
}

/// Unwrap `{name, data: {name: channel, data: payload}}` from a post script.
fn parse_post(script: &str) -> Option<Posted> {
    const MARK: &str = "\u{1}MESSAGE\u{1}";
    let origin = serde_json::to_string(ANY_ORIGIN).ok()?;

    for (main_frame, template) in [
        (true, main_frame_script(MARK, &origin)),
        (false, iframe_script(MARK, &origin)),
    ] {
        let (prefix, suffix) = template.split_once(MARK)?;
        let Some(body) = script
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
        else {
            continue;
        };

        let envelope: Value = serde_json::from_str(body).ok()?;
        let frame = envelope.get("data")?;
        return Some(Posted {
            main_frame,
            channel: frame.get("name")?.as_str()?.to_string(),
            payload: frame.get("data")?.clone(),
        });
    }
    None
}

/// Unwrap the text of a plain `postMessage("...")` script.
fn parse_window_message(script: &str) -> Option<Value> {
    const MARK: &str = "\u{1}TEXT\u{1}";
    let template = webview_message_script(MARK).ok()?;
    let quoted = serde_json::to_string(MARK).ok()?;
    let (prefix, suffix) = template.split_once(&quoted)?;

    let body = script.strip_prefix(prefix)?.strip_suffix(suffix)?;
    let text: String = serde_json::from_str(body).ok()?;
    serde_json::from_str(&text).ok()
}

// =============================================================================
// BACKEND
// =============================================================================

/// Chain node answering the handful of methods the emulator relies on.
pub struct ChainBackend {
    head: AtomicU64,
    calls: Mutex<Vec<String>>,
}

impl ChainBackend {
    pub fn new(head: u64) -> Arc<Self> {
        Arc::new(Self {
            head: AtomicU64::new(head),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn block_hash(number: u64) -> String {
        format!("0x{:064x}", number)
    }
}

#[async_trait]
impl RpcExecutor for ChainBackend {
    async fn execute(&self, request: &RpcRequest) -> ApiResult<Value> {
        self.calls.lock().push(request.method.clone());
        match request.method.as_str() {
            "eth_blockNumber" => Ok(json!(Quantity(self.head.load(Ordering::SeqCst)))),
            "eth_getBlockByNumber" => {
                let number = request
                    .param(0)
                    .and_then(Quantity::from_value)
                    .ok_or_else(|| ApiError::invalid_params("block number"))?;
                Ok(json!({
                    "number": Quantity(number.0),
                    "hash": Self::block_hash(number.0),
                    "transactions": [],
                }))
            }
            "eth_getLogs" => Ok(json!([])),
            "eth_chainId" => Ok(json!("0x1")),
            "eth_getBalance" => Ok(json!("0xde0b6b3a7640000")),
            other => Err(ApiError::method_not_found(other)),
        }
    }
}

// =============================================================================
// SIGNER / UI / ASSETS / PHISHING
// =============================================================================

/// Signer that accepts everything and remembers what it was asked.
#[derive(Default)]
pub struct RecordingSigner {
    requests: Mutex<Vec<(String, SignatureRequest)>>,
}

impl RecordingSigner {
    pub fn requests(&self) -> Vec<(String, SignatureRequest)> {
        self.requests.lock().clone()
    }

    fn record(&self, kind: &str, request: SignatureRequest) -> ApiResult<Value> {
        self.requests.lock().push((kind.to_string(), request));
        Ok(json!("0x5167"))
    }
}

#[async_trait]
impl MessageSigner for RecordingSigner {
    async fn sign_message(&self, request: SignatureRequest) -> ApiResult<Value> {
        self.record("eth_sign", request)
    }

    async fn sign_personal_message(&self, request: SignatureRequest) -> ApiResult<Value> {
        self.record("personal_sign", request)
    }

    async fn sign_typed_message(
        &self,
        request: SignatureRequest,
        version: TypedDataVersion,
    ) -> ApiResult<Value> {
        self.record(&format!("typed_{:?}", version), request)
    }
}

/// Wallet screens that record what they were asked to show.
pub struct RecordingUi {
    prompts: Mutex<Vec<ApprovalPrompt>>,
    dismissed: AtomicUsize,
    favorites: Mutex<Vec<Value>>,
    tutorials: AtomicUsize,
}

impl RecordingUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            dismissed: AtomicUsize::new(0),
            favorites: Mutex::new(vec![
                json!({"url": "https://dapp.example/", "name": "Dapp"}),
                json!({"url": "https://other.example/", "name": "Other"}),
            ]),
            tutorials: AtomicUsize::new(0),
        })
    }

    pub fn prompts(&self) -> Vec<ApprovalPrompt> {
        self.prompts.lock().clone()
    }

    pub fn dismissed(&self) -> usize {
        self.dismissed.load(Ordering::SeqCst)
    }

    pub fn favorites(&self) -> Vec<Value> {
        self.favorites.lock().clone()
    }

    pub fn tutorials(&self) -> usize {
        self.tutorials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletUi for RecordingUi {
    fn show_approval(&self, prompt: ApprovalPrompt) {
        self.prompts.lock().push(prompt);
    }

    fn dismiss_approval(&self) {
        self.dismissed.fetch_add(1, Ordering::SeqCst);
    }

    async fn scan_qr_code(&self) -> Result<Value, UiError> {
        Ok(json!({"target_address": OTHER_ADDRESS}))
    }

    async fn remove_favorite(&self, url: &str) -> Result<Vec<Value>, UiError> {
        let mut favorites = self.favorites.lock();
        favorites.retain(|f| f["url"] != url);
        Ok(favorites.clone())
    }

    fn show_tutorial(&self) {
        self.tutorials.fetch_add(1, Ordering::SeqCst);
    }

    fn show_autocomplete(&self) {}
}

/// FIBOS signer whose user confirms or cancels on cue.
pub struct FibosKeys {
    confirm: AtomicBool,
    signed: Mutex<Vec<Value>>,
}

impl FibosKeys {
    pub const SIGNATURE: &'static str = "SIG_K1_test";

    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            confirm: AtomicBool::new(true),
            signed: Mutex::new(Vec::new()),
        })
    }

    pub fn set_confirm(&self, confirm: bool) {
        self.confirm.store(confirm, Ordering::SeqCst);
    }

    pub fn signed(&self) -> Vec<Value> {
        self.signed.lock().clone()
    }
}

#[async_trait]
impl FibosSigner for FibosKeys {
    async fn sign_transaction(&self, transaction: &Value) -> Result<Value, UiError> {
        if !self.confirm.load(Ordering::SeqCst) {
            return Err(UiError::Cancelled);
        }
        self.signed.lock().push(transaction.clone());
        Ok(json!([Self::SIGNATURE]))
    }
}

/// Asset watcher that accepts every token.
#[derive(Default)]
pub struct AcceptingAssets {
    watched: Mutex<Vec<WatchAssetRequest>>,
}

impl AcceptingAssets {
    pub fn watched(&self) -> Vec<WatchAssetRequest> {
        self.watched.lock().clone()
    }
}

#[async_trait]
impl AssetWatcher for AcceptingAssets {
    async fn watch_asset(&self, asset: WatchAssetRequest) -> ApiResult<Value> {
        self.watched.lock().push(asset);
        Ok(json!(true))
    }
}

/// Fixed phishing list.
pub struct Blocklist {
    hosts: HashSet<String>,
}

impl Blocklist {
    pub fn new(hosts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
        })
    }
}

impl PhishingOracle for Blocklist {
    fn is_phishing(&self, hostname: &str) -> bool {
        self.hosts.contains(hostname)
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// A tab wired to in-memory collaborators.
pub struct Harness {
    pub tab: Arc<TabController>,
    pub wallet: Arc<WalletStore>,
    pub frame: Arc<PageFrame>,
    pub backend: Arc<ChainBackend>,
    pub signer: Arc<RecordingSigner>,
    pub ui: Arc<RecordingUi>,
    pub assets: Arc<AcceptingAssets>,
    pub fibos: Arc<FibosKeys>,
}

impl Harness {
    /// Privacy mode on, one account selected, nothing approved.
    pub fn new() -> Self {
        Self::with_state(WalletState {
            selected_address: Some(ADDRESS.to_string()),
            ..WalletState::default()
        })
    }

    pub fn with_state(state: WalletState) -> Self {
        let wallet = Arc::new(WalletStore::new(state));
        let frame = PageFrame::new();
        let backend = ChainBackend::new(0x10);
        let signer = Arc::new(RecordingSigner::default());
        let ui = RecordingUi::new();
        let assets = Arc::new(AcceptingAssets::default());
        let fibos = FibosKeys::new();

        let services = BridgeServices {
            backend: backend.clone(),
            signer: signer.clone(),
            assets: assets.clone(),
            ui: ui.clone(),
            wallet: wallet.clone(),
            frame: frame.clone(),
            phishing: Blocklist::new(&["metamask-giveaway.example"]),
            fibos: fibos.clone(),
        };
        let tab = TabController::new(Self::config(), services).expect("valid test config");

        Self {
            tab,
            wallet,
            frame,
            backend,
            signer,
            ui,
            assets,
            fibos,
        }
    }

    /// Default config with short approval timings
    pub fn config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.approval.debounce = Duration::from_millis(20);
        config.approval.page_meta_delay = Duration::from_millis(1);
        config
    }

    /// Navigate the main frame.
    pub fn open(&self, url: &str) {
        self.tab.on_load_start(url).expect("page loads");
    }

    /// Raw page message carrying one provider payload from `origin`.
    pub fn port_message(origin: &str, payload: Value) -> String {
        json!({
            "name": "metamask-contentscript",
            "data": {"name": "provider", "data": payload},
            "origin": origin,
        })
        .to_string()
    }

    /// Send a JSON-RPC request as the page at `origin`.
    pub fn request(&self, origin: &str, id: u64, method: &str, params: Value) {
        let payload = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.tab
            .on_message(&Self::port_message(origin, payload))
            .expect("port message accepted");
    }

    /// Raw tab event from the injected page script.
    pub fn tab_event(&self, kind: &str, payload: Value) -> Result<(), BridgeError> {
        self.tab
            .on_message(&json!({"type": kind, "payload": payload}).to_string())
    }

    pub fn posted(&self) -> Vec<Posted> {
        self.frame.posted()
    }

    /// JSON-RPC responses on the provider stream
    pub fn responses(&self) -> Vec<Posted> {
        self.posted()
            .into_iter()
            .filter(|p| p.channel == "provider" && p.payload.get("method").is_none())
            .collect()
    }

    /// Provider notifications named `method`
    pub fn notifications(&self, method: &str) -> Vec<Posted> {
        self.posted()
            .into_iter()
            .filter(|p| p.channel == "provider" && p.payload["method"] == method)
            .collect()
    }

    pub fn public_configs(&self) -> Vec<Value> {
        self.posted()
            .into_iter()
            .filter(|p| p.channel == "publicConfig")
            .map(|p| p.payload)
            .collect()
    }

    /// Wait for the response to request `id`.
    pub async fn response(&self, id: u64) -> Value {
        let found = self
            .eventually(|| self.responses().iter().any(|p| p.payload["id"] == id))
            .await;
        assert!(found, "no response for request {id}");
        self.responses()
            .into_iter()
            .find(|p| p.payload["id"] == id)
            .map(|p| p.payload)
            .unwrap_or(Value::Null)
    }

    /// Send a request and wait for its response.
    pub async fn call(&self, origin: &str, id: u64, method: &str, params: Value) -> Value {
        self.request(origin, id, method, params);
        self.response(id).await
    }

    /// Wait until the approval prompt has been shown `count` times.
    pub async fn wait_for_prompts(&self, count: usize) {
        let shown = self.eventually(|| self.ui.prompts().len() >= count).await;
        assert!(shown, "approval prompt not shown");
    }

    /// Poll `condition` until it holds or [`WAIT`] runs out.
    pub async fn eventually<F>(&self, condition: F) -> bool
    where
        F: Fn() -> bool,
    {
        let deadline = tokio::time::Instant::now() + WAIT;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        condition()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_main_frame_post() {
        let envelope = json!({"name": "metamask-inpage", "data": {"name": "provider", "data": {"id": 1, "result": "0x1"}}});
        let origin = serde_json::to_string(ANY_ORIGIN).unwrap();
        let script = main_frame_script(&envelope.to_string(), &origin);

        let posted = parse_post(&script).unwrap();
        assert!(posted.main_frame);
        assert_eq!(posted.channel, "provider");
        assert_eq!(posted.payload["result"], "0x1");
    }

    #[test]
    fn test_parse_window_message() {
        let script = webview_message_script(r#"{"ironman":"signProvider","data":"fail"}"#).unwrap();
        assert_eq!(
            parse_window_message(&script),
            Some(json!({"ironman": "signProvider", "data": "fail"}))
        );
        assert!(parse_post(&script).is_none());
    }

    #[test]
    fn test_parse_iframe_post() {
        let envelope = json!({"name": "metamask-inpage", "data": {"name": "publicConfig", "data": {"isUnlocked": true}}});
        let origin = serde_json::to_string(ANY_ORIGIN).unwrap();
        let script = iframe_script(&envelope.to_string(), &origin);

        let posted = parse_post(&script).unwrap();
        assert!(!posted.main_frame);
        assert_eq!(posted.channel, "publicConfig");
    }

    #[test]
    fn test_other_scripts_ignored() {
        assert!(parse_post(provider_bridge::tab::WINDOW_INFORMATION_SCRIPT).is_none());
    }
}
