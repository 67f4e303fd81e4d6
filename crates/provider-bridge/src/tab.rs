//! Tab controller: owns every bridge of one browser tab.
//!
//! The host forwards page loads, raw page messages and the user's approval
//! decision here. The controller creates and tears down bridges, routes port
//! messages by origin, tracks page metadata and pushes `accountsChanged`
//! notifications when wallet permissions change. Ironman signing requests
//! bypass the bridges and are answered straight into the main window.

use crate::bridge::{hostname_of, BridgeInstance, BridgeServices};
use crate::domain::{BridgeConfig, BridgeError, RpcNotification};
use crate::permission::ApprovalSlot;
use crate::ports::outbound::{FibosSigner, FrameHost, PageMeta, PageMetaSource};
use crate::transport::port::webview_message_script;
use crate::transport::{IronmanMessage, PageMessage, PortMessage, TabEvent};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use url::Url;
use wallet_bus::{EventFilter, EventTopic, WalletEvent};

/// Notification sent when the accounts visible to a page change
pub const ACCOUNTS_CHANGED: &str = "accountsChanged";

/// Ironman reply data when signing was cancelled or failed
pub const SIGN_FAILED: &str = "fail";

/// Script asking the page to report its title and URL
pub const WINDOW_INFORMATION_SCRIPT: &str = "(function () { try { \
    var icon = document.querySelector('link[rel~=\"icon\"]'); \
    window.ReactNativeWebView.postMessage(JSON.stringify({ type: 'GET_TITLE_FOR_BOOKMARK', \
    payload: { title: document.title, url: location.href, icon: icon ? icon.href : null } })); \
    } catch (e) { } })()";

/// Page title and URL, refreshed from page messages.
pub struct PageMetaTracker {
    frame: Arc<dyn FrameHost>,
    delay: Duration,
    current: RwLock<PageMeta>,
}

impl PageMetaTracker {
    pub fn new(frame: Arc<dyn FrameHost>, delay: Duration) -> Self {
        Self {
            frame,
            delay,
            current: RwLock::new(PageMeta::default()),
        }
    }

    pub fn update(&self, title: impl Into<String>, url: impl Into<String>) {
        let mut current = self.current.write();
        current.title = title.into();
        current.url = url.into();
    }
}

#[async_trait]
impl PageMetaSource for PageMetaTracker {
    fn current(&self) -> PageMeta {
        self.current.read().clone()
    }

    /// Ask the page for fresh metadata, give it a moment to answer, then
    /// return what we have.
    async fn page_meta(&self) -> PageMeta {
        if self.frame.is_ready() {
            if let Err(e) = self.frame.inject_javascript(WINDOW_INFORMATION_SCRIPT) {
                debug!(error = %e, "Window information script failed");
            }
        }
        tokio::time::sleep(self.delay).await;
        self.current()
    }
}

/// Controller for one browser tab.
pub struct TabController {
    config: BridgeConfig,
    services: BridgeServices,
    approvals: Arc<ApprovalSlot>,
    meta: Arc<PageMetaTracker>,
    bridges: RwLock<Vec<Arc<BridgeInstance>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    signing: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl TabController {
    /// Validate the config and start watching wallet permissions.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: BridgeConfig, services: BridgeServices) -> Result<Arc<Self>, BridgeError> {
        config.validate()?;

        let meta = Arc::new(PageMetaTracker::new(
            Arc::clone(&services.frame),
            config.approval.page_meta_delay,
        ));
        let approvals = ApprovalSlot::new(
            Arc::clone(&services.ui),
            Arc::clone(&meta) as Arc<dyn PageMetaSource>,
            config.approval.debounce,
        );

        let tab = Arc::new(Self {
            config,
            services,
            approvals,
            meta,
            bridges: RwLock::new(Vec::new()),
            watcher: Mutex::new(None),
            signing: Mutex::new(JoinSet::new()),
            closed: AtomicBool::new(false),
        });
        tab.start_wallet_watcher();
        Ok(tab)
    }

    fn start_wallet_watcher(self: &Arc<Self>) {
        let mut subscription = self.services.wallet.subscribe(EventFilter::topics(vec![
            EventTopic::Privacy,
            EventTopic::Preferences,
        ]));
        let tab = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let Some(tab) = tab.upgrade() else {
                    break;
                };
                tab.on_wallet_event(event);
            }
        });
        *self.watcher.lock() = Some(task);
    }

    fn on_wallet_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::ApprovedHostsChanged { previous, current } if current == 0 && previous > 0 => {
                info!(previous, "Approved hosts cleared");
                self.notify_all_connections(
                    RpcNotification::new(ACCOUNTS_CHANGED, json!([])),
                    false,
                );
            }
            WalletEvent::SelectedAddressChanged { address } => {
                if self.services.wallet.snapshot().approved_count() > 0 {
                    self.notify_all_connections(
                        RpcNotification::new(ACCOUNTS_CHANGED, json!([address.to_lowercase()])),
                        true,
                    );
                }
            }
            _ => {}
        }
    }

    fn ensure_not_phishing(&self, url: &Url) -> Result<(), BridgeError> {
        let host = url.host_str().unwrap_or_default();
        if self.services.phishing.is_phishing(host) {
            warn!(hostname = %host, "Blocked phishing origin");
            return Err(BridgeError::PhishingOrigin(host.to_string()));
        }
        Ok(())
    }

    fn spawn_bridge(&self, url: &str, is_main_frame: bool) -> Result<Arc<BridgeInstance>, BridgeError> {
        let bridge = BridgeInstance::spawn(
            url,
            is_main_frame,
            &self.config,
            &self.services,
            Arc::clone(&self.approvals),
            Arc::clone(&self.meta) as Arc<dyn PageMetaSource>,
        )?;
        self.bridges.write().push(Arc::clone(&bridge));
        Ok(bridge)
    }

    /// The main frame started loading `url`: replace every bridge with one
    /// for the new origin.
    pub fn on_load_start(&self, url: &str) -> Result<Arc<BridgeInstance>, BridgeError> {
        self.disconnect_all();

        let parsed = Url::parse(url).map_err(|e| BridgeError::InvalidUrl(format!("{url}: {e}")))?;
        self.ensure_not_phishing(&parsed)?;
        self.meta.update("", url);

        let origin = parsed.origin().ascii_serialization();
        info!(origin = %origin, "Main frame loading");
        self.spawn_bridge(&origin, true)
    }

    /// A nested frame reported ready: give it its own bridge.
    pub fn on_frame_ready(&self, url: &str) -> Result<Arc<BridgeInstance>, BridgeError> {
        let parsed = Url::parse(url).map_err(|e| BridgeError::InvalidUrl(format!("{url}: {e}")))?;
        self.ensure_not_phishing(&parsed)?;
        debug!(url, "Nested frame ready");
        self.spawn_bridge(url, false)
    }

    /// Raw message posted by the page.
    pub fn on_message(&self, raw: &str) -> Result<(), BridgeError> {
        let message = PageMessage::decode(raw, self.config.limits.max_message_size).map_err(|e| {
            warn!(error = %e, "Dropping page message");
            BridgeError::MalformedMessage(e.to_string())
        })?;

        match message {
            PageMessage::Port(message) => {
                self.route_port_message(message);
                Ok(())
            }
            PageMessage::Tab(TabEvent::FrameReady { url }) => self.on_frame_ready(&url).map(|_| ()),
            PageMessage::Tab(TabEvent::NavChange { url, title }) => {
                self.meta.update(title, url);
                Ok(())
            }
            PageMessage::Tab(TabEvent::TitleForBookmark { title, url, .. }) => {
                if !title.is_empty() {
                    self.meta.update(title, url);
                }
                Ok(())
            }
            PageMessage::Ironman(message) => {
                self.on_ironman(message);
                Ok(())
            }
        }
    }

    /// Sign a FIBOS transaction for the page and post back
    /// `{...request, data: signatures}`, or `data: "fail"` when the user
    /// cancels or signing fails.
    fn on_ironman(&self, message: IronmanMessage) {
        let Some(transaction) = message.transaction().cloned() else {
            debug!(action = %message.action, "Ignoring ironman message");
            return;
        };

        let signer = Arc::clone(&self.services.fibos);
        let frame = Arc::clone(&self.services.frame);

        let mut signing = self.signing.lock();
        while signing.try_join_next().is_some() {}
        signing.spawn(async move {
            let data = match signer.sign_transaction(&transaction).await {
                Ok(signatures) => {
                    info!("FIBOS transaction signed");
                    signatures
                }
                Err(e) => {
                    warn!(error = %e, "FIBOS transaction not signed");
                    Value::from(SIGN_FAILED)
                }
            };
            post_to_page(frame.as_ref(), &message.reply(data));
        });
    }

    fn route_port_message(&self, message: PortMessage) {
        let main_origin = Url::parse(&message.origin)
            .ok()
            .map(|u| u.origin().ascii_serialization());

        let targets: Vec<Arc<BridgeInstance>> = self
            .bridges
            .read()
            .iter()
            .filter(|bridge| {
                if bridge.is_main_frame() {
                    main_origin.as_deref() == Some(bridge.url())
                } else {
                    bridge.url() == message.origin
                }
            })
            .cloned()
            .collect();

        if targets.is_empty() {
            debug!(origin = %message.origin, "No bridge for port message");
        }
        for bridge in targets {
            if let Err(e) = bridge.on_message(message.data.clone()) {
                warn!(bridge_id = %bridge.id(), error = %e, "Failed to deliver port message");
            }
        }
    }

    /// User accepted the pending account request.
    pub async fn approve_accounts(&self) -> Result<String, BridgeError> {
        let hostname = self
            .approvals
            .pending_hostname()
            .ok_or(BridgeError::NoPendingApproval)?;
        self.services.wallet.approve_host(&hostname).await;
        self.approvals.approve()
    }

    /// User declined the pending account request.
    pub fn reject_accounts(&self) -> Result<String, BridgeError> {
        self.approvals.reject()
    }

    /// Notify bridges serving `hostname`. Restricted notifications only go
    /// to origins allowed to see accounts.
    pub fn notify_connection(&self, notification: RpcNotification, hostname: &str, restricted: bool) {
        self.notify_where(notification, restricted, |bridge| bridge.hostname() == hostname);
    }

    /// Notify every bridge of the tab.
    pub fn notify_all_connections(&self, notification: RpcNotification, restricted: bool) {
        self.notify_where(notification, restricted, |_| true);
    }

    fn notify_where<F>(&self, notification: RpcNotification, restricted: bool, select: F)
    where
        F: Fn(&BridgeInstance) -> bool,
    {
        let state = self.services.wallet.snapshot();
        let bridges = self.bridges.read().clone();
        for bridge in bridges {
            if !select(&*bridge) {
                continue;
            }
            if restricted && !state.may_disclose_to(bridge.hostname()) {
                continue;
            }
            if let Err(e) = bridge.send_notification(notification.clone()) {
                debug!(bridge_id = %bridge.id(), error = %e, "Notification not delivered");
            }
        }
    }

    fn disconnect_all(&self) {
        let bridges: Vec<_> = self.bridges.write().drain(..).collect();
        for bridge in bridges {
            bridge.on_disconnect();
        }
    }

    /// Live bridges, main frame first
    pub fn bridges(&self) -> Vec<Arc<BridgeInstance>> {
        self.bridges.read().clone()
    }

    pub fn page_meta(&self) -> PageMeta {
        self.meta.current()
    }

    pub fn approvals(&self) -> &Arc<ApprovalSlot> {
        &self.approvals
    }

    /// Hostname of the page in the main frame, if one is loaded
    pub fn main_hostname(&self) -> Option<String> {
        self.bridges
            .read()
            .iter()
            .find(|b| b.is_main_frame())
            .and_then(|b| hostname_of(b.url()).ok())
    }

    /// Tear everything down: bridges, the pending approval and the wallet
    /// watcher.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.disconnect_all();
        self.approvals.cancel_all();
        self.signing.lock().abort_all();
        if let Some(task) = self.watcher.lock().take() {
            task.abort();
        }
        info!("Tab closed");
    }
}

fn post_to_page(frame: &dyn FrameHost, reply: &Value) {
    if !frame.is_ready() {
        debug!("Frame not ready, dropping ironman reply");
        return;
    }
    let delivered =
        webview_message_script(&reply.to_string()).and_then(|script| frame.inject_javascript(&script));
    if let Err(e) = delivered {
        warn!(error = %e, "Failed to post ironman reply");
    }
}

impl Drop for TabController {
    fn drop(&mut self) {
        self.close();
    }
}
