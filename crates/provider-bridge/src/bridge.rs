//! One provider bridge per frame.
//!
//! ```text
//!  page ──▶ Port ──▶ Multiplexer ─┬─ "provider" ──▶ RpcEngine ──▶ response
//!                                  └─ "publicConfig" ◀── PublicConfigPublisher
//! ```
//!
//! Lifecycle is `Constructing → Active → Disconnected`. Disconnected is
//! terminal; teardown is idempotent.

use crate::domain::{
    ApiError, BridgeConfig, BridgeError, BridgeId, JsonRpcId, RpcNotification, RpcRequest,
    RpcResponse, TransportError,
};
use crate::emulator::{FilterManager, SubscriptionManager};
use crate::middleware::{
    ForwardMiddleware, LoggingMiddleware, Middleware, OriginMiddleware, RpcEngine,
};
use crate::permission::ApprovalSlot;
use crate::ports::outbound::{
    AssetWatcher, FibosSigner, FrameHost, MessageSigner, PageMetaSource, PhishingOracle,
    RpcExecutor, WalletStateSource, WalletUi,
};
use crate::public_config::{PublicConfig, PublicConfigPublisher};
use crate::rpc::{RpcHandlers, WalletDispatch};
use crate::transport::{FrameSink, Multiplexer, MuxReader, MuxWriter, Port};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

/// Host collaborators shared by every bridge of a tab
#[derive(Clone)]
pub struct BridgeServices {
    pub backend: Arc<dyn RpcExecutor>,
    pub signer: Arc<dyn MessageSigner>,
    pub assets: Arc<dyn AssetWatcher>,
    pub ui: Arc<dyn WalletUi>,
    pub wallet: Arc<dyn WalletStateSource>,
    pub frame: Arc<dyn FrameHost>,
    pub phishing: Arc<dyn PhishingOracle>,
    pub fibos: Arc<dyn FibosSigner>,
}

/// Bridge lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Constructing,
    Active,
    Disconnected,
}

/// Hostname of a bridge URL
pub fn hostname_of(url: &str) -> Result<String, BridgeError> {
    let parsed = Url::parse(url).map_err(|e| BridgeError::InvalidUrl(format!("{url}: {e}")))?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| BridgeError::InvalidUrl(format!("{url}: no host")))
}

/// Mediator between one frame's page and the wallet.
pub struct BridgeInstance {
    id: BridgeId,
    url: String,
    hostname: String,
    is_main_frame: bool,
    state: Arc<RwLock<BridgeState>>,
    port: Arc<Port>,
    mux: Arc<Multiplexer>,
    engine: Arc<RpcEngine>,
    notifications: mpsc::UnboundedSender<RpcNotification>,
    publisher: PublicConfigPublisher,
    approvals: Arc<ApprovalSlot>,
    tasks: Mutex<JoinSet<()>>,
    requests: Arc<Mutex<JoinSet<()>>>,
}

impl BridgeInstance {
    /// Build a bridge for the frame at `url` and start its tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        url: &str,
        is_main_frame: bool,
        config: &BridgeConfig,
        services: &BridgeServices,
        approvals: Arc<ApprovalSlot>,
        meta: Arc<dyn PageMetaSource>,
    ) -> Result<Arc<Self>, BridgeError> {
        let id = BridgeId::new();
        let hostname = hostname_of(url)?;
        let state = Arc::new(RwLock::new(BridgeState::Constructing));

        let (port, inbound) = Port::new(
            Arc::clone(&services.frame),
            is_main_frame,
            config.channels.port_target.clone(),
        );
        let port = Arc::new(port);
        let mux = Arc::new(Multiplexer::new(Arc::clone(&port) as Arc<dyn FrameSink>));
        let (provider_reader, provider_writer) =
            mux.create_stream(&config.channels.provider)?.split();
        let public_config = mux.create_stream(&config.channels.public_config)?;

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let handlers = RpcHandlers::new(
            config,
            services,
            id,
            &hostname,
            Arc::clone(&approvals),
            meta,
        );
        let stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(OriginMiddleware::new(hostname.clone())),
            Arc::new(LoggingMiddleware::new()),
            Arc::new(FilterManager::new(
                Arc::clone(&services.backend),
                Arc::clone(&services.wallet),
                config.limits.max_filters,
            )),
            Arc::new(SubscriptionManager::new(
                Arc::clone(&services.backend),
                Arc::clone(&services.wallet),
                notify_tx.clone(),
                config.limits.max_subscriptions,
            )),
            Arc::new(WalletDispatch::new(handlers)),
            Arc::new(ForwardMiddleware::new(Arc::clone(&services.backend))),
        ];
        let engine = Arc::new(RpcEngine::new(stages));

        let publisher =
            PublicConfigPublisher::spawn(Arc::clone(&services.wallet), public_config.writer);

        let requests = Arc::new(Mutex::new(JoinSet::new()));
        let mut tasks = JoinSet::new();
        tasks.spawn(inbound_pump(inbound, Arc::clone(&mux)));
        tasks.spawn(provider_loop(
            provider_reader,
            provider_writer.clone(),
            Arc::clone(&engine),
            Arc::clone(&state),
            Arc::clone(&requests),
        ));
        tasks.spawn(notification_forwarder(
            notify_rx,
            provider_writer,
            Arc::clone(&state),
        ));

        *state.write() = BridgeState::Active;
        info!(bridge_id = %id, hostname = %hostname, main_frame = is_main_frame, "Bridge active");

        Ok(Arc::new(Self {
            id,
            url: url.to_string(),
            hostname,
            is_main_frame,
            state,
            port,
            mux,
            engine,
            notifications: notify_tx,
            publisher,
            approvals,
            tasks: Mutex::new(tasks),
            requests,
        }))
    }

    pub fn id(&self) -> BridgeId {
        self.id
    }

    /// URL the bridge was created for (an origin for main-frame bridges)
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn is_main_frame(&self) -> bool {
        self.is_main_frame
    }

    pub fn state(&self) -> BridgeState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == BridgeState::Active
    }

    /// Push a notification to the page on the provider stream.
    pub fn send_notification(&self, notification: RpcNotification) -> Result<(), BridgeError> {
        if !self.is_active() {
            return Err(BridgeError::Disconnected);
        }
        self.notifications
            .send(notification)
            .map_err(|_| BridgeError::Disconnected)
    }

    /// Host delivered a port message for this frame.
    pub fn on_message(&self, data: Value) -> Result<(), BridgeError> {
        if !self.is_active() {
            return Err(BridgeError::Disconnected);
        }
        self.port.on_message(data).map_err(BridgeError::from)
    }

    /// Public config snapshots, for the host's `update` listeners
    pub fn updates(&self) -> watch::Receiver<PublicConfig> {
        self.publisher.updates()
    }

    /// Tear the bridge down. In-flight requests are abandoned.
    pub fn on_disconnect(&self) {
        {
            let mut state = self.state.write();
            if *state == BridgeState::Disconnected {
                return;
            }
            *state = BridgeState::Disconnected;
        }

        self.approvals.cancel_owner(self.id);
        self.engine.destroy();
        self.publisher.stop();
        self.port.on_disconnect();
        self.mux.close();
        self.tasks.lock().abort_all();
        self.requests.lock().abort_all();

        info!(bridge_id = %self.id, hostname = %self.hostname, "Bridge disconnected");
    }
}

impl Drop for BridgeInstance {
    fn drop(&mut self) {
        self.on_disconnect();
    }
}

/// Port inbound queue → multiplexer
async fn inbound_pump(mut inbound: mpsc::UnboundedReceiver<Value>, mux: Arc<Multiplexer>) {
    while let Some(frame) = inbound.recv().await {
        match mux.receive(frame) {
            Ok(()) => {}
            Err(TransportError::Closed) => break,
            Err(e) => warn!(error = %e, "Dropping inbound frame"),
        }
    }
}

/// Provider stream → engine, one task per request.
async fn provider_loop(
    mut reader: MuxReader,
    writer: MuxWriter,
    engine: Arc<RpcEngine>,
    state: Arc<RwLock<BridgeState>>,
    requests: Arc<Mutex<JoinSet<()>>>,
) {
    while let Some(payload) = reader.recv().await {
        let request = match serde_json::from_value::<RpcRequest>(payload.clone()) {
            Ok(request) => request,
            Err(e) => {
                reject_malformed(&writer, &payload, &e);
                continue;
            }
        };

        let engine = Arc::clone(&engine);
        let writer = writer.clone();
        let state = Arc::clone(&state);

        let mut in_flight = requests.lock();
        while in_flight.try_join_next().is_some() {}
        in_flight.spawn(async move {
            let response = engine.handle(request).await;
            if *state.read() != BridgeState::Active {
                debug!(id = %response.id, "Bridge gone, dropping response");
                return;
            }
            if let Err(e) = writer.write_json(&response) {
                warn!(id = %response.id, error = %e, "Failed to write response");
            }
        });
    }
}

/// A payload that is not a request is answered when it carries an id and
/// dropped otherwise.
fn reject_malformed(writer: &MuxWriter, payload: &Value, error: &serde_json::Error) {
    let id = payload
        .get("id")
        .and_then(|id| serde_json::from_value::<JsonRpcId>(id.clone()).ok());
    match id {
        Some(id) if id != JsonRpcId::Null => {
            let response =
                RpcResponse::error(id, ApiError::invalid_request(format!("invalid request: {error}")));
            if let Err(e) = writer.write_json(&response) {
                warn!(error = %e, "Failed to write error response");
            }
        }
        _ => warn!(error = %error, "Dropping malformed provider message"),
    }
}

/// Subscription and host notifications → provider stream
async fn notification_forwarder(
    mut notifications: mpsc::UnboundedReceiver<RpcNotification>,
    writer: MuxWriter,
    state: Arc<RwLock<BridgeState>>,
) {
    while let Some(notification) = notifications.recv().await {
        if *state.read() != BridgeState::Active {
            break;
        }
        if let Err(e) = writer.write_json(&notification) {
            warn!(method = %notification.method, error = %e, "Failed to write notification");
        }
    }
}
