//! Frame port: one rendered frame as a message endpoint.
//!
//! Outbound messages are delivered by injecting a small script into the
//! frame. The main frame posts to its own window; nested frames post into
//! every `<iframe>` content window. Inbound messages arrive from the host
//! via [`Port::on_message`] and are queued for the bridge's inbound pump.

use crate::domain::TransportError;
use crate::ports::outbound::FrameHost;
use crate::transport::mux::FrameSink;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Origin filter that matches any target window
pub const ANY_ORIGIN: &str = "*";

/// Script posting `message` to the main frame's window.
pub fn main_frame_script(message: &str, origin: &str) -> String {
    format!(
        "(function () {{ try {{ window.postMessage({message}, {origin}); }} catch (e) {{ }} }})()"
    )
}

/// Script posting `message` into every iframe of the page.
pub fn iframe_script(message: &str, origin: &str) -> String {
    format!(
        "(function () {{ try {{ var frames = document.getElementsByTagName('iframe'); \
         for (var i = 0; i < frames.length; i++) {{ \
         frames[i].contentWindow.postMessage({message}, {origin}); }} }} catch (e) {{ }} }})()"
    )
}

/// Script delivering `text` to the main window as a plain message event,
/// the way the host's own `postMessage` does.
pub fn webview_message_script(text: &str) -> Result<String, TransportError> {
    let message =
        serde_json::to_string(text).map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
    let origin = serde_json::to_string(ANY_ORIGIN)
        .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
    Ok(main_frame_script(&message, &origin))
}

/// A single frame endpoint.
pub struct Port {
    host: Arc<dyn FrameHost>,
    is_main_frame: bool,
    target: String,
    inbound: Mutex<Option<mpsc::UnboundedSender<Value>>>,
}

impl Port {
    /// Create a port and the receiver the bridge drains inbound frames from.
    pub fn new(
        host: Arc<dyn FrameHost>,
        is_main_frame: bool,
        target: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let port = Self {
            host,
            is_main_frame,
            target: target.into(),
            inbound: Mutex::new(Some(tx)),
        };
        (port, rx)
    }

    /// Serialize `payload` and inject it into the frame. Fire-and-forget.
    pub fn post_message(&self, payload: &Value, origin_filter: &str) -> Result<(), TransportError> {
        if !self.host.is_ready() {
            debug!(main_frame = self.is_main_frame, "Frame not ready, skipping post");
            return Ok(());
        }

        let message = serde_json::to_string(payload)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        let origin = serde_json::to_string(origin_filter)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;

        let script = if self.is_main_frame {
            main_frame_script(&message, &origin)
        } else {
            iframe_script(&message, &origin)
        };
        self.host.inject_javascript(&script)
    }

    /// Host delivered a `{name, data}` port message; queue its mux frame.
    pub fn on_message(&self, data: Value) -> Result<(), TransportError> {
        let guard = self.inbound.lock();
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        tx.send(data).map_err(|_| TransportError::Closed)
    }

    /// Host reports the frame is gone. Idempotent.
    pub fn on_disconnect(&self) {
        if self.inbound.lock().take().is_some() {
            debug!(main_frame = self.is_main_frame, "Port disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inbound.lock().is_some()
    }

    pub fn is_main_frame(&self) -> bool {
        self.is_main_frame
    }
}

impl FrameSink for Port {
    fn send_frame(&self, frame: Value) -> Result<(), TransportError> {
        let envelope = serde_json::json!({ "name": self.target, "data": frame });
        self.post_message(&envelope, ANY_ORIGIN).inspect_err(|e| {
            warn!(error = %e, "Failed to post frame to page");
        })
    }
}
