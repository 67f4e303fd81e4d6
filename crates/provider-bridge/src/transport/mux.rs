//! Named sub-streams over one physical message channel.
//!
//! Outbound writes are framed as `{"name": <channel>, "data": <payload>}` and
//! handed to a [`FrameSink`]. Inbound frames are routed by name to the
//! matching stream reader. Each channel is FIFO; there is no ordering across
//! channels.

use crate::domain::TransportError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// One multiplexed frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuxFrame {
    pub name: String,
    pub data: Value,
}

impl MuxFrame {
    /// Strictly decode a raw frame.
    pub fn decode(raw: Value) -> Result<Self, TransportError> {
        let Value::Object(mut map) = raw else {
            return Err(TransportError::MalformedFrame("frame is not an object".into()));
        };
        let name = match map.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(TransportError::MalformedFrame("missing stream name".into())),
        };
        let data = map
            .remove("data")
            .ok_or_else(|| TransportError::MalformedFrame("missing data".into()))?;
        Ok(Self { name, data })
    }
}

/// Physical outbound channel under the multiplexer.
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: Value) -> Result<(), TransportError>;
}

/// Splits one physical channel into named streams.
pub struct Multiplexer {
    sink: Arc<dyn FrameSink>,
    channels: RwLock<HashMap<String, mpsc::UnboundedSender<Value>>>,
    closed: Arc<AtomicBool>,
}

impl Multiplexer {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            channels: RwLock::new(HashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a named stream. Names are unique per multiplexer.
    pub fn create_stream(&self, name: &str) -> Result<MuxStream, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut channels = self.channels.write();
        if channels.contains_key(name) {
            return Err(TransportError::DuplicateStream(name.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        channels.insert(name.to_string(), tx);
        debug!(stream = %name, "Mux stream created");

        Ok(MuxStream {
            reader: MuxReader {
                name: name.to_string(),
                rx,
            },
            writer: MuxWriter {
                name: name.to_string(),
                sink: Arc::clone(&self.sink),
                closed: Arc::clone(&self.closed),
            },
        })
    }

    /// Route one inbound frame to its stream.
    ///
    /// Frames for unknown streams are dropped.
    pub fn receive(&self, raw: Value) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let frame = MuxFrame::decode(raw)?;
        let channels = self.channels.read();
        match channels.get(&frame.name) {
            Some(tx) => {
                trace!(stream = %frame.name, "Mux frame received");
                // A closed reader means the stream's consumer is gone; nothing to do.
                let _ = tx.send(frame.data);
            }
            None => debug!(stream = %frame.name, "Dropping frame for unknown stream"),
        }
        Ok(())
    }

    /// Stop routing and writing. Readers drain what is buffered, then end.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.channels.write().clear();
        debug!("Multiplexer closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Registered stream names
    pub fn stream_names(&self) -> Vec<String> {
        self.channels.read().keys().cloned().collect()
    }
}

/// Reader and writer halves of one stream.
pub struct MuxStream {
    pub reader: MuxReader,
    pub writer: MuxWriter,
}

impl MuxStream {
    pub fn split(self) -> (MuxReader, MuxWriter) {
        (self.reader, self.writer)
    }
}

/// Receiving half of a stream.
pub struct MuxReader {
    name: String,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl MuxReader {
    /// Next payload, or `None` once the multiplexer is closed and drained.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Sending half of a stream. Cheap to clone.
#[derive(Clone)]
pub struct MuxWriter {
    name: String,
    sink: Arc<dyn FrameSink>,
    closed: Arc<AtomicBool>,
}

impl MuxWriter {
    /// Frame `data` with the stream name and hand it to the sink.
    pub fn write(&self, data: Value) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let frame = serde_json::json!({ "name": self.name, "data": data });
        self.sink.send_frame(frame)
    }

    /// Serialize and write.
    pub fn write_json<T: Serialize>(&self, message: &T) -> Result<(), TransportError> {
        let data = serde_json::to_value(message)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        self.write(data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
