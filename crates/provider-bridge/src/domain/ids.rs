//! Identifiers minted by the bridge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Identity of one bridge instance.
///
/// Uses UUID v7 so log lines from successive bridges of a tab sort by
/// creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BridgeId(Uuid);

impl BridgeId {
    /// Generate a new bridge ID (UUID v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BridgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic `0x`-hex id source for filters and subscriptions.
#[derive(Debug)]
pub struct HexIdGenerator {
    next: AtomicU64,
}

impl HexIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Next id, e.g. `"0x1"`, `"0x2"`
    pub fn next_id(&self) -> String {
        format!("0x{:x}", self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for HexIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
