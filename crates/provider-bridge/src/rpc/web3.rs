//! Web3 namespace methods answered by the wallet.

use crate::domain::ApiResult;
use serde_json::{json, Value};

/// Web3 RPC methods handler
pub struct Web3Rpc {
    client_version: String,
}

impl Web3Rpc {
    pub fn new(client_version: String) -> Self {
        Self { client_version }
    }

    /// web3_clientVersion - Returns client version string
    ///
    /// Format: {client}/{app version}/Beta/Mobile
    pub fn client_version(&self) -> ApiResult<Value> {
        Ok(json!(self.client_version))
    }
}
