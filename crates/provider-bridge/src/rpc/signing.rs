//! Signing methods. Each gathers page metadata and hands the request to the
//! signer UI.

use crate::domain::networks::active_chain_id;
use crate::domain::{ApiError, ApiResult, Quantity, RpcRequest};
use crate::ports::outbound::{MessageSigner, PageMetaSource, SignatureRequest, TypedDataVersion};
use crate::ports::outbound::WalletStateSource;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Signing methods for one bridge
pub struct SigningRpc {
    signer: Arc<dyn MessageSigner>,
    meta: Arc<dyn PageMetaSource>,
    wallet: Arc<dyn WalletStateSource>,
}

impl SigningRpc {
    pub fn new(
        signer: Arc<dyn MessageSigner>,
        meta: Arc<dyn PageMetaSource>,
        wallet: Arc<dyn WalletStateSource>,
    ) -> Self {
        Self {
            signer,
            meta,
            wallet,
        }
    }

    /// eth_sign - `[from, data]`
    #[instrument(skip(self, request))]
    pub async fn sign(&self, request: &RpcRequest) -> ApiResult<Value> {
        let from = param(request, 0)?;
        let data = param(request, 1)?;
        let request = self.signature_request(data, from).await?;
        self.signer.sign_message(request).await
    }

    /// personal_sign - `[data, from]`, tolerating pages that swap the two
    #[instrument(skip(self, request))]
    pub async fn personal_sign(&self, request: &RpcRequest) -> ApiResult<Value> {
        let (data, from) = personal_sign_order(param(request, 0)?, param(request, 1)?);
        let request = self.signature_request(data, from).await?;
        self.signer.sign_personal_message(request).await
    }

    /// eth_signTypedData - `[data, from]`, legacy V1 encoding
    #[instrument(skip(self, request))]
    pub async fn sign_typed_data_v1(&self, request: &RpcRequest) -> ApiResult<Value> {
        let data = param(request, 0)?;
        let from = param(request, 1)?;
        let request = self.signature_request(data, from).await?;
        self.signer
            .sign_typed_message(request, TypedDataVersion::V1)
            .await
    }

    /// eth_signTypedData_v3 / _v4 - `[from, data]` with a chain id check
    #[instrument(skip(self, request))]
    pub async fn sign_typed_data(
        &self,
        request: &RpcRequest,
        version: TypedDataVersion,
    ) -> ApiResult<Value> {
        let from = param(request, 0)?;
        let data = param(request, 1)?;

        let typed = parse_typed_data(&data)?;
        let state = self.wallet.snapshot();
        let active = active_chain_id(&state.network, &state.network_type);
        if let Some(provided) = typed.pointer("/domain/chainId") {
            check_chain_id(provided, &active)?;
        }

        let request = self.signature_request(data, from).await?;
        self.signer.sign_typed_message(request, version).await
    }

    async fn signature_request(&self, data: Value, from: Value) -> ApiResult<SignatureRequest> {
        let from = from
            .as_str()
            .ok_or_else(|| ApiError::invalid_params("signer address must be a string"))?
            .to_string();
        let meta = self.meta.page_meta().await;
        debug!(from = %from, url = %meta.url, "Forwarding signature request");
        Ok(SignatureRequest { data, from, meta })
    }
}

fn param(request: &RpcRequest, index: usize) -> ApiResult<Value> {
    request
        .param(index)
        .cloned()
        .ok_or_else(|| ApiError::invalid_params(format!("missing parameter at index {}", index)))
}

/// Whether `value` is a `0x`-prefixed 20-byte hex string
pub fn resembles_address(value: &Value) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(body) => body.len() == 40 && hex::decode(body).is_ok(),
        None => false,
    }
}

/// Order `personal_sign` params as `(data, from)`.
///
/// The canonical order is `[data, from]`; when only the first looks like an
/// address the page sent them the other way round.
pub fn personal_sign_order(first: Value, second: Value) -> (Value, Value) {
    if resembles_address(&first) && !resembles_address(&second) {
        (second, first)
    } else {
        (first, second)
    }
}

/// Typed data arrives as a JSON string or, from some pages, an object.
fn parse_typed_data(data: &Value) -> ApiResult<Value> {
    match data {
        Value::String(raw) => Ok(serde_json::from_str(raw)?),
        Value::Object(_) => Ok(data.clone()),
        _ => Err(ApiError::invalid_params("typed data must be a JSON string")),
    }
}

/// Falsy chain ids (absent, null, false, 0, "") skip the check
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Compare a typed-data `domain.chainId` with the active chain id.
///
/// Both sides are normalized to integers (decimal, hex or JSON number);
/// values that do not parse are compared as text.
pub fn check_chain_id(provided: &Value, active: &str) -> ApiResult<()> {
    if is_unset(provided) {
        return Ok(());
    }

    let provided_text = match provided {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let matches = match (
        Quantity::from_value(provided),
        active.parse::<Quantity>().ok(),
    ) {
        (Some(p), Some(a)) => p == a,
        _ => provided_text == active,
    };

    if matches {
        Ok(())
    } else {
        Err(ApiError::chain_mismatch(provided_text, active))
    }
}
