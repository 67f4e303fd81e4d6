//! Ordered JSON-RPC middleware pipeline.
//!
//! Order per bridge: Origin → Logging → Filters → Subscriptions → Wallet → Forward
//!
//! Each stage either answers the request, passes it on, or fails it. Once the
//! chain settles, the `after` observers of every stage that saw the request
//! run in reverse order.

pub mod forward;
pub mod logging;
pub mod origin;

pub use forward::ForwardMiddleware;
pub use logging::LoggingMiddleware;
pub use origin::OriginMiddleware;

use crate::domain::{ApiError, ApiResult, RpcRequest, RpcResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Outcome of one middleware stage
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next stage
    Next,
    /// Stop here with this result
    Done(ApiResult<Value>),
}

/// One stage of the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stage name for logs
    fn name(&self) -> &'static str;

    /// Process the request. Stages may mutate it before passing it on.
    async fn handle(&self, request: &mut RpcRequest) -> Flow;

    /// Observe the settled result.
    fn after(&self, _request: &RpcRequest, _result: &ApiResult<Value>) {}

    /// Release resources (polling tasks, subscriptions). Called on teardown.
    fn destroy(&self) {}
}

/// Runs requests through an ordered list of middleware.
pub struct RpcEngine {
    stages: Vec<Arc<dyn Middleware>>,
}

impl RpcEngine {
    pub fn new(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stages }
    }

    /// Run one request to completion. Always produces a response with the
    /// request's id; a chain that falls off the end answers method not found.
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let span = info_span!(
            "rpc_request",
            rpc.method = %request.method,
            rpc.id = %request.id,
            rpc.status = tracing::field::Empty,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, mut request: RpcRequest) -> RpcResponse {
        let mut settled = None;
        let mut seen = 0;

        for stage in &self.stages {
            seen += 1;
            match stage.handle(&mut request).await {
                Flow::Next => continue,
                Flow::Done(result) => {
                    debug!(stage = stage.name(), "Request answered");
                    settled = Some(result);
                    break;
                }
            }
        }

        let result =
            settled.unwrap_or_else(|| Err(ApiError::method_not_found(&request.method)));

        for stage in self.stages[..seen].iter().rev() {
            stage.after(&request, &result);
        }

        RpcResponse::from_result(request.id.clone(), result)
    }

    /// Destroy every stage, in pipeline order.
    pub fn destroy(&self) {
        for stage in &self.stages {
            stage.destroy();
        }
    }

    /// Stage names in pipeline order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}
