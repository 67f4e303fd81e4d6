//! Read-only tracing of requests and their outcomes.

use super::{Flow, Middleware};
use crate::domain::{ApiResult, RpcRequest};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, Span};

#[derive(Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(&self, request: &mut RpcRequest) -> Flow {
        debug!(
            method = %request.method,
            id = %request.id,
            origin = %request.origin(),
            "RPC request"
        );
        Flow::Next
    }

    fn after(&self, request: &RpcRequest, result: &ApiResult<Value>) {
        match result {
            Ok(_) => {
                Span::current().record("rpc.status", "OK");
                debug!(method = %request.method, id = %request.id, "RPC response");
            }
            Err(e) => {
                Span::current().record("rpc.status", "ERROR");
                debug!(
                    method = %request.method,
                    id = %request.id,
                    code = e.code,
                    message = %e.message,
                    "RPC error response"
                );
            }
        }
    }
}
