//! Stamps every request with the calling frame's hostname.

use super::{Flow, Middleware};
use crate::domain::RpcRequest;
use async_trait::async_trait;

pub struct OriginMiddleware {
    hostname: String,
}

impl OriginMiddleware {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

#[async_trait]
impl Middleware for OriginMiddleware {
    fn name(&self) -> &'static str {
        "origin"
    }

    async fn handle(&self, request: &mut RpcRequest) -> Flow {
        request.origin = Some(self.hostname.clone());
        Flow::Next
    }
}
