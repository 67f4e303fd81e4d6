//! Terminal stage: everything not answered locally goes to the backend.

use super::{Flow, Middleware};
use crate::domain::RpcRequest;
use crate::ports::outbound::RpcExecutor;
use async_trait::async_trait;
use std::sync::Arc;

pub struct ForwardMiddleware {
    backend: Arc<dyn RpcExecutor>,
}

impl ForwardMiddleware {
    pub fn new(backend: Arc<dyn RpcExecutor>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Middleware for ForwardMiddleware {
    fn name(&self) -> &'static str {
        "forward"
    }

    async fn handle(&self, request: &mut RpcRequest) -> Flow {
        Flow::Done(self.backend.execute(request).await)
    }
}
