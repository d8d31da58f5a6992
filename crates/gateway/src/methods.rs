//! RPC method registry. The transport (out of process or the CLI) hands
//! frames to [`MethodRegistry::handle_frame`]; handlers route to services.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use {serde_json::Value, tracing::debug};

use openclaw_protocol::{ErrorShape, RequestFrame, ResponseFrame};

use crate::state::GatewayState;

/// Context passed to every method handler.
pub struct MethodContext {
    pub params: Value,
    pub state: Arc<GatewayState>,
}

pub type MethodResult = Result<Value, ErrorShape>;

/// A boxed async method handler.
pub type HandlerFn =
    Box<dyn Fn(MethodContext) -> Pin<Box<dyn Future<Output = MethodResult> + Send>> + Send + Sync>;

pub struct MethodRegistry {
    handlers: HashMap<&'static str, HandlerFn>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register_cron();
        registry
    }

    fn register(&mut self, name: &'static str, handler: HandlerFn) {
        self.handlers.insert(name, handler);
    }

    pub fn methods(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Route one call. Unknown methods are an `invalid_request`.
    pub async fn dispatch(
        &self,
        state: Arc<GatewayState>,
        method: &str,
        params: Value,
    ) -> MethodResult {
        debug!(method, "dispatching rpc method");
        let Some(handler) = self.handlers.get(method) else {
            return Err(ErrorShape::invalid_request(format!(
                "unknown method: {method}"
            )));
        };
        handler(MethodContext { params, state }).await
    }

    /// Frame-level entry point used by the transport and the CLI.
    pub async fn handle_frame(
        &self,
        state: Arc<GatewayState>,
        frame: RequestFrame,
    ) -> ResponseFrame {
        let params = frame.params.unwrap_or(Value::Object(Default::default()));
        match self.dispatch(state, &frame.method, params).await {
            Ok(payload) => ResponseFrame::ok(frame.id, payload),
            Err(error) => ResponseFrame::err(frame.id, error),
        }
    }

    fn register_cron(&mut self) {
        self.register(
            "cron.list",
            Box::new(|ctx| {
                Box::pin(async move { ctx.state.services.cron.list(ctx.params).await })
            }),
        );
        self.register(
            "cron.status",
            Box::new(|ctx| Box::pin(async move { ctx.state.services.cron.status().await })),
        );
        self.register(
            "cron.add",
            Box::new(|ctx| {
                Box::pin(async move { ctx.state.services.cron.add(ctx.params).await })
            }),
        );
        self.register(
            "cron.update",
            Box::new(|ctx| {
                Box::pin(async move { ctx.state.services.cron.update(ctx.params).await })
            }),
        );
        self.register(
            "cron.remove",
            Box::new(|ctx| {
                Box::pin(async move { ctx.state.services.cron.remove(ctx.params).await })
            }),
        );
        self.register(
            "cron.run",
            Box::new(|ctx| {
                Box::pin(async move { ctx.state.services.cron.run(ctx.params).await })
            }),
        );
        self.register(
            "cron.runs",
            Box::new(|ctx| {
                Box::pin(async move { ctx.state.services.cron.runs(ctx.params).await })
            }),
        );
        self.register(
            "scheduler.status",
            Box::new(|ctx| Box::pin(async move { ctx.state.services.scheduler.status().await })),
        );
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
