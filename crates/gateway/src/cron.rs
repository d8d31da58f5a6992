//! Live cron service wiring the core scheduler into the gateway.

use std::sync::Arc;

use {async_trait::async_trait, serde_json::Value, tracing::error};

use {
    openclaw_cron::{
        service::{CronListParams, CronScheduler},
        types::{CronJobCreate, CronJobPatch, RunMode},
    },
    openclaw_protocol::ErrorShape,
};

use crate::services::{CronService, ServiceResult};

const DEFAULT_RUNS_LIMIT: usize = 50;

/// Gateway-facing cron service backed by [`CronScheduler`].
pub struct LiveCronService {
    inner: Arc<CronScheduler>,
}

impl LiveCronService {
    pub fn new(inner: Arc<CronScheduler>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<CronScheduler> {
        &self.inner
    }
}

fn map_core_error(e: openclaw_cron::Error) -> ErrorShape {
    if e.is_invalid_request() {
        ErrorShape::invalid_request(e.to_string())
    } else {
        error!(error = %e, "cron operation failed");
        ErrorShape::internal_error(e.to_string())
    }
}

fn require_id(params: &Value) -> Result<&str, ErrorShape> {
    params
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ErrorShape::invalid_request("missing 'id'"))
}

#[async_trait]
impl CronService for LiveCronService {
    async fn list(&self, params: Value) -> ServiceResult {
        let params: CronListParams = serde_json::from_value(params)
            .map_err(|e| ErrorShape::invalid_request(format!("invalid list params: {e}")))?;
        let result = self.inner.list(params).await.map_err(map_core_error)?;
        Ok(serde_json::to_value(result)?)
    }

    async fn status(&self) -> ServiceResult {
        let status = self.inner.status().await.map_err(map_core_error)?;
        Ok(serde_json::to_value(status)?)
    }

    async fn add(&self, params: Value) -> ServiceResult {
        let create: CronJobCreate = serde_json::from_value(params)
            .map_err(|e| ErrorShape::invalid_request(format!("invalid job spec: {e}")))?;
        let job = self.inner.add(create).await.map_err(map_core_error)?;
        Ok(serde_json::to_value(job)?)
    }

    async fn update(&self, params: Value) -> ServiceResult {
        let id = require_id(&params)?;
        let patch: CronJobPatch = serde_json::from_value(
            params
                .get("patch")
                .cloned()
                .unwrap_or(Value::Object(Default::default())),
        )
        .map_err(|e| ErrorShape::invalid_request(format!("invalid patch: {e}")))?;
        let job = self.inner.update(id, patch).await.map_err(map_core_error)?;
        Ok(serde_json::to_value(job)?)
    }

    async fn remove(&self, params: Value) -> ServiceResult {
        let id = require_id(&params)?;
        self.inner.remove(id).await.map_err(map_core_error)?;
        Ok(serde_json::json!({ "ok": true, "removed": true }))
    }

    async fn run(&self, params: Value) -> ServiceResult {
        let id = require_id(&params)?;
        let mode: RunMode = match params.get("mode") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ErrorShape::invalid_request(format!("invalid mode: {e}")))?,
            None => RunMode::Due,
        };
        let result = self.inner.run(id, mode).await.map_err(map_core_error)?;
        Ok(serde_json::to_value(result)?)
    }

    async fn runs(&self, params: Value) -> ServiceResult {
        let id = require_id(&params)?;
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_RUNS_LIMIT);
        let entries = self.inner.runs(id, limit).await;
        let total = entries.len();
        Ok(serde_json::json!({
            "entries": entries,
            "total": total,
            "hasMore": false,
            "nextOffset": null,
        }))
    }
}
