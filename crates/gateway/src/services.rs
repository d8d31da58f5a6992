//! Trait interfaces for the domain services the gateway delegates to.

use {async_trait::async_trait, serde_json::Value};

use openclaw_protocol::ErrorShape;

pub type ServiceResult<T = Value> = Result<T, ErrorShape>;

/// Crontab-backed job scheduling, keyed by the `cron.*` method family.
#[async_trait]
pub trait CronService: Send + Sync {
    async fn list(&self, params: Value) -> ServiceResult;
    async fn status(&self) -> ServiceResult;
    async fn add(&self, params: Value) -> ServiceResult;
    async fn update(&self, params: Value) -> ServiceResult;
    async fn remove(&self, params: Value) -> ServiceResult;
    async fn run(&self, params: Value) -> ServiceResult;
    async fn runs(&self, params: Value) -> ServiceResult;
}

/// Host scheduler introspection (`scheduler.status`).
#[async_trait]
pub trait SchedulerService: Send + Sync {
    async fn status(&self) -> ServiceResult;
}
