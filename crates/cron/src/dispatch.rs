//! Run gating and job dispatch.
//!
//! `cron(8)` owns the clock: jobs arrive here either because the run
//! command fired (`mode=force`) or because a caller asked for a due check.

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::{error, info};

use openclaw_config::OpenclawConfig;

use crate::{
    schedule::{is_job_due, resolve_job_next_run},
    system_events::{HeartbeatWake, SystemEventsQueue},
    types::{
        CronJob, CronPayload, CronRunOutcome, CrontabRunResult, DeliveryMode, RunMode, RunStatus,
        SessionTarget,
    },
    webhook::WebhookDeliverer,
};

/// Parameters passed to the isolated turn runner.
#[derive(Debug, Clone)]
pub struct IsolatedTurnRequest {
    pub job_id: String,
    pub job_name: String,
    pub message: String,
    pub model: Option<String>,
    pub thinking: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub allow_unsafe_external_content: bool,
}

/// What the isolated turn runner reports back. A missing `status` means ok.
#[derive(Debug, Clone, Default)]
pub struct IsolatedTurnResult {
    pub status: Option<RunStatus>,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub session_id: Option<String>,
    pub session_key: Option<String>,
}

/// Callback for running an isolated agent turn. No abort signal is
/// forwarded; the runner owns cancellation.
pub type IsolatedTurnFn = Arc<
    dyn Fn(IsolatedTurnRequest) -> Pin<Box<dyn Future<Output = anyhow::Result<IsolatedTurnResult>> + Send>>
        + Send
        + Sync,
>;

/// Everything dispatch needs beyond the job itself.
pub struct DispatchDeps {
    pub events: Arc<SystemEventsQueue>,
    pub heartbeat: Arc<HeartbeatWake>,
    pub isolated: IsolatedTurnFn,
    pub webhook: Arc<WebhookDeliverer>,
}

/// Whether the job should fire now.
pub fn should_run_job(job: &CronJob, mode: RunMode, now_ms: u64) -> bool {
    match mode {
        RunMode::Force => true,
        RunMode::Due => is_job_due(job, now_ms),
    }
}

/// Execute one job: gate, dispatch to the session target, deliver the
/// outcome, and report the next scheduled run.
pub async fn run_job(
    cfg: &OpenclawConfig,
    deps: &DispatchDeps,
    job: &CronJob,
    mode: RunMode,
    now_ms: u64,
) -> CrontabRunResult {
    if !should_run_job(job, mode, now_ms) {
        return CrontabRunResult::skipped("not-due");
    }

    info!(id = %job.id, name = %job.name, session_target = job.session_target.as_str(), "running cron job");

    let mut outcome = match job.session_target {
        SessionTarget::Main => match dispatch_main(cfg, deps, job).await {
            Ok(outcome) => outcome,
            Err(result) => return result,
        },
        SessionTarget::Isolated => match dispatch_isolated(deps, job).await {
            Ok(outcome) => outcome,
            Err(result) => return result,
        },
    };

    deliver_outcome(deps, job, &mut outcome).await;

    if outcome.status == RunStatus::Error {
        error!(id = %job.id, error = ?outcome.error, "cron job finished with error");
    }

    let next_run_at_ms = resolve_job_next_run(job, now_ms);
    CrontabRunResult::ran(outcome, next_run_at_ms)
}

async fn dispatch_main(
    cfg: &OpenclawConfig,
    deps: &DispatchDeps,
    job: &CronJob,
) -> Result<CronRunOutcome, CrontabRunResult> {
    let CronPayload::SystemEvent { text } = &job.payload else {
        return Err(CrontabRunResult::failed(
            "main session jobs require a systemEvent payload",
        ));
    };

    let agent_id = job
        .agent_id
        .clone()
        .unwrap_or_else(|| cfg.agent.default_id.clone());
    let session_key = job
        .session_key
        .clone()
        .unwrap_or_else(|| cfg.main_session_key(&agent_id));

    match deps
        .events
        .enqueue(text.clone(), agent_id, session_key.clone())
        .await
    {
        Ok(()) => {
            // Both wake modes signal; the runtime decides whether "now"
            // preempts its current turn.
            deps.heartbeat.wake("cron");
            Ok(CronRunOutcome {
                session_key: Some(session_key),
                ..CronRunOutcome::ok()
            })
        }
        Err(e) => Ok(CronRunOutcome {
            status: RunStatus::Error,
            summary: None,
            error: Some(e.to_string()),
            error_kind: Some("dispatch".into()),
            session_id: None,
            session_key: Some(session_key),
        }),
    }
}

async fn dispatch_isolated(
    deps: &DispatchDeps,
    job: &CronJob,
) -> Result<CronRunOutcome, CrontabRunResult> {
    let CronPayload::AgentTurn {
        message,
        model,
        thinking,
        timeout_seconds,
        allow_unsafe_external_content,
        ..
    } = &job.payload
    else {
        return Err(CrontabRunResult::failed(
            "isolated jobs require an agentTurn payload",
        ));
    };

    let request = IsolatedTurnRequest {
        job_id: job.id.clone(),
        job_name: job.name.clone(),
        message: message.clone(),
        model: model.clone(),
        thinking: thinking.clone(),
        timeout_seconds: *timeout_seconds,
        allow_unsafe_external_content: allow_unsafe_external_content.unwrap_or(false),
    };

    match (deps.isolated)(request).await {
        Ok(result) => Ok(CronRunOutcome {
            status: result.status.unwrap_or(RunStatus::Ok),
            summary: result.summary,
            error: result.error,
            error_kind: None,
            session_id: result.session_id,
            session_key: result.session_key,
        }),
        Err(e) => Ok(CronRunOutcome {
            status: RunStatus::Error,
            summary: None,
            error: Some(e.to_string()),
            error_kind: None,
            session_id: None,
            session_key: None,
        }),
    }
}

/// Webhook delivery. A failure taints the outcome unless the job opted into
/// best-effort delivery.
async fn deliver_outcome(deps: &DispatchDeps, job: &CronJob, outcome: &mut CronRunOutcome) {
    let Some(delivery) = &job.delivery else {
        return;
    };
    if delivery.mode != DeliveryMode::Webhook {
        return;
    }

    let url = delivery.to.as_deref().unwrap_or_default();
    let result = deps.webhook.deliver(url, job, outcome).await;
    if let Some(webhook_error) = result.error {
        if !delivery.best_effort {
            outcome.status = RunStatus::Error;
            outcome.error = Some(webhook_error);
            outcome.error_kind = Some("delivery-target".into());
        }
    }
}
