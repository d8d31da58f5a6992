//! CRUD and run orchestration over the crontab store.
//!
//! There is no timer loop here: `cron(8)` owns the clock and re-enters
//! through the run command. Every operation is a fresh read-modify-write
//! cycle against the crontab.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    serde::{Deserialize, Serialize},
    tracing::info,
};

use openclaw_config::OpenclawConfig;

use crate::{
    crontab_io::CrontabIo,
    dispatch::{DispatchDeps, IsolatedTurnFn, run_job},
    error::{Error, Result},
    history::{RunHistorySource, read_job_runs},
    schedule::resolve_crontab_schedule,
    store::CrontabStore,
    system_events::{HeartbeatWake, SystemEventsQueue},
    types::{
        CronDelivery, CronJob, CronJobCreate, CronJobPatch, CronJobState, CronPayload,
        CronRunLogEntry, CronSchedule, CronStatus, CrontabRunResult, RunMode,
    },
    webhook::WebhookDeliverer,
};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── List parameters ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EnabledFilter {
    All,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    NextRunAtMs,
    UpdatedAtMs,
    Name,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronListParams {
    pub include_disabled: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub query: Option<String>,
    pub enabled: Option<EnabledFilter>,
    pub sort_by: Option<SortBy>,
    pub sort_dir: Option<SortDir>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronListResult {
    pub jobs: Vec<CronJob>,
    pub meta: ListMeta,
}

const DEFAULT_PAGE_LIMIT: usize = 50;

// ── Scheduler ────────────────────────────────────────────────────────────────

pub struct CronScheduler {
    cfg: OpenclawConfig,
    store: CrontabStore,
    deps: DispatchDeps,
    history: Arc<dyn RunHistorySource>,
}

impl CronScheduler {
    pub fn new(
        cfg: OpenclawConfig,
        io: Arc<dyn CrontabIo>,
        history: Arc<dyn RunHistorySource>,
        isolated: IsolatedTurnFn,
    ) -> Result<Self> {
        let webhook = Arc::new(WebhookDeliverer::new(cfg.cron.webhook_token.clone())?);
        Ok(Self {
            cfg,
            store: CrontabStore::new(io),
            deps: DispatchDeps {
                events: SystemEventsQueue::new(),
                heartbeat: HeartbeatWake::new(),
                isolated,
                webhook,
            },
            history,
        })
    }

    /// The queue main-session events land in; drained by the agent runtime.
    pub fn events(&self) -> &Arc<SystemEventsQueue> {
        &self.deps.events
    }

    /// The heartbeat wake signal the agent runtime waits on.
    pub fn heartbeat(&self) -> &Arc<HeartbeatWake> {
        &self.deps.heartbeat
    }

    pub async fn list(&self, params: CronListParams) -> Result<CronListResult> {
        let snapshot = self.store.load(now_ms()).await?;
        let mut jobs = snapshot.jobs;

        let filter = params.enabled.unwrap_or(match params.include_disabled {
            Some(false) => EnabledFilter::Enabled,
            _ => EnabledFilter::All,
        });
        match filter {
            EnabledFilter::All => {}
            EnabledFilter::Enabled => jobs.retain(|j| j.enabled),
            EnabledFilter::Disabled => jobs.retain(|j| !j.enabled),
        }
        if let Some(query) = &params.query {
            let query = query.to_lowercase();
            jobs.retain(|j| j.name.to_lowercase().contains(&query));
        }

        match params.sort_by.unwrap_or_default() {
            SortBy::NextRunAtMs => jobs.sort_by(|a, b| {
                // Jobs with no upcoming run sort last.
                match (a.state.next_run_at_ms, b.state.next_run_at_ms) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => a.name.cmp(&b.name),
                }
            }),
            SortBy::UpdatedAtMs => jobs.sort_by_key(|j| j.updated_at_ms),
            SortBy::Name => jobs.sort_by_key(|j| j.name.to_lowercase()),
        }
        if params.sort_dir.unwrap_or_default() == SortDir::Desc {
            jobs.reverse();
        }

        let total = jobs.len();
        let offset = params.offset.unwrap_or(0);
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        let jobs = jobs.into_iter().skip(offset).take(limit).collect();

        Ok(CronListResult {
            jobs,
            meta: ListMeta {
                total,
                limit,
                offset,
            },
        })
    }

    pub async fn status(&self) -> Result<CronStatus> {
        let snapshot = self.store.load(now_ms()).await?;
        Ok(CronStatus {
            enabled: !snapshot.jobs.is_empty(),
            jobs: snapshot.jobs.len(),
        })
    }

    pub async fn add(&self, create: CronJobCreate) -> Result<CronJob> {
        // Feasibility errors surface verbatim to the caller.
        resolve_crontab_schedule(&create.schedule)?;

        let now = now_ms();
        let job = CronJob {
            id: uuid::Uuid::new_v4().to_string(),
            name: create.name,
            description: create.description,
            enabled: create.enabled,
            agent_id: create.agent_id,
            session_key: create.session_key,
            delete_after_run: create.delete_after_run,
            created_at_ms: now,
            updated_at_ms: now,
            schedule: create.schedule,
            session_target: create.session_target,
            wake_mode: create.wake_mode,
            payload: create.payload,
            delivery: create.delivery,
            state: CronJobState::default(),
        };

        let id = job.id.clone();
        let written = self
            .store
            .mutate(now, |jobs| {
                jobs.push(job);
                Ok(())
            })
            .await?;

        let stored = written
            .into_iter()
            .find(|j| j.id == id)
            .ok_or_else(|| Error::message("job vanished during write"))?;
        info!(id = %stored.id, name = %stored.name, "cron job added");
        Ok(stored)
    }

    pub async fn update(&self, id: &str, patch: CronJobPatch) -> Result<CronJob> {
        if let Some(schedule) = &patch.schedule {
            resolve_crontab_schedule(schedule)?;
        }

        let now = now_ms();
        let written = self
            .store
            .mutate(now, |jobs| {
                let job = jobs
                    .iter_mut()
                    .find(|j| j.id == id)
                    .ok_or_else(|| Error::job_not_found(id))?;
                apply_patch(job, &patch, now)
            })
            .await?;

        let updated = written
            .into_iter()
            .find(|j| j.id == id)
            .ok_or_else(|| Error::job_not_found(id))?;
        info!(id, "cron job updated");
        Ok(updated)
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store
            .mutate(now_ms(), |jobs| {
                let before = jobs.len();
                jobs.retain(|j| j.id != id);
                if jobs.len() == before {
                    return Err(Error::job_not_found(id));
                }
                Ok(())
            })
            .await?;
        info!(id, "cron job removed");
        Ok(())
    }

    pub async fn run(&self, id: &str, mode: RunMode) -> Result<CrontabRunResult> {
        let now = now_ms();
        let snapshot = self.store.load(now).await?;
        let job = snapshot
            .jobs
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .ok_or_else(|| Error::job_not_found(id))?;

        let result = run_job(&self.cfg, &self.deps, &job, mode, now).await;

        if result.ran && job.delete_after_run && matches!(job.schedule, CronSchedule::At { .. }) {
            self.store
                .mutate(now, |jobs| {
                    jobs.retain(|j| j.id != id);
                    Ok(())
                })
                .await?;
            info!(id, "one-shot job deleted after run");
        }

        Ok(result)
    }

    pub async fn runs(&self, id: &str, limit: usize) -> Vec<CronRunLogEntry> {
        read_job_runs(self.history.as_ref(), id, limit, now_ms()).await
    }
}

// ── Patch application ────────────────────────────────────────────────────────

fn apply_patch(job: &mut CronJob, patch: &CronJobPatch, now: u64) -> Result<()> {
    if let Some(name) = &patch.name {
        job.name = name.clone();
    }
    if let Some(description) = &patch.description {
        job.description = Some(description.clone());
    }
    if let Some(enabled) = patch.enabled {
        job.enabled = enabled;
    }
    if let Some(agent_id) = &patch.agent_id {
        job.agent_id = Some(agent_id.clone());
    }
    if let Some(session_key) = &patch.session_key {
        job.session_key = Some(session_key.clone());
    }
    if let Some(delete_after_run) = patch.delete_after_run {
        job.delete_after_run = delete_after_run;
    }
    if let Some(schedule) = &patch.schedule {
        job.schedule = schedule.clone();
    }
    if let Some(session_target) = patch.session_target {
        job.session_target = session_target;
    }
    if let Some(wake_mode) = patch.wake_mode {
        job.wake_mode = wake_mode;
    }
    if let Some(payload_patch) = &patch.payload {
        job.payload = merge_payload(&job.payload, payload_patch)?;
    }
    if let Some(delivery_patch) = &patch.delivery {
        job.delivery = Some(merge_delivery(job.delivery.as_ref(), delivery_patch)?);
    }
    job.updated_at_ms = now;
    Ok(())
}

/// Shallow-merge a partial payload object onto the current payload. A patch
/// naming a different `kind` is rejected; the two variants do not share
/// fields, so a spread across them is ill-defined.
fn merge_payload(current: &CronPayload, patch: &serde_json::Value) -> Result<CronPayload> {
    let patch_obj = patch
        .as_object()
        .ok_or_else(|| Error::message("payload patch must be an object"))?;
    if let Some(kind) = patch_obj.get("kind").and_then(serde_json::Value::as_str) {
        if kind != current.kind() {
            return Err(Error::message(format!(
                "payload kind cannot change in a patch (job payload is {}); send a full replacement",
                current.kind()
            )));
        }
    }
    let mut merged = serde_json::to_value(current)?;
    let merged_obj = merged
        .as_object_mut()
        .ok_or_else(|| Error::message("payload is not an object"))?;
    for (key, value) in patch_obj {
        merged_obj.insert(key.clone(), value.clone());
    }
    serde_json::from_value(merged).map_err(|e| Error::message(format!("invalid payload patch: {e}")))
}

fn merge_delivery(
    current: Option<&CronDelivery>,
    patch: &serde_json::Value,
) -> Result<CronDelivery> {
    let patch_obj = patch
        .as_object()
        .ok_or_else(|| Error::message("delivery patch must be an object"))?;
    let mut merged = match current {
        Some(delivery) => serde_json::to_value(delivery)?,
        None => serde_json::Value::Object(Default::default()),
    };
    let merged_obj = merged
        .as_object_mut()
        .ok_or_else(|| Error::message("delivery is not an object"))?;
    for (key, value) in patch_obj {
        merged_obj.insert(key.clone(), value.clone());
    }
    serde_json::from_value(merged)
        .map_err(|e| Error::message(format!("invalid delivery patch: {e}")))
}
