//! End-to-end RPC flows over the method registry with an in-memory crontab.

use std::sync::Arc;

use serde_json::{Value, json};

use {
    openclaw_config::OpenclawConfig,
    openclaw_cron::{
        crontab_io::{CrontabIo, MemoryCrontab},
        dispatch::{IsolatedTurnFn, IsolatedTurnResult},
        history::StaticLogSource,
        service::CronScheduler,
    },
    openclaw_gateway::{
        GatewayState, MethodRegistry, Services, cron::LiveCronService,
        scheduler::SystemSchedulerService,
    },
    openclaw_protocol::RequestFrame,
};

struct Harness {
    registry: MethodRegistry,
    state: Arc<GatewayState>,
    crontab: Arc<MemoryCrontab>,
    scheduler: Arc<CronScheduler>,
}

impl Harness {
    fn new() -> Self {
        Self::with_journal(String::new())
    }

    fn with_journal(journal: String) -> Self {
        let crontab = Arc::new(MemoryCrontab::new());
        let isolated: IsolatedTurnFn = Arc::new(|_req| {
            Box::pin(async {
                Ok(IsolatedTurnResult {
                    summary: Some("turn complete".into()),
                    ..Default::default()
                })
            })
        });
        let scheduler = Arc::new(
            CronScheduler::new(
                OpenclawConfig::default(),
                crontab.clone(),
                Arc::new(StaticLogSource(journal)),
                isolated,
            )
            .expect("scheduler construction"),
        );
        let state = GatewayState::new(Services {
            cron: Arc::new(LiveCronService::new(scheduler.clone())),
            scheduler: Arc::new(SystemSchedulerService),
        });
        Self {
            registry: MethodRegistry::new(),
            state,
            crontab,
            scheduler,
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, String> {
        self.registry
            .dispatch(self.state.clone(), method, params)
            .await
            .map_err(|e| format!("{}: {}", e.code, e.message))
    }
}

fn ping_job() -> Value {
    json!({
        "name": "ping",
        "schedule": { "kind": "cron", "expr": "*/5 * * * *" },
        "sessionTarget": "main",
        "wakeMode": "now",
        "payload": { "kind": "systemEvent", "text": "wake" }
    })
}

#[tokio::test]
async fn add_list_run_remove_lifecycle() {
    let h = Harness::new();

    let job = h.call("cron.add", ping_job()).await.unwrap();
    let id = job["id"].as_str().unwrap().to_string();
    assert_eq!(job["name"], "ping");
    assert!(job["state"]["nextRunAtMs"].as_u64().is_some());

    let listed = h.call("cron.list", json!({})).await.unwrap();
    assert_eq!(listed["meta"]["total"], 1);
    assert_eq!(listed["jobs"][0]["id"], id.as_str());

    let run = h
        .call("cron.run", json!({ "id": id, "mode": "force" }))
        .await
        .unwrap();
    assert_eq!(run["ok"], true);
    assert_eq!(run["ran"], true);
    assert_eq!(run["outcome"]["status"], "ok");

    let events = h.scheduler.events().drain().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].text, "wake");

    let removed = h.call("cron.remove", json!({ "id": id })).await.unwrap();
    assert_eq!(removed["removed"], true);

    let listed = h.call("cron.list", json!({})).await.unwrap();
    assert_eq!(listed["meta"]["total"], 0);
}

#[tokio::test]
async fn at_job_with_delete_after_run_disappears() {
    let h = Harness::new();

    let job = h
        .call(
            "cron.add",
            json!({
                "name": "once",
                "schedule": { "kind": "at", "at": "2099-01-01T00:00:00Z" },
                "deleteAfterRun": true,
                "sessionTarget": "main",
                "payload": { "kind": "systemEvent", "text": "x" }
            }),
        )
        .await
        .unwrap();
    let id = job["id"].as_str().unwrap().to_string();

    let run = h
        .call("cron.run", json!({ "id": id, "mode": "force" }))
        .await
        .unwrap();
    assert_eq!(run["ran"], true);

    let listed = h.call("cron.list", json!({})).await.unwrap();
    assert_eq!(listed["meta"]["total"], 0);
    assert!(!h.crontab.contents().contains(&id));
}

#[tokio::test]
async fn infeasible_schedule_is_invalid_request_with_reason() {
    let h = Harness::new();

    let err = h
        .call(
            "cron.add",
            json!({
                "name": "bad",
                "schedule": { "kind": "every", "everyMs": 45_000 },
                "sessionTarget": "main",
                "payload": { "kind": "systemEvent", "text": "x" }
            }),
        )
        .await
        .unwrap_err();
    assert!(err.starts_with("invalid_request"));
    assert!(err.contains("not a multiple"));
}

#[tokio::test]
async fn webhook_failure_surfaces_delivery_target_error() {
    let h = Harness::new();

    let job = h
        .call(
            "cron.add",
            json!({
                "name": "hooked",
                "schedule": { "kind": "cron", "expr": "*/5 * * * *" },
                "sessionTarget": "main",
                "payload": { "kind": "systemEvent", "text": "x" },
                "delivery": { "mode": "webhook", "to": "http://127.0.0.1:1/", "bestEffort": false }
            }),
        )
        .await
        .unwrap();
    let id = job["id"].as_str().unwrap();

    let run = h
        .call("cron.run", json!({ "id": id, "mode": "force" }))
        .await
        .unwrap();
    assert_eq!(run["ok"], true);
    assert_eq!(run["ran"], true);
    assert_eq!(run["outcome"]["status"], "error");
    assert_eq!(run["outcome"]["errorKind"], "delivery-target");
}

#[tokio::test]
async fn user_crontab_lines_survive_rewrites() {
    let h = Harness::new();
    h.crontab
        .write("0 3 * * * /usr/bin/backup.sh\n")
        .await
        .unwrap();

    let job = h.call("cron.add", ping_job()).await.unwrap();
    let id = job["id"].as_str().unwrap().to_string();
    assert!(h.crontab.contents().contains("0 3 * * * /usr/bin/backup.sh"));
    assert!(h.crontab.contents().contains("# openclaw:cron"));

    h.call("cron.remove", json!({ "id": id })).await.unwrap();
    let contents = h.crontab.contents();
    assert!(contents.contains("0 3 * * * /usr/bin/backup.sh"));
    assert!(!contents.contains("# openclaw:cron"));
}

#[tokio::test]
async fn runs_returns_history_newest_first() {
    let journal = "\
2024-01-01 08:00:00 host CRON[1]: (user) CMD (openclaw cron run JOB123)
2024-01-01 09:00:00 host CRON[2]: (user) CMD (openclaw cron run JOB123) error: exit 1
2024-01-01 10:00:00 host CRON[3]: (user) CMD (openclaw cron run JOB123)
"
    .to_string();
    let h = Harness::with_journal(journal);

    let runs = h
        .call("cron.runs", json!({ "id": "JOB123", "limit": 10 }))
        .await
        .unwrap();
    assert_eq!(runs["total"], 3);
    assert_eq!(runs["hasMore"], false);
    assert_eq!(runs["nextOffset"], Value::Null);
    let entries = runs["entries"].as_array().unwrap();
    assert_eq!(entries[0]["status"], "ok");
    assert_eq!(entries[1]["status"], "error");
    assert_eq!(entries[2]["status"], "ok");
    assert!(entries[0]["ts"].as_u64() > entries[1]["ts"].as_u64());
}

#[tokio::test]
async fn update_toggles_enabled_in_place() {
    let h = Harness::new();
    let job = h.call("cron.add", ping_job()).await.unwrap();
    let id = job["id"].as_str().unwrap().to_string();

    let updated = h
        .call(
            "cron.update",
            json!({ "id": id, "patch": { "enabled": false } }),
        )
        .await
        .unwrap();
    assert_eq!(updated["enabled"], false);
    assert!(updated.get("state").and_then(|s| s.get("nextRunAtMs")).is_none());

    // Disabled jobs stay in the crontab, commented out.
    let contents = h.crontab.contents();
    assert!(contents.contains(&format!("# */5 * * * * openclaw cron run {id}")));

    let status = h.call("cron.status", json!({})).await.unwrap();
    assert_eq!(status["jobs"], 1);
}

#[tokio::test]
async fn unknown_method_is_invalid_request() {
    let h = Harness::new();
    let err = h.call("cron.nope", json!({})).await.unwrap_err();
    assert!(err.starts_with("invalid_request"));
}

#[tokio::test]
async fn missing_id_is_invalid_request() {
    let h = Harness::new();
    for method in ["cron.update", "cron.remove", "cron.run", "cron.runs"] {
        let err = h.call(method, json!({})).await.unwrap_err();
        assert!(err.contains("missing 'id'"), "{method}: {err}");
    }
}

#[tokio::test]
async fn run_unknown_id_is_invalid_request() {
    let h = Harness::new();
    let err = h
        .call("cron.run", json!({ "id": "ghost", "mode": "force" }))
        .await
        .unwrap_err();
    assert!(err.starts_with("invalid_request"));
    assert!(err.contains("job not found"));
}

#[tokio::test]
async fn frames_roundtrip_through_the_registry() {
    let h = Harness::new();
    let frame = RequestFrame {
        r#type: "req".into(),
        id: "r1".into(),
        method: "cron.status".into(),
        params: None,
    };
    let response = h.registry.handle_frame(h.state.clone(), frame).await;
    assert!(response.ok);
    assert_eq!(response.payload.unwrap()["jobs"], 0);
}

#[tokio::test]
async fn scheduler_status_reports_all_blocks() {
    let h = Harness::new();
    let status = h.call("scheduler.status", json!({})).await.unwrap();
    for block in ["crontab", "timers", "units"] {
        let section = &status[block];
        assert!(
            section.get("output").is_some() || section.get("error").is_some(),
            "{block} missing"
        );
    }
}

#[tokio::test]
async fn isolated_job_runs_through_rpc() {
    let h = Harness::new();
    let job = h
        .call(
            "cron.add",
            json!({
                "name": "turn",
                "schedule": { "kind": "every", "everyMs": 3_600_000 },
                "sessionTarget": "isolated",
                "payload": { "kind": "agentTurn", "message": "summarize" }
            }),
        )
        .await
        .unwrap();
    let id = job["id"].as_str().unwrap();

    let run = h
        .call("cron.run", json!({ "id": id, "mode": "force" }))
        .await
        .unwrap();
    assert_eq!(run["outcome"]["status"], "ok");
    assert_eq!(run["outcome"]["summary"], "turn complete");
}
