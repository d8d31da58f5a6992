//! Core data types for the crontab-backed scheduling system.

use serde::{Deserialize, Serialize};

/// How a job is scheduled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CronSchedule {
    /// Cron expression (5-field standard).
    Cron {
        expr: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tz: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stagger_ms: Option<u64>,
    },
    /// Fixed interval: fire every `every_ms` millis.
    Every {
        every_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        anchor_ms: Option<u64>,
    },
    /// One-shot: fire once at `at`, an ISO-8601 instant.
    At { at: String },
}

/// What happens when a job fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CronPayload {
    /// Inject a system event into the main session.
    SystemEvent { text: String },
    /// Run an isolated agent turn.
    AgentTurn {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        thinking: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout_seconds: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        allow_unsafe_external_content: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        deliver: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        best_effort_deliver: Option<bool>,
    },
}

impl CronPayload {
    /// The wire spelling of the payload's `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SystemEvent { .. } => "systemEvent",
            Self::AgentTurn { .. } => "agentTurn",
        }
    }
}

/// Where the job executes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionTarget {
    /// Inject into the main conversation session.
    #[default]
    Main,
    /// Run in an isolated, throwaway session.
    Isolated,
}

impl SessionTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Isolated => "isolated",
        }
    }
}

/// When a main-session job should wake the agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WakeMode {
    #[default]
    Now,
    NextHeartbeat,
}

impl WakeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Now => "now",
            Self::NextHeartbeat => "next-heartbeat",
        }
    }
}

/// How a run outcome leaves the process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryMode {
    #[default]
    None,
    Announce,
    Webhook,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Announce => "announce",
            Self::Webhook => "webhook",
        }
    }
}

/// Outcome delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CronDelivery {
    #[serde(default)]
    pub mode: DeliveryMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default)]
    pub best_effort: bool,
}

/// Outcome of a single job run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Ok,
    Error,
}

/// Mutable runtime state of a job. Derived, recomputed on every write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CronJobState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<u64>,
}

/// A scheduled cron job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default)]
    pub delete_after_run: bool,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub schedule: CronSchedule,
    #[serde(default)]
    pub session_target: SessionTarget,
    #[serde(default)]
    pub wake_mode: WakeMode,
    pub payload: CronPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<CronDelivery>,
    #[serde(default)]
    pub state: CronJobState,
}

/// Result of dispatching one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CronRunOutcome {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

impl CronRunOutcome {
    pub fn ok() -> Self {
        Self {
            status: RunStatus::Ok,
            summary: None,
            error: None,
            error_kind: None,
            session_id: None,
            session_key: None,
        }
    }
}

/// One run extracted from the system log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CronRunLogEntry {
    /// Epoch milliseconds.
    pub ts: u64,
    pub job_id: String,
    pub status: RunStatus,
}

/// Full result of a `cron.run` invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrontabRunResult {
    pub ok: bool,
    pub ran: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CronRunOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrontabRunResult {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            ran: false,
            reason: Some(reason.into()),
            outcome: None,
            next_run_at_ms: None,
            error: None,
        }
    }

    pub fn ran(outcome: CronRunOutcome, next_run_at_ms: Option<u64>) -> Self {
        Self {
            ok: true,
            ran: true,
            reason: None,
            outcome: Some(outcome),
            next_run_at_ms,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            ran: false,
            reason: None,
            outcome: None,
            next_run_at_ms: None,
            error: Some(error.into()),
        }
    }
}

/// Input for creating a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default)]
    pub delete_after_run: bool,
    pub schedule: CronSchedule,
    #[serde(default)]
    pub session_target: SessionTarget,
    #[serde(default)]
    pub wake_mode: WakeMode,
    pub payload: CronPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<CronDelivery>,
}

fn default_true() -> bool {
    true
}

/// Patch for updating an existing job. `payload` and `delivery` are partial
/// JSON objects merged shallowly onto the job's current values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_after_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<CronSchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_target: Option<SessionTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_mode: Option<WakeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<serde_json::Value>,
}

/// Summary status of the cron system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronStatus {
    pub enabled: bool,
    pub jobs: usize,
}

/// Whether a run was requested by the schedule or forced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RunMode {
    #[default]
    Due,
    Force,
}

/// Job ids land verbatim on the crontab execution line, so they are
/// constrained to characters that cannot act as shell or cron metacharacters.
pub fn is_safe_job_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_roundtrip_cron() {
        let s = CronSchedule::Cron {
            expr: "*/5 * * * *".into(),
            tz: None,
            stagger_ms: None,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"kind\":\"cron\""));
        let back: CronSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn schedule_roundtrip_every() {
        let s = CronSchedule::Every {
            every_ms: 300_000,
            anchor_ms: None,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("everyMs"));
        let back: CronSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn schedule_roundtrip_at() {
        let s = CronSchedule::At {
            at: "2030-06-15T12:00:00Z".into(),
        };
        let back: CronSchedule =
            serde_json::from_str(&serde_json::to_string(&s).unwrap()).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn payload_tags() {
        let p = CronPayload::SystemEvent { text: "hi".into() };
        assert!(serde_json::to_string(&p).unwrap().contains("systemEvent"));
        assert_eq!(p.kind(), "systemEvent");

        let p = CronPayload::AgentTurn {
            message: "check mail".into(),
            model: None,
            thinking: None,
            timeout_seconds: Some(120),
            allow_unsafe_external_content: None,
            deliver: Some(true),
            channel: None,
            to: None,
            best_effort_deliver: None,
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("agentTurn"));
        assert!(json.contains("timeoutSeconds"));
        let back: CronPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn wake_mode_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&WakeMode::NextHeartbeat).unwrap(),
            "\"next-heartbeat\""
        );
    }

    #[test]
    fn session_target_default_is_main() {
        assert_eq!(SessionTarget::default(), SessionTarget::Main);
    }

    #[test]
    fn job_create_defaults() {
        let json = r#"{
            "name": "ping",
            "schedule": { "kind": "cron", "expr": "*/5 * * * *" },
            "payload": { "kind": "systemEvent", "text": "wake" }
        }"#;
        let create: CronJobCreate = serde_json::from_str(json).unwrap();
        assert!(create.enabled);
        assert!(!create.delete_after_run);
        assert_eq!(create.session_target, SessionTarget::Main);
        assert_eq!(create.wake_mode, WakeMode::Now);
    }

    #[test]
    fn run_result_shapes() {
        let skipped = CrontabRunResult::skipped("not-due");
        assert!(skipped.ok);
        assert!(!skipped.ran);
        let v = serde_json::to_value(&skipped).unwrap();
        assert_eq!(v["reason"], "not-due");

        let ran = CrontabRunResult::ran(CronRunOutcome::ok(), Some(123));
        let v = serde_json::to_value(&ran).unwrap();
        assert_eq!(v["ran"], true);
        assert_eq!(v["nextRunAtMs"], 123);
        assert_eq!(v["outcome"]["status"], "ok");

        let failed = CrontabRunResult::failed("boom");
        assert!(!failed.ok);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn safe_job_ids() {
        assert!(is_safe_job_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_safe_job_id("JOB123"));
        assert!(!is_safe_job_id(""));
        assert!(!is_safe_job_id("a b"));
        assert!(!is_safe_job_id("x;rm -rf /"));
        assert!(!is_safe_job_id("a#b"));
    }

    #[test]
    fn outcome_camel_case_fields() {
        let outcome = CronRunOutcome {
            status: RunStatus::Error,
            summary: None,
            error: Some("nope".into()),
            error_kind: Some("delivery-target".into()),
            session_id: None,
            session_key: Some("agent:main:main".into()),
        };
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["errorKind"], "delivery-target");
        assert_eq!(v["sessionKey"], "agent:main:main");
    }
}
