//! Bidirectional codec between [`CronJob`]s and tagged crontab lines.
//!
//! The crontab is an ordered list of lines. Lines containing the
//! [`CRON_TAG`] marker are managed (owned by this system); everything else
//! is unmanaged and preserved verbatim across every write.
//!
//! Per job, the encoded form is: one or more metadata lines (percent-encoded
//! `key=value` tokens grouped by `id`), an optional `CRON_TZ=` pair, and
//! exactly one execution line referencing the run command. A disabled job's
//! execution line is prefixed with `# `; that prefix is the only thing the
//! enabled flag changes.

use std::collections::HashMap;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::{
    error::{Error, Result},
    schedule::resolve_crontab_schedule,
    types::{
        CronDelivery, CronJob, CronJobState, CronPayload, CronSchedule, DeliveryMode,
        SessionTarget, WakeMode, is_safe_job_id,
    },
};

/// Marker identifying lines owned by this system.
pub const CRON_TAG: &str = "# openclaw:cron";

/// Command marker on execution lines. `cron(8)` invokes this CLI, which
/// calls `cron.run` with `mode="force"`.
pub const RUN_COMMAND: &str = "openclaw cron run";

/// Values must survive whitespace-tokenized `key=value` parsing and the
/// crontab's own comment handling.
const META_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'\t')
    .add(b'#')
    .add(b'=')
    .add(b'%');

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, META_ESCAPE).to_string()
}

/// Best-effort decode: malformed escapes yield the literal text.
fn decode_value(value: &str) -> String {
    percent_decode_str(value)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Result of parsing a crontab: the jobs we own, every raw line, and
/// per-entry decode problems (skipped jobs, never hard failures).
#[derive(Debug, Clone, Default)]
pub struct CrontabSnapshot {
    pub jobs: Vec<CronJob>,
    pub lines: Vec<String>,
    pub errors: Vec<String>,
}

// ── Encoding ─────────────────────────────────────────────────────────────────

/// Encode one job as its crontab lines, metadata first, execution line last.
pub fn encode_job(job: &CronJob) -> Result<Vec<String>> {
    if !is_safe_job_id(&job.id) {
        return Err(Error::message(format!(
            "job id contains unsafe characters: {}",
            job.id
        )));
    }
    let resolved = resolve_crontab_schedule(&job.schedule)?;
    let id = encode_value(&job.id);
    let mut lines = Vec::new();

    let mut base = vec![
        format!("id={id}"),
        format!("name={}", encode_value(&job.name)),
        format!("session_target={}", job.session_target.as_str()),
        format!("wake_mode={}", job.wake_mode.as_str()),
        format!("created_at_ms={}", job.created_at_ms),
        format!("updated_at_ms={}", job.updated_at_ms),
    ];
    if let Some(description) = &job.description {
        base.push(format!("description={}", encode_value(description)));
    }
    if let Some(agent_id) = &job.agent_id {
        base.push(format!("agent_id={}", encode_value(agent_id)));
    }
    if let Some(session_key) = &job.session_key {
        base.push(format!("session_key={}", encode_value(session_key)));
    }
    if job.delete_after_run {
        base.push("delete_after_run=true".to_string());
    }
    lines.push(format!("{CRON_TAG} {}", base.join(" ")));

    lines.push(format!("{CRON_TAG} id={id} {}", payload_fields(&job.payload)));

    if let Some(delivery) = &job.delivery {
        lines.push(format!(
            "{CRON_TAG} id={id} {}",
            delivery_fields(delivery)
        ));
    }

    lines.push(format!(
        "{CRON_TAG} id={id} {}",
        schedule_fields(&job.schedule)
    ));

    // CRON_TZ pairs exist for format extensibility; the resolver currently
    // rejects per-job timezones for crontab backing, so tz is always None.
    if let Some(tz) = &resolved.tz {
        lines.push(format!("CRON_TZ={tz}"));
    }
    let exec = format!(
        "{} {RUN_COMMAND} {} {CRON_TAG} id={id}",
        resolved.expr, job.id
    );
    if job.enabled {
        lines.push(exec);
    } else {
        lines.push(format!("# {exec}"));
    }
    if resolved.tz.is_some() {
        lines.push("CRON_TZ=".to_string());
    }

    Ok(lines)
}

fn payload_fields(payload: &CronPayload) -> String {
    match payload {
        CronPayload::SystemEvent { text } => {
            format!("payload_kind=systemEvent payload_text={}", encode_value(text))
        }
        CronPayload::AgentTurn {
            message,
            model,
            thinking,
            timeout_seconds,
            allow_unsafe_external_content,
            deliver,
            channel,
            to,
            best_effort_deliver,
        } => {
            let mut fields = vec![
                "payload_kind=agentTurn".to_string(),
                format!("payload_message={}", encode_value(message)),
            ];
            if let Some(model) = model {
                fields.push(format!("payload_model={}", encode_value(model)));
            }
            if let Some(thinking) = thinking {
                fields.push(format!("payload_thinking={}", encode_value(thinking)));
            }
            if let Some(timeout) = timeout_seconds {
                fields.push(format!("payload_timeout_seconds={timeout}"));
            }
            if let Some(allow) = allow_unsafe_external_content {
                fields.push(format!("payload_allow_unsafe_external_content={allow}"));
            }
            if let Some(deliver) = deliver {
                fields.push(format!("payload_deliver={deliver}"));
            }
            if let Some(channel) = channel {
                fields.push(format!("payload_channel={}", encode_value(channel)));
            }
            if let Some(to) = to {
                fields.push(format!("payload_to={}", encode_value(to)));
            }
            if let Some(best_effort) = best_effort_deliver {
                fields.push(format!("payload_best_effort_deliver={best_effort}"));
            }
            fields.join(" ")
        }
    }
}

fn delivery_fields(delivery: &CronDelivery) -> String {
    let mut fields = vec![format!("delivery_mode={}", delivery.mode.as_str())];
    if let Some(channel) = &delivery.channel {
        fields.push(format!("delivery_channel={}", encode_value(channel)));
    }
    if let Some(to) = &delivery.to {
        fields.push(format!("delivery_to={}", encode_value(to)));
    }
    if delivery.best_effort {
        fields.push("delivery_best_effort=true".to_string());
    }
    fields.join(" ")
}

fn schedule_fields(schedule: &CronSchedule) -> String {
    match schedule {
        CronSchedule::Cron {
            expr,
            tz,
            stagger_ms,
        } => {
            let mut fields = vec![
                "schedule_kind=cron".to_string(),
                format!("schedule_expr={}", encode_value(expr)),
            ];
            if let Some(tz) = tz {
                fields.push(format!("schedule_tz={}", encode_value(tz)));
            }
            if let Some(stagger) = stagger_ms {
                fields.push(format!("schedule_stagger_ms={stagger}"));
            }
            fields.join(" ")
        }
        CronSchedule::Every {
            every_ms,
            anchor_ms,
        } => {
            let mut fields = vec![
                "schedule_kind=every".to_string(),
                format!("schedule_every_ms={every_ms}"),
            ];
            if let Some(anchor) = anchor_ms {
                fields.push(format!("schedule_anchor_ms={anchor}"));
            }
            fields.join(" ")
        }
        CronSchedule::At { at } => {
            format!("schedule_kind=at schedule_at={}", encode_value(at))
        }
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────────

struct ExecLine {
    expr: String,
    enabled: bool,
    tz: Option<String>,
}

/// Parse a crontab into a snapshot. Jobs with missing required fields are
/// skipped with an entry in `errors`; unmanaged lines never fail.
pub fn parse_crontab(lines: &[String], now_ms: u64) -> CrontabSnapshot {
    let mut snapshot = CrontabSnapshot {
        lines: lines.to_vec(),
        ..Default::default()
    };
    let mut meta: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut exec: HashMap<String, ExecLine> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if !line.contains(CRON_TAG) {
            continue;
        }
        if line.contains(RUN_COMMAND) {
            match parse_exec_line(line) {
                Ok((id, mut parsed)) => {
                    if index > 0 {
                        if let Some(tz) = lines[index - 1].strip_prefix("CRON_TZ=") {
                            if !tz.trim().is_empty() {
                                parsed.tz = Some(tz.trim().to_string());
                            }
                        }
                    }
                    if exec.contains_key(&id) {
                        snapshot
                            .errors
                            .push(format!("duplicate schedule line for job {id}"));
                        continue;
                    }
                    if !order.contains(&id) {
                        order.push(id.clone());
                    }
                    exec.insert(id, parsed);
                }
                Err(err) => snapshot.errors.push(err),
            }
        } else {
            match parse_metadata_line(line) {
                Ok((id, fields)) => {
                    if !order.contains(&id) {
                        order.push(id.clone());
                    }
                    meta.entry(id).or_default().extend(fields);
                }
                Err(err) => snapshot.errors.push(err),
            }
        }
    }

    for id in order {
        let fields = meta.remove(&id).unwrap_or_default();
        match build_job(&id, fields, exec.remove(&id)) {
            Ok(mut job) => {
                job.state = CronJobState {
                    next_run_at_ms: crate::schedule::resolve_job_next_run(&job, now_ms),
                };
                snapshot.jobs.push(job);
            }
            Err(err) => snapshot.errors.push(err),
        }
    }

    snapshot
}

fn parse_exec_line(line: &str) -> std::result::Result<(String, ExecLine), String> {
    let trimmed = line.trim_start();
    let (enabled, body) = match trimmed.strip_prefix('#') {
        Some(rest) if !rest.trim_start().starts_with("openclaw:cron") => {
            (false, rest.trim_start())
        }
        _ => (true, trimmed),
    };

    let tokens: Vec<&str> = body.split_whitespace().collect();
    if tokens.len() < 9 {
        return Err(format!("malformed schedule line: {line}"));
    }
    let expr = tokens[..5].join(" ");
    if [tokens[5], tokens[6], tokens[7]].join(" ") != RUN_COMMAND {
        return Err(format!("schedule line missing run command: {line}"));
    }
    let id = tokens[8].to_string();
    if !is_safe_job_id(&id) {
        return Err(format!("schedule line has unsafe job id: {id}"));
    }
    Ok((
        id,
        ExecLine {
            expr,
            enabled,
            tz: None,
        },
    ))
}

fn parse_metadata_line(line: &str) -> std::result::Result<(String, HashMap<String, String>), String> {
    let Some(pos) = line.find(CRON_TAG) else {
        return Err(format!("not a metadata line: {line}"));
    };
    let rest = &line[pos + CRON_TAG.len()..];
    let mut fields = HashMap::new();
    for token in rest.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            fields.insert(key.to_string(), decode_value(value));
        }
    }
    match fields.remove("id") {
        Some(id) if is_safe_job_id(&id) => Ok((id, fields)),
        Some(id) => Err(format!("metadata line has unsafe job id: {id}")),
        None => Err(format!("metadata line without id: {line}")),
    }
}

fn build_job(
    id: &str,
    fields: HashMap<String, String>,
    exec: Option<ExecLine>,
) -> std::result::Result<CronJob, String> {
    let Some(exec) = exec else {
        return Err(format!("job {id} has no schedule line"));
    };

    let schedule = build_schedule(id, &fields, &exec)?;
    let payload = build_payload(id, &fields)?;
    let delivery = build_delivery(id, &fields)?;

    let session_target = match fields.get("session_target").map(String::as_str) {
        Some("isolated") => SessionTarget::Isolated,
        Some("main") | None => SessionTarget::Main,
        Some(other) => return Err(format!("job {id} has unknown session_target: {other}")),
    };
    let wake_mode = match fields.get("wake_mode").map(String::as_str) {
        Some("next-heartbeat") => WakeMode::NextHeartbeat,
        Some("now") | None => WakeMode::Now,
        Some(other) => return Err(format!("job {id} has unknown wake_mode: {other}")),
    };

    // The execution line's comment prefix is the authoritative enabled state;
    // an `enabled=` metadata key from older writers is honored only when the
    // line itself carries no veto.
    let enabled = exec.enabled
        && fields
            .get("enabled")
            .map(|v| v != "false")
            .unwrap_or(true);

    Ok(CronJob {
        id: id.to_string(),
        name: fields
            .get("name")
            .cloned()
            .unwrap_or_else(|| id.to_string()),
        description: fields.get("description").cloned(),
        enabled,
        agent_id: fields.get("agent_id").cloned(),
        session_key: fields.get("session_key").cloned(),
        delete_after_run: fields.get("delete_after_run").map(String::as_str) == Some("true"),
        created_at_ms: parse_u64(&fields, "created_at_ms"),
        updated_at_ms: parse_u64(&fields, "updated_at_ms"),
        schedule,
        session_target,
        wake_mode,
        payload,
        delivery,
        state: CronJobState::default(),
    })
}

fn parse_u64(fields: &HashMap<String, String>, key: &str) -> u64 {
    fields
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

fn build_schedule(
    id: &str,
    fields: &HashMap<String, String>,
    exec: &ExecLine,
) -> std::result::Result<CronSchedule, String> {
    match fields.get("schedule_kind").map(String::as_str) {
        Some("cron") => Ok(CronSchedule::Cron {
            expr: fields
                .get("schedule_expr")
                .cloned()
                .unwrap_or_else(|| exec.expr.clone()),
            tz: fields.get("schedule_tz").cloned().or_else(|| exec.tz.clone()),
            stagger_ms: fields
                .get("schedule_stagger_ms")
                .and_then(|v| v.parse().ok()),
        }),
        Some("every") => {
            let every_ms = fields
                .get("schedule_every_ms")
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| format!("job {id} every schedule is missing schedule_every_ms"))?;
            Ok(CronSchedule::Every {
                every_ms,
                anchor_ms: fields.get("schedule_anchor_ms").and_then(|v| v.parse().ok()),
            })
        }
        Some("at") => {
            let at = fields
                .get("schedule_at")
                .cloned()
                .ok_or_else(|| format!("job {id} at schedule is missing schedule_at"))?;
            Ok(CronSchedule::At { at })
        }
        Some(other) => Err(format!("job {id} has unknown schedule_kind: {other}")),
        // Fall back to the expression observed on the execution line.
        None => Ok(CronSchedule::Cron {
            expr: exec.expr.clone(),
            tz: exec.tz.clone(),
            stagger_ms: None,
        }),
    }
}

fn build_payload(
    id: &str,
    fields: &HashMap<String, String>,
) -> std::result::Result<CronPayload, String> {
    match fields.get("payload_kind").map(String::as_str) {
        Some("agentTurn") => {
            let message = fields
                .get("payload_message")
                .cloned()
                .ok_or_else(|| format!("job {id} agentTurn payload is missing payload_message"))?;
            Ok(CronPayload::AgentTurn {
                message,
                model: fields.get("payload_model").cloned(),
                thinking: fields.get("payload_thinking").cloned(),
                timeout_seconds: fields
                    .get("payload_timeout_seconds")
                    .and_then(|v| v.parse().ok()),
                allow_unsafe_external_content: fields
                    .get("payload_allow_unsafe_external_content")
                    .map(|v| v == "true"),
                deliver: fields.get("payload_deliver").map(|v| v == "true"),
                channel: fields.get("payload_channel").cloned(),
                to: fields.get("payload_to").cloned(),
                best_effort_deliver: fields
                    .get("payload_best_effort_deliver")
                    .map(|v| v == "true"),
            })
        }
        Some("systemEvent") | None => Ok(CronPayload::SystemEvent {
            text: fields.get("payload_text").cloned().unwrap_or_default(),
        }),
        Some(other) => Err(format!("job {id} has unknown payload_kind: {other}")),
    }
}

fn build_delivery(
    id: &str,
    fields: &HashMap<String, String>,
) -> std::result::Result<Option<CronDelivery>, String> {
    let Some(mode) = fields.get("delivery_mode") else {
        return Ok(None);
    };
    let mode = match mode.as_str() {
        "none" => DeliveryMode::None,
        "announce" => DeliveryMode::Announce,
        "webhook" => DeliveryMode::Webhook,
        other => return Err(format!("job {id} has unknown delivery_mode: {other}")),
    };
    Ok(Some(CronDelivery {
        mode,
        channel: fields.get("delivery_channel").cloned(),
        to: fields.get("delivery_to").cloned(),
        best_effort: fields.get("delivery_best_effort").map(String::as_str) == Some("true"),
    }))
}

// ── Writing ──────────────────────────────────────────────────────────────────

/// Render the full crontab content for a job set: unmanaged lines from
/// `existing_lines` kept in order, then the encoded entries.
pub fn render_crontab(existing_lines: &[String], jobs: &[CronJob]) -> Result<String> {
    let mut kept: Vec<String> = existing_lines
        .iter()
        .filter(|line| !line.contains(CRON_TAG))
        .cloned()
        .collect();
    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }

    let mut out = kept;
    if !out.is_empty() && !jobs.is_empty() {
        out.push(String::new());
    }
    for job in jobs {
        out.extend(encode_job(job)?);
    }

    let mut content = out.join("\n");
    while content.contains("\n\n\n") {
        content = content.replace("\n\n\n", "\n\n");
    }
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    Ok(content)
}
